//! Printer status notifications (`5A 02`).

use std::fmt;

use crate::cmd::{CMD_STATUS, CTRL};
use crate::error::{Error, Result};

/// Battery percentage below which a warning is logged during a session.
pub const BATTERY_CRITICAL: u8 = 10;

/// Parsed device status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrinterStatus {
    pub battery_level: u8,
    pub no_paper: bool,
    pub charging: bool,
    pub charged: bool,
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "battery level: {}%, no paper: {}, charging: {}, charged: {}",
            self.battery_level, self.no_paper, self.charging, self.charged
        )
    }
}

/// Parse a `5A 02` status frame. Requires the prefix plus at least four
/// payload bytes.
pub fn parse_status(data: &[u8]) -> Result<PrinterStatus> {
    if data.len() < 6 || data[0] != CTRL || data[1] != CMD_STATUS {
        return Err(Error::Protocol(format!(
            "invalid status frame: {:02x?}",
            &data[..data.len().min(6)]
        )));
    }
    let payload = &data[2..];
    Ok(PrinterStatus {
        battery_level: payload[0],
        no_paper: payload[1] != 0,
        charging: payload[2] == 1,
        charged: payload[2] == 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        let st = parse_status(&[0x5A, 0x02, 87, 0, 1, 0]).unwrap();
        assert_eq!(
            st,
            PrinterStatus {
                battery_level: 87,
                no_paper: false,
                charging: true,
                charged: false,
            }
        );
    }

    #[test]
    fn test_parse_status_charged_and_no_paper() {
        let st = parse_status(&[0x5A, 0x02, 100, 1, 2, 0]).unwrap();
        assert!(st.no_paper);
        assert!(!st.charging);
        assert!(st.charged);
    }

    #[test]
    fn test_parse_status_short_frame() {
        assert!(parse_status(&[0x5A, 0x02, 87, 0]).is_err());
    }

    #[test]
    fn test_parse_status_wrong_prefix() {
        assert!(parse_status(&[0x5A, 0x05, 0, 0, 0, 0]).is_err());
        assert!(parse_status(&[0x55, 0x02, 0, 0, 0, 0]).is_err());
    }
}
