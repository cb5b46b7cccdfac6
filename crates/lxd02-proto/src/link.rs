//! Link layer: retried writes, request/response correlation, and
//! classification of inbound notifications.
//!
//! The printer never acknowledges writes at the ATT level; synchronous
//! commands are instead correlated by the 2-byte prefix of the next
//! matching notification. At most one such request is outstanding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

use crate::cmd;
use crate::error::{Error, Result};

/// Delay between write attempts.
const SEND_RETRY_DELAY: Duration = Duration::from_millis(10);
/// Write attempts before giving up.
const MAX_RETRIES: usize = 3;
/// Pause after a cooldown notification.
const COOLDOWN_DELAY: Duration = Duration::from_millis(100);
/// Default wait for a correlated response.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Transport contract the driver core requires from the Bluetooth layer.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Write one frame to the TX characteristic, without response.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Stream of inbound notification frames from the RX characteristic.
    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>>;

    /// Tear down the connection.
    async fn disconnect(&self) -> Result<()>;
}

/// Stand-in transport for dry runs: writes fail, no notifications arrive.
pub struct NullLink;

#[async_trait]
impl Link for NullLink {
    async fn write(&self, _data: &[u8]) -> Result<()> {
        Err(Error::Transport("no transport attached".into()))
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>> {
        use futures::StreamExt;
        Ok(futures::stream::pending().boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Device-initiated notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Status,
    Retransmit,
    Finished,
    Hold,
}

/// A classified inbound frame queued for the session.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub data: Vec<u8>,
}

struct PendingResponse {
    id: u64,
    prefix: [u8; 2],
    tx: oneshot::Sender<Vec<u8>>,
}

/// Clears a pending-response slot when the waiter is dropped mid-wait,
/// unless the slot was already consumed or re-registered.
struct SlotGuard<'a> {
    pending: &'a Mutex<Option<PendingResponse>>,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap();
        if pending.as_ref().is_some_and(|p| p.id == self.id) {
            pending.take();
        }
    }
}

/// Wraps a [`Link`] with retries, response correlation and notification
/// classification.
pub struct LinkLayer<L> {
    link: L,
    pending: Mutex<Option<PendingResponse>>,
    next_id: AtomicU64,
    notify_tx: mpsc::Sender<Notification>,
}

impl<L: Link> LinkLayer<L> {
    /// Returns the layer plus the queue of classified notifications.
    pub fn new(link: L) -> (Self, mpsc::Receiver<Notification>) {
        let (notify_tx, notify_rx) = mpsc::channel(10);
        (
            Self {
                link,
                pending: Mutex::new(None),
                next_id: AtomicU64::new(0),
                notify_tx,
            },
            notify_rx,
        )
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Write with bounded retries.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        for attempt in 1..=MAX_RETRIES {
            match self.link.write(data).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    log::warn!("send failed on attempt {attempt}: {err}");
                    sleep(SEND_RETRY_DELAY).await;
                }
            }
        }
        Err(Error::Transport("BLE write failed after retries".into()))
    }

    /// Send a command and wait for the response frame starting with
    /// `expect_prefix`. Fails fast if another request is outstanding.
    pub async fn send_and_wait(
        &self,
        data: &[u8],
        expect_prefix: [u8; 2],
        wait: Duration,
    ) -> Result<Vec<u8>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_some() {
                return Err(Error::RequestInProgress);
            }
            let (tx, rx) = oneshot::channel();
            *pending = Some(PendingResponse {
                id,
                prefix: expect_prefix,
                tx,
            });
            rx
        };
        let _guard = SlotGuard {
            pending: &self.pending,
            id,
        };

        log::debug!("TX {data:02x?}, expecting {expect_prefix:02x?}");
        self.link.write(data).await?;

        match timeout(wait, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) | Err(_) => Err(Error::Timeout {
                prefix: expect_prefix,
                timeout: wait,
            }),
        }
    }

    /// Route one inbound frame: a correlated response is handed to the
    /// waiter and consumed; everything else is classified by its 2-byte
    /// prefix and queued, paused on, or dropped.
    pub async fn ingest(&self, frame: &[u8]) {
        if frame.len() < 2 {
            log::warn!("notification too short: {frame:02x?}");
            return;
        }

        {
            let mut pending = self.pending.lock().unwrap();
            if let Some(p) = pending.take_if(|p| frame[..2] == p.prefix) {
                if p.tx.send(frame.to_vec()).is_err() {
                    log::warn!("response arrived after the waiter gave up");
                }
                return;
            }
        }

        if frame[0] != cmd::CTRL {
            log::warn!("unknown notification: {frame:02x?}");
            return;
        }
        let kind = match frame[1] {
            cmd::CMD_STATUS => NotificationKind::Status,
            cmd::CMD_RETRANSMIT => NotificationKind::Retransmit,
            cmd::CMD_FINISHED => NotificationKind::Finished,
            cmd::CMD_HOLD => NotificationKind::Hold,
            cmd::CMD_COOLDOWN => {
                log::debug!("cooldown requested");
                sleep(COOLDOWN_DELAY).await;
                return;
            }
            _ => {
                log::warn!("unknown notification: {frame:02x?}");
                return;
            }
        };

        let notification = Notification {
            kind,
            data: frame.to_vec(),
        };
        if self.notify_tx.send(notification).await.is_err() {
            log::warn!("notification queue closed, dropping frame");
        }
    }
}

/// Packet index carried by a retransmit request (`5A 05 kh kl`). Short
/// frames rewind to the start of the buffer.
pub fn retransmit_index(data: &[u8]) -> u16 {
    if data.len() < 4 {
        return 0;
    }
    u16::from_be_bytes([data[2], data[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmit_index() {
        assert_eq!(retransmit_index(&[0x5A, 0x05, 0x00, 0x04]), 4);
        assert_eq!(retransmit_index(&[0x5A, 0x05, 0x01, 0x00, 0xFF]), 256);
        assert_eq!(retransmit_index(&[0x5A, 0x05]), 0);
    }
}
