//! Command-line front-end for the LX-D02 printer driver.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use lxd02_bitmap::Dither;
use lxd02_ble::SearchParameters;
use lxd02_proto::link::Link;
use lxd02_proto::{patterns, Error, Lxd02, Lxd02Options, Result};

#[derive(Parser)]
#[command(name = "lxd02", about = "LX-D02 bluetooth thermal printer tool")]
struct Cli {
    /// Printer name advertised over BLE
    #[arg(short = 'p', long, default_value = "LX-D02")]
    name: String,

    /// Printer MAC address (overrides name matching)
    #[arg(long)]
    mac: Option<String>,

    /// Thermal energy level (0-6), higher is darker
    #[arg(short, long, default_value_t = 2)]
    energy: u8,

    /// Delay between packet writes, in milliseconds
    #[arg(short = 'd', long, default_value_t = 7)]
    interval: u64,

    /// Dithering algorithm
    #[arg(long, default_value = "floyd-steinberg")]
    dither: String,

    /// Gamma correction for dithering, 0 selects the algorithm default
    #[arg(long, default_value_t = 0.0)]
    gamma: f64,

    /// Crop wide images to the printer width instead of resizing
    #[arg(long)]
    crop: bool,

    /// Skip dithering when the image looks like a document
    #[arg(long)]
    auto_dither: bool,

    /// Write preview images instead of printing
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print an image file (PNG or JPEG)
    Print {
        /// Image file to print
        image: PathBuf,
    },
    /// Print a built-in test pattern
    Pattern {
        /// Pattern name, see list-patterns
        name: String,
    },
    /// List built-in test patterns
    ListPatterns,
    /// List dithering algorithms
    ListDithers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder.try_init();

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::ListPatterns => {
            for name in patterns::all_patterns() {
                println!("{name}");
            }
            return Ok(());
        }
        Command::ListDithers => {
            for name in Dither::all_names() {
                println!("{name}");
            }
            return Ok(());
        }
        _ => {}
    }

    let dither = Dither::by_name(&cli.dither)
        .ok_or_else(|| Error::InvalidParam(format!("unknown dither function: {}", cli.dither)))?;

    let options = Lxd02Options::default()
        .with_energy(cli.energy)
        .with_print_interval(Duration::from_millis(cli.interval))
        .with_dither(dither)
        .with_gamma(cli.gamma)
        .with_crop(cli.crop)
        .with_auto_dither(cli.auto_dither)
        .with_dry_run(cli.dry_run);

    if cli.dry_run {
        let printer = Lxd02::offline(options).await?;
        return dispatch(&cli, &printer, CancellationToken::new()).await;
    }

    let search = SearchParameters {
        name: Some(cli.name.clone()),
        address: cli.mac.clone(),
    };
    eprintln!("Connecting to printer...");
    let link = lxd02_ble::connect(&search).await?;
    let printer = Lxd02::new(link, options).await?;

    let cancel = CancellationToken::new();
    let interrupted = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted, cancelling print job");
            interrupted.cancel();
        }
    });

    let result = dispatch(&cli, &printer, cancel).await;
    if let Err(err) = printer.disconnect().await {
        log::warn!("failed to disconnect: {err}");
    }
    result
}

async fn dispatch<L: Link>(cli: &Cli, printer: &Lxd02<L>, cancel: CancellationToken) -> Result<()> {
    match &cli.command {
        Command::Print { image } => {
            let img = image::open(image)?;
            printer.print_image(cancel, &img).await
        }
        Command::Pattern { name } => printer.print_pattern(cancel, name).await,
        Command::ListPatterns | Command::ListDithers => Ok(()),
    }
}
