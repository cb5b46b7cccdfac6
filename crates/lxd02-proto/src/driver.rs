//! High-level LX-D02 driver: options, job orchestration, and the
//! notification worker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use image::{DynamicImage, GrayImage};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lxd02_bitmap::{Dither, PipelineOptions, DEFAULT_GAMMA};

use crate::error::{Error, Result};
use crate::link::{self, Link, LinkLayer, Notification, NotificationKind, NullLink};
use crate::patterns;
use crate::raster::Raster;
use crate::session::{Event, Session, DEFAULT_PRINT_INTERVAL, MAX_PRINT_INTERVAL};
use crate::status::{self, BATTERY_CRITICAL};

/// Highest thermal head drive level.
const MAX_ENERGY: u8 = 6;

/// Dry run output files.
const PREVIEW_RASTERISED: &str = "preview_rasterised.png";
const PREVIEW_PATTERN: &str = "preview_pattern_image.png";

/// Driver configuration, immutable for the lifetime of the driver.
#[derive(Debug, Clone)]
pub struct Lxd02Options {
    energy: u8,
    print_interval: Duration,
    dither: Dither,
    gamma: f64,
    crop: bool,
    auto_dither: bool,
    dry_run: bool,
}

impl Default for Lxd02Options {
    fn default() -> Self {
        Self {
            energy: 2,
            print_interval: DEFAULT_PRINT_INTERVAL,
            dither: Dither::FloydSteinberg,
            gamma: DEFAULT_GAMMA,
            crop: false,
            auto_dither: false,
            dry_run: false,
        }
    }
}

impl Lxd02Options {
    /// Thermal head drive level, saturated at 6. Higher is darker.
    pub fn with_energy(mut self, energy: u8) -> Self {
        self.energy = energy.min(MAX_ENERGY);
        self
    }

    /// Interval between packet writes. Values outside (0, 10 s] fall back
    /// to the 7 ms default.
    pub fn with_print_interval(mut self, interval: Duration) -> Self {
        self.print_interval = if interval.is_zero() || interval > MAX_PRINT_INTERVAL {
            DEFAULT_PRINT_INTERVAL
        } else {
            interval
        };
        self
    }

    pub fn with_dither(mut self, dither: Dither) -> Self {
        self.dither = dither;
        self
    }

    /// Gamma correction override; non-positive values keep the dither's
    /// default.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        if gamma > 0.0 {
            self.gamma = gamma;
        }
        self
    }

    /// Crop wider-than-paper images instead of scaling them down.
    pub fn with_crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    /// Skip dithering when the input classifies as a document.
    pub fn with_auto_dither(mut self, auto_dither: bool) -> Self {
        self.auto_dither = auto_dither;
        self
    }

    /// Render previews to disk instead of printing.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

type EventSink = Arc<Mutex<Option<mpsc::Sender<Event>>>>;

/// An LX-D02 printer reachable over `L`.
///
/// Not safe for concurrent print calls; one job runs at a time.
pub struct Lxd02<L: Link> {
    link: Arc<LinkLayer<L>>,
    raster: Raster,
    options: Lxd02Options,
    event_sink: EventSink,
    pump: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl Lxd02<NullLink> {
    /// Driver without a transport, for dry runs.
    pub async fn offline(options: Lxd02Options) -> Result<Self> {
        Self::new(NullLink, options).await
    }
}

impl<L: Link> Lxd02<L> {
    /// Wrap a connected transport. Subscribes to device notifications and
    /// starts the classifier worker.
    pub async fn new(link: L, options: Lxd02Options) -> Result<Self> {
        let (layer, notify_rx) = LinkLayer::new(link);
        let layer = Arc::new(layer);
        let stream = layer.link().subscribe().await?;
        let pump = tokio::spawn(pump_notifications(Arc::clone(&layer), stream));

        let event_sink: EventSink = Arc::new(Mutex::new(None));
        let worker = tokio::spawn(notification_worker(notify_rx, Arc::clone(&event_sink)));

        Ok(Self {
            link: layer,
            raster: Raster::default(),
            options,
            event_sink,
            pump,
            worker,
        })
    }

    /// Maximum width of the print output in pixels.
    pub fn width(&self) -> u32 {
        self.raster.line_width()
    }

    /// Print an image. The image is fitted to the print width and reduced
    /// to two colours first. In dry run mode this stops after writing the
    /// preview file.
    pub async fn print_image(&self, cancel: CancellationToken, img: &DynamicImage) -> Result<()> {
        if img.width() == 0 || img.height() == 0 {
            return Err(Error::InvalidParam("empty image".into()));
        }
        let pipeline = PipelineOptions {
            dither: self.options.dither,
            gamma: self.options.gamma,
            crop: self.options.crop,
            auto_dither: self.options.auto_dither,
        };
        let bitmap = lxd02_bitmap::resize_and_dither(img, self.raster.line_width(), &pipeline);

        if self.options.dry_run {
            return save_preview(&bitmap, PREVIEW_RASTERISED);
        }

        let packets = self.raster.serialise(&bitmap)?;
        self.print_packets(cancel, packets).await
    }

    /// Print raw line-pair data (96 bytes per packet) without any image
    /// processing.
    pub async fn print_raw(&self, cancel: CancellationToken, data: &[Vec<u8>]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidParam("empty raw data".into()));
        }
        let packets = self.raster.enumerate(data)?;
        log::debug!("enumerated {} packets", packets.len());
        self.print_packets(cancel, packets).await
    }

    /// Print a built-in test pattern by name.
    pub async fn print_pattern(&self, cancel: CancellationToken, name: &str) -> Result<()> {
        if let Some(pattern) = patterns::image_pattern(name) {
            let img = pattern(self.raster.line_width());
            if self.options.dry_run {
                save_preview(&img, PREVIEW_PATTERN)?;
            }
            return self.print_image(cancel, &DynamicImage::ImageLuma8(img)).await;
        }
        if let Some(pattern) = patterns::buffer_pattern(name) {
            if self.options.dry_run {
                return Err(Error::InvalidParam(
                    "buffer patterns do not support dry run".into(),
                ));
            }
            let data = pattern(self.raster.line_width());
            return self.print_raw(cancel, &data).await;
        }
        Err(Error::InvalidParam(format!("unknown test pattern: {name}")))
    }

    /// Run one print session over a prepared packet buffer.
    async fn print_packets(&self, cancel: CancellationToken, packets: Vec<Vec<u8>>) -> Result<()> {
        if packets.is_empty() {
            return Err(Error::InvalidParam("empty packet buffer".into()));
        }
        if packets.len() > u16::MAX as usize {
            return Err(Error::InvalidParam(format!(
                "packet count {} does not fit in 16 bits",
                packets.len()
            )));
        }

        let (session, events_rx) = Session::new(
            Arc::clone(&self.link),
            Arc::new(packets),
            cancel,
            self.options.energy,
            self.options.print_interval,
        );
        let (done_tx, done_rx) = oneshot::channel();

        *self.event_sink.lock().unwrap() = Some(session.events_sender());
        let events_tx = session.events_sender();
        let runner = tokio::spawn(Arc::clone(&session).run(events_rx, done_tx));

        let _ = events_tx.send(Event::Start).await;

        let result = match done_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Cancelled),
        };
        self.event_sink.lock().unwrap().take();
        if let Err(err) = runner.await {
            log::warn!("session task failed: {err}");
        }

        if result.is_ok() {
            log::info!("print completed successfully");
        }
        result
    }

    /// Tear down the transport.
    pub async fn disconnect(&self) -> Result<()> {
        self.link.link().disconnect().await
    }
}

impl<L: Link> Drop for Lxd02<L> {
    fn drop(&mut self) {
        self.pump.abort();
        self.worker.abort();
    }
}

/// Forward transport notifications into the link layer classifier.
async fn pump_notifications<L: Link>(
    link: Arc<LinkLayer<L>>,
    mut stream: BoxStream<'static, Vec<u8>>,
) {
    while let Some(frame) = stream.next().await {
        link.ingest(&frame).await;
    }
    log::debug!("notification stream closed");
}

/// Translate classified notifications into session events for whichever
/// job is active.
async fn notification_worker(mut notify_rx: mpsc::Receiver<Notification>, sink: EventSink) {
    while let Some(notification) = notify_rx.recv().await {
        log::debug!(
            "received notification {:?}: {:02x?}",
            notification.kind,
            notification.data
        );
        let event = match notification.kind {
            NotificationKind::Status => match status::parse_status(&notification.data) {
                Ok(st) => {
                    log::info!("printer status: {st}");
                    if st.battery_level < BATTERY_CRITICAL {
                        log::warn!("battery level critical: {}%", st.battery_level);
                    }
                    if st.no_paper {
                        log::error!("no paper");
                        Some(Event::Error(Error::Device("no paper".into())))
                    } else {
                        None
                    }
                }
                Err(err) => {
                    log::error!("failed to parse status: {err}");
                    None
                }
            },
            NotificationKind::Hold => Some(Event::Hold),
            NotificationKind::Retransmit => Some(Event::Retransmit(link::retransmit_index(
                &notification.data,
            ))),
            NotificationKind::Finished => Some(Event::Finished),
        };

        if let Some(event) = event {
            let tx = sink.lock().unwrap().clone();
            match tx {
                Some(tx) => {
                    if tx.send(event).await.is_err() {
                        log::debug!("session gone, dropping event");
                    }
                }
                None => log::debug!("no active print job, dropping event"),
            }
        }
    }
}

fn save_preview(img: &GrayImage, path: &str) -> Result<()> {
    img.save(path)?;
    log::info!("preview saved to {path}");
    Ok(())
}
