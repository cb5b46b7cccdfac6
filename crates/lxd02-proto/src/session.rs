//! Print session state machine.
//!
//! One session drives one job from Idle to Completed or Failed. All state
//! mutation happens on the dispatch loop; the handshake, the begin and
//! end-of-transmission commands and the packet streamer run as spawned
//! tasks that report back through the event channel, so the state mutex is
//! never held across a network wait.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cmd;
use crate::error::{Error, Result};
use crate::link::{Link, LinkLayer, RESPONSE_TIMEOUT};

/// Default interval between packet writes.
pub const DEFAULT_PRINT_INTERVAL: Duration = Duration::from_millis(7);
/// Largest accepted configured print interval.
pub(crate) const MAX_PRINT_INTERVAL: Duration = Duration::from_secs(10);

/// Capacity of the session event queue.
const EVENT_QUEUE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Idle,
    Initializing,
    Ready,
    Printing,
    Paused,
    WaitingRetry,
    Completed,
    Failed,
}

#[derive(Debug)]
pub(crate) enum Event {
    /// Kick off the initialisation handshake.
    Start,
    /// All four handshake steps acknowledged.
    InitComplete,
    /// Begin-job command acknowledged.
    BeginAck,
    /// Device asked to pause the stream.
    Hold,
    /// Device asked to resend from the given packet index.
    Retransmit(u16),
    /// All packets written (from the streamer) or print done (from the
    /// device).
    Finished,
    /// End-of-transmission command acknowledged.
    Committed,
    /// Caller gave up on the job.
    Cancel,
    Error(Error),
}

/// Cancel handle and join handle for the in-flight streamer.
struct Streamer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct Session<L: Link> {
    link: Arc<LinkLayer<L>>,
    packets: Arc<Vec<Vec<u8>>>,
    state: Mutex<SessionState>,
    events_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    energy: u8,
    interval: Duration,
}

impl<L: Link> Session<L> {
    pub(crate) fn new(
        link: Arc<LinkLayer<L>>,
        packets: Arc<Vec<Vec<u8>>>,
        cancel: CancellationToken,
        energy: u8,
        interval: Duration,
    ) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let session = Arc::new(Self {
            link,
            packets,
            state: Mutex::new(SessionState::Idle),
            events_tx,
            cancel,
            energy,
            interval,
        });
        (session, events_rx)
    }

    pub(crate) fn events_sender(&self) -> mpsc::Sender<Event> {
        self.events_tx.clone()
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap();
        log::debug!("state {:?} -> {next:?}", *state);
        *state = next;
    }

    /// Dispatch loop. Consumes events until the job reaches a terminal
    /// state, then reports the outcome on `done` exactly once.
    pub(crate) async fn run(
        self: Arc<Self>,
        mut events_rx: mpsc::Receiver<Event>,
        done: oneshot::Sender<Result<()>>,
    ) {
        let mut streamer: Option<Streamer> = None;
        let mut committing = false;
        let mut done = Some(done);

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => Event::Cancel,
                event = events_rx.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };

            // Cancellation and errors override any non-terminal state.
            if matches!(event, Event::Cancel | Event::Error(_)) {
                Self::stop_streamer(&mut streamer).await;
                let cause = match event {
                    Event::Error(err) => err,
                    _ => Error::Cancelled,
                };
                log::error!("print job failed: {cause}");
                self.set_state(SessionState::Failed);
                if let Some(done) = done.take() {
                    let _ = done.send(Err(cause));
                }
                return;
            }

            let state = self.state();
            log::debug!("state {state:?}, event {event:?}");

            match (state, event) {
                (SessionState::Idle, Event::Start) => {
                    log::info!("starting printer initialisation");
                    self.set_state(SessionState::Initializing);
                    let session = Arc::clone(&self);
                    tokio::spawn(async move { session.send_init_sequence().await });
                }

                (SessionState::Initializing, Event::InitComplete) => {
                    self.set_state(SessionState::Ready);
                    let session = Arc::clone(&self);
                    tokio::spawn(async move { session.send_begin().await });
                }

                (SessionState::Ready, Event::BeginAck) => {
                    self.set_state(SessionState::Printing);
                    self.restart_streamer(&mut streamer, 0).await;
                }

                (SessionState::Printing, Event::Hold) => {
                    log::warn!("hold signal received, pausing print job");
                    Self::stop_streamer(&mut streamer).await;
                    self.set_state(SessionState::Paused);
                }

                (SessionState::Printing, Event::Retransmit(k)) => {
                    log::warn!("retransmit request from packet {k}");
                    self.restart_streamer(&mut streamer, k as usize).await;
                }

                (SessionState::Printing, Event::Finished) => {
                    log::info!("all data sent, waiting for the printer to complete");
                    Self::stop_streamer(&mut streamer).await;
                    self.set_state(SessionState::WaitingRetry);
                }

                (SessionState::WaitingRetry, Event::Finished) => {
                    if committing {
                        log::debug!("already committing, ignoring repeated finish");
                    } else {
                        committing = true;
                        let session = Arc::clone(&self);
                        tokio::spawn(async move { session.send_commit().await });
                    }
                }

                (SessionState::WaitingRetry, Event::Committed) => {
                    log::info!("printer reports print complete");
                    self.set_state(SessionState::Completed);
                    if let Some(done) = done.take() {
                        let _ = done.send(Ok(()));
                    }
                    return;
                }

                (SessionState::WaitingRetry, Event::Retransmit(k)) => {
                    log::warn!("retransmit request from packet {k} after stream end");
                    self.set_state(SessionState::Printing);
                    self.restart_streamer(&mut streamer, k as usize).await;
                }

                // Printer is still chewing on the buffer.
                (SessionState::WaitingRetry, Event::Hold) => {}

                (SessionState::Paused, Event::Retransmit(k)) => {
                    log::info!("resuming print from packet {k}");
                    self.set_state(SessionState::Printing);
                    self.restart_streamer(&mut streamer, k as usize).await;
                }

                (state, event) => {
                    log::warn!("ignoring event {event:?} in state {state:?}");
                }
            }
        }
    }

    /// Run the four-step initialisation handshake, each step awaited on its
    /// own prefix.
    async fn send_init_sequence(self: Arc<Self>) {
        let identify = cmd::identify();
        let token_a = cmd::vendor_token_a();
        let token_b = cmd::vendor_token_b();
        let energy = cmd::set_energy(self.energy);
        let steps: [&[u8]; 4] = [&identify, &token_a, &token_b, &energy];

        for step in steps {
            let prefix = [step[0], step[1]];
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.link.send_and_wait(step, prefix, RESPONSE_TIMEOUT) => result,
            };
            match result {
                Ok(resp) => log::debug!("init ack {prefix:02x?}: {resp:02x?}"),
                Err(err) => {
                    log::error!("init step {prefix:02x?} failed: {err}");
                    let _ = self.events_tx.send(Event::Error(err)).await;
                    return;
                }
            }
        }
        let _ = self.events_tx.send(Event::InitComplete).await;
    }

    async fn send_begin(self: Arc<Self>) {
        let frame = cmd::begin_job(self.packets.len() as u16);
        self.send_job_command(&frame, Event::BeginAck).await;
    }

    async fn send_commit(self: Arc<Self>) {
        let frame = cmd::end_job(self.packets.len() as u16);
        self.send_job_command(&frame, Event::Committed).await;
    }

    async fn send_job_command(&self, frame: &[u8], ack: Event) {
        let prefix = [frame[0], frame[1]];
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = self.link.send_and_wait(frame, prefix, RESPONSE_TIMEOUT) => result,
        };
        match result {
            Ok(resp) => {
                log::debug!("job command ack: {resp:02x?}");
                let _ = self.events_tx.send(ack).await;
            }
            Err(err) => {
                log::error!("job command {frame:02x?} failed: {err}");
                let _ = self.events_tx.send(Event::Error(err)).await;
            }
        }
    }

    /// Stop the current streamer, if any, and wait for it to exit so no
    /// packet leaks onto the wire after a rewind.
    async fn stop_streamer(streamer: &mut Option<Streamer>) {
        if let Some(s) = streamer.take() {
            s.cancel.cancel();
            if let Err(err) = s.handle.await {
                log::warn!("streamer task failed: {err}");
            }
        }
    }

    /// Stop the current streamer and start a new one at `start`.
    async fn restart_streamer(self: &Arc<Self>, streamer: &mut Option<Streamer>, start: usize) {
        Self::stop_streamer(streamer).await;
        if start >= self.packets.len() {
            log::error!(
                "stream start {start} out of range ({} packets)",
                self.packets.len()
            );
            // try_send: this runs on the dispatch loop itself, which must
            // not block on its own queue.
            let _ = self.events_tx.try_send(Event::Error(Error::Protocol(format!(
                "retransmit index {start} out of range"
            ))));
            return;
        }
        *streamer = Some(self.start_streamer(start));
    }

    /// Spawn the streamer: one packet per tick, cancellable between writes.
    fn start_streamer(self: &Arc<Self>, start: usize) -> Streamer {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let session = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(session.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            for i in start..session.packets.len() {
                tokio::select! {
                    _ = token.cancelled() => {
                        log::debug!("streamer cancelled at packet {i}");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = session.link.send(&session.packets[i]).await {
                            log::error!("failed to send packet {i}: {err}");
                            let _ = session.events_tx.send(Event::Error(err)).await;
                            return;
                        }
                    }
                }
            }

            log::info!("all packets sent, waiting for printer confirmation");
            let _ = session.events_tx.send(Event::Finished).await;
        });

        Streamer { cancel, handle }
    }
}
