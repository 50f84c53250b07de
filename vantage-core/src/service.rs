//! Streaming service.
//!
//! Orchestrates the per-frame pipeline on dedicated OS threads:
//!
//! - **Send loop**: drain key transitions → capture → extract state →
//!   encode → send one [`FramePacket`] → pace.
//! - **Receive loop**: receive [`ActionPacket`]s → replay the key diff.
//!
//! Both loops poll a shared [`StopSignal`]. A fatal socket error in
//! either loop sets it, which brings the other loop down too.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, error, info, warn};

use crate::capture::FrameSource;
use crate::encoder::{EncoderConfig, FrameEncoder};
use crate::error::VantageError;
use crate::extractor::StateExtractor;
use crate::imageops::ImageOps;
use crate::input::InputSink;
use crate::keys::{KeyTransition, PressedKeys};
use crate::minimap::DetectionConfig;
use crate::pacer::{Clock, FpsReport, Pacer};
use crate::protocol::{FramePacket, MAX_FRAME_PACKET_SIZE};
use crate::replay::InputReplayer;
use crate::stop::StopSignal;
use crate::templates::Templates;
use crate::transport::{DatagramTransport, UdpTransport};

// ── StreamConfig ─────────────────────────────────────────────────

/// Configuration for [`StreamService`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Target frames per second (clamped to 1..=120).
    pub fps: u32,
    /// How far before the deadline the coarse sleep stops.
    pub busy_wait_margin: Duration,
    pub encoder: EncoderConfig,
    pub detection: DetectionConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: 24,
            busy_wait_margin: Duration::from_millis(10),
            encoder: EncoderConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

// ── SendLoop ─────────────────────────────────────────────────────

/// Result of one send-loop cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A packet of this many bytes went out.
    Sent(usize),
    /// The frame could not be captured.
    CaptureFailed(VantageError),
    /// The encoder rejected the frame.
    Dropped(VantageError),
    /// The socket refused the datagram but remains usable.
    SendFailed(VantageError),
}

/// Counters kept by the send loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendStats {
    pub cycles: u64,
    pub sent: u64,
    pub dropped: u64,
    pub capture_failures: u64,
    pub send_failures: u64,
}

pub struct SendLoop<F: FrameSource, O: ImageOps, T: DatagramTransport = UdpTransport> {
    source: F,
    ops: O,
    extractor: StateExtractor,
    encoder: FrameEncoder,
    keys: PressedKeys,
    transport: Arc<T>,
    next_frame: u64,
    scratch: BytesMut,
    stats: SendStats,
}

impl<F: FrameSource, O: ImageOps, T: DatagramTransport> SendLoop<F, O, T> {
    pub fn new(
        source: F,
        ops: O,
        extractor: StateExtractor,
        encoder: FrameEncoder,
        keys: PressedKeys,
        transport: Arc<T>,
    ) -> Self {
        Self {
            source,
            ops,
            extractor,
            encoder,
            keys,
            transport,
            next_frame: 0,
            scratch: BytesMut::with_capacity(MAX_FRAME_PACKET_SIZE),
            stats: SendStats::default(),
        }
    }

    pub fn stats(&self) -> SendStats {
        self.stats
    }

    pub fn extractor_mut(&mut self) -> &mut StateExtractor {
        &mut self.extractor
    }

    /// Run one cycle without pacing.
    ///
    /// Only a fatal socket error is returned as `Err`; every other
    /// failure skips this frame.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, VantageError> {
        self.keys.drain();
        let frame_number = self.next_frame;
        self.next_frame += 1;
        self.stats.cycles += 1;

        let raw = match self.source.capture() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("frame {frame_number}: capture failed: {e}");
                self.stats.capture_failures += 1;
                return Ok(CycleOutcome::CaptureFailed(e));
            }
        };

        let gray = self.ops.to_grayscale(&raw);
        let state = self.extractor.extract(&raw, &gray, &self.ops);

        let payload = match self.encoder.encode(&gray, &self.ops) {
            Ok(p) => p,
            Err(e) => {
                warn!("frame {frame_number} dropped: {e}");
                self.stats.dropped += 1;
                return Ok(CycleOutcome::Dropped(e));
            }
        };

        let packet = FramePacket {
            metrics: state.metrics,
            minimap: state.minimap,
            frame_number,
            keys: self.keys.snapshot(),
            payload,
        };

        match self.transport.send_frame(&packet, &mut self.scratch) {
            Ok(n) => {
                self.stats.sent += 1;
                Ok(CycleOutcome::Sent(n))
            }
            Err(e) if e.is_transient() => {
                debug!("frame {frame_number}: send failed: {e}");
                self.stats.send_failures += 1;
                Ok(CycleOutcome::SendFailed(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Cycle at the pacer's rate until `stop` is set.
    pub fn run<C: Clock>(
        mut self,
        mut pacer: Pacer<C>,
        stop: StopSignal,
    ) -> Result<SendStats, VantageError> {
        info!(
            "send loop started: {} fps, {}x{} {} → {}",
            pacer.fps(),
            self.encoder.config().width,
            self.encoder.config().height,
            self.encoder.config().codec,
            self.transport.remote_addr()
        );
        let mut bytes_at_report = self.transport.stats().bytes_sent;

        while !stop.is_stopped() {
            pacer.begin_cycle();
            if let Err(e) = self.run_cycle() {
                error!("send loop: fatal socket error: {e}");
                stop.stop();
                return Err(e);
            }
            if let Some(report) = pacer.end_cycle() {
                let bytes_now = self.transport.stats().bytes_sent;
                log_report(&report, bytes_now - bytes_at_report, &self.stats);
                bytes_at_report = bytes_now;
            }
        }

        info!(
            "send loop stopped after {} cycles ({} sent, {} dropped)",
            self.stats.cycles, self.stats.sent, self.stats.dropped
        );
        Ok(self.stats)
    }
}

fn log_report(report: &FpsReport, bytes: u64, stats: &SendStats) {
    let secs = report.elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        "FPS: {:.1}, {:.1} kB/s (dropped {}, capture failures {})",
        report.fps(),
        bytes as f64 / 1024.0 / secs,
        stats.dropped,
        stats.capture_failures
    );
}

// ── RecvLoop ─────────────────────────────────────────────────────

/// Counters kept by the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecvStats {
    pub packets: u64,
    pub presses: u64,
    pub releases: u64,
}

pub struct RecvLoop<S: InputSink, T: DatagramTransport = UdpTransport> {
    transport: Arc<T>,
    replayer: InputReplayer<S>,
    stats: RecvStats,
}

impl<S: InputSink, T: DatagramTransport> RecvLoop<S, T> {
    pub fn new(transport: Arc<T>, sink: S) -> Self {
        Self {
            transport,
            replayer: InputReplayer::new(sink),
            stats: RecvStats::default(),
        }
    }

    /// Receive and replay until `stop` is set, then release every key
    /// still held.
    pub fn run(mut self, stop: StopSignal) -> Result<RecvStats, VantageError> {
        info!("receive loop started on {:?}", self.transport.local_addr().ok());
        let result = self.pump(&stop);

        let released = self.replayer.release_all();
        if released > 0 {
            info!("released {released} held keys on shutdown");
        }
        result.map(|()| self.stats)
    }

    fn pump(&mut self, stop: &StopSignal) -> Result<(), VantageError> {
        while !stop.is_stopped() {
            match self.transport.recv_action() {
                Ok(Some(packet)) => {
                    let outcome = self.replayer.apply(&packet);
                    self.stats.packets += 1;
                    self.stats.presses += outcome.pressed as u64;
                    self.stats.releases += outcome.released as u64;
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => debug!("receive: {e}"),
                Err(e) => {
                    error!("receive loop: fatal socket error: {e}");
                    stop.stop();
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

// ── StreamService ────────────────────────────────────────────────

/// Owns both loops and runs them to completion.
pub struct StreamService<F, O, S>
where
    F: FrameSource + 'static,
    O: ImageOps + 'static,
    S: InputSink + 'static,
{
    send: SendLoop<F, O>,
    recv: RecvLoop<S>,
    pacer: Pacer,
    stop: StopSignal,
}

impl<F, O, S> StreamService<F, O, S>
where
    F: FrameSource + 'static,
    O: ImageOps + 'static,
    S: InputSink + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: F,
        ops: O,
        sink: S,
        templates: Templates,
        transport: UdpTransport,
        key_events: Receiver<KeyTransition>,
        config: StreamConfig,
        stop: StopSignal,
    ) -> Self {
        let transport = Arc::new(transport);
        let send = SendLoop::new(
            source,
            ops,
            StateExtractor::new(templates, config.detection),
            FrameEncoder::new(config.encoder),
            PressedKeys::new(key_events),
            Arc::clone(&transport),
        );
        let recv = RecvLoop::new(transport, sink);
        Self {
            send,
            recv,
            pacer: Pacer::new(config.fps, config.busy_wait_margin),
            stop,
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run both loops on their own threads until the stop signal is set.
    ///
    /// Returns the first fatal error either loop reported.
    pub fn run(self) -> Result<(SendStats, RecvStats), VantageError> {
        let Self {
            send,
            recv,
            pacer,
            stop,
        } = self;

        let send_stop = stop.clone();
        let send_handle = thread::Builder::new()
            .name("vantage-send".into())
            .spawn(move || send.run(pacer, send_stop))
            .map_err(|e| VantageError::Other(format!("spawn send loop: {e}")))?;

        let recv_stop = stop.clone();
        let recv_handle = match thread::Builder::new()
            .name("vantage-recv".into())
            .spawn(move || recv.run(recv_stop))
        {
            Ok(h) => h,
            Err(e) => {
                stop.stop();
                let _ = send_handle.join();
                return Err(VantageError::Other(format!("spawn receive loop: {e}")));
            }
        };

        let send_result = join(send_handle, "send", &stop);
        let recv_result = join(recv_handle, "receive", &stop);
        Ok((send_result?, recv_result?))
    }
}

fn join<T>(
    handle: thread::JoinHandle<Result<T, VantageError>>,
    name: &str,
    stop: &StopSignal,
) -> Result<T, VantageError> {
    handle.join().unwrap_or_else(|_| {
        stop.stop();
        Err(VantageError::Other(format!("{name} loop panicked")))
    })
}

// ── Tests ────────────────────────────────────────────────────────
