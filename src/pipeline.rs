//! Per-frame orchestration: frame hand-off, estimation, tracking, actuation
//! and periodic diagnostics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::acquisition::{Frame, FrameConsumer, RawSample};
use crate::config::{DiagnosticsConfig, DoaConfig};
use crate::dsp::{EstimationResult, GccPhatEstimator};
use crate::error::{DoaError, Result};
use crate::output::DiagnosticRecord;
use crate::tracking::{ActuatorCommand, ActuatorMapping, ActuatorSink, BearingTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    FrameReady,
    Processing,
    Done,
}

/// Result of one pipeline pass
#[derive(Debug, Clone, Copy)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub estimate: EstimationResult,
    pub smoothed_angle_deg: f32,
    /// Command in effect after this frame (held when the estimate is invalid)
    pub command: ActuatorCommand,
    /// Whether a new command was issued for this frame
    pub issued: bool,
    pub elapsed: Duration,
}

/// Non-blocking diagnostic tap: every `period` frames one record is offered
/// to a bounded channel; a full channel drops the record.
pub struct DiagnosticsEmitter {
    period: u64,
    sender: Option<Sender<DiagnosticRecord>>,
    dropped: u64,
}

impl DiagnosticsEmitter {
    pub fn channel(config: &DiagnosticsConfig) -> (Self, Receiver<DiagnosticRecord>) {
        let (tx, rx) = bounded(config.channel_capacity.max(1));
        let emitter = Self {
            period: config.period_frames.max(1) as u64,
            sender: Some(tx),
            dropped: 0,
        };
        (emitter, rx)
    }

    pub fn disabled() -> Self {
        Self {
            period: 1,
            sender: None,
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn offer(&mut self, record: DiagnosticRecord) {
        if (record.frame_index + 1) % self.period != 0 {
            return;
        }
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::debug!("Diagnostic channel full, dropped frame {}", record.frame_index);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::info!("Diagnostic receiver gone, disabling diagnostics");
                self.sender = None;
            }
        }
    }
}

/// Drives the estimator, tracker and actuator once per settled frame.
///
/// The orchestrator owns all per-frame state; the only state that survives
/// between frames is the tracker's smoothed bearing and the command in
/// effect.
pub struct Orchestrator<S: RawSample, A: ActuatorSink> {
    consumer: FrameConsumer<S>,
    estimator: GccPhatEstimator,
    tracker: BearingTracker,
    mapping: ActuatorMapping,
    actuator: A,
    diagnostics: DiagnosticsEmitter,
    frame: Frame,
    command: ActuatorCommand,
    state: PipelineState,
    deadline: Duration,
    frames_processed: u64,
    deadline_misses: u64,
}

impl<S: RawSample, A: ActuatorSink> Orchestrator<S, A> {
    /// Build the pipeline and center the actuator
    pub fn new(
        config: &DoaConfig,
        consumer: FrameConsumer<S>,
        mut actuator: A,
        diagnostics: DiagnosticsEmitter,
    ) -> Result<Self> {
        let estimator = GccPhatEstimator::from_config(config)?;
        if consumer.frame_len() != estimator.frame_len() {
            return Err(DoaError::LengthMismatch {
                expected: estimator.frame_len(),
                actual: consumer.frame_len(),
            });
        }

        let tracker = BearingTracker::from_config(&config.tracker);
        let mapping = ActuatorMapping::new(&config.tracker, &config.actuator);
        let command = mapping.command(tracker.smoothed_angle());
        actuator.issue(command)?;
        log::info!(
            "Actuator centered at {}° ({} us)",
            command.angle_step(),
            command.pulse_us()
        );

        Ok(Self {
            consumer,
            frame: Frame::new(estimator.frame_len()),
            estimator,
            tracker,
            mapping,
            actuator,
            diagnostics,
            command,
            state: PipelineState::Idle,
            deadline: config.acquisition.buffer_period(),
            frames_processed: 0,
            deadline_misses: 0,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn smoothed_angle(&self) -> f32 {
        self.tracker.smoothed_angle()
    }

    pub fn command(&self) -> ActuatorCommand {
        self.command
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn deadline_misses(&self) -> u64 {
        self.deadline_misses
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn diagnostics(&self) -> &DiagnosticsEmitter {
        &self.diagnostics
    }

    /// Process the settled frame if there is one
    ///
    /// Returns `Ok(None)` when idle.
    pub fn poll(&mut self) -> Result<Option<FrameOutcome>> {
        self.state = PipelineState::Idle;
        if !self.consumer.is_ready() {
            return Ok(None);
        }

        self.state = PipelineState::FrameReady;
        let mut frame = std::mem::take(&mut self.frame);
        let taken = self.consumer.take_frame(&mut frame);
        let outcome = match taken {
            Ok(true) => self.process_frame(&frame).map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };
        self.frame = frame;

        if !matches!(outcome, Ok(Some(_))) {
            self.state = PipelineState::Idle;
        }
        outcome
    }

    /// Run one full pass on an already acquired frame
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameOutcome> {
        self.state = PipelineState::Processing;
        let start = Instant::now();

        let estimate = match self.estimator.estimate(frame) {
            Ok(estimate) => estimate,
            Err(e) => {
                self.state = PipelineState::Idle;
                return Err(e);
            }
        };

        // The tracker only moves once the sink has accepted the command
        let issued = match self.tracker.peek(&estimate) {
            Some(candidate) => {
                let command = self.mapping.command(candidate);
                if let Err(e) = self.actuator.issue(command) {
                    self.state = PipelineState::Idle;
                    return Err(e);
                }
                self.tracker.update(&estimate);
                self.command = command;
                true
            }
            None => false,
        };

        let elapsed = start.elapsed();
        if elapsed > self.deadline {
            self.deadline_misses += 1;
            log::warn!(
                "Frame {} took {:.2} ms, over the {:.2} ms buffer period",
                self.frames_processed,
                elapsed.as_secs_f64() * 1e3,
                self.deadline.as_secs_f64() * 1e3
            );
        }

        let frame_index = self.frames_processed;
        self.frames_processed += 1;
        self.state = PipelineState::Done;

        self.diagnostics.offer(DiagnosticRecord::new(
            frame_index,
            &estimate,
            self.tracker.smoothed_angle(),
        ));

        Ok(FrameOutcome {
            frame_index,
            estimate,
            smoothed_angle_deg: self.tracker.smoothed_angle(),
            command: self.command,
            issued,
            elapsed,
        })
    }

    /// Poll until `running` is cleared, sleeping `idle` between empty polls
    ///
    /// Returns the number of frames processed by this call.
    pub fn run(&mut self, running: &AtomicBool, idle: Duration) -> Result<u64> {
        let start = self.frames_processed;
        while running.load(Ordering::Relaxed) {
            if self.poll()?.is_none() {
                std::thread::sleep(idle);
            }
        }
        Ok(self.frames_processed - start)
    }
}
