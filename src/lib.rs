pub mod acquisition;
pub mod audio;
pub mod config;
pub mod constants;
pub mod dsp;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod tracking;
pub mod wav;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use acquisition::{DoubleBuffer, Frame, FrameConsumer, FrameProducer, RawSample};
pub use config::DoaConfig;
pub use dsp::{EstimationResult, GccPhatEstimator};
pub use error::{DoaError, Result};
pub use pipeline::{FrameOutcome, Orchestrator, PipelineState};
pub use tracking::{ActuatorCommand, ActuatorSink, BearingTracker};
pub use wav::{WavEncoding, save_wav};
