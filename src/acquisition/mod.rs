//! Dual-channel frame acquisition
//!
//! Raw interleaved samples arrive from a converter, audio callback or file
//! and are handed to the pipeline one settled frame at a time through a
//! [`DoubleBuffer`].

pub mod double_buffer;
pub mod frame;
pub mod sample;

pub use double_buffer::{DoubleBuffer, FrameConsumer, FrameProducer};
pub use frame::Frame;
pub use sample::RawSample;
