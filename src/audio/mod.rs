//! Host-side raw frame sources: live capture and WAV replay

pub mod capture;
pub mod source;

pub use capture::{AudioCapture, list_input_devices};
pub use source::{AudioSource, WavFileSource};
