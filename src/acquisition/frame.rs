use super::RawSample;
use crate::error::{DoaError, Result};

/// One acquisition frame: N normalized samples per microphone
///
/// Frames are meant to be allocated once and refilled in place every
/// acquisition cycle.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Microphone 1 samples in [-1, 1]
    pub ch1: Vec<f32>,
    /// Microphone 2 samples in [-1, 1]
    pub ch2: Vec<f32>,
}

impl Frame {
    /// Allocate a silent frame of `frame_len` samples per channel
    pub fn new(frame_len: usize) -> Self {
        Self {
            ch1: vec![0.0; frame_len],
            ch2: vec![0.0; frame_len],
        }
    }

    /// Build a frame from two already separated channels
    pub fn from_channels(ch1: Vec<f32>, ch2: Vec<f32>) -> Result<Self> {
        if ch1.is_empty() {
            return Err(DoaError::InvalidArgument("empty channel".into()));
        }
        if ch1.len() != ch2.len() {
            return Err(DoaError::LengthMismatch {
                expected: ch1.len(),
                actual: ch2.len(),
            });
        }
        Ok(Self { ch1, ch2 })
    }

    /// Build a frame from an interleaved `[a, b, a, b, ...]` block
    pub fn from_interleaved<S: RawSample>(interleaved: &[S], swapped: bool) -> Result<Self> {
        let mut frame = Self::new(interleaved.len() / 2);
        frame.fill_from_interleaved(interleaved, swapped)?;
        Ok(frame)
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.ch1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ch1.is_empty()
    }

    /// De-interleave and normalize a raw block into this frame
    ///
    /// The block must hold exactly two samples per frame position. With
    /// `swapped` the second slot of each pair is treated as microphone 1.
    pub fn fill_from_interleaved<S: RawSample>(
        &mut self,
        interleaved: &[S],
        swapped: bool,
    ) -> Result<()> {
        if self.is_empty() {
            return Err(DoaError::InvalidArgument("empty frame".into()));
        }
        if interleaved.len() != self.len() * 2 {
            return Err(DoaError::LengthMismatch {
                expected: self.len() * 2,
                actual: interleaved.len(),
            });
        }

        let (first, second) = if swapped {
            (&mut self.ch2, &mut self.ch1)
        } else {
            (&mut self.ch1, &mut self.ch2)
        };
        for ((pair, a), b) in interleaved
            .chunks_exact(2)
            .zip(first.iter_mut())
            .zip(second.iter_mut())
        {
            *a = pair[0].to_unit();
            *b = pair[1].to_unit();
        }
        Ok(())
    }
}
