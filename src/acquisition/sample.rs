use crate::constants::{I16_FULL_SCALE, U16_MID_SCALE};

/// A native acquisition sample that can be normalized to [-1, 1]
pub trait RawSample: Copy + Default + Send + 'static {
    fn to_unit(self) -> f32;
}

/// Unsigned 16-bit converter code, mid-scale is silence
impl RawSample for u16 {
    fn to_unit(self) -> f32 {
        (self as f32 - U16_MID_SCALE) / U16_MID_SCALE
    }
}

impl RawSample for i16 {
    fn to_unit(self) -> f32 {
        self as f32 / I16_FULL_SCALE
    }
}

impl RawSample for f32 {
    fn to_unit(self) -> f32 {
        if self.is_finite() {
            self.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}
