use std::sync::Arc;

use crate::core::timestamp::utc_ns_now;

/// Bytes per pixel of the raw frames moved through the ring (packed BGR24).
pub const BYTES_PER_PIXEL: usize = 3;

/// A captured raw image. Pixel data is shared, never mutated after capture.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Arrival order, assigned by the ring on push (0 = not yet ingested).
    pub seq: u64,
    pub utc_ns: u64,
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u8>>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            seq: 0,
            utc_ns: utc_ns_now(),
            width,
            height,
            data: Arc::new(data),
        }
    }

    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height)
    }
}
