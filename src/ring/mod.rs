// src/ring/mod.rs
pub mod frame;
pub mod frame_ring;

pub use frame::{BYTES_PER_PIXEL, Frame};
pub use frame_ring::{FrameRing, RingStats, Snapshot};
