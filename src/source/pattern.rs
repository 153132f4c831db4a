use std::time::{Duration, Instant};

use crate::ring::{BYTES_PER_PIXEL, Frame};
use crate::source::{FrameSource, SourceRead};

/// Synthetic moving gradient, for running the node without a camera.
pub struct PatternSource {
    width: u32,
    height: u32,
    interval: Option<Duration>,
    limit: Option<u64>,
    produced: u64,
    next_due: Option<Instant>,
}

impl PatternSource {
    /// Unpaced: frames are produced as fast as they are requested.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            interval: None,
            limit: None,
            produced: 0,
            next_due: None,
        }
    }

    /// Paced to `fps`, like a real camera.
    pub fn paced(width: u32, height: u32, fps: u32) -> Self {
        let mut s = Self::new(width, height);
        s.interval = Some(Duration::from_secs(1) / fps.max(1));
        s
    }

    /// Ends the stream after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    fn render(&self, n: u64) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut data = vec![0u8; w * h * BYTES_PER_PIXEL];
        let shift = n as usize;
        for y in 0..h {
            for x in 0..w {
                let px = (y * w + x) * BYTES_PER_PIXEL;
                data[px] = ((x + shift) % 256) as u8;
                data[px + 1] = ((y + shift / 2) % 256) as u8;
                data[px + 2] = (shift % 256) as u8;
            }
        }
        data
    }

    fn pace(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + interval);
    }
}

impl FrameSource for PatternSource {
    fn next_frame(&mut self) -> anyhow::Result<SourceRead> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(SourceRead::EndOfStream);
        }

        self.pace();
        let data = self.render(self.produced);
        self.produced += 1;
        Ok(SourceRead::Frame(Frame::new(self.width, self.height, data)))
    }

    fn describe(&self) -> String {
        format!("pattern:{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_well_formed_frames_until_limit() {
        let mut src = PatternSource::new(8, 4).with_limit(3);
        let mut count = 0;
        loop {
            match src.next_frame().unwrap() {
                SourceRead::Frame(f) => {
                    assert!(f.is_well_formed());
                    assert_eq!((f.width, f.height), (8, 4));
                    count += 1;
                }
                SourceRead::EndOfStream => break,
            }
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut src = PatternSource::new(4, 4);
        let SourceRead::Frame(a) = src.next_frame().unwrap() else {
            panic!("expected frame");
        };
        let SourceRead::Frame(b) = src.next_frame().unwrap() else {
            panic!("expected frame");
        };
        assert_ne!(a.data, b.data);
    }
}
