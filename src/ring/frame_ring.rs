use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::lock::lock_mutex;
use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::timestamp::utc_ns_now;
use crate::ring::Frame;

struct Inner {
    cap: usize,
    frames: VecDeque<Frame>,
    head_seq: u64,
    evicted: u64,
}

/// Rolling window over the last `cap` frames.
///
/// All state sits behind one mutex: `push` and `snapshot` each take it once,
/// so a snapshot never observes a half-applied push. Frames are `Arc`-backed,
/// which keeps the snapshot copy down to reference bumps.
#[derive(Clone)]
pub struct FrameRing {
    inner: Arc<Mutex<Inner>>,
}

/// Point-in-time copy of the ring, oldest frame first.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    frames: Vec<Frame>,
    taken_utc_ns: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingStats {
    pub capacity: usize,
    pub len: usize,
    pub head_seq: u64,
    pub evicted: u64,
}

impl FrameRing {
    pub fn new(cap: usize) -> Self {
        let inner = Inner {
            cap,
            frames: VecDeque::with_capacity(cap),
            head_seq: 0,
            evicted: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Capacity derived from frame rate and window length.
    pub fn with_window(fps: u32, window_seconds: u32) -> Self {
        Self::new(fps as usize * window_seconds as usize)
    }

    /// Appends a frame, evicting the oldest one when full.
    /// Returns the assigned sequence number, `None` for a zero-capacity ring.
    pub fn push(&self, mut frame: Frame) -> Option<u64> {
        let mut g = lock_mutex(&self.inner, "ring.push");
        if g.cap == 0 {
            return None;
        }

        if g.frames.len() == g.cap {
            g.frames.pop_front();
            g.evicted += 1;
        }

        let seq = g.head_seq + 1;
        frame.seq = seq;
        g.frames.push_back(frame);
        g.head_seq = seq;

        Some(seq)
    }

    pub fn snapshot(&self) -> Snapshot {
        let frames: Vec<Frame> = {
            let g = lock_mutex(&self.inner, "ring.snapshot");
            g.frames.iter().cloned().collect()
        };

        Snapshot {
            frames,
            taken_utc_ns: utc_ns_now(),
        }
    }

    pub fn capacity(&self) -> usize {
        lock_mutex(&self.inner, "ring.capacity").cap
    }

    pub fn len(&self) -> usize {
        lock_mutex(&self.inner, "ring.len").frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn head_seq(&self) -> u64 {
        lock_mutex(&self.inner, "ring.head_seq").head_seq
    }

    pub fn stats(&self) -> RingStats {
        let g = lock_mutex(&self.inner, "ring.stats");
        RingStats {
            capacity: g.cap,
            len: g.frames.len(),
            head_seq: g.head_seq,
            evicted: g.evicted,
        }
    }
}

impl ComponentLogger for FrameRing {
    fn log_context(&self) -> LogContext {
        LogContext::new("FrameRing", &format!("{:p}", Arc::as_ptr(&self.inner)))
    }
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn taken_utc_ns(&self) -> u64 {
        self.taken_utc_ns
    }

    pub fn first_seq(&self) -> Option<u64> {
        self.frames.first().map(|f| f.seq)
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.frames.last().map(|f| f.seq)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
