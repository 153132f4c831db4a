// src/recorder/trigger.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, warn};

use crate::recorder::Recorder;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Payload-less "save the last N seconds" signal. Cheap to clone; hand one
/// to every input (keyboard, GPIO button, HTTP, ...).
#[derive(Clone)]
pub struct FlushTrigger {
    tx: Sender<()>,
}

pub struct FlushRequests {
    rx: Receiver<()>,
}

pub fn flush_channel() -> (FlushTrigger, FlushRequests) {
    let (tx, rx) = unbounded();
    (FlushTrigger { tx }, FlushRequests { rx })
}

impl FlushTrigger {
    /// Returns `false` once nobody serves requests anymore.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl FlushRequests {
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushTally {
    pub requested: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl Recorder {
    /// Serves flush requests until `running` is cleared or every trigger is
    /// dropped. A failed flush is logged and the loop keeps going.
    pub fn serve_flushes(&self, requests: &FlushRequests, running: &AtomicBool) -> FlushTally {
        let mut tally = FlushTally::default();

        while running.load(Ordering::Relaxed) {
            match requests.rx.recv_timeout(POLL_INTERVAL) {
                Ok(()) => {
                    tally.requested += 1;
                    match self.flush() {
                        Ok(_) => tally.succeeded += 1,
                        Err(e) => {
                            tally.failed += 1;
                            warn!("[recorder] flush request {} failed: {}", tally.requested, e);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("[recorder] all flush triggers dropped");
                    break;
                }
            }
        }

        tally
    }
}
