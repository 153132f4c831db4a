// src/core/logging.rs
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::timestamp::utc_ns_now;
use crate::ring::RingStats;

// Globale Sequenznummer für Korrelation
static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    pub location: Option<String>,
    pub sequence: u64,
    pub timestamp_ns: u64,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            location: None,
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            timestamp_ns: utc_ns_now(),
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn format(&self, level: &str, message: &str) -> String {
        let location_info = match &self.location {
            Some(loc) => format!(" at={}", loc),
            None => String::new(),
        };

        format!(
            "[{}][seq={:06}][{}:{}{}] {}",
            level, self.sequence, self.component, self.instance_id, location_info, message
        )
    }
}

// Helper Trait für einheitliches Logging
pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;

    fn debug(&self, message: &str) {
        let ctx = self.log_context();
        log::debug!("{}", ctx.format("DEBUG", message));
    }

    fn info(&self, message: &str) {
        let ctx = self.log_context();
        log::info!("{}", ctx.format("INFO", message));
    }

    fn warn(&self, message: &str) {
        let ctx = self.log_context();
        log::warn!("{}", ctx.format("WARN", message));
    }

    fn error(&self, message: &str) {
        let ctx = self.log_context();
        log::error!("{}", ctx.format("ERROR", message));
    }

    fn trace_ring(&self, stats: &RingStats) {
        let ctx = self.log_context();
        let ring_info = format!(
            "ring frames={}/{} head_seq={} evicted={}",
            stats.len, stats.capacity, stats.head_seq, stats.evicted
        );
        log::debug!("{}", ctx.format("TRACE", &ring_info));
    }
}
