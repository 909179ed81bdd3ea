use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-lifetime counters reported by `/health`.
pub struct Stats {
    frames_processed: AtomicU64,
    faces_detected: AtomicU64,
    intruders_flagged: AtomicU64,
    faces_trained: AtomicU64,
    forward_failures: AtomicU64,
    started: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            faces_detected: AtomicU64::new(0),
            intruders_flagged: AtomicU64::new(0),
            faces_trained: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
    pub fn record_frame(&self, faces: usize, intruder: bool) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.faces_detected.fetch_add(faces as u64, Ordering::Relaxed);
        if intruder {
            self.intruders_flagged.fetch_add(1, Ordering::Relaxed);
        }
    }
    pub fn inc_trained(&self) { self.faces_trained.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_forward_failures(&self) { self.forward_failures.fetch_add(1, Ordering::Relaxed); }
    pub fn frames_processed(&self) -> u64 { self.frames_processed.load(Ordering::Relaxed) }
    pub fn faces_detected(&self) -> u64 { self.faces_detected.load(Ordering::Relaxed) }
    pub fn intruders_flagged(&self) -> u64 { self.intruders_flagged.load(Ordering::Relaxed) }
    pub fn faces_trained(&self) -> u64 { self.faces_trained.load(Ordering::Relaxed) }
    pub fn forward_failures(&self) -> u64 { self.forward_failures.load(Ordering::Relaxed) }
    pub fn uptime_secs(&self) -> u64 { self.started.elapsed().as_secs() }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_seconds": self.uptime_secs(),
            "frames_processed": self.frames_processed(),
            "faces_detected": self.faces_detected(),
            "intruders_flagged": self.intruders_flagged(),
            "faces_trained": self.faces_trained(),
            "forward_failures": self.forward_failures(),
        })
    }
}
