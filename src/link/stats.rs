use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Point-in-time copy of a link's counters.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinkStatistics {
    pub probes_answered: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub sends_dropped: u64,
    pub rejections: u64,
    /// When the peer last proved it was alive by probing us.
    pub last_liveness: Option<Instant>,
}

#[derive(Default)]
pub(crate) struct LinkStats {
    probes_answered: AtomicU64,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    sends_dropped: AtomicU64,
    rejections: AtomicU64,
    last_liveness: Mutex<Option<Instant>>,
}

impl LinkStats {
    pub(crate) fn record_probe_answered(&self) {
        self.probes_answered.fetch_add(1, Ordering::Relaxed);
        self.last_liveness
            .lock()
            .expect("LinkStats mutex poisoned")
            .replace(Instant::now());
    }

    pub(crate) fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_send(&self) {
        self.sends_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LinkStatistics {
        LinkStatistics {
            probes_answered: self.probes_answered.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            sends_dropped: self.sends_dropped.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            last_liveness: *self.last_liveness.lock().expect("LinkStats mutex poisoned"),
        }
    }
}
