use std::sync::atomic::{AtomicU64, Ordering};

/// Per-server counters.
#[derive(Debug, Default)]
pub(crate) struct ServerMetrics {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    truncated: AtomicU64,
    decode_errors: AtomicU64,
    dispatched: AtomicU64,
    dropped_overload: AtomicU64,
    handler_panics: AtomicU64,
}

impl ServerMetrics {
    #[inline]
    pub(crate) fn record_datagram(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_overload(&self) {
        self.dropped_overload.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams.load(Ordering::Relaxed),
            bytes_received: self.bytes.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped_overload: self.dropped_overload.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a server's counters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Datagrams returned by the transport
    pub datagrams_received: u64,
    /// Bytes kept from received datagrams, at most `buffer_size` each
    pub bytes_received: u64,
    /// Datagrams larger than the receive buffer
    pub truncated: u64,
    /// Datagrams the decoder rejected
    pub decode_errors: u64,
    /// Handler tasks spawned
    pub dispatched: u64,
    /// Messages dropped because `max_in_flight` handlers were running
    pub dropped_overload: u64,
    /// Handler tasks that panicked
    pub handler_panics: u64,
}

impl MetricsSnapshot {
    /// Share of received datagrams that reached a handler.
    #[must_use]
    pub fn dispatch_ratio(&self) -> Option<f64> {
        if self.datagrams_received == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.dispatched as f64 / self.datagrams_received as f64)
    }
}
