//! Stats interface: a narrow sink for operational counters. This
//! crate ships an in-memory `AtomicStats` default; a production sink
//! (Prometheus, StatsD, ...) plugs in by implementing the same trait.

use std::sync::atomic::{AtomicUsize, Ordering};

use mqtt3_proto::Packet;

pub trait Stats: Send + Sync {
    /// A new session was accepted into the `ClientTable` (CONNECT
    /// handling, `Accepted` path). The counterpart `client_disconnect`/
    /// `aborted` need a matching increment for `clients()` to mean anything.
    fn client_connect(&self);
    fn client_disconnect(&self);
    fn aborted(&self);
    fn message_recv(&self);
    fn message_send(&self);
    fn add_in(&self, msg: &Packet);
    fn add_out(&self, msg: &Packet);
    fn clients(&self) -> usize;
}

/// Plain in-memory counters; swapped out in production for a real sink.
#[derive(Debug, Default)]
pub struct AtomicStats {
    disconnects: AtomicUsize,
    aborts: AtomicUsize,
    recv: AtomicUsize,
    send: AtomicUsize,
    clients: AtomicUsize,
}

impl AtomicStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aborted_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn recv_count(&self) -> usize {
        self.recv.load(Ordering::SeqCst)
    }

    pub fn send_count(&self) -> usize {
        self.send.load(Ordering::SeqCst)
    }
}

impl Stats for AtomicStats {
    fn client_connect(&self) {
        self.clients.fetch_add(1, Ordering::SeqCst);
    }

    /// A clean, client-initiated disconnect: counts the event and vacates
    /// the live-client gauge.
    fn client_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.clients.fetch_sub(1, Ordering::SeqCst);
    }

    /// An abnormal teardown (keep-alive expiry, decode error, ...): counts
    /// the event and vacates the live-client gauge.
    fn aborted(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.clients.fetch_sub(1, Ordering::SeqCst);
    }

    fn message_recv(&self) {
        self.recv.fetch_add(1, Ordering::SeqCst);
    }

    fn message_send(&self) {
        self.send.fetch_add(1, Ordering::SeqCst);
    }

    fn add_in(&self, _msg: &Packet) {
        self.message_recv();
    }

    fn add_out(&self, _msg: &Packet) {
        self.message_send();
    }

    fn clients(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = AtomicStats::new();
        stats.client_connect();
        stats.client_connect();
        stats.aborted();
        stats.message_recv();
        assert_eq!(stats.clients(), 1);
    }
}
