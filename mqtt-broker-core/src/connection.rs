//! The `Connection` value and the `Job` it carries on its outbound
//! queue. `Connection` is the shared, `Arc`-held handle the registry and
//! client table back-reference; the engine (engine.rs) owns the two
//! loops that actually drive one.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use mqtt3_proto::Packet;
use tokio::sync::{mpsc, oneshot};

use crate::config::BufferOverflowStrategy;
use crate::persistence::Persistence;

/// One outbound work item: a protocol message plus an optional one-shot
/// "receipt", released once `encode` returns (successfully or not).
pub struct Job {
    pub packet: Packet,
    pub receipt: Option<oneshot::Sender<()>>,
}

impl Job {
    fn plain(packet: Packet) -> Self {
        Job {
            packet,
            receipt: None,
        }
    }

    fn with_receipt(packet: Packet) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Job {
                packet,
                receipt: Some(tx),
            },
            rx,
        )
    }
}

/// The negotiated CONNECT parameters, present from the moment CONNECT is
/// accepted. Transitions absent -> present exactly once and never back.
#[derive(Debug, Clone)]
pub struct ConnectState {
    pub client_id: String,
    pub keep_alive: u16,
    pub clean_session: bool,
    pub has_will: bool,
    pub username: Option<String>,
}

pub struct Connection {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    state: Mutex<Option<ConnectState>>,
    alive: AtomicBool,
    last_activity: AtomicI64,
    clean_disconnect: AtomicBool,
    overflow: BufferOverflowStrategy,
    persistence: Mutex<Option<Arc<dyn Persistence>>>,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<Job>, overflow: BufferOverflowStrategy) -> Arc<Connection> {
        Arc::new(Connection {
            tx: Mutex::new(Some(tx)),
            state: Mutex::new(None),
            alive: AtomicBool::new(true),
            last_activity: AtomicI64::new(now()),
            clean_disconnect: AtomicBool::new(false),
            overflow,
            persistence: Mutex::new(None),
        })
    }

    #[cfg(test)]
    pub fn new_for_test() -> (Arc<Connection>, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(8);
        (Connection::new(tx, BufferOverflowStrategy::Block), rx)
    }

    /// Assigned exactly once, before auth checks run, so the engine
    /// has an identity for logging regardless of the final return code.
    pub fn set_connect_state(&self, state: ConnectState) {
        let mut guard = self.state.lock().unwrap();
        debug_assert!(guard.is_none(), "protocol-state flag set twice");
        *guard = Some(state);
    }

    /// Bound once CONNECT is accepted and a client id is known, so the
    /// inbound and outbound loops share one durability handle rather than
    /// opening a fresh one per message.
    pub fn set_persistence(&self, store: Arc<dyn Persistence>) {
        *self.persistence.lock().unwrap() = Some(store);
    }

    pub fn persist_inbound(&self, msg: &Packet) {
        if let Some(store) = self.persistence.lock().unwrap().as_ref() {
            store.persist_inbound(msg);
        }
    }

    pub fn persist_outbound(&self, msg: &Packet) {
        if let Some(store) = self.persistence.lock().unwrap().as_ref() {
            store.persist_outbound(msg);
        }
    }

    /// Called alongside `close_queue`, by the inbound loop only.
    pub fn close_persistence(&self) {
        if let Some(store) = self.persistence.lock().unwrap().take() {
            store.close();
        }
    }

    pub fn client_id(&self) -> Option<String> {
        self.state.lock().unwrap().as_ref().map(|s| s.client_id.clone())
    }

    pub fn keep_alive(&self) -> Option<u16> {
        self.state.lock().unwrap().as_ref().map(|s| s.keep_alive)
    }

    pub fn touch(&self) {
        self.last_activity.store(now(), Ordering::SeqCst);
    }

    pub fn last_activity(&self) -> i64 {
        self.last_activity.load(Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Written once, under the cleanup path. A reader observing a
    /// stale `true` briefly is benign: queue closure happens-after this.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Set by the inbound loop when teardown was triggered by a client
    /// DISCONNECT, so the outbound loop's cleanup can tell a clean
    /// session end from an abort when it updates stats.
    pub fn mark_clean_disconnect(&self) {
        self.clean_disconnect.store(true, Ordering::SeqCst);
    }

    pub fn was_clean_disconnect(&self) -> bool {
        self.clean_disconnect.load(Ordering::SeqCst)
    }

    /// Closes the outbound queue. Only the inbound loop calls this.
    pub fn close_queue(&self) {
        self.tx.lock().unwrap().take();
    }

    fn sender(&self) -> Option<mpsc::Sender<Job>> {
        self.tx.lock().unwrap().clone()
    }

    /// Backpressure-aware enqueue per the connection's configured
    /// overflow strategy. `false` means the message never
    /// reached the socket (closed queue, or dropped under `Discard`).
    pub async fn submit(&self, packet: Packet) -> bool {
        if !self.is_alive() {
            return false;
        }
        let sender = match self.sender() {
            Some(s) => s,
            None => return false,
        };

        match self.overflow {
            BufferOverflowStrategy::Block => sender.clone().send(Job::plain(packet)).await.is_ok(),
            BufferOverflowStrategy::Discard => match sender.clone().try_send(Job::plain(packet)) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("outbound queue full for {:?}; dropping message", self.client_id());
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
        }
    }

    /// Always blocking, regardless of the connection's configured
    /// strategy, because the caller waits on the receipt. Must never be
    /// called while holding a lock the outbound loop might need.
    pub async fn submit_sync(&self, packet: Packet) -> bool {
        let sender = match self.sender() {
            Some(s) => s,
            None => return false,
        };
        let (job, rx) = Job::with_receipt(packet);
        if sender.clone().send(job).await.is_err() {
            return false;
        }
        let _ = rx.await;
        true
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

#[cfg(test)]
mod test {
    use super::*;
    use mqtt3_proto::Packet;

    #[tokio::test]
    async fn submit_delivers_to_the_outbound_queue() {
        let (conn, mut rx) = Connection::new_for_test();
        assert!(conn.submit(Packet::PingResp).await);
        let job = rx.recv().await.unwrap();
        assert!(matches!(job.packet, Packet::PingResp));
    }

    #[tokio::test]
    async fn submit_after_close_queue_returns_false() {
        let (conn, _rx) = Connection::new_for_test();
        conn.close_queue();
        assert!(!conn.submit(Packet::PingResp).await);
    }

    #[tokio::test]
    async fn submit_sync_resolves_once_receipt_is_signaled() {
        let (conn, mut rx) = Connection::new_for_test();
        let conn2 = conn.clone();
        let handle = tokio::spawn(async move { conn2.submit_sync(Packet::Disconnect).await });

        let job = rx.recv().await.unwrap();
        let receipt = job.receipt.unwrap();
        let _ = receipt.send(());

        assert!(handle.await.unwrap());
    }
}
