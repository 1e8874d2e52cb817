//! The subscription registry: subscriber fan-out per topic plus
//! the retained-message set consumed by `send_retain`. A single mutex
//! guards both so fan-out and mutation never interleave badly (no
//! delivery to a just-`unsub_all`'d connection).

use std::sync::{Arc, Mutex};

use mqtt3_proto::{Packet, Publish};

use crate::connection::Connection;
use crate::topic;

struct Subscription {
    pattern: String,
    conn: Arc<Connection>,
}

#[derive(Default)]
struct Inner {
    subscriptions: Vec<Subscription>,
    retained: std::collections::HashMap<String, Publish>,
    /// Insertion order of `retained` keys, for `send_retain`'s ordering.
    retained_order: Vec<String>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: the same (pattern, conn) pair collapses.
    pub fn add(&self, pattern: &str, conn: &Arc<Connection>) {
        let mut inner = self.inner.lock().unwrap();
        let exists = inner
            .subscriptions
            .iter()
            .any(|s| s.pattern == pattern && Arc::ptr_eq(&s.conn, conn));
        if !exists {
            inner.subscriptions.push(Subscription {
                pattern: pattern.to_owned(),
                conn: conn.clone(),
            });
        }
    }

    /// Absent entries are a silent no-op.
    pub fn unsub(&self, pattern: &str, conn: &Arc<Connection>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner
            .subscriptions
            .iter()
            .position(|s| s.pattern == pattern && Arc::ptr_eq(&s.conn, conn))
        {
            inner.subscriptions.remove(pos);
        }
    }

    /// Called exactly once during connection teardown.
    pub fn unsub_all(&self, conn: &Arc<Connection>) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.retain(|s| !Arc::ptr_eq(&s.conn, conn));
    }

    /// Records (or clears) the retained message for an exact topic. The
    /// engine calls this once per inbound PUBLISH, ahead of fan-out.
    pub fn note_retain(&self, publish: &Publish) {
        if !publish.retain {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if publish.payload.is_empty() {
            inner.retained.remove(&publish.topic_name);
            inner.retained_order.retain(|t| t != &publish.topic_name);
            return;
        }
        if !inner.retained.contains_key(&publish.topic_name) {
            inner.retained_order.push(publish.topic_name.clone());
        }
        inner.retained.insert(publish.topic_name.clone(), publish.clone());
    }

    /// Delivers `publish` to every subscription whose pattern matches its
    /// topic. Delivery order to a single subscriber matches submit-call
    /// order; cross-subscriber order is unspecified.
    pub async fn submit(&self, publish: &Publish) {
        let targets: Vec<Arc<Connection>> = {
            let inner = self.inner.lock().unwrap();
            inner
                .subscriptions
                .iter()
                .filter(|s| topic::matches(&s.pattern, &publish.topic_name))
                .map(|s| s.conn.clone())
                .collect()
        };

        for conn in targets {
            conn.submit(Packet::Publish(publish.clone())).await;
        }
    }

    /// Replays retained messages whose topic matches `pattern`, in
    /// topic-insertion order, to `conn`.
    pub async fn send_retain(&self, pattern: &str, conn: &Arc<Connection>) {
        let matched: Vec<Publish> = {
            let inner = self.inner.lock().unwrap();
            inner
                .retained_order
                .iter()
                .filter_map(|t| inner.retained.get(t))
                .filter(|p| topic::matches(pattern, &p.topic_name))
                .cloned()
                .collect()
        };

        for publish in matched {
            conn.submit(Packet::Publish(publish)).await;
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscriptions.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use mqtt3_proto::QoS;

    fn publish(topic_name: &str, payload: &[u8]) -> Publish {
        Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic_name: topic_name.into(),
            pkid: 0,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[tokio::test]
    async fn add_is_idempotent_for_the_same_pattern_and_connection() {
        let registry = SubscriptionRegistry::new();
        let (conn, _rx) = Connection::new_for_test();
        registry.add("room/+", &conn);
        registry.add("room/+", &conn);
        assert_eq!(registry.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn submit_reaches_exactly_the_matching_subscribers() {
        let registry = SubscriptionRegistry::new();
        let (a, mut rx_a) = Connection::new_for_test();
        let (b, mut rx_b) = Connection::new_for_test();
        registry.add("room/+", &a);
        registry.add("other", &b);

        registry.submit(&publish("room/1", b"hi")).await;

        let job = rx_a.recv().await.unwrap();
        assert!(matches!(job.packet, Packet::Publish(_)));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsub_all_stops_further_delivery() {
        let registry = SubscriptionRegistry::new();
        let (conn, mut rx) = Connection::new_for_test();
        registry.add("x/#", &conn);
        registry.submit(&publish("x/1", b"one")).await;
        rx.recv().await.unwrap();

        registry.unsub_all(&conn);
        registry.submit(&publish("x/1", b"two")).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn send_retain_replays_matching_topics_in_insertion_order() {
        let registry = SubscriptionRegistry::new();
        let mut retained_a = publish("a/1", b"first");
        retained_a.retain = true;
        let mut retained_b = publish("a/2", b"second");
        retained_b.retain = true;
        registry.note_retain(&retained_a);
        registry.note_retain(&retained_b);

        let (conn, mut rx) = Connection::new_for_test();
        registry.send_retain("a/+", &conn).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first.packet, second.packet) {
            (Packet::Publish(p1), Packet::Publish(p2)) => {
                assert_eq!(p1.topic_name, "a/1");
                assert_eq!(p2.topic_name, "a/2");
            }
            _ => panic!("expected publishes"),
        }
    }

    #[tokio::test]
    async fn zero_length_retained_payload_clears_the_retained_message() {
        let registry = SubscriptionRegistry::new();
        let mut retained = publish("a/1", b"value");
        retained.retain = true;
        registry.note_retain(&retained);

        let mut clear = publish("a/1", b"");
        clear.retain = true;
        registry.note_retain(&clear);

        let (conn, mut rx) = Connection::new_for_test();
        registry.send_retain("a/1", &conn).await;
        assert!(rx.try_recv().is_err());
    }
}
