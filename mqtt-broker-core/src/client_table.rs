//! The client-identity table: maps client id to the currently
//! registered `Connection` and arbitrates duplicate ids. The takeover
//! protocol itself lives in the engine; this type only holds the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::connection::Connection;

#[derive(Debug, Default)]
pub struct ClientTable {
    inner: Mutex<HashMap<String, Arc<Connection>>>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `conn` under `id`. Returns `None` on a fresh insert, or the
    /// previously-registered connection if `id` was already bound.
    pub fn add_or_get_existing(&self, id: String, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        self.inner.lock().unwrap().insert(id, conn)
    }

    /// Compare-and-remove: only removes the entry for `id` if it still
    /// points at `conn`. A stale caller (one that lost a duplicate-id
    /// takeover) must not be able to evict the session that replaced it;
    /// idempotent otherwise — absent ids, or ids now bound to a different
    /// connection, are silent no-ops.
    pub fn remove(&self, id: &str, conn: &Arc<Connection>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(current) = inner.get(id) {
            if Arc::ptr_eq(current, conn) {
                inner.remove(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().unwrap().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.inner.lock().unwrap().get(id).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::Connection;

    #[test]
    fn fresh_insert_returns_none_duplicate_returns_prior() {
        let table = ClientTable::new();
        let (a, _rx_a) = Connection::new_for_test();
        let (b, _rx_b) = Connection::new_for_test();

        assert!(table.add_or_get_existing("A".into(), a).is_none());
        assert_eq!(table.len(), 1);

        let prior = table.add_or_get_existing("A".into(), b);
        assert!(prior.is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let table = ClientTable::new();
        let (missing, _rx_missing) = Connection::new_for_test();
        table.remove("missing", &missing);
        let (a, _rx) = Connection::new_for_test();
        table.add_or_get_existing("A".into(), a.clone());
        table.remove("A", &a);
        table.remove("A", &a);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_is_a_no_op_when_the_entry_now_points_at_a_different_connection() {
        let table = ClientTable::new();
        let (a, _rx_a) = Connection::new_for_test();
        let (b, _rx_b) = Connection::new_for_test();

        table.add_or_get_existing("A".into(), a.clone());
        table.add_or_get_existing("A".into(), b.clone());

        // `a` lost the takeover; its own cleanup must not evict `b`.
        table.remove("A", &a);
        assert!(table.contains("A"));

        table.remove("A", &b);
        assert!(table.is_empty());
    }
}
