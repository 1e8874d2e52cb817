//! The persistence hook: a narrow, best-effort durability interface
//! invoked by the engine on every inbound and outbound message. Failures
//! are logged but never abort a session.

use mqtt3_proto::Packet;

/// Per-connection durability hook. `Server` hands each new `Connection` a
/// handle obtained from a `PersistenceFactory`; the default factory in
/// this crate produces `NullPersistence`, so the broker runs standalone
/// without an external store.
pub trait Persistence: Send + Sync {
    fn persist_inbound(&self, msg: &Packet);
    fn persist_outbound(&self, msg: &Packet);
    /// Called exactly once, by the inbound loop, on session teardown.
    fn close(&self);
}

/// Builds a fresh persistence handle per accepted connection.
pub trait PersistenceFactory: Send + Sync {
    fn open(&self, client_id: &str) -> Box<dyn Persistence>;
}

/// No-op store: every call is a cheap return. The default so the broker
/// is runnable without wiring up a real backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistence;

impl Persistence for NullPersistence {
    fn persist_inbound(&self, _msg: &Packet) {}
    fn persist_outbound(&self, _msg: &Packet) {}
    fn close(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistenceFactory;

impl PersistenceFactory for NullPersistenceFactory {
    fn open(&self, _client_id: &str) -> Box<dyn Persistence> {
        Box::new(NullPersistence)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_persistence_is_a_harmless_default() {
        let store = NullPersistenceFactory.open("A");
        store.persist_inbound(&Packet::PingReq);
        store.persist_outbound(&Packet::PingResp);
        store.close();
    }
}
