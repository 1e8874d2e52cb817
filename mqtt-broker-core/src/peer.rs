//! Peer interface: forwarding hook for globally-scoped topics plus
//! the externally-supplied predicate that decides which topics are
//! global. Inter-broker replication itself is out of scope.

use mqtt3_proto::Publish;

pub trait Peer: Send + Sync {
    fn submit(&self, publish: Publish);
}

pub trait GlobalTopicPolicy: Send + Sync {
    fn is_global_topic(&self, name: &str) -> bool;
}

/// Nothing is global and nothing is forwarded. Default so the broker
/// runs standalone with no cluster peer wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeer;

impl Peer for NoPeer {
    fn submit(&self, _publish: Publish) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoGlobalTopics;

impl GlobalTopicPolicy for NoGlobalTopics {
    fn is_global_topic(&self, _name: &str) -> bool {
        false
    }
}
