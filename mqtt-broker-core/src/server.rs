//! `Server`: the listener and the owner of the shared state handed
//! to every `ConnectionEngine`. Global mutable state (`ClientTable`,
//! `SubscriptionRegistry`) is lifted here and passed explicitly by `Arc`
//! clone rather than kept as process-wide singletons, so tests can stand
//! up an isolated broker per case.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::auth::{AllowAllAuthenticator, Authenticator};
use crate::client_table::ClientTable;
use crate::config::Config;
use crate::engine::{self, Shared};
use crate::peer::{GlobalTopicPolicy, NoGlobalTopics, NoPeer, Peer};
use crate::persistence::{NullPersistenceFactory, PersistenceFactory};
use crate::registry::SubscriptionRegistry;
use crate::stats::{AtomicStats, Stats};

/// Builds a [`Server`] with whichever external collaborators the caller
/// wants to plug in; every field defaults to this crate's no-op adapter so
/// `Server::builder(config).build()` is enough to run standalone.
pub struct Builder {
    config: Config,
    stats: Arc<dyn Stats>,
    auth: Arc<dyn Authenticator>,
    persistence: Arc<dyn PersistenceFactory>,
    peer: Arc<dyn Peer>,
    global_topics: Arc<dyn GlobalTopicPolicy>,
}

impl Builder {
    pub fn new(config: Config) -> Self {
        Builder {
            config,
            stats: Arc::new(AtomicStats::new()),
            auth: Arc::new(AllowAllAuthenticator),
            persistence: Arc::new(NullPersistenceFactory),
            peer: Arc::new(NoPeer),
            global_topics: Arc::new(NoGlobalTopics),
        }
    }

    pub fn stats(mut self, stats: Arc<dyn Stats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn auth(mut self, auth: Arc<dyn Authenticator>) -> Self {
        self.auth = auth;
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn PersistenceFactory>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn peer(mut self, peer: Arc<dyn Peer>) -> Self {
        self.peer = peer;
        self
    }

    pub fn global_topics(mut self, global_topics: Arc<dyn GlobalTopicPolicy>) -> Self {
        self.global_topics = global_topics;
        self
    }

    pub fn build(self) -> Server {
        let shared = Arc::new(Shared {
            config: self.config,
            clients: ClientTable::new(),
            registry: SubscriptionRegistry::new(),
            stats: self.stats,
            auth: self.auth,
            persistence: self.persistence,
            peer: self.peer,
            global_topics: self.global_topics,
        });
        Server { shared }
    }
}

/// Owns the shared broker state (lifted out of any process-wide
/// singleton) and spawns one `ConnectionEngine` per accepted socket.
/// Cloning a `Server` is cheap and shares the same underlying state — every
/// clone accepts into the same `ClientTable`/`SubscriptionRegistry`.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    pub fn builder(config: Config) -> Builder {
        Builder::new(config)
    }

    pub fn shared(&self) -> Arc<Shared> {
        self.shared.clone()
    }

    /// Binds a TCP listener and serves forever, spawning a detached task
    /// per accepted connection. Returns only if `accept` fails outright
    /// (the listening socket itself is gone); a single connection's errors
    /// never propagate here — they are handled end-to-end inside
    /// `engine::run_connection`.
    pub async fn listen<A: ToSocketAddrs>(&self, addr: A) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves a listener the caller already bound — e.g. one bound to an
    /// ephemeral port (`127.0.0.1:0`) so a test can read back the real
    /// address before connecting.
    pub async fn serve(&self, mut listener: TcpListener) -> io::Result<()> {
        log::info!("listening on {:?}", listener.local_addr().ok());

        loop {
            let (socket, peer_addr) = listener.accept().await?;
            self.spawn_connection(socket, peer_addr);
        }
    }

    /// Spawns the engine for one already-accepted socket; split out of
    /// `listen` so callers that own their own accept loop (or are driving a
    /// test harness) can hand sockets in directly.
    pub fn spawn_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let _ = socket.set_nodelay(true);
        let shared = self.shared.clone();
        tokio::spawn(async move {
            log::debug!("accepted connection from {}", peer_addr);
            engine::run_connection(shared, socket).await;
            log::debug!("connection from {} torn down", peer_addr);
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn builder_defaults_produce_a_runnable_server() {
        let server = Server::builder(Config::default()).build();
        assert_eq!(server.shared().clients.len(), 0);
    }
}
