//! The connection engine: the inbound decode loop, the outbound
//! write loop, the keep-alive heartbeat, and the state machine tying
//! them to one accepted socket. This is the hard core of the broker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use mqtt3_proto::{
    ConnAck, Connect, ConnectReturnCode, MqttCodec, Packet, PubAck, Publish, QoS, SubAck,
    SubscribeReturnCode, UnsubAck,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::auth::Authenticator;
use crate::client_table::ClientTable;
use crate::config::Config;
use crate::connection::{ConnectState, Connection};
use crate::peer::{GlobalTopicPolicy, Peer};
use crate::persistence::PersistenceFactory;
use crate::registry::SubscriptionRegistry;
use crate::stats::Stats;

/// Everything a `ConnectionEngine` needs that outlives any one
/// connection. Owned by `Server`, handed to each engine by `Arc` clone
/// rather than kept as a process-wide singleton.
pub struct Shared {
    pub config: Config,
    pub clients: ClientTable,
    pub registry: SubscriptionRegistry,
    pub stats: Arc<dyn Stats>,
    pub auth: Arc<dyn Authenticator>,
    pub persistence: Arc<dyn PersistenceFactory>,
    pub peer: Arc<dyn Peer>,
    pub global_topics: Arc<dyn GlobalTopicPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Connected,
}

/// Drives one accepted socket end to end: decode/dispatch until
/// termination, the matching outbound writer, and the heartbeat if
/// keep-alive applies. Returns once both loops have exited.
pub async fn run_connection<T>(shared: Arc<Shared>, socket: T)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let framed = Framed::new(socket, MqttCodec::default());
    let (sink, stream) = framed.split();

    let capacity = shared.config.outbound_queue_capacity.max(1);
    let (tx, rx) = tokio::sync::mpsc::channel(capacity);
    let conn = Connection::new(tx, shared.config.buff_overflow_strategy);

    let (close_tx, close_rx) = oneshot::channel();
    let (heartbeat_stop_tx, heartbeat_stop_rx) = oneshot::channel();

    let outbound = tokio::spawn(outbound_loop(
        shared.clone(),
        conn.clone(),
        rx,
        sink,
        close_tx,
        heartbeat_stop_tx,
    ));

    inbound_loop(shared, conn, stream, close_rx, heartbeat_stop_rx).await;
    let _ = outbound.await;
}

async fn inbound_loop<T>(
    shared: Arc<Shared>,
    conn: Arc<Connection>,
    mut stream: futures_util::stream::SplitStream<Framed<T, MqttCodec>>,
    mut close_rx: oneshot::Receiver<()>,
    heartbeat_stop_rx: oneshot::Receiver<()>,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut state = State::Fresh;
    let mut heartbeat: Option<tokio::task::JoinHandle<()>> = None;
    let mut heartbeat_stop_rx = Some(heartbeat_stop_rx);
    let mut clean_disconnect = false;

    loop {
        let packet = tokio::select! {
            frame = stream.next() => frame,
            _ = &mut close_rx => {
                log::debug!("inbound loop unblocked by transport close");
                break;
            }
        };

        let packet = match packet {
            Some(Ok(packet)) => packet,
            Some(Err(e)) => {
                let err = crate::error::Error::from(e);

                // A malformed protocol name/level is the one decode failure
                // with a defined wire reply: it flows through ConnAck
                // rather than a bare close.
                if state == State::Fresh && err.is_bad_protocol() {
                    conn.submit(Packet::ConnAck(ConnAck {
                        session_present: false,
                        code: ConnectReturnCode::UnacceptableProtocolVersion,
                    }))
                    .await;
                }

                // EOF/closed-network decode failures are routine
                // teardown, not errors worth an error-level log.
                if err.is_benign_close() {
                    log::debug!("decode error (benign close): {}", err);
                } else {
                    log::error!("decode error: {}", err);
                }
                break;
            }
            None => {
                log::debug!("client closed connection (EOF)");
                break;
            }
        };

        conn.touch();
        if shared.config.echo {
            log::debug!("<< {:?}", packet);
        }
        shared.stats.add_in(&packet);

        match state {
            State::Fresh => match packet {
                Packet::Connect(connect) => {
                    let client_id = connect.client_id.clone();
                    let accepted = handle_connect(&shared, &conn, connect).await;
                    if accepted {
                        conn.set_persistence(shared.persistence.open(&client_id).into());
                        state = State::Connected;
                        if let Some(keep_alive) = conn.keep_alive().filter(|k| *k > 0) {
                            if let Some(stop_rx) = heartbeat_stop_rx.take() {
                                heartbeat = Some(tokio::spawn(heartbeat_task(
                                    conn.clone(),
                                    keep_alive,
                                    stop_rx,
                                )));
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => {
                    log::error!("{}", crate::error::Error::UnexpectedPacket);
                    break;
                }
            },
            State::Connected => match packet {
                Packet::Publish(publish) => {
                    handle_publish(&shared, &conn, publish).await;
                }
                Packet::Subscribe(subscribe) => {
                    handle_subscribe(&shared, &conn, subscribe).await;
                }
                Packet::Unsubscribe(unsubscribe) => {
                    handle_unsubscribe(&shared, &conn, unsubscribe).await;
                }
                Packet::PubAck(_) => {
                    // No in-flight retry table in this core; a
                    // reply-only ack path has nothing further to do.
                }
                Packet::PingReq => {
                    conn.submit(Packet::PingResp).await;
                }
                Packet::Disconnect => {
                    clean_disconnect = true;
                    break;
                }
                other => {
                    log::error!("{}: {:?}", crate::error::Error::UnexpectedPacket, other);
                    break;
                }
            },
        }
    }

    if clean_disconnect {
        conn.mark_clean_disconnect();
    }

    // Only the inbound loop closes the outbound queue.
    conn.mark_dead();
    conn.close_persistence();
    conn.close_queue();

    // The heartbeat task (if any) exits on its own once the outbound
    // loop's cleanup signals `heartbeat_stop_tx`; tokio 0.2 has no
    // `JoinHandle::abort`, so this handle is simply left to finish.
    drop(heartbeat);
}

async fn handle_connect(shared: &Arc<Shared>, conn: &Arc<Connection>, connect: Connect) -> bool {
    let client_id = connect.client_id.clone();

    conn.set_connect_state(ConnectState {
        client_id: client_id.clone(),
        keep_alive: connect.keep_alive,
        clean_session: connect.clean_session,
        has_will: connect.last_will.is_some(),
        username: connect.username.clone(),
    });

    let code = connect_return_code(shared, &connect);

    conn.submit(Packet::ConnAck(ConnAck {
        session_present: false,
        code,
    }))
    .await;

    if code != ConnectReturnCode::Accepted {
        log::debug!("{}", crate::error::Error::Rejected(code));
        return false;
    }

    shared.stats.client_connect();

    // Duplicate-client takeover: inserting under an id already
    // bound replaces the table entry in the same step (one insertion);
    // the prior holder is then synchronously told to disconnect.
    if let Some(existing) = shared.clients.add_or_get_existing(client_id, conn.clone()) {
        existing.submit_sync(Packet::Disconnect).await;
    }

    true
}

fn connect_return_code(shared: &Arc<Shared>, connect: &Connect) -> ConnectReturnCode {
    if connect.client_id.is_empty() || connect.client_id.len() > shared.config.max_client_id_length {
        return ConnectReturnCode::IdentifierRejected;
    }

    match (&connect.username, &connect.password) {
        (None, _) | (_, None) => {
            if !shared.config.allow_anonymous_connect {
                return ConnectReturnCode::NotAuthorized;
            }
        }
        (Some(user), Some(pass)) => {
            if !shared.auth.authenticate(user, pass) {
                return ConnectReturnCode::BadUsernameOrPassword;
            }
        }
    }

    if shared.config.max_connections > 0 && shared.clients.len() >= shared.config.max_connections {
        return ConnectReturnCode::ServerUnavailable;
    }

    ConnectReturnCode::Accepted
}

async fn handle_publish(shared: &Arc<Shared>, conn: &Arc<Connection>, publish: Publish) {
    conn.persist_inbound(&Packet::Publish(publish.clone()));

    shared.registry.note_retain(&publish);
    shared.registry.submit(&publish).await;

    if shared.global_topics.is_global_topic(&publish.topic_name) {
        shared.peer.submit(publish.clone());
    }

    match publish.qos {
        QoS::AtMostOnce => {}
        QoS::AtLeastOnce => {
            if publish.pkid == 0 {
                log::warn!("QoS 1 publish with message id 0 on topic {}", publish.topic_name);
            }
            conn.submit(Packet::PubAck(PubAck { pkid: publish.pkid })).await;
        }
        QoS::ExactlyOnce => {
            log::warn!("QoS 2 is not implemented; treating as best-effort delivery only");
        }
    }
}

async fn handle_subscribe(
    shared: &Arc<Shared>,
    conn: &Arc<Connection>,
    subscribe: mqtt3_proto::Subscribe,
) {
    let mut return_codes = Vec::with_capacity(subscribe.topics.len());
    for topic in &subscribe.topics {
        // QoS downgrade: this core grants AtMostOnce for every topic
        // regardless of what was requested, since there is no outbound
        // in-flight table to honor a higher grant (see DESIGN.md).
        shared.registry.add(&topic.topic_path, conn);
        return_codes.push(SubscribeReturnCode::Success(QoS::AtMostOnce));
    }

    conn.submit(Packet::SubAck(SubAck {
        pkid: subscribe.pkid,
        return_codes,
    }))
    .await;

    for topic in &subscribe.topics {
        shared.registry.send_retain(&topic.topic_path, conn).await;
    }
}

async fn handle_unsubscribe(
    shared: &Arc<Shared>,
    conn: &Arc<Connection>,
    unsubscribe: mqtt3_proto::Unsubscribe,
) {
    for topic in &unsubscribe.topics {
        shared.registry.unsub(topic, conn);
    }

    conn.submit(Packet::UnsubAck(UnsubAck {
        pkid: unsubscribe.pkid,
    }))
    .await;
}

async fn heartbeat_task(conn: Arc<Connection>, keep_alive: u16, mut stop: oneshot::Receiver<()>) {
    let grace = Duration::from_secs_f64(1.5 * keep_alive as f64);
    let mut interval = tokio::time::interval(Duration::from_secs(keep_alive as u64));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let idle = now() - conn.last_activity();
                if idle as f64 >= grace.as_secs_f64() && conn.is_alive() {
                    log::info!("keep-alive expired for {:?}", conn.client_id());
                    conn.submit_sync(Packet::Disconnect).await;
                    break;
                }
            }
            _ = &mut stop => break,
        }
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

async fn outbound_loop<T>(
    shared: Arc<Shared>,
    conn: Arc<Connection>,
    mut rx: tokio::sync::mpsc::Receiver<crate::connection::Job>,
    mut sink: futures_util::stream::SplitSink<Framed<T, MqttCodec>, Packet>,
    close_tx: oneshot::Sender<()>,
    heartbeat_stop_tx: oneshot::Sender<()>,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    while let Some(job) = rx.recv().await {
        conn.persist_outbound(&job.packet);

        if shared.config.echo {
            log::debug!(">> {:?}", job.packet);
        }
        shared.stats.add_out(&job.packet);

        let is_disconnect = matches!(job.packet, Packet::Disconnect);

        let started = Instant::now();
        let result = timeout(shared.config.io_timeout, sink.send(job.packet)).await;
        let elapsed = started.elapsed();
        if elapsed > shared.config.client_slow_threshold {
            log::warn!("slow write to {:?}: {:?}", conn.client_id(), elapsed);
        }

        let write_failed = match result {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                log::error!("write error for {:?}: {}", conn.client_id(), e);
                true
            }
            Err(_) => {
                log::error!("write timeout for {:?}", conn.client_id());
                true
            }
        };

        if let Some(receipt) = job.receipt {
            let _ = receipt.send(());
        }

        if write_failed || is_disconnect {
            break;
        }
    }

    // Deferred cleanup, outbound-loop-only.
    let _ = heartbeat_stop_tx.send(());
    let _ = sink.close().await;
    let _ = close_tx.send(());

    if let Some(client_id) = conn.client_id() {
        shared.clients.remove(&client_id, &conn);
    }
    shared.registry.unsub_all(&conn);

    if conn.was_clean_disconnect() {
        shared.stats.client_disconnect();
    } else {
        shared.stats.aborted();
    }
}
