use crate::handshake::{exchange_preambles, ConnectionPreamble, HandshakeError, NodeIdentityKind};
use crate::link::handler::{InboundOutcome, MessageHandler};
use crate::link::signal::{close_signal, CloseHandle, CloseSignal};
use crate::link::state::LinkStateMachine;
use crate::link::stats::LinkStats;
use crate::link::{LinkError, LinkState, LinkStatistics, Router};
use crate::message::Message;
use crate::options::LinkOptionsValidated;
use crate::types::SiloAddress;
use crate::wire;
use bytes::{Bytes, BytesMut};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[derive(Clone)]
pub struct LinkConfig {
    pub logger: slog::Logger,
    pub local_address: SiloAddress,
    pub cluster_id: String,
    pub router: Arc<dyn Router>,
    pub options: LinkOptionsValidated,
}

/// Starts a link over an already-connected transport and returns immediately. The handshake and
/// all later traffic run on a task of their own.
pub fn spawn_link<T>(config: LinkConfig, io: T) -> LinkHandle
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let logger = config.logger.new(slog::o!("local" => config.local_address.to_string()));
    let stats = Arc::new(LinkStats::default());
    let handler = Arc::new(MessageHandler::new(
        logger.clone(),
        config.local_address,
        config.router,
        stats,
        config.options.max_retry_count,
    ));
    let (state_machine, state) = LinkStateMachine::new(logger.clone());
    let (tx, rx) = mpsc::channel(config.options.outbound_queue_size);
    let (closer, close_signal) = close_signal();

    let connection = Connection {
        logger,
        cluster_id: config.cluster_id,
        options: config.options,
        handler: handler.clone(),
        state: state_machine,
        outbound: rx,
        close_signal,
    };
    tokio::spawn(connection.run(io));

    LinkHandle {
        sender: tx,
        state,
        handler,
        closer: Arc::new(Mutex::new(closer)),
    }
}

/// LinkHandle is how the rest of the silo talks to one link. Cheap to clone; the link closes
/// gracefully once `close` is called or every handle is gone.
#[derive(Clone)]
pub struct LinkHandle {
    sender: mpsc::Sender<Message>,
    state: watch::Receiver<LinkState>,
    handler: Arc<MessageHandler>,
    closer: Arc<Mutex<CloseHandle>>,
}

impl LinkHandle {
    /// Queues `message` for this link. Messages queued before the handshake completes are held
    /// until it does. If the link no longer accepts sends, the message goes through send-failure
    /// handling instead.
    pub async fn send(&self, message: Message) {
        let accepts_sends = self.state.borrow().accepts_sends();
        if !accepts_sends {
            self.handler
                .on_send_failure(message, LinkError::Closed("Link no longer accepts sends".to_string()));
            return;
        }

        if let Err(mpsc::error::SendError(message)) = self.sender.send(message).await {
            self.handler
                .on_send_failure(message, LinkError::Closed("Link task has exited".to_string()));
        }
    }

    pub fn state(&self) -> LinkState {
        self.state.borrow().clone()
    }

    pub fn remote_address(&self) -> Option<SiloAddress> {
        self.state.borrow().remote_address()
    }

    pub fn statistics(&self) -> LinkStatistics {
        self.handler.stats().snapshot()
    }

    /// Starts a graceful close. Queued sends are still flushed.
    pub fn close(&self) {
        self.closer.lock().expect("LinkHandle mutex poisoned").close();
    }

    /// Waits for the handshake to finish, returning the peer's address.
    pub async fn established(&self) -> Result<SiloAddress, LinkError> {
        let mut state = self.state.clone();
        loop {
            match &*state.borrow() {
                LinkState::Active { remote } | LinkState::Draining { remote } => return Ok(*remote),
                LinkState::Closed { cause } => {
                    return Err(cause
                        .clone()
                        .unwrap_or_else(|| LinkError::Closed("Closed before the handshake completed".to_string())))
                }
                _ => {}
            }

            if state.changed().await.is_err() {
                return Err(LinkError::Closed("Link task has exited".to_string()));
            }
        }
    }

    /// Waits for the link to close, returning why. `None` means it closed gracefully.
    pub async fn closed(&self) -> Option<LinkError> {
        let mut state = self.state.clone();
        loop {
            if let LinkState::Closed { cause } = &*state.borrow() {
                return cause.clone();
            }

            if state.changed().await.is_err() {
                return Some(LinkError::Closed("Link task has exited".to_string()));
            }
        }
    }
}

/// The task that owns the transport. After the handshake the read half moves to a `Reader` task
/// of its own and this task keeps the write half, so a slow write never stops inbound frames from
/// being consumed. Each direction stays strictly ordered.
struct Connection {
    logger: slog::Logger,
    cluster_id: String,
    options: LinkOptionsValidated,
    handler: Arc<MessageHandler>,
    state: LinkStateMachine,
    outbound: mpsc::Receiver<Message>,
    close_signal: CloseSignal,
}

impl Connection {
    async fn run<T>(mut self, io: T)
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.state.begin_handshake();

        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(self.options.max_frame_length)
            .new_codec();
        let (mut sink, mut stream) = Framed::new(io, codec).split::<Bytes>();

        let remote = match self.handshake(&mut sink, &mut stream).await {
            Ok(remote) => remote,
            Err(e) => {
                slog::warn!(self.logger, "Handshake failed: {}", e);
                self.fail_pending(LinkError::Handshake(e)).await;
                return;
            }
        };
        self.logger = self.logger.new(slog::o!("peer" => remote.to_string()));
        self.state.activate(remote);

        let (reply_tx, mut replies) = mpsc::unbounded_channel();
        let reader = Reader {
            logger: self.logger.clone(),
            handler: self.handler.clone(),
            stream,
            replies: reply_tx,
        };
        let mut reader = tokio::spawn(reader.run());

        match self.pump(&mut sink, &mut reader, &mut replies, &remote).await {
            None => self.drain(&mut sink, &remote).await,
            Some(cause) => {
                slog::warn!(self.logger, "Link failed: {}", cause);
                self.fail_pending(cause).await;
            }
        }
        reader.abort();
    }

    async fn handshake<W, R>(&self, sink: &mut W, stream: &mut R) -> Result<SiloAddress, HandshakeError>
    where
        W: Sink<Bytes, Error = io::Error> + Send + Unpin,
        R: Stream<Item = Result<BytesMut, io::Error>> + Send + Unpin,
    {
        let local = ConnectionPreamble::for_silo(self.handler.local(), self.cluster_id.clone());
        let peer = exchange_preambles(sink, stream, &local, self.options.handshake_timeout).await?;

        match (peer.identity_kind, peer.silo_address) {
            (NodeIdentityKind::Silo, Some(remote)) => Ok(remote),
            (NodeIdentityKind::Silo, None) => Err(HandshakeError::MissingSiloAddress),
            (kind, _) => Err(HandshakeError::UnsupportedIdentityKind(kind)),
        }
    }

    /// Writes replies and outbound sends until the link closes. `None` means a graceful close was
    /// requested.
    async fn pump<W>(
        &mut self,
        sink: &mut W,
        reader: &mut JoinHandle<LinkError>,
        replies: &mut mpsc::UnboundedReceiver<Message>,
        remote: &SiloAddress,
    ) -> Option<LinkError>
    where
        W: Sink<Bytes, Error = io::Error> + Send + Unpin,
    {
        loop {
            tokio::select! {
                biased;

                _ = &mut self.close_signal => {
                    slog::info!(self.logger, "Close requested");
                    return None;
                }
                cause = &mut *reader => {
                    return Some(cause.unwrap_or_else(|e| LinkError::Closed(format!("Reader stopped: {}", e))));
                }
                Some(reply) = replies.recv() => {
                    if let Err(e) = self.write_reply(sink, reply).await {
                        return Some(e);
                    }
                }
                outbound = self.outbound.recv() => match outbound {
                    Some(message) => {
                        if let Err(e) = self.write_outbound(sink, message, remote).await {
                            return Some(e);
                        }
                    }
                    // Every handle is gone, so nothing more can be sent.
                    None => return None,
                },
            }
        }
    }

    async fn write_reply<W>(&self, sink: &mut W, reply: Message) -> Result<(), LinkError>
    where
        W: Sink<Bytes, Error = io::Error> + Send + Unpin,
    {
        let frame = wire::encode_message(&reply)?;
        sink.send(frame)
            .await
            .map_err(|e| LinkError::Closed(format!("Write failed: {}", e)))?;
        self.handler.stats().record_sent();

        Ok(())
    }

    async fn write_outbound<W>(&self, sink: &mut W, message: Message, remote: &SiloAddress) -> Result<(), LinkError>
    where
        W: Sink<Bytes, Error = io::Error> + Send + Unpin,
    {
        let message = match self.handler.prepare_outbound(message, remote) {
            Some(message) => message,
            None => return Ok(()),
        };

        let frame = match wire::encode_message(&message) {
            Ok(frame) => frame,
            Err(e) => {
                self.handler.on_send_failure(message, LinkError::Encode(e));
                return Ok(());
            }
        };

        match sink.send(frame).await {
            Ok(()) => {
                self.handler.stats().record_sent();
                Ok(())
            }
            Err(e) => {
                // The message may still reach its target over another link.
                self.handler
                    .retry_message(message, LinkError::TransientSend(e.to_string()));
                Err(LinkError::Closed(format!("Write failed: {}", e)))
            }
        }
    }

    /// Graceful close: refuse new sends, flush what is queued, then shut the transport.
    async fn drain<W>(&mut self, sink: &mut W, remote: &SiloAddress)
    where
        W: Sink<Bytes, Error = io::Error> + Send + Unpin,
    {
        self.state.drain();
        self.outbound.close();

        while let Some(message) = self.outbound.recv().await {
            if let Err(cause) = self.write_outbound(sink, message, remote).await {
                slog::warn!(self.logger, "Link failed while draining: {}", cause);
                self.fail_pending(cause).await;
                return;
            }
        }

        if let Err(e) = sink.close().await {
            slog::debug!(self.logger, "Error closing transport: {}", e);
        }
        self.state.close(None);
    }

    /// Abrupt close: every send still queued fails.
    async fn fail_pending(&mut self, cause: LinkError) {
        self.outbound.close();
        let mut failed = 0;
        while let Some(message) = self.outbound.recv().await {
            self.handler
                .on_send_failure(message, LinkError::Closed(cause.to_string()));
            failed += 1;
        }

        if failed > 0 {
            slog::info!(self.logger, "Failed {} pending send(s)", failed);
        }
        self.state.close(Some(cause));
    }
}

/// Consumes inbound frames for one link. Replies produced here are queued for the writer rather
/// than written, so reading never waits on the transport's write half.
struct Reader<R> {
    logger: slog::Logger,
    handler: Arc<MessageHandler>,
    stream: R,
    replies: mpsc::UnboundedSender<Message>,
}

impl<R> Reader<R>
where
    R: Stream<Item = Result<BytesMut, io::Error>> + Send + Unpin + 'static,
{
    /// Runs until the read half fails or the peer hangs up, returning why.
    async fn run(mut self) -> LinkError {
        loop {
            match self.stream.next().await {
                Some(Ok(frame)) => self.handle_frame(frame.freeze()),
                Some(Err(e)) => return LinkError::Closed(format!("Read failed: {}", e)),
                None => return LinkError::Closed("Peer hung up".to_string()),
            }
        }
    }

    fn handle_frame(&self, frame: Bytes) {
        let message = match wire::decode_message(frame) {
            Ok(message) => message,
            Err(e) => {
                slog::warn!(self.logger, "Discarding undecodable frame: {}", e);
                return;
            }
        };

        let id = message.id;
        slog::debug!(self.logger, "Inbound {:?} {:?}", message.direction, id);
        match self.handler.handle_inbound(message) {
            InboundOutcome::Reply(reply) => {
                if self.replies.send(reply).is_err() {
                    slog::debug!(self.logger, "Writer is gone, reply to {:?} not sent", id);
                }
            }
            InboundOutcome::Dropped(reason) => slog::debug!(self.logger, "Dropped {:?}: {:?}", id, reason),
            InboundOutcome::Delivered | InboundOutcome::Forwarded | InboundOutcome::Rejected => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::handler::tests::RecordingRouter;
    use crate::message::{Direction, RejectionKind, PING_COMPLETED};
    use crate::types::GrainId;
    use std::net::SocketAddr;
    use tokio::time::Duration;

    fn silo(port: u16) -> SiloAddress {
        SiloAddress::new(SocketAddr::from(([127, 0, 0, 1], port)), 17)
    }

    fn config(local: SiloAddress, cluster_id: &str, router: &Arc<RecordingRouter>) -> LinkConfig {
        LinkConfig {
            logger: slog::Logger::root(slog::Discard, slog::o!()),
            local_address: local,
            cluster_id: cluster_id.to_string(),
            router: router.clone(),
            options: LinkOptionsValidated::default(),
        }
    }

    async fn eventually(description: &str, condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for: {}", description);
    }

    #[tokio::test]
    async fn probe_is_answered_over_the_link() {
        // -- setup --
        let (a_io, b_io) = tokio::io::duplex(64 * 1024);
        let a_router = Arc::new(RecordingRouter::default());
        let b_router = Arc::new(RecordingRouter::default());
        let a = spawn_link(config(silo(1000), "c1", &a_router), a_io);
        let b = spawn_link(config(silo(2000), "c1", &b_router), b_io);

        // -- execute --
        assert_eq!(a.established().await.unwrap(), silo(2000));
        assert_eq!(b.established().await.unwrap(), silo(1000));
        let ping = Message::ping(silo(2000));
        a.send(ping.clone()).await;

        // -- verify --
        eventually("probe ack", || a_router.received.lock().unwrap().len() == 1).await;
        let ack = a_router.received.lock().unwrap()[0].clone();
        assert_eq!(ack.id, ping.id);
        assert_eq!(ack.direction, Direction::Response);
        assert_eq!(&ack.body[..], PING_COMPLETED);
        assert!(ack.rejection.is_none());

        assert!(b_router.received.lock().unwrap().is_empty());
        let b_stats = b.statistics();
        assert_eq!(b_stats.probes_answered, 1);
        assert!(b_stats.last_liveness.is_some());
        assert_eq!(a.remote_address(), Some(silo(2000)));
    }

    #[tokio::test]
    async fn simultaneous_large_sends_do_not_stall_either_side() {
        // -- setup --
        let (a_io, b_io) = tokio::io::duplex(1024);
        let a_router = Arc::new(RecordingRouter::default());
        let b_router = Arc::new(RecordingRouter::default());
        let a = spawn_link(config(silo(1000), "c1", &a_router), a_io);
        let b = spawn_link(config(silo(2000), "c1", &b_router), b_io);
        a.established().await.unwrap();
        b.established().await.unwrap();

        let mut to_b = Message::one_way(GrainId::new("blob", "to-b"), Bytes::from(vec![7u8; 256 * 1024]));
        to_b.target_silo = Some(silo(2000));
        let mut to_a = Message::one_way(GrainId::new("blob", "to-a"), Bytes::from(vec![9u8; 256 * 1024]));
        to_a.target_silo = Some(silo(1000));

        // -- execute --
        tokio::join!(a.send(to_b), b.send(to_a));

        // -- verify --
        eventually("both large messages delivered", || {
            a_router.received.lock().unwrap().len() == 1 && b_router.received.lock().unwrap().len() == 1
        })
        .await;
        assert_eq!(b_router.received.lock().unwrap()[0].body.len(), 256 * 1024);
        assert_eq!(a_router.received.lock().unwrap()[0].body.len(), 256 * 1024);
        assert!(a.state().is_active());
        assert!(b.state().is_active());
    }

    #[tokio::test]
    async fn cluster_mismatch_closes_the_link_and_fails_queued_requests() {
        // -- setup --
        let (a_io, b_io) = tokio::io::duplex(64 * 1024);
        let a_router = Arc::new(RecordingRouter::default());
        let b_router = Arc::new(RecordingRouter::default());
        let a = spawn_link(config(silo(1000), "blue", &a_router), a_io);
        let _b = spawn_link(config(silo(2000), "green", &b_router), b_io);
        a.send(Message::request(GrainId::new("cart", "1"), Bytes::new())).await;

        // -- execute --
        let result = a.established().await;

        // -- verify --
        assert!(matches!(
            result,
            Err(LinkError::Handshake(HandshakeError::ClusterIdMismatch { .. }))
        ));
        assert!(a.remote_address().is_none());
        eventually("queued request rejected", || a_router.rejections.lock().unwrap().len() == 1).await;
        assert_eq!(a_router.rejections.lock().unwrap()[0].1, RejectionKind::Transient);

        // Anything sent after the close is refused the same way.
        a.send(Message::request(GrainId::new("cart", "2"), Bytes::new())).await;
        assert_eq!(a_router.rejections.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn graceful_close_flushes_queued_sends() {
        // -- setup --
        let (a_io, b_io) = tokio::io::duplex(64 * 1024);
        let a_router = Arc::new(RecordingRouter::default());
        let b_router = Arc::new(RecordingRouter::default());
        let a = spawn_link(config(silo(1000), "c1", &a_router), a_io);
        let b = spawn_link(config(silo(2000), "c1", &b_router), b_io);
        a.established().await.unwrap();

        // -- execute --
        for i in 0..3 {
            let mut message = Message::one_way(GrainId::new("log", i.to_string()), Bytes::new());
            message.target_silo = Some(silo(2000));
            a.send(message).await;
        }
        a.close();

        // -- verify --
        assert!(a.closed().await.is_none());
        eventually("flushed sends", || b_router.received.lock().unwrap().len() == 3).await;
        assert_eq!(a.statistics().messages_sent, 3);

        // The peer sees the transport go away, which is abrupt from its point of view.
        assert!(matches!(b.closed().await, Some(LinkError::Closed(_))));
    }

    #[tokio::test]
    async fn expired_request_gets_no_reply_on_the_wire() {
        // -- setup --
        let (a_io, raw_io) = tokio::io::duplex(64 * 1024);
        let router = Arc::new(RecordingRouter::default());
        let a = spawn_link(config(silo(1000), "c1", &router), a_io);

        let (mut raw_tx, mut raw_rx) = Framed::new(raw_io, LengthDelimitedCodec::new()).split::<Bytes>();
        let raw_preamble = ConnectionPreamble::for_silo(silo(2000), "c1");
        exchange_preambles(&mut raw_tx, &mut raw_rx, &raw_preamble, Duration::from_secs(5))
            .await
            .unwrap();

        let mut expired = Message::request(GrainId::new("cart", "1"), Bytes::from_static(b"too late"));
        expired.sending_silo = Some(silo(2000));
        expired.target_silo = Some(silo(1000));
        expired.expiration = Some(chrono::Utc::now() - chrono::Duration::seconds(1));
        let mut ping = Message::ping(silo(1000));
        ping.sending_silo = Some(silo(2000));

        // -- execute --
        raw_tx.send(wire::encode_message(&expired).unwrap()).await.unwrap();
        raw_tx.send(wire::encode_message(&ping).unwrap()).await.unwrap();
        let first_reply = raw_rx.next().await.unwrap().unwrap();

        // -- verify --
        let first_reply = wire::decode_message(first_reply.freeze()).unwrap();
        assert_eq!(first_reply.id, ping.id);
        assert_eq!(&first_reply.body[..], PING_COMPLETED);

        assert_eq!(router.sniffed.lock().unwrap().len(), 1);
        assert!(router.received.lock().unwrap().is_empty());
        assert!(router.sent.lock().unwrap().is_empty());
        assert!(router.rejections.lock().unwrap().is_empty());
        assert_eq!(a.statistics().messages_received, 2);
    }

    #[tokio::test]
    async fn undecodable_frame_is_skipped() {
        // -- setup --
        let (a_io, raw_io) = tokio::io::duplex(64 * 1024);
        let router = Arc::new(RecordingRouter::default());
        let a = spawn_link(config(silo(1000), "c1", &router), a_io);

        let (mut raw_tx, mut raw_rx) = Framed::new(raw_io, LengthDelimitedCodec::new()).split::<Bytes>();
        exchange_preambles(
            &mut raw_tx,
            &mut raw_rx,
            &ConnectionPreamble::for_silo(silo(2000), "c1"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        // -- execute --
        raw_tx.send(Bytes::from_static(&[0xff, 0xff, 0xff])).await.unwrap();
        raw_tx
            .send(wire::encode_message(&Message::ping(silo(1000))).unwrap())
            .await
            .unwrap();

        // -- verify --
        let reply = wire::decode_message(raw_rx.next().await.unwrap().unwrap().freeze()).unwrap();
        assert_eq!(&reply.body[..], PING_COMPLETED);
        assert!(a.state().is_active());
    }

    #[tokio::test]
    async fn peer_hang_up_only_closes_this_link() {
        // -- setup --
        let (a_io, b_io) = tokio::io::duplex(64 * 1024);
        let (c_io, d_io) = tokio::io::duplex(64 * 1024);
        let router = Arc::new(RecordingRouter::default());
        let a = spawn_link(config(silo(1000), "c1", &router), a_io);
        let b = spawn_link(config(silo(2000), "c1", &router), b_io);
        let c = spawn_link(config(silo(1000), "c1", &router), c_io);
        let d = spawn_link(config(silo(3000), "c1", &router), d_io);
        a.established().await.unwrap();
        c.established().await.unwrap();
        d.established().await.unwrap();

        // -- execute --
        drop(b);

        // -- verify --
        assert!(matches!(a.closed().await, Some(LinkError::Closed(_))));
        assert!(c.state().is_active());
        c.send(Message::ping(silo(3000))).await;
        eventually("probe on surviving link", || d.statistics().probes_answered == 1).await;
    }
}
