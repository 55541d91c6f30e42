use crate::handshake::{ConnectionPreamble, HandshakeError};
use bytes::{Bytes, BytesMut};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::io;
use std::time::Duration;

/// Writes `local` and reads the peer's preamble at the same time, then validates what the peer
/// sent. Succeeds only when both the write has completed and the peer's preamble is acceptable.
///
/// `sink` and `stream` are the two halves of one framed connection. No frame beyond the preamble
/// is read from `stream`.
pub async fn exchange_preambles<W, R>(
    sink: &mut W,
    stream: &mut R,
    local: &ConnectionPreamble,
    timeout: Duration,
) -> Result<ConnectionPreamble, HandshakeError>
where
    W: Sink<Bytes, Error = io::Error> + Unpin,
    R: Stream<Item = Result<BytesMut, io::Error>> + Unpin,
{
    let frame = local.encode()?;

    let write_own = async {
        sink.send(frame).await?;
        Ok::<(), HandshakeError>(())
    };
    let read_peer = async {
        match stream.next().await {
            Some(Ok(frame)) => ConnectionPreamble::decode(frame.freeze()),
            Some(Err(e)) => Err(HandshakeError::from(e)),
            None => Err(HandshakeError::ConnectionClosed),
        }
    };

    let (_, peer) = tokio::time::timeout(timeout, async { tokio::try_join!(write_own, read_peer) })
        .await
        .map_err(|_| HandshakeError::TimedOut(timeout))??;

    peer.validate(&local.cluster_id)?;
    Ok(peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SiloAddress;
    use std::net::SocketAddr;
    use tokio::io::DuplexStream;
    use tokio_util::codec::{Framed, LengthDelimitedCodec};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn silo(port: u16) -> SiloAddress {
        SiloAddress::new(SocketAddr::from(([127, 0, 0, 1], port)), 3)
    }

    fn framed_pair() -> (
        Framed<DuplexStream, LengthDelimitedCodec>,
        Framed<DuplexStream, LengthDelimitedCodec>,
    ) {
        let (a, b) = tokio::io::duplex(4096);
        (
            Framed::new(a, LengthDelimitedCodec::new()),
            Framed::new(b, LengthDelimitedCodec::new()),
        )
    }

    #[tokio::test]
    async fn both_sides_learn_each_other() {
        // -- setup --
        let (left, right) = framed_pair();
        let (mut left_tx, mut left_rx) = left.split();
        let (mut right_tx, mut right_rx) = right.split();
        let left_preamble = ConnectionPreamble::for_silo(silo(1000), "c1");
        let right_preamble = ConnectionPreamble::for_silo(silo(2000), "c1");

        // -- execute --
        let (left_result, right_result) = tokio::join!(
            exchange_preambles(&mut left_tx, &mut left_rx, &left_preamble, TIMEOUT),
            exchange_preambles(&mut right_tx, &mut right_rx, &right_preamble, TIMEOUT),
        );

        // -- verify --
        assert_eq!(left_result.unwrap(), right_preamble);
        assert_eq!(right_result.unwrap(), left_preamble);
    }

    #[tokio::test]
    async fn cluster_mismatch_fails_both_sides() {
        // -- setup --
        let (left, right) = framed_pair();
        let (mut left_tx, mut left_rx) = left.split();
        let (mut right_tx, mut right_rx) = right.split();
        let left_preamble = ConnectionPreamble::for_silo(silo(1000), "blue");
        let right_preamble = ConnectionPreamble::for_silo(silo(2000), "green");

        // -- execute --
        let (left_result, right_result) = tokio::join!(
            exchange_preambles(&mut left_tx, &mut left_rx, &left_preamble, TIMEOUT),
            exchange_preambles(&mut right_tx, &mut right_rx, &right_preamble, TIMEOUT),
        );

        // -- verify --
        assert!(matches!(left_result, Err(HandshakeError::ClusterIdMismatch { .. })));
        assert!(matches!(right_result, Err(HandshakeError::ClusterIdMismatch { .. })));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        // -- setup --
        let (left, _right) = framed_pair();
        let (mut left_tx, mut left_rx) = left.split();

        // -- execute --
        let result = exchange_preambles(
            &mut left_tx,
            &mut left_rx,
            &ConnectionPreamble::for_silo(silo(1000), "c1"),
            Duration::from_millis(50),
        )
        .await;

        // -- verify --
        assert!(matches!(result, Err(HandshakeError::TimedOut(_))));
    }

    #[tokio::test]
    async fn peer_hang_up_is_reported() {
        // -- setup --
        let (left, right) = framed_pair();
        let (mut left_tx, mut left_rx) = left.split();
        drop(right);

        // -- execute --
        let result = exchange_preambles(
            &mut left_tx,
            &mut left_rx,
            &ConnectionPreamble::for_silo(silo(1000), "c1"),
            TIMEOUT,
        )
        .await;

        // -- verify --
        match result {
            Err(HandshakeError::ConnectionClosed) | Err(HandshakeError::Io(_)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }
}
