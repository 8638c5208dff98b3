//! # FeedServer: TCP subscribers.
//!
//! Every accepted connection becomes one [`ChannelSink`] in the registry.
//!
//! ## Connection lifecycle
//! ```text
//! accept ──► ChannelSink::new(peer, capacity) ──► registry.add
//!              │
//!   loop { select!
//!     ├─ token cancelled        → stop ("shutdown")
//!     ├─ rx.recv() = frame      → write_all(frame); error → stop ("write failed")
//!     ├─ rx.recv() = None       → stop ("evicted")
//!     └─ read(socket)           → 0 bytes → stop ("peer closed"); data ignored
//!   }
//!              │
//!              └──► registry.remove(id), shutdown write half
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::error::FeedError;
use crate::subscribers::{ChannelSink, SubscriberRegistry};

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts subscribers and wires each one into the registry.
pub struct FeedServer {
    listener: TcpListener,
    registry: Arc<SubscriberRegistry>,
    capacity: usize,
}

impl FeedServer {
    /// Binds the listener.
    ///
    /// `capacity` is the queue size of each connection's sink (minimum 1).
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<SubscriberRegistry>,
        capacity: usize,
    ) -> Result<Self, FeedError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| FeedError::Bind { addr, source })?;
        Ok(Self {
            listener,
            registry,
            capacity: capacity.max(1),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, FeedError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `token` is cancelled.
    ///
    /// Connection tasks observe the same token and deregister on the way out.
    pub async fn run(self, token: CancellationToken) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "listening for subscribers");
        }
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            Arc::clone(&self.registry),
                            self.capacity,
                            token.child_token(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        if !accept_backoff(&token).await {
                            break;
                        }
                    }
                },
            }
        }
        tracing::debug!("listener stopped");
    }
}

/// Waits out [`ACCEPT_BACKOFF`]. Returns `false` if `token` was cancelled first.
async fn accept_backoff(token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    capacity: usize,
    token: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%peer, error = %e, "set_nodelay failed");
    }
    let (mut reader, mut writer) = stream.into_split();
    let (sink, mut rx) = ChannelSink::new(peer.to_string(), capacity);
    let id = registry.add(Arc::new(sink)).await;
    tracing::info!(%peer, sink = %id, "subscriber connected");

    let mut scratch = [0u8; 512];
    let reason = loop {
        tokio::select! {
            _ = token.cancelled() => break "shutdown",
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.write_all(&frame).await {
                        tracing::debug!(%peer, error = %e, "write failed");
                        break "write failed";
                    }
                }
                None => break "evicted",
            },
            read = reader.read(&mut scratch) => match read {
                Ok(0) => break "peer closed",
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "read failed");
                    break "read failed";
                }
            },
        }
    };

    registry.remove(id).await;
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(%peer, error = %e, "socket shutdown failed");
    }
    tracing::info!(%peer, sink = %id, reason, "subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{FeedCodec, Message, StateCode};
    use futures::StreamExt;
    use std::net::Ipv4Addr;
    use tokio_util::codec::FramedRead;

    async fn start() -> (SocketAddr, Arc<SubscriberRegistry>, CancellationToken) {
        let registry = Arc::new(SubscriberRegistry::new());
        let server = FeedServer::bind(
            SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            Arc::clone(&registry),
            16,
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let token = CancellationToken::new();
        tokio::spawn(server.run(token.clone()));
        (addr, registry, token)
    }

    async fn wait_for_len(registry: &SubscriberRegistry, want: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.len().await != want {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry never reached expected size");
    }

    #[tokio::test]
    async fn test_end_to_end_delivery() {
        let (addr, registry, token) = start().await;

        let a = TcpStream::connect(addr).await.unwrap();
        let b = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&registry, 2).await;

        let mut a = FramedRead::new(a, FeedCodec::new());
        let mut b = FramedRead::new(b, FeedCodec::new());

        registry
            .broadcast(&Message::status("K1", StateCode::STARTED))
            .await;
        registry.broadcast(&Message::raw("hello")).await;

        for client in [&mut a, &mut b] {
            assert_eq!(client.next().await.unwrap().unwrap(), "STT0|K1|K1|1");
            assert_eq!(client.next().await.unwrap().unwrap(), "hello");
        }
        token.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_removes_sink() {
        let (addr, registry, token) = start().await;

        let stays = TcpStream::connect(addr).await.unwrap();
        let leaves = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&registry, 2).await;

        drop(leaves);
        wait_for_len(&registry, 1).await;

        let mut stays = FramedRead::new(stays, FeedCodec::new());
        let report = registry.broadcast(&Message::raw("after")).await;
        assert_eq!(report.delivered, 1);
        assert!(report.evicted.is_empty());
        assert_eq!(stays.next().await.unwrap().unwrap(), "after");
        token.cancel();
    }

    #[tokio::test]
    async fn test_inbound_bytes_ignored() {
        let (addr, registry, token) = start().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&registry, 1).await;
        client.write_all(b"anything at all\n").await.unwrap();

        let mut client = FramedRead::new(client, FeedCodec::new());
        registry.broadcast(&Message::raw("still here")).await;
        assert_eq!(client.next().await.unwrap().unwrap(), "still here");
        assert_eq!(registry.len().await, 1);
        token.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let (addr, registry, token) = start().await;

        let client = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&registry, 1).await;

        token.cancel();
        wait_for_len(&registry, 0).await;

        let mut client = FramedRead::new(client, FeedCodec::new());
        let next = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_backoff_waits() {
        let token = CancellationToken::new();
        let started = tokio::time::Instant::now();
        assert!(accept_backoff(&token).await);
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_backoff_cut_short_by_shutdown() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let started = tokio::time::Instant::now();
        assert!(!accept_backoff(&token).await);
        assert!(started.elapsed() < ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let taken = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = taken.local_addr().unwrap();

        let err = FeedServer::bind(addr, Arc::new(SubscriberRegistry::new()), 1)
            .await
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "feed_bind_failed");
    }
}
