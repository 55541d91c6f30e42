use crate::link::signal::CloseSignal;
use crate::link::{spawn_link, LinkConfig, LinkHandle};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// LinkListener accepts inbound connections from other silos. Every accepted connection becomes
/// an independent link; its handle is passed on through `accepted` as soon as the link starts.
pub struct LinkListener {
    logger: slog::Logger,
    config: LinkConfig,
    listener: TcpListener,
}

impl LinkListener {
    pub async fn bind(config: LinkConfig, socket_addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(socket_addr).await?;
        let logger = config
            .logger
            .new(slog::o!("listener" => listener.local_addr()?.to_string()));

        Ok(LinkListener {
            logger,
            config,
            listener,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self, mut shutdown_signal: CloseSignal, accepted: mpsc::Sender<LinkHandle>) {
        slog::info!(self.logger, "Listening");

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => break,
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        slog::debug!(self.logger, "Accepted connection from {}", peer);
                        if let Err(e) = stream.set_nodelay(true) {
                            slog::debug!(self.logger, "Could not disable Nagle: {}", e);
                        }

                        let link = spawn_link(self.config.clone(), stream);
                        if accepted.send(link).await.is_err() {
                            slog::info!(self.logger, "Nobody is taking accepted links anymore");
                            break;
                        }
                    }
                    // One bad accept (e.g. fd exhaustion) shouldn't stop the listener.
                    Err(e) => slog::warn!(self.logger, "Accept failed: {}", e),
                },
            }
        }

        slog::info!(self.logger, "Listener run() has exited");
    }
}
