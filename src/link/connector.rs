use crate::link::{spawn_link, LinkConfig, LinkError, LinkHandle};
use crate::resilience::{ExponentialBackoff, Retrier};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Opens a TCP connection to `endpoint`, retrying with exponential backoff, and waits until the
/// link on top of it has completed its handshake.
pub async fn connect_link(config: LinkConfig, endpoint: SocketAddr) -> Result<LinkHandle, LinkError> {
    let logger = config.logger.new(slog::o!("endpoint" => endpoint.to_string()));
    let options = &config.options;

    let retrier = Retrier::<TcpStream, io::Error>::new(options.connect_retries)
        .with_backoff(ExponentialBackoff::new(options.connect_backoff_base, options.connect_backoff_max).with_jitter(0.2));
    let connect_logger = logger.clone();
    let stream = retrier
        .operate(|attempt| {
            let logger = connect_logger.clone();
            async move {
                let result = TcpStream::connect(endpoint).await;
                if let Err(e) = &result {
                    slog::debug!(logger, "Connect attempt {} failed: {}", attempt, e);
                }
                result
            }
        })
        .await
        .map_err(|e| LinkError::Connect {
            endpoint,
            reason: e.to_string(),
        })?;

    if let Err(e) = stream.set_nodelay(true) {
        slog::debug!(logger, "Could not disable Nagle: {}", e);
    }

    let link = spawn_link(config, stream);
    let remote = link.established().await?;
    slog::info!(logger, "Connected to {}", remote);

    Ok(link)
}
