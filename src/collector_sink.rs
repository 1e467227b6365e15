use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Local stand-in for a Graphite collector: logs every received line.
pub async fn spawn(port: u16) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        loop {
            let Ok((socket, peer)) = listener.accept().await else {
                continue;
            };
            debug!(%peer, "collector connection accepted");

            tokio::spawn(async move {
                let mut lines = BufReader::new(socket).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "collector", "{line}");
                }
                debug!(%peer, "collector connection closed");
            });
        }
    });

    Ok(addr)
}
