use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },
}

/// An open duplex connection as a pair of channels.
///
/// Dropping `outgoing` closes the socket; `incoming` yields `None` once the
/// peer is gone.
pub struct Link {
    pub outgoing: mpsc::UnboundedSender<Vec<u8>>,
    pub incoming: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Opens connections for the transport manager
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Link, TransportError>;
}

/// Binary-frame WebSocket connector backed by `tokio-tungstenite`
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<Link, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<Vec<u8>>();

        tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
            debug!("WebSocket writer closed");
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Binary(data)) => {
                        if incoming_tx.send(data).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Text(text)) => {
                        debug!(len = text.len(), "Ignoring text message");
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "WebSocket closed by peer");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(Link { outgoing, incoming })
    }
}
