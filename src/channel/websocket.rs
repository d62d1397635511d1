use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Error as WsError, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::protocol::{InboundFrame, OutboundMessage};
use super::Transport;
use crate::session::SessionError;

/// Events the channel reports to its owner, in arrival order.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Frame(InboundFrame),
    Error(String),
    /// The channel is gone for good. There is no reconnection.
    Closed,
}

/// The single persistent connection to the optimizer service.
pub struct OptimizerChannel {
    outbound: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
}

impl OptimizerChannel {
    pub async fn connect(endpoint: &Url) -> Result<(Self, mpsc::Receiver<ChannelEvent>)> {
        info!("Connecting to optimizer: {}", endpoint);

        let (ws_stream, _) = connect_async(endpoint.as_str()).await?;
        let (mut write, read) = ws_stream.split();

        info!("Optimizer channel connected");

        let open = Arc::new(AtomicBool::new(true));
        let (event_tx, event_rx) = mpsc::channel(256);
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);

        let writer_open = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    error!("Optimizer channel write failed: {}", e);
                    writer_open.store(false, Ordering::Release);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_open = Arc::clone(&open);
        tokio::spawn(async move {
            Self::read_loop(read, event_tx.clone()).await;
            reader_open.store(false, Ordering::Release);
            let _ = event_tx.send(ChannelEvent::Closed).await;
        });

        Ok((
            Self {
                outbound: out_tx,
                open,
            },
            event_rx,
        ))
    }

    async fn read_loop<S>(mut read: S, tx: mpsc::Sender<ChannelEvent>)
    where
        S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(frame) = InboundFrame::parse(&text) {
                        if tx.send(ChannelEvent::Frame(frame)).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(Message::Ping(_)) => {
                    debug!("Received ping");
                }
                Ok(Message::Close(_)) => {
                    info!("Optimizer channel closed by server");
                    break;
                }
                Err(e) => {
                    error!("Optimizer channel error: {}", e);
                    let _ = tx.send(ChannelEvent::Error(e.to_string())).await;
                    break;
                }
                _ => {}
            }
        }
    }

    /// Close the channel if it is still open. A closed channel stays closed.
    pub async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("Closing optimizer channel");
            if self.outbound.send(Message::Close(None)).await.is_err() {
                warn!("Optimizer channel writer already stopped");
            }
        }
    }
}

#[async_trait]
impl Transport for OptimizerChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::ChannelUnavailable);
        }

        let text = message
            .to_json()
            .map_err(|e| SessionError::InvalidRequest(e.to_string()))?;
        debug!("Sending {:?} sweep ({} bytes)", message.job_type(), text.len());

        self.outbound
            .send(Message::Text(text))
            .await
            .map_err(|_| SessionError::ChannelUnavailable)
    }
}
