pub mod protocol;
pub mod websocket;

pub use protocol::*;
pub use websocket::*;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use url::Url;

use crate::session::SessionError;

/// Outbound half of the optimizer channel as seen by the session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    fn is_open(&self) -> bool;

    /// Send one message. Never buffered or retried: a closed channel yields
    /// `SessionError::ChannelUnavailable`.
    async fn send(&self, message: OutboundMessage) -> Result<(), SessionError>;
}

/// Stand-in used when no channel was opened, e.g. for offline commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

#[async_trait]
impl Transport for Disconnected {
    fn is_open(&self) -> bool {
        false
    }

    async fn send(&self, _message: OutboundMessage) -> Result<(), SessionError> {
        Err(SessionError::ChannelUnavailable)
    }
}

/// Optimizer endpoint for a page origin: `https` origins get `wss`, plain
/// `http` origins get `ws`.
pub fn optimizer_endpoint(origin: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(origin)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(anyhow!("Unsupported origin scheme: {}", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("Cannot switch {} to {}", origin, scheme))?;
    url.set_path(path);
    url.set_query(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_origin_uses_wss() {
        let url = optimizer_endpoint("https://app.example.com", "/ws/optimize").unwrap();
        assert_eq!(url.as_str(), "wss://app.example.com/ws/optimize");
    }

    #[test]
    fn test_plain_origin_uses_ws() {
        let url = optimizer_endpoint("http://localhost:8000/dashboard?tab=1", "/ws/optimize").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/optimize");
    }

    #[tokio::test]
    async fn test_disconnected_refuses_sends() {
        let payload = SweepPayload {
            symbol: "BTC/USDT".to_string(),
            timeframe: crate::types::TimeFrame::H1,
            days: 30,
            strategy: "RSI".to_string(),
            leverage: 1.0,
            param_ranges: Default::default(),
            n_trials: 10,
            token: None,
        };
        assert!(!Disconnected.is_open());
        assert_eq!(
            Disconnected.send(OutboundMessage::Sweep(payload)).await,
            Err(SessionError::ChannelUnavailable)
        );
    }

    #[test]
    fn test_unsupported_origin_rejected() {
        assert!(optimizer_endpoint("ftp://example.com", "/ws").is_err());
        assert!(optimizer_endpoint("not a url", "/ws").is_err());
    }
}
