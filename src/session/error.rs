use thiserror::Error;

/// Failures surfaced by the optimization session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("optimizer channel not connected")]
    ChannelUnavailable,

    #[error("optimizer error: {0}")]
    Backend(String),

    #[error("optimizer channel disconnected")]
    Disconnected,

    #[error("optimizer did not respond within {seconds}s")]
    TimedOut { seconds: u64 },

    #[error("ultimate optimization requires a paid plan (current plan: {plan})")]
    EntitlementDenied { plan: String },

    #[error("an optimization is already running")]
    AlreadyRunning,

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid sweep request: {0}")]
    InvalidRequest(String),

    #[error("no strategy has presets to chain")]
    EmptyChain,
}
