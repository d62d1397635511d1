use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{ParamRanges, ResultRecord, SweepRequest, TimeFrame};

/// Which kind of job a frame belongs to. Absent on the wire means standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    Standard,
    Ultimate,
}

/// Frames pushed by the optimizer backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    Progress {
        current: u64,
        total: u64,
        #[serde(default)]
        job_type: Option<JobType>,
    },
    Complete {
        #[serde(default)]
        results: Vec<ResultRecord>,
        #[serde(default)]
        job_type: Option<JobType>,
    },
    Error {
        #[serde(default)]
        error: String,
        #[serde(default)]
        job_type: Option<JobType>,
    },
}

impl InboundFrame {
    /// Parse one text frame. Unknown or malformed frames yield `None`,
    /// except terminal frames (`complete`, `error`) whose body does not
    /// decode: those become an `Error` frame so the sweep still ends.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!("Dropping unrecognized frame ({}): {}", e, text);
                return None;
            }
        };

        let kind = value.get("type").and_then(Value::as_str).map(str::to_string);
        let job_type = value
            .get("job_type")
            .and_then(|v| JobType::deserialize(v).ok());

        match serde_json::from_value(value) {
            Ok(frame) => Some(frame),
            Err(e) => match kind.as_deref() {
                Some(kind @ ("complete" | "error")) => {
                    warn!("Malformed {} frame ({}): {}", kind, e, text);
                    Some(InboundFrame::Error {
                        error: format!("malformed {} frame from optimizer: {}", kind, e),
                        job_type,
                    })
                }
                _ => {
                    debug!("Dropping unrecognized frame ({}): {}", e, text);
                    None
                }
            },
        }
    }

    pub fn job_type(&self) -> JobType {
        let job_type = match self {
            InboundFrame::Progress { job_type, .. }
            | InboundFrame::Complete { job_type, .. }
            | InboundFrame::Error { job_type, .. } => job_type,
        };
        job_type.unwrap_or_default()
    }
}

/// Wire form of one sweep submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPayload {
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub days: u32,
    pub strategy: String,
    pub leverage: f64,
    pub param_ranges: ParamRanges,
    pub n_trials: u32,
    pub token: Option<String>,
}

impl SweepPayload {
    pub fn new(request: &SweepRequest, token: Option<String>) -> Self {
        Self {
            symbol: request.symbol.clone(),
            timeframe: request.timeframe,
            days: request.lookback_days,
            strategy: request.strategy.clone(),
            leverage: request.leverage,
            param_ranges: request.param_ranges.clone(),
            n_trials: request.trial_count,
            token,
        }
    }
}

/// Messages the client sends on the optimizer channel.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Sweep(SweepPayload),
    Ultimate(Vec<SweepPayload>),
}

#[derive(Serialize)]
struct UltimateEnvelope<'a> {
    #[serde(rename = "type")]
    kind: JobType,
    tasks: &'a [SweepPayload],
}

impl OutboundMessage {
    pub fn job_type(&self) -> JobType {
        match self {
            OutboundMessage::Sweep(_) => JobType::Standard,
            OutboundMessage::Ultimate(_) => JobType::Ultimate,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            OutboundMessage::Sweep(payload) => serde_json::to_string(payload),
            OutboundMessage::Ultimate(tasks) => serde_json::to_string(&UltimateEnvelope {
                kind: JobType::Ultimate,
                tasks,
            }),
        }
    }
}
