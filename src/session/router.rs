use super::dedup::dedup_results;
use super::state::SessionState;
use crate::channel::InboundFrame;
use crate::types::{Progress, ResultRecord};

/// What the session should do with one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    Ignore,
    Progress(Progress),
    /// Results of the sweep in flight, already deduplicated.
    Complete(Vec<ResultRecord>),
    Failed(String),
}

/// Classify `frame` against the current state.
///
/// Frames are only acted on while a sweep is in flight and only when their
/// job type matches the mode of that sweep, so standard and chained runs can
/// share one channel.
pub fn route(state: &SessionState, frame: InboundFrame) -> RouteAction {
    let Some(mode) = state.mode() else {
        return RouteAction::Ignore;
    };
    if frame.job_type() != mode {
        return RouteAction::Ignore;
    }

    match frame {
        InboundFrame::Progress { current, total, .. } => {
            RouteAction::Progress(Progress::new(current, total))
        }
        InboundFrame::Complete { results, .. } => RouteAction::Complete(dedup_results(results)),
        InboundFrame::Error { error, .. } => RouteAction::Failed(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::JobType;

    fn running() -> SessionState {
        SessionState::Running {
            strategy: "RSI".to_string(),
            progress: Progress::new(0, 30),
        }
    }

    #[test]
    fn test_progress_routed_in_standard_mode() {
        let frame = InboundFrame::parse(r#"{"type":"progress","current":15,"total":30}"#).unwrap();
        assert_eq!(route(&running(), frame), RouteAction::Progress(Progress::new(15, 30)));
    }

    #[test]
    fn test_ultimate_frames_ignored_in_standard_mode() {
        for text in [
            r#"{"type":"progress","current":1,"total":2,"job_type":"ultimate"}"#,
            r#"{"type":"complete","results":[],"job_type":"ultimate"}"#,
            r#"{"type":"error","error":"boom","job_type":"ultimate"}"#,
        ] {
            let frame = InboundFrame::parse(text).unwrap();
            assert_eq!(frame.job_type(), JobType::Ultimate);
            assert_eq!(route(&running(), frame), RouteAction::Ignore);
        }
    }

    #[test]
    fn test_frames_ignored_when_idle() {
        let frame = InboundFrame::parse(r#"{"type":"error","error":"late"}"#).unwrap();
        assert_eq!(route(&SessionState::Idle, frame.clone()), RouteAction::Ignore);
        let failed = SessionState::Error {
            error: crate::session::SessionError::Disconnected,
        };
        assert_eq!(route(&failed, frame), RouteAction::Ignore);
    }

    #[test]
    fn test_complete_is_deduplicated() {
        let frame = InboundFrame::parse(
            r#"{"type":"complete","results":[
                {"params":{"period":14},"return":1.0,"win_rate":50.0,"trades":4},
                {"params":{"period":14},"return":2.0,"win_rate":60.0,"trades":5}
            ]}"#,
        )
        .unwrap();

        match route(&running(), frame) {
            RouteAction::Complete(results) => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].return_pct, 1.0);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_error_routed() {
        let frame = InboundFrame::parse(r#"{"type":"error","error":"no data for symbol"}"#).unwrap();
        assert_eq!(
            route(&running(), frame),
            RouteAction::Failed("no data for symbol".to_string())
        );
    }
}
