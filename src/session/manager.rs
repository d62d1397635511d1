use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::chain::{tag_results, SweepQueue};
use super::error::SessionError;
use super::router::{route, RouteAction};
use super::state::{SessionState, SessionStatus};
use crate::account::{SubscriptionStatus, TokenStore};
use crate::channel::{InboundFrame, OutboundMessage, SweepPayload, Transport};
use crate::notifications::{AlertType, NotificationManager};
use crate::storage::SessionStore;
use crate::strategies::StrategyRegistry;
use crate::types::{Progress, ResultRecord, SweepRequest, SweepSettings};

/// Changes the rendering layer can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionStatus),
    Progress(Progress),
    ResultsUpdated(usize),
    SettingsUpdated,
}

/// Owns the optimization session: submits sweeps over the optimizer channel,
/// applies inbound frames, and keeps the persisted result set current.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    store: SessionStore,
    registry: Arc<StrategyRegistry>,
    notifications: Arc<NotificationManager>,
    state: SessionState,
    results: Vec<ResultRecord>,
    settings: SweepSettings,
    sweep_timeout: Option<Duration>,
    deadline: Option<Instant>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
        store: SessionStore,
        registry: Arc<StrategyRegistry>,
        notifications: Arc<NotificationManager>,
        sweep_timeout: Option<Duration>,
    ) -> Self {
        let results = store.load_results();
        let settings = store.load_settings(&registry);
        let (events, _) = broadcast::channel(64);

        info!(
            "Session restored: {} stored results, strategy {}",
            results.len(),
            settings.strategy
        );

        Self {
            transport,
            tokens,
            store,
            registry,
            notifications,
            state: SessionState::Idle,
            results,
            settings,
            sweep_timeout,
            deadline: None,
            events,
        }
    }

    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    pub fn progress(&self) -> Option<Progress> {
        self.state.progress()
    }

    pub fn is_optimizing(&self) -> bool {
        self.state.is_optimizing()
    }

    pub fn channel_connected(&self) -> bool {
        self.transport.is_open()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the last sweep ended early, if it did.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.state.error()
    }

    /// Sweeps finished and total sweeps of the running chain.
    pub fn chain_position(&self) -> Option<(usize, usize)> {
        match &self.state {
            SessionState::ChainRunning { completed, total, .. } => Some((*completed, *total)),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Replace the governing sweep settings. Results computed under other
    /// settings are cleared.
    pub fn update_settings(&mut self, settings: SweepSettings) -> Result<(), SessionError> {
        if self.is_optimizing() {
            return Err(SessionError::AlreadyRunning);
        }
        if self.registry.get(&settings.strategy).is_none() {
            return Err(SessionError::UnknownStrategy(settings.strategy));
        }
        if settings == self.settings {
            return Ok(());
        }

        self.settings = settings;
        if let Err(e) = self.store.save_settings(&self.settings) {
            error!("Failed to persist sweep settings: {}", e);
        }
        let _ = self.events.send(SessionEvent::SettingsUpdated);

        if !self.results.is_empty() {
            info!("Sweep settings changed, clearing {} results", self.results.len());
            self.results.clear();
            self.persist_results();
        }
        Ok(())
    }

    /// Submit a sweep built from the current settings.
    pub async fn run_configured_sweep(&mut self) -> Result<(), SessionError> {
        let request = SweepRequest::from_settings(&self.registry, &self.settings)?;
        self.run_sweep(request).await
    }

    /// Submit one standard sweep. Prior results are cleared once the
    /// request is on the wire.
    pub async fn run_sweep(&mut self, request: SweepRequest) -> Result<(), SessionError> {
        if self.is_optimizing() {
            return Err(SessionError::AlreadyRunning);
        }

        let payload = SweepPayload::new(&request, self.token());
        self.dispatch(OutboundMessage::Sweep(payload)).await?;

        info!(
            "Sweep submitted: {} on {} {} ({} trials)",
            request.strategy, request.symbol, request.timeframe, request.trial_count
        );

        self.results.clear();
        self.persist_results();
        self.arm_deadline();
        self.set_state(SessionState::Running {
            strategy: request.strategy.clone(),
            progress: Progress::new(0, request.trial_count as u64),
        });

        self.notifications
            .notify(AlertType::SweepStarted {
                strategy: request.strategy,
                symbol: request.symbol,
                trials: request.trial_count,
            })
            .await;
        Ok(())
    }

    /// Run one sweep per strategy, back to back, accumulating tagged results.
    pub async fn run_chain(&mut self, subscription: &SubscriptionStatus) -> Result<(), SessionError> {
        if self.is_optimizing() {
            return Err(SessionError::AlreadyRunning);
        }
        if !subscription.is_paid() {
            self.notifications
                .notify(AlertType::UpgradeRequired {
                    plan: subscription.plan.clone(),
                })
                .await;
            return Err(SessionError::EntitlementDenied {
                plan: subscription.plan.clone(),
            });
        }

        let mut queue = SweepQueue::build(&self.registry, &self.settings)?;
        let first = queue.pop_next().ok_or(SessionError::EmptyChain)?;
        let total = queue.len() + 1;

        let payload = SweepPayload::new(&first, self.token());
        self.dispatch(OutboundMessage::Ultimate(vec![payload])).await?;

        let mut strategies = vec![first.strategy.clone()];
        strategies.extend(queue.strategies());
        info!("Ultimate optimization started: {}", strategies.join(", "));

        self.results.clear();
        self.persist_results();
        self.arm_deadline();
        self.set_state(SessionState::ChainRunning {
            progress: Progress::new(0, first.trial_count as u64),
            active: first,
            queue,
            completed: 0,
            total,
        });

        self.notifications
            .notify(AlertType::ChainStarted { strategies })
            .await;
        Ok(())
    }

    /// Apply one inbound frame.
    pub async fn handle_frame(&mut self, frame: InboundFrame) {
        match route(&self.state, frame) {
            RouteAction::Ignore => {
                debug!("Ignoring frame in state {}", self.state.status());
            }
            RouteAction::Progress(update) => self.apply_progress(update),
            RouteAction::Complete(results) => {
                if matches!(self.state, SessionState::ChainRunning { .. }) {
                    self.complete_chain_step(results).await;
                } else {
                    self.complete_sweep(results).await;
                }
            }
            RouteAction::Failed(message) => self.fail(message).await,
        }
    }

    /// The channel closed. Any sweep in flight can no longer finish.
    pub async fn handle_channel_closed(&mut self) {
        if self.is_optimizing() {
            warn!("Optimizer channel closed during {}", self.state.status());
            self.deadline = None;
            self.set_state(SessionState::Error {
                error: SessionError::Disconnected,
            });
        }
        self.notifications
            .notify(AlertType::ConnectionLost {
                service: "optimizer".to_string(),
            })
            .await;
    }

    /// Abandon the sweep in flight if the optimizer went quiet for longer
    /// than the configured timeout. Returns true when it did.
    pub async fn check_timeout(&mut self, now: Instant) -> bool {
        let expired = matches!(self.deadline, Some(deadline) if now >= deadline);
        if !expired || !self.is_optimizing() {
            return false;
        }

        let seconds = self.sweep_timeout.map(|t| t.as_secs()).unwrap_or_default();
        if let SessionState::ChainRunning { queue, .. } = &self.state {
            warn!("Chain timed out, skipping {} remaining sweeps", queue.len());
        }
        warn!("No optimizer frame for {}s, abandoning {}", seconds, self.state.status());
        self.deadline = None;
        self.set_state(SessionState::Error {
            error: SessionError::TimedOut { seconds },
        });
        self.notifications
            .notify(AlertType::SweepTimedOut { seconds })
            .await;
        true
    }

    pub async fn clear_results(&mut self) {
        self.results.clear();
        if let Err(e) = self.store.clear_results() {
            error!("Failed to remove stored results: {}", e);
        }
        let _ = self.events.send(SessionEvent::ResultsUpdated(0));
        self.notifications.notify(AlertType::ResultsCleared).await;
    }

    async fn dispatch(&self, message: OutboundMessage) -> Result<(), SessionError> {
        let sent = if self.transport.is_open() {
            self.transport.send(message).await
        } else {
            Err(SessionError::ChannelUnavailable)
        };

        if matches!(sent, Err(SessionError::ChannelUnavailable)) {
            self.notifications.notify(AlertType::ChannelNotConnected).await;
        }
        sent
    }

    fn apply_progress(&mut self, update: Progress) {
        match &mut self.state {
            SessionState::Running { progress, .. } | SessionState::ChainRunning { progress, .. } => {
                *progress = update;
            }
            _ => return,
        }
        self.arm_deadline();
        let _ = self.events.send(SessionEvent::Progress(update));
    }

    async fn complete_sweep(&mut self, results: Vec<ResultRecord>) {
        let strategy = match &self.state {
            SessionState::Running { strategy, .. } => strategy.clone(),
            _ => return,
        };

        info!("Sweep complete: {} unique results for {}", results.len(), strategy);
        self.results = results;
        self.persist_results();
        self.deadline = None;
        self.set_state(SessionState::Idle);

        self.notifications
            .notify(AlertType::SweepCompleted {
                strategy,
                results: self.results.len(),
            })
            .await;
    }

    async fn complete_chain_step(&mut self, results: Vec<ResultRecord>) {
        let SessionState::ChainRunning {
            active,
            mut queue,
            completed,
            total,
            ..
        } = std::mem::take(&mut self.state)
        else {
            return;
        };

        let batch = tag_results(results, &active.strategy);
        let batch_len = batch.len();
        self.results.extend(batch);
        self.persist_results();

        let completed = completed + 1;
        info!(
            "Chain step {}/{} complete: {} results for {}",
            completed, total, batch_len, active.strategy
        );
        self.notifications
            .notify(AlertType::ChainStepCompleted {
                strategy: active.strategy.clone(),
                results: batch_len,
                remaining: queue.len(),
            })
            .await;

        let Some(next) = queue.pop_next() else {
            self.deadline = None;
            self.set_state(SessionState::Idle);
            self.notifications
                .notify(AlertType::ChainCompleted {
                    strategies: completed,
                    results: self.results.len(),
                })
                .await;
            return;
        };

        let payload = SweepPayload::new(&next, self.token());
        match self.dispatch(OutboundMessage::Ultimate(vec![payload])).await {
            Ok(()) => {
                debug!("Dispatched chained sweep for {}", next.strategy);
                self.arm_deadline();
                self.set_state(SessionState::ChainRunning {
                    progress: Progress::new(0, next.trial_count as u64),
                    active: next,
                    queue,
                    completed,
                    total,
                });
            }
            Err(e) => {
                self.deadline = None;
                let message = e.to_string();
                self.set_state(SessionState::Error { error: e });
                self.notifications
                    .notify(AlertType::ChainAborted {
                        strategy: next.strategy,
                        message,
                    })
                    .await;
            }
        }
    }

    async fn fail(&mut self, message: String) {
        let alert = match &self.state {
            SessionState::ChainRunning { active, queue, .. } => {
                warn!(
                    "Chain aborted at {} ({} sweeps skipped): {}",
                    active.strategy,
                    queue.len(),
                    message
                );
                AlertType::ChainAborted {
                    strategy: active.strategy.clone(),
                    message: message.clone(),
                }
            }
            _ => AlertType::SweepFailed {
                message: message.clone(),
            },
        };

        self.deadline = None;
        self.set_state(SessionState::Error {
            error: SessionError::Backend(message),
        });
        self.notifications.notify(alert).await;
    }

    fn token(&self) -> Option<String> {
        let token = self.tokens.get_token();
        if token.is_none() {
            warn!("No auth token available, sending sweep without credentials");
        }
        token
    }

    fn arm_deadline(&mut self) {
        self.deadline = self.sweep_timeout.map(|t| Instant::now() + t);
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        let _ = self.events.send(SessionEvent::StateChanged(self.state.status()));
    }

    fn persist_results(&self) {
        if let Err(e) = self.store.save_results(&self.results) {
            error!("Failed to persist results: {}", e);
        }
        let _ = self.events.send(SessionEvent::ResultsUpdated(self.results.len()));
    }
}
