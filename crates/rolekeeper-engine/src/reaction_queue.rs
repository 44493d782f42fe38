// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-rule worker draining the reaction desired-state queue.
//!
//! The worker alternates between draining and idling. Each empty poll grows
//! the idle wait by one step up to a cap, and a wake signal resets it to
//! zero. A failed convergence is retried until the store parks the item as
//! failed-abort.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rolekeeper_config::model::ReactionQueueConfig;
use rolekeeper_core::MAX_CONVERGE_ATTEMPTS;
use rolekeeper_core::traits::ReconcileStore;
use rolekeeper_core::types::{QueueItemState, ReactionDesiredState, ReactionRule};

use crate::cascade::AutoRoleCascade;
use crate::registry::WorkerHandle;
use crate::remote::Remote;

/// Idle and retry tuning for reaction workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionQueueSettings {
    pub idle_step: Duration,
    pub idle_max: Duration,
    pub max_attempts: u32,
}

impl Default for ReactionQueueSettings {
    fn default() -> Self {
        Self {
            idle_step: Duration::from_millis(250),
            idle_max: Duration::from_secs(5),
            max_attempts: MAX_CONVERGE_ATTEMPTS,
        }
    }
}

impl ReactionQueueSettings {
    pub fn from_config(config: &ReactionQueueConfig) -> Self {
        Self {
            idle_step: Duration::from_millis(config.idle_step_ms),
            idle_max: Duration::from_millis(config.idle_max_ms),
            max_attempts: config.max_attempts,
        }
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        (current + self.idle_step).min(self.idle_max)
    }
}

/// Converges one rule's queue until cancelled.
pub struct ReactionWorker {
    rule: ReactionRule,
    store: Arc<dyn ReconcileStore>,
    remote: Remote,
    cascade: Arc<AutoRoleCascade>,
    settings: ReactionQueueSettings,
    cancel: CancellationToken,
    wake: Arc<Notify>,
}

impl ReactionWorker {
    pub fn new(
        rule: ReactionRule,
        store: Arc<dyn ReconcileStore>,
        remote: Remote,
        cascade: Arc<AutoRoleCascade>,
        settings: ReactionQueueSettings,
    ) -> Self {
        Self {
            rule,
            store,
            remote,
            cascade,
            settings,
            cancel: CancellationToken::new(),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Runs the worker on its own task.
    pub fn spawn(self) -> WorkerHandle {
        let cancel = self.cancel.clone();
        let wake = self.wake.clone();
        let task = tokio::spawn(self.run());
        WorkerHandle::new(cancel, wake, task)
    }

    pub async fn run(self) {
        let rule_id = self.rule.id;
        info!(rule_id, role_id = %self.rule.role_id, "reaction worker started");

        let mut backoff = Duration::ZERO;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let wait = match self.store.dequeue(rule_id).await {
                Ok(Some(item)) => {
                    backoff = Duration::ZERO;
                    if self.converge(item).await {
                        continue;
                    }
                    self.settings.idle_step
                }
                Ok(None) => {
                    let wait = backoff;
                    backoff = self.settings.next_backoff(backoff);
                    wait
                }
                Err(e) => {
                    warn!(rule_id, error = %e, "dequeue failed");
                    backoff = self.settings.next_backoff(backoff);
                    backoff
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {
                    debug!(rule_id, "queue delay reset");
                    backoff = Duration::ZERO;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!(rule_id, "reaction worker stopped");
    }

    /// Drives one item to its requested state. Returns whether it converged.
    async fn converge(&self, item: ReactionDesiredState) -> bool {
        let rule_id = self.rule.id;
        let user = item.user_id;

        let converged = match self.remote.get_member(self.rule.guild_id, user).await {
            Ok(Some(member)) => {
                if item.requested {
                    self.cascade.assign(&member, self.rule.role_id).await
                } else {
                    self.cascade.remove(&member, self.rule.role_id).await
                }
            }
            Ok(None) => {
                debug!(rule_id, user_id = %user, "member left the guild, dropping intent");
                true
            }
            Err(e) => {
                warn!(rule_id, user_id = %user, error = %e, "member lookup failed");
                false
            }
        };

        if converged {
            match self.store.complete(rule_id, user, item.change_counter).await {
                Ok(true) => debug!(rule_id, user_id = %user, requested = item.requested, "converged"),
                Ok(false) => debug!(rule_id, user_id = %user, "intent changed mid-flight, requeued"),
                Err(e) => warn!(rule_id, user_id = %user, error = %e, "could not complete queue item"),
            }
            return true;
        }

        match self
            .store
            .fail(rule_id, user, item.change_counter, self.settings.max_attempts)
            .await
        {
            Ok(Some(QueueItemState::FailedAbort)) => warn!(
                rule_id,
                user_id = %user,
                attempts = item.attempts + 1,
                "convergence abandoned, item parked as failed-abort"
            ),
            Ok(Some(state)) => debug!(
                rule_id,
                user_id = %user,
                attempts = item.attempts + 1,
                %state,
                "convergence failed, will retry"
            ),
            Ok(None) => debug!(rule_id, user_id = %user, "failed intent was superseded"),
            Err(e) => warn!(rule_id, user_id = %user, error = %e, "could not record failure"),
        }
        false
    }
}
