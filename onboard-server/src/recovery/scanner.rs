//! Stuck request recovery
//!
//! Two sweeps per tick:
//!
//! 1. `approval_in_progress` older than the in-progress threshold: if the
//!    identity account exists, advance to `user_created`; otherwise revert to
//!    `pending`.
//! 2. `user_created` older than the user-created threshold: finish activation.
//!
//! Every repair is a conditional transition, so re-running a sweep against
//! repaired requests changes nothing.

use std::sync::Arc;
use std::time::Duration;

use shared::types::Timestamp;
use shared::util::now_millis;
use shared::{OnboardingRequest, OnboardingStatus};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::identity::IdentityClient;
use crate::onboarding::OnboardingService;

/// Shortest accepted sweep interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Age after which `approval_in_progress` counts as stuck
    pub in_progress_max_age: Duration,
    /// Age after which `user_created` counts as stuck
    pub user_created_max_age: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            in_progress_max_age: Duration::from_secs(180),
            user_created_max_age: Duration::from_secs(180),
        }
    }
}

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Stuck requests found
    pub examined: usize,
    /// `approval_in_progress -> user_created`
    pub advanced: usize,
    /// `approval_in_progress -> pending`
    pub reverted: usize,
    /// `user_created -> active`
    pub activated: usize,
    /// Already moved by another actor
    pub skipped: usize,
    pub errors: usize,
}

impl RecoveryReport {
    /// Nothing was repaired and nothing failed
    pub fn is_noop(&self) -> bool {
        self.advanced == 0 && self.reverted == 0 && self.activated == 0 && self.errors == 0
    }
}

pub struct RecoveryScanner {
    service: OnboardingService,
    identity: Arc<dyn IdentityClient>,
    config: RecoveryConfig,
    shutdown: CancellationToken,
}

impl RecoveryScanner {
    /// A zero `interval` is raised to [`MIN_INTERVAL`]
    pub fn new(
        service: OnboardingService,
        identity: Arc<dyn IdentityClient>,
        mut config: RecoveryConfig,
        shutdown: CancellationToken,
    ) -> Self {
        if config.interval < MIN_INTERVAL {
            tracing::warn!(
                interval_ms = config.interval.as_millis() as u64,
                min_interval_ms = MIN_INTERVAL.as_millis() as u64,
                "Recovery interval too short, using minimum"
            );
            config.interval = MIN_INTERVAL;
        }
        Self {
            service,
            identity,
            config,
            shutdown,
        }
    }

    /// Spawn [`run`](Self::run) on the runtime
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scanner = Arc::clone(self);
        tokio::spawn(async move { scanner.run().await })
    }

    /// Stop the timer; a sweep already running completes first
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Sweep every `interval` until stopped
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            in_progress_max_age_secs = self.config.in_progress_max_age.as_secs(),
            user_created_max_age_secs = self.config.user_created_max_age.as_secs(),
            "Recovery scanner started"
        );

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }

        tracing::info!("Recovery scanner stopped");
    }

    /// Run both sweeps once
    pub async fn sweep(&self) -> RecoveryReport {
        let now = now_millis();
        let mut report = RecoveryReport::default();

        self.sweep_in_progress(now - millis(self.config.in_progress_max_age), &mut report)
            .await;
        self.sweep_user_created(now - millis(self.config.user_created_max_age), &mut report)
            .await;

        if report.is_noop() {
            tracing::debug!(examined = report.examined, skipped = report.skipped, "Recovery sweep: nothing to repair");
        } else {
            tracing::info!(
                examined = report.examined,
                advanced = report.advanced,
                reverted = report.reverted,
                activated = report.activated,
                skipped = report.skipped,
                errors = report.errors,
                "Recovery sweep finished"
            );
        }
        report
    }

    async fn sweep_in_progress(&self, cutoff: Timestamp, report: &mut RecoveryReport) {
        let stuck = match self
            .service
            .find_stuck(OnboardingStatus::ApprovalInProgress, cutoff)
            .await
        {
            Ok(stuck) => stuck,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query stuck approvals");
                report.errors += 1;
                return;
            }
        };

        for request in stuck {
            report.examined += 1;
            self.recover_in_progress(&request, report).await;
        }
    }

    async fn recover_in_progress(&self, request: &OnboardingRequest, report: &mut RecoveryReport) {
        let request_id = request.request_id.as_str();

        let exists = match self
            .identity
            .account_exists(&request.username, &request.email)
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Identity check failed, retrying next sweep");
                report.errors += 1;
                return;
            }
        };

        let result = if exists {
            self.service
                .mark_user_created(request_id)
                .await
                .map(|()| OnboardingStatus::UserCreated)
        } else {
            let Some(started_at) = request.approval_started_at else {
                report.skipped += 1;
                return;
            };
            self.service
                .revert_stalled_approval(request_id, started_at)
                .await
                .map(|()| OnboardingStatus::Pending)
        };

        match result {
            Ok(to) => {
                tracing::info!(
                    request_id = %request_id,
                    from = %OnboardingStatus::ApprovalInProgress,
                    to = %to,
                    account_exists = exists,
                    "Recovered stuck approval"
                );
                if to == OnboardingStatus::UserCreated {
                    report.advanced += 1;
                } else {
                    report.reverted += 1;
                }
            }
            Err(e) if e.is_lost_race() => {
                tracing::debug!(request_id = %request_id, error = %e, "Approval moved concurrently");
                report.skipped += 1;
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to recover stuck approval");
                report.errors += 1;
            }
        }
    }

    async fn sweep_user_created(&self, cutoff: Timestamp, report: &mut RecoveryReport) {
        let stuck = match self
            .service
            .find_stuck(OnboardingStatus::UserCreated, cutoff)
            .await
        {
            Ok(stuck) => stuck,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query unactivated tenants");
                report.errors += 1;
                return;
            }
        };

        for request in stuck {
            report.examined += 1;
            let request_id = request.request_id.as_str();
            match self.service.complete_approval(request_id).await {
                Ok(_) => {
                    tracing::info!(
                        request_id = %request_id,
                        from = %OnboardingStatus::UserCreated,
                        to = %OnboardingStatus::Active,
                        "Recovered unactivated tenant"
                    );
                    report.activated += 1;
                }
                Err(e) if e.is_lost_race() => {
                    tracing::debug!(request_id = %request_id, error = %e, "Activation moved concurrently");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Failed to activate tenant");
                    report.errors += 1;
                }
            }
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecoveryConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.in_progress_max_age, Duration::from_secs(180));
        assert_eq!(config.user_created_max_age, Duration::from_secs(180));
    }

    #[test]
    fn test_report_noop() {
        assert!(RecoveryReport::default().is_noop());
        assert!(
            RecoveryReport {
                examined: 2,
                skipped: 2,
                ..Default::default()
            }
            .is_noop()
        );
        assert!(
            !RecoveryReport {
                reverted: 1,
                ..Default::default()
            }
            .is_noop()
        );
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_secs(3)), 3_000);
        assert_eq!(millis(Duration::MAX), i64::MAX);
    }
}
