//! PresenceSyncer: fixed-interval poll loop
//!
//! Every cycle refreshes the session if needed, fetches mobile devices and
//! the home presence, evaluates occupancy and flips HOME/AWAY when they
//! disagree. A failing cycle is written to the error archive and the loop
//! carries on after the normal interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use tokio::time;

use super::auth::{login, refresh_auth};
use super::evaluator::{evaluate_occupancy, Evaluation};
use super::reconciler::reconcile_mode;
use super::state::PresenceState;
use crate::config::Config;
use crate::error::TadoError;
use crate::journal::{ErrorArchive, EventLog};
use crate::models::{Credentials, HomeMode};
use crate::notify::HealthcheckPinger;
use crate::retry::{retry, RetryExhausted, RetryPolicy};
use crate::tado::{Session, TadoApi};

/// Outcome of a completed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub occupied: bool,
    pub mode: HomeMode,
    pub applied: Option<HomeMode>,
}

/// Whatever a cycle managed to fetch before failing
#[derive(Debug, Default)]
struct CycleContext {
    devices: Option<Vec<Value>>,
    mode: Option<HomeMode>,
}

pub struct PresenceSyncer {
    api: Arc<dyn TadoApi>,
    credentials: Credentials,
    retry: RetryPolicy,
    interval: Duration,
    auth_refresh: chrono::Duration,
    state: PresenceState,
    session: Session,
    events: EventLog,
    errors: ErrorArchive,
    healthcheck: Option<HealthcheckPinger>,
}

impl PresenceSyncer {
    /// Log in and build the loop. Fails only if the initial login exhausts its retries.
    pub async fn connect(
        api: Arc<dyn TadoApi>,
        credentials: Credentials,
        config: &Config,
        healthcheck: Option<HealthcheckPinger>,
    ) -> Result<Self, RetryExhausted<TadoError>> {
        let retry = config.retry.policy();
        let session = login(api.as_ref(), &credentials, &retry).await?;

        Ok(Self {
            api,
            credentials,
            retry,
            interval: config.poll.interval(),
            auth_refresh: config.poll.auth_refresh(),
            state: PresenceState::new(Utc::now()),
            session,
            events: EventLog::new(&config.journal.event_log_path),
            errors: ErrorArchive::new(&config.journal.error_dir),
            healthcheck,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    /// Run the poll loop until `shutdown` completes.
    ///
    /// Shutdown is only observed between cycles, so a cycle that has
    /// started always runs to completion.
    pub async fn start<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "[Presence] Starting poll loop (interval: {}s, {} attempts per call)",
            self.interval.as_secs(),
            self.retry.max_attempts()
        );
        tokio::pin!(shutdown);

        loop {
            self.run_cycle().await;

            tokio::select! {
                _ = time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("[Presence] Poll loop stopped");
                    break;
                }
            }
        }
    }

    /// Run one cycle, archiving any failure instead of returning it
    pub async fn run_cycle(&mut self) -> Option<CycleSummary> {
        let mut ctx = CycleContext::default();

        match self.try_cycle(&mut ctx).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!("[Presence] Poll cycle failed: {:#}", e);

                if is_unauthorized(&e) {
                    self.state.session_invalidated = true;
                }

                self.errors.record(&failure_report(&e, &ctx)).await;
                None
            }
        }
    }

    async fn try_cycle(&mut self, ctx: &mut CycleContext) -> anyhow::Result<CycleSummary> {
        let api = self.api.as_ref();

        self.session = refresh_auth(
            api,
            &self.credentials,
            &self.retry,
            &mut self.state,
            self.session.clone(),
            self.auth_refresh,
            Utc::now(),
        )
        .await
        .context("Failed to refresh tado session")?;
        let session = &self.session;

        let devices = retry(&self.retry, "get_mobile_devices", move || {
            api.get_mobile_devices(session)
        })
        .await?;
        ctx.devices = Some(devices.clone());

        let mode = retry(&self.retry, "get_home_state", move || api.get_home_state(session)).await?;
        ctx.mode = Some(mode);

        tracing::info!(
            "[Presence] ===== {} ({}), {} devices =====",
            crate::journal::timestamp(),
            mode,
            devices.len()
        );

        let evaluation = evaluate_occupancy(&mut self.state, &devices);
        self.events.append(&event_lines(&evaluation)).await;

        let applied = reconcile_mode(api, session, &self.retry, evaluation.occupied, mode).await?;
        if let Some(target) = applied {
            self.events
                .append(&[format!("Status changed to {}.", target)])
                .await;
        }

        if let Some(pinger) = &self.healthcheck {
            pinger.ping().await;
        }

        Ok(CycleSummary {
            occupied: evaluation.occupied,
            mode,
            applied,
        })
    }
}

/// Event log lines for presence transitions and unreadable records
fn event_lines(evaluation: &Evaluation) -> Vec<String> {
    let transitions = evaluation.transitions.iter().map(|t| t.to_string());
    let rejected = evaluation.rejected.iter().map(|r| {
        format!(
            "An error occurred while getting the location of a device.\n\tDevice info: {}\n\tError: {}\n",
            r.raw, r.error
        )
    });

    transitions.chain(rejected).collect()
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<TadoError>())
        .any(TadoError::is_unauthorized)
}

fn failure_report(err: &anyhow::Error, ctx: &CycleContext) -> String {
    let devices = match &ctx.devices {
        Some(devices) => serde_json::to_string_pretty(devices).unwrap_or_else(|e| e.to_string()),
        None => "<not fetched>".to_string(),
    };
    let mode = ctx
        .mode
        .map(|m| m.to_string())
        .unwrap_or_else(|| "<not fetched>".to_string());

    format!(
        "{:?}\n\nMobile devices:\n{}\n\nHome state:\n{}",
        err, devices, mode
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tado::fake::FakeTado;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 1;
        config.retry.max_attempts = 2;
        config.journal.event_log_path = dir.path().join("log.txt").to_string_lossy().into_owned();
        config.journal.error_dir = dir.path().join("error_logs").to_string_lossy().into_owned();
        config
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "me@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    fn phone(at_home: bool) -> Value {
        json!({
            "id": 1,
            "name": "Phone",
            "settings": {"geoTrackingEnabled": true},
            "location": {"atHome": at_home, "stale": false}
        })
    }

    async fn syncer(api: &Arc<FakeTado>, dir: &TempDir) -> PresenceSyncer {
        PresenceSyncer::connect(api.clone(), credentials(), &config(dir), None)
            .await
            .unwrap()
    }

    fn read_log(dir: &TempDir) -> String {
        std::fs::read_to_string(dir.path().join("log.txt")).unwrap_or_default()
    }

    fn artifacts(dir: &Path) -> Vec<std::path::PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => vec![],
        }
    }

    #[tokio::test]
    async fn test_present_device_sets_home() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![phone(true)], HomeMode::Away));
        let mut syncer = syncer(&api, &dir).await;

        let summary = syncer.run_cycle().await.unwrap();

        assert!(summary.occupied);
        assert_eq!(summary.applied, Some(HomeMode::Home));
        assert_eq!(api.calls().set_home, 1);
        assert_eq!(api.calls().set_away, 0);
        assert!(read_log(&dir).contains(": Status changed to HOME."));

        // Remote mode now agrees: no further calls
        let summary = syncer.run_cycle().await.unwrap();
        assert_eq!(summary.applied, None);
        assert_eq!(api.calls().set_home, 1);
    }

    #[tokio::test]
    async fn test_no_devices_sets_away() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![], HomeMode::Home));
        let mut syncer = syncer(&api, &dir).await;

        let summary = syncer.run_cycle().await.unwrap();

        assert!(!summary.occupied);
        assert_eq!(summary.applied, Some(HomeMode::Away));
        assert_eq!(api.calls().set_away, 1);
        assert!(read_log(&dir).contains(": Status changed to AWAY."));
    }

    #[tokio::test]
    async fn test_transition_written_to_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![phone(true)], HomeMode::Home));
        let mut syncer = syncer(&api, &dir).await;

        syncer.run_cycle().await.unwrap();
        api.set_devices(vec![phone(false)]);
        syncer.run_cycle().await.unwrap();

        let log = read_log(&dir);
        assert_eq!(log.matches("'Phone' went from HOME to AWAY.").count(), 1);
        assert!(log.contains("Status changed to AWAY."));
    }

    #[tokio::test]
    async fn test_malformed_device_written_to_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let broken = json!({"id": 9, "name": "Broken", "location": {"atHome": true}});
        let api = Arc::new(FakeTado::new(vec![broken, phone(true)], HomeMode::Home));
        let mut syncer = syncer(&api, &dir).await;

        let summary = syncer.run_cycle().await.unwrap();

        assert!(summary.occupied);
        let log = read_log(&dir);
        assert!(log.contains("An error occurred while getting the location of a device."));
        assert!(log.contains("\tError: Device 9: missing field 'settings.geoTrackingEnabled'"));
    }

    #[tokio::test]
    async fn test_failed_cycle_is_archived_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![phone(true)], HomeMode::Away));
        let mut syncer = syncer(&api, &dir).await;

        api.fail_next("get_mobile_devices", 2, || TadoError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        });

        assert!(syncer.run_cycle().await.is_none());
        assert_eq!(api.calls().get_mobile_devices, 2);
        assert_eq!(api.calls().get_home_state, 0);
        assert_eq!(api.calls().set_home, 0);

        let files = artifacts(&dir.path().join("error_logs"));
        assert_eq!(files.len(), 1);
        let report = std::fs::read_to_string(&files[0]).unwrap();
        assert!(report.starts_with("ERROR LOG: "));
        assert!(report.contains("get_mobile_devices gave up after 2 attempts"));
        assert!(report.contains("bad gateway"));
        assert!(report.contains("Mobile devices:\n<not fetched>"));

        let summary = syncer.run_cycle().await.unwrap();
        assert_eq!(summary.applied, Some(HomeMode::Home));
        assert_eq!(artifacts(&dir.path().join("error_logs")).len(), 1);
    }

    #[tokio::test]
    async fn test_archive_includes_fetched_context() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![phone(true)], HomeMode::Away));
        let mut syncer = syncer(&api, &dir).await;

        api.fail_next("set_home", 2, || TadoError::Status {
            status: 500,
            body: String::new(),
        });

        assert!(syncer.run_cycle().await.is_none());

        let files = artifacts(&dir.path().join("error_logs"));
        let report = std::fs::read_to_string(&files[0]).unwrap();
        assert!(report.contains("\"name\": \"Phone\""));
        assert!(report.contains("Home state:\nAWAY"));
    }

    #[tokio::test]
    async fn test_unauthorized_forces_login() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![], HomeMode::Away));
        let mut syncer = syncer(&api, &dir).await;
        assert_eq!(api.calls().login, 1);

        api.fail_next("get_home_state", 2, || TadoError::Unauthorized);
        assert!(syncer.run_cycle().await.is_none());
        assert!(syncer.state().session_invalidated);
        assert_eq!(api.calls().login, 1);

        assert!(syncer.run_cycle().await.is_some());
        assert_eq!(api.calls().login, 2);
        assert!(!syncer.state().session_invalidated);
    }

    #[tokio::test]
    async fn test_connect_fails_when_login_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![], HomeMode::Away));
        api.fail_next("login", 2, || TadoError::Status {
            status: 400,
            body: "invalid_grant".to_string(),
        });

        let result = PresenceSyncer::connect(api.clone(), credentials(), &config(&dir), None).await;
        let err = result.err().unwrap();
        assert_eq!(err.operation, "login");
        assert_eq!(api.calls().login, 2);
    }

    #[tokio::test]
    async fn test_healthcheck_pinged_after_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hc")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let url = url::Url::parse(&format!("{}/hc", server.url())).unwrap();
        let pinger = HealthcheckPinger::new(url).unwrap();
        let api = Arc::new(FakeTado::new(vec![phone(true)], HomeMode::Home));
        let mut syncer = PresenceSyncer::connect(api.clone(), credentials(), &config(&dir), Some(pinger))
            .await
            .unwrap();

        syncer.run_cycle().await.unwrap();

        api.fail_next("get_mobile_devices", 2, || TadoError::NoHome);
        assert!(syncer.run_cycle().await.is_none());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![phone(true)], HomeMode::Away));
        let syncer = syncer(&api, &dir).await;

        // Already resolved: the loop must still finish its first cycle
        syncer.start(async {}).await;

        assert_eq!(api.calls().get_mobile_devices, 1);
        assert_eq!(api.calls().set_home, 1);
        assert!(read_log(&dir).contains(": Status changed to HOME."));
    }

    #[tokio::test]
    async fn test_huge_auth_refresh_does_not_break_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeTado::new(vec![phone(true)], HomeMode::Home));
        let mut config = config(&dir);
        config.poll.auth_refresh_secs = 10_000_000_000_000;
        let mut syncer = PresenceSyncer::connect(api.clone(), credentials(), &config, None)
            .await
            .unwrap();

        assert!(syncer.run_cycle().await.is_some());
        assert!(syncer.run_cycle().await.is_some());
        assert_eq!(api.calls().login, 1);
        assert!(artifacts(&dir.path().join("error_logs")).is_empty());
    }
}
