//! Background tasks: initial sync, periodic resync, quality tour and image
//! cleanup. All handles are owned here and aborted on shutdown.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::dashboard::Dashboard;
use super::dispatcher::{Interaction, InteractionDispatcher};
use super::renderer::{DashboardRenderer, cleanup_old_images};
use super::status::StatusBoard;
use super::sync::SyncOutcome;
use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    pub refresh_interval_secs: u64,
    pub run_on_startup: bool,
    pub fly_to_on_complete: bool,
    pub tour_interval_secs: u64,
    pub image_cleanup_interval_hours: u64,
    pub image_retention_days: i64,
    pub image_dir: PathBuf,
}

impl ScheduledTaskConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            refresh_interval_secs: config.sync.refresh_interval_secs,
            run_on_startup: config.sync.run_on_startup,
            fly_to_on_complete: config.view.fly_to_on_complete,
            tour_interval_secs: config.tour.interval_secs,
            image_cleanup_interval_hours: config.media.cleanup_interval_hours,
            image_retention_days: config.media.retention_days,
            image_dir: PathBuf::from(&config.media.image_dir),
        }
    }
}

pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    dispatcher: Arc<InteractionDispatcher>,
    dashboard: Arc<Dashboard>,
    renderer: Arc<DashboardRenderer>,
    status: Arc<StatusBoard>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(
        config: ScheduledTaskConfig,
        dispatcher: Arc<InteractionDispatcher>,
        dashboard: Arc<Dashboard>,
        renderer: Arc<DashboardRenderer>,
        status: Arc<StatusBoard>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            dashboard,
            renderer,
            status,
            task_handles: Vec::new(),
        }
    }

    pub fn start_all(&mut self) {
        tracing::info!("Starting scheduled task manager...");

        self.task_handles.push(self.start_sync_task());
        self.task_handles.push(self.start_tour_task());
        self.task_handles.push(self.start_image_cleanup_task());

        tracing::info!(
            "Started {} scheduled tasks (resync every {}s, tour tick every {}s, image cleanup every {}h)",
            self.task_handles.len(),
            self.config.refresh_interval_secs,
            self.config.tour_interval_secs,
            self.config.image_cleanup_interval_hours
        );
    }

    fn start_sync_task(&self) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let dashboard = self.dashboard.clone();
        let renderer = self.renderer.clone();
        let status = self.status.clone();
        let interval_secs = self.config.refresh_interval_secs.max(1);
        let run_on_startup = self.config.run_on_startup;
        let fly_to = self.config.fly_to_on_complete;

        tokio::spawn(async move {
            if run_on_startup {
                tracing::info!("Performing initial full sync...");
                Self::run_sync(&dispatcher, &dashboard, &renderer, &status, fly_to).await;
            }

            loop {
                let now = Utc::now();
                let next_trigger = Self::calculate_next_sync_time(now, interval_secs);
                let sleep_duration = (next_trigger - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(interval_secs));
                tracing::debug!(
                    "Next resync at {} (in {:.1}s)",
                    next_trigger.format("%H:%M:%S UTC"),
                    sleep_duration.as_secs_f64()
                );

                tokio::time::sleep(sleep_duration).await;
                Self::run_sync(&dispatcher, &dashboard, &renderer, &status, false).await;
            }
        })
    }

    async fn run_sync(
        dispatcher: &InteractionDispatcher,
        dashboard: &Dashboard,
        renderer: &DashboardRenderer,
        status: &StatusBoard,
        fly_to: bool,
    ) {
        match dispatcher.sync().start_full(fly_to).await {
            SyncOutcome::Completed { .. } => Self::render_dashboard(dashboard, renderer, status).await,
            // Already on the status board.
            SyncOutcome::Failed(_) | SyncOutcome::Cancelled => {}
            SyncOutcome::Superseded => tracing::debug!("Scheduled sync superseded by a newer run"),
        }
    }

    async fn render_dashboard(dashboard: &Dashboard, renderer: &DashboardRenderer, status: &StatusBoard) {
        if let Err(e) = renderer.render(&dashboard.view()).await {
            status.error(format!("dashboard render failed: {:#}", e));
        }
    }

    /// Next instant aligned to a multiple of `interval_secs` since the epoch,
    /// strictly after `now`.
    fn calculate_next_sync_time(now: DateTime<Utc>, interval_secs: u64) -> DateTime<Utc> {
        let interval = interval_secs.max(1) as i64;
        let next = (now.timestamp().div_euclid(interval) + 1) * interval;
        DateTime::from_timestamp(next, 0).unwrap_or(now + chrono::Duration::seconds(interval))
    }

    fn start_tour_task(&self) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let period = Duration::from_secs(self.config.tour_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                dispatcher.dispatch(Interaction::TourTick).await;
            }
        })
    }

    fn start_image_cleanup_task(&self) -> JoinHandle<()> {
        let image_dir = self.config.image_dir.clone();
        let period = Duration::from_secs(self.config.image_cleanup_interval_hours.max(1) * 3600);
        let retention_days = self.config.image_retention_days;

        tracing::info!(
            "Scheduling image cleanup task (interval: {:?}, retention: {} days)",
            period,
            retention_days
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match cleanup_old_images(&image_dir, retention_days).await {
                    Ok(0) => tracing::debug!("Image cleanup completed: no old images to delete"),
                    Ok(n) => tracing::info!("Image cleanup completed: deleted {} old images", n),
                    Err(e) => tracing::error!("Image cleanup failed: {:#}", e),
                }
            }
        })
    }

    pub fn task_count(&self) -> usize {
        self.task_handles.len()
    }

    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in &self.task_handles {
            handle.abort();
        }
        futures::future::join_all(self.task_handles).await;

        tracing::info!("All scheduled tasks stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_calculate_next_sync_time_aligns_to_interval() {
        let next = ScheduledTaskManager::calculate_next_sync_time(at("2026-01-01T10:00:30Z"), 60);
        assert_eq!(next, at("2026-01-01T10:01:00Z"));

        let next = ScheduledTaskManager::calculate_next_sync_time(at("2026-01-01T10:00:00Z"), 60);
        assert_eq!(next, at("2026-01-01T10:01:00Z"));

        let next = ScheduledTaskManager::calculate_next_sync_time(at("2026-01-01T10:07:10Z"), 300);
        assert_eq!((next.minute(), next.second()), (10, 0));
    }

    #[test]
    fn test_calculate_next_sync_time_crosses_midnight() {
        let next = ScheduledTaskManager::calculate_next_sync_time(at("2026-01-01T23:59:59Z"), 60);
        assert_eq!(next, at("2026-01-02T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        use crate::module::feed::HttpPageFetcher;
        use crate::module::geolocation::ConfiguredLocation;
        use crate::service::AppState;

        let mut config = AppConfig::default();
        config.sync.run_on_startup = false;
        let fetcher = HttpPageFetcher::new(Duration::from_secs(1)).unwrap();
        let state = AppState::build(&config, Arc::new(fetcher), Arc::new(ConfiguredLocation::default()));

        let mut manager = ScheduledTaskManager::new(
            ScheduledTaskConfig::from_app_config(&config),
            state.dispatcher.clone(),
            state.dashboard.clone(),
            state.renderer.clone(),
            state.status.clone(),
        );
        manager.start_all();
        assert_eq!(manager.task_count(), 3);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_render_failure_reaches_status_board() {
        use crate::module::status::Severity;

        // A regular file where the image directory should be.
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let renderer = DashboardRenderer::new(blocker.path().join("images"), "resources/fonts");
        let status = StatusBoard::new();

        ScheduledTaskManager::render_dashboard(&Dashboard::new(), &renderer, &status).await;

        let latest = status.latest().unwrap();
        assert_eq!(latest.severity, Severity::Error);
        assert!(latest.text.starts_with("dashboard render failed"));
    }

    #[test]
    fn test_config_from_app_config() {
        let config = ScheduledTaskConfig::from_app_config(&AppConfig::default());
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.tour_interval_secs, 5);
        assert_eq!(config.image_dir, PathBuf::from("data/image_cache"));
    }
}
