//! Translates user events into filter mutations or sync commands, followed
//! by a re-projection. Holds no view logic of its own.

use aqmon_common::QualityLevel;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::filter::FilterModel;
use super::geolocation::{GeolocationProvider, nearest_region};
use super::projector::{FOCUS_ZOOM, ViewProjector};
use super::snapshot::SnapshotStore;
use super::status::StatusBoard;
use super::sync::{SyncController, SyncOutcome};
use crate::config::AppConfig;
use crate::error::GeolocationError;

#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    SelectRegion(Option<String>),
    SelectQuality(Option<QualityLevel>),
    SearchId(String),
    /// `None` is a click on the chart background.
    ChartClick(Option<QualityLevel>),
    FocusStation(String),
    Refresh,
    Cancel,
    Locate,
    SetTour(bool),
    TourTick,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Reprojected,
    Ignored,
    Synced(SyncOutcome),
    CancelRequested(bool),
    Focused(bool),
    /// Auto-play switched on or off; the views are left as they are.
    TourToggled(bool),
    /// Region the filter was narrowed to, or why locating failed.
    Located(Result<String, GeolocationError>),
}

#[derive(Debug, Clone, Default)]
struct TourState {
    enabled: bool,
    /// Index into `QualityLevel::ALL` of the level last shown.
    cursor: Option<usize>,
    waiting: bool,
}

impl TourState {
    fn label(&self) -> String {
        match (self.enabled, self.waiting, self.cursor) {
            (false, _, _) => "paused".to_string(),
            (true, true, _) | (true, false, None) => "waiting for data".to_string(),
            (true, false, Some(i)) => format!("touring: {}", QualityLevel::ALL[i]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub fly_to_on_complete: bool,
    pub chart_click_filters: bool,
    pub tour_enabled: bool,
    pub geolocation_timeout: Duration,
}

impl DispatcherOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fly_to_on_complete: config.view.fly_to_on_complete,
            chart_click_filters: config.view.chart_click_filters,
            tour_enabled: config.tour.enabled,
            geolocation_timeout: Duration::from_secs(config.geolocation.timeout_secs),
        }
    }
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            fly_to_on_complete: true,
            chart_click_filters: true,
            tour_enabled: false,
            geolocation_timeout: Duration::from_secs(10),
        }
    }
}

pub struct InteractionDispatcher {
    sync: Arc<SyncController>,
    store: Arc<RwLock<SnapshotStore>>,
    filter: Arc<RwLock<FilterModel>>,
    projector: Arc<ViewProjector>,
    status: Arc<StatusBoard>,
    geolocation: Arc<dyn GeolocationProvider>,
    options: DispatcherOptions,
    tour: Mutex<TourState>,
}

impl InteractionDispatcher {
    pub fn new(
        sync: Arc<SyncController>,
        store: Arc<RwLock<SnapshotStore>>,
        filter: Arc<RwLock<FilterModel>>,
        projector: Arc<ViewProjector>,
        status: Arc<StatusBoard>,
        geolocation: Arc<dyn GeolocationProvider>,
        options: DispatcherOptions,
    ) -> Self {
        let tour = TourState {
            enabled: options.tour_enabled,
            ..Default::default()
        };
        projector.surfaces().controls.set_tour_label(&tour.label());
        Self {
            sync,
            store,
            filter,
            projector,
            status,
            geolocation,
            options,
            tour: Mutex::new(tour),
        }
    }

    pub fn sync(&self) -> &Arc<SyncController> {
        &self.sync
    }

    pub async fn dispatch(&self, interaction: Interaction) -> DispatchOutcome {
        debug!("Dispatching {:?}", interaction);
        match interaction {
            Interaction::SelectRegion(region) => {
                self.filter.write().await.set_region(region);
                self.reproject(true).await
            }
            Interaction::SelectQuality(quality) => {
                self.filter.write().await.set_quality(quality);
                self.reproject(true).await
            }
            Interaction::SearchId(id) => {
                self.filter.write().await.set_id_substring(id);
                self.reproject(false).await
            }
            Interaction::ChartClick(level) => self.chart_click(level).await,
            Interaction::FocusStation(id) => self.focus_station(&id).await,
            Interaction::Refresh => {
                DispatchOutcome::Synced(self.sync.start_full(self.options.fly_to_on_complete).await)
            }
            Interaction::Cancel => {
                let cancelled = self.sync.cancel();
                if !cancelled {
                    self.status.warn("no sync in progress");
                }
                DispatchOutcome::CancelRequested(cancelled)
            }
            Interaction::Locate => self.locate().await,
            Interaction::SetTour(enabled) => {
                let label = {
                    let mut tour = self.tour.lock();
                    tour.enabled = enabled;
                    tour.cursor = None;
                    tour.waiting = false;
                    tour.label()
                };
                self.projector.surfaces().controls.set_tour_label(&label);
                DispatchOutcome::TourToggled(enabled)
            }
            Interaction::TourTick => self.tour_tick().await,
        }
    }

    pub fn tour_label(&self) -> String {
        self.tour.lock().label()
    }

    async fn reproject(&self, fly_to: bool) -> DispatchOutcome {
        let store = self.store.read().await;
        let filter = self.filter.read().await;
        self.projector.render(store.all(), &filter, fly_to);
        DispatchOutcome::Reprojected
    }

    async fn chart_click(&self, level: Option<QualityLevel>) -> DispatchOutcome {
        if !self.options.chart_click_filters {
            return DispatchOutcome::Ignored;
        }
        match level {
            Some(level) => self.status.info(format!("chart filter: {}", level)),
            None => self.status.info("chart filter reset"),
        }
        self.filter.write().await.set_quality(level);
        self.reproject(true).await
    }

    async fn focus_station(&self, id: &str) -> DispatchOutcome {
        let target = {
            let store = self.store.read().await;
            store.find(id).map(|r| r.position)
        };
        match target {
            Some(Some(position)) => {
                let map = &self.projector.surfaces().map;
                map.fly_to(position, FOCUS_ZOOM);
                map.open_popup(id);
                DispatchOutcome::Focused(true)
            }
            Some(None) => {
                self.status.warn(format!("station {} has no position", id));
                DispatchOutcome::Focused(false)
            }
            None => {
                self.status.warn(format!("unknown station: {}", id));
                DispatchOutcome::Focused(false)
            }
        }
    }

    async fn locate(&self) -> DispatchOutcome {
        self.status.info("requesting current position");
        let timeout = self.options.geolocation_timeout;
        let position = match tokio::time::timeout(timeout, self.geolocation.current_position()).await {
            Ok(Ok(position)) => position,
            Ok(Err(err)) => return self.locate_failed(err),
            Err(_) => return self.locate_failed(GeolocationError::Timeout(timeout)),
        };

        let map = &self.projector.surfaces().map;
        map.show_user_location(position);
        map.fly_to(position, FOCUS_ZOOM);

        let region = {
            let store = self.store.read().await;
            nearest_region(store.all(), position)
        };
        match region {
            Ok(region) => {
                self.status
                    .info(format!("located at ({:.4}, {:.4}), region {}", position.lat, position.lng, region));
                self.filter.write().await.set_region(Some(region.clone()));
                // The map already flew to the user; keep that viewport.
                self.reproject(false).await;
                DispatchOutcome::Located(Ok(region))
            }
            Err(err) => self.locate_failed(err),
        }
    }

    fn locate_failed(&self, err: GeolocationError) -> DispatchOutcome {
        self.status.warn(format!("locate failed: {}", err));
        DispatchOutcome::Located(Err(err))
    }

    async fn tour_tick(&self) -> DispatchOutcome {
        if !self.tour.lock().enabled {
            return DispatchOutcome::Ignored;
        }

        let has_data = !self.store.read().await.is_empty();
        let (label, level) = {
            let mut tour = self.tour.lock();
            if !has_data {
                tour.waiting = true;
                (tour.label(), None)
            } else {
                let next = tour.cursor.map_or(0, |i| (i + 1) % QualityLevel::ALL.len());
                tour.cursor = Some(next);
                tour.waiting = false;
                (tour.label(), Some(QualityLevel::ALL[next]))
            }
        };
        self.projector.surfaces().controls.set_tour_label(&label);

        match level {
            Some(level) => {
                self.filter.write().await.set_quality(Some(level));
                self.reproject(true).await
            }
            None => DispatchOutcome::Ignored,
        }
    }
}
