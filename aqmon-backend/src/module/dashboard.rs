//! In-memory rendering surfaces.
//!
//! The dashboard keeps whatever the projector last pushed so the HTTP service
//! can serve it as JSON and the renderer can draw it.

use aqmon_common::Position;
use parking_lot::RwLock;
use serde::Serialize;

use super::projector::{
    ChartBar, ChartSurface, ControlsSurface, FitOptions, ListEntry, ListSurface, MapMarker, MapSurface,
};

pub const DEFAULT_CENTER: Position = Position::new(23.6, 121.0);
pub const DEFAULT_ZOOM: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: Position,
    pub zoom: u8,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// Smallest zoom at which the bounds still fit in one tile-width, capped.
fn zoom_for_span(span_deg: f64, max_zoom: u8) -> u8 {
    if span_deg <= f64::EPSILON {
        return max_zoom;
    }
    let zoom = (360.0 / span_deg).log2().floor();
    zoom.clamp(0.0, max_zoom as f64) as u8
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub viewport: Viewport,
    pub markers: Vec<MapMarker>,
    pub list: Vec<ListEntry>,
    pub bars: Vec<ChartBar>,
    pub region_options: Vec<String>,
    pub user_location: Option<Position>,
    pub open_popup: Option<String>,
    pub tour_label: String,
}

#[derive(Debug, Default)]
pub struct Dashboard {
    state: RwLock<DashboardView>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current surface state.
    pub fn view(&self) -> DashboardView {
        self.state.read().clone()
    }
}

impl MapSurface for Dashboard {
    fn replace_markers(&self, markers: Vec<MapMarker>) {
        let mut state = self.state.write();
        let popup_visible = state
            .open_popup
            .as_deref()
            .is_none_or(|open| markers.iter().any(|m| m.station_id == open));
        if !popup_visible {
            state.open_popup = None;
        }
        state.markers = markers;
    }

    fn fit_view(&self, points: &[Position], options: FitOptions) {
        let Some(first) = points.first() else {
            return;
        };
        let (mut min_lat, mut max_lat, mut min_lng, mut max_lng) = (first.lat, first.lat, first.lng, first.lng);
        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }
        let span = (max_lat - min_lat).max(max_lng - min_lng);

        let mut state = self.state.write();
        state.viewport = Viewport {
            center: Position::new((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0),
            zoom: zoom_for_span(span, options.max_zoom),
        };
    }

    fn fly_to(&self, position: Position, zoom: u8) {
        self.state.write().viewport = Viewport { center: position, zoom };
    }

    fn open_popup(&self, station_id: &str) {
        self.state.write().open_popup = Some(station_id.to_string());
    }

    fn show_user_location(&self, position: Position) {
        self.state.write().user_location = Some(position);
    }
}

impl ListSurface for Dashboard {
    fn replace_entries(&self, entries: Vec<ListEntry>) {
        self.state.write().list = entries;
    }
}

impl ChartSurface for Dashboard {
    fn replace_bars(&self, bars: Vec<ChartBar>) {
        self.state.write().bars = bars;
    }
}

impl ControlsSurface for Dashboard {
    fn set_region_options(&self, regions: Vec<String>) {
        self.state.write().region_options = regions;
    }

    fn set_tour_label(&self, label: &str) {
        self.state.write().tour_label = label.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport() {
        let dashboard = Dashboard::new();
        let view = dashboard.view();
        assert_eq!(view.viewport.center, DEFAULT_CENTER);
        assert_eq!(view.viewport.zoom, DEFAULT_ZOOM);
        assert!(view.markers.is_empty());
    }

    #[test]
    fn test_fit_view_centres_on_bounds_and_caps_zoom() {
        let dashboard = Dashboard::new();
        let options = FitOptions::default();

        dashboard.fit_view(&[Position::new(22.0, 120.0), Position::new(25.0, 122.0)], options);
        let viewport = dashboard.view().viewport;
        assert_eq!(viewport.center, Position::new(23.5, 121.0));
        assert_eq!(viewport.zoom, 6);

        dashboard.fit_view(&[Position::new(25.0, 121.5)], options);
        assert_eq!(dashboard.view().viewport.zoom, options.max_zoom);
    }

    #[test]
    fn test_fit_view_without_points_keeps_viewport() {
        let dashboard = Dashboard::new();
        dashboard.fit_view(&[], FitOptions::default());
        assert_eq!(dashboard.view().viewport, Viewport::default());
    }

    #[test]
    fn test_fly_to_and_user_location() {
        let dashboard = Dashboard::new();
        let here = Position::new(24.15, 120.67);
        dashboard.fly_to(here, 15);
        dashboard.show_user_location(here);
        dashboard.set_tour_label("paused");

        let view = dashboard.view();
        assert_eq!(view.viewport, Viewport { center: here, zoom: 15 });
        assert_eq!(view.user_location, Some(here));
        assert_eq!(view.tour_label, "paused");
    }
}
