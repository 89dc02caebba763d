//! Derives the map, list and chart views from one snapshot and one filter.
//!
//! [`project`] is a pure single pass; [`ViewProjector::render`] runs it and
//! only then pushes the results to the rendering surfaces.

use aqmon_common::{Color, Position, QualityLevel, StationRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::classifier::{classify, color_for};
use super::filter::FilterModel;
use super::snapshot::region_options;

pub const DEFAULT_LIST_CAP: usize = 100;
pub const MARKER_RADIUS: f64 = 6.0;
pub const MARKER_STROKE_WIDTH: f64 = 1.0;
pub const MARKER_FILL_OPACITY: f64 = 0.8;
pub const FOCUS_ZOOM: u8 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Popup {
    pub name: String,
    /// Reading as reported, `"n/a"` when missing.
    pub value: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub station_id: String,
    pub position: Position,
    pub level: QualityLevel,
    pub fill: Color,
    pub stroke: Color,
    pub radius: f64,
    pub stroke_width: f64,
    pub fill_opacity: f64,
    pub popup: Popup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusTarget {
    pub station_id: String,
    pub position: Position,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub label: String,
    pub detail: String,
    pub accent: Color,
    pub focus: FocusTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub level: QualityLevel,
    pub label: String,
    pub count: usize,
    pub color: Color,
}

/// Station count per quality level over the filtered set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub good: usize,
    pub moderate: usize,
    pub unhealthy: usize,
    pub very_unhealthy: usize,
    pub hazardous: usize,
    pub invalid: usize,
}

impl LevelCounts {
    pub fn get(&self, level: QualityLevel) -> usize {
        match level {
            QualityLevel::Good => self.good,
            QualityLevel::Moderate => self.moderate,
            QualityLevel::Unhealthy => self.unhealthy,
            QualityLevel::VeryUnhealthy => self.very_unhealthy,
            QualityLevel::Hazardous => self.hazardous,
            QualityLevel::Invalid => self.invalid,
        }
    }

    fn bump(&mut self, level: QualityLevel) {
        let slot = match level {
            QualityLevel::Good => &mut self.good,
            QualityLevel::Moderate => &mut self.moderate,
            QualityLevel::Unhealthy => &mut self.unhealthy,
            QualityLevel::VeryUnhealthy => &mut self.very_unhealthy,
            QualityLevel::Hazardous => &mut self.hazardous,
            QualityLevel::Invalid => &mut self.invalid,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        QualityLevel::ALL.iter().map(|l| self.get(*l)).sum()
    }

    /// Bars in fixed level order.
    pub fn bars(&self) -> Vec<ChartBar> {
        QualityLevel::ALL
            .iter()
            .map(|&level| ChartBar {
                level,
                label: level.label().to_string(),
                count: self.get(level),
                color: color_for(level),
            })
            .collect()
    }
}

/// Padding and zoom limits for a fit-to-points command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub padding_x: u32,
    pub padding_y: u32,
    pub max_zoom: u8,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding_x: 50,
            padding_y: 50,
            max_zoom: 14,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub markers: Vec<MapMarker>,
    /// Display-only truncation of the filtered set; markers and counts are
    /// never capped.
    pub list: Vec<ListEntry>,
    pub counts: LevelCounts,
}

impl Projection {
    pub fn fit_points(&self) -> Vec<Position> {
        self.markers.iter().map(|m| m.position).collect()
    }
}

fn format_reading(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => "n/a".to_string(),
    }
}

/// Single pass over the snapshot. Records without a position are skipped.
pub fn project(snapshot: &[StationRecord], filter: &FilterModel, list_cap: usize) -> Projection {
    let mut projection = Projection::default();

    for record in snapshot {
        let Some(position) = record.position else {
            continue;
        };
        let level = classify(record.value);
        if !filter.matches_with_level(record, level) {
            continue;
        }

        let color = color_for(level);
        let reading = format_reading(record.value);

        if projection.list.len() < list_cap {
            projection.list.push(ListEntry {
                label: record.name.clone(),
                detail: format!("{} | PM2.5: {}", record.region, reading),
                accent: color,
                focus: FocusTarget {
                    station_id: record.id.clone(),
                    position,
                    zoom: FOCUS_ZOOM,
                },
            });
        }

        projection.markers.push(MapMarker {
            station_id: record.id.clone(),
            position,
            level,
            fill: color,
            stroke: Color::WHITE,
            radius: MARKER_RADIUS,
            stroke_width: MARKER_STROKE_WIDTH,
            fill_opacity: MARKER_FILL_OPACITY,
            popup: Popup {
                name: record.name.clone(),
                value: reading,
                level: level.label().to_string(),
            },
        });
        projection.counts.bump(level);
    }

    projection
}

pub trait MapSurface: Send + Sync {
    fn replace_markers(&self, markers: Vec<MapMarker>);
    fn fit_view(&self, points: &[Position], options: FitOptions);
    fn fly_to(&self, position: Position, zoom: u8);
    fn open_popup(&self, station_id: &str);
    fn show_user_location(&self, position: Position);
}

pub trait ListSurface: Send + Sync {
    fn replace_entries(&self, entries: Vec<ListEntry>);
}

pub trait ChartSurface: Send + Sync {
    fn replace_bars(&self, bars: Vec<ChartBar>);
}

/// Selector widgets fed from the snapshot rather than the filtered set.
pub trait ControlsSurface: Send + Sync {
    fn set_region_options(&self, regions: Vec<String>);
    fn set_tour_label(&self, label: &str);
}

#[derive(Clone)]
pub struct Surfaces {
    pub map: Arc<dyn MapSurface>,
    pub list: Arc<dyn ListSurface>,
    pub chart: Arc<dyn ChartSurface>,
    pub controls: Arc<dyn ControlsSurface>,
}

impl Surfaces {
    /// All four surfaces backed by one object.
    pub fn single<S>(surface: Arc<S>) -> Self
    where
        S: MapSurface + ListSurface + ChartSurface + ControlsSurface + 'static,
    {
        Self {
            map: surface.clone(),
            list: surface.clone(),
            chart: surface.clone(),
            controls: surface,
        }
    }
}

pub struct ViewProjector {
    surfaces: Surfaces,
    list_cap: usize,
    fit_options: FitOptions,
}

impl ViewProjector {
    pub fn new(surfaces: Surfaces, list_cap: usize) -> Self {
        Self {
            surfaces,
            list_cap,
            fit_options: FitOptions::default(),
        }
    }

    pub fn surfaces(&self) -> &Surfaces {
        &self.surfaces
    }

    /// Project and push to every surface. `fly_to` additionally fits the map
    /// to the filtered markers.
    pub fn render(&self, snapshot: &[StationRecord], filter: &FilterModel, fly_to: bool) -> LevelCounts {
        let projection = project(snapshot, filter, self.list_cap);
        let regions = region_options(snapshot);
        let points = projection.fit_points();
        let counts = projection.counts;

        tracing::debug!(
            "render: {} markers, {} list entries, fly_to={}",
            projection.markers.len(),
            projection.list.len(),
            fly_to
        );

        self.surfaces.map.replace_markers(projection.markers);
        if fly_to && !points.is_empty() {
            self.surfaces.map.fit_view(&points, self.fit_options);
        }
        self.surfaces.list.replace_entries(projection.list);
        self.surfaces.chart.replace_bars(counts.bars());
        self.surfaces.controls.set_region_options(regions);

        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::dashboard::Dashboard;

    fn station(id: &str, region: &str, value: Option<f64>) -> StationRecord {
        StationRecord {
            id: id.to_string(),
            name: format!("Station {}", id),
            region: region.to_string(),
            position: Some(Position::new(25.0, 121.5)),
            value,
            observed_at: None,
        }
    }

    #[test]
    fn test_records_without_position_are_skipped() {
        let mut unplaced = station("b", "Taipei", Some(10.0));
        unplaced.position = None;
        let snapshot = vec![station("a", "Taipei", Some(10.0)), unplaced];

        let projection = project(&snapshot, &FilterModel::new(), DEFAULT_LIST_CAP);
        assert_eq!(projection.markers.len(), 1);
        assert_eq!(projection.list.len(), 1);
        assert_eq!(projection.counts.total(), 1);
    }

    #[test]
    fn test_counts_follow_the_filtered_set() {
        let snapshot = vec![
            station("a", "Taipei", Some(10.0)),
            station("b", "Tainan", Some(10.0)),
            station("c", "Taipei", Some(300.0)),
        ];
        let mut filter = FilterModel::new();
        filter.set_region(Some("Taipei".into()));

        let projection = project(&snapshot, &filter, DEFAULT_LIST_CAP);
        assert_eq!(projection.counts.good, 1);
        assert_eq!(projection.counts.hazardous, 1);
        assert_eq!(projection.counts.total(), projection.markers.len());
    }

    #[test]
    fn test_list_cap_truncates_list_only() {
        let snapshot: Vec<_> = (0..150)
            .map(|i| station(&format!("s{}", i), "Taipei", Some(20.0)))
            .collect();

        let projection = project(&snapshot, &FilterModel::new(), 100);
        assert_eq!(projection.list.len(), 100);
        assert_eq!(projection.markers.len(), 150);
        assert_eq!(projection.counts.good, 150);
    }

    #[test]
    fn test_marker_and_list_presentation() {
        let snapshot = vec![station("TW1", "Taipei", Some(42.5)), station("TW2", "Taipei", None)];
        let projection = project(&snapshot, &FilterModel::new(), DEFAULT_LIST_CAP);

        let marker = &projection.markers[0];
        assert_eq!(marker.fill, color_for(QualityLevel::Moderate));
        assert_eq!(marker.stroke, Color::WHITE);
        assert_eq!(marker.radius, 6.0);
        assert_eq!(marker.popup.value, "42.5");
        assert_eq!(marker.popup.level, "Moderate");

        let entry = &projection.list[1];
        assert_eq!(entry.label, "Station TW2");
        assert_eq!(entry.detail, "Taipei | PM2.5: n/a");
        assert_eq!(entry.accent, color_for(QualityLevel::Invalid));
        assert_eq!(entry.focus.zoom, FOCUS_ZOOM);
        assert_eq!(entry.focus.station_id, "TW2");
    }

    #[test]
    fn test_projection_is_idempotent() {
        let snapshot = vec![
            station("a", "Taipei", Some(10.0)),
            station("b", "Tainan", None),
            station("c", "Taipei", Some(80.0)),
        ];
        let mut filter = FilterModel::new();
        filter.set_id_substring("a");

        let first = project(&snapshot, &filter, DEFAULT_LIST_CAP);
        let second = project(&snapshot, &filter, DEFAULT_LIST_CAP);
        assert_eq!(first, second);
    }

    #[test]
    fn test_bars_are_in_level_order() {
        let counts = LevelCounts {
            good: 3,
            invalid: 1,
            ..Default::default()
        };
        let bars = counts.bars();
        assert_eq!(bars.len(), QualityLevel::ALL.len());
        assert_eq!(bars[0].level, QualityLevel::Good);
        assert_eq!(bars[0].count, 3);
        assert_eq!(bars[5].level, QualityLevel::Invalid);
        assert_eq!(bars[5].count, 1);
    }

    #[test]
    fn test_render_pushes_every_surface() {
        let dashboard = Arc::new(Dashboard::new());
        let projector = ViewProjector::new(Surfaces::single(dashboard.clone()), DEFAULT_LIST_CAP);
        let snapshot = vec![
            station("a", "Taipei", Some(10.0)),
            station("b", "Kaohsiung", Some(100.0)),
        ];

        let before = dashboard.view().viewport;
        let counts = projector.render(&snapshot, &FilterModel::new(), false);
        let view = dashboard.view();
        assert_eq!(counts.total(), 2);
        assert_eq!(view.markers.len(), 2);
        assert_eq!(view.list.len(), 2);
        assert_eq!(view.bars.iter().map(|b| b.count).sum::<usize>(), 2);
        assert_eq!(view.region_options, ["Kaohsiung", "Taipei"]);
        assert_eq!(view.viewport, before);

        projector.render(&snapshot, &FilterModel::new(), true);
        assert_ne!(dashboard.view().viewport, before);
    }
}
