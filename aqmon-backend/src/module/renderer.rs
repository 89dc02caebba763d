use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use resvg::tiny_skia;
use resvg::usvg::{Options, Tree, fontdb};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use super::dashboard::DashboardView;

const SVG_TEMPLATE: &str = include_str!("../../resources/dashboard_template.svg");
pub const LATEST_FILENAME: &str = "dashboard_latest.png";

/// Renders the dashboard surfaces into a PNG snapshot.
pub struct DashboardRenderer {
    output_dir: PathBuf,
    fonts_dir: PathBuf,
}

impl DashboardRenderer {
    // Map panel, matches the template.
    const MAP_X: f64 = 20.0;
    const MAP_Y: f64 = 80.0;
    const MAP_SIZE: f64 = 600.0;

    const BAR_BASE_Y: f64 = 290.0;
    const BAR_MAX_HEIGHT: f64 = 150.0;
    const BAR_X: f64 = 660.0;
    const BAR_STEP: f64 = 52.0;
    const BAR_WIDTH: f64 = 40.0;

    const LIST_START_Y: f64 = 385.0;
    const LIST_ROW_HEIGHT: f64 = 27.0;
    const LIST_ROWS: usize = 11;

    pub fn new(output_dir: impl AsRef<Path>, fonts_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            fonts_dir: fonts_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write a timestamped PNG plus `dashboard_latest.png`; returns the
    /// latest path.
    pub async fn render(&self, view: &DashboardView) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .await
            .context("Failed to create output directory")?;

        let output_path = self.output_dir.join(Self::output_filename(Utc::now()));
        let latest_path = self.output_dir.join(LATEST_FILENAME);

        let png = self.render_png(view).await?;
        fs::write(&output_path, &png)
            .await
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        fs::copy(&output_path, &latest_path)
            .await
            .context("Failed to copy to dashboard_latest.png")?;

        tracing::info!("Generated dashboard image: {:?}", output_path);
        Ok(latest_path)
    }

    /// Encode the dashboard without touching the output directory.
    pub async fn render_png(&self, view: &DashboardView) -> Result<Vec<u8>> {
        let svg = Self::build_svg(view);
        let fonts_dir = self.fonts_dir.clone();
        tokio::task::spawn_blocking(move || rasterize(&svg, &fonts_dir))
            .await
            .context("Render task panicked")?
    }

    fn output_filename(at: DateTime<Utc>) -> String {
        format!("dashboard_{}.png", at.format("%Y%m%d_%H%M%S"))
    }

    fn build_svg(view: &DashboardView) -> String {
        let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let shown: usize = view.bars.iter().map(|b| b.count).sum();
        let summary = format!("{} stations shown", shown);
        let tour = if view.tour_label.is_empty() {
            "paused"
        } else {
            view.tour_label.as_str()
        };

        SVG_TEMPLATE
            .replace("{{SUMMARY}}", &escape_xml(&summary))
            .replace("{{GENERATED_AT}}", &escape_xml(&generated_at))
            .replace("{{TOUR}}", &escape_xml(tour))
            .replace("{{MARKERS}}", &Self::build_markers_svg(view))
            .replace("{{USER_LOCATION}}", &Self::build_user_svg(view))
            .replace("{{BARS}}", &Self::build_bars_svg(view))
            .replace("{{LIST}}", &Self::build_list_svg(view))
    }

    /// Equirectangular projection of a coordinate into the map panel.
    fn to_panel(view: &DashboardView, lat: f64, lng: f64) -> (f64, f64) {
        let deg_per_px = 360.0 / (256.0 * 2f64.powi(view.viewport.zoom as i32));
        let cx = Self::MAP_X + Self::MAP_SIZE / 2.0;
        let cy = Self::MAP_Y + Self::MAP_SIZE / 2.0;
        (
            cx + (lng - view.viewport.center.lng) / deg_per_px,
            cy - (lat - view.viewport.center.lat) / deg_per_px,
        )
    }

    fn build_markers_svg(view: &DashboardView) -> String {
        let mut out = String::new();
        for marker in &view.markers {
            let (x, y) = Self::to_panel(view, marker.position.lat, marker.position.lng);
            out.push_str(&format!(
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="{r}" fill="{fill}" fill-opacity="{op}" stroke="{stroke}" stroke-width="{sw}"/>"#,
                x = x,
                y = y,
                r = marker.radius,
                fill = marker.fill,
                op = marker.fill_opacity,
                stroke = marker.stroke,
                sw = marker.stroke_width,
            ));
        }
        out
    }

    fn build_user_svg(view: &DashboardView) -> String {
        let Some(user) = view.user_location else {
            return String::new();
        };
        let (x, y) = Self::to_panel(view, user.lat, user.lng);
        format!(
            r##"<circle cx="{x:.1}" cy="{y:.1}" r="14" fill="none" stroke="#0d6efd" stroke-width="2"/><circle cx="{x:.1}" cy="{y:.1}" r="5" fill="#0d6efd"/>"##,
            x = x,
            y = y,
        )
    }

    fn build_bars_svg(view: &DashboardView) -> String {
        let max = view.bars.iter().map(|b| b.count).max().unwrap_or(0);
        let scale = ((max + 1) as f64).ln();

        let mut out = String::new();
        for (i, bar) in view.bars.iter().enumerate() {
            // Log scale so one dominant level doesn't flatten the rest.
            let height = if scale > 0.0 {
                ((bar.count + 1) as f64).ln() / scale * Self::BAR_MAX_HEIGHT
            } else {
                0.0
            };
            let x = Self::BAR_X + i as f64 * Self::BAR_STEP;
            let y = Self::BAR_BASE_Y - height;
            out.push_str(&format!(
                r#"<rect x="{x:.0}" y="{y:.1}" width="{w:.0}" height="{h:.1}" fill="{fill}"/>
<text x="{tx:.0}" y="{cy:.1}" class="bar-label" text-anchor="middle">{count}</text>
<text x="{tx:.0}" y="{ly:.0}" class="bar-label" text-anchor="middle">{label}</text>"#,
                x = x,
                y = y,
                w = Self::BAR_WIDTH,
                h = height,
                fill = bar.color,
                tx = x + Self::BAR_WIDTH / 2.0,
                cy = y - 4.0,
                count = bar.count,
                ly = Self::BAR_BASE_Y + 16.0,
                label = escape_xml(bar.level.as_str()),
            ));
        }
        out
    }

    fn build_list_svg(view: &DashboardView) -> String {
        let mut out = String::new();
        for (i, entry) in view.list.iter().take(Self::LIST_ROWS).enumerate() {
            let y = Self::LIST_START_Y + i as f64 * Self::LIST_ROW_HEIGHT;
            out.push_str(&format!(
                r#"<rect x="655" y="{y:.0}" width="5" height="22" fill="{accent}"/>
<text x="668" y="{ly:.0}" class="cell-text">{label}</text>
<text x="668" y="{dy:.0}" class="detail-text">{detail}</text>"#,
                y = y,
                accent = entry.accent,
                ly = y + 10.0,
                label = escape_xml(&entry.label),
                dy = y + 21.0,
                detail = escape_xml(&entry.detail),
            ));
        }
        if view.list.len() > Self::LIST_ROWS {
            let y = Self::LIST_START_Y + Self::LIST_ROWS as f64 * Self::LIST_ROW_HEIGHT + 8.0;
            out.push_str(&format!(
                r#"<text x="668" y="{y:.0}" class="detail-text">+{more} more</text>"#,
                y = y,
                more = view.list.len() - Self::LIST_ROWS,
            ));
        }
        out
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rasterize(svg_content: &str, fonts_dir: &Path) -> Result<Vec<u8>> {
    let mut fontdb = fontdb::Database::new();
    fontdb.load_fonts_dir(fonts_dir);
    tracing::debug!("Loaded {} font faces from {:?}", fontdb.len(), fonts_dir);

    let mut options = Options::default();
    options.font_family = "Noto Sans".to_string();
    options.fontdb = Arc::new(fontdb);

    let tree = Tree::from_str(svg_content, &options).context("Failed to parse SVG")?;

    let size = tree.size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width() as u32, size.height() as u32)
        .context("Failed to create pixmap")?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap.encode_png().context("Failed to encode PNG")
}

/// Delete dashboard PNGs older than `retention_days`. The latest copy is kept.
pub async fn cleanup_old_images(image_dir: &Path, retention_days: i64) -> Result<usize> {
    if !image_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let mut deleted = 0;
    let mut entries = fs::read_dir(image_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_png = path.extension().is_some_and(|ext| ext == "png");
        let is_latest = path.file_name().is_some_and(|name| name == LATEST_FILENAME);
        if !path.is_file() || !is_png || is_latest {
            continue;
        }

        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            continue;
        };
        let modified: DateTime<Utc> = modified.into();
        if modified < cutoff {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    tracing::debug!("Deleted old image: {:?}", path);
                }
                Err(e) => tracing::warn!("Failed to delete old image {:?}: {}", path, e),
            }
        }
    }

    if deleted > 0 {
        tracing::info!("Cleaned up {} old images from {:?}", deleted, image_dir);
    }
    Ok(deleted)
}
