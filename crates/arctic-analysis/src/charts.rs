//! Chart generation for uploaded tables.
//!
//! Charts are PNG files written with the plotters bitmap backend into a
//! working directory owned by the caller. They carry no text; titles travel
//! alongside each artifact and are printed by the report.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;

use arctic_core::config::{AnalysisConfig, MIN_CHART_SIZE};

use crate::error::AnalysisError;
use crate::stats::{
    correlation_matrix, gaussian_kde, histogram, present, scott_bandwidth, sturges_bins,
    value_counts, Histogram,
};
use crate::table::UploadedTable;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

const MARGIN: i32 = 40;
const BAR: RGBColor = RGBColor(76, 114, 176);
const CURVE: RGBColor = RGBColor(31, 60, 120);
const AXIS: RGBColor = RGBColor(60, 60, 60);
const UNDEFINED: RGBColor = RGBColor(200, 200, 200);

/// Qualitative palette for pie slices.
const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    CorrelationHeatmap,
    PairPlot,
    Distribution,
    Pie,
}

/// A rendered chart on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub kind: ChartKind,
    pub title: String,
    pub path: PathBuf,
}

impl ChartArtifact {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn chart_err<E: std::fmt::Display>(err: E) -> AnalysisError {
    AnalysisError::Chart(err.to_string())
}

/// Keep file names portable: anything but ASCII alphanumerics, `-` and `_`
/// becomes `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// File names handed out during one render run. Columns whose sanitized
/// stems coincide get a numeric suffix in emission order.
#[derive(Debug, Default)]
pub struct ChartFileNames {
    used: HashSet<String>,
}

impl ChartFileNames {
    pub fn claim(&mut self, prefix: &str, column: &str) -> String {
        let stem = format!("{}_{}", prefix, sanitize_file_stem(column));
        let mut name = format!("{}.png", stem);
        let mut suffix = 1;
        while !self.used.insert(name.clone()) {
            name = format!("{}_{}.png", stem, suffix);
            suffix += 1;
        }
        name
    }
}

// =============================================================================
// ChartRenderer
// =============================================================================

pub struct ChartRenderer {
    width: u32,
    height: u32,
    max_pie_slices: usize,
}

impl ChartRenderer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            width: config.chart_width.max(MIN_CHART_SIZE),
            height: config.chart_height.max(MIN_CHART_SIZE),
            max_pie_slices: config.max_pie_slices,
        }
    }

    /// Render every chart for `table` into `dir`, in emission order:
    /// correlation heatmap and pair plot (two or more numeric columns), one
    /// distribution per numeric column, one pie per text column.
    pub fn render_all(
        &self,
        table: &UploadedTable,
        dir: &Path,
    ) -> Result<Vec<ChartArtifact>, AnalysisError> {
        let numeric = table.numeric_columns();
        let mut charts = Vec::new();
        let mut names = ChartFileNames::default();

        if numeric.len() >= 2 {
            charts.push(self.correlation_heatmap(table, dir)?);
            charts.push(self.pair_plot(table, dir)?);
        }
        for (name, values) in &numeric {
            let path = dir.join(names.claim("distribution", name));
            charts.push(self.distribution_at(name, values, path)?);
        }
        for (name, values) in table.text_columns() {
            if values.iter().all(Option::is_none) {
                continue;
            }
            let path = dir.join(names.claim("pie_chart", name));
            if let Some(chart) = self.pie_at(name, values, path)? {
                charts.push(chart);
            }
        }

        tracing::debug!(count = charts.len(), dir = %dir.display(), "Charts rendered");
        Ok(charts)
    }

    fn draw<F>(&self, path: &Path, paint: F) -> Result<(), AnalysisError>
    where
        F: FnOnce(&Area<'_>) -> Result<(), AnalysisError>,
    {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        paint(&root)?;
        root.present().map_err(chart_err)
    }

    fn frame(&self) -> Frame {
        Frame {
            left: MARGIN,
            top: MARGIN,
            right: self.width as i32 - MARGIN,
            bottom: self.height as i32 - MARGIN,
        }
    }

    pub fn correlation_heatmap(
        &self,
        table: &UploadedTable,
        dir: &Path,
    ) -> Result<ChartArtifact, AnalysisError> {
        let corr = correlation_matrix(table);
        let path = dir.join("correlation_matrix.png");
        let n = corr.columns.len().max(1) as i32;
        let frame = self.frame();
        // Leave room on the right for the colour scale.
        let side = ((frame.right - frame.left - 60).min(frame.bottom - frame.top) / n).max(1);

        self.draw(&path, |root| {
            for (i, row) in corr.values.iter().enumerate() {
                for (j, value) in row.iter().enumerate() {
                    let x = frame.left + j as i32 * side;
                    let y = frame.top + i as i32 * side;
                    let color = value.map(diverging).unwrap_or(UNDEFINED);
                    root.draw(&Rectangle::new(
                        [(x, y), (x + side, y + side)],
                        color.filled(),
                    ))
                    .map_err(chart_err)?;
                }
            }

            let scale_x = frame.left + n * side + 20;
            let scale_h = n * side;
            for step in 0..scale_h.max(1) {
                let r = 1.0 - 2.0 * step as f64 / scale_h.max(1) as f64;
                root.draw(&Rectangle::new(
                    [(scale_x, frame.top + step), (scale_x + 20, frame.top + step + 1)],
                    diverging(r).filled(),
                ))
                .map_err(chart_err)?;
            }
            Ok(())
        })?;

        Ok(ChartArtifact {
            kind: ChartKind::CorrelationHeatmap,
            title: "Correlation Matrix".to_string(),
            path,
        })
    }

    pub fn pair_plot(
        &self,
        table: &UploadedTable,
        dir: &Path,
    ) -> Result<ChartArtifact, AnalysisError> {
        let numeric = table.numeric_columns();
        let path = dir.join("pair_plot.png");
        let n = numeric.len().max(1) as i32;
        let frame = self.frame();
        let cell_w = (frame.right - frame.left) / n;
        let cell_h = (frame.bottom - frame.top) / n;
        let ranges: Vec<(f64, f64)> = numeric.iter().map(|(_, v)| data_range(&present(v))).collect();

        self.draw(&path, |root| {
            for (i, (_, y_values)) in numeric.iter().enumerate() {
                for (j, (_, x_values)) in numeric.iter().enumerate() {
                    let panel = Frame {
                        left: frame.left + j as i32 * cell_w + 4,
                        top: frame.top + i as i32 * cell_h + 4,
                        right: frame.left + (j as i32 + 1) * cell_w - 4,
                        bottom: frame.top + (i as i32 + 1) * cell_h - 4,
                    };
                    root.draw(&Rectangle::new(
                        [(panel.left, panel.top), (panel.right, panel.bottom)],
                        AXIS.stroke_width(1),
                    ))
                    .map_err(chart_err)?;

                    if i == j {
                        let data = present(x_values);
                        if let Some(hist) = histogram(&data, sturges_bins(data.len())) {
                            draw_histogram(root, &panel, &hist)?;
                        }
                        continue;
                    }
                    for (x, y) in x_values.iter().zip(y_values.iter()) {
                        if let (Some(x), Some(y)) = (x, y) {
                            let px = panel.x(normalize(*x, ranges[j]));
                            let py = panel.y(normalize(*y, ranges[i]));
                            root.draw(&Circle::new((px, py), 2, BAR.filled()))
                                .map_err(chart_err)?;
                        }
                    }
                }
            }
            Ok(())
        })?;

        Ok(ChartArtifact {
            kind: ChartKind::PairPlot,
            title: "Pair Plot".to_string(),
            path,
        })
    }

    /// Histogram with Sturges bins and a Gaussian KDE overlay scaled to
    /// counts.
    pub fn distribution(
        &self,
        column: &str,
        values: &[Option<f64>],
        dir: &Path,
    ) -> Result<ChartArtifact, AnalysisError> {
        let path = dir.join(format!("distribution_{}.png", sanitize_file_stem(column)));
        self.distribution_at(column, values, path)
    }

    fn distribution_at(
        &self,
        column: &str,
        values: &[Option<f64>],
        path: PathBuf,
    ) -> Result<ChartArtifact, AnalysisError> {
        let data = present(values);
        let frame = self.frame();

        self.draw(&path, |root| {
            draw_axes(root, &frame)?;
            let Some(hist) = histogram(&data, sturges_bins(data.len())) else {
                return Ok(());
            };
            draw_histogram(root, &frame, &hist)?;

            if let Some(bandwidth) = scott_bandwidth(&data) {
                let steps = 200;
                let span = hist.end() - hist.start;
                let grid: Vec<f64> = (0..=steps)
                    .map(|k| hist.start + span * k as f64 / steps as f64)
                    .collect();
                let scale = data.len() as f64 * hist.bin_width;
                let peak = hist.max_count().max(1) as f64;
                let points: Vec<(i32, i32)> = grid
                    .iter()
                    .zip(gaussian_kde(&data, bandwidth, &grid))
                    .map(|(x, density)| {
                        (
                            frame.x((x - hist.start) / span),
                            frame.y((density * scale / peak).min(1.0)),
                        )
                    })
                    .collect();
                root.draw(&PathElement::new(points, CURVE.stroke_width(2)))
                    .map_err(chart_err)?;
            }
            Ok(())
        })?;

        Ok(ChartArtifact {
            kind: ChartKind::Distribution,
            title: format!("Distribution of {}", column),
            path,
        })
    }

    /// Pie of category frequencies, limited to the most common categories.
    /// Returns `None` for a column without values.
    pub fn pie(
        &self,
        column: &str,
        values: &[Option<String>],
        dir: &Path,
    ) -> Result<Option<ChartArtifact>, AnalysisError> {
        let path = dir.join(format!("pie_chart_{}.png", sanitize_file_stem(column)));
        self.pie_at(column, values, path)
    }

    fn pie_at(
        &self,
        column: &str,
        values: &[Option<String>],
        path: PathBuf,
    ) -> Result<Option<ChartArtifact>, AnalysisError> {
        let counts = pie_slices(values, self.max_pie_slices);
        if counts.is_empty() {
            return Ok(None);
        }
        let total: usize = counts.iter().map(|(_, c)| c).sum();

        let cx = self.width as i32 / 2;
        let cy = self.height as i32 / 2;
        let radius = (self.width.min(self.height) as f64 / 2.0) - MARGIN as f64;

        self.draw(&path, |root| {
            let mut start = 0.0f64;
            for (i, (_, count)) in counts.iter().enumerate() {
                let sweep = std::f64::consts::TAU * *count as f64 / total as f64;
                let slice = pie_slice((cx, cy), radius, start, start + sweep);
                root.draw(&Polygon::new(slice.clone(), PALETTE[i % PALETTE.len()].filled()))
                    .map_err(chart_err)?;
                root.draw(&PathElement::new(slice, WHITE.stroke_width(1)))
                    .map_err(chart_err)?;
                start += sweep;
            }
            Ok(())
        })?;

        Ok(Some(ChartArtifact {
            kind: ChartKind::Pie,
            title: format!("Pie Chart of {}", column),
            path,
        }))
    }
}

/// The most frequent categories of a text column, at most `max` of them.
pub fn pie_slices(values: &[Option<String>], max: usize) -> Vec<(String, usize)> {
    let mut counts = value_counts(values);
    counts.truncate(max.max(1));
    counts
}

// =============================================================================
// Drawing helpers
// =============================================================================

/// Pixel rectangle that maps unit coordinates, y growing upwards.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Frame {
    fn x(&self, t: f64) -> i32 {
        self.left + (t * (self.right - self.left) as f64).round() as i32
    }

    fn y(&self, t: f64) -> i32 {
        self.bottom - (t * (self.bottom - self.top) as f64).round() as i32
    }
}

fn data_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = values.iter().copied().reduce(f64::max).unwrap_or(1.0);
    if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    }
}

fn normalize(v: f64, (min, max): (f64, f64)) -> f64 {
    (v - min) / (max - min)
}

fn draw_axes(root: &Area<'_>, frame: &Frame) -> Result<(), AnalysisError> {
    root.draw(&PathElement::new(
        vec![
            (frame.left, frame.top),
            (frame.left, frame.bottom),
            (frame.right, frame.bottom),
        ],
        AXIS.stroke_width(1),
    ))
    .map_err(chart_err)
}

fn draw_histogram(root: &Area<'_>, frame: &Frame, hist: &Histogram) -> Result<(), AnalysisError> {
    let bins = hist.counts.len().max(1) as f64;
    let peak = hist.max_count().max(1) as f64;
    for (k, count) in hist.counts.iter().enumerate() {
        let x0 = frame.x(k as f64 / bins);
        let x1 = frame.x((k + 1) as f64 / bins);
        let y = frame.y(*count as f64 / peak);
        root.draw(&Rectangle::new([(x0, y), (x1, frame.bottom)], BAR.mix(0.7).filled()))
            .map_err(chart_err)?;
        root.draw(&Rectangle::new([(x0, y), (x1, frame.bottom)], WHITE.stroke_width(1)))
            .map_err(chart_err)?;
    }
    Ok(())
}

/// Blue for -1, light grey for 0, red for +1.
fn diverging(r: f64) -> RGBColor {
    let r = r.clamp(-1.0, 1.0);
    let (from, to, t) = if r < 0.0 {
        ((221.0, 221.0, 221.0), (59.0, 76.0, 192.0), -r)
    } else {
        ((221.0, 221.0, 221.0), (180.0, 4.0, 38.0), r)
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

/// Polygon outline of a pie slice, counter-clockwise from `start` radians.
fn pie_slice(center: (i32, i32), radius: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    let steps = (((end - start).to_degrees() / 2.0).ceil() as usize).max(1);
    let mut points = Vec::with_capacity(steps + 3);
    points.push(center);
    for k in 0..=steps {
        let angle = start + (end - start) * k as f64 / steps as f64;
        points.push((
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 - (radius * angle.sin()).round() as i32,
        ));
    }
    points.push(center);
    points
}
