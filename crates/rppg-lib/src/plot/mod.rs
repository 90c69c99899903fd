//! Backend-agnostic figures for the processing stages. The CLI renders them
//! to PNG; nothing here depends on a drawing library.

use crate::signal::{ChannelSeries, PeakSequence, SpectrumEstimate, TimeSeries};
use serde::{Deserialize, Serialize};

pub const RED: Color = Color(0xD62728);
pub const GREEN: Color = Color(0x2CA02C);
pub const BLUE: Color = Color(0x1F77B4);
pub const BLACK: Color = Color(0x202020);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    /// Plot values on a base-10 logarithmic scale.
    pub log: bool,
}

impl Axis {
    fn labelled(label: &str) -> Self {
        Self {
            label: Some(label.into()),
            log: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    /// Isolated markers, e.g. detected peaks.
    Markers(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(s) | Series::Markers(s) => &s.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>, x: Axis, y: Axis) -> Self {
        Self {
            title: title.into(),
            x,
            y,
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Finite `(min, max)` over all series on both axes, skipping
    /// non-positive values on logarithmic axes.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let mut x = [f64::INFINITY, f64::NEG_INFINITY];
        let mut y = [f64::INFINITY, f64::NEG_INFINITY];
        for p in self.series.iter().flat_map(|s| s.points()) {
            if !p[0].is_finite() || !p[1].is_finite() || (self.y.log && p[1] <= 0.0) {
                continue;
            }
            x = [x[0].min(p[0]), x[1].max(p[0])];
            y = [y[0].min(p[1]), y[1].max(p[1])];
        }
        (x[0] <= x[1]).then_some((x, y))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

fn line(name: &str, points: Vec<[f64; 2]>, color: Color, width: f32) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points,
        style: Style { width, color },
    })
}

fn frame_points(data: &[f64], fps: f64) -> Vec<[f64; 2]> {
    let dt = 1000.0 / fps.max(f64::MIN_POSITIVE);
    data.iter()
        .enumerate()
        .map(|(i, v)| [i as f64 * dt, *v])
        .collect()
}

/// Raw RGB means against time in milliseconds.
pub fn figure_from_channels(channels: &ChannelSeries, fps: f64, max_points: usize) -> Figure {
    let mut fig = Figure::new(
        Some("Raw RGB signals".into()),
        Axis::labelled("Time (ms)"),
        Axis::labelled("Pixel mean"),
    );
    for (name, data, color) in [
        ("Red", channels.red(), RED),
        ("Green", channels.green(), GREEN),
        ("Blue", channels.blue(), BLUE),
    ] {
        fig.add_series(line(name, decimate_points(&frame_points(data, fps), max_points), color, 1.2));
    }
    fig
}

/// Extracted pulse overlaid with its band-passed version, plus markers at
/// `peaks` on the filtered trace.
pub fn figure_from_pulse(
    raw: &TimeSeries,
    filtered: &TimeSeries,
    peaks: Option<&PeakSequence>,
    max_points: usize,
) -> Figure {
    let mut fig = Figure::new(
        Some("Raw and filtered pulse".into()),
        Axis::labelled("Time (ms)"),
        Axis::labelled("Amplitude"),
    );
    fig.add_series(line(
        "Extracted pulse",
        decimate_points(&frame_points(&raw.data, raw.fs), max_points),
        GREEN,
        1.0,
    ));
    let filtered_points = frame_points(&filtered.data, filtered.fs);
    if let Some(peaks) = peaks {
        let markers = peaks
            .indices()
            .into_iter()
            .filter_map(|i| filtered_points.get(i).copied())
            .collect();
        fig.add_series(Series::Markers(LineSeries {
            name: "Peaks".into(),
            points: markers,
            style: Style {
                width: 3.0,
                color: BLACK,
            },
        }));
    }
    fig.add_series(line(
        "Filtered pulse",
        decimate_points(&filtered_points, max_points),
        RED,
        1.4,
    ));
    fig
}

/// Spectrum against frequency; PSDs are drawn on a log axis.
pub fn figure_from_spectrum(title: &str, spectrum: &SpectrumEstimate, log_scale: bool) -> Figure {
    let mut fig = Figure::new(
        Some(title.into()),
        Axis::labelled("Frequency (Hz)"),
        Axis {
            label: Some(if log_scale { "PSD (V²/Hz)" } else { "Magnitude" }.into()),
            log: log_scale,
        },
    );
    fig.add_series(line(title, spectrum.points(), BLUE, 1.4));
    fig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimation_caps_point_count() {
        let points: Vec<[f64; 2]> = (0..1000).map(|i| [i as f64, 0.0]).collect();
        let out = decimate_points(&points, 100);
        assert_eq!(out.len(), 100);
        assert_eq!(out[1], [10.0, 0.0]);
    }

    #[test]
    fn pulse_figure_marks_peaks() {
        let raw = TimeSeries {
            fs: 10.0,
            data: vec![0.0, 1.0, 0.0, -1.0, 0.0],
        };
        let peaks = PeakSequence::from_indices(5, &[1]);
        let fig = figure_from_pulse(&raw, &raw, Some(&peaks), 1024);
        assert_eq!(fig.series.len(), 3);
        match &fig.series[1] {
            Series::Markers(m) => assert_eq!(m.points, vec![[100.0, 1.0]]),
            other => panic!("expected markers, got {other:?}"),
        }
    }

    #[test]
    fn log_bounds_skip_non_positive_values() {
        let spectrum = SpectrumEstimate {
            frequencies: vec![0.0, 1.0, 2.0],
            values: vec![0.0, 1e-3, 2.0],
        };
        let fig = figure_from_spectrum("Welch", &spectrum, true);
        let (x, y) = fig.bounds().unwrap();
        assert_eq!(x, [1.0, 2.0]);
        assert_eq!(y, [1e-3, 2.0]);
    }
}
