//! Plane-Orthogonal-to-Skin pulse extraction.
//!
//! Every window of RGB means is normalised per channel, projected onto the
//! plane orthogonal to the skin-tone direction, collapsed to one dimension
//! with an amplitude-balancing factor, standardised and overlap-added into
//! the pulse buffer.

use crate::error::{Result, RppgError};
use crate::signal::{mean, std_dev, ChannelSeries, TimeSeries};
use log::{debug, warn};

/// Rows of the skin-orthogonal projection, applied to normalised R, G, B.
pub const PROJECTION: [[f64; 3]; 2] = [[0.0, 1.0, -1.0], [-2.0, 1.0, 1.0]];

const CHANNEL_NAMES: [&str; 3] = ["red", "green", "blue"];

/// Overlap-add buffer for the pulse estimate. Owned by one extraction pass
/// and frozen into a [`TimeSeries`] once every window has been added.
#[derive(Debug, Clone)]
pub struct PulseAccumulator {
    samples: Vec<f64>,
    windows: usize,
    skipped: usize,
}

impl PulseAccumulator {
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
            windows: 0,
            skipped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Windows that contributed to the buffer.
    pub fn windows(&self) -> usize {
        self.windows
    }

    /// Windows whose combined signal was flat and contributed nothing.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn add(&mut self, start: usize, segment: &[f64]) {
        for (acc, v) in self.samples[start..start + segment.len()].iter_mut().zip(segment) {
            *acc += v;
        }
        self.windows += 1;
    }

    fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn finish(self, fs: f64) -> TimeSeries {
        TimeSeries {
            fs,
            data: self.samples,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosExtractor {
    fps: f64,
    window_len: usize,
}

impl PosExtractor {
    /// Window length is `round(fps * window_seconds)` frames and must be at
    /// least two.
    pub fn new(fps: f64, window_seconds: f64) -> Result<Self> {
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(RppgError::InvalidParameter(format!(
                "fps must be positive, got {fps}"
            )));
        }
        if !(window_seconds > 0.0 && window_seconds.is_finite()) {
            return Err(RppgError::InvalidParameter(format!(
                "window length must be positive, got {window_seconds} s"
            )));
        }
        let window_len = (fps * window_seconds).round() as usize;
        if window_len < 2 {
            return Err(RppgError::InvalidParameter(format!(
                "window of {window_seconds} s at {fps} fps spans {window_len} frame(s), need at least 2"
            )));
        }
        Ok(Self { fps, window_len })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Frames each window projects: `[t, t + L - 1)`.
    pub fn span(&self) -> usize {
        self.window_len - 1
    }

    /// Extract the raw pulse. The result has one sample per frame; the last
    /// `L - 1` samples have no complete window after them and stay zero.
    ///
    /// Keeping that tail zero costs the last `L - 2` windows a plain
    /// `t < N - L` range would add, so the pulse ends in a step. A band-pass
    /// run over it rings near the end, and peaks detected there are
    /// unreliable.
    pub fn extract(&self, channels: &ChannelSeries) -> Result<TimeSeries> {
        let n = channels.len();
        if n < self.window_len {
            return Err(RppgError::InvalidInput(format!(
                "{n} frames is shorter than the {}-frame POS window",
                self.window_len
            )));
        }
        let acc = self.overlap_add(channels, PulseAccumulator::new(n))?;
        if acc.windows() == 0 {
            warn!(
                "{n} frames leave no room for a {}-frame window before the trailing boundary; pulse is flat",
                self.window_len
            );
        }
        debug!(
            "pos: {} windows added, {} flat windows skipped, window {} frames",
            acc.windows(),
            acc.skipped(),
            self.window_len
        );
        Ok(acc.finish(self.fps))
    }

    /// Add every window of `channels` into `acc` and hand it back.
    ///
    /// Windows start at `t = 0 ..= N - 2(L - 1)`, which keeps the trailing
    /// `L - 1` samples of the buffer untouched.
    pub fn overlap_add(
        &self,
        channels: &ChannelSeries,
        mut acc: PulseAccumulator,
    ) -> Result<PulseAccumulator> {
        if acc.len() != channels.len() {
            return Err(RppgError::InvalidInput(format!(
                "accumulator holds {} samples for {} frames",
                acc.len(),
                channels.len()
            )));
        }
        let span = self.span();
        let covered = channels.len().saturating_sub(span);
        if covered < span {
            return Ok(acc);
        }
        for start in 0..=covered - span {
            match self.project_window(channels, start)? {
                Some(pulse) => acc.add(start, &pulse),
                None => acc.skip(),
            }
        }
        Ok(acc)
    }

    /// Standardised pulse for the window starting at `start`, or `None` when
    /// the combined signal is flat.
    fn project_window(&self, channels: &ChannelSeries, start: usize) -> Result<Option<Vec<f64>>> {
        let end = start + self.span();
        let rows = channels.rows();

        let mut normalized: [Vec<f64>; 3] = Default::default();
        for (c, row) in rows.iter().enumerate() {
            let window = &row[start..end];
            let m = mean(window);
            if m == 0.0 {
                return Err(RppgError::DegenerateWindow {
                    start,
                    channel: CHANNEL_NAMES[c],
                });
            }
            normalized[c] = window.iter().map(|v| v / m).collect();
        }

        let project = |weights: &[f64; 3]| -> Vec<f64> {
            (0..end - start)
                .map(|i| {
                    weights[0] * normalized[0][i]
                        + weights[1] * normalized[1][i]
                        + weights[2] * normalized[2][i]
                })
                .collect()
        };
        let s1 = project(&PROJECTION[0]);
        let s2 = project(&PROJECTION[1]);

        let sd2 = std_dev(&s2);
        let alpha = if sd2 > 0.0 { std_dev(&s1) / sd2 } else { 0.0 };
        let p: Vec<f64> = s1.iter().zip(&s2).map(|(a, b)| a + alpha * b).collect();

        let sd = std_dev(&p);
        if !(sd > 0.0) {
            return Ok(None);
        }
        let m = mean(&p);
        Ok(Some(p.iter().map(|v| (v - m) / sd).collect()))
    }
}
