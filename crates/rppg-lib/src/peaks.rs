use crate::error::{Result, RppgError};
use crate::heart_rate::{estimate_bpm, HrBand};
use crate::signal::{mean, PeakSequence};
use crate::spectrum::welch_psd;
use log::debug;
use serde::{Deserialize, Serialize};

/// Summary produced alongside detected peaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakMeasures {
    pub bpm: f64,
    /// Mean inter-beat interval.
    pub ibi_ms: f64,
    /// `None` when the beat series is too short to resolve respiration.
    pub breathing_rate_per_min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakAnalysis {
    /// Index-aligned with the analysed signal.
    pub peaks: PeakSequence,
    pub measures: PeakMeasures,
}

/// Systolic peak detection over a filtered pulse.
pub trait PeakAnalyzer {
    fn analyze(&self, signal: &[f64], fps: f64) -> Result<PeakAnalysis>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Centred moving-average length used as the adaptive threshold (s).
    pub ma_window_s: f64,
    /// Refractory period between accepted peaks (s).
    pub min_interval_s: f64,
    /// Rate at which the beat-interval series is resampled for respiration (Hz).
    pub ibi_resample_hz: f64,
    pub breathing_band: HrBand,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            ma_window_s: 0.75,
            min_interval_s: 0.33,
            ibi_resample_hz: 4.0,
            breathing_band: HrBand {
                low_hz: 0.1,
                high_hz: 0.4,
            },
        }
    }
}

/// Marks the maximum of every excursion above a centred moving average,
/// then enforces the refractory period by keeping the taller of two peaks
/// that are too close.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovingAverageAnalyzer {
    pub cfg: PeakConfig,
}

impl MovingAverageAnalyzer {
    pub fn new(cfg: PeakConfig) -> Self {
        Self { cfg }
    }

    fn detect(&self, signal: &[f64], fps: f64) -> Vec<usize> {
        let win = ((self.cfg.ma_window_s * fps).round() as usize).max(1);
        let threshold = centered_moving_average(signal, win);

        let mut candidates = Vec::new();
        let mut region: Option<usize> = None;
        for i in 0..signal.len() {
            if signal[i] > threshold[i] {
                match region {
                    Some(best) if signal[best] >= signal[i] => {}
                    _ => region = Some(i),
                }
            } else if let Some(best) = region.take() {
                candidates.push(best);
            }
        }
        // An excursion still open at the end has no falling edge; drop it.

        let min_gap = ((self.cfg.min_interval_s * fps).round() as usize).max(1);
        let mut peaks: Vec<usize> = Vec::with_capacity(candidates.len());
        for idx in candidates {
            match peaks.last().copied() {
                Some(last) if idx - last < min_gap => {
                    if signal[idx] > signal[last] {
                        peaks.pop();
                        peaks.push(idx);
                    }
                }
                _ => peaks.push(idx),
            }
        }
        peaks
    }

    fn breathing_rate(&self, ibi_ms: &[f64]) -> Option<f64> {
        let fs = self.cfg.ibi_resample_hz;
        let resampled = resample_intervals(ibi_ms, fs);
        let psd = welch_psd(&resampled, fs, resampled.len().max(2)).ok()?;
        estimate_bpm(&psd, self.cfg.breathing_band).ok()
    }
}

impl PeakAnalyzer for MovingAverageAnalyzer {
    fn analyze(&self, signal: &[f64], fps: f64) -> Result<PeakAnalysis> {
        if !(fps > 0.0) {
            return Err(RppgError::InvalidParameter(format!(
                "fps must be positive, got {fps}"
            )));
        }
        let indices = self.detect(signal, fps);
        if indices.len() < 2 {
            return Err(RppgError::InsufficientSamples {
                needed: 2,
                got: indices.len(),
            });
        }
        let ibi: Vec<f64> = indices
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64 * 1000.0 / fps)
            .collect();
        let ibi_ms = mean(&ibi);
        let breathing_rate_per_min = self.breathing_rate(&ibi);
        debug!(
            "{} peaks, mean ibi {ibi_ms:.1} ms, breathing {:?}",
            indices.len(),
            breathing_rate_per_min
        );
        Ok(PeakAnalysis {
            peaks: PeakSequence::from_indices(signal.len(), &indices),
            measures: PeakMeasures {
                bpm: 60_000.0 / ibi_ms,
                ibi_ms,
                breathing_rate_per_min,
            },
        })
    }
}

fn centered_moving_average(data: &[f64], win: usize) -> Vec<f64> {
    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in data {
        acc += x;
        prefix.push(acc);
    }
    let half = win / 2;
    (0..data.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + win - half).min(data.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Step-interpolate the beat-interval series onto a uniform grid, each
/// interval holding until the beat that ends it.
fn resample_intervals(ibi_ms: &[f64], fs: f64) -> Vec<f64> {
    let mut ends = Vec::with_capacity(ibi_ms.len());
    let mut acc = 0.0;
    for interval in ibi_ms {
        acc += interval / 1000.0;
        ends.push(acc);
    }
    let Some(&duration) = ends.last() else {
        return Vec::new();
    };
    let n = (duration * fs).floor() as usize;
    let mut out = Vec::with_capacity(n);
    let mut idx = 0;
    for i in 0..n {
        let t = i as f64 / fs;
        while idx + 1 < ends.len() && ends[idx] <= t {
            idx += 1;
        }
        out.push(ibi_ms[idx]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn pulse(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn finds_one_peak_per_cycle() {
        let fs = 60.0;
        let signal = pulse(1.0, fs, 600);
        let analysis = MovingAverageAnalyzer::default().analyze(&signal, fs).unwrap();
        assert_eq!(analysis.peaks.len(), 600);
        let idx = analysis.peaks.indices();
        assert_eq!(idx.len(), 10);
        assert_eq!(idx[0], 15);
        assert!(idx.windows(2).all(|w| w[1] - w[0] == 60));
        assert!((analysis.measures.bpm - 60.0).abs() < 1e-9);
        assert!((analysis.measures.ibi_ms - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn refractory_period_keeps_taller_peak() {
        let fs = 100.0;
        let mut signal = vec![0.0; 400];
        for (i, v) in [(50, 1.0), (60, 1.5), (150, 1.0), (250, 1.0), (350, 1.0)] {
            signal[i] = v;
        }
        let analyzer = MovingAverageAnalyzer::default();
        assert_eq!(analyzer.detect(&signal, fs), vec![60, 150, 250, 350]);
    }

    #[test]
    fn flat_signal_has_too_few_peaks() {
        let err = MovingAverageAnalyzer::default()
            .analyze(&[0.0; 300], 60.0)
            .unwrap_err();
        assert!(matches!(err, RppgError::InsufficientSamples { .. }));
    }

    #[test]
    fn breathing_rate_from_modulated_intervals() {
        // Intervals oscillating with a 4-beat period at ~1 s per beat: 0.25 Hz.
        let ibi: Vec<f64> = (0..60)
            .map(|k| 1000.0 + 80.0 * (2.0 * PI * k as f64 / 4.0).sin())
            .collect();
        let analyzer = MovingAverageAnalyzer::default();
        let rate = analyzer.breathing_rate(&ibi).unwrap();
        assert!((rate - 15.0).abs() < 3.0, "breathing rate {rate}");
    }

    #[test]
    fn resampling_holds_each_interval() {
        let out = resample_intervals(&[500.0, 1000.0], 4.0);
        assert_eq!(out, vec![500.0, 500.0, 1000.0, 1000.0, 1000.0, 1000.0]);
    }
}
