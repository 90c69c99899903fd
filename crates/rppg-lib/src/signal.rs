use crate::error::{Result, RppgError};
use serde::{Deserialize, Serialize};

/// Basic typed time series. Used for the extracted pulse and its filtered
/// counterpart; index = frame number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
}

/// Per-frame spatial means of the red, green and blue channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSeries {
    red: Vec<f64>,
    green: Vec<f64>,
    blue: Vec<f64>,
}

impl ChannelSeries {
    pub fn new(red: Vec<f64>, green: Vec<f64>, blue: Vec<f64>) -> Result<Self> {
        if red.len() != green.len() || red.len() != blue.len() {
            return Err(RppgError::InvalidInput(format!(
                "channel lengths differ: red {}, green {}, blue {}",
                red.len(),
                green.len(),
                blue.len()
            )));
        }
        Ok(Self { red, green, blue })
    }

    pub fn len(&self) -> usize {
        self.red.len()
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty()
    }

    pub fn red(&self) -> &[f64] {
        &self.red
    }

    pub fn green(&self) -> &[f64] {
        &self.green
    }

    pub fn blue(&self) -> &[f64] {
        &self.blue
    }

    /// Rows in R, G, B order.
    pub fn rows(&self) -> [&[f64]; 3] {
        [&self.red, &self.green, &self.blue]
    }

    /// Multiply every channel by the same factor.
    pub fn scaled(&self, k: f64) -> Self {
        let scale = |v: &[f64]| v.iter().map(|x| x * k).collect();
        Self {
            red: scale(&self.red),
            green: scale(&self.green),
            blue: scale(&self.blue),
        }
    }
}

/// Systolic peaks as a fixed-length indicator over the frame index space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSequence {
    indicator: Vec<bool>,
}

impl PeakSequence {
    pub fn from_indicator(indicator: Vec<bool>) -> Self {
        Self { indicator }
    }

    /// Indices at or beyond `len` are dropped.
    pub fn from_indices(len: usize, indices: &[usize]) -> Self {
        let mut indicator = vec![false; len];
        for &idx in indices {
            if idx < len {
                indicator[idx] = true;
            }
        }
        Self { indicator }
    }

    pub fn len(&self) -> usize {
        self.indicator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicator.is_empty()
    }

    pub fn indicator(&self) -> &[bool] {
        &self.indicator
    }

    /// Sorted peak positions.
    pub fn indices(&self) -> Vec<usize> {
        self.indicator
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| p.then_some(i))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.indicator.iter().filter(|&&p| p).count()
    }

    pub fn truncated(&self, len: usize) -> Self {
        Self {
            indicator: self.indicator[..len.min(self.indicator.len())].to_vec(),
        }
    }
}

/// Single-sided spectrum: `values[k]` belongs to `frequencies[k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumEstimate {
    pub frequencies: Vec<f64>,
    pub values: Vec<f64>,
}

impl SpectrumEstimate {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn points(&self) -> Vec<[f64; 2]> {
        self.frequencies
            .iter()
            .zip(self.values.iter())
            .map(|(f, v)| [*f, *v])
            .collect()
    }
}

/// Reference annotations recorded alongside the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Frame timestamps in milliseconds.
    pub times_ms: Vec<f64>,
    pub peaks: PeakSequence,
    /// Contact PPG waveform, when the recording has one.
    pub signal: Option<Vec<f64>>,
}

pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    (data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_series_rejects_ragged_input() {
        let err = ChannelSeries::new(vec![1.0; 4], vec![1.0; 4], vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, RppgError::InvalidInput(_)));
    }

    #[test]
    fn peak_sequence_round_trips_indices() {
        let peaks = PeakSequence::from_indices(8, &[6, 1, 3, 12]);
        assert_eq!(peaks.len(), 8);
        assert_eq!(peaks.indices(), vec![1, 3, 6]);
        assert_eq!(peaks.count(), 3);
        assert_eq!(peaks.truncated(4).indices(), vec![1, 3]);
    }

    #[test]
    fn population_std_dev() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-12);
    }
}
