use crate::error::{Result, RppgError};
use crate::signal::{mean, SpectrumEstimate};
use log::debug;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// Smallest Welch segment that still yields a non-trivial periodogram.
pub const MIN_SEGMENT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumScale {
    /// Single-sided amplitude.
    #[serde(rename = "mag")]
    Magnitude,
    /// Squared FFT magnitude.
    #[serde(rename = "pwr")]
    Power,
}

impl FromStr for SpectrumScale {
    type Err = RppgError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mag" => Ok(Self::Magnitude),
            "pwr" => Ok(Self::Power),
            other => Err(RppgError::InvalidParameter(format!(
                "unknown spectrum scale {other:?} (expected \"mag\" or \"pwr\")"
            ))),
        }
    }
}

/// Hann-tapered FFT of the whole series.
///
/// Bins are `k * fs / n` for `k = 0..=n/2`. The magnitude scale doubles every
/// bin except DC and, for even `n`, the Nyquist bin, which have no mirrored
/// counterpart.
pub fn fft_spectrum(series: &[f64], fs: f64, scale: SpectrumScale) -> Result<SpectrumEstimate> {
    check_fs(fs)?;
    let n = series.len();
    if n == 0 {
        return Err(RppgError::InsufficientSamples { needed: 1, got: 0 });
    }
    let taper = hann_symmetric(n);
    let mut frame: Vec<f64> = series.iter().zip(taper.iter()).map(|(x, w)| x * w).collect();

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut frame, &mut spectrum)
        .map_err(|e| RppgError::InvalidInput(e.to_string()))?;

    let nyquist = (n % 2 == 0).then_some(n / 2);
    let mut frequencies = Vec::with_capacity(spectrum.len());
    let mut values = Vec::with_capacity(spectrum.len());
    for (k, val) in spectrum.iter().enumerate() {
        frequencies.push(k as f64 * fs / n as f64);
        let value = match scale {
            SpectrumScale::Magnitude => {
                let amp = val.norm() / n as f64;
                if k == 0 || Some(k) == nyquist {
                    amp
                } else {
                    2.0 * amp
                }
            }
            SpectrumScale::Power => val.norm_sqr(),
        };
        values.push(value);
    }
    Ok(SpectrumEstimate {
        frequencies,
        values,
    })
}

/// Welch power spectral density.
///
/// Segments of `segment_length` samples (capped at the series length) overlap
/// by half, each is mean-detrended and Hamming-windowed, and the one-sided
/// density periodograms are averaged. Units are power per Hz.
pub fn welch_psd(series: &[f64], fs: f64, segment_length: usize) -> Result<SpectrumEstimate> {
    check_fs(fs)?;
    if segment_length < MIN_SEGMENT {
        return Err(RppgError::InvalidParameter(format!(
            "welch segment length must be at least {MIN_SEGMENT}, got {segment_length}"
        )));
    }
    let n = series.len();
    if n < MIN_SEGMENT {
        return Err(RppgError::InsufficientSamples {
            needed: MIN_SEGMENT,
            got: n,
        });
    }
    let window = segment_length.min(n);
    let step = window - window / 2;
    let window_func = hamming_periodic(window);
    let scale = 1.0 / (fs * window_func.iter().map(|w| w * w).sum::<f64>());

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(window);
    let mut spectrum = r2c.make_output_vec();
    let frequencies: Vec<f64> = (0..spectrum.len())
        .map(|k| k as f64 * fs / window as f64)
        .collect();
    let mut powers = vec![0.0; spectrum.len()];

    let nyquist = (window % 2 == 0).then_some(window / 2);
    let mut pos = 0;
    let mut segments = 0;
    while pos + window <= n {
        let slice = &series[pos..pos + window];
        let offset = mean(slice);
        let mut frame: Vec<f64> = slice
            .iter()
            .zip(window_func.iter())
            .map(|(x, w)| (x - offset) * w)
            .collect();
        r2c.process(&mut frame, &mut spectrum)
            .map_err(|e| RppgError::InvalidInput(e.to_string()))?;
        for (k, val) in spectrum.iter().enumerate() {
            let power = if k == 0 || Some(k) == nyquist {
                val.norm_sqr()
            } else {
                2.0 * val.norm_sqr()
            } * scale;
            powers[k] += power;
        }
        segments += 1;
        pos += step;
    }
    for p in powers.iter_mut() {
        *p /= segments as f64;
    }
    debug!("welch psd: {segments} segments of {window} samples, {} bins", powers.len());
    Ok(SpectrumEstimate {
        frequencies,
        values: powers,
    })
}

fn check_fs(fs: f64) -> Result<()> {
    if fs > 0.0 && fs.is_finite() {
        Ok(())
    } else {
        Err(RppgError::InvalidParameter(format!(
            "sampling frequency must be positive, got {fs}"
        )))
    }
}

fn hann_symmetric(size: usize) -> Vec<f64> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size - 1) as f64).cos()))
        .collect()
}

fn hamming_periodic(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, amp: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn argmax(values: &[f64]) -> usize {
        let mut best = 0;
        for (i, v) in values.iter().enumerate() {
            if *v > values[best] {
                best = i;
            }
        }
        best
    }

    #[test]
    fn fft_bins_start_at_zero_and_increase() {
        let spec = fft_spectrum(&sine(2.0, 1.0, 50.0, 100), 50.0, SpectrumScale::Magnitude).unwrap();
        assert_eq!(spec.len(), 51);
        assert_eq!(spec.frequencies[0], 0.0);
        assert!(spec.frequencies.windows(2).all(|w| w[1] > w[0]));
        assert!((spec.frequencies[50] - 25.0).abs() < 1e-12);
    }

    #[test]
    fn fft_magnitude_peaks_at_tone() {
        let fs = 60.0;
        let spec = fft_spectrum(&sine(1.5, 2.0, fs, 600), fs, SpectrumScale::Magnitude).unwrap();
        let peak = argmax(&spec.values);
        assert!((spec.frequencies[peak] - 1.5).abs() < 1e-9);
        // Hann coherent gain is one half.
        assert!((spec.values[peak] - 1.0).abs() < 0.05, "amp {}", spec.values[peak]);
    }

    #[test]
    fn fft_power_is_squared_unnormalised_magnitude() {
        let data = sine(3.0, 1.0, 32.0, 64);
        let mag = fft_spectrum(&data, 32.0, SpectrumScale::Magnitude).unwrap();
        let pwr = fft_spectrum(&data, 32.0, SpectrumScale::Power).unwrap();
        let k = 6;
        let raw = mag.values[k] * 64.0 / 2.0;
        assert!((pwr.values[k] - raw * raw).abs() < 1e-6 * pwr.values[k].max(1.0));
    }

    #[test]
    fn fft_rejects_empty_series() {
        assert!(matches!(
            fft_spectrum(&[], 60.0, SpectrumScale::Power),
            Err(RppgError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn welch_caps_segment_at_series_length() {
        let psd = welch_psd(&sine(1.2, 1.0, 60.0, 600), 60.0, 1024).unwrap();
        assert_eq!(psd.len(), 301);
        assert!((psd.frequencies[1] - 0.1).abs() < 1e-12);
        let peak = argmax(&psd.values);
        assert!((psd.frequencies[peak] - 1.2).abs() < 1e-9);
    }

    #[test]
    fn welch_density_integrates_to_variance() {
        let fs = 100.0;
        let data = sine(10.0, 1.0, fs, 4096);
        let psd = welch_psd(&data, fs, 256).unwrap();
        let df = psd.frequencies[1] - psd.frequencies[0];
        let total: f64 = psd.values.iter().sum::<f64>() * df;
        assert!((total - 0.5).abs() < 0.02, "total power {total}");
    }

    #[test]
    fn welch_rejects_tiny_inputs() {
        assert!(matches!(
            welch_psd(&[1.0], 60.0, 1024),
            Err(RppgError::InsufficientSamples { .. })
        ));
        assert!(matches!(
            welch_psd(&[1.0; 32], 60.0, 1),
            Err(RppgError::InvalidParameter(_))
        ));
    }

    #[test]
    fn scale_parses_short_names() {
        assert_eq!("mag".parse::<SpectrumScale>().unwrap(), SpectrumScale::Magnitude);
        assert_eq!("pwr".parse::<SpectrumScale>().unwrap(), SpectrumScale::Power);
        assert!("db".parse::<SpectrumScale>().is_err());
    }
}
