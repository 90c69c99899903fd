use crate::error::{Result, RppgError};
use crate::signal::{PeakSequence, SpectrumEstimate};
use serde::{Deserialize, Serialize};

/// Open frequency interval searched for the cardiac peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrBand {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl Default for HrBand {
    /// 0.9–1.8 Hz, i.e. 54–108 bpm.
    fn default() -> Self {
        Self {
            low_hz: 0.9,
            high_hz: 1.8,
        }
    }
}

impl HrBand {
    pub fn contains(&self, f: f64) -> bool {
        f > self.low_hz && f < self.high_hz
    }
}

/// Dominant frequency of `psd` strictly inside `band`, in beats per minute.
///
/// Equal maxima resolve to the lowest-frequency bin.
pub fn estimate_bpm(psd: &SpectrumEstimate, band: HrBand) -> Result<f64> {
    if !(band.low_hz < band.high_hz) {
        return Err(RppgError::InvalidParameter(format!(
            "heart-rate band {} Hz .. {} Hz is empty",
            band.low_hz, band.high_hz
        )));
    }
    let mut best: Option<(f64, f64)> = None;
    for (&f, &v) in psd.frequencies.iter().zip(psd.values.iter()) {
        if !band.contains(f) {
            continue;
        }
        match best {
            Some((_, top)) if !(v > top) => {}
            _ => best = Some((f, v)),
        }
    }
    best.map(|(f, _)| f * 60.0).ok_or(RppgError::NoFrequencyInBand {
        low_hz: band.low_hz,
        high_hz: band.high_hz,
    })
}

/// Heart rate of annotated peaks: mean of the instantaneous rates
/// `60000 / Δt` between consecutive peaks, with `times_ms` giving each
/// frame's timestamp.
pub fn reference_bpm(peaks: &PeakSequence, times_ms: &[f64]) -> Result<f64> {
    let stamps: Vec<f64> = peaks
        .indices()
        .into_iter()
        .take_while(|&i| i < times_ms.len())
        .map(|i| times_ms[i])
        .collect();
    if stamps.len() < 2 {
        return Err(RppgError::InsufficientSamples {
            needed: 2,
            got: stamps.len(),
        });
    }
    let mut total = 0.0;
    for w in stamps.windows(2) {
        let dt = w[1] - w[0];
        if !(dt > 0.0) {
            return Err(RppgError::InvalidInput(format!(
                "peak timestamps must increase, got {} ms then {} ms",
                w[0], w[1]
            )));
        }
        total += 60_000.0 / dt;
    }
    Ok(total / (stamps.len() - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(values: &[f64], df: f64) -> SpectrumEstimate {
        SpectrumEstimate {
            frequencies: (0..values.len()).map(|k| k as f64 * df).collect(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn picks_maximum_inside_band() {
        // 0.0 .. 2.0 Hz in 0.2 Hz steps; 2.5 at 0.4 Hz is out of band.
        let psd = spectrum(&[9.0, 1.0, 2.5, 0.1, 0.2, 0.3, 1.5, 0.7, 0.1, 0.0, 8.0], 0.2);
        let bpm = estimate_bpm(&psd, HrBand::default()).unwrap();
        assert!((bpm - 72.0).abs() < 1e-9, "bpm {bpm}");
    }

    #[test]
    fn band_edges_are_excluded() {
        let psd = SpectrumEstimate {
            frequencies: vec![0.9, 1.0, 1.8],
            values: vec![10.0, 1.0, 10.0],
        };
        assert!((estimate_bpm(&psd, HrBand::default()).unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn ties_resolve_to_lowest_frequency() {
        let psd = spectrum(&[0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 1.0, 3.0, 0.0, 0.0], 0.2);
        let bpm = estimate_bpm(&psd, HrBand::default()).unwrap();
        assert!((bpm - 60.0).abs() < 1e-9, "bpm {bpm}");
    }

    #[test]
    fn empty_band_is_an_error() {
        let psd = spectrum(&[1.0, 2.0, 3.0], 0.5);
        assert!(matches!(
            estimate_bpm(&psd, HrBand { low_hz: 1.0, high_hz: 1.4 }),
            Err(RppgError::NoFrequencyInBand { .. })
        ));
        assert!(matches!(
            estimate_bpm(&psd, HrBand { low_hz: 1.8, high_hz: 0.9 }),
            Err(RppgError::InvalidParameter(_))
        ));
    }

    #[test]
    fn reference_rate_from_regular_peaks() {
        let fps = 60.0;
        let times: Vec<f64> = (0..600).map(|i| i as f64 * 1000.0 / fps).collect();
        let peaks = PeakSequence::from_indices(600, &[10, 60, 110, 160, 210]);
        let bpm = reference_bpm(&peaks, &times).unwrap();
        assert!((bpm - 72.0).abs() < 1e-9);
    }

    #[test]
    fn reference_rate_needs_two_peaks() {
        let peaks = PeakSequence::from_indices(10, &[4]);
        assert!(matches!(
            reference_bpm(&peaks, &[0.0; 10]),
            Err(RppgError::InsufficientSamples { needed: 2, got: 1 })
        ));
    }
}
