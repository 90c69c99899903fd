use crate::error::{Result, RppgError};
use crate::signal::{ChannelSeries, GroundTruth, PeakSequence};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameters for a simulated face-ROI recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub frames: usize,
    pub fps: f64,
    pub pulse_hz: f64,
    /// Per-channel baseline intensity, R, G, B.
    pub dc_offsets: [f64; 3],
    /// Per-channel pulsatile amplitude, R, G, B.
    pub pulse_amplitudes: [f64; 3],
    /// Half-width of the uniform noise added to every sample.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            fps: 60.0,
            pulse_hz: 1.2,
            dc_offsets: [152.0, 108.0, 87.0],
            pulse_amplitudes: [0.35, 0.9, 0.2],
            noise: 0.05,
            seed: 7,
        }
    }
}

impl SyntheticConfig {
    fn validate(&self) -> Result<()> {
        if !(self.fps > 0.0) || !(self.pulse_hz > 0.0) {
            return Err(RppgError::InvalidParameter(format!(
                "synthetic fps ({}) and pulse frequency ({}) must be positive",
                self.fps, self.pulse_hz
            )));
        }
        if self.noise < 0.0 {
            return Err(RppgError::InvalidParameter("noise must be non-negative".into()));
        }
        Ok(())
    }

    fn pulse_at(&self, frame: usize) -> f64 {
        (2.0 * PI * self.pulse_hz * frame as f64 / self.fps).sin()
    }
}

/// RGB means with a shared sinusoidal pulse, channel offsets and seeded
/// uniform noise.
pub fn synthetic_channels(cfg: &SyntheticConfig) -> Result<ChannelSeries> {
    cfg.validate()?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut rows: [Vec<f64>; 3] = Default::default();
    for i in 0..cfg.frames {
        let pulse = cfg.pulse_at(i);
        for (c, row) in rows.iter_mut().enumerate() {
            let noise = if cfg.noise > 0.0 {
                rng.gen_range(-cfg.noise..cfg.noise)
            } else {
                0.0
            };
            row.push(cfg.dc_offsets[c] + cfg.pulse_amplitudes[c] * pulse + noise);
        }
    }
    let [red, green, blue] = rows;
    ChannelSeries::new(red, green, blue)
}

/// Ground truth matching [`synthetic_channels`]: one peak per pulse crest,
/// frame timestamps in milliseconds and the noiseless reference waveform.
pub fn synthetic_ground_truth(cfg: &SyntheticConfig) -> Result<GroundTruth> {
    cfg.validate()?;
    let period = cfg.fps / cfg.pulse_hz;
    let mut indices = Vec::new();
    let mut crest = 0.25 * period;
    while crest.round() < cfg.frames as f64 {
        indices.push(crest.round() as usize);
        crest += period;
    }
    Ok(GroundTruth {
        times_ms: (0..cfg.frames)
            .map(|i| i as f64 * 1000.0 / cfg.fps)
            .collect(),
        peaks: PeakSequence::from_indices(cfg.frames, &indices),
        signal: Some((0..cfg.frames).map(|i| cfg.pulse_at(i)).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_channels() {
        let cfg = SyntheticConfig::default();
        assert_eq!(synthetic_channels(&cfg).unwrap(), synthetic_channels(&cfg).unwrap());
    }

    #[test]
    fn ground_truth_marks_one_peak_per_period() {
        let cfg = SyntheticConfig::default();
        let gt = synthetic_ground_truth(&cfg).unwrap();
        assert_eq!(gt.peaks.len(), 600);
        assert_eq!(gt.times_ms.len(), 600);
        // 1.2 Hz over 10 s.
        assert_eq!(gt.peaks.count(), 12);
        assert_eq!(gt.peaks.indices()[0], 13);
    }
}
