use crate::error::{Result, RppgError};
use crate::heart_rate::HrBand;
use crate::peaks::PeakConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of one processing run.
///
/// ```toml
/// fps = 30.0
/// window_seconds = 1.6
/// filter_order = 2
/// welch_segment = 1024
///
/// [hr_band]
/// low_hz = 0.9
/// high_hz = 1.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RppgConfig {
    /// Video frame rate.
    pub fps: f64,
    /// POS window length in seconds.
    pub window_seconds: f64,
    /// Butterworth order of the band-pass.
    pub filter_order: usize,
    /// Pass band of the filter and search band of the heart-rate estimate.
    pub hr_band: HrBand,
    /// Welch segment length in samples, capped at the series length.
    pub welch_segment: usize,
    pub peaks: PeakConfig,
}

impl Default for RppgConfig {
    fn default() -> Self {
        Self {
            fps: 60.0,
            window_seconds: 1.6,
            filter_order: 2,
            hr_band: HrBand::default(),
            welch_segment: 1024,
            peaks: PeakConfig::default(),
        }
    }
}

impl RppgConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(text).context("parsing rPPG configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_path(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Reject values no stage could run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.fps > 0.0 && self.fps.is_finite()) {
            return Err(RppgError::InvalidParameter(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if !(self.window_seconds > 0.0) {
            return Err(RppgError::InvalidParameter(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if self.filter_order == 0 {
            return Err(RppgError::InvalidParameter("filter_order must be at least 1".into()));
        }
        let nyq = self.fps / 2.0;
        let band = self.hr_band;
        if !(band.low_hz > 0.0 && band.low_hz < band.high_hz && band.high_hz < nyq) {
            return Err(RppgError::InvalidParameter(format!(
                "hr_band must satisfy 0 < {} < {} < {nyq}",
                band.low_hz, band.high_hz
            )));
        }
        if self.welch_segment < 2 {
            return Err(RppgError::InvalidParameter(format!(
                "welch_segment must be at least 2, got {}",
                self.welch_segment
            )));
        }
        if !(self.peaks.min_interval_s > 0.0 && self.peaks.ma_window_s > 0.0) {
            return Err(RppgError::InvalidParameter(
                "peak detector windows must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RppgConfig::default();
        assert_eq!(cfg.window_seconds, 1.6);
        assert_eq!(cfg.filter_order, 2);
        assert_eq!(cfg.hr_band, HrBand { low_hz: 0.9, high_hz: 1.8 });
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = RppgConfig::from_toml_str("fps = 30.0\n[hr_band]\nlow_hz = 0.8\nhigh_hz = 2.0\n")
            .unwrap();
        assert_eq!(cfg.fps, 30.0);
        assert_eq!(cfg.hr_band.low_hz, 0.8);
        assert_eq!(cfg.filter_order, 2);
        assert_eq!(cfg.welch_segment, 1024);
    }

    #[test]
    fn band_above_nyquist_is_rejected() {
        let cfg = RppgConfig {
            fps: 2.0,
            ..RppgConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RppgError::InvalidParameter(_))));
        assert!(RppgConfig::from_toml_str("fps = 2.0").is_err());
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rppg.toml");
        fs::write(&path, "fps = 25.0\nfilter_order = 3\n").unwrap();
        let cfg = RppgConfig::from_toml_path(&path).unwrap();
        assert_eq!(cfg.fps, 25.0);
        assert_eq!(cfg.filter_order, 3);
    }
}
