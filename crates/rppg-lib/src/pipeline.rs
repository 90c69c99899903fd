use crate::{
    config::RppgConfig,
    error::Result,
    evaluation::{evaluate, EvaluationResult},
    filter::bandpass,
    heart_rate::{estimate_bpm, reference_bpm},
    peaks::{PeakAnalysis, PeakAnalyzer, PeakMeasures},
    pos::PosExtractor,
    signal::{ChannelSeries, GroundTruth, SpectrumEstimate, TimeSeries},
    spectrum::{fft_spectrum, welch_psd, SpectrumScale},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Scalar summary of one run, serialised by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub fps: f64,
    pub frame_count: usize,
    pub window_len: usize,
    /// Heart rate from the Welch PSD of the filtered pulse.
    pub bpm: f64,
    /// Same estimate over the unfiltered pulse.
    pub raw_bpm: f64,
    pub peak_count: usize,
    pub peak_measures: PeakMeasures,
    pub reference_bpm: Option<f64>,
    /// Spectral heart rate of the ground-truth waveform.
    pub reference_signal_bpm: Option<f64>,
    pub evaluation: Option<EvaluationResult>,
}

/// Every intermediate series of a run, for plotting or further analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub pulse: TimeSeries,
    pub filtered: TimeSeries,
    pub raw_psd: SpectrumEstimate,
    pub filtered_psd: SpectrumEstimate,
    pub filtered_fft: SpectrumEstimate,
    pub analysis: PeakAnalysis,
    /// Spectra of the contact reference waveform, when the ground truth has one.
    pub reference_spectra: Option<ReferenceSpectra>,
    pub report: PipelineReport,
}

/// Hann FFT magnitude and Welch PSD of the ground-truth waveform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSpectra {
    pub fft: SpectrumEstimate,
    pub psd: SpectrumEstimate,
}

/// POS extraction followed by the zero-phase band-pass.
pub fn extract_pulse(channels: &ChannelSeries, cfg: &RppgConfig) -> Result<(TimeSeries, TimeSeries)> {
    cfg.validate()?;
    let pos = PosExtractor::new(cfg.fps, cfg.window_seconds)?;
    let pulse = pos.extract(channels)?;
    let filtered = TimeSeries {
        fs: cfg.fps,
        data: bandpass(
            &pulse.data,
            cfg.fps,
            cfg.filter_order,
            cfg.hr_band.low_hz,
            cfg.hr_band.high_hz,
        )?,
    };
    Ok((pulse, filtered))
}

/// Run every stage; ground truth, when given, adds the reference heart
/// rate and the evaluation of detected peaks, plus the spectra of its
/// reference waveform when the recording carries one.
pub fn run_pipeline(
    channels: &ChannelSeries,
    cfg: &RppgConfig,
    analyzer: &dyn PeakAnalyzer,
    ground_truth: Option<&GroundTruth>,
) -> Result<PipelineOutput> {
    let window_len = PosExtractor::new(cfg.fps, cfg.window_seconds)?.window_len();
    let (pulse, filtered) = extract_pulse(channels, cfg)?;

    let raw_psd = welch_psd(&pulse.data, cfg.fps, cfg.welch_segment)?;
    let filtered_psd = welch_psd(&filtered.data, cfg.fps, cfg.welch_segment)?;
    let filtered_fft = fft_spectrum(&filtered.data, cfg.fps, SpectrumScale::Magnitude)?;
    let raw_bpm = estimate_bpm(&raw_psd, cfg.hr_band)?;
    let bpm = estimate_bpm(&filtered_psd, cfg.hr_band)?;
    debug!("spectral heart rate {bpm:.1} bpm (unfiltered {raw_bpm:.1} bpm)");

    let analysis = analyzer.analyze(&filtered.data, cfg.fps)?;

    let (reference, evaluation) = match ground_truth {
        Some(gt) => {
            let reference = reference_bpm(&gt.peaks, &gt.times_ms)?;
            let result = evaluate(&gt.peaks, &analysis.peaks, &gt.times_ms, filtered.len())?;
            (Some(reference), Some(result))
        }
        None => (None, None),
    };
    let reference_spectra = match ground_truth.and_then(|gt| gt.signal.as_deref()) {
        Some(signal) => Some(ReferenceSpectra {
            fft: fft_spectrum(signal, cfg.fps, SpectrumScale::Magnitude)?,
            psd: welch_psd(signal, cfg.fps, cfg.welch_segment)?,
        }),
        None => None,
    };
    let reference_signal_bpm = reference_spectra
        .as_ref()
        .map(|spectra| estimate_bpm(&spectra.psd, cfg.hr_band))
        .transpose()?;

    let report = PipelineReport {
        fps: cfg.fps,
        frame_count: channels.len(),
        window_len,
        bpm,
        raw_bpm,
        peak_count: analysis.peaks.count(),
        peak_measures: analysis.measures,
        reference_bpm: reference,
        reference_signal_bpm,
        evaluation,
    };
    info!(
        "{} frames: {:.1} bpm spectral, {:.1} bpm from {} peaks",
        report.frame_count, report.bpm, report.peak_measures.bpm, report.peak_count
    );
    Ok(PipelineOutput {
        pulse,
        filtered,
        raw_psd,
        filtered_psd,
        filtered_fft,
        analysis,
        reference_spectra,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peaks::MovingAverageAnalyzer;
    use crate::synth::{synthetic_channels, synthetic_ground_truth, SyntheticConfig};

    #[test]
    fn synthetic_pulse_yields_72_bpm() {
        let synth = SyntheticConfig::default();
        let channels = synthetic_channels(&synth).unwrap();
        let cfg = RppgConfig::default();
        let (_, filtered) = extract_pulse(&channels, &cfg).unwrap();
        let psd = welch_psd(&filtered.data, cfg.fps, cfg.welch_segment).unwrap();
        let bpm = estimate_bpm(&psd, cfg.hr_band).unwrap();
        assert!((bpm - 72.0).abs() <= 3.0, "bpm {bpm}");
    }

    #[test]
    fn full_run_with_ground_truth() {
        let synth = SyntheticConfig {
            frames: 1200,
            ..SyntheticConfig::default()
        };
        let channels = synthetic_channels(&synth).unwrap();
        let gt = synthetic_ground_truth(&synth).unwrap();
        let cfg = RppgConfig::default();
        let out = run_pipeline(&channels, &cfg, &MovingAverageAnalyzer::default(), Some(&gt)).unwrap();

        assert_eq!(out.pulse.len(), 1200);
        assert_eq!(out.filtered.len(), 1200);
        assert_eq!(out.report.window_len, 96);
        assert!((out.report.bpm - 72.0).abs() <= 3.0);
        assert!((out.report.peak_measures.bpm - 72.0).abs() <= 6.0);
        let reference = out.report.reference_bpm.unwrap();
        assert!((reference - 72.0).abs() < 1.0, "reference {reference}");
        let eval = out.report.evaluation.unwrap();
        for metric in [eval.accuracy, eval.precision, eval.recall, eval.f1] {
            assert!((0.0..=1.0).contains(&metric), "metric {metric}");
        }
        // The shift is some whole-frame lag on the ground-truth time axis.
        let lag_frames = eval.time_shift_seconds * cfg.fps;
        assert!((lag_frames - lag_frames.round()).abs() < 1e-6, "lag {lag_frames}");
        assert!(lag_frames.abs() < 1200.0);
        let json = serde_json::to_string(&out.report).unwrap();
        assert!(json.contains("\"evaluation\""));
    }

    #[test]
    fn reference_waveform_spectra_peak_at_pulse_frequency() {
        let synth = SyntheticConfig {
            frames: 1200,
            ..SyntheticConfig::default()
        };
        let channels = synthetic_channels(&synth).unwrap();
        let gt = synthetic_ground_truth(&synth).unwrap();
        let cfg = RppgConfig::default();
        let out = run_pipeline(&channels, &cfg, &MovingAverageAnalyzer::default(), Some(&gt)).unwrap();

        let spectra = out.reference_spectra.unwrap();
        for spectrum in [&spectra.fft, &spectra.psd] {
            let mut best = 0;
            for (i, v) in spectrum.values.iter().enumerate() {
                if *v > spectrum.values[best] {
                    best = i;
                }
            }
            assert!(
                (spectrum.frequencies[best] - synth.pulse_hz).abs() < 0.06,
                "peak at {} Hz",
                spectrum.frequencies[best]
            );
        }
        let bpm = out.report.reference_signal_bpm.unwrap();
        assert!((bpm - 72.0).abs() <= 3.0, "reference waveform {bpm} bpm");
    }

    #[test]
    fn reference_spectra_absent_without_waveform() {
        let synth = SyntheticConfig::default();
        let channels = synthetic_channels(&synth).unwrap();
        let mut gt = synthetic_ground_truth(&synth).unwrap();
        gt.signal = None;
        let out = run_pipeline(
            &channels,
            &RppgConfig::default(),
            &MovingAverageAnalyzer::default(),
            Some(&gt),
        )
        .unwrap();
        assert!(out.reference_spectra.is_none());
        assert!(out.report.reference_signal_bpm.is_none());
        assert!(out.report.evaluation.is_some());
    }

    #[test]
    fn stage_errors_propagate() {
        let channels = ChannelSeries::new(vec![1.0; 20], vec![1.0; 20], vec![1.0; 20]).unwrap();
        let err = run_pipeline(
            &channels,
            &RppgConfig::default(),
            &MovingAverageAnalyzer::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::RppgError::InvalidInput(_)));
    }
}
