use crate::error::{Result, RppgError};
use crate::signal::{mean, std_dev, PeakSequence};
use log::debug;
use realfft::{num_complex::Complex, RealFftPlanner};
use serde::{Deserialize, Serialize};

/// Agreement between detected and annotated peaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Positive when the detected peaks lag the ground truth.
    pub time_shift_seconds: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Confusion {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

impl Confusion {
    fn tally(truth: &[bool], predicted: &[bool]) -> Self {
        let mut c = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }

    fn ratio(num: usize, den: usize) -> f64 {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }

    fn accuracy(&self) -> f64 {
        Self::ratio(self.tp + self.tn, self.tp + self.tn + self.fp + self.fn_)
    }

    fn precision(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fn_)
    }

    fn f1(&self) -> f64 {
        Self::ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

/// Compare detected peaks with the annotation.
///
/// Peaks and timestamps are truncated to the shortest of the three sequences
/// and `detected_series_length`. Metrics treat "is a peak" as the positive
/// class; a metric with an empty denominator is 0. The time shift is read
/// off the cross-correlation of the standardised indicators over a lag axis
/// mirrored from the ground-truth timestamps.
pub fn evaluate(
    ground_truth: &PeakSequence,
    detected: &PeakSequence,
    ground_truth_times_ms: &[f64],
    detected_series_length: usize,
) -> Result<EvaluationResult> {
    let n = ground_truth
        .len()
        .min(detected.len())
        .min(ground_truth_times_ms.len())
        .min(detected_series_length);
    if n == 0 {
        return Err(RppgError::LengthMismatch(format!(
            "nothing to compare: ground truth {} frames, detected {} frames, {} timestamps, series length {}",
            ground_truth.len(),
            detected.len(),
            ground_truth_times_ms.len(),
            detected_series_length
        )));
    }
    if ground_truth.len() != detected.len() {
        debug!(
            "truncating evaluation to {n} frames (ground truth {}, detected {})",
            ground_truth.len(),
            detected.len()
        );
    }
    let truth = &ground_truth.indicator()[..n];
    let predicted = &detected.indicator()[..n];

    let confusion = Confusion::tally(truth, predicted);
    let time_shift_seconds = time_shift_ms(truth, predicted, &ground_truth_times_ms[..n])? / 1000.0;

    Ok(EvaluationResult {
        accuracy: confusion.accuracy(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        time_shift_seconds,
    })
}

fn standardize(indicator: &[bool], what: &'static str) -> Result<Vec<f64>> {
    let values: Vec<f64> = indicator.iter().map(|&p| if p { 1.0 } else { 0.0 }).collect();
    let sd = std_dev(&values);
    if sd == 0.0 {
        return Err(RppgError::ConstantSignal(what));
    }
    let m = mean(&values);
    Ok(values.iter().map(|v| (v - m) / sd).collect())
}

/// Lag, in ms, at which the detected indicator best matches the truth.
fn time_shift_ms(truth: &[bool], detected: &[bool], times_ms: &[f64]) -> Result<f64> {
    let a = standardize(truth, "ground-truth peaks")?;
    let b = standardize(detected, "detected peaks")?;
    let n = a.len() as isize;
    let circular = circular_correlation(&a, &b)?;
    let m = circular.len() as isize;
    let at = |lag: isize| circular[lag.rem_euclid(m) as usize];

    // The FFT only shortlists lags; the first exact maximum among them wins.
    let peak = (-(n - 1)..n).map(at).fold(f64::NEG_INFINITY, f64::max);
    let tolerance = 1e-9 * n as f64;
    let mut best_lag = 0isize;
    let mut best = f64::NEG_INFINITY;
    for lag in (-(n - 1)..n).filter(|&lag| at(lag) >= peak - tolerance) {
        let c = direct_correlation(&a, &b, lag);
        if c > best {
            best = c;
            best_lag = lag;
        }
    }
    let offset = times_ms[best_lag.unsigned_abs()] - times_ms[0];
    debug!("cross-correlation peak {best:.3} at lag {best_lag} frames");
    Ok(if best_lag < 0 { -offset } else { offset })
}

/// `c[lag] = sum_i a[i] * b[i + lag]`, zero-padded so lags `-(n-1)..n`
/// do not wrap; negative lags sit at the end of the buffer.
fn circular_correlation(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    let m = (2 * a.len().max(b.len())).next_power_of_two();
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(m);
    let c2r = planner.plan_fft_inverse(m);

    let mut spectra = Vec::with_capacity(2);
    for series in [a, b] {
        let mut frame = vec![0.0; m];
        frame[..series.len()].copy_from_slice(series);
        let mut spectrum = r2c.make_output_vec();
        r2c.process(&mut frame, &mut spectrum)
            .map_err(|e| RppgError::InvalidInput(e.to_string()))?;
        spectra.push(spectrum);
    }
    let mut product: Vec<Complex<f64>> = spectra[0]
        .iter()
        .zip(&spectra[1])
        .map(|(x, y)| x.conj() * y)
        .collect();
    let last = product.len() - 1;
    product[0].im = 0.0;
    product[last].im = 0.0;

    let mut out = c2r.make_output_vec();
    c2r.process(&mut product, &mut out)
        .map_err(|e| RppgError::InvalidInput(e.to_string()))?;
    let scale = 1.0 / m as f64;
    Ok(out.into_iter().map(|v| v * scale).collect())
}

fn direct_correlation(a: &[f64], b: &[f64], lag: isize) -> f64 {
    let n = a.len();
    let (from, to) = if lag >= 0 {
        (0, n.saturating_sub(lag as usize))
    } else {
        ((-lag) as usize, n)
    };
    (from..to)
        .map(|i| a[i] * b[(i as isize + lag) as usize])
        .sum()
}
