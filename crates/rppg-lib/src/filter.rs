use crate::error::{Result, RppgError};
use log::{debug, warn};
use sci_rs::signal::filter::{
    design::{butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, SosFormatFilter},
    sosfiltfilt_dyn,
};

/// Highest order whose coefficients stay well conditioned for the narrow
/// physiological bands used here.
pub const MAX_STABLE_ORDER: usize = 4;

/// Zero-phase Butterworth band-pass.
///
/// The design is realised as second-order sections and run forward and then
/// backward over the series, so peaks keep their frame positions. Cutoffs are
/// given in Hz and normalised by the Nyquist frequency `fs / 2`.
///
/// Orders above [`MAX_STABLE_ORDER`] are accepted but logged: the squared
/// magnitude response doubles the effective order and very narrow bands
/// become sensitive to coefficient rounding.
pub fn bandpass(series: &[f64], fs: f64, order: usize, low_hz: f64, high_hz: f64) -> Result<Vec<f64>> {
    if !(fs > 0.0) {
        return Err(RppgError::InvalidParameter(format!(
            "sampling frequency must be positive, got {fs}"
        )));
    }
    if order == 0 {
        return Err(RppgError::InvalidParameter("filter order must be at least 1".into()));
    }
    let nyq = 0.5 * fs;
    if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyq) {
        return Err(RppgError::InvalidParameter(format!(
            "band-pass cutoffs must satisfy 0 < {low_hz} < {high_hz} < {nyq} (Nyquist)"
        )));
    }
    if order > MAX_STABLE_ORDER {
        warn!(
            "band-pass order {order} exceeds {MAX_STABLE_ORDER}; coefficients may be ill-conditioned"
        );
    }

    let sos = match butter_dyn(
        order,
        vec![low_hz / nyq, high_hz / nyq],
        Some(FilterBandType::Bandpass),
        Some(false),
        Some(FilterOutputType::Sos),
        None,
    ) {
        DigitalFilter::Sos(SosFormatFilter { sos }) => sos,
        _ => {
            return Err(RppgError::InvalidParameter(
                "butterworth design did not produce second-order sections".into(),
            ))
        }
    };

    // Forward-backward filtering pads both ends by three times the tap count.
    let padlen = 3 * (2 * sos.len() + 1);
    if series.len() <= padlen {
        return Err(RppgError::InsufficientSamples {
            needed: padlen + 1,
            got: series.len(),
        });
    }
    debug!(
        "band-pass {low_hz}-{high_hz} Hz, order {order}, {} sections over {} samples",
        sos.len(),
        series.len()
    );

    let filtered: Vec<f64> = sosfiltfilt_dyn(series.iter(), &sos);
    Ok(filtered)
}
