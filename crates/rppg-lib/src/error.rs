use thiserror::Error;

/// Failure modes of the numeric stages. Every stage either returns a
/// complete result or one of these; nothing is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RppgError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("insufficient samples: need at least {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },
    #[error("degenerate window at frame {start}: {channel} channel mean is zero")]
    DegenerateWindow { start: usize, channel: &'static str },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no spectrum bin strictly inside {low_hz} Hz .. {high_hz} Hz")]
    NoFrequencyInBand { low_hz: f64, high_hz: f64 },
    #[error("length mismatch: {0}")]
    LengthMismatch(String),
    #[error("constant signal: {0} has zero variance")]
    ConstantSignal(&'static str),
}

pub type Result<T> = std::result::Result<T, RppgError>;
