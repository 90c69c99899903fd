//! Remote photoplethysmography: POS pulse extraction from per-frame RGB
//! means, zero-phase band-pass filtering, spectral heart-rate estimation and
//! evaluation of detected pulse peaks against annotations.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod filter;
pub mod heart_rate;
pub mod io;
pub mod peaks;
pub mod pipeline;
pub mod plot;
pub mod pos;
pub mod signal;
pub mod spectrum;
pub mod synth;

pub use config::RppgConfig;
pub use error::{Result, RppgError};
pub use signal::*;
