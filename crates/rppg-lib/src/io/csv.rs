use crate::signal::{ChannelSeries, GroundTruth, PeakSequence};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Header names of the RGB mean columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelColumns {
    pub red: String,
    pub green: String,
    pub blue: String,
}

impl Default for ChannelColumns {
    fn default() -> Self {
        Self {
            red: "Red mean".into(),
            green: "Green mean".into(),
            blue: "Blue mean".into(),
        }
    }
}

/// Header names of the reference recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthColumns {
    pub time_ms: String,
    pub peaks: String,
    pub signal: String,
}

impl Default for GroundTruthColumns {
    fn default() -> Self {
        Self {
            time_ms: "Time".into(),
            peaks: "Peaks".into(),
            signal: "Signal".into(),
        }
    }
}

/// Read per-frame RGB means. Columns are matched case-insensitively, any
/// other column (e.g. a frame index) is ignored.
pub fn read_channels_csv(path: &Path, columns: &ChannelColumns) -> Result<ChannelSeries> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers().context("reading header")?.clone();
    let red_idx = locate_column(&headers, &columns.red, "red mean")?;
    let green_idx = locate_column(&headers, &columns.green, "green mean")?;
    let blue_idx = locate_column(&headers, &columns.blue, "blue mean")?;

    let (mut red, mut green, mut blue) = (Vec::new(), Vec::new(), Vec::new());
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", row + 1))?;
        red.push(parse_field(&record, red_idx, row, &columns.red)?);
        green.push(parse_field(&record, green_idx, row, &columns.green)?);
        blue.push(parse_field(&record, blue_idx, row, &columns.blue)?);
    }
    if red.is_empty() {
        anyhow::bail!("no frames found in {}", path.display());
    }
    Ok(ChannelSeries::new(red, green, blue)?)
}

/// Read frame timestamps (ms), binary peak labels and, when present, the
/// contact PPG waveform.
pub fn read_ground_truth_csv(path: &Path, columns: &GroundTruthColumns) -> Result<GroundTruth> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers().context("reading header")?.clone();
    let time_idx = locate_column(&headers, &columns.time_ms, "timestamp")?;
    let peak_idx = locate_column(&headers, &columns.peaks, "peak label")?;
    let signal_idx = locate_column(&headers, &columns.signal, "reference signal").ok();

    let mut times_ms = Vec::new();
    let mut indicator = Vec::new();
    let mut signal = signal_idx.map(|_| Vec::new());
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", row + 1))?;
        times_ms.push(parse_field(&record, time_idx, row, &columns.time_ms)?);
        indicator.push(parse_field(&record, peak_idx, row, &columns.peaks)? != 0.0);
        if let (Some(idx), Some(values)) = (signal_idx, signal.as_mut()) {
            values.push(parse_field(&record, idx, row, &columns.signal)?);
        }
    }
    if times_ms.is_empty() {
        anyhow::bail!("no frames found in {}", path.display());
    }
    Ok(GroundTruth {
        times_ms,
        peaks: PeakSequence::from_indicator(indicator),
        signal,
    })
}

pub fn write_channels_csv(path: &Path, channels: &ChannelSeries, columns: &ChannelColumns) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "Frame",
        columns.red.as_str(),
        columns.green.as_str(),
        columns.blue.as_str(),
    ])?;
    for i in 0..channels.len() {
        writer.write_record([
            i.to_string(),
            channels.red()[i].to_string(),
            channels.green()[i].to_string(),
            channels.blue()[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ground_truth_csv(path: &Path, truth: &GroundTruth, columns: &GroundTruthColumns) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let peaks = truth.peaks.indicator();
    match &truth.signal {
        Some(signal) => {
            writer.write_record([&columns.time_ms, &columns.peaks, &columns.signal])?;
            for i in 0..truth.times_ms.len() {
                writer.write_record([
                    truth.times_ms[i].to_string(),
                    u8::from(peaks.get(i).copied().unwrap_or(false)).to_string(),
                    signal.get(i).copied().unwrap_or(0.0).to_string(),
                ])?;
            }
        }
        None => {
            writer.write_record([&columns.time_ms, &columns.peaks])?;
            for i in 0..truth.times_ms.len() {
                writer.write_record([
                    truth.times_ms[i].to_string(),
                    u8::from(peaks.get(i).copied().unwrap_or(false)).to_string(),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn parse_field(record: &StringRecord, idx: usize, row: usize, column: &str) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| anyhow::anyhow!("row {} has no {} value", row + 1, column))?;
    raw.parse::<f64>()
        .with_context(|| format!("row {}: {} value {:?} is not numeric", row + 1, column, raw))
}

fn locate_column(headers: &StringRecord, requested: &str, hint: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing {} column ({})", hint, requested))
}
