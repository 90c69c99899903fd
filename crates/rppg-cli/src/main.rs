use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use plotters::prelude::*;
use rppg_lib::{
    evaluation::evaluate,
    io::{
        csv::{
            read_channels_csv, read_ground_truth_csv, write_channels_csv, write_ground_truth_csv,
            ChannelColumns, GroundTruthColumns,
        },
        text as text_io,
    },
    peaks::MovingAverageAnalyzer,
    pipeline::{extract_pulse, run_pipeline, PipelineOutput},
    plot::{figure_from_channels, figure_from_pulse, figure_from_spectrum, Figure, Series},
    pos::PosExtractor,
    spectrum::{fft_spectrum, welch_psd, SpectrumScale},
    synth::{synthetic_channels, synthetic_ground_truth, SyntheticConfig},
    ChannelSeries, PeakSequence, RppgConfig,
};
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

const MAX_PLOT_POINTS: usize = 4096;

#[derive(Parser)]
#[command(
    name = "rppg",
    version,
    about = "Remote photoplethysmography: pulse extraction, heart rate and evaluation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Processing parameters; flags override values from `--config`.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// TOML file with processing parameters
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    fps: Option<f64>,
    #[arg(long)]
    window_seconds: Option<f64>,
    #[arg(long)]
    filter_order: Option<usize>,
    #[arg(long)]
    low_hz: Option<f64>,
    #[arg(long)]
    high_hz: Option<f64>,
    #[arg(long)]
    welch_segment: Option<usize>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<RppgConfig> {
        let mut cfg = match &self.config {
            Some(path) => RppgConfig::from_toml_path(path)?,
            None => RppgConfig::default(),
        };
        if let Some(fps) = self.fps {
            cfg.fps = fps;
        }
        if let Some(window_seconds) = self.window_seconds {
            cfg.window_seconds = window_seconds;
        }
        if let Some(order) = self.filter_order {
            cfg.filter_order = order;
        }
        if let Some(low_hz) = self.low_hz {
            cfg.hr_band.low_hz = low_hz;
        }
        if let Some(high_hz) = self.high_hz {
            cfg.hr_band.high_hz = high_hz;
        }
        if let Some(segment) = self.welch_segment {
            cfg.welch_segment = segment;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SpectrumMethod {
    Welch,
    Fft,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ScaleArg {
    #[value(name = "mag")]
    Magnitude,
    #[value(name = "pwr")]
    Power,
}

impl From<ScaleArg> for SpectrumScale {
    fn from(value: ScaleArg) -> Self {
        match value {
            ScaleArg::Magnitude => SpectrumScale::Magnitude,
            ScaleArg::Power => SpectrumScale::Power,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the raw and band-passed pulse from an RGB means CSV
    Extract {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        params: ConfigArgs,
    },
    /// Run extraction, spectral heart rate, peak analysis and (optionally) evaluation
    HeartRate {
        #[arg(long)]
        input: PathBuf,
        /// Ground-truth CSV with Time (ms) and Peaks columns
        #[arg(long)]
        ground_truth: Option<PathBuf>,
        /// Directory receiving PNG figures of every stage
        #[arg(long)]
        plot_dir: Option<PathBuf>,
        #[command(flatten)]
        params: ConfigArgs,
    },
    /// Spectrum of newline-delimited samples read from stdin or --input file
    Spectrum {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 60.0)]
        fs: f64,
        #[arg(long, value_enum, default_value = "welch")]
        method: SpectrumMethod,
        #[arg(long, value_enum, default_value = "mag")]
        scale: ScaleArg,
        #[arg(long, default_value_t = 1024)]
        segment: usize,
    },
    /// Compare detected peak frame indices against a ground-truth CSV
    Evaluate {
        #[arg(long)]
        ground_truth: PathBuf,
        /// Newline-delimited frame indices of detected peaks
        #[arg(long)]
        detected: PathBuf,
        /// Length of the detected series; defaults to the ground-truth length
        #[arg(long)]
        frames: Option<usize>,
    },
    /// Write a synthetic RGB recording and its ground truth
    Simulate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 600)]
        frames: usize,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long, default_value_t = 0.05)]
        noise: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

#[derive(Serialize)]
struct ExtractOutput<'a> {
    fps: f64,
    window_len: usize,
    pulse: &'a [f64],
    filtered: &'a [f64],
}

#[derive(Serialize)]
struct SimulateOutput {
    rgb: PathBuf,
    ground_truth: PathBuf,
    frames: usize,
    fps: f64,
    bpm: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Extract { input, params } => cmd_extract(&input, &params)?,
        Commands::HeartRate {
            input,
            ground_truth,
            plot_dir,
            params,
        } => cmd_heart_rate(&input, ground_truth.as_deref(), plot_dir.as_deref(), &params)?,
        Commands::Spectrum {
            input,
            fs,
            method,
            scale,
            segment,
        } => cmd_spectrum(input.as_deref(), fs, method, scale, segment)?,
        Commands::Evaluate {
            ground_truth,
            detected,
            frames,
        } => cmd_evaluate(&ground_truth, &detected, frames)?,
        Commands::Simulate {
            out,
            frames,
            fps,
            bpm,
            noise,
            seed,
        } => cmd_simulate(&out, frames, fps, bpm, noise, seed)?,
    }
    Ok(())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn load_channels(input: &Path) -> Result<ChannelSeries> {
    let channels = read_channels_csv(input, &ChannelColumns::default())?;
    info!("loaded {} frames from {}", channels.len(), input.display());
    Ok(channels)
}

fn cmd_extract(input: &Path, params: &ConfigArgs) -> Result<()> {
    let cfg = params.resolve()?;
    let channels = load_channels(input)?;
    let window_len = PosExtractor::new(cfg.fps, cfg.window_seconds)?.window_len();
    let (pulse, filtered) = extract_pulse(&channels, &cfg)?;
    let out = ExtractOutput {
        fps: cfg.fps,
        window_len,
        pulse: &pulse.data,
        filtered: &filtered.data,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_heart_rate(
    input: &Path,
    ground_truth: Option<&Path>,
    plot_dir: Option<&Path>,
    params: &ConfigArgs,
) -> Result<()> {
    let cfg = params.resolve()?;
    let channels = load_channels(input)?;
    let truth = ground_truth
        .map(|path| read_ground_truth_csv(path, &GroundTruthColumns::default()))
        .transpose()?;
    let analyzer = MovingAverageAnalyzer::new(cfg.peaks);
    let output = run_pipeline(&channels, &cfg, &analyzer, truth.as_ref())?;
    if let Some(dir) = plot_dir {
        write_figures(dir, &channels, &cfg, &output)?;
    }
    println!("{}", serde_json::to_string(&output.report)?);
    Ok(())
}

fn cmd_spectrum(
    input: Option<&Path>,
    fs: f64,
    method: SpectrumMethod,
    scale: ScaleArg,
    segment: usize,
) -> Result<()> {
    let samples = read_samples(input)?;
    let spectrum = match method {
        SpectrumMethod::Welch => welch_psd(&samples, fs, segment)?,
        SpectrumMethod::Fft => fft_spectrum(&samples, fs, scale.into())?,
    };
    println!("{}", serde_json::to_string(&spectrum)?);
    Ok(())
}

fn cmd_evaluate(ground_truth: &Path, detected: &Path, frames: Option<usize>) -> Result<()> {
    let truth = read_ground_truth_csv(ground_truth, &GroundTruthColumns::default())?;
    let frames = frames.unwrap_or(truth.times_ms.len());
    let indices = text_io::read_peak_indices(detected)?;
    let detected = PeakSequence::from_indices(frames, &indices);
    let result = evaluate(&truth.peaks, &detected, &truth.times_ms, frames)?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn cmd_simulate(out: &Path, frames: usize, fps: f64, bpm: f64, noise: f64, seed: u64) -> Result<()> {
    let synth = SyntheticConfig {
        frames,
        fps,
        pulse_hz: bpm / 60.0,
        noise,
        seed,
        ..SyntheticConfig::default()
    };
    let channels = synthetic_channels(&synth)?;
    let truth = synthetic_ground_truth(&synth)?;
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let rgb = out.join("rgb.csv");
    let gt = out.join("ground_truth.csv");
    write_channels_csv(&rgb, &channels, &ChannelColumns::default())?;
    write_ground_truth_csv(&gt, &truth, &GroundTruthColumns::default())?;
    let summary = SimulateOutput {
        rgb,
        ground_truth: gt,
        frames,
        fps,
        bpm,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn write_figures(dir: &Path, channels: &ChannelSeries, cfg: &RppgConfig, output: &PipelineOutput) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let figures = [
        ("rppg_rgb.png", figure_from_channels(channels, cfg.fps, MAX_PLOT_POINTS)),
        (
            "rppg_pulse.png",
            figure_from_pulse(
                &output.pulse,
                &output.filtered,
                Some(&output.analysis.peaks),
                MAX_PLOT_POINTS,
            ),
        ),
        (
            "rppg_extracted_welch.png",
            figure_from_spectrum("Welch PSD of extracted pulse", &output.raw_psd, true),
        ),
        (
            "rppg_filtered_welch.png",
            figure_from_spectrum("Welch PSD of filtered pulse", &output.filtered_psd, true),
        ),
        (
            "rppg_filtered_fft.png",
            figure_from_spectrum("FFT of filtered pulse", &output.filtered_fft, false),
        ),
    ];
    let reference = output.reference_spectra.as_ref().map(|spectra| {
        [
            (
                "rppg_original_fft.png",
                figure_from_spectrum("FFT of reference signal", &spectra.fft, false),
            ),
            (
                "rppg_original_welch.png",
                figure_from_spectrum("Welch PSD of reference signal", &spectra.psd, true),
            ),
        ]
    });
    for (name, fig) in figures.iter().chain(reference.iter().flatten()) {
        let path = dir.join(name);
        draw_plotters_figure(&path, fig)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let transform = |v: f64| if fig.y.log { v.log10() } else { v };
    let ([x_min, x_max], [y_min, y_max]) = fig.bounds().unwrap_or(([0.0, 1.0], [0.0, 1.0]));
    let (y_min, y_max) = (transform(y_min), transform(y_max));
    let pad = ((y_max - y_min) * 0.05).max(1e-9);

    let backend = BitMapBackend::new(path, (1000, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max.max(x_min + 1e-9), (y_min - pad)..(y_max + pad))?;
    let y_label = match (&fig.y.label, fig.y.log) {
        (Some(label), true) => format!("log10 {label}"),
        (Some(label), false) => label.clone(),
        (None, _) => String::new(),
    };
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(y_label)
        .draw()?;
    for series in &fig.series {
        let visible = series
            .points()
            .iter()
            .filter(|p| !fig.y.log || p[1] > 0.0)
            .map(|p| (p[0], transform(p[1])))
            .collect::<Vec<_>>();
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    visible,
                    RGBColor(r, g, b).stroke_width(line.style.width.ceil() as u32),
                ))?;
            }
            Series::Markers(markers) => {
                let (r, g, b) = markers.style.color.rgb();
                let radius = markers.style.width.ceil() as i32;
                chart.draw_series(
                    visible
                        .into_iter()
                        .map(|p| Circle::new(p, radius, RGBColor(r, g, b).filled())),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}
