use anyhow::{bail, Context, Result};
use clap::Parser;
use ndarray::Array2;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use eeg_attention::{AttentionPipeline, Epoch, SignalConfig};

/// Runs the attention pipeline on one epoch stored as CSV (one row per
/// channel) and prints the result as JSON.
#[derive(Parser)]
#[command(name = "epoch_metrics", about = "EEG attention metrics for a single epoch")]
struct Args {
    /// CSV file, one channel per row, comma-separated samples
    #[arg(long)]
    input: PathBuf,

    /// Sampling rate in Hz
    #[arg(long, default_value_t = 128.0)]
    sfreq: f64,

    /// Mains frequency for the notch filter
    #[arg(long, default_value_t = 60.0)]
    notch: f64,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Logging verbosity
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn read_csv_epoch(path: &PathBuf) -> Result<Array2<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: Vec<f64> = line
            .split(',')
            .map(|tok| {
                tok.trim()
                    .parse::<f64>()
                    .with_context(|| format!("line {}: bad sample {tok:?}", lineno + 1))
            })
            .collect::<Result<_>>()?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                bail!("line {}: expected {} samples, got {}", lineno + 1, first.len(), row.len());
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        bail!("{}: no data rows", path.display());
    }
    let n_samples = rows[0].len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let n_channels = flat.len() / n_samples;
    Ok(Array2::from_shape_vec((n_channels, n_samples), flat)?)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level: Level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data = read_csv_epoch(&args.input)?;
    info!(
        "loaded {} ch × {} samples @ {} Hz",
        data.nrows(),
        data.ncols(),
        args.sfreq
    );

    let config = SignalConfig {
        sfreq: args.sfreq,
        notch_freq: args.notch,
        window_size: data.ncols(),
        channels: (0..data.nrows()).map(|i| format!("ch{i}")).collect(),
        ..SignalConfig::default()
    };
    let pipeline = AttentionPipeline::new(config)?;
    let result = pipeline.process_epoch(&Epoch::new(data, 0.0))?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");
    Ok(())
}
