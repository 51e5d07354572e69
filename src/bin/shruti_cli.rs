use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shruti_trainer::analysis::{PitchEstimator, PitchSource};
use shruti_trainer::config::AppConfig;
use shruti_trainer::raga::catalog::RAGA_CATALOG;
use shruti_trainer::raga::RagaContextTracker;
use shruti_trainer::shruti::table::SHRUTI_TABLE;
use shruti_trainer::shruti::ShrutiMatcher;

#[derive(Parser, Debug)]
#[command(
    name = "shruti-cli",
    about = "Offline pitch analysis and tone tooling for Shruti Trainer"
)]
struct Cli {
    /// JSON configuration file (defaults to $SHRUTI_CONFIG or config/shruti.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse a mono WAV file chunk by chunk and print one JSON line per chunk
    Analyze {
        #[arg(long)]
        wav: PathBuf,
        /// Tonic (Sa) frequency in Hz
        #[arg(long)]
        tonic: Option<f64>,
        #[arg(long, default_value_t = 4096)]
        chunk_size: usize,
    },
    /// Print the 22-shruti table for a tonic
    Table {
        #[arg(long)]
        tonic: Option<f64>,
    },
    /// List the ragas known to the context tracker
    Ragas,
    /// Write a sine tone to a 16-bit mono WAV file
    Synth {
        #[arg(long)]
        frequency: f64,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
        #[arg(long, default_value_t = 0.5)]
        amplitude: f64,
    },
}

#[derive(Debug, Serialize)]
struct ChunkReport<'a> {
    offset_s: f64,
    tone_name: Option<&'a str>,
    western_label: Option<&'a str>,
    frequency: f64,
    target_frequency: f64,
    cent_deviation: f64,
    confidence: f64,
    raga_context: Option<&'a str>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            wav,
            tonic,
            chunk_size,
        } => run_analyze(&config, &wav, tonic, chunk_size),
        Commands::Table { tonic } => run_table(tonic.unwrap_or(config.matcher.default_tonic_hz)),
        Commands::Ragas => run_ragas(),
        Commands::Synth {
            frequency,
            output,
            seconds,
            sample_rate,
            amplitude,
        } => run_synth(frequency, &output, seconds, sample_rate, amplitude),
    }
}

fn run_analyze(
    config: &AppConfig,
    wav: &Path,
    tonic: Option<f64>,
    chunk_size: usize,
) -> Result<ExitCode> {
    if chunk_size < config.analysis.min_window_samples {
        return Err(anyhow!(
            "chunk size {} is below the {} sample analysis window",
            chunk_size,
            config.analysis.min_window_samples
        ));
    }

    let tonic = tonic.unwrap_or(config.matcher.default_tonic_hz);
    let (samples, sample_rate) = read_wav(wav)?;
    let estimator = PitchEstimator::new(config.analysis.clone());
    let matcher = ShrutiMatcher::from_config(&config.matcher);
    let mut raga = RagaContextTracker::new(config.raga.clone());

    let mut analysed = 0usize;
    let mut matched = 0usize;
    for (index, chunk) in samples.chunks(chunk_size).enumerate() {
        let Some(estimate) = estimator.estimate(chunk, sample_rate) else {
            continue;
        };
        analysed += 1;

        let tone_match = matcher.match_estimate(&estimate, tonic);
        let raga_context = match tone_match.tone_name() {
            Some(name) => {
                matched += 1;
                raga.observe(name)
            }
            None => raga.current(),
        };

        let report = ChunkReport {
            offset_s: (index * chunk_size) as f64 / sample_rate as f64,
            tone_name: tone_match.tone_name(),
            western_label: tone_match.western_label(),
            frequency: tone_match.detected_frequency,
            target_frequency: tone_match.target_frequency,
            cent_deviation: tone_match.cent_deviation,
            confidence: tone_match.confidence,
            raga_context,
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    eprintln!(
        "{}: {} chunks with pitch, {} matched, raga {}",
        wav.display(),
        analysed,
        matched,
        raga.current().unwrap_or("-")
    );
    Ok(ExitCode::from(0))
}

fn run_table(tonic: f64) -> Result<ExitCode> {
    if !tonic.is_finite() || tonic <= 0.0 {
        return Err(anyhow!("tonic must be a positive frequency"));
    }

    println!("{:<6} {:<5} {:>6} {:>10} {:>10}", "tone", "west", "cents", "ratio", "Hz");
    for entry in SHRUTI_TABLE.iter() {
        println!(
            "{:<6} {:<5} {:>6} {:>10.6} {:>10.2}",
            entry.name,
            entry.western_label,
            entry.cent_value,
            entry.frequency_ratio,
            tonic * entry.frequency_ratio
        );
    }
    Ok(ExitCode::from(0))
}

fn run_ragas() -> Result<ExitCode> {
    for raga in RAGA_CATALOG.iter() {
        println!("{:<10} {}", raga.name, raga.tones.join(" "));
    }
    Ok(ExitCode::from(0))
}

fn run_synth(
    frequency: f64,
    output: &Path,
    seconds: f64,
    sample_rate: u32,
    amplitude: f64,
) -> Result<ExitCode> {
    if !(frequency > 0.0 && seconds > 0.0 && (0.0..=1.0).contains(&amplitude)) {
        return Err(anyhow!(
            "frequency and duration must be positive and amplitude within [0, 1]"
        ));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("creating {}", output.display()))?;

    let total = (seconds * sample_rate as f64).round() as usize;
    for i in 0..total {
        let t = i as f64 / sample_rate as f64;
        let value = amplitude * (2.0 * PI * frequency * t).sin();
        writer
            .write_sample((value * i16::MAX as f64) as i16)
            .context("writing sample")?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", output.display()))?;

    println!("wrote {} samples at {} Hz to {}", total, sample_rate, output.display());
    Ok(ExitCode::from(0))
}

fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(anyhow!(
            "{} must be mono (found {} channels)",
            path.display(),
            spec.channels
        ));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    Ok((samples, spec.sample_rate))
}
