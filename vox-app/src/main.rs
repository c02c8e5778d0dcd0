//! VOX - command-line pitch editor
//!
//! Reads a raw little-endian f32 mono buffer and a list of `time semitones`
//! edit points, runs the editing pipeline and writes the result in the same
//! raw format.

use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use vox_analysis::{dominant_frequency, AudioBuffer};
use vox_dsp::ProcessorKind;
use vox_edit::{EditPipeline, EditPoint, EngineConfig};

/// Sample rate assumed for raw input when none is given
const DEFAULT_SAMPLE_RATE: u32 = 48000;

const USAGE: &str = "\
Usage:
  vox edit <input.f32> <edits.txt> <output.f32> [--rate HZ] [--config FILE] [--strategy NAME]
  vox demo <output.f32> [--strategy NAME]
  vox config [--write]

Edit files hold one `seconds semitones` pair per line; `#` starts a comment.
Strategies: phase_vocoder, psola, wsola.";

/// Parsed command line
enum Command {
    Edit {
        input: PathBuf,
        edits: PathBuf,
        output: PathBuf,
    },
    Demo {
        output: PathBuf,
    },
    Config {
        write: bool,
    },
}

struct Options {
    command: Command,
    sample_rate: u32,
    config: Option<PathBuf>,
    strategy: Option<ProcessorKind>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let mut config = match &options.config {
        Some(path) => EngineConfig::load_from(path).with_context(|| format!("reading {}", path.display()))?,
        None => EngineConfig::load(),
    };
    if let Some(strategy) = options.strategy {
        config.strategy = strategy;
    }

    match options.command {
        Command::Edit { input, edits, output } => run_edit(&input, &edits, &output, options.sample_rate, config),
        Command::Demo { output } => run_demo(&output, config),
        Command::Config { write } => show_config(&config, write),
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut positional = Vec::new();
    let mut sample_rate = DEFAULT_SAMPLE_RATE;
    let mut config = None;
    let mut strategy = None;
    let mut write = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--rate" => {
                let value = iter.next().context("--rate needs a value")?;
                sample_rate = value.parse().with_context(|| format!("bad sample rate {:?}", value))?;
            }
            "--config" => {
                config = Some(PathBuf::from(iter.next().context("--config needs a path")?));
            }
            "--strategy" => {
                let value = iter.next().context("--strategy needs a name")?;
                strategy = Some(ProcessorKind::parse(value).with_context(|| format!("unknown strategy {:?}", value))?);
            }
            "--write" => write = true,
            "-h" | "--help" => bail!("VOX pitch editor"),
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let Some(name) = positional.first().and_then(|p| p.to_str()).map(str::to_string) else {
        bail!("missing command");
    };
    let command = match (name.as_str(), positional.len()) {
        ("edit", 4) => Command::Edit {
            input: positional[1].clone(),
            edits: positional[2].clone(),
            output: positional[3].clone(),
        },
        ("demo", 2) => Command::Demo {
            output: positional[1].clone(),
        },
        ("config", 1) => Command::Config { write },
        _ => bail!("wrong arguments for {:?}", name),
    };

    Ok(Options {
        command,
        sample_rate,
        config,
        strategy,
    })
}

fn run_edit(input: &Path, edits: &Path, output: &Path, sample_rate: u32, config: EngineConfig) -> anyhow::Result<()> {
    let samples = read_samples(input)?;
    let text = fs::read_to_string(edits).with_context(|| format!("reading {}", edits.display()))?;
    let points = parse_edits(&text)?;

    let buffer = AudioBuffer::mono(samples, sample_rate)?;
    let mut pipeline = EditPipeline::new(sample_rate, config)?;
    let result = pipeline.run_buffer(&buffer, &points)?;
    write_samples(output, &result)?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        edits = points.len(),
        seconds = buffer.duration_secs(),
        processor = pipeline.processor().name(),
        "Wrote edited buffer"
    );
    Ok(())
}

/// One second of a 220 Hz sine raised by a fifth in the middle
fn run_demo(output: &Path, config: EngineConfig) -> anyhow::Result<()> {
    let sample_rate = DEFAULT_SAMPLE_RATE;
    let samples: Vec<f32> = (0..sample_rate as usize)
        .map(|i| 0.5 * (2.0 * PI * 220.0 * i as f32 / sample_rate as f32).sin())
        .collect();
    let edits = [
        EditPoint::new(0.0, 0.0),
        EditPoint::new(0.5, 7.0),
        EditPoint::new(1.0, 0.0),
    ];

    let buffer = AudioBuffer::mono(samples, sample_rate)?;
    let mut pipeline = EditPipeline::new(sample_rate, config)?;
    let result = pipeline.run_buffer(&buffer, &edits)?;
    write_samples(output, &result)?;

    // Pitch summary in quarter-second blocks
    let block = sample_rate as usize / 4;
    for (index, chunk) in result.chunks(block).enumerate() {
        if let Some(freq) = dominant_frequency(chunk, sample_rate) {
            tracing::info!(block = index, hz = freq, "Demo pitch");
        }
    }
    tracing::info!(output = %output.display(), processor = pipeline.processor().name(), "Wrote demo buffer");
    Ok(())
}

fn show_config(config: &EngineConfig, write: bool) -> anyhow::Result<()> {
    let path = EngineConfig::config_path();
    if write {
        config.save_to(&path)?;
        tracing::info!(path = %path.display(), "Saved configuration");
    }
    println!("# {}\n{}", path.display(), config.serialize());
    Ok(())
}

/// Parse `seconds semitones` lines
fn parse_edits(text: &str) -> anyhow::Result<Vec<EditPoint>> {
    let mut points = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(time), Some(semitones), None) = (fields.next(), fields.next(), fields.next()) else {
            bail!("line {}: expected `seconds semitones`", number + 1);
        };
        let time: f64 = time.parse().with_context(|| format!("line {}: bad time", number + 1))?;
        let semitones: f32 = semitones
            .parse()
            .with_context(|| format!("line {}: bad semitones", number + 1))?;
        points.push(EditPoint::new(time, semitones));
    }
    Ok(points)
}

fn read_samples(path: &Path) -> anyhow::Result<Vec<f32>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        bail!("{} is not a whole number of f32 samples", path.display());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn write_samples(path: &Path, samples: &[f32]) -> anyhow::Result<()> {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_edits() {
        let points = parse_edits("# header\n0.0 0\n0.5 +7 # peak\n\n1.0 -0.5\n").unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], EditPoint::new(0.5, 7.0));
        assert_eq!(points[2].semitones, -0.5);
        assert!(parse_edits("0.5").is_err());
        assert!(parse_edits("0.5 1 2").is_err());
        assert!(parse_edits("half 1").is_err());
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(&args(&["edit", "in.f32", "e.txt", "out.f32", "--rate", "44100", "--strategy", "psola"])).unwrap();
        assert_eq!(options.sample_rate, 44100);
        assert_eq!(options.strategy, Some(ProcessorKind::Psola));
        assert!(matches!(options.command, Command::Edit { .. }));

        assert!(parse_args(&args(&["demo"])).is_err());
        assert!(parse_args(&args(&["edit", "a"])).is_err());
        assert!(parse_args(&args(&["config", "--bogus"])).is_err());
        assert!(matches!(parse_args(&args(&["config", "--write"])).unwrap().command, Command::Config { write: true }));
    }

    #[test]
    fn test_sample_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("vox-samples-{}.f32", std::process::id()));
        let samples = vec![0.0, 0.25, -1.0, 1e-7];
        write_samples(&path, &samples).unwrap();
        assert_eq!(read_samples(&path).unwrap(), samples);
        let _ = fs::remove_file(&path);
    }
}
