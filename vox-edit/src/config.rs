//! Engine configuration and its persistence
//!
//! Stores every pipeline tunable as a simple `key=value` text file.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use vox_dsp::{
    ProcessorKind, ProcessorSettings, PsolaConfig, PitchShifterConfig, VariablePitchConfig, WsolaConfig,
};

use crate::error::ConfigError;
use crate::outlier::OutlierConfig;
use crate::spline::SplineConfig;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Pitch processing strategy
    pub strategy: ProcessorKind,
    /// Phase vocoder FFT size
    pub fft_size: usize,
    /// Phase vocoder hop
    pub hop_size: usize,
    /// Variable-pitch window length in milliseconds
    pub window_ms: f32,
    /// Variable-pitch window overlap fraction
    pub window_overlap: f32,
    pub preserve_formants: bool,
    pub anti_aliasing: bool,
    /// Formant envelope smoothing width in bins
    pub envelope_smoothing_bins: usize,
    /// Outlier gradient threshold in semitones
    pub gradient_threshold: f32,
    /// Outlier neighbourhood on each side
    pub outlier_window: usize,
    pub outlier_iterations: usize,
    /// Preprocessor frame size in samples
    pub frame_size: usize,
    /// Preprocessor hop in samples
    pub frame_hop: usize,
    /// RMS level at or above which a frame counts as voice
    pub vad_threshold: f32,
    pub psola_min_hz: f32,
    pub psola_max_hz: f32,
    pub wsola_segment_ms: f32,
    pub wsola_search_ms: f32,
    /// Scratch buffers retained by the pipeline's pool
    pub pool_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let pitch = PitchShifterConfig::default();
        let variable = VariablePitchConfig::default();
        let outlier = OutlierConfig::default();
        let psola = PsolaConfig::default();
        let wsola = WsolaConfig::default();
        Self {
            strategy: ProcessorKind::default(),
            fft_size: pitch.fft_size,
            hop_size: pitch.hop_size,
            window_ms: variable.window_ms,
            window_overlap: variable.overlap,
            preserve_formants: pitch.preserve_formants,
            anti_aliasing: pitch.anti_aliasing,
            envelope_smoothing_bins: pitch.envelope_smoothing_bins,
            gradient_threshold: outlier.gradient_threshold,
            outlier_window: outlier.window_size,
            outlier_iterations: outlier.max_iterations,
            frame_size: 2048,
            frame_hop: 1024,
            vad_threshold: 0.01,
            psola_min_hz: psola.min_hz,
            psola_max_hz: psola.max_hz,
            wsola_segment_ms: wsola.segment_ms,
            wsola_search_ms: wsola.search_ms,
            pool_capacity: 8,
        }
    }
}

impl EngineConfig {
    /// Load config from the default location
    ///
    /// Returns default config if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("Ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())?;
        Ok(())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vox")
            .join("config.txt")
    }

    /// Parse config from simple key=value format, starting from defaults
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "strategy" => {
                    config.strategy = ProcessorKind::parse(value).ok_or_else(|| invalid(key, value))?;
                }
                "fft_size" => config.fft_size = parse_value(key, value)?,
                "hop_size" => config.hop_size = parse_value(key, value)?,
                "window_ms" => config.window_ms = parse_value(key, value)?,
                "window_overlap" => config.window_overlap = parse_value(key, value)?,
                "preserve_formants" => config.preserve_formants = parse_value(key, value)?,
                "anti_aliasing" => config.anti_aliasing = parse_value(key, value)?,
                "envelope_smoothing_bins" => config.envelope_smoothing_bins = parse_value(key, value)?,
                "gradient_threshold" => config.gradient_threshold = parse_value(key, value)?,
                "outlier_window" => config.outlier_window = parse_value(key, value)?,
                "outlier_iterations" => config.outlier_iterations = parse_value(key, value)?,
                "frame_size" => config.frame_size = parse_value(key, value)?,
                "frame_hop" => config.frame_hop = parse_value(key, value)?,
                "vad_threshold" => config.vad_threshold = parse_value(key, value)?,
                "psola_min_hz" => config.psola_min_hz = parse_value(key, value)?,
                "psola_max_hz" => config.psola_max_hz = parse_value(key, value)?,
                "wsola_segment_ms" => config.wsola_segment_ms = parse_value(key, value)?,
                "wsola_search_ms" => config.wsola_search_ms = parse_value(key, value)?,
                "pool_capacity" => config.pool_capacity = parse_value(key, value)?,
                _ => {} // Ignore unknown keys
            }
        }

        Ok(config)
    }

    /// Serialize config to simple key=value format
    pub fn serialize(&self) -> String {
        let lines = [
            "# VOX Configuration".to_string(),
            format!("strategy={}", self.strategy),
            format!("fft_size={}", self.fft_size),
            format!("hop_size={}", self.hop_size),
            format!("window_ms={}", self.window_ms),
            format!("window_overlap={}", self.window_overlap),
            format!("preserve_formants={}", self.preserve_formants),
            format!("anti_aliasing={}", self.anti_aliasing),
            format!("envelope_smoothing_bins={}", self.envelope_smoothing_bins),
            format!("gradient_threshold={}", self.gradient_threshold),
            format!("outlier_window={}", self.outlier_window),
            format!("outlier_iterations={}", self.outlier_iterations),
            format!("frame_size={}", self.frame_size),
            format!("frame_hop={}", self.frame_hop),
            format!("vad_threshold={}", self.vad_threshold),
            format!("psola_min_hz={}", self.psola_min_hz),
            format!("psola_max_hz={}", self.psola_max_hz),
            format!("wsola_segment_ms={}", self.wsola_segment_ms),
            format!("wsola_search_ms={}", self.wsola_search_ms),
            format!("pool_capacity={}", self.pool_capacity),
        ];
        lines.join("\n")
    }

    /// Settings for the frame processors
    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            pitch_shifter: PitchShifterConfig {
                fft_size: self.fft_size,
                hop_size: self.hop_size,
                preserve_formants: self.preserve_formants,
                anti_aliasing: self.anti_aliasing,
                envelope_smoothing_bins: self.envelope_smoothing_bins,
            },
            variable: VariablePitchConfig {
                window_ms: self.window_ms,
                overlap: self.window_overlap,
                ..VariablePitchConfig::default()
            },
            psola: PsolaConfig {
                min_hz: self.psola_min_hz,
                max_hz: self.psola_max_hz,
                ..PsolaConfig::default()
            },
            wsola: WsolaConfig {
                segment_ms: self.wsola_segment_ms,
                search_ms: self.wsola_search_ms,
            },
        }
    }

    pub fn outlier_config(&self) -> OutlierConfig {
        OutlierConfig {
            gradient_threshold: self.gradient_threshold,
            window_size: self.outlier_window,
            max_iterations: self.outlier_iterations,
        }
    }

    pub fn spline_config(&self) -> SplineConfig {
        SplineConfig::default()
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}
