//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::interconnect::generator::layout::LayoutRules;
use crate::interconnect::{AdjacencyRules, GeneratorSettings, PadNormalization};

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Chip description loaded when the server starts.
    #[serde(default)]
    pub chip_path: Option<PathBuf>,

    /// Directories the server may read from and write to.
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,

    /// Physical layout settings.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel {
                level: self.logging.level.clone(),
            });
        }
        Ok(())
    }
}

/// Physical layout of the chip and the generated fixture.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    /// Maximum per-axis centre distance for two pads to be bridged (mm).
    #[serde(default = "default_adjacency_tolerance")]
    pub adjacency_tolerance: f64,

    /// Pads closer than this on both axes are the same point (mm).
    #[serde(default = "default_same_point_epsilon")]
    pub same_point_epsilon: f64,

    /// Rewrite legacy-sized pads when loading a chip.
    #[serde(default = "default_true")]
    pub normalize_legacy_pads: bool,

    /// Pad size written by older chip descriptions (mm).
    #[serde(default = "default_legacy_pad_size")]
    pub legacy_pad_size: f64,

    /// Pad size legacy pads are rewritten to (mm).
    #[serde(default = "default_nominal_pad_size")]
    pub nominal_pad_size: f64,

    /// Test pad spacing along a board edge (mm).
    #[serde(default = "default_test_pad_pitch")]
    pub test_pad_pitch: f64,

    /// Test pad width (mm).
    #[serde(default = "default_test_pad_size")]
    pub test_pad_width: f64,

    /// Test pad height (mm).
    #[serde(default = "default_test_pad_size")]
    pub test_pad_height: f64,

    /// Duplicate pad placed over each outer chip pad (mm).
    #[serde(default = "default_interconnect_pad_size")]
    pub interconnect_pad_size: f64,

    /// Smallest fixture board side (mm).
    #[serde(default = "default_board_min_size")]
    pub board_min_size: f64,

    /// Board margin beyond the outermost test pads (mm).
    #[serde(default = "default_board_margin")]
    pub board_margin: f64,

    /// Distance from the board edge to test pad centres (mm).
    #[serde(default = "default_test_pad_inset")]
    pub test_pad_inset: f64,

    /// Fan-out trace width (mm).
    #[serde(default = "default_trace_width")]
    pub trace_width: f64,

    /// Bridge trace width (mm).
    #[serde(default = "default_bridge_trace_width")]
    pub bridge_trace_width: f64,

    /// Silkscreen label size (mm).
    #[serde(default = "default_label_font_size")]
    pub label_font_size: f64,

    /// Distance from a test pad to its label (mm).
    #[serde(default = "default_label_offset")]
    pub label_offset: f64,

    /// Reference designator of the generated component.
    #[serde(default = "default_component_name")]
    pub component_name: String,

    /// Explicit diagonal `X` pairs. Empty means derive them from pad
    /// positions.
    #[serde(default)]
    pub diagonal_pairs: Vec<[String; 2]>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            adjacency_tolerance: default_adjacency_tolerance(),
            same_point_epsilon: default_same_point_epsilon(),
            normalize_legacy_pads: default_true(),
            legacy_pad_size: default_legacy_pad_size(),
            nominal_pad_size: default_nominal_pad_size(),
            test_pad_pitch: default_test_pad_pitch(),
            test_pad_width: default_test_pad_size(),
            test_pad_height: default_test_pad_size(),
            interconnect_pad_size: default_interconnect_pad_size(),
            board_min_size: default_board_min_size(),
            board_margin: default_board_margin(),
            test_pad_inset: default_test_pad_inset(),
            trace_width: default_trace_width(),
            bridge_trace_width: default_bridge_trace_width(),
            label_font_size: default_label_font_size(),
            label_offset: default_label_offset(),
            component_name: default_component_name(),
            diagonal_pairs: Vec::new(),
        }
    }
}

impl LayoutConfig {
    /// Validates sizes and tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("adjacency_tolerance", self.adjacency_tolerance),
            ("legacy_pad_size", self.legacy_pad_size),
            ("nominal_pad_size", self.nominal_pad_size),
            ("test_pad_pitch", self.test_pad_pitch),
            ("test_pad_width", self.test_pad_width),
            ("test_pad_height", self.test_pad_height),
            ("interconnect_pad_size", self.interconnect_pad_size),
            ("board_min_size", self.board_min_size),
            ("trace_width", self.trace_width),
            ("bridge_trace_width", self.bridge_trace_width),
            ("label_font_size", self.label_font_size),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::invalid_layout(
                    name,
                    format!("must be positive, got {value}"),
                ));
            }
        }

        for (name, value) in [
            ("board_margin", self.board_margin),
            ("test_pad_inset", self.test_pad_inset),
            ("label_offset", self.label_offset),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::invalid_layout(
                    name,
                    format!("must not be negative, got {value}"),
                ));
            }
        }

        let epsilon = self.same_point_epsilon;
        if epsilon.is_nan() || epsilon < 0.0 || epsilon >= self.adjacency_tolerance {
            return Err(ConfigError::invalid_layout(
                "same_point_epsilon",
                format!(
                    "must be in [0, {}), got {epsilon}",
                    self.adjacency_tolerance
                ),
            ));
        }

        for [a, b] in &self.diagonal_pairs {
            if a == b {
                return Err(ConfigError::SelfPairedPin { pin: a.clone() });
            }
        }
        Ok(())
    }

    /// Pad adjacency limits.
    #[must_use]
    pub const fn adjacency_rules(&self) -> AdjacencyRules {
        AdjacencyRules {
            tolerance: self.adjacency_tolerance,
            epsilon: self.same_point_epsilon,
        }
    }

    /// Loader rewrite for legacy pads, if enabled.
    #[must_use]
    pub const fn pad_normalization(&self) -> Option<PadNormalization> {
        if self.normalize_legacy_pads {
            Some(PadNormalization {
                legacy: self.legacy_pad_size,
                nominal: self.nominal_pad_size,
            })
        } else {
            None
        }
    }

    /// Generator settings derived from this layout.
    #[must_use]
    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            adjacency: self.adjacency_rules(),
            layout: LayoutRules {
                pitch: self.test_pad_pitch,
                board_min_size: self.board_min_size,
                board_margin: self.board_margin,
                inset: self.test_pad_inset,
            },
            test_pad_width: self.test_pad_width,
            test_pad_height: self.test_pad_height,
            interconnect_pad_size: self.interconnect_pad_size,
            trace_width: self.trace_width,
            bridge_trace_width: self.bridge_trace_width,
            label_font_size: self.label_font_size,
            label_offset: self.label_offset,
            component_name: self.component_name.clone(),
            ..GeneratorSettings::default()
        }
    }
}

const fn default_adjacency_tolerance() -> f64 {
    1.5
}

const fn default_same_point_epsilon() -> f64 {
    0.01
}

const fn default_legacy_pad_size() -> f64 {
    0.3
}

const fn default_nominal_pad_size() -> f64 {
    0.5
}

const fn default_test_pad_pitch() -> f64 {
    2.54
}

const fn default_test_pad_size() -> f64 {
    1.5
}

const fn default_interconnect_pad_size() -> f64 {
    0.4
}

const fn default_board_min_size() -> f64 {
    20.0
}

const fn default_board_margin() -> f64 {
    3.0
}

const fn default_test_pad_inset() -> f64 {
    1.5
}

const fn default_trace_width() -> f64 {
    0.15
}

const fn default_bridge_trace_width() -> f64 {
    0.2
}

const fn default_label_font_size() -> f64 {
    0.8
}

const fn default_label_offset() -> f64 {
    1.6
}

fn default_component_name() -> String {
    "U1".to_string()
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
