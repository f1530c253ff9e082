//! Configuration loading and validation.
//!
//! Configuration comes from three layers, each overriding the one before:
//!
//! ```text
//! stock defaults  →  blurhash-map.toml (optional)  →  command-line flags
//! ```
//!
//! The layers are merged as raw TOML tables and deserialized once into a
//! [`HashMapConfig`]. Unknown keys are rejected to catch typos early.
//! [`HashMapConfig::validate`] then turns the loose values into an immutable
//! [`Settings`] value that every component receives at construction. All
//! problems found during validation are reported together.
//!
//! ## Config File
//!
//! ```toml
//! assets = "public/images"          # Required: asset root to keep in sync
//! extensions = ["jpg", "png"]       # Subset of jpg, jpeg, png, bmp, webp
//! target = "hashmap.json"           # Where the JSON index is written
//!
//! [components]
//! x = 4                             # 1-9
//! y = 3                             # 1-9
//!
//! [encoder]
//! binary = "blurhash_encoder"
//! build_dir = "src/C"
//! build_command = ["make", "blurhash_encoder"]
//! build_output = "src/C/blurhash_encoder"
//!
//! [watch]
//! debounce_ms = 500
//! ```

use crate::encoder::ComponentRatio;
use crate::extensions::{ExtensionSet, split_list};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "blurhash-map.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid configuration:\n{}", format_violations(.0))]
    Invalid(Vec<Violation>),
}

/// A single rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raw configuration as read from TOML and command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HashMapConfig {
    /// Asset root directory. Required, but only enforced by `validate`
    /// so a missing value is reported alongside every other problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<PathBuf>,
    /// Image extensions to track.
    pub extensions: Vec<String>,
    /// Blur hash component counts.
    pub components: ComponentsConfig,
    /// Output path of the JSON index.
    pub target: PathBuf,
    /// External encoder location and bootstrap.
    pub encoder: EncoderConfig,
    /// File watcher settings.
    pub watch: WatchConfig,
}

impl Default for HashMapConfig {
    fn default() -> Self {
        Self {
            assets: None,
            extensions: crate::extensions::ImageExtension::ALL
                .iter()
                .map(|e| e.to_string())
                .collect(),
            components: ComponentsConfig::default(),
            target: PathBuf::from("./hashmap.json"),
            encoder: EncoderConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentsConfig {
    pub x: u32,
    pub y: u32,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        let ratio = ComponentRatio::default();
        Self {
            x: ratio.x().into(),
            y: ratio.y().into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Where the encoder executable is expected.
    pub binary: PathBuf,
    /// Directory the build command runs in.
    pub build_dir: PathBuf,
    /// Program and arguments that produce the encoder.
    pub build_command: Vec<String>,
    /// Where the build leaves the executable before it is moved to `binary`.
    pub build_output: PathBuf,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("blurhash_encoder"),
            build_dir: PathBuf::from("src/C"),
            build_command: vec!["make".to_string(), "blurhash_encoder".to_string()],
            build_output: PathBuf::from("src/C/blurhash_encoder"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period that closes a batch of change events.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

/// Values given on the command line. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub assets: Option<PathBuf>,
    pub extensions: Option<String>,
    pub component_x: Option<u32>,
    pub component_y: Option<u32>,
    pub target: Option<PathBuf>,
}

impl Overrides {
    /// Render the overrides as a TOML table so they merge like any other layer.
    pub fn to_toml(&self) -> toml::Value {
        let mut table = toml::value::Table::new();
        if let Some(assets) = &self.assets {
            table.insert("assets".into(), path_value(assets));
        }
        if let Some(list) = &self.extensions {
            let items = split_list(list)
                .into_iter()
                .map(toml::Value::String)
                .collect();
            table.insert("extensions".into(), toml::Value::Array(items));
        }
        let mut components = toml::value::Table::new();
        if let Some(x) = self.component_x {
            components.insert("x".into(), toml::Value::Integer(x.into()));
        }
        if let Some(y) = self.component_y {
            components.insert("y".into(), toml::Value::Integer(y.into()));
        }
        if !components.is_empty() {
            table.insert("components".into(), toml::Value::Table(components));
        }
        if let Some(target) = &self.target {
            table.insert("target".into(), path_value(target));
        }
        toml::Value::Table(table)
    }
}

fn path_value(path: &Path) -> toml::Value {
    toml::Value::String(path.to_string_lossy().into_owned())
}

/// Immutable, validated configuration shared by every component.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Canonical absolute asset root.
    pub asset_root: PathBuf,
    pub extensions: ExtensionSet,
    pub components: ComponentRatio,
    /// Absolute path of the JSON index.
    pub target: PathBuf,
    pub encoder: EncoderSettings,
    pub debounce: Duration,
}

/// Absolute encoder locations and the build command.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub binary: PathBuf,
    pub build_dir: PathBuf,
    pub build_command: Vec<String>,
    pub build_output: PathBuf,
}

impl HashMapConfig {
    /// Check every value and produce [`Settings`].
    ///
    /// Relative paths are resolved against the working directory. The asset
    /// root must exist and is canonicalized so containment checks compare
    /// like with like.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let mut violations = Vec::new();

        let asset_root = match &self.assets {
            None => {
                violations.push(Violation::new("assets", "an asset root is required"));
                None
            }
            Some(path) => match path.canonicalize() {
                Ok(root) if root.is_dir() => Some(root),
                Ok(_) => {
                    violations.push(Violation::new(
                        "assets",
                        format!("{} is not a directory", path.display()),
                    ));
                    None
                }
                Err(e) => {
                    violations.push(Violation::new(
                        "assets",
                        format!("{}: {e}", path.display()),
                    ));
                    None
                }
            },
        };

        let extensions = ExtensionSet::validate(&self.extensions)
            .map_err(|v| violations.push(v))
            .ok();

        let components = ComponentRatio::new(self.components.x, self.components.y);
        if components.is_none() {
            violations.push(Violation::new(
                "components",
                format!(
                    "x and y must be between {} and {} (got {}x{})",
                    ComponentRatio::MIN,
                    ComponentRatio::MAX,
                    self.components.x,
                    self.components.y
                ),
            ));
        }

        if self.target.extension().and_then(|e| e.to_str()) != Some("json") {
            violations.push(Violation::new(
                "target",
                format!("{} must have a .json extension", self.target.display()),
            ));
        }

        if self.encoder.build_command.is_empty() {
            violations.push(Violation::new(
                "encoder.build_command",
                "must name a program to run",
            ));
        }

        if self.watch.debounce_ms == 0 {
            violations.push(Violation::new("watch.debounce_ms", "must be greater than 0"));
        }

        let (Some(asset_root), Some(extensions), Some(components), true) =
            (asset_root, extensions, components, violations.is_empty())
        else {
            return Err(ConfigError::Invalid(violations));
        };

        Ok(Settings {
            asset_root,
            extensions,
            components,
            target: std::path::absolute(&self.target)?,
            encoder: EncoderSettings {
                binary: std::path::absolute(&self.encoder.binary)?,
                build_dir: std::path::absolute(&self.encoder.build_dir)?,
                build_command: self.encoder.build_command.clone(),
                build_output: std::path::absolute(&self.encoder.build_output)?,
            },
            debounce: Duration::from_millis(self.watch.debounce_ms),
        })
    }
}

// =============================================================================
// Loading and merging
// =============================================================================

/// The stock defaults as a TOML table, the base layer for merging.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(HashMapConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` when it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge the layers and deserialize. Does not validate.
pub fn resolve_config(layers: Vec<toml::Value>) -> Result<HashMapConfig, ConfigError> {
    let merged = layers.into_iter().fold(stock_defaults_value(), merge_toml);
    let config: HashMapConfig = merged.try_into()?;
    Ok(config)
}

/// Load the full configuration: defaults, config file, then overrides.
///
/// An explicitly named config file must exist; the default
/// [`DEFAULT_CONFIG_FILE`] is optional.
pub fn load_config(
    config_file: Option<&Path>,
    overrides: &Overrides,
) -> Result<HashMapConfig, ConfigError> {
    let file_layer = match config_file {
        Some(path) => {
            Some(load_raw_config(path)?.ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))?)
        }
        None => load_raw_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };

    let mut layers = Vec::new();
    layers.extend(file_layer);
    layers.push(overrides.to_toml());
    resolve_config(layers)
}

/// A fully commented `blurhash-map.toml` listing every key and its default.
pub fn stock_config_toml() -> &'static str {
    r##"# blurhash-map configuration
# ===========================
# Place this file next to where you run blurhash-map, or pass --config.
# Command-line flags override values from this file.
# Unknown keys cause an error.

# Directory whose images are kept in sync (required).
# assets = "public/images"

# Image extensions to track. Allowed: jpg, jpeg, png, bmp, webp.
extensions = ["jpg", "jpeg", "png", "bmp", "webp"]

# Where the JSON index of [relativePath, hash] pairs is written.
target = "./hashmap.json"

# ---------------------------------------------------------------------------
# Blur hash resolution
# ---------------------------------------------------------------------------
[components]
# Horizontal and vertical component counts, each 1-9.
x = 4
y = 3

# ---------------------------------------------------------------------------
# External encoder
# ---------------------------------------------------------------------------
[encoder]
# Executable invoked as: <binary> <x> <y> <image>
binary = "blurhash_encoder"
# When the binary is missing it is built here and moved into place.
build_dir = "src/C"
build_command = ["make", "blurhash_encoder"]
build_output = "src/C/blurhash_encoder"

# ---------------------------------------------------------------------------
# Watch mode
# ---------------------------------------------------------------------------
[watch]
# Milliseconds without new events before a batch is processed.
debounce_ms = 500
"##
}
