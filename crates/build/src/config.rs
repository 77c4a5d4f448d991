//! Build configuration
//!
//! One explicit `Config` value is loaded per build and passed by reference
//! into each component's entry point. Settings come from `config.yml` in the
//! demo directory, with `config.local.yml` deep-merged on top for per-machine
//! overrides (tool paths, mostly). Command-line switches are applied onto the
//! loaded value by the caller.

use serde::Deserialize;
use serde_norway::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// Root of the configuration tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Demo directory the configuration was loaded from.
    #[serde(skip)]
    pub directory: PathBuf,

    /// Build a debugging version.
    pub debug: bool,
    /// Run the external shader minifier.
    pub minify: bool,
    /// Capture-mode settings; present when building for video capture.
    pub capture: Option<CaptureConfig>,

    pub demo: DemoConfig,
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
}

/// Settings describing the demo itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DemoConfig {
    /// Name of the demo; used for artifact names.
    pub name: String,
    pub resolution: ResolutionConfig,
    /// Duration in seconds, when the demo should close itself.
    pub duration: Option<f64>,
    pub close_when_finished: bool,
    pub loading_black_screen: bool,
    /// Hook source file, relative to the demo directory.
    pub hooks: String,
    pub shader_provider: ShaderProviderConfig,
    pub shader_minifier: ShaderMinifierConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            resolution: ResolutionConfig::default(),
            duration: None,
            close_when_finished: false,
            loading_black_screen: false,
            hooks: "hooks.cpp".to_string(),
            shader_provider: ShaderProviderConfig::default(),
            shader_minifier: ShaderMinifierConfig::default(),
        }
    }
}

/// Fixed rendering resolution; when unset the demo adapts to the display.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResolutionConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
}

impl ResolutionConfig {
    /// Returns the fixed resolution, when both dimensions are configured.
    pub fn fixed(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            _ => None,
        }
    }
}

/// Video capture settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { width: 1920, height: 1080, fps: 60 }
    }
}

/// Shader provider selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ShaderProviderConfig {
    /// Provider implementation: `simple` or `synthclipse`.
    pub tool: String,
    /// Shader source file, relative to the demo directory.
    pub filename: String,
    /// Constants preset to pick for synthclipse sources.
    pub constants_preset: String,
}

impl Default for ShaderProviderConfig {
    fn default() -> Self {
        Self {
            tool: "simple".to_string(),
            filename: "shader.frag".to_string(),
            constants_preset: "Default".to_string(),
        }
    }
}

/// Shader minifier selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ShaderMinifierConfig {
    /// Minifier implementation; only `shader-minifier` is supported.
    pub tool: String,
}

impl Default for ShaderMinifierConfig {
    fn default() -> Self {
        Self { tool: "shader-minifier".to_string() }
    }
}

/// Output locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PathsConfig {
    /// Intermediate artifacts (generated sources, minifier exchange files).
    pub build: PathBuf,
    /// Final artifacts.
    pub dist: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { build: PathBuf::from("build"), dist: PathBuf::from("dist") }
    }
}

/// External tool locations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ToolsConfig {
    /// Shader Minifier executable.
    pub shader_minifier: Option<PathBuf>,
    /// Mono runtime used to host it on non-Windows platforms.
    pub mono: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration for the demo in `directory`.
    ///
    /// `config.yml` is required; `config.local.yml` is merged on top when
    /// present, mappings recursively and everything else by replacement.
    ///
    /// # Errors
    /// I/O errors reading the files and [`BuildError::Yaml`] on parse
    /// failures.
    pub fn load(directory: &Path) -> Result<Self, BuildError> {
        if !directory.is_dir() {
            return Err(BuildError::Config(format!("demo directory {} does not exist", directory.display())));
        }

        let mut value: Value = serde_norway::from_str(&fs::read_to_string(directory.join("config.yml"))?)?;

        let local_path = directory.join("config.local.yml");
        if local_path.exists() {
            let local: Value = serde_norway::from_str(&fs::read_to_string(&local_path)?)?;
            merge_value(&mut value, local);
        }

        let mut config: Config = serde_norway::from_value(value)?;
        config.directory = directory.to_path_buf();
        Ok(config)
    }

    /// Parses a configuration from YAML text. The demo directory is left
    /// empty; callers set it when files are involved.
    pub fn from_yaml(contents: &str) -> Result<Self, BuildError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Whether the shader renders at a fixed resolution: capture mode, or an
    /// explicitly configured width and height.
    pub fn force_resolution(&self) -> bool {
        self.capture.is_some() || self.demo.resolution.fixed().is_some()
    }

    /// Checks the mode-dependent required settings.
    ///
    /// # Errors
    /// [`BuildError::Config`] naming the first missing or invalid key.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.demo.name.is_empty() {
            return Err(BuildError::Config("demo.name is required".to_string()));
        }
        match self.demo.shader_provider.tool.as_str() {
            "simple" | "synthclipse" => {}
            other => {
                return Err(BuildError::Config(format!("demo.shader-provider.tool {other:?} is not valid")));
            }
        }
        if self.minify {
            if self.demo.shader_minifier.tool != "shader-minifier" {
                return Err(BuildError::Config(format!(
                    "demo.shader-minifier.tool {:?} is not valid",
                    self.demo.shader_minifier.tool
                )));
            }
            if self.tools.shader_minifier.is_none() {
                return Err(BuildError::Config("tools.shader-minifier is required to minify".to_string()));
            }
        }
        Ok(())
    }
}

/// Merges `overlay` into `base`: mappings recursively, everything else by
/// replacement.
fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay) => *base_slot = overlay,
    }
}
