//! Configuration file (elmod.toml).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use elmod_runtime::{LoadOptions, ScriptPolicy};
use elmod_script::{TransformContext, DEFAULT_RENDERER};
use serde::Deserialize;
use url::Url;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub import_map: HashMap<String, String>,
    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoaderConfig {
    /// Base for relative document locations
    pub base_url: Option<Url>,
    #[serde(default)]
    pub script_policy: ScriptPolicy,
    /// Renderer module specifier
    pub renderer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_output")]
    pub output: String,

    /// Where built documents are served from; defaults to their `file:` URL
    pub base_url: Option<Url>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            output: default_output(),
            base_url: None,
        }
    }
}

fn default_output() -> String {
    "dist/elements".to_string()
}

impl ConfigFile {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            base_url: self.loader.base_url.clone(),
            script_policy: self.loader.script_policy,
            import_map: self.import_map.clone(),
            renderer_specifier: self.renderer(),
        }
    }

    pub fn transform_context(&self) -> TransformContext {
        TransformContext {
            import_map: self.import_map.clone(),
            renderer_specifier: self.renderer(),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.build.output)
    }

    fn renderer(&self) -> String {
        self.loader
            .renderer
            .clone()
            .unwrap_or_else(|| DEFAULT_RENDERER.to_string())
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}
