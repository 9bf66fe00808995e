//! Ahead-of-time build command.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::{BuildConfig, ModuleBuilder};
use crate::config::ConfigFile;

/// Run the build command.
pub fn run(path: PathBuf, output: Option<PathBuf>, config: &ConfigFile) -> Result<()> {
    tracing::info!("Building element modules from {}...", path.display());

    let build_config = BuildConfig {
        input: path,
        output_dir: output.unwrap_or_else(|| config.output_dir()),
        transform: config.transform_context(),
        script_policy: config.loader.script_policy,
        base_url: config.build.base_url.clone(),
    };

    let result = ModuleBuilder::new(build_config).build()?;

    tracing::info!(
        "Built {} modules from {} documents in {}ms",
        result.modules,
        result.documents,
        result.duration_ms
    );
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
