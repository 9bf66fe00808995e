//! Initialize element modules in a project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command in `dir`.
pub fn run(dir: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing elmod...");

    let config_path = dir.join("elmod.toml");
    if config_path.exists() && !yes {
        tracing::warn!("elmod.toml already exists. Use --yes to overwrite.");
        return Ok(());
    }

    fs::write(&config_path, DEFAULT_CONFIG).context("Failed to write elmod.toml")?;
    tracing::info!("Created elmod.toml");

    let components_path = dir.join("components.html");
    if !components_path.exists() || yes {
        fs::write(&components_path, DEFAULT_COMPONENTS)
            .context("Failed to write components.html")?;
        tracing::info!("Created components.html");
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'elmod load components.html --instantiate' to try it.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# elmod configuration

[loader]
# Base for relative document locations
# base_url = "https://example.com/app/"

# What to do with more than one <script> per definition: "reject" or "first"
script_policy = "reject"

# Module the generated code imports `html` from
renderer = "pota/src/renderer/@main.js"

[import_map]
# Relative specifiers listed here are left for the page's import map
# "./shared.js" = "/vendor/shared.js"

[build]
# Output directory for `elmod build`
output = "dist/elements"

# Where built documents are served from (end with "/"); relative imports
# in built modules resolve against it instead of local file: URLs
# base_url = "https://cdn.example.com/elements/"
"#;

const DEFAULT_COMPONENTS: &str = r#"<!doctype html>
<title>Components</title>

<element name="say-hi">
  <p>hi</p>
</element>

<element name="user-card" shadowmode="closed">
  <script>
    export default class UserCard extends HTMLElement {
      constructor() {
        super();
        this.setAttribute('role', 'article');
      }
    }
  </script>
  <style>
    :host { display: block; }
  </style>
  <h2>{{ name }}</h2>
</element>
"#;
