//! Ahead-of-time module builder.
//!
//! Compiles every named definition in one or more element-module documents
//! into a standalone `<tag>.js` module, plus a `manifest.json` index.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use elmod_document::parse_element_module;
use elmod_runtime::{validate_definition, ScriptPolicy};
use elmod_script::{ModuleCompiler, TransformContext};
use rayon::prelude::*;
use serde::Serialize;
use url::Url;
use walkdir::WalkDir;

/// Configuration for a build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// A document, or a directory searched for `.html` documents
    pub input: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    pub transform: TransformContext,

    /// What to do with definitions that carry several scripts
    pub script_policy: ScriptPolicy,

    /// Where the documents will be served from. Relative module paths are
    /// resolved against it instead of the local `file:` location.
    pub base_url: Option<Url>,
}

/// Errors that can occur during a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read: {0}")]
    ReadError(String),

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Invalid definition <{tag}> in {path}: {message}")]
    InvalidDefinition {
        path: String,
        tag: String,
        message: String,
    },

    #[error("Failed to compile <{tag}> in {path}: {message}")]
    CompileError {
        path: String,
        tag: String,
        message: String,
    },

    #[error("Failed to write: {0}")]
    WriteError(String),
}

/// Result of a build.
#[derive(Debug)]
pub struct BuildResult {
    pub documents: usize,
    pub modules: usize,
    pub duration_ms: u64,
    pub output_dir: PathBuf,
}

/// One manifest entry per written module.
#[derive(Debug, Serialize)]
struct ManifestEntry {
    tag: String,
    class_name: String,
    module: String,
    source: String,
    exported: bool,
}

/// Builds element modules from documents.
pub struct ModuleBuilder {
    config: BuildConfig,
    compiler: ModuleCompiler,
}

impl ModuleBuilder {
    pub fn new(config: BuildConfig) -> Self {
        let compiler = ModuleCompiler::new(config.transform.clone());
        Self { config, compiler }
    }

    /// Build all documents.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let documents = self.discover_documents()?;

        // Compile documents in parallel
        let results: Vec<Result<Vec<ManifestEntry>, BuildError>> = documents
            .par_iter()
            .map(|path| self.build_document(path))
            .collect();

        let mut manifest = Vec::new();
        for result in results {
            manifest.extend(result?);
        }
        manifest.sort_by(|a, b| a.tag.cmp(&b.tag));

        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;
        fs::write(self.config.output_dir.join("manifest.json"), json)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        Ok(BuildResult {
            documents: documents.len(),
            modules: manifest.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Find the documents to compile.
    fn discover_documents(&self) -> Result<Vec<PathBuf>, BuildError> {
        let input = &self.config.input;
        if input.is_file() {
            return Ok(vec![input.clone()]);
        }
        if !input.is_dir() {
            return Err(BuildError::ReadError(format!(
                "Input not found: {}",
                input.display()
            )));
        }

        let mut documents: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file())
            .filter(|path| {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                ext == "html" || ext == "htm"
            })
            .filter(|path| !path.starts_with(&self.config.output_dir))
            .collect();
        documents.sort();

        Ok(documents)
    }

    fn build_document(&self, path: &Path) -> Result<Vec<ManifestEntry>, BuildError> {
        let content = fs::read_to_string(path)
            .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;

        let document = parse_element_module(&content).map_err(|e| BuildError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let url = self.document_url(path)?;
        let mut entries = Vec::new();

        for definition in document.named() {
            let tag = definition.tag_name().unwrap_or_default().to_string();
            validate_definition(definition, self.config.script_policy).map_err(|e| {
                BuildError::InvalidDefinition {
                    path: path.display().to_string(),
                    tag: tag.clone(),
                    message: e.to_string(),
                }
            })?;

            let module = self
                .compiler
                .compile(definition, &url)
                .map_err(|e| BuildError::CompileError {
                    path: path.display().to_string(),
                    tag: tag.clone(),
                    message: e.to_string(),
                })?;

            let file_name = format!("{tag}.js");
            fs::write(self.config.output_dir.join(&file_name), &module.source)
                .map_err(|e| BuildError::WriteError(format!("{file_name}: {e}")))?;
            tracing::debug!("Wrote {file_name}");

            entries.push(ManifestEntry {
                tag,
                class_name: module.class_name,
                module: file_name,
                source: url.to_string(),
                exported: module.exported,
            });
        }

        Ok(entries)
    }

    /// Location a document's scripts are rewritten against.
    fn document_url(&self, path: &Path) -> Result<Url, BuildError> {
        let Some(base) = &self.config.base_url else {
            return file_url(path);
        };

        let input = &self.config.input;
        let root = if input.is_dir() {
            input.as_path()
        } else {
            input.parent().unwrap_or(Path::new(""))
        };
        let relative = path.strip_prefix(root).map_err(|_| {
            BuildError::ReadError(format!("{} is outside {}", path.display(), root.display()))
        })?;

        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        base.join(&segments.join("/"))
            .map_err(|e| BuildError::ReadError(format!("{}: {e}", path.display())))
    }
}

fn file_url(path: &Path) -> Result<Url, BuildError> {
    let absolute = fs::canonicalize(path)
        .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;
    Url::from_file_path(&absolute)
        .map_err(|_| BuildError::ReadError(format!("Not a file path: {}", absolute.display())))
}
