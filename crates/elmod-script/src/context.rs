//! Transform context and errors shared by the script stages.

use std::collections::HashMap;

use elmod_document::AttributeError;

use crate::analysis::AnalysisError;

/// Module that provides the `html` template function to generated code.
pub const DEFAULT_RENDERER: &str = "pota/src/renderer/@main.js";

/// Context for compiling a definition into an element module.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Import map entries: specifiers listed here are left for the import
    /// map to resolve, even when relative
    pub import_map: HashMap<String, String>,

    /// Specifier the generated module imports `html` from
    pub renderer_specifier: String,
}

impl Default for TransformContext {
    fn default() -> Self {
        Self {
            import_map: HashMap::new(),
            renderer_specifier: DEFAULT_RENDERER.to_string(),
        }
    }
}

impl TransformContext {
    /// Whether an import map entry claims this specifier.
    pub fn is_mapped(&self, specifier: &str) -> bool {
        self.import_map.contains_key(specifier)
    }
}

/// Errors that can occur while compiling a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("Definition {0} has no tag name")]
    MissingTagName(usize),

    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("No default class header found in module source")]
    MissingDefaultClass,

    #[error("Module analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}
