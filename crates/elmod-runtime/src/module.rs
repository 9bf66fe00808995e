//! Dynamic loading of synthesized element modules.
//!
//! Each import materializes the module source as a transient `blob:`
//! resource, instantiates it and revokes the resource again, whether or not
//! the import succeeded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use elmod_script::generator::AUTHOR_CLASS;
use elmod_script::{
    analyze_module, AnalysisError, ClassShape, ConstructorEffect, SynthesizedModule, PLATFORM_BASE,
};
use url::Url;

use crate::class::{AuthorClass, ElementBehavior, ElementClass, ScriptBehavior};
use crate::renderer::{MarkupRenderer, TemplateRenderer};

/// Errors that can occur while importing a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleLoadError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("ReferenceError: {0}")]
    Evaluation(String),

    #[error("Module {0} has no default class export")]
    MissingDefaultExport(Url),

    #[error("Import aborted: {0}")]
    Aborted(String),
}

impl From<AnalysisError> for ModuleLoadError {
    fn from(err: AnalysisError) -> Self {
        ModuleLoadError::Syntax(err.to_string())
    }
}

/// What an imported element module exposes.
#[derive(Debug, Clone)]
pub struct ModuleExports {
    /// Address the module was loaded from
    pub url: Url,

    /// Static imports of the module
    pub imports: Vec<String>,

    /// The default export: the wrapper class
    pub default: Arc<ElementClass>,
}

/// Instantiates synthesized modules.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn import(&self, module: &SynthesizedModule) -> Result<ModuleExports, ModuleLoadError>;
}

/// Transient, addressable module sources.
#[derive(Debug, Default)]
pub struct BlobStore {
    entries: Mutex<HashMap<Url, String>>,
    next: AtomicU64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `source` under a fresh `blob:` URL. The URL is revoked when the
    /// returned guard drops.
    pub fn create(&self, source: &str) -> Result<BlobUrl<'_>, ModuleLoadError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let url = Url::parse(&format!("blob:elmod/{n}"))
            .map_err(|e| ModuleLoadError::Aborted(e.to_string()))?;

        self.lock().insert(url.clone(), source.to_string());
        Ok(BlobUrl { store: self, url })
    }

    pub fn read(&self, url: &Url) -> Option<String> {
        self.lock().get(url).cloned()
    }

    pub fn revoke(&self, url: &Url) -> bool {
        self.lock().remove(url).is_some()
    }

    /// Number of live (unrevoked) URLs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total URLs created so far.
    pub fn created(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Url, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A live blob URL, revoked on drop.
#[derive(Debug)]
pub struct BlobUrl<'a> {
    store: &'a BlobStore,
    url: Url,
}

impl BlobUrl<'_> {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Drop for BlobUrl<'_> {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}

/// Loads modules in-process from their analyzed source.
#[derive(Debug)]
pub struct InProcessModuleLoader {
    blobs: Arc<BlobStore>,
    renderer: Arc<dyn TemplateRenderer>,
    bases: HashMap<String, Arc<AuthorClass>>,
}

impl Default for InProcessModuleLoader {
    fn default() -> Self {
        Self::new(Arc::new(MarkupRenderer::new()))
    }
}

impl InProcessModuleLoader {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            blobs: Arc::new(BlobStore::new()),
            renderer,
            bases: HashMap::new(),
        }
    }

    /// Make a base class available to scripts under `name`.
    pub fn with_base(mut self, name: impl Into<String>, class: Arc<AuthorClass>) -> Self {
        self.bases.insert(name.into(), class);
        self
    }

    pub fn with_blob_store(mut self, blobs: Arc<BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    /// Resolve a base class name: the platform base, a class declared in
    /// the module itself, or one registered with [`with_base`].
    ///
    /// [`with_base`]: Self::with_base
    fn resolve_base(
        &self,
        base: &str,
        classes: &HashMap<String, ClassShape>,
        resolving: &mut Vec<String>,
    ) -> Result<Option<Arc<AuthorClass>>, ModuleLoadError> {
        if base == PLATFORM_BASE {
            return Ok(None);
        }

        let Some(local) = classes.get(base) else {
            return self
                .bases
                .get(base)
                .cloned()
                .map(Some)
                .ok_or_else(|| ModuleLoadError::Evaluation(format!("{base} is not defined")));
        };

        if resolving.iter().any(|name| name == base) {
            return Err(ModuleLoadError::Evaluation(format!(
                "Cannot access '{base}' before initialization"
            )));
        }
        let Some(parent) = local.base.as_deref() else {
            return Err(ModuleLoadError::Evaluation(format!(
                "{base} does not extend {PLATFORM_BASE}"
            )));
        };

        resolving.push(base.to_string());
        let parent = self.resolve_base(parent, classes, resolving)?;
        resolving.pop();

        Ok(Some(Arc::new(author_class(base, parent, &local.constructor))))
    }
}

fn author_class(
    name: &str,
    base: Option<Arc<AuthorClass>>,
    constructor: &[ConstructorEffect],
) -> AuthorClass {
    let behavior: Arc<dyn ElementBehavior> = Arc::new(ScriptBehavior::new(constructor.to_vec()));
    match base {
        Some(base) => AuthorClass::extending(name, base, behavior),
        None => AuthorClass::new(name, behavior),
    }
}

#[async_trait]
impl ModuleLoader for InProcessModuleLoader {
    async fn import(&self, module: &SynthesizedModule) -> Result<ModuleExports, ModuleLoadError> {
        let blob = self.blobs.create(&module.source)?;
        let url = blob.url().clone();
        let source = self
            .blobs
            .read(&url)
            .ok_or_else(|| ModuleLoadError::Aborted(format!("{url} was revoked")))?;

        let shape = analyze_module(&source)?;
        if shape.default_exports == 0 || shape.default_class.is_none() {
            return Err(ModuleLoadError::MissingDefaultExport(url));
        }

        let author = shape
            .author
            .as_ref()
            .ok_or_else(|| ModuleLoadError::Evaluation(format!("{AUTHOR_CLASS} is not defined")))?;
        let mut resolving = vec![module.binding.clone()];
        let base = self.resolve_base(
            author.base.as_deref().unwrap_or(PLATFORM_BASE),
            &shape.classes,
            &mut resolving,
        )?;
        let author = author_class(&module.class_name, base, &author.constructor);

        let class = ElementClass::new(
            module.class_name.clone(),
            Arc::new(author),
            module.template.clone(),
            module.shadow_mode,
            Arc::clone(&self.renderer),
        );
        tracing::debug!("Imported <{}> from {url}", module.tag_name);

        Ok(ModuleExports {
            url,
            imports: shape.imports,
            default: Arc::new(class),
        })
    }
}
