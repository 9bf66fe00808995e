//! The `load` entry point: fetch a document, compile each definition and
//! register the resulting wrapper classes.

use std::collections::HashMap;
use std::sync::Arc;

use elmod_document::{parse_element_module, Definition, ParseError};
use elmod_script::{ModuleCompiler, ScriptError, TransformContext, DEFAULT_RENDERER};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{DocumentFetcher, FetchError, FileFetcher};
use crate::module::{InProcessModuleLoader, ModuleExports, ModuleLoadError, ModuleLoader};
use crate::registry::{validate_name, ElementRegistry, RegistryError};

/// What to do with a definition that carries more than one inline script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptPolicy {
    /// Fail that definition's validation
    #[default]
    Reject,
    /// Use the first script and discard the rest
    First,
}

/// Options for a single load.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Base for resolving a relative document location
    pub base_url: Option<Url>,

    pub script_policy: ScriptPolicy,

    /// Specifiers left for an import map to resolve
    pub import_map: HashMap<String, String>,

    /// Module the generated code imports its renderer from
    #[serde(alias = "renderer")]
    pub renderer_specifier: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            script_policy: ScriptPolicy::default(),
            import_map: HashMap::new(),
            renderer_specifier: DEFAULT_RENDERER.to_string(),
        }
    }
}

impl LoadOptions {
    fn transform_context(&self) -> TransformContext {
        TransformContext {
            import_map: self.import_map.clone(),
            renderer_specifier: self.renderer_specifier.clone(),
        }
    }
}

/// Errors that abort a whole load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Invalid document location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to parse document: {0}")]
    Parse(#[from] ParseError),

    #[error("Definition {index} ({}) failed: {source}", .tag.as_deref().unwrap_or("unnamed"))]
    Definition {
        index: usize,
        tag: Option<String>,
        #[source]
        source: DefinitionError,
    },
}

/// Why one definition failed. Siblings are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Definition has {0} inline scripts; only one is allowed")]
    MultipleScripts(usize),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Load(#[from] ModuleLoadError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result of processing one definition.
#[derive(Debug, Clone)]
pub enum OutcomeStatus {
    Registered {
        class_name: String,
        module_url: Url,
        imports: Vec<String>,
    },
    /// No tag name: parsed but never registered
    Skipped,
    Failed(DefinitionError),
}

#[derive(Debug, Clone)]
pub struct ComponentOutcome {
    pub index: usize,
    pub tag_name: Option<String>,
    pub status: OutcomeStatus,
}

/// Per-definition outcomes of a load, in document order.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub url: Url,
    pub outcomes: Vec<ComponentOutcome>,
}

impl LoadReport {
    /// Tags registered by this load.
    pub fn registered(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Registered { .. }))
            .filter_map(|o| o.tag_name.as_deref())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ComponentOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Turn the first failed definition into an error.
    pub fn into_result(self) -> Result<Self, LoadError> {
        let failed = self.outcomes.iter().find_map(|o| match &o.status {
            OutcomeStatus::Failed(e) => Some((o.index, o.tag_name.clone(), e.clone())),
            _ => None,
        });

        match failed {
            Some((index, tag, source)) => Err(LoadError::Definition { index, tag, source }),
            None => Ok(self),
        }
    }
}

enum Pending {
    Skipped,
    Failed(DefinitionError),
    Importing(JoinHandle<Result<ModuleExports, ModuleLoadError>>),
}

/// Loads element-module documents into a registry.
pub struct ElementModuleLoader {
    registry: Arc<ElementRegistry>,
    fetcher: Arc<dyn DocumentFetcher>,
    modules: Arc<dyn ModuleLoader>,
}

impl ElementModuleLoader {
    pub fn new(registry: Arc<ElementRegistry>) -> Self {
        Self {
            registry,
            fetcher: Arc::new(FileFetcher),
            modules: Arc::new(InProcessModuleLoader::default()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: impl DocumentFetcher + 'static) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn with_module_loader(mut self, modules: Arc<dyn ModuleLoader>) -> Self {
        self.modules = modules;
        self
    }

    pub fn registry(&self) -> &Arc<ElementRegistry> {
        &self.registry
    }

    /// Load every definition in the document at `location`.
    ///
    /// Fetch and parse failures abort the load. Anything after that fails
    /// per definition and is reported in the returned [`LoadReport`].
    pub async fn load(&self, location: &str, options: &LoadOptions) -> Result<LoadReport, LoadError> {
        let url = resolve_location(location, options.base_url.as_ref())?;
        tracing::info!("Loading {url}");

        let markup = self.fetcher.fetch(&url).await?;
        let document = parse_element_module(&markup)?;
        tracing::info!("Found {} definitions", document.definitions.len());

        let compiler = ModuleCompiler::new(options.transform_context());
        let mut pending = Vec::with_capacity(document.definitions.len());

        for definition in &document.definitions {
            let state = match self.prepare(&compiler, definition, &url, options) {
                Ok(Some(handle)) => Pending::Importing(handle),
                Ok(None) => Pending::Skipped,
                Err(e) => Pending::Failed(e),
            };
            pending.push((definition.index, definition.tag_name().map(str::to_string), state));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (index, tag_name, state) in pending {
            let status = match (state, tag_name.as_deref()) {
                (Pending::Importing(handle), Some(tag)) => self.register(tag, handle).await,
                (Pending::Failed(e), _) => OutcomeStatus::Failed(e),
                _ => OutcomeStatus::Skipped,
            };

            if let OutcomeStatus::Failed(e) = &status {
                tracing::warn!(
                    "Definition {index} <{}> failed: {e}",
                    tag_name.as_deref().unwrap_or("unnamed")
                );
            }
            outcomes.push(ComponentOutcome {
                index,
                tag_name,
                status,
            });
        }

        Ok(LoadReport { url, outcomes })
    }

    /// Validate and compile a definition, then start its import.
    fn prepare(
        &self,
        compiler: &ModuleCompiler,
        definition: &Definition,
        url: &Url,
        options: &LoadOptions,
    ) -> Result<Option<JoinHandle<Result<ModuleExports, ModuleLoadError>>>, DefinitionError> {
        if definition.tag_name().is_none() {
            tracing::debug!("Skipping unnamed definition {}", definition.index);
            return Ok(None);
        }

        validate_definition(definition, options.script_policy)?;

        let module = compiler.compile(definition, url)?;
        let modules = Arc::clone(&self.modules);
        Ok(Some(tokio::spawn(async move { modules.import(&module).await })))
    }

    async fn register(
        &self,
        tag: &str,
        handle: JoinHandle<Result<ModuleExports, ModuleLoadError>>,
    ) -> OutcomeStatus {
        let exports = match handle.await {
            Ok(Ok(exports)) => exports,
            Ok(Err(e)) => return OutcomeStatus::Failed(e.into()),
            Err(e) => return OutcomeStatus::Failed(ModuleLoadError::Aborted(e.to_string()).into()),
        };

        let class_name = exports.default.name().to_string();
        match self.registry.define(tag, exports.default) {
            Ok(()) => OutcomeStatus::Registered {
                class_name,
                module_url: exports.url,
                imports: exports.imports,
            },
            Err(e) => OutcomeStatus::Failed(e.into()),
        }
    }
}

/// Check a definition before it is compiled: its tag must be a valid
/// custom element name and its script count must satisfy `policy`.
/// Unnamed definitions pass; they are never registered.
pub fn validate_definition(
    definition: &Definition,
    policy: ScriptPolicy,
) -> Result<(), DefinitionError> {
    if let Some(tag) = definition.tag_name() {
        validate_name(tag)?;
    }
    if policy == ScriptPolicy::Reject && definition.script_count > 1 {
        return Err(DefinitionError::MultipleScripts(definition.script_count));
    }
    Ok(())
}

/// Resolve a document location: an absolute URL, a URL relative to
/// `base`, or a filesystem path.
pub fn resolve_location(location: &str, base: Option<&Url>) -> Result<Url, LoadError> {
    let invalid = |reason: String| LoadError::InvalidLocation {
        location: location.to_string(),
        reason,
    };

    match Url::parse(location) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(location).map_err(|e| invalid(e.to_string())),
            None => {
                let cwd = std::env::current_dir().map_err(|e| invalid(e.to_string()))?;
                Url::from_file_path(cwd.join(location))
                    .map_err(|_| invalid("not an absolute file path".to_string()))
            }
        },
        Err(e) => Err(invalid(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementError, LifecycleState};
    use crate::fetch::MemoryFetcher;
    use crate::module::BlobStore;
    use elmod_document::ShadowMode;
    use elmod_script::ATTACH_SHADOW_BLOCKED;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    const DOC_URL: &str = "https://ex.com/a/doc.html";

    struct Harness {
        loader: ElementModuleLoader,
        blobs: Arc<BlobStore>,
    }

    fn harness(markup: &str) -> Harness {
        let blobs = Arc::new(BlobStore::new());
        let modules = InProcessModuleLoader::default().with_blob_store(Arc::clone(&blobs));
        let fetcher = MemoryFetcher::new().with_document(Url::parse(DOC_URL).unwrap(), markup);
        let loader = ElementModuleLoader::new(Arc::new(ElementRegistry::new()))
            .with_fetcher(fetcher)
            .with_module_loader(Arc::new(modules));
        Harness { loader, blobs }
    }

    async fn load(markup: &str) -> (Harness, LoadReport) {
        let harness = harness(markup);
        let report = harness
            .loader
            .load(DOC_URL, &LoadOptions::default())
            .await
            .unwrap();
        (harness, report)
    }

    #[tokio::test]
    async fn scriptless_definition_renders_template() {
        let (harness, report) = load(r#"<element name="say-hi"><p>hi</p></element>"#).await;
        let registry = harness.loader.registry();

        assert!(report.is_success());
        assert!(registry.contains("say-hi"));

        let class = registry.get("say-hi").unwrap();
        assert!(class.prototype_chain().contains(&"HTMLElement".to_string()));

        let element = registry.create_element("say-hi").unwrap();
        let root = element.shadow_root().unwrap();
        assert_eq!(root.mode(), ShadowMode::Open);
        assert_eq!(root.to_html(), "<p>hi</p>");
    }

    #[tokio::test]
    async fn closed_definition_resolves_relative_import() {
        let (harness, report) = load(
            r#"<element name="x-closed" shadowmode="closed"><script>import './x.js'</script><b>closed</b></element>"#,
        )
        .await;

        match &report.outcomes[0].status {
            OutcomeStatus::Registered { imports, .. } => {
                assert!(imports.contains(&"https://ex.com/a/x.js".to_string()));
            }
            other => panic!("expected registration, got {other:?}"),
        }

        let element = harness.loader.registry().create_element("x-closed").unwrap();
        assert!(element.shadow_root().is_none());
        let root = element.internals().unwrap().shadow_root().unwrap();
        assert_eq!(root.mode(), ShadowMode::Closed);
        assert_eq!(root.to_html(), "<b>closed</b>");
    }

    #[tokio::test]
    async fn author_attach_shadow_fails_at_construction() {
        let (harness, report) = load(
            r#"<element name="x-rogue"><script>
export default class extends HTMLElement {
  constructor() {
    super();
    this.attachShadow({mode:'open'});
  }
}
</script></element>"#,
        )
        .await;

        assert_eq!(report.registered(), vec!["x-rogue"]);

        let err = harness.loader.registry().create_element("x-rogue").unwrap_err();
        assert_eq!(
            err,
            RegistryError::Element(ElementError::Type(ATTACH_SHADOW_BLOCKED.to_string()))
        );
    }

    #[tokio::test]
    async fn author_root_creation_fails_in_every_form_and_mode() {
        let (harness, report) = load(concat!(
            r#"<element name="x-assigned"><script>
export default class extends HTMLElement {
  constructor() {
    super();
    this.root = this.attachShadow({ mode: 'open' });
  }
}
</script></element>"#,
            r#"<element name="x-declared" shadowmode="closed"><script>
export default class extends HTMLElement {
  constructor() {
    super();
    const root = this.attachShadow({ mode: 'closed' });
    root.innerHTML = '<p>mine</p>';
  }
}
</script></element>"#,
            r#"<element name="x-field"><script>
export default class extends HTMLElement {
  root = this.attachShadow({ mode: 'closed' });
}
</script></element>"#,
            r#"<element name="x-closed-rogue" shadowmode="closed"><script>
export default class extends HTMLElement {
  constructor() {
    super();
    this.attachShadow({ mode: 'closed' });
  }
}
</script></element>"#,
        ))
        .await;

        let tags = ["x-assigned", "x-declared", "x-field", "x-closed-rogue"];
        assert_eq!(report.registered(), tags.to_vec());

        let registry = harness.loader.registry();
        for tag in tags {
            assert_eq!(
                registry.create_element(tag).unwrap_err(),
                RegistryError::Element(ElementError::Type(ATTACH_SHADOW_BLOCKED.to_string())),
                "<{tag}> should reject author root creation"
            );
        }
    }

    #[tokio::test]
    async fn base_class_declared_in_script_registers() {
        let (harness, report) = load(
            r#"<element name="x-local"><script>
class Base extends HTMLElement {}
export default class Local extends Base {}
</script><p>local</p></element>"#,
        )
        .await;

        assert!(report.is_success());
        let class = harness.loader.registry().get("x-local").unwrap();
        assert_eq!(class.prototype_chain(), vec!["Local", "Local", "Base", "HTMLElement"]);
        let element = harness.loader.registry().create_element("x-local").unwrap();
        assert_eq!(element.shadow_root().unwrap().to_html(), "<p>local</p>");
    }

    #[tokio::test]
    async fn every_import_revokes_its_blob() {
        let (harness, report) = load(concat!(
            r#"<element name="x-one"><p>1</p></element>"#,
            r#"<element name="x-two"><script>export default class extends HTMLElement { oops( }</script></element>"#,
            r#"<element name="x-three"><p>3</p></element>"#,
        ))
        .await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(harness.blobs.created(), 3);
        assert!(harness.blobs.is_empty());
    }

    #[tokio::test]
    async fn failed_definition_does_not_block_siblings() {
        let (harness, report) = load(concat!(
            r#"<element name="x-ok-first"><p>1</p></element>"#,
            r#"<element name="x-bad"><script>export default class extends Missing {}</script></element>"#,
            r#"<element name="x-ok-last"><p>3</p></element>"#,
        ))
        .await;

        assert_eq!(report.registered(), vec!["x-ok-first", "x-ok-last"]);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0].status,
            OutcomeStatus::Failed(DefinitionError::Load(ModuleLoadError::Evaluation(msg)))
                if msg == "Missing is not defined"
        ));
        assert!(!harness.loader.registry().contains("x-bad"));
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn duplicate_tags_are_reported() {
        let (harness, report) = load(concat!(
            r#"<element name="x-dup"><p>first</p></element>"#,
            r#"<element name="x-dup"><p>second</p></element>"#,
        ))
        .await;

        assert!(matches!(report.outcomes[0].status, OutcomeStatus::Registered { .. }));
        assert!(matches!(
            &report.outcomes[1].status,
            OutcomeStatus::Failed(DefinitionError::Registry(RegistryError::AlreadyDefined(tag)))
                if tag == "x-dup"
        ));

        let element = harness.loader.registry().create_element("x-dup").unwrap();
        assert_eq!(element.shadow_root().unwrap().to_html(), "<p>first</p>");
    }

    #[tokio::test]
    async fn unnamed_definitions_are_skipped() {
        let (harness, report) = load("<element><p>anonymous</p></element>").await;

        assert!(matches!(report.outcomes[0].status, OutcomeStatus::Skipped));
        assert!(harness.loader.registry().is_empty());
        assert_eq!(harness.blobs.created(), 0);
    }

    #[tokio::test]
    async fn multiple_scripts_follow_policy() {
        let markup = r#"<element name="x-two-scripts"><script>const a = 1</script><script>const b = 2</script></element>"#;

        let harness_reject = harness(markup);
        let report = harness_reject
            .loader
            .load(DOC_URL, &LoadOptions::default())
            .await
            .unwrap();
        assert!(matches!(
            report.outcomes[0].status,
            OutcomeStatus::Failed(DefinitionError::MultipleScripts(2))
        ));

        let harness_first = harness(markup);
        let options = LoadOptions {
            script_policy: ScriptPolicy::First,
            ..Default::default()
        };
        let report = harness_first.loader.load(DOC_URL, &options).await.unwrap();
        assert_eq!(report.registered(), vec!["x-two-scripts"]);
    }

    #[tokio::test]
    async fn invalid_names_and_modes_fail_validation() {
        let (_harness, report) = load(concat!(
            r#"<element name="nohyphen"></element>"#,
            r#"<element name="x-mode" shadowmode="sideways"></element>"#,
        ))
        .await;

        assert!(matches!(
            report.outcomes[0].status,
            OutcomeStatus::Failed(DefinitionError::Registry(RegistryError::InvalidName { .. }))
        ));
        assert!(matches!(
            report.outcomes[1].status,
            OutcomeStatus::Failed(DefinitionError::Script(ScriptError::Attribute(_)))
        ));
    }

    #[tokio::test]
    async fn loading_two_documents_keeps_classes_independent() {
        let first = Url::parse("https://ex.com/one.html").unwrap();
        let second = Url::parse("https://ex.com/two.html").unwrap();
        let fetcher = MemoryFetcher::new()
            .with_document(first.clone(), r#"<element name="x-one"><p>one</p></element>"#)
            .with_document(second.clone(), r#"<element name="x-two"><p>two</p></element>"#);
        let loader = ElementModuleLoader::new(Arc::new(ElementRegistry::new())).with_fetcher(fetcher);

        loader.load(first.as_str(), &LoadOptions::default()).await.unwrap();
        loader.load(second.as_str(), &LoadOptions::default()).await.unwrap();

        let registry = loader.registry();
        let one = registry.get("x-one").unwrap();
        let two = registry.get("x-two").unwrap();
        assert!(!Arc::ptr_eq(&one, &two));

        let a = registry.create_element("x-one").unwrap();
        let b = registry.create_element("x-two").unwrap();
        assert_eq!(a.state(), LifecycleState::Ready);
        assert_eq!(b.shadow_root().unwrap().to_html(), "<p>two</p>");
        assert!(!a.root_creation_permitted() && !b.root_creation_permitted());
    }

    #[tokio::test]
    async fn loads_from_relative_file_location() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("components.html"),
            r#"<element name="x-file"><p>from disk</p></element>"#,
        )
        .unwrap();

        let base = Url::from_directory_path(temp.path()).unwrap();
        let options = LoadOptions {
            base_url: Some(base),
            ..Default::default()
        };
        let loader = ElementModuleLoader::new(Arc::new(ElementRegistry::new()));

        let report = loader.load("components.html", &options).await.unwrap();

        assert_eq!(report.url.scheme(), "file");
        assert_eq!(report.registered(), vec!["x-file"]);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_load() {
        let loader = ElementModuleLoader::new(Arc::new(ElementRegistry::new()))
            .with_fetcher(MemoryFetcher::new());

        let result = loader.load(DOC_URL, &LoadOptions::default()).await;

        assert!(matches!(result, Err(LoadError::Fetch(FetchError::NotFound(_)))));
    }

    #[test]
    fn validate_definition_applies_name_and_policy() {
        let document = parse_element_module(concat!(
            r#"<element name="x-ok"><script>const a = 1</script></element>"#,
            r#"<element name="x-two"><script>const a = 1</script><script>const b = 2</script></element>"#,
            r#"<element name="font-face"></element>"#,
            "<element></element>",
        ))
        .unwrap();
        let defs = &document.definitions;

        assert_eq!(validate_definition(&defs[0], ScriptPolicy::Reject), Ok(()));
        assert_eq!(
            validate_definition(&defs[1], ScriptPolicy::Reject),
            Err(DefinitionError::MultipleScripts(2))
        );
        assert_eq!(validate_definition(&defs[1], ScriptPolicy::First), Ok(()));
        assert!(matches!(
            validate_definition(&defs[2], ScriptPolicy::First),
            Err(DefinitionError::Registry(RegistryError::InvalidName { .. }))
        ));
        assert_eq!(validate_definition(&defs[3], ScriptPolicy::Reject), Ok(()));
    }

    #[test]
    fn options_deserialize_from_toml_shape() {
        let options: LoadOptions = serde_json::from_str(
            r#"{"base_url": "https://ex.com/", "script_policy": "first", "renderer": "lit-html"}"#,
        )
        .unwrap();

        assert_eq!(options.script_policy, ScriptPolicy::First);
        assert_eq!(options.renderer_specifier, "lit-html");
        assert_eq!(options.base_url.unwrap().as_str(), "https://ex.com/");
    }
}
