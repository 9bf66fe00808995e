//! Runtime for element modules.
//!
//! Loads a document of `<element>` definitions, imports each compiled
//! module, and registers the generated wrapper classes. Instances built by
//! a wrapper class get exactly one encapsulated root, created by the
//! wrapper itself before author code can observe the element.

pub mod class;
pub mod element;
pub mod fetch;
pub mod loader;
pub mod module;
pub mod registry;
pub mod renderer;

pub use class::{AuthorClass, ElementBehavior, ElementClass, NoopBehavior, ScriptBehavior};
pub use element::{
    Element, ElementError, ElementId, ElementInternals, LifecycleState, RootCapability,
    ShadowRoot, ShadowRootInit,
};
pub use fetch::{DocumentFetcher, FetchError, FileFetcher, MemoryFetcher};
pub use loader::{
    resolve_location, validate_definition, ComponentOutcome, DefinitionError, ElementModuleLoader, LoadError,
    LoadOptions, LoadReport, OutcomeStatus, ScriptPolicy,
};
pub use module::{BlobStore, BlobUrl, InProcessModuleLoader, ModuleExports, ModuleLoadError, ModuleLoader};
pub use registry::{validate_name, ElementRegistry, RegistryError};
pub use renderer::{Bindings, MarkupRenderer, RenderError, TemplateRenderer};
