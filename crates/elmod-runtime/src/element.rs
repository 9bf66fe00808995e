//! Element instances and their encapsulated roots.
//!
//! A managed element (one built by a wrapper class) holds a
//! [`RootCapability`] issued at creation. The capability is consumed by the
//! single internal attachment step, which is the only way a managed element
//! ever gets a root. Unmanaged elements behave like the platform primitive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use elmod_document::{to_html, Node, ShadowMode};
use elmod_script::ATTACH_SHADOW_BLOCKED;

use crate::renderer::{Bindings, RenderError, TemplateRenderer};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique element identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Permission to create the root of one specific element, once.
#[derive(Debug)]
pub struct RootCapability {
    element: ElementId,
}

impl RootCapability {
    pub(crate) fn issue(element: ElementId) -> Self {
        Self { element }
    }
}

/// Where an element is in its construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    RootAttaching,
    Ready,
    Failed,
}

/// Options for `attach_shadow`, mirroring the platform's init dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadowRootInit {
    pub mode: ShadowMode,
}

impl ShadowRootInit {
    /// Build from a raw `mode` value. Absent means open; anything else
    /// that is not a mode is a type error.
    pub fn parse(mode: Option<&str>) -> Result<Self, ElementError> {
        let mode = match mode {
            None => ShadowMode::Open,
            Some(raw) => raw
                .parse()
                .map_err(|_| ElementError::Type(format!("Invalid shadow root mode: {raw}")))?,
        };
        Ok(Self { mode })
    }
}

/// An encapsulated rendering root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowRoot {
    mode: ShadowMode,
    children: Vec<Node>,
}

impl ShadowRoot {
    pub fn mode(&self) -> ShadowMode {
        self.mode
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn to_html(&self) -> String {
        to_html(&self.children)
    }
}

/// Root settings of an element built by a wrapper class.
#[derive(Debug)]
pub(crate) struct ManagedRoot {
    pub mode: ShadowMode,
    pub template: String,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub capability: Option<RootCapability>,
}

/// Errors raised by element operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementError {
    #[error("TypeError: {0}")]
    Type(String),

    #[error("NotSupportedError: {0}")]
    NotSupported(String),

    #[error("Element already has a shadow root before attachment")]
    PreexistingRoot,

    #[error("<{0}> finished construction without a shadow root")]
    MissingRoot(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{kind}: {message}")]
    Script { kind: String, message: String },
}

/// An element instance.
#[derive(Debug)]
pub struct Element {
    id: ElementId,
    tag: String,
    attributes: Vec<(String, String)>,
    shadow_root: Option<ShadowRoot>,
    internals: bool,
    managed: Option<ManagedRoot>,
    state: LifecycleState,
}

/// Handle returned by `internals()`.
#[derive(Debug, Clone, Copy)]
pub struct ElementInternals<'a> {
    element: &'a Element,
}

impl<'a> ElementInternals<'a> {
    /// The element's root, open or closed.
    pub fn shadow_root(&self) -> Option<&'a ShadowRoot> {
        self.element.shadow_root.as_ref()
    }
}

impl Element {
    /// Create an unmanaged element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: ElementId::next(),
            tag: tag.into(),
            attributes: Vec::new(),
            shadow_root: None,
            internals: false,
            managed: None,
            state: LifecycleState::Constructed,
        }
    }

    /// Create an element whose root is attached by the wrapper step.
    pub(crate) fn managed(
        tag: impl Into<String>,
        mode: ShadowMode,
        template: String,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        let mut element = Self::new(tag);
        element.managed = Some(ManagedRoot {
            mode,
            template,
            renderer,
            capability: Some(RootCapability::issue(element.id)),
        });
        element
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn tag_name(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_managed(&self) -> bool {
        self.managed.is_some()
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// The root, if it is open.
    pub fn shadow_root(&self) -> Option<&ShadowRoot> {
        self.shadow_root
            .as_ref()
            .filter(|root| root.mode == ShadowMode::Open)
    }

    /// Internals, once attached.
    pub fn internals(&self) -> Option<ElementInternals<'_>> {
        self.internals.then_some(ElementInternals { element: self })
    }

    pub fn has_root(&self) -> bool {
        self.shadow_root.is_some()
    }

    /// True only while this element's own root attachment is in progress.
    pub fn root_creation_permitted(&self) -> bool {
        self.state == LifecycleState::RootAttaching && self.shadow_root.is_none()
    }

    /// Public root creation.
    ///
    /// Managed elements always refuse: their root is created by the
    /// wrapper's attachment step only.
    pub fn attach_shadow(&mut self, init: ShadowRootInit) -> Result<&ShadowRoot, ElementError> {
        if self.managed.is_some() {
            return Err(ElementError::Type(ATTACH_SHADOW_BLOCKED.to_string()));
        }
        if self.shadow_root.is_some() {
            return Err(ElementError::NotSupported(format!(
                "<{}> already hosts a shadow root",
                self.tag
            )));
        }

        Ok(self.shadow_root.insert(ShadowRoot {
            mode: init.mode,
            children: Vec::new(),
        }))
    }

    /// Attach internals. On a managed element this also attaches and
    /// renders the root.
    pub fn attach_internals(&mut self) -> Result<(), ElementError> {
        if self.internals {
            return Err(ElementError::NotSupported(
                "attachInternals() was already called".to_string(),
            ));
        }
        self.internals = true;

        if self.managed.is_some() {
            if let Err(e) = self.attach_managed_root() {
                self.state = LifecycleState::Failed;
                return Err(e);
            }
        }
        Ok(())
    }

    fn attach_managed_root(&mut self) -> Result<(), ElementError> {
        if self.shadow_root.is_some() {
            return Err(ElementError::PreexistingRoot);
        }

        let (capability, mode) = match self.managed.as_mut() {
            Some(managed) => (managed.capability.take(), managed.mode),
            None => return Ok(()),
        };
        let capability = capability.ok_or(ElementError::PreexistingRoot)?;

        self.state = LifecycleState::RootAttaching;
        self.create_root(capability, mode)?;

        let bindings: Bindings = self.attributes.iter().cloned().collect();
        let nodes = match self.managed.as_ref() {
            Some(managed) => managed.renderer.render(&managed.template, &bindings)?,
            None => Vec::new(),
        };

        if let Some(root) = self.shadow_root.as_mut() {
            root.children = nodes;
        }
        self.state = LifecycleState::Ready;
        tracing::debug!("<{}> attached {} root", self.tag, mode);
        Ok(())
    }

    // The privileged primitive: only a capability issued to this element
    // can create its root.
    fn create_root(&mut self, capability: RootCapability, mode: ShadowMode) -> Result<(), ElementError> {
        if capability.element != self.id || !self.root_creation_permitted() {
            return Err(ElementError::Type(ATTACH_SHADOW_BLOCKED.to_string()));
        }
        self.shadow_root = Some(ShadowRoot {
            mode,
            children: Vec::new(),
        });
        Ok(())
    }

    pub(crate) fn fail(&mut self) {
        self.state = LifecycleState::Failed;
    }
}
