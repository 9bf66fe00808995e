//! Author classes and the generated wrapper class.

use std::fmt;
use std::sync::Arc;

use elmod_document::ShadowMode;
use elmod_script::{ConstructorEffect, PLATFORM_BASE};

use crate::element::{Element, ElementError, ShadowRootInit};
use crate::renderer::TemplateRenderer;

/// Construction logic contributed by one class in the chain.
pub trait ElementBehavior: Send + Sync + fmt::Debug {
    fn construct(&self, host: &mut Element) -> Result<(), ElementError>;
}

/// Behavior with an empty constructor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBehavior;

impl ElementBehavior for NoopBehavior {
    fn construct(&self, _host: &mut Element) -> Result<(), ElementError> {
        Ok(())
    }
}

/// Replays constructor effects recovered from an analyzed script.
#[derive(Debug, Clone, Default)]
pub struct ScriptBehavior {
    effects: Vec<ConstructorEffect>,
}

impl ScriptBehavior {
    pub fn new(effects: Vec<ConstructorEffect>) -> Self {
        Self { effects }
    }

    pub fn effects(&self) -> &[ConstructorEffect] {
        &self.effects
    }
}

impl ElementBehavior for ScriptBehavior {
    fn construct(&self, host: &mut Element) -> Result<(), ElementError> {
        for effect in &self.effects {
            match effect {
                ConstructorEffect::Super => {}
                ConstructorEffect::AttachShadow { mode } => {
                    let init = ShadowRootInit::parse(mode.as_deref())?;
                    host.attach_shadow(init)?;
                }
                ConstructorEffect::AttachInternals => host.attach_internals()?,
                ConstructorEffect::SetAttribute { name, value } => {
                    host.set_attribute(name.as_str(), value.as_str())
                }
                ConstructorEffect::Throw { kind, message } => {
                    return Err(ElementError::Script {
                        kind: kind.clone(),
                        message: message.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A class written by an author (or a base class it extends).
#[derive(Debug, Clone)]
pub struct AuthorClass {
    name: String,
    base: Option<Arc<AuthorClass>>,
    behavior: Arc<dyn ElementBehavior>,
}

impl AuthorClass {
    /// A class extending the platform base directly.
    pub fn new(name: impl Into<String>, behavior: Arc<dyn ElementBehavior>) -> Self {
        Self {
            name: name.into(),
            base: None,
            behavior,
        }
    }

    /// A class extending another author class.
    pub fn extending(
        name: impl Into<String>,
        base: Arc<AuthorClass>,
        behavior: Arc<dyn ElementBehavior>,
    ) -> Self {
        Self {
            name: name.into(),
            base: Some(base),
            behavior,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Arc<AuthorClass>> {
        self.base.as_ref()
    }

    /// Run base constructors first, then this class's.
    fn construct(&self, host: &mut Element) -> Result<(), ElementError> {
        if let Some(base) = &self.base {
            base.construct(host)?;
        }
        self.behavior.construct(host)
    }

    fn ancestors(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        let mut current = self.base.as_deref();
        while let Some(class) = current {
            names.push(class.name.clone());
            current = class.base.as_deref();
        }
        names
    }
}

/// The registered wrapper class: subtype of an author class that owns root
/// creation for every instance it constructs.
#[derive(Debug)]
pub struct ElementClass {
    name: String,
    author: Arc<AuthorClass>,
    template: String,
    shadow_mode: ShadowMode,
    renderer: Arc<dyn TemplateRenderer>,
}

impl ElementClass {
    pub fn new(
        name: impl Into<String>,
        author: Arc<AuthorClass>,
        template: impl Into<String>,
        shadow_mode: ShadowMode,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            name: name.into(),
            author,
            template: template.into(),
            shadow_mode,
            renderer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn author(&self) -> &Arc<AuthorClass> {
        &self.author
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn shadow_mode(&self) -> ShadowMode {
        self.shadow_mode
    }

    /// Class names from the wrapper down to the platform base.
    pub fn prototype_chain(&self) -> Vec<String> {
        let mut chain = vec![self.name.clone()];
        chain.extend(self.author.ancestors());
        chain.push(PLATFORM_BASE.to_string());
        chain
    }

    /// Construct an instance for `tag`.
    ///
    /// Runs the author chain, then attaches internals (and with them the
    /// root) if the author did not. On success the element has exactly one
    /// rendered root.
    pub fn construct(&self, tag: &str) -> Result<Element, ElementError> {
        let mut element = Element::managed(
            tag,
            self.shadow_mode,
            self.template.clone(),
            Arc::clone(&self.renderer),
        );

        if let Err(e) = self.finish_construction(&mut element) {
            element.fail();
            tracing::debug!("<{tag}> construction failed: {e}");
            return Err(e);
        }
        Ok(element)
    }

    fn finish_construction(&self, element: &mut Element) -> Result<(), ElementError> {
        self.author.construct(element)?;

        if element.internals().is_none() {
            element.attach_internals()?;
        }

        if !element.has_root() {
            return Err(ElementError::MissingRoot(element.tag_name().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::LifecycleState;
    use crate::renderer::MarkupRenderer;
    use elmod_script::ATTACH_SHADOW_BLOCKED;

    fn wrapper(behavior: Arc<dyn ElementBehavior>, mode: ShadowMode) -> ElementClass {
        let author = Arc::new(AuthorClass::new("sayHi", behavior));
        ElementClass::new(
            "sayHi",
            author,
            "<p>hi</p>",
            mode,
            Arc::new(MarkupRenderer::new()),
        )
    }

    #[test]
    fn constructs_with_exactly_one_root() {
        let class = wrapper(Arc::new(NoopBehavior), ShadowMode::Open);

        let element = class.construct("say-hi").unwrap();

        assert_eq!(element.state(), LifecycleState::Ready);
        assert_eq!(element.shadow_root().unwrap().to_html(), "<p>hi</p>");
        assert!(element.internals().is_some());
    }

    #[test]
    fn author_attach_shadow_fails_construction() {
        let behavior = ScriptBehavior::new(vec![
            ConstructorEffect::Super,
            ConstructorEffect::AttachShadow {
                mode: Some("open".to_string()),
            },
        ]);
        let class = wrapper(Arc::new(behavior), ShadowMode::Open);

        let err = class.construct("x-rogue").unwrap_err();

        assert_eq!(err, ElementError::Type(ATTACH_SHADOW_BLOCKED.to_string()));
    }

    #[test]
    fn author_may_attach_internals_itself() {
        let behavior = ScriptBehavior::new(vec![
            ConstructorEffect::Super,
            ConstructorEffect::AttachInternals,
        ]);
        let class = wrapper(Arc::new(behavior), ShadowMode::Closed);

        let element = class.construct("x-own").unwrap();

        assert!(element.shadow_root().is_none());
        let root = element.internals().unwrap().shadow_root().unwrap();
        assert_eq!(root.mode(), ShadowMode::Closed);
        assert_eq!(root.to_html(), "<p>hi</p>");
    }

    #[test]
    fn attributes_set_in_constructor_bind_into_template() {
        let author = Arc::new(AuthorClass::new(
            "xGreet",
            Arc::new(ScriptBehavior::new(vec![ConstructorEffect::SetAttribute {
                name: "who".to_string(),
                value: "world".to_string(),
            }])),
        ));
        let class = ElementClass::new(
            "xGreet",
            author,
            "<p>hello {{ who }}</p>",
            ShadowMode::Open,
            Arc::new(MarkupRenderer::new()),
        );

        let element = class.construct("x-greet").unwrap();

        assert_eq!(element.shadow_root().unwrap().to_html(), "<p>hello world</p>");
    }

    #[test]
    fn thrown_errors_propagate() {
        let behavior = ScriptBehavior::new(vec![ConstructorEffect::Throw {
            kind: "Error".to_string(),
            message: "nope".to_string(),
        }]);
        let class = wrapper(Arc::new(behavior), ShadowMode::Open);

        let err = class.construct("x-throw").unwrap_err();

        assert_eq!(err.to_string(), "Error: nope");
    }

    #[test]
    fn base_behaviors_run_first() {
        let base = Arc::new(AuthorClass::new(
            "Base",
            Arc::new(ScriptBehavior::new(vec![ConstructorEffect::SetAttribute {
                name: "layer".to_string(),
                value: "base".to_string(),
            }])),
        ));
        let author = Arc::new(AuthorClass::extending(
            "Derived",
            base,
            Arc::new(ScriptBehavior::new(vec![ConstructorEffect::SetAttribute {
                name: "layer".to_string(),
                value: "derived".to_string(),
            }])),
        ));
        let class = ElementClass::new(
            "Derived",
            author,
            "{{ layer }}",
            ShadowMode::Open,
            Arc::new(MarkupRenderer::new()),
        );

        let element = class.construct("x-derived").unwrap();

        assert_eq!(element.get_attribute("layer"), Some("derived"));
        assert_eq!(
            class.prototype_chain(),
            vec!["Derived", "Derived", "Base", "HTMLElement"]
        );
    }
}
