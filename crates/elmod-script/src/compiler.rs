//! Per-definition compilation: normalize, rewrite, synthesize.

use elmod_document::Definition;
use url::Url;

use crate::context::{ScriptError, TransformContext};
use crate::generator::{synthesize_module, ModuleSpec, SynthesizedModule};
use crate::normalize::normalize_script;
use crate::rewrite::rewrite_references;

/// Compiles definitions into element modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleCompiler {
    ctx: TransformContext,
}

impl ModuleCompiler {
    pub fn new(ctx: TransformContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &TransformContext {
        &self.ctx
    }

    /// Compile one definition as if its script were loaded from `document_url`.
    pub fn compile(
        &self,
        definition: &Definition,
        document_url: &Url,
    ) -> Result<SynthesizedModule, ScriptError> {
        let tag_name = definition
            .tag_name()
            .ok_or(ScriptError::MissingTagName(definition.index))?;
        let shadow_mode = definition.shadow_mode()?;

        let normalized = normalize_script(definition.script.as_deref(), tag_name);
        for repair in &normalized.repairs {
            tracing::debug!("<{tag_name}>: applied {repair:?}");
        }

        let rewritten = rewrite_references(&normalized.source, document_url, &self.ctx);
        for spec in &rewritten.specifiers {
            tracing::debug!("<{tag_name}>: {} -> {}", spec.original, spec.resolved);
        }

        let source = synthesize_module(
            &rewritten.source,
            &ModuleSpec {
                tag_name,
                class_name: &normalized.class_name,
                template: &definition.template,
                shadow_mode,
                renderer_specifier: &self.ctx.renderer_specifier,
            },
        )?;

        Ok(SynthesizedModule {
            tag_name: tag_name.to_string(),
            class_name: normalized.class_name,
            binding: normalized.binding,
            base: normalized.base,
            shadow_mode,
            template: definition.template.clone(),
            renderer_specifier: self.ctx.renderer_specifier.clone(),
            base_url: document_url.clone(),
            exported: definition.exported(),
            source,
            specifiers: rewritten.specifiers,
            repairs: normalized.repairs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_module, ConstructorEffect};
    use crate::normalize::Repair;
    use elmod_document::{parse_element_module, ShadowMode};

    fn compile_first(html: &str, url: &str) -> Result<SynthesizedModule, ScriptError> {
        let document = parse_element_module(html).unwrap();
        let url = Url::parse(url).unwrap();
        ModuleCompiler::default().compile(&document.definitions[0], &url)
    }

    #[test]
    fn compiles_definition_without_script() {
        let module = compile_first(
            r#"<element name="say-hi"><p>hi</p></element>"#,
            "https://ex.com/doc.html",
        )
        .unwrap();

        assert_eq!(module.class_name, "sayHi");
        assert_eq!(module.base, "HTMLElement");
        assert_eq!(module.shadow_mode, ShadowMode::Open);
        assert_eq!(module.repairs, vec![Repair::Synthesized, Repair::InjectedName]);
        assert!(module.source.contains("__html__`<p>hi</p>`"));

        let shape = analyze_module(&module.source).unwrap();
        assert_eq!(shape.default_exports, 1);
        assert_eq!(shape.author.unwrap().name.as_deref(), Some("__DEFAULT_CLASS__"));
    }

    #[test]
    fn closed_definition_rewrites_relative_import() {
        let module = compile_first(
            r#"<element name="x-closed" shadowmode="closed"><script>import './x.js'</script><b>c</b></element>"#,
            "https://ex.com/a/doc.html",
        )
        .unwrap();

        assert_eq!(module.shadow_mode, ShadowMode::Closed);
        assert!(module.source.contains("import 'https://ex.com/a/x.js'"));
        assert!(module.source.contains("mode: \"closed\""));

        let shape = analyze_module(&module.source).unwrap();
        assert!(shape.imports.contains(&"https://ex.com/a/x.js".to_string()));
    }

    #[test]
    fn keeps_author_constructor_effects() {
        let module = compile_first(
            r#"<element name="x-rogue"><script>
export default class extends HTMLElement {
  constructor() {
    super();
    this.attachShadow({mode:'open'});
  }
}
</script></element>"#,
            "https://ex.com/doc.html",
        )
        .unwrap();

        let author = analyze_module(&module.source).unwrap().author.unwrap();
        assert_eq!(module.class_name, "xRogue");
        assert_eq!(author.name.as_deref(), Some(module.binding.as_str()));
        assert_eq!(
            author.constructor[1],
            ConstructorEffect::AttachShadow {
                mode: Some("open".to_string())
            }
        );
    }

    #[test]
    fn unnamed_definition_is_an_error() {
        let result = compile_first("<element><p>x</p></element>", "https://ex.com/doc.html");

        assert_eq!(result, Err(ScriptError::MissingTagName(0)));
    }

    #[test]
    fn invalid_shadow_mode_is_an_error() {
        let result = compile_first(
            r#"<element name="x-bad" shadowmode="sideways"></element>"#,
            "https://ex.com/doc.html",
        );

        assert!(matches!(result, Err(ScriptError::Attribute(_))));
    }

    #[test]
    fn inferred_name_leaves_author_helpers_alone() {
        let module = compile_first(
            r#"<element name="x-help"><script>function xHelp() { return 1 }
const label = xHelp();</script></element>"#,
            "https://ex.com/doc.html",
        )
        .unwrap();

        assert_eq!(module.class_name, "xHelp");
        assert_eq!(module.binding, "__DEFAULT_CLASS__");
        assert_eq!(module.source.matches("function xHelp()").count(), 1);
        assert!(!module.source.contains("class xHelp"));
        assert!(module.source.contains("static name = \"xHelp\";"));

        let shape = analyze_module(&module.source).unwrap();
        assert!(shape.classes.contains_key("__DEFAULT_CLASS__"));
    }
}
