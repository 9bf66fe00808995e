//! Static analysis of synthesized element modules.
//!
//! Parses module source with oxc and extracts what the runtime needs to
//! instantiate it: static imports, the default export and the author class
//! shape, including the observable effects of its constructor.

use std::collections::HashMap;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, AssignmentTarget, BindingPatternKind, CallExpression, Class, ClassElement, Declaration,
    ExportDefaultDeclarationKind, Expression, MethodDefinitionKind, ObjectPropertyKind,
    PropertyKey, Statement,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use crate::generator::AUTHOR_CLASS;

/// Errors that can occur while analyzing a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Syntax error: {}", .0.join("; "))]
    Syntax(Vec<String>),

    #[error("Module has {0} default exports")]
    DuplicateDefault(usize),
}

/// An observable statement in a class constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorEffect {
    /// `super(...)`
    Super,
    /// `this.attachShadow({ mode })`
    AttachShadow { mode: Option<String> },
    /// `this.attachInternals()`
    AttachInternals,
    /// `this.setAttribute(name, value)` with literal arguments
    SetAttribute { name: String, value: String },
    /// `throw new Kind(message)`
    Throw { kind: String, message: String },
}

/// Shape of a class declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassShape {
    pub name: Option<String>,

    /// Source text of the `extends` clause
    pub base: Option<String>,

    /// Constructor effects in statement order
    pub constructor: Vec<ConstructorEffect>,

    pub has_constructor: bool,
}

/// What a module exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleShape {
    /// Static import and re-export specifiers in source order
    pub imports: Vec<String>,

    /// Number of `export default` declarations
    pub default_exports: usize,

    /// The class aliased as the module-internal author class
    pub author: Option<ClassShape>,

    /// The default-exported class, if the default export is a class
    pub default_class: Option<ClassShape>,

    /// Named top-level classes, including the author class
    pub classes: HashMap<String, ClassShape>,
}

/// Parse and analyze module source.
pub fn analyze_module(source: &str) -> Result<ModuleShape, AnalysisError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();

    if ret.panicked || !ret.errors.is_empty() {
        let messages = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(AnalysisError::Syntax(messages));
    }

    let mut shape = ModuleShape::default();
    let mut author_alias = None;

    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                shape.imports.push(decl.source.value.to_string());
            }
            Statement::ExportAllDeclaration(decl) => {
                shape.imports.push(decl.source.value.to_string());
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(src) = &decl.source {
                    shape.imports.push(src.value.to_string());
                }
                match &decl.declaration {
                    Some(Declaration::ClassDeclaration(class)) => {
                        insert_class(&mut shape.classes, class_shape(class, source));
                    }
                    Some(Declaration::VariableDeclaration(decl)) => {
                        for declarator in &decl.declarations {
                            if let (
                                BindingPatternKind::BindingIdentifier(id),
                                Some(Expression::ClassExpression(class)),
                            ) = (&declarator.id.kind, &declarator.init)
                            {
                                let mut class = class_shape(class, source);
                                class.name = Some(id.name.to_string());
                                insert_class(&mut shape.classes, class);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                shape.default_exports += 1;
                if let ExportDefaultDeclarationKind::ClassDeclaration(class) = &decl.declaration {
                    shape.default_class = Some(class_shape(class, source));
                }
            }
            Statement::ClassDeclaration(class) => {
                insert_class(&mut shape.classes, class_shape(class, source));
            }
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    let BindingPatternKind::BindingIdentifier(id) = &declarator.id.kind else {
                        continue;
                    };
                    match &declarator.init {
                        Some(Expression::Identifier(target)) if id.name.as_str() == AUTHOR_CLASS => {
                            author_alias = Some(target.name.to_string());
                        }
                        Some(Expression::ClassExpression(class)) => {
                            let mut class = class_shape(class, source);
                            if id.name.as_str() == AUTHOR_CLASS {
                                shape.author = Some(class);
                            } else {
                                class.name = Some(id.name.to_string());
                                insert_class(&mut shape.classes, class);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if shape.default_exports > 1 {
        return Err(AnalysisError::DuplicateDefault(shape.default_exports));
    }

    if let Some(alias) = author_alias {
        shape.author = shape.classes.get(&alias).cloned();
    }

    Ok(shape)
}

fn insert_class(classes: &mut HashMap<String, ClassShape>, class: ClassShape) {
    if let Some(name) = class.name.clone() {
        classes.insert(name, class);
    }
}

fn class_shape(class: &Class<'_>, source: &str) -> ClassShape {
    let mut shape = ClassShape {
        name: class.id.as_ref().map(|id| id.name.to_string()),
        base: class
            .super_class
            .as_ref()
            .map(|expr| span_text(source, expr.span()).to_string()),
        ..Default::default()
    };

    // Instance field initializers run as part of construction.
    let mut fields = Vec::new();

    for element in &class.body.body {
        match element {
            ClassElement::PropertyDefinition(prop) if !prop.r#static => {
                if let Some(value) = &prop.value {
                    expression_effects(value, &mut fields);
                }
            }
            ClassElement::MethodDefinition(method)
                if matches!(method.kind, MethodDefinitionKind::Constructor) =>
            {
                shape.has_constructor = true;
                if let Some(body) = &method.value.body {
                    for stmt in &body.statements {
                        statement_effects(stmt, source, &mut shape.constructor);
                    }
                }
            }
            _ => {}
        }
    }

    // Fields initialize right after `super()` returns.
    let at = shape
        .constructor
        .iter()
        .position(|e| *e == ConstructorEffect::Super)
        .map_or(0, |i| i + 1);
    shape.constructor.splice(at..at, fields);

    shape
}

fn statement_effects(stmt: &Statement<'_>, source: &str, effects: &mut Vec<ConstructorEffect>) {
    match stmt {
        Statement::ExpressionStatement(expr) => expression_effects(&expr.expression, effects),
        Statement::VariableDeclaration(decl) => {
            for declarator in &decl.declarations {
                if let Some(init) = &declarator.init {
                    expression_effects(init, effects);
                }
            }
        }
        Statement::BlockStatement(block) => {
            for stmt in &block.body {
                statement_effects(stmt, source, effects);
            }
        }
        Statement::ReturnStatement(ret) => {
            if let Some(arg) = &ret.argument {
                expression_effects(arg, effects);
            }
        }
        Statement::ThrowStatement(throw) => {
            let Expression::NewExpression(new_expr) = &throw.argument else {
                effects.push(ConstructorEffect::Throw {
                    kind: "Error".to_string(),
                    message: span_text(source, throw.argument.span()).to_string(),
                });
                return;
            };
            effects.push(ConstructorEffect::Throw {
                kind: span_text(source, new_expr.callee.span()).to_string(),
                message: new_expr
                    .arguments
                    .first()
                    .and_then(string_argument)
                    .unwrap_or_default(),
            });
        }
        _ => {}
    }
}

/// Collect effects of an expression in evaluation order. Function bodies
/// are not entered; only code that runs unconditionally is.
fn expression_effects(expr: &Expression<'_>, effects: &mut Vec<ConstructorEffect>) {
    match expr {
        Expression::CallExpression(call) => {
            match &call.callee {
                Expression::StaticMemberExpression(member) => {
                    expression_effects(&member.object, effects)
                }
                Expression::ComputedMemberExpression(member) => {
                    expression_effects(&member.object, effects);
                    expression_effects(&member.expression, effects);
                }
                Expression::Super(_) => {}
                callee => expression_effects(callee, effects),
            }
            for arg in &call.arguments {
                if let Some(arg) = arg.as_expression() {
                    expression_effects(arg, effects);
                }
            }
            if let Some(effect) = call_effect(call) {
                effects.push(effect);
            }
        }
        Expression::AssignmentExpression(assign) => {
            match &assign.left {
                AssignmentTarget::StaticMemberExpression(member) => {
                    expression_effects(&member.object, effects)
                }
                AssignmentTarget::ComputedMemberExpression(member) => {
                    expression_effects(&member.object, effects);
                    expression_effects(&member.expression, effects);
                }
                _ => {}
            }
            expression_effects(&assign.right, effects);
        }
        Expression::ParenthesizedExpression(paren) => expression_effects(&paren.expression, effects),
        Expression::SequenceExpression(seq) => {
            for expr in &seq.expressions {
                expression_effects(expr, effects);
            }
        }
        Expression::AwaitExpression(expr) => expression_effects(&expr.argument, effects),
        Expression::UnaryExpression(expr) => expression_effects(&expr.argument, effects),
        Expression::BinaryExpression(expr) => {
            expression_effects(&expr.left, effects);
            expression_effects(&expr.right, effects);
        }
        Expression::LogicalExpression(expr) => expression_effects(&expr.left, effects),
        Expression::ConditionalExpression(expr) => expression_effects(&expr.test, effects),
        Expression::StaticMemberExpression(member) => expression_effects(&member.object, effects),
        Expression::ComputedMemberExpression(member) => {
            expression_effects(&member.object, effects);
            expression_effects(&member.expression, effects);
        }
        Expression::NewExpression(new_expr) => {
            for arg in &new_expr.arguments {
                if let Some(arg) = arg.as_expression() {
                    expression_effects(arg, effects);
                }
            }
        }
        Expression::ArrayExpression(array) => {
            for element in &array.elements {
                if let Some(expr) = element.as_expression() {
                    expression_effects(expr, effects);
                }
            }
        }
        Expression::ObjectExpression(obj) => {
            for prop in &obj.properties {
                if let ObjectPropertyKind::ObjectProperty(prop) = prop {
                    expression_effects(&prop.value, effects);
                }
            }
        }
        Expression::TemplateLiteral(template) => {
            for expr in &template.expressions {
                expression_effects(expr, effects);
            }
        }
        _ => {}
    }
}

fn call_effect(call: &CallExpression<'_>) -> Option<ConstructorEffect> {
    match &call.callee {
        Expression::Super(_) => Some(ConstructorEffect::Super),
        Expression::StaticMemberExpression(member)
            if matches!(member.object, Expression::ThisExpression(_)) =>
        {
            match member.property.name.as_str() {
                "attachShadow" => Some(ConstructorEffect::AttachShadow {
                    mode: call.arguments.first().and_then(mode_argument),
                }),
                "attachInternals" => Some(ConstructorEffect::AttachInternals),
                "setAttribute" => {
                    let name = call.arguments.first().and_then(string_argument)?;
                    let value = call.arguments.get(1).and_then(string_argument)?;
                    Some(ConstructorEffect::SetAttribute { name, value })
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn string_argument(arg: &Argument<'_>) -> Option<String> {
    match arg.as_expression()? {
        Expression::StringLiteral(s) => Some(s.value.to_string()),
        Expression::TemplateLiteral(t) if t.expressions.is_empty() => t
            .quasis
            .first()
            .map(|q| q.value.raw.to_string()),
        _ => None,
    }
}

// `{ mode: 'open' }` -> Some("open")
fn mode_argument(arg: &Argument<'_>) -> Option<String> {
    let Some(Expression::ObjectExpression(obj)) = arg.as_expression() else {
        return None;
    };

    obj.properties.iter().find_map(|prop| {
        let ObjectPropertyKind::ObjectProperty(prop) = prop else {
            return None;
        };
        let key = match &prop.key {
            PropertyKey::StaticIdentifier(id) => id.name.as_str(),
            PropertyKey::StringLiteral(s) => s.value.as_str(),
            _ => return None,
        };
        if key != "mode" {
            return None;
        }
        match &prop.value {
            Expression::StringLiteral(s) => Some(s.value.to_string()),
            _ => None,
        }
    })
}

fn span_text(source: &str, span: oxc_span::Span) -> &str {
    source
        .get(span.start as usize..span.end as usize)
        .unwrap_or_default()
}
