//! Behavior-script transformation for element modules.
//!
//! This crate takes a definition's inline behavior script through the
//! compile pipeline: normalization of the default class header, rewriting
//! of self-location and relative module references, and synthesis of the
//! module whose default export wraps the author's class. It also analyzes
//! generated modules so the runtime can instantiate them.

pub mod analysis;
pub mod compiler;
pub mod context;
pub mod generator;
pub mod lexer;
pub mod normalize;
pub mod rewrite;

pub use analysis::{analyze_module, AnalysisError, ClassShape, ConstructorEffect, ModuleShape};
pub use compiler::ModuleCompiler;
pub use context::{ScriptError, TransformContext, DEFAULT_RENDERER};
pub use generator::{
    synthesize_module, ModuleSpec, SynthesizedModule, ATTACH_SHADOW_BLOCKED, PREEXISTING_ROOT,
};
pub use lexer::{scan, ScannedSource, StringLiteral};
pub use normalize::{
    find_class_header, normalize_script, NormalizedScript, Repair, DEFAULT_BINDING, PLATFORM_BASE,
};
pub use rewrite::{rewrite_references, RewriteResult, RewrittenSpecifier};
