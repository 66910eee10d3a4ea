//! # Production Guard Analysis
//!
//! Static analysis of `process.env.NODE_ENV` guards in JavaScript sources,
//! an error-message minifier built on it, and lint rules enforcing the guard
//! discipline.
//!
//! ## Guard Invariants
//!
//! 1. **Canonical Shape**: Only `process.env.NODE_ENV === <literal>` / `!== <literal>`
//!    (either operand order) proves anything, optionally as the LEFT operand of
//!    `&&` (consequent) or `||` (alternate).
//!
//! 2. **Fail Safe**: A position that cannot be proven dev-only is production-reachable.
//!    `Unproven` is a verdict, never an error.
//!
//! 3. **Innermost Proof Wins**: Frames are examined from the innermost conditional
//!    outwards and the first proof decides the verdict.
//!
//! 4. **No Back Pointers**: Enclosing conditionals are an explicit stack pushed during
//!    a top-down walk (`visitor::walk_program`).
//!
//! ## Catalog Invariants
//!
//! 1. **Normalized Keys**: Templates are trimmed and whitespace-collapsed before lookup,
//!    so equivalent messages share one code.
//!
//! 2. **Append Only**: Codes start at 1, are assigned as `max + 1`, and are never
//!    reused or renumbered.
//!
//! 3. **Flush Once**: A build writes the catalog exactly once, atomically, after every
//!    file succeeded. A failed build leaves the previous file untouched.
//!
//! 4. **Exact Arity**: The number of `%s` placeholders must equal the number of
//!    positional arguments. A mismatch aborts the file.

#[cfg(feature = "napi")]
mod bridge;

pub mod catalog;
pub mod error;
pub mod guard;
pub mod lint;
pub mod minify;
pub mod parse;
pub mod pipeline;
pub mod visitor;

#[cfg(test)]
mod fixture_tests;

#[cfg(feature = "napi")]
pub use bridge::{lint_native, minify_native, rule_schemas_native};

pub use catalog::{
    CatalogEntry, CatalogReader, CatalogTransaction, CatalogWriter, CodeResolver,
    MessageCatalog, MissingCodePolicy, TemplateCollector,
};
pub use error::{BuildError, CatalogError, ConfigError, TransformError};
pub use guard::{classify, Branch, EnclosingTest, GuardFrame, GuardVerdict};
pub use lint::{LintDiagnostic, Linter, Rule, Severity};
pub use minify::{minify_errors, Detection, MinifyOptions, MinifyOutput};
pub use pipeline::{discover_sources, minify_sources, run_build, BuildOptions, BuildReport};
pub use visitor::{walk_program, GuardVisitor};
