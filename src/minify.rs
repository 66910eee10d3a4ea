//! Error message minification.
//!
//! Every production-reachable `new Error(<message>)` (or `Error(<message>)`)
//! whose message is a string literal, template literal or string concatenation
//! has its message argument rewritten in place:
//!
//! ```text
//! new Error(`Invalid prop ${name}`)
//!   -> new Error(process.env.NODE_ENV !== 'production' ? `Invalid prop ${name}` : formatProdErrorMessage(1, name))
//! ```
//!
//! Development builds keep the full message; production bundles only carry the
//! code and the positional arguments. Rewrites are span-based text
//! replacements, so untouched code is emitted byte-for-byte and running the
//! transform on its own output is a no-op.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Expression, ImportDeclarationSpecifier, NewExpression, Program,
    Statement,
};
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::BinaryOperator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{normalize_template, template_arity, CodeResolver, MissingCodePolicy};
use crate::error::{CatalogError, ConfigError, TransformError};
use crate::guard::{classify, GuardFrame, GuardVerdict};
use crate::parse::{parse_program, span_text, LineIndex};
use crate::visitor::{walk_program, GuardVisitor};

pub const ANNOTATION: &str =
    "/* FIXME (minify-errors-in-prod): Unminified error message in production build! */";

const MARKER_ENABLE: &str = "minify-error";
const MARKER_DISABLE: &str = "minify-error-disabled";

lazy_static! {
    static ref DEFAULT_ERROR_CONSTRUCTORS: Vec<&'static str> = vec![
        "Error",
        "TypeError",
        "RangeError",
        "SyntaxError",
        "ReferenceError",
        "EvalError",
        "URIError",
        "AggregateError",
    ];
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Detection {
    /// Every site, unless marked `/* minify-error-disabled */`.
    #[default]
    OptOut,
    /// Only sites marked `/* minify-error */`.
    OptIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct MinifyOptions {
    /// Runtime decoder called on the production path as `fmt(code, ...args)`.
    pub format_function: String,
    /// Module the decoder is default-imported from, if it must be imported.
    pub runtime_module: Option<String>,
    pub missing_code: MissingCodePolicy,
    pub detection: Detection,
    pub error_constructors: Vec<String>,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        MinifyOptions {
            format_function: "formatProdErrorMessage".to_string(),
            runtime_module: None,
            missing_code: MissingCodePolicy::default(),
            detection: Detection::default(),
            error_constructors: DEFAULT_ERROR_CONSTRUCTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl MinifyOptions {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|source| ConfigError::InvalidOptions {
            target: "minify".to_string(),
            source,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// An error construction site found in one transform run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCallSite {
    pub constructor: String,
    /// Extracted template, `%s` per dynamic part, not yet normalized.
    pub template: String,
    /// Source text of each positional argument.
    pub args: Vec<String>,
    pub verdict: GuardVerdict,
    #[serde(skip)]
    pub span: Span,
    #[serde(skip)]
    pub message_span: Span,
    #[serde(skip)]
    pub arg_slots: Vec<ArgSlot>,
}

/// Location of one positional argument inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSlot {
    pub span: Span,
    /// Sequence expressions from `${a, b}` need parentheses as call arguments.
    pub parenthesize: bool,
}

impl ArgSlot {
    fn text(&self, source: &str) -> String {
        let text = span_text(source, self.span);
        if self.parenthesize {
            format!("({text})")
        } else {
            text.to_string()
        }
    }
}

enum Action {
    Rewrite(u32),
    Annotate,
}

struct Replacement {
    span: Span,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewrittenSite {
    pub code: u32,
    pub template: String,
    pub line: u32,
    pub column: u32,
    pub verdict: GuardVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    DevOnly,
    Annotated,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSite {
    pub template: String,
    pub line: u32,
    pub column: u32,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifyOutput {
    pub code: String,
    pub rewritten: Vec<RewrittenSite>,
    pub skipped: Vec<SkippedSite>,
}

impl MinifyOutput {
    pub fn changed(&self) -> bool {
        !self.rewritten.is_empty()
            || self
                .skipped
                .iter()
                .any(|s| s.reason == SkipReason::Annotated)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrites every production-reachable error message in `source`.
///
/// Codes come from `resolver`. An arity mismatch between a template and its
/// arguments aborts the file.
pub fn minify_errors<R: CodeResolver + ?Sized>(
    source: &str,
    file_path: &str,
    options: &MinifyOptions,
    resolver: &mut R,
) -> Result<MinifyOutput, TransformError> {
    let allocator = Allocator::default();
    let program = parse_program(&allocator, source, file_path)?;
    let index = LineIndex::new(source);

    let constructors: HashSet<&str> = options
        .error_constructors
        .iter()
        .map(String::as_str)
        .collect();
    let collector = walk_program(
        &program,
        source,
        SiteCollector {
            source,
            constructors,
            sites: Vec::new(),
        },
    );
    let markers = collect_markers(&program, source);

    let mut actions: Vec<(ErrorCallSite, Action)> = Vec::new();
    let mut rewritten = Vec::new();
    let mut skipped = Vec::new();

    // Codes are resolved in source order, outer sites before the sites nested
    // in their arguments.
    for site in collector.sites {
        let (line, column) = index.line_col(site.span.start);
        let skip = |reason| SkippedSite {
            template: site.template.clone(),
            line,
            column,
            reason,
        };

        let marker = marker_before(&markers, source, site.span.start);
        let selected = match options.detection {
            Detection::OptOut => marker != Some(Marker::Disable),
            Detection::OptIn => marker == Some(Marker::Enable),
        };
        if !selected {
            skipped.push(skip(SkipReason::Disabled));
            continue;
        }

        if !site.verdict.is_production_reachable() {
            tracing::debug!(file = file_path, line, "error site is dev-only, leaving it");
            skipped.push(skip(SkipReason::DevOnly));
            continue;
        }

        let template = normalize_template(&site.template);
        let catalog_error = |source| TransformError::Catalog {
            file: file_path.to_string(),
            line,
            column,
            source,
        };
        let expected = template_arity(&template);
        if expected != site.args.len() {
            return Err(catalog_error(CatalogError::ArityMismatch {
                template,
                expected,
                found: site.args.len(),
            }));
        }

        match resolver.resolve(&template).map_err(catalog_error)? {
            Some(code) => {
                tracing::debug!(file = file_path, line, code, "minified error message");
                rewritten.push(RewrittenSite {
                    code,
                    template,
                    line,
                    column,
                    verdict: site.verdict,
                });
                actions.push((site, Action::Rewrite(code)));
            }
            None => {
                tracing::warn!(file = file_path, line, template = %template, "error message left unminified");
                skipped.push(skip(SkipReason::Annotated));
                if !source[..site.span.start as usize].trim_end().ends_with(ANNOTATION) {
                    actions.push((site, Action::Annotate));
                }
            }
        }
    }

    // Rendered innermost first: a nested site's edit is folded into the
    // production arguments of the site that contains it, so no literal message
    // text survives on the production path.
    let mut replacements: Vec<Replacement> = Vec::new();
    for (site, action) in actions.into_iter().rev() {
        match action {
            Action::Rewrite(code) => {
                let args: String = site
                    .arg_slots
                    .iter()
                    .map(|slot| {
                        let text = render(source, slot.span, &mut replacements);
                        if slot.parenthesize {
                            format!(", ({text})")
                        } else {
                            format!(", {text}")
                        }
                    })
                    .collect();
                // The development branch keeps the original message text.
                replacements.retain(|r| !contains(site.message_span, r.span));
                let dev = span_text(source, site.message_span);
                replacements.push(Replacement {
                    span: site.message_span,
                    text: format!(
                        "process.env.NODE_ENV !== 'production' ? {dev} : {}({code}{args})",
                        options.format_function
                    ),
                });
            }
            Action::Annotate => replacements.push(Replacement {
                span: Span::new(site.span.start, site.span.start),
                text: format!("{ANNOTATION} "),
            }),
        }
    }

    if !rewritten.is_empty() {
        if let Some(module) = &options.runtime_module {
            if !imports_binding(&program, &options.format_function) {
                replacements.push(import_insertion(&program, &options.format_function, module));
            }
        }
    }

    let code = if replacements.is_empty() {
        source.to_string()
    } else {
        apply_replacements(source, replacements)
    };

    Ok(MinifyOutput {
        code,
        rewritten,
        skipped,
    })
}

fn contains(outer: Span, inner: Span) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

fn apply_replacements(source: &str, mut replacements: Vec<Replacement>) -> String {
    // Applied back to front so earlier offsets stay valid.
    replacements.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut result = source.to_string();
    for Replacement { span, text } in replacements {
        result.replace_range((span.start as usize)..(span.end as usize), &text);
    }
    result
}

/// Text of `span` with every pending replacement inside it applied. Those
/// replacements are consumed.
fn render(source: &str, span: Span, replacements: &mut Vec<Replacement>) -> String {
    let (inner, rest): (Vec<_>, Vec<_>) = replacements
        .drain(..)
        .partition(|r| contains(span, r.span));
    *replacements = rest;
    let local = inner
        .into_iter()
        .map(|r| Replacement {
            span: Span::new(r.span.start - span.start, r.span.end - span.start),
            text: r.text,
        })
        .collect();
    apply_replacements(span_text(source, span), local)
}

fn imports_binding(program: &Program, name: &str) -> bool {
    program.body.iter().any(|stmt| match stmt {
        Statement::ImportDeclaration(decl) => decl.specifiers.iter().flatten().any(|spec| {
            let local = match spec {
                ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local.name,
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local.name,
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local.name,
            };
            local.as_str() == name
        }),
        _ => false,
    })
}

/// Import of the decoder, placed after the directive prologue (or hashbang).
fn import_insertion(program: &Program, local: &str, module: &str) -> Replacement {
    let statement = format!("import {local} from '{module}';");
    let prologue_end = program
        .directives
        .last()
        .map(|d| d.span.end)
        .or_else(|| program.hashbang.as_ref().map(|h| h.span.end));
    match prologue_end {
        Some(end) => Replacement {
            span: Span::new(end, end),
            text: format!("\n{statement}"),
        },
        None => Replacement {
            span: Span::new(0, 0),
            text: format!("{statement}\n"),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETECTION MARKERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Enable,
    Disable,
}

fn collect_markers(program: &Program, source: &str) -> Vec<(Span, Marker)> {
    let mut markers: Vec<(Span, Marker)> = program
        .comments
        .iter()
        .filter_map(|comment| {
            let text = span_text(source, comment.span);
            let body = text
                .trim_start_matches("//")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim();
            match body {
                MARKER_ENABLE => Some((comment.span, Marker::Enable)),
                MARKER_DISABLE => Some((comment.span, Marker::Disable)),
                _ => None,
            }
        })
        .collect();
    markers.sort_by_key(|(span, _)| span.start);
    markers
}

/// Marker comment directly preceding `offset`, optionally separated by `throw`.
fn marker_before(markers: &[(Span, Marker)], source: &str, offset: u32) -> Option<Marker> {
    let (span, marker) = markers.iter().rev().find(|(span, _)| span.end <= offset)?;
    let gap = source[span.end as usize..offset as usize].trim();
    (gap.is_empty() || gap == "throw").then_some(*marker)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SITE COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

struct SiteCollector<'s> {
    source: &'s str,
    constructors: HashSet<&'s str>,
    sites: Vec<ErrorCallSite>,
}

impl<'s> SiteCollector<'s> {
    fn record(
        &mut self,
        callee: &Expression,
        arguments: &[Argument],
        span: Span,
        frames: &[GuardFrame],
    ) {
        let Expression::Identifier(ident) = callee else {
            return;
        };
        if !self.constructors.contains(ident.name.as_str()) {
            return;
        }
        let Some(message) = arguments.first().and_then(|arg| arg.as_expression()) else {
            return;
        };
        let Some((template, arg_slots)) = message_slots(message) else {
            return;
        };
        self.sites.push(ErrorCallSite {
            constructor: ident.name.to_string(),
            template,
            args: arg_slots.iter().map(|slot| slot.text(self.source)).collect(),
            verdict: classify(frames),
            span,
            message_span: message.span(),
            arg_slots,
        });
    }
}

impl<'a, 's> GuardVisitor<'a> for SiteCollector<'s> {
    fn visit_new(&mut self, new: &NewExpression<'a>, frames: &[GuardFrame]) {
        self.record(&new.callee, &new.arguments, new.span, frames);
    }

    fn visit_call(&mut self, call: &CallExpression<'a>, frames: &[GuardFrame]) {
        self.record(&call.callee, &call.arguments, call.span, frames);
    }
}

enum Part {
    Text(String),
    Arg(ArgSlot),
}

/// Splits a message expression into a `%s` template and positional argument
/// texts. Returns `None` when the expression is not a message literal.
pub fn extract_message(expr: &Expression, source: &str) -> Option<(String, Vec<String>)> {
    let (template, slots) = message_slots(expr)?;
    Some((template, slots.iter().map(|slot| slot.text(source)).collect()))
}

fn message_slots(expr: &Expression) -> Option<(String, Vec<ArgSlot>)> {
    match expr.without_parentheses() {
        Expression::StringLiteral(_) | Expression::TemplateLiteral(_) => {}
        Expression::BinaryExpression(b) if b.operator == BinaryOperator::Addition => {}
        _ => return None,
    }
    let mut parts = Vec::new();
    collect_parts(expr, &mut parts);
    if !has_text(&parts) {
        return None;
    }
    let mut template = String::new();
    let mut slots = Vec::new();
    for part in parts {
        match part {
            Part::Text(text) => template.push_str(&text),
            Part::Arg(slot) => {
                template.push_str(crate::catalog::PLACEHOLDER);
                slots.push(slot);
            }
        }
    }
    Some((template, slots))
}

fn collect_parts(expr: &Expression, parts: &mut Vec<Part>) {
    match expr.without_parentheses() {
        Expression::StringLiteral(s) => parts.push(Part::Text(s.value.to_string())),
        Expression::TemplateLiteral(t) if t.quasis.iter().all(|q| q.value.cooked.is_some()) => {
            for (i, quasi) in t.quasis.iter().enumerate() {
                if let Some(cooked) = &quasi.value.cooked {
                    parts.push(Part::Text(cooked.to_string()));
                }
                if let Some(e) = t.expressions.get(i) {
                    parts.push(Part::Arg(arg_slot(e)));
                }
            }
        }
        Expression::BinaryExpression(b) if b.operator == BinaryOperator::Addition => {
            let mut left = Vec::new();
            collect_parts(&b.left, &mut left);
            // `a + b + 'x'` adds before it concatenates; keep such a prefix whole.
            if has_text(&left) || is_string_like(&b.right) {
                parts.extend(left);
                collect_parts(&b.right, parts);
            } else {
                parts.push(Part::Arg(arg_slot(expr)));
            }
        }
        _ => parts.push(Part::Arg(arg_slot(expr))),
    }
}

fn has_text(parts: &[Part]) -> bool {
    parts.iter().any(|p| matches!(p, Part::Text(_)))
}

fn is_string_like(expr: &Expression) -> bool {
    matches!(
        expr.without_parentheses(),
        Expression::StringLiteral(_) | Expression::TemplateLiteral(_)
    )
}

fn arg_slot(expr: &Expression) -> ArgSlot {
    ArgSlot {
        span: expr.span(),
        parenthesize: matches!(expr, Expression::SequenceExpression(_)),
    }
}
