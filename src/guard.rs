//! Production guard classification.
//!
//! Answers one question for a position in a syntax tree: is it provably
//! unreachable when `process.env.NODE_ENV === 'production'`? Only a restricted,
//! syntactically local family of tests is recognized:
//!
//! - `process.env.NODE_ENV === <literal>` / `!== <literal>`, either operand order;
//! - `A && B` / `A || B` where the guard is the left operand `A`.
//!
//! Anything else (negation, aliases, function arguments, guards on the right of
//! a logical composite) proves nothing, and failing to prove a guard always
//! means "reachable in production".

use oxc_ast::ast::{Expression, StaticMemberExpression};
use oxc_ast_visit::Visit;
use oxc_span::GetSpan;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator};
use serde::{Deserialize, Serialize};

use crate::parse::span_text;

pub const PRODUCTION: &str = "production";

// ═══════════════════════════════════════════════════════════════════════════════
// VERDICT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardVerdict {
    /// No enclosing test mentions the environment mode.
    Unguarded,
    /// Provably never runs in production.
    DevOnly,
    /// Provably runs only in production.
    ProdOnly,
    /// Near an environment check that does not have the canonical shape.
    Unproven,
}

impl GuardVerdict {
    /// Whether the position can execute in a production build.
    pub fn is_production_reachable(self) -> bool {
        !matches!(self, GuardVerdict::DevOnly)
    }

    /// Whether an environment guard decides reachability of the position.
    pub fn is_env_guarded(self) -> bool {
        matches!(self, GuardVerdict::DevOnly | GuardVerdict::ProdOnly)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENCLOSING TEST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityOperator {
    StrictEqual,
    StrictNotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKind {
    And,
    Or,
}

/// Literal operand of a NODE_ENV comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparedValue {
    /// String value (quotes removed).
    Str(String),
    /// Number, boolean, null or bigint literal, as written.
    Other(String),
}

impl ComparedValue {
    pub fn is_production(&self) -> bool {
        matches!(self, ComparedValue::Str(s) if s == PRODUCTION)
    }
}

/// Abstraction of a conditional's test expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnclosingTest {
    NodeEnvComparison {
        operator: EqualityOperator,
        literal_side: LiteralSide,
        compared_value: ComparedValue,
    },
    LogicalComposite {
        operator: LogicalKind,
        left: Box<EnclosingTest>,
        right: Box<EnclosingTest>,
    },
    Opaque {
        mentions_node_env: bool,
    },
}

/// What a test outcome establishes about the environment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeFact {
    Production,
    NotProduction,
}

impl EnclosingTest {
    pub fn from_expression(expr: &Expression, source: &str) -> Self {
        match expr.without_parentheses() {
            Expression::BinaryExpression(binary) => {
                let operator = match binary.operator {
                    BinaryOperator::StrictEquality => EqualityOperator::StrictEqual,
                    BinaryOperator::StrictInequality => EqualityOperator::StrictNotEqual,
                    _ => return Self::opaque(expr),
                };
                let (literal_side, comparand) = if is_node_env(&binary.left) {
                    (LiteralSide::Right, &binary.right)
                } else if is_node_env(&binary.right) {
                    (LiteralSide::Left, &binary.left)
                } else {
                    return Self::opaque(expr);
                };
                match literal_value(comparand, source) {
                    Some(compared_value) => EnclosingTest::NodeEnvComparison {
                        operator,
                        literal_side,
                        compared_value,
                    },
                    None => EnclosingTest::Opaque {
                        mentions_node_env: true,
                    },
                }
            }
            Expression::LogicalExpression(logical) => {
                let operator = match logical.operator {
                    LogicalOperator::And => LogicalKind::And,
                    LogicalOperator::Or => LogicalKind::Or,
                    LogicalOperator::Coalesce => return Self::opaque(expr),
                };
                EnclosingTest::LogicalComposite {
                    operator,
                    left: Box::new(Self::from_expression(&logical.left, source)),
                    right: Box::new(Self::from_expression(&logical.right, source)),
                }
            }
            _ => Self::opaque(expr),
        }
    }

    fn opaque(expr: &Expression) -> Self {
        let mut finder = NodeEnvFinder { found: false };
        finder.visit_expression(expr);
        EnclosingTest::Opaque {
            mentions_node_env: finder.found,
        }
    }

    pub fn mentions_node_env(&self) -> bool {
        match self {
            EnclosingTest::NodeEnvComparison { .. } => true,
            EnclosingTest::LogicalComposite { left, right, .. } => {
                left.mentions_node_env() || right.mentions_node_env()
            }
            EnclosingTest::Opaque { mentions_node_env } => *mentions_node_env,
        }
    }

    /// What the test evaluating to `outcome` proves. Only the left operand of a
    /// logical composite is examined, and only when the operator makes it
    /// dominate that outcome.
    fn proves(&self, outcome: bool) -> Option<ModeFact> {
        match self {
            EnclosingTest::NodeEnvComparison {
                operator,
                compared_value,
                ..
            } => {
                // Does the outcome establish NODE_ENV === compared_value?
                let equal = match operator {
                    EqualityOperator::StrictEqual => outcome,
                    EqualityOperator::StrictNotEqual => !outcome,
                };
                if compared_value.is_production() {
                    Some(if equal {
                        ModeFact::Production
                    } else {
                        ModeFact::NotProduction
                    })
                } else if equal {
                    Some(ModeFact::NotProduction)
                } else {
                    None
                }
            }
            EnclosingTest::LogicalComposite {
                operator: LogicalKind::And,
                left,
                ..
            } if outcome => left.proves(true),
            EnclosingTest::LogicalComposite {
                operator: LogicalKind::Or,
                left,
                ..
            } if !outcome => left.proves(false),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Consequent,
    Alternate,
}

/// One enclosing conditional of a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardFrame {
    pub branch: Branch,
    pub test: EnclosingTest,
}

impl GuardFrame {
    pub fn new(branch: Branch, test: EnclosingTest) -> Self {
        Self { branch, test }
    }

    /// The verdict this frame alone proves, if any.
    pub fn proof(&self) -> Option<GuardVerdict> {
        let outcome = self.branch == Branch::Consequent;
        self.test.proves(outcome).map(|fact| match fact {
            ModeFact::NotProduction => GuardVerdict::DevOnly,
            ModeFact::Production => GuardVerdict::ProdOnly,
        })
    }
}

/// Classifies a position from its enclosing frames, ordered root to leaf.
///
/// Frames are examined innermost first and the first proof wins. Without a
/// proof the verdict is `Unproven` when some frame still mentions
/// `process.env.NODE_ENV`, otherwise `Unguarded`.
pub fn classify(frames: &[GuardFrame]) -> GuardVerdict {
    let mut near_guard = false;
    for frame in frames.iter().rev() {
        if let Some(verdict) = frame.proof() {
            return verdict;
        }
        near_guard |= frame.test.mentions_node_env();
    }
    if near_guard {
        GuardVerdict::Unproven
    } else {
        GuardVerdict::Unguarded
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE_ENV RECOGNITION
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches `process.env.NODE_ENV` (parentheses allowed, optional chains not).
pub fn is_node_env(expr: &Expression) -> bool {
    match expr.without_parentheses() {
        Expression::StaticMemberExpression(member) => is_node_env_member(member),
        _ => false,
    }
}

pub fn is_node_env_member(member: &StaticMemberExpression) -> bool {
    if member.optional || member.property.name != "NODE_ENV" {
        return false;
    }
    match member.object.without_parentheses() {
        Expression::StaticMemberExpression(env) => {
            !env.optional
                && env.property.name == "env"
                && matches!(env.object.without_parentheses(), Expression::Identifier(id) if id.name == "process")
        }
        _ => false,
    }
}

/// Value of a literal comparand, or `None` for anything that is not a literal.
pub fn literal_value(expr: &Expression, source: &str) -> Option<ComparedValue> {
    match expr.without_parentheses() {
        Expression::StringLiteral(s) => Some(ComparedValue::Str(s.value.to_string())),
        Expression::TemplateLiteral(t) if t.expressions.is_empty() => t
            .quasis
            .first()
            .and_then(|q| q.value.cooked.as_ref())
            .map(|cooked| ComparedValue::Str(cooked.to_string())),
        lit @ (Expression::NumericLiteral(_)
        | Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::BigIntLiteral(_)) => {
            Some(ComparedValue::Other(span_text(source, lit.span()).to_string()))
        }
        _ => None,
    }
}

struct NodeEnvFinder {
    found: bool,
}

impl<'a> Visit<'a> for NodeEnvFinder {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if is_node_env_member(it) {
            self.found = true;
            return;
        }
        oxc_ast_visit::walk::walk_static_member_expression(self, it);
    }
}
