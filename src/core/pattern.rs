//! Structural matching of expressions and RTL instructions against templates.
//!
//! A template is an expression tree with capture leaves. `AnyId` matches any
//! identifier and `AnyConstant` any literal; both bind the matched
//! sub-expression under a name. A name used more than once must bind
//! structurally equal expressions everywhere, or the whole match fails.
//! Matching is one-to-one and never backtracks, so the result and the
//! bindings depend only on the template and the tree.

use std::collections::BTreeMap;

use crate::core::expression::{Constant, DataType, Expression, Identifier, Operator};
use crate::core::rtl::{RtlClass, RtlInstruction};

/// Named sub-expressions bound by a successful match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Captures {
    bindings: BTreeMap<String, Expression>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.bindings.get(name)
    }

    pub fn identifier(&self, name: &str) -> Option<&Identifier> {
        self.get(name).and_then(Expression::as_identifier)
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.get(name).and_then(Expression::as_constant)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bind `name`, or check it against an earlier binding.
    fn bind(&mut self, name: &str, e: &Expression) -> bool {
        match self.bindings.get(name) {
            Some(prev) => prev == e,
            None => {
                self.bindings.insert(name.to_string(), e.clone());
                true
            }
        }
    }
}

/// Data type slot of a template node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTypePattern {
    Any,
    Exact(DataType),
}

impl DataTypePattern {
    fn matches(&self, dt: &DataType) -> bool {
        match self {
            DataTypePattern::Any => true,
            DataTypePattern::Exact(d) => d == dt,
        }
    }
}

/// Expression template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionPattern {
    /// Any identifier, bound under the given name
    AnyId(String),
    /// Any constant, bound under the given name
    AnyConstant(String),
    /// Any expression at all, bound under the given name
    AnyExpression(String),
    /// Must equal this expression exactly
    Exact(Expression),
    Binary {
        op: Operator,
        data_type: DataTypePattern,
        left: Box<ExpressionPattern>,
        right: Box<ExpressionPattern>,
    },
    MemoryAccess {
        ea: Box<ExpressionPattern>,
        data_type: DataTypePattern,
    },
}

impl ExpressionPattern {
    pub fn any_id(name: &str) -> Self {
        ExpressionPattern::AnyId(name.to_string())
    }

    pub fn any_constant(name: &str) -> Self {
        ExpressionPattern::AnyConstant(name.to_string())
    }

    pub fn any_expression(name: &str) -> Self {
        ExpressionPattern::AnyExpression(name.to_string())
    }

    pub fn binary(
        op: Operator,
        data_type: DataTypePattern,
        left: ExpressionPattern,
        right: ExpressionPattern,
    ) -> Self {
        ExpressionPattern::Binary {
            op,
            data_type,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn mem(ea: ExpressionPattern, data_type: DataTypePattern) -> Self {
        ExpressionPattern::MemoryAccess {
            ea: Box::new(ea),
            data_type,
        }
    }

    /// Match against `e`, returning fresh bindings on success.
    pub fn matches(&self, e: &Expression) -> Option<Captures> {
        let mut caps = Captures::new();
        self.match_into(e, &mut caps).then_some(caps)
    }

    /// Match against `e`, extending `caps`. On failure `caps` may hold
    /// bindings from the failed attempt; callers discard it.
    pub fn match_into(&self, e: &Expression, caps: &mut Captures) -> bool {
        match (self, e) {
            (ExpressionPattern::AnyId(name), Expression::Identifier(_)) => caps.bind(name, e),
            (ExpressionPattern::AnyConstant(name), Expression::Constant(_)) => caps.bind(name, e),
            (ExpressionPattern::AnyExpression(name), _) => caps.bind(name, e),
            (ExpressionPattern::Exact(x), _) => x == e,
            (
                ExpressionPattern::Binary {
                    op,
                    data_type,
                    left,
                    right,
                },
                Expression::Binary {
                    op: eop,
                    data_type: edt,
                    left: el,
                    right: er,
                },
            ) => {
                op == eop
                    && data_type.matches(edt)
                    && left.match_into(el, caps)
                    && right.match_into(er, caps)
            }
            (
                ExpressionPattern::MemoryAccess { ea, data_type },
                Expression::MemoryAccess {
                    ea: eea,
                    data_type: edt,
                },
            ) => data_type.matches(edt) && ea.match_into(eea, caps),
            _ => false,
        }
    }
}

/// RTL instruction template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtlPattern {
    Assignment {
        dst: ExpressionPattern,
        src: ExpressionPattern,
    },
    /// Goto whose class must equal `class` exactly.
    Goto {
        target: ExpressionPattern,
        class: RtlClass,
    },
    Call {
        target: ExpressionPattern,
        class: RtlClass,
    },
}

impl RtlPattern {
    pub fn assign(dst: ExpressionPattern, src: ExpressionPattern) -> Self {
        RtlPattern::Assignment { dst, src }
    }

    pub fn goto(target: ExpressionPattern, class: RtlClass) -> Self {
        RtlPattern::Goto { target, class }
    }

    pub fn call(target: ExpressionPattern, class: RtlClass) -> Self {
        RtlPattern::Call { target, class }
    }

    pub fn matches(&self, instr: &RtlInstruction) -> Option<Captures> {
        let mut caps = Captures::new();
        self.match_into(instr, &mut caps).then_some(caps)
    }

    pub fn match_into(&self, instr: &RtlInstruction, caps: &mut Captures) -> bool {
        match (self, instr) {
            (RtlPattern::Assignment { dst, src }, RtlInstruction::Assignment { dst: d, src: s }) => {
                dst.match_into(d, caps) && src.match_into(s, caps)
            }
            (
                RtlPattern::Goto { target, class },
                RtlInstruction::Goto {
                    target: t,
                    class: c,
                },
            ) => class == c && target.match_into(t, caps),
            (
                RtlPattern::Call { target, class },
                RtlInstruction::Call {
                    target: t,
                    class: c,
                    ..
                },
            ) => class == c && target.match_into(t, caps),
            _ => false,
        }
    }
}

/// Match `patterns[i]` against `instrs[i]` for every position, sharing one
/// capture namespace. Fails when `instrs` is shorter than `patterns`.
pub fn match_sequence(patterns: &[RtlPattern], instrs: &[RtlInstruction]) -> Option<Captures> {
    if instrs.len() < patterns.len() {
        return None;
    }
    let mut caps = Captures::new();
    patterns
        .iter()
        .zip(instrs)
        .all(|(p, i)| p.match_into(i, &mut caps))
        .then_some(caps)
}
