// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Visitor pattern for AST traversal.

use super::expression::{ExprKind, ExpressionNode, LiteralValue, PathSegment, TypeSpecifier};
use super::operator::{BinaryOperator, UnaryOperator};

/// Trait for visiting AST nodes. Default method bodies walk children via
/// [`walk_expression`] so implementors only need to override the shapes
/// they care about.
pub trait Visitor: Sized {
    /// The result type of visiting a node.
    type Result: Default;

    /// Visit any expression node; dispatches by kind.
    fn visit_expression(&mut self, expr: &ExpressionNode) -> Self::Result {
        walk_expression(self, expr)
    }

    /// Visit a literal.
    fn visit_literal(&mut self, _literal: &LiteralValue) -> Self::Result {
        Self::Result::default()
    }

    /// Visit an external constant (`%name`).
    fn visit_external_constant(&mut self, _name: &str) -> Self::Result {
        Self::Result::default()
    }

    /// Visit a `base.segment` path node.
    fn visit_path(
        &mut self,
        base: Option<&ExpressionNode>,
        _segment: &PathSegment,
    ) -> Self::Result {
        if let Some(base) = base {
            self.visit_expression(base)
        } else {
            Self::Result::default()
        }
    }

    /// Visit an indexer `base[index]`.
    fn visit_index(&mut self, base: &ExpressionNode, index: &ExpressionNode) -> Self::Result {
        self.visit_expression(base);
        self.visit_expression(index)
    }

    /// Visit a unary operator application.
    fn visit_unary(&mut self, _op: UnaryOperator, operand: &ExpressionNode) -> Self::Result {
        self.visit_expression(operand)
    }

    /// Visit a binary operator application.
    fn visit_binary(
        &mut self,
        _op: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
    ) -> Self::Result {
        self.visit_expression(left);
        self.visit_expression(right)
    }

    /// Visit `expr is T`.
    fn visit_is(&mut self, expr: &ExpressionNode, _type_specifier: &TypeSpecifier) -> Self::Result {
        self.visit_expression(expr)
    }

    /// Visit `expr as T`.
    fn visit_as(&mut self, expr: &ExpressionNode, _type_specifier: &TypeSpecifier) -> Self::Result {
        self.visit_expression(expr)
    }

    /// Visit a bare type specifier term.
    fn visit_type_specifier_term(&mut self, _type_specifier: &TypeSpecifier) -> Self::Result {
        Self::Result::default()
    }
}

/// Default expression walk: dispatches to the matching `visit_*` method.
pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &ExpressionNode) -> V::Result {
    match &expr.kind {
        ExprKind::Literal(lit) => visitor.visit_literal(lit),
        ExprKind::ExternalConstant(name) => visitor.visit_external_constant(name),
        ExprKind::Path { base, segment } => {
            visitor.visit_path(base.as_ref().map(|b| b.as_ref()), segment)
        }
        ExprKind::Index { base, index } => visitor.visit_index(base, index),
        ExprKind::Unary { op, operand } => visitor.visit_unary(*op, operand),
        ExprKind::Binary { op, left, right } => visitor.visit_binary(*op, left, right),
        ExprKind::Is {
            expr,
            type_specifier,
        } => visitor.visit_is(expr, type_specifier),
        ExprKind::As {
            expr,
            type_specifier,
        } => visitor.visit_as(expr, type_specifier),
        ExprKind::TypeSpecifierTerm(ts) => visitor.visit_type_specifier_term(ts),
        ExprKind::Parenthesized(inner) => visitor.visit_expression(inner),
    }
}

/// Collect every function name invoked anywhere in an expression tree --
/// used by the compiler's arity-validation pass and by `EvaluationContext`
/// dumps for diagnostics.
pub struct FunctionNameCollector {
    /// Function names encountered, in visitation order (not deduplicated).
    pub names: Vec<String>,
}

impl Default for FunctionNameCollector {
    fn default() -> Self {
        Self { names: Vec::new() }
    }
}

impl Visitor for FunctionNameCollector {
    type Result = ();

    fn visit_path(&mut self, base: Option<&ExpressionNode>, segment: &PathSegment) -> Self::Result {
        if let PathSegment::Function { name, args } = segment {
            self.names.push(name.clone());
            for arg in args {
                self.visit_expression(arg);
            }
        }
        if let Some(base) = base {
            self.visit_expression(base);
        }
    }
}
