//! Recursive-descent / precedence-climbing parser producing the typed AST.
//!
//! Precedence, tightest to loosest, follows the official FHIRPath grammar
//! (the same ordering the ANTLR-generated recognizer enforces):
//! `term/invocation/indexer/polarity > multiplicative > additive >
//! type(is/as) > union > inequality > equality > membership > and > or/xor
//! > implies`.

use super::error::{ParseError, ParseResult};
use super::lexer::{tokenize, SpannedToken, Token};
use crate::ast::{
    BinaryOperator, ExprKind, ExpressionNode, LiteralValue, PathSegment, Span, TypeSpecifier,
    UnaryOperator,
};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a full FHIRPath expression string into a typed AST.
pub fn parse_expression(input: &str) -> ParseResult<ExpressionNode> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        errors: Vec::new(),
    };
    let expr = parser.parse_implies();
    if !matches!(parser.peek().value, Token::Eof) {
        let tok = parser.peek();
        parser.errors.push(crate::error::SyntaxDiagnostic::new(
            tok.line,
            tok.column,
            format!("unexpected trailing token {:?}", tok.value),
        ));
    }
    if !parser.errors.is_empty() {
        return Err(ParseError {
            diagnostics: parser.errors,
        });
    }
    expr.ok_or_else(|| ParseError::single(1, 1, "empty expression"))
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    errors: Vec<crate::error::SyntaxDiagnostic>,
}

impl Parser {
    fn peek(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_token(&self) -> &Token {
        &self.peek().value
    }

    fn advance(&mut self) -> SpannedToken {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek_token() == tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token, what: &str) -> bool {
        if self.eat(tok) {
            true
        } else {
            let cur = self.peek().clone();
            self.errors.push(crate::error::SyntaxDiagnostic::new(
                cur.line,
                cur.column,
                format!("expected {what}, found {:?}", cur.value),
            ));
            false
        }
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let cur = self.peek();
        self.errors
            .push(crate::error::SyntaxDiagnostic::new(cur.line, cur.column, message));
    }

    fn span_from(&self, start_tok: &SpannedToken) -> Span {
        let end = self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].end;
        Span::new(start_tok.start, end.max(start_tok.start), start_tok.line, start_tok.column)
    }

    // --- precedence ladder, loosest first ---

    fn parse_implies(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_or()?;
        while self.eat(&Token::Implies) {
            let right = self.parse_or()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op: BinaryOperator::Implies,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_or(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_and()?;
        loop {
            let op = match self.peek_token() {
                Token::Or => BinaryOperator::Or,
                Token::Xor => BinaryOperator::Xor,
                _ => break,
            };
            self.advance();
            let right = self.parse_and()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_and(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_membership()?;
        while self.eat(&Token::And) {
            let right = self.parse_membership()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op: BinaryOperator::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_membership(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_equality()?;
        loop {
            let op = match self.peek_token() {
                Token::In => BinaryOperator::In,
                Token::Contains => BinaryOperator::Contains,
                _ => break,
            };
            self.advance();
            let right = self.parse_equality()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_inequality()?;
        loop {
            let op = match self.peek_token() {
                Token::Eq => BinaryOperator::Equal,
                Token::NotEq => BinaryOperator::NotEqual,
                Token::Tilde => BinaryOperator::Equivalent,
                Token::NotTilde => BinaryOperator::NotEquivalent,
                _ => break,
            };
            self.advance();
            let right = self.parse_inequality()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_inequality(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_union()?;
        loop {
            let op = match self.peek_token() {
                Token::Lt => BinaryOperator::LessThan,
                Token::Lte => BinaryOperator::LessOrEqual,
                Token::Gt => BinaryOperator::GreaterThan,
                Token::Gte => BinaryOperator::GreaterOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_union()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_union(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_type_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_type_expr()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op: BinaryOperator::Union,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_type_expr(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_additive()?;
        loop {
            if self.eat(&Token::Is) {
                let ts = self.parse_type_specifier()?;
                left = ExpressionNode::new(
                    ExprKind::Is {
                        expr: Box::new(left),
                        type_specifier: ts,
                    },
                    self.span_from(&start),
                );
            } else if self.eat(&Token::As) {
                let ts = self.parse_type_specifier()?;
                left = ExpressionNode::new(
                    ExprKind::As {
                        expr: Box::new(left),
                        type_specifier: ts,
                    },
                    self.span_from(&start),
                );
            } else {
                break;
            }
        }
        Some(left)
    }

    fn parse_type_specifier(&mut self) -> Option<TypeSpecifier> {
        let first = self.parse_ident_name()?;
        if self.eat(&Token::Dot) {
            let second = self.parse_ident_name()?;
            Some(TypeSpecifier {
                namespace: Some(first),
                name: second,
            })
        } else {
            Some(TypeSpecifier {
                namespace: None,
                name: first,
            })
        }
    }

    fn parse_ident_name(&mut self) -> Option<String> {
        if let Token::Identifier(name) = self.peek_token().clone() {
            self.advance();
            Some(name)
        } else {
            self.error_here("expected identifier");
            None
        }
    }

    fn parse_additive(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                Token::Ampersand => BinaryOperator::Concat,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_multiplicative(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut left = self.parse_polarity()?;
        loop {
            let op = match self.peek_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Div => BinaryOperator::Div,
                Token::Mod => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_polarity()?;
            left = ExpressionNode::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(&start),
            );
        }
        Some(left)
    }

    fn parse_polarity(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let op = match self.peek_token() {
            Token::Plus => Some(UnaryOperator::Plus),
            Token::Minus => Some(UnaryOperator::Minus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_polarity()?;
            return Some(ExpressionNode::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                self.span_from(&start),
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let mut expr = self.parse_term()?;
        loop {
            if self.eat(&Token::Dot) {
                let segment = self.parse_invocation_segment()?;
                expr = ExpressionNode::new(
                    ExprKind::Path {
                        base: Some(Box::new(expr)),
                        segment,
                    },
                    self.span_from(&start),
                );
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_implies()?;
                self.expect(&Token::RBracket, "']'");
                expr = ExpressionNode::new(
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    self.span_from(&start),
                );
            } else {
                break;
            }
        }
        Some(expr)
    }

    fn parse_invocation_segment(&mut self) -> Option<PathSegment> {
        match self.peek_token().clone() {
            Token::ThisVar => {
                self.advance();
                Some(PathSegment::This)
            }
            Token::IndexVar => {
                self.advance();
                Some(PathSegment::Index)
            }
            Token::TotalVar => {
                self.advance();
                Some(PathSegment::Total)
            }
            Token::Identifier(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.parse_arg_list()?;
                    Some(PathSegment::Function { name, args })
                } else {
                    Some(PathSegment::Identifier(name))
                }
            }
            // Keywords can also appear as member/function names after '.',
            // e.g. `.as(String)`, `.is(Foo)`, `.contains('x')`.
            Token::As | Token::Is | Token::In | Token::Contains | Token::Div | Token::Mod => {
                let name = self.keyword_text();
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.parse_arg_list()?;
                    Some(PathSegment::Function { name, args })
                } else {
                    Some(PathSegment::Identifier(name))
                }
            }
            _ => {
                self.error_here("expected identifier, '$this', '$index', or '$total' after '.'");
                None
            }
        }
    }

    fn keyword_text(&self) -> String {
        match self.peek_token() {
            Token::As => "as",
            Token::Is => "is",
            Token::In => "in",
            Token::Contains => "contains",
            Token::Div => "div",
            Token::Mod => "mod",
            _ => "",
        }
        .to_string()
    }

    fn parse_arg_list(&mut self) -> Option<Vec<ExpressionNode>> {
        let mut args = Vec::new();
        if self.check(&Token::RParen) {
            self.advance();
            return Some(args);
        }
        loop {
            args.push(self.parse_implies()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            break;
        }
        self.expect(&Token::RParen, "')'");
        Some(args)
    }

    fn parse_term(&mut self) -> Option<ExpressionNode> {
        let start = self.peek().clone();
        let kind = match self.peek_token().clone() {
            Token::Integer(text) => {
                self.advance();
                match text.parse::<i64>() {
                    Ok(v) => self.maybe_quantity(ExprKind::Literal(LiteralValue::Integer(v))),
                    Err(_) => {
                        self.error_here("integer literal out of range");
                        return None;
                    }
                }
            }
            Token::Long(text) => {
                self.advance();
                match text.parse::<i64>() {
                    Ok(v) => ExprKind::Literal(LiteralValue::Long(v)),
                    Err(_) => {
                        self.error_here("long literal out of range");
                        return None;
                    }
                }
            }
            Token::Decimal(text) => {
                self.advance();
                match Decimal::from_str(&text) {
                    Ok(v) => self.maybe_quantity(ExprKind::Literal(LiteralValue::Decimal(v))),
                    Err(_) => {
                        self.error_here("invalid decimal literal");
                        return None;
                    }
                }
            }
            Token::String(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::String(s))
            }
            Token::Boolean(b) => {
                self.advance();
                ExprKind::Literal(LiteralValue::Boolean(b))
            }
            Token::Date(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::Date(s))
            }
            Token::DateTime(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::DateTime(s))
            }
            Token::Time(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::Time(s))
            }
            Token::EmptyCollection => {
                self.advance();
                ExprKind::Literal(LiteralValue::Null)
            }
            Token::ExternalConstant(name) => {
                self.advance();
                ExprKind::ExternalConstant(name)
            }
            Token::ThisVar => {
                self.advance();
                ExprKind::Path {
                    base: None,
                    segment: PathSegment::This,
                }
            }
            Token::IndexVar => {
                self.advance();
                ExprKind::Path {
                    base: None,
                    segment: PathSegment::Index,
                }
            }
            Token::TotalVar => {
                self.advance();
                ExprKind::Path {
                    base: None,
                    segment: PathSegment::Total,
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_implies()?;
                self.expect(&Token::RParen, "')'");
                ExprKind::Parenthesized(Box::new(inner))
            }
            Token::Identifier(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.parse_arg_list()?;
                    ExprKind::Path {
                        base: None,
                        segment: PathSegment::Function { name, args },
                    }
                } else {
                    ExprKind::Path {
                        base: None,
                        segment: PathSegment::Identifier(name),
                    }
                }
            }
            other => {
                let tok = self.peek().clone();
                self.errors.push(crate::error::SyntaxDiagnostic::new(
                    tok.line,
                    tok.column,
                    format!("unexpected token {other:?} in expression"),
                ));
                return None;
            }
        };
        Some(ExpressionNode::new(kind, self.span_from(&start)))
    }

    /// A number term may be immediately followed by a unit string or bare
    /// calendar-duration keyword, forming a quantity literal.
    fn maybe_quantity(&mut self, number_kind: ExprKind) -> ExprKind {
        let ExprKind::Literal(lit) = &number_kind else {
            return number_kind;
        };
        let value = match lit {
            LiteralValue::Integer(v) => Decimal::from(*v),
            LiteralValue::Decimal(v) => *v,
            _ => return number_kind,
        };
        if let Token::String(unit) = self.peek_token().clone() {
            self.advance();
            return ExprKind::Literal(LiteralValue::Quantity(value, Some(unit)));
        }
        if let Token::Identifier(name) = self.peek_token().clone() {
            if is_calendar_duration_unit(&name) {
                self.advance();
                return ExprKind::Literal(LiteralValue::Quantity(value, Some(name)));
            }
        }
        number_kind
    }
}

fn is_calendar_duration_unit(name: &str) -> bool {
    matches!(
        name,
        "year"
            | "years"
            | "month"
            | "months"
            | "week"
            | "weeks"
            | "day"
            | "days"
            | "hour"
            | "hours"
            | "minute"
            | "minutes"
            | "second"
            | "seconds"
            | "millisecond"
            | "milliseconds"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_path() {
        let ast = parse_expression("Patient.name.given").unwrap();
        match ast.kind {
            ExprKind::Path { segment, .. } => {
                assert_eq!(segment, PathSegment::Identifier("given".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_function_call_with_args() {
        let ast = parse_expression("name.where(use = 'official')").unwrap();
        match ast.kind {
            ExprKind::Path {
                segment: PathSegment::Function { name, args },
                ..
            } => {
                assert_eq!(name, "where");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_quantity_literal() {
        let ast = parse_expression("3 'min' + 120 's'").unwrap();
        match ast.kind {
            ExprKind::Binary { op, left, .. } => {
                assert_eq!(op, BinaryOperator::Add);
                assert!(matches!(
                    left.kind,
                    ExprKind::Literal(LiteralValue::Quantity(_, Some(_)))
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn respects_precedence_of_and_or() {
        // `a and b or c` should parse as `(a and b) or c`.
        let ast = parse_expression("true and false or true").unwrap();
        match ast.kind {
            ExprKind::Binary {
                op: BinaryOperator::Or,
                left,
                ..
            } => {
                assert!(matches!(
                    left.kind,
                    ExprKind::Binary {
                        op: BinaryOperator::And,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_aggregated_syntax_errors() {
        let err = parse_expression("Patient..name").unwrap_err();
        assert!(!err.diagnostics.is_empty());
    }

    #[test]
    fn parses_is_as_type_specifier() {
        let ast = parse_expression("value as Quantity").unwrap();
        match ast.kind {
            ExprKind::As { type_specifier, .. } => {
                assert_eq!(type_specifier.name, "Quantity");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn indexer_and_invocation_compose() {
        let ast = parse_expression("name[0].given").unwrap();
        match ast.kind {
            ExprKind::Path { base, .. } => {
                assert!(matches!(base.unwrap().kind, ExprKind::Index { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
