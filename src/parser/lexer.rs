//! Tokenizer for FHIRPath expressions.
//!
//! Hand-scanned rather than combinator-built: FHIRPath tokens are context
//! sensitive enough (quoted identifiers, `@`-prefixed date/time literals,
//! `%`-prefixed external constants, unit-bearing quantity literals) that a
//! direct scan reads more plainly than a `nom` combinator pipeline, so this
//! module owns the character loop directly. [`crate::parser::span`] still
//! carries `nom_locate`'s `LocatedSpan` so downstream consumers get the same
//! position bookkeeping a combinator-based lexer would produce.

use super::error::{ParseError, ParseResult};
use super::span::Spanned;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer literal text (sign-free, parsed by the grammar layer).
    Integer(String),
    /// Long literal text (`123L`), without the `L` suffix.
    Long(String),
    /// Decimal literal text.
    Decimal(String),
    /// An already-unescaped string literal.
    String(String),
    /// `true` / `false`.
    Boolean(bool),
    /// `@...` date literal text, without the leading `@`.
    Date(String),
    /// `@...T...` datetime literal text, without the leading `@`.
    DateTime(String),
    /// `@T...` time literal text, without the leading `@T`.
    Time(String),
    /// A bare or `` `delimited` `` identifier.
    Identifier(String),
    /// A unit string directly following a number (quantity literal).
    UnitString(String),
    /// `%name` or `` %`name` `` external constant reference.
    ExternalConstant(String),
    /// `$this`
    ThisVar,
    /// `$index`
    IndexVar,
    /// `$total`
    TotalVar,
    /// `{}` empty collection literal.
    EmptyCollection,

    Plus,
    Minus,
    Star,
    Slash,
    Div,
    Mod,
    Ampersand,
    Pipe,
    Eq,
    NotEq,
    Tilde,
    NotTilde,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Xor,
    Implies,
    In,
    Contains,
    Is,
    As,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Eof,
}

/// A token paired with its source span.
pub type SpannedToken = Spanned<Token>;

/// Tokenize an entire FHIRPath source string.
pub fn tokenize(input: &str) -> ParseResult<Vec<SpannedToken>> {
    let mut lexer = Lexer::new(input);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|(_, c)| *c)
    }

    fn byte_offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(b, _)| *b)
            .unwrap_or(self.src.len())
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn run(&mut self) -> ParseResult<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        let mut errors: Vec<crate::error::SyntaxDiagnostic> = Vec::new();

        loop {
            self.skip_trivia();
            let start = self.byte_offset();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Spanned::new(Token::Eof, start, start, line, column));
                break;
            };

            let token = match c {
                '+' => {
                    self.advance();
                    Some(Token::Plus)
                }
                '-' => {
                    self.advance();
                    Some(Token::Minus)
                }
                '*' => {
                    self.advance();
                    Some(Token::Star)
                }
                '/' => {
                    self.advance();
                    Some(Token::Slash)
                }
                '&' => {
                    self.advance();
                    Some(Token::Ampersand)
                }
                '|' => {
                    self.advance();
                    Some(Token::Pipe)
                }
                '.' => {
                    self.advance();
                    Some(Token::Dot)
                }
                ',' => {
                    self.advance();
                    Some(Token::Comma)
                }
                '(' => {
                    self.advance();
                    Some(Token::LParen)
                }
                ')' => {
                    self.advance();
                    Some(Token::RParen)
                }
                '[' => {
                    self.advance();
                    Some(Token::LBracket)
                }
                ']' => {
                    self.advance();
                    Some(Token::RBracket)
                }
                '{' => {
                    self.advance();
                    if self.peek() == Some('}') {
                        self.advance();
                        Some(Token::EmptyCollection)
                    } else {
                        Some(Token::LBrace)
                    }
                }
                '}' => {
                    self.advance();
                    Some(Token::RBrace)
                }
                '=' => {
                    self.advance();
                    Some(Token::Eq)
                }
                '~' => {
                    self.advance();
                    Some(Token::Tilde)
                }
                '!' => {
                    self.advance();
                    match self.peek() {
                        Some('=') => {
                            self.advance();
                            Some(Token::NotEq)
                        }
                        Some('~') => {
                            self.advance();
                            Some(Token::NotTilde)
                        }
                        _ => {
                            errors.push(crate::error::SyntaxDiagnostic::new(
                                line,
                                column,
                                "expected '=' or '~' after '!'",
                            ));
                            None
                        }
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Some(Token::Lte)
                    } else {
                        Some(Token::Lt)
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Some(Token::Gte)
                    } else {
                        Some(Token::Gt)
                    }
                }
                '\'' => match self.scan_string('\'') {
                    Ok(s) => {
                        // A string literal following whitespace cannot be a
                        // unit suffix; the grammar layer decides based on
                        // the previous token whether to treat this as a
                        // quantity unit.
                        Some(Token::String(s))
                    }
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                },
                '"' => match self.scan_string('"') {
                    Ok(s) => Some(Token::String(s)),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                },
                '`' => match self.scan_delimited_identifier() {
                    Ok(s) => Some(Token::Identifier(s)),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                },
                '@' => match self.scan_date_time_literal() {
                    Ok(t) => Some(t),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                },
                '%' => match self.scan_external_constant() {
                    Ok(t) => Some(t),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                },
                '$' => match self.scan_dollar_variable() {
                    Ok(t) => Some(t),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                },
                c if c.is_ascii_digit() => Some(self.scan_number()),
                c if is_ident_start(c) => Some(self.scan_identifier_or_keyword()),
                other => {
                    self.advance();
                    errors.push(crate::error::SyntaxDiagnostic::new(
                        line,
                        column,
                        format!("unexpected character '{other}'"),
                    ));
                    None
                }
            };

            if let Some(tok) = token {
                let end = self.byte_offset();
                tokens.push(Spanned::new(tok, start, end, line, column));
            }
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(ParseError { diagnostics: errors })
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<String, crate::error::SyntaxDiagnostic> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(crate::error::SyntaxDiagnostic::new(
                        line,
                        column,
                        "unterminated string literal",
                    ));
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('`') => out.push('`'),
                    Some('/') => out.push('/'),
                    Some('f') => out.push('\u{0C}'),
                    Some('u') => {
                        let mut hex = String::with_capacity(4);
                        for _ in 0..4 {
                            match self.advance() {
                                Some(h) => hex.push(h),
                                None => {
                                    return Err(crate::error::SyntaxDiagnostic::new(
                                        line,
                                        column,
                                        "incomplete unicode escape",
                                    ));
                                }
                            }
                        }
                        let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                            crate::error::SyntaxDiagnostic::new(
                                line,
                                column,
                                "invalid unicode escape",
                            )
                        })?;
                        if let Some(c) = char::from_u32(code) {
                            out.push(c);
                        }
                    }
                    Some(other) => out.push(other),
                    None => {
                        return Err(crate::error::SyntaxDiagnostic::new(
                            line,
                            column,
                            "unterminated escape sequence",
                        ));
                    }
                },
                Some(c) => out.push(c),
            }
        }
        Ok(out)
    }

    fn scan_delimited_identifier(&mut self) -> Result<String, crate::error::SyntaxDiagnostic> {
        self.scan_string('`')
    }

    fn scan_date_time_literal(&mut self) -> Result<Token, crate::error::SyntaxDiagnostic> {
        let (line, column) = (self.line, self.column);
        self.advance(); // '@'
        if self.peek() == Some('T') {
            self.advance();
            let text = self.scan_while(|c| {
                c.is_ascii_digit() || c == ':' || c == '.' || c == '+' || c == '-' || c == 'Z'
            });
            return Ok(Token::Time(text));
        }
        let text = self.scan_while(|c| {
            c.is_ascii_digit() || c == '-' || c == ':' || c == 'T' || c == '.' || c == '+' || c == 'Z'
        });
        if text.is_empty() {
            return Err(crate::error::SyntaxDiagnostic::new(
                line,
                column,
                "expected date/time literal after '@'",
            ));
        }
        if text.contains('T') {
            Ok(Token::DateTime(text))
        } else {
            Ok(Token::Date(text))
        }
    }

    fn scan_external_constant(&mut self) -> Result<Token, crate::error::SyntaxDiagnostic> {
        self.advance(); // '%'
        if self.peek() == Some('`') {
            let name = self.scan_delimited_identifier()?;
            return Ok(Token::ExternalConstant(name));
        }
        if self.peek() == Some('\'') {
            let name = self.scan_string('\'')?;
            return Ok(Token::ExternalConstant(name));
        }
        let name = self.scan_while(is_ident_continue);
        Ok(Token::ExternalConstant(name))
    }

    fn scan_dollar_variable(&mut self) -> Result<Token, crate::error::SyntaxDiagnostic> {
        let (line, column) = (self.line, self.column);
        self.advance(); // '$'
        let name = self.scan_while(is_ident_continue);
        match name.as_str() {
            "this" => Ok(Token::ThisVar),
            "index" => Ok(Token::IndexVar),
            "total" => Ok(Token::TotalVar),
            _ => Err(crate::error::SyntaxDiagnostic::new(
                line,
                column,
                format!("unknown special variable '${name}'"),
            )),
        }
    }

    fn scan_number(&mut self) -> Token {
        let mut text = self.scan_while(|c| c.is_ascii_digit());
        let mut is_decimal = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            text.push(self.advance().unwrap());
            text.push_str(&self.scan_while(|c| c.is_ascii_digit()));
        }
        if !is_decimal && self.peek() == Some('L') {
            self.advance();
            return Token::Long(text);
        }
        if is_decimal {
            Token::Decimal(text)
        } else {
            Token::Integer(text)
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> Token {
        let text = self.scan_while(is_ident_continue);
        match text.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "div" => Token::Div,
            "mod" => Token::Mod,
            "and" => Token::And,
            "or" => Token::Or,
            "xor" => Token::Xor,
            "implies" => Token::Implies,
            "in" => Token::In,
            "contains" => Token::Contains,
            "is" => Token::Is,
            "as" => Token::As,
            _ => Token::Identifier(text),
        }
    }

    fn scan_while<F: Fn(char) -> bool>(&mut self, pred: F) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if pred(c) {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
        out
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_xid::UnicodeXID::is_xid_start(c)
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || unicode_xid::UnicodeXID::is_xid_continue(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn tokenizes_simple_path() {
        assert_eq!(
            kinds("Patient.name"),
            vec![
                Token::Identifier("Patient".into()),
                Token::Dot,
                Token::Identifier("name".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_comparison_operators() {
        assert_eq!(
            kinds("a <= b"),
            vec![
                Token::Identifier("a".into()),
                Token::Lte,
                Token::Identifier("b".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_quantity_literal() {
        assert_eq!(
            kinds("4 'wk'"),
            vec![
                Token::Integer("4".into()),
                Token::String("wk".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_external_constant_and_dollar_vars() {
        assert_eq!(
            kinds("%resource.where($this = $index)"),
            vec![
                Token::ExternalConstant("resource".into()),
                Token::Dot,
                Token::Identifier("where".into()),
                Token::LParen,
                Token::ThisVar,
                Token::Eq,
                Token::IndexVar,
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
    }
}
