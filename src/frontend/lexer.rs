//! Lexer for Vire
//!
//! Pull-based: the parser asks for one token at a time. Lexical errors are
//! pushed into the diagnostic builder and lexing continues.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{DiagnosticBuilder, Error, Span};

/// The lexer state
pub struct Lexer {
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Start position of current token
    start: usize,
    line: usize,
    column: usize,
    start_line: usize,
    start_column: usize,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance one character, keeping line/column in step
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

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos, self.start_line, self.start_column)
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.pos].iter().collect()
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), self.make_span())
    }

    fn eof_token(&self) -> Token {
        Token::eof(Span::new(self.pos, self.pos, self.line, self.column))
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => {
                    self.advance();
                    self.advance();
                    let mut depth = 1;
                    while depth > 0 && !self.is_at_end() {
                        match (self.peek(), self.peek_next()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                depth -= 1;
                            }
                            (Some('/'), Some('*')) => {
                                self.advance();
                                self.advance();
                                depth += 1;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text = self.lexeme();
        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));
        self.make_token(kind)
    }

    fn read_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Read an int, float or double literal
    fn read_number(&mut self, diags: &mut DiagnosticBuilder) -> Token {
        self.read_digits();

        if self.peek() != Some('.') {
            let text = self.lexeme();
            let value = match text.parse::<i64>() {
                Ok(v) => v,
                Err(_) => {
                    diags.error(Error::MalformedNumber {
                        text: text.clone(),
                        reason: "integer literal is too large".to_string(),
                        span: self.make_span(),
                    });
                    0
                }
            };
            return self.make_token(TokenKind::IntLit(value));
        }

        self.advance(); // consume '.'
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            diags.error(Error::MalformedNumber {
                text: self.lexeme(),
                reason: "expected digit after decimal point".to_string(),
                span: self.make_span(),
            });
        }
        self.read_digits();

        let number_end = self.pos;
        if self.peek() == Some('.') {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                self.advance();
            }
            diags.error(Error::MalformedNumber {
                text: self.lexeme(),
                reason: "more than one decimal point".to_string(),
                span: self.make_span(),
            });
        }

        let text: String = self.source[self.start..number_end].iter().collect();
        let value = text.parse::<f64>().unwrap_or(0.0);

        match self.peek() {
            Some('d') | Some('D') => {
                self.advance();
                self.make_token(TokenKind::DoubleLit(value))
            }
            Some('f') | Some('F') => {
                self.advance();
                self.make_token(TokenKind::FloatLit(value))
            }
            _ => self.make_token(TokenKind::FloatLit(value)),
        }
    }

    /// Decode the character after a backslash
    fn read_escape(&mut self) -> Option<char> {
        let c = self.advance()?;
        Some(match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            other => other,
        })
    }

    /// Read a string literal; end of input before the closing quote yields `Eof`
    fn read_string(&mut self, diags: &mut DiagnosticBuilder) -> Token {
        self.advance(); // opening quote

        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    diags.error(Error::UnterminatedString { span: self.make_span() });
                    return self.eof_token();
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Some(c) = self.read_escape() {
                        value.push(c);
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        self.make_token(TokenKind::StringLit(value))
    }

    fn read_char(&mut self, diags: &mut DiagnosticBuilder) -> Token {
        self.advance(); // opening quote

        let value = match self.peek() {
            Some('\'') => {
                self.advance();
                diags.error(Error::EmptyChar { span: self.make_span() });
                return self.make_token(TokenKind::CharLit('\0'));
            }
            Some('\\') => {
                self.advance();
                self.read_escape()
            }
            Some(_) => self.advance(),
            None => None,
        };

        let Some(value) = value else {
            diags.error(Error::UnterminatedChar { span: self.make_span() });
            return self.eof_token();
        };

        if self.peek() == Some('\'') {
            self.advance();
        } else {
            diags.error(Error::UnterminatedChar { span: self.make_span() });
        }

        self.make_token(TokenKind::CharLit(value))
    }

    /// Get the next token
    pub fn next_token(&mut self, diags: &mut DiagnosticBuilder) -> Token {
        loop {
            self.skip_whitespace();
            self.start = self.pos;
            self.start_line = self.line;
            self.start_column = self.column;

            let Some(c) = self.peek() else {
                return self.eof_token();
            };

            if c.is_ascii_alphabetic() || c == '_' {
                return self.read_identifier();
            }
            if c.is_ascii_digit() {
                return self.read_number(diags);
            }
            if c == '"' {
                return self.read_string(diags);
            }
            if c == '\'' {
                return self.read_char(diags);
            }

            self.advance();
            let kind = match c {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                ';' => TokenKind::Semicolon,
                '.' => TokenKind::Dot,

                '=' => self.select('=', TokenKind::EqEq, TokenKind::Eq),
                '!' => self.select('=', TokenKind::Ne, TokenKind::Bang),
                '<' => self.select('=', TokenKind::Le, TokenKind::Lt),
                '>' => self.select('=', TokenKind::Ge, TokenKind::Gt),
                '/' => self.select('=', TokenKind::SlashEq, TokenKind::Slash),
                '%' => self.select('=', TokenKind::PercentEq, TokenKind::Percent),
                '&' => self.select('&', TokenKind::AndAnd, TokenKind::Amp),
                '+' => match self.peek() {
                    Some('+') => {
                        self.advance();
                        TokenKind::PlusPlus
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::PlusEq
                    }
                    _ => TokenKind::Plus,
                },
                '-' => match self.peek() {
                    Some('-') => {
                        self.advance();
                        TokenKind::MinusMinus
                    }
                    Some('>') => {
                        self.advance();
                        TokenKind::Arrow
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::MinusEq
                    }
                    _ => TokenKind::Minus,
                },
                '*' => match self.peek() {
                    Some('*') => {
                        self.advance();
                        TokenKind::StarStar
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::StarEq
                    }
                    _ => TokenKind::Star,
                },
                '|' if self.peek() == Some('|') => {
                    self.advance();
                    TokenKind::OrOr
                }
                other => {
                    diags.error(Error::UnknownChar {
                        ch: other,
                        span: self.make_span(),
                    });
                    continue;
                }
            };

            return self.make_token(kind);
        }
    }

    /// Consume `next` if it follows, choosing between the two-char and one-char kinds
    fn select(&mut self, next: char, long: TokenKind, short: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance();
            long
        } else {
            short
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub fn tokenize(&mut self, diags: &mut DiagnosticBuilder) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(diags);
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;
    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> (Vec<TokenKind>, DiagnosticBuilder) {
        let mut diags = DiagnosticBuilder::new();
        let tokens = Lexer::new(source).tokenize(&mut diags);
        (tokens.into_iter().map(|t| t.kind).collect(), diags)
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let (kinds, diags) = lex("func main var x let const returns integer");
        assert!(diags.is_empty());
        assert_eq!(
            kinds,
            vec![
                TokenKind::Func,
                TokenKind::Ident("main".into()),
                TokenKind::Var,
                TokenKind::Ident("x".into()),
                TokenKind::Let,
                TokenKind::Const,
                TokenKind::Returns,
                TokenKind::Ident("integer".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        let (kinds, _) = lex("== = ++ += + -- -> -= - ** *= * != ! <= < >= > && & || /= %=");
        assert_eq!(
            kinds,
            vec![
                TokenKind::EqEq, TokenKind::Eq, TokenKind::PlusPlus, TokenKind::PlusEq,
                TokenKind::Plus, TokenKind::MinusMinus, TokenKind::Arrow, TokenKind::MinusEq,
                TokenKind::Minus, TokenKind::StarStar, TokenKind::StarEq, TokenKind::Star,
                TokenKind::Ne, TokenKind::Bang, TokenKind::Le, TokenKind::Lt, TokenKind::Ge,
                TokenKind::Gt, TokenKind::AndAnd, TokenKind::Amp, TokenKind::OrOr,
                TokenKind::SlashEq, TokenKind::PercentEq, TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numeric_literals() {
        let (kinds, diags) = lex("42 1.5 2.25f 3.5d 7.0D");
        assert!(diags.is_empty());
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntLit(42),
                TokenKind::FloatLit(1.5),
                TokenKind::FloatLit(2.25),
                TokenKind::DoubleLit(3.5),
                TokenKind::DoubleLit(7.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_second_decimal_point_is_an_error() {
        let (kinds, diags) = lex("1.2.3 x");
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.diagnostics()[0].kind, ErrorKind::MalformedNumber);
        assert_eq!(kinds[0], TokenKind::FloatLit(1.2));
        assert_eq!(kinds[1], TokenKind::Ident("x".into()));
    }

    #[test]
    fn test_string_and_char_literals() {
        let (kinds, diags) = lex(r#""hi\n" 'a' '\t'"#);
        assert!(diags.is_empty());
        assert_eq!(
            kinds,
            vec![
                TokenKind::StringLit("hi\n".into()),
                TokenKind::CharLit('a'),
                TokenKind::CharLit('\t'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_empty_char_literal_keeps_next_quote() {
        let (kinds, diags) = lex("'' 'b'");
        assert_eq!(
            kinds,
            vec![TokenKind::CharLit('\0'), TokenKind::CharLit('b'), TokenKind::Eof]
        );
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.diagnostics()[0].kind, ErrorKind::UnterminatedLiteral);
        assert_eq!(diags.diagnostics()[0].message, "Empty character literal");
    }

    #[test]
    fn test_unterminated_char_literal() {
        let (kinds, diags) = lex("'a");
        assert_eq!(kinds, vec![TokenKind::CharLit('a'), TokenKind::Eof]);
        assert_eq!(diags.diagnostics()[0].kind, ErrorKind::UnterminatedLiteral);

        let (kinds, diags) = lex("x = '");
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
        assert_eq!(kinds.len(), 3);
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_unterminated_string_returns_eof() {
        let (kinds, diags) = lex("var s = \"abc");
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
        assert_eq!(kinds.len(), 4);
        assert_eq!(diags.diagnostics()[0].kind, ErrorKind::UnterminatedLiteral);
    }

    #[test]
    fn test_unknown_characters_are_skipped() {
        let (kinds, diags) = lex("a $ b @ |");
        assert_eq!(
            kinds,
            vec![TokenKind::Ident("a".into()), TokenKind::Ident("b".into()), TokenKind::Eof]
        );
        assert_eq!(diags.error_count(), 3);
        assert!(diags.errors().all(|d| d.kind == ErrorKind::UnknownChar));
    }

    #[test]
    fn test_positions_are_one_based() {
        let mut diags = DiagnosticBuilder::new();
        let tokens = Lexer::new("var x;\n  // comment\n  x = 1;").tokenize(&mut diags);
        assert_eq!((tokens[0].span.line, tokens[0].span.column), (1, 1));
        assert_eq!((tokens[1].span.line, tokens[1].span.column), (1, 5));
        assert_eq!((tokens[3].span.line, tokens[3].span.column), (3, 3));
        assert_eq!(tokens[3].text, "x");
    }

    #[test]
    fn test_nested_block_comment() {
        let (kinds, _) = lex("/* a /* b */ c */ done");
        assert_eq!(kinds, vec![TokenKind::Ident("done".into()), TokenKind::Eof]);
    }
}
