//! Token definitions for Vire

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw lexeme, used for operator precedence lookup and messages
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn eof(span: Span) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            span,
        }
    }

    /// Text shown in "got ..." messages
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of file".to_string(),
            _ => self.text.clone(),
        }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// func
    Func,
    /// proto
    Proto,
    /// extern
    Extern,
    /// class
    Class,
    /// extends
    Extends,
    /// struct
    Struct,
    /// union
    Union,
    /// var
    Var,
    /// let
    Let,
    /// const
    Const,
    /// if
    If,
    /// else
    Else,
    /// for
    For,
    /// while
    While,
    /// return
    Return,
    /// returns
    Returns,
    /// break
    Break,
    /// continue
    Continue,
    /// true
    True,
    /// false
    False,
    /// new
    New,
    /// delete
    Delete,
    /// unsafe
    Unsafe,

    // ============ Reserved ============
    // Lexed as keywords so they stay unavailable as names; no syntax uses them yet.
    /// as
    As,
    /// try
    Try,
    /// catch / except
    Catch,
    /// constructor
    Constructor,

    // ============ Literals ============
    Ident(String),
    IntLit(i64),
    FloatLit(f64),
    DoubleLit(f64),
    CharLit(char),
    StringLit(String),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// **
    StarStar,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// ! (not)
    Bang,
    /// && (or `and`)
    AndAnd,
    /// || (or `or`)
    OrOr,
    /// & (reference)
    Amp,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,
    /// +=
    PlusEq,
    /// -=
    MinusEq,
    /// *=
    StarEq,
    /// /=
    SlashEq,
    /// %=
    PercentEq,
    /// ->
    Arrow,

    // ============ Delimiters ============
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ,
    Comma,
    /// :
    Colon,
    /// ;
    Semicolon,
    /// .
    Dot,

    // ============ Special ============
    /// End of file
    Eof,
}

impl TokenKind {
    /// Map identifier text to a keyword kind
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "func" => Some(TokenKind::Func),
            "proto" => Some(TokenKind::Proto),
            "extern" => Some(TokenKind::Extern),
            "class" => Some(TokenKind::Class),
            "extends" => Some(TokenKind::Extends),
            "struct" => Some(TokenKind::Struct),
            "union" => Some(TokenKind::Union),
            "var" => Some(TokenKind::Var),
            "let" => Some(TokenKind::Let),
            "const" => Some(TokenKind::Const),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "for" => Some(TokenKind::For),
            "while" => Some(TokenKind::While),
            "return" => Some(TokenKind::Return),
            "returns" => Some(TokenKind::Returns),
            "break" => Some(TokenKind::Break),
            "continue" => Some(TokenKind::Continue),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            "new" => Some(TokenKind::New),
            "delete" => Some(TokenKind::Delete),
            "unsafe" => Some(TokenKind::Unsafe),
            "as" => Some(TokenKind::As),
            "try" => Some(TokenKind::Try),
            "catch" | "except" => Some(TokenKind::Catch),
            "constructor" => Some(TokenKind::Constructor),
            "and" => Some(TokenKind::AndAnd),
            "or" => Some(TokenKind::OrOr),
            _ => None,
        }
    }

    /// Canonical operator text, so `and` looks up the same precedence as `&&`
    pub fn operator_text(&self) -> Option<&'static str> {
        match self {
            TokenKind::Plus => Some("+"),
            TokenKind::Minus => Some("-"),
            TokenKind::Star => Some("*"),
            TokenKind::StarStar => Some("**"),
            TokenKind::Slash => Some("/"),
            TokenKind::Percent => Some("%"),
            TokenKind::EqEq => Some("=="),
            TokenKind::Ne => Some("!="),
            TokenKind::Lt => Some("<"),
            TokenKind::Le => Some("<="),
            TokenKind::Gt => Some(">"),
            TokenKind::Ge => Some(">="),
            TokenKind::AndAnd => Some("&&"),
            TokenKind::OrOr => Some("||"),
            _ => None,
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            TokenKind::As | TokenKind::Try | TokenKind::Catch | TokenKind::Constructor
        )
    }

    /// Whether a statement of this kind ends without a `;`
    pub fn is_block_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Unsafe
                | TokenKind::Struct
                | TokenKind::Union
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword_from_str("func"), Some(TokenKind::Func));
        assert_eq!(TokenKind::keyword_from_str("except"), Some(TokenKind::Catch));
        assert_eq!(TokenKind::keyword_from_str("and"), Some(TokenKind::AndAnd));
        assert_eq!(TokenKind::keyword_from_str("int"), None);
        assert_eq!(TokenKind::keyword_from_str("Func"), None);
    }

    #[test]
    fn test_operator_text() {
        assert_eq!(TokenKind::OrOr.operator_text(), Some("||"));
        assert_eq!(TokenKind::Eq.operator_text(), None);
    }
}
