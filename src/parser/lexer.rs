use crate::error::ParseError;

/// A byte offset within the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BytePos(pub u32);

/// A half-open `[start, end)` byte range in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: BytePos,
    pub end: BytePos,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: BytePos(start),
            end: BytePos(end),
        }
    }

    /// Creates a zero-length span at position `pos` (for synthetic nodes).
    pub fn at(pos: u32) -> Self {
        Self::new(pos, pos)
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Def,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Output,
    Input,

    // Literals
    Number(f64),
    BoolLit(bool),
    Ident(String),

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Semi,     // ;
    Arrow,    // ->
    Eq,       // =
    EqEq,     // ==
    NotEq,    // !=
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=

    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    /// `%%` modulus
    PercentPercent,
    /// `%*%` matrix multiplication
    MatMul,

    /// `!` (logical NOT prefix)
    Bang,
    /// `&&` logical AND
    AmpAmp,
    /// `||` logical OR
    PipePipe,

    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Def => write!(f, "def"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Output => write!(f, "output"),
            Token::Input => write!(f, "input"),
            Token::Number(n) => write!(f, "{}", n),
            Token::BoolLit(b) => write!(f, "{}", b),
            Token::Ident(s) => write!(f, "{}", s),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semi => write!(f, ";"),
            Token::Arrow => write!(f, "->"),
            Token::Eq => write!(f, "="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtEq => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::PercentPercent => write!(f, "%%"),
            Token::MatMul => write!(f, "%*%"),
            Token::Bang => write!(f, "!"),
            Token::AmpAmp => write!(f, "&&"),
            Token::PipePipe => write!(f, "||"),
            Token::Eof => write!(f, "<eof>"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

pub struct Lexer<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self { src, pos: 0 }
    }

    /// Tokenizes the full source and returns a flat `Vec` of spanned tokens.
    /// Returns an error on any unrecognized character.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned<Token>>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.src.len() {
                let end = self.pos as u32;
                tokens.push(Spanned {
                    node: Token::Eof,
                    span: Span::at(end),
                });
                break;
            }
            let tok = self.next_token()?;
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.src.len() && self.src.as_bytes()[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            let rest = &self.src[self.pos..];
            if rest.starts_with("//") || rest.starts_with('#') {
                while self.pos < self.src.len() && self.src.as_bytes()[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> u8 {
        let b = self.src.as_bytes()[self.pos];
        self.pos += 1;
        b
    }

    fn spanned(&self, node: Token, start: u32) -> Spanned<Token> {
        Spanned {
            node,
            span: Span::new(start, self.pos as u32),
        }
    }

    fn next_token(&mut self) -> Result<Spanned<Token>, ParseError> {
        let start = self.pos as u32;
        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Ok(self.spanned(Token::Eof, start)),
        };

        // Three-character operator
        if ch == b'%' && self.peek_at(1) == Some(b'*') && self.peek_at(2) == Some(b'%') {
            self.pos += 3;
            return Ok(self.spanned(Token::MatMul, start));
        }

        // Two-character tokens
        let two = match (ch, self.peek_at(1)) {
            (b'-', Some(b'>')) => Some(Token::Arrow),
            (b'=', Some(b'=')) => Some(Token::EqEq),
            (b'!', Some(b'=')) => Some(Token::NotEq),
            (b'<', Some(b'=')) => Some(Token::LtEq),
            (b'>', Some(b'=')) => Some(Token::GtEq),
            (b'&', Some(b'&')) => Some(Token::AmpAmp),
            (b'|', Some(b'|')) => Some(Token::PipePipe),
            (b'%', Some(b'%')) => Some(Token::PercentPercent),
            _ => None,
        };
        if let Some(tok) = two {
            self.pos += 2;
            return Ok(self.spanned(tok, start));
        }

        // Single-character punctuation
        let maybe_punct = match ch {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'{' => Some(Token::LBrace),
            b'}' => Some(Token::RBrace),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'<' => Some(Token::Lt),
            b'>' => Some(Token::Gt),
            b',' => Some(Token::Comma),
            b':' => Some(Token::Colon),
            b';' => Some(Token::Semi),
            b'=' => Some(Token::Eq),
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Star),
            b'/' => Some(Token::Slash),
            b'^' => Some(Token::Caret),
            b'!' => Some(Token::Bang),
            _ => None,
        };
        if let Some(tok) = maybe_punct {
            self.pos += 1;
            return Ok(self.spanned(tok, start));
        }

        if ch.is_ascii_digit()
            || (ch == b'.' && self.peek_at(1).map_or(false, |b| b.is_ascii_digit()))
        {
            return self.lex_number(start);
        }

        if ch.is_ascii_alphabetic() || ch == b'_' {
            return Ok(self.lex_ident_or_keyword(start));
        }

        let ch = self.src[self.pos..].chars().next().unwrap_or('\u{fffd}');
        Err(ParseError::UnexpectedChar { ch, pos: start })
    }

    fn eat_digits(&mut self) {
        while self.peek().map_or(false, |b| b.is_ascii_digit()) {
            self.advance();
        }
    }

    fn lex_number(&mut self, start: u32) -> Result<Spanned<Token>, ParseError> {
        self.eat_digits();
        if self.peek() == Some(b'.') && self.peek_at(1).map_or(false, |b| b.is_ascii_digit()) {
            self.advance(); // consume '.'
            self.eat_digits();
        }
        // Optional exponent: e/E followed by optional +/- and digits
        if self.peek().map_or(false, |b| b == b'e' || b == b'E') {
            let sign = self.peek_at(1).map_or(false, |b| b == b'+' || b == b'-');
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).map_or(false, |b| b.is_ascii_digit()) {
                self.pos += digit_at;
                self.eat_digits();
            }
        }
        let text = &self.src[start as usize..self.pos];
        let value: f64 = text.parse().map_err(|_| ParseError::InvalidLiteral {
            text: text.to_owned(),
            span: Span::new(start, self.pos as u32),
        })?;
        Ok(self.spanned(Token::Number(value), start))
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> Spanned<Token> {
        while self
            .peek()
            .map_or(false, |b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.advance();
        }
        let text = &self.src[start as usize..self.pos];
        let tok = match text {
            "def" => Token::Def,
            "return" => Token::Return,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "for" => Token::For,
            "in" => Token::In,
            "output" => Token::Output,
            "input" => Token::Input,
            "true" => Token::BoolLit(true),
            "false" => Token::BoolLit(false),
            _ => Token::Ident(text.to_owned()),
        };
        self.spanned(tok, start)
    }
}
