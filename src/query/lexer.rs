/// A lexical token with its source position (1-based line/column, pointing
/// at the token's first character).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    String(String),
    Number(String),
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Tilde,
    And,
    Or,
    Not,
    In,
    Contains,
    StartsWith,
    Exists,
    True,
    False,
    Null,
    Asc,
    Desc,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Eof,
    Invalid,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "contains" => TokenKind::Contains,
        "startsWith" => TokenKind::StartsWith,
        "exists" => TokenKind::Exists,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "asc" => TokenKind::Asc,
        "desc" => TokenKind::Desc,
        "count" => TokenKind::Count,
        "sum" => TokenKind::Sum,
        "avg" => TokenKind::Avg,
        "min" => TokenKind::Min,
        "max" => TokenKind::Max,
        _ => return None,
    })
}

/// Tokenizes a text query one token at a time. `peek()` saves and restores
/// position state so callers can look ahead without consuming.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self { chars: source.chars().collect(), pos: 0, line: 1, column: 1 }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t' | '\r' | '\n')) {
            self.advance();
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Token {
        let saved = self.save();
        let token = self.next_token();
        self.restore(saved);
        token
    }

    /// Snapshot of lexer position, for the parser's store-reference
    /// disambiguation (save before a speculative multi-token lookahead,
    /// restore if the lookahead guesses wrong).
    pub fn save(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.column)
    }

    pub fn restore(&mut self, state: (usize, usize, usize)) {
        (self.pos, self.line, self.column) = state;
    }

    /// Captures the raw source text of a balanced `{ ... }` block starting
    /// at the current position (after skipping whitespace), respecting
    /// quoted strings so an embedded `}` doesn't end the block early. Used
    /// by `insert`/`set` to capture their payload verbatim rather than
    /// tokenizing it. Returns `None` if the block is unterminated or the
    /// next non-whitespace character isn't `{`.
    pub fn capture_balanced_braces(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.peek_char() != Some('{') {
            return None;
        }
        let mut depth = 0i32;
        let mut text = String::new();
        loop {
            let c = self.peek_char()?;
            text.push(c);
            self.advance();
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(text);
                    }
                }
                '"' | '\'' => loop {
                    match self.peek_char() {
                        None => return None,
                        Some(q) if q == c => {
                            text.push(q);
                            self.advance();
                            break;
                        }
                        Some('\\') => {
                            text.push('\\');
                            self.advance();
                            if let Some(escaped) = self.peek_char() {
                                text.push(escaped);
                                self.advance();
                            }
                        }
                        Some(other) => {
                            text.push(other);
                            self.advance();
                        }
                    }
                },
                _ => {}
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let (line, column) = (self.line, self.column);

        let Some(c) = self.peek_char() else {
            return Token { kind: TokenKind::Eof, line, column };
        };

        let kind = match c {
            '.' => {
                self.advance();
                TokenKind::Dot
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '{' => {
                self.advance();
                TokenKind::LBrace
            }
            '}' => {
                self.advance();
                TokenKind::RBrace
            }
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            '~' => {
                self.advance();
                TokenKind::Tilde
            }
            '=' => {
                self.advance();
                TokenKind::Eq
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::Ne
                } else {
                    TokenKind::Invalid
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::Gte
                } else {
                    TokenKind::Gt
                }
            }
            '<' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::Lte
                } else {
                    TokenKind::Lt
                }
            }
            '"' | '\'' => self.lex_string(c),
            '-' if self.peek_char_at(1).is_some_and(|d| d.is_ascii_digit()) => self.lex_number(),
            d if d.is_ascii_digit() => self.lex_number(),
            a if a.is_ascii_alphabetic() || a == '_' => self.lex_identifier(),
            _ => {
                self.advance();
                TokenKind::Invalid
            }
        };

        Token { kind, line, column }
    }

    fn lex_string(&mut self, delimiter: char) -> TokenKind {
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => return TokenKind::Invalid,
                Some(c) if c == delimiter => {
                    self.advance();
                    return TokenKind::String(text);
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some(escaped) => text.push(escaped),
                        None => return TokenKind::Invalid,
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }

    /// A `.` followed by a digit extends the number; a `.` followed by a
    /// non-digit ends it, supporting chained method calls like `42.limit`.
    fn lex_number(&mut self) -> TokenKind {
        let mut text = String::new();
        if self.peek_char() == Some('-') {
            text.push('-');
            self.advance();
        }
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().expect("checked by peek"));
        }
        if self.peek_char() == Some('.') && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.advance().expect("checked by peek"));
            }
        }
        TokenKind::Number(text)
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let mut text = String::new();
        while self.peek_char().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            text.push(self.advance().expect("checked by peek"));
        }
        keyword(&text).unwrap_or(TokenKind::Identifier(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn tokenizes_store_reference_and_filter_call() {
        let tokens = kinds("orders.filter(status = \"open\")");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("orders".into()),
                TokenKind::Dot,
                TokenKind::Identifier("filter".into()),
                TokenKind::LParen,
                TokenKind::Identifier("status".into()),
                TokenKind::Eq,
                TokenKind::String("open".into()),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn number_dot_method_does_not_absorb_the_call() {
        let tokens = kinds("42.limit");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Number("42".into()),
                TokenKind::Dot,
                TokenKind::Identifier("limit".into()),
            ]
        );
    }

    #[test]
    fn fractional_number_is_absorbed() {
        let tokens = kinds("3.5");
        assert_eq!(tokens, vec![TokenKind::Number("3.5".into())]);
    }

    #[test]
    fn negative_number_is_recognized() {
        let tokens = kinds("-7");
        assert_eq!(tokens, vec![TokenKind::Number("-7".into())]);
    }

    #[test]
    fn backslash_escapes_next_byte_without_unescaping_on_lex() {
        let tokens = kinds(r#""a\"b""#);
        assert_eq!(tokens, vec![TokenKind::String("a\"b".into())]);
    }

    #[test]
    fn unterminated_string_is_invalid() {
        let tokens = kinds("\"unterminated");
        assert_eq!(tokens, vec![TokenKind::Invalid]);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("and or");
        let peeked = lexer.peek();
        assert_eq!(peeked.kind, TokenKind::And);
        let consumed = lexer.next_token();
        assert_eq!(consumed.kind, TokenKind::And);
        assert_eq!(lexer.next_token().kind, TokenKind::Or);
    }

    #[test]
    fn capture_balanced_braces_respects_nested_quotes() {
        let mut lexer = Lexer::new(r#"{"a": "}", "b": 1}tail"#);
        let captured = lexer.capture_balanced_braces().expect("balanced block");
        assert_eq!(captured, r#"{"a": "}", "b": 1}"#);
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("tail".into()));
    }

    #[test]
    fn line_and_column_advance_across_newlines() {
        let mut lexer = Lexer::new("a\nb");
        let first = lexer.next_token();
        assert_eq!(first.line, 1);
        let second = lexer.next_token();
        assert_eq!(second.line, 2);
        assert_eq!(second.column, 1);
    }
}
