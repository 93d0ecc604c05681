use crate::error::{Error, Result};
use crate::numeric::NumericType;

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `#{`
    SetOpen,
    /// `#(`
    FnOpen,
    /// `#_`
    Discard,
    /// `#tag`
    Tag(String),
    Quote,
    SyntaxQuote,
    Unquote,
    UnquoteSplice,
    /// `^`
    Meta,
    String(String),
    Number(NumericType),
    /// Text after `:`
    Keyword(String),
    /// Any other bare token: symbols, `true`, `nil`, IRIs
    Symbol(String),
    /// `%q(...)`, `%w[...]`, `%r{...}flags`
    Percent {
        kind: char,
        body: String,
        flags: String,
    },
    Eof,
}

/// A point in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

// ============================================================================
// Lexer
// ============================================================================

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    col: usize,
}

fn is_terminator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | '\'' | '`' | '~' | '^'
        )
}

fn closing_delimiter(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        '<' => Some('>'),
        c if c.is_ascii_punctuation() && !matches!(c, ')' | ']' | '}' | '>') => Some(c),
        _ => None,
    }
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            col: 1,
        }
    }

    /// Append more text to the end of the input
    pub fn feed(&mut self, more: &str) {
        self.input.extend(more.chars());
    }

    pub fn mark(&self) -> Position {
        Position {
            offset: self.position,
            line: self.line,
            col: self.col,
        }
    }

    pub fn reset(&mut self, mark: Position) {
        self.position = mark.offset;
        self.line = mark.line;
        self.col = mark.col;
    }

    fn current_char(&self) -> char {
        if self.position < self.input.len() {
            self.input[self.position]
        } else {
            '\0'
        }
    }

    fn peek_ahead(&self, n: usize) -> char {
        if self.position + n < self.input.len() {
            self.input[self.position + n]
        } else {
            '\0'
        }
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            if self.input[self.position] == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.position += 1;
        }
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Skip whitespace, commas and `;` comments
    pub fn skip_whitespace(&mut self) {
        loop {
            while !self.is_eof() && (self.current_char().is_whitespace() || self.current_char() == ',') {
                self.advance();
            }

            if !self.is_eof() && self.current_char() == ';' {
                self.skip_comment();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
        if self.current_char() == '\n' {
            self.advance();
        }
    }

    fn incomplete(&self, what: &str) -> Error {
        Error::incomplete(format!("Unexpected end of input in {what}"))
    }

    // ========================================================================
    // Tokenizing
    // ========================================================================

    /// Skip whitespace and read the next token along with where it starts
    pub fn next_token(&mut self) -> Result<(Token, Position)> {
        self.skip_whitespace();
        let start = self.mark();
        if self.is_eof() {
            return Ok((Token::Eof, start));
        }

        let c = self.current_char();
        let token = match c {
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '[' => self.single(Token::LBracket),
            ']' => self.single(Token::RBracket),
            '{' => self.single(Token::LBrace),
            '}' => self.single(Token::RBrace),
            '\'' => self.single(Token::Quote),
            '`' => self.single(Token::SyntaxQuote),
            '^' => self.single(Token::Meta),
            '~' => {
                self.advance();
                if self.current_char() == '@' {
                    self.advance();
                    Token::UnquoteSplice
                } else {
                    Token::Unquote
                }
            }
            '"' => Token::String(self.read_string()?),
            '#' => self.read_dispatch()?,
            ':' => {
                self.advance();
                let text = self.read_token_text();
                if text.is_empty() {
                    return Err(Error::parse("Invalid keyword: expected a name after ':'"));
                }
                Token::Keyword(text)
            }
            '%' if matches!(self.peek_ahead(1), 'q' | 'r' | 'w')
                && closing_delimiter(self.peek_ahead(2)).is_some() =>
            {
                self.read_percent()?
            }
            _ => {
                let text = self.read_token_text();
                if text.is_empty() {
                    return Err(Error::parse(format!("Unexpected character: {c}")));
                }
                match parse_number(&text) {
                    Some(n) => Token::Number(n?),
                    None => Token::Symbol(text),
                }
            }
        };
        Ok((token, start))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn read_token_text(&mut self) -> String {
        let mut text = String::new();
        while !self.is_eof() && !is_terminator(self.current_char()) {
            text.push(self.current_char());
            self.advance();
        }
        text
    }

    fn read_dispatch(&mut self) -> Result<Token> {
        self.advance(); // '#'
        if self.is_eof() {
            return Err(self.incomplete("dispatch macro"));
        }
        match self.current_char() {
            '{' => Ok(self.single(Token::SetOpen)),
            '(' => Ok(self.single(Token::FnOpen)),
            '_' => Ok(self.single(Token::Discard)),
            c if is_terminator(c) => Err(Error::parse(format!("Invalid dispatch macro: #{c}"))),
            _ => Ok(Token::Tag(self.read_token_text())),
        }
    }

    // ========================================================================
    // String Parsing
    // ========================================================================

    fn read_string(&mut self) -> Result<String> {
        self.advance(); // opening quote
        let mut content = String::new();

        loop {
            if self.is_eof() {
                return Err(self.incomplete("string"));
            }
            match self.current_char() {
                '"' => {
                    self.advance();
                    return Ok(content);
                }
                '\\' => {
                    self.advance();
                    content.push(self.read_escape_sequence()?);
                }
                c => {
                    content.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_escape_sequence(&mut self) -> Result<char> {
        if self.is_eof() {
            return Err(self.incomplete("string escape"));
        }
        let c = self.current_char();
        self.advance();

        match c {
            'n' => Ok('\n'),
            't' => Ok('\t'),
            'r' => Ok('\r'),
            'b' => Ok('\u{8}'),
            'f' => Ok('\u{c}'),
            '\\' => Ok('\\'),
            '"' => Ok('"'),
            '\'' => Ok('\''),
            '0' => Ok('\0'),
            'u' => self.read_unicode_escape(),
            _ => Err(Error::parse(format!("Unknown escape sequence: \\{c}"))),
        }
    }

    /// `\u{1F600}` or `é`
    fn read_unicode_escape(&mut self) -> Result<char> {
        let mut hex = String::new();
        if self.current_char() == '{' {
            self.advance();
            while self.current_char() != '}' {
                if self.is_eof() {
                    return Err(self.incomplete("unicode escape"));
                }
                if !self.current_char().is_ascii_hexdigit() {
                    return Err(Error::parse("Invalid hex digit in unicode escape"));
                }
                hex.push(self.current_char());
                self.advance();
            }
            self.advance();
        } else {
            for _ in 0..4 {
                if self.is_eof() {
                    return Err(self.incomplete("unicode escape"));
                }
                if !self.current_char().is_ascii_hexdigit() {
                    return Err(Error::parse("Invalid hex digit in unicode escape"));
                }
                hex.push(self.current_char());
                self.advance();
            }
        }

        let code_point = u32::from_str_radix(&hex, 16)
            .map_err(|e| Error::parse(format!("Invalid unicode code point: {e}")))?;
        char::from_u32(code_point)
            .ok_or_else(|| Error::parse(format!("Invalid unicode code point: {code_point}")))
    }

    // ========================================================================
    // Percent Literals
    // ========================================================================

    /// Raw body between delimiters. Bracket pairs nest; `\<close>` yields
    /// the closing character, other backslashes are kept as written.
    fn read_percent(&mut self) -> Result<Token> {
        self.advance(); // '%'
        let kind = self.current_char();
        self.advance();
        let open = self.current_char();
        let close = closing_delimiter(open)
            .ok_or_else(|| Error::parse(format!("Invalid percent literal delimiter: {open}")))?;
        self.advance();

        let mut body = String::new();
        let mut depth = 0usize;
        loop {
            if self.is_eof() {
                return Err(self.incomplete("percent literal"));
            }
            let c = self.current_char();
            if c == '\\' && (self.peek_ahead(1) == close || (open != close && self.peek_ahead(1) == open)) {
                self.advance();
                body.push(self.current_char());
                self.advance();
                continue;
            }
            if c == close && depth == 0 {
                self.advance();
                break;
            }
            if open != close {
                if c == open {
                    depth += 1;
                } else if c == close {
                    depth -= 1;
                }
            }
            body.push(c);
            self.advance();
        }

        let mut flags = String::new();
        if kind == 'r' {
            while matches!(self.current_char(), 'i' | 'm' | 's' | 'x') {
                flags.push(self.current_char());
                self.advance();
            }
        }
        if !self.is_eof() && !is_terminator(self.current_char()) {
            return Err(Error::parse(format!(
                "Unexpected character after percent literal: {}",
                self.current_char()
            )));
        }
        Ok(Token::Percent { kind, body, flags })
    }
}

/// Remove unescaped whitespace and `#` line comments from a free-spacing
/// pattern. Escaped whitespace and `\#` become literal characters.
pub fn strip_freespacing(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) if next.is_whitespace() || next == '#' => {
                    if next == '#' {
                        out.push('#');
                    } else {
                        // Keep the character literal outside a class too
                        out.push_str(&format!("[{next}]"));
                    }
                }
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            c if in_class => out.push(c),
            c if c.is_whitespace() => {}
            '#' => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
            }
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// Number Parsing
// ============================================================================

/// Parse a token as a number. Returns None when the token is not numeric
/// at all, and an error when it looks numeric but is malformed.
pub fn parse_number(text: &str) -> Option<Result<NumericType>> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if !unsigned.as_bytes().first()?.is_ascii_digit() {
        return None;
    }
    let invalid = || Error::parse(format!("Invalid number: {text}"));

    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        return Some(NumericType::parse_integer(hex, 16, negative).ok_or_else(invalid));
    }

    // Printed big integers carry an `N` suffix
    if let Some(digits) = unsigned.strip_suffix('N')
        && digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Some(NumericType::parse_integer(digits, 10, negative).ok_or_else(invalid));
    }

    if let Some((radix, digits)) = unsigned.split_once(['r', 'R']) {
        let radix = match radix.parse::<u32>() {
            Ok(r) if (2..=36).contains(&r) => r,
            _ => return Some(Err(invalid())),
        };
        return Some(NumericType::parse_integer(digits, radix, negative).ok_or_else(invalid));
    }

    if unsigned.contains(['.', 'e', 'E']) {
        return Some(
            text.parse::<f64>()
                .map(NumericType::Float)
                .map_err(|_| invalid()),
        );
    }

    Some(NumericType::parse_integer(unsigned, 10, negative).ok_or_else(invalid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let (tok, _) = lexer.next_token().unwrap();
            if tok == Token::Eof {
                break;
            }
            out.push(tok);
        }
        out
    }

    #[test]
    fn test_delimiters_and_commas() {
        assert_eq!(
            tokens("( [ ] , { } )"),
            vec![
                Token::LParen,
                Token::LBracket,
                Token::RBracket,
                Token::LBrace,
                Token::RBrace,
                Token::RParen
            ]
        );
    }

    #[test]
    fn test_quote_family() {
        assert_eq!(
            tokens("'a `b ~c ~@d"),
            vec![
                Token::Quote,
                Token::Symbol("a".into()),
                Token::SyntaxQuote,
                Token::Symbol("b".into()),
                Token::Unquote,
                Token::Symbol("c".into()),
                Token::UnquoteSplice,
                Token::Symbol("d".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokens("42"), vec![Token::Number(NumericType::Int(42))]);
        assert_eq!(tokens("-7"), vec![Token::Number(NumericType::Int(-7))]);
        assert_eq!(tokens("0xff"), vec![Token::Number(NumericType::Int(255))]);
        assert_eq!(tokens("2r1010"), vec![Token::Number(NumericType::Int(10))]);
        assert_eq!(tokens("1.5e2"), vec![Token::Number(NumericType::Float(150.0))]);
        assert!(matches!(
            tokens("123456789012345678901234567890").as_slice(),
            [Token::Number(NumericType::BigInt(_))]
        ));
    }

    #[test]
    fn test_signs_alone_are_symbols() {
        assert_eq!(
            tokens("- + -x"),
            vec![
                Token::Symbol("-".into()),
                Token::Symbol("+".into()),
                Token::Symbol("-x".into())
            ]
        );
    }

    #[test]
    fn test_bad_number() {
        let mut lexer = Lexer::new("12abc");
        assert!(lexer.next_token().is_err());
        let mut lexer = Lexer::new("99r1");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\n\"b\" é \u{1F600}""#),
            vec![Token::String("a\n\"b\" é 😀".into())]
        );
    }

    #[test]
    fn test_unterminated_string_is_incomplete() {
        let mut lexer = Lexer::new("\"abc");
        assert!(lexer.next_token().unwrap_err().is_incomplete());
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            tokens("; hello\n:k ; trailing"),
            vec![Token::Keyword("k".into())]
        );
    }

    #[test]
    fn test_dispatch_tokens() {
        assert_eq!(
            tokens("#{ #( #_ #inst"),
            vec![
                Token::SetOpen,
                Token::FnOpen,
                Token::Discard,
                Token::Tag("inst".into())
            ]
        );
    }

    #[test]
    fn test_percent_literals() {
        assert_eq!(
            tokens("%q(a (b) \\) c)"),
            vec![Token::Percent {
                kind: 'q',
                body: "a (b) ) c".into(),
                flags: String::new()
            }]
        );
        assert_eq!(
            tokens("%r/a+/im"),
            vec![Token::Percent {
                kind: 'r',
                body: "a+".into(),
                flags: "im".into()
            }]
        );
    }

    #[test]
    fn test_percent_without_delimiter_is_symbol() {
        assert_eq!(tokens("%1 %&"), vec![Token::Symbol("%1".into()), Token::Symbol("%&".into())]);
    }

    #[test]
    fn test_positions_track_lines() {
        let mut lexer = Lexer::new("a\n  b");
        let (_, first) = lexer.next_token().unwrap();
        let (_, second) = lexer.next_token().unwrap();
        assert_eq!((first.line, first.col), (1, 1));
        assert_eq!((second.line, second.col, second.offset), (2, 3, 4));
    }

    #[test]
    fn test_freespacing() {
        assert_eq!(strip_freespacing("a b # comment\n c"), "abc");
        assert_eq!(strip_freespacing("a\\ b"), "a[ ]b");
        assert_eq!(strip_freespacing("[a b]"), "[a b]");
        assert_eq!(strip_freespacing("\\#x"), "#x");
    }

    #[test]
    fn test_mark_and_reset() {
        let mut lexer = Lexer::new("(a b");
        let mark = lexer.mark();
        lexer.next_token().unwrap();
        lexer.reset(mark);
        assert_eq!(lexer.next_token().unwrap().0, Token::LParen);
    }
}
