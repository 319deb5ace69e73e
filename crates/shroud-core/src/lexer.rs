use crate::errors::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Int(i64),
    Str(String),
    // Keywords
    Def,
    Class,
    Return,
    Pass,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Lambda,
    And,
    Or,
    Not,
    True,
    False,
    None,
    Break,
    Continue,
    // Operators and punctuation
    Plus,
    Minus,
    Star,
    SlashSlash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashSlashAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
}

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    indents: Vec<usize>,
    bracket_depth: usize,
    tokens: Vec<SpannedToken>,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            indents: vec![0],
            bracket_depth: 0,
            tokens: Vec::new(),
            source,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, ParseError> {
        // Leading indentation of the very first line.
        self.handle_line_start()?;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                ' ' => {
                    self.pos += 1;
                }
                '\t' => {
                    return Err(ParseError::new(self.line, "tab characters are not allowed"));
                }
                '#' => {
                    while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                        self.pos += 1;
                    }
                }
                '\r' => {
                    self.pos += 1;
                }
                '\n' => {
                    self.pos += 1;
                    self.line += 1;
                    if self.bracket_depth == 0 {
                        self.push(Token::Newline);
                        self.handle_line_start()?;
                    }
                }
                '\'' | '"' => self.lex_string(c)?,
                '0'..='9' => self.lex_number()?,
                c if c.is_alphabetic() || c == '_' => self.lex_name(),
                _ => self.lex_operator()?,
            }
        }
        // Close any open logical line and outstanding indents.
        if !matches!(
            self.tokens.last().map(|t| &t.token),
            Some(Token::Newline) | None
        ) {
            self.push(Token::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent);
        }
        self.push(Token::Eof);
        Ok(self.tokens)
    }

    fn push(&mut self, token: Token) {
        self.tokens.push(SpannedToken {
            token,
            line: self.line,
        });
    }

    /// Measure indentation at a logical line start and emit Indent/Dedent
    /// tokens. Blank and comment-only lines are skipped entirely.
    fn handle_line_start(&mut self) -> Result<(), ParseError> {
        loop {
            let mut width = 0;
            let mut p = self.pos;
            while p < self.chars.len() && self.chars[p] == ' ' {
                width += 1;
                p += 1;
            }
            if p < self.chars.len() && self.chars[p] == '\t' {
                return Err(ParseError::new(self.line, "tab characters are not allowed"));
            }
            // Skip blank or comment-only lines.
            if p >= self.chars.len() {
                self.pos = p;
                return Ok(());
            }
            match self.chars[p] {
                '\n' => {
                    self.pos = p + 1;
                    self.line += 1;
                    continue;
                }
                '\r' => {
                    self.pos = p + 1;
                    continue;
                }
                '#' => {
                    while p < self.chars.len() && self.chars[p] != '\n' {
                        p += 1;
                    }
                    self.pos = p;
                    continue;
                }
                _ => {}
            }
            self.pos = p;
            let current = *self.indents.last().unwrap_or(&0);
            if width > current {
                self.indents.push(width);
                self.push(Token::Indent);
            } else if width < current {
                while *self.indents.last().unwrap_or(&0) > width {
                    self.indents.pop();
                    self.push(Token::Dedent);
                }
                if *self.indents.last().unwrap_or(&0) != width {
                    return Err(ParseError::new(self.line, "inconsistent indentation"));
                }
            }
            return Ok(());
        }
    }

    fn lex_number(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let value: i64 = text
            .parse()
            .map_err(|_| ParseError::new(self.line, format!("integer literal too large: {text}")))?;
        self.push(Token::Int(value));
        Ok(())
    }

    fn lex_name(&mut self) {
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_alphanumeric() || self.chars[self.pos] == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let token = match text.as_str() {
            "def" => Token::Def,
            "class" => Token::Class,
            "return" => Token::Return,
            "pass" => Token::Pass,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "while" => Token::While,
            "for" => Token::For,
            "in" => Token::In,
            "lambda" => Token::Lambda,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            "break" => Token::Break,
            "continue" => Token::Continue,
            _ => Token::Name(text),
        };
        self.push(token);
    }

    fn lex_string(&mut self, quote: char) -> Result<(), ParseError> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            if self.pos >= self.chars.len() {
                return Err(ParseError::new(self.line, "unterminated string literal"));
            }
            let c = self.chars[self.pos];
            self.pos += 1;
            if c == quote {
                break;
            }
            if c == '\n' {
                return Err(ParseError::new(self.line, "unterminated string literal"));
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            if self.pos >= self.chars.len() {
                return Err(ParseError::new(self.line, "unterminated string escape"));
            }
            let esc = self.chars[self.pos];
            self.pos += 1;
            match esc {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                '\\' => value.push('\\'),
                '\'' => value.push('\''),
                '"' => value.push('"'),
                'x' => {
                    if self.pos + 2 > self.chars.len() {
                        return Err(ParseError::new(self.line, "truncated \\x escape"));
                    }
                    let hex: String = self.chars[self.pos..self.pos + 2].iter().collect();
                    self.pos += 2;
                    let code = u32::from_str_radix(&hex, 16)
                        .map_err(|_| ParseError::new(self.line, "invalid \\x escape"))?;
                    // Codes 0-255 are always valid scalar values.
                    value.push(char::from_u32(code).ok_or_else(|| {
                        ParseError::new(self.line, "invalid \\x escape")
                    })?);
                }
                other => {
                    return Err(ParseError::new(
                        self.line,
                        format!("unknown string escape: \\{other}"),
                    ));
                }
            }
        }
        self.push(Token::Str(value));
        Ok(())
    }

    fn lex_operator(&mut self) -> Result<(), ParseError> {
        let c = self.chars[self.pos];
        let next = self.chars.get(self.pos + 1).copied();
        let third = self.chars.get(self.pos + 2).copied();
        let (token, width) = match (c, next, third) {
            ('/', Some('/'), Some('=')) => (Token::SlashSlashAssign, 3),
            ('<', Some('<'), Some('=')) => (Token::ShlAssign, 3),
            ('>', Some('>'), Some('=')) => (Token::ShrAssign, 3),
            ('/', Some('/'), _) => (Token::SlashSlash, 2),
            ('<', Some('<'), _) => (Token::Shl, 2),
            ('>', Some('>'), _) => (Token::Shr, 2),
            ('=', Some('='), _) => (Token::EqEq, 2),
            ('!', Some('='), _) => (Token::NotEq, 2),
            ('<', Some('='), _) => (Token::Le, 2),
            ('>', Some('='), _) => (Token::Ge, 2),
            ('+', Some('='), _) => (Token::PlusAssign, 2),
            ('-', Some('='), _) => (Token::MinusAssign, 2),
            ('*', Some('='), _) => (Token::StarAssign, 2),
            ('&', Some('='), _) => (Token::AmpAssign, 2),
            ('|', Some('='), _) => (Token::PipeAssign, 2),
            ('^', Some('='), _) => (Token::CaretAssign, 2),
            ('+', _, _) => (Token::Plus, 1),
            ('-', _, _) => (Token::Minus, 1),
            ('*', _, _) => (Token::Star, 1),
            ('%', _, _) => (Token::Percent, 1),
            ('&', _, _) => (Token::Amp, 1),
            ('|', _, _) => (Token::Pipe, 1),
            ('^', _, _) => (Token::Caret, 1),
            ('=', _, _) => (Token::Assign, 1),
            ('<', _, _) => (Token::Lt, 1),
            ('>', _, _) => (Token::Gt, 1),
            ('(', _, _) => {
                self.bracket_depth += 1;
                (Token::LParen, 1)
            }
            (')', _, _) => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                (Token::RParen, 1)
            }
            ('[', _, _) => {
                self.bracket_depth += 1;
                (Token::LBracket, 1)
            }
            (']', _, _) => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                (Token::RBracket, 1)
            }
            ('{', _, _) => {
                self.bracket_depth += 1;
                (Token::LBrace, 1)
            }
            ('}', _, _) => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                (Token::RBrace, 1)
            }
            (',', _, _) => (Token::Comma, 1),
            (':', _, _) => (Token::Colon, 1),
            (';', _, _) => (Token::Semi, 1),
            _ => {
                return Err(ParseError::new(
                    self.line,
                    format!("unexpected character: {c:?}"),
                ));
            }
        };
        self.pos += width;
        self.push(token);
        Ok(())
    }
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("pos", &self.pos)
            .field("line", &self.line)
            .field("source_len", &self.source.len())
            .finish()
    }
}
