// Hand-written lexer for the script dialect. In quasi mode (used only when
// compiling rewrite-rule patterns) `@name`, optionally followed by one of
// the quantifiers `?`, `*`, `+`, lexes as a single quasi-identifier token.

use super::ParseError;
use crate::ast::FilePos;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    QuasiIdent { name: String, quantifier: Option<char> },
    Num(f64),
    Str(String),
    Regex { body: String, flags: String },
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: FilePos,
}

impl Token {
    pub fn is_punct(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Punct(p) if *p == text)
    }

    pub fn is_ident(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(name) if name == text)
    }
}

// Longest-match-first punctuator table.
const PUNCTS: &[&str] = &[
    ">>>", "===", "!==", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "--", "+=", "-=",
    "*=", "/=", "%=", "{", "}", "(", ")", "[", "]", ";", ",", ".", ":", "?", "+", "-", "*", "/",
    "%", "=", "<", ">", "!", "~", "&", "|", "^",
];

pub struct Lexer<'a> {
    src: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
    quasi: bool,
    // Whether a `/` at the current position starts a regex literal rather
    // than a division; true after operators and at expression starts.
    regex_ok: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, quasi: bool) -> Self {
        Lexer {
            src: src.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
            quasi,
            regex_ok: true,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn pos(&self) -> FilePos {
        FilePos::new(self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.offset + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.offset += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ParseError::UnterminatedComment { pos: start });
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let pos = self.pos();
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };

        if c == b'@' && self.quasi {
            return self.quasi_ident(pos);
        }
        if is_ident_start(c) {
            let name = self.ident_text();
            self.regex_ok = matches!(
                name.as_str(),
                "return" | "typeof" | "void" | "delete" | "in" | "instanceof" | "new" | "case"
                    | "throw" | "do" | "else"
            );
            return Ok(Token {
                kind: TokenKind::Ident(name),
                pos,
            });
        }
        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
        {
            return self.number(pos);
        }
        if c == b'\'' || c == b'"' {
            return self.string(pos);
        }
        if c == b'/' && self.regex_ok {
            return self.regex(pos);
        }

        for punct in PUNCTS {
            if self.src[self.offset..].starts_with(punct.as_bytes()) {
                for _ in 0..punct.len() {
                    self.bump();
                }
                // After `)`, `]`, `++` or `--` a slash is division.
                self.regex_ok = !matches!(*punct, ")" | "]" | "++" | "--");
                return Ok(Token {
                    kind: TokenKind::Punct(punct),
                    pos,
                });
            }
        }
        Err(ParseError::UnexpectedChar {
            ch: c as char,
            pos,
        })
    }

    fn ident_text(&mut self) -> String {
        let start = self.offset;
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        String::from_utf8_lossy(&self.src[start..self.offset]).into_owned()
    }

    fn quasi_ident(&mut self, pos: FilePos) -> Result<Token, ParseError> {
        self.bump(); // consume '@'
        if !self.peek().is_some_and(is_ident_start) {
            return Err(ParseError::MalformedQuasi { pos });
        }
        let name = self.ident_text();
        let quantifier = match self.peek() {
            Some(q @ (b'?' | b'*' | b'+')) => {
                self.bump();
                Some(q as char)
            }
            _ => None,
        };
        self.regex_ok = false;
        Ok(Token {
            kind: TokenKind::QuasiIdent { name, quantifier },
            pos,
        })
    }

    fn number(&mut self, pos: FilePos) -> Result<Token, ParseError> {
        let start = self.offset;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == b'.' || c == b'e' || c == b'E')
        {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.offset]).into_owned();
        let value: f64 = text
            .parse()
            .map_err(|_| ParseError::BadNumber { text: text.clone(), pos })?;
        self.regex_ok = false;
        Ok(Token {
            kind: TokenKind::Num(value),
            pos,
        })
    }

    fn string(&mut self, pos: FilePos) -> Result<Token, ParseError> {
        let quote = self.bump().unwrap_or(b'\'');
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b'r') => bytes.push(b'\r'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(c) => bytes.push(c),
                    None => return Err(ParseError::UnterminatedString { pos }),
                },
                Some(b'\n') | None => return Err(ParseError::UnterminatedString { pos }),
                Some(c) => bytes.push(c),
            }
        }
        self.regex_ok = false;
        Ok(Token {
            kind: TokenKind::Str(String::from_utf8_lossy(&bytes).into_owned()),
            pos,
        })
    }

    fn regex(&mut self, pos: FilePos) -> Result<Token, ParseError> {
        self.bump(); // consume '/'
        let mut bytes = Vec::new();
        let mut in_class = false;
        loop {
            match self.bump() {
                Some(b'/') if !in_class => break,
                Some(b'[') => {
                    in_class = true;
                    bytes.push(b'[');
                }
                Some(b']') => {
                    in_class = false;
                    bytes.push(b']');
                }
                Some(b'\\') => {
                    bytes.push(b'\\');
                    match self.bump() {
                        Some(c) => bytes.push(c),
                        None => return Err(ParseError::UnterminatedRegex { pos }),
                    }
                }
                Some(b'\n') | None => return Err(ParseError::UnterminatedRegex { pos }),
                Some(c) => bytes.push(c),
            }
        }
        let mut flags = String::new();
        while self.peek().is_some_and(is_ident_continue) {
            flags.push(self.bump().unwrap() as char);
        }
        self.regex_ok = false;
        Ok(Token {
            kind: TokenKind::Regex {
                body: String::from_utf8_lossy(&bytes).into_owned(),
                flags,
            },
            pos,
        })
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || !c.is_ascii()
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || !c.is_ascii()
}
