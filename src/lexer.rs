//! A hand-written lexer for HERA source text, shared by the program parser
//! and the debugger's expression language.
//!
//! The lexer keeps the current token loaded: `tkn` is always valid, and
//! `next_token` advances to (and returns a clone of) the next one. Once the
//! input is exhausted it yields EOF tokens indefinitely.

use std::rc::Rc;

use crate::data::{Location, Messages, Token, TokenKind};

pub struct Lexer {
    text: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    path: Rc<str>,
    file_lines: Rc<[String]>,
    /// The current token.
    pub tkn: Token,
    /// Warnings and errors encountered while lexing (bad escapes,
    /// unterminated strings). The parser folds these into its own sink.
    pub messages: Messages,
}

impl Lexer {
    pub fn new(text: &str, path: Option<&str>) -> Self {
        let path: Rc<str> = Rc::from(path.unwrap_or("<string>"));
        let file_lines: Rc<[String]> = text.lines().map(str::to_owned).collect();
        let mut lexer = Self {
            text: text.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            path,
            file_lines,
            tkn: Token::new(
                TokenKind::Eof,
                "",
                Location::new(1, 1, Rc::from("<none>"), Rc::from(Vec::new())),
            ),
            messages: Messages::new(),
        };
        lexer.next_token();
        lexer
    }

    pub fn get_location(&self) -> Location {
        Location::new(
            self.line,
            self.column,
            Rc::clone(&self.path),
            Rc::clone(&self.file_lines),
        )
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Advance to the next token and return a clone of it.
    pub fn next_token(&mut self) -> Token {
        self.skip();

        if self.position >= self.text.len() {
            self.set_token(TokenKind::Eof, 0);
            return self.tkn.clone();
        }

        let ch = self.text[self.position];
        if ch.is_alphabetic() || ch == '_' {
            match self.read_register() {
                Some(length) => self.set_token(TokenKind::Register, length),
                None => {
                    let length = self.read_symbol(0);
                    self.set_token(TokenKind::Symbol, length);
                }
            }
        } else if ch.is_ascii_digit() {
            let length = self.read_int();
            self.set_token(TokenKind::Int, length);
        } else if ch == '"' {
            self.read_string();
        } else if ch == '\'' {
            self.read_char();
        } else if ch == ':' {
            let loc = self.get_location();
            self.next_char();
            let length = self.read_symbol(0);
            let text: String = self.text[self.position..self.position + length]
                .iter()
                .collect();
            for _ in 0..length {
                self.next_char();
            }
            self.tkn = Token::new(TokenKind::Fmt, text, loc);
        } else if ch == '#' {
            let loc = self.get_location();
            self.next_char();
            let length = self.read_symbol(0);
            let text: String = self.text[self.position..self.position + length]
                .iter()
                .collect();
            for _ in 0..length {
                self.next_char();
            }
            self.tkn = Token::new(TokenKind::Include, text, loc);
        } else if ch == '<' && self.tkn.kind == TokenKind::Include && self.tkn.text == "include" {
            self.read_bracketed();
        } else {
            let kind = match ch {
                '-' => TokenKind::Minus,
                '+' => TokenKind::Plus,
                '/' => TokenKind::Slash,
                '*' => TokenKind::Asterisk,
                '@' => TokenKind::At,
                '(' => TokenKind::Lparen,
                ')' => TokenKind::Rparen,
                '{' => TokenKind::Lbrace,
                '}' => TokenKind::Rbrace,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                _ => TokenKind::Unknown,
            };
            self.set_token(kind, 1);
        }

        self.tkn.clone()
    }

    /// Recognize a register spelling at the current position, returning its
    /// length. Anything else starting with a letter is a symbol.
    fn read_register(&self) -> Option<usize> {
        let ch = self.text[self.position].to_ascii_lowercase();
        match ch {
            'r' => {
                if self.peek_char(1).to_ascii_lowercase() == 't'
                    && !is_symbol_char(self.peek_char(2))
                {
                    Some(2)
                } else if self.peek_char(1).is_ascii_digit() {
                    let mut length = 2;
                    while self.peek_char(length).is_ascii_digit() {
                        length += 1;
                    }
                    if is_symbol_char(self.peek_char(length)) {
                        None
                    } else {
                        Some(length)
                    }
                } else {
                    None
                }
            }
            'p' => self
                .match_word("pc_ret")
                .or_else(|| self.match_word("pc")),
            'f' => self
                .match_word("fp_alt")
                .or_else(|| self.match_word("fp")),
            's' => self.match_word("sp"),
            _ => None,
        }
    }

    /// Case-insensitively match `word` at the current position, requiring
    /// that it is not a prefix of a longer symbol.
    fn match_word(&self, word: &str) -> Option<usize> {
        for (i, w) in word.chars().enumerate() {
            if self.peek_char(i).to_ascii_lowercase() != w {
                return None;
            }
        }
        if is_symbol_char(self.peek_char(word.len())) {
            None
        } else {
            Some(word.len())
        }
    }

    fn read_int(&self) -> usize {
        let mut length = 1;
        let mut hex = false;
        let peek = self.peek_char(1);
        if self.text[self.position] == '0' && matches!(peek, 'b' | 'o' | 'x' | 'B' | 'O' | 'X') {
            length = 2;
            hex = matches!(peek, 'x' | 'X');
        }

        loop {
            let ch = self.peek_char(length);
            if ch.is_ascii_digit() || (hex && ch.is_ascii_hexdigit()) {
                length += 1;
            } else {
                break;
            }
        }
        length
    }

    fn read_symbol(&self, start: usize) -> usize {
        let mut length = start;
        while is_symbol_char(self.peek_char(length)) {
            length += 1;
        }
        length
    }

    fn read_string(&mut self) {
        let loc = self.get_location();
        self.next_char(); // opening quote

        let mut contents = String::new();
        loop {
            if self.position >= self.text.len() {
                self.messages.err_at("unclosed string literal", &loc);
                self.tkn = Token::new(TokenKind::Unknown, contents, loc);
                return;
            }

            let ch = self.text[self.position];
            if ch == '"' {
                self.next_char();
                break;
            } else if ch == '\\' {
                let escape_loc = self.get_location();
                self.next_char();
                if self.position >= self.text.len() {
                    self.messages.err_at("unclosed string literal", &loc);
                    self.tkn = Token::new(TokenKind::Unknown, contents, loc);
                    return;
                }
                let escape = self.text[self.position];
                match escape_char(escape) {
                    Some(c) => contents.push(c),
                    None => {
                        self.messages
                            .warn_at(format!("unrecognized backslash escape `\\{}`", escape), &escape_loc);
                        contents.push('\\');
                        contents.push(escape);
                    }
                }
                self.next_char();
            } else {
                contents.push(ch);
                self.next_char();
            }
        }

        self.tkn = Token::new(TokenKind::Str, contents, loc);
    }

    fn read_char(&mut self) {
        let loc = self.get_location();
        self.next_char(); // opening quote

        if self.position >= self.text.len() {
            self.messages.err_at("unclosed character literal", &loc);
            self.tkn = Token::new(TokenKind::Unknown, "", loc);
            return;
        }

        let mut ch = self.text[self.position];
        if ch == '\\' {
            let escape_loc = self.get_location();
            self.next_char();
            if self.position >= self.text.len() {
                self.messages.err_at("unclosed character literal", &loc);
                self.tkn = Token::new(TokenKind::Unknown, "", loc);
                return;
            }
            let escape = self.text[self.position];
            ch = match escape_char(escape) {
                Some(c) => c,
                None => {
                    self.messages
                        .warn_at(format!("unrecognized backslash escape `\\{}`", escape), &escape_loc);
                    escape
                }
            };
        }
        self.next_char();

        if self.position < self.text.len() && self.text[self.position] == '\'' {
            self.next_char();
            self.tkn = Token::new(TokenKind::Char, ch.to_string(), loc);
        } else {
            self.messages.err_at("unclosed character literal", &loc);
            self.tkn = Token::new(TokenKind::Unknown, ch.to_string(), loc);
        }
    }

    fn read_bracketed(&mut self) {
        let loc = self.get_location();
        self.next_char(); // opening angle bracket

        let mut contents = String::new();
        loop {
            if self.position >= self.text.len() || self.text[self.position] == '\n' {
                self.messages.err_at("unclosed bracketed expression", &loc);
                self.tkn = Token::new(TokenKind::Unknown, contents, loc);
                return;
            }
            let ch = self.text[self.position];
            if ch == '>' {
                self.next_char();
                break;
            }
            contents.push(ch);
            self.next_char();
        }

        self.tkn = Token::new(TokenKind::Bracketed, contents, loc);
    }

    /// Skip past whitespace and comments. Block comments do not nest.
    fn skip(&mut self) {
        loop {
            while self.position < self.text.len() && self.text[self.position].is_whitespace() {
                self.next_char();
            }

            if self.position < self.text.len() && self.text[self.position] == '/' {
                if self.peek_char(1) == '/' {
                    while self.position < self.text.len() && self.text[self.position] != '\n' {
                        self.next_char();
                    }
                } else if self.peek_char(1) == '*' {
                    self.next_char();
                    self.next_char();
                    while self.position < self.text.len() {
                        if self.text[self.position] == '*' && self.peek_char(1) == '/' {
                            break;
                        }
                        self.next_char();
                    }
                    self.next_char();
                    self.next_char();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }

    fn next_char(&mut self) {
        if self.position < self.text.len() {
            if self.text[self.position] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn peek_char(&self, n: usize) -> char {
        self.text.get(self.position + n).copied().unwrap_or('\0')
    }

    fn set_token(&mut self, kind: TokenKind, length: usize) {
        let loc = self.get_location();
        let text: String = self.text[self.position..(self.position + length).min(self.text.len())]
            .iter()
            .collect();
        for _ in 0..length {
            self.next_char();
        }
        self.tkn = Token::new(kind, text, loc);
    }
}

fn is_symbol_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn escape_char(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        '0' => Some('\0'),
        _ => None,
    }
}
