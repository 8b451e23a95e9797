// src/script/lexer.rs

//! Indentation-aware tokenizer.
//!
//! Newlines inside brackets are ignored, so expressions may span lines.
//! Block structure is reported as `Indent` / `Dedent` tokens.

use super::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Punct(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

const PUNCT3: &[&str] = &["**=", "//="];
const PUNCT2: &[&str] = &[
    "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=",
];
const PUNCT1: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lexer = Lexer {
        chars,
        pos: 0,
        line: 1,
        depth: 0,
        indents: vec![0],
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn run(&mut self) -> Result<(), ScriptError> {
        let mut at_line_start = true;

        loop {
            if at_line_start && self.depth == 0 {
                if !self.read_indentation()? {
                    break;
                }
                at_line_start = false;
            }

            let Some(c) = self.peek(0) else {
                break;
            };

            match c {
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push_newline();
                        at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' if self.peek(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '"' | '\'' => self.read_string(c)?,
                c if c.is_ascii_digit() => self.read_number()?,
                c if c.is_alphabetic() || c == '_' => self.read_name(),
                _ => self.read_punct()?,
            }
        }

        self.push_newline();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(())
    }

    fn push_newline(&mut self) {
        if matches!(
            self.tokens.last(),
            Some(Token { tok, .. }) if *tok != Tok::Newline && *tok != Tok::Indent && *tok != Tok::Dedent
        ) {
            self.push(Tok::Newline);
        }
    }

    /// Consume leading whitespace of a logical line and emit indent tokens.
    ///
    /// Returns `false` at end of input.
    fn read_indentation(&mut self) -> Result<bool, ScriptError> {
        loop {
            let mut col = 0;
            while let Some(c) = self.peek(0) {
                match c {
                    ' ' => col += 1,
                    '\t' => col += 4,
                    '\r' => {}
                    _ => break,
                }
                self.pos += 1;
            }

            match self.peek(0) {
                None => return Ok(false),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {}
            }

            let top = *self.indents.last().unwrap_or(&0);
            if col > top {
                self.indents.push(col);
                self.push(Tok::Indent);
            } else {
                while col < *self.indents.last().unwrap_or(&0) {
                    self.indents.pop();
                    self.push(Tok::Dedent);
                }
                if col != *self.indents.last().unwrap_or(&0) {
                    return Err(self.error("unindent does not match any outer indentation level"));
                }
            }
            return Ok(true);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn read_string(&mut self, quote: char) -> Result<(), ScriptError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(self.error("unterminated string literal"));
            };
            self.pos += 1;
            match c {
                '\n' => return Err(self.error("unterminated string literal")),
                '\\' => {
                    let Some(esc) = self.peek(0) else {
                        return Err(self.error("unterminated string literal"));
                    };
                    self.pos += 1;
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        '\\' => out.push('\\'),
                        '\'' => out.push('\''),
                        '"' => out.push('"'),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c if c == quote => break,
                c => out.push(c),
            }
        }
        self.push(Tok::Str(out));
        Ok(())
    }

    fn read_number(&mut self) -> Result<(), ScriptError> {
        let start = self.pos;
        while matches!(self.peek(0), Some(c) if c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek(0) == Some('.') && matches!(self.peek(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        let tok = if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(format!("invalid number literal '{text}'")))?
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| self.error(format!("integer literal too large: {text}")))?
        };
        self.push(tok);
        Ok(())
    }

    fn read_name(&mut self) {
        let start = self.pos;
        while matches!(self.peek(0), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.push(Tok::Name(name));
    }

    fn read_punct(&mut self) -> Result<(), ScriptError> {
        for table in [PUNCT3, PUNCT2, PUNCT1] {
            for p in table {
                let len = p.chars().count();
                let matches = p
                    .chars()
                    .enumerate()
                    .all(|(i, pc)| self.peek(i) == Some(pc));
                if matches {
                    self.pos += len;
                    match *p {
                        "(" | "[" | "{" => self.depth += 1,
                        ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                        _ => {}
                    }
                    self.push(Tok::Punct(p));
                    return Ok(());
                }
            }
        }
        let c = self.peek(0).unwrap_or('?');
        Err(self.error(format!("invalid character '{c}'")))
    }
}
