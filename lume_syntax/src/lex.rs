use crate::{
    error::{Error, ErrorMsg},
    token::{Keywords, Position, TextRange, Token, TokenKind},
};
use std::{iter::Peekable, str::Bytes};

pub const DEFAULT_COMMENT: u8 = b'$';

/// Lexes a single logged line into tokens terminated by `END_LINE`.
#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    stream: Peekable<Bytes<'a>>,
    keywords: &'a Keywords,
    comment: u8,
    line: usize,
    start: usize,
    current: usize,
}

impl<'a> Lexer<'a> {
    /// `line` is the index of `source` in the line log.
    pub fn new(source: &'a str, line: usize, keywords: &'a Keywords) -> Self {
        Self {
            source,
            stream: source.bytes().peekable(),
            keywords,
            comment: DEFAULT_COMMENT,
            line,
            start: 0,
            current: 0,
        }
    }

    pub fn with_comment(mut self, comment: u8) -> Self {
        self.comment = comment;
        self
    }

    pub fn lex_line(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens: Vec<Token> = Vec::default();
        loop {
            let t = self.lex()?;
            let done = t.kind == TokenKind::END_LINE;
            tokens.push(t);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    pub fn lex(&mut self) -> Result<Token, Error> {
        self.advance_while(|c| matches!(c, b' ' | b'\t' | b'\r'));
        self.start = self.current;
        let Some(c) = self.advance() else {
            return Ok(self.end_line());
        };
        if c == self.comment {
            self.advance_while(|_| true);
            self.start = self.current;
            return Ok(self.end_line());
        }
        match c {
            b'<' => {
                let kind = if self.advance_if(|c| c == b'=').is_some() {
                    TokenKind::LESS_EQUAL
                } else if self.advance_if(|c| c == b'-').is_some() {
                    TokenKind::ASSIGN
                } else if self.advance_if(|c| c == b'>').is_some() {
                    TokenKind::DIFFERENT
                } else {
                    TokenKind::LESS
                };
                Ok(self.make_token(kind))
            }
            b'>' => Ok(self.lookahead_for_token(
                b'=',
                TokenKind::GREATER_EQUAL,
                TokenKind::GREATER,
            )),
            b'"' => self.lex_string(),
            b'\'' => self.lex_char(),
            b'.' if self.stream.peek().filter(|c| c.is_ascii_digit()).is_some() => {
                self.advance_while(|c| c.is_ascii_digit());
                Ok(self.make_token(TokenKind::NUMBER))
            }
            _ => {
                if let Some(t) = TokenKind::from_char(c) {
                    Ok(self.make_token(t))
                } else if c.is_ascii_alphabetic() || c == b'_' {
                    Ok(self.lex_ident())
                } else if c.is_ascii_digit() {
                    Ok(self.lex_number())
                } else {
                    Err(self.error(ErrorMsg::InvalidSyntax))
                }
            }
        }
    }

    fn lex_ident(&mut self) -> Token {
        self.advance_while(is_ident_char);
        let mut word = self.lexeme_from_range();
        // Compound keywords are joined word by word while they still
        // prefix a known spelling; unmatched words are given back.
        let mut best = (self.stream.clone(), self.current, self.keywords.get(&word));
        while self.stream.peek() == Some(&b' ') && self.keywords.continues(&word) {
            self.advance();
            if self.advance_while(is_ident_char).is_none() {
                break;
            }
            word = self.lexeme_from_range();
            if let Some(kind) = self.keywords.get(&word) {
                best = (self.stream.clone(), self.current, Some(kind));
            }
        }
        let (stream, current, kind) = best;
        self.stream = stream;
        self.current = current;
        self.make_token(kind.unwrap_or(TokenKind::IDENT))
    }

    fn lex_number(&mut self) -> Token {
        self.advance_while(|c| c.is_ascii_digit());
        if self.advance_if(|c| c == b'.').is_some() {
            self.advance_while(|c| c.is_ascii_digit());
        }
        self.make_token(TokenKind::NUMBER)
    }

    fn lex_char(&mut self) -> Result<Token, Error> {
        let c = match self.advance() {
            Some(b'\\') => match self.advance() {
                Some(e) => unescape(e),
                None => return Err(self.error(ErrorMsg::UnterminatedChar)),
            },
            Some(c) => c,
            None => return Err(self.error(ErrorMsg::UnterminatedChar)),
        };
        if self.advance_if(|c| c == b'\'').is_none() {
            let at_end = self.stream.peek().is_none();
            return Err(self.error(if at_end {
                ErrorMsg::UnterminatedChar
            } else {
                ErrorMsg::UseDoubleQuotes
            }));
        }
        Ok(Token::new(
            TokenKind::CHAR,
            self.text_range(),
            char::from(c).to_string(),
        ))
    }

    fn lex_string(&mut self) -> Result<Token, Error> {
        let mut bytes = Vec::default();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(e) => bytes.push(unescape(e)),
                    None => return Err(self.error(ErrorMsg::UnterminatedString)),
                },
                Some(c) => bytes.push(c),
                None => return Err(self.error(ErrorMsg::UnterminatedString)),
            }
        }
        Ok(Token::new(
            TokenKind::STRING,
            self.text_range(),
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }

    fn end_line(&self) -> Token {
        Token::new(
            TokenKind::END_LINE,
            TextRange::new(self.position(self.start), self.position(self.start + 1)),
            "end of line".to_string(),
        )
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.text_range(), self.lexeme_from_range())
    }

    fn lexeme_from_range(&self) -> String {
        String::from_utf8_lossy(&self.source.as_bytes()[self.start..self.current]).into_owned()
    }

    fn position(&self, column: usize) -> Position {
        Position::new(self.line, column)
    }

    fn text_range(&self) -> TextRange {
        TextRange::new(self.position(self.start), self.position(self.current))
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.stream.next();
        if c.is_some() {
            self.current += 1;
        }
        c
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<u8>
    where
        F: FnOnce(u8) -> bool,
    {
        if self.stream.peek().filter(|&&c| cond(c)).is_some() {
            self.advance()
        } else {
            None
        }
    }

    fn advance_while<F>(&mut self, cond: F) -> Option<usize>
    where
        F: Fn(u8) -> bool,
    {
        let mut count: usize = 0;
        while self.stream.peek().filter(|&&c| cond(c)).is_some() {
            count += 1;
            self.advance();
        }
        count.ne(&0).then_some(count)
    }

    fn lookahead_for_token(
        &mut self,
        match_char: u8,
        if_match: TokenKind,
        no_match: TokenKind,
    ) -> Token {
        if self.advance_if(|c| c == match_char).is_some() {
            self.make_token(if_match)
        } else {
            self.make_token(no_match)
        }
    }

    fn error(&self, msg: ErrorMsg) -> Error {
        let end = self.current.max(self.start + 1);
        Error::lex(
            msg,
            TextRange::new(self.position(self.start), self.position(end)),
        )
    }
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Byte denoted by a backslash escape; unknown escapes stand for themselves.
pub fn unescape(c: u8) -> u8 {
    match c {
        b'0' => b'\0',
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0b,
        _ => c,
    }
}

/// Inverse of [`unescape`] for the bytes that have a named escape.
pub fn escape(c: u8) -> Option<char> {
    let e = match c {
        b'\0' => '0',
        0x07 => 'a',
        0x08 => 'b',
        0x0c => 'f',
        b'\n' => 'n',
        b'\r' => 'r',
        b'\t' => 't',
        0x0b => 'v',
        _ => return None,
    };
    Some(e)
}
