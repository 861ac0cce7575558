use std::{collections::HashMap, fmt::Display};

/// A location in the line log: `line` indexes the logged line,
/// `column` is a byte offset into its text.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Range spanning from the start of `self` to the end of `other`.
    pub fn to(self, other: TextRange) -> Self {
        Self {
            start: self.start,
            end: other.end,
        }
    }
}

/// The enum variants are in SCREAMING_SNAKE_CASE as they technically
/// represent constants, but Rust does not allow const enum variants.
#[allow(nonstandard_style)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    // Symbols
    LPAREN,
    RPAREN,
    LBRACKET,
    RBRACKET,
    LBRACE,
    RBRACE,
    COMMA,
    COLON,
    // Arithmetic
    PLUS,
    MINUS,
    STAR,
    SLASH,
    MODULO,
    // Comparisons
    EQUAL,
    DIFFERENT,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,
    // Literals
    IDENT,
    STRING,
    CHAR,
    NUMBER,
    // Keywords
    AND,
    OR,
    CONST,
    LET,
    IF,
    THEN,
    ELSE,
    END,
    FOR,
    EXECUTE,
    WHILE,
    DO,
    UNTIL,
    PRINT,
    READ,
    TRY,
    CATCH,
    THROW,
    FUNCTION,
    RETURN,
    BREAK,
    CONTINUE,
    INCLUDE,
    RUN,
    // Miscellaneous tokens
    ASSIGN,
    END_LINE,
}

impl TokenKind {
    pub fn from_char(c: u8) -> Option<Self> {
        let token = match c {
            b'(' => Self::LPAREN,
            b')' => Self::RPAREN,
            b'[' => Self::LBRACKET,
            b']' => Self::RBRACKET,
            b'{' => Self::LBRACE,
            b'}' => Self::RBRACE,
            b',' => Self::COMMA,
            b':' => Self::COLON,
            b'+' => Self::PLUS,
            b'-' => Self::MINUS,
            b'*' => Self::STAR,
            b'/' => Self::SLASH,
            b'%' => Self::MODULO,
            b'=' => Self::EQUAL,
            _ => return None,
        };
        Some(token)
    }

    pub fn from_keyword(kw: &str) -> Option<Self> {
        let token = match kw {
            "and" => Self::AND,
            "or" => Self::OR,
            "const" => Self::CONST,
            "let" => Self::LET,
            "if" => Self::IF,
            "then" => Self::THEN,
            "else" => Self::ELSE,
            "end" => Self::END,
            "for" => Self::FOR,
            "execute" => Self::EXECUTE,
            "while" => Self::WHILE,
            "do" => Self::DO,
            "until" => Self::UNTIL,
            "print" => Self::PRINT,
            "read" => Self::READ,
            "try" => Self::TRY,
            "catch" => Self::CATCH,
            "throw" => Self::THROW,
            "function" => Self::FUNCTION,
            "return" => Self::RETURN,
            "break" => Self::BREAK,
            "continue" => Self::CONTINUE,
            "include" => Self::INCLUDE,
            "run" => Self::RUN,
            _ => return None,
        };
        Some(token)
    }

    pub fn is_keyword(self) -> bool {
        (self as u8) >= (Self::AND as u8) && (self as u8) <= (Self::RUN as u8)
    }
}

const DEFAULT_KEYWORDS: [&str; 24] = [
    "and", "or", "const", "let", "if", "then", "else", "end", "for", "execute", "while", "do",
    "until", "print", "read", "try", "catch", "throw", "function", "return", "break", "continue",
    "include", "run",
];

/// Spelling table used by the lexer to recognise keywords.
///
/// Spellings may contain single spaces (`"as long as"`), in which case
/// the lexer joins consecutive words while they still prefix a known
/// spelling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keywords {
    spellings: HashMap<String, TokenKind>,
}

impl Default for Keywords {
    fn default() -> Self {
        let spellings = DEFAULT_KEYWORDS
            .iter()
            .filter_map(|&kw| TokenKind::from_keyword(kw).map(|kind| (kw.to_string(), kind)))
            .collect();
        Self { spellings }
    }
}

impl Keywords {
    /// Replace every spelling of `kind` with `spelling`.
    pub fn rename(&mut self, kind: TokenKind, spelling: &str) {
        self.spellings.retain(|_, k| *k != kind);
        self.spellings.insert(spelling.to_string(), kind);
    }

    /// Add `spelling` as an alternative spelling for `kind`.
    pub fn alias(&mut self, kind: TokenKind, spelling: &str) {
        self.spellings.insert(spelling.to_string(), kind);
    }

    pub fn get(&self, word: &str) -> Option<TokenKind> {
        self.spellings.get(word).copied()
    }

    /// Whether some multi-word spelling continues past `prefix`.
    pub fn continues(&self, prefix: &str) -> bool {
        self.spellings
            .keys()
            .any(|kw| kw.len() > prefix.len() && kw.starts_with(prefix) && kw.as_bytes()[prefix.len()] == b' ')
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
    pub lexeme: String,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lexeme)
    }
}

impl Token {
    pub fn new(kind: TokenKind, range: TextRange, lexeme: String) -> Self {
        Self {
            kind,
            range,
            lexeme,
        }
    }
}
