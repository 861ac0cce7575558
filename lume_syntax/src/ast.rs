use std::{fmt::Display, rc::Rc};

use crate::token::{TextRange, TokenKind};

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub range: TextRange,
    pub expr: Expr,
}

impl Node {
    pub fn new(range: TextRange, expr: Expr) -> Self {
        Self { range, expr }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl UnaryOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::PLUS => Self::Plus,
            TokenKind::MINUS => Self::Minus,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Star,
    Slash,
    Modulo,
    Equal,
    Different,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Modulo => "%",
            Self::Equal => "=",
            Self::Different => "<>",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
        })
    }
}

impl BinOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::PLUS => Self::Plus,
            TokenKind::MINUS => Self::Minus,
            TokenKind::STAR => Self::Star,
            TokenKind::SLASH => Self::Slash,
            TokenKind::MODULO => Self::Modulo,
            TokenKind::EQUAL => Self::Equal,
            TokenKind::DIFFERENT => Self::Different,
            TokenKind::GREATER => Self::Greater,
            TokenKind::GREATER_EQUAL => Self::GreaterEqual,
            TokenKind::LESS => Self::Less,
            TokenKind::LESS_EQUAL => Self::LessEqual,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::AND => Self::And,
            TokenKind::OR => Self::Or,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Char(u8),
    Str(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub range: TextRange,
}

/// Left-hand side of an assignment: a name, optionally indexed.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub ident: Ident,
    pub indices: Vec<Node>,
}

impl Target {
    pub fn range(&self) -> TextRange {
        match self.indices.last() {
            Some(index) => self.ident.range.to(index.range),
            None => self.ident.range,
        }
    }
}

pub type Body = Vec<Node>;

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Option<Ident>,
    pub params: Vec<Ident>,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Array(Vec<Node>),
    Dict(Vec<(Node, Node)>),
    Variable(Ident),
    Unary {
        op: UnaryOp,
        expr: Box<Node>,
    },
    Binary {
        lhs: Box<Node>,
        op: BinOp,
        rhs: Box<Node>,
    },
    Logical {
        lhs: Box<Node>,
        op: LogicalOp,
        rhs: Box<Node>,
    },
    Assignment {
        target: Target,
        value: Box<Node>,
        is_const: bool,
    },
    Index {
        container: Box<Node>,
        index: Box<Node>,
    },
    Call {
        func: Box<Node>,
        args: Vec<Node>,
        parens: TextRange,
    },
    If {
        condition: Box<Node>,
        then_body: Body,
        else_body: Option<Body>,
    },
    For {
        target: Target,
        start: Box<Node>,
        stop: Box<Node>,
        step: Option<Box<Node>>,
        body: Body,
    },
    While {
        condition: Box<Node>,
        body: Body,
    },
    DoUntil {
        body: Body,
        condition: Box<Node>,
    },
    Print {
        args: Vec<Node>,
        target: Option<Ident>,
    },
    Read {
        targets: Vec<Target>,
        source: Option<Ident>,
    },
    Try {
        body: Body,
        catch: Option<Body>,
    },
    Throw(Box<Node>),
    Function(Rc<FunctionDecl>),
    Return(Option<Box<Node>>),
    Break,
    Continue,
    Include(String),
    Run(String),
}
