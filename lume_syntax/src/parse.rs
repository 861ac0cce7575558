use std::rc::Rc;

use crate::{
    ast::{self, Body, Expr, FunctionDecl, Ident, Literal, Node, Target},
    error::{Error, ErrorMsg},
    lex::{Lexer, DEFAULT_COMMENT},
    source::{LineLog, LineSource},
    token::{Keywords, Position, TextRange, Token, TokenKind},
};

/// Recursive descent parser over the tokens of one line.
///
/// When a construct opens a body that continues past the current line,
/// the parser pulls further lines from `source`, logs and lexes them,
/// and carries on with the new tokens. After a statement is parsed, the
/// parser is positioned wherever the last pulled line left off.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    last: TextRange,
    lines: &'a mut LineLog,
    source: &'a mut dyn LineSource,
    keywords: &'a Keywords,
    comment: u8,
}

impl<'a> Parser<'a> {
    pub fn new(
        mut tokens: Vec<Token>,
        lines: &'a mut LineLog,
        source: &'a mut dyn LineSource,
        keywords: &'a Keywords,
    ) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::END_LINE) {
            let range = tokens.last().map(|t| t.range).unwrap_or_default();
            tokens.push(Token::new(
                TokenKind::END_LINE,
                range,
                "end of line".to_string(),
            ));
        }
        Self {
            tokens,
            current: 0,
            last: TextRange::default(),
            lines,
            source,
            keywords,
            comment: DEFAULT_COMMENT,
        }
    }

    pub fn with_comment(mut self, comment: u8) -> Self {
        self.comment = comment;
        self
    }

    /// Parse one statement, which must end the line it finishes on.
    /// Empty lines parse to `None`.
    pub fn parse(&mut self) -> Result<Option<Node>, Error> {
        let node = self.parse_stmt()?;
        if self.peek().kind != TokenKind::END_LINE {
            return Err(Error::parse(
                ErrorMsg::IncorrectInstruction,
                self.peek().range,
            ));
        }
        Ok(node)
    }

    fn parse_stmt(&mut self) -> Result<Option<Node>, Error> {
        if self.at_stmt_end() {
            return Ok(None);
        }
        let Some(kw) = self.advance_if(|t| matches!(t.kind, TokenKind::CONST | TokenKind::LET))
        else {
            return self.parse_expr().map(Some);
        };
        let node = self.parse_expr()?;
        match node.expr {
            Expr::Assignment { target, value, .. } => Ok(Some(Node::new(
                kw.range.to(node.range),
                Expr::Assignment {
                    target,
                    value,
                    is_const: kw.kind == TokenKind::CONST,
                },
            ))),
            _ => Err(Error::parse(ErrorMsg::AssignmentExpected, node.range)),
        }
    }

    /// Keywords that close or continue a construct end a statement.
    fn at_stmt_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::END_LINE
                | TokenKind::THEN
                | TokenKind::ELSE
                | TokenKind::END
                | TokenKind::EXECUTE
                | TokenKind::UNTIL
                | TokenKind::CATCH
        )
    }

    fn parse_expr(&mut self) -> Result<Node, Error> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Node, Error> {
        let lhs = self.parse_logical()?;
        if self.advance_if(|t| t.kind == TokenKind::ASSIGN).is_none() {
            return Ok(lhs);
        }
        let value = self.parse_assignment()?;
        let target = Self::into_target(lhs)?;
        Ok(Node::new(
            target.ident.range.to(value.range),
            Expr::Assignment {
                target,
                value: Box::new(value),
                is_const: false,
            },
        ))
    }

    /// Unwind an index chain rooted at a variable into an assignment target.
    fn into_target(mut node: Node) -> Result<Target, Error> {
        let mut indices = vec![];
        loop {
            match node.expr {
                Expr::Variable(ident) => {
                    indices.reverse();
                    return Ok(Target { ident, indices });
                }
                Expr::Index { container, index } => {
                    indices.push(*index);
                    node = *container;
                }
                _ => return Err(Error::parse(ErrorMsg::InvalidAssignment, node.range)),
            }
        }
    }

    fn parse_logical(&mut self) -> Result<Node, Error> {
        let mut lhs = self.parse_comparison()?;
        while let Some(op) =
            self.advance_if(|t| matches!(t.kind, TokenKind::AND | TokenKind::OR))
        {
            // Infallible unwrap as we are ensuring the right token kind above
            let op = ast::LogicalOp::from_token(op.kind)
                .expect("non-logical operators cannot be present here");
            let rhs = self.parse_comparison()?;
            lhs = Node::new(
                lhs.range.to(rhs.range),
                Expr::Logical {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Node, Error> {
        self.parse_binary(Self::parse_term, |kind| {
            matches!(
                kind,
                TokenKind::EQUAL
                    | TokenKind::DIFFERENT
                    | TokenKind::GREATER
                    | TokenKind::GREATER_EQUAL
                    | TokenKind::LESS
                    | TokenKind::LESS_EQUAL
            )
        })
    }

    fn parse_term(&mut self) -> Result<Node, Error> {
        self.parse_binary(Self::parse_factor, |kind| {
            matches!(kind, TokenKind::PLUS | TokenKind::MINUS)
        })
    }

    fn parse_factor(&mut self) -> Result<Node, Error> {
        self.parse_binary(Self::parse_unary, |kind| {
            matches!(
                kind,
                TokenKind::STAR | TokenKind::SLASH | TokenKind::MODULO
            )
        })
    }

    fn parse_binary<F, P>(&mut self, operand: F, is_op: P) -> Result<Node, Error>
    where
        F: Fn(&mut Self) -> Result<Node, Error>,
        P: Fn(TokenKind) -> bool,
    {
        let mut lhs = operand(self)?;
        while let Some(op) = self.advance_if(|t| is_op(t.kind)) {
            // Infallible unwrap as we are ensuring the right token kind above
            let op = ast::BinOp::from_token(op.kind)
                .expect("non-binary operators cannot be present here");
            let rhs = operand(self)?;
            lhs = Node::new(
                lhs.range.to(rhs.range),
                Expr::Binary {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node, Error> {
        if let Some(op) = self.advance_if(|t| matches!(t.kind, TokenKind::PLUS | TokenKind::MINUS))
        {
            let expr = self.parse_unary()?;
            return Ok(Node::new(
                op.range.to(expr.range),
                Expr::Unary {
                    // Infallible unwrap as we are ensuring the right token kind above
                    op: ast::UnaryOp::from_token(op.kind)
                        .expect("non-unary operators cannot be present here"),
                    expr: Box::new(expr),
                },
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Node, Error> {
        let mut node = self.parse_primary()?;
        loop {
            if self.advance_if(|t| t.kind == TokenKind::LBRACKET).is_some() {
                let index = self.parse_expr()?;
                self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::Expected("]"))?;
                node = Node::new(
                    node.range.to(self.last),
                    Expr::Index {
                        container: Box::new(node),
                        index: Box::new(index),
                    },
                );
            } else if let Some(open) = self.advance_if(|t| t.kind == TokenKind::LPAREN) {
                let args = self.parse_list(TokenKind::RPAREN, ")")?;
                node = Node::new(
                    node.range.to(self.last),
                    Expr::Call {
                        func: Box::new(node),
                        args,
                        parens: open.range.to(self.last),
                    },
                );
            } else {
                break;
            }
        }
        Ok(node)
    }

    /// Comma separated expressions up to and including `close`.
    fn parse_list(&mut self, close: TokenKind, spelling: &'static str) -> Result<Vec<Node>, Error> {
        let mut items = vec![];
        if self.advance_if(|t| t.kind == close).is_some() {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.advance_or_err(close, ErrorMsg::Expected(spelling))?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Node, Error> {
        let t = self.advance();
        let expr = match t.kind {
            TokenKind::NUMBER => {
                let n = t
                    .lexeme
                    .parse()
                    .map_err(|_| Error::parse(ErrorMsg::InvalidSyntax, t.range))?;
                Expr::Literal(Literal::Number(n))
            }
            TokenKind::CHAR => Expr::Literal(Literal::Char(
                t.lexeme.bytes().next().unwrap_or_default(),
            )),
            TokenKind::STRING => Expr::Literal(Literal::Str(t.lexeme.clone())),
            TokenKind::IDENT => Expr::Variable(Ident {
                name: t.lexeme.clone(),
                range: t.range,
            }),
            TokenKind::LPAREN => {
                let inner = self.parse_expr()?;
                self.advance_or_err(TokenKind::RPAREN, ErrorMsg::Expected(")"))?;
                return Ok(Node::new(t.range.to(self.last), inner.expr));
            }
            TokenKind::LBRACKET => Expr::Array(self.parse_list(TokenKind::RBRACKET, "]")?),
            TokenKind::LBRACE => self.parse_dict()?,
            TokenKind::IF => self.parse_if()?,
            TokenKind::FOR => self.parse_for()?,
            TokenKind::WHILE => self.parse_while()?,
            TokenKind::DO => self.parse_do()?,
            TokenKind::TRY => self.parse_try()?,
            TokenKind::FUNCTION => self.parse_function()?,
            TokenKind::PRINT => self.parse_print()?,
            TokenKind::READ => self.parse_read()?,
            TokenKind::THROW => Expr::Throw(Box::new(self.parse_expr()?)),
            TokenKind::RETURN => {
                if self.at_stmt_end() {
                    Expr::Return(None)
                } else {
                    Expr::Return(Some(Box::new(self.parse_expr()?)))
                }
            }
            TokenKind::BREAK => Expr::Break,
            TokenKind::CONTINUE => Expr::Continue,
            TokenKind::INCLUDE => Expr::Include(self.parse_path()?),
            TokenKind::RUN => Expr::Run(self.parse_path()?),
            _ => return Err(Error::parse(ErrorMsg::ExpressionExpected, t.range)),
        };
        Ok(Node::new(t.range.to(self.last), expr))
    }

    fn parse_dict(&mut self) -> Result<Expr, Error> {
        let mut entries = vec![];
        if self.advance_if(|t| t.kind == TokenKind::RBRACE).is_some() {
            return Ok(Expr::Dict(entries));
        }
        loop {
            let key = self.parse_expr()?;
            self.advance_or_err(TokenKind::COLON, ErrorMsg::Expected(":"))?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        self.advance_or_err(TokenKind::RBRACE, ErrorMsg::Expected("}"))?;
        Ok(Expr::Dict(entries))
    }

    fn parse_if(&mut self) -> Result<Expr, Error> {
        let condition = self.parse_expr()?;
        self.advance_or_err(TokenKind::THEN, ErrorMsg::Expected("then"))?;
        let then_body = self.parse_body(&[TokenKind::ELSE, TokenKind::END])?;
        let else_body = if self.advance_if(|t| t.kind == TokenKind::ELSE).is_some() {
            Some(self.parse_body(&[TokenKind::END])?)
        } else {
            None
        };
        self.advance_or_err(TokenKind::END, ErrorMsg::Expected("end"))?;

        Ok(Expr::If {
            condition: Box::new(condition),
            then_body,
            else_body,
        })
    }

    fn parse_for(&mut self) -> Result<Expr, Error> {
        let target = self.parse_target()?;
        self.advance_or_err(TokenKind::ASSIGN, ErrorMsg::AssignmentExpected)?;
        let start = self.parse_expr()?;
        self.advance_or_err(TokenKind::COMMA, ErrorMsg::Expected(","))?;
        let stop = self.parse_expr()?;
        let step = if self.advance_if(|t| t.kind == TokenKind::COMMA).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.advance_or_err(TokenKind::EXECUTE, ErrorMsg::Expected("execute"))?;
        let body = self.parse_body(&[TokenKind::END])?;
        self.advance_or_err(TokenKind::END, ErrorMsg::Expected("end"))?;

        Ok(Expr::For {
            target,
            start: Box::new(start),
            stop: Box::new(stop),
            step,
            body,
        })
    }

    fn parse_while(&mut self) -> Result<Expr, Error> {
        let condition = self.parse_expr()?;
        self.advance_or_err(TokenKind::EXECUTE, ErrorMsg::Expected("execute"))?;
        let body = self.parse_body(&[TokenKind::END])?;
        self.advance_or_err(TokenKind::END, ErrorMsg::Expected("end"))?;

        Ok(Expr::While {
            condition: Box::new(condition),
            body,
        })
    }

    fn parse_do(&mut self) -> Result<Expr, Error> {
        let body = self.parse_body(&[TokenKind::UNTIL])?;
        self.advance_or_err(TokenKind::UNTIL, ErrorMsg::Expected("until"))?;
        let condition = self.parse_expr()?;

        Ok(Expr::DoUntil {
            body,
            condition: Box::new(condition),
        })
    }

    fn parse_try(&mut self) -> Result<Expr, Error> {
        let body = self.parse_body(&[TokenKind::CATCH, TokenKind::END])?;
        let catch = if self.advance_if(|t| t.kind == TokenKind::CATCH).is_some() {
            Some(self.parse_body(&[TokenKind::END])?)
        } else {
            None
        };
        self.advance_or_err(TokenKind::END, ErrorMsg::Expected("end"))?;

        Ok(Expr::Try { body, catch })
    }

    fn parse_function(&mut self) -> Result<Expr, Error> {
        let name = self
            .advance_if(|t| t.kind == TokenKind::IDENT)
            .map(|t| Ident {
                name: t.lexeme,
                range: t.range,
            });
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::Expected("("))?;
        let mut params = vec![];
        if self.advance_if(|t| t.kind == TokenKind::RPAREN).is_none() {
            loop {
                params.push(self.parse_ident()?);
                if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                    break;
                }
            }
            self.advance_or_err(TokenKind::RPAREN, ErrorMsg::Expected(")"))?;
        }
        self.advance_or_err(TokenKind::COLON, ErrorMsg::Expected(":"))?;
        let body = self.parse_body(&[TokenKind::END])?;
        self.advance_or_err(TokenKind::END, ErrorMsg::Expected("end"))?;

        Ok(Expr::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn parse_print(&mut self) -> Result<Expr, Error> {
        let mut args = vec![self.parse_expr()?];
        while self.advance_if(|t| t.kind == TokenKind::COMMA).is_some() {
            args.push(self.parse_expr()?);
        }
        let target = if self.advance_if(|t| t.kind == TokenKind::COLON).is_some() {
            Some(self.parse_ident()?)
        } else {
            None
        };
        Ok(Expr::Print { args, target })
    }

    fn parse_read(&mut self) -> Result<Expr, Error> {
        let mut targets = vec![self.parse_target()?];
        while self.advance_if(|t| t.kind == TokenKind::COMMA).is_some() {
            targets.push(self.parse_target()?);
        }
        let source = if self.advance_if(|t| t.kind == TokenKind::COLON).is_some() {
            Some(self.parse_ident()?)
        } else {
            None
        };
        Ok(Expr::Read { targets, source })
    }

    fn parse_path(&mut self) -> Result<String, Error> {
        Ok(self
            .advance_or_err(TokenKind::STRING, ErrorMsg::StringExpected)?
            .lexeme)
    }

    fn parse_ident(&mut self) -> Result<Ident, Error> {
        let t = self.advance_or_err(TokenKind::IDENT, ErrorMsg::IdentifierExpected)?;
        Ok(Ident {
            name: t.lexeme,
            range: t.range,
        })
    }

    fn parse_target(&mut self) -> Result<Target, Error> {
        let ident = self.parse_ident()?;
        let mut indices = vec![];
        while self.advance_if(|t| t.kind == TokenKind::LBRACKET).is_some() {
            indices.push(self.parse_expr()?);
            self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::Expected("]"))?;
        }
        Ok(Target { ident, indices })
    }

    /// Parse statements until one of `terminators` is reached, pulling
    /// new lines from the source as needed. The terminator itself is
    /// left for the caller to consume.
    fn parse_body(&mut self, terminators: &[TokenKind]) -> Result<Body, Error> {
        let mut body = Body::default();
        loop {
            if self.peek().kind == TokenKind::END_LINE {
                self.pull_line()?;
            }
            if let Some(stmt) = self.parse_stmt()? {
                body.push(stmt);
            }
            let kind = self.peek().kind;
            if terminators.contains(&kind) {
                return Ok(body);
            }
            if kind != TokenKind::END_LINE {
                return Err(Error::parse(
                    ErrorMsg::IncorrectInstruction,
                    self.peek().range,
                ));
            }
        }
    }

    fn pull_line(&mut self) -> Result<(), Error> {
        let Some(text) = self.source.next_line() else {
            let line = self.lines.len().saturating_sub(1);
            let end = self.lines.get(line).map(|l| l.text.len()).unwrap_or_default();
            return Err(Error::parse(
                ErrorMsg::UnclosedBody,
                TextRange::new(Position::new(line, 0), Position::new(line, end)),
            ));
        };
        let index = self.lines.push(self.source.origin(), &text);
        self.tokens = Lexer::new(&text, index, self.keywords)
            .with_comment(self.comment)
            .lex_line()?;
        self.current = 0;
        Ok(())
    }

    fn peek(&self) -> &Token {
        // The token buffer always ends with END_LINE, which is never consumed
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if t.kind != TokenKind::END_LINE {
            self.current += 1;
        }
        self.last = t.range;
        t
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<Token>
    where
        F: FnOnce(&Token) -> bool,
    {
        if cond(self.peek()) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn advance_or_err(&mut self, kind: TokenKind, msg: ErrorMsg) -> Result<Token, Error> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(Error::parse(msg, self.peek().range))
        }
    }
}
