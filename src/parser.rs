use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::expr::{Expr, LiteralValue};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

/// Recursive-descent parser over a scanned token list.
///
/// The pull interface mirrors the scanner's: `next_declaration` and
/// `next_expression` return `None` once the cursor reaches `EOF` (the
/// benign end-of-stream sentinel), and `Some(Err(..))` for a syntax error.
/// Running out of tokens *inside* a production is the fatal
/// `LoxError::UnexpectedEof`.  `EOF` itself is never consumed.
///
/// There is no error synchronization: the first error is returned to the
/// driver and parsing stops.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    fun_depth: usize,
}

impl Parser {
    /// `tokens` must end with the scanner's synthetic `EOF` token.
    pub fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(
            tokens.last().map(|t| &t.token_type),
            Some(TokenType::EOF)
        ));

        Parser {
            tokens,
            pos: 0,
            fun_depth: 0,
        }
    }

    pub fn next_declaration(&mut self) -> Option<Result<Stmt>> {
        if self.is_at_end() {
            return None;
        }

        Some(self.declaration())
    }

    pub fn next_expression(&mut self) -> Option<Result<Expr>> {
        if self.is_at_end() {
            return None;
        }

        Some(self.expression())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Declarations and statements
    // ─────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Result<Stmt> {
        if self.check(&TokenType::CLASS) {
            return self.class_declaration();
        }

        if self.check(&TokenType::FUN) {
            return self.fun_declaration();
        }

        if self.check(&TokenType::VAR) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        self.advance();

        let name = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass = if self.matches(&[TokenType::LESS]).is_some() {
            let superclass = self.consume(TokenType::IDENTIFIER, "Expect superclass name.")?;

            if superclass.lexeme == name.lexeme {
                return Err(LoxError::SelfInheritance {
                    name: superclass.lexeme,
                    line: superclass.line,
                });
            }

            Some(superclass)
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn fun_declaration(&mut self) -> Result<Stmt> {
        self.advance();

        Ok(Stmt::Function(self.function("function")?))
    }

    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        let name = self.consume(TokenType::IDENTIFIER, &format!("Expect {} name.", kind))?;

        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if self.matches(&[TokenType::COMMA]).is_none() {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        self.fun_depth += 1;
        let body = self.block();
        self.fun_depth -= 1;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: body?,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        self.advance();

        let name = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer = if self.matches(&[TokenType::EQUAL]).is_some() {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.check(&TokenType::PRINT) {
            return self.print_statement();
        }

        if self.check(&TokenType::LEFT_BRACE) {
            self.advance();

            return Ok(Stmt::Block(self.block()?));
        }

        if self.check(&TokenType::IF) {
            return self.if_statement();
        }

        if self.check(&TokenType::WHILE) {
            return self.while_statement();
        }

        if self.check(&TokenType::FOR) {
            return self.for_statement();
        }

        if self.check(&TokenType::RETURN) {
            return self.return_statement();
        }

        self.expression_statement()
    }

    /// Parses `declaration* "}"`; the opening brace has been consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        self.advance();

        let value = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.advance();

        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.matches(&[TokenType::ELSE]).is_some() {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.advance();

        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    /// `for` has no statement node of its own; it is desugared here into
    /// `{ init; while (cond) { body; inc; } }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        let keyword = self.advance();

        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.matches(&[TokenType::SEMICOLON]).is_some() {
            None
        } else if self.check(&TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or(Expr::Literal {
            value: LiteralValue::True,
            line: keyword.line,
        });

        let desugared = Stmt::While {
            condition,
            body: Box::new(body),
        };

        let mut statements: Vec<Stmt> = Vec::new();

        if let Some(initializer) = initializer {
            statements.push(initializer);
        }

        statements.push(desugared);

        Ok(Stmt::Block(statements))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.advance();

        if self.fun_depth == 0 {
            return Err(LoxError::unexpected_token(
                keyword.line,
                keyword.lexeme,
                "Can't return from top-level code.",
            ));
        }

        let value = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions, lowest precedence first
    // ─────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    /// The LHS is parsed as an ordinary expression first, then
    /// re-interpreted: a variable read becomes an assignment, a property
    /// get becomes a property set, anything else is an error.
    /// Right-associative.
    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.logic_or()?;

        if let Some(equals) = self.matches(&[TokenType::EQUAL]) {
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name } => Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                _ => Err(LoxError::InvalidAssignmentTarget { line: equals.line }),
            };
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr> {
        let mut expr = self.logic_and()?;

        while let Some(operator) = self.matches(&[TokenType::OR]) {
            let right = self.logic_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while let Some(operator) = self.matches(&[TokenType::AND]) {
            let right = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while let Some(operator) = self.matches(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let right = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while let Some(operator) = self.matches(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let right = self.term()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while let Some(operator) = self.matches(&[TokenType::MINUS, TokenType::PLUS]) {
            let right = self.factor()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while let Some(operator) = self.matches(&[TokenType::SLASH, TokenType::STAR]) {
            let right = self.unary()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(operator) = self.matches(&[TokenType::BANG, TokenType::MINUS]) {
            let right = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if let Some(paren) = self.matches(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr, paren.line)?;
            } else if self.matches(&[TokenType::DOT]).is_some() {
                let name =
                    self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr, line: usize) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                arguments.push(self.expression()?);

                if self.matches(&[TokenType::COMMA]).is_none() {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            arguments,
            line,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        let Token {
            token_type,
            lexeme,
            line,
        } = self.advance();

        match token_type {
            TokenType::TRUE => Ok(Expr::Literal {
                value: LiteralValue::True,
                line,
            }),

            TokenType::FALSE => Ok(Expr::Literal {
                value: LiteralValue::False,
                line,
            }),

            TokenType::NIL => Ok(Expr::Literal {
                value: LiteralValue::Nil,
                line,
            }),

            TokenType::NUMBER(n) => Ok(Expr::Literal {
                value: LiteralValue::Number(n),
                line,
            }),

            TokenType::STRING(s) => Ok(Expr::Literal {
                value: LiteralValue::Str(s),
                line,
            }),

            // `this` and `super` are plain identifier reads; the evaluator
            // resolves them through the environment chain like any name.
            tt @ (TokenType::IDENTIFIER | TokenType::THIS | TokenType::SUPER) => {
                Ok(Expr::Variable {
                    name: Token::new(tt, lexeme, line),
                })
            }

            TokenType::LEFT_PAREN => {
                let expr = self.expression()?;

                if self.matches(&[TokenType::RIGHT_PAREN]).is_none() {
                    return Err(LoxError::UnbalancedParentheses { line });
                }

                Ok(Expr::Grouping {
                    expression: Box::new(expr),
                    line,
                })
            }

            TokenType::EOF => Err(LoxError::UnexpectedEof { line }),

            _ => Err(LoxError::unexpected_token(line, lexeme, "Expect expression.")),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cursor helpers
    // ─────────────────────────────────────────────────────────────────────

    fn matches(&mut self, types: &[TokenType]) -> Option<Token> {
        for token_type in types {
            if self.check(token_type) {
                return Some(self.advance());
            }
        }

        None
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token> {
        if self.check(&token_type) {
            return Ok(self.advance());
        }

        let token = self.peek();

        if self.is_at_end() {
            Err(LoxError::UnexpectedEof { line: token.line })
        } else {
            Err(LoxError::unexpected_token(
                token.line,
                token.lexeme.clone(),
                message,
            ))
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        !self.is_at_end() && &self.peek().token_type == token_type
    }

    /// Returns the current token and moves the cursor, except at `EOF`,
    /// which is never consumed.
    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();

        if !self.is_at_end() {
            self.pos += 1;
        }

        token
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }
}
