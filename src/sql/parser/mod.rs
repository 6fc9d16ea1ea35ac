use std::collections::BTreeMap;
use std::iter::Peekable;
use std::slice;
use ast::Column;
use crate::sql::parser::ast::{Expression, FromItem, Operation, OrderDirection};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::error::{Result, Error};
use super::types::{DataType, Value};

pub mod ast;
mod lexer;

/// SQL Parser - Converts tokens into Abstract Syntax Tree (AST)
///
/// `?` placeholders are replaced by the bound parameters, in order, while
/// parsing; values never pass through the lexer.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    params: slice::Iter<'a, Value>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given SQL input
    pub fn new(input: &'a str) -> Self {
        Self::with_params(input, &[])
    }

    /// Creates a parser binding `params` to the statement's placeholders
    pub fn with_params(input: &'a str, params: &'a [Value]) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
            params: params.iter(),
        }
    }

    /// Parses the input SQL statement into an AST
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        self.next_if_token(Token::Semicolon);
        // No tokens allowed after the statement
        if let Some(token) = self.peek()? {
            return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
        }
        if self.params.len() > 0 {
            return Err(Error::Parse(format!(
                "[Parser] {} bound parameter(s) left without placeholder",
                self.params.len()
            )));
        }
        Ok(stmt)
    }

    /// Parses a statement based on the first token
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Create)) => self.parse_ddl(),
            Some(Token::Keyword(Keyword::Select)) => self.parse_select(),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Update)) => self.parse_update(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(t) => Err(Error::Parse(format!("[Parser] Unexpected token {}", t))),
            None => Err(Error::Parse("[Parser] Unexpected end of input".into())),
        }
    }

    /// Parses DDL statements (e.g., CREATE TABLE)
    fn parse_ddl(&mut self) -> Result<ast::Statement> {
        match self.next()? {
            Token::Keyword(Keyword::Create) => match self.next()? {
                Token::Keyword(Keyword::Table) => self.parse_ddl_create_table(),
                token => Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
            },
            token => Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
        }
    }

    /// Parses CREATE TABLE statement
    fn parse_ddl_create_table(&mut self) -> Result<ast::Statement> {
        let if_not_exists = if self.next_if_token(Token::Keyword(Keyword::If)).is_some() {
            self.next_expect(Token::Keyword(Keyword::Not))?;
            self.next_expect(Token::Keyword(Keyword::Exists))?;
            true
        } else {
            false
        };

        let table_name = self.next_ident()?;
        self.next_expect(Token::OpenParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_ddl_column()?);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        self.next_expect(Token::CloseParen)?;
        Ok(ast::Statement::CreateTable { name: table_name, columns, if_not_exists })
    }

    /// Parses column definition in CREATE TABLE
    fn parse_ddl_column(&mut self) -> Result<ast::Column> {
        let name = self.next_ident()?;
        let type_name = self.next_ident()?;
        let datatype = match type_name.as_str() {
            "int" | "integer" | "smallint" | "tinyint" | "bigint" => DataType::Integer,
            "bool" | "boolean" => DataType::Boolean,
            "float" | "double" | "real" | "decimal" => DataType::Float,
            "string" | "text" | "varchar" | "char" => DataType::String,
            // Temporal values are stored as ISO-8601 text
            "date" | "datetime" | "timestamp" => DataType::String,
            "blob" => DataType::Blob,
            other => return Err(Error::Parse(format!("[Parser] Unknown data type {}", other))),
        };
        // Length / precision is accepted and not enforced: VARCHAR(100)
        if self.next_if_token(Token::OpenParen).is_some() {
            loop {
                match self.next()? {
                    Token::Number(_) | Token::Comma => {}
                    Token::CloseParen => break,
                    token => {
                        return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
                    }
                }
            }
        }

        let mut column = Column {
            name,
            datatype,
            nullable: None,
            default: None,
            primary_key: false,
            unique: false,
            references: None,
        };

        // Parse column constraints
        loop {
            match self.peek()? {
                Some(Token::Keyword(_)) => {}
                _ => break,
            }
            match self.next()? {
                Token::Keyword(Keyword::Null) => column.nullable = Some(true),
                Token::Keyword(Keyword::Not) => {
                    self.next_expect(Token::Keyword(Keyword::Null))?;
                    column.nullable = Some(false);
                }
                Token::Keyword(Keyword::Default) => column.default = Some(self.parse_operand()?),
                Token::Keyword(Keyword::Primary) => {
                    self.next_expect(Token::Keyword(Keyword::Key))?;
                    column.primary_key = true;
                }
                Token::Keyword(Keyword::Unique) => column.unique = true,
                Token::Keyword(Keyword::References) => {
                    let mut target = self.next_ident()?;
                    if self.next_if_token(Token::OpenParen).is_some() {
                        let col = self.next_ident()?;
                        self.next_expect(Token::CloseParen)?;
                        target = format!("{}({})", target, col);
                    }
                    column.references = Some(target);
                }
                // Referential actions are accepted and not enforced
                Token::Keyword(Keyword::On) => {
                    match self.next()? {
                        Token::Keyword(Keyword::Delete) | Token::Keyword(Keyword::Update) => {}
                        token => {
                            return Err(Error::Parse(format!(
                                "[Parser] Unexpected token {}",
                                token
                            )));
                        }
                    }
                    self.parse_referential_action()?;
                }
                token => return Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
            }
        }

        Ok(column)
    }

    /// CASCADE | RESTRICT | SET NULL | SET DEFAULT | NO ACTION
    fn parse_referential_action(&mut self) -> Result<()> {
        match self.next()? {
            Token::Ident(action) if action == "cascade" || action == "restrict" => Ok(()),
            Token::Keyword(Keyword::Set) => match self.next()? {
                Token::Keyword(Keyword::Null) | Token::Keyword(Keyword::Default) => Ok(()),
                token => Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
            },
            Token::Ident(no) if no == "no" => match self.next()? {
                Token::Ident(action) if action == "action" => Ok(()),
                token => Err(Error::Parse(format!("[Parser] Unexpected token {}", token))),
            },
            token => Err(Error::Parse(format!("[Parser] Unexpected referential action {}", token))),
        }
    }

    /// Parses SELECT statement
    fn parse_select(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Select))?;

        let mut select = Vec::new();
        if self.next_if_token(Token::Asterisk).is_none() {
            loop {
                let expr = self.parse_operand()?;
                let alias = match self.next_if_token(Token::Keyword(Keyword::As)) {
                    Some(_) => Some(self.next_ident()?),
                    None => None,
                };
                select.push((expr, alias));
                if self.next_if_token(Token::Comma).is_none() {
                    break;
                }
            }
        }

        self.next_expect(Token::Keyword(Keyword::From))?;
        let from = self.parse_from_clause()?;
        let where_clause = self.parse_where_clause()?;

        let mut group_by = Vec::new();
        if self.next_if_token(Token::Keyword(Keyword::Group)).is_some() {
            self.next_expect(Token::Keyword(Keyword::By))?;
            loop {
                group_by.push(self.next_column_ref()?);
                if self.next_if_token(Token::Comma).is_none() {
                    break;
                }
            }
        }

        let having = match self.next_if_token(Token::Keyword(Keyword::Having)) {
            Some(_) => Some(self.parse_condition()?),
            None => None,
        };

        let mut order_by = Vec::new();
        if self.next_if_token(Token::Keyword(Keyword::Order)).is_some() {
            self.next_expect(Token::Keyword(Keyword::By))?;
            loop {
                let col = self.next_column_ref()?;
                let direction = match self.next_if(|t| {
                    matches!(t, Token::Keyword(Keyword::Asc) | Token::Keyword(Keyword::Desc))
                }) {
                    Some(Token::Keyword(Keyword::Desc)) => OrderDirection::Desc,
                    _ => OrderDirection::Asc,
                };
                order_by.push((col, direction));
                if self.next_if_token(Token::Comma).is_none() {
                    break;
                }
            }
        }

        let limit = match self.next_if_token(Token::Keyword(Keyword::Limit)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };
        let offset = match self.next_if_token(Token::Keyword(Keyword::Offset)) {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };

        Ok(ast::Statement::Select {
            select,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    /// Parses `table [INNER] JOIN table ON a = b ...`
    fn parse_from_clause(&mut self) -> Result<FromItem> {
        let mut item = FromItem::Table { name: self.next_ident()? };
        loop {
            self.next_if_token(Token::Keyword(Keyword::Inner));
            if self.next_if_token(Token::Keyword(Keyword::Join)).is_none() {
                break;
            }
            let right = FromItem::Table { name: self.next_ident()? };
            self.next_expect(Token::Keyword(Keyword::On))?;
            let predicate = self.parse_condition()?;
            item = FromItem::Join {
                left: Box::new(item),
                right: Box::new(right),
                predicate,
            };
        }
        Ok(item)
    }

    /// Parses INSERT statement
    fn parse_insert(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Insert))?;
        self.next_expect(Token::Keyword(Keyword::Into))?;

        let table_name = self.next_ident()?;

        // Check if specific columns are specified
        let columns = if self.next_if_token(Token::OpenParen).is_some() {
            let mut cols = Vec::new();
            loop {
                cols.push(self.next_ident()?.to_string());
                match self.next()? {
                    Token::CloseParen => break,
                    Token::Comma => {}
                    token => {
                        return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
                    }
                }
            }
            Some(cols)
        } else {
            None
        };

        self.next_expect(Token::Keyword(Keyword::Values))?;
        // Parse multiple value rows: INSERT INTO tbl VALUES (1,2),(3,4);
        let mut values = Vec::new();
        loop {
            self.next_expect(Token::OpenParen)?;
            let mut expr = Vec::new();
            loop {
                expr.push(self.parse_expression()?);
                match self.next()? {
                    Token::CloseParen => break,
                    Token::Comma => {}
                    token => {
                        return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
                    }
                }
            }
            values.push(expr);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(ast::Statement::Insert {
            table_name,
            columns,
            values,
        })
    }

    /// Parses UPDATE statement
    fn parse_update(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Update))?;
        let table_name = self.next_ident()?;
        self.next_expect(Token::Keyword(Keyword::Set))?;

        let mut columns = BTreeMap::new();
        loop {
            let col = self.next_ident()?;
            self.next_expect(Token::Equal)?;
            let value = self.parse_expression()?;
            // The same column may not be assigned twice
            if columns.contains_key(&col) {
                return Err(Error::Parse(format!(
                    "[Parser] Duplicate column {} for update",
                    col
                )));
            }
            columns.insert(col, value);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(ast::Statement::Update {
            table_name,
            columns,
            where_clause: self.parse_where_clause()?,
        })
    }

    /// Parses DELETE statement
    fn parse_delete(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Delete))?;
        self.next_expect(Token::Keyword(Keyword::From))?;
        let table_name = self.next_ident()?;
        Ok(ast::Statement::Delete {
            table_name,
            where_clause: self.parse_where_clause()?,
        })
    }

    /// Parses a constant expression: literal or bound parameter
    fn parse_expression(&mut self) -> Result<ast::Expression> {
        Ok(match self.next()? {
            Token::Number(n) => Self::parse_number(&n)?.into(),
            Token::Minus => match self.next()? {
                Token::Number(n) => match Self::parse_number(&n)? {
                    Value::Integer(i) => Value::Integer(-i).into(),
                    Value::Float(f) => Value::Float(-f).into(),
                    v => v.into(),
                },
                t => return Err(Error::Parse(format!("[Parser] Unexpected token {}", t))),
            },
            Token::String(s) => Value::String(s).into(),
            Token::Blob(b) => Value::Blob(b).into(),
            Token::Keyword(Keyword::True) => Value::Boolean(true).into(),
            Token::Keyword(Keyword::False) => Value::Boolean(false).into(),
            Token::Keyword(Keyword::Null) => Value::Null.into(),
            Token::Question => match self.params.next() {
                Some(value) => value.clone().into(),
                None => {
                    return Err(Error::Parse(
                        "[Parser] Not enough bound parameters for placeholders".into(),
                    ))
                }
            },
            t => {
                return Err(Error::Parse(format!(
                    "[Parser] Unexpected expression token {}",
                    t
                )))
            }
        })
    }

    fn parse_number(n: &str) -> Result<Value> {
        // Lexer scans both 123 and 123.45 as Token::Number(String)
        if n.chars().all(|c| c.is_ascii_digit()) {
            Ok(Value::Integer(n.parse()?))
        } else {
            Ok(Value::Float(n.parse()?))
        }
    }

    /// Parses a column reference, aggregate call or constant
    fn parse_operand(&mut self) -> Result<ast::Expression> {
        match self.peek()? {
            Some(Token::Ident(_)) => {}
            _ => return self.parse_expression(),
        }
        let name = self.next_ident()?;
        if self.next_if_token(Token::OpenParen).is_some() {
            let arg = match self.next_if_token(Token::Asterisk) {
                Some(_) => "*".to_string(),
                None => self.next_column_tail()?,
            };
            self.next_expect(Token::CloseParen)?;
            return Ok(Expression::Function(name, arg));
        }
        if self.next_if_token(Token::Period).is_some() {
            return Ok(Expression::Field(format!("{}.{}", name, self.next_ident()?)));
        }
        Ok(Expression::Field(name))
    }

    /// Parses `operand op operand [AND ...]`
    fn parse_condition(&mut self) -> Result<ast::Expression> {
        let mut expr = self.parse_comparison()?;
        while self.next_if_token(Token::Keyword(Keyword::And)).is_some() {
            expr = Expression::Operation(Operation::And(
                Box::new(expr),
                Box::new(self.parse_comparison()?),
            ));
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<ast::Expression> {
        let lhs = Box::new(self.parse_operand()?);
        let op = self.next()?;
        let rhs = Box::new(self.parse_operand()?);
        Ok(Expression::Operation(match op {
            Token::Equal => Operation::Equal(lhs, rhs),
            Token::NotEqual => Operation::NotEqual(lhs, rhs),
            Token::GreaterThan => Operation::GreaterThan(lhs, rhs),
            Token::GreaterThanOrEqual => Operation::GreaterThanOrEqual(lhs, rhs),
            Token::LessThan => Operation::LessThan(lhs, rhs),
            Token::LessThanOrEqual => Operation::LessThanOrEqual(lhs, rhs),
            t => return Err(Error::Parse(format!("[Parser] Expected comparison, got {}", t))),
        }))
    }

    /// Parses WHERE conditions
    fn parse_where_clause(&mut self) -> Result<Option<Expression>> {
        if self.next_if_token(Token::Keyword(Keyword::Where)).is_none() {
            return Ok(None)
        }
        Ok(Some(self.parse_condition()?))
    }

    /// Parses `name` or `table.name`
    fn next_column_ref(&mut self) -> Result<String> {
        self.next_column_tail()
    }

    fn next_column_tail(&mut self) -> Result<String> {
        let name = self.next_ident()?;
        if self.next_if_token(Token::Period).is_some() {
            return Ok(format!("{}.{}", name, self.next_ident()?));
        }
        Ok(name)
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Parse("[Parser] Unexpected end of input".into())))
    }

    /// Expects and consumes an identifier
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => Err(Error::Parse(format!(
                "[Parser] Expected ident, got token {}",
                token
            ))),
        }
    }

    /// Expects a specific token, returns error if different
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Parse(format!(
                "[Parser] Expected token {}, got {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Consumes next token if it satisfies the predicate
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes next token if it matches the given token
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }
}
