use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{Error, Result};
use crate::ir::{Aggregation, AggregationFunc, FilterExpr, FilterOp, LogicOp, Mutation, OrderBy, OrderDirection, QueryIr, QueryType};
use crate::value::Value;

/// Closed set of operation names, used only to disambiguate a store
/// reference's second identifier (`space.store` vs. `store.<op>(...)`).
const OPERATION_NAMES: &[&str] = &[
    "filter", "pluck", "orderBy", "limit", "skip", "groupBy", "aggregate", "insert", "set",
    "delete", "count", "get", "exists",
];

fn is_operation_name(name: &str) -> bool {
    OPERATION_NAMES.contains(&name)
}

/// Recursive-descent, single-token-lookahead parser for the text query
/// grammar: a store reference followed by zero or more dot-prefixed
/// operations.
pub struct Parser {
    lexer: Lexer,
}

/// Parse `source` into a `QueryIr`.
pub fn parse(source: &str) -> Result<QueryIr> {
    Parser::new(source).parse_query()
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self { lexer: Lexer::new(source) }
    }

    fn parse_query(&mut self) -> Result<QueryIr> {
        let mut ir = QueryIr::new();
        self.parse_store_reference(&mut ir)?;

        loop {
            let token = self.lexer.peek();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Dot => {
                    self.lexer.next_token();
                    self.parse_operation(&mut ir)?;
                }
                _ => return Err(unexpected(&token)),
            }
        }

        Ok(ir)
    }

    /// Consumes an identifier `X`, then decides whether it stands alone as
    /// the store (`X.<op>(...)`) or combines with a following identifier as
    /// `space.store` — by peeking two tokens ahead and restoring the lexer
    /// position if the guess doesn't hold.
    fn parse_store_reference(&mut self, ir: &mut QueryIr) -> Result<()> {
        let x = self.expect_identifier()?;
        let after_x = self.lexer.save();

        let dot = self.lexer.next_token();
        if dot.kind != TokenKind::Dot {
            self.lexer.restore(after_x);
            ir.store = Some(x);
            return Ok(());
        }

        let y = self.lexer.next_token();
        if let TokenKind::Identifier(name) = &y.kind
            && !is_operation_name(name)
        {
            ir.space = Some(x);
            ir.store = Some(name.clone());
            return Ok(());
        }

        self.lexer.restore(after_x);
        ir.store = Some(x);
        Ok(())
    }

    fn parse_operation(&mut self, ir: &mut QueryIr) -> Result<()> {
        let token = self.lexer.next_token();
        let name: String = match &token.kind {
            TokenKind::Identifier(s) => s.clone(),
            TokenKind::Count => "count".to_string(),
            TokenKind::Exists => "exists".to_string(),
            _ => return Err(unexpected(&token)),
        };

        match name.as_str() {
            "filter" => self.parse_filter(ir),
            "pluck" => self.parse_pluck(ir),
            "orderBy" => self.parse_order_by(ir),
            "limit" => self.parse_limit(ir),
            "skip" => self.parse_skip(ir),
            "groupBy" => self.parse_group_by(ir),
            "aggregate" => self.parse_aggregate(ir),
            "insert" => self.parse_insert(ir),
            "set" => self.parse_set(ir),
            "delete" => self.parse_delete(ir),
            "count" => self.parse_count(ir),
            "get" => self.parse_get(ir),
            other => Err(Error::UnknownOperation(other.to_string())),
        }
    }

    fn parse_filter(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        loop {
            let mut filter = self.parse_condition()?;
            let token = self.lexer.peek();
            let more = match token.kind {
                TokenKind::And => {
                    self.lexer.next_token();
                    filter.logic = LogicOp::And;
                    true
                }
                TokenKind::Or => {
                    self.lexer.next_token();
                    filter.logic = LogicOp::Or;
                    true
                }
                _ => false,
            };
            ir.filters.push(filter);
            if !more {
                break;
            }
        }
        self.expect_rparen()?;
        Ok(())
    }

    fn parse_condition(&mut self) -> Result<FilterExpr> {
        let field = self.expect_identifier()?;
        let op = self.parse_filter_op()?;
        let value = self.parse_value()?;
        Ok(FilterExpr::new(field, op, value))
    }

    fn parse_filter_op(&mut self) -> Result<FilterOp> {
        let token = self.lexer.next_token();
        match token.kind {
            TokenKind::Eq => Ok(FilterOp::Eq),
            TokenKind::Ne => Ok(FilterOp::Ne),
            TokenKind::Gt => Ok(FilterOp::Gt),
            TokenKind::Gte => Ok(FilterOp::Gte),
            TokenKind::Lt => Ok(FilterOp::Lt),
            TokenKind::Lte => Ok(FilterOp::Lte),
            TokenKind::Tilde => Ok(FilterOp::Regex),
            TokenKind::In => Ok(FilterOp::In),
            TokenKind::Contains => Ok(FilterOp::Contains),
            TokenKind::StartsWith => Ok(FilterOp::StartsWith),
            TokenKind::Exists => Ok(FilterOp::Exists),
            _ => Err(Error::ExpectedOperator { line: token.line, column: token.column }),
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        let token = self.lexer.next_token();
        match token.kind {
            TokenKind::String(s) => Ok(Value::String(s)),
            TokenKind::Number(ref s) => parse_number(s, &token),
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            TokenKind::Null => Ok(Value::Null),
            _ => Err(Error::ExpectedValue { line: token.line, column: token.column }),
        }
    }

    fn parse_pluck(&mut self, ir: &mut QueryIr) -> Result<()> {
        ir.projection = Some(self.parse_identifier_list()?);
        Ok(())
    }

    fn parse_group_by(&mut self, ir: &mut QueryIr) -> Result<()> {
        ir.group_by.extend(self.parse_identifier_list()?);
        Ok(())
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        self.expect_lparen()?;
        let mut fields = vec![self.expect_identifier()?];
        while self.lexer.peek().kind == TokenKind::Comma {
            self.lexer.next_token();
            fields.push(self.expect_identifier()?);
        }
        self.expect_rparen()?;
        Ok(fields)
    }

    fn parse_order_by(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        let field = self.expect_identifier()?;
        let mut direction = OrderDirection::Asc;
        if self.lexer.peek().kind == TokenKind::Comma {
            self.lexer.next_token();
            let token = self.lexer.next_token();
            direction = match token.kind {
                TokenKind::Asc => OrderDirection::Asc,
                TokenKind::Desc => OrderDirection::Desc,
                _ => return Err(unexpected(&token)),
            };
        }
        self.expect_rparen()?;
        ir.order_by = vec![OrderBy { field, direction }];
        Ok(())
    }

    fn parse_limit(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        let n = self.parse_u32_literal()?;
        self.expect_rparen()?;
        ir.limit = Some(n);
        Ok(())
    }

    fn parse_skip(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        let n = self.parse_u32_literal()?;
        self.expect_rparen()?;
        ir.skip = Some(n);
        Ok(())
    }

    fn parse_u32_literal(&mut self) -> Result<u32> {
        let token = self.lexer.next_token();
        match token.kind {
            TokenKind::Number(s) if !s.contains('.') => {
                s.parse::<u32>().map_err(|_| Error::InvalidNumber { line: token.line, column: token.column })
            }
            TokenKind::Number(_) => Err(Error::InvalidNumber { line: token.line, column: token.column }),
            _ => Err(Error::ExpectedValue { line: token.line, column: token.column }),
        }
    }

    fn parse_aggregate(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        loop {
            let output_name = self.expect_identifier()?;
            self.expect_colon()?;
            let func_token = self.lexer.next_token();
            let func = match func_token.kind {
                TokenKind::Count => AggregationFunc::Count,
                TokenKind::Sum => AggregationFunc::Sum,
                TokenKind::Avg => AggregationFunc::Avg,
                TokenKind::Min => AggregationFunc::Min,
                TokenKind::Max => AggregationFunc::Max,
                _ => return Err(unexpected(&func_token)),
            };
            let field = if self.lexer.peek().kind == TokenKind::LParen {
                self.lexer.next_token();
                let f = self.expect_identifier()?;
                self.expect_rparen()?;
                Some(f)
            } else {
                None
            };
            ir.aggregations.push(Aggregation { output_name, func, field });

            if self.lexer.peek().kind == TokenKind::Comma {
                self.lexer.next_token();
                continue;
            }
            break;
        }
        self.expect_rparen()?;
        Ok(())
    }

    fn parse_insert(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        let payload = self.capture_brace_payload()?;
        self.expect_rparen()?;
        ir.mutation = Some(Mutation::Insert(payload.into_bytes()));
        Ok(())
    }

    fn parse_set(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        let payload = self.capture_brace_payload()?;
        self.expect_rparen()?;
        ir.mutation = Some(Mutation::Update(payload.into_bytes()));
        Ok(())
    }

    fn capture_brace_payload(&mut self) -> Result<String> {
        let here = self.lexer.peek();
        self.lexer.capture_balanced_braces().ok_or_else(|| unexpected(&here))
    }

    fn parse_delete(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        self.expect_rparen()?;
        ir.mutation = Some(Mutation::Delete);
        Ok(())
    }

    fn parse_count(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        self.expect_rparen()?;
        ir.query_type = Some(QueryType::Count);
        Ok(())
    }

    fn parse_get(&mut self, ir: &mut QueryIr) -> Result<()> {
        self.expect_lparen()?;
        let value = self.parse_value()?;
        self.expect_rparen()?;
        ir.filters.push(FilterExpr::new("_key", FilterOp::Eq, value));
        ir.limit = Some(1);
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<String> {
        let token = self.lexer.next_token();
        match token.kind {
            TokenKind::Identifier(s) => Ok(s),
            _ => Err(Error::ExpectedIdentifier { line: token.line, column: token.column }),
        }
    }

    fn expect_lparen(&mut self) -> Result<()> {
        let token = self.lexer.next_token();
        if token.kind == TokenKind::LParen {
            Ok(())
        } else {
            Err(Error::ExpectedLParen { line: token.line, column: token.column })
        }
    }

    fn expect_rparen(&mut self) -> Result<()> {
        let token = self.lexer.next_token();
        if token.kind == TokenKind::RParen {
            Ok(())
        } else {
            Err(Error::ExpectedRParen { line: token.line, column: token.column })
        }
    }

    fn expect_colon(&mut self) -> Result<()> {
        let token = self.lexer.next_token();
        if token.kind == TokenKind::Colon {
            Ok(())
        } else {
            Err(Error::ExpectedColon { line: token.line, column: token.column })
        }
    }
}

fn unexpected(token: &Token) -> Error {
    Error::UnexpectedToken { line: token.line, column: token.column }
}

fn parse_number(text: &str, token: &Token) -> Result<Value> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::InvalidNumber { line: token.line, column: token.column })
    } else {
        text.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::InvalidNumber { line: token.line, column: token.column })
    }
}
