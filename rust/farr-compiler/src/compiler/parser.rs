//! Recursive-descent parser turning a token stream into a [`Module`].
//!
//! Farr writes arithmetic in prefix form (`+ a b`, not `a + b`) and
//! introduces every block with `= { ... }`. The grammar is otherwise a
//! fairly ordinary expression/statement split: `process_term` handles
//! factors, prefix/postfix increment, grouped/list/hash-map/range
//! literals and prefix arithmetic; `process_expression` layers relational,
//! logical, and ternary operators on top of it.

use crate::compiler::ast::*;
use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected {expected}, but nothing here!")]
    UnexpectedEof { expected: String },
    #[error("expected {expected}, got {got} at {span}")]
    Unexpected {
        expected: String,
        got: String,
        span: Span,
    },
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    current: Option<Token>,
    next: Option<Token>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            current: None,
            next: None,
        }
    }

    fn advance_raw(&mut self) -> Option<Token> {
        if self.pos < self.tokens.len() {
            let t = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(t)
        } else {
            None
        }
    }

    fn step(&mut self) {
        if self.current.is_none() && self.next.is_none() && self.pos < self.tokens.len() {
            self.next = self.advance_raw();
        }
        self.current = self.next.take();
        self.next = self.advance_raw();
    }

    fn at_end(&self) -> bool {
        self.current.is_none() && self.next.is_none() && self.pos >= self.tokens.len()
    }

    fn check(&self, labels: &[&str]) -> bool {
        self.current
            .as_ref()
            .map(|t| labels.contains(&t.label()))
            .unwrap_or(false)
    }

    fn peek(&self, labels: &[&str]) -> bool {
        self.next
            .as_ref()
            .map(|t| labels.contains(&t.label()))
            .unwrap_or(false)
    }

    fn expect(&self, labels: &[&str]) -> PResult<()> {
        match &self.current {
            None => Err(ParseError::UnexpectedEof {
                expected: labels.join("/"),
            }),
            Some(t) if !labels.contains(&t.label()) => Err(ParseError::Unexpected {
                expected: labels.join("/"),
                got: t.label().to_string(),
                span: t.span,
            }),
            Some(_) => Ok(()),
        }
    }

    fn current_span(&self) -> Span {
        self.current.as_ref().map(|t| t.span).unwrap_or(Span::dummy())
    }

    fn validate(&self, node: Option<Node>, what: &str) -> PResult<Node> {
        match node {
            Some(n) => Ok(n),
            None => self.expect(&[what]).map(|_| unreachable!()),
        }
    }

    /// Parses a `,`-separated list of items, stopping at the first item
    /// the parser function can't produce.
    fn comma_separated_items(&mut self, span: Span, mut fn_: impl FnMut(&mut Self) -> PResult<Option<Node>>) -> PResult<Itemized> {
        self.separated_items(span, &["Comma"], &mut fn_)
    }

    fn dot_separated_items(&mut self, span: Span, fn_: &mut dyn FnMut(&mut Self) -> PResult<Option<Node>>) -> PResult<Itemized> {
        self.separated_items(span, &["Dot"], fn_)
    }

    fn separated_items(
        &mut self,
        span: Span,
        separators: &[&str],
        fn_: &mut dyn FnMut(&mut Self) -> PResult<Option<Node>>,
    ) -> PResult<Itemized> {
        let mut items = Vec::new();
        while let Some(node) = fn_(self)? {
            if let Node::Itemized(inner) = node {
                items.extend(inner.items);
            } else {
                items.push(node);
            }
            if !self.check(separators) {
                break;
            }
            self.step();
        }
        Ok(Itemized { items, span })
    }

    fn accumulate_until(
        &mut self,
        retreat: impl Fn(&Self) -> bool,
        mut fn_: impl FnMut(&mut Self) -> PResult<Option<Node>>,
    ) -> PResult<Vec<Node>> {
        let mut body = Vec::new();
        while !retreat(self) {
            match fn_(self)? {
                Some(n) => body.push(n),
                None => break,
            }
        }
        Ok(body)
    }

    fn parenthesized<T>(&mut self, fn_: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.expect(&["LeftParenthesis"])?;
        self.step();
        let result = fn_(self)?;
        self.expect(&["RightParenthesis"])?;
        self.step();
        Ok(result)
    }

    fn bracketed<T>(&mut self, fn_: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.expect(&["LeftBracket"])?;
        self.step();
        let result = fn_(self)?;
        self.expect(&["RightBracket"])?;
        self.step();
        Ok(result)
    }

    fn braced<T>(&mut self, fn_: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.expect(&["LeftBrace"])?;
        self.step();
        let result = fn_(self)?;
        self.expect(&["RightBrace"])?;
        self.step();
        Ok(result)
    }

    fn followed_by(&mut self, node: Node, labels: &[&str]) -> PResult<Node> {
        self.expect(labels)?;
        self.step();
        Ok(node)
    }

    fn followed_by_semicolon(&mut self, node: Node) -> PResult<Node> {
        self.followed_by(node, &["Semicolon"])
    }

    // ── literals ──

    fn parse_pass(&mut self) -> PResult<Node> {
        self.expect(&["Pass"])?;
        let span = self.current_span();
        self.step();
        Ok(Node::Pass(span))
    }

    fn parse_null(&mut self) -> PResult<Node> {
        self.expect(&["Null"])?;
        let span = self.current_span();
        self.step();
        Ok(Node::Null(span))
    }

    fn text_of(&self) -> String {
        match &self.current.as_ref().unwrap().kind {
            TokenKind::Integer(s)
            | TokenKind::Float(s)
            | TokenKind::Binary(s)
            | TokenKind::Octal(s)
            | TokenKind::Hexadecimal(s)
            | TokenKind::String(s)
            | TokenKind::Identifier(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn parse_integer(&mut self) -> PResult<Node> {
        self.expect(&["Integer"])?;
        let span = self.current_span();
        let value = self.text_of();
        self.step();
        Ok(Node::Integer { value, span })
    }

    fn parse_binary(&mut self) -> PResult<Node> {
        self.expect(&["Binary"])?;
        let span = self.current_span();
        let value = self.text_of();
        self.step();
        Ok(Node::Binary { value, span })
    }

    fn parse_octal(&mut self) -> PResult<Node> {
        self.expect(&["Octal"])?;
        let span = self.current_span();
        let value = self.text_of();
        self.step();
        Ok(Node::Octal { value, span })
    }

    fn parse_hexadecimal(&mut self) -> PResult<Node> {
        self.expect(&["Hexadecimal"])?;
        let span = self.current_span();
        let value = self.text_of();
        self.step();
        Ok(Node::Hexadecimal { value, span })
    }

    fn parse_float(&mut self) -> PResult<Node> {
        self.expect(&["Float"])?;
        let span = self.current_span();
        let value = self.text_of();
        self.step();
        Ok(Node::Float { value, span })
    }

    fn parse_string(&mut self) -> PResult<Node> {
        self.expect(&["String"])?;
        let span = self.current_span();
        let value = self.text_of();
        self.step();
        Ok(Node::String { value, span })
    }

    fn parse_identifier(&mut self) -> PResult<Node> {
        self.expect(&["Identifier"])?;
        let span = self.current_span();
        let name = self.text_of();
        self.step();
        Ok(Node::Identifier { name, span })
    }

    fn identifier_name(node: &Node) -> String {
        match node {
            Node::Identifier { name, .. } => name.clone(),
            _ => String::new(),
        }
    }

    fn process_factor(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Pass"]) {
            Ok(Some(self.parse_pass()?))
        } else if self.check(&["Null"]) {
            Ok(Some(self.parse_null()?))
        } else if self.check(&["Integer"]) {
            Ok(Some(self.parse_integer()?))
        } else if self.check(&["Binary"]) {
            Ok(Some(self.parse_binary()?))
        } else if self.check(&["Octal"]) {
            Ok(Some(self.parse_octal()?))
        } else if self.check(&["Hexadecimal"]) {
            Ok(Some(self.parse_hexadecimal()?))
        } else if self.check(&["Float"]) {
            Ok(Some(self.parse_float()?))
        } else if self.check(&["String"]) {
            Ok(Some(self.parse_string()?))
        } else if self.check(&["Identifier"]) {
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn parse_negation(&mut self) -> PResult<Node> {
        self.expect(&["Not"])?;
        let span = self.current_span();
        self.step();
        let operand = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
        Ok(Node::Negation {
            operand: Box::new(operand),
            span,
        })
    }

    fn parse_pre_increment(&mut self) -> PResult<Node> {
        self.expect(&["Increment"])?;
        let span = self.current_span();
        self.step();
        let operand = self.parse_identifier()?;
        Ok(Node::PreIncrement {
            operand: Box::new(operand),
            span,
        })
    }

    fn parse_pre_decrement(&mut self) -> PResult<Node> {
        self.expect(&["Decrement"])?;
        let span = self.current_span();
        self.step();
        let operand = self.parse_identifier()?;
        Ok(Node::PreDecrement {
            operand: Box::new(operand),
            span,
        })
    }

    fn parse_post_increment(&mut self) -> PResult<Node> {
        let operand = self.parse_identifier()?;
        self.expect(&["Increment"])?;
        let span = self.current_span();
        self.step();
        Ok(Node::PostIncrement {
            operand: Box::new(operand),
            span,
        })
    }

    fn parse_post_decrement(&mut self) -> PResult<Node> {
        let operand = self.parse_identifier()?;
        self.expect(&["Decrement"])?;
        let span = self.current_span();
        self.step();
        Ok(Node::PostDecrement {
            operand: Box::new(operand),
            span,
        })
    }

    fn looks_like_post_step(&self, step_token: &str) -> bool {
        // a lone Identifier immediately followed by ++/-- is a postfix step;
        // anything else (including a lone ++/-- already handled earlier) is not.
        self.check(&["Identifier"]) && self.peek(&[step_token])
    }

    fn parse_list(&mut self) -> PResult<Node> {
        let span = self.current_span();
        let elements = self.braced(|p| {
            let span = p.current_span();
            p.comma_separated_items(span, |p| p.process_expression())
        })?;
        Ok(Node::List { elements })
    }

    fn parse_pair(&mut self) -> PResult<Option<Node>> {
        if !self.check(&["Colon"]) {
            return Ok(None);
        }
        self.step();
        let key = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
        let value = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
        Ok(Some(Node::Pair {
            key: Box::new(key),
            value: Box::new(value),
        }))
    }

    fn parse_hash_map(&mut self) -> PResult<Node> {
        if self.check(&["LeftBrace"]) && self.peek(&["Colon"]) {
            self.step();
            self.step();
            self.expect(&["RightBrace"])?;
            self.step();
            return Ok(Node::HashMap { pairs: None });
        }
        let pairs = self.braced(|p| {
            let span = p.current_span();
            p.comma_separated_items(span, |p| p.parse_pair())
        })?;
        Ok(Node::HashMap { pairs: Some(pairs) })
    }

    fn parse_range(&mut self) -> PResult<Node> {
        let from = { let __v = self.process_term()?; self.validate(__v, "Term")? };
        let mut by = None;
        if self.check(&["Comma"]) {
            self.step();
            by = Some(Box::new({ let __v = self.process_term()?; self.validate(__v, "Term")? }));
        }
        let mut to = None;
        if self.check(&["Between"]) {
            self.step();
            to = Some(Box::new({ let __v = self.process_term()?; self.validate(__v, "Term")? }));
        }
        Ok(Node::Range {
            from: Box::new(from),
            to,
            by,
        })
    }

    fn arithmetic_op(label: &str) -> ArithmeticOp {
        match label {
            "Add" => ArithmeticOp::Add,
            "Subtract" => ArithmeticOp::Subtract,
            "Multiply" => ArithmeticOp::Multiply,
            "Divide" => ArithmeticOp::Divide,
            "Modulus" => ArithmeticOp::Modulus,
            "Power" => ArithmeticOp::Power,
            "LeftShift" => ArithmeticOp::LeftShift,
            "RightShift" => ArithmeticOp::RightShift,
            _ => unreachable!("not an arithmetic operator token"),
        }
    }

    fn parse_arithmetic(&mut self) -> PResult<Node> {
        const OPS: &[&str] = &[
            "Add",
            "Subtract",
            "Multiply",
            "Divide",
            "Modulus",
            "Power",
            "LeftShift",
            "RightShift",
        ];
        self.expect(OPS)?;
        let operator = Self::arithmetic_op(self.current.as_ref().unwrap().label());
        let span = self.current_span();
        self.step();
        let left = { let __v = self.process_term()?; self.validate(__v, "Term")? };
        let right = { let __v = self.process_term()?; self.validate(__v, "Term")? };
        Ok(Node::Arithmetic {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            span,
        })
    }

    fn resolve_call_argument(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Identifier"]) && self.peek(&["Equal"]) {
            let name_span = self.current_span();
            let name = self.text_of();
            self.step();
            self.step();
            let value = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
            return Ok(Some(Node::Assignment {
                operator: AssignmentOp::Plain,
                variables: Itemized {
                    items: vec![Node::Identifier {
                        name,
                        span: name_span,
                    }],
                    span: name_span,
                },
                expression: Box::new(value),
            }));
        }
        self.process_expression()
    }

    fn resolve_call_argument_or_spread(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Pass"]) && !self.peek(&["Semicolon"]) && !self.peek(&["RightParenthesis"]) && !self.peek(&["Comma"]) {
            let span = self.current_span();
            self.step();
            let expression = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
            return Ok(Some(Node::ExpandableArgument {
                expression: Box::new(expression),
                span,
            }));
        }
        self.resolve_call_argument()
    }

    fn parse_call(&mut self, invoke: Node) -> PResult<Node> {
        let span = self.current_span();
        let args = self.parenthesized(|p| {
            p.comma_separated_items(span, |p| p.resolve_call_argument_or_spread())
        })?;
        Ok(Node::Call {
            invoke: Box::new(invoke),
            args,
        })
    }

    fn resolve_chain_target(&mut self) -> PResult<Option<Node>> {
        let term = self.process_term()?;
        Ok(term.and_then(|t| match &t {
            Node::Identifier { .. } | Node::Range { .. } | Node::Call { .. } => Some(t),
            Node::ChainedExpressions { expressions } => Some(Node::Itemized(expressions.clone())),
            _ => None,
        }))
    }

    fn parse_chained_expressions(&mut self, base: Node) -> PResult<Node> {
        let span = base.span();
        let mut items = vec![base];
        let rest = self.dot_separated_items(span, &mut |p| p.resolve_chain_target())?;
        items.extend(rest.items);
        Ok(Node::ChainedExpressions {
            expressions: Itemized { items, span },
        })
    }

    fn process_chaining(&mut self, base: Node) -> PResult<Node> {
        if self.check(&["Dot"]) {
            self.step();
            return self.parse_chained_expressions(base);
        }
        Ok(base)
    }

    fn process_term(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Increment"]) {
            return Ok(Some(self.parse_pre_increment()?));
        }
        if self.check(&["Decrement"]) {
            return Ok(Some(self.parse_pre_decrement()?));
        }
        if self.looks_like_post_step("Increment") {
            return Ok(Some(self.parse_post_increment()?));
        }
        if self.looks_like_post_step("Decrement") {
            return Ok(Some(self.parse_post_decrement()?));
        }

        match self.process_factor()? {
            None => {
                if self.check(&["Not"]) {
                    Ok(Some(self.parse_negation()?))
                } else if self.check(&["LeftBrace"])
                    && (self.peek(&["RightBrace"]) || self.peek(&["Comma"]) || !self.peek(&["Colon"]))
                {
                    let list = self.parse_list()?;
                    Ok(Some(self.process_chaining(list)?))
                } else if self.check(&["LeftBrace"]) && self.peek(&["Colon"]) {
                    let map = self.parse_hash_map()?;
                    Ok(Some(self.process_chaining(map)?))
                } else if self.check(&["LeftParenthesis"]) {
                    let expression = self.parenthesized(|p| p.process_expression())?;
                    let expression = self.validate(expression, "Expression")?;
                    let grouped = Node::GroupedExpression {
                        expression: Box::new(expression),
                    };
                    Ok(Some(self.process_chaining(grouped)?))
                } else if self.check(&["LeftBracket"]) {
                    Ok(Some(self.bracketed(|p| p.parse_range())?))
                } else if self.check(&[
                    "Add",
                    "Subtract",
                    "Multiply",
                    "Divide",
                    "Modulus",
                    "Power",
                    "LeftShift",
                    "RightShift",
                ]) {
                    Ok(Some(self.parse_arithmetic()?))
                } else {
                    Ok(None)
                }
            }
            Some(factor) => match &factor {
                Node::Identifier { .. } if self.check(&["LeftParenthesis"]) => {
                    let call = self.parse_call(factor)?;
                    Ok(Some(self.process_chaining(call)?))
                }
                Node::Identifier { .. } | Node::Integer { .. } | Node::Binary { .. }
                | Node::Octal { .. } | Node::Hexadecimal { .. } | Node::Float { .. }
                | Node::String { .. } => Ok(Some(self.process_chaining(factor)?)),
                _ => Ok(Some(factor)),
            },
        }
    }

    fn relational_op(label: &str) -> RelationalOp {
        match label {
            "EqualEqual" => RelationalOp::EqualEqual,
            "NotEqual" => RelationalOp::NotEqual,
            "LessThan" => RelationalOp::LessThan,
            "GreaterThan" => RelationalOp::GreaterThan,
            "LessThanOrEqual" => RelationalOp::LessThanOrEqual,
            "GreaterThanOrEqual" => RelationalOp::GreaterThanOrEqual,
            _ => unreachable!(),
        }
    }

    pub fn process_expression(&mut self) -> PResult<Option<Node>> {
        let Some(mut left) = self.process_term()? else {
            return Ok(None);
        };
        const RELOPS: &[&str] = &[
            "EqualEqual",
            "NotEqual",
            "GreaterThan",
            "LessThan",
            "GreaterThanOrEqual",
            "LessThanOrEqual",
        ];
        while self.check(RELOPS) {
            let operator = Self::relational_op(self.current.as_ref().unwrap().label());
            let span = self.current_span();
            self.step();
            let right = { let __v = self.process_term()?; self.validate(__v, "Term")? };
            left = Node::Relational {
                operator,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        while self.check(&["And", "Or"]) {
            let logical_and = self.check(&["And"]);
            let span = self.current_span();
            self.step();
            let right = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
            left = Node::Logical {
                operator: if logical_and { LogicalOp::And } else { LogicalOp::Or },
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        while self.check(&["If"]) {
            let span = self.current_span();
            self.step();
            let condition = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
            self.expect(&["Else"])?;
            self.step();
            let orelse = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
            left = Node::Ternary {
                then: Box::new(left),
                condition: Box::new(condition),
                orelse: Box::new(orelse),
                span,
            };
        }
        Ok(Some(left))
    }

    // ── statements ──

    fn parse_use(&mut self) -> PResult<Node> {
        self.expect(&["Use"])?;
        let span = self.current_span();
        self.step();
        let path = self.separated_items(span, &["Divide"], &mut |p| p.parse_identifier().map(Some))?;
        Ok(Node::Use { path })
    }

    fn parse_variable_declaration(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Pass"]) {
            // `...name` variadic parameter — only meaningful in a parameter list.
            let span = self.current_span();
            self.step();
            let name = Self::identifier_name(&self.parse_identifier()?);
            return Ok(Some(Node::VariadicParameterDeclaration {
                identifier: name,
                span,
            }));
        }
        if !self.check(&["Variable"]) {
            return Ok(None);
        }
        self.step();
        let identifier = Self::identifier_name(&self.parse_identifier()?);
        let mut expression = None;
        if self.check(&["Equal"]) {
            self.step();
            expression = Some(Box::new({ let __v = self.process_expression()?; self.validate(__v, "Expression")? }));
        }
        Ok(Some(Node::VariableDeclaration {
            identifier,
            expression,
        }))
    }

    fn references_of(expression: Node) -> Itemized {
        match expression {
            Node::ChainedExpressions { expressions } => expressions,
            other => {
                let span = other.span();
                Itemized {
                    items: vec![other],
                    span,
                }
            }
        }
    }

    fn parse_assignment(&mut self, op: AssignmentOp, token: &str, variables: Itemized) -> PResult<Node> {
        self.expect(&[token])?;
        self.step();
        let expression = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
        Ok(Node::Assignment {
            operator: op,
            variables,
            expression: Box::new(expression),
        })
    }

    fn parse_block(&mut self, mut fn_: impl FnMut(&mut Self) -> PResult<Option<Node>>) -> PResult<Block> {
        self.expect(&["Equal"])?;
        self.step();
        self.expect(&["LeftBrace"])?;
        let span = self.current_span();
        self.step();
        let body = self.accumulate_until(|p| p.at_end() || p.check(&["RightBrace"]), &mut fn_)?;
        self.expect(&["RightBrace"])?;
        self.step();
        Ok(Block { body, span })
    }

    fn parse_while(&mut self) -> PResult<Node> {
        self.expect(&["While"])?;
        self.step();
        let condition = if self.check(&["LeftParenthesis"]) {
            self.parenthesized(|p| p.process_expression())?
        } else {
            self.process_expression()?
        };
        let condition = self.validate(condition, "Expression")?;
        let body = self.parse_block(|p| p.process_expression_or_statement())?;
        let mut orelse = None;
        if self.check(&["Else"]) {
            self.step();
            orelse = Some(self.parse_block(|p| p.process_expression_or_statement())?);
        }
        Ok(Node::While {
            condition: Box::new(condition),
            body,
            orelse,
        })
    }

    fn resolve_initial(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Variable"]) {
            self.parse_variable_declaration()
        } else {
            self.parse_identifier().map(Some)
        }
    }

    fn parse_for(&mut self) -> PResult<Node> {
        self.expect(&["For"])?;
        let span = self.current_span();
        self.step();
        let initial = if self.check(&["LeftParenthesis"]) {
            self.parenthesized(|p| p.comma_separated_items(span, |p| p.resolve_initial()))?
        } else {
            self.comma_separated_items(span, |p| p.resolve_initial())?
        };
        self.expect(&["In"])?;
        self.step();
        let condition = { let __v = self.process_term()?; self.validate(__v, "Term")? };
        let body = self.parse_block(|p| p.process_expression_or_statement())?;
        let mut orelse = None;
        if self.check(&["Else"]) {
            self.step();
            orelse = Some(self.parse_block(|p| p.process_expression_or_statement())?);
        }
        Ok(Node::For {
            initial,
            condition: Box::new(condition),
            body,
            orelse,
        })
    }

    fn parse_break(&mut self) -> PResult<Node> {
        self.expect(&["Break"])?;
        let span = self.current_span();
        self.step();
        Ok(Node::Break(span))
    }

    fn parse_continue(&mut self) -> PResult<Node> {
        self.expect(&["Continue"])?;
        let span = self.current_span();
        self.step();
        Ok(Node::Continue(span))
    }

    fn parse_if(&mut self) -> PResult<Node> {
        self.expect(&["If"])?;
        self.step();
        let condition = if self.check(&["LeftParenthesis"]) {
            self.parenthesized(|p| p.process_expression())?
        } else {
            self.process_expression()?
        };
        let condition = self.validate(condition, "Expression")?;
        let body = self.parse_block(|p| p.process_expression_or_statement())?;
        let mut orelse = None;
        if self.check(&["Else"]) && self.peek(&["If"]) {
            self.step();
            orelse = Some(Box::new(IfOrElse::If(self.parse_if()?)));
        } else if self.check(&["Else"]) {
            self.step();
            orelse = Some(Box::new(IfOrElse::Block(
                self.parse_block(|p| p.process_expression_or_statement())?,
            )));
        }
        Ok(Node::If {
            condition: Box::new(condition),
            body,
            orelse,
        })
    }

    fn parse_case(&mut self) -> PResult<Case> {
        self.expect(&["For"])?;
        let span = self.current_span();
        self.step();
        let condition = if self.check(&["LeftParenthesis"]) {
            let span = self.current_span();
            let items = self.parenthesized(|p| p.comma_separated_items(span, |p| p.process_expression()))?;
            Node::Itemized(items)
        } else {
            { let __v = self.process_expression()?; self.validate(__v, "Expression")? }
        };
        let body = self.parse_block(|p| p.process_expression_or_statement())?;
        let mut orelse = None;
        if self.check(&["Else"]) && self.peek(&["For"]) {
            self.step();
            orelse = Some(Box::new(self.parse_case()?));
        } else if self.check(&["Else"]) {
            self.step();
            let block = self.parse_block(|p| p.process_expression_or_statement())?;
            orelse = Some(Box::new(Case {
                condition: Node::Null(span),
                body: block,
                orelse: None,
                span,
            }));
        }
        Ok(Case {
            condition,
            body,
            orelse,
            span,
        })
    }

    fn parse_match(&mut self) -> PResult<Node> {
        self.expect(&["Match"])?;
        self.step();
        let expression = { let __v = self.process_expression()?; self.validate(__v, "Expression")? };
        let mut cases = Vec::new();
        self.expect(&["Equal"])?;
        self.step();
        self.expect(&["LeftBrace"])?;
        self.step();
        while !self.at_end() && !self.check(&["RightBrace"]) {
            cases.push(self.parse_case()?);
        }
        self.expect(&["RightBrace"])?;
        self.step();
        Ok(Node::Match {
            expression: Box::new(expression),
            body: cases,
        })
    }

    fn parse_catch(&mut self) -> PResult<Catch> {
        self.expect(&["Catch"])?;
        let span = self.current_span();
        self.step();
        let excepts = if self.check(&["LeftParenthesis"]) {
            self.parenthesized(|p| p.comma_separated_items(span, |p| p.parse_identifier().map(Some)))?
        } else {
            self.comma_separated_items(span, |p| p.parse_identifier().map(Some))?
        };
        let bound_as = if self.check(&["Identifier"]) {
            Some(Self::identifier_name(&self.parse_identifier()?))
        } else {
            None
        };
        let body = self.parse_block(|p| p.process_expression_or_statement())?;
        let orelse = if self.check(&["Catch"]) {
            Some(Box::new(self.parse_catch()?))
        } else {
            None
        };
        Ok(Catch {
            excepts,
            bound_as,
            body,
            orelse,
            span,
        })
    }

    fn parse_try(&mut self) -> PResult<Node> {
        self.expect(&["Try"])?;
        self.step();
        let body = self.parse_block(|p| p.process_expression_or_statement())?;
        let catch = if self.check(&["Catch"]) {
            Some(self.parse_catch()?)
        } else {
            None
        };
        Ok(Node::Try { body, catch })
    }

    fn resolve_parameter(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Variable"]) || self.check(&["Pass"]) {
            self.parse_variable_declaration()
        } else {
            Ok(None)
        }
    }

    /// Parses `fn name(...) = { ... }` or `fn Struct::name(...) = { ... }`.
    ///
    /// The two forms only diverge after the first identifier, and the
    /// parser only keeps a one-token lookahead, so both are handled here
    /// rather than dispatched on ahead of time.
    fn parse_function_or_member_function(&mut self) -> PResult<Node> {
        self.expect(&["Function"])?;
        self.step();
        let first = Self::identifier_name(&self.parse_identifier()?);
        if self.check(&["DoubleColon"]) {
            self.step();
            let identifier = Self::identifier_name(&self.parse_identifier()?);
            let span = self.current_span();
            let params = self.parenthesized(|p| p.comma_separated_items(span, |p| p.resolve_parameter()))?;
            let body = self.parse_block(|p| p.process_expression_or_statement())?;
            return Ok(Node::MemberFunctionDefinition {
                identifier,
                params,
                body: Some(Box::new(Node::Block(body))),
                struct_name: first,
            });
        }
        let span = self.current_span();
        let params = self.parenthesized(|p| p.comma_separated_items(span, |p| p.resolve_parameter()))?;
        let body = self.parse_block(|p| p.process_expression_or_statement())?;
        Ok(Node::FunctionDefinition {
            identifier: first,
            params,
            body: Some(Box::new(Node::Block(body))),
        })
    }

    fn parse_struct(&mut self) -> PResult<Node> {
        self.expect(&["Struct"])?;
        self.step();
        let identifier = Self::identifier_name(&self.parse_identifier()?);
        let span = self.current_span();
        let mut parents = None;
        if self.check(&["LessThan"]) {
            self.step();
            parents = Some(if self.check(&["LeftParenthesis"]) {
                self.parenthesized(|p| p.comma_separated_items(span, |p| p.parse_identifier().map(Some)))?
            } else {
                self.comma_separated_items(span, |p| p.parse_identifier().map(Some))?
            });
        }
        let body = self.parse_block(|p| match p.parse_variable_declaration()? {
            Some(node) => Ok(Some(p.followed_by_semicolon(node)?)),
            None => Ok(None),
        })?;
        Ok(Node::StructDefinition {
            identifier,
            body: Some(Box::new(Node::Block(body))),
            parents,
        })
    }

    fn parse_return(&mut self) -> PResult<Node> {
        self.expect(&["Return"])?;
        let span = self.current_span();
        self.step();
        let expression = self.process_expression()?.map(Box::new);
        Ok(Node::Return { expression, span })
    }

    fn process_expression_or_statement(&mut self) -> PResult<Option<Node>> {
        if self.check(&["Use"]) {
            let node = self.parse_use()?;
            return Ok(Some(self.followed_by_semicolon(node)?));
        }
        if self.check(&["Variable"]) {
            let node = { let __v = self.parse_variable_declaration()?; self.validate(__v, "VariableDeclaration")? };
            return Ok(Some(self.followed_by_semicolon(node)?));
        }
        if self.check(&["While"]) {
            return Ok(Some(self.parse_while()?));
        }
        if self.check(&["For"]) {
            return Ok(Some(self.parse_for()?));
        }
        if self.check(&["Break"]) {
            let node = self.parse_break()?;
            return Ok(Some(self.followed_by_semicolon(node)?));
        }
        if self.check(&["Continue"]) {
            let node = self.parse_continue()?;
            return Ok(Some(self.followed_by_semicolon(node)?));
        }
        if self.check(&["If"]) {
            return Ok(Some(self.parse_if()?));
        }
        if self.check(&["Match"]) {
            return Ok(Some(self.parse_match()?));
        }
        if self.check(&["Try"]) {
            return Ok(Some(self.parse_try()?));
        }
        if self.check(&["Function"]) {
            return Ok(Some(self.parse_function_or_member_function()?));
        }
        if self.check(&["Struct"]) {
            return Ok(Some(self.parse_struct()?));
        }
        if self.check(&["Return"]) {
            let node = self.parse_return()?;
            return Ok(Some(self.followed_by_semicolon(node)?));
        }

        let expression = self.process_expression()?;
        const COMPOUND: &[(&str, AssignmentOp)] = &[
            ("AddEqual", AssignmentOp::Add),
            ("SubtractEqual", AssignmentOp::Subtract),
            ("MultiplyEqual", AssignmentOp::Multiply),
            ("DivideEqual", AssignmentOp::Divide),
            ("ModulusEqual", AssignmentOp::Modulus),
            ("PowerEqual", AssignmentOp::Power),
            ("LeftShiftEqual", AssignmentOp::LeftShift),
            ("RightShiftEqual", AssignmentOp::RightShift),
        ];
        if let Some(expression) = expression {
            if self.check(&["Equal"]) {
                let variables = Self::references_of(expression);
                let node = self.parse_assignment(AssignmentOp::Plain, "Equal", variables)?;
                return Ok(Some(self.followed_by_semicolon(node)?));
            }
            for (label, op) in COMPOUND {
                if self.check(&[label]) {
                    let variables = Self::references_of(expression);
                    let node = self.parse_assignment(*op, label, variables)?;
                    return Ok(Some(self.followed_by_semicolon(node)?));
                }
            }
            return Ok(Some(self.followed_by_semicolon(expression)?));
        }
        Ok(None)
    }

    /// Parses a whole module. Function, struct, and member-function
    /// definitions are hoisted ahead of the other top-level statements, so
    /// top-level code can call a function defined later in the file.
    pub fn parse(mut self) -> PResult<Module> {
        self.step();
        let body = self.accumulate_until(|p| p.at_end(), |p| p.process_expression_or_statement())?;
        let (mut defs, mut rest): (Vec<Node>, Vec<Node>) = (Vec::new(), Vec::new());
        for node in body {
            match &node {
                Node::FunctionDefinition { .. }
                | Node::StructDefinition { .. }
                | Node::MemberFunctionDefinition { .. } => defs.push(node),
                _ => rest.push(node),
            }
        }
        defs.append(&mut rest);
        Ok(Module { body: defs })
    }
}

pub fn parse(tokens: Vec<Token>) -> PResult<Module> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;

    fn parse_src(src: &str) -> Module {
        let tokens = Lexer::new(src).tokenize().unwrap();
        parse(tokens).unwrap()
    }

    #[test]
    fn parses_variable_declaration() {
        let module = parse_src("let x = 10;");
        assert_eq!(module.body.len(), 1);
        assert!(matches!(module.body[0], Node::VariableDeclaration { .. }));
    }

    #[test]
    fn parses_prefix_arithmetic() {
        let module = parse_src("+ 1 2;");
        match &module.body[0] {
            Node::Arithmetic { operator, .. } => assert_eq!(*operator, ArithmeticOp::Add),
            other => panic!("expected arithmetic, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_else() {
        let module = parse_src("if true = { 1; } else = { 2; }");
        assert!(matches!(module.body[0], Node::If { .. }));
    }

    #[test]
    fn hoists_function_definitions() {
        let module = parse_src("f(); fn f() = { return! 1; }");
        assert!(matches!(module.body[0], Node::FunctionDefinition { .. }));
        assert!(matches!(module.body[1], Node::Call { .. }));
    }

    #[test]
    fn parses_struct_with_parents() {
        let module = parse_src("struct Animal = { let name; } struct Dog < (Animal) = { let breed; }");
        assert!(matches!(module.body[0], Node::StructDefinition { .. }));
        assert!(matches!(module.body[1], Node::StructDefinition { .. }));
    }
}
