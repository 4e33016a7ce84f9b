//! The tree-walking evaluator: AST in, [`Value`] out.
//!
//! Control flow that needs to unwind past ordinary expression evaluation —
//! `break!`, `continue!`, `return!`, and raised errors — travels as a
//! [`Flow`] rather than a plain `Result<_, FarrError>`. A raised error is
//! wrapped into an [`InterpretError`] exactly once, at the point it first
//! escapes evaluation, so it carries the source position of whichever node
//! was being evaluated when it happened.

use crate::environment::Environment;
use crate::modules::ModuleLoader;
use crate::values::{
    BoundMethod, FunctionValue, InstanceValue, LibraryValue, ModuleValue, RangeValue, StructValue,
    Value,
};
use crate::{builtins, methods};
use farr_compiler::compiler::ast::{
    ArithmeticOp, AssignmentOp, Case, Catch, LogicalOp, Module, Node, RelationalOp,
};
use farr_compiler::compiler::lexer::Lexer;
use farr_compiler::compiler::parser;
use farr_compiler::compiler::tokens::Span;
use farr_core::errors::{ErrorKind, FarrError};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A raised error paired with the source position active when it escaped.
#[derive(Debug, Clone)]
pub struct InterpretError {
    pub error: FarrError,
    pub span: Span,
}

impl fmt::Display for InterpretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}! Around line {}, column {}.",
            self.error.kind.name(),
            self.error.message,
            self.span.row,
            self.span.col
        )
    }
}

/// A non-local exit from ordinary evaluation.
pub enum Flow {
    Error(InterpretError),
    Break,
    Continue,
    Return(Value),
}

pub type EvalResult = Result<Value, Flow>;

const MAX_INTERPOLATION_DEPTH: usize = 16;

pub struct Interpreter {
    pub env: Rc<RefCell<Environment>>,
    pub loader: ModuleLoader,
    pub(crate) interpolation_depth: usize,
}

impl Interpreter {
    pub fn new(loader: ModuleLoader) -> Self {
        let env = Environment::new();
        builtins::register(&mut env.borrow_mut());
        Self {
            env,
            loader,
            interpolation_depth: 0,
        }
    }

    fn raise(&self, span: Span, error: FarrError) -> Flow {
        Flow::Error(InterpretError { error, span })
    }

    /// Runs a whole module: registers every struct/function definition up
    /// front (so top-level code can call things declared later in the
    /// file), then executes the remaining statements in order.
    pub fn run(&mut self, module: &Module) -> EvalResult {
        self.register_definitions(&module.body)?;
        let mut last = Value::Null;
        for node in &module.body {
            if matches!(
                node,
                Node::FunctionDefinition { .. }
                    | Node::MemberFunctionDefinition { .. }
                    | Node::StructDefinition { .. }
            ) {
                continue;
            }
            last = self.eval(node)?;
        }
        Ok(last)
    }

    fn exec_block(&mut self, body: &[Node]) -> EvalResult {
        let mut last = Value::Null;
        for node in body {
            last = self.eval(node)?;
        }
        Ok(last)
    }

    // ── definitions ──

    fn register_definitions(&mut self, body: &[Node]) -> Result<(), Flow> {
        let mut raw_structs: HashMap<String, (Vec<Node>, Option<Vec<String>>)> = HashMap::new();
        let mut member_fns: HashMap<String, Vec<Node>> = HashMap::new();

        for node in body {
            match node {
                Node::FunctionDefinition {
                    identifier,
                    params,
                    body,
                } => {
                    let function = FunctionValue {
                        identifier: identifier.clone(),
                        params: params.clone(),
                        body: Rc::new(
                            body.as_deref()
                                .cloned()
                                .unwrap_or(Node::Block(farr_compiler::compiler::ast::Block {
                                    body: vec![],
                                    span: Span::dummy(),
                                })),
                        ),
                        closure: self.env.clone(),
                    };
                    self.env
                        .borrow_mut()
                        .assign(identifier.clone(), Value::Function(Rc::new(function)));
                }
                Node::StructDefinition {
                    identifier,
                    body,
                    parents,
                } => {
                    let attrs = match body.as_deref() {
                        Some(Node::Block(block)) => block.body.clone(),
                        _ => vec![],
                    };
                    let parent_names = parents.as_ref().map(|p| {
                        p.items
                            .iter()
                            .filter_map(|n| match n {
                                Node::Identifier { name, .. } => Some(name.clone()),
                                _ => None,
                            })
                            .collect()
                    });
                    raw_structs.insert(identifier.clone(), (attrs, parent_names));
                }
                Node::MemberFunctionDefinition {
                    identifier,
                    params,
                    body,
                    struct_name,
                } => {
                    member_fns.entry(struct_name.clone()).or_default().push(
                        Node::FunctionDefinition {
                            identifier: identifier.clone(),
                            params: params.clone(),
                            body: body.clone(),
                        },
                    );
                }
                _ => {}
            }
        }

        let mut resolved: HashMap<String, Rc<StructValue>> = HashMap::new();
        let names: Vec<String> = raw_structs.keys().cloned().collect();
        for name in names {
            self.flatten_struct(&name, &raw_structs, &member_fns, &mut resolved)?;
        }
        for (name, value) in resolved {
            self.env.borrow_mut().assign(name, Value::Struct(value));
        }
        Ok(())
    }

    fn flatten_struct(
        &self,
        name: &str,
        raw: &HashMap<String, (Vec<Node>, Option<Vec<String>>)>,
        member_fns: &HashMap<String, Vec<Node>>,
        resolved: &mut HashMap<String, Rc<StructValue>>,
    ) -> Result<Rc<StructValue>, Flow> {
        if let Some(existing) = resolved.get(name) {
            return Ok(existing.clone());
        }

        // A name with no entry in this batch is either a parent struct defined
        // in an earlier statement/module, or (for a lone MemberFunctionDefinition
        // reached as its own statement) the struct being reopened to add a
        // method — both already live in the environment rather than `raw`.
        let (own_attrs, parents) = match raw.get(name) {
            Some(entry) => entry.clone(),
            None => match self.env.borrow().locate(name) {
                Ok(Value::Struct(existing)) => {
                    let mut body = existing.body.clone();
                    body.extend(member_fns.get(name).cloned().unwrap_or_default());
                    let struct_value = Rc::new(StructValue {
                        identifier: name.to_string(),
                        attributes: existing.attributes.clone(),
                        body,
                        closure: existing.closure.clone(),
                    });
                    resolved.insert(name.to_string(), struct_value.clone());
                    return Ok(struct_value);
                }
                _ => {
                    return Err(self.raise(
                        Span::dummy(),
                        FarrError::name(format!("struct '{name}' is not defined")),
                    ))
                }
            },
        };

        let mut attributes = Vec::new();
        let mut body = Vec::new();
        for parent in parents.iter().flatten() {
            let parent_struct = self.flatten_struct(parent, raw, member_fns, resolved)?;
            attributes.extend(parent_struct.attributes.items.clone());
            body.extend(parent_struct.body.clone());
        }
        attributes.extend(own_attrs.clone());
        body.extend(member_fns.get(name).cloned().unwrap_or_default());

        let struct_value = Rc::new(StructValue {
            identifier: name.to_string(),
            attributes: farr_compiler::compiler::ast::Itemized {
                items: attributes,
                span: Span::dummy(),
            },
            body,
            closure: self.env.clone(),
        });
        resolved.insert(name.to_string(), struct_value.clone());
        Ok(struct_value)
    }

    // ── top-level dispatch ──

    fn eval(&mut self, node: &Node) -> EvalResult {
        match node {
            Node::Module(_) | Node::Pass(_) => Ok(Value::Null),
            Node::Null(_) => Ok(Value::Null),
            Node::Block(block) => self.exec_block(&block.body),
            Node::Integer { value, span } => self.eval_integer(value, 10, *span),
            Node::Binary { value, span } => self.eval_integer(&value[2..], 2, *span),
            Node::Octal { value, span } => self.eval_integer(&value[2..], 8, *span),
            Node::Hexadecimal { value, span } => self.eval_integer(&value[2..], 16, *span),
            Node::Float { value, span } => value
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.raise(*span, FarrError::value(format!("bad float literal '{value}'")))),
            Node::String { value, span } => self.eval_string(value, *span),
            Node::Identifier { name, span } => self
                .env
                .borrow()
                .locate(name)
                .map_err(|e| self.raise(*span, e)),

            Node::Range { from, to, by } => self.eval_range(from, to.as_deref(), by.as_deref()),
            Node::Itemized(items) => {
                let mut values = Vec::with_capacity(items.items.len());
                for item in &items.items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(Rc::new(RefCell::new(values))))
            }
            Node::ChainedExpressions { expressions } => self.eval_chain(&expressions.items),
            Node::List { elements } => {
                let mut values = Vec::with_capacity(elements.items.len());
                for item in &elements.items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(Rc::new(RefCell::new(values))))
            }
            Node::HashMap { pairs } => {
                let mut entries = Vec::new();
                if let Some(pairs) = pairs {
                    for pair in &pairs.items {
                        if let Node::Pair { key, value } = pair {
                            let k = self.eval(key)?;
                            let v = self.eval(value)?;
                            if let Some(slot) = entries.iter_mut().find(
                                |(existing_k, _): &&mut (Value, Value)| existing_k.value_eq(&k),
                            ) {
                                slot.1 = v;
                            } else {
                                entries.push((k, v));
                            }
                        }
                    }
                }
                Ok(Value::HashMap(Rc::new(RefCell::new(entries))))
            }
            Node::Pair { key, value } => {
                let k = self.eval(key)?;
                let v = self.eval(value)?;
                Ok(Value::Pair(Box::new(k), Box::new(v)))
            }
            Node::ExpandableArgument { expression, .. } => self.eval(expression),

            Node::Call { invoke, args } => self.eval_call(invoke, args),
            Node::GroupedExpression { expression } => self.eval(expression),

            Node::Negation { operand, .. } => {
                let v = self.eval(operand)?;
                Ok(Value::Bool(!v.truthy()))
            }
            Node::PreIncrement { operand, span } => self.eval_step(operand, 1, true, *span),
            Node::PreDecrement { operand, span } => self.eval_step(operand, -1, true, *span),
            Node::PostIncrement { operand, span } => self.eval_step(operand, 1, false, *span),
            Node::PostDecrement { operand, span } => self.eval_step(operand, -1, false, *span),

            Node::Arithmetic {
                operator,
                left,
                right,
                span,
            } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                arithmetic(*operator, &l, &r).map_err(|e| self.raise(*span, e))
            }
            Node::Relational {
                operator,
                left,
                right,
                span,
            } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                relational(*operator, &l, &r).map_err(|e| self.raise(*span, e))
            }
            Node::Logical {
                operator,
                left,
                right,
                ..
            } => {
                let l = self.eval(left)?;
                match operator {
                    LogicalOp::And if !l.truthy() => Ok(l),
                    LogicalOp::And => self.eval(right),
                    LogicalOp::Or if l.truthy() => Ok(l),
                    LogicalOp::Or => self.eval(right),
                }
            }
            Node::Ternary {
                then,
                condition,
                orelse,
                ..
            } => {
                if self.eval(condition)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(orelse)
                }
            }

            Node::Use { path } => self.eval_use(path),
            Node::VariableDeclaration {
                identifier,
                expression,
            } => {
                let value = match expression {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                self.env.borrow_mut().assign(identifier.clone(), value.clone());
                Ok(value)
            }
            Node::VariadicParameterDeclaration { .. } => Ok(Value::Null),
            Node::Assignment {
                operator,
                variables,
                expression,
            } => self.eval_assignment(*operator, &variables.items, expression),

            Node::While {
                condition,
                body,
                orelse,
            } => self.eval_while(condition, &body.body, orelse.as_ref().map(|b| &b.body[..])),
            Node::For {
                initial,
                condition,
                body,
                orelse,
            } => self.eval_for(
                &initial.items,
                condition,
                &body.body,
                orelse.as_ref().map(|b| &b.body[..]),
            ),
            Node::Break(_) => Err(Flow::Break),
            Node::Continue(_) => Err(Flow::Continue),
            Node::If {
                condition,
                body,
                orelse,
            } => {
                if self.eval(condition)?.truthy() {
                    self.exec_block(&body.body)
                } else {
                    match orelse {
                        Some(branch) => match branch.as_ref() {
                            farr_compiler::compiler::ast::IfOrElse::Block(block) => {
                                self.exec_block(&block.body)
                            }
                            farr_compiler::compiler::ast::IfOrElse::If(node) => self.eval(node),
                        },
                        None => Ok(Value::Null),
                    }
                }
            }
            Node::Match { expression, body } => self.eval_match(expression, body),
            Node::Try { body, catch } => self.eval_try(&body.body, catch.as_ref()),

            Node::FunctionDefinition { .. }
            | Node::MemberFunctionDefinition { .. }
            | Node::StructDefinition { .. } => {
                // Module-level definitions are already bound by `register_definitions`
                // before the body runs; this arm only fires for ones nested inside a
                // block (an `if`, a loop, another function), which are bound as
                // execution reaches them, same as any other statement.
                self.register_definitions(std::slice::from_ref(node))?;
                Ok(Value::Null)
            }
            Node::Return { expression, .. } => {
                let value = match expression {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                Err(Flow::Return(value))
            }
        }
    }

    fn eval_integer(&self, digits: &str, radix: u32, span: Span) -> EvalResult {
        BigInt::parse_bytes(digits.trim_start_matches('+').as_bytes(), radix)
            .map(Value::Integer)
            .ok_or_else(|| self.raise(span, FarrError::value(format!("bad integer literal '{digits}'"))))
    }

    fn eval_range(&mut self, from: &Node, to: Option<&Node>, by: Option<&Node>) -> EvalResult {
        let from = self.eval(from)?;
        let from = as_i64(&from).map_err(|e| self.raise(Span::dummy(), e))?;
        let to = match to {
            Some(node) => {
                let v = self.eval(node)?;
                Some(as_i64(&v).map_err(|e| self.raise(node.span(), e))?)
            }
            None => None,
        };
        let by = match by {
            Some(node) => {
                let v = self.eval(node)?;
                as_i64(&v).map_err(|e| self.raise(node.span(), e))?
            }
            None => 1,
        };
        Ok(Value::Range(Rc::new(RangeValue { from, to, by })))
    }

    fn eval_step(&mut self, operand: &Node, delta: i64, pre: bool, span: Span) -> EvalResult {
        let name = match operand {
            Node::Identifier { name, .. } => name.clone(),
            _ => return Err(self.raise(span, FarrError::type_("++/-- only apply to a plain identifier"))),
        };
        let current = self.env.borrow().locate(&name).map_err(|e| self.raise(span, e))?;
        let updated = arithmetic(
            if delta >= 0 {
                ArithmeticOp::Add
            } else {
                ArithmeticOp::Subtract
            },
            &current,
            &Value::Integer(BigInt::from(delta.abs())),
        )
        .map_err(|e| self.raise(span, e))?;
        self.env
            .borrow_mut()
            .replace(&name, updated.clone())
            .map_err(|e| self.raise(span, e))?;
        Ok(if pre { updated } else { current })
    }

    // ── strings ──

    fn eval_string(&mut self, raw: &str, span: Span) -> EvalResult {
        let (is_raw, inner) = if let Some(stripped) = raw.strip_prefix('r') {
            (true, &stripped[1..stripped.len() - 1])
        } else {
            (false, &raw[1..raw.len() - 1])
        };
        if is_raw {
            return Ok(Value::String(Rc::new(inner.to_string())));
        }
        let unescaped = unescape(inner);
        let interpolated = self.interpolate(&unescaped, span)?;
        Ok(Value::String(Rc::new(interpolated)))
    }

    fn interpolate(&mut self, text: &str, span: Span) -> Result<String, Flow> {
        if !text.contains("${") {
            return Ok(text.to_string());
        }
        self.interpolation_depth += 1;
        if self.interpolation_depth > MAX_INTERPOLATION_DEPTH {
            self.interpolation_depth -= 1;
            return Err(self.raise(span, FarrError::value("string interpolation nested too deeply")));
        }
        let mut out = String::new();
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '$' && chars.get(i + 1) == Some(&'{') {
                let mut depth = 1;
                let mut j = i + 2;
                while j < chars.len() && depth > 0 {
                    match chars[j] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    if depth > 0 {
                        j += 1;
                    }
                }
                let expr_src: String = chars[i + 2..j].iter().collect();
                let value = self.eval_embedded(&expr_src, span)?;
                out.push_str(&value.display_string());
                i = j + 1;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        self.interpolation_depth -= 1;
        Ok(out)
    }

    fn eval_embedded(&mut self, source: &str, span: Span) -> EvalResult {
        let with_terminator = format!("{source};");
        let tokens = Lexer::new(&with_terminator)
            .tokenize()
            .map_err(|_| self.raise(span, FarrError::value("bad expression in string interpolation")))?;
        let module = parser::parse(tokens)
            .map_err(|_| self.raise(span, FarrError::value("bad expression in string interpolation")))?;
        self.exec_block(&module.body)
    }

    // ── chains (attribute access, subscripting, method calls) ──

    fn eval_chain(&mut self, items: &[Node]) -> EvalResult {
        let mut current = self.eval(&items[0])?;
        for item in &items[1..] {
            current = self.apply_chain_item(current, item)?;
        }
        Ok(current)
    }

    /// Resolves every segment but the last, used by assignment to find the
    /// addressable target a final field/subscript segment writes into.
    fn eval_chain_prefix(&mut self, items: &[Node]) -> EvalResult {
        self.eval_chain(items)
    }

    fn apply_chain_item(&mut self, current: Value, item: &Node) -> EvalResult {
        match item {
            Node::Identifier { name, span } => self.chain_attribute(current, name, *span),
            Node::Range { from, to, .. } => {
                let key = self.eval(from)?;
                let to = match to {
                    Some(node) => Some(self.eval(node)?),
                    None => None,
                };
                methods::subscript(&current, &key, to.as_ref()).map_err(|e| self.raise(from.span(), e))
            }
            Node::Call { invoke, args } => {
                let name = match invoke.as_ref() {
                    Node::Identifier { name, .. } => name.clone(),
                    _ => return Err(self.raise(invoke.span(), FarrError::type_("expected a method name"))),
                };
                let (positional, keyword, expansion) = self.eval_arguments(args)?;
                self.call_method(current, &name, positional, keyword, expansion, invoke.span())
            }
            Node::Itemized(inner) => self.eval_chain(&inner.items),
            other => self.eval(other),
        }
    }

    fn chain_attribute(&mut self, current: Value, name: &str, span: Span) -> EvalResult {
        match &current {
            Value::Instance(instance) => instance
                .borrow()
                .env
                .borrow()
                .locate(name)
                .map_err(|e| self.raise(span, e)),
            Value::Module(m) => m.env.borrow().locate(name).map_err(|e| self.raise(span, e)),
            Value::Library(l) => {
                if let Ok(value) = l.env.borrow().locate(name) {
                    return Ok(value);
                }
                for (sub_name, sub_value) in l.submodules.borrow().iter() {
                    if sub_name == name {
                        return Ok(sub_value.clone());
                    }
                }
                Err(self.raise(span, FarrError::attribute(format!("'{name}' is not defined on library '{}'", l.name))))
            }
            _ => self.call_method(current, name, vec![], vec![], vec![], span),
        }
    }

    // ── calls ──

    fn eval_arguments(
        &mut self,
        args: &farr_compiler::compiler::ast::Itemized,
    ) -> Result<(Vec<Value>, Vec<(String, Value)>, Vec<Value>), Flow> {
        let mut positional = Vec::new();
        let mut keyword = Vec::new();
        let mut expansion = Vec::new();
        for arg in &args.items {
            match arg {
                Node::Assignment {
                    operator: AssignmentOp::Plain,
                    variables,
                    expression,
                } if matches!(variables.items.first(), Some(Node::Identifier { .. })) => {
                    let Node::Identifier { name, .. } = &variables.items[0] else {
                        unreachable!()
                    };
                    let value = self.eval(expression)?;
                    keyword.push((name.clone(), value));
                }
                Node::ExpandableArgument { expression, .. } => {
                    let value = self.eval(expression)?;
                    match value {
                        Value::List(cell) => expansion.extend(cell.borrow().iter().cloned()),
                        other => expansion.push(other),
                    }
                }
                other => positional.push(self.eval(other)?),
            }
        }
        Ok((positional, keyword, expansion))
    }

    fn eval_call(&mut self, invoke: &Node, args: &farr_compiler::compiler::ast::Itemized) -> EvalResult {
        let name = match invoke {
            Node::Identifier { name, .. } => name.clone(),
            _ => return Err(self.raise(invoke.span(), FarrError::type_("only a name can be called"))),
        };
        let callee = self
            .env
            .borrow()
            .locate(&name)
            .map_err(|e| self.raise(invoke.span(), e))?;
        let (positional, keyword, expansion) = self.eval_arguments(args)?;
        self.invoke(callee, positional, keyword, expansion, invoke.span())
    }

    fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
        expansion: Vec<Value>,
        span: Span,
    ) -> EvalResult {
        match &receiver {
            Value::Instance(instance) => {
                let found = instance.borrow().env.borrow().locate(name).ok();
                match found {
                    Some(callee) => self.invoke(callee, positional, keyword, expansion, span),
                    None => methods::call(&receiver, name, positional).map_err(|e| self.raise(span, e)),
                }
            }
            Value::Module(m) => {
                let callee = m.env.borrow().locate(name).map_err(|e| self.raise(span, e))?;
                self.invoke(callee, positional, keyword, expansion, span)
            }
            _ => methods::call(&receiver, name, positional).map_err(|e| self.raise(span, e)),
        }
    }

    fn invoke(
        &mut self,
        callee: Value,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
        expansion: Vec<Value>,
        span: Span,
    ) -> EvalResult {
        match callee {
            Value::Native(_, f) => {
                let mut args = positional;
                args.extend(expansion);
                f(args, keyword).map_err(|e| self.raise(span, e))
            }
            Value::Function(function) => self.call_user_function(&function, positional, keyword, expansion, span),
            Value::BoundMethod(bound) => {
                self.call_user_function(&bound.function, positional, keyword, expansion, span)
            }
            Value::Struct(s) => self.instantiate_struct(&s, positional, keyword, expansion, span),
            other => Err(self.raise(
                span,
                FarrError::type_(format!("{} is not callable", other.type_name())),
            )),
        }
    }

    fn call_user_function(
        &mut self,
        function: &Rc<FunctionValue>,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
        expansion: Vec<Value>,
        span: Span,
    ) -> EvalResult {
        let call_env = Environment::child(function.closure.clone());
        self.populate_params(&call_env, &function.params, positional, keyword, expansion, span)?;
        let previous = std::mem::replace(&mut self.env, call_env);
        let result = self.eval(&function.body);
        self.env = previous;
        match result {
            Ok(_) => Ok(Value::Null),
            Err(Flow::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    fn instantiate_struct(
        &mut self,
        s: &Rc<StructValue>,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
        expansion: Vec<Value>,
        span: Span,
    ) -> EvalResult {
        let instance_env = Environment::child(s.closure.clone());
        self.populate_params(&instance_env, &s.attributes, positional, keyword, expansion, span)?;
        for node in &s.body {
            if let Node::FunctionDefinition {
                identifier,
                params,
                body,
            } = node
            {
                let function = FunctionValue {
                    identifier: identifier.clone(),
                    params: params.clone(),
                    body: Rc::new(
                        body.as_deref()
                            .cloned()
                            .unwrap_or(Node::Block(farr_compiler::compiler::ast::Block {
                                body: vec![],
                                span: Span::dummy(),
                            })),
                    ),
                    closure: instance_env.clone(),
                };
                instance_env
                    .borrow_mut()
                    .assign(identifier.clone(), Value::Function(Rc::new(function)));
            }
        }
        Ok(Value::Instance(Rc::new(RefCell::new(InstanceValue {
            struct_name: s.identifier.clone(),
            env: instance_env,
        }))))
    }

    fn populate_params(
        &mut self,
        env: &Rc<RefCell<Environment>>,
        params: &farr_compiler::compiler::ast::Itemized,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
        expansion: Vec<Value>,
        span: Span,
    ) -> Result<(), Flow> {
        let mut ordinary: Vec<(&str, &Option<Box<Node>>)> = Vec::new();
        let mut variadic: Option<&str> = None;
        for param in &params.items {
            match param {
                Node::VariableDeclaration {
                    identifier,
                    expression,
                } => ordinary.push((identifier.as_str(), expression)),
                Node::VariadicParameterDeclaration { identifier, .. } => {
                    variadic = Some(identifier.as_str());
                }
                _ => {}
            }
        }

        let mut values = positional;
        values.extend(expansion);

        let mut idx = 0;
        for (name, default) in &ordinary {
            if idx < values.len() {
                env.borrow_mut().assign(*name, values[idx].clone());
                idx += 1;
            } else if let Some((_, value)) = keyword.iter().find(|(k, _)| k == name) {
                env.borrow_mut().assign(*name, value.clone());
            } else if let Some(default_expr) = default {
                let value = self.eval(default_expr)?;
                env.borrow_mut().assign(*name, value);
            } else {
                return Err(self.raise(
                    span,
                    FarrError::type_(format!("missing required argument '{name}'")),
                ));
            }
        }
        if let Some(vname) = variadic {
            let rest = values[idx.min(values.len())..].to_vec();
            env.borrow_mut().assign(vname, Value::List(Rc::new(RefCell::new(rest))));
        } else if idx < values.len() {
            return Err(self.raise(span, FarrError::type_("too many positional arguments")));
        }
        for (k, _) in &keyword {
            if !ordinary.iter().any(|(n, _)| n == k) {
                return Err(self.raise(span, FarrError::name(format!("unexpected keyword argument '{k}'"))));
            }
        }
        Ok(())
    }

    // ── assignment ──

    fn eval_assignment(&mut self, op: AssignmentOp, items: &[Node], expr: &Node) -> EvalResult {
        let rhs = self.eval(expr)?;
        if items.len() == 1 {
            let Node::Identifier { name, span } = &items[0] else {
                return Err(self.raise(expr.span(), FarrError::type_("assignment target must be a name")));
            };
            let final_value = if matches!(op, AssignmentOp::Plain) {
                rhs
            } else {
                let current = self.env.borrow().locate(name).map_err(|e| self.raise(*span, e))?;
                compound(op, &current, &rhs).map_err(|e| self.raise(*span, e))?
            };
            self.env
                .borrow_mut()
                .replace(name, final_value.clone())
                .or_else(|_| {
                    self.env.borrow_mut().assign(name.clone(), final_value.clone());
                    Ok::<(), FarrError>(())
                })
                .ok();
            return Ok(final_value);
        }

        let prefix = self.eval_chain_prefix(&items[..items.len() - 1])?;
        let last = &items[items.len() - 1];
        match (&prefix, last) {
            (Value::Instance(instance), Node::Identifier { name, span }) => {
                let final_value = self.assignment_value(op, &prefix, name, *span, || {
                    instance.borrow().env.borrow().locate(name)
                }, rhs)?;
                instance.borrow().env.borrow_mut().assign(name.clone(), final_value.clone());
                Ok(final_value)
            }
            (Value::List(cell), Node::Range { from, .. }) => {
                let idx_value = self.eval(from)?;
                let idx = as_i64(&idx_value).map_err(|e| self.raise(from.span(), e))?;
                let len = cell.borrow().len() as i64;
                if idx < 1 || idx > len {
                    return Err(self.raise(from.span(), FarrError::lookup("list index out of range")));
                }
                let pos = (idx - 1) as usize;
                let final_value = if matches!(op, AssignmentOp::Plain) {
                    rhs
                } else {
                    let current = cell.borrow()[pos].clone();
                    compound(op, &current, &rhs).map_err(|e| self.raise(from.span(), e))?
                };
                cell.borrow_mut()[pos] = final_value.clone();
                Ok(final_value)
            }
            (Value::HashMap(cell), Node::Range { from, .. }) => {
                let key = self.eval(from)?;
                let final_value = if matches!(op, AssignmentOp::Plain) {
                    rhs
                } else {
                    let current = cell
                        .borrow()
                        .iter()
                        .find(|(k, _)| k.value_eq(&key))
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null);
                    compound(op, &current, &rhs).map_err(|e| self.raise(from.span(), e))?
                };
                let mut map = cell.borrow_mut();
                if let Some(slot) = map.iter_mut().find(|(k, _)| k.value_eq(&key)) {
                    slot.1 = final_value.clone();
                } else {
                    map.push((key, final_value.clone()));
                }
                Ok(final_value)
            }
            _ => Err(self.raise(
                last.span(),
                FarrError::type_("unsupported assignment target"),
            )),
        }
    }

    fn assignment_value(
        &mut self,
        op: AssignmentOp,
        _prefix: &Value,
        _name: &str,
        span: Span,
        current: impl FnOnce() -> Result<Value, FarrError>,
        rhs: Value,
    ) -> EvalResult {
        if matches!(op, AssignmentOp::Plain) {
            return Ok(rhs);
        }
        let current = current().unwrap_or(Value::Null);
        compound(op, &current, &rhs).map_err(|e| self.raise(span, e))
    }

    // ── loops ──

    fn eval_while(&mut self, condition: &Node, body: &[Node], orelse: Option<&[Node]>) -> EvalResult {
        let mut broke = false;
        while self.eval(condition)?.truthy() {
            match self.exec_block(body) {
                Ok(_) => {}
                Err(Flow::Break) => {
                    broke = true;
                    break;
                }
                Err(Flow::Continue) => continue,
                Err(other) => return Err(other),
            }
        }
        if !broke {
            if let Some(orelse) = orelse {
                return self.exec_block(orelse);
            }
        }
        Ok(Value::Null)
    }

    fn eval_for(
        &mut self,
        initial: &[Node],
        condition: &Node,
        body: &[Node],
        orelse: Option<&[Node]>,
    ) -> EvalResult {
        let iterable = self.eval(condition)?;
        let items = iterate(&iterable).map_err(|e| self.raise(condition.span(), e))?;
        let mut broke = false;
        'outer: for item in items {
            self.bind_loop_targets(initial, item)?;
            match self.exec_block(body) {
                Ok(_) => {}
                Err(Flow::Break) => {
                    broke = true;
                    break 'outer;
                }
                Err(Flow::Continue) => continue,
                Err(other) => return Err(other),
            }
        }
        if !broke {
            if let Some(orelse) = orelse {
                return self.exec_block(orelse);
            }
        }
        Ok(Value::Null)
    }

    fn bind_loop_targets(&mut self, initial: &[Node], item: Value) -> Result<(), Flow> {
        let names: Vec<String> = initial
            .iter()
            .map(|node| match node {
                Node::VariableDeclaration { identifier, .. } => identifier.clone(),
                Node::Identifier { name, .. } => name.clone(),
                _ => String::new(),
            })
            .collect();
        if names.len() > 1 {
            if let Value::Pair(k, v) = &item {
                self.env.borrow_mut().assign(names[0].clone(), (**k).clone());
                self.env.borrow_mut().assign(names[1].clone(), (**v).clone());
                return Ok(());
            }
        }
        if let Some(name) = names.first() {
            self.env.borrow_mut().assign(name.clone(), item);
        }
        Ok(())
    }

    // ── match / case ──

    fn eval_match(&mut self, expression: &Node, cases: &[Case]) -> EvalResult {
        let subject = self.eval(expression)?;
        for case in cases {
            if self.case_matches(case, &subject)? {
                return self.run_case(case, &subject);
            }
        }
        Ok(Value::Null)
    }

    fn run_case(&mut self, case: &Case, subject: &Value) -> EvalResult {
        let mut next = Some(case);
        while let Some(current) = next {
            if self.case_matches(current, subject)? {
                return self.exec_block(&current.body.body);
            }
            next = current.orelse.as_deref();
        }
        Ok(Value::Null)
    }

    fn case_matches(&mut self, case: &Case, subject: &Value) -> Result<bool, Flow> {
        if matches!(case.condition, Node::Null(_)) && case.orelse.is_none() {
            return Ok(true);
        }
        match &case.condition {
            Node::Itemized(items) => {
                for item in &items.items {
                    let candidate = self.eval(item)?;
                    if candidate.value_eq(subject) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => {
                let candidate = self.eval(other)?;
                Ok(candidate.value_eq(subject))
            }
        }
    }

    // ── try / catch ──

    fn eval_try(&mut self, body: &[Node], catch: Option<&Catch>) -> EvalResult {
        match self.exec_block(body) {
            Err(Flow::Error(err)) => match catch {
                Some(catch) => self.dispatch_catch(catch, err),
                None => Err(Flow::Error(err)),
            },
            other => other,
        }
    }

    fn dispatch_catch(&mut self, catch: &Catch, err: InterpretError) -> EvalResult {
        let mut current = Some(catch);
        while let Some(clause) = current {
            let matches = clause.excepts.items.iter().any(|node| match node {
                Node::Identifier { name, .. } => ErrorKind::from_name(name)
                    .map(|kind| kind.catches(err.error.kind))
                    .unwrap_or(false),
                _ => false,
            }) || clause.excepts.items.is_empty();
            if matches {
                if let Some(bound_name) = &clause.bound_as {
                    self.env
                        .borrow_mut()
                        .assign(bound_name.clone(), Value::Error(Rc::new(err.error.clone())));
                }
                return self.exec_block(&clause.body.body);
            }
            current = clause.orelse.as_deref();
        }
        Err(Flow::Error(err))
    }

    // ── use ──

    fn eval_use(&mut self, path: &farr_compiler::compiler::ast::Itemized) -> EvalResult {
        let segments: Vec<String> = path
            .items
            .iter()
            .filter_map(|n| match n {
                Node::Identifier { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        let value = self
            .loader
            .resolve(&segments)
            .map_err(|e| self.raise(path.span, e))?;
        let binding_name = segments.last().cloned().unwrap_or_default();
        self.env.borrow_mut().assign(binding_name, value.clone());
        Ok(value)
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('b') => out.push('\u{8}'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn as_i64(value: &Value) -> Result<i64, FarrError> {
    match value {
        Value::Integer(n) => n
            .to_i64()
            .ok_or_else(|| FarrError::value("integer too large for this operation")),
        Value::Float(f) => Ok(*f as i64),
        other => Err(FarrError::type_(format!(
            "expected an integer, got {}",
            other.type_name()
        ))),
    }
}

fn iterate(value: &Value) -> Result<Vec<Value>, FarrError> {
    match value {
        Value::Range(r) => Ok(r
            .values()?
            .into_iter()
            .map(|n| Value::Integer(BigInt::from(n)))
            .collect()),
        Value::List(l) => Ok(l.borrow().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(Rc::new(c.to_string()))).collect()),
        Value::HashMap(m) => Ok(m
            .borrow()
            .iter()
            .map(|(k, v)| Value::Pair(Box::new(k.clone()), Box::new(v.clone())))
            .collect()),
        other => Err(FarrError::type_(format!("{} is not iterable", other.type_name()))),
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => n.to_f64(),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn arithmetic(op: ArithmeticOp, l: &Value, r: &Value) -> Result<Value, FarrError> {
    if op == ArithmeticOp::Add {
        if let (Value::String(a), Value::String(b)) = (l, r) {
            return Ok(Value::String(Rc::new(format!("{a}{b}"))));
        }
    }
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => integer_arithmetic(op, a, b),
        _ => {
            let (a, b) = (
                to_float(l).ok_or_else(|| bad_operand(l))?,
                to_float(r).ok_or_else(|| bad_operand(r))?,
            );
            float_arithmetic(op, a, b)
        }
    }
}

fn bad_operand(v: &Value) -> FarrError {
    FarrError::type_(format!("'{}' does not support arithmetic", v.type_name()))
}

fn integer_arithmetic(op: ArithmeticOp, a: &BigInt, b: &BigInt) -> Result<Value, FarrError> {
    Ok(match op {
        ArithmeticOp::Add => Value::Integer(a + b),
        ArithmeticOp::Subtract => Value::Integer(a - b),
        ArithmeticOp::Multiply => Value::Integer(a * b),
        ArithmeticOp::Divide => {
            if b.is_zero() {
                return Err(FarrError::arithmetic("division by zero"));
            }
            let af = a.to_f64().ok_or_else(|| FarrError::value("integer too large to divide"))?;
            let bf = b.to_f64().ok_or_else(|| FarrError::value("integer too large to divide"))?;
            Value::Float(af / bf)
        }
        ArithmeticOp::Modulus => {
            if b.is_zero() {
                return Err(FarrError::arithmetic("modulus by zero"));
            }
            Value::Integer(a % b)
        }
        ArithmeticOp::Power => {
            let exp = b
                .to_u32()
                .ok_or_else(|| FarrError::value("exponent out of range"))?;
            Value::Integer(a.pow(exp))
        }
        ArithmeticOp::LeftShift => {
            let shift = b.to_u32().ok_or_else(|| FarrError::value("shift amount out of range"))?;
            Value::Integer(a << shift)
        }
        ArithmeticOp::RightShift => {
            let shift = b.to_u32().ok_or_else(|| FarrError::value("shift amount out of range"))?;
            Value::Integer(a >> shift)
        }
    })
}

fn float_arithmetic(op: ArithmeticOp, a: f64, b: f64) -> Result<Value, FarrError> {
    Ok(match op {
        ArithmeticOp::Add => Value::Float(a + b),
        ArithmeticOp::Subtract => Value::Float(a - b),
        ArithmeticOp::Multiply => Value::Float(a * b),
        ArithmeticOp::Divide => {
            if b == 0.0 {
                return Err(FarrError::arithmetic("division by zero"));
            }
            Value::Float(a / b)
        }
        ArithmeticOp::Modulus => {
            if b == 0.0 {
                return Err(FarrError::arithmetic("modulus by zero"));
            }
            Value::Float(a % b)
        }
        ArithmeticOp::Power => Value::Float(a.powf(b)),
        ArithmeticOp::LeftShift | ArithmeticOp::RightShift => {
            return Err(FarrError::type_("shift operators require integer operands"));
        }
    })
}

fn compound(op: AssignmentOp, current: &Value, rhs: &Value) -> Result<Value, FarrError> {
    let arith = match op {
        AssignmentOp::Plain => unreachable!(),
        AssignmentOp::Add => ArithmeticOp::Add,
        AssignmentOp::Subtract => ArithmeticOp::Subtract,
        AssignmentOp::Multiply => ArithmeticOp::Multiply,
        AssignmentOp::Divide => ArithmeticOp::Divide,
        AssignmentOp::Modulus => ArithmeticOp::Modulus,
        AssignmentOp::Power => ArithmeticOp::Power,
        AssignmentOp::LeftShift => ArithmeticOp::LeftShift,
        AssignmentOp::RightShift => ArithmeticOp::RightShift,
    };
    arithmetic(arith, current, rhs)
}

fn relational(op: RelationalOp, l: &Value, r: &Value) -> Result<Value, FarrError> {
    Ok(match op {
        RelationalOp::EqualEqual => Value::Bool(l.value_eq(r)),
        RelationalOp::NotEqual => Value::Bool(!l.value_eq(r)),
        _ => {
            let ordering = compare(l, r)?;
            Value::Bool(match op {
                RelationalOp::LessThan => ordering == std::cmp::Ordering::Less,
                RelationalOp::GreaterThan => ordering == std::cmp::Ordering::Greater,
                RelationalOp::LessThanOrEqual => ordering != std::cmp::Ordering::Greater,
                RelationalOp::GreaterThanOrEqual => ordering != std::cmp::Ordering::Less,
                RelationalOp::EqualEqual | RelationalOp::NotEqual => unreachable!(),
            })
        }
    })
}

fn compare(l: &Value, r: &Value) -> Result<std::cmp::Ordering, FarrError> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = (
                to_float(l).ok_or_else(|| FarrError::type_("values are not comparable"))?,
                to_float(r).ok_or_else(|| FarrError::type_("values are not comparable"))?,
            );
            a.partial_cmp(&b)
                .ok_or_else(|| FarrError::value("cannot compare NaN"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ModuleLoader;

    fn run(src: &str) -> Value {
        let module = farr_compiler::compile(src).unwrap();
        let mut interpreter = Interpreter::new(ModuleLoader::new(None));
        match interpreter.run(&module) {
            Ok(value) => value,
            Err(Flow::Error(e)) => panic!("interpret error: {e}"),
            Err(_) => panic!("unexpected non-local exit"),
        }
    }

    #[test]
    fn evaluates_prefix_arithmetic() {
        let value = run("+ 13 8;");
        assert!(matches!(value, Value::Integer(n) if n == BigInt::from(21)));
    }

    #[test]
    fn divides_to_a_float() {
        let value = run("/ 9 10;");
        assert!(matches!(value, Value::Float(f) if (f - 0.9).abs() < 1e-9));
    }

    #[test]
    fn while_loop_counts_to_five() {
        let value = run(
            "let n = 0; let count = 0; while n < 5 { n = + n 1; count = + count 1; }; count;",
        );
        assert!(matches!(value, Value::Integer(n) if n == BigInt::from(5)));
    }

    #[test]
    fn struct_instances_call_member_functions() {
        let value = run(
            "struct P { let name; let age = 0; }\n\
             fn P::bday() = { age = + age 1; return! age; }\n\
             let p = P(\"J\", 30);\n\
             p.bday();",
        );
        assert!(matches!(value, Value::Integer(n) if n == BigInt::from(31)));
    }

    #[test]
    fn try_catch_matches_arithmetic_error() {
        let value = run(
            "let result = \"no\"; try { / 5 0; } catch (ArithmeticError) e { result = \"ok\"; }; result;",
        );
        assert!(matches!(value, Value::String(s) if *s == "ok"));
    }

    #[test]
    fn for_loop_sums_a_range() {
        let value = run("let total = 0; for i in [1..5] { total += i; }; total;");
        assert!(matches!(value, Value::Integer(n) if n == BigInt::from(15)));
    }

    #[test]
    fn string_interpolation_embeds_expressions() {
        let value = run("let x = 2; \"value is ${+ x 1}\";");
        assert!(matches!(value, Value::String(s) if *s == "value is 3"));
    }
}
