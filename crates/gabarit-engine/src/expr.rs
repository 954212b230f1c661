//! Condition expressions for `{% if %}` / `{% elif %}`
//!
//! Parsed with the pest grammar in `condition.pest`:
//!
//! ```text
//! or_expr    := and_expr ('or' and_expr)*
//! and_expr   := unary ('and' unary)*
//! unary      := 'not' unary | comparison
//! comparison := operand [('==' | '!=' | '>' | '<' | '>=' | '<=') operand]
//! operand    := path | number | string | 'true' | 'false' | 'null'
//! ```
//!
//! Numbers accept a sign, a fraction and an exponent (`-1.5`, `1e3`).
//! Expressions are parsed on every evaluation and dropped afterwards.

use gabarit_core::{Scope, Value};
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "condition.pest"]
struct ConditionParser;

/// Reasons a condition could not be parsed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(Box<pest::error::Error<Rule>>),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("unexpected rule: {0:?}")]
    UnexpectedRule(Rule),

    #[error("empty expression")]
    Empty,
}

impl From<pest::error::Error<Rule>> for ExprError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        ExprError::Syntax(Box::new(e))
    }
}

/// A value source: a literal or a path looked up in the current scope
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Path(String),
}

impl Operand {
    /// Parse a single operand, e.g. a filter argument or an interpolation base
    pub fn parse(input: &str) -> Option<Operand> {
        let mut pairs = ConditionParser::parse(Rule::single_operand, input).ok()?;
        let operand = pairs.next()?.into_inner().next()?;
        build_operand(operand).ok()
    }

    pub fn eval(&self, scope: &Scope<'_>) -> Value {
        match self {
            Operand::Literal(value) => value.clone(),
            Operand::Path(path) => scope.resolve(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            ">" => CmpOp::Gt,
            "<" => CmpOp::Lt,
            ">=" => CmpOp::Ge,
            "<=" => CmpOp::Le,
            _ => return None,
        })
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        if let CmpOp::Eq | CmpOp::Ne = self {
            return (lhs == rhs) == (self == CmpOp::Eq);
        }

        // Ordering is only defined between two numbers
        let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
            return false;
        };
        match self {
            CmpOp::Gt => a > b,
            CmpOp::Lt => a < b,
            CmpOp::Ge => a >= b,
            _ => a <= b,
        }
    }
}

/// Parsed condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Operand(Operand),
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate to a boolean, short-circuiting `and` / `or` left to right
    pub fn eval(&self, scope: &Scope<'_>) -> bool {
        match self {
            Expr::Operand(operand) => operand.eval(scope).is_truthy(),
            Expr::Compare { lhs, op, rhs } => op.apply(&lhs.eval(scope), &rhs.eval(scope)),
            Expr::Not(inner) => !inner.eval(scope),
            Expr::And(lhs, rhs) => lhs.eval(scope) && rhs.eval(scope),
            Expr::Or(lhs, rhs) => lhs.eval(scope) || rhs.eval(scope),
        }
    }
}

/// Parse a condition expression
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    if input.trim().is_empty() {
        return Err(ExprError::Empty);
    }

    let pairs = ConditionParser::parse(Rule::condition, input)?;
    for pair in pairs.flatten() {
        if pair.as_rule() == Rule::or_expr {
            return build_or(pair);
        }
    }
    Err(ExprError::UnexpectedRule(Rule::condition))
}

/// Parse and evaluate a condition in one step
pub fn evaluate(input: &str, scope: &Scope<'_>) -> Result<bool, ExprError> {
    parse(input).map(|expr| expr.eval(scope))
}

fn build_or(pair: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    let mut operands = pair.into_inner().filter(|p| p.as_rule() == Rule::and_expr);
    let first = operands.next().ok_or(ExprError::UnexpectedRule(Rule::or_expr))?;

    let mut lhs = build_and(first)?;
    for rhs in operands {
        lhs = Expr::Or(Box::new(lhs), Box::new(build_and(rhs)?));
    }
    Ok(lhs)
}

fn build_and(pair: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    let mut operands = pair.into_inner().filter(|p| p.as_rule() == Rule::unary);
    let first = operands.next().ok_or(ExprError::UnexpectedRule(Rule::and_expr))?;

    let mut lhs = build_unary(first)?;
    for rhs in operands {
        lhs = Expr::And(Box::new(lhs), Box::new(build_unary(rhs)?));
    }
    Ok(lhs)
}

fn build_unary(pair: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or(ExprError::UnexpectedRule(Rule::unary))?;

    match first.as_rule() {
        Rule::not_op => {
            let operand = inner.next().ok_or(ExprError::UnexpectedRule(Rule::not_op))?;
            Ok(Expr::Not(Box::new(build_unary(operand)?)))
        }
        Rule::comparison => build_comparison(first),
        other => Err(ExprError::UnexpectedRule(other)),
    }
}

fn build_comparison(pair: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let lhs = inner.next().ok_or(ExprError::UnexpectedRule(Rule::comparison))?;
    let lhs = build_operand(lhs)?;

    let Some(op) = inner.next() else {
        return Ok(Expr::Operand(lhs));
    };
    let op = CmpOp::from_symbol(op.as_str()).ok_or(ExprError::UnexpectedRule(Rule::cmp_op))?;
    let rhs = inner.next().ok_or(ExprError::UnexpectedRule(Rule::comparison))?;

    Ok(Expr::Compare {
        lhs,
        op,
        rhs: build_operand(rhs)?,
    })
}

fn build_operand(pair: Pair<'_, Rule>) -> Result<Operand, ExprError> {
    let literal = pair
        .into_inner()
        .next()
        .ok_or(ExprError::UnexpectedRule(Rule::operand))?;

    let text = literal.as_str();
    Ok(match literal.as_rule() {
        Rule::path => Operand::Path(text.to_string()),
        Rule::number => {
            let n = text
                .parse::<f64>()
                .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
            Operand::Literal(Value::Number(n))
        }
        Rule::string => Operand::Literal(Value::String(unquote(text))),
        Rule::boolean => Operand::Literal(Value::Bool(text == "true")),
        Rule::null_lit => Operand::Literal(Value::Null),
        other => return Err(ExprError::UnexpectedRule(other)),
    })
}

/// Strip the surrounding quotes; a backslash keeps the next character as-is
fn unquote(quoted: &str) -> String {
    let body = quoted.get(1..quoted.len().saturating_sub(1)).unwrap_or_default();

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            other => out.push(other),
        }
    }
    out
}
