//! Restricted condition expressions
//!
//! Workflow definitions may come from end users, so condition strings are
//! evaluated with a small recursive-descent evaluator instead of a
//! general-purpose interpreter. Supported: comparisons (`==`, `!=`, `<`,
//! `<=`, `>`, `>=`), boolean `and`/`or`/`not` (and `&&`/`||`/`!`), `len(..)`,
//! subscript and dotted field access, string/number/bool/null literals, and
//! context references — bare identifiers or `$name`. There is no arithmetic,
//! which leaves `-` free to appear inside identifiers (step ids such as
//! `step_extract-1`).
//!
//! Missing context keys, absent fields, and out-of-range indexes evaluate to
//! null rather than failing, matching how unresolved `$`-variables behave
//! elsewhere. Truthiness is Python-like: null, false, zero, and empty
//! strings/arrays/objects are falsy.

use serde_json::Value;
use workstation_common::{Error, Metadata, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug)]
enum Expr {
    Literal(Value),
    Var(String),
    Index(Box<Expr>, Box<Expr>),
    Field(Box<Expr>, String),
    Len(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
}

/// Evaluate an expression against the execution context
pub fn evaluate(expression: &str, context: &Metadata) -> Result<Value> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::Expression(format!(
            "unexpected trailing input in expression: {expression}"
        )));
    }
    eval(&expr, context)
}

/// Evaluate an expression to a boolean via truthiness. An empty expression
/// is vacuously true.
pub fn evaluate_condition(expression: &str, context: &Metadata) -> Result<bool> {
    if expression.trim().is_empty() {
        return Ok(true);
    }
    Ok(truthy(&evaluate(expression, context)?))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err(Error::Expression("expected '==' in expression".to_string()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::And);
                    i += 2;
                } else {
                    return Err(Error::Expression("expected '&&' in expression".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::Or);
                    i += 2;
                } else {
                    return Err(Error::Expression("expected '||' in expression".to_string()));
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut literal = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                literal.push(escaped);
                                i += 2;
                            } else {
                                return Err(Error::Expression(
                                    "unterminated string literal".to_string(),
                                ));
                            }
                        }
                        Some(&ch) => {
                            literal.push(ch);
                            i += 1;
                        }
                        None => {
                            return Err(Error::Expression(
                                "unterminated string literal".to_string(),
                            ));
                        }
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '-' if chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                let (number, next) = lex_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = next;
            }
            _ if c.is_ascii_digit() => {
                let (number, next) = lex_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = next;
            }
            _ if is_ident_start(c) => {
                let mut ident = String::new();
                ident.push(c);
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    if is_ident_continue(ch) {
                        ident.push(ch);
                        i += 1;
                    } else if ch == '-'
                        && chars.get(i + 1).copied().is_some_and(is_ident_continue)
                    {
                        // Step ids embed hyphens; no arithmetic makes this safe
                        ident.push(ch);
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" | "True" => Token::True,
                    "false" | "False" => Token::False,
                    "null" | "None" => Token::Null,
                    _ => Token::Ident(ident),
                });
            }
            _ => {
                return Err(Error::Expression(format!(
                    "unexpected character '{c}' in expression"
                )));
            }
        }
    }

    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> Result<(f64, usize)> {
    let mut i = start;
    let mut text = String::new();
    if chars[i] == '-' {
        text.push('-');
        i += 1;
    }
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        text.push(chars[i]);
        i += 1;
    }
    text.parse::<f64>()
        .map(|n| (n, i))
        .map_err(|_| Error::Expression(format!("invalid number literal: {text}")))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(Error::Expression(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_postfix()?;
        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_postfix()?;
        Ok(Expr::Cmp(op, Box::new(left), Box::new(right)))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::Dot) => {
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(field)) => {
                            expr = Expr::Field(Box::new(expr), field);
                        }
                        other => {
                            return Err(Error::Expression(format!(
                                "expected field name after '.', found {other:?}"
                            )));
                        }
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                // `len` is the only callable in the whitelist
                if name == "len" && self.peek() == Some(&Token::LParen) {
                    self.advance();
                    let inner = self.parse_expr()?;
                    self.expect(&Token::RParen)?;
                    return Ok(Expr::Len(Box::new(inner)));
                }
                let key = name.strip_prefix('$').unwrap_or(&name).to_string();
                Ok(Expr::Var(key))
            }
            other => Err(Error::Expression(format!(
                "unexpected token in expression: {other:?}"
            ))),
        }
    }
}

fn eval(expr: &Expr, context: &Metadata) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => Ok(context.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Index(target, index) => {
            let target = eval(target, context)?;
            let index = eval(index, context)?;
            Ok(index_value(&target, &index))
        }
        Expr::Field(target, field) => {
            let target = eval(target, context)?;
            Ok(target.get(field).cloned().unwrap_or(Value::Null))
        }
        Expr::Len(inner) => {
            let value = eval(inner, context)?;
            let length = match &value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(Error::Expression(format!(
                        "len() is not defined for {other}"
                    )));
                }
            };
            Ok(Value::Number(serde_json::Number::from(length)))
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, context)?))),
        Expr::And(left, right) => {
            if truthy(&eval(left, context)?) {
                eval(right, context)
            } else {
                Ok(Value::Bool(false))
            }
        }
        Expr::Or(left, right) => {
            let left = eval(left, context)?;
            if truthy(&left) {
                Ok(left)
            } else {
                eval(right, context)
            }
        }
        Expr::Cmp(op, left, right) => {
            let left = eval(left, context)?;
            let right = eval(right, context)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
    }
}

fn index_value(target: &Value, index: &Value) -> Value {
    match (target, index) {
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        (Value::Array(items), Value::Number(n)) => n
            .as_f64()
            .and_then(|f| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let index = if f >= 0.0 && f.fract() == 0.0 {
                    Some(f as usize)
                } else {
                    None
                };
                index.and_then(|i| items.get(i).cloned())
            })
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
                l.partial_cmp(&r)
            } else if let (Value::String(l), Value::String(r)) = (left, right) {
                Some(l.cmp(r))
            } else {
                None
            };
            let Some(ordering) = ordering else {
                return Err(Error::Expression(format!(
                    "cannot order {left} and {right}"
                )));
            };
            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Ge => ordering.is_ge(),
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            })
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        (l - r).abs() < f64::EPSILON
    } else {
        left == right
    }
}

/// Python-style truthiness
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Metadata {
        let mut ctx = Metadata::new();
        ctx.insert("count".to_string(), json!(3));
        ctx.insert("name".to_string(), json!("workstation"));
        ctx.insert("enabled".to_string(), json!(true));
        ctx.insert("items".to_string(), json!(["a", "b"]));
        ctx.insert(
            "step_extract-1".to_string(),
            json!({"data": [9.5, 12.0], "selector": ".price"}),
        );
        ctx.insert("targetPrice".to_string(), json!(10));
        ctx
    }

    #[test]
    fn numeric_comparisons() {
        let ctx = context();
        assert!(evaluate_condition("count > 2", &ctx).unwrap());
        assert!(evaluate_condition("count <= 3", &ctx).unwrap());
        assert!(!evaluate_condition("count == 4", &ctx).unwrap());
        assert!(evaluate_condition("count != 4", &ctx).unwrap());
        assert!(evaluate_condition("-1 < count", &ctx).unwrap());
    }

    #[test]
    fn boolean_operators() {
        let ctx = context();
        assert!(evaluate_condition("enabled and count > 0", &ctx).unwrap());
        assert!(evaluate_condition("not enabled or count > 0", &ctx).unwrap());
        assert!(!evaluate_condition("not enabled", &ctx).unwrap());
        assert!(evaluate_condition("enabled && count >= 3", &ctx).unwrap());
        assert!(evaluate_condition("!enabled || true", &ctx).unwrap());
    }

    #[test]
    fn len_whitelist() {
        let ctx = context();
        assert!(evaluate_condition("len(items) > 0", &ctx).unwrap());
        assert!(evaluate_condition("len(name) == 11", &ctx).unwrap());
        assert!(evaluate("len(count)", &ctx).is_err());
    }

    #[test]
    fn index_and_field_access_on_context() {
        let ctx = context();
        // The original's price-monitoring condition, step id hyphen included
        assert!(
            evaluate_condition("step_extract-1[\"data\"][0] < $targetPrice", &ctx).unwrap()
        );
        assert!(!evaluate_condition("step_extract-1.data[1] < targetPrice", &ctx).unwrap());
        assert_eq!(
            evaluate("step_extract-1.selector", &ctx).unwrap(),
            json!(".price")
        );
    }

    #[test]
    fn missing_keys_are_null_and_falsy() {
        let ctx = context();
        assert!(!evaluate_condition("missing", &ctx).unwrap());
        assert!(evaluate_condition("missing == null", &ctx).unwrap());
        assert_eq!(evaluate("items[9]", &ctx).unwrap(), Value::Null);
        assert_eq!(evaluate("step_extract-1.nope", &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn string_comparison_and_literals() {
        let ctx = context();
        assert!(evaluate_condition("name == 'workstation'", &ctx).unwrap());
        assert!(evaluate_condition("name >= \"alpha\"", &ctx).unwrap());
        assert!(evaluate_condition("'a' < 'b'", &ctx).unwrap());
    }

    #[test]
    fn empty_condition_is_true() {
        assert!(evaluate_condition("", &Metadata::new()).unwrap());
        assert!(evaluate_condition("   ", &Metadata::new()).unwrap());
    }

    #[test]
    fn rejects_general_code() {
        let ctx = context();
        assert!(evaluate("__import__('os')", &ctx).is_err());
        assert!(evaluate("count + 1", &ctx).is_err());
        assert!(evaluate("items[0](1)", &ctx).is_err());
    }

    #[test]
    fn cannot_order_mixed_types() {
        let ctx = context();
        assert!(evaluate("name < 3", &ctx).is_err());
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let ctx = context();
        assert!(evaluate("count > 2 count", &ctx).is_err());
    }
}
