//! Parser and evaluator for the query strings the filter compiler emits
//!
//! Supports `==`, `!=`, `<`, `<=`, `>`, `>=`, `begin`, `@` wildcards in
//! quoted strings, `null`, `true`/`false`, unquoted `yyyy-MM-dd` dates,
//! `AND`, `OR` and parentheses. String comparisons ignore case.

use std::cmp::Ordering;

use chrono::NaiveDate;
use dg_core::entity::Entity;
use serde_json::Value;

use crate::GridError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Begin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Date(NaiveDate),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { path: String, op: CmpOp, value: Literal },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    /// The empty query; matches everything
    All,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Op(CmpOp),
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, GridError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' => {
                let mut text = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        i += 1;
                    }
                    text.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(GridError::Query(format!("unterminated string in '{}'", input)));
                }
                i += 1;
                tokens.push(Token::Quoted(text));
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('=', _) => (CmpOp::Eq, 1),
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => return Err(GridError::Query(format!("unexpected '{}' in '{}'", c, input))),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], '(' | ')' | '"' | '=' | '!' | '<' | '>')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_ascii_uppercase().as_str() {
                    "AND" | "&" => Token::And,
                    "OR" | "|" => Token::Or,
                    "BEGIN" => Token::Op(CmpOp::Begin),
                    _ => Token::Ident(word),
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Predicate, GridError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, GridError> {
        let mut left = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_primary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Predicate, GridError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(GridError::Query(format!("expected ')', found {:?}", other))),
                }
            }
            Some(Token::Ident(path)) => {
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    other => {
                        return Err(GridError::Query(format!(
                            "expected comparison after '{}', found {:?}",
                            path, other
                        )))
                    }
                };
                let value = match self.next() {
                    Some(Token::Quoted(text)) => Literal::Str(text),
                    Some(Token::Ident(word)) => parse_bare_literal(&word)?,
                    other => {
                        return Err(GridError::Query(format!(
                            "expected value after '{}', found {:?}",
                            path, other
                        )))
                    }
                };
                Ok(Predicate::Compare { path, op, value })
            }
            other => Err(GridError::Query(format!("unexpected token {:?}", other))),
        }
    }
}

fn parse_bare_literal(word: &str) -> Result<Literal, GridError> {
    match word.to_ascii_lowercase().as_str() {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }
    if let Ok(n) = word.parse::<f64>() {
        return Ok(Literal::Num(n));
    }
    if let Ok(d) = NaiveDate::parse_from_str(word, "%Y-%m-%d") {
        return Ok(Literal::Date(d));
    }
    Err(GridError::Query(format!("cannot interpret value '{}'", word)))
}

/// Parse a query string; an empty string matches everything
pub fn parse(query: &str) -> Result<Predicate, GridError> {
    let tokens = tokenize(query)?;
    if tokens.is_empty() {
        return Ok(Predicate::All);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let predicate = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(GridError::Query(format!(
            "trailing input after position {} in '{}'",
            parser.pos, query
        )));
    }
    Ok(predicate)
}

impl Predicate {
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Predicate::All => true,
            Predicate::And(a, b) => a.matches(entity) && b.matches(entity),
            Predicate::Or(a, b) => a.matches(entity) || b.matches(entity),
            Predicate::Compare { path, op, value } => {
                let field = entity.field(path).unwrap_or(&Value::Null);
                compare(field, *op, value)
            }
        }
    }
}

fn compare(field: &Value, op: CmpOp, literal: &Literal) -> bool {
    match literal {
        Literal::Null => match op {
            CmpOp::Eq => field.is_null(),
            CmpOp::Ne => !field.is_null(),
            _ => false,
        },
        Literal::Str(pattern) => {
            let Some(text) = value_as_text(field) else {
                return op == CmpOp::Ne;
            };
            let text = text.to_lowercase();
            let pattern = pattern.to_lowercase();
            match op {
                CmpOp::Eq => wildcard_match(&text, &pattern),
                CmpOp::Ne => !wildcard_match(&text, &pattern),
                CmpOp::Begin => text.starts_with(&pattern),
                _ => ordering_holds(text.cmp(&pattern), op),
            }
        }
        Literal::Num(n) => match value_as_number(field) {
            Some(v) => v.partial_cmp(n).map(|o| ordering_holds(o, op)).unwrap_or(false),
            None => op == CmpOp::Ne,
        },
        Literal::Date(d) => match value_as_date(field) {
            Some(v) => ordering_holds(v.cmp(d), op),
            None => op == CmpOp::Ne,
        },
        Literal::Bool(b) => {
            let v = match field {
                Value::Bool(v) => Some(*v),
                Value::Number(n) => n.as_f64().map(|f| f != 0.0),
                _ => None,
            };
            match (v, op) {
                (Some(v), CmpOp::Eq) => v == *b,
                (Some(v), CmpOp::Ne) => v != *b,
                (None, CmpOp::Ne) => true,
                _ => false,
            }
        }
    }
}

fn ordering_holds(ordering: Ordering, op: CmpOp) -> bool {
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Begin => ordering == Ordering::Equal,
    }
}

/// `@` matches any run of characters
fn wildcard_match(text: &str, pattern: &str) -> bool {
    if !pattern.contains('@') {
        return text == pattern;
    }

    let parts: Vec<&str> = pattern.split('@').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return text.is_empty(),
    };
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };
    let last_index = rest.len().saturating_sub(1);
    for (i, part) in rest.iter().enumerate() {
        if i == last_index {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    true
}

pub(crate) fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub(crate) fn value_as_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    let head = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        Entity::new(0, value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_parse_compiled_filter() {
        let predicate = parse(r#"(age > 10 AND age < 20) AND fullName begin "An""#).unwrap();
        assert!(matches!(predicate, Predicate::And(_, _)));
        assert_eq!(parse("").unwrap(), Predicate::All);
        assert!(parse("age >").is_err());
        assert!(parse(r#"name == "open"#).is_err());
    }

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("annabel", "@nab@"));
        assert!(wildcard_match("annabel", "@bel"));
        assert!(!wildcard_match("annabel", "@ann"));
        assert!(wildcard_match("annabel", "ann@"));
        assert!(wildcard_match("x", "@"));
    }

    #[test]
    fn test_evaluation() {
        let e = entity(json!({
            "fullName": "Annabel Lee",
            "age": 17,
            "active": true,
            "born": "2006-05-01",
            "employer": {"name": "Acme"}
        }));

        assert!(parse(r#"fullName == "@bel@""#).unwrap().matches(&e));
        assert!(parse(r#"fullName begin "ann""#).unwrap().matches(&e));
        assert!(parse("age >= 10 AND age <= 20").unwrap().matches(&e));
        assert!(parse("active == true").unwrap().matches(&e));
        assert!(parse("born > 2006-01-01 AND born < 2006-12-31").unwrap().matches(&e));
        assert!(parse("missing == null").unwrap().matches(&e));
        assert!(parse(r#"employer.name == "acme""#).unwrap().matches(&e));
        assert!(!parse("age > 18 OR active == false").unwrap().matches(&e));
    }
}
