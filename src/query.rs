//! Attribute conditions: a restricted SQL `WHERE` fragment parsed into a
//! list of comparisons and evaluated by linear scan.
//!
//! Accepted forms:
//!
//! ```text
//! lat < 2
//! WHERE label = 'hello world' AND lat >= 40
//! SELECT * FROM items WHERE lng > ?
//! ```
//!
//! Comparisons join with `AND` only. `OR`, `!=`, `<>`, `LIKE`, `IN` and any
//! other operator fail with [`MapError::UnsupportedOperator`].
//!
//! A single `?` parameter, when supplied, replaces the literal of *every*
//! condition, not just the placeholder position.
//!
//! ```rust
//! use mapplz::query::{filter, parse};
//! use mapplz::GeoItem;
//! use serde_json::json;
//!
//! let items = vec![GeoItem::point(1.0, 0.0).unwrap(), GeoItem::point(3.0, 0.0).unwrap()];
//! let conditions = parse("lat < ?", true).unwrap();
//! let found = filter(&items, &conditions, Some(&json!(2))).unwrap();
//! assert_eq!(found.len(), 1);
//! ```

use crate::error::{MapError, Result};
use crate::item::GeoItem;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Result<Self> {
        match symbol {
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "=" => Ok(Operator::Eq),
            other => Err(MapError::UnsupportedOperator(other.to_string())),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Eq => ordering == Ordering::Equal,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    /// Bound at evaluation time from the query parameter.
    Placeholder,
}

/// One `field operator value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Operand,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Operand::Value(value.into()),
        }
    }

    /// Evaluates against one record. A missing field fails the condition.
    pub fn matches(&self, item: &GeoItem, param: Option<&Value>) -> Result<bool> {
        let target = match (param, &self.value) {
            (Some(param), _) => param,
            (None, Operand::Value(value)) => value,
            (None, Operand::Placeholder) => {
                return Err(MapError::InvalidInput(format!(
                    "condition on '{}' needs a parameter",
                    self.field
                )));
            }
        };

        let Some(actual) = item.field(&self.field) else {
            return Ok(false);
        };
        Ok(compare(&actual, target).is_some_and(|ordering| self.operator.accepts(ordering)))
    }
}

/// Native ordering between two JSON scalars of the same type. Mixed types
/// are incomparable.
fn compare(actual: &Value, target: &Value) -> Option<Ordering> {
    match (actual, target) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Literal(Value),
    Placeholder,
    Symbol(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => f.write_str(word),
            Token::Literal(value) => write!(f, "{}", value),
            Token::Placeholder => f.write_str("?"),
            Token::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some((_, next)) = chars.next() {
                if next == c {
                    // Doubled quote escapes itself.
                    if chars.peek().is_some_and(|&(_, after)| after == c) {
                        chars.next();
                        text.push(c);
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    text.push(next);
                }
            }
            if !closed {
                return Err(MapError::InvalidInput(format!(
                    "unterminated string at offset {}",
                    start
                )));
            }
            tokens.push(Token::Literal(Value::String(text)));
        } else if c == '?' {
            chars.next();
            tokens.push(Token::Placeholder);
        } else if c.is_ascii_digit() || c == '-' || c == '.' {
            let mut text = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if next.is_ascii_alphanumeric() || matches!(next, '.' | '-' | '+') {
                    text.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let number: f64 = text.parse().map_err(|_| {
                MapError::InvalidInput(format!("invalid number '{}'", text))
            })?;
            let value = serde_json::Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| MapError::InvalidInput(format!("invalid number '{}'", text)))?;
            tokens.push(Token::Literal(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut text = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if next.is_alphanumeric() || matches!(next, '_' | '.') {
                    text.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Word(text));
        } else if matches!(c, '<' | '>' | '=' | '!') {
            let mut text = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if matches!(next, '<' | '>' | '=' | '!') {
                    text.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Symbol(text));
        } else {
            chars.next();
            tokens.push(Token::Symbol(c.to_string()));
        }
    }

    Ok(tokens)
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(word) if word.eq_ignore_ascii_case(keyword))
}

/// Words that may stand in operator position in SQL but are not supported.
const WORD_OPERATORS: [&str; 6] = ["like", "ilike", "in", "is", "between", "not"];

/// Parses an expression into conditions.
///
/// With `has_param` every literal is replaced by the query parameter; a `?`
/// without `has_param` is an error.
pub fn parse(expression: &str, has_param: bool) -> Result<Vec<Condition>> {
    let tokens = tokenize(expression)?;
    let mut rest = tokens.as_slice();

    if rest.first().is_some_and(|t| is_keyword(t, "select")) {
        match rest.iter().position(|t| is_keyword(t, "where")) {
            Some(idx) => rest = &rest[idx..],
            None => return Ok(Vec::new()),
        }
    }
    if rest.first().is_some_and(|t| is_keyword(t, "where")) {
        rest = &rest[1..];
    }

    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let (conditions, rest) = parse_conjunction(rest, has_param, 0)?;
    match rest.first() {
        None => Ok(conditions),
        Some(token) => Err(MapError::InvalidInput(format!(
            "unexpected '{}' after conditions",
            token
        ))),
    }
}

/// Deepest parenthesis nesting accepted around predicates.
const MAX_NESTING: usize = 32;

fn is_symbol(token: &Token, symbol: &str) -> bool {
    matches!(token, Token::Symbol(s) if s == symbol)
}

/// Terms joined by `AND`, stopping at the end of input or a closing
/// parenthesis. Groups flatten into the list since only `AND` is allowed.
fn parse_conjunction(
    tokens: &[Token],
    has_param: bool,
    depth: usize,
) -> Result<(Vec<Condition>, &[Token])> {
    let mut conditions = Vec::new();
    let mut rest = tokens;

    loop {
        let (term, remaining) = parse_term(rest, has_param, depth)?;
        conditions.extend(term);
        rest = remaining;

        match rest.split_first() {
            None => break,
            Some((token, _)) if is_symbol(token, ")") => break,
            Some((token, tail)) if is_keyword(token, "and") => {
                if tail.is_empty() {
                    return Err(MapError::InvalidInput(
                        "expression ends with AND".to_string(),
                    ));
                }
                rest = tail;
            }
            Some((token, _)) if is_keyword(token, "or") => {
                return Err(MapError::UnsupportedOperator("OR".to_string()));
            }
            Some((token, _)) => {
                return Err(MapError::InvalidInput(format!(
                    "expected AND, found '{}'",
                    token
                )));
            }
        }
    }

    Ok((conditions, rest))
}

/// A single comparison or a parenthesized group.
fn parse_term(
    tokens: &[Token],
    has_param: bool,
    depth: usize,
) -> Result<(Vec<Condition>, &[Token])> {
    let Some((_, inner)) = tokens.split_first().filter(|(t, _)| is_symbol(t, "(")) else {
        let (condition, rest) = parse_condition(tokens, has_param)?;
        return Ok((vec![condition], rest));
    };

    if depth >= MAX_NESTING {
        return Err(MapError::InvalidInput(format!(
            "parentheses nested deeper than {}",
            MAX_NESTING
        )));
    }
    if inner.first().is_some_and(|t| is_symbol(t, ")")) {
        return Err(MapError::InvalidInput("empty parentheses".to_string()));
    }

    let (conditions, rest) = parse_conjunction(inner, has_param, depth + 1)?;
    match rest.split_first() {
        Some((close, tail)) if is_symbol(close, ")") => Ok((conditions, tail)),
        _ => Err(MapError::InvalidInput("unbalanced '('".to_string())),
    }
}

fn parse_condition(tokens: &[Token], has_param: bool) -> Result<(Condition, &[Token])> {
    let (field, operator, operand, rest) = match tokens {
        [Token::Word(field), operator, operand, rest @ ..] => (field, operator, operand, rest),
        [Token::Word(field), Token::Word(word), ..]
            if WORD_OPERATORS.contains(&word.to_ascii_lowercase().as_str()) =>
        {
            return Err(MapError::UnsupportedOperator(format!("{} {}", field, word)));
        }
        _ => {
            let remaining: Vec<String> = tokens.iter().map(Token::to_string).collect();
            return Err(MapError::InvalidInput(format!(
                "expected 'field operator value', found '{}'",
                remaining.join(" ")
            )));
        }
    };

    let operator = match operator {
        Token::Symbol(symbol) => Operator::from_symbol(symbol)?,
        other => return Err(MapError::UnsupportedOperator(other.to_string())),
    };

    let value = match operand {
        _ if has_param => Operand::Placeholder,
        Token::Literal(value) => Operand::Value(value.clone()),
        Token::Word(word) if word.eq_ignore_ascii_case("true") => Operand::Value(Value::Bool(true)),
        Token::Word(word) if word.eq_ignore_ascii_case("false") => {
            Operand::Value(Value::Bool(false))
        }
        Token::Word(word) if word.eq_ignore_ascii_case("null") => Operand::Value(Value::Null),
        Token::Placeholder => {
            return Err(MapError::InvalidInput(
                "'?' used without a parameter".to_string(),
            ));
        }
        other => {
            return Err(MapError::InvalidInput(format!(
                "expected a literal after '{} {}', found '{}'",
                field, operator, other
            )));
        }
    };

    if matches!(operand, Token::Symbol(_)) {
        return Err(MapError::InvalidInput(format!(
            "expected a literal after '{} {}', found '{}'",
            field, operator, operand
        )));
    }

    Ok((
        Condition {
            field: field.clone(),
            operator,
            value,
        },
        rest,
    ))
}

/// True if `item` passes every condition.
pub fn matches(item: &GeoItem, conditions: &[Condition], param: Option<&Value>) -> Result<bool> {
    for condition in conditions {
        if !condition.matches(item, param)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Records passing every condition, in input order.
pub fn filter<'a, I>(
    items: I,
    conditions: &[Condition],
    param: Option<&Value>,
) -> Result<Vec<&'a GeoItem>>
where
    I: IntoIterator<Item = &'a GeoItem>,
{
    if param.is_none()
        && let Some(unbound) = conditions
            .iter()
            .find(|c| matches!(c.value, Operand::Placeholder))
    {
        return Err(MapError::InvalidInput(format!(
            "condition on '{}' needs a parameter",
            unbound.field
        )));
    }

    let mut found = Vec::new();
    for item in items {
        if matches(item, conditions, param)? {
            found.push(item);
        }
    }
    Ok(found)
}

/// Parses and evaluates in one step. No expression selects everything.
pub fn select<'a, I>(
    items: I,
    expression: Option<&str>,
    param: Option<&Value>,
) -> Result<Vec<&'a GeoItem>>
where
    I: IntoIterator<Item = &'a GeoItem>,
{
    match expression {
        Some(expression) => {
            let conditions = parse(expression, param.is_some())?;
            filter(items, &conditions, param)
        }
        None => Ok(items.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<GeoItem> {
        let mut a = GeoItem::point(1.0, 10.0).unwrap();
        a.set("label", "alpha").unwrap();
        a.set("visible", true).unwrap();
        let mut b = GeoItem::point(3.0, 20.0).unwrap();
        b.set("label", "beta").unwrap();
        vec![a, b]
    }

    fn labels(found: &[&GeoItem]) -> Vec<String> {
        found
            .iter()
            .map(|item| item.get("label").and_then(Value::as_str).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn test_parse_single() {
        let conditions = parse("lat < 2", false).unwrap();
        assert_eq!(conditions, vec![Condition::new("lat", Operator::Lt, 2.0)]);
    }

    #[test]
    fn test_parse_prefixes() {
        let plain = parse("lat >= 1 AND label = 'x'", false).unwrap();
        assert_eq!(parse("WHERE lat >= 1 and label = 'x'", false).unwrap(), plain);
        assert_eq!(
            parse("select * from bogus_table where lat >= 1 AND label = \"x\"", false).unwrap(),
            plain
        );
        assert!(parse("SELECT * FROM items", false).unwrap().is_empty());
    }

    #[test]
    fn test_grouping_parentheses() {
        let plain = parse("lat < 2 AND lng > 1", false).unwrap();
        assert_eq!(parse("(lat < 2)", false).unwrap(), plain[..1]);
        assert_eq!(parse("(lat < 2) AND (lng > 1)", false).unwrap(), plain);
        assert_eq!(parse("WHERE ((lat < 2 AND lng > 1))", false).unwrap(), plain);
        assert_eq!(parse("lat < 2 AND (lng > 1)", false).unwrap(), plain);
        assert!(matches!(
            parse("(lat < 2) OR (lng > 1)", false),
            Err(MapError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        for expression in ["(lat < 2", "lat < 2)", "((lat < 2)", "()", "(lat < 2) ("] {
            assert!(
                matches!(parse(expression, false), Err(MapError::InvalidInput(_))),
                "expected invalid: {}",
                expression
            );
        }
        let deep = format!("{}lat < 2{}", "(".repeat(64), ")".repeat(64));
        assert!(matches!(parse(&deep, false), Err(MapError::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_operators() {
        for expression in [
            "lat != 2",
            "lat <> 2",
            "lat == 2",
            "label LIKE 'a%'",
            "lat < 2 OR lat > 3",
            "lat IN (1, 2)",
        ] {
            assert!(
                matches!(parse(expression, false), Err(MapError::UnsupportedOperator(_))),
                "expected unsupported: {}",
                expression
            );
        }
    }

    #[test]
    fn test_malformed_expressions() {
        for expression in ["lat <", "< 2", "lat < 2 AND", "lat < 2 lng > 1", "label = 'open"] {
            assert!(
                matches!(parse(expression, false), Err(MapError::InvalidInput(_))),
                "expected invalid: {}",
                expression
            );
        }
    }

    #[test]
    fn test_filter_by_lat() {
        let items = records();
        let found = filter(&items, &parse("lat < 2", false).unwrap(), None).unwrap();
        assert_eq!(labels(&found), vec!["alpha"]);

        let found = filter(&items, &parse("lat > 3", false).unwrap(), None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_param_overrides_every_literal() {
        let items = records();
        let conditions = parse("lat < ?", true).unwrap();
        let found = filter(&items, &conditions, Some(&json!(2))).unwrap();
        assert_eq!(labels(&found), vec!["alpha"]);

        // Both comparisons see the parameter, not their written literals.
        let conditions = parse("lat > 0 AND lng < 100", true).unwrap();
        let found = filter(&items, &conditions, Some(&json!(15))).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_placeholder_without_param() {
        assert!(matches!(parse("lat < ?", false), Err(MapError::InvalidInput(_))));

        let conditions = parse("lat < ?", true).unwrap();
        let items = records();
        assert!(matches!(
            filter(&items, &conditions, None),
            Err(MapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_string_and_bool_comparison() {
        let items = records();
        let found = filter(&items, &parse("label = 'beta'", false).unwrap(), None).unwrap();
        assert_eq!(labels(&found), vec!["beta"]);

        let found = filter(&items, &parse("label < 'b'", false).unwrap(), None).unwrap();
        assert_eq!(labels(&found), vec!["alpha"]);

        let found = filter(&items, &parse("visible = true", false).unwrap(), None).unwrap();
        assert_eq!(labels(&found), vec!["alpha"]);
    }

    #[test]
    fn test_missing_field_fails() {
        let items = records();
        let found = filter(&items, &parse("population > 0", false).unwrap(), None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_mixed_types_never_match() {
        let items = records();
        let found = filter(&items, &parse("label = 3", false).unwrap(), None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_filter_is_stable() {
        let items: Vec<GeoItem> = (0..5)
            .map(|i| GeoItem::point(f64::from(i), 0.0).unwrap())
            .collect();
        let found = filter(&items, &parse("lat >= 1 AND lat <= 3", false).unwrap(), None).unwrap();
        let lats: Vec<f64> = found.iter().map(|i| i.lat().unwrap()).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_select_without_expression() {
        let items = records();
        assert_eq!(select(&items, None, None).unwrap().len(), 2);
        assert_eq!(select(&items, Some("lat < ?"), Some(&json!(2))).unwrap().len(), 1);
    }
}
