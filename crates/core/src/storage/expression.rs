//! A small evaluator for the expression subset the in-memory store accepts.
//!
//! Supported: comparisons (`=`, `<>`, `<`, `<=`, `>`, `>=`),
//! `begins_with`, `attribute_exists`, `attribute_not_exists`, `AND`, `OR`,
//! `NOT` and parentheses in conditions; `SET path = operand` and
//! `REMOVE path` clauses in updates. Paths are top-level attribute names only.

use std::cmp::Ordering;

use crate::codec::{AttributeMap, TaggedValue};
use crate::value::Number;

use super::{ExpressionNames, ExpressionValues, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    LParen,
    RParen,
    Comma,
    Op(CmpOp),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Path(String),
    Literal(TaggedValue),
}

/// A parsed condition with all placeholders resolved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Compare(CmpOp, Operand, Operand),
    BeginsWith(Operand, Operand),
    Exists(String),
    NotExists(String),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

/// A single update action.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UpdateAction {
    Set(String, Operand),
    Remove(String),
}

/// Placeholder tables an expression is resolved against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Placeholders<'a> {
    pub names: Option<&'a ExpressionNames>,
    pub values: Option<&'a ExpressionValues>,
}

impl Placeholders<'_> {
    fn resolve_path(&self, word: &str) -> StoreResult<String> {
        let name = if word.starts_with('#') {
            self.names
                .and_then(|names| names.get(word))
                .cloned()
                .ok_or_else(|| {
                    StoreError::validation(format!(
                        "An expression attribute name used in the document path is not defined; attribute name: {word}"
                    ))
                })?
        } else if word.starts_with(':') {
            return Err(StoreError::validation(format!(
                "A value placeholder cannot be used as a path: {word}"
            )));
        } else {
            word.to_string()
        };

        if name.contains(['.', '[']) && !word.starts_with('#') {
            return Err(StoreError::validation(format!(
                "Nested attribute paths are not supported: {name}"
            )));
        }
        Ok(name)
    }

    fn resolve_operand(&self, word: &str) -> StoreResult<Operand> {
        if word.starts_with(':') {
            self.values
                .and_then(|values| values.get(word))
                .cloned()
                .map(Operand::Literal)
                .ok_or_else(|| {
                    StoreError::validation(format!(
                        "An expression attribute value used in expression is not defined; attribute value: {word}"
                    ))
                })
        } else {
            self.resolve_path(word).map(Operand::Path)
        }
    }
}

fn tokenize(expression: &str) -> StoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Op(CmpOp::Eq));
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::Op(CmpOp::Ne));
                    }
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::Op(CmpOp::Le));
                    }
                    _ => tokens.push(Token::Op(CmpOp::Lt)),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Ge));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(StoreError::validation(format!(
                    "Invalid expression: unexpected character {other:?}"
                )))
            }
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '#' | ':' | '.' | '-' | '[' | ']')
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    placeholders: Placeholders<'a>,
}

impl<'a> Parser<'a> {
    fn new(expression: &str, placeholders: Placeholders<'a>) -> StoreResult<Self> {
        Ok(Self {
            tokens: tokenize(expression)?,
            pos: 0,
            placeholders,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: Token) -> StoreResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(StoreError::validation(format!(
                "Invalid expression: expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn word(&mut self) -> StoreResult<String> {
        match self.next() {
            Some(Token::Word(word)) => Ok(word),
            other => Err(StoreError::validation(format!(
                "Invalid expression: expected an operand, found {other:?}"
            ))),
        }
    }

    fn finish(&self) -> StoreResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(StoreError::validation(format!(
                "Invalid expression: unexpected trailing token {token:?}"
            ))),
        }
    }

    fn parse_or(&mut self) -> StoreResult<Condition> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("OR") {
            self.next();
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> StoreResult<Condition> {
        let mut left = self.parse_not()?;
        while self.peek_keyword("AND") {
            self.next();
            let right = self.parse_not()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> StoreResult<Condition> {
        if self.peek_keyword("NOT") {
            self.next();
            return Ok(Condition::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> StoreResult<Condition> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        let word = self.word()?;
        if self.peek() == Some(&Token::LParen) {
            return self.parse_function(&word);
        }

        let left = self.placeholders.resolve_operand(&word)?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            other => {
                return Err(StoreError::validation(format!(
                    "Invalid expression: expected a comparator, found {other:?}"
                )))
            }
        };
        let right_word = self.word()?;
        let right = self.placeholders.resolve_operand(&right_word)?;
        Ok(Condition::Compare(op, left, right))
    }

    fn parse_function(&mut self, name: &str) -> StoreResult<Condition> {
        self.expect(Token::LParen)?;
        let condition = match name.to_ascii_lowercase().as_str() {
            "attribute_exists" => {
                let path = self.word()?;
                Condition::Exists(self.placeholders.resolve_path(&path)?)
            }
            "attribute_not_exists" => {
                let path = self.word()?;
                Condition::NotExists(self.placeholders.resolve_path(&path)?)
            }
            "begins_with" => {
                let subject = self.word()?;
                self.expect(Token::Comma)?;
                let prefix = self.word()?;
                Condition::BeginsWith(
                    self.placeholders.resolve_operand(&subject)?,
                    self.placeholders.resolve_operand(&prefix)?,
                )
            }
            other => {
                return Err(StoreError::validation(format!(
                    "Invalid expression: unsupported function {other}"
                )))
            }
        };
        self.expect(Token::RParen)?;
        Ok(condition)
    }

    fn parse_update(&mut self) -> StoreResult<Vec<UpdateAction>> {
        let mut actions = Vec::new();

        while let Some(token) = self.next() {
            let clause = match token {
                Token::Word(clause) => clause,
                other => {
                    return Err(StoreError::validation(format!(
                        "Invalid UpdateExpression: expected a clause, found {other:?}"
                    )))
                }
            };

            match clause.to_ascii_uppercase().as_str() {
                "SET" => loop {
                    let path = self.word()?;
                    let path = self.placeholders.resolve_path(&path)?;
                    self.expect(Token::Op(CmpOp::Eq))?;
                    let operand = self.word()?;
                    let operand = self.placeholders.resolve_operand(&operand)?;
                    actions.push(UpdateAction::Set(path, operand));
                    if self.peek() != Some(&Token::Comma) {
                        break;
                    }
                    self.next();
                },
                "REMOVE" => loop {
                    let path = self.word()?;
                    actions.push(UpdateAction::Remove(self.placeholders.resolve_path(&path)?));
                    if self.peek() != Some(&Token::Comma) {
                        break;
                    }
                    self.next();
                },
                other => {
                    return Err(StoreError::validation(format!(
                        "Invalid UpdateExpression: unsupported clause {other}"
                    )))
                }
            }
        }

        Ok(actions)
    }
}

/// Parse a condition or key-condition expression.
pub(crate) fn parse_condition(
    expression: &str,
    placeholders: Placeholders<'_>,
) -> StoreResult<Condition> {
    if expression.trim().is_empty() {
        return Err(StoreError::validation(
            "Invalid ConditionExpression: The expression can not be empty",
        ));
    }
    let mut parser = Parser::new(expression, placeholders)?;
    let condition = parser.parse_or()?;
    parser.finish()?;
    Ok(condition)
}

/// Parse an update expression into its actions.
pub(crate) fn parse_update(
    expression: &str,
    placeholders: Placeholders<'_>,
) -> StoreResult<Vec<UpdateAction>> {
    if expression.trim().is_empty() {
        return Err(StoreError::validation(
            "Invalid UpdateExpression: The expression can not be empty",
        ));
    }
    let mut parser = Parser::new(expression, placeholders)?;
    parser.parse_update()
}

impl Operand {
    pub(crate) fn resolve(&self, item: &AttributeMap) -> Option<TaggedValue> {
        match self {
            Operand::Path(name) => item.get(name).cloned(),
            Operand::Literal(value) => Some(value.clone()),
        }
    }
}

impl Condition {
    /// Evaluate against an item. A missing item is an empty map.
    pub(crate) fn eval(&self, item: &AttributeMap) -> bool {
        match self {
            Condition::Compare(op, left, right) => {
                let (Some(left), Some(right)) = (left.resolve(item), right.resolve(item)) else {
                    return *op == CmpOp::Ne;
                };
                let ordering = compare(&left, &right);
                match op {
                    CmpOp::Eq => ordering == Some(Ordering::Equal),
                    CmpOp::Ne => ordering != Some(Ordering::Equal),
                    CmpOp::Lt => ordering == Some(Ordering::Less),
                    CmpOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    CmpOp::Gt => ordering == Some(Ordering::Greater),
                    CmpOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                }
            }
            Condition::BeginsWith(subject, prefix) => {
                match (subject.resolve(item), prefix.resolve(item)) {
                    (Some(TaggedValue::S(s)), Some(TaggedValue::S(p))) => s.starts_with(&p),
                    (Some(TaggedValue::B(b)), Some(TaggedValue::B(p))) => b.starts_with(&p),
                    _ => false,
                }
            }
            Condition::Exists(name) => item.contains_key(name),
            Condition::NotExists(name) => !item.contains_key(name),
            Condition::And(left, right) => left.eval(item) && right.eval(item),
            Condition::Or(left, right) => left.eval(item) || right.eval(item),
            Condition::Not(inner) => !inner.eval(item),
        }
    }
}

/// Order two tagged values of the same scalar type.
pub(crate) fn compare(left: &TaggedValue, right: &TaggedValue) -> Option<Ordering> {
    match (left, right) {
        (TaggedValue::S(l), TaggedValue::S(r)) => Some(l.cmp(r)),
        (TaggedValue::B(l), TaggedValue::B(r)) => Some(l.cmp(r)),
        (TaggedValue::N(l), TaggedValue::N(r)) => {
            let l = Number::parse(l).ok()?;
            let r = Number::parse(r).ok()?;
            match (l, r) {
                (Number::Int(l), Number::Int(r)) => Some(l.cmp(&r)),
                (l, r) => l.as_f64().partial_cmp(&r.as_f64()),
            }
        }
        (l, r) if l == r => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(&str, &str)]) -> ExpressionNames {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn values(pairs: &[(&str, TaggedValue)]) -> ExpressionValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn item() -> AttributeMap {
        AttributeMap::from([
            ("pkey".to_string(), TaggedValue::S("user#1".into())),
            ("skey".to_string(), TaggedValue::S("order#0007".into())),
            ("count".to_string(), TaggedValue::N("5".into())),
        ])
    }

    #[test]
    fn test_key_condition_with_prefix() {
        let names = names(&[("#pkey", "pkey"), ("#skey", "skey")]);
        let values = values(&[
            (":pkey", TaggedValue::S("user#1".into())),
            (":skeyprefix", TaggedValue::S("order#".into())),
        ]);
        let condition = parse_condition(
            "#pkey = :pkey AND begins_with(#skey, :skeyprefix)",
            Placeholders {
                names: Some(&names),
                values: Some(&values),
            },
        )
        .unwrap();

        assert!(condition.eval(&item()));
    }

    #[test]
    fn test_numeric_comparison_and_existence() {
        let values = values(&[(":min", TaggedValue::N("4.5".into()))]);
        let condition = parse_condition(
            "count >= :min AND attribute_exists(pkey) AND NOT attribute_exists(gone)",
            Placeholders {
                names: None,
                values: Some(&values),
            },
        )
        .unwrap();

        assert!(condition.eval(&item()));
        assert!(!condition.eval(&AttributeMap::new()));
    }

    #[test]
    fn test_undefined_placeholder_is_validation_error() {
        let err = parse_condition(
            "#missing = :v",
            Placeholders {
                names: None,
                values: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ValidationException"));
    }

    #[test]
    fn test_empty_condition_rejected() {
        let placeholders = Placeholders {
            names: None,
            values: None,
        };
        assert!(parse_condition("  ", placeholders).is_err());
    }

    #[test]
    fn test_parse_update_set_and_remove() {
        let names = names(&[("#x", "x"), ("#y", "y"), ("#z", "z")]);
        let values = values(&[(":x", TaggedValue::N("1".into())), (":y", TaggedValue::S("z".into()))]);
        let actions = parse_update(
            "SET #x = :x, #y = :y REMOVE #z",
            Placeholders {
                names: Some(&names),
                values: Some(&values),
            },
        )
        .unwrap();

        assert_eq!(
            actions,
            vec![
                UpdateAction::Set("x".into(), Operand::Literal(TaggedValue::N("1".into()))),
                UpdateAction::Set("y".into(), Operand::Literal(TaggedValue::S("z".into()))),
                UpdateAction::Remove("z".into()),
            ]
        );
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(
            compare(&TaggedValue::N("2".into()), &TaggedValue::N("10".into())),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare(&TaggedValue::N("1".into()), &TaggedValue::N("1.0".into())),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare(&TaggedValue::S("a".into()), &TaggedValue::N("1".into())),
            None
        );
    }
}
