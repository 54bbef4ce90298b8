use serde_json::{Number, Value};

use super::fetcher::FetchError;
use crate::database::models::ExpectedType;

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Converts an extracted value into `expected`, or explains why it cannot
pub fn coerce(value: Value, expected: ExpectedType) -> Result<Value, FetchError> {
    let fail = |value: &Value| FetchError::Coercion {
        expected,
        found: kind(value).to_string(),
    };

    match (expected, value) {
        (ExpectedType::Number, Value::Number(n)) => Ok(Value::Number(n)),
        (ExpectedType::Number, Value::String(s)) => match parse_number(&s) {
            Some(n) => Ok(Value::Number(n)),
            None => Err(FetchError::Coercion {
                expected,
                found: format!("non-numeric string '{}'", s.chars().take(40).collect::<String>()),
            }),
        },

        (ExpectedType::String, Value::String(s)) => Ok(Value::String(s)),
        (ExpectedType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ExpectedType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ExpectedType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ExpectedType::Boolean, Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
        (ExpectedType::Boolean, Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
        (ExpectedType::Boolean, Value::Number(n)) if n.as_f64() == Some(1.0) => Ok(Value::Bool(true)),
        (ExpectedType::Boolean, Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(Value::Bool(false)),

        (ExpectedType::Object, v @ Value::Object(_)) => Ok(v),
        (ExpectedType::Array, v @ Value::Array(_)) => Ok(v),

        (_, other) => Err(fail(&other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_from_numeric_strings() {
        assert_eq!(coerce(json!(" 42 "), ExpectedType::Number).unwrap(), json!(42));
        assert_eq!(coerce(json!("99.5"), ExpectedType::Number).unwrap(), json!(99.5));
        assert_eq!(coerce(json!(7), ExpectedType::Number).unwrap(), json!(7));
        assert!(coerce(json!("n/a"), ExpectedType::Number).is_err());
        assert!(coerce(json!(true), ExpectedType::Number).is_err());
    }

    #[test]
    fn strings_from_scalars() {
        assert_eq!(coerce(json!(3.5), ExpectedType::String).unwrap(), json!("3.5"));
        assert_eq!(coerce(json!(false), ExpectedType::String).unwrap(), json!("false"));
        assert!(coerce(json!({"a": 1}), ExpectedType::String).is_err());
    }

    #[test]
    fn booleans_from_text_and_bits() {
        assert_eq!(coerce(json!("TRUE"), ExpectedType::Boolean).unwrap(), json!(true));
        assert_eq!(coerce(json!(0), ExpectedType::Boolean).unwrap(), json!(false));
        assert!(coerce(json!(2), ExpectedType::Boolean).is_err());
        assert!(coerce(json!("yes"), ExpectedType::Boolean).is_err());
    }

    #[test]
    fn containers_require_their_kind() {
        assert!(coerce(json!([1]), ExpectedType::Array).is_ok());
        assert!(coerce(json!({}), ExpectedType::Object).is_ok());
        assert!(coerce(json!([1]), ExpectedType::Object).is_err());
    }

    #[test]
    fn null_never_coerces() {
        for expected in [
            ExpectedType::String,
            ExpectedType::Number,
            ExpectedType::Boolean,
            ExpectedType::Object,
            ExpectedType::Array,
        ] {
            match coerce(Value::Null, expected) {
                Err(FetchError::Coercion { found, .. }) => assert_eq!(found, "null"),
                other => panic!("expected coercion failure, got {:?}", other),
            }
        }
    }
}
