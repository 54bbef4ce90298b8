//! Small JSONPath subset used to pick a value out of an upstream response.
//!
//! Supported: `$`, `.name`, `['name']`, `[n]`, `[-n]`, `[*]`, `.*` and a
//! trailing `.length()`. Once a wildcard has been applied the result is an
//! array of every match.

use serde_json::Value;

use super::fetcher::FetchError;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
    Length,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

fn invalid(path: &str, problem: &str) -> FetchError {
    FetchError::InvalidRequest(format!("Invalid JSONPath '{}': {}", path, problem))
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<JsonPath, FetchError> {
        let source = path.trim();
        let mut rest = source
            .strip_prefix('$')
            .ok_or_else(|| invalid(source, "must start with '$'"))?;
        let mut segments = Vec::new();

        while !rest.is_empty() {
            if segments.last() == Some(&Segment::Length) {
                return Err(invalid(source, "length() must be the last segment"));
            }

            if let Some(after) = rest.strip_prefix(".length()") {
                segments.push(Segment::Length);
                rest = after;
            } else if let Some(after) = rest.strip_prefix(".*") {
                segments.push(Segment::Wildcard);
                rest = after;
            } else if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                let name = &after[..end];
                if name.is_empty() {
                    return Err(invalid(source, "empty member name"));
                }
                segments.push(Segment::Key(name.to_string()));
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']').ok_or_else(|| invalid(source, "unclosed '['"))?;
                let inner = after[..end].trim();
                segments.push(Self::parse_bracket(source, inner)?);
                rest = &after[end + 1..];
            } else {
                return Err(invalid(source, "expected '.' or '['"));
            }
        }

        Ok(JsonPath { source: source.to_string(), segments })
    }

    fn parse_bracket(source: &str, inner: &str) -> Result<Segment, FetchError> {
        if inner == "*" {
            return Ok(Segment::Wildcard);
        }
        for quote in ['\'', '"'] {
            if let Some(name) = inner.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
                return Ok(Segment::Key(name.to_string()));
            }
        }
        inner
            .parse::<i64>()
            .map(Segment::Index)
            .map_err(|_| invalid(source, "bracket must hold an index, '*' or a quoted name"))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, root: &Value) -> Result<Value, FetchError> {
        let not_found = || FetchError::PathNotFound(self.source.clone());
        let mut current: Vec<&Value> = vec![root];
        let mut multi = false;

        for segment in &self.segments {
            match segment {
                Segment::Key(name) => {
                    current = step(&current, multi, |v| v.get(name.as_str())).ok_or_else(not_found)?;
                }
                Segment::Index(index) => {
                    current = step(&current, multi, |v| {
                        let items = v.as_array()?;
                        let i = if *index < 0 { items.len() as i64 + index } else { *index };
                        usize::try_from(i).ok().and_then(|i| items.get(i))
                    })
                    .ok_or_else(not_found)?;
                }
                Segment::Wildcard => {
                    let mut next = Vec::new();
                    for v in current.iter().copied() {
                        match v {
                            Value::Array(items) => next.extend(items.iter()),
                            Value::Object(map) => next.extend(map.values()),
                            _ if !multi => return Err(not_found()),
                            _ => {}
                        }
                    }
                    current = next;
                    multi = true;
                }
                Segment::Length => {
                    let len = if multi {
                        current.len()
                    } else {
                        match current.first() {
                            Some(Value::Array(items)) => items.len(),
                            Some(Value::Object(map)) => map.len(),
                            Some(Value::String(s)) => s.chars().count(),
                            _ => return Err(not_found()),
                        }
                    };
                    return Ok(Value::from(len));
                }
            }
        }

        if multi {
            Ok(Value::Array(current.into_iter().cloned().collect()))
        } else {
            current.first().map(|v| (*v).clone()).ok_or_else(not_found)
        }
    }
}

/// Applies `f` to every current value. Without a wildcard in play a miss is
/// fatal; after one, misses are dropped.
fn step<'a, F>(current: &[&'a Value], multi: bool, f: F) -> Option<Vec<&'a Value>>
where
    F: Fn(&'a Value) -> Option<&'a Value>,
{
    if multi {
        return Some(current.iter().filter_map(|v| f(*v)).collect());
    }
    current.first().and_then(|v| f(*v)).map(|v| vec![v])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "total": 3,
            "issues": [
                { "key": "SOC-1", "fields": { "priority": { "name": "High" } } },
                { "key": "SOC-2", "fields": { "priority": { "name": "Low" } } },
                { "key": "SOC-3", "fields": {} }
            ],
            "sla breach": true
        })
    }

    fn eval(path: &str) -> Result<Value, FetchError> {
        JsonPath::parse(path)?.evaluate(&doc())
    }

    #[test]
    fn root_and_members() {
        assert_eq!(eval("$").unwrap(), doc());
        assert_eq!(eval("$.total").unwrap(), json!(3));
        assert_eq!(eval("$['sla breach']").unwrap(), json!(true));
        assert_eq!(eval("$.issues[0].key").unwrap(), json!("SOC-1"));
    }

    #[test]
    fn negative_indexes_count_from_end() {
        assert_eq!(eval("$.issues[-1].key").unwrap(), json!("SOC-3"));
        assert!(matches!(eval("$.issues[-4]"), Err(FetchError::PathNotFound(_))));
    }

    #[test]
    fn wildcard_collects_matches() {
        assert_eq!(eval("$.issues[*].key").unwrap(), json!(["SOC-1", "SOC-2", "SOC-3"]));
        assert_eq!(eval("$.issues[*].fields.priority.name").unwrap(), json!(["High", "Low"]));
        assert_eq!(eval("$.issues.*.key").unwrap(), json!(["SOC-1", "SOC-2", "SOC-3"]));
    }

    #[test]
    fn length_of_arrays_and_matches() {
        assert_eq!(eval("$.issues.length()").unwrap(), json!(3));
        assert_eq!(eval("$.issues[*].fields.priority.length()").unwrap(), json!(2));
        assert_eq!(eval("$.issues[0].key.length()").unwrap(), json!(5));
    }

    #[test]
    fn missing_members_are_not_found() {
        assert!(matches!(eval("$.nope"), Err(FetchError::PathNotFound(_))));
        assert!(matches!(eval("$.total[0]"), Err(FetchError::PathNotFound(_))));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(JsonPath::parse("total").is_err());
        assert!(JsonPath::parse("$.").is_err());
        assert!(JsonPath::parse("$[abc]").is_err());
        assert!(JsonPath::parse("$.issues[0").is_err());
        assert!(JsonPath::parse("$.issues.length().x").is_err());
    }
}
