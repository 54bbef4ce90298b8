//! `{{name}}` placeholder substitution for query endpoints, params and bodies.

use std::collections::{BTreeMap, BTreeSet};

use super::fetcher::FetchError;

/// How substituted values are escaped for their destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Query parameter values; encoding happens when the URL is assembled
    Raw,
    /// Percent-encoded so a value always stays inside one path segment
    PathSegment,
    /// Escaped for use inside a JSON string literal
    Json,
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, FetchError> {
    let mut pieces = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            pieces.push(Piece::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| FetchError::InvalidTemplate(format!("Unclosed '{{{{' in '{}'", template)))?;

        let name = after[..end].trim();
        if name.is_empty() || !name.chars().all(is_name_char) {
            return Err(FetchError::InvalidTemplate(format!(
                "Invalid placeholder '{{{{{}}}}}'",
                &after[..end]
            )));
        }
        pieces.push(Piece::Var(name));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

/// Distinct placeholder names in order of first appearance
pub fn placeholders(template: &str) -> Result<Vec<String>, FetchError> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();
    for piece in parse(template)? {
        if let Piece::Var(name) = piece {
            if seen.insert(name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Placeholders of `template` not present in `vars`
pub fn missing(template: &str, vars: &BTreeMap<String, String>) -> Result<BTreeSet<String>, FetchError> {
    Ok(placeholders(template)?
        .into_iter()
        .filter(|name| !vars.contains_key(name))
        .collect())
}

pub fn render(template: &str, vars: &BTreeMap<String, String>, escape: Escape) -> Result<String, FetchError> {
    let pieces = parse(template)?;

    let missing: BTreeSet<&str> = pieces
        .iter()
        .filter_map(|p| match p {
            Piece::Var(name) if !vars.contains_key(*name) => Some(*name),
            _ => None,
        })
        .collect();
    if !missing.is_empty() {
        return Err(FetchError::MissingVariables(missing.into_iter().map(String::from).collect()));
    }

    let mut out = String::with_capacity(template.len());
    for piece in pieces {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Var(name) => {
                let value = vars.get(name).map(String::as_str).unwrap_or_default();
                match escape {
                    Escape::Raw => out.push_str(value),
                    Escape::PathSegment => out.push_str(&encode_path_segment(value)),
                    Escape::Json => out.push_str(&escape_json(value)),
                }
            }
        }
    }
    Ok(out)
}

fn encode_path_segment(value: &str) -> String {
    // form encoding turns spaces into '+' and encodes a literal '+' as %2B
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn escape_json(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn finds_placeholders_with_whitespace() {
        let names = placeholders("/issue/{{ key }}/comments?since={{since}}&k={{key}}").unwrap();
        assert_eq!(names, vec!["key", "since"]);
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(placeholders("/issue/{{key").is_err());
        assert!(placeholders("/issue/{{}}").is_err());
        assert!(placeholders("/issue/{{a b}}").is_err());
        assert!(placeholders("no placeholders here").unwrap().is_empty());
    }

    #[test]
    fn reports_every_missing_variable() {
        let err = render("{{a}}/{{b}}/{{c}}", &vars(&[("b", "1")]), Escape::Raw).unwrap_err();
        match err {
            FetchError::MissingVariables(names) => assert_eq!(names, vec!["a", "c"]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn path_values_stay_in_one_segment() {
        let out = render("/projects/{{p}}/issues", &vars(&[("p", "a/b c+d")]), Escape::PathSegment).unwrap();
        assert_eq!(out, "/projects/a%2Fb%20c%2Bd/issues");
    }

    #[test]
    fn json_values_are_escaped() {
        let body = render(
            r#"{"jql": "project = {{p}}"}"#,
            &vars(&[("p", "X\" OR 1=1 \\")]),
            Escape::Json,
        )
        .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["jql"], "project = X\" OR 1=1 \\");
    }

    #[test]
    fn missing_lists_only_unsupplied() {
        let m = missing("{{a}}{{b}}", &vars(&[("a", "1")])).unwrap();
        assert_eq!(m.into_iter().collect::<Vec<_>>(), vec!["b"]);
    }
}
