use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a query into its canonical cache key.
///
/// Canonicalization must be deterministic so that two semantically equal
/// queries can never occupy different slots: object keys are emitted in
/// sorted order (serde_json's default map), fields listed in `drop_fields`
/// are removed, and null, `false`, empty-string, empty-array, and
/// empty-object fields are dropped as defaults.
pub fn canonical_query_key<Q: Serialize>(
    query: &Q,
    drop_fields: &[&str],
) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(query)?;
    if let Value::Object(map) = &mut value {
        for field in drop_fields {
            map.remove(*field);
        }
    }
    let canonical = prune(value).unwrap_or(Value::Object(Map::new()));
    serde_json::to_string(&canonical)
}

/// Drop default-valued content, recursively. Returns `None` when the value
/// itself is a default.
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let pruned: Vec<Value> = items.into_iter().filter_map(prune).collect();
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Array(pruned))
            }
        }
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Object(pruned))
            }
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Query {
        pattern: String,
        max_results: u32,
        include_binary: bool,
        folders: Vec<String>,
    }

    #[derive(Serialize)]
    struct ReorderedQuery {
        folders: Vec<String>,
        include_binary: bool,
        max_results: u32,
        pattern: String,
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a = Query {
            pattern: "needle".to_string(),
            max_results: 50,
            include_binary: true,
            folders: vec!["src".to_string()],
        };
        let b = ReorderedQuery {
            folders: vec!["src".to_string()],
            include_binary: true,
            max_results: 50,
            pattern: "needle".to_string(),
        };
        assert_eq!(
            canonical_query_key(&a, &[]).unwrap(),
            canonical_query_key(&b, &[]).unwrap()
        );
    }

    #[test]
    fn test_default_fields_are_dropped() {
        let sparse = Query {
            pattern: "needle".to_string(),
            max_results: 50,
            include_binary: false,
            folders: vec![],
        };
        let key = canonical_query_key(&sparse, &[]).unwrap();
        assert_eq!(key, r#"{"max_results":50,"pattern":"needle"}"#);
    }

    #[test]
    fn test_namespace_field_is_removed() {
        let query = serde_json::json!({
            "cache_key": "search-session-1",
            "pattern": "needle",
        });
        let key = canonical_query_key(&query, &["cache_key"]).unwrap();
        assert_eq!(key, r#"{"pattern":"needle"}"#);
    }

    #[test]
    fn test_fully_default_query_canonicalizes_to_empty_object() {
        let query = serde_json::json!({ "pattern": "", "flag": false });
        assert_eq!(canonical_query_key(&query, &[]).unwrap(), "{}");
    }
}
