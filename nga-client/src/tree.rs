//! Schema-free search over a parsed JSON payload.
//!
//! NGA has shipped the listing as a flat array, as a mapping keyed by
//! `"0"`, `"1"`, ..., and nested under extra wrapper keys. Rather than
//! modelling each envelope, the walker visits every node and hands mappings
//! to a qualification predicate.

use serde_json::{Map, Value};

/// Deepest nesting the walker descends into.
pub const MAX_WALK_DEPTH: usize = 50;

/// The three shapes a payload node can take.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Mapping(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Scalar(&'a Value),
}

impl<'a> Node<'a> {
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Node::Mapping(map),
            Value::Array(items) => Node::Sequence(items),
            other => Node::Scalar(other),
        }
    }
}

#[derive(Debug, Default)]
pub struct WalkOutcome<'a> {
    /// Qualifying mappings in document order.
    pub matches: Vec<&'a Map<String, Value>>,
    /// Set when some branch went past the depth limit and was not explored.
    pub truncated: bool,
}

/// Collects every mapping accepted by `qualifies`.
///
/// A qualifying mapping is taken whole and its children are not searched.
/// A rejected mapping is treated as envelope or metadata and its children
/// are searched instead.
pub fn collect_mappings<'a, P>(root: &'a Value, max_depth: usize, qualifies: P) -> WalkOutcome<'a>
where
    P: Fn(&Map<String, Value>) -> bool,
{
    let mut outcome = WalkOutcome::default();
    visit(root, 0, max_depth, &qualifies, &mut outcome);
    outcome
}

fn visit<'a, P>(
    value: &'a Value,
    depth: usize,
    max_depth: usize,
    qualifies: &P,
    outcome: &mut WalkOutcome<'a>,
) where
    P: Fn(&Map<String, Value>) -> bool,
{
    if depth > max_depth {
        outcome.truncated = true;
        return;
    }

    match Node::of(value) {
        Node::Mapping(map) => {
            if qualifies(map) {
                outcome.matches.push(map);
                return;
            }
            for child in map.values() {
                visit(child, depth + 1, max_depth, qualifies, outcome);
            }
        }
        Node::Sequence(items) => {
            for item in items {
                visit(item, depth + 1, max_depth, qualifies, outcome);
            }
        }
        Node::Scalar(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn has_marker(map: &Map<String, Value>) -> bool {
        map.contains_key("marker")
    }

    #[test]
    fn finds_matches_at_any_depth_in_order() {
        let value = json!({
            "a": {"marker": 1},
            "b": [{"x": {"marker": 2}}, {"marker": 3}],
            "c": "scalar"
        });
        let outcome = collect_mappings(&value, MAX_WALK_DEPTH, has_marker);
        let found: Vec<_> = outcome.matches.iter().map(|m| m["marker"].clone()).collect();
        assert_eq!(found, vec![json!(1), json!(2), json!(3)]);
        assert!(!outcome.truncated);
    }

    #[test]
    fn does_not_descend_into_a_match() {
        let value = json!({"marker": "outer", "child": {"marker": "inner"}});
        let outcome = collect_mappings(&value, MAX_WALK_DEPTH, has_marker);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0]["marker"], json!("outer"));
    }

    #[test]
    fn stops_at_depth_limit() {
        let mut value = json!({"marker": true});
        for _ in 0..10 {
            value = json!([value]);
        }
        let shallow = collect_mappings(&value, 5, has_marker);
        assert!(shallow.matches.is_empty());
        assert!(shallow.truncated);

        let deep = collect_mappings(&value, 10, has_marker);
        assert_eq!(deep.matches.len(), 1);
    }

    #[test]
    fn scalar_root_yields_nothing() {
        let text = json!("just text");
        let outcome = collect_mappings(&text, MAX_WALK_DEPTH, has_marker);
        assert!(outcome.matches.is_empty());
    }
}
