//! Statement model: parameter values, bindings, templates, and statements.
//!
//! A [`Statement`] is what the sink actually executes: one immutable
//! [`QueryTemplate`] paired with the [`ParameterBinding`] produced for a
//! single stream element.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ── Parameter Values ──────────────────────────────────────────────

/// A value that can be bound to a query placeholder.
///
/// This is the closed set of scalar and collection types the graph client
/// accepts as parameters. Backends convert it to their own wire type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Short type name used in conversion error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                // u64 beyond i64::MAX and non-integers both land here.
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => {
                Self::Map(fields.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

// ── Parameter Binding ─────────────────────────────────────────────

/// Placeholder name → value. Names are unique; order is irrelevant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBinding(BTreeMap<String, ParamValue>);

impl ParameterBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a value, returning the previous one bound to `name`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for ParameterBinding {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ParameterBinding {
    type Item = (String, ParamValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<BTreeMap<String, ParamValue>> for ParameterBinding {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

/// A row returned by a read query: column name → value.
pub type Record = BTreeMap<String, ParamValue>;

// ── Query Template ────────────────────────────────────────────────

const TEMPLATE_ID_MAX_LEN: usize = 48;

/// Immutable query text with named placeholders.
///
/// Clone is cheap (inner Arc). The text is never rewritten: what was
/// configured is exactly what the database receives.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    text: Arc<str>,
    id: Option<Arc<str>>,
}

impl QueryTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self {
            text: Arc::from(text),
            id: None,
        }
    }

    /// Attach an explicit identifier used in logs and error context.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id: String = id.into();
        self.id = Some(Arc::from(id));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The explicit id, or the whitespace-collapsed head of the text.
    pub fn id(&self) -> String {
        if let Some(id) = &self.id {
            return id.to_string();
        }
        let collapsed = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        match collapsed.char_indices().nth(TEMPLATE_ID_MAX_LEN) {
            Some((idx, _)) => format!("{}…", &collapsed[..idx]),
            None => collapsed,
        }
    }

    /// Names referenced by the template.
    ///
    /// Recognises `$name` and the legacy `{name}` form. Quoted strings and
    /// backtick-escaped identifiers are skipped.
    pub fn placeholders(&self) -> BTreeSet<String> {
        let chars: Vec<char> = self.text.chars().collect();
        let mut names = BTreeSet::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                quote @ ('\'' | '"' | '`') => {
                    i += 1;
                    while i < chars.len() && chars[i] != quote {
                        if chars[i] == '\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                    i += 1;
                }
                '$' => {
                    let end = scan_identifier(&chars, i + 1);
                    if end > i + 1 {
                        names.insert(chars[i + 1..end].iter().collect());
                    }
                    i = end.max(i + 1);
                }
                '{' => {
                    let start = skip_whitespace(&chars, i + 1);
                    let end = scan_identifier(&chars, start);
                    let close = skip_whitespace(&chars, end);
                    if end > start && chars.get(close) == Some(&'}') {
                        names.insert(chars[start..end].iter().collect());
                        i = close + 1;
                    } else {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }

        names
    }
}

fn scan_identifier(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    i
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

impl fmt::Debug for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTemplate")
            .field("id", &self.id())
            .field("text", &self.text)
            .finish()
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for QueryTemplate {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for QueryTemplate {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

// ── Statement ─────────────────────────────────────────────────────

/// One template bound to one element's parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    template: QueryTemplate,
    params: ParameterBinding,
}

impl Statement {
    pub fn new(template: QueryTemplate, params: ParameterBinding) -> Self {
        Self { template, params }
    }

    pub fn template(&self) -> &QueryTemplate {
        &self.template
    }

    pub fn text(&self) -> &str {
        self.template.text()
    }

    pub fn params(&self) -> &ParameterBinding {
        &self.params
    }

    /// Placeholders referenced by the template but absent from the binding.
    pub fn unbound_placeholders(&self) -> Vec<String> {
        self.template
            .placeholders()
            .into_iter()
            .filter(|name| !self.params.contains(name))
            .collect()
    }

    pub fn into_parts(self) -> (QueryTemplate, ParameterBinding) {
        (self.template, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_both_syntaxes() {
        let t = QueryTemplate::new("CREATE (n:Person {name: {name}, age: $age}) RETURN n");
        let names: Vec<_> = t.placeholders().into_iter().collect();
        assert_eq!(names, vec!["age", "name"]);
    }

    #[test]
    fn test_placeholders_skip_literals() {
        let t = QueryTemplate::new("MATCH (n) WHERE n.note = '$notaparam {nope}' RETURN n.`$x`, $real");
        let names: Vec<_> = t.placeholders().into_iter().collect();
        assert_eq!(names, vec!["real"]);
    }

    #[test]
    fn test_map_literal_is_not_placeholder() {
        let t = QueryTemplate::new("MERGE (n:Host {tenant_id: $tid, id: $id})");
        let names: Vec<_> = t.placeholders().into_iter().collect();
        assert_eq!(names, vec!["id", "tid"]);
    }

    #[test]
    fn test_template_id() {
        let t = QueryTemplate::new("CREATE   (n:Person)\n RETURN n");
        assert_eq!(t.id(), "CREATE (n:Person) RETURN n");

        let long = QueryTemplate::new("x".repeat(100));
        assert_eq!(long.id().chars().count(), TEMPLATE_ID_MAX_LEN + 1);

        let named = QueryTemplate::new("RETURN 1").with_id("ping");
        assert_eq!(named.id(), "ping");
    }

    #[test]
    fn test_json_conversion() {
        let v: ParamValue = serde_json::json!({
            "name": "Bob",
            "age": 42,
            "score": 1.5,
            "tags": ["a", null],
        })
        .into();

        let ParamValue::Map(map) = v else {
            panic!("expected map");
        };
        assert_eq!(map["name"], ParamValue::String("Bob".into()));
        assert_eq!(map["age"], ParamValue::Integer(42));
        assert_eq!(map["score"], ParamValue::Float(1.5));
        assert_eq!(
            map["tags"],
            ParamValue::List(vec![ParamValue::String("a".into()), ParamValue::Null])
        );
    }

    #[test]
    fn test_param_value_serde_untagged() {
        let v: ParamValue = serde_json::from_str(r#"{"k": [1, true, "s", null]}"#).unwrap();
        let back = serde_json::to_value(&v).unwrap();
        assert_eq!(back, serde_json::json!({"k": [1, true, "s", null]}));
    }

    #[test]
    fn test_unbound_placeholders() {
        let stmt = Statement::new(
            QueryTemplate::new("CREATE (n {a: $a, b: $b})"),
            ParameterBinding::new().with("a", 1i64),
        );
        assert_eq!(stmt.unbound_placeholders(), vec!["b".to_string()]);
    }
}
