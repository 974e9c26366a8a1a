//! Flat, suffix-typed key/value store backing party and member meta.
//!
//! Every value is stored as a string. The codec applied on read and write is
//! picked once per key from its suffix, see [`FieldKind::of`].

use crate::error::{PartyError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Codec selected by a key suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `_b`: `"true"` / `"false"`.
    Bool,
    /// `_j`: a JSON document.
    Json,
    /// `_U`: a decimal unsigned integer.
    UInt,
    /// Everything else, including `_s` and `_i`, is kept verbatim.
    Str,
}

impl FieldKind {
    #[must_use]
    pub fn of(key: &str) -> Self {
        if key.ends_with("_b") {
            FieldKind::Bool
        } else if key.ends_with("_j") {
            FieldKind::Json
        } else if key.ends_with("_U") {
            FieldKind::UInt
        } else {
            FieldKind::Str
        }
    }
}

/// A decoded schema value.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaValue {
    Bool(bool),
    Json(Value),
    UInt(u64),
    Str(String),
}

impl SchemaValue {
    /// Value reported for a key that is not stored.
    #[must_use]
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Bool => SchemaValue::Bool(false),
            FieldKind::Json => SchemaValue::Json(Value::Object(Default::default())),
            FieldKind::UInt => SchemaValue::UInt(0),
            FieldKind::Str => SchemaValue::Str(String::new()),
        }
    }

    /// Decode a stored string with the codec for `kind`.
    pub fn decode(kind: FieldKind, raw: &str) -> std::result::Result<Self, serde_json::Error> {
        Ok(match kind {
            FieldKind::Bool => SchemaValue::Bool(!raw.eq_ignore_ascii_case("false")),
            FieldKind::Json => SchemaValue::Json(serde_json::from_str(raw)?),
            FieldKind::UInt => SchemaValue::UInt(serde_json::from_str(raw.trim())?),
            FieldKind::Str => SchemaValue::Str(raw.to_string()),
        })
    }

    /// The stored string form.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            SchemaValue::Bool(b) => b.to_string(),
            SchemaValue::Json(v) => v.to_string(),
            SchemaValue::UInt(n) => n.to_string(),
            SchemaValue::Str(s) => s.clone(),
        }
    }
}

impl From<bool> for SchemaValue {
    fn from(v: bool) -> Self {
        SchemaValue::Bool(v)
    }
}

impl From<u64> for SchemaValue {
    fn from(v: u64) -> Self {
        SchemaValue::UInt(v)
    }
}

impl From<Value> for SchemaValue {
    fn from(v: Value) -> Self {
        SchemaValue::Json(v)
    }
}

impl From<&str> for SchemaValue {
    fn from(v: &str) -> Self {
        SchemaValue::Str(v.to_string())
    }
}

impl From<String> for SchemaValue {
    fn from(v: String) -> Self {
        SchemaValue::Str(v)
    }
}

/// Insertion-ordered encoded schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    entries: IndexMap<String, String>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_raw(entries: IndexMap<String, String>) -> Self {
        Self { entries }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    /// Encode and store `value`, returning the stored string.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SchemaValue>) -> String {
        let encoded = value.into().encode();
        self.entries.insert(key.into(), encoded.clone());
        encoded
    }

    pub fn set_raw(&mut self, key: impl Into<String>, raw: impl Into<String>) {
        self.entries.insert(key.into(), raw.into());
    }

    /// Decode the value at `key`, or the kind's default when absent.
    pub fn get(&self, key: &str) -> Result<SchemaValue> {
        let kind = FieldKind::of(key);
        match self.entries.get(key) {
            None => Ok(SchemaValue::default_for(kind)),
            Some(raw) => SchemaValue::decode(kind, raw).map_err(|source| PartyError::Decode {
                key: key.to_string(),
                source,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|raw| !raw.eq_ignore_ascii_case("false"))
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> &str {
        self.get_raw(key).unwrap_or("")
    }

    pub fn get_uint(&self, key: &str) -> Result<u64> {
        match self.get(key)? {
            SchemaValue::UInt(n) => Ok(n),
            other => Err(PartyError::validation(format!(
                "{key} is not an unsigned integer field: {other:?}"
            ))),
        }
    }

    pub fn get_json(&self, key: &str) -> Result<Value> {
        match self.entries.get(key) {
            None => Ok(Value::Object(Default::default())),
            Some(raw) => serde_json::from_str(raw).map_err(|source| PartyError::Decode {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// Remove `key` if present. Returns the key either way.
    pub fn delete(&mut self, key: &str) -> String {
        self.entries.shift_remove(key);
        key.to_string()
    }

    /// Bulk set of typed values.
    pub fn update<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<SchemaValue>,
    {
        for (k, v) in values {
            self.set(k, v);
        }
    }

    /// Bulk set of already encoded values.
    pub fn update_raw<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in values {
            self.set_raw(k, v);
        }
    }

    pub fn remove<S: AsRef<str>>(&mut self, keys: impl IntoIterator<Item = S>) {
        for key in keys {
            self.entries.shift_remove(key.as_ref());
        }
    }

    /// The first `max` entries in insertion order, or all of them.
    #[must_use]
    pub fn get_schema(&self, max: Option<usize>) -> IndexMap<String, String> {
        let take = max.unwrap_or(self.entries.len());
        self.entries
            .iter()
            .take(take)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, String> {
        self.entries.clone()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({} keys)", self.entries.len())
    }
}

/// Keys changed between two snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// New keys and keys whose value changed, with the new value.
    pub updated: IndexMap<String, String>,
    /// Keys present before and absent after.
    pub deleted: Vec<String>,
}

impl SchemaDiff {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[must_use]
pub fn diff(before: &IndexMap<String, String>, after: &IndexMap<String, String>) -> SchemaDiff {
    let updated = after
        .iter()
        .filter(|(k, v)| before.get(k.as_str()) != Some(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let deleted = before
        .keys()
        .filter(|k| !after.contains_key(k.as_str()))
        .cloned()
        .collect();
    SchemaDiff { updated, deleted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_kind_by_suffix() {
        assert_eq!(FieldKind::of("Default:AthenaSquadFill_b"), FieldKind::Bool);
        assert_eq!(FieldKind::of("Default:LobbyState_j"), FieldKind::Json);
        assert_eq!(FieldKind::of("Default:MatchmakingLevel_U"), FieldKind::UInt);
        assert_eq!(FieldKind::of("Default:Location_s"), FieldKind::Str);
        assert_eq!(
            FieldKind::of("urn:epic:cfg:not-accepting-members-reason_i"),
            FieldKind::Str
        );
        assert_eq!(FieldKind::of("no_suffix"), FieldKind::Str);
    }

    #[test]
    fn test_missing_keys_read_as_defaults() {
        let schema = Schema::new();
        assert_eq!(schema.get("A_b").unwrap(), SchemaValue::Bool(false));
        assert_eq!(schema.get("A_j").unwrap(), SchemaValue::Json(json!({})));
        assert_eq!(schema.get("A_U").unwrap(), SchemaValue::UInt(0));
        assert_eq!(schema.get("A_s").unwrap(), SchemaValue::Str(String::new()));
    }

    #[test]
    fn test_codec_round_trip() {
        let cases: Vec<(&str, SchemaValue)> = vec![
            ("k_b", true.into()),
            ("k_b", false.into()),
            ("k_j", json!({}).into()),
            ("k_j", json!({"A": {"b": [1, 2, {"c": null}], "d": "é"}}).into()),
            ("k_U", 0u64.into()),
            ("k_U", u64::MAX.into()),
            ("k_s", "".into()),
            ("k_s", "héllo 🌍".into()),
        ];
        for (key, value) in cases {
            let mut schema = Schema::new();
            schema.set(key, value.clone());
            assert_eq!(schema.get(key).unwrap(), value, "{key}");
        }
    }

    #[test]
    fn test_bool_decoding_is_lenient() {
        let mut schema = Schema::new();
        schema.set_raw("x_b", "FALSE");
        assert!(!schema.get_bool("x_b"));
        schema.set_raw("x_b", "yes");
        assert!(schema.get_bool("x_b"));
        assert!(!schema.get_bool("missing_b"));
    }

    #[test]
    fn test_malformed_json_is_a_decode_error() {
        let mut schema = Schema::new();
        schema.set_raw("Bad_j", "{not json");
        let err = schema.get("Bad_j").unwrap_err();
        assert!(matches!(err, PartyError::Decode { ref key, .. } if key == "Bad_j"));
    }

    #[test]
    fn test_delete_and_remove_are_idempotent() {
        let mut schema = Schema::new();
        schema.set("a_s", "1");
        schema.set("b_s", "2");
        assert_eq!(schema.delete("a_s"), "a_s");
        assert_eq!(schema.delete("a_s"), "a_s");
        schema.remove(["b_s", "c_s"]);
        assert!(schema.is_empty());
    }

    #[test]
    fn test_get_schema_is_ordered_prefix() {
        let mut schema = Schema::new();
        for i in 0..5u64 {
            schema.set(format!("k{i}_U"), i);
        }
        let head = schema.get_schema(Some(2));
        assert_eq!(head.keys().collect::<Vec<_>>(), vec!["k0_U", "k1_U"]);
        assert_eq!(schema.get_schema(None).len(), 5);
        assert_eq!(schema.get_schema(Some(50)).len(), 5);
    }

    #[test]
    fn test_diff_reports_new_changed_and_deleted() {
        let mut before = IndexMap::new();
        before.insert("same_s".to_string(), "1".to_string());
        before.insert("changed_s".to_string(), "1".to_string());
        before.insert("gone_s".to_string(), "1".to_string());
        let mut after = before.clone();
        after.insert("changed_s".to_string(), "2".to_string());
        after.shift_remove("gone_s");
        after.insert("new_s".to_string(), "x".to_string());

        let d = diff(&before, &after);
        assert_eq!(d.updated.len(), 2);
        assert_eq!(d.updated["changed_s"], "2");
        assert_eq!(d.updated["new_s"], "x");
        assert_eq!(d.deleted, vec!["gone_s".to_string()]);
        assert!(diff(&after, &after).is_empty());
    }
}
