//! The schema-less replay state document.
//!
//! Contract state has no imposed schema; the engine only understands two
//! conventional fields, `evolve` (a target source transaction id) and
//! `canEvolve` (permission flag, default true), both of which may also
//! live under a `settings` object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::identity::TxId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayState(Value);

impl ReplayState {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse state from the JSON text a ledger payload carries.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self(serde_json::from_str(text)?))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look a conventional field up at the top level, falling back to the
    /// `settings` object.
    fn setting(&self, key: &str) -> Option<&Value> {
        let obj = self.0.as_object()?;
        obj.get(key).or_else(|| obj.get("settings")?.get(key))
    }

    /// The declared evolve target, screened to a syntactically valid
    /// transaction id. A malformed target is treated as absent.
    pub fn evolve_target(&self) -> Option<TxId> {
        let raw = self.setting("evolve")?.as_str()?;
        TxId::parse(raw).ok()
    }

    /// Whether the contract permits evolution. Unset means yes.
    pub fn can_evolve(&self) -> bool {
        match self.setting("canEvolve") {
            Some(v) => v.as_bool().unwrap_or(false),
            None => true,
        }
    }

    /// Canonical compact encoding: object keys sorted by UTF-8 byte order,
    /// recursively, no insignificant whitespace. Two states are the same
    /// state iff their canonical bytes match, regardless of how either was
    /// assembled.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let canon = canon_value(self.0.clone());
        serde_json::to_vec(&canon).expect("re-encoding a parsed value cannot fail")
    }
}

impl From<Value> for ReplayState {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn canon_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut canon = Map::new();
            for (key, value) in entries {
                canon.insert(key, canon_value(value));
            }
            Value::Object(canon)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canon_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SRC: &str = "uhE-QeYS8i4pmUtnxQyHD7dzXFNaJ9oMK-IM-QPNY6M";

    #[test]
    fn evolve_target_reads_top_level_and_settings() {
        let top = ReplayState::new(json!({ "evolve": SRC }));
        assert_eq!(top.evolve_target().unwrap().as_str(), SRC);

        let nested = ReplayState::new(json!({ "settings": { "evolve": SRC } }));
        assert_eq!(nested.evolve_target().unwrap().as_str(), SRC);
    }

    #[test]
    fn malformed_evolve_target_is_absent() {
        let state = ReplayState::new(json!({ "evolve": "not-a-tx-id" }));
        assert!(state.evolve_target().is_none());

        let cleared = ReplayState::new(json!({ "evolve": null }));
        assert!(cleared.evolve_target().is_none());
    }

    #[test]
    fn can_evolve_defaults_to_true() {
        assert!(ReplayState::new(json!({})).can_evolve());
        assert!(ReplayState::new(json!({ "canEvolve": true })).can_evolve());
        assert!(!ReplayState::new(json!({ "canEvolve": false })).can_evolve());
        assert!(!ReplayState::new(json!({ "settings": { "canEvolve": false } })).can_evolve());
    }

    #[test]
    fn canonical_bytes_sort_keys_recursively() {
        let state = ReplayState::new(json!({
            "b": 1,
            "a": { "d": 4, "c": 3 },
            "list": [{ "z": 1, "y": 2 }]
        }));
        assert_eq!(
            state.canonical_bytes(),
            br#"{"a":{"c":3,"d":4},"b":1,"list":[{"y":2,"z":1}]}"#
        );
    }
}
