//! Per-record validity map.
//!
//! Append-only during a replay, ordered by replay order, returned to the
//! caller as an auditable byproduct. Serialized as a JSON object whose key
//! order is the replay order, so two clients can diff their maps
//! byte-for-byte.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::identity::TxId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidityMap {
    entries: Vec<(TxId, bool)>,
}

impl ValidityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the next replayed interaction.
    pub fn push(&mut self, id: TxId, valid: bool) {
        self.entries.push((id, valid));
    }

    pub fn get(&self, id: &TxId) -> Option<bool> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == id)
            .map(|(_, valid)| *valid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TxId, bool)> {
        self.entries.iter().map(|(id, valid)| (id, *valid))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outcomes in replay order, without ids.
    pub fn outcomes(&self) -> Vec<bool> {
        self.entries.iter().map(|(_, valid)| *valid).collect()
    }
}

impl Serialize for ValidityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, valid) in &self.entries {
            map.serialize_entry(id, valid)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ValidityMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = ValidityMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a record-id to bool map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, valid)) = access.next_entry::<TxId, bool>()? {
                    entries.push((id, valid));
                }
                Ok(ValidityMap { entries })
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}
