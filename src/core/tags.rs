//! Transaction tag multimap.
//!
//! Tags are an ordered list of name/value pairs; names may repeat. Lookups
//! that must be unique (the `Input` payload) distinguish a missing tag
//! from a duplicated one, because a record carrying two `Input` tags is
//! excluded from state effect rather than silently picking one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("missing {name} tag")]
    Missing { name: String },

    #[error("duplicated {name} tag")]
    Duplicated { name: String },
}

/// Ordered tag list as it appears on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self(tags)
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }

    /// Every value for `name`, in wire order.
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|t| t.name == name)
            .map(|t| t.value.as_str())
            .collect()
    }

    /// The value for `name`, requiring exactly one occurrence.
    pub fn unique(&self, name: &str) -> Result<&str, TagError> {
        let mut found = None;
        for tag in &self.0 {
            if tag.name == name {
                if found.is_some() {
                    return Err(TagError::Duplicated {
                        name: name.to_string(),
                    });
                }
                found = Some(tag.value.as_str());
            }
        }
        found.ok_or_else(|| TagError::Missing {
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
