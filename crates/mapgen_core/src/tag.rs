//! Dependency tags.
//!
//! A tag is a namespaced `"<namespace>:<name>"` string naming a pre- or
//! post-condition of a step, e.g. `artifact:climateField` or
//! `effect:engine.landmassApplied`.

use crate::error::{CoreError, CoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z][a-z0-9-]*):([A-Za-z0-9_.-]+)$").expect("tag pattern is valid")
});

/// A parsed dependency tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DependencyTag {
    namespace: String,
    name: String,
}

impl DependencyTag {
    /// Parse a tag from `"<namespace>:<name>"`
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a well-formed tag
    pub fn parse(text: &str) -> CoreResult<Self> {
        let Some(caps) = TAG_PATTERN.captures(text) else {
            let reason = if text.contains(':') {
                "expected <namespace>:<name> with a lowercase namespace"
            } else {
                "missing ':' separator"
            };
            return Err(CoreError::InvalidTag {
                tag: text.to_string(),
                reason: reason.to_string(),
            });
        };
        Ok(Self {
            namespace: caps[1].to_string(),
            name: caps[2].to_string(),
        })
    }

    /// Namespace part
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name part
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl FromStr for DependencyTag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DependencyTag {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DependencyTag> for String {
    fn from(tag: DependencyTag) -> Self {
        tag.to_string()
    }
}

/// An ordered set of tags
///
/// Ordering is lexical so that anything printed from a set is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    tags: BTreeSet<DependencyTag>,
}

impl TagSet {
    /// Create a new empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag; returns true if it was not present
    pub fn insert(&mut self, tag: DependencyTag) -> bool {
        self.tags.insert(tag)
    }

    /// Add every tag
    pub fn extend<'a>(&mut self, tags: impl IntoIterator<Item = &'a DependencyTag>) {
        self.tags.extend(tags.into_iter().cloned());
    }

    /// Check membership
    #[must_use]
    pub fn contains(&self, tag: &DependencyTag) -> bool {
        self.tags.contains(tag)
    }

    /// Tags from `required` that are not in the set, in input order
    #[must_use]
    pub fn missing<'a>(&self, required: &'a [DependencyTag]) -> Vec<&'a DependencyTag> {
        required.iter().filter(|t| !self.tags.contains(t)).collect()
    }

    /// Get the number of tags
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate in lexical order
    pub fn iter(&self) -> impl Iterator<Item = &DependencyTag> {
        self.tags.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag() {
        let tag = DependencyTag::parse("artifact:climateField").unwrap();
        assert_eq!(tag.namespace(), "artifact");
        assert_eq!(tag.name(), "climateField");
        assert_eq!(tag.to_string(), "artifact:climateField");
    }

    #[test]
    fn test_parse_dotted_name() {
        let tag: DependencyTag = "effect:engine.landmassApplied".parse().unwrap();
        assert_eq!(tag.name(), "engine.landmassApplied");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(DependencyTag::parse("climateField").is_err());
        assert!(DependencyTag::parse("Artifact:x").is_err());
        assert!(DependencyTag::parse("artifact:").is_err());
        assert!(DependencyTag::parse(":x").is_err());
        assert!(DependencyTag::parse("a:b:c").is_err());
    }

    #[test]
    fn test_tag_serde_as_string() {
        let tag = DependencyTag::parse("field:elevation").unwrap();
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "\"field:elevation\"");
        let back: DependencyTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);
        assert!(serde_json::from_str::<DependencyTag>("\"bogus\"").is_err());
    }

    #[test]
    fn test_tag_set_missing() {
        let a = DependencyTag::parse("field:elevation").unwrap();
        let b = DependencyTag::parse("artifact:climateField").unwrap();
        let mut set = TagSet::new();
        assert!(set.insert(a.clone()));
        assert!(!set.insert(a.clone()));

        let required = vec![a.clone(), b.clone()];
        assert_eq!(set.missing(&required), vec![&b]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_tag_set_iterates_in_order() {
        let mut set = TagSet::new();
        set.extend(&[
            DependencyTag::parse("field:z").unwrap(),
            DependencyTag::parse("artifact:a").unwrap(),
        ]);
        let names: Vec<String> = set.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["artifact:a", "field:z"]);
    }

    proptest::proptest! {
        #[test]
        fn prop_well_formed_tags_parse(ns in "[a-z][a-z0-9-]{0,8}", name in "[A-Za-z0-9_.-]{1,16}") {
            let text = format!("{}:{}", ns, name);
            let tag = DependencyTag::parse(&text).unwrap();
            proptest::prop_assert_eq!(tag.to_string(), text);
        }
    }
}
