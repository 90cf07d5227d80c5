// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A stable element identifier used across the canvas and protocol surfaces.
///
/// Ids are stored in normalized form (see [`normalize_id`]); construction only
/// enforces that the id is a non-empty token without embedded whitespace,
/// because ids appear verbatim in operation arguments and broadcast events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    value: String,
}

impl ElementId {
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_id_token(&value)?;
        Ok(Self { value })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for ElementId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for ElementId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for ElementId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    Empty,
    ContainsWhitespace,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("id must not be empty"),
            Self::ContainsWhitespace => f.write_str("id must not contain whitespace"),
        }
    }
}

impl std::error::Error for IdError {}

fn validate_id_token(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.chars().any(char::is_whitespace) {
        return Err(IdError::ContainsWhitespace);
    }
    Ok(())
}

/// Normalizes a proposed id: trim, spaces to underscores, lowercase.
///
/// Two proposed ids that normalize to the same token are the same id as far as
/// uniqueness is concerned (`"Chart 1"` and `"chart_1"` collide).
pub fn normalize_id(raw: &str) -> String {
    raw.trim().replace(' ', "_").to_lowercase()
}

/// Element namespaces sharing one uniqueness domain.
///
/// Today only containers exist, but ids must stay unique across every future
/// category as well (a chart and a container may never share an id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementCategory {
    Container,
}

impl ElementCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
        }
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating a proposed id against the registry.
///
/// A conflict is an ordinary value, not an error: callers decide whether to
/// surface it, retry with a suggestion, or abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdCheck {
    Ok {
        id: ElementId,
    },
    Conflict {
        conflicting: ElementId,
        /// Category the requester proposed the id for.
        requested_category: ElementCategory,
        /// Category currently holding the id; may differ from the requested
        /// one, since uniqueness spans every category.
        existing_category: ElementCategory,
        suggestions: Vec<String>,
    },
}

pub const SUGGESTION_LIMIT: usize = 5;

const SUGGESTION_SUFFIXES: [&str; 2] = ["new", "alt"];
const SUGGESTION_PREFIXES: [&str; 2] = ["new", "my"];

/// Tracks every id currently in use, across all element categories.
///
/// Registration must happen only after the owning store mutation has
/// committed; release happens as part of the same deletion. The registry never
/// mutates state on a failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRegistry {
    used: BTreeMap<String, ElementCategory>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn is_used(&self, id: &str) -> bool {
        self.used.contains_key(id)
    }

    pub fn used_ids(&self) -> impl Iterator<Item = &str> {
        self.used.keys().map(String::as_str)
    }

    /// Normalizes `proposed` for use in `category` and checks it against
    /// every tracked category, not just the proposing one.
    pub fn validate(&self, proposed: &str, category: ElementCategory) -> Result<IdCheck, IdError> {
        let normalized = normalize_id(proposed);
        let id = ElementId::new(normalized)?;

        match self.used.get(id.as_str()) {
            None => Ok(IdCheck::Ok { id }),
            Some(existing) => {
                let suggestions = self.suggest_alternatives(id.as_str(), SUGGESTION_LIMIT);
                Ok(IdCheck::Conflict {
                    conflicting: id,
                    requested_category: category,
                    existing_category: *existing,
                    suggestions,
                })
            }
        }
    }

    /// Generates up to `max_count` unused alternatives for `base`.
    ///
    /// Order: numeric suffixes up to the first free slot, then the fixed
    /// suffixes and prefixes, then further numeric suffixes until filled.
    /// Never returns duplicates or in-use ids.
    pub fn suggest_alternatives(&self, base: &str, max_count: usize) -> Vec<String> {
        let mut suggestions: Vec<String> = Vec::new();

        fn consider(
            registry: &IdRegistry,
            candidate: String,
            max_count: usize,
            suggestions: &mut Vec<String>,
        ) {
            if suggestions.len() >= max_count {
                return;
            }
            if registry.used.contains_key(candidate.as_str()) {
                return;
            }
            if !suggestions.contains(&candidate) {
                suggestions.push(candidate);
            }
        }

        for i in 1..=max_count {
            let candidate = format!("{base}_{i}");
            let free = !self.used.contains_key(candidate.as_str());
            consider(self, candidate, max_count, &mut suggestions);
            if free {
                break;
            }
        }

        for suffix in SUGGESTION_SUFFIXES {
            consider(self, format!("{base}_{suffix}"), max_count, &mut suggestions);
        }
        for prefix in SUGGESTION_PREFIXES {
            consider(self, format!("{prefix}_{base}"), max_count, &mut suggestions);
        }

        let mut i = 1usize;
        let probe_limit = self.used.len() + max_count + 1;
        while suggestions.len() < max_count && i <= probe_limit {
            consider(self, format!("{base}_{i}"), max_count, &mut suggestions);
            i += 1;
        }

        suggestions
    }

    pub fn register(&mut self, id: &ElementId, category: ElementCategory) {
        self.used.insert(id.as_str().to_owned(), category);
    }

    /// Releases `id` if it is tracked under `category`; returns whether it was.
    pub fn release(&mut self, id: &ElementId, category: ElementCategory) -> bool {
        match self.used.get(id.as_str()) {
            Some(tracked) if *tracked == category => {
                self.used.remove(id.as_str());
                true
            }
            _ => false,
        }
    }

    pub fn release_category(&mut self, category: ElementCategory) {
        self.used.retain(|_, tracked| *tracked != category);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{normalize_id, ElementCategory, ElementId, IdCheck, IdError, IdRegistry};

    #[test]
    fn id_rejects_empty() {
        assert_eq!(ElementId::new(""), Err(IdError::Empty));
    }

    #[test]
    fn id_rejects_whitespace() {
        assert_eq!(ElementId::new("a b"), Err(IdError::ContainsWhitespace));
    }

    #[rstest]
    #[case("Chart 1", "chart_1")]
    #[case("  padded  ", "padded")]
    #[case("MiXeD", "mixed")]
    #[case("already_fine", "already_fine")]
    fn normalization(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_id(raw), expected);
    }

    #[test]
    fn validate_reports_both_conflict_categories() {
        let mut registry = IdRegistry::new();
        let id = ElementId::new("chart_1").expect("id");
        registry.register(&id, ElementCategory::Container);

        let check = registry.validate("Chart 1", ElementCategory::Container).expect("check");
        let IdCheck::Conflict { conflicting, requested_category, existing_category, suggestions } =
            check
        else {
            panic!("expected conflict");
        };
        assert_eq!(conflicting.as_str(), "chart_1");
        assert_eq!(requested_category, ElementCategory::Container);
        assert_eq!(existing_category, ElementCategory::Container);
        assert!(!suggestions.is_empty());
        assert!(suggestions.iter().all(|s| !registry.is_used(s)));
    }

    #[test]
    fn validate_accepts_unused_id() {
        let registry = IdRegistry::new();
        let check = registry.validate("My Panel", ElementCategory::Container).expect("check");
        assert_eq!(check, IdCheck::Ok { id: ElementId::new("my_panel").expect("id") });
    }

    #[test]
    fn suggestions_stop_numeric_scan_at_first_gap() {
        let mut registry = IdRegistry::new();
        for taken in ["box", "box_1", "box_2"] {
            registry.register(&ElementId::new(taken).expect("id"), ElementCategory::Container);
        }

        let suggestions = registry.suggest_alternatives("box", 5);
        assert_eq!(suggestions, vec!["box_3", "box_new", "box_alt", "new_box", "my_box"]);
    }

    #[test]
    fn suggestions_never_duplicate_or_reuse_taken_ids() {
        let mut registry = IdRegistry::new();
        for taken in ["a", "a_1", "a_new", "new_a"] {
            registry.register(&ElementId::new(taken).expect("id"), ElementCategory::Container);
        }

        let suggestions = registry.suggest_alternatives("a", 5);
        assert_eq!(suggestions.len(), 5);
        let mut deduped = suggestions.clone();
        deduped.dedup();
        assert_eq!(deduped, suggestions);
        assert!(suggestions.iter().all(|s| !registry.is_used(s)));
    }

    #[test]
    fn release_requires_matching_category() {
        let mut registry = IdRegistry::new();
        let id = ElementId::new("thing").expect("id");
        registry.register(&id, ElementCategory::Container);

        assert!(registry.release(&id, ElementCategory::Container));
        assert!(!registry.release(&id, ElementCategory::Container));
        assert!(registry.is_empty());
    }
}
