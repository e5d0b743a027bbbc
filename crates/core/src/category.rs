//! Life-domain categories used to tag documents and questions

use serde::{Deserialize, Serialize};
use std::fmt;

/// A life-domain category from the fixed closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Job tasks, meetings, deadlines, career
    Work,
    /// Exercise, nutrition, medical, fitness
    Health,
    /// Family, friends, home, hobbies, daily tasks
    Personal,
    /// Emotions, thoughts, self-analysis, mood
    Reflection,
}

impl Category {
    /// All valid categories
    pub const ALL: [Category; 4] = [
        Category::Work,
        Category::Health,
        Category::Personal,
        Category::Reflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Health => "health",
            Category::Personal => "personal",
            Category::Reflection => "reflection",
        }
    }

    /// Parse a label case-insensitively, tolerating surrounding
    /// whitespace and quotes. Returns `None` for anything outside the
    /// closed set.
    pub fn parse(label: &str) -> Option<Category> {
        let cleaned = label.trim().trim_matches(|c| c == '"' || c == '\'');
        match cleaned.to_lowercase().as_str() {
            "work" => Some(Category::Work),
            "health" => Some(Category::Health),
            "personal" => Some(Category::Personal),
            "reflection" => Some(Category::Reflection),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered, de-duplicated set of categories.
///
/// Invariant: never empty. Any normalization that would produce an empty
/// set falls back to `{personal}` so downstream filters are never vacuous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySet(Vec<Category>);

impl CategorySet {
    /// The fallback set used whenever normalization comes up empty
    pub fn fallback() -> Self {
        CategorySet(vec![Category::Personal])
    }

    /// Singleton set
    pub fn single(category: Category) -> Self {
        CategorySet(vec![category])
    }

    /// Build from parsed categories, de-duplicating in order.
    /// Empty input falls back to `{personal}`.
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut out = Vec::new();
        for cat in categories {
            if !out.contains(&cat) {
                out.push(cat);
            }
        }
        if out.is_empty() {
            return Self::fallback();
        }
        CategorySet(out)
    }

    /// Normalize free-form labels: blank entries are stripped, unknown
    /// labels are dropped, and an empty result falls back to `{personal}`.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_categories(
            labels
                .into_iter()
                .filter(|l| !l.as_ref().trim().is_empty())
                .filter_map(|l| Category::parse(l.as_ref())),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        // Invariant: the set is never empty
        false
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Category] {
        &self.0
    }

    /// Labels as owned strings, for logging and filter payloads
    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|c| c.as_str().to_string()).collect()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::fallback()
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels().join(","))
    }
}

impl From<Category> for CategorySet {
    fn from(category: Category) -> Self {
        Self::single(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Category::parse("Work"), Some(Category::Work));
        assert_eq!(Category::parse("  REFLECTION  "), Some(Category::Reflection));
        assert_eq!(Category::parse("\"health\""), Some(Category::Health));
        assert_eq!(Category::parse("finance"), None);
    }

    #[test]
    fn test_empty_labels_fall_back_to_personal() {
        let set = CategorySet::from_labels(Vec::<String>::new());
        assert_eq!(set.as_slice(), &[Category::Personal]);

        let set = CategorySet::from_labels(["", "  ", "not-a-category"]);
        assert_eq!(set.as_slice(), &[Category::Personal]);
    }

    #[test]
    fn test_deduplication_preserves_order() {
        let set = CategorySet::from_labels(["work", "health", "work"]);
        assert_eq!(set.as_slice(), &[Category::Work, Category::Health]);
    }

    #[test]
    fn test_never_empty() {
        let set = CategorySet::default();
        assert_eq!(set.len(), 1);
        assert!(set.contains(Category::Personal));
    }
}
