//! Metadata filter construction for vector search
//!
//! Every search carries at least a category clause: the category set is
//! never empty, so the resulting filter is never vacuous.

use qdrant_client::qdrant::{
    condition::ConditionOneOf, r#match::MatchValue, Condition, FieldCondition, Filter, Match,
    RepeatedStrings,
};

use weeklog_core::{CategorySet, WeekWindow};

/// Payload key holding a chunk's life-domain category
pub const FILE_TYPE_KEY: &str = "file_type";
/// Payload key holding a chunk's ISO week label
pub const WEEK_START_KEY: &str = "week_start";

/// Search filter combining category and week-window restrictions.
///
/// Both clauses AND together; within a clause, multiple values OR
/// together via a keyword-any match.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub categories: CategorySet,
    pub weeks: WeekWindow,
}

impl SearchFilter {
    pub fn new(categories: CategorySet, weeks: WeekWindow) -> Self {
        Self { categories, weeks }
    }

    pub fn into_qdrant(self) -> Filter {
        let mut conditions = vec![keyword_condition(FILE_TYPE_KEY, self.categories.labels())];

        if !self.weeks.is_empty() {
            conditions.push(keyword_condition(
                WEEK_START_KEY,
                self.weeks.as_slice().to_vec(),
            ));
        }

        Filter {
            must: conditions,
            ..Default::default()
        }
    }
}

fn keyword_condition(key: &str, mut values: Vec<String>) -> Condition {
    let match_value = if values.len() == 1 {
        MatchValue::Keyword(values.remove(0))
    } else {
        MatchValue::Keywords(RepeatedStrings { strings: values })
    };

    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: key.to_string(),
            r#match: Some(Match {
                match_value: Some(match_value),
            }),
            ..Default::default()
        })),
    }
}
