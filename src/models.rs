// src/models.rs

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_UID_LEN: usize = 400;

/// Checks an index uid against the engine's naming rule before it is sent.
pub fn validate_index_uid(uid: &str) -> Result<(), AppError> {
    if uid.is_empty() {
        return Err(AppError::validation("index uid must not be empty"));
    }
    if uid.len() > MAX_UID_LEN {
        return Err(AppError::validation(format!(
            "index uid must be at most {} bytes",
            MAX_UID_LEN
        )));
    }
    if !uid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::validation(format!(
            "index uid `{}` may only contain alphanumerics, `-` and `_`",
            uid
        )));
    }
    Ok(())
}

/// One page of a paginated listing.
#[derive(Debug, Serialize, Clone)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub offset: u32,
    pub limit: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TasksQuery {
    /// Comma separated index uids.
    pub index_uids: Option<String>,
    /// Comma separated task statuses.
    pub statuses: Option<String>,
    /// Comma separated task types.
    pub types: Option<String>,
    pub limit: Option<u32>,
    pub from: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct Pagination {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DocumentsQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Comma separated list of attributes to return.
    pub fields: Option<String>,
}

/// Splits a comma separated query parameter, dropping blanks.
pub fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct KeyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub actions: Vec<String>,
    pub indexes: Vec<String>,
    /// RFC 3339 timestamp, or null for a key that never expires.
    pub expires_at: Option<String>,
}

/// Index settings that can be read, replaced or reset one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    DisplayedAttributes,
    SearchableAttributes,
    FilterableAttributes,
    SortableAttributes,
    RankingRules,
    StopWords,
    Synonyms,
    DistinctAttribute,
}

impl Setting {
    pub fn as_str(self) -> &'static str {
        match self {
            Setting::DisplayedAttributes => "displayed-attributes",
            Setting::SearchableAttributes => "searchable-attributes",
            Setting::FilterableAttributes => "filterable-attributes",
            Setting::SortableAttributes => "sortable-attributes",
            Setting::RankingRules => "ranking-rules",
            Setting::StopWords => "stop-words",
            Setting::Synonyms => "synonyms",
            Setting::DistinctAttribute => "distinct-attribute",
        }
    }

    /// Key of this setting inside a full settings object.
    pub fn field_name(self) -> &'static str {
        match self {
            Setting::DisplayedAttributes => "displayedAttributes",
            Setting::SearchableAttributes => "searchableAttributes",
            Setting::FilterableAttributes => "filterableAttributes",
            Setting::SortableAttributes => "sortableAttributes",
            Setting::RankingRules => "rankingRules",
            Setting::StopWords => "stopWords",
            Setting::Synonyms => "synonyms",
            Setting::DistinctAttribute => "distinctAttribute",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Setting {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "displayed-attributes" => Ok(Setting::DisplayedAttributes),
            "searchable-attributes" => Ok(Setting::SearchableAttributes),
            "filterable-attributes" => Ok(Setting::FilterableAttributes),
            // older engines called this one attributes-for-faceting
            "attributes-for-faceting" => Ok(Setting::FilterableAttributes),
            "sortable-attributes" => Ok(Setting::SortableAttributes),
            "ranking-rules" => Ok(Setting::RankingRules),
            "stop-words" => Ok(Setting::StopWords),
            "synonyms" => Ok(Setting::Synonyms),
            "distinct-attribute" => Ok(Setting::DistinctAttribute),
            other => Err(AppError::validation(format!("unknown setting `{}`", other))),
        }
    }
}

/// A validated search, ready to be turned into an engine query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Filter expression in the engine's syntax.
    pub filter: Option<String>,
    pub facets: Option<Vec<String>>,
    pub attributes_to_retrieve: Option<Vec<String>>,
    /// `attribute` or `attribute:length`.
    pub attributes_to_crop: Option<Vec<String>>,
    pub crop_length: Option<usize>,
    pub attributes_to_highlight: Option<Vec<String>>,
    pub sort: Option<Vec<String>>,
    pub highlight_pre_tag: Option<String>,
    pub highlight_post_tag: Option<String>,
}

impl SearchParams {
    /// Crop directives as attribute and optional length pairs.
    pub fn crop_directives(&self) -> Result<Vec<(&str, Option<usize>)>, AppError> {
        self.attributes_to_crop
            .iter()
            .flatten()
            .map(|raw| match raw.split_once(':') {
                None => Ok((raw.as_str(), None)),
                Some((attribute, length)) => length
                    .parse()
                    .map(|length| (attribute, Some(length)))
                    .map_err(|_| {
                        AppError::validation(format!("crop length in `{}` is not a number", raw))
                    }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_rules() {
        assert!(validate_index_uid("movies").is_ok());
        assert!(validate_index_uid("indexUID2").is_ok());
        assert!(validate_index_uid("my_index-01").is_ok());
        assert!(validate_index_uid("").is_err());
        assert!(validate_index_uid("bad uid").is_err());
        assert!(validate_index_uid("films/2024").is_err());
        assert!(validate_index_uid(&"a".repeat(401)).is_err());
        assert!(validate_index_uid(&"a".repeat(400)).is_ok());
    }

    #[test]
    fn setting_names_parse() {
        assert_eq!(
            "filterable-attributes".parse::<Setting>().unwrap(),
            Setting::FilterableAttributes
        );
        assert_eq!(
            "attributes-for-faceting".parse::<Setting>().unwrap(),
            Setting::FilterableAttributes
        );
        assert_eq!(Setting::StopWords.to_string(), "stop-words");
        assert_eq!(Setting::StopWords.field_name(), "stopWords");
        assert!("typo-tolerance-ish".parse::<Setting>().is_err());
    }

    #[test]
    fn lists_split_on_commas() {
        assert_eq!(split_list("indexUID, movies,,"), vec!["indexUID", "movies"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn crop_lengths_are_parsed() {
        let params = SearchParams {
            attributes_to_crop: Some(vec!["overview:5".to_string(), "title".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            params.crop_directives().unwrap(),
            vec![("overview", Some(5)), ("title", None)]
        );

        let params = SearchParams {
            attributes_to_crop: Some(vec!["overview:long".to_string()]),
            ..Default::default()
        };
        assert!(params.crop_directives().is_err());
    }
}
