//! Schema flattening.
//!
//! Walks the survey sheet with a stack of open group names and produces one
//! [`SchemaEntry`] per spreadsheet column:
//!
//! | Question | Columns |
//! |----------|---------|
//! | `text` named `age` inside group `hh` | `hh/age` |
//! | `geopoint` named `loc` | `loc_latitude`, `loc_longitude`, `loc_altitude`, `loc_precision` |
//! | `select_multiple` named `assets` | `assets` |
//! | `begin_group` / `end_group` / `begin_repeat` / `end_repeat` | none (path prefix only) |
//! | any name starting with `_` | none |
//!
//! Malformed nesting is tolerated: a close marker with no open group is ignored and
//! groups still open at the end are simply dropped.

use std::collections::HashMap;

use tracing::debug;

use crate::row::Row;
use crate::survey::{ChoiceList, QuestionNode, QuestionType, SurveyDefinition};

/// Group name used when an open marker carries no name.
const UNNAMED_GROUP: &str = "group";

/// One of the four columns a geopoint question expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoComponent {
    Latitude,
    Longitude,
    Altitude,
    Precision,
}

impl GeoComponent {
    /// All components in column order.
    pub const ALL: [GeoComponent; 4] = [
        GeoComponent::Latitude,
        GeoComponent::Longitude,
        GeoComponent::Altitude,
        GeoComponent::Precision,
    ];

    /// Column suffix appended to the question path.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Latitude => "_latitude",
            Self::Longitude => "_longitude",
            Self::Altitude => "_altitude",
            Self::Precision => "_precision",
        }
    }

    /// Column name for this component of the geopoint at `base`.
    pub fn column(self, base: &str) -> String {
        format!("{base}{}", self.suffix())
    }

    /// Splits a suffixed column back into `(base path, component)`.
    pub fn split(path: &str) -> Option<(&str, GeoComponent)> {
        Self::ALL.into_iter().find_map(|component| {
            path.strip_suffix(component.suffix())
                .filter(|base| !base.is_empty())
                .map(|base| (base, component))
        })
    }
}

/// A flattened column and the question it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    /// Slash-joined group names plus the leaf name (and geopoint suffix).
    pub path: String,
    /// The originating question, unmodified.
    pub question: QuestionNode,
    /// Referenced choice list, recorded for select questions.
    pub choice_list: Option<String>,
}

impl SchemaEntry {
    fn new(path: String, question: &QuestionNode) -> Self {
        Self {
            path,
            question: question.clone(),
            choice_list: None,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        self.question.question_type()
    }

    /// For geopoint entries, the base path and which component this column holds.
    pub fn geo_component(&self) -> Option<(&str, GeoComponent)> {
        if self.question_type() != QuestionType::Geopoint {
            return None;
        }
        GeoComponent::split(&self.path)
    }
}

/// A select token that is not declared in the question's choice list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChoice {
    pub path: String,
    pub list_name: String,
    pub token: String,
}

/// Ordered flattened schema with a lookup by path.
///
/// Iteration order is survey declaration order; it determines template column
/// order but has no effect on the shape of encoded XML.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    entries: Vec<SchemaEntry>,
    index: HashMap<String, usize>,
    choice_lists: Vec<ChoiceList>,
}

impl SchemaMap {
    /// Flattens a survey definition.
    pub fn from_survey(survey: &SurveyDefinition) -> Self {
        flatten(&survey.questions, &survey.choice_lists)
    }

    fn push(&mut self, entry: SchemaEntry) {
        if self.index.contains_key(&entry.path) {
            debug!(path = %entry.path, "Skipping duplicate schema path");
            return;
        }
        self.index.insert(entry.path.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaEntry> {
        self.entries.iter()
    }

    /// Column paths in declaration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&SchemaEntry> {
        self.index.get(path).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Choice lists carried over from the survey definition.
    pub fn choice_lists(&self) -> &[ChoiceList] {
        &self.choice_lists
    }

    /// Lists select tokens in `row` that are not declared in their choice list.
    ///
    /// Questions whose list is not present in the survey are not checked.
    pub fn unknown_choices(&self, row: &Row) -> Vec<UnknownChoice> {
        let mut unknown = Vec::new();
        for entry in &self.entries {
            let question_type = entry.question_type();
            if !matches!(
                question_type,
                QuestionType::SelectOne | QuestionType::SelectMultiple
            ) {
                continue;
            }
            let Some(list_name) = entry.choice_list.as_deref() else {
                continue;
            };
            let Some(list) = self.choice_lists.iter().find(|l| l.name == list_name) else {
                continue;
            };
            let Some(value) = row.value(&entry.path) else {
                continue;
            };
            let tokens: Vec<&str> = if question_type == QuestionType::SelectMultiple {
                split_select_tokens(value).collect()
            } else {
                vec![value]
            };
            for token in tokens {
                if !list.contains(token) {
                    unknown.push(UnknownChoice {
                        path: entry.path.clone(),
                        list_name: list_name.to_string(),
                        token: token.to_string(),
                    });
                }
            }
        }
        unknown
    }
}

impl<'a> IntoIterator for &'a SchemaMap {
    type Item = &'a SchemaEntry;
    type IntoIter = std::slice::Iter<'a, SchemaEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Splits a select_multiple cell on commas and whitespace, dropping empty tokens.
pub fn split_select_tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// Flattens survey questions into ordered schema entries.
///
/// Never fails: unbalanced markers and unnamed questions are skipped.
pub fn flatten(questions: &[QuestionNode], choice_lists: &[ChoiceList]) -> SchemaMap {
    let mut schema = SchemaMap {
        choice_lists: choice_lists.to_vec(),
        ..Default::default()
    };
    let mut stack: Vec<&str> = Vec::new();

    for question in questions {
        let question_type = question.question_type();

        if question_type.opens_scope() {
            stack.push(question.name.as_deref().unwrap_or(UNNAMED_GROUP));
            continue;
        }
        if question_type.closes_scope() {
            if stack.pop().is_none() {
                debug!("Ignoring close marker without an open group");
            }
            continue;
        }

        let Some(name) = question.data_name() else {
            continue;
        };
        let path = if stack.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", stack.join("/"), name)
        };

        match question_type {
            QuestionType::Geopoint => {
                for component in GeoComponent::ALL {
                    schema.push(SchemaEntry::new(component.column(&path), question));
                }
            }
            QuestionType::SelectOne | QuestionType::SelectMultiple => {
                let mut entry = SchemaEntry::new(path, question);
                entry.choice_list = question.list_name().map(str::to_string);
                schema.push(entry);
            }
            _ => schema.push(SchemaEntry::new(path, question)),
        }
    }

    if !stack.is_empty() {
        debug!(open_groups = stack.len(), "Survey ended with unclosed groups");
    }

    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(type_name: &str, name: &str) -> QuestionNode {
        QuestionNode::new(type_name, name)
    }

    #[test]
    fn test_geo_component_split() {
        assert_eq!(
            GeoComponent::split("g/loc_latitude"),
            Some(("g/loc", GeoComponent::Latitude))
        );
        assert_eq!(
            GeoComponent::split("loc_precision"),
            Some(("loc", GeoComponent::Precision))
        );
        assert_eq!(GeoComponent::split("_latitude"), None);
        assert_eq!(GeoComponent::split("location"), None);
    }

    #[test]
    fn test_flatten_paths_and_order() {
        let questions = vec![
            q("text", "intro"),
            q("begin_group", "hh"),
            q("integer", "members"),
            q("begin_repeat", "person"),
            q("text", "person_name"),
            QuestionNode::marker("end_repeat"),
            QuestionNode::marker("end_group"),
            q("date", "visit"),
        ];
        let schema = flatten(&questions, &[]);
        let paths: Vec<&str> = schema.paths().collect();
        assert_eq!(
            paths,
            vec!["intro", "hh/members", "hh/person/person_name", "visit"]
        );
    }

    #[test]
    fn test_flatten_tolerates_unbalanced_markers() {
        let questions = vec![
            QuestionNode::marker("end_group"),
            q("text", "a"),
            QuestionNode::marker("begin_group"),
            q("text", "b"),
        ];
        let schema = flatten(&questions, &[]);
        let paths: Vec<&str> = schema.paths().collect();
        assert_eq!(paths, vec!["a", "group/b"]);
    }

    #[test]
    fn test_flatten_skips_reserved_and_unnamed() {
        let questions = vec![
            q("start", "_start"),
            QuestionNode::marker("text"),
            q("text", "kept"),
        ];
        let schema = flatten(&questions, &[]);
        assert_eq!(schema.len(), 1);
        assert!(schema.contains("kept"));
    }

    #[test]
    fn test_duplicate_paths_keep_first() {
        let questions = vec![q("text", "a"), q("integer", "a")];
        let schema = flatten(&questions, &[]);
        assert_eq!(schema.len(), 1);
        assert_eq!(
            schema.get("a").unwrap().question.type_name.as_deref(),
            Some("text")
        );
    }

    #[test]
    fn test_select_multiple_records_choice_list() {
        let questions = vec![q("select_multiple", "fruit").with_list("fruits")];
        let schema = flatten(&questions, &[]);
        assert_eq!(schema.len(), 1);
        assert_eq!(
            schema.get("fruit").unwrap().choice_list.as_deref(),
            Some("fruits")
        );
    }

    #[test]
    fn test_shorthand_list_name() {
        let questions = vec![q("select_one yes_no", "ok"), q("select_multiple  fruits ", "f")];
        let schema = flatten(&questions, &[]);
        assert_eq!(schema.get("ok").unwrap().choice_list.as_deref(), Some("yes_no"));
        assert_eq!(schema.get("f").unwrap().choice_list.as_deref(), Some("fruits"));
    }

    #[test]
    fn test_split_select_tokens() {
        let tokens: Vec<&str> = split_select_tokens(" a, b,c\td ,,").collect();
        assert_eq!(tokens, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_unknown_choices() {
        let questions = vec![
            q("select_multiple", "fruit").with_list("fruits"),
            q("select_one", "yn").with_list("yes_no"),
            q("select_one", "free").with_list("undeclared"),
        ];
        let lists = vec![
            ChoiceList {
                name: "fruits".into(),
                options: vec!["apple".into(), "pear".into()],
            },
            ChoiceList {
                name: "yes_no".into(),
                options: vec!["yes".into(), "no".into()],
            },
        ];
        let schema = flatten(&questions, &lists);
        let row = Row::new()
            .with("fruit", "apple, kiwi")
            .with("yn", "maybe")
            .with("free", "anything");
        let unknown = schema.unknown_choices(&row);
        assert_eq!(unknown.len(), 2);
        assert_eq!(unknown[0].token, "kiwi");
        assert_eq!(unknown[1].path, "yn");
    }
}
