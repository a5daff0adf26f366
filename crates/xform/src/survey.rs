//! Survey definition model.
//!
//! These types mirror the `content` block of a KoboToolbox asset as returned by the
//! KPI API. Every field is optional on the wire; missing keys decode to empty
//! values so that a partially populated asset still yields a (possibly empty)
//! schema instead of an error.
//!
//! ```json
//! {
//!   "uid": "aBcD1234",
//!   "name": "Household survey",
//!   "content": {
//!     "survey": [
//!       {"type": "begin_group", "name": "household"},
//!       {"type": "integer", "name": "members"},
//!       {"type": "end_group"},
//!       {"type": "select_multiple", "name": "assets", "select_from_list_name": "asset_list"}
//!     ],
//!     "choices": [
//!       {"list_name": "asset_list", "name": "radio"},
//!       {"list_name": "asset_list", "name": "bicycle"}
//!     ],
//!     "settings": {"id_string": "household_v1"}
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// A KoboToolbox asset (project) as listed or fetched from the KPI API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Asset {
    /// Asset UID used in KPI URLs.
    pub uid: String,
    /// Human readable project name.
    pub name: Option<String>,
    /// `"asset"` for projects, other values for library items.
    pub kind: Option<String>,
    /// Form content. Absent in list responses.
    pub content: Option<AssetContent>,
}

impl Asset {
    /// Parses an asset from its JSON representation.
    pub fn from_json(value: serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the `id_string` declared in the form settings, if any.
    pub fn form_id_hint(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.settings.id_string.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the display name, or `"(untitled)"`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(untitled)")
    }

    /// Returns true when this asset is a project rather than a library item.
    pub fn is_project(&self) -> bool {
        self.kind.as_deref() == Some("asset")
    }

    /// Returns the survey definition carried by this asset (empty when absent).
    pub fn survey_definition(&self) -> SurveyDefinition {
        match &self.content {
            Some(content) => SurveyDefinition {
                questions: content.survey.clone(),
                choice_lists: ChoiceList::group(&content.choices),
            },
            None => SurveyDefinition::default(),
        }
    }
}

/// The `content` block of an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetContent {
    pub survey: Vec<QuestionNode>,
    pub choices: Vec<ChoiceOption>,
    pub settings: AssetSettings,
}

/// Form-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Form identifier used to route submissions.
    pub id_string: Option<String>,
}

/// One row of the survey sheet: a question or a structural marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionNode {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub select_from_list_name: Option<String>,
}

impl QuestionNode {
    /// Creates a node with a name and a type tag.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            type_name: Some(type_name.into()),
            select_from_list_name: None,
        }
    }

    /// Creates a structural marker without a name (e.g. `end_group`).
    pub fn marker(type_name: impl Into<String>) -> Self {
        Self {
            name: None,
            type_name: Some(type_name.into()),
            select_from_list_name: None,
        }
    }

    /// Sets the referenced choice list.
    pub fn with_list(mut self, list_name: impl Into<String>) -> Self {
        self.select_from_list_name = Some(list_name.into());
        self
    }

    /// Referenced choice list: `select_from_list_name`, or the list named in a
    /// shorthand tag such as `"select_one yes_no"`.
    pub fn list_name(&self) -> Option<&str> {
        if let Some(list) = self
            .select_from_list_name
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            return Some(list);
        }
        let mut words = self.type_name.as_deref()?.split_whitespace();
        match (words.next(), words.next()) {
            (Some("select_one" | "select_multiple"), Some(list)) => Some(list),
            _ => None,
        }
    }

    /// Classifies the type tag.
    pub fn question_type(&self) -> QuestionType {
        QuestionType::parse(self.type_name.as_deref().unwrap_or_default())
    }

    /// Returns the name when present and not reserved (leading underscore).
    pub fn data_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty() && !n.starts_with('_'))
    }
}

/// Classification of a question type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    BeginGroup,
    EndGroup,
    BeginRepeat,
    EndRepeat,
    Geopoint,
    SelectOne,
    SelectMultiple,
    /// Any other data-bearing type (text, integer, date, ...).
    Other,
}

impl QuestionType {
    /// Classifies a raw type tag. Tags written with a space (`"begin group"`) are
    /// accepted as well as the underscore form.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        let head = tag.split_whitespace().next().unwrap_or_default();
        match tag.replace(' ', "_").as_str() {
            "begin_group" => Self::BeginGroup,
            "end_group" => Self::EndGroup,
            "begin_repeat" => Self::BeginRepeat,
            "end_repeat" => Self::EndRepeat,
            "geopoint" => Self::Geopoint,
            "select_one" => Self::SelectOne,
            "select_multiple" => Self::SelectMultiple,
            // XLSForm shorthand: "select_multiple list_name"
            _ if head == "select_multiple" => Self::SelectMultiple,
            _ if head == "select_one" => Self::SelectOne,
            _ => Self::Other,
        }
    }

    /// Returns true for markers that open a path segment.
    pub fn opens_scope(self) -> bool {
        matches!(self, Self::BeginGroup | Self::BeginRepeat)
    }

    /// Returns true for markers that close a path segment.
    pub fn closes_scope(self) -> bool {
        matches!(self, Self::EndGroup | Self::EndRepeat)
    }
}

/// One row of the choices sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceOption {
    pub list_name: Option<String>,
    pub name: Option<String>,
}

/// A named set of selectable option names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceList {
    pub name: String,
    pub options: Vec<String>,
}

impl ChoiceList {
    /// Groups flat choice rows by `list_name`, keeping first-seen list order and
    /// declaration order within each list. Rows without a list name are ignored.
    pub fn group(choices: &[ChoiceOption]) -> Vec<ChoiceList> {
        let mut lists: Vec<ChoiceList> = Vec::new();
        for choice in choices {
            let Some(list_name) = choice.list_name.as_deref() else {
                continue;
            };
            let idx = match lists.iter().position(|l| l.name == list_name) {
                Some(idx) => idx,
                None => {
                    lists.push(ChoiceList {
                        name: list_name.to_string(),
                        options: Vec::new(),
                    });
                    lists.len() - 1
                }
            };
            if let Some(name) = choice.name.as_deref() {
                lists[idx].options.push(name.to_string());
            }
        }
        lists
    }

    /// Returns true when `option` is declared in this list.
    pub fn contains(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// Questions plus choice lists: the input of the schema flattener.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyDefinition {
    pub questions: Vec<QuestionNode>,
    pub choice_lists: Vec<ChoiceList>,
}

impl SurveyDefinition {
    /// Looks up a choice list by name.
    pub fn choice_list(&self, name: &str) -> Option<&ChoiceList> {
        self.choice_lists.iter().find(|l| l.name == name)
    }
}
