//! Upload template derivation.

use crate::schema::SchemaMap;
use crate::survey::{Asset, SurveyDefinition};

/// Column carrying the canonical instance ID, used to target edits.
pub const INSTANCE_ID_COLUMN: &str = "meta/instanceID";
/// Column carrying the alternate UUID form of the submission ID.
pub const UUID_COLUMN: &str = "_uuid";
/// Column carrying the platform's numeric submission ID.
pub const NUMERIC_ID_COLUMN: &str = "_id";

/// Control columns appended to every template. They are not part of the schema.
pub const SYSTEM_COLUMNS: [&str; 3] = [INSTANCE_ID_COLUMN, UUID_COLUMN, NUMERIC_ID_COLUMN];

/// Template columns plus the schema map used to encode rows.
#[derive(Debug, Clone, Default)]
pub struct Template {
    columns: Vec<String>,
    schema: SchemaMap,
}

impl Template {
    /// Builds the template for a survey definition.
    pub fn from_survey(survey: &SurveyDefinition) -> Self {
        let schema = SchemaMap::from_survey(survey);
        let mut columns: Vec<String> = schema.paths().map(str::to_string).collect();
        for system in SYSTEM_COLUMNS {
            if !columns.iter().any(|c| c == system) {
                columns.push(system.to_string());
            }
        }
        Self { columns, schema }
    }

    /// Builds the template for an asset. Assets without content yield a template
    /// that only holds the system columns.
    pub fn from_asset(asset: &Asset) -> Self {
        Self::from_survey(&asset.survey_definition())
    }

    /// Header row, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    pub fn into_parts(self) -> (Vec<String>, SchemaMap) {
        (self.columns, self.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::QuestionNode;

    #[test]
    fn test_system_columns_appended_but_not_in_schema() {
        let survey = SurveyDefinition {
            questions: vec![QuestionNode::new("text", "name")],
            choice_lists: Vec::new(),
        };
        let template = Template::from_survey(&survey);
        assert_eq!(
            template.columns(),
            &["name", "meta/instanceID", "_uuid", "_id"]
        );
        assert_eq!(template.schema().len(), 1);
        assert!(!template.schema().contains(INSTANCE_ID_COLUMN));
    }

    #[test]
    fn test_system_column_not_duplicated() {
        let survey = SurveyDefinition {
            questions: vec![
                QuestionNode::new("begin_group", "meta"),
                QuestionNode::new("text", "instanceID"),
                QuestionNode::marker("end_group"),
            ],
            choice_lists: Vec::new(),
        };
        let template = Template::from_survey(&survey);
        let count = template
            .columns()
            .iter()
            .filter(|c| c.as_str() == INSTANCE_ID_COLUMN)
            .count();
        assert_eq!(count, 1);
        assert_eq!(template.columns().len(), 3);
    }

    #[test]
    fn test_empty_asset() {
        let template = Template::from_asset(&Asset::default());
        assert!(template.schema().is_empty());
        assert_eq!(template.columns().len(), 3);
    }
}
