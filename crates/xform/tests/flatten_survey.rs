//! Flattening of realistic asset JSON into template columns.

use kobo_xform::{Asset, GeoComponent, QuestionType, SYSTEM_COLUMNS, Template};
use serde_json::json;

fn household_asset() -> Asset {
    Asset::from_json(json!({
        "uid": "aHouse01",
        "name": "Household survey",
        "kind": "asset",
        "content": {
            "survey": [
                {"type": "start", "name": "_start"},
                {"type": "geopoint", "name": "location", "label": ["Location"]},
                {"type": "select_multiple", "name": "assets", "select_from_list_name": "asset_list"},
                {"type": "begin_group", "name": "household"},
                {"type": "integer", "name": "adults"},
                {"type": "integer", "name": "children"},
                {"type": "end_group"},
                {"type": "note"}
            ],
            "choices": [
                {"list_name": "asset_list", "name": "radio", "label": ["Radio"]},
                {"list_name": "asset_list", "name": "bicycle", "label": ["Bicycle"]}
            ],
            "settings": {"id_string": "household_v1"}
        }
    }))
    .unwrap()
}

#[test]
fn test_column_count_geopoint_select_group() {
    let template = Template::from_asset(&household_asset());
    assert_eq!(template.schema().len(), 4 + 1 + 2);
    assert_eq!(template.columns().len(), 7 + SYSTEM_COLUMNS.len());
}

#[test]
fn test_column_order_follows_declaration() {
    let template = Template::from_asset(&household_asset());
    assert_eq!(
        template.columns(),
        &[
            "location_latitude",
            "location_longitude",
            "location_altitude",
            "location_precision",
            "assets",
            "household/adults",
            "household/children",
            "meta/instanceID",
            "_uuid",
            "_id",
        ]
    );
}

#[test]
fn test_geopoint_entries_share_question() {
    let template = Template::from_asset(&household_asset());
    let geo: Vec<_> = template
        .schema()
        .iter()
        .filter_map(|e| e.geo_component().map(|(base, c)| (base, c, &e.question)))
        .collect();
    assert_eq!(geo.len(), 4);
    assert!(geo.iter().all(|(base, _, q)| *base == "location"
        && q.question_type() == QuestionType::Geopoint
        && q.name.as_deref() == Some("location")));
    let components: Vec<GeoComponent> = geo.iter().map(|(_, c, _)| *c).collect();
    assert_eq!(components, GeoComponent::ALL.to_vec());
}

#[test]
fn test_choice_lists_are_informational() {
    let asset = household_asset();
    let survey = asset.survey_definition();
    let list = survey.choice_list("asset_list").unwrap();
    assert_eq!(list.options, vec!["radio", "bicycle"]);

    let template = Template::from_asset(&asset);
    let entry = template.schema().get("assets").unwrap();
    assert_eq!(entry.choice_list.as_deref(), Some("asset_list"));
    assert_eq!(asset.form_id_hint(), Some("household_v1"));
}

#[test]
fn test_empty_and_missing_survey() {
    let asset = Asset::from_json(json!({"uid": "x", "content": {"survey": []}})).unwrap();
    let template = Template::from_asset(&asset);
    assert!(template.schema().is_empty());
    assert_eq!(template.columns(), &SYSTEM_COLUMNS);
}
