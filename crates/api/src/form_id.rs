//! Picking the form identifier submissions are routed to.

use kobo_xform::Asset;
use tracing::{debug, warn};

use crate::client::KoboApi;
use crate::error::Result;
use crate::models::KcForm;

/// Chooses the form ID for `asset` given the deployed forms.
///
/// The asset's own `id_string` wins. Otherwise the single deployed form whose title
/// equals the asset name is used, and failing that the only deployed form.
pub fn choose_form_id(asset: &Asset, forms: &[KcForm]) -> Option<String> {
    if let Some(hint) = asset.form_id_hint() {
        return Some(hint.to_string());
    }

    let name = asset.display_name();
    let mut matches = forms
        .iter()
        .filter(|f| f.title.as_deref() == Some(name))
        .filter_map(KcForm::id_string);
    if let (Some(id), None) = (matches.next(), matches.next()) {
        return Some(id.to_string());
    }

    match forms {
        [only] => only.id_string().map(str::to_string),
        _ => None,
    }
}

/// Resolves the form ID for `asset`, consulting the deployed form list.
///
/// A declared `id_string` is returned even when the form list does not contain it
/// or cannot be fetched.
pub async fn resolve_form_id<A>(api: &A, asset: &Asset) -> Result<Option<String>>
where
    A: KoboApi + ?Sized,
{
    if let Some(hint) = asset.form_id_hint() {
        match api.list_kc_forms().await {
            Ok(forms) if forms.iter().any(|f| f.id_string() == Some(hint)) => {
                debug!(form_id = %hint, "Form ID confirmed by deployed forms");
            }
            Ok(_) => warn!(form_id = %hint, "Form ID not among deployed forms, using it anyway"),
            Err(err) => debug!(error = %err, "Could not list deployed forms"),
        }
        return Ok(Some(hint.to_string()));
    }

    let forms = api.list_kc_forms().await?;
    let chosen = choose_form_id(asset, &forms);
    debug!(asset = %asset.uid, forms = forms.len(), form_id = ?chosen, "Resolved form ID from deployed forms");
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asset(value: serde_json::Value) -> Asset {
        Asset::from_json(value).unwrap()
    }

    #[test]
    fn test_declared_id_wins() {
        let asset = asset(json!({"uid": "a", "content": {"settings": {"id_string": "declared"}}}));
        let forms = vec![KcForm::new("other", "Other")];
        assert_eq!(choose_form_id(&asset, &forms).as_deref(), Some("declared"));
    }

    #[test]
    fn test_unique_title_match() {
        let asset = asset(json!({"uid": "a", "name": "Household"}));
        let forms = vec![
            KcForm::new("hh_v1", "Household"),
            KcForm::new("market", "Market"),
        ];
        assert_eq!(choose_form_id(&asset, &forms).as_deref(), Some("hh_v1"));
    }

    #[test]
    fn test_ambiguous_title_and_single_form() {
        let asset = asset(json!({"uid": "a", "name": "Household"}));
        let forms = vec![
            KcForm::new("hh_v1", "Household"),
            KcForm::new("hh_v2", "Household"),
        ];
        assert_eq!(choose_form_id(&asset, &forms), None);

        let forms = vec![KcForm::new("only", "Unrelated")];
        assert_eq!(choose_form_id(&asset, &forms).as_deref(), Some("only"));
        assert_eq!(choose_form_id(&asset, &[]), None);
    }
}
