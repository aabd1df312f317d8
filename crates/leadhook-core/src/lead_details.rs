//! Lead detail lookups against the platform.
//!
//! A webhook delivery only carries ids. The answers a lead gave live on the
//! platform and are fetched on demand, together with the form they came from.

use crate::db::Database;
use crate::error::{LeadAdsError, Result};
use crate::graph::GraphApi;
use crate::settings;
use serde_json::{json, Map, Value};

/// Fetch a lead and its form. With `simplify`, answers are flattened into
/// a `data` map keyed by field name.
pub async fn fetch_lead_details(
    db: &Database,
    graph: &dyn GraphApi,
    leadgen_id: &str,
    simplify: bool,
) -> Result<Value> {
    let current = db.get_settings().await?;
    let token = settings::access_token(&current)?;

    let lead = graph
        .get_lead(&token, leadgen_id)
        .await
        .map_err(|e| LeadAdsError::Platform(format!("Failed to get lead details: {e:#}")))?;

    let form_id = match lead.get("form_id").and_then(Value::as_str) {
        Some(id) => Some(id.to_string()),
        None => db.get_lead(leadgen_id).await?.and_then(|l| l.form_id),
    };
    let form = match form_id {
        Some(form_id) => graph
            .get_form(&token, &form_id)
            .await
            .map_err(|e| LeadAdsError::Platform(format!("Failed to get form details: {e:#}")))?,
        None => Value::Object(Map::new()),
    };

    if simplify {
        Ok(simplify_lead_data(&lead, &form))
    } else {
        Ok(json!({
            "id": lead.get("id"),
            "field_data": lead.get("field_data"),
            "form": &form,
            "ad": { "id": lead.get("ad_id"), "name": lead.get("ad_name") },
            "adset": { "id": lead.get("adset_id"), "name": lead.get("adset_name") },
            "page": form.get("page"),
            "created_time": lead.get("created_time"),
        }))
    }
}

/// Flatten `field_data` into `{name: first value}` and keep the form, ad
/// and page summaries next to it.
pub fn simplify_lead_data(lead: &Value, form: &Value) -> Value {
    let mut data = Map::new();
    for field in lead
        .get("field_data")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(name) = field.get("name").and_then(Value::as_str) else {
            continue;
        };
        let first = field
            .get("values")
            .and_then(Value::as_array)
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or(Value::Null);
        data.insert(name.to_string(), first);
    }

    let mut simplified = json!({
        "id": lead.get("id"),
        "data": data,
        "form": {
            "id": form.get("id"),
            "name": form.get("name"),
            "locale": form.get("locale"),
            "status": form.get("status"),
        },
        "created_time": lead.get("created_time"),
    });

    let present = |key: &str| lead.get(key).is_some_and(|v| !v.is_null());
    if present("ad_id") {
        simplified["ad"] = json!({ "id": lead.get("ad_id"), "name": lead.get("ad_name") });
    }
    if present("adset_id") {
        simplified["adset"] = json!({ "id": lead.get("adset_id"), "name": lead.get("adset_name") });
    }
    if let Some(page) = form.get("page").filter(|p| !p.is_null()) {
        simplified["page"] = page.clone();
    }

    simplified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_data_is_flattened_to_first_values() {
        let lead = json!({
            "id": "l1",
            "created_time": "2025-01-01T00:00:00+0000",
            "ad_id": "a1",
            "ad_name": "Spring",
            "field_data": [
                { "name": "email", "values": ["a@example.com", "b@example.com"] },
                { "name": "full_name", "values": ["Ada"] },
                { "name": "phone_number", "values": [] },
                { "values": ["orphan"] }
            ]
        });
        let form = json!({
            "id": "f1",
            "name": "Signup",
            "status": "ACTIVE",
            "locale": "en_US",
            "page": { "id": "p1", "name": "Main" }
        });

        let out = simplify_lead_data(&lead, &form);
        assert_eq!(
            out["data"],
            json!({ "email": "a@example.com", "full_name": "Ada", "phone_number": null })
        );
        assert_eq!(out["form"]["name"], "Signup");
        assert_eq!(out["ad"], json!({ "id": "a1", "name": "Spring" }));
        assert!(out.get("adset").is_none());
        assert_eq!(out["page"]["id"], "p1");
    }

    #[test]
    fn missing_sections_stay_out() {
        let out = simplify_lead_data(&json!({ "id": "l1" }), &json!({}));
        assert_eq!(out["data"], json!({}));
        assert!(out.get("ad").is_none());
        assert!(out.get("page").is_none());
        assert!(out["form"]["id"].is_null());
    }
}
