//! Lead event ingestion.
//!
//! A delivery is `{object, entry: [{id, changes: [{field, value}]}]}`. Each
//! `leadgen` change becomes at most one lead record (keyed by `leadgen_id`)
//! and one realtime event.
//!
//! Record creation failures, including a leadgen change without a usable
//! `leadgen_id`, are logged and skipped. An entry or change that cannot be
//! walked at all is a payload error that stops the loop: siblings after it
//! are not processed, siblings before it stay committed.

use crate::context::RequestContext;
use crate::db::Database;
use crate::error::{LeadAdsError, Result};
use crate::meta_log::SiteLogger;
use crate::models::{LeadgenIds, RealtimeEvent};
use chrono::Utc;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::sync::broadcast;

pub const INVALID_PAYLOAD: &str = "Invalid payload";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// False when the delivery was for another object type and ignored.
    pub handled: bool,
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub events: usize,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default, deserialize_with = "opt_id")]
    id: Option<String>,
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    field: Value,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct LeadgenValue {
    #[serde(deserialize_with = "required_id")]
    leadgen_id: String,
    #[serde(default, deserialize_with = "opt_id")]
    page_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    form_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    ad_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    adset_id: Option<String>,
}

impl From<LeadgenValue> for LeadgenIds {
    fn from(v: LeadgenValue) -> Self {
        Self {
            leadgen_id: v.leadgen_id,
            page_id: v.page_id,
            form_id: v.form_id,
            ad_id: v.ad_id,
            adset_id: v.adset_id,
        }
    }
}

/// Parse a request body. Anything that is not JSON, or is an empty JSON
/// value (`null`, `false`, `0`, `""`, `[]`, `{}`), is rejected.
pub fn parse_body(body: &[u8]) -> Result<Value> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|_| LeadAdsError::Payload(INVALID_PAYLOAD.to_string()))?;
    if is_empty_value(&payload) {
        return Err(LeadAdsError::Payload(INVALID_PAYLOAD.to_string()));
    }
    Ok(payload)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

pub async fn process_payload(
    db: &Database,
    log: &SiteLogger,
    events: &broadcast::Sender<RealtimeEvent>,
    ctx: &RequestContext,
    payload: &Value,
) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome::default();

    let object = payload.get("object").and_then(Value::as_str);
    if object != Some("page") {
        log.info(format!("Non-page event received: {object:?}"));
        return Ok(outcome);
    }
    outcome.handled = true;

    let entries = match payload.get("entry") {
        None => &[][..],
        Some(Value::Array(entries)) => entries.as_slice(),
        Some(_) => {
            return Err(LeadAdsError::Payload(
                "'entry' must be a list".to_string(),
            ))
        }
    };

    for raw_entry in entries {
        process_entry(db, log, events, ctx, raw_entry, &mut outcome).await?;
    }

    log.info("Facebook Lead Event processed successfully");
    Ok(outcome)
}

async fn process_entry(
    db: &Database,
    log: &SiteLogger,
    events: &broadcast::Sender<RealtimeEvent>,
    ctx: &RequestContext,
    raw_entry: &Value,
    outcome: &mut IngestOutcome,
) -> Result<()> {
    let entry = Entry::deserialize(raw_entry)
        .map_err(|e| LeadAdsError::Payload(format!("Malformed entry: {e}")))?;
    let entry_id = entry.id.as_deref().unwrap_or("?");

    log.info(format!(
        "Processing entry {entry_id} with {} changes",
        entry.changes.len()
    ));

    for change in entry.changes {
        if change.field.as_str() != Some("leadgen") {
            log.info(format!("Skipping non-leadgen change: {}", change.field));
            continue;
        }

        let value = match change.value {
            Value::Null => Value::Object(Default::default()),
            value @ Value::Object(_) => value,
            other => {
                return Err(LeadAdsError::Payload(format!(
                    "Malformed leadgen change in entry {entry_id}: expected an object, got {other}"
                )))
            }
        };

        let ids: LeadgenIds = match LeadgenValue::deserialize(&value) {
            Ok(v) => v.into(),
            Err(e) => {
                let err = LeadAdsError::Persistence(format!("bad leadgen change in entry {entry_id}: {e}"));
                log.error(err.to_string());
                outcome.failed += 1;
                continue;
            }
        };

        log.info(format!(
            "Received lead {} from page {:?}, form {:?}",
            ids.leadgen_id, ids.page_id, ids.form_id
        ));
        log.info(format!(
            "Lead data: {}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        ));

        match create_lead(db, log, &ids, &value).await {
            Ok(true) => outcome.created += 1,
            Ok(false) => outcome.duplicates += 1,
            Err(e) => {
                log.error(e.to_string());
                outcome.failed += 1;
            }
        }

        // Sending with no subscribers is not an error here.
        let _ = events.send(RealtimeEvent::LeadReceived {
            leadgen_id: ids.leadgen_id.clone(),
            page_id: ids.page_id.clone(),
            form_id: ids.form_id.clone(),
            timestamp: Utc::now(),
            user: ctx.user.clone(),
        });
        outcome.events += 1;
    }

    Ok(())
}

/// Insert the lead if it is new. `Ok(false)` for a duplicate delivery.
async fn create_lead(
    db: &Database,
    log: &SiteLogger,
    ids: &LeadgenIds,
    raw: &Value,
) -> Result<bool> {
    let created = db
        .insert_lead_if_absent(ids, raw)
        .await
        .map_err(|e| LeadAdsError::Persistence(e.to_string()))?;

    let Some(lead) = created else {
        log.info(format!("Facebook Lead {} already exists, skipping", ids.leadgen_id));
        return Ok(false);
    };
    log.info(format!(
        "Created Facebook Lead {} for lead {}",
        lead.lead_id, lead.leadgen_id
    ));

    if let (Some(page_id), Some(form_id)) = (&ids.page_id, &ids.form_id) {
        match db.record_subscription_lead(page_id, form_id).await {
            Ok(true) => {}
            Ok(false) => log.info(format!(
                "No webhook subscription for page {page_id} and form {form_id}"
            )),
            Err(e) => log.warning(format!("Failed to update subscription lead count: {e}")),
        }
    }

    Ok(true)
}

fn opt_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected an id, got {other}"))),
    }
}

fn required_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    opt_id(d)?.ok_or_else(|| D::Error::custom("id must not be null"))
}
