use crate::db::Database;
use crate::error::{LeadAdsError, Result};
use crate::graph::GraphApi;
use crate::models::{FormList, LeadForm, Page, SyncReport};
use crate::settings;
use chrono::Utc;
use serde_json::Value;

/// Pull the pages the stored user token can manage and upsert them.
/// Individual bad rows are counted, a failed page fetch stops paging.
pub async fn sync_pages(db: &Database, graph: &dyn GraphApi) -> Result<SyncReport> {
    let current = db.get_settings().await?;
    let token = settings::access_token(&current)?;

    let mut report = SyncReport {
        total_processed: 0,
        failures: 0,
        last_error: None,
    };
    let mut after: Option<String> = None;

    loop {
        let batch = match graph.list_pages(&token, after.as_deref()).await {
            Ok(batch) => batch,
            Err(e) => {
                report.failures += 1;
                report.last_error = Some(format!("{e:#}"));
                break;
            }
        };

        for item in &batch.data {
            report.total_processed += 1;
            let result = match page_from_account(item) {
                Some(page) => db.upsert_page(&page).await,
                None => Err(anyhow::anyhow!("Page without id: {item}")),
            };
            if let Err(e) = result {
                report.failures += 1;
                report.last_error = Some(e.to_string());
            }
        }

        match batch.after {
            Some(cursor) if !batch.data.is_empty() => after = Some(cursor),
            _ => break,
        }
    }

    tracing::info!(
        total = report.total_processed,
        failures = report.failures,
        "Page accounts synced"
    );
    Ok(report)
}

/// List one batch of lead forms for `page_id`.
pub async fn list_forms(
    db: &Database,
    graph: &dyn GraphApi,
    page_id: &str,
    after: Option<&str>,
) -> Result<FormList> {
    let current = db.get_settings().await?;
    let token = settings::access_token(&current)?;

    let batch = graph
        .list_forms(&token, page_id, after)
        .await
        .map_err(|e| LeadAdsError::Platform(format!("Failed to get form list: {e:#}")))?;

    let forms = batch.data.iter().filter_map(form_from_item).collect();
    Ok(FormList {
        page_id: page_id.to_string(),
        forms,
        after: batch.after,
    })
}

fn form_from_item(item: &Value) -> Option<LeadForm> {
    let text = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
    Some(LeadForm {
        id: text("id")?,
        name: text("name"),
        status: text("status"),
        locale: text("locale"),
    })
}

fn page_from_account(item: &Value) -> Option<Page> {
    let text = |pointer: &str| item.pointer(pointer).and_then(Value::as_str).map(str::to_string);

    Some(Page {
        page_id: text("/id")?,
        name: text("/name"),
        category: text("/category"),
        business_id: text("/business/id"),
        business_name: text("/business/name"),
        tasks: item
            .get("tasks")
            .and_then(Value::as_array)
            .map(|tasks| {
                tasks
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        page_access_token: text("/access_token"),
        synced_at: Utc::now(),
    })
}
