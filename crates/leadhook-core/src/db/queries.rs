use crate::models::*;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool on `url` and bring the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await?;
        super::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database; a single connection keeps it alive.
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ── Settings ──

    pub async fn get_settings(&self) -> anyhow::Result<Settings> {
        let row = sqlx::query("SELECT * FROM settings WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        settings_from_row(&row)
    }

    pub async fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE settings SET enabled = ?, app_id = ?, app_secret = ?, verify_token = ?,
                webhook_callback_url = ?, webhook_is_active = ?, access_token = ?, token_expiry = ?,
                authorization_url = ?, access_token_url = ?, scope = ?, updated_at = ?
             WHERE id = 1",
        )
        .bind(settings.enabled)
        .bind(&settings.app_id)
        .bind(&settings.app_secret)
        .bind(&settings.verify_token)
        .bind(&settings.webhook_callback_url)
        .bind(settings.webhook_is_active)
        .bind(&settings.access_token)
        .bind(settings.token_expiry.map(|d| d.to_rfc3339()))
        .bind(&settings.authorization_url)
        .bind(&settings.access_token_url)
        .bind(&settings.scope)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Webhook Subscriptions ──

    pub async fn insert_subscription(&self, sub: &WebhookSubscription) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO webhook_subscriptions (name, page_id, form_id, enabled, verify_token, webhook_url,
                subscription_id, is_active, lead_count, last_lead_received, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sub.name)
        .bind(&sub.page_id)
        .bind(&sub.form_id)
        .bind(sub.enabled)
        .bind(&sub.verify_token)
        .bind(&sub.webhook_url)
        .bind(&sub.subscription_id)
        .bind(sub.is_active)
        .bind(sub.lead_count)
        .bind(sub.last_lead_received.map(|d| d.to_rfc3339()))
        .bind(sub.created_at.to_rfc3339())
        .bind(sub.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_subscription(&self, name: &str) -> anyhow::Result<Option<WebhookSubscription>> {
        let row = sqlx::query("SELECT * FROM webhook_subscriptions WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    pub async fn find_subscription_for_form(
        &self,
        page_id: &str,
        form_id: &str,
    ) -> anyhow::Result<Option<WebhookSubscription>> {
        let row = sqlx::query("SELECT * FROM webhook_subscriptions WHERE page_id = ? AND form_id = ?")
            .bind(page_id)
            .bind(form_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    pub async fn list_subscriptions(&self) -> anyhow::Result<Vec<WebhookSubscription>> {
        let rows = sqlx::query("SELECT * FROM webhook_subscriptions ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    pub async fn save_subscription(&self, sub: &WebhookSubscription) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE webhook_subscriptions SET page_id = ?, form_id = ?, enabled = ?, verify_token = ?,
                webhook_url = ?, subscription_id = ?, is_active = ?, updated_at = ?
             WHERE name = ?",
        )
        .bind(&sub.page_id)
        .bind(&sub.form_id)
        .bind(sub.enabled)
        .bind(&sub.verify_token)
        .bind(&sub.webhook_url)
        .bind(&sub.subscription_id)
        .bind(sub.is_active)
        .bind(sub.updated_at.to_rfc3339())
        .bind(&sub.name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_subscription(&self, name: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump the lead counter of the enabled subscription for this page/form.
    /// Returns false when no such subscription exists.
    pub async fn record_subscription_lead(
        &self,
        page_id: &str,
        form_id: &str,
    ) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE webhook_subscriptions SET lead_count = lead_count + 1, last_lead_received = ?, updated_at = ?
             WHERE page_id = ? AND form_id = ? AND enabled = 1",
        )
        .bind(&now)
        .bind(&now)
        .bind(page_id)
        .bind(form_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_active_subscriptions(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM webhook_subscriptions WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }

    // ── Leads ──

    /// Insert a lead unless one with the same `leadgen_id` exists. The
    /// UNIQUE constraint decides, so concurrent deliveries cannot both win.
    /// Returns the new lead, or `None` for a duplicate.
    pub async fn insert_lead_if_absent(
        &self,
        ids: &LeadgenIds,
        raw: &serde_json::Value,
    ) -> anyhow::Result<Option<Lead>> {
        let lead = Lead {
            id: Uuid::new_v4().to_string(),
            lead_id: format!("FB-{}", ids.leadgen_id),
            status: LeadStatus::New,
            leadgen_id: ids.leadgen_id.clone(),
            page_id: ids.page_id.clone(),
            form_id: ids.form_id.clone(),
            ad_id: ids.ad_id.clone(),
            adset_id: ids.adset_id.clone(),
            lead_data: serde_json::to_string_pretty(raw)?,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            "INSERT INTO leads (id, lead_id, status, leadgen_id, page_id, form_id, ad_id, adset_id, lead_data, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (leadgen_id) DO NOTHING",
        )
        .bind(&lead.id)
        .bind(&lead.lead_id)
        .bind(lead.status.as_str())
        .bind(&lead.leadgen_id)
        .bind(&lead.page_id)
        .bind(&lead.form_id)
        .bind(&lead.ad_id)
        .bind(&lead.adset_id)
        .bind(&lead.lead_data)
        .bind(lead.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok((result.rows_affected() > 0).then_some(lead))
    }

    pub async fn get_lead(&self, leadgen_id: &str) -> anyhow::Result<Option<Lead>> {
        let row = sqlx::query("SELECT * FROM leads WHERE leadgen_id = ?")
            .bind(leadgen_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(lead_from_row).transpose()
    }

    pub async fn list_leads(&self, limit: i64) -> anyhow::Result<Vec<Lead>> {
        let rows = sqlx::query("SELECT * FROM leads ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(lead_from_row).collect()
    }

    pub async fn count_leads(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM leads")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }

    // ── Pages ──

    pub async fn upsert_page(&self, page: &Page) -> anyhow::Result<()> {
        let tasks_json = serde_json::to_string(&page.tasks)?;
        sqlx::query(
            "INSERT INTO pages (page_id, name, category, business_id, business_name, tasks, page_access_token, synced_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (page_id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                business_id = excluded.business_id,
                business_name = excluded.business_name,
                tasks = excluded.tasks,
                page_access_token = excluded.page_access_token,
                synced_at = excluded.synced_at",
        )
        .bind(&page.page_id)
        .bind(&page.name)
        .bind(&page.category)
        .bind(&page.business_id)
        .bind(&page.business_name)
        .bind(&tasks_json)
        .bind(&page.page_access_token)
        .bind(page.synced_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_pages(&self) -> anyhow::Result<Vec<Page>> {
        let rows = sqlx::query("SELECT * FROM pages ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(page_from_row).collect()
    }
}

// ── Row mapping helpers ──

fn parse_ts(value: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn parse_opt_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|d| parse_ts(&d).ok())
}

fn settings_from_row(row: &SqliteRow) -> anyhow::Result<Settings> {
    let updated_at: String = row.get("updated_at");

    Ok(Settings {
        enabled: row.get("enabled"),
        app_id: row.get("app_id"),
        app_secret: row.get("app_secret"),
        verify_token: row.get("verify_token"),
        webhook_callback_url: row.get("webhook_callback_url"),
        webhook_is_active: row.get("webhook_is_active"),
        access_token: row.get("access_token"),
        token_expiry: parse_opt_ts(row.get("token_expiry")),
        authorization_url: row.get("authorization_url"),
        access_token_url: row.get("access_token_url"),
        scope: row.get("scope"),
        updated_at: parse_ts(&updated_at)?,
    })
}

fn subscription_from_row(row: &SqliteRow) -> anyhow::Result<WebhookSubscription> {
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(WebhookSubscription {
        name: row.get("name"),
        page_id: row.get("page_id"),
        form_id: row.get("form_id"),
        enabled: row.get("enabled"),
        verify_token: row.get("verify_token"),
        webhook_url: row.get("webhook_url"),
        subscription_id: row.get("subscription_id"),
        is_active: row.get("is_active"),
        lead_count: row.get("lead_count"),
        last_lead_received: parse_opt_ts(row.get("last_lead_received")),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn lead_from_row(row: &SqliteRow) -> anyhow::Result<Lead> {
    let created_at: String = row.get("created_at");
    let status_str: String = row.get("status");

    Ok(Lead {
        id: row.get("id"),
        lead_id: row.get("lead_id"),
        status: LeadStatus::from_str(&status_str).unwrap_or(LeadStatus::New),
        leadgen_id: row.get("leadgen_id"),
        page_id: row.get("page_id"),
        form_id: row.get("form_id"),
        ad_id: row.get("ad_id"),
        adset_id: row.get("adset_id"),
        lead_data: row.get("lead_data"),
        created_at: parse_ts(&created_at)?,
    })
}

fn page_from_row(row: &SqliteRow) -> anyhow::Result<Page> {
    let tasks_str: String = row.get("tasks");
    let synced_at: String = row.get("synced_at");

    Ok(Page {
        page_id: row.get("page_id"),
        name: row.get("name"),
        category: row.get("category"),
        business_id: row.get("business_id"),
        business_name: row.get("business_name"),
        tasks: serde_json::from_str(&tasks_str).unwrap_or_default(),
        page_access_token: row.get("page_access_token"),
        synced_at: parse_ts(&synced_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(leadgen_id: &str) -> LeadgenIds {
        LeadgenIds {
            leadgen_id: leadgen_id.to_string(),
            page_id: Some("p1".to_string()),
            form_id: Some("f1".to_string()),
            ad_id: None,
            adset_id: None,
        }
    }

    #[tokio::test]
    async fn settings_row_is_seeded() {
        let db = Database::in_memory().await.unwrap();
        let settings = db.get_settings().await.unwrap();
        assert!(!settings.enabled);
        assert!(settings.verify_token.is_none());
        assert!(settings.access_token_url.contains("oauth/access_token"));
    }

    #[tokio::test]
    async fn duplicate_leadgen_id_is_not_inserted() {
        let db = Database::in_memory().await.unwrap();
        let raw = json!({ "leadgen_id": "L1" });

        let first = db.insert_lead_if_absent(&ids("L1"), &raw).await.unwrap();
        let second = db.insert_lead_if_absent(&ids("L1"), &raw).await.unwrap();

        let first = first.expect("first delivery creates the lead");
        assert_eq!(first.lead_id, "FB-L1");
        assert_eq!(first.status, LeadStatus::New);
        assert!(second.is_none());
        assert_eq!(db.count_leads().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lead_counter_only_touches_enabled_subscription() {
        let db = Database::in_memory().await.unwrap();
        let now = Utc::now();
        let mut sub = WebhookSubscription {
            name: "p1_f1".to_string(),
            page_id: "p1".to_string(),
            form_id: "f1".to_string(),
            enabled: false,
            verify_token: "t".to_string(),
            webhook_url: "http://localhost/api/webhook".to_string(),
            subscription_id: None,
            is_active: false,
            lead_count: 0,
            last_lead_received: None,
            created_at: now,
            updated_at: now,
        };
        db.insert_subscription(&sub).await.unwrap();
        assert!(!db.record_subscription_lead("p1", "f1").await.unwrap());

        sub.enabled = true;
        db.save_subscription(&sub).await.unwrap();
        assert!(db.record_subscription_lead("p1", "f1").await.unwrap());
        assert!(db.record_subscription_lead("p1", "f1").await.unwrap());

        let stored = db.get_subscription("p1_f1").await.unwrap().unwrap();
        assert_eq!(stored.lead_count, 2);
        assert!(stored.last_lead_received.is_some());
    }
}
