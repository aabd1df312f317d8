use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(
        "
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            enabled INTEGER NOT NULL DEFAULT 0,
            app_id TEXT,
            app_secret TEXT,
            verify_token TEXT,
            webhook_callback_url TEXT,
            webhook_is_active INTEGER NOT NULL DEFAULT 0,
            access_token TEXT,
            token_expiry TEXT,
            authorization_url TEXT NOT NULL DEFAULT 'https://www.facebook.com/v24.0/dialog/oauth',
            access_token_url TEXT NOT NULL DEFAULT 'https://graph.facebook.com/v24.0/oauth/access_token',
            scope TEXT NOT NULL DEFAULT 'leads_retrieval,pages_show_list,pages_manage_metadata,pages_read_engagement',
            updated_at TEXT NOT NULL
        );

        INSERT OR IGNORE INTO settings (id, updated_at) VALUES (1, strftime('%Y-%m-%dT%H:%M:%S+00:00', 'now'));

        CREATE TABLE IF NOT EXISTS webhook_subscriptions (
            name TEXT PRIMARY KEY,
            page_id TEXT NOT NULL,
            form_id TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 0,
            verify_token TEXT NOT NULL,
            webhook_url TEXT NOT NULL,
            subscription_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 0,
            lead_count INTEGER NOT NULL DEFAULT 0,
            last_lead_received TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (page_id, form_id)
        );

        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'New',
            leadgen_id TEXT NOT NULL UNIQUE,
            page_id TEXT,
            form_id TEXT,
            ad_id TEXT,
            adset_id TEXT,
            lead_data TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pages (
            page_id TEXT PRIMARY KEY,
            name TEXT,
            category TEXT,
            business_id TEXT,
            business_name TEXT,
            tasks TEXT NOT NULL DEFAULT '[]',
            page_access_token TEXT,
            synced_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at);
        CREATE INDEX IF NOT EXISTS idx_leads_page_form ON leads(page_id, form_id);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_active ON webhook_subscriptions(is_active);
        ",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed");
    Ok(())
}
