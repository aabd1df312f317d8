use crate::db::Database;
use crate::error::{LeadAdsError, Result};
use crate::generate_token;
use crate::graph::{GraphApi, NewAppSubscription};
use crate::models::{CreateSubscription, UpdateSubscription, WebhookSubscription};
use crate::settings::{self, VERIFY_TOKEN_LEN};
use chrono::Utc;
use std::sync::Arc;

const LEADGEN_FIELD: &str = "leadgen";

/// Owns the lifecycle of webhook subscription records and keeps the
/// platform-side registration in step with the `enabled` flag.
#[derive(Clone)]
pub struct SubscriptionManager {
    db: Database,
    graph: Arc<dyn GraphApi>,
    webhook_url: String,
}

impl SubscriptionManager {
    pub fn new(db: Database, graph: Arc<dyn GraphApi>, webhook_url: impl Into<String>) -> Self {
        Self {
            db,
            graph,
            webhook_url: webhook_url.into(),
        }
    }

    pub async fn list(&self) -> Result<Vec<WebhookSubscription>> {
        Ok(self.db.list_subscriptions().await?)
    }

    pub async fn get(&self, name: &str) -> Result<WebhookSubscription> {
        self.db
            .get_subscription(name)
            .await?
            .ok_or_else(|| LeadAdsError::NotFound(format!("Webhook subscription {name}")))
    }

    /// Create a record with a fresh verify token. Subscribes right away when
    /// created enabled; the stored record stays disabled if that fails.
    pub async fn create(&self, input: CreateSubscription) -> Result<WebhookSubscription> {
        let name = input
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{}_{}", input.page_id, input.form_id));
        let now = Utc::now();
        let mut sub = WebhookSubscription {
            name,
            page_id: input.page_id,
            form_id: input.form_id,
            enabled: input.enabled,
            verify_token: generate_token(VERIFY_TOKEN_LEN),
            webhook_url: self.webhook_url.clone(),
            subscription_id: None,
            is_active: false,
            lead_count: 0,
            last_lead_received: None,
            created_at: now,
            updated_at: now,
        };

        self.validate(&sub).await?;
        if self.db.get_subscription(&sub.name).await?.is_some() {
            return Err(LeadAdsError::Validation(format!(
                "Webhook subscription {} already exists",
                sub.name
            )));
        }
        self.check_form_unclaimed(&sub).await?;

        // Stored disabled until the platform accepts the subscription.
        let wants_enabled = std::mem::replace(&mut sub.enabled, false);
        self.db.insert_subscription(&sub).await?;
        tracing::info!(name = %sub.name, page_id = %sub.page_id, form_id = %sub.form_id, "Webhook subscription created");

        if wants_enabled {
            sub.enabled = true;
            self.subscribe(&mut sub).await?;
        }
        Ok(sub)
    }

    /// Apply changes. Toggling `enabled` subscribes or unsubscribes; the
    /// stored verify token is reused. A failed toggle keeps the previous
    /// `enabled` so the next request retries it.
    pub async fn update(&self, name: &str, input: UpdateSubscription) -> Result<WebhookSubscription> {
        let mut sub = self.get(name).await?;
        let was_enabled = sub.enabled;

        if let Some(page_id) = input.page_id {
            sub.page_id = page_id;
        }
        if let Some(form_id) = input.form_id {
            sub.form_id = form_id;
        }
        if let Some(enabled) = input.enabled {
            sub.enabled = enabled;
        }

        self.validate(&sub).await?;
        self.check_form_unclaimed(&sub).await?;

        let toggled = match (was_enabled, sub.enabled) {
            (false, true) => self.subscribe(&mut sub).await,
            (true, false) => self.unsubscribe(&mut sub).await,
            _ => Ok(()),
        };
        if let Err(e) = toggled {
            sub.enabled = was_enabled;
            sub.updated_at = Utc::now();
            self.db.save_subscription(&sub).await?;
            return Err(e);
        }

        sub.updated_at = Utc::now();
        self.db.save_subscription(&sub).await?;
        Ok(sub)
    }

    /// Remove a record, unsubscribing first if it is live. A failed
    /// unsubscribe keeps the record.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let mut sub = self.get(name).await?;
        if sub.is_active {
            self.unsubscribe(&mut sub).await?;
        }
        self.db.delete_subscription(name).await?;
        tracing::info!(name, "Webhook subscription deleted");
        Ok(())
    }

    /// A page/form pair may back only one record.
    async fn check_form_unclaimed(&self, sub: &WebhookSubscription) -> Result<()> {
        match self.db.find_subscription_for_form(&sub.page_id, &sub.form_id).await? {
            Some(other) if other.name != sub.name => Err(LeadAdsError::Validation(format!(
                "Webhook subscription for page {} and form {} already exists ({})",
                sub.page_id, sub.form_id, other.name
            ))),
            _ => Ok(()),
        }
    }

    async fn validate(&self, sub: &WebhookSubscription) -> Result<()> {
        if !sub.enabled {
            return Ok(());
        }
        let settings = self.db.get_settings().await?;
        if !settings.enabled {
            return Err(LeadAdsError::Validation(
                "Please enable Facebook Lead Ads Settings first".to_string(),
            ));
        }
        if sub.page_id.trim().is_empty() {
            return Err(LeadAdsError::Validation("Page ID is required".to_string()));
        }
        if sub.form_id.trim().is_empty() {
            return Err(LeadAdsError::Validation("Form ID is required".to_string()));
        }
        Ok(())
    }

    /// Register the app webhook and install the app on the page. On failure
    /// the record stays inactive.
    pub async fn subscribe(&self, sub: &mut WebhookSubscription) -> Result<()> {
        let result = self.try_subscribe(sub).await;
        match result {
            Ok(subscription_id) => {
                sub.is_active = true;
                sub.subscription_id = subscription_id;
                sub.updated_at = Utc::now();
                self.db.save_subscription(sub).await?;
                tracing::info!(name = %sub.name, "Webhook subscription created successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(name = %sub.name, error = %e, "Facebook webhook subscription error");
                Err(LeadAdsError::Subscription(format!(
                    "Failed to subscribe webhook: {e:#}"
                )))
            }
        }
    }

    async fn try_subscribe(&self, sub: &WebhookSubscription) -> Result<Option<String>> {
        let settings = self.db.get_settings().await?;
        let creds = settings::app_credentials(&settings)?;
        let user_token = settings::access_token(&settings)?;

        let subscription_id = self
            .graph
            .create_app_subscription(
                &creds,
                &NewAppSubscription::leadgen(&sub.webhook_url, &sub.verify_token),
            )
            .await?;

        self.graph
            .install_app_on_page(&user_token, &sub.page_id, LEADGEN_FIELD)
            .await?;

        Ok(subscription_id)
    }

    /// Delete the app's page subscription on the platform. No rollback of
    /// local state on failure.
    pub async fn unsubscribe(&self, sub: &mut WebhookSubscription) -> Result<()> {
        let result = async {
            let settings = self.db.get_settings().await?;
            let creds = settings::app_credentials(&settings)?;
            self.graph.delete_app_subscription(&creds, "page").await?;
            Ok::<_, LeadAdsError>(())
        }
        .await;

        match result {
            Ok(()) => {
                sub.is_active = false;
                sub.subscription_id = None;
                sub.updated_at = Utc::now();
                self.db.save_subscription(sub).await?;
                tracing::info!(name = %sub.name, "Webhook subscription removed successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(name = %sub.name, error = %e, "Facebook webhook unsubscription error");
                Err(LeadAdsError::Subscription(format!(
                    "Failed to unsubscribe webhook: {e:#}"
                )))
            }
        }
    }
}
