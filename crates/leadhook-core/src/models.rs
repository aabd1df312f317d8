use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Settings ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub enabled: bool,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub verify_token: Option<String>,
    pub webhook_callback_url: Option<String>,
    pub webhook_is_active: bool,
    pub access_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub authorization_url: String,
    pub access_token_url: String,
    pub scope: String,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// Copy safe to hand to the admin UI: secrets replaced by a mask.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        Self {
            app_secret: mask(&self.app_secret),
            access_token: mask(&self.access_token),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettings {
    pub enabled: Option<bool>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub authorization_url: Option<String>,
    pub access_token_url: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatus {
    pub has_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_long_lived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ── Webhook Subscriptions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub name: String,
    pub page_id: String,
    pub form_id: String,
    pub enabled: bool,
    pub verify_token: String,
    pub webhook_url: String,
    pub subscription_id: Option<String>,
    pub is_active: bool,
    pub lead_count: i64,
    pub last_lead_received: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSubscription {
    pub name: Option<String>,
    #[serde(default)]
    pub page_id: String,
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubscription {
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub enabled: Option<bool>,
}

// ── Leads ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
    New,
    Contacted,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::Converted => "Converted",
            Self::Lost => "Lost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "New" => Some(Self::New),
            "Contacted" => Some(Self::Contacted),
            "Converted" => Some(Self::Converted),
            "Lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub lead_id: String,
    pub status: LeadStatus,
    pub leadgen_id: String,
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub ad_id: Option<String>,
    pub adset_id: Option<String>,
    /// Raw change value as delivered, pretty-printed.
    pub lead_data: String,
    pub created_at: DateTime<Utc>,
}

/// Identifiers pulled out of one `leadgen` change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadgenIds {
    pub leadgen_id: String,
    pub page_id: Option<String>,
    pub form_id: Option<String>,
    pub ad_id: Option<String>,
    pub adset_id: Option<String>,
}

// ── Pages ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub business_id: Option<String>,
    pub business_name: Option<String>,
    pub tasks: Vec<String>,
    #[serde(skip_serializing)]
    pub page_access_token: Option<String>,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub total_processed: usize,
    pub failures: usize,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadForm {
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub locale: Option<String>,
}

/// One batch of a page's lead forms. Pass `after` back to continue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormList {
    pub page_id: String,
    pub forms: Vec<LeadForm>,
    pub after: Option<String>,
}

// ── Server Status ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub instance_name: String,
    pub site: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub enabled: bool,
    pub webhook_is_active: bool,
    pub total_leads: i64,
    pub active_subscriptions: usize,
}

// ── Realtime Events ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RealtimeEvent {
    LeadReceived {
        leadgen_id: String,
        page_id: Option<String>,
        form_id: Option<String>,
        timestamp: DateTime<Utc>,
        user: String,
    },
}

impl RealtimeEvent {
    /// User whose session the event is published to.
    pub fn user(&self) -> &str {
        match self {
            Self::LeadReceived { user, .. } => user,
        }
    }
}
