use crate::db::Database;
use crate::error::{LeadAdsError, Result};
use crate::meta_log::SiteLogger;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters of the platform's subscription handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationRequest {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Answer the handshake. On success the settings are marked active and the
/// challenge to echo back verbatim is returned.
pub async fn verify_subscription(
    db: &Database,
    log: &SiteLogger,
    req: &VerificationRequest,
) -> Result<String> {
    log.info(format!(
        "Facebook Webhook Verification: mode={:?}, challenge={:?}",
        req.mode, req.challenge
    ));

    let mut settings = db.get_settings().await?;
    log.info(format!(
        "Facebook Webhook Settings: enabled={}, has_verify_token={}",
        settings.enabled,
        settings.verify_token.is_some()
    ));

    if !settings.enabled {
        log.error("Facebook Lead Ads is not enabled");
        return Err(LeadAdsError::disabled());
    }

    let expected = settings.verify_token.as_deref();
    let received = req.verify_token.as_deref();
    log.info(format!(
        "Token comparison: expected_length={}, received_length={}",
        expected.map_or(0, str::len),
        received.map_or(0, str::len)
    ));

    if expected.is_none() || expected != received {
        log.error("Token mismatch");
        return Err(LeadAdsError::Verification);
    }

    if req.mode.as_deref() != Some("subscribe") {
        log.error(format!("Invalid mode: {:?}", req.mode));
        return Err(LeadAdsError::InvalidMode);
    }

    settings.webhook_is_active = true;
    db.save_settings(&settings).await?;

    let challenge = req.challenge.clone().unwrap_or_default();
    log.info(format!(
        "Facebook Webhook verified successfully with challenge: {challenge}"
    ));
    Ok(challenge)
}

/// Check an `X-Hub-Signature-256: sha256=<hex>` header against the raw body.
pub fn verify_signature(app_secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(expected_hex) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;
    use crate::meta_log::LoggerFactory;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"object":"page"}"#;
        let header = sign("secret", body);
        assert!(verify_signature("secret", body, &header));
        assert!(!verify_signature("other", body, &header));
        assert!(!verify_signature("secret", b"tampered", &header));
    }

    #[test]
    fn malformed_signature_header_is_rejected() {
        assert!(!verify_signature("secret", b"x", ""));
        assert!(!verify_signature("secret", b"x", "sha1=abcd"));
        assert!(!verify_signature("secret", b"x", "sha256=not-hex"));
    }

    async fn setup(enabled: bool, token: Option<&str>) -> (Database, tempfile::TempDir, LoggerFactory) {
        let db = Database::in_memory().await.unwrap();
        let mut settings = db.get_settings().await.unwrap();
        settings.enabled = enabled;
        settings.verify_token = token.map(str::to_string);
        db.save_settings(&settings).await.unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let factory = LoggerFactory::new(&LoggingConfig {
            dir: tmp.path().to_path_buf(),
            ..LoggingConfig::default()
        });
        (db, tmp, factory)
    }

    fn request(mode: Option<&str>, token: Option<&str>) -> VerificationRequest {
        VerificationRequest {
            mode: mode.map(str::to_string),
            verify_token: token.map(str::to_string),
            challenge: Some("CHALLENGE".to_string()),
        }
    }

    #[tokio::test]
    async fn every_failing_condition_blocks_the_echo() {
        let cases = [
            (false, Some("tok"), Some("subscribe"), Some("tok")),
            (true, Some("tok"), Some("subscribe"), Some("wrong")),
            (true, Some("tok"), Some("subscribe"), None),
            (true, None, Some("subscribe"), None),
            (true, Some("tok"), Some("unsubscribe"), Some("tok")),
            (true, Some("tok"), None, Some("tok")),
        ];

        for (enabled, stored, mode, given) in cases {
            let (db, _tmp, factory) = setup(enabled, stored).await;
            let log = factory.for_site("test");
            let result = verify_subscription(&db, &log, &request(mode, given)).await;
            assert!(result.is_err(), "case {enabled} {stored:?} {mode:?} {given:?}");
            assert!(!db.get_settings().await.unwrap().webhook_is_active);
        }
    }

    #[tokio::test]
    async fn matching_subscribe_echoes_challenge_and_activates() {
        let (db, _tmp, factory) = setup(true, Some("tok")).await;
        let log = factory.for_site("test");

        let challenge = verify_subscription(&db, &log, &request(Some("subscribe"), Some("tok")))
            .await
            .unwrap();

        assert_eq!(challenge, "CHALLENGE");
        assert!(db.get_settings().await.unwrap().webhook_is_active);
    }

    #[tokio::test]
    async fn error_kinds_follow_check_order() {
        let (db, _tmp, factory) = setup(false, Some("tok")).await;
        let log = factory.for_site("test");
        let err = verify_subscription(&db, &log, &request(Some("subscribe"), Some("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadAdsError::Configuration(_)));

        let (db, _tmp, factory) = setup(true, Some("tok")).await;
        let log = factory.for_site("test");
        let err = verify_subscription(&db, &log, &request(Some("bogus"), Some("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadAdsError::Verification));

        let err = verify_subscription(&db, &log, &request(Some("bogus"), Some("tok")))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadAdsError::InvalidMode));
    }
}
