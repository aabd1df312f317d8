pub mod accounts;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod lead_details;
pub mod meta_log;
pub mod models;
pub mod oauth;
pub mod settings;
pub mod subscriptions;
pub mod verification;

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random alphanumeric token, used for verify tokens and OAuth state.
pub fn generate_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
