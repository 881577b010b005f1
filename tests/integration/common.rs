//! Fixtures shared by the webhook integration tests

use actix_web::web::Data;
use std::sync::Arc;

use tempinbox::api::{build_state, WebhookState};
use tempinbox::config::Settings;
use tempinbox::models::{Mailbox, WebhookCredentials};
use tempinbox::store::{MailStore, SqliteStore};

pub const SECRET_HEADER: &str = "x-inbound-secret";
pub const SECRET: &str = "test-inbound-secret";
pub const WEBHOOK_PATH: &str = "/api/inbound-email";

/// Settings with attachments kept in memory only.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.attachments.enabled = false;
    settings
}

/// In-memory store with credentials and one mailbox (`mb1` for `a@x.com`, owned by `user1`).
pub async fn seeded_store() -> SqliteStore {
    let store = SqliteStore::in_memory().await.expect("in-memory store");
    store
        .set_webhook_credentials(&WebhookCredentials::new(SECRET_HEADER, SECRET))
        .await
        .expect("credentials");
    store
        .insert_mailbox(&Mailbox::new("mb1", "user1", "a@x.com"))
        .await
        .expect("mailbox");
    store
}

pub async fn state_for(settings: &Settings, store: &SqliteStore) -> Data<WebhookState> {
    let store: Arc<dyn MailStore> = Arc::new(store.clone());
    build_state(settings, store).await.expect("webhook state")
}

pub async fn total_messages(store: &SqliteStore) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
        .fetch_one(store.pool())
        .await
        .expect("count messages")
}

pub async fn email_count(store: &SqliteStore, mailbox_id: &str) -> i64 {
    store
        .get_mailbox(mailbox_id)
        .await
        .expect("load mailbox")
        .expect("mailbox exists")
        .email_count
}
