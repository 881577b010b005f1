//! Concurrent deliveries against a file-backed store with several connections

#[cfg(test)]
mod concurrent_tests {
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::common::{email_count, total_messages};
    use tempinbox::config::DatabaseConfig;
    use tempinbox::inbound::{FormFields, InboundService, IngestOutcome, Payload};
    use sqlx::SqlitePool;
    use tempinbox::models::{Mailbox, StoredMessage};
    use tempinbox::store::{DeliveryOutcome, MailStore, SqliteStore, StorageError};

    async fn file_store(dir: &TempDir) -> SqliteStore {
        let config = DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("inbox.db").display()),
            max_connections: 4,
            max_retries: 10,
            retry_backoff_ms: 20,
            busy_timeout_ms: 5000,
        };
        let store = SqliteStore::connect(&config).await.expect("file store");
        store.insert_mailbox(&Mailbox::new("mb1", "user1", "a@x.com")).await.unwrap();
        store
    }

    fn message(message_id: &str) -> Payload {
        Payload::FormFields(FormFields {
            recipient: Some("a@x.com".to_string()),
            from: Some("b@y.com".to_string()),
            subject: Some("Hi".to_string()),
            body_plain: Some("hello".to_string()),
            message_id: Some(message_id.to_string()),
            ..Default::default()
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redelivery_stores_once() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir).await;
        let shared: Arc<dyn MailStore> = Arc::new(store.clone());
        let service = Arc::new(InboundService::new(shared, 64 * 1024));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move { service.ingest(&message("<same@y.com>")).await }));
        }

        let mut stored = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                IngestOutcome::Stored { .. } => stored += 1,
                IngestOutcome::Duplicate { .. } => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(stored, 1);
        assert_eq!(total_messages(&store).await, 1);
        assert_eq!(email_count(&store, "mb1").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_messages_all_counted() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir).await;
        let shared: Arc<dyn MailStore> = Arc::new(store.clone());
        let service = Arc::new(InboundService::new(shared, 64 * 1024));

        let mut handles = Vec::new();
        for n in 0..12 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.ingest(&message(&format!("<m{}@y.com>", n))).await
            }));
        }
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(matches!(outcome, IngestOutcome::Stored { .. }));
        }

        assert_eq!(total_messages(&store).await, 12);
        assert_eq!(email_count(&store, "mb1").await, 12);
    }

    fn stored_message(mailbox: &Mailbox, id: &str) -> StoredMessage {
        StoredMessage {
            id: id.to_string(),
            inbox_id: mailbox.id.clone(),
            user_id: mailbox.user_id.clone(),
            from: String::new(),
            subject: String::new(),
            received_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
            html_content: String::new(),
            text_content: String::new(),
            raw_content: String::new(),
            upstream_message_id: None,
            is_read: false,
            is_starred: false,
            is_archived: false,
            is_spam: false,
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_mailbox_removed_before_delivery() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir).await;
        let mailbox = store.get_mailbox("mb1").await.unwrap().unwrap();
        assert!(store.delete_mailbox("mb1").await.unwrap());

        let outcome = store.deliver(&mailbox, &stored_message(&mailbox, "late@y.com")).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::MailboxGone);
        assert_eq!(total_messages(&store).await, 0);
    }

    #[tokio::test]
    async fn test_locked_database_gives_up_after_max_retries() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("inbox.db").display());
        let store = SqliteStore::connect(&DatabaseConfig {
            url: url.clone(),
            max_connections: 2,
            max_retries: 2,
            retry_backoff_ms: 5,
            busy_timeout_ms: 50,
        })
        .await
        .expect("file store");
        store.insert_mailbox(&Mailbox::new("mb1", "user1", "a@x.com")).await.unwrap();
        let mailbox = store.get_mailbox("mb1").await.unwrap().unwrap();

        // A second writer holds the reserved lock for the whole delivery
        let other = SqlitePool::connect(&url).await.expect("second pool");
        let mut writer = other.acquire().await.expect("writer connection");
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *writer).await.expect("begin immediate");

        let result = store.deliver(&mailbox, &stored_message(&mailbox, "blocked@y.com")).await;
        assert!(
            matches!(result, Err(StorageError::Contention { attempts: 2 })),
            "unexpected result {:?}",
            result
        );

        sqlx::query("ROLLBACK").execute(&mut *writer).await.expect("rollback");
        drop(writer);
        other.close().await;

        assert_eq!(total_messages(&store).await, 0);
        assert_eq!(email_count(&store, "mb1").await, 0);

        // Once the lock is released the same message goes through
        let outcome = store.deliver(&mailbox, &stored_message(&mailbox, "blocked@y.com")).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Stored);
        assert_eq!(email_count(&store, "mb1").await, 1);
    }
}
