// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use log::info;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;

use crate::api::auth::WebhookAuthenticator;
use crate::api::webhook::{configure_webhook, WebhookState};
use crate::config::Settings;
use crate::inbound::{AttachmentStorage, InboundService};
use crate::store::{MailStore, SqliteStore};

fn storage_io_error(err: impl std::fmt::Display) -> IoError {
    IoError::new(ErrorKind::Other, err.to_string())
}

/// Wires the store, credentials and pipeline from `settings` into shared state.
pub async fn build_state(settings: &Settings, store: Arc<dyn MailStore>) -> Result<Data<WebhookState>, IoError> {
    let authenticator = WebhookAuthenticator::resolve(&settings.webhook, store.as_ref())
        .await
        .map_err(storage_io_error)?;

    let mut service = InboundService::new(store, settings.webhook.max_raw_snapshot_bytes);
    if settings.attachments.enabled {
        info!("Attachment content will be stored under {}", settings.attachments.directory);
        service = service.with_attachment_storage(AttachmentStorage::new(&settings.attachments.directory));
    }

    Ok(Data::new(WebhookState {
        authenticator,
        service: Arc::new(service),
        timeout: settings.webhook.processing_timeout(),
        path: settings.webhook.path.clone(),
        max_payload_bytes: settings.webhook.max_payload_bytes,
    }))
}

pub async fn run_server(settings: Settings) -> std::io::Result<()> {
    let store = SqliteStore::connect(&settings.database)
        .await
        .map_err(storage_io_error)?;
    let state = build_state(&settings, Arc::new(store)).await?;

    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Starting inbound webhook server at {}{}", bind_address, settings.webhook.path);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(configure_webhook(state.clone()))
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server.bind(bind_address)?.run().await
}
