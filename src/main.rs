// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Inbound email webhook server.
//!
//! Usage:
//!   tempinbox-server                     # defaults + environment
//!   tempinbox-server --config app.toml   # layered over a config file

use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::process::exit;

use tempinbox::api::run_server;
use tempinbox::config::Settings;

// Use jemalloc for better memory management (releases memory back to OS)
#[cfg(all(not(target_env = "msvc"), not(feature = "system-alloc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "tempinbox-server", about = "Receives relayed email and files it into temporary inboxes")]
struct Cli {
    /// Optional configuration file (toml)
    #[arg(long, short, env = "TEMPINBOX_CONFIG")]
    config: Option<String>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        exit(1);
    });

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log.level.as_str())).init();
    info!("Configuration loaded");

    if let Err(e) = run_server(settings).await {
        error!("Server terminated with error: {}", e);
        return Err(e);
    }
    Ok(())
}
