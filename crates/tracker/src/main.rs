mod app;
mod client;
mod config;
mod error;

use std::{sync::Arc, time::Duration};

use ledger::{MemoryIdentity, MemoryStore};

use crate::{
    client::{Client, RemoteIdentity, RemoteStore},
    error::Result,
};

const DEMO_EMAIL: &str = "demo@localhost";
const DEMO_PASSWORD: &str = "demo";
const DEMO_USER: &str = "demo";

#[tokio::main]
async fn main() -> Result<()> {
    let (mut settings, command) = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tracker={level},ledger={level}",
            level = settings.level
        ))
        .init();

    if settings.memory {
        if settings.email.trim().is_empty() {
            settings.email = DEMO_EMAIL.to_string();
            settings.password = DEMO_PASSWORD.to_string();
        }
        tracing::info!(email = %settings.email, "using the in-process store");
        let identity = MemoryIdentity::builder()
            .account(&settings.email, &settings.password, DEMO_USER)
            .build();
        let store = Arc::new(MemoryStore::new());
        return app::App::new(settings, store, identity)?.run(command).await;
    }

    let client = Client::new(&settings.base_url)?;
    let store = Arc::new(RemoteStore::new(
        client.clone(),
        Duration::from_millis(settings.poll_interval_ms),
    ));
    let identity = RemoteIdentity::new(client);
    app::App::new(settings, store, identity)?.run(command).await
}
