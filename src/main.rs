#![warn(rust_2018_idioms)]

use std::env;

use bw_client::{ListFilter, ObjectClient, ObjectType, VaultStatus};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

const PASSWORD_ENV: &str = "BW_PASSWORD";

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logger();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let client = bw_client::client_from_env(cancel)?;
    ensure_unlocked(client.as_ref()).await?;
    client.sync().await?;

    let filters = filters_from_env();
    let items = client.list_objects(ObjectType::Item, &filters).await?;
    tracing::info!(count = items.len(), "Listed items");

    for item in &items {
        println!("{}\t{}", item.id, item.name);
    }
    Ok(())
}

async fn ensure_unlocked(client: &dyn ObjectClient) -> Result<()> {
    let status = client.status().await?;
    tracing::info!(status = ?status.status, server = ?status.server_url, "Vault status");

    match status.status {
        VaultStatus::Unlocked => Ok(()),
        VaultStatus::Locked => {
            let password = env::var(PASSWORD_ENV)
                .map_err(|_| format!("vault is locked and {PASSWORD_ENV} is not set"))?;
            client.unlock(&password).await?;
            Ok(())
        }
        VaultStatus::Unauthenticated => Err("not logged in to the vault".into()),
    }
}

fn filters_from_env() -> Vec<ListFilter> {
    let mut filters = Vec::new();
    if let Ok(id) = env::var("BW_FOLDER_ID") {
        filters.push(ListFilter::folder(id));
    }
    if let Ok(id) = env::var("BW_COLLECTION_ID") {
        filters.push(ListFilter::collection(id));
    }
    if let Ok(id) = env::var("BW_ORGANIZATION_ID") {
        filters.push(ListFilter::organization(id));
    }
    if let Ok(text) = env::var("BW_SEARCH") {
        filters.push(ListFilter::search(text));
    }
    if let Ok(uri) = env::var("BW_URL") {
        filters.push(ListFilter::url(uri));
    }
    filters
}

fn init_logger() -> Option<WorkerGuard> {
    use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
    use tracing_log::LogTracer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{EnvFilter, Registry};

    if !env::var("JSON_LOG").map_or(false, |s| s.parse().unwrap_or_default()) {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    // Redirect the logs from log library to tracing's subscribers.
    LogTracer::init().expect("Unable to setup log tracer!");

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

    // Logs go to stderr so stdout stays machine-readable
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(JsonStorageLayer)
        .with(bunyan_formatting_layer);
    tracing::subscriber::set_global_default(subscriber).expect("Unable to set global subscriber");
    Some(guard)
}
