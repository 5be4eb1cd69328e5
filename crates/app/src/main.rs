use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use docrelay_core::{
    ChatRelay, DocumentStore, FsDocumentStore, HttpRetrievalIndex, IndexHandle,
    OpenAiCompletionService, SearchCoordinator, UploadCoordinator, UploadPolicy,
};
use docrelay_server::{run_server, AppState, Cli};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        upload_dir = %cli.upload_dir.display(),
        index = %cli.index_name,
        "docrelay boot"
    );

    let store = FsDocumentStore::open(&cli.upload_dir)
        .with_context(|| format!("cannot open upload dir {}", cli.upload_dir.display()))?;
    let policy = UploadPolicy::new(&cli.allowed_extensions)?;

    let index = HttpRetrievalIndex::new(&cli.index_url, &cli.index_name)?;
    let existing = store.list(policy.allowed_extensions());
    let handle = IndexHandle::load_or_build(Box::new(index), &existing)
        .await
        .with_context(|| format!("cannot load or build index {}", cli.index_name))?;

    let completion = OpenAiCompletionService::new(&cli.openai_api_key, &cli.openai_base_url)?;

    let state = AppState::new(
        UploadCoordinator::new(Arc::new(store), handle.clone(), policy),
        SearchCoordinator::new(handle),
        ChatRelay::new(Arc::new(completion), cli.completion_options()),
    );

    run_server(cli.server_config(), state).await
}
