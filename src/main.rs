use std::sync::Arc;

use tracing::info;

use csvbridge::application::{IngestUseCase, QueryUseCase};
use csvbridge::infrastructure::config::Settings;
use csvbridge::infrastructure::db::store::TableStore;
use csvbridge::infrastructure::fetch::HttpFetcher;
use csvbridge::interfaces::http::{start_server, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();

    let settings = Settings::load().expect("Failed to load configuration");

    let store = Arc::new(TableStore::new(&settings.db_root_dir));
    let fetcher = Arc::new(HttpFetcher::new());

    let state = Arc::new(AppState {
        ingest: IngestUseCase::new(store.clone(), fetcher, settings.max_file_size),
        query: QueryUseCase::new(
            store.clone(),
            settings.default_page_size,
            settings.max_page_size,
            settings.max_offset,
        ),
        store,
    });

    let server = start_server(state, &settings.host, settings.port)?;
    info!(
        host = %settings.host,
        port = settings.port,
        db_root = %settings.db_root_dir.display(),
        "csvbridge listening"
    );

    server.await
}
