use std::sync::Arc;

use folio_db::Database;
use tracing::error;

use crate::config::Config;
use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::media::MediaStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub media: MediaStore,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}

/// Run blocking database work off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("database task failed"))
        })?
        .map_err(ApiError::Internal)
}
