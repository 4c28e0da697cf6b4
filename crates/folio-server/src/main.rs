use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use folio_api::cleanup;
use folio_api::config::{Config, DEV_JWT_SECRET};
use folio_api::mailer::LogMailer;
use folio_api::media::MediaStore;
use folio_api::{AppState, AppStateInner};

const DEFAULT_LOG_FILTER: &str = "folio=debug,folio_api=debug,folio_db=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // Config
    let config = Config::from_env()?;
    if config.jwt_secret == DEV_JWT_SECRET {
        warn!("FOLIO_JWT_SECRET is not set; using the development placeholder secret");
    }
    let db_path = std::env::var("FOLIO_DB_PATH").unwrap_or_else(|_| "folio.db".into());
    let media_root = std::env::var("FOLIO_MEDIA_ROOT").unwrap_or_else(|_| "./media".into());
    let host = std::env::var("FOLIO_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("FOLIO_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;

    // Storage
    let db = folio_db::Database::open(&PathBuf::from(&db_path))?;
    let media = MediaStore::new(PathBuf::from(&media_root)).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => {}
        Some("cleanup-media") => return cleanup_media(&db, &media, &args[1..]).await,
        Some(other) => anyhow::bail!("Unknown command '{}'. Usage: folio [cleanup-media [--dry-run] [--subdir <dir>]]", other),
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        media,
        mailer: Arc::new(LogMailer),
        config,
    });

    let app = folio_api::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Folio server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `folio cleanup-media [--dry-run] [--subdir <dir>]`
async fn cleanup_media(db: &folio_db::Database, media: &MediaStore, args: &[String]) -> anyhow::Result<()> {
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let subdir = match args.iter().position(|a| a == "--subdir") {
        Some(i) => match args.get(i + 1) {
            Some(dir) => Some(dir.as_str()),
            None => anyhow::bail!("--subdir needs a directory"),
        },
        None => None,
    };

    info!(
        "Cleaning media under {}{}",
        media.root().display(),
        if dry_run { " (dry run)" } else { "" }
    );
    let report = cleanup::cleanup_orphaned_media(db, media, subdir, dry_run).await?;
    info!(
        "Done. total_files={}, referenced={}, orphaned={}, deleted={}",
        report.total_files,
        report.referenced_files,
        report.orphaned.len(),
        report.deleted_files
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
