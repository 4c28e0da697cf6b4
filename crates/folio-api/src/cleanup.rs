//! Removal of media files that no database row points at.

use tracing::{info, warn};

use folio_db::Database;

use crate::media::MediaStore;

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub total_files: usize,
    pub referenced_files: usize,
    /// Unreferenced files found, whether or not they were deleted.
    pub orphaned: Vec<String>,
    pub deleted_files: usize,
}

/// Delete every file under `subdir` (or the whole media root) that no
/// profile, project, image or message references. With `dry_run` the files
/// are only reported.
pub async fn cleanup_orphaned_media(
    db: &Database,
    media: &MediaStore,
    subdir: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<CleanupReport> {
    let referenced = db.referenced_media_paths()?;
    let files = media.list_files(subdir).await?;

    let mut report = CleanupReport {
        total_files: files.len(),
        ..Default::default()
    };

    for file in files {
        if referenced.contains(&file) {
            report.referenced_files += 1;
            continue;
        }

        if dry_run {
            info!("Would delete unreferenced media file {}", file);
        } else {
            match media.delete(&file).await {
                Ok(()) => {
                    report.deleted_files += 1;
                    info!("Deleted unreferenced media file {}", file);
                }
                Err(e) => warn!("Failed to delete {}: {}", file, e),
            }
        }
        report.orphaned.push(file);
    }

    Ok(report)
}
