use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk storage for uploaded files.
///
/// Files live at `{root}/{relative path}`. Only relative paths leave this
/// type; they are what the database stores and what `/media` serves.
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await?;
        info!("Media root: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `data` under `dir` with a fresh random name that keeps the
    /// original extension. Returns the relative path.
    pub async fn save(&self, dir: &str, original_name: &str, data: &[u8]) -> Result<String> {
        let name = match extension_of(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let relative = format!("{}/{}", dir.trim_matches('/'), name);
        let path = self.resolve(&relative)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        info!("Stored {} ({} bytes)", relative, data.len());
        Ok(relative)
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Delete a stored file. A file that is already gone is not an error.
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored file, logging instead of failing.
    pub async fn remove_best_effort(&self, relative: &str) {
        if relative.is_empty() {
            return;
        }
        if let Err(e) = self.delete(relative).await {
            warn!("Failed to remove media file {}: {}", relative, e);
        }
    }

    pub async fn remove_all_best_effort(&self, paths: &[String]) {
        for path in paths {
            self.remove_best_effort(path).await;
        }
    }

    /// Relative paths of every file under `subdir`, or under the whole root
    /// when `subdir` is `None`. A missing directory has no files.
    pub async fn list_files(&self, subdir: Option<&str>) -> Result<Vec<String>> {
        let start = match subdir {
            Some(dir) => self.resolve(dir.trim_matches('/'))?,
            None => self.root.clone(),
        };
        let mut files = Vec::new();
        if !fs::try_exists(&start).await? {
            return Ok(files);
        }

        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(rel) = path.strip_prefix(&self.root) {
                        files.push(
                            rel.components()
                                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                                .collect::<Vec<_>>()
                                .join("/"),
                        );
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("Refusing media path outside the media root: {}", relative);
        }
        Ok(self.root.join(rel))
    }
}

/// Lowercased extension of an uploaded file name, if it has a usable one.
pub fn extension_of(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

pub fn avatar_dir(user_id: &str) -> String {
    format!("avatars/user_{}", user_id)
}

pub fn banner_dir(user_id: &str) -> String {
    format!("banners/user_{}", user_id)
}

pub fn logo_dir(user_id: &str) -> String {
    format!("logos/user_{}", user_id)
}

pub fn project_cover_dir(owner_id: &str, project_id: &str) -> String {
    format!("projects/{}/{}/cover", owner_id, project_id)
}

pub fn project_images_dir(owner_id: &str, project_id: &str) -> String {
    format!("projects/{}/{}/images", owner_id, project_id)
}

pub fn message_dir(thread_id: &str) -> String {
    format!("messages/{}", thread_id)
}
