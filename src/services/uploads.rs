//! Staging of multipart uploads to local temp files before they are pushed to
//! the object store.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::extract::Multipart;
use chrono::Utc;
use rand::Rng;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

/// A staged upload on local disk. Removed by `discard`, or on drop if the
/// request path never got that far.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn discard(mut self) {
        self.armed = false;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove temp upload {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Text fields and staged files of one multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, TempFile>,
}

impl MultipartForm {
    /// Missing fields read as empty.
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn take_file(&mut self, name: &str) -> Option<TempFile> {
        self.files.remove(name)
    }
}

/// `{field}-{millis}-{random}{.ext}`
fn temp_name(field: &str, original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}-{}{}", field, Utc::now().timestamp_millis(), suffix, ext)
}

/// Reads the whole multipart body. Parts named in `file_fields` are streamed
/// into `temp_dir`; any other file part is refused. A file part with no name
/// and no content (an unselected file input) counts as absent.
pub async fn stage_multipart(
    multipart: &mut Multipart,
    temp_dir: &Path,
    file_fields: &[&str],
) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();

        let Some(original) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            form.fields.insert(name, value);
            continue;
        };

        if !file_fields.contains(&name.as_str()) {
            return Err(AppError::Validation(format!("Unexpected file field: {name}")));
        }

        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|e| AppError::internal("Could not stage upload", e))?;
        let staged = TempFile::new(temp_dir.join(temp_name(&name, &original)));
        let mut out = tokio::fs::File::create(staged.path())
            .await
            .map_err(|e| AppError::internal("Could not stage upload", e))?;

        let mut written = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            written += chunk.len();
            out.write_all(&chunk)
                .await
                .map_err(|e| AppError::internal("Could not stage upload", e))?;
        }
        out.flush()
            .await
            .map_err(|e| AppError::internal("Could not stage upload", e))?;

        if written == 0 && original.is_empty() {
            staged.discard().await;
            continue;
        }

        // A repeated field keeps the first file; later copies are dropped and removed.
        form.files.entry(name).or_insert(staged);
    }

    Ok(form)
}
