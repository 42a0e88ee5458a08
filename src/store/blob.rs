use crate::errors::{AppError, AppResult};
use crate::store::BlobStore;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Bucket-per-directory object store on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: &Path, public_base_url: Option<&str>) -> AppResult<Self> {
        fs::create_dir_all(root)?;
        let public_base_url = public_base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("file://{}", root.to_string_lossy().trim_end_matches('/')));
        Ok(Self {
            root: root.to_path_buf(),
            public_base_url,
        })
    }

    fn object_path(&self, bucket: &str, name: &str) -> AppResult<PathBuf> {
        Ok(self
            .root
            .join(sanitize_object_name(bucket)?)
            .join(sanitize_object_name(name)?))
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, bucket: &str, name: &str, bytes: &[u8], content_type: &str, upsert: bool) -> AppResult<()> {
        let path = self.object_path(bucket, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if upsert {
            fs::write(&path, bytes)?;
        } else {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|error| match error.kind() {
                    std::io::ErrorKind::AlreadyExists => {
                        AppError::Conflict(format!("object {}/{} already exists", bucket, name))
                    }
                    _ => AppError::Io(error.to_string()),
                })?;
            file.write_all(bytes)?;
        }

        tracing::debug!(bucket, name, content_type, bytes = bytes.len(), "blob uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, name)
    }

    fn download(&self, bucket: &str, name: &str) -> AppResult<Vec<u8>> {
        let path = self.object_path(bucket, name)?;
        fs::read(&path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound(format!("object {}/{}", bucket, name)),
            _ => AppError::Io(error.to_string()),
        })
    }

    fn download_url(&self, url: &str) -> AppResult<Vec<u8>> {
        let relative = url
            .strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| AppError::Validation(format!("url is not served by this store: {}", url)))?;
        let Some((bucket, name)) = relative.split_once('/') else {
            return Err(AppError::Validation(format!("url has no object name: {}", url)));
        };
        self.download(bucket, name)
    }

    fn list(&self, bucket: &str) -> AppResult<Vec<String>> {
        let dir = self.root.join(sanitize_object_name(bucket)?);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn sanitize_object_name(input: &str) -> AppResult<String> {
    let cleaned = input
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    if cleaned.is_empty() || cleaned.chars().all(|ch| ch == '.') {
        return Err(AppError::Validation(format!("invalid object name: {:?}", input)));
    }
    Ok(cleaned)
}
