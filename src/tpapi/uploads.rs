//! Multipart form reading and image storage.

use anyhow::{Context, Result};
use axum::extract::Multipart;
use rand::{Rng, distr::Alphanumeric};

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::{
    models::StoredImage,
    tpapi::error::{ApiResult, AppError},
};

// Stand-in placeholder until a blurhash encoder sits in front of the store
pub const PLACEHOLDER_BLURHASH: &str = "LEHV6nWB2yk8pyo0adR*.7kCMdnj";

const STORED_NAME_LENGTH: usize = 24;
const MAX_EXTENSION_LENGTH: usize = 5;

/// Somewhere uploaded images can be kept and served from.
pub trait ImageStore: Send + Sync {
    /// Persists an image and returns where clients can fetch it.
    fn store(&self, upload: &Upload) -> Result<StoredImage>;

    /// Best-effort removal of an image whose database write didn't go through.
    fn discard(&self, image: &StoredImage);

    fn store_all(&self, uploads: &[&Upload]) -> Result<Vec<StoredImage>> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store(upload) {
                Ok(image) => stored.push(image),
                Err(err) => {
                    self.discard_all(&stored);
                    return Err(err);
                }
            }
        }
        Ok(stored)
    }

    fn discard_all(&self, images: &[StoredImage]) {
        images.iter().for_each(|image| self.discard(image));
    }
}

/// Writes images into a directory that is served under `url_prefix`.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    dir: PathBuf,
    url_prefix: String,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self { dir: dir.into(), url_prefix: url_prefix.trim_end_matches('/').to_string() }
    }

    fn stored_name(upload: &Upload) -> String {
        let stem: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(STORED_NAME_LENGTH)
            .map(char::from)
            .collect();

        match extension(&upload.file_name) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

impl ImageStore for DiskImageStore {
    fn store(&self, upload: &Upload) -> Result<StoredImage> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create upload directory {}", self.dir.display()))?;

        let name = Self::stored_name(upload);
        let path = self.dir.join(&name);
        fs::write(&path, &upload.bytes)
            .with_context(|| format!("Could not write upload to {}", path.display()))?;

        log::trace!("[store] Stored '{}' as {}.", upload.file_name, path.display());
        Ok(StoredImage {
            uri: format!("{}/{name}", self.url_prefix),
            blurhash: PLACEHOLDER_BLURHASH.to_string(),
        })
    }

    fn discard(&self, image: &StoredImage) {
        let Some(name) = image.uri.rsplit('/').next() else { return };
        let path = self.dir.join(name);

        if let Err(err) = fs::remove_file(&path) {
            log::warn!("[discard] Could not remove {}: {err}", path.display());
        }
    }
}

/// Lowercased extension of `file_name`, if it looks like a sane one.
fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= MAX_EXTENSION_LENGTH && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A fully read multipart form: text parts by name plus every non-empty file part.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: Vec<Upload>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Form::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.files.push(Upload { field: name, file_name, bytes: bytes.to_vec() });
                    }
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// A text field as sent. Blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn require(&self, name: &str) -> ApiResult<&str> {
        self.text(name)
            .ok_or_else(|| AppError::bad_request(format!("Missing required field: {name}")))
    }

    /// File parts sent under `name`, in the order they arrived.
    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Upload> + 'a {
        self.files.iter().filter(move |f| f.field == name)
    }

    pub fn files(&self) -> &[Upload] {
        &self.files
    }

    #[cfg(test)]
    pub fn from_parts(fields: &[(&str, &str)], files: Vec<Upload>) -> Self {
        Self {
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(file_name: &str) -> Upload {
        Upload { field: "images".into(), file_name: file_name.into(), bytes: vec![1, 2, 3] }
    }

    #[test]
    fn extensions_are_sanitized() {
        assert_eq!(extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("evil.p/hp"), None);
        assert_eq!(extension("long.extension"), None);
    }

    #[test]
    fn stores_and_discards_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskImageStore::new(dir.path(), "/uploads/");

        let image = store.store(&upload("bike.png")).unwrap();
        assert!(image.uri.starts_with("/uploads/"));
        assert!(image.uri.ends_with(".png"));
        assert_eq!(image.blurhash, PLACEHOLDER_BLURHASH);

        let name = image.uri.trim_start_matches("/uploads/");
        assert_eq!(fs::read(dir.path().join(name)).unwrap(), vec![1, 2, 3]);

        store.discard(&image);
        assert!(!dir.path().join(name).exists());
    }

    #[test]
    fn blank_text_fields_count_as_missing() {
        let form = Form::from_parts(&[("title", "  "), ("password", " pass word ")], vec![]);

        assert_eq!(form.text("password"), Some(" pass word "));
        assert!(form.text("title").is_none());
        assert!(matches!(form.require("title"), Err(AppError::BadRequest(_))));
    }
}
