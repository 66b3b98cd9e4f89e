use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{ToolkitError, UploadFailure};
use crate::file_utils::{
    base_file_name, create_dir_if_not_exist, detect_content_type, extract_extension,
    is_file_type_allowed, read_file_head,
};
use crate::multipart_utils::{drain_field, get_filename_from_field, write_temp_file};
use crate::text_utils::random_string;
use crate::Tools;

const RENAMED_STEM_LEN: usize = 25;

/// A file persisted by [`Tools::upload_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub new_file_name: String,
    pub original_file_name: String,
    pub file_size: u64,
}

#[derive(Debug)]
struct SpooledFile {
    original_file_name: String,
    temp_path: PathBuf,
    size: u64,
}

/// The name an upload is stored under: a random stem plus the original
/// extension when `rename` is set, otherwise the original name unchanged.
pub fn new_file_name(original_file_name: &str, rename: bool) -> String {
    if rename {
        format!(
            "{}{}",
            random_string(RENAMED_STEM_LEN),
            extract_extension(original_file_name)
        )
    } else {
        original_file_name.to_string()
    }
}

impl Tools {
    pub fn file_type_allowed(&self, file_type: &str) -> bool {
        is_file_type_allowed(&self.config().allowed_file_types, file_type)
    }

    /// Store every file in a multipart body under `upload_dir`.
    ///
    /// `rename` defaults to `true`. Files are handled in arrival order and the
    /// first failure ends the batch: files stored before it stay on disk and
    /// are returned in [`UploadFailure::uploaded`].
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        payload: Multipart,
        upload_dir: P,
        rename: Option<bool>,
    ) -> Result<Vec<UploadedFile>, UploadFailure> {
        let rename = rename.unwrap_or(true);
        let upload_dir = upload_dir.as_ref();

        create_dir_if_not_exist(upload_dir).map_err(|e| UploadFailure::new(Vec::new(), e))?;

        let spooled = self.spool_parts(payload, upload_dir).await.map_err(|e| {
            log::warn!("Failed to read multipart body: {}", e);
            UploadFailure::new(Vec::new(), ToolkitError::UploadTooLarge)
        })?;

        let mut uploaded = Vec::with_capacity(spooled.len());
        let mut pending = spooled.into_iter();
        while let Some(part) = pending.next() {
            match self.handle_file(&part, upload_dir, rename) {
                Ok(file) => uploaded.push(file),
                Err(e) => {
                    remove_temp_file(&part.temp_path);
                    remove_temp_files(pending);
                    return Err(UploadFailure::new(uploaded, e));
                }
            }
        }

        Ok(uploaded)
    }

    /// [`Tools::upload_files`] for a form carrying a single file.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        payload: Multipart,
        upload_dir: P,
        rename: Option<bool>,
    ) -> Result<UploadedFile, ToolkitError> {
        let files = self.upload_files(payload, upload_dir, rename).await?;
        files.into_iter().next().ok_or(ToolkitError::NoFile)
    }

    async fn spool_parts(
        &self,
        payload: Multipart,
        upload_dir: &Path,
    ) -> Result<Vec<SpooledFile>, ToolkitError> {
        let mut spooled = Vec::new();
        match self.spool_into(payload, upload_dir, &mut spooled).await {
            Ok(()) => Ok(spooled),
            Err(e) => {
                remove_temp_files(spooled);
                Err(e)
            }
        }
    }

    async fn spool_into(
        &self,
        mut payload: Multipart,
        upload_dir: &Path,
        spooled: &mut Vec<SpooledFile>,
    ) -> Result<(), ToolkitError> {
        let mut budget = self.config().max_file_size;
        while let Some(item) = payload.next().await {
            let field = item?;
            let Some(filename) = get_filename_from_field(&field) else {
                drain_field(field, &mut budget).await?;
                continue;
            };

            let temp_path = upload_dir.join(format!(".{}.part", random_string(RENAMED_STEM_LEN)));
            spooled.push(SpooledFile {
                original_file_name: base_file_name(&filename).to_string(),
                temp_path: temp_path.clone(),
                size: 0,
            });
            let size = write_temp_file(field, &temp_path, &mut budget).await?;
            if let Some(last) = spooled.last_mut() {
                last.size = size;
            }
        }
        Ok(())
    }

    fn handle_file(
        &self,
        part: &SpooledFile,
        upload_dir: &Path,
        rename: bool,
    ) -> Result<UploadedFile, ToolkitError> {
        let file_type = detect_content_type(&read_file_head(&part.temp_path)?);
        if !self.file_type_allowed(&file_type) {
            log::warn!(
                "Rejected upload {:?}: file type {} not permitted",
                part.original_file_name,
                file_type
            );
            return Err(ToolkitError::FileTypeNotPermitted);
        }

        let new_file_name = new_file_name(&part.original_file_name, rename);
        std::fs::rename(&part.temp_path, upload_dir.join(&new_file_name))?;
        log::debug!(
            "Stored upload {:?} as {:?} ({} bytes, {})",
            part.original_file_name,
            new_file_name,
            part.size,
            file_type
        );

        Ok(UploadedFile {
            new_file_name,
            original_file_name: part.original_file_name.clone(),
            file_size: part.size,
        })
    }
}

fn remove_temp_files<I: IntoIterator<Item = SpooledFile>>(parts: I) {
    for part in parts {
        remove_temp_file(&part.temp_path);
    }
}

/// Delete a spooled part. Returns `false`, after logging, if it is still on disk.
fn remove_temp_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            log::warn!("Failed to remove temporary upload {:?}: {}", path, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_name_renamed() {
        let name = new_file_name("holiday photo.png", true);
        assert_eq!(name.len(), RENAMED_STEM_LEN + ".png".len());
        assert!(name.ends_with(".png"));
        assert_ne!(name, new_file_name("holiday photo.png", true));
    }

    #[test]
    fn test_new_file_name_kept() {
        assert_eq!(new_file_name("holiday photo.png", false), "holiday photo.png");
    }

    #[test]
    fn test_file_type_allowed_defaults() {
        let tools = Tools::default();
        for t in ["image/jpeg", "image/jpg", "image/png", "image/gif", "application/pdf", "IMAGE/PNG"] {
            assert!(tools.file_type_allowed(t), "{}", t);
        }
        assert!(!tools.file_type_allowed("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_remove_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join(".abc.part");
        std::fs::write(&part, b"data").unwrap();

        assert!(remove_temp_file(&part));
        assert!(!part.exists());
        assert!(remove_temp_file(&part));

        let stuck = dir.path().join("stuck");
        std::fs::create_dir(&stuck).unwrap();
        assert!(!remove_temp_file(&stuck));
        assert!(stuck.exists());
    }

    #[test]
    fn test_file_type_allowed_custom() {
        let tools = Tools::builder().allowed_file_types(["text/plain; charset=utf-8"]).build();
        assert!(tools.file_type_allowed("text/plain; charset=utf-8"));
        assert!(!tools.file_type_allowed("image/png"));
    }
}
