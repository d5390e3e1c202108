use std::path::{Path, PathBuf};

/// Largest accepted upload.
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
/// URL prefix that actix-files serves the media root under.
pub const MEDIA_URL: &str = "/media/";

const IMAGE_DIR: &str = "posts";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Upload a valid image: {0} files are not supported.")]
    UnsupportedType(String),
    #[error("The image is larger than 5 MiB.")]
    TooLarge,
    #[error("The submitted file is empty.")]
    Empty,
    #[error("could not store upload: {0}")]
    Io(#[from] std::io::Error),
}

pub fn url_for(relative: &str) -> String {
    format!("{}{}", MEDIA_URL, relative)
}

/// Lowercased extension of an upload's filename, if it is an accepted image type.
pub fn image_extension(filename: &str) -> Result<String, MediaError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else if ext.is_empty() {
        Err(MediaError::UnsupportedType("extensionless".to_owned()))
    } else {
        Err(MediaError::UnsupportedType(format!(".{}", ext)))
    }
}

/// Uploaded images on local disk, addressed by their BLAKE3 hash.
#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `data` and returns its path relative to the media root.
    /// Identical uploads share one file.
    pub fn store_image(&self, filename: &str, data: &[u8]) -> Result<String, MediaError> {
        let ext = image_extension(filename)?;
        if data.is_empty() {
            return Err(MediaError::Empty);
        }
        if data.len() > MAX_IMAGE_SIZE {
            return Err(MediaError::TooLarge);
        }

        let hash = blake3::hash(data);
        let relative = format!("{}/{}.{}", IMAGE_DIR, hash.to_hex(), ext);
        let target = self.root.join(&relative);

        if target.exists() {
            log::debug!("store_image: duplicate upload {}", relative);
        } else {
            std::fs::create_dir_all(self.root.join(IMAGE_DIR))?;
            std::fs::write(&target, data)?;
            log::info!("store_image: stored {} ({} bytes)", relative, data.len());
        }

        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_rules() {
        assert_eq!(image_extension("cat.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
        assert!(matches!(image_extension("notes.txt"), Err(MediaError::UnsupportedType(_))));
        assert!(matches!(image_extension("README"), Err(MediaError::UnsupportedType(_))));
    }

    #[test]
    fn test_store_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let first = store.store_image("a.png", b"pixels").unwrap();
        let second = store.store_image("b.PNG", b"pixels").unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("posts/"));
        assert!(first.ends_with(".png"));
        assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), b"pixels");
        assert_eq!(url_for(&first), format!("/media/{}", first));
    }

    #[test]
    fn test_store_rejects_bad_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        assert!(matches!(store.store_image("a.png", b""), Err(MediaError::Empty)));
        assert!(matches!(
            store.store_image("a.png", &vec![0u8; MAX_IMAGE_SIZE + 1]),
            Err(MediaError::TooLarge)
        ));
        assert!(matches!(
            store.store_image("a.exe", b"MZ"),
            Err(MediaError::UnsupportedType(_))
        ));
    }
}
