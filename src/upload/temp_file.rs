//! Scoped temporary copy of an uploaded file
//!
//! The service writes the received bytes to disk so the text sampler can read
//! them the same way it reads local files. The copy keeps the original
//! extension (sampling dispatches on it) and is removed when the value is
//! dropped, on success and error paths alike.
//!
//! # Example
//!
//! ```no_run
//! use kb_uploadr::upload::temp_file::TempFileUpload;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let temp = TempFileUpload::from_bytes(b"Hola mundo", Some("txt"))?;
//!
//! println!("File: {:?}", temp.path());
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::UploadError;

/// Temporary file removed on drop
#[derive(Debug)]
pub struct TempFileUpload {
    path: PathBuf,
}

impl TempFileUpload {
    /// Write `data` to a fresh temp file ending in `.{extension}`.
    ///
    /// Uses tmpfs (/dev/shm) on Linux when available.
    pub fn from_bytes(data: &[u8], extension: Option<&str>) -> Result<Self, UploadError> {
        let temp_dir = Self::get_temp_dir();

        let file_name = match extension.filter(|e| !e.is_empty()) {
            Some(ext) => format!("kb-uploadr-{}.{}", uuid::Uuid::new_v4(), ext),
            None => format!("kb-uploadr-{}.tmp", uuid::Uuid::new_v4()),
        };
        let path = temp_dir.join(file_name);

        // Construct before writing so a failed write still removes the file.
        let temp = Self { path };

        let mut file = File::create(&temp.path)?;
        file.write_all(data)?;
        file.flush()?;

        Ok(temp)
    }

    /// Get the path to the temp file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_temp_dir() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            let shm = PathBuf::from("/dev/shm");
            if shm.is_dir() {
                return shm;
            }
        }

        std::env::temp_dir()
    }
}

impl Drop for TempFileUpload {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up temp file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_temp_file() {
        let temp = TempFileUpload::from_bytes(b"test data", Some("pdf")).unwrap();

        assert!(temp.path().exists());
        assert_eq!(temp.path().extension().unwrap(), "pdf");
        assert_eq!(std::fs::read(temp.path()).unwrap(), b"test data");
    }

    #[test]
    fn test_without_extension() {
        let temp = TempFileUpload::from_bytes(b"x", None).unwrap();
        assert_eq!(temp.path().extension().unwrap(), "tmp");
    }

    #[test]
    fn test_cleanup_on_drop() {
        let path;
        {
            let temp = TempFileUpload::from_bytes(b"temp data", Some("docx")).unwrap();
            path = temp.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
