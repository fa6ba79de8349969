//! Input classification: MIME dispatch plus magic-byte validation.
//!
//! The declared MIME type decides which pipeline branch runs, but we never
//! trust it blindly: a file declared `application/pdf` must actually start
//! with `%PDF`, otherwise the caller gets a meaningful error instead of a
//! pdfium parse failure deep inside the render pass.

use crate::error::PipelineError;
use std::path::Path;

/// Which pipeline branch an upload takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image,
}

/// Classify a declared MIME type.
///
/// `application/pdf` and `image/*` are accepted; anything else is rejected
/// before any bytes are read.
pub fn classify(mime: &str) -> Result<SourceKind, PipelineError> {
    let mime = mime.trim().to_ascii_lowercase();
    if mime == "application/pdf" {
        Ok(SourceKind::Pdf)
    } else if mime.starts_with("image/") {
        Ok(SourceKind::Image)
    } else {
        Err(PipelineError::UnsupportedFormat { mime })
    }
}

/// Validate that a file declared as PDF really is one.
///
/// Reads only the first four bytes. Missing files and permission problems
/// are mapped to their own variants so callers can respond precisely.
pub fn validate_pdf_magic(path: &Path) -> Result<(), PipelineError> {
    use std::io::Read;

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(PipelineError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(PipelineError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn classify_accepts_pdf_and_images() {
        assert_eq!(classify("application/pdf").unwrap(), SourceKind::Pdf);
        assert_eq!(classify("image/png").unwrap(), SourceKind::Image);
        assert_eq!(classify("image/jpeg").unwrap(), SourceKind::Image);
        assert_eq!(classify(" IMAGE/PNG ").unwrap(), SourceKind::Image);
    }

    #[test]
    fn classify_rejects_everything_else() {
        for mime in ["text/html", "video/mp4", "application/zip", ""] {
            assert!(matches!(
                classify(mime),
                Err(PipelineError::UnsupportedFormat { .. })
            ));
        }
    }

    #[test]
    fn magic_check_rejects_non_pdf() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"GIF89a not a pdf").unwrap();
        let err = validate_pdf_magic(tmp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::NotAPdf { .. }));
    }

    #[test]
    fn magic_check_accepts_pdf_header() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%stuff").unwrap();
        assert!(validate_pdf_magic(tmp.path()).is_ok());
    }

    #[test]
    fn magic_check_missing_file() {
        let err = validate_pdf_magic(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound { .. }));
    }
}
