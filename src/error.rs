use std::io;
use std::path::PathBuf;

/// Result type alias for conversion runs
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors that abort a conversion run. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Input container missing, unreadable, or not a zip archive
    #[error("Failed to read archive {path}: {source}")]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Output container could not be written
    #[error("Failed to write archive {path}: {source}")]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// A dictionary line did not split into `original,replacement`.
    ///
    /// A line with an empty original is rejected too, since it would match
    /// between every character.
    #[error("Malformed dictionary line {line} in {path}: {content:?}")]
    DictionaryFormat {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// The script conversion backend cannot serve the requested direction
    #[error("Conversion backend unavailable for {direction}: {reason}")]
    ConversionCapability { direction: String, reason: String },

    /// A file in the working tree (or a side file) could not be read or written
    #[error("IO error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    /// Name of the pipeline stage that failed, for user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            ConvertError::ArchiveRead { .. } => "unpack",
            ConvertError::ArchiveWrite { .. } => "repack",
            ConvertError::DictionaryFormat { .. } => "dictionary",
            ConvertError::ConversionCapability { .. } => "converter",
            ConvertError::FileIo { .. } => "file-io",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::FileIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: impl Into<zip::result::ZipError>) -> Self {
        ConvertError::ArchiveRead {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<zip::result::ZipError>) -> Self {
        ConvertError::ArchiveWrite {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_identify_failing_step() {
        let err = ConvertError::DictionaryFormat {
            path: PathBuf::from("dictionary.txt"),
            line: 3,
            content: "a,b,c".into(),
        };
        assert_eq!(err.stage(), "dictionary");
        assert!(err.to_string().contains("line 3"));

        let err = ConvertError::read("missing.epub", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.stage(), "unpack");
        assert!(err.to_string().contains("missing.epub"));
    }
}
