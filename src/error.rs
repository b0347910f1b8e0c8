//! Fatal import errors.
//!
//! Only a document that cannot be read or parsed at all is an error.
//! Everything else is recovered from and reported as a
//! [`Warning`](crate::diagnostics::Warning).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("invalid UTF-8 in MusicXML file: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("MXL archive error: {0}")]
    Archive(String),

    #[error("unsupported root element '{0}', only 'score-partwise' is supported")]
    UnsupportedRoot(String),
}
