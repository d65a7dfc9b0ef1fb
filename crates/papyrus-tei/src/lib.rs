//! Papyrus TEI - TEI-XML document extraction
//!
//! Converts GROBID-produced TEI-XML into structured [`PaperRecord`]s:
//! - [`xml`] builds a small element tree whose text extraction preserves
//!   document order (leading text, then each child followed by its tail)
//! - [`extract`] pulls title, date, authors, abstract, keywords, body
//!   sections, formulas, and bibliography into a synthesized markup document
//! - [`namer`] derives filesystem-safe output names from titles
//! - [`convert`] walks a source tree and mirrors it into converted records
//!
//! The title is the one mandatory field: extraction fails with
//! [`TeiError::MissingTitle`] when it is absent or empty, and batch callers
//! are expected to skip the file and continue.

use thiserror::Error;

pub mod convert;
pub mod extract;
pub mod namer;
pub mod xml;

pub use convert::{convert_tree, ConvertReport};
pub use extract::extract_document;
pub use namer::file_name_for;
pub use xml::XmlNode;

/// Errors that can occur during TEI extraction and conversion
#[derive(Error, Debug)]
pub enum TeiError {
    /// The document has no title element, or it is empty. This is the one
    /// mandatory field; callers skip the offending file and continue.
    #[error("Missing document title")]
    MissingTitle,

    /// Malformed XML
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// IO error while reading or writing a file
    #[error("IO error on {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Output record could not be serialized
    #[error("Failed to serialize record: {0}")]
    JsonError(String),

    /// Two inputs produced the same output name under the `Error` policy
    #[error("Output name collision: {0}")]
    NameCollision(String),
}

pub type Result<T> = std::result::Result<T, TeiError>;
