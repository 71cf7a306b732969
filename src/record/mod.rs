//! Typed records deserialized from search-index documents.
//!
//! The wire format is Solr JSON: each page-mode response carries
//! `response.docs`, a list of flat documents whose field values are either
//! scalars or single-element arrays depending on the index node. Records
//! normalize that shape once, compute a content fingerprint from their
//! stable identity fields, and are then handed to the storage collaborator.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::query::FingerprintHasher;

/// Errors raised while deserializing an index document.
///
/// These are recovered locally by the result assembler (the document is
/// dropped and counted), never surfaced as a batch failure.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A required field is absent from the document.
    #[error("document missing required field {field}")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
    },

    /// A field is present but has an unexpected JSON shape.
    #[error("document field {field} has unexpected shape")]
    InvalidField {
        /// Name of the malformed field.
        field: &'static str,
    },
}

/// A record deserialized from one index document.
///
/// Implemented by [`FileRecord`] and [`DatasetRecord`] so the result
/// assembler can stream either type out of a batch of fetch outcomes.
pub trait IndexRecord: Sized {
    /// Deserializes a record from one `response.docs` entry.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if a required field is missing or malformed.
    fn from_doc(doc: &Value) -> Result<Self, RecordError>;

    /// Content fingerprint over the record's stable identity fields.
    fn sha(&self) -> &str;
}

/// One downloadable file described by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Globally unique file identifier (`instance_id`).
    pub file_id: String,
    /// Identifier of the dataset this file belongs to.
    pub dataset_id: String,
    /// Version-independent identifier, when the index provides one.
    pub master_id: Option<String>,
    /// Download URL (first entry of the document's url list).
    pub url: String,
    /// Index node hosting the file's metadata.
    pub data_node: String,
    /// File name, from the document title or the identifier's last segment.
    pub filename: String,
    /// Content checksum, when the index provides one.
    pub checksum: Option<String>,
    /// Checksum algorithm label matching [`Self::checksum`].
    pub checksum_type: Option<String>,
    /// File size in bytes.
    pub size: u64,
    /// Content fingerprint; identity key for de-duplication and storage.
    sha: String,
}

impl FileRecord {
    /// Returns the fingerprint computed at construction.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.sha
    }
}

impl IndexRecord for FileRecord {
    fn from_doc(doc: &Value) -> Result<Self, RecordError> {
        let file_id = string_field(doc, "instance_id")?.to_string();
        let url = first_url(doc)?;
        let size = u64_field(doc, "size")?;
        let data_node = string_field(doc, "data_node")?.to_string();

        let dataset_id = match optional_string(doc, "dataset_id") {
            // ESGF encodes dataset ids as `id|data_node`; identity is the id.
            Some(raw) => raw.split('|').next().unwrap_or(raw).to_string(),
            None => parent_dataset_id(&file_id),
        };
        let master_id = optional_string(doc, "master_id").map(ToString::to_string);
        let filename = optional_string(doc, "title")
            .map_or_else(|| last_segment(&file_id), ToString::to_string);
        let checksum = first_of(doc, "checksum");
        let checksum_type = first_of(doc, "checksum_type");

        // Identity excludes ephemeral fields: url and data_node vary across
        // replicas of the same file.
        let mut hasher = FingerprintHasher::new();
        hasher.field("file_id", &file_id);
        hasher.field("dataset_id", &dataset_id);
        hasher.field("checksum", checksum.as_deref().unwrap_or(""));
        hasher.field("checksum_type", checksum_type.as_deref().unwrap_or(""));
        hasher.field("size", &size.to_string());
        let sha = hasher.finish();

        Ok(Self {
            file_id,
            dataset_id,
            master_id,
            url,
            data_node,
            filename,
            checksum,
            checksum_type,
            size,
            sha,
        })
    }

    fn sha(&self) -> &str {
        &self.sha
    }
}

/// One dataset described by the index.
///
/// Dataset searches project only identity and size, so the record is
/// deliberately small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRecord {
    /// Globally unique dataset identifier (`instance_id`).
    pub dataset_id: String,
    /// Total size of the dataset's files in bytes.
    pub size: u64,
    sha: String,
}

impl IndexRecord for DatasetRecord {
    fn from_doc(doc: &Value) -> Result<Self, RecordError> {
        let dataset_id = string_field(doc, "instance_id")?.to_string();
        let size = u64_field(doc, "size")?;

        let mut hasher = FingerprintHasher::new();
        hasher.field("dataset_id", &dataset_id);
        let sha = hasher.finish();

        Ok(Self {
            dataset_id,
            size,
            sha,
        })
    }

    fn sha(&self) -> &str {
        &self.sha
    }
}

/// Reads a string field, accepting either `"v"` or `["v", ...]`.
fn string_field<'a>(doc: &'a Value, field: &'static str) -> Result<&'a str, RecordError> {
    let value = doc.get(field).ok_or(RecordError::MissingField { field })?;
    flatten_str(value).ok_or(RecordError::InvalidField { field })
}

/// Reads an unsigned integer field, accepting either `n` or `[n, ...]`.
fn u64_field(doc: &Value, field: &'static str) -> Result<u64, RecordError> {
    let value = doc.get(field).ok_or(RecordError::MissingField { field })?;
    let scalar = match value {
        Value::Array(items) => items.first().ok_or(RecordError::InvalidField { field })?,
        other => other,
    };
    scalar.as_u64().ok_or(RecordError::InvalidField { field })
}

fn optional_string<'a>(doc: &'a Value, field: &'static str) -> Option<&'a str> {
    doc.get(field).and_then(flatten_str)
}

/// Like [`optional_string`] but owned, for fields kept on the record.
fn first_of(doc: &Value, field: &'static str) -> Option<String> {
    optional_string(doc, field).map(ToString::to_string)
}

fn flatten_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

/// Extracts the download URL from the document's url list.
///
/// Entries have the shape `url|mime|channel`; the first entry's first part
/// is the HTTP download URL.
fn first_url(doc: &Value) -> Result<String, RecordError> {
    let field = "url";
    let value = doc.get(field).ok_or(RecordError::MissingField { field })?;
    let entry = match value {
        Value::String(s) => s.as_str(),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .ok_or(RecordError::InvalidField { field })?,
        _ => return Err(RecordError::InvalidField { field }),
    };
    let url = entry.split('|').next().unwrap_or(entry);
    if url.is_empty() {
        return Err(RecordError::InvalidField { field });
    }
    Ok(url.to_string())
}

/// Dataset id derived from a file id by dropping the trailing filename
/// component.
fn parent_dataset_id(file_id: &str) -> String {
    match file_id.rsplit_once('.') {
        Some((head, _)) => head.to_string(),
        None => file_id.to_string(),
    }
}

fn last_segment(file_id: &str) -> String {
    file_id
        .rsplit('.')
        .next()
        .unwrap_or(file_id)
        .to_string()
}
