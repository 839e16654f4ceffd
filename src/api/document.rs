//! JSON:API document shapes used on the wire

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiErrorItem;
use crate::job::{DownloadJob, JobStatus, UploadDetails, UploadJob};
use crate::types::{
    DownloadMode, ResourceId, ResourceLanguageStat, language_code_from_wire, language_wire_id,
};

/// Media type of every request and response body
pub(super) const JSONAPI_CONTENT_TYPE: &str = "application/vnd.api+json";

pub(super) const DOWNLOADS_TYPE: &str = "resource_translations_async_downloads";
pub(super) const UPLOADS_TYPE: &str = "resource_translations_async_uploads";

/// `{data, links}` envelope
#[derive(Debug, Deserialize)]
pub(super) struct Document<T> {
    pub(super) data: T,
    #[serde(default)]
    pub(super) links: Links,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Links {
    #[serde(default)]
    pub(super) next: Option<String>,
}

/// `{errors: [...]}` envelope
#[derive(Debug, Deserialize)]
pub(super) struct ErrorDocument {
    pub(super) errors: Vec<ApiErrorItem>,
}

/// A single resource object
#[derive(Debug, Deserialize)]
pub(super) struct ResourceObject<A> {
    pub(super) id: String,
    pub(super) attributes: A,
    #[serde(default)]
    pub(super) relationships: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatAttributes {
    last_update: DateTime<Utc>,
    #[serde(default)]
    translated_strings: u64,
    #[serde(default)]
    untranslated_strings: u64,
    #[serde(default)]
    reviewed_strings: u64,
    #[serde(default)]
    total_strings: u64,
    #[serde(default)]
    translated_words: u64,
    #[serde(default)]
    untranslated_words: u64,
    #[serde(default)]
    total_words: u64,
}

impl ResourceObject<StatAttributes> {
    /// Convert to the domain type; the language comes from the relationship,
    /// falling back to the `:l:<code>` suffix of the stat id
    pub(super) fn into_stat(self) -> ResourceLanguageStat {
        let language = self
            .relationships
            .as_ref()
            .and_then(|r| r.pointer("/language/data/id"))
            .and_then(Value::as_str)
            .map(|id| language_code_from_wire(id).to_string())
            .or_else(|| {
                self.id
                    .rsplit_once(":l:")
                    .map(|(_, code)| code.to_string())
            })
            .unwrap_or_else(|| self.id.clone());

        let a = self.attributes;
        ResourceLanguageStat {
            language,
            last_update: a.last_update,
            translated_strings: a.translated_strings,
            untranslated_strings: a.untranslated_strings,
            reviewed_strings: a.reviewed_strings,
            total_strings: a.total_strings,
            translated_words: a.translated_words,
            untranslated_words: a.untranslated_words,
            total_words: a.total_words,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct JobAttributes {
    #[serde(default)]
    status: JobStatus,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
    #[serde(default)]
    details: Option<UploadDetails>,
}

impl ResourceObject<JobAttributes> {
    pub(super) fn into_download_job(self) -> DownloadJob {
        DownloadJob {
            id: self.id,
            status: self.attributes.status,
            errors: self.attributes.errors,
            content: None,
        }
    }

    pub(super) fn into_upload_job(self) -> UploadJob {
        UploadJob {
            id: self.id,
            status: self.attributes.status,
            errors: self.attributes.errors,
            details: self.attributes.details.unwrap_or_default(),
        }
    }
}

fn relationship(kind: &str, id: String) -> Value {
    json!({ "data": { "type": kind, "id": id } })
}

/// Request body creating an export job
pub(super) fn download_request(resource: &ResourceId, language: &str, mode: DownloadMode) -> Value {
    json!({
        "data": {
            "type": DOWNLOADS_TYPE,
            "attributes": {
                "content_encoding": "text",
                "file_type": "default",
                "mode": mode.as_str(),
            },
            "relationships": {
                "resource": relationship("resources", resource.to_string()),
                "language": relationship("languages", language_wire_id(language)),
            }
        }
    })
}

/// Request body creating an import job
pub(super) fn upload_request(resource: &ResourceId, language: &str, content: &str) -> Value {
    json!({
        "data": {
            "type": UPLOADS_TYPE,
            "attributes": {
                "content": content,
                "content_encoding": "text",
            },
            "relationships": {
                "resource": relationship("resources", resource.to_string()),
                "language": relationship("languages", language_wire_id(language)),
            }
        }
    })
}
