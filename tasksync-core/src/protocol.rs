//! Wire types for the hosted table API.
//!
//! Column names are the ones the task table is expected to carry. Every
//! column is optional on the wire: the service drops empty cells from a
//! record instead of sending `null`.

use serde::{Deserialize, Serialize};

/// Column that list queries sort on.
pub const FIELD_DUE_DATE: &str = "To Do Date";

/// The mapped column set of one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFields {
    #[serde(rename = "Task", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Notes", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "To Do Date", default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(
        rename = "Completed Date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_date: Option<String>,
    #[serde(rename = "Photos", default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<Attachment>>,
}

/// An attachment cell entry. Outgoing entries carry only `url`; the service
/// fills in the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Attachment {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            id: None,
            filename: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: RemoteFields,
}

/// Body of create and update requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordWrite {
    pub fields: RemoteFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRecordsResponse {
    #[serde(default)]
    pub records: Vec<RemoteRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListBasesResponse {
    #[serde(default)]
    pub bases: Vec<Base>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTablesResponse {
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Described {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        message: Option<String>,
    },
    Code(String),
}

impl ErrorDetail {
    pub fn describe(&self) -> String {
        match self {
            ErrorDetail::Described {
                kind,
                message: Some(message),
            } => format!("{}: {}", kind, message),
            ErrorDetail::Described { kind, message: None } => kind.clone(),
            ErrorDetail::Code(code) => code.clone(),
        }
    }
}
