use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: Uuid,
    #[serde(default)]
    pub consultation_request_id: Option<Uuid>,
    #[serde(default)]
    pub attachment_bin_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: FileKind,
    pub file_size_bytes: i64,
    pub storage_path: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub text_extraction_success: bool,
    #[serde(default)]
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}
