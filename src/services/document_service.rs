// Documents: dépôt dans le storage puis métadonnées en table

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::document::{FileKind, UploadedDocument};
use crate::supabase::SupabaseClient;

const TABLE: &str = "uploaded_documents";
const BUCKET: &str = "consultation-documents";
const SIGNED_URL_TTL_SECONDS: u32 = 3600;

pub struct DocumentService;

impl DocumentService {
    /// Téléverse un document puis enregistre ses métadonnées. Le type et la
    /// taille sont vérifiés avant le moindre appel réseau.
    pub async fn upload_document(
        client: &SupabaseClient,
        file_name: &str,
        content: Vec<u8>,
        consultation_request_id: Option<Uuid>,
        attachment_bin_id: Option<Uuid>,
        uploaded_by: Option<Uuid>,
    ) -> Result<UploadedDocument, ServiceError> {
        // 1. Type de fichier accepté
        let extension = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
        let (file_type, content_type) = match extension.as_str() {
            "pdf" => (FileKind::Pdf, "application/pdf"),
            "docx" => (
                FileKind::Docx,
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ),
            _ => {
                return Err(ServiceError::Validation(
                    "Only PDF and DOCX files are allowed".to_string(),
                ))
            }
        };

        // 2. Limite de taille
        let max_mb = client.config().max_file_size_mb;
        if content.len() as u64 > max_mb * 1024 * 1024 {
            return Err(ServiceError::Validation(format!(
                "File size exceeds {max_mb}MB limit"
            )));
        }

        // 3. Chemin de stockage unique
        let suffix = hex::encode(rand::random::<[u8; 4]>());
        let storage_path = format!(
            "documents/{}_{}.{}",
            Utc::now().timestamp_millis(),
            suffix,
            extension
        );

        // 4. Dépôt du binaire puis insertion des métadonnées
        let file_size_bytes = content.len() as i64;
        let storage_path = client
            .storage_upload(BUCKET, &storage_path, content, content_type)
            .await?;

        Ok(client
            .from(TABLE)
            .insert(&json!({
                "consultation_request_id": consultation_request_id,
                "attachment_bin_id": attachment_bin_id,
                "file_name": file_name,
                "file_type": file_type,
                "file_size_bytes": file_size_bytes,
                "storage_path": storage_path,
                "uploaded_by": uploaded_by,
            }))
            .await?)
    }

    /// Variante pour un contenu reçu encodé en base64 (lecture de fichier
    /// côté client mobile).
    pub async fn upload_document_base64(
        client: &SupabaseClient,
        file_name: &str,
        base64_content: &str,
        consultation_request_id: Option<Uuid>,
        attachment_bin_id: Option<Uuid>,
        uploaded_by: Option<Uuid>,
    ) -> Result<UploadedDocument, ServiceError> {
        let content = BASE64
            .decode(base64_content)
            .map_err(|e| ServiceError::Validation(format!("invalid base64 payload: {e}")))?;
        Self::upload_document(
            client,
            file_name,
            content,
            consultation_request_id,
            attachment_bin_id,
            uploaded_by,
        )
        .await
    }

    /// URL de téléchargement signée, valable une heure.
    pub async fn document_url(
        client: &SupabaseClient,
        storage_path: &str,
    ) -> Result<String, ServiceError> {
        Ok(client
            .storage_signed_url(BUCKET, storage_path, SIGNED_URL_TTL_SECONDS)
            .await?)
    }

    /// Documents d'une demande de consultation, les plus récents d'abord.
    pub async fn consultation_documents(
        client: &SupabaseClient,
        consultation_request_id: Uuid,
    ) -> Result<Vec<UploadedDocument>, ServiceError> {
        Ok(client
            .from(TABLE)
            .eq("consultation_request_id", consultation_request_id)
            .eq("is_deleted", false)
            .order("uploaded_at", false)
            .fetch()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::supabase::test_client;
    use httpmock::prelude::*;

    fn document_row(storage_path: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "file_name": "notes.pdf",
            "file_type": "pdf",
            "file_size_bytes": 8,
            "storage_path": storage_path,
            "uploaded_at": "2026-02-01T10:00:00+00:00"
        })
    }

    #[tokio::test]
    async fn test_rejects_unsupported_extension_before_any_call() {
        let client = test_client("http://127.0.0.1:9");
        let err = DocumentService::upload_document(
            &client,
            "malware.exe",
            b"MZ".to_vec(),
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Only PDF and DOCX files are allowed");
    }

    #[tokio::test]
    async fn test_rejects_oversized_file_before_any_call() {
        // Limite à 0 MB: tout contenu non vide dépasse
        let config = Config {
            supabase_url: "http://127.0.0.1:9".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            session_file: std::env::temp_dir().join(format!("nexad_doc_{}.json", Uuid::new_v4())),
            callback_port: 8765,
            max_file_size_mb: 0,
        };
        let client = SupabaseClient::new(config);

        let err = DocumentService::upload_document(
            &client,
            "notes.pdf",
            b"%PDF-1.4".to_vec(),
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "File size exceeds 0MB limit");
    }

    #[tokio::test]
    async fn test_rejects_invalid_base64() {
        let client = test_client("http://127.0.0.1:9");
        let err = DocumentService::upload_document_base64(
            &client,
            "notes.pdf",
            "this is not base64!!!",
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_stores_binary_then_metadata() {
        let server = MockServer::start_async().await;
        let storage = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path_contains("/storage/v1/object/consultation-documents/documents/");
                then.status(200).json_body(json!({ "Key": "ok" }));
            })
            .await;
        let metadata = server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/uploaded_documents");
                then.status(201)
                    .json_body(json!([document_row("documents/123_abcd.pdf")]));
            })
            .await;

        let client = test_client(&server.base_url());
        let document = DocumentService::upload_document(
            &client,
            "notes.pdf",
            b"%PDF-1.4".to_vec(),
            Some(Uuid::new_v4()),
            None,
            Some(Uuid::new_v4()),
        )
        .await
        .unwrap();

        assert_eq!(document.file_type, FileKind::Pdf);
        assert!(document.storage_path.starts_with("documents/"));
        assert_eq!(storage.hits_async().await, 1);
        assert_eq!(metadata.hits_async().await, 1);
    }
}
