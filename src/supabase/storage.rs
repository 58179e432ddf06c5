// Storage: dépôt de fichiers + URLs de téléchargement signées

use serde::Deserialize;

use super::{error_from_response, SupabaseClient, SupabaseError};

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseClient {
    /// Dépose un objet binaire et retourne son chemin de stockage.
    pub async fn storage_upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, SupabaseError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base(), bucket, path);
        let response = self
            .http()
            .post(url)
            .header("apikey", self.anon_key())
            .bearer_auth(self.access_token().await)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(path.to_string())
    }

    /// URL de téléchargement signée, valable `expires_in_seconds`.
    pub async fn storage_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_seconds: u32,
    ) -> Result<String, SupabaseError> {
        let url = format!("{}/storage/v1/object/sign/{}/{}", self.base(), bucket, path);
        let response = self
            .http()
            .post(url)
            .header("apikey", self.anon_key())
            .bearer_auth(self.access_token().await)
            .json(&serde_json::json!({ "expiresIn": expires_in_seconds }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: SignedUrlResponse = response.json().await?;
        if body.signed_url.starts_with('/') {
            Ok(format!("{}/storage/v1{}", self.base(), body.signed_url))
        } else {
            Ok(format!("{}/storage/v1/{}", self.base(), body.signed_url))
        }
    }
}
