// Lectures/écritures filtrées sur les tables du backend

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

use super::{error_from_response, SupabaseClient, SupabaseError};

/// Requête filtrée sur une table. Chaque opération du client émet une seule
/// requête: pas de cache, pas de retry, pas de batching.
pub struct QueryBuilder<'a> {
    client: &'a SupabaseClient,
    table: String,
    params: Vec<(String, String)>,
    range: Option<(u32, u32)>,
    count_exact: bool,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(client: &'a SupabaseClient, table: &str) -> Self {
        QueryBuilder {
            client,
            table: table.to_string(),
            params: vec![("select".to_string(), "*".to_string())],
            range: None,
            count_exact: false,
        }
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn in_list<T: Display>(mut self, column: &str, values: &[T]) -> Self {
        let list = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.params.push((column.to_string(), format!("in.({list})")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{column}.{direction}")));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    /// Fenêtre de lignes inclusive, émise en en-tête `Range`.
    pub fn range(mut self, from: u32, to: u32) -> Self {
        self.range = Some((from, to));
        self
    }

    async fn send(
        &self,
        method: Method,
        body: Option<serde_json::Value>,
        prefer: &[&str],
    ) -> Result<reqwest::Response, SupabaseError> {
        let url = format!("{}/rest/v1/{}", self.client.base(), self.table);
        let mut request = self
            .client
            .http()
            .request(method, url)
            .query(&self.params)
            .header("apikey", self.client.anon_key())
            .bearer_auth(self.client.access_token().await);

        if let Some((from, to)) = self.range {
            request = request
                .header("Range-Unit", "items")
                .header("Range", format!("{from}-{to}"));
        }

        let mut prefer_parts: Vec<&str> = prefer.to_vec();
        if self.count_exact {
            prefer_parts.push("count=exact");
        }
        if !prefer_parts.is_empty() {
            request = request.header("Prefer", prefer_parts.join(","));
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, SupabaseError> {
        let response = self.send(Method::GET, None, &[]).await?;
        Ok(response.json().await?)
    }

    /// Page de lignes + total exact en un seul aller-retour.
    pub async fn fetch_with_count<T: DeserializeOwned>(
        mut self,
    ) -> Result<(Vec<T>, u64), SupabaseError> {
        self.count_exact = true;
        let response = self.send(Method::GET, None, &[]).await?;
        let total = content_range_total(&response);
        let rows: Vec<T> = response.json().await?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    /// Zéro ligne est un résultat valide, pas une erreur.
    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>, SupabaseError> {
        let rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    pub async fn single<T: DeserializeOwned>(self) -> Result<T, SupabaseError> {
        let table = self.table.clone();
        self.maybe_single().await?.ok_or_else(|| SupabaseError::Api {
            code: Some("PGRST116".to_string()),
            message: format!("No rows found in {table}"),
        })
    }

    /// Total exact sans rapatrier de lignes (requête HEAD).
    pub async fn count(mut self) -> Result<u64, SupabaseError> {
        self.count_exact = true;
        let response = self.send(Method::HEAD, None, &[]).await?;
        Ok(content_range_total(&response).unwrap_or(0))
    }

    pub async fn insert<T: DeserializeOwned>(
        self,
        body: &impl Serialize,
    ) -> Result<T, SupabaseError> {
        let value = to_body(body)?;
        let response = self
            .send(Method::POST, Some(value), &["return=representation"])
            .await?;
        first_row(response, "insert returned no rows").await
    }

    pub async fn update<T: DeserializeOwned>(
        self,
        body: &impl Serialize,
    ) -> Result<T, SupabaseError> {
        let value = to_body(body)?;
        let response = self
            .send(Method::PATCH, Some(value), &["return=representation"])
            .await?;
        first_row(response, "update matched no rows").await
    }

    /// Mutation sans relecture (touch de last_login, marquages en masse).
    pub async fn update_void(self, body: &impl Serialize) -> Result<(), SupabaseError> {
        let value = to_body(body)?;
        self.send(Method::PATCH, Some(value), &[]).await?;
        Ok(())
    }

    pub async fn delete(self) -> Result<(), SupabaseError> {
        self.send(Method::DELETE, None, &[]).await?;
        Ok(())
    }
}

fn to_body(body: &impl Serialize) -> Result<serde_json::Value, SupabaseError> {
    serde_json::to_value(body).map_err(|e| SupabaseError::Api {
        code: None,
        message: format!("unserializable payload: {e}"),
    })
}

async fn first_row<T: DeserializeOwned>(
    response: reqwest::Response,
    empty_message: &str,
) -> Result<T, SupabaseError> {
    let rows: Vec<T> = response.json().await?;
    rows.into_iter().next().ok_or_else(|| SupabaseError::Api {
        code: None,
        message: empty_message.to_string(),
    })
}

fn content_range_total(response: &reqwest::Response) -> Option<u64> {
    parse_content_range(response.headers().get("content-range")?.to_str().ok()?)
}

/// `Content-Range: 10-19/25` → 25. Le total peut aussi être `*` (inconnu).
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.parse().ok()
}
