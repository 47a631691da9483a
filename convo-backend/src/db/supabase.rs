//! Supabase client - PostgREST access and connection details
//!
//! This file contains:
//! - SupabaseClient struct definition
//! - Request helpers shared by the table modules (select, insert, update)
//! - Error decoding for PostgREST responses
//!
//! Table-specific operations are in the tables/ subdirectory.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Phoenix protocol version spoken by the realtime endpoint
pub const REALTIME_PROTOCOL_VSN: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Supabase not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY environment variables.")]
    NotConfigured,

    #[error("Invalid Supabase URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("JSON object requested, multiple (or no) rows returned")]
    NotSingleRow,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Error body returned by PostgREST
#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Thin PostgREST client bound to one project and key
#[derive(Clone)]
pub struct SupabaseClient {
    project_url: Url,
    api_key: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("project_url", &self.project_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    /// Create a client for the project at `url` (e.g. `https://xyz.supabase.co`)
    pub fn new(url: &str, api_key: &str) -> DbResult<Self> {
        let url = url.trim();
        let api_key = api_key.trim();
        if url.is_empty() || api_key.is_empty() {
            return Err(DbError::NotConfigured);
        }

        let project_url =
            Url::parse(url).map_err(|e| DbError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(project_url.scheme(), "http" | "https") {
            return Err(DbError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                url
            )));
        }

        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(api_key)
            .map_err(|_| DbError::InvalidUrl("API key contains invalid characters".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| DbError::InvalidUrl("API key contains invalid characters".to_string()))?;
        headers.insert("apikey", key_value);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            project_url,
            api_key: api_key.to_string(),
            http,
        })
    }

    pub fn project_url(&self) -> &Url {
        &self.project_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// `<project>/rest/v1/<table>`
    pub(crate) fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.project_url.as_str().trim_end_matches('/'),
            table
        )
    }

    /// Websocket endpoint for realtime change subscriptions
    pub fn realtime_url(&self) -> DbResult<Url> {
        let mut url = self.project_url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| DbError::InvalidUrl(self.project_url.to_string()))?;

        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/realtime/v1/websocket", base_path));
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", REALTIME_PROTOCOL_VSN);

        Ok(url)
    }

    /// `GET /rest/v1/<table>?<query>`
    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> DbResult<Vec<T>> {
        let response = self
            .http
            .get(self.table_url(table))
            .query(query)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Insert one row and return it as stored
    pub(crate) async fn insert_one<T, B>(&self, table: &str, body: &B) -> DbResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let rows: Vec<T> = Self::decode(response).await?;
        Self::single(rows)
    }

    /// Update the rows matching `filters` and return the single updated row
    pub(crate) async fn update_one<T, B>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: &B,
    ) -> DbResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .http
            .patch(self.table_url(table))
            .query(filters)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let rows: Vec<T> = Self::decode(response).await?;
        Self::single(rows)
    }

    fn single<T>(mut rows: Vec<T>) -> DbResult<T> {
        if rows.len() != 1 {
            return Err(DbError::NotSingleRow);
        }
        rows.pop().ok_or(DbError::NotSingleRow)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> DbResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn api_error(status: u16, body: &str) -> DbError {
        match serde_json::from_str::<PostgrestError>(body) {
            Ok(err) => {
                let message = err
                    .message
                    .or(err.details)
                    .or(err.hint)
                    .unwrap_or_else(|| format!("HTTP {}", status));
                DbError::Api {
                    status,
                    message,
                    code: err.code,
                }
            }
            Err(_) => DbError::Api {
                status,
                message: if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                },
                code: None,
            },
        }
    }
}

/// PostgREST `eq` filter value
pub(crate) fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// PostgREST `in` filter value
pub(crate) fn in_list<T: std::fmt::Display>(values: &[T]) -> String {
    let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("in.({})", joined.join(","))
}
