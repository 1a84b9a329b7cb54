//! Google Drive v3 REST client.

use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::session::DriveSession;

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type for JSON file content.
const JSON_MIME: &str = "application/json; charset=UTF-8";

/// Fixed boundary for multipart/related upload bodies.
const MULTIPART_BOUNDARY: &str = "-------314159265358979323846";

/// Metadata fields requested on single-file responses.
const FILE_FIELDS: &str = "id,name,webViewLink,modifiedTime,size";
/// Metadata fields requested on list responses.
const LIST_FIELDS: &str = "files(id,name,webViewLink,modifiedTime,size)";

/// Drive REST endpoints; overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    pub api_base: String,
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }
}

/// Google Drive file metadata from the API.
///
/// Always the server's view at the time of the call; never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// Server-assigned file ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// Link for opening the file in the Drive UI.
    #[serde(default)]
    pub web_view_link: Option<String>,
    /// Modified time.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// File size in bytes, as a decimal string per the Drive API.
    #[serde(default)]
    pub size: Option<String>,
}

impl DriveFile {
    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Assemble a multipart/related body with the fixed boundary.
///
/// Each part is (content type, data); CRLF line endings per the Drive
/// multipart upload convention, closing boundary with trailing `--`.
fn build_multipart(parts: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (content_type, data) in parts {
        body.push_str(&format!("--{}\r\n", MULTIPART_BOUNDARY));
        body.push_str(&format!("Content-Type: {}\r\n\r\n", content_type));
        body.push_str(data);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", MULTIPART_BOUNDARY));
    body
}

/// Google Drive API client bound to a session.
///
/// Operations are stateless and safe to issue concurrently once the
/// session holds a token.
pub struct DriveClient {
    http: Client,
    session: Arc<DriveSession>,
    endpoints: DriveEndpoints,
}

impl DriveClient {
    /// Create a client against the Google endpoints.
    pub fn new(session: Arc<DriveSession>) -> Self {
        Self::with_endpoints(session, DriveEndpoints::default())
    }

    /// Create a client against custom endpoints.
    pub fn with_endpoints(session: Arc<DriveSession>, endpoints: DriveEndpoints) -> Self {
        let http = Client::builder()
            .user_agent("drivelink/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            session,
            endpoints,
        }
    }

    /// Get the authorization header for the next request.
    ///
    /// Fails with [`Error::AuthenticationRequired`] before any network I/O
    /// when the session holds no token.
    async fn auth_header(&self) -> Result<String> {
        let token = self.session.require_token().await?;
        Ok(format!("Bearer {}", token))
    }

    /// Fail any non-2xx response with its status and best-effort body text.
    ///
    /// All statuses are reported uniformly; a 401 is not special-cased and
    /// does not trigger a refresh or retry.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| status_text.clone());

        Err(Error::Http {
            status: status.as_u16(),
            status_text,
            body,
        })
    }

    /// Parse a successful response body as JSON.
    async fn parse_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
    }

    /// Find the first non-trashed file with the given name.
    ///
    /// Only the first page of results is consulted; with duplicate names,
    /// first match wins.
    pub async fn find_file_by_name(&self, name: &str) -> Result<Option<DriveFile>> {
        let auth = self.auth_header().await?;
        let url = format!("{}/files", self.endpoints.api_base);

        let query = format!("name = '{}' and trashed = false", name.replace('\'', "\\'"));

        tracing::debug!(name, "Searching Drive for file by name");

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("spaces", "drive"),
            ])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to search files: {}", e)))?;

        let response = self.check(response).await?;
        let list: FileListResponse = self.parse_json(response).await?;

        Ok(list.files.into_iter().next())
    }

    /// Create a new JSON file via multipart upload.
    ///
    /// `initial` defaults to the empty JSON array and is stored
    /// pretty-printed. Not idempotent: Drive allows duplicate names, so
    /// callers wanting uniqueness must check [`Self::find_file_by_name`]
    /// first.
    pub async fn create_json_file(
        &self,
        name: &str,
        initial: Option<serde_json::Value>,
    ) -> Result<DriveFile> {
        let auth = self.auth_header().await?;
        let url = format!("{}/files", self.endpoints.upload_base);

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": "application/json"
        });
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| Error::Serialization(format!("Failed to serialize metadata: {}", e)))?;

        let content = initial.unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let content_json = serde_json::to_string_pretty(&content)
            .map_err(|e| Error::Serialization(format!("Failed to serialize content: {}", e)))?;

        let body = build_multipart(&[(JSON_MIME, &metadata_json), (JSON_MIME, &content_json)]);

        tracing::debug!(name, "Creating Drive JSON file");

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create file: {}", e)))?;

        let response = self.check(response).await?;
        self.parse_json(response).await
    }

    /// Download a file's content as text, buffered whole.
    pub async fn get_file_content(&self, file_id: &str) -> Result<String> {
        let auth = self.auth_header().await?;
        let url = format!("{}/files/{}", self.endpoints.api_base, file_id);

        tracing::debug!(file_id, "Fetching Drive file content");

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        let response = self.check(response).await?;

        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }

    /// Overwrite a file's content wholesale with a media upload.
    ///
    /// `text` is expected to be pre-serialized JSON but is passed through
    /// untouched. Returns the updated file metadata.
    pub async fn save_file_content(&self, file_id: &str, text: &str) -> Result<DriveFile> {
        let auth = self.auth_header().await?;
        let url = format!("{}/files/{}", self.endpoints.upload_base, file_id);

        tracing::debug!(file_id, "Saving Drive file content");

        let response = self
            .http
            .patch(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, JSON_MIME)
            .query(&[("uploadType", "media"), ("fields", FILE_FIELDS)])
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to save file: {}", e)))?;

        let response = self.check(response).await?;
        self.parse_json(response).await
    }
}
