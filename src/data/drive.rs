//! Google Drive integration (read-only).
//!
//! Design goals:
//! - **Sequential and simple**: one blocking request at a time, a flat
//!   per-request timeout, and no retry anywhere. A failed file is skipped;
//!   the next scheduled run catches up.
//! - **Service-account only**: the collector runs headless under a
//!   scheduler, so the JWT-bearer grant is the whole auth story.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const PAGE_SIZE: &str = "1000";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const GOOGLE_SHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";
const CSV_MIME: &str = "text/csv";

/// One listed Drive file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl DriveFile {
    /// Name for the local mirror copy. Native Sheets are exported as xlsx,
    /// so they gain the extension their bytes will actually have.
    pub fn local_name(&self) -> String {
        if self.mime_type == GOOGLE_SHEET_MIME && !self.name.to_lowercase().ends_with(".xlsx") {
            format!("{}.xlsx", self.name)
        } else {
            self.name.clone()
        }
    }
}

fn is_spreadsheet_mime(mime: &str) -> bool {
    matches!(mime, XLSX_MIME | XLS_MIME | CSV_MIME | GOOGLE_SHEET_MIME)
}

/// Accept a bare folder id, a `…/folders/<id>` URL, or an `…?id=<id>` URL.
pub fn extract_folder_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some((_, rest)) = input.split_once("/folders/") {
        return take_id(rest);
    }
    if let Some((_, rest)) = input.split_once("?id=").or_else(|| input.split_once("&id=")) {
        return take_id(rest);
    }
    if input.contains('/') || input.contains('?') {
        return None;
    }
    Some(input.to_string())
}

fn take_id(s: &str) -> Option<String> {
    let id: String = s
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if id.is_empty() { None } else { Some(id) }
}

pub struct DriveClient {
    client: Client,
    access_token: String,
}

impl DriveClient {
    /// Build an authenticated client from the environment.
    ///
    /// The service account key comes from `GOOGLE_APPLICATION_CREDENTIALS`
    /// (a key file path) or `GOOGLE_APPLICATION_CREDENTIALS_JSON` (the key
    /// inline). Missing or unparseable credentials abort immediately.
    pub fn from_env(timeout_secs: u64) -> Result<Self, AppError> {
        let key = load_service_account_key()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        let access_token = fetch_access_token(&client, &key)?;
        Ok(Self {
            client,
            access_token,
        })
    }

    /// List every spreadsheet-like file under `folder_id`, recursing
    /// breadth-first into subfolders.
    ///
    /// A listing failure on the root folder is an error (nothing to do); on
    /// a subfolder it is logged and that branch is skipped.
    pub fn list_spreadsheets(&self, folder_id: &str) -> Result<Vec<DriveFile>, AppError> {
        let mut spreadsheets = Vec::new();
        let mut queue = VecDeque::from([folder_id.to_string()]);
        let mut is_root = true;

        while let Some(folder) = queue.pop_front() {
            match self.list_folder(&folder) {
                Ok(entries) => {
                    for entry in entries {
                        if entry.mime_type == FOLDER_MIME {
                            queue.push_back(entry.id);
                        } else if is_spreadsheet_mime(&entry.mime_type) {
                            spreadsheets.push(entry);
                        }
                    }
                }
                Err(e) if is_root => return Err(e),
                Err(e) => warn!("subfolder {folder}: listing failed, skipping branch: {e}"),
            }
            is_root = false;
        }

        Ok(spreadsheets)
    }

    fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>, AppError> {
        let query = format!("'{folder_id}' in parents and trashed = false");
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(FILES_URL)
                .bearer_auth(&self.access_token)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken,files(id,name,mimeType)"),
                    ("pageSize", PAGE_SIZE),
                ]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req
                .send()
                .map_err(|e| AppError::new(4, format!("Drive listing failed: {e}")))?;
            if !resp.status().is_success() {
                return Err(AppError::new(
                    4,
                    format!("Drive listing failed with status {}.", resp.status()),
                ));
            }
            let body: FileListResponse = resp
                .json()
                .map_err(|e| AppError::new(4, format!("Failed to parse Drive listing: {e}")))?;

            files.extend(body.files);
            match body.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    /// Download one file to `path`. Binary uploads come via `alt=media`;
    /// native Sheets are exported to xlsx.
    pub fn download_to(&self, file: &DriveFile, path: &Path) -> Result<(), AppError> {
        let req = if file.mime_type == GOOGLE_SHEET_MIME {
            self.client
                .get(format!("{FILES_URL}/{}/export", file.id))
                .query(&[("mimeType", XLSX_MIME)])
        } else {
            self.client
                .get(format!("{FILES_URL}/{}", file.id))
                .query(&[("alt", "media")])
        };

        let resp = req
            .bearer_auth(&self.access_token)
            .send()
            .map_err(|e| AppError::new(4, format!("Download of '{}' failed: {e}", file.name)))?;
        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!(
                    "Download of '{}' failed with status {}.",
                    file.name,
                    resp.status()
                ),
            ));
        }
        let bytes = resp
            .bytes()
            .map_err(|e| AppError::new(4, format!("Download of '{}' failed: {e}", file.name)))?;

        std::fs::write(path, &bytes)
            .map_err(|e| AppError::new(4, format!("Failed to write '{}': {e}", path.display())))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn load_service_account_key() -> Result<ServiceAccountKey, AppError> {
    dotenvy::dotenv().ok();

    let raw = if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        std::fs::read_to_string(&path).map_err(|e| {
            AppError::new(2, format!("Failed to read credentials file '{path}': {e}"))
        })?
    } else if let Ok(json) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS_JSON") {
        json
    } else {
        return Err(AppError::new(
            2,
            "Missing GOOGLE_APPLICATION_CREDENTIALS (key file path) or \
             GOOGLE_APPLICATION_CREDENTIALS_JSON (inline key) in environment (.env).",
        ));
    };

    serde_json::from_str(&raw)
        .map_err(|e| AppError::new(2, format!("Invalid service account key JSON: {e}")))
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

fn fetch_access_token(client: &Client, key: &ServiceAccountKey) -> Result<String, AppError> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| AppError::new(2, format!("Invalid service account private key: {e}")))?;
    let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| AppError::new(4, format!("Failed to sign auth assertion: {e}")))?;

    let resp = client
        .post(&key.token_uri)
        .form(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .map_err(|e| AppError::new(4, format!("Token request failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(AppError::new(
            4,
            format!("Token request failed with status {}.", resp.status()),
        ));
    }

    let body: TokenResponse = resp
        .json()
        .map_err(|e| AppError::new(4, format!("Failed to parse token response: {e}")))?;
    Ok(body.access_token)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_id_accepts_the_three_input_forms() {
        assert_eq!(
            extract_folder_id("1AbC-d_9xyz"),
            Some("1AbC-d_9xyz".to_string())
        );
        assert_eq!(
            extract_folder_id("https://drive.google.com/drive/folders/1AbC-d_9xyz?usp=sharing"),
            Some("1AbC-d_9xyz".to_string())
        );
        assert_eq!(
            extract_folder_id("https://drive.google.com/open?id=1AbC-d_9xyz"),
            Some("1AbC-d_9xyz".to_string())
        );
    }

    #[test]
    fn folder_id_rejects_unrecognized_urls() {
        assert_eq!(extract_folder_id(""), None);
        assert_eq!(extract_folder_id("   "), None);
        assert_eq!(extract_folder_id("https://drive.google.com/drive/my-drive"), None);
        assert_eq!(extract_folder_id("https://drive.google.com/drive/folders/"), None);
    }

    #[test]
    fn spreadsheet_mimes() {
        assert!(is_spreadsheet_mime(XLSX_MIME));
        assert!(is_spreadsheet_mime(XLS_MIME));
        assert!(is_spreadsheet_mime(CSV_MIME));
        assert!(is_spreadsheet_mime(GOOGLE_SHEET_MIME));
        assert!(!is_spreadsheet_mime(FOLDER_MIME));
        assert!(!is_spreadsheet_mime("image/png"));
    }

    #[test]
    fn native_sheets_gain_the_export_extension() {
        let sheet = DriveFile {
            id: "x".to_string(),
            name: "daily stats".to_string(),
            mime_type: GOOGLE_SHEET_MIME.to_string(),
        };
        assert_eq!(sheet.local_name(), "daily stats.xlsx");

        let upload = DriveFile {
            id: "y".to_string(),
            name: "export.csv".to_string(),
            mime_type: CSV_MIME.to_string(),
        };
        assert_eq!(upload.local_name(), "export.csv");
    }
}
