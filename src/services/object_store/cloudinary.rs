use std::{path::Path, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ObjectStore, ObjectStoreError};
use crate::{config::CloudinaryConfig, models::media::MediaAsset};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
/// Uploads and deletes share one resource type so every stored asset can be
/// destroyed. Non-image files are refused by the upload endpoint.
const RESOURCE_TYPE: &str = "image";

pub struct CloudinaryObjectStore {
    http: Client,
    creds: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryObjectStore {
    pub fn new(creds: CloudinaryConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { http, creds })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{API_BASE}/{}/{RESOURCE_TYPE}/{action}", self.creds.cloud_name)
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-256 hex.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{joined}{api_secret}").as_bytes()))
}

/// 4xx means the provider looked at this request and refused it; anything
/// else is treated as the provider being unavailable.
fn classify(status: StatusCode, body: String) -> ObjectStoreError {
    if status.is_client_error() && status != StatusCode::UNAUTHORIZED && status != StatusCode::TOO_MANY_REQUESTS {
        ObjectStoreError::Rejected(format!("{status}: {body}"))
    } else {
        ObjectStoreError::Unavailable(format!("{status}: {body}"))
    }
}

fn unavailable(err: reqwest::Error) -> ObjectStoreError {
    ObjectStoreError::Unavailable(err.to_string())
}

#[async_trait]
impl ObjectStore for CloudinaryObjectStore {
    async fn upload(&self, path: &Path) -> Result<MediaAsset, ObjectStoreError> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(ObjectStoreError::Rejected("empty file".into()));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&[("timestamp", timestamp.as_str())], &self.creds.api_secret);

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.essence_str())
            .map_err(unavailable)?;
        let form = multipart::Form::new()
            .part("file", file_part)
            .text("api_key", self.creds.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }

        let uploaded: UploadResponse = response.json().await.map_err(unavailable)?;
        tracing::debug!(public_id = %uploaded.public_id, "uploaded to cloudinary");
        Ok(MediaAsset {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), ObjectStoreError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.creds.api_secret,
        );

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", public_id),
                ("api_key", self.creds.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }

        let destroyed: DestroyResponse = response.json().await.map_err(unavailable)?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(ObjectStoreError::Unavailable(format!("destroy returned {other}"))),
        }
    }

    fn public_id_from_url(&self, url: &str) -> Option<String> {
        let marker = format!("res.cloudinary.com/{}/{RESOURCE_TYPE}/upload/", self.creds.cloud_name);
        let (_, rest) = url.split_once(&marker)?;
        let last = rest.rsplit('/').next()?;
        let id = last.split('.').next()?;
        (!id.is_empty()).then(|| id.to_string())
    }
}
