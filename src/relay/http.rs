use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::CONTENT_TYPE,
    multipart::{Form, Part},
    Client, Response,
};
use serde::Deserialize;
use tracing::debug;

use super::{ChunkPayload, ChunkRelay, FetchRequest, ProxyResponse, RelayProxy, SubChunkManifest};
use crate::error::RelayError;
use crate::Provider;

pub fn build_client(request_timeout: Duration) -> Result<Client, RelayError> {
    Client::builder()
        .timeout(request_timeout)
        .build()
        .map_err(RelayError::from)
}

#[derive(Deserialize)]
struct UploadResponse {
    link: String,
}

async fn error_for_status(response: Response) -> Result<Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RelayError::Http { status: status.as_u16(), body })
}

/// Upload endpoint for one provider, taking multipart chunk submissions.
pub struct HttpChunkRelay {
    name: String,
    provider: Provider,
    upload_url: String,
    client: Client,
}

impl HttpChunkRelay {
    pub fn new(provider: Provider, upload_url: impl Into<String>, client: Client) -> Self {
        Self {
            name: provider.to_string(),
            provider,
            upload_url: upload_url.into(),
            client,
        }
    }
}

#[async_trait]
impl ChunkRelay for HttpChunkRelay {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    async fn upload_chunk(&self, payload: &ChunkPayload) -> Result<String, RelayError> {
        let chunk = Part::bytes(payload.data.clone())
            .file_name(format!("chunk_{}.bin", payload.index))
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("chunkData", chunk)
            .text("chunkIndex", payload.index.to_string())
            .text("keyBase64", payload.key_base64.clone())
            .text("fileName", payload.file_name.clone());

        debug!(url = %self.upload_url, chunk = payload.index, bytes = payload.data.len(), "posting chunk");
        let response = self.client.post(&self.upload_url).multipart(form).send().await?;
        let response = error_for_status(response).await?;

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;
        if body.link.trim().is_empty() {
            return Err(RelayError::InvalidResponse("empty link".to_string()));
        }
        Ok(body.link)
    }
}

/// Download proxy resolving links to stored bytes.
pub struct HttpRelayProxy {
    download_url: String,
    client: Client,
}

impl HttpRelayProxy {
    pub fn new(download_url: impl Into<String>, client: Client) -> Self {
        Self { download_url: download_url.into(), client }
    }
}

#[async_trait]
impl RelayProxy for HttpRelayProxy {
    async fn fetch(&self, request: &FetchRequest) -> Result<ProxyResponse, RelayError> {
        let response = self.client.post(&self.download_url).json(request).send().await?;
        let response = error_for_status(response).await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("application/json"))
            .unwrap_or(false);

        if is_json {
            let manifest: SubChunkManifest = response
                .json()
                .await
                .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;
            manifest.validate()?;
            Ok(ProxyResponse::Chunked(manifest))
        } else {
            Ok(ProxyResponse::Bytes(response.bytes().await?.to_vec()))
        }
    }
}
