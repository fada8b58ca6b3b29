use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recorder is not configured")]
    NotConfigured,
    #[error("recorder request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    ip: &'a str,
    port: u16,
    codec: &'a str,
    #[serde(rename = "producerId")]
    producer_id: &'a str,
    #[serde(rename = "payloadType")]
    payload_type: u8,
    ssrc: u32,
}

#[derive(Debug, Deserialize)]
pub struct StartResponse {
    pub ok: bool,
    #[serde(rename = "outputFile")]
    pub output_file: String,
}

#[derive(Debug, Serialize)]
struct StopRequest<'a> {
    #[serde(rename = "producerId")]
    producer_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StopResponse {
    pub ok: bool,
}

/// Thin client for the external Recorder RPC (spec.md §6), same
/// "single-purpose reqwest wrapper with typed request/response structs"
/// shape the teacher uses for its other external-service clients.
pub struct RecorderClient {
    base_url: Option<String>,
    http: reqwest::Client,
}

pub struct RtpTapParams<'a> {
    pub ip: &'a str,
    pub port: u16,
    pub codec: &'a str,
    pub payload_type: u8,
    pub ssrc: u32,
}

impl RecorderClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub async fn start(
        &self,
        producer_id: &str,
        params: RtpTapParams<'_>,
    ) -> Result<StartResponse, RecorderError> {
        let base = self.base_url.as_ref().ok_or(RecorderError::NotConfigured)?;
        let body = StartRequest {
            ip: params.ip,
            port: params.port,
            codec: params.codec,
            producer_id,
            payload_type: params.payload_type,
            ssrc: params.ssrc,
        };
        let response = self
            .http
            .post(format!("{base}/start"))
            .json(&body)
            .send()
            .await?
            .json::<StartResponse>()
            .await?;
        Ok(response)
    }

    pub async fn stop(&self, producer_id: &str) -> Result<StopResponse, RecorderError> {
        let base = self.base_url.as_ref().ok_or(RecorderError::NotConfigured)?;
        let response = self
            .http
            .post(format!("{base}/stop"))
            .json(&StopRequest { producer_id })
            .send()
            .await?
            .json::<StopResponse>()
            .await?;
        Ok(response)
    }
}
