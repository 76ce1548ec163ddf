//! Text-generation client for shift reports and intake summaries
//!
//! Callers never see a typed error from here: every failure is turned into a
//! short text that is shown in place of the report.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

pub const MISSING_API_KEY_TEXT: &str = "Error: API Key missing.";
pub const EMPTY_REPORT_TEXT: &str = "No report generated.";
pub const REPORT_FAILED_TEXT: &str = "Failed to generate report due to an API error.";
pub const ANALYSIS_FAILED_TEXT: &str = "Could not analyze intake form.";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("API key missing")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Text service returned error status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Text-generation backend
#[async_trait]
pub trait ReportClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ReportError>;
}

/// Used when no API key is configured
pub struct UnconfiguredReportClient;

#[async_trait]
impl ReportClient for UnconfiguredReportClient {
    async fn generate(&self, _prompt: &str) -> Result<String, ReportError> {
        warn!("Report requested but no text service API key is configured");
        Err(ReportError::MissingApiKey)
    }
}

/// POSTs prompts to an HTTP text-generation endpoint
pub struct HttpReportClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    contents: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: Option<String>,
}

impl HttpReportClient {
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint,
            api_key,
            model,
            client,
        })
    }
}

#[async_trait]
impl ReportClient for HttpReportClient {
    async fn generate(&self, prompt: &str) -> Result<String, ReportError> {
        let request = GenerateRequest {
            model: &self.model,
            contents: prompt,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(ReportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ReportError::Request(format!("invalid response body: {}", e)))?;
        info!(model = %self.model, "Text service call succeeded");
        Ok(body.text.unwrap_or_default())
    }
}

/// Daily shift report text for the manager dashboard
pub async fn shift_report(client: &dyn ReportClient, prompt: &str) -> String {
    match client.generate(prompt).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => EMPTY_REPORT_TEXT.to_string(),
        Err(ReportError::MissingApiKey) => MISSING_API_KEY_TEXT.to_string(),
        Err(e) => {
            error!("Shift report generation failed: {}", e);
            REPORT_FAILED_TEXT.to_string()
        }
    }
}

/// Risk summary text for one intake application
pub async fn intake_risk_summary(client: &dyn ReportClient, prompt: &str) -> String {
    match client.generate(prompt).await {
        Ok(text) if !text.trim().is_empty() => text,
        Err(ReportError::MissingApiKey) => MISSING_API_KEY_TEXT.to_string(),
        Ok(_) => ANALYSIS_FAILED_TEXT.to_string(),
        Err(e) => {
            error!("Intake analysis failed: {}", e);
            ANALYSIS_FAILED_TEXT.to_string()
        }
    }
}
