//! Client for the external image-editing service.
//!
//! The service is a black box behind [`EditService`]: submit an encoded image and a
//! location phrase, receive an encoded image back. [`GeminiClient`] talks to the
//! Gemini `generateContent` REST endpoint; tests substitute their own implementation.

use async_trait::async_trait;
use image::ImageFormat;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};

/// Prefix of every image returned by [`EditService::remove_watermark`].
///
/// Results are always labelled PNG, whatever the input type was.
pub const OUTPUT_PREFIX: &str = "data:image/png;base64,";

/// Image media types accepted by the edit service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// `image/png`, also the default when a payload carries no prefix.
    Png,
    /// `image/jpeg`.
    Jpeg,
    /// `image/webp`.
    Webp,
}

impl MediaType {
    /// The MIME string, e.g. `"image/jpeg"`.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
        }
    }

    /// Map a sniffed [`ImageFormat`] to a media type the service accepts.
    #[must_use]
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(MediaType::Png),
            ImageFormat::Jpeg => Some(MediaType::Jpeg),
            ImageFormat::WebP => Some(MediaType::Webp),
            _ => None,
        }
    }

    fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype {
            "png" => Some(MediaType::Png),
            "jpeg" | "jpg" => Some(MediaType::Jpeg),
            "webp" => Some(MediaType::Webp),
            _ => None,
        }
    }
}

/// Split a `data:image/<subtype>;base64,` URI into its media type and raw payload.
///
/// Payloads without a recognised prefix are returned unchanged and labelled PNG.
#[must_use]
pub fn split_data_uri(encoded: &str) -> (MediaType, &str) {
    let parsed = encoded
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .and_then(|(subtype, data)| MediaType::from_subtype(subtype).map(|m| (m, data)));

    parsed.unwrap_or((MediaType::Png, encoded))
}

/// Build the edit instruction sent alongside the image.
#[must_use]
pub fn instruction(location_phrase: &str) -> String {
    format!(
        "Edit this image to completely remove the watermark, text, or logo located \
         {location_phrase}. Fill in the removed area seamlessly to match the surrounding \
         background texture and lighting. Return ONLY the edited image."
    )
}

/// An external service able to erase a watermark from an image.
#[async_trait]
pub trait EditService: Send + Sync {
    /// Remove the watermark found `location_phrase` (e.g. "in the top-left corner").
    ///
    /// `encoded_image` is base64, optionally carrying a data-URI prefix. On success the
    /// edited image is returned as a PNG data URI.
    ///
    /// # Errors
    ///
    /// [`Error::RequestFailed`] for transport or service faults and
    /// [`Error::NoImageReturned`] when the response carries no image.
    async fn remove_watermark(&self, encoded_image: &str, location_phrase: &str)
        -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<RequestBlob<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBlob<'a> {
    mime_type: &'static str,
    data: &'a str,
}

/// Response body of a `generateContent` call, reduced to the fields we read.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Generated candidates; only the first one is inspected.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Set when the prompt itself was blocked.
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// One generated candidate.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Candidate content, absent when generation was stopped early.
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped, e.g. `"STOP"` or `"SAFETY"`.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Ordered content parts of a candidate.
#[derive(Debug, Default, Deserialize)]
pub struct Content {
    /// Text and inline-data parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A single content part.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text returned by the model, if any.
    #[serde(default)]
    pub text: Option<String>,
    /// Inline binary data, if any.
    #[serde(default)]
    pub inline_data: Option<Blob>,
}

/// Base64 binary payload of a part.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// Declared media type of the payload.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Base64 data.
    #[serde(default)]
    pub data: Option<String>,
}

/// Feedback about the prompt.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Reason the prompt was blocked.
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Pull the first inline image out of a response, re-wrapped as a PNG data URI.
///
/// # Errors
///
/// Returns [`Error::NoImageReturned`] if the first candidate has no inline data.
pub fn extract_image(response: &GenerateContentResponse) -> Result<String> {
    let data = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|content| {
            content.parts.iter().find_map(|part| {
                part.inline_data
                    .as_ref()
                    .and_then(|blob| blob.data.as_deref())
                    .filter(|d| !d.is_empty())
            })
        });

    match data {
        Some(data) => Ok(format!("{OUTPUT_PREFIX}{data}")),
        None => {
            if let Some(reason) = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                warn!("prompt blocked by the service: {reason}");
            }
            if let Some(reason) = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
            {
                warn!("no image returned (finish reason: {reason})");
            }
            Err(Error::NoImageReturned)
        }
    }
}

/// [`EditService`] backed by the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    config: ServiceConfig,
}

impl GeminiClient {
    /// Create a client with a default HTTP connection pool.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a client around an existing `reqwest` client.
    #[must_use]
    pub fn with_http_client(config: ServiceConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn send(&self, encoded_image: &str, location_phrase: &str) -> Result<String> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            Error::RequestFailed(
                "no API key configured (set GEMINI_API_KEY or pass --api-key)".to_string(),
            )
        })?;

        let (media_type, data) = split_data_uri(encoded_image);
        let prompt = instruction(location_phrase);
        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [
                    RequestPart {
                        inline_data: Some(RequestBlob {
                            mime_type: media_type.mime(),
                            data,
                        }),
                        text: None,
                    },
                    RequestPart {
                        inline_data: None,
                        text: Some(prompt.as_str()),
                    },
                ],
            }],
        };

        info!(
            "requesting edit from {} ({}, target {location_phrase})",
            self.config.model,
            media_type.mime()
        );

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RequestFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::RequestFailed(format!("failed to parse response: {e}")))?;

        extract_image(&parsed)
    }
}

#[async_trait]
impl EditService for GeminiClient {
    async fn remove_watermark(
        &self,
        encoded_image: &str,
        location_phrase: &str,
    ) -> Result<String> {
        let result = self.send(encoded_image, location_phrase).await;
        if let Err(e) = &result {
            error!("Gemini API error: {e}");
        }
        result
    }
}
