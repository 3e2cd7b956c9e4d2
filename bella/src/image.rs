//! Image generation backed by Pollinations. Images are addressed by URL, so generating one is
//! mostly a matter of building the right query.

use crate::config::ImageConfig;
use serde::{Deserialize, Serialize};
use std::{sync::RwLock, time::Duration};
use thiserror::Error;

const BASE_URL: &str = "https://image.pollinations.ai/prompt";
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

pub const MODELS: [&str; 3] = ["flux", "turbo", "stable-diffusion"];
pub const MIN_DIMENSION: u32 = 256;
pub const MAX_DIMENSION: u32 = 2048;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Prompt is required")]
    MissingPrompt,
    #[error("Width and height must be between {} and {} pixels", MIN_DIMENSION, MAX_DIMENSION)]
    InvalidDimensions,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
    pub nologo: bool,
    pub enhance: bool,
}

impl Default for ImageRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: None,
            width: 1024,
            height: 1024,
            seed: None,
            nologo: true,
            enhance: false,
        }
    }
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ImageError> {
        if self.prompt.trim().is_empty() {
            return Err(ImageError::MissingPrompt);
        }
        let range = MIN_DIMENSION..=MAX_DIMENSION;
        if !range.contains(&self.width) || !range.contains(&self.height) {
            return Err(ImageError::InvalidDimensions);
        }
        Ok(())
    }
}

pub fn is_known_model(model: &str) -> bool {
    MODELS.contains(&model)
}

/// Percent-encodes a prompt for use as a path segment. Slashes are kept.
fn quote(prompt: &str) -> String {
    urlencoding::encode(prompt).replace("%2F", "/")
}

pub struct ImageService {
    http: reqwest::Client,
    auth_token: Option<String>,
    model: RwLock<&'static str>,
}

impl ImageService {
    pub fn new(config: &ImageConfig) -> Self {
        let model = MODELS
            .iter()
            .copied()
            .find(|model| *model == config.default_model)
            .unwrap_or(MODELS[0]);
        Self {
            http: reqwest::Client::new(),
            auth_token: config.auth_token.clone().filter(|token| !token.is_empty()),
            model: RwLock::new(model),
        }
    }

    pub fn current_model(&self) -> &'static str {
        *self.model.read().unwrap_or_else(|err| err.into_inner())
    }

    /// Switches the default model. Returns false if the model is not supported.
    pub fn set_model(&self, model: &str) -> bool {
        match MODELS.iter().copied().find(|known| *known == model) {
            Some(known) => {
                *self.model.write().unwrap_or_else(|err| err.into_inner()) = known;
                tracing::info!("Image model switched to {}", known);
                true
            }
            None => false,
        }
    }

    /// The model a request is generated with: its own if known, otherwise the current default.
    pub fn model_for<'a>(&self, request: &'a ImageRequest) -> &'a str {
        request
            .model
            .as_deref()
            .filter(|model| is_known_model(model))
            .unwrap_or_else(|| self.current_model())
    }

    pub fn generate_url(&self, request: &ImageRequest) -> String {
        let model = self.model_for(request);
        let mut url = format!(
            "{}/{}?model={}&width={}&height={}&nologo={}&enhance={}",
            BASE_URL,
            quote(&request.prompt),
            model,
            request.width,
            request.height,
            request.nologo,
            request.enhance
        );
        if let Some(seed) = request.seed {
            url.push_str(&format!("&seed={}", seed));
        }
        url
    }

    /// Downloads the generated image.
    pub async fn fetch_bytes(&self, request: &ImageRequest) -> Result<Vec<u8>, ImageError> {
        let mut builder = self
            .http
            .get(self.generate_url(request))
            .timeout(FETCH_TIMEOUT);
        if let Some(token) = self.auth_token.as_ref() {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(default_model: &str) -> ImageService {
        ImageService::new(&ImageConfig {
            default_model: default_model.to_owned(),
            auth_token: None,
        })
    }

    #[test]
    fn test_unknown_default_model_falls_back_to_flux() {
        assert_eq!(service("dall-e").current_model(), "flux");
        assert_eq!(service("turbo").current_model(), "turbo");
    }

    #[test]
    fn test_set_model() {
        let service = service("flux");
        assert!(service.set_model("stable-diffusion"));
        assert_eq!(service.current_model(), "stable-diffusion");
        assert!(!service.set_model("midjourney"));
        assert_eq!(service.current_model(), "stable-diffusion");
    }

    #[test]
    fn test_generate_url() {
        let service = service("flux");
        let url = service.generate_url(&ImageRequest::new("a cat/dog at 5 o'clock"));
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/a%20cat/dog%20at%205%20o%27clock\
             ?model=flux&width=1024&height=1024&nologo=true&enhance=false"
        );
    }

    #[test]
    fn test_generate_url_with_overrides() {
        let service = service("flux");
        let request = ImageRequest {
            model: Some("turbo".to_owned()),
            width: 512,
            height: 768,
            seed: Some(42),
            enhance: true,
            ..ImageRequest::new("sunset")
        };
        assert_eq!(
            service.generate_url(&request),
            "https://image.pollinations.ai/prompt/sunset\
             ?model=turbo&width=512&height=768&nologo=true&enhance=true&seed=42"
        );
    }

    #[test]
    fn test_unknown_request_model_uses_current() {
        let service = service("turbo");
        let request = ImageRequest {
            model: Some("unknown".to_owned()),
            ..ImageRequest::new("x")
        };
        assert!(service.generate_url(&request).contains("model=turbo&"));
    }

    #[test]
    fn test_validate() {
        assert!(ImageRequest::new("ok").validate().is_ok());
        assert!(matches!(
            ImageRequest::new("  ").validate(),
            Err(ImageError::MissingPrompt)
        ));
        let small = ImageRequest {
            width: 255,
            ..ImageRequest::new("x")
        };
        assert!(matches!(small.validate(), Err(ImageError::InvalidDimensions)));
        let large = ImageRequest {
            height: 2049,
            ..ImageRequest::new("x")
        };
        assert!(matches!(large.validate(), Err(ImageError::InvalidDimensions)));
        let edge = ImageRequest {
            width: 256,
            height: 2048,
            ..ImageRequest::new("x")
        };
        assert!(edge.validate().is_ok());
    }
}
