use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::io::Cursor;
use url::Url;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::mask::Mask;
use crate::prompt::PromptPayload;

#[derive(Debug, Deserialize)]
struct Envelope {
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    masks: Vec<String>,
    #[serde(default)]
    scores: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the `/sam` segmentation endpoint.
#[derive(Debug, Clone)]
pub struct SegmentationClient {
    client: Client,
    endpoint: Url,
}

impl SegmentationClient {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config.endpoint_url()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Sends the image and prompts, returning the first mask of the response.
    pub async fn segment(&self, image_png: Vec<u8>, prompt: &PromptPayload) -> Result<Mask> {
        let image = Part::bytes(image_png)
            .file_name("image.png")
            .mime_str("image/png")?;
        let mut form = Form::new().part("image", image);
        for (name, value) in prompt.form_fields()? {
            form = form.text(name, value);
        }

        log::debug!(
            "POST {} with {} prompt(s)",
            self.endpoint,
            prompt.prompt_count()
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        log::debug!("segmentation response status: {}", status);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(err) => ClientError::Service {
                    status: status.as_u16(),
                    error: err.error,
                    message: err.message,
                },
                Err(_) => ClientError::Service {
                    status: status.as_u16(),
                    error: body.trim().to_string(),
                    message: None,
                },
            });
        }

        let envelope: Envelope = serde_json::from_str(&body)?;
        let content = envelope.content;
        let Some(encoded) = content.masks.first() else {
            return Err(ClientError::NoMask);
        };
        let mask = Mask::from_base64(encoded, content.scores.first().copied())?;
        log::info!(
            "received {}x{} mask (score {:?})",
            mask.width(),
            mask.height(),
            mask.score
        );
        Ok(mask)
    }
}

/// Encodes the source image as PNG for upload.
pub fn encode_png(image: &image::DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let config = Config {
            endpoint: "://nope".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            SegmentationClient::new(&config),
            Err(ClientError::Config { .. })
        ));
    }

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let env: Envelope = serde_json::from_str(r#"{"content": {}}"#).unwrap();
        assert!(env.content.masks.is_empty());
        assert!(env.content.scores.is_empty());
    }

    #[test]
    fn test_encode_png_round_trips_dimensions() {
        let img = image::DynamicImage::new_rgb8(7, 3);
        let png = encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 3));
    }
}
