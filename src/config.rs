use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/sam";

#[derive(Debug, Clone, Parser)]
#[command(name = "sam-annotate")]
#[command(about = "Prompt a SAM segmentation service with points and boxes")]
pub struct Config {
    /// Image to open on startup
    pub image: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, default_value = "60", help = "Request timeout in seconds")]
    pub timeout_secs: u64,

    #[arg(long, help = "Only submit when the Submit button is pressed")]
    pub no_auto_submit: bool,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
            no_auto_submit: false,
            verbose: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.endpoint_url()?;
        if self.timeout_secs == 0 {
            return Err(ClientError::Config {
                message: "timeout must be at least one second".to_string(),
            });
        }
        if let Some(path) = &self.image {
            if !path.exists() {
                return Err(ClientError::Config {
                    message: format!("file not found: {}", path.display()),
                });
            }
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint).map_err(|e| ClientError::Config {
            message: format!("invalid endpoint '{}': {e}", self.endpoint),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ClientError::Config {
                message: format!("unsupported endpoint scheme '{other}'"),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn auto_submit(&self) -> bool {
        !self.no_auto_submit
    }
}
