//! Configuration module
//!
//! Object-store settings, read from the environment (and a `.env` file when
//! present). Only consulted when a remote location is first touched.

use std::env;

use crate::constants::DEFAULT_REGION;

/// Settings for the S3-compatible object-store client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Config {
    pub region: String,
    pub endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        S3Config::new(DEFAULT_REGION)
    }
}

impl S3Config {
    pub fn new(region: impl Into<String>) -> Self {
        S3Config {
            region: region.into(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            force_path_style: false,
        }
    }

    /// Point the client at an S3-compatible endpoint. Path-style addressing is
    /// switched on, which MinIO and most other providers require.
    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self.force_path_style = true;
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let region = lookup("S3_REGION")
            .or_else(|| lookup("AWS_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint_url = lookup("S3_ENDPOINT").filter(|e| !e.is_empty());

        let force_path_style = match lookup("S3_FORCE_PATH_STYLE") {
            Some(value) => value.to_lowercase().parse::<bool>().map_err(|_| {
                anyhow::anyhow!("S3_FORCE_PATH_STYLE must be true or false, got {}", value)
            })?,
            None => endpoint_url.is_some(),
        };

        let config = S3Config {
            region,
            endpoint_url,
            access_key_id: lookup("AWS_ACCESS_KEY_ID"),
            secret_access_key: lookup("AWS_SECRET_ACCESS_KEY"),
            session_token: lookup("AWS_SESSION_TOKEN"),
            force_path_style,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.region.trim().is_empty() {
            return Err(anyhow::anyhow!("S3_REGION or AWS_REGION must not be empty"));
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(anyhow::anyhow!(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
            ));
        }

        if let Some(ref endpoint) = self.endpoint_url {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "S3_ENDPOINT must be an http:// or https:// URL, got {}",
                    endpoint
                ));
            }
        }

        Ok(())
    }

    /// Whether static credentials were supplied instead of the default AWS chain.
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}
