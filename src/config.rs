use anyhow::{anyhow, Context, Result};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.testing-farm.io/v0.1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_token: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn resolve(
        api_url: Option<&str>,
        api_token: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let api_token = api_token
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("TESTING_FARM_API_TOKEN must be provided"))?
            .to_owned();

        let api_url = api_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .to_owned();
        Url::parse(&api_url)
            .with_context(|| format!("invalid testing farm api url `{api_url}`"))?;

        Ok(Self {
            api_url,
            api_token,
            timeout_secs: timeout_secs.max(1),
        })
    }
}
