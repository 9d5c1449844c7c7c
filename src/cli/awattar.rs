use clap::Parser;
use reqwest::Url;

use crate::{
    api::{
        awattar::{self, DEFAULT_URL},
        secret::Secret,
    },
    core::backoff::Backoff,
    prelude::*,
};

#[derive(Parser)]
pub struct AwattarArgs {
    /// Market data endpoint.
    #[clap(id = "awattar_url", long = "awattar-url", env = "AWATTAR_URL", default_value = DEFAULT_URL)]
    pub url: Url,

    /// Pre-shared API key, sent as the basic authorization user name.
    #[clap(long = "awattar-api-key", env = "AWATTAR_API_KEY", hide_env_values = true)]
    pub api_key: Secret,

    #[clap(long, env = "AWATTAR_CONNECT_TIMEOUT", default_value = "5s")]
    pub connect_timeout: humantime::Duration,

    #[clap(long, env = "AWATTAR_REQUEST_TIMEOUT", default_value = "10s")]
    pub request_timeout: humantime::Duration,

    #[clap(flatten)]
    pub retry: RetryArgs,
}

impl AwattarArgs {
    pub fn connect(&self) -> Result<awattar::Api> {
        ensure!(
            !self.api_key.expose().is_empty(),
            "the aWATTar API key must not be empty",
        );
        awattar::Api::builder()
            .url(self.url.clone())
            .api_key(self.api_key.clone())
            .connect_timeout(self.connect_timeout.into())
            .request_timeout(self.request_timeout.into())
            .build()
    }
}

#[derive(Parser)]
pub struct RetryArgs {
    /// Fetch attempts per refresh before falling back to the cached prices.
    #[clap(long, env = "MAX_FETCH_ATTEMPTS", default_value = "3")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled for every next one.
    #[clap(long, env = "INITIAL_BACKOFF", default_value = "1s")]
    pub initial_backoff: humantime::Duration,

    #[clap(long, env = "MAX_BACKOFF", default_value = "30s")]
    pub max_backoff: humantime::Duration,
}

impl RetryArgs {
    pub fn backoff(&self) -> Result<Backoff> {
        ensure!(self.max_attempts >= 1, "at least one fetch attempt is required");
        Ok(Backoff::builder()
            .max_attempts(self.max_attempts)
            .initial_delay(self.initial_backoff.into())
            .max_delay(self.max_backoff.into())
            .build())
    }
}
