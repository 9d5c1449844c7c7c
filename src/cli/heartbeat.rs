use std::time::Duration;

use clap::Parser;
use reqwest::{Client, Url};

use crate::prelude::*;

#[derive(Parser)]
pub struct HeartbeatArgs {
    /// Pinged after every control cycle, `<url>/fail` is pinged when the cycle is unhealthy.
    #[clap(id = "heartbeat_url", long = "heartbeat-url", env = "HEARTBEAT_URL")]
    pub url: Option<Url>,
}

impl HeartbeatArgs {
    pub async fn send(&self, is_healthy: bool) {
        if let Some(url) = &self.url
            && let Err(error) = Self::send_fallible(url, is_healthy).await
        {
            warn!("failed to send the heartbeat: {error:#}");
        }
    }

    #[instrument(skip_all, fields(is_healthy = is_healthy))]
    async fn send_fallible(url: &Url, is_healthy: bool) -> Result {
        let url = if is_healthy { url.clone() } else { failure_url(url)? };
        debug!("sending a heartbeat…");
        Client::builder()
            .timeout(Duration::from_secs(3))
            .build()?
            .post(url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn failure_url(url: &Url) -> Result<Url> {
    let mut url = url.clone();
    url.path_segments_mut()
        .map_err(|()| Error::msg("the heartbeat URL cannot have a path"))?
        .pop_if_empty()
        .push("fail");
    Ok(url)
}
