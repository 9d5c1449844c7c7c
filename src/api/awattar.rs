//! [aWATTar](https://www.awattar.de/services/api) day-ahead market data client.

use std::time::Duration;

use async_trait::async_trait;
use bon::bon;
use chrono::{DateTime, Local};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_with::{TimestampMilliSeconds, serde_as};

use crate::{
    api::{
        price_source::{FetchError, PriceSource},
        secret::Secret,
    },
    core::series::{PricePoint, PriceSeries},
    prelude::*,
    quantity::rate::MegawattHourRate,
};

pub const DEFAULT_URL: &str = "https://api.awattar.com/v1/marketdata";

pub struct Api {
    client: Client,
    url: Url,
    api_key: Secret,
}

#[bon]
impl Api {
    #[builder]
    pub fn new(
        url: Url,
        api_key: Secret,
        #[builder(default = Duration::from_secs(5))] connect_timeout: Duration,
        #[builder(default = Duration::from_secs(10))] request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("lynx/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .context("failed to build the HTTP client")?;
        Ok(Self { client, url, api_key })
    }
}

impl Api {
    /// Fetch the prices within the specified period instead of the default upcoming window.
    #[instrument(skip_all, fields(start = %start, end = %end))]
    pub async fn fetch_range(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> Result<PriceSeries, FetchError> {
        self.get(&[("start", start.timestamp_millis()), ("end", end.timestamp_millis())]).await
    }

    async fn get(&self, query: &[(&str, i64)]) -> Result<PriceSeries, FetchError> {
        info!("fetching…");
        let response = self
            .client
            .get(self.url.clone())
            .basic_auth(self.api_key.expose(), Some(""))
            .query(query)
            .send()
            .await
            .map_err(FetchError::network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus { status });
        }
        let body = response.bytes().await.map_err(FetchError::network)?;
        let series = parse(&body)?;
        info!(len = series.len(), "fetched");
        Ok(series)
    }
}

#[async_trait]
impl PriceSource for Api {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<PriceSeries, FetchError> {
        self.get(&[]).await
    }
}

/// Parse the market data response body.
///
/// A response without prices is [`FetchError::NoData`], it must not replace any known prices.
pub fn parse(body: &[u8]) -> Result<PriceSeries, FetchError> {
    let response: Response = serde_json::from_slice(body).map_err(FetchError::parse)?;
    debug!(n_records = response.data.len(), "parsed");
    if response.data.is_empty() {
        return Err(FetchError::NoData);
    }
    Ok(response
        .data
        .into_iter()
        .map(|record| PricePoint::new(record.start_time, MegawattHourRate(record.market_price)))
        .collect())
}

#[derive(Deserialize)]
struct Response {
    data: Vec<Record>,
}

#[serde_as]
#[derive(Deserialize)]
struct Record {
    /// Euro per megawatt-hour.
    #[serde(rename = "marketprice")]
    market_price: f64,

    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    #[serde(rename = "start_timestamp")]
    start_time: DateTime<Local>,
}
