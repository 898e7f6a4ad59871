/// USD price lookup for the chain's native currency. Failures only degrade the
/// USD display; balances never wait on this.
use std::time::Duration;

use anyhow::Context;
use log::warn;
use serde_json::Value;

use crate::error::{DashboardError, Result};

const PRICE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PriceClient {
    client: reqwest::Client,
    url: String,
    coin_id: String,
}

impl PriceClient {
    /// `url` is a CoinGecko-compatible `simple/price` endpoint.
    pub fn new(url: &str, coin_id: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PRICE_TIMEOUT)
            .build()
            .context("Failed to build price HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            coin_id: coin_id.to_string(),
        })
    }

    pub fn coin_id(&self) -> &str {
        &self.coin_id
    }

    /// Current USD price of one native unit.
    pub async fn fetch_usd(&self) -> Result<f64> {
        let fetched = async {
            let response = self
                .client
                .get(&self.url)
                .query(&[("ids", self.coin_id.as_str()), ("vs_currencies", "usd")])
                .send()
                .await
                .context("Price request failed")?
                .error_for_status()
                .context("Price API returned an error status")?;
            let body: Value = response
                .json()
                .await
                .context("Price response is not JSON")?;
            let price = parse_usd_price(&body, &self.coin_id)?;
            Ok::<_, anyhow::Error>(price)
        };
        fetched.await.map_err(|e| {
            warn!("price lookup failed: {e:#}");
            DashboardError::PriceFetch("Failed to load price.".into())
        })
    }
}

/// Extract `body[coin_id].usd`.
pub fn parse_usd_price(body: &Value, coin_id: &str) -> anyhow::Result<f64> {
    let price = body
        .get(coin_id)
        .and_then(|c| c.get("usd"))
        .and_then(Value::as_f64)
        .with_context(|| format!("No USD price for '{coin_id}' in response"))?;
    if !price.is_finite() || price < 0.0 {
        anyhow::bail!("Invalid USD price {price}");
    }
    Ok(price)
}
