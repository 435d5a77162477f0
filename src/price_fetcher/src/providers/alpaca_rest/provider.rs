use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indexmap::IndexMap;
use nonzero_ext::nonzero;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::{get_env_var, get_env_var_opt};
use snafu::{OptionExt, ResultExt};

use crate::models::bar::{Bar, BarSeries};
use crate::models::request_params::BarsRequestParams;
use crate::providers::alpaca_rest::params::{Feed, construct_params, validate};
use crate::providers::alpaca_rest::response::AlpacaResponse;
use crate::providers::{
    ApiSnafu, ClientBuildSnafu, DataProvider, InvalidApiKeySnafu, MissingEnvVarSnafu,
    ProviderError, ProviderInitError, ReqwestSnafu, UnknownFeedSnafu,
};

const BASE_URL: &str = "https://data.alpaca.markets/v2/stocks/bars";

pub struct AlpacaProvider {
    client: Client,
    base_url: String,
    feed: Feed,
    // Free plan allowance.
    limiter: DefaultDirectRateLimiter,
    _api_key: SecretString,
    _secret_key: SecretString,
}

impl AlpacaProvider {
    /// Creates a new Alpaca provider.
    ///
    /// Reads API keys from the `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`
    /// environment variables, and the data feed from `APCA_FEED` (default `iex`).
    pub fn new() -> Result<Self, ProviderInitError> {
        let api_key = SecretString::new(get_env_var("APCA_API_KEY_ID").context(MissingEnvVarSnafu)?.into());
        let secret_key =
            SecretString::new(get_env_var("APCA_API_SECRET_KEY").context(MissingEnvVarSnafu)?.into());
        let feed = match get_env_var_opt("APCA_FEED") {
            Some(name) => Feed::parse(&name).context(UnknownFeedSnafu { feed: name.clone() })?,
            None => Feed::default(),
        };
        Self::with_credentials(api_key, secret_key, feed, BASE_URL)
    }

    /// Build a provider from explicit credentials against `base_url`.
    pub fn with_credentials(
        api_key: SecretString,
        secret_key: SecretString,
        feed: Feed,
        base_url: &str,
    ) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(api_key.expose_secret()).context(InvalidApiKeySnafu)?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            header::HeaderValue::from_str(secret_key.expose_secret()).context(InvalidApiKeySnafu)?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            feed,
            limiter: RateLimiter::direct(Quota::per_minute(nonzero!(200u32))),
            _api_key: api_key,
            _secret_key: secret_key,
        })
    }
}

#[async_trait]
impl DataProvider for AlpacaProvider {
    async fn fetch_bars(&self, params: &BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        validate(params)?;

        // Every requested symbol gets a series, in request order, even when empty.
        let mut all_bars: IndexMap<String, Vec<Bar>> = params
            .symbols
            .iter()
            .map(|s| (s.clone(), Vec::new()))
            .collect();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut query_params = construct_params(params, self.feed);
            if let Some(token) = &next_page_token {
                query_params.push(("page_token".to_string(), token.clone()));
            }

            self.limiter.until_ready().await;
            let response = self
                .client
                .get(&self.base_url)
                .query(&query_params)
                .send()
                .await
                .context(ReqwestSnafu)?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown API error".to_string());
                return ApiSnafu {
                    status: status.as_u16(),
                    message,
                }
                .fail();
            }

            let page = response.json::<AlpacaResponse>().await.context(ReqwestSnafu)?;

            for (symbol, bars) in page.bars.unwrap_or_default() {
                all_bars
                    .entry(symbol)
                    .or_default()
                    .extend(bars.into_iter().map(|b| b.into_bar()));
            }

            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            symbols = all_bars.len(),
            bars = all_bars.values().map(Vec::len).sum::<usize>(),
            "alpaca bars fetched"
        );

        Ok(all_bars
            .into_iter()
            .map(|(symbol, bars)| BarSeries { symbol, bars })
            .collect())
    }
}
