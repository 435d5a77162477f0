use chrono::Days;
use serde::{Deserialize, Serialize};

use crate::models::request_params::{BarsRequestParams, ProviderParams};
use crate::providers::{ProviderError, ValidationSnafu};

/// Largest page Alpaca serves.
pub const MAX_PAGE_LIMIT: u32 = 10_000;

/// Specifies the corporate action adjustment for stock data.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    #[default]
    Raw,
    Split,
    Dividend,
    All,
}

impl Adjustment {
    fn as_str(self) -> &'static str {
        match self {
            Adjustment::Raw => "raw",
            Adjustment::Split => "split",
            Adjustment::Dividend => "dividend",
            Adjustment::All => "all",
        }
    }
}

/// Specifies the source feed for stock data.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Sip,
    #[default]
    Iex,
    Otc,
}

impl Feed {
    pub fn as_str(self) -> &'static str {
        match self {
            Feed::Sip => "sip",
            Feed::Iex => "iex",
            Feed::Otc => "otc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sip" => Some(Feed::Sip),
            "iex" => Some(Feed::Iex),
            "otc" => Some(Feed::Otc),
            _ => None,
        }
    }
}

/// Specifies the sort order for the bars.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

/// Alpaca-specific parameters for a bars request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AlpacaBarsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

/// Reject requests Alpaca would refuse or silently answer wrongly.
pub fn validate(params: &BarsRequestParams) -> Result<(), ProviderError> {
    if params.symbols.is_empty() {
        return ValidationSnafu {
            message: "no symbols requested",
        }
        .fail();
    }
    if let Some(bad) = params.symbols.iter().find(|s| s.trim().is_empty() || s.contains(',')) {
        return ValidationSnafu {
            message: format!("invalid symbol `{bad}`"),
        }
        .fail();
    }
    if params.start >= params.end {
        return ValidationSnafu {
            message: format!("empty date range [{}, {})", params.start, params.end),
        }
        .fail();
    }
    if let ProviderParams::Alpaca(AlpacaBarsParams {
        limit: Some(limit), ..
    }) = &params.provider_specific
    {
        if *limit == 0 || *limit > MAX_PAGE_LIMIT {
            return ValidationSnafu {
                message: format!("limit must be within 1..={MAX_PAGE_LIMIT}, got {limit}"),
            }
            .fail();
        }
    }
    Ok(())
}

/// Build the query string for one page (without `page_token`).
///
/// Alpaca's `end` is inclusive, so the exclusive end of the request is moved
/// back one day.
pub fn construct_params(params: &BarsRequestParams, default_feed: Feed) -> Vec<(String, String)> {
    let end_inclusive = params.end.checked_sub_days(Days::new(1)).unwrap_or(params.start);

    let mut query = vec![
        ("symbols".to_string(), params.symbols.join(",")),
        ("timeframe".to_string(), "1Day".to_string()),
        ("start".to_string(), params.start.format("%Y-%m-%d").to_string()),
        ("end".to_string(), end_inclusive.format("%Y-%m-%d").to_string()),
    ];

    let alpaca = match &params.provider_specific {
        ProviderParams::Alpaca(p) => p.clone(),
        ProviderParams::None => AlpacaBarsParams::default(),
    };

    query.push((
        "adjustment".to_string(),
        alpaca.adjustment.unwrap_or_default().as_str().to_string(),
    ));
    query.push((
        "feed".to_string(),
        alpaca.feed.unwrap_or(default_feed).as_str().to_string(),
    ));
    query.push((
        "limit".to_string(),
        alpaca.limit.unwrap_or(MAX_PAGE_LIMIT).to_string(),
    ));
    if let Some(sort) = alpaca.sort {
        let s = match sort {
            Sort::Asc => "asc",
            Sort::Desc => "desc",
        };
        query.push(("sort".to_string(), s.to_string()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn lookup<'a>(q: &'a [(String, String)], key: &str) -> Option<&'a str> {
        q.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn single_day_request_has_inclusive_end() {
        let params = BarsRequestParams::single_day(&["AAPL".into(), "MSFT".into()], day(3));
        let q = construct_params(&params, Feed::Iex);
        assert_eq!(lookup(&q, "symbols"), Some("AAPL,MSFT"));
        assert_eq!(lookup(&q, "timeframe"), Some("1Day"));
        assert_eq!(lookup(&q, "start"), Some("2023-01-03"));
        assert_eq!(lookup(&q, "end"), Some("2023-01-03"));
        assert_eq!(lookup(&q, "feed"), Some("iex"));
        assert_eq!(lookup(&q, "limit"), Some("10000"));
        assert_eq!(lookup(&q, "sort"), None);
    }

    #[test]
    fn per_request_options_override_defaults() {
        let mut params = BarsRequestParams::single_day(&["AAPL".into()], day(3));
        params.provider_specific = ProviderParams::Alpaca(AlpacaBarsParams {
            adjustment: Some(Adjustment::All),
            feed: Some(Feed::Sip),
            limit: Some(5),
            sort: Some(Sort::Desc),
        });
        let q = construct_params(&params, Feed::Iex);
        assert_eq!(lookup(&q, "adjustment"), Some("all"));
        assert_eq!(lookup(&q, "feed"), Some("sip"));
        assert_eq!(lookup(&q, "limit"), Some("5"));
        assert_eq!(lookup(&q, "sort"), Some("desc"));
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let ok = BarsRequestParams::single_day(&["AAPL".into()], day(3));
        assert!(validate(&ok).is_ok());

        let mut empty = ok.clone();
        empty.symbols.clear();
        assert!(validate(&empty).is_err());

        let mut backwards = ok.clone();
        backwards.end = backwards.start;
        assert!(validate(&backwards).is_err());

        let mut comma = ok.clone();
        comma.symbols = vec!["AAPL,MSFT".into()];
        assert!(validate(&comma).is_err());
    }
}
