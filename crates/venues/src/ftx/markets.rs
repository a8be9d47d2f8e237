use invoker_commons::{Endpoint, PermitRequest, RestMethod, RestParams};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::borrow::Cow;

use super::{ONE_REST_REQUEST, RestResponse};

/// All listed markets
#[derive(Debug, Clone, Copy, Default)]
pub struct GetMarkets;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub name: String,
    #[serde(rename = "type")]
    pub market_type: String,
    pub enabled: bool,
    pub price_increment: Decimal,
    pub size_increment: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last: Option<Decimal>,
}

impl Endpoint for GetMarkets {
    type Response = RestResponse<Vec<Market>>;

    fn method(&self) -> RestMethod {
        RestMethod::Get
    }

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/markets")
    }

    fn required_permits(&self) -> Vec<PermitRequest> {
        ONE_REST_REQUEST.to_vec()
    }
}

/// Order book snapshot for one market
#[derive(Debug, Clone)]
pub struct GetOrderbook {
    pub market: String,
    /// Levels per side; the venue defaults to 20 and caps at 100
    pub depth: Option<u32>,
}

impl GetOrderbook {
    pub fn new(market: impl Into<String>) -> Self {
        GetOrderbook {
            market: market.into(),
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// `[price, size]` levels, best first
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Orderbook {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

impl Endpoint for GetOrderbook {
    type Response = RestResponse<Orderbook>;

    fn method(&self) -> RestMethod {
        RestMethod::Get
    }

    fn path(&self) -> Cow<'static, str> {
        Cow::Owned(format!("/api/markets/{}/orderbook", self.market))
    }

    fn params(&self) -> RestParams {
        match self.depth {
            Some(depth) => RestParams::builder().add("depth", depth).build(),
            None => RestParams::empty(),
        }
    }

    fn required_permits(&self) -> Vec<PermitRequest> {
        ONE_REST_REQUEST.to_vec()
    }
}
