//! FTX REST endpoints
//!
//! Every public endpoint costs one `rest_request` permit; the venue allows
//! about 30 requests per second per IP.

pub mod markets;
pub mod spot_margin;

use invoker_commons::PermitRequest;
use serde::Deserialize;

pub use markets::{GetMarkets, GetOrderbook, Market, Orderbook};
pub use spot_margin::{GetLendingOffers, LendingOffer};

pub const REST_REQUEST: &str = "rest_request";

pub static ONE_REST_REQUEST: [PermitRequest; 1] = [PermitRequest::fixed(REST_REQUEST, 1)];

/// Envelope around every FTX response body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestResponse<T> {
    pub success: bool,
    pub result: T,
}
