use invoker_commons::{Endpoint, PermitRequest, RestMethod};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::borrow::Cow;

use super::{ONE_REST_REQUEST, RestResponse};

/// Lending offers of the authenticated account
#[derive(Debug, Clone, Copy, Default)]
pub struct GetLendingOffers;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LendingOffer {
    pub coin: String,
    pub rate: Decimal,
    pub size: Decimal,
}

impl Endpoint for GetLendingOffers {
    type Response = RestResponse<Vec<LendingOffer>>;

    fn method(&self) -> RestMethod {
        RestMethod::Get
    }

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/spot_margin/offers")
    }

    fn required_permits(&self) -> Vec<PermitRequest> {
        ONE_REST_REQUEST.to_vec()
    }
}
