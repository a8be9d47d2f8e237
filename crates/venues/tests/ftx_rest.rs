//! FTX endpoint integration tests
//!
//! Runs the sample endpoints through an actor built from the bundled venue
//! configuration, with a scripted transport standing in for the network.

use async_trait::async_trait;
use invoker_commons::{
    Actor, ActorError, QuotaRegistry, RestMethod, RestRequest, RestResponse, RestTransport,
    TokioClock, TransportError, load_default_config,
};
use invoker_venues::ftx::{GetLendingOffers, GetMarkets, GetOrderbook, REST_REQUEST};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Answers each request with the next canned body
struct CannedTransport {
    responses: Mutex<VecDeque<RestResponse>>,
    sent: Mutex<Vec<RestRequest>>,
}

impl CannedTransport {
    fn new(responses: impl IntoIterator<Item = RestResponse>) -> Arc<Self> {
        Arc::new(CannedTransport {
            responses: Mutex::new(responses.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<RestRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl RestTransport for CannedTransport {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
        self.sent.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Connection("no canned response left".into()))
    }
}

fn ftx_quota() -> Arc<QuotaRegistry> {
    let config = load_default_config().unwrap();
    let venue = config.venue("ftx").unwrap();
    Arc::new(venue.quota_registry(Arc::new(TokioClock::new())))
}

fn ftx_actor(quota: Arc<QuotaRegistry>, transport: Arc<CannedTransport>) -> Actor {
    let config = load_default_config().unwrap();
    let policy = config.venue("ftx").unwrap().actor_policy();
    Actor::new("ftx-test", quota, transport, policy)
}

const OFFERS: &str = r#"{
    "success": true,
    "result": [
        {"coin": "USD", "rate": 1e-6, "size": 1000.0},
        {"coin": "ETH", "rate": 2.5e-6, "size": 3.5}
    ]
}"#;

// ============================================================================
// Endpoint Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_lending_offers_through_actor() {
    let quota = ftx_quota();
    let transport = CannedTransport::new([RestResponse::new(200, OFFERS)]);
    let actor = ftx_actor(quota.clone(), transport.clone());

    let response = actor.submit(&GetLendingOffers).await.unwrap();

    assert!(response.success);
    assert_eq!(response.result.len(), 2);
    assert_eq!(response.result[1].coin, "ETH");
    assert_eq!(response.result[1].size, dec!(3.5));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, RestMethod::Get);
    assert_eq!(sent[0].path, "/api/spot_margin/offers");
    assert!(sent[0].params.is_empty());

    let usage = quota.usage(REST_REQUEST).unwrap();
    assert_eq!(usage.consumed, 1);
    assert_eq!(usage.capacity, 30);
}

#[tokio::test(start_paused = true)]
async fn test_orderbook_sends_market_and_depth() {
    let transport = CannedTransport::new([RestResponse::new(
        200,
        r#"{"success":true,"result":{"bids":[[9000.5,1.25]],"asks":[[9001,0.5],[9002,2]]}}"#,
    )]);
    let actor = ftx_actor(ftx_quota(), transport.clone());

    let response = actor
        .submit(&GetOrderbook::new("BTC-PERP").with_depth(2))
        .await
        .unwrap();

    assert_eq!(response.result.bids, vec![(dec!(9000.5), dec!(1.25))]);
    assert_eq!(response.result.asks.len(), 2);

    let sent = transport.sent();
    assert_eq!(sent[0].path, "/api/markets/BTC-PERP/orderbook");
    assert_eq!(sent[0].params.query_string(), "depth=2");
}

#[tokio::test(start_paused = true)]
async fn test_endpoints_share_one_budget() {
    let quota = ftx_quota();
    let markets = r#"{"success":true,"result":[{
        "name":"ETH/USD","type":"spot","enabled":true,
        "priceIncrement":0.1,"sizeIncrement":0.001,"bid":null,"ask":null,"last":1800.2
    }]}"#;
    let transport = CannedTransport::new([
        RestResponse::new(200, markets),
        RestResponse::new(200, OFFERS),
    ]);
    let actor = ftx_actor(quota.clone(), transport);

    let markets = actor.submit(&GetMarkets).await.unwrap();
    assert_eq!(markets.result[0].market_type, "spot");
    assert_eq!(markets.result[0].last, Some(dec!(1800.2)));
    actor.submit(&GetLendingOffers).await.unwrap();

    assert_eq!(quota.usage(REST_REQUEST).unwrap().consumed, 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(quota.usage(REST_REQUEST).unwrap().consumed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unsuccessful_status_is_api_error() {
    let transport = CannedTransport::new([RestResponse::new(
        404,
        r#"{"success":false,"error":"No such market: NOPE"}"#,
    )]);
    let actor = ftx_actor(ftx_quota(), transport.clone());

    let err = actor.submit(&GetOrderbook::new("NOPE")).await.unwrap_err();

    match err {
        ActorError::Api { code, body } => {
            assert_eq!(code, 404);
            assert!(body.contains("No such market"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
    assert_eq!(transport.sent().len(), 1);
}
