use serde::{Deserialize, Serialize};

/// One raw frame as delivered by a streaming transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    Text(String),
    /// Compressed payload (gzip unless configured otherwise)
    Binary(Vec<u8>),
}

impl From<&str> for RawFrame {
    fn from(text: &str) -> Self {
        RawFrame::Text(text.to_string())
    }
}

impl From<String> for RawFrame {
    fn from(text: String) -> Self {
        RawFrame::Text(text)
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        RawFrame::Binary(bytes)
    }
}

/// Structured message decoded from one inbound frame
///
/// `M` is the caller's market-data payload type, usually an enum with one
/// variant per channel message type.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage<M> {
    MarketData { topic: String, payload: M },
    Ping(Ping),
    SubscribeAck(Confirmation),
    UnsubscribeAck(Confirmation),
    Close(Close),
}

impl<M> InboundMessage<M> {
    /// Discriminator value this message was decoded from
    pub fn op(&self) -> &'static str {
        match self {
            InboundMessage::MarketData { .. } => "notify",
            InboundMessage::Ping(_) => "ping",
            InboundMessage::SubscribeAck(_) => "sub",
            InboundMessage::UnsubscribeAck(_) => "unsub",
            InboundMessage::Close(_) => "close",
        }
    }
}

/// Server heartbeat, answered with [`WsRequest::Pong`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Ping {
    #[serde(default)]
    pub ts: Option<i64>,
}

/// Acknowledgement of a `sub` or `unsub` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, rename = "err-code")]
    pub err_code: i64,
    #[serde(default, rename = "err-msg")]
    pub err_msg: Option<String>,
    #[serde(default)]
    pub ts: Option<i64>,
}

impl Confirmation {
    pub fn is_success(&self) -> bool {
        self.err_code == 0
    }
}

/// Server-initiated close notice
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Close {
    #[serde(default, alias = "err-msg")]
    pub reason: Option<String>,
    #[serde(default)]
    pub ts: Option<i64>,
}

/// Outbound control messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WsRequest {
    Sub {
        cid: String,
        topic: String,
    },
    Unsub {
        cid: String,
        topic: String,
    },
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        ts: Option<i64>,
    },
}

impl WsRequest {
    pub fn sub(cid: impl Into<String>, topic: impl Into<String>) -> Self {
        WsRequest::Sub {
            cid: cid.into(),
            topic: topic.into(),
        }
    }

    pub fn unsub(cid: impl Into<String>, topic: impl Into<String>) -> Self {
        WsRequest::Unsub {
            cid: cid.into(),
            topic: topic.into(),
        }
    }

    pub fn pong(ping: &Ping) -> Self {
        WsRequest::Pong { ts: ping.ts }
    }
}
