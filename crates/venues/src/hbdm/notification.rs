use invoker_commons::config::WebSocketConfig;
use invoker_commons::{ChannelRegistry, FrameDecoder, RegistryError, WsError, WsSession, WsSubscriber};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderNotification {
    pub topic: String,
    pub ts: i64,
    pub symbol: String,
    pub contract_code: String,
    pub order_id: u64,
    #[serde(default)]
    pub client_order_id: Option<u64>,
    pub direction: String,
    pub offset: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub trade_volume: Decimal,
    /// 3 submitted, 4 partially filled, 6 filled, 7 cancelled
    pub status: u8,
    #[serde(default)]
    pub trade_avg_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountSnapshot {
    pub symbol: String,
    pub margin_balance: Decimal,
    pub margin_available: Decimal,
    pub margin_frozen: Decimal,
    pub profit_unreal: Decimal,
    #[serde(default)]
    pub risk_rate: Option<Decimal>,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
    pub lever_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountNotification {
    pub topic: String,
    pub ts: i64,
    pub event: String,
    pub data: Vec<AccountSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub contract_code: String,
    pub volume: Decimal,
    pub available: Decimal,
    pub cost_open: Decimal,
    pub profit_unreal: Decimal,
    pub direction: String,
    pub lever_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionNotification {
    pub topic: String,
    pub ts: i64,
    pub event: String,
    pub data: Vec<PositionSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    Order(OrderNotification),
    Account(AccountNotification),
    Position(PositionNotification),
}

impl From<OrderNotification> for NotificationPayload {
    fn from(notification: OrderNotification) -> Self {
        NotificationPayload::Order(notification)
    }
}

impl From<AccountNotification> for NotificationPayload {
    fn from(notification: AccountNotification) -> Self {
        NotificationPayload::Account(notification)
    }
}

impl From<PositionNotification> for NotificationPayload {
    fn from(notification: PositionNotification) -> Self {
        NotificationPayload::Position(notification)
    }
}

/// Subscribable notification topic; `*` selects every contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationChannel {
    Orders(String),
    Accounts(String),
    Positions(String),
}

impl NotificationChannel {
    /// Parse `orders.btc`, `accounts.*`, `positions.eth`
    pub fn parse(topic: &str) -> Option<Self> {
        let (kind, symbol) = topic.split_once('.')?;
        if symbol.is_empty() {
            return None;
        }
        let symbol = symbol.to_lowercase();
        match kind {
            "orders" => Some(NotificationChannel::Orders(symbol)),
            "accounts" => Some(NotificationChannel::Accounts(symbol)),
            "positions" => Some(NotificationChannel::Positions(symbol)),
            _ => None,
        }
    }

    pub fn topic(&self) -> String {
        self.to_string()
    }

    /// Bind this topic to its payload type without subscribing
    pub fn register(
        &self,
        registry: &ChannelRegistry<NotificationPayload>,
    ) -> Result<(), RegistryError> {
        let topic = self.topic();
        match self {
            NotificationChannel::Orders(_) => registry.register::<OrderNotification>(topic),
            NotificationChannel::Accounts(_) => registry.register::<AccountNotification>(topic),
            NotificationChannel::Positions(_) => registry.register::<PositionNotification>(topic),
        }
    }

    /// Register and send the `sub` request, returning its client id
    pub async fn subscribe(
        &self,
        subscriber: &WsSubscriber<NotificationPayload>,
    ) -> Result<String, WsError> {
        let topic = self.topic();
        match self {
            NotificationChannel::Orders(_) => {
                subscriber.subscribe::<OrderNotification>(topic).await
            }
            NotificationChannel::Accounts(_) => {
                subscriber.subscribe::<AccountNotification>(topic).await
            }
            NotificationChannel::Positions(_) => {
                subscriber.subscribe::<PositionNotification>(topic).await
            }
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::Orders(symbol) => write!(f, "orders.{symbol}"),
            NotificationChannel::Accounts(symbol) => write!(f, "accounts.{symbol}"),
            NotificationChannel::Positions(symbol) => write!(f, "positions.{symbol}"),
        }
    }
}

/// Session for the notification endpoint with a fresh topic table
pub fn notification_session(
    url: &str,
    websocket: &WebSocketConfig,
) -> WsSession<NotificationPayload> {
    let decoder = FrameDecoder::new(Arc::new(ChannelRegistry::new()))
        .with_compression(websocket.compression)
        .with_max_frame_bytes(websocket.max_frame_bytes);
    WsSession::new(url, decoder)
        .with_max_consecutive_failures(websocket.max_consecutive_failures)
        .with_event_buffer(websocket.event_buffer)
}
