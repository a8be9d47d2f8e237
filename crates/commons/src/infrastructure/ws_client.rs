use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::application::{
    ChannelRegistry, DEFAULT_MAX_CONSECUTIVE_FAILURES, Dispatch, Dispatcher, FrameDecoder,
    RegistryError,
};
use crate::domain::{Confirmation, InboundMessage, RawFrame, WsRequest};

#[derive(Error, Debug)]
pub enum WsError {
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("Channel closed")]
    ChannelClosed,
}

/// What the session reports to its consumer
#[derive(Debug)]
pub enum WsEvent<M> {
    Message(InboundMessage<M>),
    /// The session gave up on a corrupt stream and is closing
    Desync {
        consecutive_failures: u32,
        error: String,
    },
    Error(String),
    Disconnected,
}

enum Outbound {
    Request(WsRequest),
    Close,
}

/// Subscription bookkeeping shared by subscriber handles and the reader
///
/// Every `subscribe` bumps its topic's generation. An `unsub` ack only
/// drops the binding if no subscribe for that topic happened after the
/// matching `unsub` was sent.
#[derive(Default)]
struct SubscriptionLedger {
    generations: HashMap<String, u64>,
    /// cid → (topic, generation when the unsub was sent)
    pending_unsubs: HashMap<String, (String, u64)>,
}

impl SubscriptionLedger {
    fn subscribed(&mut self, topic: &str) {
        *self.generations.entry(topic.to_string()).or_default() += 1;
    }

    fn unsubscribing(&mut self, cid: String, topic: String) {
        let generation = self.generations.get(&topic).copied().unwrap_or_default();
        self.pending_unsubs.insert(cid, (topic, generation));
    }

    /// Topic whose binding the ack releases, if it is still the latest intent
    fn confirm_unsub(&mut self, ack: &Confirmation) -> Option<String> {
        let cid = match &ack.cid {
            Some(cid) if self.pending_unsubs.contains_key(cid) => cid.clone(),
            // Ack without a known cid: settle the oldest pending unsub of the topic
            _ => {
                let topic = ack.topic.as_deref()?;
                self.pending_unsubs
                    .iter()
                    .filter(|(_, (pending, _))| pending == topic)
                    .min_by_key(|(_, (_, generation))| *generation)
                    .map(|(cid, _)| cid.clone())?
            }
        };

        let (topic, generation) = self.pending_unsubs.remove(&cid)?;
        let current = self.generations.get(&topic).copied().unwrap_or_default();
        (current == generation).then_some(topic)
    }
}

/// WebSocket push session
///
/// One reader task per connection feeds frames through its own
/// [`Dispatcher`] in arrival order and forwards decoded messages. Heartbeat
/// pings are answered automatically and successful unsubscribe acks drop
/// the topic's binding.
pub struct WsSession<M> {
    url: String,
    decoder: FrameDecoder<M>,
    max_consecutive_failures: u32,
    event_buffer: usize,
}

impl<M: Send + 'static> WsSession<M> {
    pub fn new(url: impl Into<String>, decoder: FrameDecoder<M>) -> Self {
        WsSession {
            url: url.into(),
            decoder,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            event_buffer: 1024,
        }
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and return a subscription handle plus the event stream
    pub async fn connect(&self) -> Result<(WsSubscriber<M>, mpsc::Receiver<WsEvent<M>>), WsError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        info!(url = %self.url, "WebSocket connected");

        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(32);
        let (event_tx, event_rx) = mpsc::channel::<WsEvent<M>>(self.event_buffer);

        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                let message = match outbound {
                    Outbound::Request(request) => match serde_json::to_string(&request) {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize request");
                            continue;
                        }
                    },
                    Outbound::Close => Message::Close(None),
                };

                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    let _ = writer_events.send(WsEvent::Error(e.to_string())).await;
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let mut dispatcher = Dispatcher::new(self.decoder.clone())
            .with_max_consecutive_failures(self.max_consecutive_failures);
        let registry = Arc::clone(self.decoder.registry());
        let ledger = Arc::new(Mutex::new(SubscriptionLedger::default()));
        let reader_ledger = Arc::clone(&ledger);
        let replies = out_tx.clone();

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let frame = match msg {
                    Ok(Message::Text(text)) => RawFrame::Text(text.as_str().to_owned()),
                    Ok(Message::Binary(bytes)) => RawFrame::Binary(bytes.to_vec()),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Server closed connection");
                        break;
                    }
                    Ok(Message::Ping(_)) => {
                        trace!("Received transport ping");
                        continue;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = event_tx.send(WsEvent::Error(e.to_string())).await;
                        break;
                    }
                };

                let message = match dispatcher.dispatch(&frame) {
                    Dispatch::Message(message) => message,
                    Dispatch::Dropped(_) => continue,
                    Dispatch::Desync {
                        consecutive_failures,
                        last_error,
                    } => {
                        let _ = event_tx
                            .send(WsEvent::Desync {
                                consecutive_failures,
                                error: last_error.to_string(),
                            })
                            .await;
                        let _ = replies.send(Outbound::Close).await;
                        break;
                    }
                };

                let mut pong = None;
                let mut closing = false;
                match &message {
                    InboundMessage::Ping(ping) => pong = Some(WsRequest::pong(ping)),
                    InboundMessage::SubscribeAck(ack) if !ack.is_success() => {
                        warn!(
                            topic = ?ack.topic,
                            err_code = ack.err_code,
                            err_msg = ?ack.err_msg,
                            "Subscription rejected"
                        );
                    }
                    InboundMessage::UnsubscribeAck(ack) if ack.is_success() => {
                        let mut ledger = reader_ledger.lock();
                        match ledger.confirm_unsub(ack) {
                            Some(topic) => {
                                registry.unregister(&topic);
                            }
                            None => debug!(
                                topic = ?ack.topic,
                                cid = ?ack.cid,
                                "Unsubscribe ack superseded, keeping binding"
                            ),
                        }
                    }
                    InboundMessage::Close(close) => {
                        info!(reason = ?close.reason, "Server requested close");
                        closing = true;
                    }
                    _ => {}
                }

                if let Some(pong) = pong {
                    if replies.send(Outbound::Request(pong)).await.is_err() {
                        break;
                    }
                }
                if event_tx.send(WsEvent::Message(message)).await.is_err() {
                    break;
                }
                if closing {
                    let _ = replies.send(Outbound::Close).await;
                    break;
                }
            }

            let stats = dispatcher.stats();
            info!(
                frames = stats.frames,
                messages = stats.messages,
                decode_failures = stats.decode_failures,
                unregistered = stats.unregistered,
                unsupported = stats.unsupported,
                "WebSocket session ended"
            );
            let _ = event_tx.send(WsEvent::Disconnected).await;
        });

        Ok((
            WsSubscriber {
                tx: out_tx,
                registry: Arc::clone(self.decoder.registry()),
                ledger,
                next_cid: Arc::new(AtomicU64::new(1)),
            },
            event_rx,
        ))
    }
}

/// Handle for managing a session's subscriptions
pub struct WsSubscriber<M> {
    tx: mpsc::Sender<Outbound>,
    registry: Arc<ChannelRegistry<M>>,
    ledger: Arc<Mutex<SubscriptionLedger>>,
    next_cid: Arc<AtomicU64>,
}

impl<M> Clone for WsSubscriber<M> {
    fn clone(&self) -> Self {
        WsSubscriber {
            tx: self.tx.clone(),
            registry: Arc::clone(&self.registry),
            ledger: Arc::clone(&self.ledger),
            next_cid: Arc::clone(&self.next_cid),
        }
    }
}

impl<M> WsSubscriber<M> {
    fn next_cid(&self) -> String {
        self.next_cid.fetch_add(1, Ordering::SeqCst).to_string()
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry<M>> {
        &self.registry
    }

    /// Bind `topic` to `T`, then ask the server for it
    ///
    /// The binding is in place before the request leaves, so pushes that
    /// race the ack are still decoded. Returns the request's client id.
    pub async fn subscribe<T>(&self, topic: impl Into<String>) -> Result<String, WsError>
    where
        T: DeserializeOwned + Into<M> + 'static,
    {
        let topic = topic.into();
        {
            // Same lock as the reader's unsub handling, so a stale ack
            // cannot remove the binding between these two steps
            let mut ledger = self.ledger.lock();
            self.registry.register::<T>(topic.clone())?;
            ledger.subscribed(&topic);
        }

        let cid = self.next_cid();
        self.send(Outbound::Request(WsRequest::sub(cid.clone(), topic)))
            .await?;
        Ok(cid)
    }

    /// Ask the server to stop `topic`
    ///
    /// The binding goes when the ack arrives, unless `topic` was subscribed
    /// again in the meantime.
    pub async fn unsubscribe(&self, topic: impl Into<String>) -> Result<String, WsError> {
        let topic = topic.into();
        let cid = self.next_cid();
        self.ledger.lock().unsubscribing(cid.clone(), topic.clone());
        self.send(Outbound::Request(WsRequest::unsub(cid.clone(), topic)))
            .await?;
        Ok(cid)
    }

    pub async fn close(&self) -> Result<(), WsError> {
        self.send(Outbound::Close).await
    }

    async fn send(&self, outbound: Outbound) -> Result<(), WsError> {
        self.tx
            .send(outbound)
            .await
            .map_err(|_| WsError::ChannelClosed)
    }
}
