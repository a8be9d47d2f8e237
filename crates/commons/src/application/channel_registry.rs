use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Topic {topic} is already bound to {existing}, refusing to rebind to {requested}")]
    Conflict {
        topic: String,
        existing: &'static str,
        requested: &'static str,
    },
}

type DecodeFn<M> = dyn Fn(&Value) -> Result<M, serde_json::Error> + Send + Sync;

/// Decoding capability registered for one topic
pub struct ChannelBinding<M> {
    type_id: TypeId,
    type_name: &'static str,
    decode: Box<DecodeFn<M>>,
}

impl<M> ChannelBinding<M> {
    fn new<T>() -> Self
    where
        T: DeserializeOwned + Into<M> + 'static,
    {
        ChannelBinding {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            decode: Box::new(|value: &Value| T::deserialize(value).map(Into::into)),
        }
    }

    /// Name of the concrete message type behind this binding
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn decode(&self, envelope: &Value) -> Result<M, serde_json::Error> {
        (self.decode)(envelope)
    }
}

impl<M> fmt::Debug for ChannelBinding<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBinding")
            .field("type_name", &self.type_name)
            .finish()
    }
}

type Bindings<M> = HashMap<String, Arc<ChannelBinding<M>>>;

/// Topic → decoder table shared between subscribers and frame decoders
///
/// Reads take a lock-free snapshot. Writers serialize on a mutex, copy the
/// current table, modify the copy and swap it in, so a frame decoded after
/// `register` returns always sees the new binding.
pub struct ChannelRegistry<M> {
    bindings: ArcSwap<Bindings<M>>,
    writer: Mutex<()>,
}

impl<M> Default for ChannelRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ChannelRegistry<M> {
    pub fn new() -> Self {
        ChannelRegistry {
            bindings: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    /// Bind `topic` to message type `T`
    ///
    /// Binding the same type twice is a no-op. A topic already bound to a
    /// different type keeps its binding and the call fails with
    /// [`RegistryError::Conflict`]; use [`ChannelRegistry::replace`] to
    /// rebind on purpose.
    pub fn register<T>(&self, topic: impl Into<String>) -> Result<(), RegistryError>
    where
        T: DeserializeOwned + Into<M> + 'static,
    {
        let topic = topic.into();
        let _guard = self.writer.lock();
        let current = self.bindings.load();

        if let Some(existing) = current.get(&topic) {
            if existing.type_id == TypeId::of::<T>() {
                return Ok(());
            }
            return Err(RegistryError::Conflict {
                topic,
                existing: existing.type_name,
                requested: type_name::<T>(),
            });
        }

        let mut next = Bindings::clone(&current);
        debug!(topic = %topic, message_type = type_name::<T>(), "Channel registered");
        next.insert(topic, Arc::new(ChannelBinding::new::<T>()));
        self.bindings.store(Arc::new(next));
        Ok(())
    }

    /// Bind `topic` to `T` unconditionally, returning the previous type name
    pub fn replace<T>(&self, topic: impl Into<String>) -> Option<&'static str>
    where
        T: DeserializeOwned + Into<M> + 'static,
    {
        let topic = topic.into();
        let _guard = self.writer.lock();

        let mut next = Bindings::clone(&self.bindings.load());
        let previous = next
            .insert(topic.clone(), Arc::new(ChannelBinding::new::<T>()))
            .map(|binding| binding.type_name);
        self.bindings.store(Arc::new(next));

        if let Some(previous) = previous {
            info!(
                topic = %topic,
                previous,
                message_type = type_name::<T>(),
                "Channel rebound"
            );
        }
        previous
    }

    /// Remove the binding for `topic`, returning whether one existed
    pub fn unregister(&self, topic: &str) -> bool {
        let _guard = self.writer.lock();
        let current = self.bindings.load();
        if !current.contains_key(topic) {
            return false;
        }

        let mut next = Bindings::clone(&current);
        next.remove(topic);
        self.bindings.store(Arc::new(next));
        debug!(topic = %topic, "Channel unregistered");
        true
    }

    pub fn resolve(&self, topic: &str) -> Option<Arc<ChannelBinding<M>>> {
        self.bindings.load().get(topic).cloned()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.bindings.load().contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.bindings.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.load().is_empty()
    }

    /// Registered topics, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.bindings.load().keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl<M> fmt::Debug for ChannelRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("topics", &self.topics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Trade {
        price: String,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Quote {
        bid: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Payload {
        Trade(Trade),
        Quote(Quote),
    }

    impl From<Trade> for Payload {
        fn from(trade: Trade) -> Self {
            Payload::Trade(trade)
        }
    }

    impl From<Quote> for Payload {
        fn from(quote: Quote) -> Self {
            Payload::Quote(quote)
        }
    }

    #[test]
    fn test_register_and_decode() {
        let registry = ChannelRegistry::<Payload>::new();
        registry.register::<Trade>("trades.BTC-USD").unwrap();

        let binding = registry.resolve("trades.BTC-USD").unwrap();
        assert!(binding.type_name().ends_with("Trade"));

        let payload = binding
            .decode(&json!({"op": "notify", "topic": "trades.BTC-USD", "price": "101.5"}))
            .unwrap();
        assert_eq!(
            payload,
            Payload::Trade(Trade {
                price: "101.5".into()
            })
        );

        assert!(registry.resolve("trades.ETH-USD").is_none());
    }

    #[test]
    fn test_same_type_is_idempotent() {
        let registry = ChannelRegistry::<Payload>::new();
        registry.register::<Trade>("trades").unwrap();
        registry.register::<Trade>("trades").unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_type_keeps_existing_binding() {
        let registry = ChannelRegistry::<Payload>::new();
        registry.register::<Trade>("feed").unwrap();

        let err = registry.register::<Quote>("feed").unwrap_err();
        match err {
            RegistryError::Conflict {
                topic,
                existing,
                requested,
            } => {
                assert_eq!(topic, "feed");
                assert!(existing.ends_with("Trade"));
                assert!(requested.ends_with("Quote"));
            }
        }

        let binding = registry.resolve("feed").unwrap();
        assert!(binding.type_name().ends_with("Trade"));
    }

    #[test]
    fn test_replace_rebinds() {
        let registry = ChannelRegistry::<Payload>::new();
        assert_eq!(registry.replace::<Trade>("feed"), None);

        let previous = registry.replace::<Quote>("feed").unwrap();
        assert!(previous.ends_with("Trade"));

        let payload = registry
            .resolve("feed")
            .unwrap()
            .decode(&json!({"bid": "99"}))
            .unwrap();
        assert_eq!(payload, Payload::Quote(Quote { bid: "99".into() }));
    }

    #[test]
    fn test_unregister() {
        let registry = ChannelRegistry::<Payload>::new();
        registry.register::<Trade>("a").unwrap();
        registry.register::<Quote>("b").unwrap();
        assert_eq!(registry.topics(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(!registry.contains("a"));
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_snapshot_outlives_unregister() {
        let registry = ChannelRegistry::<Payload>::new();
        registry.register::<Trade>("a").unwrap();

        let binding = registry.resolve("a").unwrap();
        registry.unregister("a");

        assert!(binding.decode(&json!({"price": "1"})).is_ok());
    }

    #[test]
    fn test_concurrent_registration_loses_nothing() {
        let registry = Arc::new(ChannelRegistry::<Payload>::new());

        std::thread::scope(|scope| {
            for thread in 0..8 {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for i in 0..50 {
                        registry
                            .register::<Trade>(format!("trades.{thread}.{i}"))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(registry.len(), 400);
        assert!(registry.contains("trades.7.49"));
    }
}
