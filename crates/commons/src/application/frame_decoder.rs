use flate2::read::{DeflateDecoder, GzDecoder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::io::Read;
use std::string::FromUtf8Error;
use std::sync::Arc;
use thiserror::Error;

use super::channel_registry::ChannelRegistry;
use crate::domain::{InboundMessage, RawFrame};

/// Largest decompressed frame accepted by default
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Compression applied to binary frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameCompression {
    #[default]
    Gzip,
    /// Raw deflate stream, no zlib or gzip header
    Deflate,
    None,
}

/// The frame itself is broken
#[derive(Error, Debug)]
pub enum FrameDecodeError {
    #[error("Decompression failed: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("Decompressed frame exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Frame is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("Malformed JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Missing or non-string field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {op} message: {source}")]
    Control {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid payload on {topic}: {source}")]
    Payload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Decode(#[from] FrameDecodeError),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("No channel registered for topic {0}")]
    UnregisteredTopic(String),
}

impl FrameError {
    /// Expected on a healthy connection (new server ops, late pushes after
    /// an unsubscribe), as opposed to corrupt data
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::UnsupportedOperation(_) | FrameError::UnregisteredTopic(_)
        )
    }
}

/// Turns raw frames into [`InboundMessage`]s
///
/// Stateless across frames: decompress, parse the JSON envelope, classify
/// on `op`, and for `notify` frames decode the whole envelope with the
/// binding registered for its `topic`.
pub struct FrameDecoder<M> {
    registry: Arc<ChannelRegistry<M>>,
    compression: FrameCompression,
    max_frame_bytes: usize,
}

impl<M> Clone for FrameDecoder<M> {
    fn clone(&self) -> Self {
        FrameDecoder {
            registry: Arc::clone(&self.registry),
            compression: self.compression,
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

impl<M> FrameDecoder<M> {
    pub fn new(registry: Arc<ChannelRegistry<M>>) -> Self {
        FrameDecoder {
            registry,
            compression: FrameCompression::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    pub fn with_compression(mut self, compression: FrameCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Cap on the size of a binary frame after decompression
    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry<M>> {
        &self.registry
    }

    pub fn compression(&self) -> FrameCompression {
        self.compression
    }

    pub fn decode(&self, frame: &RawFrame) -> Result<InboundMessage<M>, FrameError> {
        let text = match frame {
            RawFrame::Text(text) => Cow::Borrowed(text.as_str()),
            RawFrame::Binary(bytes) => Cow::Owned(self.decompress(bytes)?),
        };
        self.decode_text(&text)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<String, FrameDecodeError> {
        let limit = self.max_frame_bytes;
        // One byte past the limit is enough to tell an overrun from an exact fit
        let take = (limit as u64).saturating_add(1);
        let mut buf = Vec::with_capacity(bytes.len().saturating_mul(4).min(limit));
        match self.compression {
            FrameCompression::Gzip => {
                GzDecoder::new(bytes).take(take).read_to_end(&mut buf)?;
            }
            FrameCompression::Deflate => {
                DeflateDecoder::new(bytes).take(take).read_to_end(&mut buf)?;
            }
            FrameCompression::None => buf.extend_from_slice(bytes),
        }
        if buf.len() > limit {
            return Err(FrameDecodeError::TooLarge { limit });
        }
        Ok(String::from_utf8(buf)?)
    }

    /// Decode an already decompressed envelope
    pub fn decode_text(&self, text: &str) -> Result<InboundMessage<M>, FrameError> {
        let envelope: Value = serde_json::from_str(text).map_err(FrameDecodeError::Json)?;
        let fields = envelope.as_object().ok_or(FrameDecodeError::NotAnObject)?;
        let op = fields
            .get("op")
            .and_then(Value::as_str)
            .ok_or(FrameDecodeError::MissingField("op"))?;

        match op {
            "notify" => {
                let topic = fields
                    .get("topic")
                    .and_then(Value::as_str)
                    .ok_or(FrameDecodeError::MissingField("topic"))?;
                let binding = self
                    .registry
                    .resolve(topic)
                    .ok_or_else(|| FrameError::UnregisteredTopic(topic.to_string()))?;
                let payload =
                    binding
                        .decode(&envelope)
                        .map_err(|source| FrameDecodeError::Payload {
                            topic: topic.to_string(),
                            source,
                        })?;
                Ok(InboundMessage::MarketData {
                    topic: topic.to_string(),
                    payload,
                })
            }
            "ping" => Ok(InboundMessage::Ping(control("ping", &envelope)?)),
            "sub" => Ok(InboundMessage::SubscribeAck(control("sub", &envelope)?)),
            "unsub" => Ok(InboundMessage::UnsubscribeAck(control("unsub", &envelope)?)),
            "close" => Ok(InboundMessage::Close(control("close", &envelope)?)),
            other => Err(FrameError::UnsupportedOperation(other.to_string())),
        }
    }
}

fn control<T: DeserializeOwned>(op: &'static str, envelope: &Value) -> Result<T, FrameDecodeError> {
    T::deserialize(envelope).map_err(|source| FrameDecodeError::Control { op, source })
}
