//! Huobi DM notification stream
//!
//! Private order, account and position pushes arrive as gzip frames with an
//! `op`/`topic` envelope. Each channel decodes into one
//! [`NotificationPayload`] variant.

pub mod notification;

pub use notification::{
    AccountNotification, AccountSnapshot, NotificationChannel, NotificationPayload,
    OrderNotification, PositionNotification, PositionSnapshot, notification_session,
};
