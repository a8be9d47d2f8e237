//! Invoker Venues
//!
//! Endpoint and channel definitions for concrete venues, built on
//! `invoker-commons`. Endpoints only declare method, path, parameters,
//! permits and response type; channels only declare topic and payload type.
//!
//! - [`ftx`]: REST endpoints (markets, orderbook, spot margin lending)
//! - [`hbdm`]: gzip notification stream (orders, accounts, positions)

pub mod ftx;
pub mod hbdm;
