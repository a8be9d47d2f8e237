use anyhow::{Context, bail};
use invoker_commons::{
    Actor, InboundMessage, InvokerConfigFile, ReqwestTransport, SystemClock, VenueConfig, WsEvent,
    load_config, load_default_config,
};
use invoker_venues::ftx::{GetLendingOffers, GetMarkets, GetOrderbook};
use invoker_venues::hbdm::{NotificationChannel, notification_session};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Invoker - rate-limited exchange API client

USAGE:
    invoker [OPTIONS] <COMMAND>

OPTIONS:
    --config <PATH>     Load venue configuration from JSON file
    --venue <ID>        Venue to use (default: ftx for REST, hbdm for stream)
    --help              Print this help message

COMMANDS:
    offers                  List spot margin lending offers
    markets                 List markets
    orderbook <MARKET>      Print the order book of one market
    stream <TOPIC>...       Subscribe to notification topics (orders.btc, accounts.*)

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter

EXAMPLES:
    invoker markets
    invoker --config venues.json orderbook BTC-PERP
    invoker stream orders.btc positions.btc
"#
    );
}

enum Command {
    Offers,
    Markets,
    Orderbook(String),
    Stream(Vec<String>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoker=info,invoker_commons=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut venue_id: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    bail!("--config requires a path argument");
                }
                config_path = Some(args[i].clone());
            }
            "--venue" | "-v" => {
                i += 1;
                if i >= args.len() {
                    bail!("--venue requires an id argument");
                }
                venue_id = Some(args[i].clone());
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let command = match positional.split_first() {
        Some((name, rest)) => match (name.as_str(), rest) {
            ("offers", []) => Command::Offers,
            ("markets", []) => Command::Markets,
            ("orderbook", [market]) => Command::Orderbook(market.clone()),
            ("stream", topics) if !topics.is_empty() => Command::Stream(topics.to_vec()),
            _ => {
                print_help();
                bail!("invalid command: {}", positional.join(" "));
            }
        },
        None => {
            print_help();
            return Ok(());
        }
    };

    let config = match &config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            load_config(path)?
        }
        None => load_default_config()?,
    };
    config.validate()?;

    match command {
        Command::Offers => {
            let actor = rest_actor(&config, venue_id.as_deref().unwrap_or("ftx"))?;
            let response = actor.submit(&GetLendingOffers).await?;
            for offer in response.result {
                println!("{:<8} rate={} size={}", offer.coin, offer.rate, offer.size);
            }
        }
        Command::Markets => {
            let actor = rest_actor(&config, venue_id.as_deref().unwrap_or("ftx"))?;
            let response = actor.submit(&GetMarkets).await?;
            for market in response.result.iter().filter(|m| m.enabled) {
                println!(
                    "{:<20} {:<8} bid={} ask={}",
                    market.name,
                    market.market_type,
                    display(market.bid),
                    display(market.ask)
                );
            }
        }
        Command::Orderbook(market) => {
            let actor = rest_actor(&config, venue_id.as_deref().unwrap_or("ftx"))?;
            let response = actor.submit(&GetOrderbook::new(market).with_depth(10)).await?;
            for (price, size) in response.result.asks.iter().rev() {
                println!("ask {price:>14} {size:>14}");
            }
            for (price, size) in &response.result.bids {
                println!("bid {price:>14} {size:>14}");
            }
        }
        Command::Stream(topics) => {
            let venue = config.venue(venue_id.as_deref().unwrap_or("hbdm"))?;
            stream(venue, &topics).await?;
        }
    }

    Ok(())
}

fn rest_actor(config: &InvokerConfigFile, venue_id: &str) -> anyhow::Result<Actor> {
    let venue = config.venue(venue_id)?;
    tracing::info!("Venue: {} ({})", venue.name, venue.rest_base_url);

    let quota = Arc::new(venue.quota_registry(Arc::new(SystemClock::new())));
    let transport = Arc::new(ReqwestTransport::new(venue.rest_client_config())?);
    Ok(Actor::new(
        format!("{}-cli", venue.id),
        quota,
        transport,
        venue.actor_policy(),
    ))
}

async fn stream(venue: &VenueConfig, topics: &[String]) -> anyhow::Result<()> {
    let url = venue
        .ws_url
        .as_deref()
        .with_context(|| format!("venue {} has no ws_url", venue.id))?;
    let channels = topics
        .iter()
        .map(|topic| {
            NotificationChannel::parse(topic)
                .with_context(|| format!("unknown notification topic: {topic}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (subscriber, mut events) = notification_session(url, &venue.websocket)
        .connect()
        .await?;
    for channel in &channels {
        channel.subscribe(&subscriber).await?;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(WsEvent::Message(InboundMessage::MarketData { topic, payload })) => {
                    println!("{topic}: {payload:?}");
                }
                Some(WsEvent::Message(InboundMessage::SubscribeAck(ack))) => {
                    tracing::info!(topic = ?ack.topic, success = ack.is_success(), "Subscription acknowledged");
                }
                Some(WsEvent::Message(_)) => {}
                Some(WsEvent::Desync { consecutive_failures, error }) => {
                    bail!("stream desynchronized after {consecutive_failures} bad frames: {error}");
                }
                Some(WsEvent::Error(error)) => tracing::warn!("WebSocket error: {}", error),
                Some(WsEvent::Disconnected) | None => {
                    tracing::info!("Disconnected");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                subscriber.close().await.ok();
                return Ok(());
            }
        }
    }
}

fn display(value: Option<rust_decimal::Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
