//! Fetches a day of hourly statistics from a Home Assistant server.
//!
//! Run with:
//!
//! ```text
//! HOME_ASSISTANT_URL=http://homeassistant.local:8123 \
//! HOME_ASSISTANT_ACCESS_TOKEN=... \
//! RUST_LOG=hassmux_client=debug \
//! cargo run --example statistics -- sensor.outside_temperature sensor.energy
//! ```

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use hassmux::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let statistic_ids: Vec<String> = std::env::args().skip(1).collect();
    if statistic_ids.is_empty() {
        anyhow::bail!("usage: statistics <statistic_id>...");
    }

    let config = ClientConfig::from_env().context("reading configuration")?;
    println!("Connecting to {}", config.url);

    let client = ClientBuilder::from_config(config).build();
    client.connect().await.context("connecting")?;

    let round_trip = client.ping().await?;
    println!("Server answered ping in {round_trip:?}");

    let end = Utc::now();
    let query = StatisticsQuery::new(statistic_ids, end - ChronoDuration::days(1)).end_time(end);

    // Several requests share the one connection.
    let (statistics, config) = tokio::join!(
        client.fetch_statistics(&query),
        client.call(Envelope::new("get_config")),
    );
    let config = config?;
    println!(
        "Home Assistant {} at {}",
        config["version"], config["location_name"]
    );
    println!("{}", serde_json::to_string_pretty(&statistics?)?);

    client.shutdown().await;
    Ok(())
}
