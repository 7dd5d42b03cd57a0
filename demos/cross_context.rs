//! Two independent contexts talking through the broadcast strategy.
//!
//! A "station" task answers sensor queries and publishes readings. The main
//! task listens and asks. Neither holds a reference to the other; they only
//! share a channel name on the process-global hub.
//!
//! Run with: RUST_LOG=eventcast=debug cargo run --example cross_context

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::panic_in_result_fn
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{reading, SensorReading, TemperatureUnit};
use eventcast::{
    // ---
    decode_params,
    BroadcastNotifyStrategy,
    BroadcastOptions,
    NotifyStrategy,
    ReplierRegistry,
    Result,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt as tracing_format, EnvFilter};

const CHANNEL: &str = "station-7";

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_format()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let listener = BroadcastNotifyStrategy::new(CHANNEL, BroadcastOptions::from_millis(1000))?;

    let (tx, mut readings) = mpsc::unbounded_channel();
    listener.on_notify_subscribers(Arc::new(move |payload| {
        if let Ok(r) = serde_json::from_value::<SensorReading>(payload) {
            let _ = tx.send(r);
        }
    }));

    let station = tokio::spawn(run_station());

    // Give the station time to come up; queries posted before it attaches
    // would go unanswered.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let temp = listener
        .query("read_temperature", vec![json!(TemperatureUnit::Fahrenheit)])
        .await?;
    println!("Temperature: {temp}");

    match listener.query("read_pressure", vec![]).await {
        Ok(v) => println!("Pressure:    {v}"),
        Err(e) => println!("Pressure:    {e}"),
    }

    while let Ok(Some(r)) = tokio::time::timeout(Duration::from_millis(300), readings.recv()).await {
        println!("Reading:     {} {} {} @ {}", r.sensor, r.value, r.unit, r.timestamp_ms);
    }

    station.abort();
    listener.close();
    Ok(())
}

async fn run_station() -> Result<()> {
    // ---
    let station = BroadcastNotifyStrategy::new(CHANNEL, BroadcastOptions::default())?;

    let mut repliers = ReplierRegistry::new();
    repliers.register_fn("read_temperature", |unit: TemperatureUnit| {
        // ---
        let celsius = 22.0_f32;
        Ok(match unit {
            TemperatureUnit::Celsius => reading("t1", celsius, "C"),
            TemperatureUnit::Fahrenheit => reading("t1", celsius * 9.0 / 5.0 + 32.0, "F"),
        })
    });
    repliers.register_raw("echo", |params| {
        let echoed: Vec<String> = decode_params(params)?;
        Ok(eventcast::Reply::Ready(json!(echoed)))
    });
    station.init(repliers);

    for i in 0..3 {
        let r = reading("h1", 50.0 + i as f32, "%");
        station.notify_subscribers(serde_json::to_value(r)?)?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Keep answering until aborted.
    std::future::pending::<()>().await;
    Ok(())
}
