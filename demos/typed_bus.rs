//! Typed event bus: the same application code over either strategy.
//!
//! Run with: cargo run --example typed_bus [broadcast]

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::panic_in_result_fn
)]

mod common;

use std::time::Duration;

use common::{reading, Environment, ReadHumidity, ReadTemperature, SensorReading, TemperatureUnit};
use eventcast::{BusConfig, EventBus, Result};
use tracing_subscriber::{fmt as tracing_format, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_format()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let broadcast = std::env::args().nth(1).as_deref() == Some("broadcast");

    if broadcast {
        // Two buses stand in for two contexts sharing the global hub.
        let config = BusConfig::broadcast().with_timeout(Duration::from_millis(500));
        let station = EventBus::new(config.clone())?.register_channel::<Environment>();
        let console = EventBus::new(config)?.register_channel::<Environment>();
        run(&station, &console).await
    } else {
        let bus = EventBus::new(BusConfig::local())?.register_channel::<Environment>();
        run(&bus, &bus).await
    }
}

async fn run(station: &EventBus<(Environment, ())>, console: &EventBus<(Environment, ())>) -> Result<()> {
    // ---
    let env = station.channel::<Environment, _>()?;

    env.reply::<ReadTemperature, _>(|unit| {
        // ---
        let celsius = 22.0_f32;
        Ok(match unit {
            TemperatureUnit::Celsius => reading("t1", celsius, "C"),
            TemperatureUnit::Fahrenheit => reading("t1", celsius * 9.0 / 5.0 + 32.0, "F"),
        })
    });
    env.reply_async::<ReadHumidity, _, _>(|()| async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(reading("h1", 50.0, "%"))
    });

    let screen = console.channel::<Environment, _>()?;
    screen.subscribe(|r: SensorReading| {
        println!("Reading:     {} {} {} @ {}", r.sensor, r.value, r.unit, r.timestamp_ms);
    });

    let temp = screen.query::<ReadTemperature, _>(TemperatureUnit::Celsius).await?;
    let humidity = screen.query::<ReadHumidity, _>(()).await?;

    println!("Temperature: {} {}", temp.value, temp.unit);
    println!("Humidity:    {} {}", humidity.value, humidity.unit);

    env.publish(reading("p1", 101.3, "kPa"))?;

    // Broadcast delivery happens on a listener task.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
