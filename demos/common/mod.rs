//! Types shared by the demos.

#![allow(dead_code)]

use eventcast::{ChannelSpec, Event, Query};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    // ---
    pub sensor: String,
    pub value: f32,
    pub unit: String,
    pub timestamp_ms: u64,
}

impl Event for SensorReading {
    const NAME: &'static str = "sensor-reading";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// `read_temperature(unit) -> reading`
pub struct ReadTemperature;

impl Query for ReadTemperature {
    const NAME: &'static str = "read_temperature";
    type Params = TemperatureUnit;
    type Output = SensorReading;
}

/// `read_humidity() -> reading`
pub struct ReadHumidity;

impl Query for ReadHumidity {
    const NAME: &'static str = "read_humidity";
    type Params = ();
    type Output = SensorReading;
}

pub struct Environment;

impl ChannelSpec for Environment {
    const NAME: &'static str = "environment";
    type Events = (SensorReading, ());
    type Queries = (ReadHumidity, (ReadTemperature, ()));
}

pub fn reading(sensor: &str, value: f32, unit: &str) -> SensorReading {
    // ---
    SensorReading {
        sensor: sensor.to_string(),
        value,
        unit: unit.to_string(),
        timestamp_ms: current_time_ms(),
    }
}

pub fn current_time_ms() -> u64 {
    // ---
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
