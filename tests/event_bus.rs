// tests/event_bus.rs
//
// Typed buses over both strategies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use eventcast::{
    // ---
    BroadcastHub,
    BusConfig,
    BusError,
    ChannelSpec,
    Event,
    EventBus,
    Query,
    Result,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    sensor: String,
    value: f64,
}

impl Event for Reading {
    const NAME: &'static str = "reading";
}

#[derive(Debug, Serialize, Deserialize)]
struct Calibrate;

impl Event for Calibrate {
    const NAME: &'static str = "calibrate";
}

struct Average;

impl Query for Average {
    const NAME: &'static str = "average";
    type Params = Vec<f64>;
    type Output = f64;
}

struct Version;

impl Query for Version {
    const NAME: &'static str = "version";
    type Params = ();
    type Output = String;
}

struct Sensors;

impl ChannelSpec for Sensors {
    const NAME: &'static str = "sensors";
    type Events = (Calibrate, (Reading, ()));
    type Queries = (Version, (Average, ()));
}

type SensorBus = EventBus<(Sensors, ())>;

fn broadcast_bus(hub: &Arc<BroadcastHub>, timeout_ms: u64) -> SensorBus {
    // ---
    let config = BusConfig::broadcast()
        .with_hub(hub.clone())
        .with_timeout(Duration::from_millis(timeout_ms));

    EventBus::new(config)
        .expect("bus construction failed")
        .register_channel::<Sensors>()
}

#[tokio::test]
async fn local_bus_round_trip() -> Result<()> {
    // ---
    let bus = EventBus::new(BusConfig::local())?.register_channel::<Sensors>();
    let sensors = bus.channel::<Sensors, _>()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    sensors.subscribe(move |reading: Reading| {
        let _ = tx.send(reading);
    });

    let reading = Reading {
        sensor: "t1".into(),
        value: 21.5,
    };
    sensors.publish(reading.clone())?;

    // Local delivery is in-line.
    assert_eq!(rx.try_recv().ok(), Some(reading));

    sensors.reply::<Average, _>(|values| Ok(values.iter().sum::<f64>() / values.len() as f64));
    sensors.reply::<Version, _>(|()| Ok("1.0".to_string()));

    assert_eq!(sensors.query::<Average, _>(vec![1.0, 2.0, 3.0]).await?, 2.0);
    assert_eq!(sensors.query::<Version, _>(()).await?, "1.0");

    Ok(())
}

#[tokio::test]
async fn broadcast_buses_exchange_events() -> Result<()> {
    // ---
    let hub = BroadcastHub::new();
    let left = broadcast_bus(&hub, 1000);
    let right = broadcast_bus(&hub, 1000);

    let left_sensors = left.channel::<Sensors, _>()?;
    let right_sensors = right.channel::<Sensors, _>()?;

    let (tx, mut seen_by_right) = mpsc::unbounded_channel();
    right_sensors.subscribe(move |reading: Reading| {
        let _ = tx.send(reading);
    });

    let (tx, mut seen_by_left) = mpsc::unbounded_channel();
    left_sensors.subscribe(move |reading: Reading| {
        let _ = tx.send(reading);
    });

    left_sensors.publish(Reading {
        sensor: "t1".into(),
        value: 19.0,
    })?;

    let got = timeout(Duration::from_secs(1), seen_by_right.recv())
        .await
        .expect("right bus never saw the reading")
        .expect("inbox closed");
    assert_eq!(got.value, 19.0);

    let echo = timeout(Duration::from_millis(100), seen_by_left.recv()).await;
    assert!(echo.is_err(), "publisher saw its own reading");

    Ok(())
}

#[tokio::test]
async fn broadcast_buses_answer_queries() -> Result<()> {
    // ---
    let hub = BroadcastHub::new();
    let asker = broadcast_bus(&hub, 1000);
    let answerer = broadcast_bus(&hub, 1000);

    answerer
        .channel::<Sensors, _>()?
        .reply_async::<Average, _, _>(|values| async move {
            Ok(values.iter().sum::<f64>() / values.len() as f64)
        });

    let avg = asker
        .channel::<Sensors, _>()?
        .query::<Average, _>(vec![2.0, 4.0])
        .await?;
    assert_eq!(avg, 3.0);

    Ok(())
}

#[tokio::test]
async fn broadcast_query_without_peer_times_out() -> Result<()> {
    // ---
    let hub = BroadcastHub::new();
    let lonely = broadcast_bus(&hub, 100);

    let err = lonely
        .channel::<Sensors, _>()?
        .query::<Version, _>(())
        .await
        .unwrap_err();

    assert!(matches!(err, BusError::Timeout));
    Ok(())
}

#[tokio::test]
async fn bus_channels_do_not_cross_talk() -> Result<()> {
    // ---
    let hub = BroadcastHub::new();
    let left = broadcast_bus(&hub, 1000).register_events::<Reading>();
    let right = broadcast_bus(&hub, 1000).register_events::<Reading>();

    let (tx, mut on_sensors) = mpsc::unbounded_channel();
    right.channel::<Sensors, _>()?.subscribe(move |reading: Reading| {
        let _ = tx.send(reading);
    });

    let (tx, mut on_bus) = mpsc::unbounded_channel();
    right.subscribe(move |reading: Reading| {
        let _ = tx.send(reading);
    });

    left.publish(Reading {
        sensor: "bus".into(),
        value: 1.0,
    })?;

    let got = timeout(Duration::from_secs(1), on_bus.recv())
        .await
        .expect("bus channel never saw the reading")
        .expect("inbox closed");
    assert_eq!(got.sensor, "bus");

    let leaked = timeout(Duration::from_millis(100), on_sensors.recv()).await;
    assert!(leaked.is_err(), "bus event leaked into the sensors channel");

    Ok(())
}
