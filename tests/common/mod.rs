#![allow(dead_code)]

use ceiling_light::{
    Brightness, ColorTemperature, DeviceConfig, DeviceError, LightDevice, Power, Properties,
    Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

// ============================================================================
// Scripted TCP device
// ============================================================================

/// How the fake light answers each connection
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write this reply, then close
    Reply(String),
    /// Keep the connection open without answering
    Silent,
    /// Close right after reading the command
    Close,
}

/// In-process TCP server standing in for the light
pub struct FakeLight {
    pub port: u16,
    requests: mpsc::UnboundedReceiver<String>,
}

impl FakeLight {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, requests) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let behavior = behavior.clone();
                let tx = tx.clone();

                tokio::spawn(async move {
                    let mut received = Vec::new();
                    let mut buf = [0u8; 256];

                    // Command line plus the trailing flush byte
                    while !received.ends_with(b"\r\n ") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => received.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = tx.send(String::from_utf8_lossy(&received).into_owned());

                    match behavior {
                        Behavior::Reply(reply) => {
                            let _ = stream.write_all(reply.as_bytes()).await;
                        }
                        Behavior::Silent => tokio::time::sleep(Duration::from_secs(30)).await,
                        Behavior::Close => {}
                    }
                });
            }
        });

        Self { port, requests }
    }

    pub async fn reply(reply: &str) -> Self {
        Self::start(Behavior::Reply(reply.to_string())).await
    }

    pub fn config(&self) -> DeviceConfig {
        DeviceConfig::new("127.0.0.1")
            .with_port(self.port)
            .with_timeout(Duration::from_millis(200))
            .with_debounce(Duration::from_millis(20))
    }

    /// Next raw request received, including CRLF and the flush byte
    pub async fn next_request(&mut self) -> String {
        timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("no request within 5s")
            .expect("server stopped")
    }
}

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Recording device
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Power(Power),
    Brightness(u8),
    ColorTemperature(u16),
    Query,
}

/// `LightDevice` that records every call and answers from a script
pub struct RecordingDevice {
    calls: mpsc::UnboundedSender<Call>,
    properties: Arc<Mutex<Option<Properties>>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

pub struct DeviceLog {
    calls: mpsc::UnboundedReceiver<Call>,
    properties: Arc<Mutex<Option<Properties>>>,
    max_in_flight: Arc<AtomicUsize>,
}

impl RecordingDevice {
    pub fn new(latency: Duration) -> (Self, DeviceLog) {
        let (tx, rx) = mpsc::unbounded_channel();
        let properties = Arc::new(Mutex::new(None));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let device = Self {
            calls: tx,
            properties: properties.clone(),
            latency,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: max_in_flight.clone(),
        };
        let device_log = DeviceLog {
            calls: rx,
            properties,
            max_in_flight,
        };
        (device, device_log)
    }

    async fn record(&self, call: Call) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _ = self.calls.send(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LightDevice for RecordingDevice {
    async fn send_power(&self, power: Power) -> Result<()> {
        self.record(Call::Power(power)).await;
        Ok(())
    }

    async fn send_brightness(&self, brightness: Brightness) -> Result<()> {
        self.record(Call::Brightness(brightness.value())).await;
        Ok(())
    }

    async fn send_color_temperature(&self, color_temperature: ColorTemperature) -> Result<()> {
        self.record(Call::ColorTemperature(color_temperature.kelvin())).await;
        Ok(())
    }

    async fn query_properties(&self) -> Result<Properties> {
        self.record(Call::Query).await;
        let properties = *self.properties.lock().unwrap();
        properties.ok_or(DeviceError::Timeout)
    }
}

impl DeviceLog {
    /// Answer future queries with these properties; `None` makes them time out
    pub fn set_properties(&self, properties: Option<Properties>) {
        *self.properties.lock().unwrap() = properties;
    }

    pub async fn next_call(&mut self) -> Call {
        timeout(Duration::from_secs(60), self.calls.recv())
            .await
            .expect("no call within 60s")
            .expect("device dropped")
    }

    /// Assert nothing else reaches the device within `window`
    pub async fn assert_quiet(&mut self, window: Duration) {
        if let Ok(Some(call)) = timeout(window, self.calls.recv()).await {
            panic!("unexpected call {:?}", call);
        }
    }

    pub fn try_next_call(&mut self) -> Option<Call> {
        self.calls.try_recv().ok()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn properties(power: Power, brightness: i64, color_temperature: i64) -> Properties {
    Properties {
        power,
        brightness: Brightness::clamped(brightness),
        color_temperature: ColorTemperature::clamped(color_temperature),
    }
}
