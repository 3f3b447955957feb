//! Rust library for controlling a smart ceiling light over the local network
//!
//! The light speaks a small JSON line protocol over TCP (port 55443). This
//! library provides:
//!
//! - A stateless device client with typed operations (power, brightness,
//!   color temperature, RGB, property query)
//! - A synchronization controller that keeps a local model of the light,
//!   applies changes optimistically and debounces slider-style updates
//! - State change subscriptions (callbacks or channel receivers)
//! - A JSON snapshot of the current state for external display surfaces
//!
//! # Quick Start
//!
//! ```no_run
//! use ceiling_light::{DeviceConfig, LightController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeviceConfig::from_env()?;
//!     let controller = LightController::from_config(&config);
//!
//!     // Load the device's current state
//!     controller.refresh_device_state().await??;
//!
//!     // Subscribe to state updates
//!     let mut updates = controller.subscribe();
//!
//!     controller.toggle_power();
//!     controller.set_color_temperature(2700);
//!
//!     if let Some(state) = updates.recv().await {
//!         println!("State update: {}", state);
//!     }
//!
//!     controller.export_snapshot().write_to("lightState.json")?;
//!     Ok(())
//! }
//! ```
//!
//! # Direct Device Access
//!
//! Without local state or debouncing, the client sends each call straight away:
//!
//! ```no_run
//! use ceiling_light::{DeviceClient, DeviceConfig, Rgb};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DeviceClient::new(&DeviceConfig::new("192.168.31.123"));
//!     client.set_power(true).await?;
//!     client.set_rgb(Rgb::new(255, 120, 0)).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Controller**: local state, observers, debounced dispatch
//! - **Client**: typed device operations
//! - **Connection**: one TCP connection per request, bounded by a timeout
//! - **Protocol**: JSON request/response structures
//! - **Types**: range-checked domain values

mod client;
mod config;
mod connection;
mod controller;
mod error;
mod protocol;
mod snapshot;
mod subscription;
mod types;

// Public exports
pub use client::{DeviceClient, LightDevice};
pub use config::{DeviceConfig, DEFAULT_DEBOUNCE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use controller::{CommandPhase, LightController, Parameter};
pub use error::{DeviceError, Result};
pub use protocol::Properties;
pub use snapshot::{LightSnapshot, SNAPSHOT_FILE_NAME};
pub use subscription::{StateReceiver, SubscriptionId};
pub use types::{Brightness, ColorTemperature, LightState, Power, Rgb};
