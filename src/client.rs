use crate::config::DeviceConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::{Properties, Request, Response};
use crate::types::{Brightness, ColorTemperature, Power, Rgb};
use std::future::Future;

/// Client for a single ceiling light on the local network
///
/// The `DeviceClient` translates typed operations into the device's
/// JSON line protocol. It holds no connection between calls; each
/// operation opens, uses and closes its own TCP connection.
///
/// # Example
///
/// ```no_run
/// use ceiling_light::{DeviceClient, DeviceConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = DeviceClient::new(&DeviceConfig::new("192.168.31.123"));
///     client.set_power(true).await?;
///     client.set_brightness(80).await?;
///
///     let props = client.get_properties().await?;
///     println!("{} {} {}", props.power, props.brightness, props.color_temperature);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceClient {
    connection: Connection,
}

impl DeviceClient {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            connection: Connection::new(config.host.clone(), config.port, config.timeout),
        }
    }

    /// Get the device's host
    pub fn host(&self) -> &str {
        self.connection.host()
    }

    /// Get the device's port
    pub fn port(&self) -> u16 {
        self.connection.port()
    }

    /// Turn the light on or off
    ///
    /// Succeeds once the command is sent; the reply is not checked.
    pub async fn set_power(&self, on: bool) -> Result<()> {
        self.send_command(Request::set_power(Power::from(on))).await
    }

    /// Set brightness (1-100)
    pub async fn set_brightness(&self, value: i64) -> Result<()> {
        let brightness = Brightness::new(value)?;
        self.send_command(Request::set_bright(brightness)).await
    }

    /// Set color temperature in Kelvin (1700-6500)
    pub async fn set_color_temperature(&self, value: i64) -> Result<()> {
        let color_temperature = ColorTemperature::new(value)?;
        self.send_command(Request::set_ct_abx(color_temperature)).await
    }

    /// Set an RGB color
    pub async fn set_rgb(&self, color: Rgb) -> Result<()> {
        self.send_command(Request::set_rgb(color.packed())).await
    }

    /// Query power, brightness and color temperature
    pub async fn get_properties(&self) -> Result<Properties> {
        let reply = self.connection.send_request(&Request::get_prop()).await?;
        tracing::debug!("Received: {}", reply.trim_end());

        Response::parse(&reply)?.properties()
    }

    async fn send_command(&self, request: Request) -> Result<()> {
        let Some(reply) = self.connection.send_only(&request).await? else {
            return Ok(());
        };
        tracing::debug!("Received: {}", reply.trim_end());

        match Response::parse(&reply) {
            Ok(response) => {
                if let Some(detail) = response.error_message() {
                    tracing::warn!("Device rejected {:?}: {}", request.method, detail);
                }
            }
            Err(e) => tracing::debug!("Ignoring unparseable reply: {}", e),
        }

        Ok(())
    }
}

/// Device operations the [`LightController`](crate::LightController) dispatches
///
/// Implemented by [`DeviceClient`]; tests substitute recording fakes.
pub trait LightDevice: Send + Sync + 'static {
    fn send_power(&self, power: Power) -> impl Future<Output = Result<()>> + Send;

    fn send_brightness(&self, brightness: Brightness) -> impl Future<Output = Result<()>> + Send;

    fn send_color_temperature(
        &self,
        color_temperature: ColorTemperature,
    ) -> impl Future<Output = Result<()>> + Send;

    fn query_properties(&self) -> impl Future<Output = Result<Properties>> + Send;
}

impl LightDevice for DeviceClient {
    async fn send_power(&self, power: Power) -> Result<()> {
        self.set_power(power.is_on()).await
    }

    async fn send_brightness(&self, brightness: Brightness) -> Result<()> {
        self.set_brightness(i64::from(brightness.value())).await
    }

    async fn send_color_temperature(&self, color_temperature: ColorTemperature) -> Result<()> {
        self.set_color_temperature(i64::from(color_temperature.kelvin())).await
    }

    async fn query_properties(&self) -> Result<Properties> {
        self.get_properties().await
    }
}
