use crate::error::{DeviceError, Result};
use crate::types::{Brightness, ColorTemperature, Power};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Request id; the device echoes it back but nothing checks it
pub const REQUEST_ID: u32 = 1;

/// Transition effect sent with every set command
pub const EFFECT: &str = "smooth";

/// Transition duration in milliseconds
pub const EFFECT_DURATION_MS: u32 = 500;

/// Properties requested by `get_prop`, in result order
pub const QUERIED_PROPERTIES: [&str; 3] = ["power", "bright", "ct"];

/// Device command names
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    SetPower,
    SetBright,
    SetCtAbx,
    SetRgb,
    GetProp,
}

/// Command line sent to the device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u32,
    pub method: Method,
    pub params: Vec<Value>,
}

/// Response line read back from the device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Error object the device returns for rejected commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Properties parsed out of a `get_prop` response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    pub power: Power,
    pub brightness: Brightness,
    pub color_temperature: ColorTemperature,
}

impl Request {
    /// Create a request for the given method and parameters
    pub fn new(method: Method, params: Vec<Value>) -> Self {
        Self {
            id: REQUEST_ID,
            method,
            params,
        }
    }

    /// A set command carrying one value followed by the smooth transition
    fn with_effect(method: Method, value: Value) -> Self {
        Self::new(method, vec![value, json!(EFFECT), json!(EFFECT_DURATION_MS)])
    }

    pub fn set_power(power: Power) -> Self {
        Self::with_effect(Method::SetPower, json!(power.as_str()))
    }

    pub fn set_bright(brightness: Brightness) -> Self {
        Self::with_effect(Method::SetBright, json!(brightness.value()))
    }

    pub fn set_ct_abx(color_temperature: ColorTemperature) -> Self {
        Self::with_effect(Method::SetCtAbx, json!(color_temperature.kelvin()))
    }

    pub fn set_rgb(packed: u32) -> Self {
        Self::with_effect(Method::SetRgb, json!(packed))
    }

    pub fn get_prop() -> Self {
        Self::new(
            Method::GetProp,
            QUERIED_PROPERTIES.iter().map(|p| json!(p)).collect(),
        )
    }

    /// Encode as a single compact JSON line terminated by CRLF
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push_str("\r\n");
        Ok(line)
    }
}

impl Response {
    /// Parse the first response line in a received chunk.
    ///
    /// Unsolicited `props` notifications carry no `result`/`error` and are skipped.
    pub fn parse(chunk: &str) -> Result<Self> {
        let mut last_err = None;
        for line in chunk.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match serde_json::from_str::<Response>(line) {
                Ok(response) if response.result.is_some() || response.error.is_some() => {
                    return Ok(response)
                }
                Ok(_) => tracing::debug!("Skipping notification: {}", line),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => DeviceError::ProtocolError(format!("Malformed response: {}", e)),
            None => DeviceError::ProtocolError("No response line".to_string()),
        })
    }

    /// Get the device error message, if any
    pub fn error_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|e| format!("{} (code {})", e.message, e.code))
    }

    /// Interpret the positional `get_prop` result.
    ///
    /// Brightness and color temperature arrive as numeric strings; values that
    /// fail to parse fall back to 50 and 4000 instead of failing the query.
    pub fn properties(&self) -> Result<Properties> {
        if let Some(detail) = self.error_message() {
            return Err(DeviceError::ProtocolError(format!("Device error: {}", detail)));
        }

        let result = self
            .result
            .as_ref()
            .ok_or_else(|| DeviceError::ProtocolError("No result in response".to_string()))?;

        if result.len() < QUERIED_PROPERTIES.len() {
            return Err(DeviceError::ProtocolError(format!(
                "Expected {} properties, got {}",
                QUERIED_PROPERTIES.len(),
                result.len()
            )));
        }

        let power = result[0]
            .as_str()
            .ok_or_else(|| DeviceError::ProtocolError("Power is not a string".to_string()))
            .and_then(Power::from_wire)?;

        let brightness = numeric(&result[1])
            .map(Brightness::clamped)
            .unwrap_or(Brightness::FALLBACK);

        let color_temperature = numeric(&result[2])
            .map(ColorTemperature::clamped)
            .unwrap_or(ColorTemperature::FALLBACK);

        Ok(Properties {
            power,
            brightness,
            color_temperature,
        })
    }
}

fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}
