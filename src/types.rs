use crate::error::{DeviceError, Result};
use std::fmt;

/// Power state of the light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Power {
    On,
    Off,
}

impl Power {
    /// Wire representation (`"on"` / `"off"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Power::On => "on",
            Power::Off => "off",
        }
    }

    /// Whether the light is on
    pub fn is_on(&self) -> bool {
        *self == Power::On
    }

    /// The opposite power state
    pub fn toggled(&self) -> Self {
        match self {
            Power::On => Power::Off,
            Power::Off => Power::On,
        }
    }

    /// Parse the power field of a `get_prop` result
    pub fn from_wire(value: &str) -> Result<Self> {
        match value {
            "on" => Ok(Power::On),
            "off" => Ok(Power::Off),
            other => Err(DeviceError::ProtocolError(format!(
                "Unknown power value: {}",
                other
            ))),
        }
    }
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on {
            Power::On
        } else {
            Power::Off
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Brightness as a percentage (1-100)
///
/// The device has no zero brightness; "off" is expressed through [`Power`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Brightness(u8);

impl Brightness {
    pub const MIN: Self = Self(1);
    pub const MAX: Self = Self(100);

    /// Value used when the device reports an unparseable brightness
    pub const FALLBACK: Self = Self(50);

    /// Create a brightness, rejecting values outside 1-100
    pub fn new(value: i64) -> Result<Self> {
        if !(Self::MIN.0 as i64..=Self::MAX.0 as i64).contains(&value) {
            return Err(DeviceError::InvalidRange {
                value,
                min: Self::MIN.0 as i64,
                max: Self::MAX.0 as i64,
            });
        }
        Ok(Self(value as u8))
    }

    /// Create a brightness, clamping into 1-100
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u8)
    }

    /// Percentage value
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl TryFrom<i64> for Brightness {
    type Error = DeviceError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Brightness> for u8 {
    fn from(value: Brightness) -> Self {
        value.0
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Color temperature in Kelvin (1700-6500)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColorTemperature(u16);

impl ColorTemperature {
    pub const MIN: Self = Self(1700);
    pub const MAX: Self = Self(6500);

    /// Value used when the device reports an unparseable color temperature
    pub const FALLBACK: Self = Self(4000);

    /// Create a color temperature, rejecting values outside 1700-6500
    pub fn new(value: i64) -> Result<Self> {
        if !(Self::MIN.0 as i64..=Self::MAX.0 as i64).contains(&value) {
            return Err(DeviceError::InvalidRange {
                value,
                min: Self::MIN.0 as i64,
                max: Self::MAX.0 as i64,
            });
        }
        Ok(Self(value as u16))
    }

    /// Create a color temperature, clamping into 1700-6500
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u16)
    }

    /// Kelvin value
    pub fn kelvin(&self) -> u16 {
        self.0
    }
}

impl Default for ColorTemperature {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl TryFrom<i64> for ColorTemperature {
    type Error = DeviceError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ColorTemperature> for u16 {
    fn from(value: ColorTemperature) -> Self {
        value.0
    }
}

impl fmt::Display for ColorTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}K", self.0)
    }
}

/// RGB color for `set_rgb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Packed `0xRRGGBB` value the device expects
    pub fn packed(&self) -> u32 {
        (u32::from(self.red) << 16) | (u32::from(self.green) << 8) | u32::from(self.blue)
    }
}

/// Complete light state, replaced as a whole on every change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightState {
    pub power: Power,
    pub brightness: Brightness,
    pub color_temperature: ColorTemperature,
}

impl LightState {
    pub fn new(power: Power, brightness: Brightness, color_temperature: ColorTemperature) -> Self {
        Self {
            power,
            brightness,
            color_temperature,
        }
    }

    pub fn with_power(self, power: Power) -> Self {
        Self { power, ..self }
    }

    pub fn with_brightness(self, brightness: Brightness) -> Self {
        Self { brightness, ..self }
    }

    pub fn with_color_temperature(self, color_temperature: ColorTemperature) -> Self {
        Self {
            color_temperature,
            ..self
        }
    }
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            power: Power::Off,
            brightness: Brightness::FALLBACK,
            color_temperature: ColorTemperature::FALLBACK,
        }
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.power, self.brightness, self.color_temperature
        )
    }
}
