//! Persisted light state for external display surfaces.
//!
//! The snapshot is a small JSON document (`isLightOn`, `brightness`,
//! `colorTemperature`) that readers such as a desktop widget poll on their
//! own schedule. It is the only state written to disk.

use crate::error::Result;
use crate::types::{Brightness, ColorTemperature, LightState, Power};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default file name for the snapshot
pub const SNAPSHOT_FILE_NAME: &str = "lightState.json";

/// Snapshot of the light state as written for external readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSnapshot {
    pub is_light_on: bool,
    pub brightness: u8,
    pub color_temperature: u16,
}

impl LightSnapshot {
    /// Write the snapshot as pretty-printed JSON, replacing the file atomically
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!("Light state saved to {}", path.display());
        Ok(())
    }

    /// Read a snapshot previously written with [`write_to`](Self::write_to)
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl From<LightState> for LightSnapshot {
    fn from(state: LightState) -> Self {
        Self {
            is_light_on: state.power.is_on(),
            brightness: state.brightness.value(),
            color_temperature: state.color_temperature.kelvin(),
        }
    }
}

impl From<LightSnapshot> for LightState {
    /// Out-of-range values in a hand-edited file are clamped
    fn from(snapshot: LightSnapshot) -> Self {
        LightState::new(
            Power::from(snapshot.is_light_on),
            Brightness::clamped(i64::from(snapshot.brightness)),
            ColorTemperature::clamped(i64::from(snapshot.color_temperature)),
        )
    }
}
