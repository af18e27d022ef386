//! Trigger cell records produced by the front-end unpacking stage.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single front-end energy deposit.
///
/// Units must match the configuration: `r_over_z` is dimensionless,
/// `phi` is in radians and `energy` is in hardware LSB units. No
/// conversion happens inside the emulator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerCell {
    /// Geometry identifier.
    pub id: u32,
    /// Detector layer.
    #[cfg_attr(feature = "serde", serde(default))]
    pub layer: u8,
    /// Endcap side (+1 or -1).
    #[cfg_attr(feature = "serde", serde(default = "default_z_side"))]
    pub z_side: i8,
    /// 120 degree sector the cell was read out by.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sector: u8,
    /// Radial over longitudinal position.
    pub r_over_z: f64,
    /// Azimuth in radians.
    pub phi: f64,
    /// Transverse energy in hardware units.
    pub energy: u32,
}

#[cfg(feature = "serde")]
fn default_z_side() -> i8 {
    1
}

impl TriggerCell {
    /// Creates a trigger cell in layer 1, sector 0 of the positive endcap.
    #[inline]
    #[must_use]
    pub fn new(id: u32, r_over_z: f64, phi: f64, energy: u32) -> Self {
        Self {
            id,
            layer: 1,
            z_side: 1,
            sector: 0,
            r_over_z,
            phi,
            energy,
        }
    }

    /// Sets the layer.
    #[must_use]
    pub fn with_layer(mut self, layer: u8) -> Self {
        self.layer = layer;
        self
    }

    /// Sets the endcap side.
    #[must_use]
    pub fn with_z_side(mut self, z_side: i8) -> Self {
        self.z_side = z_side;
        self
    }

    /// Sets the readout sector.
    #[must_use]
    pub fn with_sector(mut self, sector: u8) -> Self {
        self.sector = sector;
        self
    }
}

/// Sums trigger-cell energies without loss.
pub fn total_energy<'a, I>(cells: I) -> u64
where
    I: IntoIterator<Item = &'a TriggerCell>,
{
    cells.into_iter().map(|tc| u64::from(tc.energy)).sum()
}
