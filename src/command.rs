//! Configuration command encoding.
//!
//! The device has no partial update: every configuration frame carries every
//! mutable parameter. [`CommandBuilder`] therefore starts from the last
//! decoded [`DeviceState`] (or fixed defaults), applies the requested changes
//! and serialises the complete working set.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    byte_order::write_network_u16,
    frame::{CONTROLLER_ADDRESS, Frame},
    message::Action,
    state::DeviceState,
};

/// Length of a configuration payload.
pub const CONFIG_PAYLOAD_LEN: usize = 21;
/// Highest raw tank level; zero disables dosing for the channel.
pub const TANK_RAW_MAX: u8 = 7;

/// Setpoints the two-byte pH field can carry once scaled by 100.
pub const PH_SETPOINT_CAPACITY: Limit = Limit::new(0.0, 655.35);
/// Values a two-byte field can carry.
pub const WORD_CAPACITY: Limit = Limit::new(0.0, 65535.0);
/// Values a one-byte field can carry.
pub const BYTE_CAPACITY: Limit = Limit::new(0.0, 255.0);

const PH_SETPOINT: usize = 0;
const ORP_SETPOINT: usize = 2;
const PH_TANK: usize = 4;
const ORP_TANK: usize = 5;
const CALCIUM_HARDNESS: usize = 6;
const CYANURIC_ACID: usize = 9;
const ALKALINITY_HIGH: usize = 10;
const ALKALINITY_LOW: usize = 12;

/// Inclusive bounds for one configurable value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
}

impl Limit {
    /// Create a limit.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self { Self { min, max } }

    /// `true` if `value` lies within the bounds.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool { (self.min..=self.max).contains(&value) }

    /// `true` if every value in `self` also lies within `outer`.
    #[must_use]
    pub fn is_within(&self, outer: &Limit) -> bool {
        outer.contains(self.min) && outer.contains(self.max)
    }

    pub(crate) fn check(&self, field: &'static str, value: f64) -> Result<(), ValidationError> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(ValidationError {
                field,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

impl From<RangeInclusive<f64>> for Limit {
    fn from(range: RangeInclusive<f64>) -> Self { Self::new(*range.start(), *range.end()) }
}

/// Accepted ranges for the values a command may change.
///
/// Supplied by configuration and injected into validation; the defaults match
/// the device's documented ranges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetpointLimits {
    /// pH setpoint.
    pub ph_setpoint: Limit,
    /// ORP setpoint in millivolts.
    pub orp_setpoint: Limit,
    /// Calcium hardness in ppm.
    pub calcium_hardness: Limit,
    /// Cyanuric acid in ppm.
    pub cyanuric_acid: Limit,
    /// Total alkalinity in ppm.
    pub alkalinity: Limit,
}

impl Default for SetpointLimits {
    fn default() -> Self {
        Self {
            ph_setpoint: Limit::new(7.0, 7.6),
            orp_setpoint: Limit::new(400.0, 800.0),
            calcium_hardness: Limit::new(25.0, 800.0),
            cyanuric_acid: Limit::new(0.0, 210.0),
            alkalinity: Limit::new(25.0, 800.0),
        }
    }
}

/// A value outside its accepted range.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
#[error("{field} {value} outside allowed range {min}..={max}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Rejected value.
    pub value: f64,
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
}

/// Complete set of values written by a configuration command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigurationValues {
    /// pH setpoint.
    pub ph_setpoint: f64,
    /// ORP setpoint in millivolts.
    pub orp_setpoint: u16,
    /// Raw pH tank level, 0 (dosing disabled) to 7.
    pub ph_tank: u8,
    /// Raw ORP tank level, 0 (dosing disabled) to 7.
    pub orp_tank: u8,
    /// Calcium hardness in ppm.
    pub calcium_hardness: u16,
    /// Cyanuric acid in ppm.
    pub cyanuric_acid: u8,
    /// Total alkalinity in ppm.
    pub alkalinity: u16,
}

impl Default for ConfigurationValues {
    fn default() -> Self {
        Self {
            ph_setpoint: 7.2,
            orp_setpoint: 650,
            ph_tank: TANK_RAW_MAX,
            orp_tank: TANK_RAW_MAX,
            calcium_hardness: 300,
            cyanuric_acid: 30,
            alkalinity: 80,
        }
    }
}

impl ConfigurationValues {
    /// Values currently in effect on the device described by `state`.
    #[must_use]
    pub fn from_state(state: &DeviceState) -> Self {
        Self {
            ph_setpoint: state.ph.setpoint,
            orp_setpoint: round_to_u16(state.orp.setpoint),
            ph_tank: state.ph.tank_raw.min(TANK_RAW_MAX),
            orp_tank: state.orp.tank_raw.min(TANK_RAW_MAX),
            calcium_hardness: state.calcium_hardness,
            cyanuric_acid: state.cyanuric_acid,
            alkalinity: state.alkalinity,
        }
    }

    /// Check every field against `limits`, reporting the first violation.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first field out of range.
    pub fn validate(&self, limits: &SetpointLimits) -> Result<(), ValidationError> {
        let tank = Limit::new(0.0, f64::from(TANK_RAW_MAX));
        PH_SETPOINT_CAPACITY.check("ph_setpoint", self.ph_setpoint)?;
        limits.ph_setpoint.check("ph_setpoint", self.ph_setpoint)?;
        limits
            .orp_setpoint
            .check("orp_setpoint", f64::from(self.orp_setpoint))?;
        tank.check("ph_tank_level", f64::from(self.ph_tank))?;
        tank.check("orp_tank_level", f64::from(self.orp_tank))?;
        limits
            .calcium_hardness
            .check("calcium_hardness", f64::from(self.calcium_hardness))?;
        limits
            .cyanuric_acid
            .check("cyanuric_acid", f64::from(self.cyanuric_acid))?;
        limits
            .alkalinity
            .check("alkalinity", f64::from(self.alkalinity))
    }

    /// Serialise the values into a configuration payload.
    ///
    /// Reserved bytes are zero. Alkalinity straddles reserved byte 11.
    #[must_use]
    pub fn encode_payload(&self) -> [u8; CONFIG_PAYLOAD_LEN] {
        let mut payload = [0u8; CONFIG_PAYLOAD_LEN];
        let ph = round_to_u16(self.ph_setpoint * 100.0);
        payload[PH_SETPOINT..PH_SETPOINT + 2].copy_from_slice(&write_network_u16(ph));
        payload[ORP_SETPOINT..ORP_SETPOINT + 2]
            .copy_from_slice(&write_network_u16(self.orp_setpoint));
        payload[PH_TANK] = self.ph_tank;
        payload[ORP_TANK] = self.orp_tank;
        payload[CALCIUM_HARDNESS..CALCIUM_HARDNESS + 2]
            .copy_from_slice(&write_network_u16(self.calcium_hardness));
        payload[CYANURIC_ACID] = self.cyanuric_acid;
        let [high, low] = write_network_u16(self.alkalinity);
        payload[ALKALINITY_HIGH] = high;
        payload[ALKALINITY_LOW] = low;
        payload
    }

    /// Validate and wrap the values in a frame addressed to `address`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if any field is out of range; no frame
    /// is built in that case.
    pub fn to_frame(&self, address: u8, limits: &SetpointLimits) -> Result<Frame, ValidationError> {
        self.validate(limits)?;
        Ok(Frame::new(
            address,
            CONTROLLER_ADDRESS,
            Action::ConfigurationCommand.code(),
            self.encode_payload().to_vec(),
        ))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "callers pass validated, non-negative values below 65536"
)]
fn round_to_u16(value: f64) -> u16 { value.round() as u16 }

/// Chemical channel addressed by a dosing switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DosingChannel {
    /// Acid feed.
    Ph,
    /// Chlorine feed.
    Orp,
}

/// Working set for one configuration command.
///
/// # Examples
///
/// ```
/// use intellichem::command::{CommandBuilder, DosingChannel, SetpointLimits};
///
/// let frame = CommandBuilder::new(None)
///     .with_ph_setpoint(7.4)
///     .with_dosing(DosingChannel::Orp, false)
///     .build(144, &SetpointLimits::default())
///     .expect("values are in range");
/// assert_eq!(&frame.payload()[..2], &[0x02, 0xE4]);
/// assert_eq!(frame.payload()[5], 0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommandBuilder {
    values: ConfigurationValues,
    ph_tank_restore: u8,
    orp_tank_restore: u8,
}

impl CommandBuilder {
    /// Seed a builder from the last known state, or from defaults when no
    /// status has been decoded yet.
    #[must_use]
    pub fn new(seed: Option<&DeviceState>) -> Self {
        let values = seed.map_or_else(ConfigurationValues::default, ConfigurationValues::from_state);
        Self {
            values,
            ph_tank_restore: restore_level(values.ph_tank),
            orp_tank_restore: restore_level(values.orp_tank),
        }
    }

    /// Set the pH setpoint.
    #[must_use]
    pub fn with_ph_setpoint(mut self, value: f64) -> Self {
        self.values.ph_setpoint = value;
        self
    }

    /// Set the ORP setpoint in millivolts.
    #[must_use]
    pub fn with_orp_setpoint(mut self, value: u16) -> Self {
        self.values.orp_setpoint = value;
        self
    }

    /// Set the raw tank level of a channel.
    #[must_use]
    pub fn with_tank_level(mut self, channel: DosingChannel, raw: u8) -> Self {
        match channel {
            DosingChannel::Ph => self.values.ph_tank = raw,
            DosingChannel::Orp => self.values.orp_tank = raw,
        }
        if raw != 0 {
            *self.restore_slot(channel) = raw;
        }
        self
    }

    /// Enable or disable dosing on a channel.
    ///
    /// Disabling writes a zero tank level. Enabling restores the last nonzero
    /// level seen, or the maximum if none was.
    #[must_use]
    pub fn with_dosing(mut self, channel: DosingChannel, enabled: bool) -> Self {
        let level = if enabled { *self.restore_slot(channel) } else { 0 };
        match channel {
            DosingChannel::Ph => self.values.ph_tank = level,
            DosingChannel::Orp => self.values.orp_tank = level,
        }
        self
    }

    /// Set calcium hardness in ppm.
    #[must_use]
    pub fn with_calcium_hardness(mut self, value: u16) -> Self {
        self.values.calcium_hardness = value;
        self
    }

    /// Set cyanuric acid in ppm.
    #[must_use]
    pub fn with_cyanuric_acid(mut self, value: u8) -> Self {
        self.values.cyanuric_acid = value;
        self
    }

    /// Set total alkalinity in ppm.
    #[must_use]
    pub fn with_alkalinity(mut self, value: u16) -> Self {
        self.values.alkalinity = value;
        self
    }

    /// Current working set.
    #[must_use]
    pub fn values(&self) -> &ConfigurationValues { &self.values }

    /// Validate the working set and build the configuration frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for the first out-of-range field.
    pub fn build(&self, address: u8, limits: &SetpointLimits) -> Result<Frame, ValidationError> {
        self.values.to_frame(address, limits)
    }

    fn restore_slot(&mut self, channel: DosingChannel) -> &mut u8 {
        match channel {
            DosingChannel::Ph => &mut self.ph_tank_restore,
            DosingChannel::Orp => &mut self.orp_tank_restore,
        }
    }
}

fn restore_level(raw: u8) -> u8 { if raw == 0 { TANK_RAW_MAX } else { raw } }

#[cfg(test)]
mod tests;
