//! Device state decoded from a status response.
//!
//! A [`DeviceState`] is produced fresh by every successful decode and is not
//! mutated afterwards. The publishing layer keeps the most recent one to
//! annotate communication loss and to seed partial configuration commands.

use std::fmt;

/// Per-channel dosing state reported by the controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DosingStatus {
    /// Chemical is being fed.
    Dosing,
    /// Readings are being watched; nothing is fed.
    #[default]
    Monitoring,
    /// Feed paused while water mixes.
    Mixing,
}

impl DosingStatus {
    /// Map a two-bit status field, clamping values above 2 to [`Self::Mixing`].
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Dosing,
            1 => Self::Monitoring,
            _ => Self::Mixing,
        }
    }

    /// Two-bit wire code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Dosing => 0,
            Self::Monitoring => 1,
            Self::Mixing => 2,
        }
    }
}

impl fmt::Display for DosingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dosing => "Dosing",
            Self::Monitoring => "Monitoring",
            Self::Mixing => "Mixing",
        })
    }
}

/// Water balance verdict derived by the controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaterChemistry {
    /// Balanced water.
    #[default]
    Ok,
    /// Water tends to dissolve surfaces.
    Corrosive,
    /// Water tends to deposit scale.
    Scaling,
}

impl WaterChemistry {
    /// Map the wire byte, clamping values above 2 to [`Self::Scaling`].
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Ok,
            1 => Self::Corrosive,
            _ => Self::Scaling,
        }
    }

    /// Wire code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Corrosive => 1,
            Self::Scaling => 2,
        }
    }
}

impl fmt::Display for WaterChemistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "Ok",
            Self::Corrosive => "Corrosive",
            Self::Scaling => "Scaling",
        })
    }
}

/// Readings and dosing state of one chemical channel (pH or ORP).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChemicalChannel {
    /// Measured value: pH units or millivolts.
    pub level: f64,
    /// Target value in the same unit as `level`.
    pub setpoint: f64,
    /// Seconds of the current dose.
    pub dose_time: u16,
    /// Millilitres of the current dose.
    pub dose_volume: u16,
    /// Decoded tank level, 0 (empty) to 6 (full).
    pub tank_level: u8,
    /// Tank level byte as sent on the wire, 0 to 7.
    pub tank_raw: u8,
    /// Doser type subfield; zero means no doser fitted.
    pub doser_type: u8,
    /// Reported dosing state.
    pub dosing_status: DosingStatus,
}

impl ChemicalChannel {
    /// Highest decoded tank level.
    pub const TANK_LEVEL_MAX: u8 = 6;

    /// Decode a raw tank byte: 0 and 1 both read as empty, and bytes above 7
    /// read as full.
    #[must_use]
    pub fn tank_level_from_raw(raw: u8) -> u8 { raw.saturating_sub(1).min(Self::TANK_LEVEL_MAX) }

    /// `true` only while the channel reports dosing and has a doser fitted.
    #[must_use]
    pub fn is_dosing(&self) -> bool {
        self.dosing_status == DosingStatus::Dosing && self.doser_type != 0
    }

    /// Tank level as a percentage of full.
    #[must_use]
    pub fn tank_level_percent(&self) -> f64 {
        f64::from(self.tank_level) / f64::from(Self::TANK_LEVEL_MAX) * 100.0
    }

    /// `false` when the raw tank byte is zero, which disables dosing.
    #[must_use]
    pub fn dosing_enabled(&self) -> bool { self.tank_raw != 0 }
}

/// Alarm flags.
#[expect(
    clippy::struct_excessive_bools,
    reason = "each alarm is an independent bit on the wire"
)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Alarms {
    /// No flow past the probes.
    pub flow: bool,
    /// pH chemical tank empty.
    pub ph_tank_empty: bool,
    /// ORP chemical tank empty.
    pub orp_tank_empty: bool,
    /// Probe fault.
    pub probe_fault: bool,
    /// Device stopped answering polls. Never set by the decoder.
    pub comms: bool,
}

impl Alarms {
    /// `true` if any alarm is raised.
    #[must_use]
    pub fn any_active(&self) -> bool {
        self.flow || self.ph_tank_empty || self.orp_tank_empty || self.probe_fault || self.comms
    }
}

/// Warning flags and the water chemistry verdict.
#[expect(
    clippy::struct_excessive_bools,
    reason = "each warning is an independent bit on the wire"
)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Warnings {
    /// pH dosing locked out.
    pub ph_lockout: bool,
    /// pH daily dosing limit reached.
    pub ph_daily_limit: bool,
    /// ORP daily dosing limit reached.
    pub orp_daily_limit: bool,
    /// Device reports an invalid setup.
    pub invalid_setup: bool,
    /// Device cannot reach the chlorinator.
    pub chlorinator_comm_error: bool,
    /// Water balance verdict.
    pub water_chemistry: WaterChemistry,
}

impl Warnings {
    /// `true` if any warning flag is raised or the water is out of balance.
    #[must_use]
    pub fn any_active(&self) -> bool {
        self.ph_lockout
            || self.ph_daily_limit
            || self.orp_daily_limit
            || self.invalid_setup
            || self.chlorinator_comm_error
            || self.water_chemistry != WaterChemistry::Ok
    }
}

/// One fully decoded status response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceState {
    /// Bus address of the responding device.
    pub address: u8,
    /// pH channel.
    pub ph: ChemicalChannel,
    /// ORP channel.
    pub orp: ChemicalChannel,
    /// Langelier saturation index.
    pub lsi: f64,
    /// Calcium hardness in ppm.
    pub calcium_hardness: u16,
    /// Cyanuric acid in ppm.
    pub cyanuric_acid: u8,
    /// Total alkalinity in ppm.
    pub alkalinity: u16,
    /// Salt level in ppm.
    pub salt_level: u16,
    /// Water temperature in the controller's configured unit.
    pub temperature: u8,
    /// Firmware version, `major.minor` with a three-digit minor.
    pub firmware: String,
    /// Alarm flags.
    pub alarms: Alarms,
    /// Warning flags.
    pub warnings: Warnings,
    /// Inverse of the flow alarm.
    pub flow_detected: bool,
    /// Device reports it lost contact with its own peripherals.
    pub comms_lost: bool,
}

impl DeviceState {
    /// Copy of this state annotated as unreachable.
    #[must_use]
    pub fn with_comms_lost(mut self) -> Self {
        self.comms_lost = true;
        self.alarms.comms = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, DosingStatus::Dosing, "Dosing")]
    #[case(1, DosingStatus::Monitoring, "Monitoring")]
    #[case(2, DosingStatus::Mixing, "Mixing")]
    #[case(3, DosingStatus::Mixing, "Mixing")]
    fn dosing_status_clamps_and_displays(
        #[case] bits: u8,
        #[case] expected: DosingStatus,
        #[case] text: &str,
    ) {
        let status = DosingStatus::from_bits(bits);
        assert_eq!(status, expected);
        assert_eq!(status.to_string(), text);
    }

    #[rstest]
    #[case(0, "Ok")]
    #[case(1, "Corrosive")]
    #[case(2, "Scaling")]
    #[case(9, "Scaling")]
    fn water_chemistry_clamps_and_displays(#[case] byte: u8, #[case] text: &str) {
        assert_eq!(WaterChemistry::from_byte(byte).to_string(), text);
    }

    #[rstest]
    #[case::none(0, 0)]
    #[case::empty(1, 0)]
    #[case::half(4, 3)]
    #[case::full(7, 6)]
    #[case::out_of_range(9, 6)]
    fn tank_level_decodes_raw_byte(#[case] raw: u8, #[case] level: u8) {
        assert_eq!(ChemicalChannel::tank_level_from_raw(raw), level);
    }

    #[test]
    fn dosing_requires_fitted_doser() {
        let mut channel = ChemicalChannel {
            dosing_status: DosingStatus::Dosing,
            ..ChemicalChannel::default()
        };
        assert!(!channel.is_dosing());
        channel.doser_type = 1;
        assert!(channel.is_dosing());
        channel.dosing_status = DosingStatus::Mixing;
        assert!(!channel.is_dosing());
    }

    #[test]
    fn water_out_of_balance_counts_as_warning() {
        let warnings = Warnings {
            water_chemistry: WaterChemistry::Corrosive,
            ..Warnings::default()
        };
        assert!(warnings.any_active());
        assert!(!Warnings::default().any_active());
    }

    #[test]
    fn comms_annotation_raises_alarm() {
        let state = DeviceState::default().with_comms_lost();
        assert!(state.comms_lost);
        assert!(state.alarms.comms);
        assert!(state.alarms.any_active());
    }

    #[test]
    fn tank_percent_scales_to_six() {
        let channel = ChemicalChannel {
            tank_level: 3,
            ..ChemicalChannel::default()
        };
        assert!((channel.tank_level_percent() - 50.0).abs() < f64::EPSILON);
    }
}
