//! Home Assistant discovery documents.
//!
//! Entities are described by static tables; [`Discovery::documents`] joins
//! them with the configured prefixes, device address and setpoint limits.

use serde_json::{Map, Value, json};

use super::topics::Topics;
use crate::command::{Limit, SetpointLimits};

/// One retained discovery message.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryDocument {
    /// Topic under the discovery prefix.
    pub topic: String,
    /// Entity configuration.
    pub payload: Value,
}

struct Sensor {
    id: &'static str,
    name: &'static str,
    state: &'static str,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
    state_class: Option<&'static str>,
    icon: Option<&'static str>,
}

const fn sensor(id: &'static str, name: &'static str, state: &'static str) -> Sensor {
    Sensor {
        id,
        name,
        state,
        unit: None,
        device_class: None,
        state_class: None,
        icon: None,
    }
}

impl Sensor {
    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    const fn class(mut self, device_class: &'static str) -> Self {
        self.device_class = Some(device_class);
        self
    }

    const fn measured(mut self) -> Self {
        self.state_class = Some("measurement");
        self
    }

    const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }
}

const SENSORS: [Sensor; 18] = [
    sensor("ph_level", "pH Level", "ph/level").unit("pH").measured().icon("mdi:ph"),
    sensor("ph_setpoint", "pH Setpoint", "ph/setpoint").unit("pH").icon("mdi:target"),
    sensor("ph_tank_level", "pH Tank Level", "ph/tank_level_percent")
        .unit("%")
        .icon("mdi:car-coolant-level"),
    sensor("ph_dose_time", "pH Dose Time", "ph/dose_time")
        .unit("s")
        .class("duration")
        .icon("mdi:timer"),
    sensor("ph_dose_volume", "pH Dose Volume", "ph/dose_volume")
        .unit("mL")
        .icon("mdi:beaker"),
    sensor("orp_level", "ORP Level", "orp/level")
        .unit("mV")
        .class("voltage")
        .measured()
        .icon("mdi:flash"),
    sensor("orp_setpoint", "ORP Setpoint", "orp/setpoint")
        .unit("mV")
        .class("voltage")
        .icon("mdi:target"),
    sensor("orp_tank_level", "ORP Tank Level", "orp/tank_level_percent")
        .unit("%")
        .icon("mdi:car-coolant-level"),
    sensor("orp_dose_time", "ORP Dose Time", "orp/dose_time")
        .unit("s")
        .class("duration")
        .icon("mdi:timer"),
    sensor("orp_dose_volume", "ORP Dose Volume", "orp/dose_volume")
        .unit("mL")
        .icon("mdi:beaker"),
    sensor("temperature", "Temperature", "temperature")
        .unit("°F")
        .class("temperature")
        .measured(),
    sensor("lsi", "Saturation Index (LSI)", "lsi")
        .measured()
        .icon("mdi:water-percent"),
    sensor("calcium_hardness", "Calcium Hardness", "calcium_hardness")
        .unit("ppm")
        .measured()
        .icon("mdi:flask"),
    sensor("cyanuric_acid", "Cyanuric Acid", "cyanuric_acid")
        .unit("ppm")
        .measured()
        .icon("mdi:flask"),
    sensor("alkalinity", "Alkalinity", "alkalinity")
        .unit("ppm")
        .measured()
        .icon("mdi:flask"),
    sensor("salt_level", "Salt Level", "salt_level")
        .unit("ppm")
        .measured()
        .icon("mdi:shaker"),
    sensor("firmware", "Firmware Version", "firmware").icon("mdi:chip"),
    sensor("water_chemistry", "Water Chemistry", "warnings/water_chemistry")
        .icon("mdi:water-alert"),
];

const STATUS_SENSORS: [(&str, &str, &str); 2] = [
    ("ph_dosing_status", "pH Dosing Status", "ph/dosing_status"),
    ("orp_dosing_status", "ORP Dosing Status", "orp/dosing_status"),
];

/// Binary sensors: id, name, state path, device class, icon.
const BINARY_SENSORS: [(&str, &str, &str, &str, Option<&str>); 11] = [
    ("flow_detected", "Flow Detected", "flow_detected", "running", Some("mdi:water")),
    ("flow_alarm", "Flow Alarm", "alarms/flow", "problem", None),
    (
        "ph_tank_empty",
        "pH Tank Empty",
        "alarms/ph_tank_empty",
        "problem",
        Some("mdi:car-coolant-level"),
    ),
    (
        "orp_tank_empty",
        "ORP Tank Empty",
        "alarms/orp_tank_empty",
        "problem",
        Some("mdi:car-coolant-level"),
    ),
    ("probe_fault", "Probe Fault", "alarms/probe_fault", "problem", None),
    ("comms_lost", "Communication Lost", "comms_lost", "connectivity", None),
    ("ph_lockout", "pH Lockout", "warnings/ph_lockout", "problem", None),
    ("ph_daily_limit", "pH Daily Limit", "warnings/ph_daily_limit", "problem", None),
    ("orp_daily_limit", "ORP Daily Limit", "warnings/orp_daily_limit", "problem", None),
    ("ph_dosing", "pH Dosing", "ph/is_dosing", "running", Some("mdi:water-pump")),
    ("orp_dosing", "ORP Dosing", "orp/is_dosing", "running", Some("mdi:water-pump")),
];

/// Which limit bounds a number entity.
#[derive(Clone, Copy)]
enum Bound {
    Ph,
    Orp,
    Calcium,
    Cyanuric,
    Alkalinity,
}

struct Control {
    id: &'static str,
    name: &'static str,
    command: &'static str,
    state: &'static str,
    bound: Bound,
    step: f64,
    unit: &'static str,
    icon: &'static str,
    mode: &'static str,
}

const CONTROLS: [Control; 5] = [
    Control {
        id: "ph_setpoint_control",
        name: "pH Setpoint Control",
        command: "ph_setpoint",
        state: "ph/setpoint",
        bound: Bound::Ph,
        step: 0.1,
        unit: "pH",
        icon: "mdi:ph",
        mode: "slider",
    },
    Control {
        id: "orp_setpoint_control",
        name: "ORP Setpoint Control",
        command: "orp_setpoint",
        state: "orp/setpoint",
        bound: Bound::Orp,
        step: 10.0,
        unit: "mV",
        icon: "mdi:flash",
        mode: "slider",
    },
    Control {
        id: "calcium_hardness_control",
        name: "Calcium Hardness Setting",
        command: "calcium_hardness",
        state: "calcium_hardness",
        bound: Bound::Calcium,
        step: 25.0,
        unit: "ppm",
        icon: "mdi:flask",
        mode: "box",
    },
    Control {
        id: "cyanuric_acid_control",
        name: "Cyanuric Acid Setting",
        command: "cyanuric_acid",
        state: "cyanuric_acid",
        bound: Bound::Cyanuric,
        step: 10.0,
        unit: "ppm",
        icon: "mdi:flask",
        mode: "box",
    },
    Control {
        id: "alkalinity_control",
        name: "Alkalinity Setting",
        command: "alkalinity",
        state: "alkalinity",
        bound: Bound::Alkalinity,
        step: 10.0,
        unit: "ppm",
        icon: "mdi:flask",
        mode: "box",
    },
];

/// Dosing switches: id, name, command, state path.
const SWITCHES: [(&str, &str, &str, &str); 2] = [
    ("ph_dosing_enable", "pH Dosing Enable", "ph_dosing", "ph/dosing_enabled"),
    ("orp_dosing_enable", "ORP Dosing Enable", "orp_dosing", "orp/dosing_enabled"),
];

/// Builder for the discovery documents of one device.
///
/// # Examples
///
/// ```
/// use intellichem::{command::SetpointLimits, mqtt::{Discovery, Topics}};
///
/// let discovery = Discovery::new("homeassistant", Topics::new("pool"), 144)
///     .with_control(true, SetpointLimits::default());
/// let docs = discovery.documents();
/// assert!(docs.iter().any(|d| d.topic == "homeassistant/number/intellichem/ph_setpoint_control/config"));
/// ```
#[derive(Clone, Debug)]
pub struct Discovery {
    prefix: String,
    topics: Topics,
    address: u8,
    control_enabled: bool,
    limits: SetpointLimits,
}

impl Discovery {
    /// Discovery for the device at `address`, without control entities.
    #[must_use]
    pub fn new(prefix: &str, topics: Topics, address: u8) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_owned(),
            topics,
            address,
            control_enabled: false,
            limits: SetpointLimits::default(),
        }
    }

    /// Include number and switch entities bounded by `limits` when
    /// `enabled` is set.
    #[must_use]
    pub fn with_control(mut self, enabled: bool, limits: SetpointLimits) -> Self {
        self.control_enabled = enabled;
        self.limits = limits;
        self
    }

    /// Every discovery document for the device.
    #[must_use]
    pub fn documents(&self) -> Vec<DiscoveryDocument> {
        let mut docs = Vec::new();
        for entry in &SENSORS {
            let mut config = self.base(entry.id, entry.name, entry.state);
            insert(&mut config, "unit_of_measurement", entry.unit);
            insert(&mut config, "device_class", entry.device_class);
            insert(&mut config, "state_class", entry.state_class);
            insert(&mut config, "icon", entry.icon);
            docs.push(self.document("sensor", entry.id, config));
        }
        for (id, name, state) in STATUS_SENSORS {
            let mut config = self.base(id, name, state);
            insert(&mut config, "icon", Some("mdi:information"));
            docs.push(self.document("sensor", id, config));
        }
        for (id, name, state, class, icon) in BINARY_SENSORS {
            let mut config = self.base(id, name, state);
            config.insert("payload_on".into(), json!("true"));
            config.insert("payload_off".into(), json!("false"));
            config.insert("device_class".into(), json!(class));
            insert(&mut config, "icon", icon);
            docs.push(self.document("binary_sensor", id, config));
        }
        if self.control_enabled {
            for control in &CONTROLS {
                let limit = self.limit(control.bound);
                let mut config = self.base(control.id, control.name, control.state);
                config.insert("command_topic".into(), json!(self.topics.command(control.command)));
                config.insert("min".into(), json!(limit.min));
                config.insert("max".into(), json!(limit.max));
                config.insert("step".into(), json!(control.step));
                config.insert("unit_of_measurement".into(), json!(control.unit));
                config.insert("icon".into(), json!(control.icon));
                config.insert("mode".into(), json!(control.mode));
                docs.push(self.document("number", control.id, config));
            }
            for (id, name, command, state) in SWITCHES {
                let mut config = self.base(id, name, state);
                config.insert("command_topic".into(), json!(self.topics.command(command)));
                config.insert("payload_on".into(), json!("ON"));
                config.insert("payload_off".into(), json!("OFF"));
                config.insert("state_on".into(), json!("true"));
                config.insert("state_off".into(), json!("false"));
                config.insert("icon".into(), json!("mdi:flask-outline"));
                docs.push(self.document("switch", id, config));
            }
        }
        docs
    }

    fn limit(&self, bound: Bound) -> Limit {
        match bound {
            Bound::Ph => self.limits.ph_setpoint,
            Bound::Orp => self.limits.orp_setpoint,
            Bound::Calcium => self.limits.calcium_hardness,
            Bound::Cyanuric => self.limits.cyanuric_acid,
            Bound::Alkalinity => self.limits.alkalinity,
        }
    }

    fn base(&self, id: &str, name: &str, state: &str) -> Map<String, Value> {
        let mut config = Map::new();
        config.insert("name".into(), json!(name));
        config.insert(
            "unique_id".into(),
            json!(format!("intellichem_{}_{id}", self.address)),
        );
        config.insert("state_topic".into(), json!(self.topics.state(state)));
        config.insert("availability_topic".into(), json!(self.topics.availability()));
        config.insert("payload_available".into(), json!("online"));
        config.insert("payload_not_available".into(), json!("offline"));
        config.insert(
            "device".into(),
            json!({
                "identifiers": [format!("intellichem_{}", self.address)],
                "name": "IntelliChem",
                "manufacturer": "Pentair",
                "model": "IntelliChem",
                "suggested_area": "Pool",
            }),
        );
        config
    }

    fn document(&self, component: &str, id: &str, config: Map<String, Value>) -> DiscoveryDocument {
        DiscoveryDocument {
            topic: format!("{}/{component}/intellichem/{id}/config", self.prefix),
            payload: Value::Object(config),
        }
    }
}

fn insert(config: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        config.insert(key.to_owned(), json!(value));
    }
}
