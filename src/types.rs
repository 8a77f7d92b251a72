use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Round to the 2-decimal precision cached state is held at.
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Decode the hub's `TEMPERATURE_FORMAT` field: boolean `false` means
    /// Celsius, as does the string `"C"` in any case; anything else is
    /// Fahrenheit.
    pub fn from_format_field(value: &Value) -> Self {
        match value {
            Value::Bool(false) => TemperatureUnit::Celsius,
            Value::String(s) if s.eq_ignore_ascii_case("c") => TemperatureUnit::Celsius,
            _ => TemperatureUnit::Fahrenheit,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "\u{00b0}C",
            TemperatureUnit::Fahrenheit => "\u{00b0}F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operating mode, derived from the hub's `COOLING_ENABLED` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    #[default]
    Heat,
    Cool,
}

impl HvacMode {
    pub fn from_cooling_enabled(cooling_enabled: bool) -> Self {
        if cooling_enabled {
            HvacMode::Cool
        } else {
            HvacMode::Heat
        }
    }
}

/// Current activity, derived from the hub's `HEATING`/`COOLING` flags.
/// Idle iff neither flag is set; heating takes precedence when both are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacAction {
    #[default]
    Idle,
    Heating,
    Cooling,
}

impl HvacAction {
    pub fn from_flags(heating: bool, cooling: bool) -> Self {
        if heating {
            HvacAction::Heating
        } else if cooling {
            HvacAction::Cooling
        } else {
            HvacAction::Idle
        }
    }
}

/// One decoded entry from the hub's `INFO` device list.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub name: String,
    pub device_type: i64,
    pub unit: TemperatureUnit,
    pub away: bool,
    pub current_temperature: f64,
    pub set_temperature: f64,
    pub humidity: f64,
    pub temp_hold: bool,
    pub hold_temperature: f64,
    pub hold_time: String,
    pub standby: bool,
    pub cooling_enabled: bool,
    pub heating: bool,
    pub cooling: bool,
    /// Whether `STAT_MODE` marks this stat as a time clock.
    pub timeclock: bool,
}

impl DeviceRecord {
    /// Accessories (wireless plugs) report this type and are not thermostats.
    pub const ACCESSORY_DEVICE_TYPE: i64 = 6;

    pub fn is_thermostat(&self) -> bool {
        self.device_type != Self::ACCESSORY_DEVICE_TYPE
    }
}

/// Per-device tuning parameters from the `ENGINEERS_DATA` query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineeringRecord {
    pub frost_temperature: f64,
    pub switching_differential: f64,
    pub output_delay: f64,
}

/// Cached snapshot of one thermostat, owned and mutated solely by its
/// [`DeviceSession`](crate::DeviceSession). Numeric fields are rounded to
/// 2 decimal places at assignment and only advance as a group after a
/// successful decode; a failed exchange leaves the previous snapshot intact.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceState {
    pub unit: TemperatureUnit,
    pub away: bool,
    pub current_temperature: Option<f64>,
    pub current_humidity: Option<f64>,
    pub target_temperature: Option<f64>,
    pub hvac_mode: HvacMode,
    pub hvac_action: HvacAction,
    pub on_hold: bool,
    pub hold_temperature: Option<f64>,
    /// Remaining hold duration as reported or requested, `"H:MM"`.
    pub hold_time: Option<String>,
    pub on_standby: bool,
    pub frost_temperature: Option<f64>,
    pub switching_differential: Option<f64>,
    pub output_delay: Option<f64>,
}

/// Discovery result for one hub-registered thermostat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub unit: TemperatureUnit,
    pub away: bool,
    /// Stats configured in timer mode; embedders may want to skip these.
    pub timeclock: bool,
}
