use serde_json::{json, Value};

use crate::types::{DeviceRecord, EngineeringRecord, TemperatureUnit};
use crate::{Error, Result};

/// Client identifier embedded in HOLD payloads so the hub can attribute the
/// override.
pub const HOLD_CLIENT_ID: &str = "neostat";

/// Acknowledgement literals the hub firmware answers commands with. These are
/// free-text and matched exactly; [`interpret_acknowledgement`] is the only
/// place the comparison happens.
pub const ACK_HOLD: &str = "temperature on hold";
pub const ACK_FROST_ON: &str = "frost on";
pub const ACK_FROST_OFF: &str = "frost off";
pub const ACK_SET_FROST: &str = "temperature was set";

pub fn info_query() -> Value {
    json!({ "INFO": 0 })
}

pub fn engineers_query() -> Value {
    json!({ "ENGINEERS_DATA": 0 })
}

pub fn set_temp_command(temp: f64, device: &str) -> Value {
    json!({ "SET_TEMP": [temp, device] })
}

pub fn hold_command(temp: f64, hours: u8, minutes: u8, device: &str) -> Value {
    json!({
        "HOLD": [
            { "temp": temp, "id": HOLD_CLIENT_ID, "hours": hours, "minutes": minutes },
            device
        ]
    })
}

pub fn frost_on_command(device: &str) -> Value {
    json!({ "FROST_ON": device })
}

pub fn frost_off_command(device: &str) -> Value {
    json!({ "FROST_OFF": device })
}

pub fn set_frost_command(temp: f64, device: &str) -> Value {
    json!({ "SET_FROST": [temp, device] })
}

/// How a command acknowledgement reads against the expected literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Exact match; the optimistic state update may be applied.
    Confirmed,
    /// A `result` string arrived but said something else.
    Mismatch(String),
    /// The response carried no `result` string at all.
    NotAnAck,
}

/// Compare a command response against the expected acknowledgement text.
pub fn interpret_acknowledgement(expected: &str, payload: &Value) -> AckOutcome {
    match payload.get("result").and_then(|v| v.as_str()) {
        Some(text) if text == expected => AckOutcome::Confirmed,
        Some(text) => AckOutcome::Mismatch(text.to_string()),
        None => AckOutcome::NotAnAck,
    }
}

/// Decode the device list from an `INFO` response. Missing or mistyped keys
/// are a malformed response, distinct from the hub being unreachable.
pub fn parse_info_devices(payload: &Value) -> Result<Vec<DeviceRecord>> {
    let devices = match payload.get("devices") {
        Some(Value::Array(devices)) => devices,
        _ => {
            return Err(Error::Protocol(
                "INFO response missing devices list".to_string(),
            ));
        }
    };
    devices.iter().map(parse_device_entry).collect()
}

fn parse_device_entry(entry: &Value) -> Result<DeviceRecord> {
    let format = entry
        .get("TEMPERATURE_FORMAT")
        .ok_or_else(|| missing_key("TEMPERATURE_FORMAT"))?;
    Ok(DeviceRecord {
        name: str_field(entry, "device")?,
        device_type: int_field(entry, "DEVICE_TYPE")?,
        unit: TemperatureUnit::from_format_field(format),
        away: bool_field(entry, "AWAY")?,
        current_temperature: num_field(entry, "CURRENT_TEMPERATURE")?,
        set_temperature: num_field(entry, "CURRENT_SET_TEMPERATURE")?,
        humidity: num_field(entry, "HUMIDITY")?,
        temp_hold: bool_field(entry, "TEMP_HOLD")?,
        hold_temperature: num_field(entry, "HOLD_TEMPERATURE")?,
        hold_time: str_field(entry, "HOLD_TIME")?,
        standby: bool_field(entry, "STANDBY")?,
        cooling_enabled: bool_field(entry, "COOLING_ENABLED")?,
        heating: bool_field(entry, "HEATING")?,
        cooling: bool_field(entry, "COOLING")?,
        timeclock: entry
            .get("STAT_MODE")
            .and_then(|v| v.as_object())
            .is_some_and(|m| m.contains_key("TIMECLOCK")),
    })
}

/// Pull one device's tuning block out of an `ENGINEERS_DATA` response. The
/// map is indexed by the caller's own device name; absence is tolerated.
pub fn parse_engineers_entry(payload: &Value, device: &str) -> Result<Option<EngineeringRecord>> {
    let entry = match payload.get(device) {
        Some(entry) => entry,
        None => return Ok(None),
    };
    Ok(Some(EngineeringRecord {
        frost_temperature: num_field(entry, "FROST TEMPERATURE")?,
        switching_differential: num_field(entry, "SWITCHING DIFFERENTIAL")?,
        output_delay: num_field(entry, "OUTPUT DELAY")?,
    }))
}

fn missing_key(key: &str) -> Error {
    Error::Protocol(format!("response entry missing key {key:?}"))
}

fn mistyped_key(key: &str, value: &Value) -> Error {
    Error::Protocol(format!("unexpected value {value} for key {key:?}"))
}

/// Numeric field; the hub emits both JSON numbers and numeric strings.
fn num_field(entry: &Value, key: &str) -> Result<f64> {
    let value = entry.get(key).ok_or_else(|| missing_key(key))?;
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| mistyped_key(key, value)),
        Value::String(s) => s.trim().parse().map_err(|_| mistyped_key(key, value)),
        _ => Err(mistyped_key(key, value)),
    }
}

fn int_field(entry: &Value, key: &str) -> Result<i64> {
    let value = entry.get(key).ok_or_else(|| missing_key(key))?;
    value.as_i64().ok_or_else(|| mistyped_key(key, value))
}

fn bool_field(entry: &Value, key: &str) -> Result<bool> {
    let value = entry.get(key).ok_or_else(|| missing_key(key))?;
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
        _ => Err(mistyped_key(key, value)),
    }
}

fn str_field(entry: &Value, key: &str) -> Result<String> {
    let value = entry.get(key).ok_or_else(|| missing_key(key))?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| mistyped_key(key, value))
}
