use serde_json::Value;
use tracing::debug;

use crate::logger::MessageLogger;
use crate::protocol::{self, AckOutcome};
use crate::transport::{self, HubTarget, Reply};
use crate::types::{
    round2, DeviceDescriptor, DeviceRecord, DeviceState, HvacAction, HvacMode,
};
use crate::{Error, Result};

/// Query the hub for its device list, excluding non-thermostat accessories.
/// Stats configured as time clocks are reported with `timeclock` set so the
/// embedder can filter them if it wants.
pub async fn discover(target: &HubTarget) -> Result<Vec<DeviceDescriptor>> {
    let query = protocol::info_query();
    let payload = match transport::exchange(target, Some(&query)).await? {
        Reply::Payload(payload) => payload,
        _ => return Err(Error::Offline),
    };
    let descriptors: Vec<DeviceDescriptor> = protocol::parse_info_devices(&payload)?
        .iter()
        .filter(|d| d.is_thermostat())
        .map(|d| DeviceDescriptor {
            name: d.name.clone(),
            unit: d.unit,
            away: d.away,
            timeclock: d.timeclock,
        })
        .collect();
    debug!(target = %target, count = descriptors.len(), "discovered thermostats");
    Ok(descriptors)
}

pub struct DeviceSessionBuilder {
    target: HubTarget,
    name: String,
    log_path: Option<String>,
}

impl DeviceSessionBuilder {
    pub fn new(target: HubTarget, name: impl Into<String>) -> Self {
        Self {
            target,
            name: name.into(),
            log_path: None,
        }
    }

    /// Append an NDJSON transcript of every wire exchange to `path`.
    pub fn message_log(mut self, path: impl Into<String>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Construct the session and populate it with an initial refresh. An
    /// unreachable hub leaves the snapshot at its defaults; a malformed
    /// response is an error.
    pub async fn build(self) -> Result<DeviceSession> {
        let logger = match self.log_path {
            Some(path) => Some(MessageLogger::new(&path)?),
            None => None,
        };
        let mut session = DeviceSession {
            target: self.target,
            name: self.name,
            state: DeviceState::default(),
            logger,
        };
        session.refresh().await?;
        Ok(session)
    }
}

/// Owns one thermostat's identity and cached state, translating domain
/// operations into hub exchanges. Every operation opens and closes its own
/// connection; a hub that fails to answer simply leaves the previous
/// snapshot in place.
pub struct DeviceSession {
    target: HubTarget,
    name: String,
    state: DeviceState,
    logger: Option<MessageLogger>,
}

impl DeviceSession {
    pub fn builder(target: HubTarget, name: impl Into<String>) -> DeviceSessionBuilder {
        DeviceSessionBuilder::new(target, name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &HubTarget {
        &self.target
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Re-read the authoritative snapshot: `INFO` then `ENGINEERS_DATA`.
    /// Returns whether the INFO portion of the snapshot advanced. A missing
    /// device entry is a logged no-op; engineering data is applied
    /// independently of the INFO outcome.
    pub async fn refresh(&mut self) -> Result<bool> {
        let info = self.command("INFO", &protocol::info_query()).await?;
        let engineers = self
            .command("ENGINEERS_DATA", &protocol::engineers_query())
            .await?;

        let mut updated = false;
        if let Some(payload) = info {
            let devices = protocol::parse_info_devices(&payload)?;
            match devices.iter().find(|d| d.name == self.name) {
                Some(record) => {
                    self.apply_info(record);
                    updated = true;
                }
                None => debug!(device = %self.name, "device absent from INFO response"),
            }
        }

        if let Some(payload) = engineers
            && let Some(record) = protocol::parse_engineers_entry(&payload, &self.name)?
        {
            self.state.frost_temperature = Some(round2(record.frost_temperature));
            self.state.switching_differential = Some(round2(record.switching_differential));
            self.state.output_delay = Some(round2(record.output_delay));
        }

        Ok(updated)
    }

    /// Send a new setpoint. The hub's acknowledgement for `SET_TEMP` carries
    /// no state this layer acts on; callers refresh to observe the accepted
    /// value.
    pub async fn set_target_temperature(&mut self, temp: f64) -> Result<()> {
        let cmd = protocol::set_temp_command(temp, &self.name);
        if let Some(reply) = self.command("SET_TEMP", &cmd).await? {
            debug!(device = %self.name, reply = %reply, "set_temp reply");
        }
        Ok(())
    }

    /// Override the setpoint to `temp` for the given duration. A zero
    /// duration cancels any hold and reconciles with a refresh.
    pub async fn hold(&mut self, temp: f64, hours: u8, minutes: u8) -> Result<()> {
        let cmd = protocol::hold_command(temp, hours, minutes, &self.name);
        let Some(reply) = self.command("HOLD", &cmd).await? else {
            return Ok(());
        };

        match protocol::interpret_acknowledgement(protocol::ACK_HOLD, &reply) {
            AckOutcome::Confirmed => {
                if hours == 0 && minutes == 0 {
                    self.state.on_hold = false;
                    self.state.hold_time = Some("0:00".to_string());
                } else {
                    self.state.on_hold = true;
                    self.state.hold_time = Some(format!("{hours}:{minutes:02}"));
                    self.state.target_temperature = Some(round2(temp));
                }
            }
            outcome => debug!(device = %self.name, ?outcome, "hold not confirmed"),
        }
        // Fire-and-forget bookkeeping: recorded even on an ambiguous reply.
        self.state.hold_temperature = Some(round2(temp));

        if hours == 0 && minutes == 0 {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Cancel an active hold via a zero-duration `HOLD` at the last known
    /// hold temperature, then reconcile with the authoritative snapshot.
    pub async fn cancel_hold(&mut self) -> Result<()> {
        // The temp value is irrelevant to a zero-duration hold.
        let temp = self.state.hold_temperature.unwrap_or_default();
        let cmd = protocol::hold_command(temp, 0, 0, &self.name);
        let Some(reply) = self.command("HOLD", &cmd).await? else {
            return Ok(());
        };

        match protocol::interpret_acknowledgement(protocol::ACK_HOLD, &reply) {
            AckOutcome::Confirmed => {
                self.state.on_hold = false;
                self.state.hold_time = Some("0:00".to_string());
            }
            outcome => debug!(device = %self.name, ?outcome, "cancel_hold not confirmed"),
        }
        self.refresh().await?;
        Ok(())
    }

    /// Put the stat into frost protection. On a confirmed acknowledgement
    /// the setpoint is optimistically moved to the known frost temperature;
    /// anything else falls back to a refresh.
    pub async fn activate_frost(&mut self) -> Result<()> {
        let cmd = protocol::frost_on_command(&self.name);
        let Some(reply) = self.command("FROST_ON", &cmd).await? else {
            return Ok(());
        };

        match protocol::interpret_acknowledgement(protocol::ACK_FROST_ON, &reply) {
            AckOutcome::Confirmed => {
                self.state.on_standby = true;
                if let Some(frost) = self.state.frost_temperature {
                    self.state.target_temperature = Some(frost);
                }
            }
            outcome => {
                debug!(device = %self.name, ?outcome, "activate_frost not confirmed");
                self.refresh().await?;
            }
        }
        Ok(())
    }

    /// Take the stat out of frost protection, then reconcile with a refresh.
    pub async fn cancel_frost(&mut self) -> Result<()> {
        let cmd = protocol::frost_off_command(&self.name);
        let Some(reply) = self.command("FROST_OFF", &cmd).await? else {
            return Ok(());
        };

        match protocol::interpret_acknowledgement(protocol::ACK_FROST_OFF, &reply) {
            AckOutcome::Confirmed => self.state.on_standby = false,
            outcome => debug!(device = %self.name, ?outcome, "cancel_frost not confirmed"),
        }
        self.refresh().await?;
        Ok(())
    }

    /// Set the frost-protection temperature. Falls back to a refresh when
    /// the acknowledgement is anything but the expected literal.
    pub async fn set_frost_temperature(&mut self, temp: f64) -> Result<()> {
        let cmd = protocol::set_frost_command(temp, &self.name);
        let Some(reply) = self.command("SET_FROST", &cmd).await? else {
            return Ok(());
        };

        match protocol::interpret_acknowledgement(protocol::ACK_SET_FROST, &reply) {
            AckOutcome::Confirmed => self.state.frost_temperature = Some(round2(temp)),
            outcome => {
                debug!(device = %self.name, ?outcome, "set_frost not confirmed");
                self.refresh().await?;
            }
        }
        Ok(())
    }

    /// One logged exchange. `Ok(None)` means the hub was unreachable, which
    /// callers treat as "no update" rather than an error.
    async fn command(&mut self, label: &str, payload: &Value) -> Result<Option<Value>> {
        if let Some(logger) = self.logger.as_mut() {
            logger.log_command(label, &self.name, payload);
        }
        match transport::exchange(&self.target, Some(payload)).await? {
            Reply::Payload(body) => {
                if let Some(logger) = self.logger.as_mut() {
                    logger.log_reply(label, &self.name, &body);
                }
                Ok(Some(body))
            }
            Reply::Offline | Reply::Online => {
                if let Some(logger) = self.logger.as_mut() {
                    logger.log_offline(label, &self.name);
                }
                debug!(device = %self.name, command = label, "hub offline, no update");
                Ok(None)
            }
        }
    }

    fn apply_info(&mut self, record: &DeviceRecord) {
        let state = &mut self.state;
        state.unit = record.unit;
        state.away = record.away;
        state.current_temperature = Some(round2(record.current_temperature));
        state.current_humidity = Some(round2(record.humidity));
        state.target_temperature = Some(round2(record.set_temperature));
        state.on_hold = record.temp_hold;
        state.hold_temperature = Some(round2(record.hold_temperature));
        state.hold_time = Some(record.hold_time.clone());
        state.on_standby = record.standby;
        state.hvac_mode = HvacMode::from_cooling_enabled(record.cooling_enabled);
        state.hvac_action = HvacAction::from_flags(record.heating, record.cooling);
    }
}
