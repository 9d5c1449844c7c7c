use std::collections::HashSet;

use bon::Builder;
use chrono::{DateTime, Local};

use crate::{
    core::selector::{Action, ScheduleDecision},
    prelude::*,
    quantity::power::Watts,
};

/// Signed power setpoint for one Ess device for the current control cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PowerCommand {
    pub ess_id: String,

    /// Negative charges, positive discharges.
    pub power: Watts,
}

/// Something that may command a device in a control cycle.
pub trait Controller {
    fn id(&self) -> &str;

    fn command(&self, now: DateTime<Local>) -> Option<PowerCommand>;
}

/// Translates the price-based decision into power setpoints.
#[derive(Builder)]
pub struct ScheduledController<'a> {
    #[builder(into, default = "ctrlScheduled0".to_owned())]
    id: String,

    #[builder(into)]
    ess_id: String,

    /// Absolute charging power.
    charging_power: Watts,

    /// Absolute discharging power.
    discharging_power: Watts,

    decision: &'a ScheduleDecision,
}

impl Controller for ScheduledController<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn command(&self, now: DateTime<Local>) -> Option<PowerCommand> {
        let power = match self.decision.action_at(now) {
            Action::Charge => -self.charging_power,
            Action::Discharge => self.discharging_power,
            Action::Idle => return None,
        };
        Some(PowerCommand { ess_id: self.ess_id.clone(), power })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Mode {
    /// Apply the configured power.
    ManualOn,

    /// Stay configured but do not command the device.
    ManualOff,
}

/// Manually configured fixed charge or discharge power for one device.
#[derive(Clone, Debug, Builder)]
pub struct ManualOverride {
    #[builder(into, default = "ctrlManualOverride0".to_owned())]
    id: String,

    /// Human-readable name, falls back to the ID.
    #[builder(into)]
    alias: Option<String>,

    #[builder(default = Mode::ManualOn)]
    mode: Mode,

    #[builder(into)]
    ess_id: String,

    /// Negative charges, positive discharges.
    power: Watts,

    /// Device selection filter, resolved by the host.
    #[builder(into, default = "(enabled=true)".to_owned())]
    ess_target: String,

    #[builder(default = true)]
    enabled: bool,
}

impl ManualOverride {
    #[must_use]
    pub fn alias(&self) -> &str {
        self.alias.as_deref().filter(|alias| !alias.is_empty()).unwrap_or(&self.id)
    }

    #[must_use]
    pub fn ess_target(&self) -> &str {
        &self.ess_target
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled && matches!(self.mode, Mode::ManualOn)
    }
}

impl Controller for ManualOverride {
    fn id(&self) -> &str {
        &self.id
    }

    fn command(&self, _now: DateTime<Local>) -> Option<PowerCommand> {
        self.is_active().then(|| PowerCommand { ess_id: self.ess_id.clone(), power: self.power })
    }
}

/// Collect at most one command per device.
///
/// Controllers go in the priority order: the first one to command a device wins it
/// for this cycle.
pub fn arbitrate(controllers: &[&dyn Controller], now: DateTime<Local>) -> Vec<PowerCommand> {
    let mut claimed = HashSet::new();
    let mut commands = Vec::new();
    for controller in controllers {
        let Some(command) = controller.command(now) else {
            continue;
        };
        if claimed.insert(command.ess_id.clone()) {
            debug!(controller = controller.id(), ess_id = %command.ess_id, power = %command.power, "won");
            commands.push(command);
        } else {
            debug!(controller = controller.id(), ess_id = %command.ess_id, "overridden");
        }
    }
    commands
}
