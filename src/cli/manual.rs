use clap::Parser;

use crate::{
    core::command::{ManualOverride, Mode},
    prelude::*,
    quantity::power::Watts,
};

/// Fixed power that takes priority over the price-based schedule.
#[derive(Parser)]
pub struct ManualOverrideArgs {
    /// Enable the manual override.
    #[clap(id = "override_enabled", long = "override-enabled", env = "OVERRIDE_ENABLED")]
    pub enabled: bool,

    #[clap(
        id = "override_mode",
        long = "override-mode",
        env = "OVERRIDE_MODE",
        default_value = "manual-on"
    )]
    pub mode: Mode,

    /// Charge (negative) or discharge (positive) power in watts.
    #[clap(
        id = "override_power_watts",
        long = "override-power-watts",
        env = "OVERRIDE_POWER_WATTS",
        allow_negative_numbers = true
    )]
    pub power: Option<Watts>,

    #[clap(
        id = "override_id",
        long = "override-id",
        env = "OVERRIDE_ID",
        default_value = "ctrlManualOverride0"
    )]
    pub id: String,

    #[clap(id = "override_alias", long = "override-alias", env = "OVERRIDE_ALIAS")]
    pub alias: Option<String>,

    /// Overridden device, the scheduled one by default.
    #[clap(id = "override_ess_id", long = "override-ess-id", env = "OVERRIDE_ESS_ID")]
    pub ess_id: Option<String>,

    /// Device selection filter handed over to the host together with the command.
    #[clap(
        id = "override_ess_target",
        long = "override-ess-target",
        env = "OVERRIDE_ESS_TARGET",
        default_value = "(enabled=true)"
    )]
    pub ess_target: String,
}

impl ManualOverrideArgs {
    /// Build the override controller, if it is enabled.
    pub fn build(&self, default_ess_id: &str) -> Result<Option<ManualOverride>> {
        if !self.enabled {
            return Ok(None);
        }
        let power = self.power.context("the override is enabled but has no power set")?;
        let manual_override = ManualOverride::builder()
            .id(self.id.clone())
            .maybe_alias(self.alias.clone())
            .mode(self.mode)
            .ess_id(self.ess_id.as_deref().unwrap_or(default_ess_id))
            .power(power)
            .ess_target(self.ess_target.clone())
            .build();
        info!(
            alias = manual_override.alias(),
            ess_target = manual_override.ess_target(),
            active = manual_override.is_active(),
            %power,
            "manual override is configured",
        );
        Ok(Some(manual_override))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ManualOverrideArgs {
        ManualOverrideArgs {
            enabled: true,
            mode: Mode::ManualOn,
            power: Some(Watts(-2000)),
            id: "ctrlManualOverride0".into(),
            alias: None,
            ess_id: None,
            ess_target: "(enabled=true)".into(),
        }
    }

    #[test]
    fn test_disabled() -> Result {
        let args = ManualOverrideArgs { enabled: false, ..args() };
        assert!(args.build("ess0")?.is_none());
        Ok(())
    }

    #[test]
    fn test_missing_power() {
        let args = ManualOverrideArgs { power: None, ..args() };
        assert!(args.build("ess0").is_err());
    }

    #[test]
    fn test_defaults_to_scheduled_device() -> Result {
        use chrono::Local;

        use crate::core::command::Controller;

        let args = ManualOverrideArgs { ess_target: "(id=ess0)".into(), ..args() };
        let manual_override = args.build("ess0")?.unwrap();
        assert_eq!(manual_override.ess_target(), "(id=ess0)");
        let command = manual_override.command(Local::now()).unwrap();
        assert_eq!(command.ess_id, "ess0");
        assert_eq!(command.power, Watts(-2000));
        Ok(())
    }
}
