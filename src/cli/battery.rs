//! Battery-related CLI arguments.

use clap::Parser;

use crate::{prelude::*, quantity::power::Watts};

#[derive(Parser)]
pub struct BatteryArgs {
    /// Controlled Ess device.
    #[clap(long, env = "ESS_ID", default_value = "ess0")]
    pub ess_id: String,

    /// Charging power in watts.
    #[clap(long = "charging-power-watts", default_value = "1200", env = "CHARGING_POWER_WATTS")]
    pub charging_power: Watts,

    /// Discharging power in watts.
    #[clap(
        long = "discharging-power-watts",
        default_value = "800",
        env = "DISCHARGING_POWER_WATTS"
    )]
    pub discharging_power: Watts,
}

impl BatteryArgs {
    pub fn validate(&self) -> Result {
        ensure!(!self.ess_id.is_empty(), "the Ess ID must not be empty");
        ensure!(
            self.charging_power > Watts::ZERO,
            "charging power must be positive, got {}",
            self.charging_power,
        );
        ensure!(
            self.discharging_power > Watts::ZERO,
            "discharging power must be positive, got {}",
            self.discharging_power,
        );
        Ok(())
    }
}
