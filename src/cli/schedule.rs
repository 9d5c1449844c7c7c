use clap::Parser;

use crate::prelude::*;

#[derive(Copy, Clone, Parser)]
pub struct ScheduleArgs {
    /// Number of the cheapest upcoming hours to charge in.
    #[clap(long, env = "CHARGE_HOURS", default_value = "4")]
    pub charge_hours: usize,

    /// Number of the most expensive upcoming hours to discharge in.
    #[clap(long, env = "DISCHARGE_HOURS", default_value = "4")]
    pub discharge_hours: usize,
}

impl ScheduleArgs {
    pub fn validate(self) -> Result<Self> {
        let total_hours = self
            .charge_hours
            .checked_add(self.discharge_hours)
            .filter(|total_hours| *total_hours <= 24)
            .with_context(|| {
                format!(
                    "cannot schedule more than 24 hours a day, got {} charging and {} discharging",
                    self.charge_hours, self.discharge_hours,
                )
            })?;
        ensure!(
            total_hours != 0,
            "at least one charging or discharging hour is required",
        );
        Ok(self)
    }
}
