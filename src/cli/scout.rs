use chrono::{DateTime, Local, TimeDelta};
use clap::Parser;

use crate::{
    cli::{awattar::AwattarArgs, schedule::ScheduleArgs},
    core::selector::select,
    prelude::*,
    tables::{build_decision_table, build_prices_table},
};

#[derive(Parser)]
pub struct ScoutArgs {
    #[clap(flatten)]
    awattar: AwattarArgs,

    #[clap(flatten)]
    schedule: ScheduleArgs,

    /// Look at the day starting at this time instead of the upcoming prices,
    /// for example `2025-10-11T00:00:00+02:00`.
    #[clap(long)]
    since: Option<DateTime<Local>>,
}

impl ScoutArgs {
    #[instrument(skip_all)]
    pub async fn run(self) -> Result {
        let schedule = self.schedule.validate()?;
        let api = self.awattar.connect()?;

        let (series, now) = match self.since {
            Some(since) => (api.fetch_range(since, since + TimeDelta::days(1)).await?, since),
            None => (self.awattar.retry.backoff()?.retry(&api).await?, Local::now()),
        };
        info!(
            len = series.len(),
            first = ?series.first().map(|point| point.time),
            last = ?series.last().map(|point| point.time),
            "fetched the prices",
        );

        let hour_start = series.at(now).map_or(now, |point| point.time);
        let decision = select(&series, schedule.charge_hours, schedule.discharge_hours, hour_start);
        println!("{}", build_prices_table(&series, &decision));
        println!("{}", build_decision_table(&decision));
        Ok(())
    }
}
