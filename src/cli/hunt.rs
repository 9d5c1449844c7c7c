use std::{path::PathBuf, sync::Arc, time::Duration};

use bon::Builder;
use chrono::{DateTime, Local, TimeDelta};
use clap::Parser;
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    cli::{
        awattar::AwattarArgs,
        battery::BatteryArgs,
        heartbeat::HeartbeatArgs,
        manual::ManualOverrideArgs,
        schedule::ScheduleArgs,
    },
    core::{
        cache::{PriceCache, Snapshot},
        command::{Controller, ManualOverride, PowerCommand, ScheduledController, arbitrate},
        selector::{ScheduleDecision, select},
    },
    prelude::*,
};

#[derive(Parser)]
pub struct HuntArgs {
    #[clap(flatten)]
    awattar: AwattarArgs,

    #[clap(flatten)]
    schedule: ScheduleArgs,

    #[clap(flatten)]
    battery: BatteryArgs,

    #[clap(flatten)]
    manual_override: ManualOverrideArgs,

    #[clap(flatten)]
    heartbeat: HeartbeatArgs,

    /// How often the price refresher wakes up.
    #[clap(long, env = "FETCH_INTERVAL", default_value = "15min")]
    fetch_interval: humantime::Duration,

    /// Cached prices older than this get refreshed.
    #[clap(long, env = "MAX_PRICE_AGE", default_value = "1h")]
    max_age: humantime::Duration,

    /// Control cycle period.
    #[clap(long, env = "CYCLE_INTERVAL", default_value = "1min")]
    cycle_interval: humantime::Duration,

    /// Keep the last fetched prices in this file across restarts.
    #[clap(long, env = "CACHE_PATH")]
    cache_path: Option<PathBuf>,
}

impl HuntArgs {
    pub async fn run(self) -> Result {
        let schedule = self.schedule.validate()?;
        self.battery.validate()?;
        let manual_override = self.manual_override.build(&self.battery.ess_id)?;
        let max_age = TimeDelta::from_std(self.max_age.into()).context("invalid maximum age")?;

        let mut cache = PriceCache::new(self.awattar.connect()?, self.awattar.retry.backoff()?);
        if let Some(path) = self.cache_path {
            cache = cache.with_path(path);
        }
        let cache = Arc::new(cache);

        let refresher =
            tokio::spawn(refresh_forever(Arc::clone(&cache), self.fetch_interval.into(), max_age));
        let hunter = Hunter::builder()
            .cache(cache)
            .schedule(schedule)
            .battery(self.battery)
            .maybe_manual_override(manual_override)
            .heartbeat(self.heartbeat)
            .max_age(max_age)
            .interval(self.cycle_interval)
            .build();

        tokio::select! {
            () = hunter.run() => {}
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for the interrupt signal")?;
                info!("interrupted, shutting down…");
            }
        }
        refresher.abort();
        Ok(())
    }
}

/// Price refresher worker, the only place that talks to the price provider.
///
/// Failures are recorded by the cache, the control loop keeps using the previous prices.
async fn refresh_forever(cache: Arc<PriceCache>, period: Duration, max_age: TimeDelta) {
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match cache.refresh_if_stale(max_age, Local::now()).await {
            Ok(series) => {
                let fetched_at = cache.fetched_at();
                debug!(len = series.len(), ?fetched_at, "prices are up to date");
            }
            Err(_) => {
                warn!(len = cache.current().len(), "serving the previous prices");
            }
        }
    }
}

#[derive(Builder)]
struct Hunter {
    cache: Arc<PriceCache>,
    schedule: ScheduleArgs,
    battery: BatteryArgs,
    manual_override: Option<ManualOverride>,
    heartbeat: HeartbeatArgs,
    max_age: TimeDelta,

    #[builder(into)]
    interval: Duration,
}

impl Hunter {
    async fn run(self) {
        let mut interval = interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut updates = self.cache.subscribe();
        let mut last_decision = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                Ok(()) = updates.changed() => debug!("the prices got refreshed"),
            }
            let now = Local::now();
            let snapshot = self.cache.snapshot();
            let is_healthy = check_health(&snapshot, self.max_age, now);

            let decision = self.decide(&snapshot, now);
            if decision.is_empty() {
                info!("nothing to schedule");
            } else if last_decision.as_ref() != Some(&decision) {
                info!(
                    charge = ?decision.charge_blocks(),
                    discharge = ?decision.discharge_blocks(),
                    "new schedule",
                );
                last_decision = Some(decision.clone());
            }

            let commands = self.commands(&decision, now);
            if commands.is_empty() {
                info!("idling");
            }
            for command in commands {
                info!(ess_id = %command.ess_id, power = %command.power, "commanding");
            }

            self.heartbeat.send(is_healthy).await;
        }
    }

    fn decide(&self, snapshot: &Snapshot, now: DateTime<Local>) -> ScheduleDecision {
        // The hour in progress is still worth acting upon.
        let hour_start = snapshot.series.at(now).map_or(now, |point| point.time);
        select(
            &snapshot.series,
            self.schedule.charge_hours,
            self.schedule.discharge_hours,
            hour_start,
        )
    }

    fn commands(&self, decision: &ScheduleDecision, now: DateTime<Local>) -> Vec<PowerCommand> {
        let scheduled = ScheduledController::builder()
            .ess_id(self.battery.ess_id.as_str())
            .charging_power(self.battery.charging_power)
            .discharging_power(self.battery.discharging_power)
            .decision(decision)
            .build();
        let mut controllers: Vec<&dyn Controller> = Vec::with_capacity(2);
        if let Some(manual_override) = &self.manual_override {
            controllers.push(manual_override);
        }
        controllers.push(&scheduled);
        arbitrate(&controllers, now)
    }
}

/// Log what is wrong with the cached prices, if anything.
fn check_health(snapshot: &Snapshot, max_age: TimeDelta, now: DateTime<Local>) -> bool {
    let mut is_healthy = true;
    if let Some(error) = &snapshot.last_error {
        warn!("the last refresh failed, using the previous prices: {error}");
        is_healthy = false;
    }
    if snapshot.series.is_empty() {
        warn!("no prices available yet");
        is_healthy = false;
    } else if snapshot.is_stale(max_age, now) {
        warn!(fetched_at = ?snapshot.fetched_at, "the prices are stale");
    }
    is_healthy
}
