use std::collections::BTreeSet;

use chrono::{DateTime, Local};

use crate::core::{interval::Interval, series::PriceSeries};

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum Action {
    Charge,
    Discharge,
    Idle,
}

/// Hours selected for charging and discharging.
///
/// An empty decision means «no action», it is not an error.
#[must_use]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScheduleDecision {
    pub charge_hours: BTreeSet<DateTime<Local>>,
    pub discharge_hours: BTreeSet<DateTime<Local>>,
}

impl ScheduleDecision {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.charge_hours.is_empty() && self.discharge_hours.is_empty()
    }

    /// Action for the selected hour containing `time`.
    pub fn action_at(&self, time: DateTime<Local>) -> Action {
        let contains = |hours: &BTreeSet<DateTime<Local>>| {
            hours.range(..=time).next_back().is_some_and(|start| Interval::hour(*start).contains(time))
        };
        if contains(&self.charge_hours) {
            Action::Charge
        } else if contains(&self.discharge_hours) {
            Action::Discharge
        } else {
            Action::Idle
        }
    }

    /// Charging hours merged into contiguous intervals.
    pub fn charge_blocks(&self) -> Vec<Interval> {
        merge_hours(&self.charge_hours)
    }

    /// Discharging hours merged into contiguous intervals.
    pub fn discharge_blocks(&self) -> Vec<Interval> {
        merge_hours(&self.discharge_hours)
    }
}

fn merge_hours(hours: &BTreeSet<DateTime<Local>>) -> Vec<Interval> {
    let mut blocks: Vec<Interval> = Vec::new();
    for start in hours {
        let hour = Interval::hour(*start);
        match blocks.last_mut() {
            Some(block) if block.end == hour.start => *block = block.with_end(hour.end),
            _ => blocks.push(hour),
        }
    }
    blocks
}

/// Pick the cheapest upcoming hours for charging and the most expensive of the remaining
/// upcoming hours for discharging.
///
/// Hours that start before `now` are never selected. Charging is served first when there
/// are not enough hours for both. Equal prices are resolved in favour of the earlier hour.
pub fn select(
    series: &PriceSeries,
    charge_count: usize,
    discharge_count: usize,
    now: DateTime<Local>,
) -> ScheduleDecision {
    let charge_hours: BTreeSet<_> =
        series.cheapest(now).into_iter().take(charge_count).map(|point| point.time).collect();
    let discharge_hours = series
        .most_expensive(now)
        .into_iter()
        .filter(|point| !charge_hours.contains(&point.time))
        .take(discharge_count)
        .map(|point| point.time)
        .collect();
    ScheduleDecision { charge_hours, discharge_hours }
}
