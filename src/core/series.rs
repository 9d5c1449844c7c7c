use std::{cmp::Reverse, collections::BTreeMap};

use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{core::interval::Interval, quantity::rate::MegawattHourRate};

/// Market price of the one-hour interval starting at [`PricePoint::time`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Constructor, Deserialize, Serialize)]
pub struct PricePoint {
    pub time: DateTime<Local>,
    pub price: MegawattHourRate,
}

impl PricePoint {
    pub fn interval(&self) -> Interval {
        Interval::hour(self.time)
    }
}

/// Hourly prices ordered by the start time.
///
/// The series is never mutated after construction, a newer fetch produces a new series.
#[must_use]
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries(BTreeMap<DateTime<Local>, MegawattHourRate>);

impl FromIterator<PricePoint> for PriceSeries {
    /// Collect the points, a later point overwrites an earlier one with the same time.
    fn from_iter<T: IntoIterator<Item = PricePoint>>(iter: T) -> Self {
        Self(iter.into_iter().map(|point| (point.time, point.price)).collect())
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        points.into_iter().collect()
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.iter().collect()
    }
}

impl PriceSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the points in ascending time order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = PricePoint> + ExactSizeIterator + '_ {
        self.0.iter().map(|(time, price)| PricePoint::new(*time, *price))
    }

    #[must_use]
    pub fn first(&self) -> Option<PricePoint> {
        self.0.first_key_value().map(|(time, price)| PricePoint::new(*time, *price))
    }

    #[must_use]
    pub fn last(&self) -> Option<PricePoint> {
        self.0.last_key_value().map(|(time, price)| PricePoint::new(*time, *price))
    }

    /// Find the point whose hour contains the specified time.
    #[must_use]
    pub fn at(&self, time: DateTime<Local>) -> Option<PricePoint> {
        self.0
            .range(..=time)
            .next_back()
            .map(|(start, price)| PricePoint::new(*start, *price))
            .filter(|point| point.interval().contains(time))
    }

    /// Points starting at or after `now`.
    pub fn upcoming(&self, now: DateTime<Local>) -> impl Iterator<Item = PricePoint> + '_ {
        self.0.range(now..).map(|(time, price)| PricePoint::new(*time, *price))
    }

    /// Upcoming points from the cheapest to the most expensive, earlier hours first on ties.
    #[must_use]
    pub fn cheapest(&self, now: DateTime<Local>) -> Vec<PricePoint> {
        self.upcoming(now).sorted_by_key(|point| (point.price, point.time)).collect()
    }

    /// Upcoming points from the most expensive to the cheapest, earlier hours first on ties.
    #[must_use]
    pub fn most_expensive(&self, now: DateTime<Local>) -> Vec<PricePoint> {
        self.upcoming(now).sorted_by_key(|point| (Reverse(point.price), point.time)).collect()
    }
}
