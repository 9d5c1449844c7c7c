use std::fmt::{Display, Formatter};

quantity!(MegawattHourRate, f64, "€/MWh");

impl Display for MegawattHourRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} €/MWh", self.0)
    }
}

impl MegawattHourRate {
    /// Median of the rates, or [`None`] when there are none.
    pub fn median(rates: impl IntoIterator<Item = Self>) -> Option<Self> {
        let mut rates: Vec<_> = rates.into_iter().collect();
        if rates.is_empty() {
            return None;
        }
        rates.sort_unstable();
        let middle = rates.len() / 2;
        if rates.len() % 2 == 0 {
            Some(Self((rates[middle - 1].0 + rates[middle].0) / 2.0))
        } else {
            Some(rates[middle])
        }
    }
}
