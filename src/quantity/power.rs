use std::fmt::{Display, Formatter};

// Negative power charges the battery, positive power discharges it.
quantity!(Watts, i32, "W");

impl Display for Watts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} W", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("-1200".parse::<Watts>().unwrap(), Watts(-1200));
    }

    #[test]
    fn test_display() {
        assert_eq!(Watts(-1200).to_string(), "-1200 W");
    }
}
