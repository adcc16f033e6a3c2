use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Signed money amount represented as **integer cents**.
///
/// Every monetary value of the fleet (prices, costs, balances, movement
/// amounts) uses this type so aggregation never drifts.
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let price = MoneyCents::new(2_000_000);
/// assert_eq!(price.percent(20), MoneyCents::new(400_000));
/// assert_eq!(price.to_string(), "20000.00");
/// ```
///
/// Parsing accepts `.` or `,` as decimal separator and rejects more than two
/// decimals:
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("150,5".parse::<MoneyCents>().unwrap().cents(), 15050);
/// assert!("1.005".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// `pct` percent of the amount, rounded half away from zero to the cent.
    #[must_use]
    pub fn percent(self, pct: i64) -> MoneyCents {
        MoneyCents(div_round(i128::from(self.0) * i128::from(pct), 100))
    }

    /// The amount split over `units` (e.g. kilometres), rounded half away from
    /// zero. Zero units yield zero.
    #[must_use]
    pub fn per_unit(self, units: i64) -> MoneyCents {
        if units == 0 {
            return MoneyCents::ZERO;
        }
        MoneyCents(div_round(i128::from(self.0), i128::from(units)))
    }

    /// Amount expressed in major units, for ratios and display only.
    #[must_use]
    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

fn div_round(numerator: i128, denominator: i128) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let rounded = if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) == (denominator < 0) {
            quotient + 1
        } else {
            quotient - 1
        }
    } else {
        quotient
    };
    rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a MoneyCents> for MoneyCents {
    fn sum<I: Iterator<Item = &'a MoneyCents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string (`"12"`, `"12.5"`, `"-12,50"`) into cents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::Validation(format!("invalid amount: {s:?}"));

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let digits = digits.replace(',', ".");
        let (units, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

        if units.is_empty() || !units.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(invalid)?;

        Ok(MoneyCents(if negative { -total } else { total }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(7).to_string(), "0.07");
        assert_eq!(MoneyCents::new(150_050).to_string(), "1500.50");
        assert_eq!(MoneyCents::new(-990).to_string(), "-9.90");
    }

    #[test]
    fn parse_amounts() {
        assert_eq!("1000".parse::<MoneyCents>().unwrap().cents(), 100_000);
        assert_eq!("0,5".parse::<MoneyCents>().unwrap().cents(), 50);
        assert_eq!("-12.34".parse::<MoneyCents>().unwrap().cents(), -1234);
        assert_eq!(" +3.10 ".parse::<MoneyCents>().unwrap().cents(), 310);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<MoneyCents>().is_err());
        assert!("abc".parse::<MoneyCents>().is_err());
        assert!("1.2.3".parse::<MoneyCents>().is_err());
        assert!("9.999".parse::<MoneyCents>().is_err());
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(MoneyCents::new(2_000_000).percent(20).cents(), 400_000);
        assert_eq!(MoneyCents::new(5).percent(10).cents(), 1);
        assert_eq!(MoneyCents::new(-5).percent(10).cents(), -1);
        assert_eq!(MoneyCents::new(4).percent(10).cents(), 0);
    }

    #[test]
    fn per_unit_handles_zero_units() {
        assert_eq!(MoneyCents::new(100_000).per_unit(0), MoneyCents::ZERO);
        assert_eq!(MoneyCents::new(100_000).per_unit(3).cents(), 33_333);
        assert_eq!(MoneyCents::new(200).per_unit(3).cents(), 67);
    }

    #[test]
    fn sums_iterators() {
        let total: MoneyCents = [MoneyCents::new(100), MoneyCents::new(250)].iter().sum();
        assert_eq!(total.cents(), 350);
    }
}
