//! OHLCV bar representation.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Half-open interval covered by one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimePeriod {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        TimePeriod { start, end }
    }

    /// True when this period starts at or after `previous` ends.
    pub fn follows(&self, previous: &TimePeriod) -> bool {
        self.start >= previous.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub period: TimePeriod,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / dec!(3)
    }

    /// (high + low) / 2
    pub fn median_price(&self) -> Decimal {
        (self.high + self.low) / dec!(2)
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn sample_bar() -> OhlcvBar {
        let start = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        OhlcvBar {
            period: TimePeriod::new(start, start + Duration::days(1)),
            open: dec!(100),
            high: dec!(110),
            low: dec!(90),
            close: dec!(105),
            volume: dec!(50000),
        }
    }

    #[test]
    fn typical_price() {
        let bar = sample_bar();
        // (110 + 90 + 105) / 3 = 101.666...
        assert_eq!(bar.typical_price(), dec!(305) / dec!(3));
    }

    #[test]
    fn median_price() {
        assert_eq!(sample_bar().median_price(), dec!(100));
    }

    #[test]
    fn true_range_hl_dominates() {
        assert_eq!(sample_bar().true_range(dec!(100)), dec!(20));
    }

    #[test]
    fn true_range_gap_up() {
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert_eq!(sample_bar().true_range(dec!(70)), dec!(40));
    }

    #[test]
    fn true_range_gap_down() {
        assert_eq!(sample_bar().true_range(dec!(130)), dec!(40));
    }

    #[test]
    fn period_ordering() {
        let first = sample_bar().period;
        let touching = TimePeriod::new(first.end, first.end + Duration::days(1));
        let overlapping = TimePeriod::new(first.start + Duration::hours(1), first.end);
        assert!(touching.follows(&first));
        assert!(!overlapping.follows(&first));
    }
}
