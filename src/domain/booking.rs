use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub listing_id: Uuid,
    pub start_date: NaiveDate,
    /// Exclusive: a booking ending on a date leaves that night free.
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    /// Total in minor currency units (e.g. pesewas), fixed at creation.
    pub total_price_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Two-decimal display form of the total, e.g. 30000 -> "300.00".
    pub fn total_price_display(&self) -> String {
        Decimal::new(self.total_price_minor, 2).to_string()
    }
}

/// Persisted as short codes: PND / CFD / CNC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: Uuid,
    pub listing_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Result of a confirmation attempt that did not error. Callers that fire
/// notifications must only do so on `Confirmed`: `AlreadyConfirmed` means
/// some earlier call performed the transition.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    Confirmed(Booking),
    AlreadyConfirmed(Booking),
}

impl ConfirmOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            ConfirmOutcome::Confirmed(b) => b,
            ConfirmOutcome::AlreadyConfirmed(b) => b,
        }
    }
}

pub fn nights_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// `round_half_up(price_per_night × nights × 100)` in minor units.
/// Returns None only if the result overflows i64.
pub fn compute_total_price(price_per_night: Decimal, start: NaiveDate, end: NaiveDate) -> Option<i64> {
    let nights = Decimal::from(nights_between(start, end));
    let total = price_per_night.checked_mul(nights)?.checked_mul(Decimal::ONE_HUNDRED)?;
    total
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Two ranges overlap when each starts before the other ends. End dates are
/// exclusive, so back-to-back bookings do not overlap.
pub fn ranges_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn price(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn total_price_three_nights_at_100() {
        let total = compute_total_price(price("100.00"), date(2026, 9, 1), date(2026, 9, 4));
        assert_eq!(total, Some(30000));
    }

    #[test]
    fn total_price_four_nights_at_250_50() {
        let total = compute_total_price(price("250.50"), date(2026, 9, 1), date(2026, 9, 5));
        assert_eq!(total, Some(100200));
    }

    #[test]
    fn total_price_single_night() {
        let total = compute_total_price(price("75.25"), date(2026, 9, 1), date(2026, 9, 2));
        assert_eq!(total, Some(7525));
    }

    #[test]
    fn total_price_rounds_half_up() {
        // 33.335 * 1 * 100 = 3333.5 -> 3334
        let total = compute_total_price(price("33.335"), date(2026, 9, 1), date(2026, 9, 2));
        assert_eq!(total, Some(3334));
    }

    #[test]
    fn nights_are_floored_at_one() {
        assert_eq!(nights_between(date(2026, 9, 1), date(2026, 9, 1)), 1);
        assert_eq!(nights_between(date(2026, 9, 1), date(2026, 9, 6)), 5);
    }

    #[test]
    fn overlapping_ranges_detected() {
        // [1, 5) vs [4, 8) share the night of the 4th
        assert!(ranges_overlap(
            date(2026, 9, 1),
            date(2026, 9, 5),
            date(2026, 9, 4),
            date(2026, 9, 8),
        ));
        // containment
        assert!(ranges_overlap(
            date(2026, 9, 1),
            date(2026, 9, 10),
            date(2026, 9, 3),
            date(2026, 9, 4),
        ));
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        // [1, 5) then [5, 8): checkout day equals checkin day
        assert!(!ranges_overlap(
            date(2026, 9, 1),
            date(2026, 9, 5),
            date(2026, 9, 5),
            date(2026, 9, 8),
        ));
        assert!(!ranges_overlap(
            date(2026, 9, 5),
            date(2026, 9, 8),
            date(2026, 9, 1),
            date(2026, 9, 5),
        ));
    }

    #[test]
    fn display_total_keeps_two_places() {
        let booking = Booking {
            id: uuid::Uuid::new_v4(),
            customer_id: uuid::Uuid::new_v4(),
            listing_id: uuid::Uuid::new_v4(),
            start_date: date(2026, 9, 1),
            end_date: date(2026, 9, 4),
            status: BookingStatus::Pending,
            total_price_minor: 30000,
            created_at: Utc::now(),
        };
        assert_eq!(booking.total_price_display(), "300.00");
    }
}
