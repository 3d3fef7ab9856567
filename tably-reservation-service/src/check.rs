use uuid::Uuid;

use crate::error::ReservationError;
use crate::models::{Reservation, ReservationType};

/// Operations fail closed when the caller does not own the reservation.
pub fn is_user_reservation(
    user_id: Uuid,
    reservation: &Reservation,
) -> Result<(), ReservationError> {
    if reservation.user_id != user_id {
        return Err(ReservationError::NotOwner);
    }
    Ok(())
}

/// A reservation can only move through flows of its own kind; cross-kind
/// operations (e.g. cancelling a waiting-list entry through the booking
/// path) are rejected before any status is looked at.
pub fn can_change_reservation_type(
    reservation: &Reservation,
    target: ReservationType,
) -> Result<(), ReservationError> {
    if reservation.kind != target {
        return Err(ReservationError::TypeForbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReservationStatus;
    use bigdecimal::BigDecimal;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use std::str::FromStr;

    fn reservation(user_id: Uuid, kind: ReservationType) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            order_id: Some("order-1".to_string()),
            reservation_no: 1,
            status: ReservationStatus::Reservation,
            kind,
            reservation_date: NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
            reservation_time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            number_people: 2,
            has_menu: false,
            paid: false,
            payment_amount: Some(BigDecimal::from_str("25000").unwrap()),
            user_id,
            store_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_passes_ownership_check() {
        let user_id = Uuid::new_v4();
        let r = reservation(user_id, ReservationType::Reservation);
        assert!(is_user_reservation(user_id, &r).is_ok());
    }

    #[test]
    fn other_user_is_rejected() {
        let r = reservation(Uuid::new_v4(), ReservationType::Reservation);
        let err = is_user_reservation(Uuid::new_v4(), &r).unwrap_err();
        assert!(matches!(err, ReservationError::NotOwner));
    }

    #[test]
    fn same_kind_change_is_allowed() {
        let r = reservation(Uuid::new_v4(), ReservationType::Reservation);
        assert!(can_change_reservation_type(&r, ReservationType::Reservation).is_ok());
    }

    #[test]
    fn waiting_entry_is_rejected_on_the_booking_path() {
        let r = reservation(Uuid::new_v4(), ReservationType::Wait);
        let err = can_change_reservation_type(&r, ReservationType::Reservation).unwrap_err();
        assert!(matches!(err, ReservationError::TypeForbidden));
    }
}
