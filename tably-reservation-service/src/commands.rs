use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use diesel::{insert_into, prelude::*, result::DatabaseErrorKind, update, PgConnection};
use uuid::Uuid;

use crate::cart::CartStore;
use crate::check;
use crate::error::ReservationError;
use crate::events::ReservationEventPublisher;
use crate::models::{
    Menu, Reservation, ReservationMenu, ReservationStatus, ReservationType, Store, User,
};
use crate::numbering;
use crate::schema;

pub struct CreateReservation {
    pub order_id: Option<String>,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub number_people: i64,
    pub payment_amount: Option<BigDecimal>,
}

/// A waiting-queue admission, as consumed from the waiting service.
pub struct WaitingAdmission {
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub waiting_number: i64,
}

#[derive(Default)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub kind: Option<ReservationType>,
}

/// Turns the caller's cart at this store into a persisted reservation.
///
/// The cart is drained before the menu snapshots are validated; a menu
/// deleted between cart-add and creation aborts the whole call with the
/// cart already emptied. The unique (kind, date, no) index turns numbering
/// races into `DuplicateReservationNo`.
///
/// The auto-cancel timer is armed by the caller after this commits.
pub fn create_reservation_from_cart(
    conn: &mut PgConnection,
    cart: &CartStore,
    cmd: &CreateReservation,
) -> Result<(Reservation, Vec<ReservationMenu>), ReservationError> {
    let lines = cart.drain(&cmd.store_id, &cmd.user_id)?;

    conn.transaction(|conn| {
        find_user(conn, cmd.user_id)?;
        find_store(conn, cmd.store_id)?;

        let reservation_no = numbering::next_reservation_no(
            conn,
            ReservationType::Reservation,
            cmd.reservation_date,
        )?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            order_id: cmd.order_id.clone(),
            reservation_no,
            status: ReservationStatus::Reservation,
            kind: ReservationType::Reservation,
            reservation_date: cmd.reservation_date,
            reservation_time: cmd.reservation_time,
            number_people: cmd.number_people,
            has_menu: !lines.is_empty(),
            paid: false,
            payment_amount: cmd.payment_amount.clone(),
            user_id: cmd.user_id,
            store_id: cmd.store_id,
            created_at: Utc::now(),
        };
        insert_into(schema::reservations::table)
            .values(&reservation)
            .execute(conn)
            .map_err(map_insert_error)?;

        let menu_lines = lines
            .iter()
            .map(|line| {
                let menu = schema::menus::table
                    .select(Menu::as_select())
                    .find(&line.menu_id)
                    .first::<Menu>(conn)
                    .optional()?
                    .ok_or(ReservationError::MenuNotFound(line.menu_id))?;
                Ok(ReservationMenu {
                    id: Uuid::new_v4(),
                    reservation_id: reservation.id,
                    menu_id: menu.id,
                    name: line.menu_name.clone(),
                    price: line.price.clone(),
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, ReservationError>>()?;
        insert_into(schema::reservation_menus::table)
            .values(&menu_lines)
            .execute(conn)?;

        Ok((reservation, menu_lines))
    })
}

/// Materializes a WAIT-kind reservation from a queue admission. No cart is
/// involved and no auto-cancel timer is armed; the ticket number is the
/// queue position, not a fresh issuance.
pub fn handle_waiting_admitted(
    conn: &mut PgConnection,
    admission: &WaitingAdmission,
) -> Result<Reservation, ReservationError> {
    conn.transaction(|conn| {
        find_user(conn, admission.user_id)?;
        find_store(conn, admission.store_id)?;

        let at = admission.created_at;
        let reservation = Reservation {
            id: Uuid::new_v4(),
            order_id: None,
            reservation_no: admission.waiting_number,
            status: ReservationStatus::Apply,
            kind: ReservationType::Wait,
            reservation_date: at.date_naive(),
            reservation_time: truncate_to_seconds(at.time()),
            number_people: 1,
            has_menu: false,
            paid: false,
            payment_amount: None,
            user_id: admission.user_id,
            store_id: admission.store_id,
            created_at: Utc::now(),
        };
        insert_into(schema::reservations::table)
            .values(&reservation)
            .execute(conn)
            .map_err(map_insert_error)?;

        Ok(reservation)
    })
}

/// Caller-initiated cancellation. Ownership is checked first, then the
/// kind-compatibility guard, then the status gate; a COMPLETE or already
/// CANCEL reservation is rejected, not treated as a no-op. Emits exactly
/// one payment-cancel event iff the reservation was paid.
pub fn cancel_reservation(
    conn: &mut PgConnection,
    user_id: Uuid,
    store_id: Uuid,
    reservation_id: Uuid,
    reason: &str,
) -> Result<(), ReservationError> {
    conn.transaction(|conn| {
        let reservation = schema::reservations::table
            .select(Reservation::as_select())
            .filter(schema::reservations::id.eq(&reservation_id))
            .filter(schema::reservations::store_id.eq(&store_id))
            .for_update()
            .first::<Reservation>(conn)
            .optional()?
            .ok_or(ReservationError::ReservationNotFound)?;

        check::is_user_reservation(user_id, &reservation)?;
        check::can_change_reservation_type(&reservation, ReservationType::Reservation)?;
        ensure_cancellable(reservation.status)?;

        update(schema::reservations::table)
            .set(schema::reservations::status.eq(ReservationStatus::Cancel))
            .filter(schema::reservations::id.eq(&reservation_id))
            .execute(conn)?;

        if reservation.paid {
            if let Some(order_id) = &reservation.order_id {
                let mut publisher = ReservationEventPublisher::new(conn);
                publisher.payment_cancelled(order_id, reason)?;
            }
        }

        Ok(())
    })
}

/// Payment completed for the given order. Idempotent; the status is left
/// alone, only the paid flag flips. The pending auto-cancel timer is not
/// torn down, it sees the flag at fire time.
pub fn mark_reservation_paid(
    conn: &mut PgConnection,
    order_id: &str,
) -> Result<(), ReservationError> {
    conn.transaction(|conn| {
        let updated = update(schema::reservations::table)
            .set(schema::reservations::paid.eq(true))
            .filter(schema::reservations::order_id.eq(order_id))
            .execute(conn)?;
        if updated == 0 {
            return Err(ReservationError::ReservationNotFound);
        }
        Ok(())
    })
}

/// Scheduler-fired check at the end of the grace period. Runs under its own
/// transaction; cancels and emits a timeout event only when the reservation
/// is still unpaid and still open, otherwise does nothing, so re-invocation
/// is harmless.
pub fn auto_cancel(
    conn: &mut PgConnection,
    reservation_id: Uuid,
) -> Result<(), ReservationError> {
    conn.transaction(|conn| {
        let reservation = schema::reservations::table
            .select(Reservation::as_select())
            .find(&reservation_id)
            .for_update()
            .first::<Reservation>(conn)
            .optional()?
            .ok_or(ReservationError::ReservationNotFound)?;

        if !should_auto_cancel(&reservation) {
            return Ok(());
        }

        update(schema::reservations::table)
            .set(schema::reservations::status.eq(ReservationStatus::Cancel))
            .filter(schema::reservations::id.eq(&reservation_id))
            .execute(conn)?;

        if let Some(order_id) = &reservation.order_id {
            let mut publisher = ReservationEventPublisher::new(conn);
            publisher.payment_timeout_cancelled(order_id)?;
        }

        Ok(())
    })
}

/// Paged listing of a user's reservations, newest first, lines attached.
pub fn list_user_reservations(
    conn: &mut PgConnection,
    user_id: Uuid,
    filter: &ReservationFilter,
    page: i64,
    size: i64,
) -> Result<Vec<(Reservation, Vec<ReservationMenu>)>, ReservationError> {
    let page = page.max(1);
    let size = size.clamp(1, 100);

    let mut query = schema::reservations::table
        .select(Reservation::as_select())
        .filter(schema::reservations::user_id.eq(&user_id))
        .into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(schema::reservations::status.eq(status));
    }
    if let Some(kind) = filter.kind {
        query = query.filter(schema::reservations::kind.eq(kind));
    }

    let reservations = query
        .order(schema::reservations::created_at.desc())
        .offset((page - 1) * size)
        .limit(size)
        .get_results::<Reservation>(conn)?;

    reservations
        .into_iter()
        .map(|reservation| {
            let menu_lines = ReservationMenu::belonging_to(&reservation)
                .select(ReservationMenu::as_select())
                .load(conn)?;
            Ok((reservation, menu_lines))
        })
        .collect()
}

fn ensure_cancellable(status: ReservationStatus) -> Result<(), ReservationError> {
    match status {
        ReservationStatus::Reservation | ReservationStatus::Apply => Ok(()),
        ReservationStatus::Cancel | ReservationStatus::Complete => {
            Err(ReservationError::CancelForbidden)
        }
    }
}

fn should_auto_cancel(reservation: &Reservation) -> bool {
    !reservation.paid
        && matches!(
            reservation.status,
            ReservationStatus::Reservation | ReservationStatus::Apply
        )
}

fn truncate_to_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

fn find_user(conn: &mut PgConnection, user_id: Uuid) -> Result<User, ReservationError> {
    schema::users::table
        .select(User::as_select())
        .find(&user_id)
        .first::<User>(conn)
        .optional()?
        .ok_or(ReservationError::UserNotFound(user_id))
}

fn find_store(conn: &mut PgConnection, store_id: Uuid) -> Result<Store, ReservationError> {
    schema::stores::table
        .select(Store::as_select())
        .find(&store_id)
        .first::<Store>(conn)
        .optional()?
        .ok_or(ReservationError::StoreNotFound(store_id))
}

fn map_insert_error(err: diesel::result::Error) -> ReservationError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            if info.constraint_name() == Some("reservations_order_id_idx") {
                ReservationError::DuplicateOrderId
            } else {
                ReservationError::DuplicateReservationNo
            }
        }
        other => ReservationError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reservation(status: ReservationStatus, paid: bool) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            order_id: Some("order-1".to_string()),
            reservation_no: 1,
            status,
            kind: ReservationType::Reservation,
            reservation_date: NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
            reservation_time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            number_people: 2,
            has_menu: false,
            paid,
            payment_amount: None,
            user_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn open_statuses_are_cancellable() {
        assert!(ensure_cancellable(ReservationStatus::Reservation).is_ok());
        assert!(ensure_cancellable(ReservationStatus::Apply).is_ok());
    }

    #[test]
    fn terminal_statuses_are_rejected_not_ignored() {
        assert!(matches!(
            ensure_cancellable(ReservationStatus::Cancel),
            Err(ReservationError::CancelForbidden)
        ));
        assert!(matches!(
            ensure_cancellable(ReservationStatus::Complete),
            Err(ReservationError::CancelForbidden)
        ));
    }

    #[test]
    fn paid_reservation_is_never_auto_cancelled() {
        let reservation = sample_reservation(ReservationStatus::Reservation, true);
        assert!(!should_auto_cancel(&reservation));
    }

    #[test]
    fn unpaid_open_reservation_is_auto_cancelled() {
        assert!(should_auto_cancel(&sample_reservation(
            ReservationStatus::Reservation,
            false
        )));
        assert!(should_auto_cancel(&sample_reservation(
            ReservationStatus::Apply,
            false
        )));
    }

    #[test]
    fn already_cancelled_reservation_is_left_alone() {
        let reservation = sample_reservation(ReservationStatus::Cancel, false);
        assert!(!should_auto_cancel(&reservation));
    }

    #[test]
    fn admission_time_is_truncated_to_whole_seconds() {
        let time = NaiveTime::from_hms_nano_opt(12, 34, 56, 789_000_000).unwrap();
        assert_eq!(
            truncate_to_seconds(time),
            NaiveTime::from_hms_opt(12, 34, 56).unwrap()
        );
    }

    #[test]
    fn unique_violation_becomes_a_conflict() {
        let err = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        );
        assert!(matches!(
            map_insert_error(err),
            ReservationError::DuplicateReservationNo
        ));
    }

    #[test]
    fn order_id_violation_is_told_apart_from_numbering() {
        struct OrderIdViolation;

        impl diesel::result::DatabaseErrorInformation for OrderIdViolation {
            fn message(&self) -> &str {
                "duplicate key value violates unique constraint"
            }
            fn details(&self) -> Option<&str> {
                None
            }
            fn hint(&self) -> Option<&str> {
                None
            }
            fn table_name(&self) -> Option<&str> {
                Some("reservations")
            }
            fn column_name(&self) -> Option<&str> {
                None
            }
            fn constraint_name(&self) -> Option<&str> {
                Some("reservations_order_id_idx")
            }
            fn statement_position(&self) -> Option<i32> {
                None
            }
        }

        let err = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(OrderIdViolation),
        );
        assert!(matches!(
            map_insert_error(err),
            ReservationError::DuplicateOrderId
        ));
    }
}
