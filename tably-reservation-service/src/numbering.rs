use chrono::NaiveDate;
use diesel::{dsl::max, prelude::*, PgConnection};

use crate::error::ReservationError;
use crate::models::ReservationType;
use crate::schema;

/// Next human-facing ticket number for a (kind, date) scope: highest issued
/// so far plus one, starting at 1. Must run inside the creation transaction;
/// the unique index on (kind, reservation_date, reservation_no) turns the
/// remaining read-then-use race into a Conflict instead of a silent
/// overwrite.
pub fn next_reservation_no(
    conn: &mut PgConnection,
    kind: ReservationType,
    date: NaiveDate,
) -> Result<i64, ReservationError> {
    let current: Option<i64> = schema::reservations::table
        .filter(schema::reservations::kind.eq(kind))
        .filter(schema::reservations::reservation_date.eq(date))
        .select(max(schema::reservations::reservation_no))
        .first(conn)?;
    Ok(current.unwrap_or(0) + 1)
}
