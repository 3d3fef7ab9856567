use std::io::Write;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
};
use uuid::Uuid;

use crate::schema::{menus, outbox, reservation_menus, reservations, stores, users};

#[derive(FromSqlRow, AsExpression, PartialEq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::ReservationStatus)]
pub enum ReservationStatus {
    Reservation,
    Apply,
    Cancel,
    Complete,
}

impl ToSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            ReservationStatus::Reservation => out.write_all(b"RESERVATION")?,
            ReservationStatus::Apply => out.write_all(b"APPLY")?,
            ReservationStatus::Cancel => out.write_all(b"CANCEL")?,
            ReservationStatus::Complete => out.write_all(b"COMPLETE")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"RESERVATION" => Ok(ReservationStatus::Reservation),
            b"APPLY" => Ok(ReservationStatus::Apply),
            b"CANCEL" => Ok(ReservationStatus::Cancel),
            b"COMPLETE" => Ok(ReservationStatus::Complete),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

impl From<tably_proto::reservation_service::ReservationStatus> for ReservationStatus {
    fn from(s: tably_proto::reservation_service::ReservationStatus) -> Self {
        match s {
            tably_proto::reservation_service::ReservationStatus::Reservation => {
                ReservationStatus::Reservation
            }
            tably_proto::reservation_service::ReservationStatus::Apply => ReservationStatus::Apply,
            tably_proto::reservation_service::ReservationStatus::Cancel => {
                ReservationStatus::Cancel
            }
            tably_proto::reservation_service::ReservationStatus::Complete => {
                ReservationStatus::Complete
            }
        }
    }
}

impl From<ReservationStatus> for tably_proto::reservation_service::ReservationStatus {
    fn from(s: ReservationStatus) -> Self {
        match s {
            ReservationStatus::Reservation => {
                tably_proto::reservation_service::ReservationStatus::Reservation
            }
            ReservationStatus::Apply => tably_proto::reservation_service::ReservationStatus::Apply,
            ReservationStatus::Cancel => {
                tably_proto::reservation_service::ReservationStatus::Cancel
            }
            ReservationStatus::Complete => {
                tably_proto::reservation_service::ReservationStatus::Complete
            }
        }
    }
}

/// Fixed at creation time; a booking never changes kind afterwards.
#[derive(FromSqlRow, AsExpression, PartialEq, Copy, Clone, Debug)]
#[diesel(sql_type = crate::schema::sql_types::ReservationType)]
pub enum ReservationType {
    Reservation,
    Wait,
}

impl ToSql<crate::schema::sql_types::ReservationType, Pg> for ReservationType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            ReservationType::Reservation => out.write_all(b"RESERVATION")?,
            ReservationType::Wait => out.write_all(b"WAIT")?,
        }
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::ReservationType, Pg> for ReservationType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"RESERVATION" => Ok(ReservationType::Reservation),
            b"WAIT" => Ok(ReservationType::Wait),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

impl From<tably_proto::reservation_service::ReservationType> for ReservationType {
    fn from(s: tably_proto::reservation_service::ReservationType) -> Self {
        match s {
            tably_proto::reservation_service::ReservationType::Reservation => {
                ReservationType::Reservation
            }
            tably_proto::reservation_service::ReservationType::Wait => ReservationType::Wait,
        }
    }
}

impl From<ReservationType> for tably_proto::reservation_service::ReservationType {
    fn from(s: ReservationType) -> Self {
        match s {
            ReservationType::Reservation => {
                tably_proto::reservation_service::ReservationType::Reservation
            }
            ReservationType::Wait => tably_proto::reservation_service::ReservationType::Wait,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq, Clone)]
#[diesel(table_name = reservations)]
pub struct Reservation {
    pub id: Uuid,
    pub order_id: Option<String>,
    pub reservation_no: i64,
    pub status: ReservationStatus,
    pub kind: ReservationType,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub number_people: i64,
    pub has_menu: bool,
    pub paid: bool,
    pub payment_amount: Option<BigDecimal>,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a cart line taken when the reservation was created.
/// Immutable afterwards.
#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Debug, PartialEq)]
#[diesel(belongs_to(Reservation))]
#[diesel(table_name = reservation_menus)]
pub struct ReservationMenu {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub menu_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub quantity: i64,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq)]
#[diesel(table_name = menus)]
pub struct Menu {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub price: BigDecimal,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq)]
#[diesel(table_name = stores)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

#[derive(Queryable, Selectable, Debug, PartialEq)]
#[diesel(table_name = outbox)]
pub struct Outbox {
    pub id: i32,
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = outbox)]
pub struct NewOutbox {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}
