use diesel::{prelude::*, PgConnection};
use prost::Message;
use tably_proto::reservation_service::{
    reservation_event, PaymentCancelEvent, PaymentTimeoutCancelEvent, ReservationEvent,
};

use crate::{models::NewOutbox, schema, EVENT_CHANNEL};

/// Writes reservation events into the outbox so they commit atomically with
/// the status transition that caused them. The producer loop relays them to
/// the payment subsystem.
pub struct ReservationEventPublisher<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> ReservationEventPublisher<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    pub fn payment_cancelled(
        &mut self,
        order_id: &str,
        reason: &str,
    ) -> Result<(), diesel::result::Error> {
        let event = ReservationEvent {
            event: Some(reservation_event::Event::PaymentCancel(PaymentCancelEvent {
                order_id: order_id.to_string(),
                reason: reason.to_string(),
            })),
        };
        self.publish(event, order_id)
    }

    pub fn payment_timeout_cancelled(
        &mut self,
        order_id: &str,
    ) -> Result<(), diesel::result::Error> {
        let event = ReservationEvent {
            event: Some(reservation_event::Event::PaymentTimeoutCancel(
                PaymentTimeoutCancelEvent {
                    order_id: order_id.to_string(),
                },
            )),
        };
        self.publish(event, order_id)
    }

    fn publish(
        &mut self,
        event: ReservationEvent,
        key: &str,
    ) -> Result<(), diesel::result::Error> {
        let mut buf = Vec::new();
        event.encode(&mut buf).unwrap();

        diesel::insert_into(schema::outbox::table)
            .values(NewOutbox {
                topic: EVENT_CHANNEL.to_string(),
                key: key.to_string(),
                value: buf,
            })
            .execute(self.conn)
            .map(|_| ())
    }
}
