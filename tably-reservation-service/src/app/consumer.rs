use std::{env, thread::sleep, time::Duration};

use chrono::{DateTime, Utc};
use dotenvy::dotenv;
use kafka::{
    client::{FetchOffset, GroupOffsetStorage},
    consumer::Consumer,
};
use prost::Message;
use uuid::Uuid;

use tably_proto::waiting_service::{waiting_event, WaitingEvent};
use tably_reservation_service::commands::{self, WaitingAdmission};
use tably_reservation_service::{establish_connection, WAITING_EVENT_CHANNEL};

const GROUP: &'static str = "reservation-service";

enum AcceptedMessage {
    WaitingEvent(WaitingEvent),
}

impl AcceptedMessage {
    fn from(topic: &str, value: &[u8]) -> Option<Self> {
        match topic {
            WAITING_EVENT_CHANNEL => Some(AcceptedMessage::WaitingEvent(
                WaitingEvent::decode(value).expect("Cannot decode waiting event"),
            )),
            _ => None,
        }
    }

    fn process(self, conn: &mut diesel::PgConnection) -> Result<(), ()> {
        match self {
            AcceptedMessage::WaitingEvent(waiting_event) => match waiting_event.event.unwrap() {
                waiting_event::Event::WaitingAdmitted(event) => {
                    let created_at = event
                        .created_at
                        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.seconds, ts.nanos as u32))
                        .expect("Cannot decode admission timestamp");
                    let admission = WaitingAdmission {
                        created_at,
                        user_id: event.user_id.parse::<Uuid>().expect("Invalid user id"),
                        store_id: event.store_id.parse::<Uuid>().expect("Invalid store id"),
                        waiting_number: event.waiting_number,
                    };

                    match commands::handle_waiting_admitted(conn, &admission) {
                        Ok(reservation) => {
                            tracing::info!(
                                reservation_id = %reservation.id,
                                waiting_number = reservation.reservation_no,
                                "materialized waiting admission"
                            );
                            Ok(())
                        }
                        Err(err) => {
                            tracing::error!("failed to materialize waiting admission: {err}");
                            Err(())
                        }
                    }
                }
            },
        }
    }
}

pub fn main() {
    dotenv().ok();
    let kafka_url = env::var("KAFKA_URL").expect("KAFKA_URL must be set");

    let mut conn = establish_connection();
    let mut consumer = Consumer::from_hosts(vec![kafka_url])
        .with_topic(WAITING_EVENT_CHANNEL.to_string())
        .with_group(GROUP.to_string())
        .with_fallback_offset(FetchOffset::Earliest)
        .with_offset_storage(Some(GroupOffsetStorage::Kafka))
        .create()
        .unwrap();

    loop {
        let mss = consumer.poll().expect("Cannot poll messages");
        if mss.is_empty() {
            sleep(Duration::from_secs(1));
            continue;
        }

        for ms in mss.iter() {
            for m in ms.messages() {
                match AcceptedMessage::from(ms.topic(), m.value) {
                    Some(message) => {
                        message.process(&mut conn).expect(&format!(
                            "Failed to process message {} {}",
                            ms.topic(),
                            m.offset
                        ));
                    }
                    None => {}
                }
            }
            let _ = consumer.consume_messageset(ms);
        }
        consumer
            .commit_consumed()
            .expect("Error while commit consumed");
    }
}
