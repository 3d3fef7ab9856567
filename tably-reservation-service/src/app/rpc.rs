use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveTime};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use prost_types::Timestamp;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use tably_proto::common::Money;
use tably_proto::reservation_service::reservation_service_server::{
    ReservationService, ReservationServiceServer,
};
use tably_proto::reservation_service::{
    AddCartItemPayload, CancelReservationPayload, CartItem, CreateReservationPayload,
    ListCartItemsPayload, ListCartItemsResponse, ListReservationsPayload,
    ListReservationsResponse, MarkReservationPaidPayload, RemoveCartItemPayload, Reservation,
    ReservationMenuLine, ReservationStatus, ReservationType, UpdateCartItemPayload,
};

use tably_reservation_service::cart::{CartLine, CartStore};
use tably_reservation_service::commands::{self, CreateReservation, ReservationFilter};
use tably_reservation_service::{establish_cache, establish_connection, models, scheduler};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[derive(Default)]
pub struct ReservationServiceImpl {}

#[tonic::async_trait]
impl ReservationService for ReservationServiceImpl {
    async fn add_cart_item(
        &self,
        request: Request<AddCartItemPayload>,
    ) -> Result<Response<()>, Status> {
        let payload = request.into_inner();
        let user_id = parse_uuid(&payload.user_id, "user id")?;
        let store_id = parse_uuid(&payload.store_id, "store id")?;

        let lines = payload
            .items
            .into_iter()
            .map(|item| -> Result<CartLine, Status> {
                Ok(CartLine {
                    menu_id: parse_uuid(&item.menu_id, "menu id")?,
                    menu_name: item.menu_name,
                    price: parse_money(item.price)?,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cart = CartStore::new(establish_cache());
        for line in &lines {
            // Resubmissions of the same menu are ignored, not merged.
            cart.add_item(&store_id, &user_id, line)
                .map_err(Status::from)?;
        }
        Ok(Response::new(()))
    }

    async fn update_cart_item(
        &self,
        request: Request<UpdateCartItemPayload>,
    ) -> Result<Response<()>, Status> {
        let payload = request.into_inner();
        let user_id = parse_uuid(&payload.user_id, "user id")?;
        let store_id = parse_uuid(&payload.store_id, "store id")?;
        let menu_id = parse_uuid(&payload.menu_id, "menu id")?;

        let cart = CartStore::new(establish_cache());
        cart.update_item(&store_id, &user_id, &menu_id, payload.quantity)
            .map_err(Status::from)?;
        Ok(Response::new(()))
    }

    async fn remove_cart_item(
        &self,
        request: Request<RemoveCartItemPayload>,
    ) -> Result<Response<()>, Status> {
        let payload = request.into_inner();
        let user_id = parse_uuid(&payload.user_id, "user id")?;
        let store_id = parse_uuid(&payload.store_id, "store id")?;
        let menu_id = parse_uuid(&payload.menu_id, "menu id")?;

        let cart = CartStore::new(establish_cache());
        cart.remove_item(&store_id, &user_id, &menu_id)
            .map_err(Status::from)?;
        Ok(Response::new(()))
    }

    async fn list_cart_items(
        &self,
        request: Request<ListCartItemsPayload>,
    ) -> Result<Response<ListCartItemsResponse>, Status> {
        let payload = request.into_inner();
        let user_id = parse_uuid(&payload.user_id, "user id")?;
        let store_id = parse_uuid(&payload.store_id, "store id")?;

        let cart = CartStore::new(establish_cache());
        let items = cart
            .list_items(&store_id, &user_id)
            .map_err(Status::from)?;

        Ok(Response::new(ListCartItemsResponse {
            items: items
                .into_iter()
                .map(|line| CartItem {
                    menu_id: line.menu_id.to_string(),
                    menu_name: line.menu_name,
                    price: Some(Money {
                        amount: line.price.to_string(),
                    }),
                    quantity: line.quantity,
                })
                .collect(),
        }))
    }

    async fn create_reservation(
        &self,
        request: Request<CreateReservationPayload>,
    ) -> Result<Response<Reservation>, Status> {
        let payload = request.into_inner();
        let cmd = CreateReservation {
            order_id: payload.order_id,
            user_id: parse_uuid(&payload.user_id, "user id")?,
            store_id: parse_uuid(&payload.store_id, "store id")?,
            reservation_date: payload
                .reservation_date
                .parse::<NaiveDate>()
                .map_err(|_| Status::invalid_argument("Invalid reservation date"))?,
            reservation_time: payload
                .reservation_time
                .parse::<NaiveTime>()
                .map_err(|_| Status::invalid_argument("Invalid reservation time"))?,
            number_people: payload.number_people,
            payment_amount: payload
                .payment_amount
                .map(|m| parse_amount(&m.amount))
                .transpose()?,
        };

        let conn = &mut establish_connection();
        let cart = CartStore::new(establish_cache());
        let (reservation, menu_lines) =
            commands::create_reservation_from_cart(conn, &cart, &cmd).map_err(Status::from)?;

        // Armed only once the creation has committed.
        scheduler::schedule_auto_cancel(reservation.id);

        Ok(Response::new(serialize_reservation(reservation, menu_lines)))
    }

    async fn cancel_reservation(
        &self,
        request: Request<CancelReservationPayload>,
    ) -> Result<Response<()>, Status> {
        let payload = request.into_inner();
        let user_id = parse_uuid(&payload.user_id, "user id")?;
        let store_id = parse_uuid(&payload.store_id, "store id")?;
        let reservation_id = parse_uuid(&payload.reservation_id, "reservation id")?;

        let conn = &mut establish_connection();
        commands::cancel_reservation(conn, user_id, store_id, reservation_id, &payload.reason)
            .map_err(Status::from)?;
        Ok(Response::new(()))
    }

    async fn mark_reservation_paid(
        &self,
        request: Request<MarkReservationPaidPayload>,
    ) -> Result<Response<()>, Status> {
        let payload = request.into_inner();

        let conn = &mut establish_connection();
        commands::mark_reservation_paid(conn, &payload.order_id).map_err(Status::from)?;
        Ok(Response::new(()))
    }

    async fn list_reservations(
        &self,
        request: Request<ListReservationsPayload>,
    ) -> Result<Response<ListReservationsResponse>, Status> {
        let payload = request.into_inner();
        let user_id = parse_uuid(&payload.user_id, "user id")?;

        let filter = ReservationFilter {
            status: payload
                .status
                .map(|s| {
                    ReservationStatus::try_from(s)
                        .map(models::ReservationStatus::from)
                        .map_err(|_| Status::invalid_argument("Invalid status"))
                })
                .transpose()?,
            kind: payload
                .r#type
                .map(|t| {
                    ReservationType::try_from(t)
                        .map(models::ReservationType::from)
                        .map_err(|_| Status::invalid_argument("Invalid type"))
                })
                .transpose()?,
        };

        let page = if payload.page == 0 { 1 } else { payload.page };
        let size = if payload.size == 0 { 10 } else { payload.size };

        let conn = &mut establish_connection();
        let rows = commands::list_user_reservations(conn, user_id, &filter, page, size)
            .map_err(Status::from)?;

        Ok(Response::new(ListReservationsResponse {
            reservations: rows
                .into_iter()
                .map(|(reservation, menu_lines)| serialize_reservation(reservation, menu_lines))
                .collect(),
        }))
    }
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, Status> {
    raw.parse()
        .map_err(|_| Status::invalid_argument(format!("Invalid {}", what)))
}

fn parse_money(money: Option<Money>) -> Result<BigDecimal, Status> {
    let money = money.ok_or(Status::invalid_argument("Price required"))?;
    parse_amount(&money.amount)
}

fn parse_amount(amount: &str) -> Result<BigDecimal, Status> {
    amount
        .parse::<BigDecimal>()
        .map_err(|_| Status::invalid_argument("Invalid amount"))
}

fn serialize_reservation(
    reservation: models::Reservation,
    menu_lines: Vec<models::ReservationMenu>,
) -> Reservation {
    Reservation {
        id: reservation.id.to_string(),
        order_id: reservation.order_id,
        reservation_no: reservation.reservation_no,
        status: ReservationStatus::from(reservation.status).into(),
        r#type: ReservationType::from(reservation.kind).into(),
        reservation_date: reservation.reservation_date.to_string(),
        reservation_time: reservation.reservation_time.to_string(),
        number_people: reservation.number_people,
        has_menu: reservation.has_menu,
        paid: reservation.paid,
        payment_amount: reservation.payment_amount.map(|amount| Money {
            amount: amount.to_string(),
        }),
        user_id: reservation.user_id.to_string(),
        store_id: reservation.store_id.to_string(),
        created_at: Some(Timestamp {
            seconds: reservation.created_at.timestamp(),
            nanos: reservation.created_at.timestamp_subsec_nanos() as i32,
        }),
        menus: menu_lines
            .into_iter()
            .map(|line| ReservationMenuLine {
                menu_id: line.menu_id.to_string(),
                name: line.name,
                price: Some(Money {
                    amount: line.price.to_string(),
                }),
                quantity: line.quantity,
            })
            .collect(),
    }
}

pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = establish_connection();
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");

    let addr = "0.0.0.0:8201".parse().unwrap();
    let reservation_service = ReservationServiceImpl::default();

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ReservationServiceServer<ReservationServiceImpl>>()
        .await;

    tracing::info!("listening on {}", addr);

    Server::builder()
        .add_service(health_service)
        .add_service(ReservationServiceServer::new(reservation_service))
        .serve(addr)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn reservation_serializes_with_menu_lines() {
        let reservation = models::Reservation {
            id: Uuid::new_v4(),
            order_id: Some("order-1".to_string()),
            reservation_no: 3,
            status: models::ReservationStatus::Reservation,
            kind: models::ReservationType::Reservation,
            reservation_date: NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
            reservation_time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            number_people: 2,
            has_menu: true,
            paid: false,
            payment_amount: Some(BigDecimal::from_str("25000").unwrap()),
            user_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
        };
        let lines = vec![models::ReservationMenu {
            id: Uuid::new_v4(),
            reservation_id: reservation.id,
            menu_id: Uuid::new_v4(),
            name: "Menu A".to_string(),
            price: BigDecimal::from_str("10000").unwrap(),
            quantity: 2,
        }];

        let serialized = serialize_reservation(reservation, lines);
        assert_eq!(serialized.reservation_no, 3);
        assert_eq!(serialized.reservation_date, "2024-11-05");
        assert_eq!(serialized.reservation_time, "18:30:00");
        assert_eq!(serialized.menus.len(), 1);
        assert_eq!(
            serialized.menus[0].price.as_ref().unwrap().amount,
            "10000"
        );
    }

    #[test]
    fn malformed_ids_are_rejected_up_front() {
        let err = parse_uuid("not-a-uuid", "user id").unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn amounts_must_be_numeric() {
        assert!(parse_amount("25000").is_ok());
        let err = parse_amount("twenty-five").unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
