use std::env;

use diesel::{Connection, PgConnection};
use dotenvy::dotenv;

pub mod cart;
pub mod check;
pub mod commands;
pub mod error;
pub mod events;
pub mod models;
pub mod numbering;
pub mod scheduler;
pub mod schema;

pub const EVENT_CHANNEL: &str = "reservation.event";
pub const WAITING_EVENT_CHANNEL: &str = "waiting.event";

pub fn establish_connection() -> PgConnection {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgConnection::establish(&database_url)
        .unwrap_or_else(|_| panic!("Error connecting to {}", database_url))
}

pub fn establish_cache() -> redis::Client {
    dotenv().ok();

    let redis_url = env::var("REDIS_URL").expect("REDIS_URL must be set");
    redis::Client::open(redis_url.as_str())
        .unwrap_or_else(|_| panic!("Error connecting to {}", redis_url))
}
