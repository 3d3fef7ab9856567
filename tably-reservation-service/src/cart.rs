use std::collections::HashMap;

use bigdecimal::BigDecimal;
use redis::{Commands, Script};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReservationError;

/// Store-scoped TTL, refreshed by every mutating call.
pub const CART_TTL_SECONDS: i64 = 24 * 60 * 60;

/// One selected menu line. Unique by `menu_id` within a (store, user) cart.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CartLine {
    pub menu_id: Uuid,
    pub menu_name: String,
    pub price: BigDecimal,
    pub quantity: i64,
}

// All carts of a store share one hash key; a user's lines are the fields
// under their id prefix. Scripts run atomically on the Redis side, which is
// the only serialization the cart relies on.

const ADD_SCRIPT: &str = r#"
local added = redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return added
"#;

const UPDATE_SCRIPT: &str = r#"
local raw = redis.call('HGET', KEYS[1], ARGV[1])
if not raw then
    return 0
end
local line = cjson.decode(raw)
line['quantity'] = tonumber(ARGV[2])
redis.call('HSET', KEYS[1], ARGV[1], cjson.encode(line))
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
"#;

const REMOVE_SCRIPT: &str = r#"
local removed = redis.call('HDEL', KEYS[1], ARGV[1])
redis.call('EXPIRE', KEYS[1], ARGV[2])
return removed
"#;

const DRAIN_SCRIPT: &str = r#"
local fields = redis.call('HKEYS', KEYS[1])
local drained = {}
for _, field in ipairs(fields) do
    if string.sub(field, 1, string.len(ARGV[1])) == ARGV[1] then
        table.insert(drained, redis.call('HGET', KEYS[1], field))
        redis.call('HDEL', KEYS[1], field)
    end
end
redis.call('EXPIRE', KEYS[1], ARGV[2])
return drained
"#;

pub struct CartStore {
    client: redis::Client,
}

impl CartStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Appends a line unless the user already has that menu in this store's
    /// cart. Duplicate submissions are ignored, not merged.
    pub fn add_item(
        &self,
        store_id: &Uuid,
        user_id: &Uuid,
        line: &CartLine,
    ) -> Result<bool, ReservationError> {
        let payload = serde_json::to_string(line)?;
        let conn = &mut self.client.get_connection()?;
        let added: i64 = Script::new(ADD_SCRIPT)
            .key(cart_key(store_id))
            .arg(line_field(user_id, &line.menu_id))
            .arg(payload)
            .arg(CART_TTL_SECONDS)
            .invoke(conn)?;
        Ok(added == 1)
    }

    /// Replaces the quantity of an existing line, leaving the rest of the
    /// snapshot untouched.
    pub fn update_item(
        &self,
        store_id: &Uuid,
        user_id: &Uuid,
        menu_id: &Uuid,
        quantity: i64,
    ) -> Result<(), ReservationError> {
        let conn = &mut self.client.get_connection()?;
        let updated: i64 = Script::new(UPDATE_SCRIPT)
            .key(cart_key(store_id))
            .arg(line_field(user_id, menu_id))
            .arg(quantity)
            .arg(CART_TTL_SECONDS)
            .invoke(conn)?;
        if updated == 0 {
            return Err(ReservationError::InvalidCart);
        }
        Ok(())
    }

    /// Removing an absent line is a no-op.
    pub fn remove_item(
        &self,
        store_id: &Uuid,
        user_id: &Uuid,
        menu_id: &Uuid,
    ) -> Result<(), ReservationError> {
        let conn = &mut self.client.get_connection()?;
        let _: i64 = Script::new(REMOVE_SCRIPT)
            .key(cart_key(store_id))
            .arg(line_field(user_id, menu_id))
            .arg(CART_TTL_SECONDS)
            .invoke(conn)?;
        Ok(())
    }

    pub fn list_items(
        &self,
        store_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Vec<CartLine>, ReservationError> {
        let conn = &mut self.client.get_connection()?;
        let all: HashMap<String, String> = conn.hgetall(cart_key(store_id))?;
        let prefix = user_prefix(user_id);
        all.into_iter()
            .filter(|(field, _)| field.starts_with(&prefix))
            .map(|(_, raw)| serde_json::from_str(&raw).map_err(ReservationError::from))
            .collect()
    }

    /// Removes and returns every line of the user in one script, so two
    /// racing drains partition the set instead of both seeing it.
    pub fn drain(
        &self,
        store_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Vec<CartLine>, ReservationError> {
        let conn = &mut self.client.get_connection()?;
        let raw: Vec<String> = Script::new(DRAIN_SCRIPT)
            .key(cart_key(store_id))
            .arg(user_prefix(user_id))
            .arg(CART_TTL_SECONDS)
            .invoke(conn)?;
        raw.iter()
            .map(|value| serde_json::from_str(value).map_err(ReservationError::from))
            .collect()
    }
}

fn cart_key(store_id: &Uuid) -> String {
    format!("cart:store:{store_id}")
}

fn line_field(user_id: &Uuid, menu_id: &Uuid) -> String {
    format!("{user_id}:{menu_id}")
}

fn user_prefix(user_id: &Uuid) -> String {
    format!("{user_id}:")
}


// Checks against live Redis. Run with `cargo test -- --ignored` once
// REDIS_URL points at an instance.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::establish_cache;
    use std::str::FromStr;
    use std::thread;

    fn line(name: &str, price: &str, quantity: i64) -> CartLine {
        CartLine {
            menu_id: Uuid::new_v4(),
            menu_name: name.to_string(),
            price: BigDecimal::from_str(price).unwrap(),
            quantity,
        }
    }

    #[test]
    #[ignore = "requires Redis"]
    fn update_of_an_absent_line_is_rejected() {
        let cart = CartStore::new(establish_cache());
        let store_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let err = cart
            .update_item(&store_id, &user_id, &Uuid::new_v4(), 3)
            .unwrap_err();
        assert!(matches!(err, ReservationError::InvalidCart));
        assert!(cart.list_items(&store_id, &user_id).unwrap().is_empty());
    }

    #[test]
    #[ignore = "requires Redis"]
    fn removing_an_absent_line_is_a_no_op() {
        let cart = CartStore::new(establish_cache());
        let store_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let kept = line("Menu A", "10000", 2);
        cart.add_item(&store_id, &user_id, &kept).unwrap();

        cart.remove_item(&store_id, &user_id, &Uuid::new_v4())
            .unwrap();

        assert_eq!(cart.list_items(&store_id, &user_id).unwrap(), vec![kept]);
    }

    #[test]
    #[ignore = "requires Redis"]
    fn concurrent_drains_partition_the_cart() {
        let cart = CartStore::new(establish_cache());
        let store_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let lines: Vec<CartLine> = (0..8)
            .map(|i| line(&format!("Menu {i}"), "1000", i + 1))
            .collect();
        for l in &lines {
            cart.add_item(&store_id, &user_id, l).unwrap();
        }

        let drain = move || {
            CartStore::new(establish_cache())
                .drain(&store_id, &user_id)
                .unwrap()
        };
        let first = thread::spawn(drain.clone());
        let second = thread::spawn(drain);
        let first = first.join().unwrap();
        let second = second.join().unwrap();

        assert_eq!(first.len() + second.len(), lines.len());
        assert!(first.iter().all(|l| !second.contains(l)));
        assert!(cart.list_items(&store_id, &user_id).unwrap().is_empty());
    }

    #[test]
    #[ignore = "requires Redis"]
    fn drain_refreshes_the_store_ttl_for_remaining_users() {
        let cart = CartStore::new(establish_cache());
        let store_id = Uuid::new_v4();
        let drained_user = Uuid::new_v4();
        let other_user = Uuid::new_v4();
        cart.add_item(&store_id, &drained_user, &line("Menu A", "10000", 1))
            .unwrap();
        cart.add_item(&store_id, &other_user, &line("Menu B", "5000", 1))
            .unwrap();

        cart.drain(&store_id, &drained_user).unwrap();

        let conn = &mut establish_cache().get_connection().unwrap();
        let ttl: i64 = conn.ttl(cart_key(&store_id)).unwrap();
        assert!(ttl > 0 && ttl <= CART_TTL_SECONDS);
    }
}
