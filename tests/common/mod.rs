//! Shared test utilities.

#![allow(dead_code, unused_imports)]

pub mod mock_store;

use bakery_state::state::StatsSnapshot;
use serde_json::{json, Value};

/// Profile record as the backend stores it.
pub fn player_record(username: &str, stats: &StatsSnapshot) -> Value {
    let mut record = serde_json::to_value(stats).unwrap();
    record["username"] = json!(username);
    record["email"] = json!(format!("{}@bakery.test", username));
    record
}
