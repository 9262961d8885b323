//! Shared fixtures for integration tests

#![allow(dead_code)]

use rusqlite::Connection;
use shangbang::storage::{keywords, regions, slots};

/// Fresh in-memory database with the full schema applied.
pub fn test_db() -> Connection {
    shangbang::storage::db::open_in_memory().expect("in-memory db")
}

/// Reference data most dialog tests need: one city with a district, four
/// keywords, two posting slots.
pub struct Fixture {
    pub city_id: i64,
    pub district_id: i64,
    pub keyword_ids: Vec<i64>,
}

pub fn seed_reference_data(conn: &Connection) -> Fixture {
    let city_id = regions::add_city(conn, "北京", 1).expect("add city");
    let district_id = regions::add_district(conn, city_id, "朝阳区", 1).expect("add district");
    let keyword_ids = ["教育", "商务", "家政", "艺术"]
        .iter()
        .enumerate()
        .map(|(i, name)| keywords::add(conn, name, i as i64).expect("add keyword"))
        .collect();
    slots::add(conn, "20:00", 1).expect("add slot");
    slots::add(conn, "21:00", 2).expect("add slot");

    Fixture {
        city_id,
        district_id,
        keyword_ids,
    }
}
