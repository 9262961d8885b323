//! Two-level region hierarchy: city (1) -< district (N)
//!
//! Plain CRUD with toggle-active and display-order. A city cannot be
//! deleted while district rows still reference it.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub display_order: i64,
}

#[derive(Debug, Clone)]
pub struct District {
    pub id: i64,
    pub city_id: i64,
    pub name: String,
    pub is_active: bool,
    pub display_order: i64,
}

fn row_to_city(row: &rusqlite::Row<'_>) -> rusqlite::Result<City> {
    Ok(City {
        id: row.get(0)?,
        name: row.get(1)?,
        is_active: row.get::<_, i64>(2)? != 0,
        display_order: row.get(3)?,
    })
}

fn row_to_district(row: &rusqlite::Row<'_>) -> rusqlite::Result<District> {
    Ok(District {
        id: row.get(0)?,
        city_id: row.get(1)?,
        name: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        display_order: row.get(4)?,
    })
}

pub fn add_city(conn: &Connection, name: &str, display_order: i64) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO cities (name, display_order) VALUES (?1, ?2)",
        params![name.trim(), display_order],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_district(conn: &Connection, city_id: i64, name: &str, display_order: i64) -> AppResult<i64> {
    let city_exists: Option<i64> = conn
        .query_row("SELECT 1 FROM cities WHERE id = ?", params![city_id], |row| row.get(0))
        .optional()?;
    if city_exists.is_none() {
        return Err(AppError::NotFound(format!("city {}", city_id)));
    }

    conn.execute(
        "INSERT INTO districts (city_id, name, display_order) VALUES (?1, ?2, ?3)",
        params![city_id, name.trim(), display_order],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_city_by_id(conn: &Connection, id: i64) -> AppResult<Option<City>> {
    let found = conn
        .query_row(
            "SELECT id, name, is_active, display_order FROM cities WHERE id = ?",
            params![id],
            row_to_city,
        )
        .optional()?;
    Ok(found)
}

pub fn get_district_by_id(conn: &Connection, id: i64) -> AppResult<Option<District>> {
    let found = conn
        .query_row(
            "SELECT id, city_id, name, is_active, display_order FROM districts WHERE id = ?",
            params![id],
            row_to_district,
        )
        .optional()?;
    Ok(found)
}

/// Cities offered at onboarding step 2.
pub fn get_active_cities(conn: &Connection) -> AppResult<Vec<City>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, is_active, display_order FROM cities
         WHERE is_active = 1 ORDER BY display_order ASC, id ASC",
    )?;
    let rows = stmt.query_map([], row_to_city)?;
    let mut cities = Vec::new();
    for row in rows {
        cities.push(row?);
    }
    Ok(cities)
}

/// All cities, for the admin panel.
pub fn get_all_cities(conn: &Connection) -> AppResult<Vec<City>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, is_active, display_order FROM cities ORDER BY display_order ASC, id ASC",
    )?;
    let rows = stmt.query_map([], row_to_city)?;
    let mut cities = Vec::new();
    for row in rows {
        cities.push(row?);
    }
    Ok(cities)
}

/// Active districts of a city, offered at onboarding step 3.
pub fn get_districts_by_city(conn: &Connection, city_id: i64) -> AppResult<Vec<District>> {
    let mut stmt = conn.prepare(
        "SELECT id, city_id, name, is_active, display_order FROM districts
         WHERE city_id = ? AND is_active = 1 ORDER BY display_order ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![city_id], row_to_district)?;
    let mut districts = Vec::new();
    for row in rows {
        districts.push(row?);
    }
    Ok(districts)
}

/// All districts of a city regardless of active flag (admin view).
pub fn get_all_districts_by_city(conn: &Connection, city_id: i64) -> AppResult<Vec<District>> {
    let mut stmt = conn.prepare(
        "SELECT id, city_id, name, is_active, display_order FROM districts
         WHERE city_id = ? ORDER BY display_order ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![city_id], row_to_district)?;
    let mut districts = Vec::new();
    for row in rows {
        districts.push(row?);
    }
    Ok(districts)
}

/// Flips a city's active flag. Returns the new state.
pub fn toggle_city(conn: &Connection, city_id: i64) -> AppResult<bool> {
    let touched = conn.execute(
        "UPDATE cities SET is_active = 1 - is_active WHERE id = ?",
        params![city_id],
    )?;
    if touched == 0 {
        return Err(AppError::NotFound(format!("city {}", city_id)));
    }
    let active: i64 =
        conn.query_row("SELECT is_active FROM cities WHERE id = ?", params![city_id], |row| row.get(0))?;
    Ok(active != 0)
}

/// Flips a district's active flag. Returns the new state.
pub fn toggle_district(conn: &Connection, district_id: i64) -> AppResult<bool> {
    let touched = conn.execute(
        "UPDATE districts SET is_active = 1 - is_active WHERE id = ?",
        params![district_id],
    )?;
    if touched == 0 {
        return Err(AppError::NotFound(format!("district {}", district_id)));
    }
    let active: i64 = conn.query_row(
        "SELECT is_active FROM districts WHERE id = ?",
        params![district_id],
        |row| row.get(0),
    )?;
    Ok(active != 0)
}

/// Deletes a city. Blocked while any district still references it.
pub fn delete_city(conn: &Connection, city_id: i64) -> AppResult<()> {
    let districts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM districts WHERE city_id = ?",
        params![city_id],
        |row| row.get(0),
    )?;
    if districts > 0 {
        return Err(AppError::Conflict(format!(
            "city {} still has {} district(s)",
            city_id, districts
        )));
    }

    let removed = conn.execute("DELETE FROM cities WHERE id = ?", params![city_id])?;
    if removed == 0 {
        return Err(AppError::NotFound(format!("city {}", city_id)));
    }
    Ok(())
}

pub fn delete_district(conn: &Connection, district_id: i64) -> AppResult<()> {
    let removed = conn.execute("DELETE FROM districts WHERE id = ?", params![district_id])?;
    if removed == 0 {
        return Err(AppError::NotFound(format!("district {}", district_id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;

    #[test]
    fn test_city_district_hierarchy() {
        let conn = open_in_memory().unwrap();
        let beijing = add_city(&conn, "北京", 1).unwrap();
        let shanghai = add_city(&conn, "上海", 2).unwrap();
        let chaoyang = add_district(&conn, beijing, "朝阳区", 1).unwrap();
        add_district(&conn, beijing, "海淀区", 2).unwrap();

        let cities = get_active_cities(&conn).unwrap();
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].name, "北京");

        let districts = get_districts_by_city(&conn, beijing).unwrap();
        assert_eq!(districts.len(), 2);
        assert_eq!(districts[0].id, chaoyang);
        assert!(get_districts_by_city(&conn, shanghai).unwrap().is_empty());

        // District resolves to exactly one parent city.
        let district = get_district_by_id(&conn, chaoyang).unwrap().unwrap();
        assert_eq!(district.city_id, beijing);
    }

    #[test]
    fn test_toggle_hides_from_active_lists() {
        let conn = open_in_memory().unwrap();
        let city = add_city(&conn, "广州", 1).unwrap();
        let district = add_district(&conn, city, "天河区", 1).unwrap();

        assert!(!toggle_city(&conn, city).unwrap());
        assert!(get_active_cities(&conn).unwrap().is_empty());
        assert!(toggle_city(&conn, city).unwrap());

        assert!(!toggle_district(&conn, district).unwrap());
        assert!(get_districts_by_city(&conn, city).unwrap().is_empty());
        assert_eq!(get_all_districts_by_city(&conn, city).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_city_blocked_by_districts() {
        let conn = open_in_memory().unwrap();
        let city = add_city(&conn, "深圳", 1).unwrap();
        let district = add_district(&conn, city, "南山区", 1).unwrap();

        assert!(matches!(delete_city(&conn, city), Err(AppError::Conflict(_))));

        delete_district(&conn, district).unwrap();
        delete_city(&conn, city).unwrap();
        assert!(get_city_by_id(&conn, city).unwrap().is_none());
    }

    #[test]
    fn test_add_district_requires_city() {
        let conn = open_in_memory().unwrap();
        assert!(matches!(
            add_district(&conn, 999, "幽灵区", 1),
            Err(AppError::NotFound(_))
        ));
    }
}
