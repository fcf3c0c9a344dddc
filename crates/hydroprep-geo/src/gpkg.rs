//! Minimal GeoPackage vector I/O.
//!
//! Writes one feature table per file with a `MULTIPOLYGON` geometry column
//! and reads the first feature table back. Geometry blobs are encoded by
//! [`crate::wkb`].

use crate::crs::Crs;
use crate::feature::{AttributeValue, Feature, FeatureCollection};
use crate::{wkb, GeoError, Result};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

const APPLICATION_ID: i32 = 0x4750_4B47; // "GPKG"
const USER_VERSION: i32 = 10300;
const GEOMETRY_COLUMN: &str = "geom";

/// Write `collection` to a new GeoPackage at `path`, replacing any file.
///
/// The layer is named after the file stem.
pub fn write_features<P: AsRef<Path>>(path: P, collection: &FeatureCollection) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let layer = layer_name(path);
    let crs = collection.crs();
    let srs_id = crs.epsg() as i64;

    let mut conn = Connection::open(path)?;
    conn.execute_batch(&format!(
        "PRAGMA application_id = {APPLICATION_ID}; PRAGMA user_version = {USER_VERSION};"
    ))?;

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.execute(
        "INSERT OR REPLACE INTO gpkg_spatial_ref_sys
         (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
         VALUES (?1, ?2, 'EPSG', ?2, ?3, NULL)",
        params![crs.name(), srs_id, crs.wkt().unwrap_or("undefined")],
    )?;

    let columns: Vec<(String, &'static str)> = collection
        .fields()
        .iter()
        .filter(|name| !is_reserved(name))
        .map(|name| (name.clone(), column_type(collection, name)))
        .collect();
    let column_sql: String = columns
        .iter()
        .map(|(name, ty)| format!(", {} {}", quote(name), ty))
        .collect();
    tx.execute_batch(&format!(
        "CREATE TABLE {} (fid INTEGER PRIMARY KEY AUTOINCREMENT, {} MULTIPOLYGON{});",
        quote(&layer),
        GEOMETRY_COLUMN,
        column_sql
    ))?;

    let extent = collection.extent().ok();
    tx.execute(
        "INSERT INTO gpkg_contents
         (table_name, data_type, identifier, description, last_change, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, '', ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            layer,
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            extent.map(|e| e.min_x),
            extent.map(|e| e.min_y),
            extent.map(|e| e.max_x),
            extent.map(|e| e.max_y),
            srs_id
        ],
    )?;
    tx.execute(
        "INSERT INTO gpkg_geometry_columns
         (table_name, column_name, geometry_type_name, srs_id, z, m)
         VALUES (?1, ?2, 'MULTIPOLYGON', ?3, 0, 0)",
        params![layer, GEOMETRY_COLUMN, srs_id],
    )?;

    {
        let placeholders: String = (0..=columns.len())
            .map(|i| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let names: String = std::iter::once(GEOMETRY_COLUMN.to_string())
            .chain(columns.iter().map(|(name, _)| quote(name)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&layer),
            names,
            placeholders
        ))?;
        for feature in collection {
            let mut row: Vec<Value> = Vec::with_capacity(columns.len() + 1);
            row.push(Value::Blob(wkb::write_gpkg_geometry(
                &feature.geometry,
                srs_id as i32,
            )?));
            for (name, ty) in &columns {
                row.push(to_sql_value(feature.property(name), ty));
            }
            insert.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.commit()?;

    debug!(
        "Wrote {} features to layer '{}' of {}",
        collection.len(),
        layer,
        path.display()
    );
    Ok(())
}

/// Read the first feature table of a GeoPackage.
///
/// Non-polygonal geometries and null geometries are skipped.
pub fn read_features<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let invalid = |reason: &str| GeoError::InvalidGeoPackage {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if !path.is_file() {
        return Err(GeoError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }
    let conn = Connection::open(path)?;

    let layer: String = conn
        .query_row(
            "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY rowid LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| invalid("no feature table"))?;
    let (geometry_column, srs_id): (String, i64) = conn
        .query_row(
            "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
            params![layer],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| invalid("feature table has no geometry column"))?;
    if srs_id <= 0 {
        return Err(GeoError::MissingCrs);
    }
    let crs = Crs::from_epsg(srs_id as u32)?;

    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote(&layer)))?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let geometry_index = names
        .iter()
        .position(|n| n.eq_ignore_ascii_case(&geometry_column))
        .ok_or_else(|| invalid("geometry column missing from table"))?;

    let mut collection = FeatureCollection::new(crs);
    for (i, name) in names.iter().enumerate() {
        if i != geometry_index && !name.eq_ignore_ascii_case("fid") {
            collection.add_field(name);
        }
    }

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let geometry = match row.get_ref(geometry_index)? {
            ValueRef::Blob(blob) => wkb::read_gpkg_geometry(blob)?,
            _ => None,
        };
        let Some(geometry) = geometry else {
            continue;
        };
        let mut feature = Feature::new(geometry);
        for (i, name) in names.iter().enumerate() {
            if i == geometry_index || name.eq_ignore_ascii_case("fid") {
                continue;
            }
            let value = match row.get_ref(i)? {
                ValueRef::Null | ValueRef::Blob(_) => AttributeValue::Null,
                ValueRef::Integer(v) => AttributeValue::Integer(v),
                ValueRef::Real(v) => AttributeValue::Real(v),
                ValueRef::Text(t) => AttributeValue::Text(String::from_utf8_lossy(t).into_owned()),
            };
            feature.properties.insert(name.clone(), value);
        }
        collection.push(feature);
    }

    debug!(
        "Read {} features from layer '{}' of {}",
        collection.len(),
        layer,
        path.display()
    );
    Ok(collection)
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("features")
        .to_string()
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn is_reserved(name: &str) -> bool {
    name.eq_ignore_ascii_case("fid") || name.eq_ignore_ascii_case(GEOMETRY_COLUMN)
}

fn column_type(collection: &FeatureCollection, name: &str) -> &'static str {
    let mut ty = "INTEGER";
    let mut seen = false;
    for feature in collection {
        match feature.property(name) {
            AttributeValue::Null => {}
            AttributeValue::Integer(_) => seen = true,
            AttributeValue::Real(_) => {
                seen = true;
                ty = "REAL";
            }
            AttributeValue::Text(_) => return "TEXT",
        }
    }
    if seen {
        ty
    } else {
        "TEXT"
    }
}

fn to_sql_value(value: &AttributeValue, column_type: &str) -> Value {
    match (value, column_type) {
        (AttributeValue::Null, _) => Value::Null,
        (AttributeValue::Integer(v), "REAL") => Value::Real(*v as f64),
        (AttributeValue::Integer(v), _) => Value::Integer(*v),
        (AttributeValue::Real(v), _) => Value::Real(*v),
        (AttributeValue::Text(s), _) => Value::Text(s.clone()),
    }
}

const SCHEMA: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
INSERT INTO gpkg_spatial_ref_sys VALUES
    ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'),
    ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system');
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
);
";
