//! Hydrologic soil group assignment.
//!
//! Each SSURGO map unit is made of components, and each component carries
//! a share of the map unit (`comppct_r`) and a hydrologic group (`hydgrp`).
//! A map unit is assigned the group whose components add up to the largest
//! share. Polygons are then dissolved by group.

use crate::{Result, SoilsError};
use hydroprep_geo::{AttributeValue, Feature, FeatureCollection};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Map-unit key field of SSURGO polygons.
pub const MUKEY_FIELD: &str = "mukey";

/// Attribute holding the hydrologic group in classified output.
pub const SOIL_CLASS_FIELD: &str = "Soil_Class";

/// One component record: `(mukey, comppct_r, hydgrp)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRow {
    /// Map-unit key.
    pub mukey: String,
    /// Representative component percentage.
    pub comppct_r: Option<f64>,
    /// Hydrologic group, e.g. `B` or `A/D`.
    pub hydgrp: Option<String>,
}

/// The group chosen for one map unit and its summed percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct HydroGroup {
    /// Hydrologic group as reported by the service.
    pub hydgrp: String,
    /// Map-unit key.
    pub mukey: String,
    /// Summed component percentage of that group.
    pub pct: f64,
}

/// Distinct map-unit keys of a soils layer, sorted.
pub fn unique_mukeys(soils: &FeatureCollection) -> Result<Vec<String>> {
    if !soils.fields().iter().any(|f| f == MUKEY_FIELD) {
        return Err(SoilsError::MissingField(MUKEY_FIELD.to_string()));
    }
    let keys: BTreeSet<String> = soils
        .iter()
        .filter_map(|f| f.property(MUKEY_FIELD).as_text())
        .map(|k| k.trim().to_string())
        .collect();
    Ok(keys.into_iter().collect())
}

/// The component query for `mukeys`, or `None` if no key is usable.
///
/// Keys must be all digits; anything else is skipped so it cannot end up
/// inside the query text.
pub fn component_query(mukeys: &[String]) -> Option<String> {
    let (valid, rejected): (Vec<&String>, Vec<&String>) = mukeys
        .iter()
        .partition(|k| !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()));
    if !rejected.is_empty() {
        warn!(
            "Skipping {} non-numeric map unit key(s): {:?}",
            rejected.len(),
            rejected
        );
    }
    if valid.is_empty() {
        return None;
    }
    let list = valid
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(",");
    Some(format!(
        "SELECT mukey, comppct_r, hydgrp FROM component WHERE mukey IN ({})",
        list
    ))
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Interpret the service's `[mukey, comppct_r, hydgrp]` rows.
pub fn parse_component_rows(rows: Vec<Vec<Value>>) -> Result<Vec<ComponentRow>> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let invalid = |reason: String| SoilsError::InvalidRow { index, reason };
            if row.len() < 3 {
                return Err(invalid(format!("expected 3 columns, got {}", row.len())));
            }
            let mukey = cell_text(&row[0]).ok_or_else(|| invalid("null mukey".to_string()))?;
            let comppct_r = match cell_text(&row[1]) {
                None => None,
                Some(text) => Some(
                    text.trim()
                        .parse::<f64>()
                        .map_err(|_| invalid(format!("bad comppct_r '{}'", text)))?,
                ),
            };
            Ok(ComponentRow {
                mukey,
                comppct_r,
                hydgrp: cell_text(&row[2]),
            })
        })
        .collect()
}

/// Pick one hydrologic group per map unit.
///
/// Percentages are summed per `(mukey, hydgrp)`; rows without a group are
/// ignored and missing percentages count as zero. The largest sum wins;
/// on a tie the group that sorts first wins. Output is ordered by mukey.
pub fn assign_hydro_groups(rows: &[ComponentRow]) -> Vec<HydroGroup> {
    let mut sums: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for row in rows {
        let Some(group) = row.hydgrp.as_deref() else {
            continue;
        };
        *sums
            .entry(row.mukey.as_str())
            .or_default()
            .entry(group)
            .or_insert(0.0) += row.comppct_r.unwrap_or(0.0);
    }

    sums.into_iter()
        .filter_map(|(mukey, groups)| {
            let mut best: Option<(&str, f64)> = None;
            for (group, pct) in groups {
                if best.map_or(true, |(_, max)| pct > max) {
                    best = Some((group, pct));
                }
            }
            best.map(|(group, pct)| HydroGroup {
                hydgrp: group.to_string(),
                mukey: mukey.to_string(),
                pct,
            })
        })
        .collect()
}

/// Make a group label safe for file names and attribute systems.
pub fn normalize_label(label: &str) -> String {
    label.replace('/', "-")
}

fn key_of(value: &AttributeValue) -> Option<String> {
    match value.as_i64() {
        Some(n) => Some(n.to_string()),
        None => value.as_text().map(|t| t.trim().to_string()),
    }
}

/// Join groups onto polygons, dissolve by group and normalize labels.
///
/// Polygons whose map unit has no group are dropped. The result has a
/// single attribute, [`SOIL_CLASS_FIELD`].
pub fn classify_soils(soils: &FeatureCollection, groups: &[HydroGroup]) -> Result<FeatureCollection> {
    if !soils.fields().iter().any(|f| f == MUKEY_FIELD) {
        return Err(SoilsError::MissingField(MUKEY_FIELD.to_string()));
    }
    let lookup: HashMap<String, &str> = groups
        .iter()
        .filter_map(|g| key_of(&AttributeValue::from(g.mukey.as_str())).map(|k| (k, g.hydgrp.as_str())))
        .collect();

    let mut joined = FeatureCollection::new(soils.crs());
    let mut unmatched = 0usize;
    for feature in soils {
        let group = key_of(feature.property(MUKEY_FIELD)).and_then(|k| lookup.get(&k).copied());
        match group {
            Some(group) => joined.push(Feature::new(feature.geometry.clone()).with_property("hydgrp", group)),
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        warn!(
            "{} polygon(s) have no hydrologic group and were dropped",
            unmatched
        );
    }

    let mut classes = FeatureCollection::new(soils.crs());
    classes.add_field(SOIL_CLASS_FIELD);
    for feature in joined.dissolve_by("hydgrp") {
        let Some(label) = feature.property("hydgrp").as_text() else {
            continue;
        };
        debug!("Soil class {}", label);
        classes.push(
            Feature::new(feature.geometry).with_property(SOIL_CLASS_FIELD, normalize_label(&label)),
        );
    }
    info!("Classified soils into {} hydrologic group(s)", classes.len());
    Ok(classes)
}

/// Write the raw component rows (`,mukey,comppct_r,hydgrp`).
///
/// The first, unnamed column is the row position.
pub fn write_component_csv<P: AsRef<Path>>(path: P, rows: &[ComponentRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["", "mukey", "comppct_r", "hydgrp"])?;
    for (index, row) in rows.iter().enumerate() {
        writer.serialize((index, &row.mukey, row.comppct_r, &row.hydgrp))?;
    }
    writer.flush()?;
    debug!("Wrote {} component row(s) to {}", rows.len(), path.as_ref().display());
    Ok(())
}

/// Write the chosen group per map unit (`,hydgrp,mukey,pct`).
pub fn write_hydrogroup_csv<P: AsRef<Path>>(path: P, groups: &[HydroGroup]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["", "hydgrp", "mukey", "pct"])?;
    for (index, group) in groups.iter().enumerate() {
        writer.serialize((index, &group.hydgrp, &group.mukey, group.pct))?;
    }
    writer.flush()?;
    debug!("Wrote {} group row(s) to {}", groups.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, MultiPolygon};
    use hydroprep_geo::Crs;
    use serde_json::json;

    fn row(mukey: &str, pct: f64, group: &str) -> ComponentRow {
        ComponentRow {
            mukey: mukey.to_string(),
            comppct_r: Some(pct),
            hydgrp: Some(group.to_string()),
        }
    }

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 1.0),
        ]])
    }

    #[test]
    fn test_max_summed_percentage_wins() {
        let rows = vec![row("100", 30.0, "A"), row("100", 45.0, "B"), row("100", 25.0, "C")];
        let groups = assign_hydro_groups(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].hydgrp, "B");
        assert_eq!(groups[0].pct, 45.0);
    }

    #[test]
    fn test_components_of_same_group_are_summed() {
        let rows = vec![
            row("7", 30.0, "C"),
            row("7", 25.0, "D"),
            row("7", 25.0, "D"),
            row("7", 20.0, "A"),
        ];
        let groups = assign_hydro_groups(&rows);
        assert_eq!(groups[0].hydgrp, "D");
        assert_eq!(groups[0].pct, 50.0);
    }

    #[test]
    fn test_tie_goes_to_first_label() {
        let rows = vec![row("1", 50.0, "C"), row("1", 50.0, "B")];
        assert_eq!(assign_hydro_groups(&rows)[0].hydgrp, "B");
    }

    #[test]
    fn test_null_groups_and_percentages() {
        let rows = vec![
            ComponentRow {
                mukey: "1".to_string(),
                comppct_r: Some(90.0),
                hydgrp: None,
            },
            ComponentRow {
                mukey: "1".to_string(),
                comppct_r: None,
                hydgrp: Some("D".to_string()),
            },
            ComponentRow {
                mukey: "2".to_string(),
                comppct_r: Some(100.0),
                hydgrp: None,
            },
        ];
        let groups = assign_hydro_groups(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].mukey, "1");
        assert_eq!(groups[0].hydgrp, "D");
        assert_eq!(groups[0].pct, 0.0);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("A/D"), "A-D");
        assert_eq!(normalize_label("C/D"), "C-D");
        for label in ["A", "B", "C", "D", "A-D"] {
            assert_eq!(normalize_label(label), label);
        }
    }

    #[test]
    fn test_component_query() {
        let keys = vec!["545801".to_string(), "545802".to_string()];
        assert_eq!(
            component_query(&keys).unwrap(),
            "SELECT mukey, comppct_r, hydgrp FROM component WHERE mukey IN (545801,545802)"
        );
    }

    #[test]
    fn test_component_query_rejects_non_numeric_keys() {
        let keys = vec!["1); DROP TABLE component; --".to_string(), "42".to_string()];
        assert_eq!(
            component_query(&keys).unwrap(),
            "SELECT mukey, comppct_r, hydgrp FROM component WHERE mukey IN (42)"
        );
        assert!(component_query(&["x".to_string()]).is_none());
        assert!(component_query(&[]).is_none());
    }

    #[test]
    fn test_parse_component_rows() {
        let rows = vec![
            vec![json!("545801"), json!("60"), json!("B")],
            vec![json!(545802), json!(40.5), Value::Null],
            vec![json!("545803"), Value::Null, json!("A/D")],
        ];
        let parsed = parse_component_rows(rows).unwrap();
        assert_eq!(parsed[0], row("545801", 60.0, "B"));
        assert_eq!(parsed[1].mukey, "545802");
        assert_eq!(parsed[1].comppct_r, Some(40.5));
        assert_eq!(parsed[1].hydgrp, None);
        assert_eq!(parsed[2].comppct_r, None);

        let bad = parse_component_rows(vec![vec![json!("1"), json!("sixty"), json!("B")]]);
        assert!(matches!(bad, Err(SoilsError::InvalidRow { index: 0, .. })));
    }

    #[test]
    fn test_classify_dissolves_and_drops_unmatched() {
        let mut soils = FeatureCollection::new(Crs::WGS84);
        soils.push(Feature::new(square(0.0)).with_property(MUKEY_FIELD, "1"));
        soils.push(Feature::new(square(1.0)).with_property(MUKEY_FIELD, "2"));
        soils.push(Feature::new(square(2.0)).with_property(MUKEY_FIELD, "3"));
        soils.push(Feature::new(square(3.0)).with_property(MUKEY_FIELD, "99"));

        let groups = vec![
            HydroGroup { hydgrp: "A/D".to_string(), mukey: "1".to_string(), pct: 80.0 },
            HydroGroup { hydgrp: "A/D".to_string(), mukey: "2".to_string(), pct: 70.0 },
            HydroGroup { hydgrp: "B".to_string(), mukey: "3".to_string(), pct: 90.0 },
        ];
        let classes = classify_soils(&soils, &groups).unwrap();
        assert_eq!(classes.fields(), &[SOIL_CLASS_FIELD.to_string()]);
        assert_eq!(classes.len(), 2);

        let labels: Vec<String> = classes
            .iter()
            .filter_map(|f| f.property(SOIL_CLASS_FIELD).as_text())
            .collect();
        assert_eq!(labels, vec!["A-D", "B"]);
        assert!((classes.features()[0].geometry.unsigned_area() - 2.0).abs() < 1e-9);
        for feature in &classes {
            assert_eq!(feature.properties.len(), 1);
        }
    }

    #[test]
    fn test_classify_matches_integer_and_text_keys() {
        let mut soils = FeatureCollection::new(Crs::WGS84);
        soils.push(Feature::new(square(0.0)).with_property(MUKEY_FIELD, 545801i64));
        let groups = vec![HydroGroup {
            hydgrp: "C".to_string(),
            mukey: "545801".to_string(),
            pct: 100.0,
        }];
        assert_eq!(classify_soils(&soils, &groups).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_mukey_field() {
        let mut soils = FeatureCollection::new(Crs::WGS84);
        soils.push(Feature::new(square(0.0)).with_property("musym", "CeB2"));
        assert!(matches!(unique_mukeys(&soils), Err(SoilsError::MissingField(_))));
    }

    #[test]
    fn test_csv_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let components = dir.path().join("component_source_data.csv");
        write_component_csv(
            &components,
            &[
                row("545801", 60.0, "B"),
                ComponentRow {
                    mukey: "545801".to_string(),
                    comppct_r: Some(40.0),
                    hydgrp: None,
                },
            ],
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&components).unwrap(),
            ",mukey,comppct_r,hydgrp\n0,545801,60.0,B\n1,545801,40.0,\n"
        );

        let groups = dir.path().join("hydrogroup_data.csv");
        write_hydrogroup_csv(
            &groups,
            &[HydroGroup {
                hydgrp: "B".to_string(),
                mukey: "545801".to_string(),
                pct: 60.0,
            }],
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&groups).unwrap(),
            ",hydgrp,mukey,pct\n0,B,545801,60.0\n"
        );
    }
}
