//! Land-cover code to Manning's n lookup tables.

use crate::{LandcoverError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Columns a lookup CSV must have. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 3] = ["value", "nlcd_name", "mannings_n"];

/// NLCD classes and their default roughness.
const DEFAULT_NLCD: [(i64, &str, f64); 20] = [
    (11, "Open Water", 0.03),
    (12, "Perennial Ice/Snow", 0.09999),
    (21, "Developed Open Space", 0.045),
    (22, "Developed Low Intensity", 0.075),
    (23, "Developed Medium Intensity", 0.081),
    (24, "Developed High Intensity", 0.137),
    (31, "Barren Land", 0.03),
    (41, "Deciduous Forest", 0.114),
    (42, "Evergreen Forest", 0.13),
    (43, "Mixed Forest", 0.121),
    (51, "Dwarf Scrub", 0.09999),
    (52, "Shrub Scrub", 0.04),
    (71, "Herbaceous Grassland", 0.035),
    (72, "Herbaceous Sedge", 0.09999),
    (73, "Lichens", 0.09999),
    (74, "Moss", 0.09999),
    (81, "Hay Pasture", 0.04),
    (82, "Cultivated Crops", 0.04),
    (90, "Woody Wetlands", 0.08),
    (95, "Emergent Herbaceous Wetlands", 0.079),
];

/// One land-cover class.
#[derive(Debug, Clone, PartialEq)]
pub struct RoughnessClass {
    /// Class name.
    pub name: String,
    /// Manning's roughness coefficient.
    pub mannings_n: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    value: i64,
    nlcd_name: String,
    mannings_n: f64,
}

/// Land-cover code to roughness mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoughnessLookup {
    classes: BTreeMap<i64, RoughnessClass>,
}

impl RoughnessLookup {
    /// The built-in NLCD table.
    pub fn default_nlcd() -> Self {
        let classes = DEFAULT_NLCD
            .iter()
            .map(|&(value, name, mannings_n)| {
                (
                    value,
                    RoughnessClass {
                        name: name.to_string(),
                        mannings_n,
                    },
                )
            })
            .collect();
        Self { classes }
    }

    /// Check that `path` has every column in [`REQUIRED_COLUMNS`].
    pub fn validate_csv(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = reader.headers()?;
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(LandcoverError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Load a lookup CSV. A code listed twice takes its last value.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::validate_csv(path)?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut classes = BTreeMap::new();
        for record in reader.deserialize::<Record>() {
            let record = record?;
            classes.insert(
                record.value,
                RoughnessClass {
                    name: record.nlcd_name,
                    mannings_n: record.mannings_n,
                },
            );
        }
        info!("Loaded {} roughness class(es) from {}", classes.len(), path.display());
        Ok(Self { classes })
    }

    /// Roughness for `code`.
    pub fn get(&self, code: i64) -> Option<f64> {
        self.classes.get(&code).map(|c| c.mannings_n)
    }

    /// Class for `code`.
    pub fn class(&self, code: i64) -> Option<&RoughnessClass> {
        self.classes.get(&code)
    }

    /// Add or replace a class.
    pub fn insert(&mut self, code: i64, name: &str, mannings_n: f64) {
        self.classes.insert(
            code,
            RoughnessClass {
                name: name.to_string(),
                mannings_n,
            },
        );
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes in code order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &RoughnessClass)> {
        self.classes.iter().map(|(code, class)| (*code, class))
    }

    /// Write as `value,nlcd_name,mannings_n`.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        for (value, class) in self.iter() {
            writer.serialize(Record {
                value,
                nlcd_name: class.name.clone(),
                mannings_n: class.mannings_n,
            })?;
        }
        writer.flush()?;
        debug!("Wrote {} class(es) to {}", self.len(), path.as_ref().display());
        Ok(())
    }
}

/// Write the built-in NLCD table to `path`, which must end in `.csv`.
pub fn export_default_csv(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(LandcoverError::InvalidCsvExtension(path.to_path_buf()));
    }
    RoughnessLookup::default_nlcd().write_csv(path)?;
    info!("Default NLCD to Manning's n lookup table saved to {}", path.display());
    Ok(())
}
