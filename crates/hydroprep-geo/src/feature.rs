//! Polygon feature collections with simple typed attributes.

use crate::crs::{reproject, Crs};
use crate::{Extent, GeoError, Result};
use geo::{BooleanOps, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Missing value.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
}

impl AttributeValue {
    /// Whether the value is missing.
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Text view of the value; `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Integer(v) => Some(v.to_string()),
            AttributeValue::Real(v) => Some(v.to_string()),
            AttributeValue::Text(s) => Some(s.clone()),
        }
    }

    /// Integer view. Text is parsed; reals are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            AttributeValue::Real(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point view. Text is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Real(v) => Some(*v),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            AttributeValue::Null => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Real(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// A polygonal feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Geometry; single polygons are stored as one-part multipolygons.
    pub geometry: MultiPolygon<f64>,
    /// Attributes keyed by field name.
    pub properties: BTreeMap<String, AttributeValue>,
}

impl Feature {
    /// Create a feature without attributes.
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_property(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Attribute value, `Null` when the field is absent.
    pub fn property(&self, name: &str) -> &AttributeValue {
        static NULL: AttributeValue = AttributeValue::Null;
        self.properties.get(name).unwrap_or(&NULL)
    }
}

/// An ordered collection of features sharing one CRS and field list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    crs: Crs,
    fields: Vec<String>,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create an empty collection.
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            fields: Vec::new(),
            features: Vec::new(),
        }
    }

    /// The collection's CRS.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Field names in order of first appearance.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Declare a field even if no feature carries it yet.
    pub fn add_field(&mut self, name: &str) {
        if !self.fields.iter().any(|f| f == name) {
            self.fields.push(name.to_string());
        }
    }

    /// Append a feature, extending the field list as needed.
    pub fn push(&mut self, feature: Feature) {
        for name in feature.properties.keys() {
            if !self.fields.iter().any(|f| f == name) {
                self.fields.push(name.clone());
            }
        }
        self.features.push(feature);
    }

    /// Append all features of another collection in the same CRS.
    pub fn extend(&mut self, other: FeatureCollection) -> Result<()> {
        if !self.crs.same_as(&other.crs) {
            return Err(GeoError::CrsMismatch(self.crs.epsg(), other.crs.epsg()));
        }
        for name in &other.fields {
            self.add_field(name);
        }
        self.features.extend(other.features);
        Ok(())
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether there are no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate over features.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Borrow the feature list.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Consume into the feature list.
    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    /// Keep only the features matching `keep`.
    pub fn retain<F: FnMut(&Feature) -> bool>(&mut self, keep: F) {
        self.features.retain(keep);
    }

    /// Restrict the field list (and every feature's attributes) to `names`.
    pub fn select_fields(&mut self, names: &[&str]) {
        self.fields.retain(|f| names.contains(&f.as_str()));
        for feature in &mut self.features {
            feature.properties.retain(|k, _| names.contains(&k.as_str()));
        }
    }

    /// Bounding extent of all features.
    pub fn extent(&self) -> Result<Extent> {
        let mut extent: Option<Extent> = None;
        for feature in &self.features {
            if let Ok(e) = Extent::of_geometry(&feature.geometry) {
                extent = Some(match extent {
                    Some(acc) => acc.union(&e),
                    None => e,
                });
            }
        }
        extent.ok_or_else(|| GeoError::EmptyGeometry("feature collection".to_string()))
    }

    /// A copy of the collection in another CRS.
    pub fn reprojected(&self, to: Crs) -> Result<Self> {
        let features = self
            .features
            .iter()
            .map(|f| {
                Ok(Feature {
                    geometry: reproject(&f.geometry, self.crs, to)?,
                    properties: f.properties.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            crs: to,
            fields: self.fields.clone(),
            features,
        })
    }

    /// Merge the geometries of features sharing a value of `field`.
    ///
    /// Features whose value is null are dropped. Output is ordered by the
    /// text form of the value and carries only `field`.
    pub fn dissolve_by(&self, field: &str) -> FeatureCollection {
        let mut groups: BTreeMap<String, (AttributeValue, Vec<MultiPolygon<f64>>)> =
            BTreeMap::new();
        for feature in &self.features {
            let value = feature.property(field);
            if let Some(key) = value.as_text() {
                groups
                    .entry(key)
                    .or_insert_with(|| (value.clone(), Vec::new()))
                    .1
                    .push(feature.geometry.clone());
            }
        }

        let mut out = FeatureCollection::new(self.crs);
        out.add_field(field);
        for (_, (value, parts)) in groups {
            out.push(Feature::new(union_all(parts)).with_property(field, value));
        }
        out
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Union many multipolygons by pairwise reduction.
pub fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    parts.retain(|p| !p.0.is_empty());
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len() / 2 + 1);
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}
