//! Decoding WFS GetFeature responses (GML 2/3).
//!
//! Handles the shapes soil-survey services emit: `featureMember` /
//! `featureMembers` wrappers, Polygon / MultiSurface / MultiPolygon
//! geometries with `posList`, `pos` or `coordinates` rings, and simple
//! scalar properties. Axis order follows the `srsName` form: URN and URL
//! names of geographic systems are latitude-first, `EPSG:xxxx` is not.

use crate::{AcquireError, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use hydroprep_geo::{AttributeValue, Crs, Feature, FeatureCollection};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

#[derive(Debug, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn find(&self, name: &str) -> Option<&Node> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    fn has_geometry(&self) -> bool {
        is_geometry(&self.name) || self.children.iter().any(Node::has_geometry)
    }

    fn all_text(&self, out: &mut String) {
        if !self.text.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&self.text);
        }
        for child in &self.children {
            child.all_text(out);
        }
    }
}

fn is_geometry(name: &str) -> bool {
    matches!(
        name,
        "Polygon" | "MultiSurface" | "MultiPolygon" | "Surface" | "PolygonPatch"
    )
}

fn local(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn parse_tree(bytes: &[u8]) -> Result<Node> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Node::default()];
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let mut node = Node {
                    name: local(e.local_name().as_ref()),
                    ..Node::default()
                };
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    node.attributes.push((
                        local(attr.key.local_name().as_ref()),
                        attr.unescape_value()?.into_owned(),
                    ));
                }
                stack.push(node);
            }
            Event::Empty(e) => {
                let mut node = Node {
                    name: local(e.local_name().as_ref()),
                    ..Node::default()
                };
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    node.attributes.push((
                        local(attr.key.local_name().as_ref()),
                        attr.unescape_value()?.into_owned(),
                    ));
                }
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(AcquireError::InvalidGml("unbalanced end tag".to_string()));
                }
                if let Some(node) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(AcquireError::InvalidGml("unclosed elements at end of document".to_string()));
    }
    stack
        .pop()
        .and_then(|doc| doc.children.into_iter().next())
        .ok_or_else(|| AcquireError::InvalidGml("empty document".to_string()))
}

/// Decode a GetFeature response into polygon features.
///
/// Exception reports become [`AcquireError::ServiceException`]. Features
/// without a polygonal geometry are skipped.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<FeatureCollection> {
    let root = parse_tree(bytes)?;

    if root.name.contains("Exception") {
        let mut message = String::new();
        root.all_text(&mut message);
        return Err(AcquireError::ServiceException(message));
    }

    let srs_name = find_srs_name(&root);
    let crs = match srs_name {
        Some(name) => Crs::parse(name)?,
        None => Crs::WGS84,
    };
    let lat_lon = srs_name.map(Crs::name_is_lat_lon).unwrap_or(false);

    let mut collection = FeatureCollection::new(crs);
    let mut skipped = 0usize;
    let members = root
        .children
        .iter()
        .filter(|c| c.name == "featureMember" || c.name == "featureMembers")
        .flat_map(|c| c.children.iter());
    for member in members {
        match parse_feature(member, lat_lon)? {
            Some(feature) => collection.push(feature),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("Skipped {} feature(s) without polygon geometry", skipped);
    }
    Ok(collection)
}

fn find_srs_name(node: &Node) -> Option<&str> {
    if let Some(name) = node.attribute("srsName") {
        return Some(name);
    }
    node.children.iter().find_map(find_srs_name)
}

fn parse_feature(node: &Node, lat_lon: bool) -> Result<Option<Feature>> {
    let mut polygons = Vec::new();
    let mut properties = Vec::new();
    for child in &node.children {
        if child.name == "boundedBy" {
            continue;
        }
        if child.has_geometry() {
            collect_polygons(child, lat_lon, &mut polygons)?;
        } else if child.children.is_empty() {
            let value = if child.text.is_empty() {
                AttributeValue::Null
            } else {
                AttributeValue::Text(child.text.clone())
            };
            properties.push((child.name.clone(), value));
        }
    }
    if polygons.is_empty() {
        return Ok(None);
    }

    let mut feature = Feature::new(MultiPolygon::new(polygons));
    for (name, value) in properties {
        feature.properties.insert(name, value);
    }
    Ok(Some(feature))
}

fn collect_polygons(node: &Node, lat_lon: bool, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    let lat_lon = node
        .attribute("srsName")
        .map(Crs::name_is_lat_lon)
        .unwrap_or(lat_lon);

    if matches!(node.name.as_str(), "Polygon" | "PolygonPatch") {
        let exterior = node
            .child("exterior")
            .or_else(|| node.child("outerBoundaryIs"))
            .ok_or_else(|| AcquireError::InvalidGml("polygon without exterior ring".to_string()))?;
        let interiors = node
            .children
            .iter()
            .filter(|c| c.name == "interior" || c.name == "innerBoundaryIs")
            .map(|ring| parse_ring(ring, lat_lon))
            .collect::<Result<Vec<_>>>()?;
        out.push(Polygon::new(parse_ring(exterior, lat_lon)?, interiors));
        return Ok(());
    }
    for child in &node.children {
        collect_polygons(child, lat_lon, out)?;
    }
    Ok(())
}

fn parse_ring(boundary: &Node, lat_lon: bool) -> Result<LineString<f64>> {
    let ring = boundary.find("LinearRing").unwrap_or(boundary);

    let (values, dims) = if let Some(pos_list) = ring.find("posList") {
        let dims = pos_list
            .attribute("srsDimension")
            .or_else(|| pos_list.attribute("dimension"))
            .and_then(|d| d.parse().ok())
            .unwrap_or(2);
        (parse_numbers(&pos_list.text, &[' ', '\t', '\n', '\r'])?, dims)
    } else if let Some(coordinates) = ring.find("coordinates") {
        let mut flat = Vec::new();
        for tuple in coordinates.text.split_whitespace() {
            let v = parse_numbers(tuple, &[','])?;
            if v.len() < 2 {
                return Err(AcquireError::InvalidGml(format!("bad coordinate '{}'", tuple)));
            }
            flat.extend_from_slice(&v[..2]);
        }
        (flat, 2)
    } else {
        let positions: Vec<&Node> = ring.children.iter().filter(|c| c.name == "pos").collect();
        if positions.is_empty() {
            return Err(AcquireError::InvalidGml("ring without coordinates".to_string()));
        }
        let mut flat = Vec::with_capacity(positions.len() * 2);
        for pos in positions {
            let v = parse_numbers(&pos.text, &[' '])?;
            if v.len() < 2 {
                return Err(AcquireError::InvalidGml(format!("bad pos '{}'", pos.text)));
            }
            flat.extend_from_slice(&v[..2]);
        }
        (flat, 2)
    };

    if dims < 2 || values.len() % dims != 0 {
        return Err(AcquireError::InvalidGml(format!(
            "{} ordinates do not divide into {}-D positions",
            values.len(),
            dims
        )));
    }
    Ok(LineString::new(
        values
            .chunks_exact(dims)
            .map(|p| axis(p[0], p[1], lat_lon))
            .collect(),
    ))
}

fn axis(first: f64, second: f64, lat_lon: bool) -> Coord<f64> {
    if lat_lon {
        Coord { x: second, y: first }
    } else {
        Coord { x: first, y: second }
    }
}

fn parse_numbers(text: &str, separators: &[char]) -> Result<Vec<f64>> {
    text.split(|c| separators.contains(&c))
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| AcquireError::InvalidGml(format!("bad number '{}'", s)))
        })
        .collect()
}
