//! Tiled feature acquisition against an in-process feature service.
//!
//! The fake service holds a 10x10 grid of map-unit squares and answers each
//! GetFeature request with the squares touching the requested box, so
//! overlapping tiles return the same polygons more than once.

use geo::{polygon, MultiPolygon};
use hydroprep_acquire::clip::clip_features;
use hydroprep_acquire::merge::merge_features;
use hydroprep_acquire::wfs::SsurgoWfs;
use hydroprep_acquire::{
    acquire, plan_tiles, AcquireError, HttpClient, Result, RetryPolicy, Schedule, TilingPolicy,
};
use hydroprep_geo::{AreaOfInterest, Crs, Extent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

const ORIGIN: (f64, f64) = (-80.0, 35.0);
const UNIT: f64 = 0.05;
const GRID: usize = 10;

struct FakeWfs {
    calls: AtomicUsize,
    /// Requests whose BBOX starts west of this longitude fail.
    fail_west_of: Option<f64>,
}

impl FakeWfs {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_west_of: None,
        }
    }
}

fn bbox(url: &str) -> [f64; 4] {
    let raw = url
        .split('&')
        .find_map(|p| p.strip_prefix("BBOX="))
        .expect("request has BBOX");
    let v: Vec<f64> = raw.split(',').map(|s| s.parse().unwrap()).collect();
    [v[0], v[1], v[2], v[3]]
}

impl HttpClient for FakeWfs {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let [min_x, min_y, max_x, max_y] = bbox(url);
        if let Some(limit) = self.fail_west_of {
            if min_x < limit {
                return Err(AcquireError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
        }

        let mut members = String::new();
        for row in 0..GRID {
            for col in 0..GRID {
                let x0 = ORIGIN.0 + col as f64 * UNIT;
                let y0 = ORIGIN.1 + row as f64 * UNIT;
                let (x1, y1) = (x0 + UNIT, y0 + UNIT);
                if x1 < min_x || x0 > max_x || y1 < min_y || y0 > max_y {
                    continue;
                }
                members.push_str(&format!(
                    "<gml:featureMember><ms:mapunitpoly>\
                     <ms:msGeometry><gml:Polygon srsName=\"EPSG:4326\"><gml:exterior><gml:LinearRing>\
                     <gml:posList>{x0} {y0} {x1} {y0} {x1} {y1} {x0} {y1} {x0} {y0}</gml:posList>\
                     </gml:LinearRing></gml:exterior></gml:Polygon></ms:msGeometry>\
                     <ms:mukey>{}</ms:mukey></ms:mapunitpoly></gml:featureMember>",
                    row * GRID + col
                ));
            }
        }
        Ok(format!(
            "<wfs:FeatureCollection xmlns:wfs=\"w\" xmlns:gml=\"g\" xmlns:ms=\"m\">{}</wfs:FeatureCollection>",
            members
        )
        .into_bytes())
    }

    fn post_json(&self, _url: &str, _body: &serde_json::Value) -> Result<Vec<u8>> {
        unreachable!()
    }
}

fn study_area() -> AreaOfInterest {
    let (x0, y0) = ORIGIN;
    let size = UNIT * GRID as f64;
    AreaOfInterest::new(
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]]),
        Crs::WGS84,
    )
    .unwrap()
}

fn forced_tiling() -> TilingPolicy {
    TilingPolicy {
        small_area_threshold: 0.0,
        ..TilingPolicy::SOILS
    }
}

#[test]
fn test_overlapping_tiles_merge_to_unique_units() {
    let aoi = study_area();
    let extent = aoi.extent().unwrap();
    let tiles = plan_tiles(&extent, aoi.geometry(), &forced_tiling(), extent.area()).unwrap();
    assert_eq!(tiles.len(), 4);

    let wfs = SsurgoWfs::new(FakeWfs::new());
    let report = acquire(&wfs, &tiles, &RetryPolicy::SOILS, Schedule::Parallel { workers: 2 }).unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(wfs.client().calls.load(Ordering::SeqCst), 4);

    let fetched: usize = report.retrieved.iter().map(|(_, fc)| fc.len()).sum();
    assert!(fetched > GRID * GRID);

    let merged = merge_features(report.into_data(), Crs::WGS84, "mukey").unwrap();
    assert_eq!(merged.len(), GRID * GRID);

    let clipped = clip_features(&merged, &aoi).unwrap();
    assert_eq!(clipped.len(), GRID * GRID);
    let keys: HashSet<String> = clipped
        .iter()
        .filter_map(|f| f.property("mukey").as_text())
        .collect();
    assert_eq!(keys.len(), GRID * GRID);
}

#[test]
fn test_small_area_is_one_request() {
    let aoi = study_area();
    let extent = aoi.extent().unwrap();
    let tiles = plan_tiles(&extent, aoi.geometry(), &TilingPolicy::SOILS, extent.area()).unwrap();
    assert_eq!(tiles.len(), 1);

    let wfs = SsurgoWfs::new(FakeWfs::new());
    let report = acquire(&wfs, &tiles, &RetryPolicy::SOILS, Schedule::Serial).unwrap();
    assert_eq!(report.retrieved.len(), 1);
    assert_eq!(wfs.client().calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_tiles_leave_a_partial_result() {
    let aoi = study_area();
    let extent = aoi.extent().unwrap();
    let tiles = plan_tiles(&extent, aoi.geometry(), &forced_tiling(), extent.area()).unwrap();

    let wfs = SsurgoWfs::new(FakeWfs {
        calls: AtomicUsize::new(0),
        fail_west_of: Some(ORIGIN.0 + 0.1),
    });
    let report = acquire(&wfs, &tiles, &RetryPolicy::SOILS, Schedule::Parallel { workers: 2 }).unwrap();
    assert_eq!(report.retrieved.len(), 2);
    assert_eq!(report.failed.len(), 2);
    // Two failing tiles, three attempts in each of two passes.
    assert_eq!(wfs.client().calls.load(Ordering::SeqCst), 2 + 2 * 6);

    let merged = merge_features(report.into_data(), Crs::WGS84, "mukey").unwrap();
    let east = Extent::new(ORIGIN.0 + 0.25 - 0.0015, -79.5, 35.0, 35.5).unwrap();
    for feature in &merged {
        let e = Extent::of_geometry(&feature.geometry).unwrap();
        assert!(e.max_x >= east.min_x);
    }
}

#[test]
fn test_every_tile_failing_is_fatal() {
    let aoi = study_area();
    let extent = aoi.extent().unwrap();
    let tiles = plan_tiles(&extent, aoi.geometry(), &forced_tiling(), extent.area()).unwrap();

    let wfs = SsurgoWfs::new(FakeWfs {
        calls: AtomicUsize::new(0),
        fail_west_of: Some(0.0),
    });
    let err = acquire(&wfs, &tiles, &RetryPolicy::SOILS, Schedule::Serial).unwrap_err();
    assert!(matches!(err, AcquireError::NoDataRetrieved { requested: 4 }));
}
