//! Requests against the public services. Run with `--ignored`.

use hydroprep_acquire::tabular::{SdaTabularClient, TabularService};
use hydroprep_acquire::wcs::NlcdWcs;
use hydroprep_acquire::wfs::SsurgoWfs;
use hydroprep_acquire::{HttpConfig, ReqwestClient, Tile, TileSource};
use hydroprep_geo::Extent;

fn tile(bounds: Extent) -> Tile {
    Tile {
        index: 0,
        row: 0,
        col: 0,
        cell: bounds,
        bounds,
    }
}

#[test]
#[ignore = "requires network access"]
fn test_live_wfs_small_extent() {
    let client = ReqwestClient::new(&HttpConfig::default()).unwrap();
    let wfs = SsurgoWfs::new(client);
    let features = wfs
        .fetch(&tile(Extent::new(-80.0, -79.99, 35.0, 35.01).unwrap()))
        .unwrap();
    assert!(!features.is_empty());
    assert!(features.fields().iter().any(|f| f == "mukey"));
}

#[test]
#[ignore = "requires network access"]
fn test_live_wcs_small_extent() {
    let client = ReqwestClient::new(&HttpConfig::with_timeout(300)).unwrap();
    let wcs = NlcdWcs::new(client);
    let raster = wcs
        .fetch(&tile(Extent::new(1_500_000.0, 1_501_500.0, 1_500_000.0, 1_501_500.0).unwrap()))
        .unwrap();
    assert!(raster.rows() > 0 && raster.cols() > 0);
}

#[test]
#[ignore = "requires network access"]
fn test_live_tabular_query() {
    let client = ReqwestClient::new(&HttpConfig::default()).unwrap();
    let sda = SdaTabularClient::new(client);
    let rows = sda
        .query("SELECT TOP 1 mukey, comppct_r, hydgrp FROM component")
        .unwrap();
    assert_eq!(rows.len(), 1);
}
