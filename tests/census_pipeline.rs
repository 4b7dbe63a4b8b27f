// End-to-end census loads against in-memory archives and stub providers:
//   tract output with merged themes, hex output with conserved totals,
//   urban clipping, skipped themes, and the warehouse path.

use std::{
    cell::RefCell,
    io::{Cursor, Write},
};

use anyhow::Result;
use atlasbr::{
    CensusLayer, CensusRequest, Catalog, Collaborators, FootprintProvider, Geometries, HexOptions, ID_COLUMN,
    MemSource, Output, Place, RawTracts, Settings, Strategy, Theme, TractProvider, WarehouseClient, YEAR_COLUMN,
    load_census,
};
use geo::{MultiPolygon, Rect, coord};
use polars::{frame::DataFrame, prelude::Column};
use zip::write::SimpleFileOptions;

const RIO: u32 = 3304557;

fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size }).to_polygon()])
}

struct StubTracts;

impl TractProvider for StubTracts {
    fn tracts(&self, munis: &[u32], _year: u16) -> Result<RawTracts> {
        assert_eq!(munis, &[RIO]);
        Ok(RawTracts {
            codes: vec!["330455705000001".into(), "330455705000002.0".into()],
            shapes: vec![square(-43.21, -22.91, 0.01), square(-43.20, -22.91, 0.01)],
            epsg: 4674,
        })
    }
}

struct StubFootprint(Geometries);

impl FootprintProvider for StubFootprint {
    fn footprint(&self, _year: u16) -> Result<Geometries> {
        Ok(self.0.clone())
    }
}

struct StubWarehouse {
    queries: RefCell<Vec<String>>,
}

impl WarehouseClient for StubWarehouse {
    fn read_sql(&self, query: &str, _billing_project: &str) -> Result<DataFrame> {
        self.queries.borrow_mut().push(query.to_string());
        Ok(DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), vec!["330455705000001", "330455705000002"]),
            Column::new("v001".into(), vec![40.0, 10.0]),
            Column::new("v002".into(), vec![120.0, 30.0]),
        ])?)
    }
}

fn zip_with(name: &str, body: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, SimpleFileOptions::default()).unwrap();
    writer.write_all(body).unwrap();
    writer.finish().unwrap().into_inner()
}

/// The 2010 per-state archive directory with a Rio de Janeiro dump.
fn archive_2010() -> MemSource {
    let catalog = Catalog::census().unwrap();
    let dir = catalog.lookup(Theme::Basic, 2010, Strategy::Archive).unwrap().resources[0].dir_url().to_string();

    let csv = "Cod_setor;Situacao_setor;V001;V002;V005\n\
               330455705000001;1;40;120;1500,5\n\
               330455705000002;1;10;30;800\n\
               330010005000001;1;5;9;100\n";
    MemSource::new()
        .with(dir.clone(), br#"<a href="RJ_20110615.zip">RJ</a> <a href="RJ_20100101.zip">old</a>"#.to_vec())
        .with(format!("{dir}RJ_20110615.zip"), zip_with("RJ/CSV/Basico_RJ.csv", csv.as_bytes()))
}

fn f64_column(layer: &CensusLayer, name: &str) -> Vec<Option<f64>> {
    layer.data().column(name).unwrap().f64().unwrap().into_iter().collect()
}

#[test]
fn tract_output_merges_archive_themes() {
    let archive = archive_2010();
    let collaborators = Collaborators { tracts: &StubTracts, footprint: None, archive: &archive, warehouse: None };
    let request = CensusRequest::new(vec![Place::from(RIO), Place::from("3304557")], 2010)
        .with_clip_urban(false);

    let layer = load_census(&request, &collaborators, &Settings::default()).unwrap();

    let CensusLayer::Tracts(tracts) = &layer else { panic!("expected tract output") };
    assert_eq!(tracts.epsg(), 31983);
    assert_eq!(
        layer.data().get_column_names(),
        vec![ID_COLUMN, "domicilios", "habitantes", "rendimento_medio", YEAR_COLUMN]
    );
    assert_eq!(f64_column(&layer, "habitantes"), vec![Some(120.0), Some(30.0)]);
    assert_eq!(f64_column(&layer, "rendimento_medio"), vec![Some(1500.5), Some(800.0)]);

    let years: Vec<Option<i32>> = layer.data().column(YEAR_COLUMN).unwrap().i32().unwrap().into_iter().collect();
    assert_eq!(years, vec![Some(2010), Some(2010)]);
}

#[test]
fn hex_output_conserves_extensive_totals() {
    let archive = archive_2010();
    let collaborators = Collaborators { tracts: &StubTracts, footprint: None, archive: &archive, warehouse: None };
    let request = CensusRequest::new(vec![Place::from(RIO)], 2010)
        .with_clip_urban(false)
        .with_output(Output::Hex { resolution: 8 });

    let layer = load_census(&request, &collaborators, &Settings::default()).unwrap();

    let CensusLayer::Hexes(hexes) = &layer else { panic!("expected hex output") };
    assert!(!hexes.is_empty());
    assert_eq!(hexes.epsg(), 31983);

    let total: f64 = f64_column(&layer, "habitantes").into_iter().flatten().sum();
    assert!(((total - 150.0) / 150.0).abs() < 1e-6, "total {total}");

    let income = f64_column(&layer, "rendimento_medio");
    assert!(income.iter().flatten().all(|v| (800.0..=1500.5).contains(v)));
}

#[test]
fn clipped_hexes_cover_only_the_tracts() {
    let archive = archive_2010();
    let collaborators = Collaborators { tracts: &StubTracts, footprint: None, archive: &archive, warehouse: None };
    let request = CensusRequest::new(vec![Place::from(RIO)], 2010)
        .with_clip_urban(false)
        .with_output(Output::Hex { resolution: 8 })
        .with_hex_options(HexOptions { buffer_edges: true, clip: true });

    let layer = load_census(&request, &collaborators, &Settings::default()).unwrap();

    let CensusLayer::Hexes(hexes) = &layer else { panic!("expected hex output") };
    assert!(!hexes.is_empty());

    let tracts = atlasbr::prepare_tracts(StubTracts.tracts(&[RIO], 2010).unwrap()).unwrap();
    let tract_area: f64 = tracts.geoms().areas().iter().sum();
    let hex_area: f64 = hexes.geoms().areas().iter().sum();
    assert!(hex_area <= tract_area * (1.0 + 1e-6));

    let total: f64 = f64_column(&layer, "habitantes").into_iter().flatten().sum();
    assert!(((total - 150.0) / 150.0).abs() < 1e-6, "total {total}");
}

#[test]
fn clip_to_distant_footprint_leaves_no_tracts() {
    let archive = archive_2010();
    let far_away = StubFootprint(Geometries::new(vec![square(-60.0, -3.0, 0.01)], 4674));
    let collaborators = Collaborators { tracts: &StubTracts, footprint: Some(&far_away), archive: &archive, warehouse: None };
    let request = CensusRequest::new(vec![Place::from(RIO)], 2010);

    let layer = load_census(&request, &collaborators, &Settings::default()).unwrap();

    assert!(layer.is_empty());
}

#[test]
fn unknown_themes_are_skipped() {
    let archive = archive_2010();
    let collaborators = Collaborators { tracts: &StubTracts, footprint: None, archive: &archive, warehouse: None };
    let request = CensusRequest::new(vec![Place::from(RIO)], 1999).with_clip_urban(false);

    let layer = load_census(&request, &collaborators, &Settings::default()).unwrap();

    assert_eq!(layer.data().get_column_names(), vec![ID_COLUMN, YEAR_COLUMN]);
    assert_eq!(layer.len(), 2);
}

#[test]
fn warehouse_strategy_queries_and_harmonizes() {
    let archive = MemSource::new();
    let warehouse = StubWarehouse { queries: RefCell::new(Vec::new()) };
    let collaborators = Collaborators { tracts: &StubTracts, footprint: None, archive: &archive, warehouse: Some(&warehouse) };
    let request = CensusRequest::new(vec![Place::from(RIO)], 2010)
        .with_themes([Theme::Basic])
        .with_strategy(Strategy::Warehouse)
        .with_clip_urban(false);

    let settings = Settings::default().with_billing_id("my-project");
    let layer = load_census(&request, &collaborators, &settings).unwrap();

    assert_eq!(f64_column(&layer, "domicilios"), vec![Some(40.0), Some(10.0)]);
    assert!(warehouse.queries.borrow()[0].ends_with("IN ('3304557')"));
}

#[test]
fn warehouse_strategy_without_billing_fails() {
    let archive = MemSource::new();
    let warehouse = StubWarehouse { queries: RefCell::new(Vec::new()) };
    let collaborators = Collaborators { tracts: &StubTracts, footprint: None, archive: &archive, warehouse: Some(&warehouse) };
    let request = CensusRequest::new(vec![Place::from(RIO)], 2010)
        .with_strategy(Strategy::Warehouse)
        .with_clip_urban(false);

    assert!(load_census(&request, &collaborators, &Settings::default()).is_err());
}

#[test]
fn geojson_export_is_lon_lat() {
    let archive = archive_2010();
    let collaborators = Collaborators { tracts: &StubTracts, footprint: None, archive: &archive, warehouse: None };
    let request = CensusRequest::new(vec![Place::from(RIO)], 2010).with_clip_urban(false);

    let layer = load_census(&request, &collaborators, &Settings::default()).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&layer.to_geojson_bytes().unwrap()).unwrap();

    let feature = &value["features"][0];
    assert_eq!(feature["properties"][ID_COLUMN], "330455705000001");
    let x = feature["geometry"]["coordinates"][0][0][0][0].as_f64().unwrap();
    assert!((-43.3..-43.1).contains(&x));
}
