//! Fixtures for tests

use crate::toolkit::GeoToolkit;
use crate::units::Metres;
use crate::vector::write_feature_collection;
use anyhow::Result;
use geo::{MultiPolygon, polygon};
use geojson::{Feature, Geometry, JsonObject};
use rstest::fixture;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A rectangular country spanning 8°E to 12°E and 2°S to 0.5°N (UTM zone 32S)
#[fixture]
pub fn square_boundary() -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: 8.0, y: -2.0),
        (x: 12.0, y: -2.0),
        (x: 12.0, y: 0.5),
        (x: 8.0, y: 0.5),
        (x: 8.0, y: -2.0),
    ]])
}

/// A [`GeoToolkit`] which records what it was asked to do.
///
/// Extracted countries are given `boundary` and conversions copy their input when it exists.
/// Every other output is a small placeholder file.
pub struct FakeToolkit {
    pub boundary: MultiPolygon<f64>,
    pub calls: RefCell<Vec<(&'static str, PathBuf)>>,
}

impl FakeToolkit {
    pub fn new(boundary: MultiPolygon<f64>) -> Self {
        Self {
            boundary,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// The outputs written by each operation, in order
    pub fn calls(&self) -> Vec<(&'static str, PathBuf)> {
        self.calls.borrow().clone()
    }

    fn record(&self, operation: &'static str, dest: &Path) -> Result<()> {
        self.calls.borrow_mut().push((operation, dest.to_path_buf()));
        fs::write(dest, operation)?;
        Ok(())
    }
}

#[fixture]
pub fn fake_toolkit(square_boundary: MultiPolygon<f64>) -> FakeToolkit {
    FakeToolkit::new(square_boundary)
}

impl GeoToolkit for FakeToolkit {
    fn extract_feature(&self, _source: &Path, field: &str, value: &str, dest: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(("extract_feature", dest.to_path_buf()));
        let mut properties = JsonObject::new();
        properties.insert(field.into(), value.into());
        let feature = Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&self.boundary))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        };
        write_feature_collection(dest, vec![feature])
    }

    /// Copies the source if it exists, so GeoJSON inputs can be read back
    fn convert_vector(
        &self,
        source: &Path,
        dest: &Path,
        _target_epsg: Option<u32>,
        _layer_name: Option<&str>,
    ) -> Result<()> {
        if source.is_file() {
            self.calls
                .borrow_mut()
                .push(("convert_vector", dest.to_path_buf()));
            fs::copy(source, dest)?;
            return Ok(());
        }

        self.record("convert_vector", dest)
    }

    fn buffer_vector(&self, _source: &Path, _distance: Metres, dest: &Path) -> Result<()> {
        self.record("buffer_vector", dest)
    }

    fn clip_vector(&self, _source: &Path, _clip: &Path, dest: &Path) -> Result<()> {
        self.record("clip_vector", dest)
    }

    fn mask_raster(&self, _source: &Path, _cutline: &Path, dest: &Path) -> Result<()> {
        self.record("mask_raster", dest)
    }
}
