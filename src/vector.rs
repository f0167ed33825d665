//! Reading and writing GeoJSON vector layers.
//!
//! Everything read here is expected to already be in EPSG:4326. Layers in other formats or
//! projections are converted with the [`GeoToolkit`](crate::toolkit::GeoToolkit) first.
use crate::hexagon::{COUNTRY_ATTRIBUTE, CountryBoundary, Hexagon, Technology};
use anyhow::{Context, Result, bail};
use geo::{Geometry, MultiPolygon, Point, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use log::warn;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Read a GeoJSON file containing a feature collection
pub fn read_feature_collection(file_path: &Path) -> Result<FeatureCollection> {
    let contents = fs::read_to_string(file_path)
        .with_context(|| format!("Could not read {}", file_path.display()))?;
    let geojson: GeoJson = contents
        .parse()
        .with_context(|| format!("Invalid GeoJSON in {}", file_path.display()))?;

    FeatureCollection::try_from(geojson)
        .with_context(|| format!("{} is not a feature collection", file_path.display()))
}

/// Write features to a GeoJSON file as a feature collection
pub fn write_feature_collection(file_path: &Path, features: Vec<Feature>) -> Result<()> {
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    fs::write(file_path, GeoJson::from(collection).to_string())
        .with_context(|| format!("Could not write {}", file_path.display()))
}

/// Get a feature's geometry as a `geo` geometry
fn feature_geometry(feature: &Feature) -> Result<Geometry<f64>> {
    let geometry = feature
        .geometry
        .as_ref()
        .context("Feature has no geometry")?;

    Ok(Geometry::try_from(&geometry.value)?)
}

/// Get the polygons making up an areal geometry
fn into_polygons(geometry: Geometry<f64>) -> Result<Vec<Polygon<f64>>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(vec![polygon]),
        Geometry::MultiPolygon(multi) => Ok(multi.0),
        Geometry::Rect(rect) => Ok(vec![rect.to_polygon()]),
        other => bail!("Expected a polygon, got {other:?}"),
    }
}

/// Take an unsigned count out of a feature's properties
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn take_count(properties: &mut JsonObject, key: &str) -> Result<u32> {
    let Some(value) = properties.remove(key) else {
        return Ok(0);
    };

    // Counts may have been written as floats (e.g. 3.0)
    let count = value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                .map(|v| v as u64)
        })
        .with_context(|| format!("Invalid value for {key}: {value}"))?;

    Ok(u32::try_from(count)?)
}

/// Convert a GeoJSON feature into a [`Hexagon`].
///
/// Counts and country tags already present in the properties (e.g. from a previous run) are
/// picked up rather than duplicated.
fn hexagon_from_feature(index: usize, feature: Feature) -> Result<Hexagon> {
    let mut polygons = into_polygons(feature_geometry(&feature)?)?;
    if polygons.len() != 1 {
        bail!("Hexagon must be a single polygon, got {}", polygons.len());
    }
    let geometry = polygons.swap_remove(0);

    let mut properties = feature.properties.unwrap_or_default();
    let mut hexagon = Hexagon::new(index, geometry, JsonObject::new());
    hexagon.theo_turbines = take_count(&mut properties, Technology::Wind.count_attribute())?;
    hexagon.theo_pv = take_count(&mut properties, Technology::Pv.count_attribute())?;
    hexagon.country = match properties.remove(COUNTRY_ATTRIBUTE) {
        Some(Value::String(country)) => Some(country),
        Some(Value::Null) | None => None,
        Some(other) => bail!("Invalid value for {COUNTRY_ATTRIBUTE}: {other}"),
    };
    hexagon.properties = properties;

    Ok(hexagon)
}

/// Read the hexagons produced by SPIDER
pub fn read_hexagons(file_path: &Path) -> Result<Vec<Hexagon>> {
    read_feature_collection(file_path)?
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            hexagon_from_feature(index, feature).with_context(|| {
                format!("Invalid hexagon {index} in {}", file_path.display())
            })
        })
        .collect()
}

/// Convert a [`Hexagon`] into a GeoJSON feature
fn hexagon_to_feature(hexagon: &Hexagon) -> Feature {
    let mut properties = hexagon.properties.clone();
    properties.insert(
        Technology::Wind.count_attribute().into(),
        hexagon.theo_turbines.into(),
    );
    properties.insert(
        Technology::Pv.count_attribute().into(),
        hexagon.theo_pv.into(),
    );
    if let Some(country) = &hexagon.country {
        properties.insert(COUNTRY_ATTRIBUTE.into(), country.clone().into());
    }

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            &hexagon.geometry,
        ))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write hexagons to a GeoJSON file.
///
/// If there are no hexagons, nothing is written and a warning is logged instead. Returns whether
/// the file was written.
pub fn write_hexagons(file_path: &Path, hexagons: &[Hexagon]) -> Result<bool> {
    if hexagons.is_empty() {
        warn!(
            "No hexagons to save to {}. This can happen when the country is much smaller than \
            the hexagon size used in SPIDER. Please use smaller hexagons in SPIDER and retry.",
            file_path.display()
        );
        return Ok(false);
    }

    write_feature_collection(file_path, hexagons.iter().map(hexagon_to_feature).collect())?;

    Ok(true)
}

/// Read the points in a point layer (e.g. turbine placements). Multipoints are flattened.
pub fn read_points(file_path: &Path) -> Result<Vec<Point<f64>>> {
    let mut points = Vec::new();
    for (i, feature) in read_feature_collection(file_path)?
        .features
        .iter()
        .enumerate()
    {
        let geometry = feature_geometry(feature)
            .with_context(|| format!("Invalid feature {i} in {}", file_path.display()))?;
        match geometry {
            Geometry::Point(point) => points.push(point),
            Geometry::MultiPoint(multi) => points.extend(multi),
            other => bail!(
                "Expected points in {}, got {other:?}",
                file_path.display()
            ),
        }
    }

    Ok(points)
}

/// Read all the polygons in a layer as a single multipolygon
pub fn read_multipolygon(file_path: &Path) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for (i, feature) in read_feature_collection(file_path)?
        .features
        .iter()
        .enumerate()
    {
        let geometry = feature_geometry(feature)
            .with_context(|| format!("Invalid feature {i} in {}", file_path.display()))?;
        polygons.extend(into_polygons(geometry)?);
    }

    Ok(MultiPolygon::new(polygons))
}

/// Read country outlines, named by the attribute `name_field`
pub fn read_country_boundaries(file_path: &Path, name_field: &str) -> Result<Vec<CountryBoundary>> {
    read_feature_collection(file_path)?
        .features
        .iter()
        .enumerate()
        .map(|(i, feature)| -> Result<_> {
            let name = feature
                .property(name_field)
                .and_then(Value::as_str)
                .with_context(|| format!("Feature {i} has no {name_field} attribute"))?;
            let geometry = MultiPolygon::new(into_polygons(feature_geometry(feature)?)?);

            Ok(CountryBoundary {
                name: name.to_string(),
                geometry,
            })
        })
        .collect::<Result<_>>()
        .with_context(|| format!("Invalid country boundaries in {}", file_path.display()))
}
