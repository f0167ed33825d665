//! Staging a country's data for GLAES and SPIDER.
//!
//! Global datasets are cut down to a single country and written where the exclusion engine and
//! SPIDER expect to find them. The exclusion engine works in the country's UTM zone, whereas
//! SPIDER takes everything in EPSG:4326.
use crate::country::{Country, clean_country_name};
use crate::output::ensure_nonempty_file;
use crate::settings::Settings;
use crate::toolkit::{GeoToolkit, WGS84};
use crate::vector::read_multipolygon;
use crate::workspace::{CountryFiles, OSM_LAYERS, Workspace};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Run a toolkit operation and check that it produced `dest`
fn produce<F>(dest: &Path, operation: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    operation(dest).with_context(|| format!("Could not create {}", dest.display()))?;
    ensure_nonempty_file(dest)
}

/// Write the EPSG code of a country's UTM zone to file
pub fn write_epsg(files: &CountryFiles, epsg: u32) -> Result<()> {
    let file_path = files.epsg();
    fs::write(&file_path, epsg.to_string())
        .with_context(|| format!("Could not write {}", file_path.display()))
}

/// Clip the global datasets to a country.
///
/// The country is looked up by `name` in the country boundaries dataset. Scratch files are kept
/// in a temporary folder which is deleted when this function returns.
pub fn clip_country_data(
    toolkit: &dyn GeoToolkit,
    workspace: &Workspace,
    settings: &Settings,
    name: &str,
) -> Result<Country> {
    let id = clean_country_name(name);
    let files = workspace.country_files(&id);
    let scratch = tempfile::tempdir()?;

    // Country in EPSG:4326
    let boundary_wgs84 = scratch.path().join(format!("{id}.geojson"));
    let boundaries = workspace.resolve(&settings.country_boundaries);
    produce(&boundary_wgs84, |dest| {
        toolkit.extract_feature(&boundaries, &settings.boundaries_name_field, name, dest)
    })?;
    let boundary = read_multipolygon(&boundary_wgs84)?;
    let country = Country::new(name, boundary)
        .with_context(|| format!("Country {name} not found in {}", boundaries.display()))?;
    info!(" - UTM zone for {name} is EPSG:{}", country.epsg);
    write_epsg(&files, country.epsg)?;

    // Country and buffer in UTM zone
    produce(&files.boundary_utm(), |dest| {
        toolkit.convert_vector(&boundary_wgs84, dest, Some(country.epsg), None)
    })?;
    produce(&files.buffer(), |dest| {
        toolkit.buffer_vector(&files.boundary_utm(), settings.country_buffer, dest)
    })?;

    // Oceans around the country
    let buffer_wgs84 = scratch.path().join(format!("{id}_buff.geojson"));
    produce(&buffer_wgs84, |dest| {
        toolkit.convert_vector(&files.buffer(), dest, Some(WGS84), None)
    })?;
    produce(&files.oceans(), |dest| {
        toolkit.clip_vector(&workspace.resolve(&settings.oceans), &buffer_wgs84, dest)
    })?;
    produce(&files.spider_oceans(), |dest| {
        toolkit.convert_vector(&files.oceans(), dest, None, None)
    })?;

    if settings.exclude_protected_areas {
        produce(&files.protected_areas(), |dest| {
            toolkit.convert_vector(
                &workspace.resolve(&settings.protected_areas),
                dest,
                Some(country.epsg),
                None,
            )
        })?;
    } else {
        warn!("Protected area exclusion is turned off; protected areas will not be excluded for {name}");
    }

    // OSM layers for SPIDER
    let osm_dir = workspace.resolve(&settings.osm_dir).join(id.as_str());
    for (shapefile, layer) in OSM_LAYERS {
        produce(&files.spider_osm_layer(layer), |dest| {
            toolkit.convert_vector(&osm_dir.join(shapefile), dest, None, None)
        })?;
    }

    produce(&files.spider_boundary(), |dest| {
        toolkit.convert_vector(&boundary_wgs84, dest, None, None)
    })?;
    produce(&files.land_cover(), |dest| {
        toolkit.mask_raster(&workspace.resolve(&settings.land_cover), &boundary_wgs84, dest)
    })?;

    Ok(country)
}
