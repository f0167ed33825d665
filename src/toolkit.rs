//! Geoprocessing operations on files, which are delegated to external tools.
//!
//! Reading and writing shapefiles, GeoPackages and GeoTIFFs, reprojection and raster masking are
//! all done by GDAL. The [`GeoToolkit`] trait describes the operations the pipeline needs and
//! [`GdalToolkit`] implements them by running the GDAL command-line utilities.
use crate::units::Metres;
use anyhow::{Context, Result, bail, ensure};
use log::debug;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The EPSG code for WGS 84 latitude/longitude
pub const WGS84: u32 = 4326;

/// A vector file format, identified by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    /// GeoJSON (`.geojson`, `.json`)
    GeoJson,
    /// GeoPackage (`.gpkg`)
    GeoPackage,
    /// ESRI shapefile (`.shp`)
    Shapefile,
}

impl VectorFormat {
    /// Work out the format of a file from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("geojson" | "json") => Ok(Self::GeoJson),
            Some("gpkg") => Ok(Self::GeoPackage),
            Some("shp") => Ok(Self::Shapefile),
            _ => bail!("Unsupported vector format: {}", path.display()),
        }
    }

    /// The name of the GDAL driver for this format
    pub fn driver(self) -> &'static str {
        match self {
            Self::GeoJson => "GeoJSON",
            Self::GeoPackage => "GPKG",
            Self::Shapefile => "ESRI Shapefile",
        }
    }
}

/// Geoprocessing operations used to stage a country's data.
///
/// Every operation reads from and writes to files. The format of the output is chosen from its
/// file extension and any existing output is overwritten.
pub trait GeoToolkit {
    /// Extract the features whose `field` attribute equals `value`, in EPSG:4326
    fn extract_feature(&self, source: &Path, field: &str, value: &str, dest: &Path)
    -> Result<()>;

    /// Copy a vector layer to a new file, optionally reprojecting it or naming the layer
    fn convert_vector(
        &self,
        source: &Path,
        dest: &Path,
        target_epsg: Option<u32>,
        layer_name: Option<&str>,
    ) -> Result<()>;

    /// Buffer every geometry in a layer by `distance` (in the layer's own units)
    fn buffer_vector(&self, source: &Path, distance: Metres, dest: &Path) -> Result<()>;

    /// Clip a layer to the geometries in `clip`, writing the result in EPSG:4326
    fn clip_vector(&self, source: &Path, clip: &Path, dest: &Path) -> Result<()>;

    /// Mask a raster with the geometries in `cutline` and crop it to their extent
    fn mask_raster(&self, source: &Path, cutline: &Path, dest: &Path) -> Result<()>;
}

/// Name of the layer in a file written by [`GdalToolkit`], which is always the file stem
fn layer_name_for(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(OsStr::to_str)
        .with_context(|| format!("Invalid file name: {}", path.display()))
}

/// Quote a string as an SQL literal
fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Start an `ogr2ogr` argument list writing to `dest`
fn ogr2ogr_output_args(dest: &Path) -> Result<Vec<OsString>> {
    let format = VectorFormat::from_path(dest)?;
    Ok(vec![
        "-overwrite".into(),
        "-f".into(),
        format.driver().into(),
        "-nln".into(),
        layer_name_for(dest)?.into(),
    ])
}

/// Arguments for `ogr2ogr` to extract features by attribute
pub fn extract_feature_args(
    source: &Path,
    field: &str,
    value: &str,
    dest: &Path,
) -> Result<Vec<OsString>> {
    let mut args = ogr2ogr_output_args(dest)?;
    args.extend([
        "-t_srs".into(),
        format!("EPSG:{WGS84}").into(),
        "-where".into(),
        format!("\"{field}\" = {}", sql_quote(value)).into(),
        dest.into(),
        source.into(),
    ]);

    Ok(args)
}

/// Arguments for `ogr2ogr` to convert a layer
pub fn convert_vector_args(
    source: &Path,
    dest: &Path,
    target_epsg: Option<u32>,
    layer_name: Option<&str>,
) -> Result<Vec<OsString>> {
    let mut args = ogr2ogr_output_args(dest)?;
    if let Some(layer_name) = layer_name {
        // Replace the default layer name
        args[4] = layer_name.into();
    }
    if let Some(epsg) = target_epsg {
        args.extend(["-t_srs".into(), format!("EPSG:{epsg}").into()]);
    }
    args.extend([dest.into(), source.into()]);

    Ok(args)
}

/// Arguments for `ogr2ogr` to buffer a layer
pub fn buffer_vector_args(source: &Path, distance: Metres, dest: &Path) -> Result<Vec<OsString>> {
    let mut args = ogr2ogr_output_args(dest)?;
    let sql = format!(
        "SELECT ST_MakeValid(ST_Buffer(geometry, {})) AS geometry FROM \"{}\"",
        distance.value(),
        layer_name_for(source)?
    );
    args.extend([
        "-dialect".into(),
        "SQLite".into(),
        "-sql".into(),
        sql.into(),
        dest.into(),
        source.into(),
    ]);

    Ok(args)
}

/// Arguments for `ogr2ogr` to clip a layer
pub fn clip_vector_args(source: &Path, clip: &Path, dest: &Path) -> Result<Vec<OsString>> {
    let mut args = ogr2ogr_output_args(dest)?;
    args.extend([
        "-t_srs".into(),
        format!("EPSG:{WGS84}").into(),
        "-clipsrc".into(),
        clip.into(),
        "-makevalid".into(),
        dest.into(),
        source.into(),
    ]);

    Ok(args)
}

/// Arguments for `gdalwarp` to mask and crop a raster
pub fn mask_raster_args(source: &Path, cutline: &Path, dest: &Path) -> Vec<OsString> {
    vec![
        "-overwrite".into(),
        "-of".into(),
        "GTiff".into(),
        "-cutline".into(),
        cutline.into(),
        "-crop_to_cutline".into(),
        source.into(),
        dest.into(),
    ]
}

/// Run an external program, failing if it exits unsuccessfully
pub fn run_program(program: &Path, args: &[OsString]) -> Result<()> {
    debug!("Running {} {:?}", program.display(), args);
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("Could not run {}", program.display()))?;
    ensure!(
        output.status.success(),
        "{} failed ({}): {}",
        program.display(),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    );

    Ok(())
}

/// A [`GeoToolkit`] which runs the GDAL command-line utilities
#[derive(Debug, Clone, PartialEq)]
pub struct GdalToolkit {
    /// Path to `ogr2ogr`
    pub ogr2ogr: PathBuf,
    /// Path to `gdalwarp`
    pub gdalwarp: PathBuf,
}

impl Default for GdalToolkit {
    fn default() -> Self {
        Self {
            ogr2ogr: "ogr2ogr".into(),
            gdalwarp: "gdalwarp".into(),
        }
    }
}

impl GeoToolkit for GdalToolkit {
    fn extract_feature(
        &self,
        source: &Path,
        field: &str,
        value: &str,
        dest: &Path,
    ) -> Result<()> {
        run_program(&self.ogr2ogr, &extract_feature_args(source, field, value, dest)?)
    }

    fn convert_vector(
        &self,
        source: &Path,
        dest: &Path,
        target_epsg: Option<u32>,
        layer_name: Option<&str>,
    ) -> Result<()> {
        run_program(
            &self.ogr2ogr,
            &convert_vector_args(source, dest, target_epsg, layer_name)?,
        )
    }

    fn buffer_vector(&self, source: &Path, distance: Metres, dest: &Path) -> Result<()> {
        run_program(&self.ogr2ogr, &buffer_vector_args(source, distance, dest)?)
    }

    fn clip_vector(&self, source: &Path, clip: &Path, dest: &Path) -> Result<()> {
        run_program(&self.ogr2ogr, &clip_vector_args(source, clip, dest)?)
    }

    fn mask_raster(&self, source: &Path, cutline: &Path, dest: &Path) -> Result<()> {
        run_program(&self.gdalwarp, &mask_raster_args(source, cutline, dest))
    }
}
