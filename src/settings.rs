//! Code for loading program settings.
use crate::get_geox_config_dir;
use crate::log::DEFAULT_LOG_LEVEL;
use crate::units::{Degrees, Metres};
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for geox-prep
# Relative paths are resolved against the project directory given on the command line.
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// NREL 2020 ATB 4MW reference turbine
fn default_turbine_radius() -> Metres {
    Metres(150.0)
}

fn default_pixel_size() -> Metres {
    Metres(100.0)
}

fn default_country_buffer() -> Metres {
    Metres(10_000.0)
}

fn default_exclusion_buffer() -> Metres {
    Metres(250.0)
}

fn default_pv_separation() -> Metres {
    Metres(440.0)
}

fn default_turbine_axial_direction() -> Degrees {
    Degrees(45.0)
}

fn default_exclusion_command() -> Vec<String> {
    vec!["glaes-runner".to_string()]
}

fn default_country_boundaries() -> PathBuf {
    ["data", "ne_50m_admin_0_countries", "ne_50m_admin_0_countries.shp"]
        .iter()
        .collect()
}

fn default_boundaries_name_field() -> String {
    "NAME".to_string()
}

fn default_land_cover() -> PathBuf {
    ["data", "PROBAV_LC100_global_v3.0.1_2019-nrt_Discrete-Classification-map_EPSG-4326.tif"]
        .iter()
        .collect()
}

fn default_oceans() -> PathBuf {
    ["data", "GOaS_v1_20211214_gpkg", "goas_v01.gpkg"]
        .iter()
        .collect()
}

fn default_protected_areas() -> PathBuf {
    ["data", "Africa_protect_class_1.geojson"].iter().collect()
}

fn default_exclude_protected_areas() -> bool {
    true
}

fn default_osm_dir() -> PathBuf {
    ["data", "OSM"].iter().collect()
}

fn default_world_boundaries() -> PathBuf {
    ["data", "ne_110m_admin_0_countries", "ne_110m_admin_0_countries.shp"]
        .iter()
        .collect()
}

fn default_world_name_field() -> String {
    "NAME".to_string()
}

fn default_hydro_global() -> PathBuf {
    ["data", "hydro-power-plants.csv"].iter().collect()
}

fn default_hydro_jrc() -> PathBuf {
    ["data", "jrc-hydro-power-plant-database.csv"].iter().collect()
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_geox_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Turbine rotor radius in metres, used to derive turbine spacing
    #[serde(default = "default_turbine_radius")]
    pub turbine_radius: Metres,
    /// Resolution of the exclusion raster in metres
    #[serde(default = "default_pixel_size")]
    pub pixel_size: Metres,
    /// Buffer around the country boundary used when clipping the oceans layer, in metres
    #[serde(default = "default_country_buffer")]
    pub country_buffer: Metres,
    /// Exclusion buffer around the coastline, in metres
    #[serde(default = "default_exclusion_buffer")]
    pub coast_buffer: Metres,
    /// Exclusion buffer around protected areas, in metres
    #[serde(default = "default_exclusion_buffer")]
    pub protected_area_buffer: Metres,
    /// Minimum distance between PV plants, in metres
    #[serde(default = "default_pv_separation")]
    pub pv_separation: Metres,
    /// Direction of the long axis of the turbine footprint, in degrees
    #[serde(default = "default_turbine_axial_direction")]
    pub turbine_axial_direction: Degrees,
    /// Command (and leading arguments) used to run the exclusion engine on a job file
    #[serde(default = "default_exclusion_command")]
    pub exclusion_command: Vec<String>,
    /// Country boundaries used to stage each country's data
    #[serde(default = "default_country_boundaries")]
    pub country_boundaries: PathBuf,
    /// Attribute holding the country name in the country boundaries
    #[serde(default = "default_boundaries_name_field")]
    pub boundaries_name_field: String,
    /// Global land cover classification raster
    #[serde(default = "default_land_cover")]
    pub land_cover: PathBuf,
    /// Global oceans and seas layer
    #[serde(default = "default_oceans")]
    pub oceans: PathBuf,
    /// Protected areas layer
    #[serde(default = "default_protected_areas")]
    pub protected_areas: PathBuf,
    /// Whether to exclude protected areas. Set to false if you have no protected areas layer
    #[serde(default = "default_exclude_protected_areas")]
    pub exclude_protected_areas: bool,
    /// Folder containing one OSM extract folder per country
    #[serde(default = "default_osm_dir")]
    pub osm_dir: PathBuf,
    /// World boundaries used to tag hexagons with their country
    #[serde(default = "default_world_boundaries")]
    pub world_boundaries: PathBuf,
    /// Attribute holding the country name in the world boundaries
    #[serde(default = "default_world_name_field")]
    pub world_name_field: String,
    /// Hydropower plant database with global coverage
    #[serde(default = "default_hydro_global")]
    pub hydro_global: PathBuf,
    /// JRC hydropower plant database for Europe
    #[serde(default = "default_hydro_jrc")]
    pub hydro_jrc: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            turbine_radius: default_turbine_radius(),
            pixel_size: default_pixel_size(),
            country_buffer: default_country_buffer(),
            coast_buffer: default_exclusion_buffer(),
            protected_area_buffer: default_exclusion_buffer(),
            pv_separation: default_pv_separation(),
            turbine_axial_direction: default_turbine_axial_direction(),
            exclusion_command: default_exclusion_command(),
            country_boundaries: default_country_boundaries(),
            boundaries_name_field: default_boundaries_name_field(),
            land_cover: default_land_cover(),
            oceans: default_oceans(),
            protected_areas: default_protected_areas(),
            exclude_protected_areas: default_exclude_protected_areas(),
            osm_dir: default_osm_dir(),
            world_boundaries: default_world_boundaries(),
            world_name_field: default_world_name_field(),
            hydro_global: default_hydro_global(),
            hydro_jrc: default_hydro_jrc(),
        }
    }
}

impl Settings {
    /// Read the contents of the settings file from the program's config dir.
    ///
    /// If the file is not present, default values for settings will be used
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read settings from the specified path, using defaults if the file doesn't exist
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(file_path)
            .with_context(|| format!("Could not read {}", file_path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Invalid settings file: {}", file_path.display()))
    }

    /// The contents of the default settings file
    pub fn default_file_contents() -> String {
        let settings_raw =
            toml::to_string(&Settings::default()).expect("Could not convert settings to TOML");

        // Iterate through the generated TOML, commenting out lines and adding docs
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.split('\n') {
            if let Some(last) = line.find('=') {
                let field = line[..last].trim();

                // All fields should have doc comments
                let docs = Settings::get_field_docs(field).expect("Missing doc comment for field");
                for line in docs.split('\n') {
                    write!(&mut out, "\n# # {}\n", line.trim()).unwrap();
                }

                writeln!(&mut out, "# {}", line.trim()).unwrap();
            }
        }

        out
    }
}
