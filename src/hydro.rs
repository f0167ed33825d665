//! Preparation of hydropower plant databases for SPIDER.
//!
//! A plant database is read from CSV and the plants which already exist (i.e. those with a known
//! head height) are written out as a point layer. Two databases are supported: a global one and
//! the JRC database of European plants, which uses different column names and also contains plant
//! types we don't want.
use anyhow::{Context, Result, ensure};
use clap::ValueEnum;
use geojson::{Feature, JsonObject};
use log::info;
use serde::de::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use strum::Display;

/// Plant types kept from the JRC database (reservoir and pumped storage)
const JRC_PLANT_TYPES: [&str; 2] = ["HDAM", "HPHS"];

/// Which hydropower plant database is being prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum HydroSource {
    /// Global hydropower plant database
    #[default]
    Global,
    /// JRC hydropower plant database (Europe)
    Jrc,
}

impl HydroSource {
    /// The file name for the output layer
    pub fn output_file_name(self) -> &'static str {
        match self {
            Self::Global => "hydropower_dams.gpkg",
            Self::Jrc => "hydropower_dams_EU.gpkg",
        }
    }

    /// Names used for the latitude, longitude and plant type columns in the output
    fn column_names(self) -> [&'static str; 3] {
        match self {
            Self::Global => ["lat", "lon", "type"],
            Self::Jrc => ["Latitude", "Longitude", "plant_type"],
        }
    }

    /// Whether plants without coordinates are dropped before their capacity is checked
    fn drops_missing_coordinates_first(self) -> bool {
        matches!(self, Self::Jrc)
    }

    /// Whether plants of this type are kept
    fn keeps_type(self, plant_type: &str) -> bool {
        match self {
            Self::Global => true,
            Self::Jrc => JRC_PLANT_TYPES.contains(&plant_type),
        }
    }
}

/// Read an optional f64, treating anything which isn't a number as missing
fn deserialise_lenient_f64<'de, D>(deserialiser: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(deserialiser)?;
    Ok(value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

/// A row of a hydropower plant database
#[derive(Debug, PartialEq, serde::Deserialize)]
struct HydroPlantRaw {
    id: String,
    #[serde(deserialize_with = "deserialise_lenient_f64")]
    lat: Option<f64>,
    #[serde(deserialize_with = "deserialise_lenient_f64")]
    lon: Option<f64>,
    name: String,
    #[serde(rename = "type")]
    plant_type: String,
    #[serde(alias = "installed_capacity_MW")]
    capacity: String,
    #[serde(
        rename = "avg_annual_generation_GWh",
        deserialize_with = "deserialise_lenient_f64"
    )]
    avg_annual_generation: Option<f64>,
    #[serde(deserialize_with = "deserialise_lenient_f64")]
    head: Option<f64>,
    country_code: String,
}

/// A hydropower plant
#[derive(Debug, Clone, PartialEq)]
pub struct HydroPlant {
    /// Identifier from the database
    pub id: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Plant name
    pub name: String,
    /// Plant type (e.g. HDAM for a reservoir)
    pub plant_type: String,
    /// Installed capacity in MW
    pub capacity: f64,
    /// Average annual generation in GWh
    pub avg_annual_generation: Option<f64>,
    /// Head height in metres, if known
    pub head: Option<f64>,
    /// ISO country code
    pub country_code: String,
}

/// Parse a plant's capacity, which is required for every plant
fn parse_capacity(raw: &HydroPlantRaw) -> Result<f64> {
    let capacity = raw
        .capacity
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid capacity for plant {}: '{}'", raw.id, raw.capacity))?;
    ensure!(
        capacity.is_finite(),
        "Invalid capacity for plant {}: '{}'",
        raw.id,
        raw.capacity
    );

    Ok(capacity)
}

/// Process plants from an iterator.
///
/// Plants of unwanted types and plants without valid coordinates are dropped. An invalid capacity
/// for any remaining plant is an error. For the global database, capacity is checked even for
/// plants which are then dropped for lacking coordinates.
fn read_hydro_plants_from_iter<I>(iter: I, source: HydroSource) -> Result<Vec<HydroPlant>>
where
    I: Iterator<Item = HydroPlantRaw>,
{
    let mut plants = Vec::new();
    for raw in iter {
        if !source.keeps_type(&raw.plant_type) {
            continue;
        }

        let coordinates = raw.lat.zip(raw.lon);
        if coordinates.is_none() && source.drops_missing_coordinates_first() {
            continue;
        }

        let capacity = parse_capacity(&raw)?;
        let Some((latitude, longitude)) = coordinates else {
            continue;
        };

        plants.push(HydroPlant {
            id: raw.id,
            latitude,
            longitude,
            name: raw.name,
            plant_type: raw.plant_type,
            capacity,
            avg_annual_generation: raw.avg_annual_generation,
            head: raw.head,
            country_code: raw.country_code,
        });
    }

    Ok(plants)
}

/// Read plants from a hydropower plant database CSV file
pub fn read_hydro_plants(file_path: &Path, source: HydroSource) -> Result<Vec<HydroPlant>> {
    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Could not open {}", file_path.display()))?;
    let raw: Vec<HydroPlantRaw> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .with_context(|| format!("Error reading {}", file_path.display()))?;

    read_hydro_plants_from_iter(raw.into_iter(), source)
        .with_context(|| format!("Error reading {}", file_path.display()))
}

/// Get the plants which already exist, i.e. those with a known head height
pub fn existing_plants(plants: Vec<HydroPlant>) -> Vec<HydroPlant> {
    let total = plants.len();
    let existing: Vec<_> = plants
        .into_iter()
        .filter(|plant| plant.head.is_some())
        .collect();
    info!(
        "{} of {total} plants have no head height and were excluded",
        total - existing.len()
    );

    existing
}

/// Convert plants into point features, with attribute names to suit the source
pub fn plants_to_features(plants: &[HydroPlant], source: HydroSource) -> Vec<Feature> {
    let [lat_name, lon_name, type_name] = source.column_names();
    plants
        .iter()
        .map(|plant| {
            let mut properties = JsonObject::new();
            properties.insert("id".into(), plant.id.clone().into());
            properties.insert(lat_name.into(), plant.latitude.into());
            properties.insert(lon_name.into(), plant.longitude.into());
            properties.insert("name".into(), plant.name.clone().into());
            properties.insert(type_name.into(), plant.plant_type.clone().into());
            properties.insert("capacity".into(), plant.capacity.into());
            properties.insert(
                "avg_annual_generation_GWh".into(),
                plant.avg_annual_generation.map_or(Value::Null, Value::from),
            );
            properties.insert(
                "head".into(),
                plant.head.map_or(Value::Null, Value::from),
            );
            properties.insert("country_code".into(), plant.country_code.clone().into());

            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                    plant.longitude,
                    plant.latitude,
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect()
}
