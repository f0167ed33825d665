//! Countries and their file-safe identifiers.
use crate::id::CountryID;
use crate::utm::utm_epsg;
use anyhow::{Context, Result};
use deunicode::deunicode;
use geo::{InteriorPoint, MultiPolygon, Point};

/// Characters removed from country names after transliteration
const STRIPPED_CHARS: [char; 3] = [' ', '.', '\''];

/// Get the identifier used for a country in file names and SPIDER configs.
///
/// Accented and other non-ASCII characters are transliterated to ASCII, then spaces, periods and
/// apostrophes are removed, so "Côte d'Ivoire" becomes "CotedIvoire". Applying this to its own
/// output gives the same output again.
pub fn clean_country_name(name: &str) -> CountryID {
    deunicode(name)
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect::<String>()
        .into()
}

/// A country being processed by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    /// The name as it appears in the boundaries dataset (e.g. "Dem. Rep. Congo")
    pub name: String,
    /// The cleaned identifier (e.g. "DemRepCongo")
    pub id: CountryID,
    /// Country boundary in EPSG:4326
    pub boundary: MultiPolygon<f64>,
    /// A point guaranteed to lie inside the boundary
    pub representative_point: Point<f64>,
    /// EPSG code for the country's UTM zone
    pub epsg: u32,
}

impl Country {
    /// Create a [`Country`] from its name and boundary (in EPSG:4326)
    pub fn new(name: &str, boundary: MultiPolygon<f64>) -> Result<Self> {
        let representative_point = boundary
            .interior_point()
            .with_context(|| format!("Boundary for {name} is empty"))?;
        let epsg = utm_epsg(representative_point.y(), representative_point.x())
            .with_context(|| format!("Could not determine UTM zone for {name}"))?;

        Ok(Self {
            name: name.to_string(),
            id: clean_country_name(name),
            boundary,
            representative_point,
            epsg,
        })
    }
}
