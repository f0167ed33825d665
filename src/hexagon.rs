//! Attribution of placements and countries to SPIDER hexagons.
//!
//! This is where the outputs of the exclusion engine meet the hexagons made by SPIDER:
//!
//! 1. The turbine and PV placements inside each hexagon are counted ([`attach_counts`])
//! 2. Each hexagon is tagged with every country it overlaps ([`assign_country`]). Hexagons along
//!    a border come out once per country.
//! 3. Records tagged with a country other than the one being prepared are removed, leaving one
//!    record per hexagon ([`remove_extra_hexagons`])
//!
//! All geometries are expected to be in the same CRS.
use crate::country::clean_country_name;
use crate::id::CountryID;
use geo::{BoundingRect, Contains, Intersects, MultiPolygon, Point, Polygon, Rect};
use itertools::Itertools;
use log::debug;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde_json::{Map, Value};
use strum::{Display, EnumIter};
use unicase::UniCase;

/// The property holding the name of the country a hexagon belongs to
pub const COUNTRY_ATTRIBUTE: &str = "country";

/// A technology whose placements are counted per hexagon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Technology {
    /// Wind turbines
    #[strum(to_string = "turbine")]
    Wind,
    /// Solar PV plants
    #[strum(to_string = "pv")]
    Pv,
}

impl Technology {
    /// The hexagon property holding the number of placements for this technology
    pub fn count_attribute(self) -> &'static str {
        match self {
            Self::Wind => "theo_turbines",
            Self::Pv => "theo_pv",
        }
    }
}

/// A hexagon from SPIDER together with the attributes added by this module
#[derive(Debug, Clone, PartialEq)]
pub struct Hexagon {
    /// Position of the hexagon in the SPIDER output. Records for the same physical hexagon share
    /// this index.
    pub index: usize,
    /// The hexagon's outline
    pub geometry: Polygon<f64>,
    /// Other properties from SPIDER, passed through untouched
    pub properties: Map<String, Value>,
    /// Number of turbine placements inside the hexagon
    pub theo_turbines: u32,
    /// Number of PV placements inside the hexagon
    pub theo_pv: u32,
    /// Name of the country this record belongs to, once assigned
    pub country: Option<String>,
}

impl Hexagon {
    /// Create a hexagon with no placements and no country
    pub fn new(index: usize, geometry: Polygon<f64>, properties: Map<String, Value>) -> Self {
        Self {
            index,
            geometry,
            properties,
            theo_turbines: 0,
            theo_pv: 0,
            country: None,
        }
    }

    /// The number of placements of the given technology in this hexagon
    pub fn count(&self, technology: Technology) -> u32 {
        match technology {
            Technology::Wind => self.theo_turbines,
            Technology::Pv => self.theo_pv,
        }
    }

    fn count_mut(&mut self, technology: Technology) -> &mut u32 {
        match technology {
            Technology::Wind => &mut self.theo_turbines,
            Technology::Pv => &mut self.theo_pv,
        }
    }
}

/// A country polygon from the world boundaries dataset
#[derive(Debug, Clone, PartialEq)]
pub struct CountryBoundary {
    /// The country's name
    pub name: String,
    /// The country's outline
    pub geometry: MultiPolygon<f64>,
}

type Envelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn envelope(rect: Rect<f64>, index: usize) -> Envelope {
    let (min, max) = (rect.min(), rect.max());
    GeomWithData::new(Rectangle::from_corners([min.x, min.y], [max.x, max.y]), index)
}

/// Spatial index over the bounding boxes of a set of geometries, keyed by position
struct EnvelopeIndex(RTree<Envelope>);

impl EnvelopeIndex {
    fn new(rects: impl Iterator<Item = Option<Rect<f64>>>) -> Self {
        let envelopes = rects
            .enumerate()
            .filter_map(|(i, rect)| Some(envelope(rect?, i)))
            .collect();

        Self(RTree::bulk_load(envelopes))
    }

    /// Positions of geometries whose bounding box contains the point, in ascending order
    fn at_point(&self, point: Point<f64>) -> Vec<usize> {
        self.0
            .locate_all_at_point(&[point.x(), point.y()])
            .map(|envelope| envelope.data)
            .sorted_unstable()
            .collect()
    }

    /// Positions of geometries whose bounding box intersects `rect`, in ascending order
    fn intersecting(&self, rect: Rect<f64>) -> Vec<usize> {
        let (min, max) = (rect.min(), rect.max());
        let aabb = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        self.0
            .locate_in_envelope_intersecting(&aabb)
            .map(|envelope| envelope.data)
            .sorted_unstable()
            .collect()
    }
}

/// Find the hexagon a point belongs to.
///
/// The first hexagon (in input order) whose interior contains the point wins. A point on the
/// boundary between hexagons belongs to none of their interiors, so it goes to the first hexagon
/// whose boundary it lies on instead. Each point is therefore counted at most once, and only
/// points outside every hexagon are dropped.
fn locate_point(index: &EnvelopeIndex, hexagons: &[Hexagon], point: Point<f64>) -> Option<usize> {
    let candidates = index.at_point(point);
    candidates
        .iter()
        .copied()
        .find(|&i| hexagons[i].geometry.contains(&point))
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|&i| hexagons[i].geometry.intersects(&point))
        })
}

/// Count how many of `points` fall in each hexagon.
///
/// The returned vector is parallel to `hexagons`. Hexagons without any points get a count of 0.
pub fn count_points(hexagons: &[Hexagon], points: &[Point<f64>]) -> Vec<u32> {
    let index = EnvelopeIndex::new(hexagons.iter().map(|hexagon| hexagon.geometry.bounding_rect()));
    let mut counts = vec![0; hexagons.len()];
    let mut dropped = 0usize;
    for &point in points {
        match locate_point(&index, hexagons, point) {
            Some(i) => counts[i] += 1,
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(
            "{dropped} of {} points were outside all hexagons",
            points.len()
        );
    }

    counts
}

/// Set each hexagon's count for `technology` to the number of `points` inside it
pub fn attach_counts(hexagons: &mut [Hexagon], technology: Technology, points: &[Point<f64>]) {
    let counts = count_points(hexagons, points);
    for (hexagon, count) in hexagons.iter_mut().zip(counts) {
        *hexagon.count_mut(technology) = count;
    }
}

/// Tag hexagons with the countries they overlap.
///
/// A hexagon which overlaps several countries yields one record per country, in the order the
/// countries appear in `world`. Hexagons overlapping no country are dropped.
pub fn assign_country(hexagons: &[Hexagon], world: &[CountryBoundary]) -> Vec<Hexagon> {
    let index = EnvelopeIndex::new(world.iter().map(|country| country.geometry.bounding_rect()));

    let mut tagged = Vec::new();
    for hexagon in hexagons {
        let Some(rect) = hexagon.geometry.bounding_rect() else {
            continue;
        };

        for i in index.intersecting(rect) {
            let country = &world[i];
            if hexagon.geometry.intersects(&country.geometry) {
                tagged.push(Hexagon {
                    country: Some(country.name.clone()),
                    ..hexagon.clone()
                });
            }
        }
    }

    tagged
}

/// Whether a country name refers to the given country
fn is_country(name: &str, country_id: &CountryID) -> bool {
    UniCase::new(clean_country_name(name).as_str()) == UniCase::new(country_id.as_str())
}

/// Keep only the records tagged with the target country, one per hexagon.
///
/// Country names are compared by their cleaned identifiers, ignoring case, so "Côte d'Ivoire" in
/// the world boundaries matches `CotedIvoire`. Untagged records are removed.
pub fn remove_extra_hexagons(hexagons: Vec<Hexagon>, country_id: &CountryID) -> Vec<Hexagon> {
    let before = hexagons.len();
    let kept = hexagons
        .into_iter()
        .filter(|hexagon| {
            hexagon
                .country
                .as_deref()
                .is_some_and(|name| is_country(name, country_id))
        })
        .unique_by(|hexagon| hexagon.index)
        .collect_vec();
    debug!(
        "Removed {} hexagon records not belonging to {country_id}",
        before - kept.len()
    );

    kept
}
