//! Selection of the UTM zone used to project a country.
use anyhow::{Result, ensure};

/// Get the EPSG code of the WGS 84 / UTM zone for a point given in degrees.
///
/// The zone is the 6° longitude band containing the point and the hemisphere is taken from the
/// latitude (EPSG 326xx for north, 327xx for south). Halfway values round to even, so a point
/// exactly on the equator is put in the southern zone.
pub fn utm_epsg(latitude: f64, longitude: f64) -> Result<u32> {
    ensure!(
        latitude.is_finite() && (-90.0..=90.0).contains(&latitude),
        "Latitude must be between -90 and 90 degrees, got {latitude}"
    );
    ensure!(
        longitude.is_finite() && (-180.0..=180.0).contains(&longitude),
        "Longitude must be between -180 and 180 degrees, got {longitude}"
    );

    // Either 0 (south) or 1 (north). The pole itself would otherwise round to 2.
    let hemisphere = ((45.0 + latitude) / 90.0).round_ties_even().min(1.0);
    // The antimeridian at -180 would otherwise round to zone 0
    let zone = ((183.0 + longitude) / 6.0).round_ties_even().clamp(1.0, 60.0);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let epsg = 32700 - hemisphere as u32 * 100 + zone as u32;

    Ok(epsg)
}
