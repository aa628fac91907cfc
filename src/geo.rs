use ::geo::{Distance, Geodesic, Point};
use serde::{Deserialize, Serialize};

use crate::error::{FloodError, Result};

/// A (latitude, longitude) pair in degrees, EPSG:4326 order.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Checks that latitude lies in [-90, 90] and longitude in [-180, 180].
    pub fn validate(self) -> Result<Self> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lon_ok = self.lon.is_finite() && (-180.0..=180.0).contains(&self.lon);
        if lat_ok && lon_ok {
            Ok(self)
        } else {
            Err(FloodError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }

    /// Sum of absolute latitude and longitude deltas, in degrees.
    pub fn manhattan_degrees(&self, other: &Position) -> f64 {
        (self.lat - other.lat).abs() + (self.lon - other.lon).abs()
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Geodesic distance on the WGS-84 ellipsoid (Karney's algorithm).
/// Input positions in degrees. Output in meters.
pub fn distance(a: Position, b: Position) -> Result<f64> {
    let (a, b) = (a.validate()?, b.validate()?);
    if a == b {
        return Ok(0.0);
    }
    let meters = Geodesic.distance(a.to_point(), b.to_point());
    Ok(meters.abs())
}
