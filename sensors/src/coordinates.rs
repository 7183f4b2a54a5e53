use nmea::sentences::GgaData;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius (IUGG) in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Error, PartialEq)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// # Explanation
/// The GeoCoord struct represents a geographical coordinate (consisting of longitude and latitude).
/// A missing fix is never encoded as a GeoCoord, it is represented by `Option::None` instead.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lon: f64,
    pub lat: f64,
}

impl GeoCoord {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        GeoCoord {
            lon: longitude,
            lat: latitude,
        }
    }

    /// # Explanation
    /// This function takes an GGA-sentence and extracts the geographic coordinates (longitude and
    /// latitude) from it. If one of the two is missing the receiver has no fix and None is
    /// returned.
    pub fn from_gga(gga_sentence: GgaData) -> Option<GeoCoord> {
        match gga_sentence {
            GgaData {
                longitude: Some(lon),
                latitude: Some(lat),
                ..
            } => Some(GeoCoord::new(lon, lat)),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(CoordinateError::LongitudeOutOfRange(self.lon));
        }
        Ok(())
    }

    /// The `"<lat>:<lon>"` form consumed by the payload converter.
    pub fn to_exchange_string(&self) -> String {
        format!("{}:{}", self.lat, self.lon)
    }
}

pub trait GeoDistance {
    fn distance_km(&self, from: GeoCoord, to: GeoCoord) -> Result<f64, CoordinateError>;
}

/// # Explanation
/// The Haversine struct computes the great-circle distance between two geographic coordinates on
/// a sphere with the mean earth radius. The result is symmetric and exactly zero for identical
/// points.
#[derive(Debug, Default, Copy, Clone)]
pub struct Haversine;

impl Haversine {
    pub fn new() -> Self {
        Haversine {}
    }
}

impl GeoDistance for Haversine {
    fn distance_km(&self, from: GeoCoord, to: GeoCoord) -> Result<f64, CoordinateError> {
        from.validate()?;
        to.validate()?;

        let rad_lat_from = from.lat.to_radians();
        let rad_lat_to = to.lat.to_radians();
        let half_d_lat = (to.lat - from.lat).abs().to_radians() / 2.0;
        let half_d_lon = (to.lon - from.lon).abs().to_radians() / 2.0;

        let a = half_d_lat.sin().powi(2)
            + rad_lat_from.cos() * rad_lat_to.cos() * half_d_lon.sin().powi(2);
        let central_angle = 2.0 * a.sqrt().min(1.0).asin();

        Ok(EARTH_RADIUS_KM * central_angle)
    }
}
