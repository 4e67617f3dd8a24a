use std::fmt::Display;

use async_graphql::SimpleObject;

static EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, SimpleObject, Copy, Clone, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> LatLng {
        LatLng {
            latitude,
            longitude,
        }
    }

    /// Haversine distance in kilometers.
    pub fn dist_km(&self, other: LatLng) -> f64 {
        let delta_latitude = (self.latitude - other.latitude).to_radians();
        let delta_longitude = (self.longitude - other.longitude).to_radians();

        let central_angle_inner = (delta_latitude / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (delta_longitude / 2.0).sin().powi(2);
        let central_angle = 2.0 * central_angle_inner.sqrt().asin();

        EARTH_RADIUS_KM * central_angle
    }
}
