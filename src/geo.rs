use crate::model::attendance::GeoPoint;
use tracing::debug;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Decides whether a clock-in location counts as on-site.
pub trait Geofence: Send + Sync {
    fn is_within(&self, point: &GeoPoint) -> bool;
}

/// Circle of `radius_m` metres around an office.
#[derive(Debug, Clone, Copy)]
pub struct RadiusGeofence {
    pub center: GeoPoint,
    pub radius_m: f64,
}

impl RadiusGeofence {
    pub fn new(center: GeoPoint, radius_m: f64) -> Self {
        Self { center, radius_m }
    }
}

impl Geofence for RadiusGeofence {
    fn is_within(&self, point: &GeoPoint) -> bool {
        if !point.is_valid() {
            debug!(
                latitude = point.latitude,
                longitude = point.longitude,
                "Invalid coordinates, treating as outside geofence"
            );
            return false;
        }

        let distance = haversine_m(point, &self.center);
        let within = distance <= self.radius_m;
        debug!(distance, radius = self.radius_m, within, "Geofence check");
        within
    }
}

/// Great-circle distance in metres.
pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}
