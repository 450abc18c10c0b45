//! Web Mercator projection onto the unit square.
//!
//! `x` grows eastwards and `y` grows southwards, both in `[0, 1]`. At zoom
//! `z` one unit spans `extent * 2^z` screen pixels.

use std::f64::consts::PI;

/// Longitude to projected x
pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Latitude to projected y, clamped to the square at the poles
pub fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Projected x back to longitude
pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Projected y back to latitude
pub fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

pub fn project(lon: f64, lat: f64) -> [f64; 2] {
    [lng_x(lon), lat_y(lat)]
}

pub fn unproject(p: [f64; 2]) -> (f64, f64) {
    (x_lng(p[0]), y_lat(p[1]))
}

/// Size of one projected unit in pixels at `zoom`
pub fn pixels_per_unit(zoom: u8, extent: f64) -> f64 {
    extent * 2f64.powi(zoom as i32)
}

/// Euclidean distance between two projected points
pub fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}
