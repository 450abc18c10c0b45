use serde::{Deserialize, Serialize};

use crate::error::{PvMapError, Result};

/// Highest zoom level a viewport can report
pub const MAX_VIEWPORT_ZOOM: u8 = 24;

/// Geographic bounding box in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Approximate extent of Germany, the map's initial region
    pub const GERMANY: BoundingBox =
        BoundingBox { west: 5.87, south: 47.27, east: 15.04, north: 55.06 };

    /// Create a validated bounding box.
    ///
    /// Degenerate boxes and boxes crossing the antimeridian (west >= east)
    /// are rejected.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        let bbox = Self { west, south, east, north };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Create a bounding box from `[west, south, east, north]`
    pub fn from_array(coords: [f64; 4]) -> Result<Self> {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn validate(&self) -> Result<()> {
        let coords = [self.west, self.south, self.east, self.north];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(PvMapError::InvalidViewport {
                reason: "bounding box contains a non-finite coordinate".to_string(),
            });
        }
        if self.west >= self.east {
            return Err(PvMapError::InvalidViewport {
                reason: format!("west ({}) must be less than east ({})", self.west, self.east),
            });
        }
        if self.south >= self.north {
            return Err(PvMapError::InvalidViewport {
                reason: format!("south ({}) must be less than north ({})", self.south, self.north),
            });
        }
        if self.south < -90.0 || self.north > 90.0 {
            return Err(PvMapError::InvalidViewport {
                reason: "latitude outside [-90, 90]".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// `[west, south, east, north]`, the order the remote contract expects
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Inclusive containment test
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }
}

/// Visible map region and its integer zoom level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bbox: BoundingBox,
    pub zoom: u8,
}

impl Viewport {
    pub fn new(bbox: BoundingBox, zoom: u8) -> Self {
        Self { bbox, zoom: zoom.min(MAX_VIEWPORT_ZOOM) }
    }

    /// Build a viewport from a map-idle event with a fractional zoom.
    ///
    /// The zoom is rounded to the nearest integer and clamped to
    /// `0..=MAX_VIEWPORT_ZOOM`.
    pub fn from_map_idle(bbox: BoundingBox, zoom: f64) -> Result<Self> {
        bbox.validate()?;
        if !zoom.is_finite() {
            return Err(PvMapError::InvalidViewport {
                reason: format!("zoom {} is not a finite number", zoom),
            });
        }
        let rounded = zoom.round().clamp(0.0, MAX_VIEWPORT_ZOOM as f64) as u8;
        Ok(Self::new(bbox, rounded))
    }
}
