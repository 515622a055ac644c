//! The fixed area of interest every layer and statistic is computed over.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Meters per degree of latitude (spherical approximation).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Web Mercator ground resolution at zoom 0 on the equator, in meters/pixel.
const MERCATOR_ZOOM0_METERS_PER_PIXEL: f64 = 156_543.033_92;

/// Map viewport assumed when the extent is given as a zoom level.
const VIEWPORT_WIDTH_PX: f64 = 800.0;
const VIEWPORT_HEIGHT_PX: f64 = 600.0;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// How far the area reaches from its center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AoiExtent {
    /// Circular buffer around the center point.
    Radius { meters: f64 },
    /// The viewport of a web map at this zoom level.
    Zoom { level: u8 },
}

/// Geometry handed to the backend for filtering, clipping and reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// A point buffered by `radius_m` meters.
    Buffer { center: LatLon, radius_m: f64 },
    /// An axis-aligned rectangle in degrees.
    Rectangle { bbox: BoundingBox },
}

impl Geometry {
    /// Bounding box enclosing the geometry.
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Geometry::Buffer { center, radius_m } => {
                let (half_w, half_h) = degrees_for_meters(center.lat, *radius_m, *radius_m);
                BoundingBox::new(
                    center.lon - half_w,
                    center.lat - half_h,
                    center.lon + half_w,
                    center.lat + half_h,
                )
            }
            Geometry::Rectangle { bbox } => *bbox,
        }
    }
}

/// The region the dashboard analyses. Immutable for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOfInterest {
    pub name: String,
    pub center: LatLon,
    pub extent: AoiExtent,
}

impl AreaOfInterest {
    pub fn new(name: impl Into<String>, center: LatLon, extent: AoiExtent) -> Self {
        Self {
            name: name.into(),
            center,
            extent,
        }
    }

    /// Erbil city center at zoom 13.
    pub fn erbil() -> Self {
        Self::new(
            "Erbil",
            LatLon::new(36.191111, 44.009167),
            AoiExtent::Zoom { level: 13 },
        )
    }

    /// Geometry used to clip every layer and to bound every reduction.
    pub fn geometry(&self) -> Geometry {
        match self.extent {
            AoiExtent::Radius { meters } => Geometry::Buffer {
                center: self.center,
                radius_m: meters,
            },
            AoiExtent::Zoom { .. } => Geometry::Rectangle {
                bbox: self.bounds(),
            },
        }
    }

    /// Bounding box in EPSG:4326 degrees.
    pub fn bounds(&self) -> BoundingBox {
        match self.extent {
            AoiExtent::Radius { meters } => Geometry::Buffer {
                center: self.center,
                radius_m: meters,
            }
            .bounds(),
            AoiExtent::Zoom { level } => {
                let meters_per_px = MERCATOR_ZOOM0_METERS_PER_PIXEL
                    * self.center.lat.to_radians().cos()
                    / 2f64.powi(level as i32);
                let (half_w, half_h) = degrees_for_meters(
                    self.center.lat,
                    meters_per_px * VIEWPORT_WIDTH_PX / 2.0,
                    meters_per_px * VIEWPORT_HEIGHT_PX / 2.0,
                );
                BoundingBox::new(
                    self.center.lon - half_w,
                    self.center.lat - half_h,
                    self.center.lon + half_w,
                    self.center.lat + half_h,
                )
            }
        }
    }
}

impl Default for AreaOfInterest {
    fn default() -> Self {
        Self::erbil()
    }
}

/// Convert east-west and north-south distances at `lat` to degrees.
fn degrees_for_meters(lat: f64, east_west_m: f64, north_south_m: f64) -> (f64, f64) {
    let lon_scale = (METERS_PER_DEGREE * lat.to_radians().cos()).max(f64::EPSILON);
    (east_west_m / lon_scale, north_south_m / METERS_PER_DEGREE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_bounds_are_centered() {
        let aoi = AreaOfInterest::new(
            "test",
            LatLon::new(36.0, 44.0),
            AoiExtent::Radius { meters: 5_000.0 },
        );
        let bounds = aoi.bounds();
        let (cx, cy) = bounds.center();
        assert!((cx - 44.0).abs() < 1e-9);
        assert!((cy - 36.0).abs() < 1e-9);
        // 5 km north-south is ~0.045 degrees
        assert!((bounds.height() - 0.0898).abs() < 0.001);
        // Longitude degrees are shorter at 36N, so the box is wider
        assert!(bounds.width() > bounds.height());
    }

    #[test]
    fn test_zoom_bounds_shrink_with_zoom() {
        let wide = AreaOfInterest::new("a", LatLon::new(36.19, 44.0), AoiExtent::Zoom { level: 10 });
        let narrow = AreaOfInterest::new("b", LatLon::new(36.19, 44.0), AoiExtent::Zoom { level: 13 });
        assert!(wide.bounds().width() > narrow.bounds().width() * 7.9);
        assert!(narrow.bounds().contains_point(44.0, 36.19));
    }

    #[test]
    fn test_geometry_matches_extent() {
        let erbil = AreaOfInterest::erbil();
        assert!(matches!(erbil.geometry(), Geometry::Rectangle { .. }));
        assert_eq!(erbil.geometry().bounds(), erbil.bounds());

        let buffered = AreaOfInterest::new(
            "r",
            LatLon::new(36.0, 44.0),
            AoiExtent::Radius { meters: 1_000.0 },
        );
        assert!(matches!(buffered.geometry(), Geometry::Buffer { .. }));
        assert_eq!(buffered.geometry().bounds(), buffered.bounds());
    }
}
