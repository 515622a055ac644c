//! Common test fixtures for dashboard tests.
//!
//! Collection ids mirror the default layer catalog so scripted backend
//! behavior lines up with what the resolver asks for.

use chrono::NaiveDate;
use urban_common::{AoiExtent, AreaOfInterest, DateRange, LatLon};

/// Default collection ids per layer.
pub mod collections {
    pub const LAND_USE: &str = "ESA/WorldCover/v200";
    pub const SOIL_TEMPERATURE: &str = "NASA/GLDAS/V021/NOAH/G025/T3H";
    pub const SENTINEL2: &str = "COPERNICUS/S2_SR_HARMONIZED";
    pub const ROADS: &str = "projects/sat-io/open-datasets/GRIP4/Middle-East-Central-Asia";
    pub const DYNAMIC_WORLD: &str = "GOOGLE/DYNAMICWORLD/V1";
}

/// Default band names.
pub mod bands {
    pub const SOIL_TEMPERATURE: &str = "SoilTMP0_10cm_inst";
    pub const NDVI: &str = "NDVI";
    pub const BUILT: &str = "built";
}

/// Shorthand for a calendar date; panics on invalid input.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// The first half of 2023.
pub fn h1_2023() -> DateRange {
    DateRange::new(date(2023, 1, 1), date(2023, 6, 1))
}

/// A range with start after end.
pub fn reversed_range() -> DateRange {
    DateRange::new(date(2023, 6, 1), date(2023, 1, 1))
}

/// Small circular area around Erbil citadel.
pub fn citadel_aoi() -> AreaOfInterest {
    AreaOfInterest::new(
        "Erbil citadel",
        LatLon::new(36.1912, 44.0092),
        AoiExtent::Radius { meters: 2_000.0 },
    )
}
