//! Layer kinds shown on the dashboard.

use serde::{Deserialize, Serialize};

/// A togglable thematic layer.
///
/// Variant order is the render priority: layers earlier in the list are
/// drawn first and therefore sit lower on the map. `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    LandUse,
    #[serde(alias = "climate")]
    Temperature,
    Ndvi,
    Vegetation,
    Roads,
    #[serde(alias = "density")]
    UrbanDensity,
}

impl LayerKind {
    /// All kinds in render priority order.
    pub const ALL: [LayerKind; 6] = [
        LayerKind::LandUse,
        LayerKind::Temperature,
        LayerKind::Ndvi,
        LayerKind::Vegetation,
        LayerKind::Roads,
        LayerKind::UrbanDensity,
    ];

    /// Stable identifier used in URLs and config files.
    pub fn id(&self) -> &'static str {
        match self {
            LayerKind::LandUse => "land_use",
            LayerKind::Temperature => "temperature",
            LayerKind::Ndvi => "ndvi",
            LayerKind::Vegetation => "vegetation",
            LayerKind::Roads => "roads",
            LayerKind::UrbanDensity => "urban_density",
        }
    }

    /// Human-readable title for the layer control.
    pub fn title(&self) -> &'static str {
        match self {
            LayerKind::LandUse => "Land Use",
            LayerKind::Temperature => "Climate Zones",
            LayerKind::Ndvi => "NDVI",
            LayerKind::Vegetation => "Vegetation",
            LayerKind::Roads => "Roads",
            LayerKind::UrbanDensity => "Urban Density",
        }
    }

    /// Data source credit shown in the info box.
    pub fn attribution(&self) -> &'static str {
        match self {
            LayerKind::LandUse => "ESA WorldCover",
            LayerKind::Temperature => "NASA GLDAS",
            LayerKind::Ndvi | LayerKind::Vegetation => "Sentinel-2",
            LayerKind::Roads => "GRIP4 Global Roads",
            LayerKind::UrbanDensity => "Google Dynamic World",
        }
    }

    /// Vector layers render as features instead of an image overlay.
    pub fn is_vector(&self) -> bool {
        matches!(self, LayerKind::Roads)
    }

    /// Whether the layer is driven by a date range.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            LayerKind::Temperature
                | LayerKind::Ndvi
                | LayerKind::Vegetation
                | LayerKind::UrbanDensity
        )
    }

    /// Whether the layer has a categorical multi-select filter.
    pub fn is_categorical(&self) -> bool {
        matches!(
            self,
            LayerKind::LandUse | LayerKind::Vegetation | LayerKind::Roads
        )
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut shuffled = vec![
            LayerKind::UrbanDensity,
            LayerKind::Ndvi,
            LayerKind::Roads,
            LayerKind::LandUse,
            LayerKind::Vegetation,
            LayerKind::Temperature,
        ];
        shuffled.sort();
        assert_eq!(shuffled, LayerKind::ALL.to_vec());
    }

    #[test]
    fn test_serde_aliases() {
        let kind: LayerKind = serde_json::from_str("\"climate\"").unwrap();
        assert_eq!(kind, LayerKind::Temperature);
        let kind: LayerKind = serde_json::from_str("\"urban_density\"").unwrap();
        assert_eq!(kind, LayerKind::UrbanDensity);
        assert_eq!(serde_json::to_string(&LayerKind::LandUse).unwrap(), "\"land_use\"");
    }

    #[test]
    fn test_ids_match_serde_names() {
        for kind in LayerKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
        }
    }
}
