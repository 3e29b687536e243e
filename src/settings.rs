//! Persisted warp records
//!
//! Each warp serializes to one flat record. Points are stored as `[x, y]`
//! pairs, the kind as its tag string so unknown kinds can be reported
//! instead of failing the whole file.

use serde::{Deserialize, Serialize};

use crate::blend::BlendSettings;
use crate::geometry::Point;

/// Settings file holding every warp in draw order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Raw entries; each one is decoded on its own so a bad entry only
    /// drops that warp
    #[serde(default)]
    pub warps: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpRecord {
    pub kind: String,

    #[serde(default = "default_brightness")]
    pub brightness: f64,

    pub grid: GridRecord,

    #[serde(default)]
    pub blend: BlendSettings,

    /// Mesh options, bilinear family only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshRecord>,

    /// Perspective corners (TL, TR, BR, BL), composite warps only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<[Point; 4]>,
}

fn default_brightness() -> f64 { 1.0 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub columns: usize,
    pub rows: usize,
    pub control_points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord {
    pub resolution: u32,
    pub linear: bool,
    pub adaptive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_layout() {
        let record = WarpRecord {
            kind: "bilinear".to_string(),
            brightness: 0.8,
            grid: GridRecord {
                columns: 2,
                rows: 2,
                control_points: vec![
                    Point::new(0.0, 0.0),
                    Point::new(0.0, 1.0),
                    Point::new(1.0, 0.0),
                    Point::new(1.0, 1.0),
                ],
            },
            blend: BlendSettings::default(),
            mesh: Some(MeshRecord {
                resolution: 16,
                linear: false,
                adaptive: true,
            }),
            corners: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "bilinear");
        assert_eq!(value["grid"]["control_points"][1], serde_json::json!([0.0, 1.0]));
        assert_eq!(value["mesh"]["resolution"], 16);
        assert!(value.get("corners").is_none());
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{
            "kind": "perspective",
            "grid": {"columns": 2, "rows": 2, "control_points": [[0,0],[1,0],[1,1],[0,1]]}
        }"#;
        let record: WarpRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.brightness, 1.0);
        assert_eq!(record.blend, BlendSettings::default());
        assert_eq!(record.mesh, None);
        assert_eq!(record.grid.control_points[2], Point::new(1.0, 1.0));
    }
}
