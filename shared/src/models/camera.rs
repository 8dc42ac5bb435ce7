//! Camera Model — video sources, crop metadata, dispatch audit

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::table::TableState;

/// Json-table identifier inside a crop JSON document
///
/// The cropper emits either integers or strings; both normalize to the
/// string key used in the dispatch dedupe tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonTableId {
    Int(i64),
    Str(String),
}

impl JsonTableId {
    pub fn as_key(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for JsonTableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_key())
    }
}

/// Rotated bounding box from the segmentation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatedBbox {
    pub center: [f64; 2],
    pub size: [f64; 2],
    #[serde(default)]
    pub angle: f64,
    /// Four corner points; preferred over center/size when present
    #[serde(default)]
    pub corners: Option<Vec<[f64; 2]>>,
}

/// Crop output dimensions recorded after extraction
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CropSize {
    pub width: u32,
    pub height: u32,
}

/// One table entry of the crop JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropTable {
    pub id: JsonTableId,
    pub rotated_bbox: RotatedBbox,
    #[serde(default)]
    pub crop_file: Option<String>,
    #[serde(default)]
    pub crop_size: Option<CropSize>,
    /// Unknown per-table fields are preserved round-trip
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Crop JSON document installed per camera
///
/// Unknown top-level fields are preserved round-trip via `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropJson {
    #[serde(default)]
    pub frame_width: Option<u32>,
    #[serde(default)]
    pub frame_height: Option<u32>,
    #[serde(default)]
    pub video_name: Option<String>,
    #[serde(default)]
    pub tables: Vec<CropTable>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Registered camera with its crop metadata and capture bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Camera {
    pub camera_id: String,
    pub restaurant_id: String,
    /// `file://` path, bare path, `http(s)://` URL, or `rtsp://` URL
    pub video_source: String,
    /// Installed crop JSON (raw document)
    pub crop_json: Option<String>,
    /// json-table-id → physical table id, installed with the crop JSON
    pub table_map: Option<String>,
    pub last_capture_ts: Option<i64>,
    pub last_frame_index: Option<i64>,
    /// Set while the frame source is failing; cleared on recovery
    pub degraded: bool,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Camera {
    pub fn parsed_crop_json(&self) -> Option<CropJson> {
        self.crop_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn parsed_table_map(&self) -> HashMap<String, String> {
        self.table_map
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// Camera registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraRegister {
    pub camera_id: String,
    pub video_source: String,
    #[serde(default)]
    pub crop_json: Option<CropJson>,
    /// json-table-id → physical table id
    #[serde(default)]
    pub table_map: Option<HashMap<String, String>>,
}

/// Dispatch log status ladder: queued → dispatched → succeeded | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum DispatchStatus {
    Queued,
    Dispatched,
    Succeeded,
    Failed,
}

/// Append-only dispatch audit row; `(camera_id, json_table_id, frame_index)`
/// is unique and carries the idempotence guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CropDispatchLog {
    pub id: i64,
    pub camera_id: String,
    pub json_table_id: String,
    pub frame_index: i64,
    pub status: DispatchStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub dispatched_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
}

/// Classifier prediction for one crop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: TableState,
    pub confidence: f64,
    /// Model identifier, when the classifier reports one
    #[serde(default)]
    pub model_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_json_preserves_unknown_fields() {
        let raw = r#"{
            "frame_width": 1920,
            "frame_height": 1080,
            "segmentation_model": "sam-v3",
            "tables": [
                {
                    "id": 2,
                    "rotated_bbox": {
                        "center": [100.0, 200.0],
                        "size": [50.0, 40.0],
                        "angle": 12.5,
                        "corners": [[75.0,180.0],[125.0,180.0],[125.0,220.0],[75.0,220.0]]
                    },
                    "crop_file": "cam1/t2.jpg"
                }
            ]
        }"#;
        let parsed: CropJson = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.frame_width, Some(1920));
        assert_eq!(parsed.tables.len(), 1);
        assert_eq!(parsed.tables[0].id.as_key(), "2");
        assert!(parsed.extra.contains_key("segmentation_model"));

        let round = serde_json::to_value(&parsed).unwrap();
        assert_eq!(round["segmentation_model"], "sam-v3");
    }

    #[test]
    fn json_table_id_accepts_strings_and_ints() {
        let a: JsonTableId = serde_json::from_str("\"T0\"").unwrap();
        let b: JsonTableId = serde_json::from_str("7").unwrap();
        assert_eq!(a.as_key(), "T0");
        assert_eq!(b.as_key(), "7");
    }
}
