use super::bson_serde::{naive_as_bson_datetime, uuid_as_binary};
use super::formats::{BoundingBoxFormat, KeypointsFormat};
use super::Validate;
use crate::error::ValidationError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of a packed keypoint row: `[x, y, visibility, quality]`
pub const KEYPOINT_WIDTH: usize = 4;

/// Width of a packed bounding box: `[x1, y1, x2, y2, quality]`
pub const BBOX_WIDTH: usize = 5;

/// Provenance of a 2D pose detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose2dMetadata {
    #[serde(with = "uuid_as_binary")]
    pub inference_run_id: Uuid,
    #[serde(with = "naive_as_bson_datetime")]
    pub inference_run_created_at: NaiveDateTime,
    #[serde(with = "uuid_as_binary")]
    pub environment_id: Uuid,
    #[serde(with = "uuid_as_binary")]
    pub camera_device_id: Uuid,
    pub bounding_box_format: BoundingBoxFormat,
    pub keypoints_format: KeypointsFormat,
}

/// Keypoint matrix, one `[x, y, visibility, quality]` row per joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose2dOutput {
    pub keypoints: Vec<[f64; KEYPOINT_WIDTH]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxOutput {
    pub bbox: [f64; BBOX_WIDTH],
}

/// A single per-camera 2D pose detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose2d {
    #[serde(rename = "_id", alias = "id", with = "uuid_as_binary")]
    pub id: Uuid,
    /// Store-local wall clock time of the frame.
    ///
    /// Stored with millisecond precision; sub-millisecond digits are
    /// truncated on insert.
    #[serde(with = "naive_as_bson_datetime")]
    pub timestamp: NaiveDateTime,
    pub metadata: Pose2dMetadata,
    pub pose: Pose2dOutput,
    pub bbox: BoundingBoxOutput,
}

impl Pose2d {
    /// Build a detection with a freshly generated identifier
    pub fn new(
        timestamp: NaiveDateTime,
        metadata: Pose2dMetadata,
        keypoints: Vec<[f64; KEYPOINT_WIDTH]>,
        bbox: [f64; BBOX_WIDTH],
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            metadata,
            pose: Pose2dOutput { keypoints },
            bbox: BoundingBoxOutput { bbox },
        }
    }
}

impl Validate for Pose2d {
    fn validate(&self) -> Result<(), ValidationError> {
        let expected = self.metadata.keypoints_format.num_keypoints();
        let actual = self.pose.keypoints.len();
        if actual != expected {
            return Err(ValidationError::Arity {
                field: "pose.keypoints".to_string(),
                expected,
                actual,
            });
        }

        // Coordinates and qualities may be NaN for undetected joints, infinities never.
        let infinite_keypoint = self
            .pose
            .keypoints
            .iter()
            .flatten()
            .any(|v| v.is_infinite());
        if infinite_keypoint {
            return Err(ValidationError::NonFinite {
                field: "pose.keypoints".to_string(),
            });
        }
        if self.bbox.bbox.iter().any(|v| v.is_infinite()) {
            return Err(ValidationError::NonFinite {
                field: "bbox.bbox".to_string(),
            });
        }

        Ok(())
    }
}
