//! Record schemas for stored pose detections and reconstructions.

pub mod bson_serde;
pub mod formats;
pub mod pose_2d;
pub mod pose_3d;
pub mod rounding;

pub use formats::{BoundingBoxFormat, KeypointsFormat, PosePairScoreDistanceMethod};
pub use pose_2d::{BoundingBoxOutput, Pose2d, Pose2dMetadata, Pose2dOutput};
pub use pose_3d::{Pose3d, Pose3dLimits, Pose3dMetadata, Pose3dOutput};
pub use rounding::{round_to_precision, RoundedFloat};

use crate::error::ValidationError;
use bson::Document;
use serde::de::DeserializeOwned;

/// Structural checks beyond what deserialization enforces
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Decode a record from JSON and validate it
pub fn from_json_value<T>(value: serde_json::Value) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let record: T =
        serde_json::from_value(value).map_err(|e| ValidationError::Decode(e.to_string()))?;
    record.validate()?;
    Ok(record)
}

/// Decode a record from a BSON document and validate it
pub fn from_document<T>(document: Document) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let record: T =
        bson::from_document(document).map_err(|e| ValidationError::Decode(e.to_string()))?;
    record.validate()?;
    Ok(record)
}
