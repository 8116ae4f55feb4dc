//! Flattening of stored 2D pose documents into typed table rows.

use crate::error::TransformError;
use crate::models::pose_2d::{BBOX_WIDTH, KEYPOINT_WIDTH};
use crate::models::KeypointsFormat;
use crate::store_time::from_store_local;
use bson::spec::BinarySubtype;
use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Name of the index column
pub const INDEX_COLUMN: &str = "pose_2d_id";

/// Data columns in canonical order
pub const COLUMNS: [&str; 12] = [
    "timestamp",
    "camera_id",
    "keypoint_coordinates_2d",
    "keypoint_quality_2d",
    "keypoint_visibility_2d",
    "pose_quality",
    "bounding_box",
    "bounding_box_quality",
    "bounding_box_format",
    "keypoints_format",
    "inference_run_id",
    "inference_run_created_at",
];

/// One flattened 2D pose
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pose2dRow {
    pub pose_2d_id: String,
    pub timestamp: DateTime<Utc>,
    pub camera_id: String,
    /// `(x, y)` per joint
    pub keypoint_coordinates_2d: Vec<[f64; 2]>,
    pub keypoint_quality_2d: Vec<f64>,
    pub keypoint_visibility_2d: Vec<f64>,
    /// Always `None`: whole-pose quality is only assigned by 3D fusion
    pub pose_quality: Option<f64>,
    pub bounding_box: [f64; 4],
    pub bounding_box_quality: f64,
    pub bounding_box_format: String,
    pub keypoints_format: String,
    pub inference_run_id: String,
    pub inference_run_created_at: DateTime<Utc>,
}

impl Pose2dRow {
    /// Rebuild the packed `[x, y, visibility, quality]` keypoint matrix
    pub fn packed_keypoints(&self) -> Vec<[f64; KEYPOINT_WIDTH]> {
        self.keypoint_coordinates_2d
            .iter()
            .zip(&self.keypoint_visibility_2d)
            .zip(&self.keypoint_quality_2d)
            .map(|(([x, y], visibility), quality)| [*x, *y, *visibility, *quality])
            .collect()
    }

    /// Rebuild the packed `[x1, y1, x2, y2, quality]` bounding box
    pub fn packed_bbox(&self) -> [f64; BBOX_WIDTH] {
        let [x1, y1, x2, y2] = self.bounding_box;
        [x1, y1, x2, y2, self.bounding_box_quality]
    }
}

/// Flattened 2D poses indexed by `pose_2d_id`, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Poses2dTable {
    rows: Vec<Pose2dRow>,
    /// `pose_2d_id` to row position
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl Poses2dTable {
    /// Sort rows by timestamp; equal timestamps keep their input order
    pub fn from_rows(mut rows: Vec<Pose2dRow>) -> Self {
        rows.sort_by_key(|row| row.timestamp);

        let mut positions = HashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            positions.entry(row.pose_2d_id.clone()).or_insert(position);
        }

        Self { rows, positions }
    }

    pub fn index_name(&self) -> &'static str {
        INDEX_COLUMN
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Pose2dRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Pose2dRow> {
        self.rows
    }

    /// Index values in row order
    pub fn index(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.pose_2d_id.as_str()).collect()
    }

    pub fn get(&self, pose_2d_id: &str) -> Option<&Pose2dRow> {
        self.positions
            .get(pose_2d_id)
            .and_then(|&position| self.rows.get(position))
    }
}

/// Flatten one stored 2D pose document.
///
/// Stored times are read as wall clock in `store_time_zone` and converted to
/// UTC. A missing field or a matrix that cannot be split into its column
/// groups is an error.
pub fn transform_pose_2d(
    document: &Document,
    store_time_zone: Tz,
) -> Result<Pose2dRow, TransformError> {
    let metadata = get_document(document, "metadata")?;
    let pose = get_document(document, "pose")?;
    let bbox_doc = get_document(document, "bbox")?;

    let keypoints_format = get_str(metadata, "metadata.keypoints_format")?;
    let format: KeypointsFormat =
        keypoints_format
            .parse()
            .map_err(|_| TransformError::InvalidValue {
                field: "metadata.keypoints_format".to_string(),
                value: keypoints_format.to_string(),
            })?;

    let keypoints = get_matrix(pose, "pose.keypoints", KEYPOINT_WIDTH)?;
    if keypoints.len() != format.num_keypoints() {
        return Err(TransformError::Arity {
            field: "pose.keypoints".to_string(),
            expected: format.num_keypoints(),
            actual: keypoints.len(),
        });
    }

    let bbox = get_vector(bbox_doc, "bbox.bbox", BBOX_WIDTH)?;

    Ok(Pose2dRow {
        pose_2d_id: get_identifier(document, "_id")?,
        timestamp: get_store_time(document, "timestamp", store_time_zone)?,
        camera_id: get_identifier(metadata, "metadata.camera_device_id")?,
        keypoint_coordinates_2d: keypoints.iter().map(|k| [k[0], k[1]]).collect(),
        keypoint_quality_2d: keypoints.iter().map(|k| k[3]).collect(),
        keypoint_visibility_2d: keypoints.iter().map(|k| k[2]).collect(),
        pose_quality: None,
        bounding_box: [bbox[0], bbox[1], bbox[2], bbox[3]],
        bounding_box_quality: bbox[4],
        bounding_box_format: get_str(metadata, "metadata.bounding_box_format")?.to_string(),
        keypoints_format: keypoints_format.to_string(),
        inference_run_id: get_identifier(metadata, "metadata.inference_run_id")?,
        inference_run_created_at: get_store_time(
            metadata,
            "metadata.inference_run_created_at",
            store_time_zone,
        )?,
    })
}

fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn get<'a>(document: &'a Document, path: &str) -> Result<&'a Bson, TransformError> {
    document
        .get(leaf(path))
        .ok_or_else(|| TransformError::MissingField {
            field: path.to_string(),
        })
}

fn wrong_type(path: &str, expected: &'static str) -> TransformError {
    TransformError::WrongType {
        field: path.to_string(),
        expected,
    }
}

fn get_document<'a>(document: &'a Document, path: &str) -> Result<&'a Document, TransformError> {
    match get(document, path)? {
        Bson::Document(nested) => Ok(nested),
        _ => Err(wrong_type(path, "document")),
    }
}

fn get_str<'a>(document: &'a Document, path: &str) -> Result<&'a str, TransformError> {
    match get(document, path)? {
        Bson::String(s) => Ok(s),
        _ => Err(wrong_type(path, "string")),
    }
}

fn get_identifier(document: &Document, path: &str) -> Result<String, TransformError> {
    match get(document, path)? {
        Bson::Binary(binary)
            if matches!(binary.subtype, BinarySubtype::Uuid | BinarySubtype::UuidOld) =>
        {
            Uuid::from_slice(&binary.bytes)
                .map(|uuid| uuid.to_string())
                .map_err(|_| wrong_type(path, "16-byte UUID"))
        }
        Bson::String(s) => Ok(s.clone()),
        Bson::ObjectId(oid) => Ok(oid.to_hex()),
        _ => Err(wrong_type(path, "identifier")),
    }
}

fn get_store_time(
    document: &Document,
    path: &str,
    store_time_zone: Tz,
) -> Result<DateTime<Utc>, TransformError> {
    let naive = match get(document, path)? {
        Bson::DateTime(dt) => dt.to_chrono().naive_utc(),
        _ => return Err(wrong_type(path, "datetime")),
    };

    from_store_local(naive, store_time_zone).ok_or_else(|| TransformError::NonexistentLocalTime {
        field: path.to_string(),
        naive: naive.to_string(),
        time_zone: store_time_zone.name().to_string(),
    })
}

fn as_f64(value: &Bson, path: &str) -> Result<f64, TransformError> {
    match value {
        Bson::Double(v) => Ok(*v),
        Bson::Int32(v) => Ok(f64::from(*v)),
        Bson::Int64(v) => Ok(*v as f64),
        _ => Err(wrong_type(path, "number")),
    }
}

fn to_vector(values: &[Bson], path: &str, width: usize) -> Result<Vec<f64>, TransformError> {
    if values.len() != width {
        return Err(TransformError::Arity {
            field: path.to_string(),
            expected: width,
            actual: values.len(),
        });
    }
    values.iter().map(|v| as_f64(v, path)).collect()
}

fn get_vector(document: &Document, path: &str, width: usize) -> Result<Vec<f64>, TransformError> {
    match get(document, path)? {
        Bson::Array(values) => to_vector(values, path, width),
        _ => Err(wrong_type(path, "array")),
    }
}

fn get_matrix(
    document: &Document,
    path: &str,
    width: usize,
) -> Result<Vec<Vec<f64>>, TransformError> {
    let rows = match get(document, path)? {
        Bson::Array(rows) => rows,
        _ => return Err(wrong_type(path, "array")),
    };

    rows.iter()
        .map(|row| match row {
            Bson::Array(values) => to_vector(values, path, width),
            _ => Err(wrong_type(path, "array of arrays")),
        })
        .collect()
}
