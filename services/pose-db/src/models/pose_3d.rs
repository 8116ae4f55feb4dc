use super::bson_serde::{date_ymd, naive_as_bson_datetime, uuid_as_binary, uuid_vec_as_binary};
use super::formats::{KeypointsFormat, PosePairScoreDistanceMethod};
use super::rounding::RoundedFloat;
use super::Validate;
use crate::error::ValidationError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rounded `(x, y, z)` triple
pub type Point3 = [RoundedFloat; 3];

/// A rounded `(min, max)` pair
pub type Limits = (RoundedFloat, RoundedFloat);

/// Per-joint lower and upper bounds of a plausible 3D pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose3dLimits(pub Vec<Point3>, pub Vec<Point3>);

impl Pose3dLimits {
    pub fn lower(&self) -> &[Point3] {
        &self.0
    }

    pub fn upper(&self) -> &[Point3] {
        &self.1
    }
}

/// Reconstruction envelope for one
/// `(inference_run_id, environment_id, coordinate_space_id, pose_model_id)`.
///
/// All floats are rounded to three decimals when the value is built or
/// deserialized; [`Validate::validate`] checks that the envelope is
/// self-consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose3dMetadata {
    #[serde(with = "uuid_as_binary")]
    pub inference_run_id: Uuid,
    #[serde(with = "naive_as_bson_datetime")]
    pub inference_run_created_at: NaiveDateTime,
    #[serde(with = "uuid_as_binary")]
    pub environment_id: Uuid,
    #[serde(with = "date_ymd")]
    pub classroom_date: NaiveDate,
    #[serde(with = "uuid_as_binary")]
    pub coordinate_space_id: Uuid,
    #[serde(with = "uuid_as_binary")]
    pub pose_model_id: Uuid,
    pub keypoints_format: KeypointsFormat,
    #[serde(default)]
    pub pose_3d_limits: Option<Pose3dLimits>,
    pub room_x_limits: Limits,
    pub room_y_limits: Limits,
    pub floor_z: RoundedFloat,
    pub foot_z_limits: Limits,
    pub knee_z_limits: Limits,
    pub hip_z_limits: Limits,
    pub thorax_z_limits: Limits,
    pub shoulder_z_limits: Limits,
    pub elbow_z_limits: Limits,
    pub hand_z_limits: Limits,
    pub neck_z_limits: Limits,
    pub head_z_limits: Limits,
    pub tolerance: RoundedFloat,
    pub min_keypoint_quality: RoundedFloat,
    pub min_num_keypoints: u32,
    pub min_pose_quality: RoundedFloat,
    pub min_pose_pair_score: RoundedFloat,
    pub max_pose_pair_score: RoundedFloat,
    pub pose_pair_score_distance_method: PosePairScoreDistanceMethod,
    pub pose_3d_graph_initial_edge_threshold: u32,
    pub pose_3d_graph_max_dispersion: RoundedFloat,
}

impl Pose3dMetadata {
    /// Named `(min, max)` limit pairs in declaration order
    pub fn limit_pairs(&self) -> [(&'static str, Limits); 11] {
        [
            ("room_x_limits", self.room_x_limits),
            ("room_y_limits", self.room_y_limits),
            ("foot_z_limits", self.foot_z_limits),
            ("knee_z_limits", self.knee_z_limits),
            ("hip_z_limits", self.hip_z_limits),
            ("thorax_z_limits", self.thorax_z_limits),
            ("shoulder_z_limits", self.shoulder_z_limits),
            ("elbow_z_limits", self.elbow_z_limits),
            ("hand_z_limits", self.hand_z_limits),
            ("neck_z_limits", self.neck_z_limits),
            ("head_z_limits", self.head_z_limits),
        ]
    }

    fn scalar_fields(&self) -> [(&'static str, RoundedFloat); 7] {
        [
            ("floor_z", self.floor_z),
            ("tolerance", self.tolerance),
            ("min_keypoint_quality", self.min_keypoint_quality),
            ("min_pose_quality", self.min_pose_quality),
            ("min_pose_pair_score", self.min_pose_pair_score),
            ("max_pose_pair_score", self.max_pose_pair_score),
            ("pose_3d_graph_max_dispersion", self.pose_3d_graph_max_dispersion),
        ]
    }

    fn validate_pose_3d_limits(&self, limits: &Pose3dLimits) -> Result<(), ValidationError> {
        let expected = self.keypoints_format.num_keypoints();
        for (field, bounds) in [
            ("pose_3d_limits[0]", limits.lower()),
            ("pose_3d_limits[1]", limits.upper()),
        ] {
            if bounds.len() != expected {
                return Err(ValidationError::Arity {
                    field: field.to_string(),
                    expected,
                    actual: bounds.len(),
                });
            }
            if bounds.iter().flatten().any(|v| !v.is_finite()) {
                return Err(ValidationError::NonFinite {
                    field: field.to_string(),
                });
            }
        }

        for (joint, (lower, upper)) in limits.lower().iter().zip(limits.upper()).enumerate() {
            for axis in 0..3 {
                if lower[axis] > upper[axis] {
                    return Err(ValidationError::OutOfRange {
                        field: format!("pose_3d_limits[*][{joint}][{axis}]"),
                        message: format!("min {} exceeds max {}", lower[axis], upper[axis]),
                    });
                }
            }
        }

        Ok(())
    }
}

fn require_non_negative(field: &str, value: RoundedFloat) -> Result<(), ValidationError> {
    if value.get() < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            message: format!("{value} is negative"),
        });
    }
    Ok(())
}

impl Validate for Pose3dMetadata {
    fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in self.scalar_fields() {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite {
                    field: field.to_string(),
                });
            }
        }

        for (field, (min, max)) in self.limit_pairs() {
            if !min.is_finite() || !max.is_finite() {
                return Err(ValidationError::NonFinite {
                    field: field.to_string(),
                });
            }
            if min > max {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    message: format!("min {min} exceeds max {max}"),
                });
            }
        }

        if self.min_pose_pair_score > self.max_pose_pair_score {
            return Err(ValidationError::OutOfRange {
                field: "min_pose_pair_score".to_string(),
                message: format!(
                    "{} exceeds max_pose_pair_score {}",
                    self.min_pose_pair_score, self.max_pose_pair_score
                ),
            });
        }

        require_non_negative("tolerance", self.tolerance)?;
        require_non_negative(
            "pose_3d_graph_max_dispersion",
            self.pose_3d_graph_max_dispersion,
        )?;

        let joints = self.keypoints_format.num_keypoints();
        if self.min_num_keypoints as usize > joints {
            return Err(ValidationError::OutOfRange {
                field: "min_num_keypoints".to_string(),
                message: format!(
                    "{} exceeds the {} joints of {}",
                    self.min_num_keypoints, joints, self.keypoints_format
                ),
            });
        }

        if let Some(limits) = &self.pose_3d_limits {
            self.validate_pose_3d_limits(limits)?;
        }

        Ok(())
    }
}

/// Triangulated skeleton, one rounded `(x, y, z)` per joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose3dOutput {
    pub keypoints: Vec<Point3>,
}

/// A 3D pose reconstruction derived from one or more 2D detections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose3d {
    #[serde(
        rename = "_id",
        alias = "id",
        with = "uuid_as_binary",
        default = "Uuid::new_v4"
    )]
    pub id: Uuid,
    #[serde(with = "naive_as_bson_datetime")]
    pub timestamp: NaiveDateTime,
    pub metadata: Pose3dMetadata,
    pub pose: Pose3dOutput,
    /// Source detections this pose was fused from
    #[serde(with = "uuid_vec_as_binary")]
    pub pose_2d_ids: Vec<Uuid>,
}

impl Validate for Pose3d {
    fn validate(&self) -> Result<(), ValidationError> {
        self.metadata.validate()?;

        let expected = self.metadata.keypoints_format.num_keypoints();
        if self.pose.keypoints.len() != expected {
            return Err(ValidationError::Arity {
                field: "pose.keypoints".to_string(),
                expected,
                actual: self.pose.keypoints.len(),
            });
        }

        if self.pose_2d_ids.is_empty() {
            return Err(ValidationError::OutOfRange {
                field: "pose_2d_ids".to_string(),
                message: "a 3D pose needs at least one source 2D pose".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{from_document, from_json_value};
    use serde_json::{json, Value};

    fn raw_metadata() -> Value {
        json!({
            "inference_run_id": "5f0c6a8e-4b7e-4c59-9d0e-2f7f3d1f4a11",
            "inference_run_created_at": "2023-06-01T08:00:00",
            "environment_id": "0b9a4b1e-7c6d-4f2b-8a31-6b1d2e3f4a5b",
            "classroom_date": "2023-06-01",
            "coordinate_space_id": "c1d2e3f4-a5b6-4c7d-8e9f-0a1b2c3d4e5f",
            "pose_model_id": "9e8d7c6b-5a4f-4e3d-a2c1-b0a9f8e7d6c5",
            "keypoints_format": "coco-17",
            "room_x_limits": [0.0, 7.12345],
            "room_y_limits": [0.0, 9.87654],
            "floor_z": 0.0,
            "foot_z_limits": [0.0, 1.0],
            "knee_z_limits": [0.0, 1.0],
            "hip_z_limits": [0.0, 1.5],
            "thorax_z_limits": [0.0, 1.7],
            "shoulder_z_limits": [0.1, 1.9],
            "elbow_z_limits": [0.0, 2.0],
            "hand_z_limits": [0.0, 2.5],
            "neck_z_limits": [0.0, 2.0],
            "head_z_limits": [0.0, 2.2],
            "tolerance": 0.05,
            "min_keypoint_quality": 0.123456,
            "min_num_keypoints": 5,
            "min_pose_quality": 0.3,
            "min_pose_pair_score": 0.0,
            "max_pose_pair_score": 25.0,
            "pose_pair_score_distance_method": "pixels",
            "pose_3d_graph_initial_edge_threshold": 2,
            "pose_3d_graph_max_dispersion": 0.20004
        })
    }

    #[test]
    fn test_floats_rounded_on_parse() {
        let metadata: Pose3dMetadata = from_json_value(raw_metadata()).unwrap();

        assert_eq!(metadata.room_x_limits.1.get(), 7.123);
        assert_eq!(metadata.room_y_limits.1.get(), 9.877);
        assert_eq!(metadata.min_keypoint_quality.get(), 0.123);
        assert_eq!(metadata.pose_3d_graph_max_dispersion.get(), 0.2);
        assert!(metadata.pose_3d_limits.is_none());
    }

    #[test]
    fn test_independent_parses_are_identical() {
        let a: Pose3dMetadata = from_json_value(raw_metadata()).unwrap();
        let b: Pose3dMetadata = from_json_value(raw_metadata()).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            bson::to_vec(&bson::to_document(&a).unwrap()).unwrap(),
            bson::to_vec(&bson::to_document(&b).unwrap()).unwrap()
        );

        let reparsed: Pose3dMetadata = from_document(bson::to_document(&a).unwrap()).unwrap();
        assert_eq!(reparsed, a);
    }

    #[test]
    fn test_classroom_date_and_enum_serialization() {
        let metadata: Pose3dMetadata = from_json_value(raw_metadata()).unwrap();
        let document = bson::to_document(&metadata).unwrap();

        assert_eq!(document.get_str("classroom_date").unwrap(), "2023-06-01");
        assert_eq!(
            document.get_str("pose_pair_score_distance_method").unwrap(),
            "pixels"
        );
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let mut raw = raw_metadata();
        raw["knee_z_limits"] = json!([1.2, 0.4]);

        match from_json_value::<Pose3dMetadata>(raw) {
            Err(ValidationError::OutOfRange { field, .. }) => assert_eq!(field, "knee_z_limits"),
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_pair_score_order_rejected() {
        let mut raw = raw_metadata();
        raw["min_pose_pair_score"] = json!(30.0);

        assert!(matches!(
            from_json_value::<Pose3dMetadata>(raw),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_unknown_distance_method_rejected() {
        let mut raw = raw_metadata();
        raw["pose_pair_score_distance_method"] = json!("meters");

        assert!(matches!(
            from_json_value::<Pose3dMetadata>(raw),
            Err(ValidationError::Decode(_))
        ));
    }

    #[test]
    fn test_pose_3d_limits_shape() {
        let mut raw = raw_metadata();
        raw["pose_3d_limits"] = json!([
            vec![[0.0, 0.0, 0.0]; 17],
            vec![[7.0, 9.0, 2.5]; 17]
        ]);
        let metadata: Pose3dMetadata = from_json_value(raw.clone()).unwrap();
        assert_eq!(metadata.pose_3d_limits.unwrap().upper()[0][2].get(), 2.5);

        raw["pose_3d_limits"] = json!([
            vec![[0.0, 0.0, 0.0]; 17],
            vec![[7.0, 9.0, 2.5]; 16]
        ]);
        assert!(matches!(
            from_json_value::<Pose3dMetadata>(raw),
            Err(ValidationError::Arity { expected: 17, actual: 16, .. })
        ));
    }

    #[test]
    fn test_pose_3d_requires_sources() {
        let metadata: Pose3dMetadata = from_json_value(raw_metadata()).unwrap();
        let mut pose = Pose3d {
            id: Uuid::new_v4(),
            timestamp: metadata.inference_run_created_at,
            metadata,
            pose: Pose3dOutput {
                keypoints: vec![
                    [
                        RoundedFloat::new(1.23456),
                        RoundedFloat::new(2.0),
                        RoundedFloat::new(0.5),
                    ];
                    17
                ],
            },
            pose_2d_ids: vec![Uuid::new_v4()],
        };
        assert!(pose.validate().is_ok());
        assert_eq!(pose.pose.keypoints[0][0].get(), 1.235);

        pose.pose_2d_ids.clear();
        assert!(pose.validate().is_err());
    }

    #[test]
    fn test_pose_3d_generates_id_when_absent() {
        let raw = json!({
            "timestamp": "2023-06-01T09:00:00",
            "metadata": raw_metadata(),
            "pose": { "keypoints": vec![[0.1, 0.2, 0.3]; 17] },
            "pose_2d_ids": [Uuid::new_v4().to_string()]
        });

        let pose: Pose3d = from_json_value(raw).unwrap();
        assert!(!pose.id.is_nil());
    }
}
