//! Enumerations stored by their string tag.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Joint layout of a keypoint matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeypointsFormat {
    #[serde(rename = "coco-17")]
    Coco17,
    #[serde(rename = "coco-133")]
    Coco133,
    #[serde(rename = "halpe-26")]
    Halpe26,
    #[serde(rename = "halpe-136")]
    Halpe136,
    #[serde(rename = "mpii-16")]
    Mpii16,
}

impl KeypointsFormat {
    pub const ALL: [KeypointsFormat; 5] = [
        KeypointsFormat::Coco17,
        KeypointsFormat::Coco133,
        KeypointsFormat::Halpe26,
        KeypointsFormat::Halpe136,
        KeypointsFormat::Mpii16,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeypointsFormat::Coco17 => "coco-17",
            KeypointsFormat::Coco133 => "coco-133",
            KeypointsFormat::Halpe26 => "halpe-26",
            KeypointsFormat::Halpe136 => "halpe-136",
            KeypointsFormat::Mpii16 => "mpii-16",
        }
    }

    /// Number of joints in this layout
    pub fn num_keypoints(&self) -> usize {
        match self {
            KeypointsFormat::Coco17 => 17,
            KeypointsFormat::Coco133 => 133,
            KeypointsFormat::Halpe26 => 26,
            KeypointsFormat::Halpe136 => 136,
            KeypointsFormat::Mpii16 => 16,
        }
    }
}

impl FromStr for KeypointsFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "keypoints format",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for KeypointsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corner convention of a packed bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundingBoxFormat {
    /// `(x1, y1, x2, y2)`
    Xyxy,
    /// `(x, y, width, height)`
    Xywh,
}

impl BoundingBoxFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundingBoxFormat::Xyxy => "xyxy",
            BoundingBoxFormat::Xywh => "xywh",
        }
    }
}

impl FromStr for BoundingBoxFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xyxy" => Ok(BoundingBoxFormat::Xyxy),
            "xywh" => Ok(BoundingBoxFormat::Xywh),
            other => Err(ValidationError::UnknownVariant {
                kind: "bounding box format",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BoundingBoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance used when scoring candidate pose pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PosePairScoreDistanceMethod {
    #[serde(rename = "pixels")]
    Pixels,
    #[serde(rename = "image_frac")]
    ImageFrac,
    #[serde(rename = "3d")]
    ThreeD,
}

impl PosePairScoreDistanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosePairScoreDistanceMethod::Pixels => "pixels",
            PosePairScoreDistanceMethod::ImageFrac => "image_frac",
            PosePairScoreDistanceMethod::ThreeD => "3d",
        }
    }
}

impl FromStr for PosePairScoreDistanceMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pixels" => Ok(PosePairScoreDistanceMethod::Pixels),
            "image_frac" => Ok(PosePairScoreDistanceMethod::ImageFrac),
            "3d" => Ok(PosePairScoreDistanceMethod::ThreeD),
            other => Err(ValidationError::UnknownVariant {
                kind: "pose pair score distance method",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PosePairScoreDistanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_match_serde_representation() {
        for format in KeypointsFormat::ALL {
            let json = serde_json::to_value(format).unwrap();
            assert_eq!(json, serde_json::Value::String(format.as_str().to_string()));
            assert_eq!(format.as_str().parse::<KeypointsFormat>().unwrap(), format);
        }

        let method: PosePairScoreDistanceMethod = serde_json::from_str("\"3d\"").unwrap();
        assert_eq!(method, PosePairScoreDistanceMethod::ThreeD);
        assert_eq!(
            serde_json::to_string(&BoundingBoxFormat::Xywh).unwrap(),
            "\"xywh\""
        );
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = "body-25".parse::<KeypointsFormat>().unwrap_err();
        assert!(matches!(err, ValidationError::UnknownVariant { .. }));
        assert!("ltrb".parse::<BoundingBoxFormat>().is_err());
        assert!(serde_json::from_str::<PosePairScoreDistanceMethod>("\"meters\"").is_err());
    }

    #[test]
    fn test_joint_counts() {
        assert_eq!(KeypointsFormat::Coco17.num_keypoints(), 17);
        assert_eq!(KeypointsFormat::Mpii16.num_keypoints(), 16);
    }
}
