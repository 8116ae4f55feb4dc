//! Pose DB
//!
//! Access layer over the document store holding 2D pose detections and 3D pose
//! reconstructions. It builds composable filter predicates over identifier and
//! time-range criteria, and flattens stored 2D records into typed table rows.
//!
//! ## Features
//!
//! - **Validated record schemas**: 2D detections with format-declared keypoint
//!   arity, 3D reconstructions whose metadata envelope is rounded to three
//!   decimals and checked for internal consistency
//! - **Query builder**: optional criteria ANDed together, identifiers parsed
//!   strictly, half-open `[start, end)` windows evaluated in the store time zone
//! - **Record transformer**: packed keypoint and bounding-box arrays split into
//!   coordinate, visibility and quality columns with timestamps in UTC
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ PoseQuery    │────▶│ PoseHandle   │────▶│ PoseStore    │
//! │ (filter)     │     │              │     │ (MongoDB)    │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │                    │
//!                             ▼                    │ raw documents
//!                      ┌──────────────┐            │
//!                      │ Transformer  │◀───────────┘
//!                      └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │ Poses2dTable │
//!                      └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use pose_db::{PoseHandle, PoseQuery};
//! use chrono::{TimeZone, Utc};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut handle = PoseHandle::connect(Some("mongodb://localhost:27017")).await?;
//!
//!     let query = PoseQuery::new()
//!         .environment_id("0b9a4b1e-7c6d-4f2b-8a31-6b1d2e3f4a5b")
//!         .start(Utc.with_ymd_and_hms(2023, 6, 1, 9, 0, 0).unwrap())
//!         .end(Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap())
//!         .store_time_zone(chrono_tz::America::Chicago);
//!     let table = handle.fetch_poses_2d(&query).await?;
//!     println!("{} poses", table.len());
//!
//!     handle.cleanup().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod models;
pub mod query;
pub mod store;
pub mod store_time;
pub mod transform;

pub use config::{Config, MongoConfig};
pub use error::{PoseDbError, StoreError, TransformError, ValidationError};
pub use handle::PoseHandle;
pub use models::{Pose2d, Pose3d, Pose3dMetadata, RoundedFloat, Validate};
pub use query::PoseQuery;
pub use store::{
    DocumentStream, InsertOutcome, MemoryPoseStore, MongoPoseStore, PoseCollection, PoseStore,
    WriteFailure,
};
pub use transform::{Pose2dRow, Poses2dTable};
