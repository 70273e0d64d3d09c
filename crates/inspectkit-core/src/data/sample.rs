//! Sample model
//!
//! A sample is the physical specimen mounted on the stage. Its bounding box
//! limits where sampling and scanning points are generated.

use serde::{Deserialize, Serialize};

/// Point on the stage plane in millimetres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point2 {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle around a sample
///
/// Corners are always stored as [bottom-left, bottom-right, top-right, top-left].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    corners: [Point2; 4],
}

impl BoundingBox {
    /// Build the box from a centre point and its width/height
    pub fn from_center(center: Point2, width: f64, height: f64) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self {
            corners: [
                Point2::new(center.x - hw, center.y - hh),
                Point2::new(center.x + hw, center.y - hh),
                Point2::new(center.x + hw, center.y + hh),
                Point2::new(center.x - hw, center.y + hh),
            ],
        }
    }

    /// Corners in [BL, BR, TR, TL] order
    pub fn corners(&self) -> [Point2; 4] {
        self.corners
    }

    /// Smallest X of any corner
    pub fn min_x(&self) -> f64 {
        self.corners.iter().map(|c| c.x).fold(f64::INFINITY, f64::min)
    }

    /// Largest X of any corner
    pub fn max_x(&self) -> f64 {
        self.corners
            .iter()
            .map(|c| c.x)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest Y of any corner
    pub fn min_y(&self) -> f64 {
        self.corners.iter().map(|c| c.y).fold(f64::INFINITY, f64::min)
    }

    /// Largest Y of any corner
    pub fn max_y(&self) -> f64 {
        self.corners
            .iter()
            .map(|c| c.y)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// A physical specimen being imaged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Operator-assigned identifier, used in image names
    pub sample_id: String,
    /// How the specimen is mounted (puck, slide, ...)
    pub mount_type: String,
    /// Material removed per polishing layer
    pub mm_per_layer: f64,
    /// Height of the specimen surface before any layer was removed
    pub initial_height_mm: f64,
    /// Number of completed sampling or scanning passes
    pub current_layer: u32,
    bounding_box: Option<BoundingBox>,
}

impl Sample {
    /// Create a new sample without a bounding box
    pub fn new(
        sample_id: impl Into<String>,
        mount_type: impl Into<String>,
        mm_per_layer: f64,
        initial_height_mm: f64,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            mount_type: mount_type.into(),
            mm_per_layer,
            initial_height_mm,
            current_layer: 0,
            bounding_box: None,
        }
    }

    /// Compute and store the bounding box, returning its corners
    pub fn set_bounding_box(&mut self, center: Point2, width: f64, height: f64) -> [Point2; 4] {
        let bbox = BoundingBox::from_center(center, width, height);
        self.bounding_box = Some(bbox);
        bbox.corners()
    }

    /// Whether the bounding box has been computed at least once
    pub fn bounding_is_set(&self) -> bool {
        self.bounding_box.is_some()
    }

    /// The bounding box, if set
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bounding_box.as_ref()
    }

    /// Theoretical surface height after the completed layers were removed
    pub fn current_height_mm(&self) -> f64 {
        self.initial_height_mm - self.current_layer as f64 * self.mm_per_layer
    }

    /// Record a completed pass
    pub fn complete_layer(&mut self) {
        self.current_layer += 1;
    }
}
