use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;

/// Outcome of one sampled frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    /// 1-based position of the frame in the video.
    pub index: u64,
    pub people: usize,
    pub person_bboxes: Vec<Bbox>,
}
