//! Mode result contracts
//!
//! One tagged variant per interaction mode, each carrying only the fields
//! that mode renders. The consumption rules live here as plain functions
//! over the data: diff reconstruction for practice results, the binary
//! video contract for magic clips.

use serde::{Deserialize, Serialize};

/// Result of a completed submission, discriminated by mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeResult {
    Practice(PracticeResult),
    Panic(PanicResult),
    MagicClip(MagicClipResult),
}

/// Pronunciation-practice result: correction diff plus optional echo
/// audio and pitch contour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeResult {
    /// What the user actually said
    pub original_text: String,
    /// The corrected utterance
    pub corrected_text: String,
    /// Ordered reconstruction instructions
    pub diff: Vec<DiffOp>,
    /// Synthesised echo of the corrected utterance, when available
    pub audio_url: Option<String>,
    /// Intonation contour of the echo, when available
    pub pitch: Vec<PitchPoint>,
}

/// Panic-mode result: the correction is a translation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanicResult {
    /// What the user said, informational only
    pub original_text: String,
    /// The final translation
    pub translated_text: String,
    /// Spoken translation, when available
    pub audio_url: Option<String>,
}

/// Magic-clip result: a dubbed video or nothing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicClipResult {
    pub video_url: String,
}

/// Kind of a single diff instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// One reconstruction instruction from the correction diff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffOp {
    pub kind: DiffKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,
}

impl DiffOp {
    pub fn equal(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Equal,
            old_text: Some(text.into()),
            new_text: None,
        }
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Insert,
            old_text: None,
            new_text: Some(text.into()),
        }
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Delete,
            old_text: Some(text.into()),
            new_text: None,
        }
    }

    pub fn replace(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::Replace,
            old_text: Some(old.into()),
            new_text: Some(new.into()),
        }
    }

    /// The text this op contributes to the reconstructed view:
    /// `new_text` for Insert/Replace, `old_text` for Equal/Delete.
    pub fn view_text(&self) -> &str {
        let text = match self.kind {
            DiffKind::Insert | DiffKind::Replace => self.new_text.as_deref(),
            DiffKind::Equal | DiffKind::Delete => self.old_text.as_deref(),
        };
        text.unwrap_or_default()
    }
}

/// One sample of the intonation contour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchPoint {
    /// Seconds from clip start
    pub time: f64,
    /// Fundamental frequency in Hz
    pub frequency: f64,
}

impl PracticeResult {
    /// Reconstruct the corrected-utterance view from the diff
    ///
    /// An empty diff means no correction was needed and the corrected
    /// text is returned verbatim. Otherwise the ordered ops are
    /// concatenated per `DiffOp::view_text`.
    pub fn rendered_correction(&self) -> String {
        if self.diff.is_empty() {
            return self.corrected_text.clone();
        }
        self.diff.iter().map(DiffOp::view_text).collect()
    }

    /// Whether the utterance needed no correction
    pub fn is_perfect(&self) -> bool {
        self.diff.is_empty()
    }
}

impl MagicClipResult {
    /// Consumption is binary: a result without a usable URL means the
    /// generation failed.
    pub fn is_ready(&self) -> bool {
        !self.video_url.trim().is_empty()
    }
}

/// Enforce non-decreasing time order on a pitch contour
///
/// Out-of-order points are dropped rather than re-sorted so the remaining
/// series keeps the backend's sample pairing intact.
pub fn sanitize_pitch(points: Vec<PitchPoint>) -> Vec<PitchPoint> {
    let total = points.len();
    let mut kept: Vec<PitchPoint> = Vec::with_capacity(total);
    for point in points {
        match kept.last() {
            Some(last) if point.time < last.time => continue,
            _ => kept.push(point),
        }
    }
    if kept.len() < total {
        tracing::warn!(
            "pitch contour: dropped {} out-of-order points",
            total - kept.len()
        );
    }
    kept
}
