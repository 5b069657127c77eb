//! Clip catalogue
//!
//! Read-only listing of the video templates available for magic-clip
//! dubbing. The session holds one `SelectedClip` by value; the catalogue
//! itself carries no state-machine coupling.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::client::{ApiClient, ApiError};
use crate::api::types::WireClip;

/// Path of the clip listing endpoint
const CLIPS_PATH: &str = "/api/clips";

/// One selectable video template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedClip {
    pub id: String,
    pub title: String,
    /// The line the user is expected to dub over
    pub quote: String,
    pub filename: String,
}

impl From<WireClip> for SelectedClip {
    fn from(wire: WireClip) -> Self {
        Self {
            id: wire.id,
            title: wire.title,
            quote: wire.quote,
            filename: wire.filename,
        }
    }
}

/// Read-only client for the clip catalogue
pub struct ClipCatalogClient {
    api: Arc<ApiClient>,
}

impl ClipCatalogClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Fetch the selectable clips, in backend order
    pub async fn list_clips(&self) -> Result<Vec<SelectedClip>, ApiError> {
        let clips: Vec<WireClip> = self.api.get_json(CLIPS_PATH).await?;
        tracing::debug!("catalogue returned {} clips", clips.len());
        Ok(clips.into_iter().map(SelectedClip::from).collect())
    }

    /// Fetch the catalogue and pick one clip by id
    pub async fn find_clip(&self, id: &str) -> Result<Option<SelectedClip>, ApiError> {
        Ok(self
            .list_clips()
            .await?
            .into_iter()
            .find(|clip| clip.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_clip_mapping() {
        let wire = WireClip {
            id: "godfather_demo".to_string(),
            title: "The Godfather".to_string(),
            quote: "I'm gonna make him an offer he can't refuse.".to_string(),
            filename: "godfather_demo.mp4".to_string(),
        };
        let clip = SelectedClip::from(wire);
        assert_eq!(clip.id, "godfather_demo");
        assert_eq!(clip.filename, "godfather_demo.mp4");
        assert!(clip.quote.starts_with("I'm gonna"));
    }
}
