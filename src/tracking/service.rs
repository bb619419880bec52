//! Boundary to the external AI tracking service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;
use crate::model::Track;

/// Request sent to the tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRequest {
    pub video_id: String,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimation_interval: Option<u32>,
}

impl TrackingRequest {
    pub fn new(video_id: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            model_name: model_name.into(),
            decimation_interval: None,
        }
    }

    /// Ask for keyframes every `interval` frames when the tracks are accepted.
    pub fn with_decimation(mut self, interval: u32) -> Self {
        self.decimation_interval = Some(interval);
        self
    }
}

/// Shared flag a running request polls to stop early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// An external tracker producing candidate tracks for a video.
///
/// Implementations run on the tracking worker thread and should check
/// `cancel` between expensive steps, returning [`TrackingError::Cancelled`].
pub trait TrackingService: Send + Sync {
    /// Run the tracker and return its candidate tracks.
    fn track(
        &self,
        request: &TrackingRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<Track>, TrackingError>;
}

/// Response body of the tracking service: a track list or an error payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseBody {
    Tracks(Vec<Track>),
    Error { error: String },
}

/// Parse a JSON response from the tracking service.
///
/// Tracks get `model_name` filled in from the request when the service omits
/// it, and their detections are sorted by frame.
pub fn parse_tracking_response(
    body: &str,
    request: &TrackingRequest,
) -> Result<Vec<Track>, TrackingError> {
    let parsed: ResponseBody = serde_json::from_str(body).map_err(|e| {
        TrackingError::ServiceUnavailable(format!("malformed tracking response: {e}"))
    })?;
    match parsed {
        ResponseBody::Tracks(mut tracks) => {
            for track in &mut tracks {
                if track.model_name.is_empty() {
                    track.model_name = request.model_name.clone();
                }
                track.normalize();
            }
            Ok(tracks)
        }
        ResponseBody::Error { error } => Err(TrackingError::ServiceUnavailable(error)),
    }
}
