//! AI tracking: the service boundary, the background client and track review.

mod client;
mod decimate;
mod ingestion;
mod service;

pub use client::{Generation, TrackingClient, TrackingOutcome};
pub use decimate::{all_keyframes, decimate};
pub use ingestion::{BatchAcceptReport, TrackIngestion};
pub use service::{CancelToken, TrackingRequest, TrackingService, parse_tracking_response};
