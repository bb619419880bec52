//! Global constants for VTAT

/// Frames skipped by Shift+arrow
pub const LARGE_FRAME_STEP: u32 = 10;

/// Keyframe interval used when accepting tracks without an explicit one
pub const DEFAULT_DECIMATION_INTERVAL: u32 = 5;

/// Confidence threshold for batch accept
pub const DEFAULT_ACCEPT_CONFIDENCE: f32 = 0.5;

/// How long a tracking request may run before it is reported as timed out
pub const DEFAULT_TRACKING_TIMEOUT_MS: u64 = 120_000;

/// Quiet period after the last edit before it is written out
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 500;

/// Minimum gap between two writes, regardless of debounce
pub const DEFAULT_AUTOSAVE_MIN_INTERVAL_MS: u64 = 2_000;

/// Attempts per write before a failure notice is raised
pub const DEFAULT_SAVE_RETRIES: u32 = 3;

/// Delay before the first retry; doubled for each further attempt
pub const DEFAULT_SAVE_BACKOFF_MS: u64 = 200;

/// Upper bound on a single retry delay
pub const MAX_SAVE_BACKOFF_MS: u64 = 10_000;

/// Maximum number of undo steps
pub const UNDO_HISTORY_SIZE: usize = 100;
