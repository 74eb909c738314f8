//! Protocol constants.

use std::time::Duration;

// =============================================================================
// Credit Windows
// =============================================================================

/// Length of one credit window in seconds of playback.
pub const WINDOW_SECONDS: u64 = 10;

/// Credit window clock period.
pub const WINDOW_PERIOD: Duration = Duration::from_secs(WINDOW_SECONDS);

// =============================================================================
// Backend
// =============================================================================

/// Default API base URL of a local backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Default HTTP timeout for backend requests (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
