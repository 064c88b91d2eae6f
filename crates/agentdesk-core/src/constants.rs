//! Thresholds shared by the validator, optimizer and orchestrator.

/// Files above this size are always re-encoded, and get a compression suggestion.
pub const OPTIMIZE_SIZE_THRESHOLD_BYTES: u64 = 2 * 1024 * 1024;

/// PNG sources below this size keep their format under automatic selection.
pub const SMALL_PNG_THRESHOLD_BYTES: u64 = 500 * 1024;

/// PNGs above this size get a format-conversion suggestion.
pub const LARGE_PNG_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// JPEGs above this size get a WebP suggestion.
pub const LARGE_JPEG_THRESHOLD_BYTES: u64 = 500 * 1024;

/// Files under this size are flagged as suspicious.
pub const SUSPICIOUSLY_SMALL_BYTES: u64 = 1024;

/// Web-optimal display size.
pub const WEB_OPTIMAL_WIDTH: u32 = 1920;
pub const WEB_OPTIMAL_HEIGHT: u32 = 1080;

/// Bounded prefix inspected for EXIF markers and embedded scripts.
pub const SCAN_WINDOW_BYTES: usize = 64 * 1024;

/// Canonical photo aspect ratios (16:9, 4:3, 3:2, 1:1).
pub const COMMON_ASPECT_RATIOS: [f64; 4] = [16.0 / 9.0, 4.0 / 3.0, 3.0 / 2.0, 1.0];

/// Tolerance for matching a common aspect ratio.
pub const ASPECT_RATIO_TOLERANCE: f64 = 0.1;

/// Target-size search: quality multiplier per attempt.
pub const TARGET_SIZE_QUALITY_STEP: f32 = 0.9;

/// Target-size search: maximum quality reductions.
pub const TARGET_SIZE_MAX_ATTEMPTS: u32 = 10;

/// Target-size search: quality floor.
pub const TARGET_SIZE_MIN_QUALITY: f32 = 0.1;

/// Quality used for the dimension-scaling fallback.
pub const TARGET_SIZE_FALLBACK_QUALITY: f32 = 0.7;
