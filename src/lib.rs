pub mod clean;
pub mod config;
pub mod context;
pub mod dedupe;
pub mod fix_ext;
pub mod fs;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod report;
pub mod resort;

#[cfg(test)]
pub(crate) mod testutil;

/// Default name patterns for audio discovery (resort, deduplicate, clean).
pub const AUDIO_PATTERNS: &[&str] = &["*.mp3", "*.flac", "*.m4a"];

/// Pattern that matches every file (extension repair).
pub const ALL_FILES: &[&str] = &["*"];

/// Application name for XDG paths
pub const APP_NAME: &str = "tunesort";
