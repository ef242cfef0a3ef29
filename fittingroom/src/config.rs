//! Library configuration.
//!
//! All structs deserialize with defaults for every missing field, so a
//! partial JSON document (or `{}`) is a valid configuration.

use crate::polling::PollPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default motion prompt for try-on videos.
pub const DEFAULT_VIDEO_PROMPT: &str = "A model twirling around, showcasing the outfit.";

fn default_composite_prefix() -> String {
    "vto".to_string()
}

fn default_video_prefix() -> String {
    "videos".to_string()
}

fn default_stage2_timeout_ms() -> u64 {
    900_000
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_shutdown_grace_ms() -> u64 {
    10_000
}

/// Settings of the generation orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Store prefix for stage-1 composites.
    #[serde(default = "default_composite_prefix")]
    pub composite_prefix: String,
    /// Store prefix under which each generation gets its video folder.
    #[serde(default = "default_video_prefix")]
    pub video_prefix: String,
    /// How the video operation is polled.
    #[serde(default)]
    pub polling: PollPolicy,
    /// Deadline for a whole stage-2 job, in milliseconds.
    #[serde(default = "default_stage2_timeout_ms")]
    pub stage2_timeout_ms: u64,
    /// Maximum number of stage-2 jobs running at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// How long shutdown waits for cancelled jobs to record their failure.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Age after which terminal records may be swept. `None` keeps them.
    #[serde(default)]
    pub record_ttl_secs: Option<u64>,
    /// Parameters of the video request.
    #[serde(default)]
    pub video: VideoSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            composite_prefix: default_composite_prefix(),
            video_prefix: default_video_prefix(),
            polling: PollPolicy::default(),
            stage2_timeout_ms: default_stage2_timeout_ms(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            record_ttl_secs: None,
            video: VideoSettings::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the composite prefix.
    #[must_use]
    pub fn with_composite_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.composite_prefix = prefix.into();
        self
    }

    /// Sets the video prefix.
    #[must_use]
    pub fn with_video_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.video_prefix = prefix.into();
        self
    }

    /// Sets the poll policy.
    #[must_use]
    pub fn with_polling(mut self, policy: PollPolicy) -> Self {
        self.polling = policy;
        self
    }

    /// Sets the stage-2 deadline.
    #[must_use]
    pub fn with_stage2_timeout(mut self, timeout: Duration) -> Self {
        self.stage2_timeout_ms = duration_ms(timeout).max(1);
        self
    }

    /// Sets the job concurrency bound.
    #[must_use]
    pub fn with_max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = duration_ms(grace);
        self
    }

    /// Enables the retention sweep for terminal records.
    #[must_use]
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Sets the video request parameters.
    #[must_use]
    pub fn with_video(mut self, video: VideoSettings) -> Self {
        self.video = video;
        self
    }

    /// Returns the stage-2 deadline.
    #[must_use]
    pub fn stage2_timeout(&self) -> Duration {
        Duration::from_millis(self.stage2_timeout_ms)
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Returns the record retention period, if enabled.
    #[must_use]
    pub fn record_ttl(&self) -> Option<Duration> {
        self.record_ttl_secs.map(Duration::from_secs)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_video_prompt() -> String {
    DEFAULT_VIDEO_PROMPT.to_string()
}

fn default_aspect_ratio() -> String {
    "9:16".to_string()
}

/// Parameters passed to the video generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Motion prompt.
    #[serde(default = "default_video_prompt")]
    pub prompt: String,
    /// Output aspect ratio.
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Whether the video gets an audio track.
    #[serde(default)]
    pub generate_audio: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            prompt: default_video_prompt(),
            aspect_ratio: default_aspect_ratio(),
            generate_audio: false,
        }
    }
}

fn default_inspire_prefix() -> String {
    "inspire".to_string()
}

/// Settings of the apparel designer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignerConfig {
    /// Store prefix for generated inspiration images.
    #[serde(default = "default_inspire_prefix")]
    pub inspire_prefix: String,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            inspire_prefix: default_inspire_prefix(),
        }
    }
}

impl DesignerConfig {
    /// Sets the inspiration prefix.
    #[must_use]
    pub fn with_inspire_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inspire_prefix = prefix.into();
        self
    }
}
