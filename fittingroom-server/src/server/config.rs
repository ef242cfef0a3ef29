use anyhow::bail;
use clap::Parser;
use fittingroom::config::OrchestratorConfig;
use fittingroom::observability::LogFormat;
use fittingroom::polling::PollPolicy;
use fittingroom::vertex::VertexConfig;
use std::time::Duration;

/// Runtime configuration for the `fittingroom-server` binary.
///
/// Every setting can be given as a flag or through the environment; a `.env`
/// file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fittingroom-server",
    version,
    about = "Virtual try-on with background video generation"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Google Cloud project hosting the Vertex AI models.
    ///
    /// Environment variable: `GOOGLE_CLOUD_PROJECT`
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: String,

    /// Vertex AI region.
    ///
    /// Environment variable: `GOOGLE_CLOUD_REGION`
    #[arg(long, env = "GOOGLE_CLOUD_REGION", default_value_t = String::from("us-central1"))]
    pub region: String,

    /// Bucket receiving composites, videos and designer images. A leading
    /// `gs://` is accepted.
    ///
    /// Environment variable: `GCS_BUCKET_NAME`
    #[arg(long, env = "GCS_BUCKET_NAME")]
    pub bucket: String,

    /// OAuth2 access token for Vertex AI and Cloud Storage.
    ///
    /// Environment variable: `GOOGLE_ACCESS_TOKEN`
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Seconds between checks of a running video operation.
    ///
    /// Environment variable: `VIDEO_POLL_INTERVAL_SECS`
    #[arg(long, env = "VIDEO_POLL_INTERVAL_SECS", default_value_t = 15)]
    pub video_poll_interval_secs: u64,

    /// Deadline for one background video job, in seconds.
    ///
    /// Environment variable: `VIDEO_TIMEOUT_SECS`
    #[arg(long, env = "VIDEO_TIMEOUT_SECS", default_value_t = 900)]
    pub video_timeout_secs: u64,

    /// Maximum number of video jobs running at once.
    ///
    /// Environment variable: `MAX_CONCURRENT_JOBS`
    #[arg(long, env = "MAX_CONCURRENT_JOBS", default_value_t = 4)]
    pub max_concurrent_jobs: usize,

    /// Age after which finished generations are forgotten. Unset keeps them
    /// for the life of the process.
    ///
    /// Environment variable: `RECORD_TTL_SECS`
    #[arg(long, env = "RECORD_TTL_SECS")]
    pub record_ttl_secs: Option<u64>,

    /// Log output format, `pretty` or `json`.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub bucket: String,
    pub vertex: VertexConfig,
    pub orchestrator: OrchestratorConfig,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Interval of the retention sweeper, if retention is enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.orchestrator
            .record_ttl()
            .map(|ttl| (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(60)))
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let bucket = args
            .bucket
            .trim()
            .trim_start_matches("gs://")
            .trim_end_matches('/')
            .to_string();
        if bucket.is_empty() {
            bail!("GCS_BUCKET_NAME must not be empty");
        }
        if args.project_id.trim().is_empty() {
            bail!("GOOGLE_CLOUD_PROJECT must not be empty");
        }
        if args.access_token.trim().is_empty() {
            bail!("GOOGLE_ACCESS_TOKEN must not be empty");
        }
        if args.max_concurrent_jobs == 0 {
            bail!("MAX_CONCURRENT_JOBS must be greater than 0");
        }
        if args.video_poll_interval_secs == 0 {
            bail!("VIDEO_POLL_INTERVAL_SECS must be greater than 0");
        }
        if args.video_timeout_secs < args.video_poll_interval_secs {
            bail!(
                "VIDEO_TIMEOUT_SECS ({}) must be at least VIDEO_POLL_INTERVAL_SECS ({})",
                args.video_timeout_secs,
                args.video_poll_interval_secs
            );
        }

        let mut orchestrator = OrchestratorConfig::default()
            .with_polling(PollPolicy::every(Duration::from_secs(args.video_poll_interval_secs)))
            .with_stage2_timeout(Duration::from_secs(args.video_timeout_secs))
            .with_max_concurrent_jobs(args.max_concurrent_jobs);
        if let Some(ttl) = args.record_ttl_secs {
            if ttl == 0 {
                bail!("RECORD_TTL_SECS must be greater than 0 when set");
            }
            orchestrator = orchestrator.with_record_ttl(Duration::from_secs(ttl));
        }

        let vertex = VertexConfig::new(args.project_id.trim(), args.access_token.trim())
            .with_region(args.region);

        Ok(Self {
            server_addr: args.server_addr,
            bucket,
            vertex,
            orchestrator,
            log_format: args.log_format,
        })
    }
}
