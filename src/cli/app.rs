//! Main app runner for capture runs

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::ports::{ConfigStore, TransportError};
use crate::application::{
    DeliveryClient, Orchestrator, RunCallbacks, RunSettings, SegmentCompletion, SegmentTiming,
};
use crate::domain::config::AppConfig;
use crate::domain::delivery::UploadMode;
use crate::domain::recording::Duration;
use crate::infrastructure::{
    CpalAudioSource, HttpIngestClient, RodioPlayer, WavArtifactStore, XdgConfigStore,
};

use super::presenter::Presenter;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variable overriding the configured endpoint
pub const ENDPOINT_ENV: &str = "SEGMENT_RELAY_ENDPOINT";

/// Parsed capture options
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Reference file as given on the command line
    pub reference: PathBuf,
    pub segments: u64,
    /// Fully merged configuration
    pub config: AppConfig,
}

/// Settings resolved from the merged config, ready to build adapters
#[derive(Debug, Clone)]
struct ResolvedSettings {
    reference: PathBuf,
    endpoint: String,
    mode: UploadMode,
    timing: SegmentTiming,
    request_timeout: Duration,
    output_dir: PathBuf,
    clear_store: bool,
}

/// Run a full capture: `segments` segments while looping the reference file
pub async fn run_capture(options: CaptureOptions) -> ExitCode {
    let presenter = Presenter::new();

    let settings = match resolve(&options) {
        Ok(settings) => settings,
        Err(message) => {
            presenter.error(&message);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let transport = match HttpIngestClient::new(&settings.endpoint, settings.request_timeout) {
        Ok(client) => Arc::new(client),
        Err(e @ TransportError::InvalidEndpoint(_)) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };
    debug!(?settings, "capture settings resolved");

    let delivery = DeliveryClient::new(transport.clone(), settings.mode);
    let mut orchestrator = Orchestrator::new(
        Arc::new(CpalAudioSource::new()),
        Arc::new(WavArtifactStore::new()),
        Arc::new(delivery),
        Arc::new(RodioPlayer::new()),
        RunSettings {
            output_dir: settings.output_dir.clone(),
            timing: settings.timing,
        },
    );
    if settings.clear_store {
        orchestrator = orchestrator.with_store_admin(transport);
    }

    presenter.info(&format!(
        "Capturing {} segment{} of {} into {} (uploading to {})",
        options.segments,
        if options.segments == 1 { "" } else { "s" },
        settings.timing.segment,
        settings.output_dir.display(),
        settings.endpoint
    ));

    let callbacks = RunCallbacks {
        on_segment_start: Some(Box::new(|index, total| {
            Presenter::new().segment_started(index, total);
        })),
        on_segment_complete: Some(Box::new(|completion: &SegmentCompletion| {
            Presenter::new().segment_finished(completion);
        })),
    };

    match orchestrator
        .run(options.segments, &settings.reference, callbacks)
        .await
    {
        Ok(summary) => {
            if let Some(Err(e)) = &summary.store_cleared {
                presenter.warn(&format!("Remote store was not cleared: {}", e));
            }
            presenter.summary(&summary);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Validate everything that can be checked before touching any device
fn resolve(options: &CaptureOptions) -> Result<ResolvedSettings, String> {
    let config = &options.config;
    let reference = resolve_reference(&options.reference)?;

    let mode = match config.upload_mode.as_deref() {
        Some(s) => s.parse::<UploadMode>().map_err(|e| e.to_string())?,
        None => UploadMode::default(),
    };

    let timing = SegmentTiming {
        segment: parse_setting(
            "segment duration",
            config.segment_duration.as_deref(),
            Duration::default_segment(),
        )?,
        settle: parse_setting(
            "settle delay",
            config.settle_delay.as_deref(),
            Duration::default_settle(),
        )?,
    };
    let request_timeout = parse_setting(
        "request timeout",
        config.request_timeout.as_deref(),
        Duration::default_request_timeout(),
    )?;

    Ok(ResolvedSettings {
        reference,
        endpoint: config.endpoint_or_default().to_string(),
        mode,
        timing,
        request_timeout,
        output_dir: config.output_dir_or_default(),
        clear_store: config.clear_store_or_default(),
    })
}

/// Resolve the reference file against the working directory; it must exist
fn resolve_reference(path: &Path) -> Result<PathBuf, String> {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|e| format!("Cannot determine working directory: {}", e))?
            .join(path)
    };

    if !resolved.is_file() {
        return Err(format!("Reference file not found: {}", path.display()));
    }
    Ok(resolved)
}

fn parse_setting(name: &str, value: Option<&str>, fallback: Duration) -> Result<Duration, String> {
    match value {
        Some(s) => s
            .parse::<Duration>()
            .map_err(|e| format!("Invalid {}: {}", name, e)),
        None => Ok(fallback),
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let file_config = load_file_config(&XdgConfigStore::new()).await;

    let env_config = AppConfig {
        endpoint: env::var(ENDPOINT_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

/// Read the config file, falling back to built-in settings when it is unusable
async fn load_file_config<S: ConfigStore>(store: &S) -> AppConfig {
    match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %store.path().display(), "ignoring config file: {}", e);
            AppConfig::empty()
        }
    }
}
