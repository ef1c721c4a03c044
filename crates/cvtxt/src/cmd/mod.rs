use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use cvtxt_client::{
    CancelHandle, ClientConfig, ControllerApi, SessionConfig, CAMERA_MESSAGE_STREAM,
    CONTROLLER_MESSAGE_STREAM,
};
use cvtxt_transport::DEFAULT_BASE_URL;

use crate::exit::{client_error, io_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod camera;
pub mod controllers;
pub mod messages;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow a text message stream.
    Messages(MessagesArgs),
    /// Receive camera frames from the MJPEG stream.
    Camera(CameraArgs),
    /// List controllers discovered on the network.
    Controllers(ControllersArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, connect: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Messages(args) => messages::run(args, connect, format),
        Command::Camera(args) => camera::run(args, connect, format),
        Command::Controllers(args) => controllers::run(args, connect, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the controller.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Controller API base URL.
    #[arg(long, env = "CVTXT_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// API key sent as X-API-KEY.
    #[arg(long, env = "CVTXT_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Timeout for REST calls and stream start (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    pub request_timeout: String,

    /// How long to wait for a stream to shut down (e.g. 3s).
    #[arg(long, default_value = "3s", global = true)]
    pub stop_timeout: String,
}

impl ConnectArgs {
    pub fn api(&self) -> CliResult<ControllerApi> {
        let mut config = ClientConfig::new(self.base_url.clone())
            .with_request_timeout(parse_duration(&self.request_timeout)?);
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.clone());
        }
        let session = SessionConfig {
            stop_timeout: parse_duration(&self.stop_timeout)?,
            ..SessionConfig::default()
        };
        Ok(ControllerApi::new(config)
            .map_err(|err| client_error("invalid connection settings", err))?
            .with_session_config(session))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageSource {
    Camera,
    Controller,
    Counters,
}

impl MessageSource {
    pub fn path(self, controller_id: Option<u32>) -> CliResult<String> {
        match self {
            MessageSource::Camera => Ok(CAMERA_MESSAGE_STREAM.to_string()),
            MessageSource::Controller => Ok(CONTROLLER_MESSAGE_STREAM.to_string()),
            MessageSource::Counters => {
                let id = controller_id.ok_or_else(|| {
                    CliError::new(USAGE, "counters stream requires --controller-id")
                })?;
                Ok(format!("/controller/{id}/counters/message-stream"))
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageSource::Camera => "camera",
            MessageSource::Controller => "controller",
            MessageSource::Counters => "counters",
        }
    }
}

#[derive(Args, Debug)]
pub struct MessagesArgs {
    /// Which message stream to follow.
    #[arg(value_enum)]
    pub source: MessageSource,
    /// Controller whose counters to follow.
    #[arg(long)]
    pub controller_id: Option<u32>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CameraArgs {
    /// Write each frame to DIR/frame-NNNNNN.jpg.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Start the camera first and stop it on exit.
    #[arg(long)]
    pub start: bool,
    /// Capture width in pixels (with --start).
    #[arg(long, default_value_t = 640, requires = "start")]
    pub width: u32,
    /// Capture height in pixels (with --start).
    #[arg(long, default_value_t = 480, requires = "start")]
    pub height: u32,
    /// Capture rate (with --start).
    #[arg(long, default_value_t = 30, requires = "start")]
    pub fps: u32,
}

#[derive(Args, Debug, Default)]
pub struct ControllersArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("async runtime setup failed", err))
}

/// Cancel the stream session on Ctrl-C.
pub(crate) fn install_ctrlc_handler(handle: CancelHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, stopping stream");
        handle.cancel();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
