//! Typed access to one controller: REST calls and stream openers.

use std::sync::Arc;

use cvtxt_frame::{LineConfig, MultipartConfig};
use cvtxt_transport::{ApiError, ClientConfig, HttpResponse, HttpSession, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::models::{
    CameraConfig, Controller, Counter, ImageRecognitionConfig, Input, Motor, Servomotor,
};
use crate::session::{FrameStream, LineStream, SessionConfig, StreamRequest, StreamSession};

pub const CAMERA_MESSAGE_STREAM: &str = "/controller/camera/message-stream";
pub const CAMERA_IMAGE_STREAM: &str = "/controller/camera/image-stream";
pub const CONTROLLER_MESSAGE_STREAM: &str = "/controller/message-stream";

/// Client for one controller.
///
/// Holds one [`HttpSession`]; every REST call and stream opened through it shares the
/// session's configuration and API key. Independent clients share nothing.
#[derive(Debug, Clone)]
pub struct ControllerApi {
    http: Arc<HttpSession>,
    session_config: SessionConfig,
    line_config: LineConfig,
    multipart_config: MultipartConfig,
}

impl ControllerApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: Arc::new(HttpSession::new(config)?),
            session_config: SessionConfig::default(),
            line_config: LineConfig::default(),
            multipart_config: MultipartConfig::default(),
        })
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn with_line_config(mut self, config: LineConfig) -> Self {
        self.line_config = config;
        self
    }

    pub fn with_multipart_config(mut self, config: MultipartConfig) -> Self {
        self.multipart_config = config;
        self
    }

    pub fn http(&self) -> &Arc<HttpSession> {
        &self.http
    }

    /// Tear down the connection pool. Open streams keep their own connection.
    pub fn close(&self) {
        self.http.close();
    }

    // --- Streams ---

    /// An idle line stream session for `path`.
    pub fn line_stream(&self, path: &str, api_key: Option<&str>) -> LineStream {
        StreamSession::new(
            Arc::clone(&self.http),
            StreamRequest::new(path).api_key(api_key),
            self.line_config.clone(),
            self.session_config.clone(),
        )
    }

    /// An idle frame stream session for `path`, authenticated with the configured key.
    pub fn frame_stream(&self, path: &str) -> FrameStream {
        let request = StreamRequest::new(path).api_key(self.http.config().api_key.as_deref());
        StreamSession::new(
            Arc::clone(&self.http),
            request,
            self.multipart_config.clone(),
            self.session_config.clone(),
        )
    }

    /// Open and start a line-delimited text stream.
    pub async fn open_line_stream(&self, path: &str, api_key: Option<&str>) -> Result<LineStream> {
        let mut stream = self.line_stream(path, api_key);
        stream.start().await?;
        Ok(stream)
    }

    /// Open and start a multipart image stream.
    pub async fn open_frame_stream(&self, path: &str) -> Result<FrameStream> {
        let mut stream = self.frame_stream(path);
        stream.start().await?;
        Ok(stream)
    }

    pub async fn camera_message_stream(&self, api_key: Option<&str>) -> Result<LineStream> {
        self.open_line_stream(CAMERA_MESSAGE_STREAM, api_key).await
    }

    pub async fn controller_message_stream(&self, api_key: Option<&str>) -> Result<LineStream> {
        self.open_line_stream(CONTROLLER_MESSAGE_STREAM, api_key)
            .await
    }

    pub async fn counters_message_stream(
        &self,
        controller_id: u32,
        api_key: Option<&str>,
    ) -> Result<LineStream> {
        let path = format!("/controller/{controller_id}/counters/message-stream");
        self.open_line_stream(&path, api_key).await
    }

    /// Open the camera's MJPEG stream. The camera must have been started.
    pub async fn camera_image_stream(&self) -> Result<FrameStream> {
        self.open_frame_stream(CAMERA_IMAGE_STREAM).await
    }

    // --- Camera ---

    pub async fn add_camera_image_recognition_config(
        &self,
        config: &ImageRecognitionConfig,
    ) -> Result<()> {
        let request =
            Request::post("/controller/camera/image-recognition").json(to_body(config)?);
        self.call_unit(request).await
    }

    pub async fn start_camera(&self, config: &CameraConfig) -> Result<()> {
        let request = Request::post("/controller/camera/start").json(to_body(config)?);
        self.call_unit(request).await
    }

    pub async fn stop_camera(&self) -> Result<()> {
        self.call_unit(Request::delete("/controller/camera/stop"))
            .await
    }

    // --- Controllers ---

    /// Controllers discovered on the network.
    pub async fn get_controllers(&self) -> Result<Vec<Controller>> {
        self.call_json(Request::get("/controller/discovery")).await
    }

    pub async fn get_controller_by_id(&self, controller_id: u32) -> Result<Controller> {
        self.call_json(Request::get(format!("/controller/{controller_id}")))
            .await
    }

    pub async fn init_controller_by_id(&self, controller_id: u32) -> Result<()> {
        self.call_unit(Request::post(format!("/controller/{controller_id}")))
            .await
    }

    // --- Counters ---

    pub async fn get_controller_counters(&self, controller_id: u32) -> Result<Vec<Counter>> {
        self.call_json(Request::get(format!("/controller/{controller_id}/counters")))
            .await
    }

    pub async fn add_controller_counters(
        &self,
        controller_id: u32,
        counters: &[Counter],
    ) -> Result<()> {
        let request = Request::post(format!("/controller/{controller_id}/counters"))
            .json(to_body(counters)?);
        self.call_unit(request).await
    }

    pub async fn get_controller_counter_by_id(
        &self,
        controller_id: u32,
        counter_id: u32,
    ) -> Result<Counter> {
        self.call_json(Request::get(format!(
            "/controller/{controller_id}/counters/{counter_id}"
        )))
        .await
    }

    /// Reset a counter. The controller takes no body for this call.
    pub async fn update_controller_counter_by_id(
        &self,
        controller_id: u32,
        counter_id: u32,
    ) -> Result<()> {
        self.call_unit(Request::patch(format!(
            "/controller/{controller_id}/counters/{counter_id}"
        )))
        .await
    }

    // --- Inputs and outputs ---

    pub async fn get_controller_inputs(&self, controller_id: u32) -> Result<Vec<Input>> {
        self.call_json(Request::get(format!("/controller/{controller_id}/inputs")))
            .await
    }

    pub async fn add_controller_inputs(&self, controller_id: u32, inputs: &[Input]) -> Result<()> {
        let request = Request::post(format!("/controller/{controller_id}/inputs"))
            .json(to_body(inputs)?);
        self.call_unit(request).await
    }

    pub async fn update_controller_motor_by_id(
        &self,
        controller_id: u32,
        motor_id: u32,
        motor: &Motor,
    ) -> Result<()> {
        let request = Request::post(format!("/controller/{controller_id}/motors/{motor_id}"))
            .json(to_body(motor)?);
        self.call_unit(request).await
    }

    pub async fn update_controller_servomotor_by_id(
        &self,
        controller_id: u32,
        servomotor_id: u32,
        servomotor: &Servomotor,
    ) -> Result<()> {
        let request =
            Request::post(format!("/controller/{controller_id}/servomotors/{servomotor_id}"))
                .json(to_body(servomotor)?);
        self.call_unit(request).await
    }

    // --- Plumbing ---

    /// Send a bounded REST call and map any non-2xx status to an [`ApiError`].
    async fn call(&self, request: Request) -> Result<HttpResponse> {
        let request = request.timeout(self.http.config().request_timeout);
        let response = self.http.send(&request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(path = request.path(), status, "api call failed");
        match ApiError::from_status(status, body) {
            Some(err) => Err(err.into()),
            None => Err(ApiError::malformed(status, "").into()),
        }
    }

    async fn call_unit(&self, request: Request) -> Result<()> {
        self.call(request).await.map(drop)
    }

    async fn call_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.call(request).await?;
        let status = response.status();
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| {
            tracing::debug!(status, error = %err, "unparsable response body");
            ClientError::Api(ApiError::malformed(
                status,
                String::from_utf8_lossy(&body).into_owned(),
            ))
        })
    }
}

fn to_body<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}
