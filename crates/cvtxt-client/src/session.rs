//! Lifecycle control for one streaming request.
//!
//! A [`StreamSession`] owns the HTTP response body and the background task decoding it.
//! The caller sees decoded events through [`StreamSession::next_event`] (or the `Stream`
//! impl) and drives the session with [`start`](StreamSession::start) and
//! [`stop`](StreamSession::stop). Any thread may request cancellation through a
//! [`CancelHandle`].

use std::fmt;
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use cvtxt_frame::{ChunkReader, FrameError, LineCodec, MultipartCodec, StreamCodec};
use cvtxt_transport::{ApiError, ByteStream, HttpSession, Request, TransportError, API_KEY_HEADER};
use futures_core::Stream;
use futures_util::StreamExt as _;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

/// Default number of decoded events buffered between the decode task and the consumer.
pub const DEFAULT_EVENT_BUFFER: usize = 32;

/// Default bound on how long `stop()` waits for the decode task to exit.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Where a session is in its lifecycle.
///
/// `Stopped` and `Failed` are terminal; a session is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Stopped | SessionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Starting => "starting",
            SessionStatus::Running => "running",
            SessionStatus::Stopping => "stopping",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for stream sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Events buffered ahead of the consumer. Default: 32.
    pub event_buffer: usize,
    /// Bound on `stop()` waiting for the decode task. Default: 3s.
    pub stop_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Endpoint path, optional API key query parameter, and extra headers of a stream.
#[derive(Clone)]
pub struct StreamRequest {
    path: String,
    api_key: Option<String>,
    headers: Vec<(String, String)>,
}

impl StreamRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            api_key: None,
            headers: Vec::new(),
        }
    }

    /// Send `api_key` as the `X-API-KEY` query parameter. Empty keys are ignored.
    pub fn api_key(mut self, api_key: Option<&str>) -> Self {
        self.api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .map(str::to_string);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HTTP request to send. Streaming requests never carry a total timeout.
    pub fn to_request(&self) -> Request {
        let mut request = Request::get(self.path.clone());
        if let Some(key) = &self.api_key {
            request = request.query(API_KEY_HEADER, key.clone());
        }
        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }
        request
    }
}

impl fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRequest")
            .field("path", &self.path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers)
            .finish()
    }
}

/// One item of a stream session.
///
/// A consumer sees any number of `Data` events followed by exactly one terminal event,
/// `Closed` or `Error`.
#[derive(Debug)]
pub enum StreamEvent<T> {
    Data(T),
    /// The stream ended: connection closed by the server, or the session was stopped.
    Closed,
    /// The stream failed; no further events follow.
    Error(ClientError),
}

impl<T> StreamEvent<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Data(_))
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            StreamEvent::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// Requests cancellation of a stream session from anywhere.
///
/// Cancelling makes the decode task exit at its next suspension point; the consumer then
/// sees `StreamEvent::Closed`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct SharedState {
    status: SessionStatus,
    released: bool,
    last_error: Option<String>,
    #[cfg(test)]
    history: Vec<SessionStatus>,
}

/// State visible to both the session handle and its decode task.
#[derive(Debug)]
struct Shared {
    path: String,
    state: Mutex<SharedState>,
}

impl Shared {
    fn new(path: String) -> Self {
        Self {
            path,
            state: Mutex::new(SharedState {
                status: SessionStatus::Idle,
                released: false,
                last_error: None,
                #[cfg(test)]
                history: vec![SessionStatus::Idle],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> SessionStatus {
        self.lock().status
    }

    /// Move to `to` if the current status is one of `from`.
    fn transition(&self, from: &[SessionStatus], to: SessionStatus) -> bool {
        let mut state = self.lock();
        if !from.contains(&state.status) {
            return false;
        }
        tracing::debug!(path = %self.path, from = %state.status, to = %to, "stream session transition");
        state.status = to;
        #[cfg(test)]
        state.history.push(to);
        true
    }

    fn fail(&self, err: &ClientError) {
        let mut state = self.lock();
        state.last_error = Some(err.to_string());
        if !state.status.is_terminal() {
            tracing::debug!(path = %self.path, from = %state.status, to = %SessionStatus::Failed, "stream session transition");
            state.status = SessionStatus::Failed;
            #[cfg(test)]
            state.history.push(SessionStatus::Failed);
        }
    }

    /// Returns true only for the call that actually released.
    fn release(&self) -> bool {
        let mut state = self.lock();
        if state.released {
            return false;
        }
        state.released = true;
        tracing::debug!(path = %self.path, status = %state.status, "stream resources released");
        true
    }
}

enum Outcome {
    Closed,
    Cancelled,
    Detached,
    Failed(ClientError),
}

/// The decode task: owns the response body for the lifetime of the stream.
struct Worker<C: StreamCodec> {
    reader: ChunkReader<C>,
    tx: mpsc::Sender<StreamEvent<C::Item>>,
    token: CancellationToken,
    shared: Arc<Shared>,
}

impl<C> Worker<C>
where
    C: StreamCodec,
    C::Item: Send + 'static,
{
    async fn run(mut self) {
        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = self.token.cancelled() => break Outcome::Cancelled,
                next = self.reader.read_event() => next,
            };

            match next {
                Ok(item) => {
                    let sent = tokio::select! {
                        biased;
                        () = self.token.cancelled() => break Outcome::Cancelled,
                        sent = self.tx.send(StreamEvent::Data(item)) => sent,
                    };
                    if sent.is_err() {
                        break Outcome::Detached;
                    }
                }
                Err(FrameError::ConnectionClosed) => break Outcome::Closed,
                Err(err) => break Outcome::Failed(err.into()),
            }
        };

        self.finish(outcome).await;
    }

    async fn finish(&mut self, outcome: Outcome) {
        let bytes_received = self.reader.bytes_received();
        let live = [SessionStatus::Starting, SessionStatus::Running];

        match outcome {
            Outcome::Closed => {
                tracing::debug!(path = %self.shared.path, bytes_received, "stream closed by server");
                self.shared.transition(&live, SessionStatus::Stopped);
                self.deliver(StreamEvent::Closed).await;
            }
            Outcome::Cancelled => {
                tracing::debug!(path = %self.shared.path, bytes_received, "stream cancelled");
                self.shared.transition(&live, SessionStatus::Stopping);
                self.shared
                    .transition(&[SessionStatus::Stopping], SessionStatus::Stopped);
            }
            Outcome::Detached => {
                tracing::debug!(path = %self.shared.path, bytes_received, "stream consumer went away");
                self.shared.transition(&live, SessionStatus::Stopped);
            }
            Outcome::Failed(err) => {
                tracing::warn!(path = %self.shared.path, bytes_received, error = %err, "stream failed");
                self.shared.fail(&err);
                self.deliver(StreamEvent::Error(err)).await;
            }
        }
    }

    async fn deliver(&mut self, event: StreamEvent<C::Item>) {
        tokio::select! {
            biased;
            () = self.token.cancelled() => {}
            _ = self.tx.send(event) => {}
        }
    }
}

impl<C: StreamCodec> Drop for Worker<C> {
    fn drop(&mut self) {
        self.shared.release();
    }
}

/// A single-use streaming request and the task decoding its body.
///
/// Status moves `Idle → Starting → Running → Stopping → Stopped`, with `Failed` reachable
/// from any non-terminal status. The connection and decode task are released exactly
/// once, on whichever terminal transition happens first.
pub struct StreamSession<C: StreamCodec> {
    http: Arc<HttpSession>,
    request: StreamRequest,
    codec_config: C::Config,
    config: SessionConfig,
    shared: Arc<Shared>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    rx: Option<mpsc::Receiver<StreamEvent<C::Item>>>,
    saw_terminal: bool,
}

/// Session decoding a line-delimited text stream.
pub type LineStream = StreamSession<LineCodec>;

/// Session decoding a `multipart/x-mixed-replace` image stream.
pub type FrameStream = StreamSession<MultipartCodec>;

impl<C> StreamSession<C>
where
    C: StreamCodec,
    C::Item: Send + 'static,
{
    /// Create an idle session. Nothing is sent until [`start`](Self::start).
    pub fn new(
        http: Arc<HttpSession>,
        request: StreamRequest,
        codec_config: C::Config,
        config: SessionConfig,
    ) -> Self {
        let shared = Arc::new(Shared::new(request.path().to_string()));
        Self {
            http,
            request,
            codec_config,
            config,
            shared,
            token: CancellationToken::new(),
            task: None,
            rx: None,
            saw_terminal: false,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    /// Message of the error that failed this session, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    /// Whether the connection and decode task have been released.
    pub fn is_released(&self) -> bool {
        self.shared.lock().released
    }

    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Ask the decode task to exit without waiting for it.
    ///
    /// The consumer then sees `StreamEvent::Closed`. Use [`stop`](Self::stop) to also wait
    /// for the task and release the connection.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.token.clone(),
        }
    }

    /// Issue the streaming request and spawn the decode task.
    ///
    /// Returns once the response headers have been validated. A failing status, a
    /// response the codec cannot handle, or a connection failure fails the session and is
    /// returned here; no events are ever emitted in that case.
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn start(&mut self) -> Result<()> {
        if !self
            .shared
            .transition(&[SessionStatus::Idle], SessionStatus::Starting)
        {
            return Err(ClientError::InvalidState {
                operation: "start",
                status: self.status(),
            });
        }

        let reader = match self.open().await {
            Ok(reader) => reader,
            Err(err) => {
                tracing::debug!(path = %self.request.path(), error = %err, "stream start failed");
                self.shared.fail(&err);
                self.shared.release();
                self.saw_terminal = true;
                return Err(err);
            }
        };

        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let worker = Worker {
            reader,
            tx,
            token: self.token.clone(),
            shared: Arc::clone(&self.shared),
        };
        self.task = Some(tokio::spawn(worker.run()));
        self.rx = Some(rx);
        Ok(())
    }

    async fn open(&self) -> Result<ChunkReader<C>> {
        let request = self.request.to_request();
        let wait = self.http.config().request_timeout;

        let response = tokio::time::timeout(wait, self.http.send(&request))
            .await
            .map_err(|_| TransportError::Timeout {
                url: self.request.path().to_string(),
            })??;

        if !response.is_success() {
            let status = response.status();
            let body = match tokio::time::timeout(wait, response.text()).await {
                Ok(Ok(body)) => body,
                _ => String::new(),
            };
            return Err(match ApiError::from_status(status, body) {
                Some(err) => err.into(),
                None => ApiError::malformed(status, "").into(),
            });
        }

        let codec = C::for_content_type(response.content_type(), &self.codec_config)?;

        let shared = Arc::clone(&self.shared);
        let body: ByteStream = Box::pin(response.into_byte_stream().inspect(move |chunk| {
            if chunk.is_ok() {
                shared.transition(&[SessionStatus::Starting], SessionStatus::Running);
            }
        }));
        Ok(ChunkReader::new(body, codec))
    }

    /// Stop the stream and release its resources.
    ///
    /// Waits up to the configured stop timeout for the decode task to exit, then aborts it
    /// and returns [`ClientError::Timeout`]; the session still ends `Stopped`. Events not
    /// yet consumed are discarded. Calling `stop()` on a stopped or failed session is a
    /// no-op.
    pub async fn stop(&mut self) -> Result<()> {
        match self.status() {
            SessionStatus::Stopped | SessionStatus::Failed => {
                // Reap a task that already ended on its own.
                if let Some(task) = self.task.take() {
                    let _ = tokio::time::timeout(self.config.stop_timeout, task).await;
                }
                return Ok(());
            }
            SessionStatus::Idle => {
                self.shared
                    .transition(&[SessionStatus::Idle], SessionStatus::Stopped);
                self.saw_terminal = true;
                return Ok(());
            }
            SessionStatus::Starting | SessionStatus::Running | SessionStatus::Stopping => {}
        }

        self.shared.transition(
            &[SessionStatus::Starting, SessionStatus::Running],
            SessionStatus::Stopping,
        );
        self.token.cancel();

        let mut result = Ok(());
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.config.stop_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(path = %self.request.path(), error = %err, "stream task ended abnormally");
                }
                Err(_) => {
                    tracing::warn!(
                        path = %self.request.path(),
                        timeout = ?self.config.stop_timeout,
                        "stream task did not exit in time, aborting"
                    );
                    task.abort();
                    let _ = task.await;
                    result = Err(ClientError::Timeout(self.config.stop_timeout));
                }
            }
        }

        self.rx = None;
        self.shared.transition(
            &[
                SessionStatus::Starting,
                SessionStatus::Running,
                SessionStatus::Stopping,
                SessionStatus::Failed,
            ],
            SessionStatus::Stopped,
        );
        self.shared.release();
        result
    }

    /// Wait for the next event.
    ///
    /// Returns `None` after the terminal event has been returned, or if the session was
    /// never started.
    pub async fn next_event(&mut self) -> Option<StreamEvent<C::Item>> {
        poll_fn(|cx| self.poll_event(cx)).await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<StreamEvent<C::Item>>> {
        if self.saw_terminal {
            return Poll::Ready(None);
        }

        let Some(rx) = self.rx.as_mut() else {
            // Stopped before the consumer reached the end.
            if self.shared.status().is_terminal() {
                self.saw_terminal = true;
                return Poll::Ready(Some(StreamEvent::Closed));
            }
            return Poll::Ready(None);
        };

        match ready!(rx.poll_recv(cx)) {
            Some(event) => {
                if event.is_terminal() {
                    self.saw_terminal = true;
                    self.rx = None;
                }
                Poll::Ready(Some(event))
            }
            None => {
                // Task exited without a terminal event (cancelled or aborted).
                self.saw_terminal = true;
                self.rx = None;
                Poll::Ready(Some(StreamEvent::Closed))
            }
        }
    }
}

impl<C: StreamCodec> Unpin for StreamSession<C> {}

impl<C> Stream for StreamSession<C>
where
    C: StreamCodec,
    C::Item: Send + 'static,
{
    type Item = StreamEvent<C::Item>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_event(cx)
    }
}

impl<C: StreamCodec> Drop for StreamSession<C> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<C: StreamCodec> fmt::Debug for StreamSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("request", &self.request)
            .field("status", &self.shared.status())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use cvtxt_frame::LineConfig;
    use cvtxt_transport::ClientConfig;

    use super::*;

    fn http() -> Arc<HttpSession> {
        Arc::new(HttpSession::new(ClientConfig::new("http://ctrl.local/api/v1")).unwrap())
    }

    #[test]
    fn terminal_statuses() {
        assert!(SessionStatus::Stopped.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        for status in [
            SessionStatus::Idle,
            SessionStatus::Starting,
            SessionStatus::Running,
            SessionStatus::Stopping,
        ] {
            assert!(!status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn stream_request_adds_api_key_query() {
        let request = StreamRequest::new("/controller/message-stream")
            .api_key(Some("k3y"))
            .to_request();
        let wire = http().build(&request).unwrap();
        assert_eq!(wire.url().query(), Some("X-API-KEY=k3y"));
        assert_eq!(wire.method(), &cvtxt_transport::Method::GET);
        assert!(wire.timeout().is_none());
    }

    #[test]
    fn stream_request_ignores_empty_api_key() {
        let request = StreamRequest::new("/controller/message-stream").api_key(Some("  "));
        let wire = http().build(&request.to_request()).unwrap();
        assert_eq!(wire.url().query(), None);
    }

    #[test]
    fn stream_request_debug_redacts_key() {
        let request = StreamRequest::new("/x").api_key(Some("hunter2"));
        let debug = format!("{request:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn release_happens_once() {
        let shared = Shared::new("/x".to_string());
        assert!(shared.release());
        assert!(!shared.release());
    }

    #[test]
    fn failure_does_not_leave_terminal_status() {
        let shared = Shared::new("/x".to_string());
        shared.transition(&[SessionStatus::Idle], SessionStatus::Stopped);
        shared.fail(&ClientError::Timeout(Duration::from_secs(1)));
        assert_eq!(shared.status(), SessionStatus::Stopped);
        assert!(shared.lock().last_error.is_some());
    }

    #[tokio::test]
    async fn stop_before_start_ends_session() {
        let mut session: LineStream = StreamSession::new(
            http(),
            StreamRequest::new("/controller/message-stream"),
            LineConfig::default(),
            SessionConfig::default(),
        );
        session.stop().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Stopped);
        session.stop().await.unwrap();
        assert!(session.next_event().await.is_none());

        let err = session.start().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidState {
                operation: "start",
                status: SessionStatus::Stopped
            }
        ));
    }

    fn running_worker(shared: &Arc<Shared>, token: &CancellationToken) -> Worker<LineCodec> {
        shared.transition(&[SessionStatus::Idle], SessionStatus::Starting);
        shared.transition(&[SessionStatus::Starting], SessionStatus::Running);
        let body: ByteStream = Box::pin(futures_util::stream::pending());
        let (tx, _rx) = mpsc::channel(1);
        Worker {
            reader: ChunkReader::new(body, LineCodec::default()),
            tx,
            token: token.clone(),
            shared: Arc::clone(shared),
        }
    }

    #[tokio::test]
    async fn cancelled_worker_stops_through_stopping() {
        let shared = Arc::new(Shared::new("/controller/message-stream".to_string()));
        let token = CancellationToken::new();
        let worker = running_worker(&shared, &token);

        token.cancel();
        worker.run().await;

        assert_eq!(
            shared.lock().history,
            [
                SessionStatus::Idle,
                SessionStatus::Starting,
                SessionStatus::Running,
                SessionStatus::Stopping,
                SessionStatus::Stopped,
            ]
        );
        assert!(shared.lock().released);
    }

    #[tokio::test]
    async fn stop_aborts_task_that_outlives_timeout() {
        let mut session: LineStream = StreamSession::new(
            http(),
            StreamRequest::new("/controller/message-stream"),
            LineConfig::default(),
            SessionConfig {
                stop_timeout: Duration::from_millis(20),
                ..SessionConfig::default()
            },
        );
        session
            .shared
            .transition(&[SessionStatus::Idle], SessionStatus::Running);

        // A task that ignores cancellation.
        let held = Arc::new(());
        let guard = Arc::clone(&held);
        session.task = Some(tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        }));

        let err = session.stop().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(20)));
        assert_eq!(err.to_string(), "timed out after 20ms");
        assert!(err.is_transient());

        assert_eq!(session.status(), SessionStatus::Stopped);
        assert!(session.is_released());
        assert_eq!(Arc::strong_count(&held), 1, "aborted task should be dropped");
        assert!(matches!(session.next_event().await, Some(StreamEvent::Closed)));
        assert!(session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn unstarted_session_yields_nothing() {
        let mut session: FrameStream = StreamSession::new(
            http(),
            StreamRequest::new("/controller/camera/image-stream"),
            cvtxt_frame::MultipartConfig::default(),
            SessionConfig::default(),
        );
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.next_event().await.is_none());
        assert!(!session.is_released());
    }
}
