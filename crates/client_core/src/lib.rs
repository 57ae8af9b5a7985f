use std::{path::PathBuf, sync::Arc};

use shared::{
    domain::{OperationState, PreviewDataUri, ResultImage, SelectedFile, DOWNLOAD_FILE_NAME},
    error::ErrorKind,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

pub mod capabilities;
pub mod config;
pub mod deadline;
pub mod endpoint;
pub mod response;
pub mod transport;

pub use capabilities::{
    load_photo, Base64FileReader, DirectoryDownloader, Downloader, FileReader,
};
pub use config::{load_settings, ClientConfig, Settings};
pub use endpoint::{ApiEndpoint, EndpointError};
pub use transport::{PersonalizeTransport, RawResponse, ReqwestTransport, TransportError};

use deadline::{with_deadline, Interrupted};
use response::{interpret_health_response, interpret_personalize_response};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    FileSelected { file_name: String, size_bytes: u64 },
    PreviewReady(PreviewDataUri),
    StateChanged(OperationState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    pub status: String,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Default)]
struct ControllerState {
    selected: Option<SelectedFile>,
    preview: Option<PreviewDataUri>,
    // Bumped on every selection so late previews for replaced files are dropped.
    selection_generation: u64,
    // Identifies the submission that owns a `Submitting` state.
    submission_id: u64,
    operation: OperationState,
}

/// Puts an abandoned submission back to `Idle` when the `submit` future is dropped
/// before it records an outcome.
struct InFlightGuard {
    inner: Arc<Mutex<ControllerState>>,
    events: broadcast::Sender<ControllerEvent>,
    submission_id: u64,
    armed: bool,
}

impl InFlightGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(submission_id = self.submission_id, "submission dropped before completion");
        if let Ok(mut inner) = self.inner.try_lock() {
            release_abandoned(&mut inner, &self.events, self.submission_id);
            return;
        }

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let submission_id = self.submission_id;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let mut inner = inner.lock().await;
                release_abandoned(&mut inner, &events, submission_id);
            });
        }
    }
}

fn release_abandoned(
    inner: &mut ControllerState,
    events: &broadcast::Sender<ControllerEvent>,
    submission_id: u64,
) {
    if inner.submission_id == submission_id && inner.operation.is_submitting() {
        inner.operation = OperationState::Idle;
        let _ = events.send(ControllerEvent::StateChanged(OperationState::Idle));
    }
}

/// Drives one upload-and-personalize operation at a time against the configured API.
pub struct UploadController {
    config: ClientConfig,
    transport: Arc<dyn PersonalizeTransport>,
    reader: Arc<dyn FileReader>,
    downloader: Arc<dyn Downloader>,
    inner: Arc<Mutex<ControllerState>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl UploadController {
    pub fn new(config: ClientConfig, downloader: Arc<dyn Downloader>) -> Arc<Self> {
        Self::new_with_dependencies(
            config,
            Arc::new(ReqwestTransport::new()),
            Arc::new(Base64FileReader),
            downloader,
        )
    }

    pub fn new_with_dependencies(
        config: ClientConfig,
        transport: Arc<dyn PersonalizeTransport>,
        reader: Arc<dyn FileReader>,
        downloader: Arc<dyn Downloader>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!(
            endpoint = %config.endpoint.personalize_url(),
            timeout_secs = config.request_timeout.as_secs_f64(),
            "upload controller ready"
        );
        Arc::new(Self {
            config,
            transport,
            reader,
            downloader,
            inner: Arc::new(Mutex::new(ControllerState::default())),
            events,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> OperationState {
        self.inner.lock().await.operation.clone()
    }

    pub async fn preview(&self) -> Option<PreviewDataUri> {
        self.inner.lock().await.preview.clone()
    }

    pub async fn selected_file(&self) -> Option<SelectedFile> {
        self.inner.lock().await.selected.clone()
    }

    /// Replaces the selected photo and derives its preview. Never touches the network.
    pub async fn select_file(&self, file: SelectedFile) {
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.selection_generation += 1;
            inner.selected = Some(file.clone());
            inner.preview = None;
            if matches!(inner.operation, OperationState::Failed(_)) {
                inner.operation = OperationState::Idle;
                self.emit(ControllerEvent::StateChanged(OperationState::Idle));
            }
            inner.selection_generation
        };
        info!(
            file_name = %file.file_name,
            mime_type = %file.mime_type,
            size_bytes = file.size_bytes(),
            "photo selected"
        );
        self.emit(ControllerEvent::FileSelected {
            file_name: file.file_name.clone(),
            size_bytes: file.size_bytes(),
        });

        let preview = match self.reader.read_as_data_uri(&file).await {
            Ok(preview) => preview,
            Err(err) => {
                warn!(error = %err, file_name = %file.file_name, "failed to build photo preview");
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.selection_generation != generation {
            debug!(file_name = %file.file_name, "dropping preview for replaced selection");
            return;
        }
        inner.preview = Some(preview.clone());
        self.emit(ControllerEvent::PreviewReady(preview));
    }

    /// Uploads the selected photo and waits for the personalized image.
    ///
    /// Rejected with [`ErrorKind::SubmissionInProgress`] while another submission is in
    /// flight; the in-flight operation is left alone. Dropping the returned future before
    /// it resolves puts the controller back to `Idle`.
    pub async fn submit(&self) -> Result<ResultImage, ErrorKind> {
        let (photo, mut guard) = {
            let mut inner = self.inner.lock().await;
            if inner.operation.is_submitting() {
                warn!("submit ignored: a personalization request is already in flight");
                return Err(ErrorKind::SubmissionInProgress);
            }
            let Some(photo) = inner.selected.clone() else {
                let err = ErrorKind::NoFileSelected;
                self.set_operation(&mut inner, OperationState::Failed(err.clone()));
                return Err(err);
            };
            inner.submission_id += 1;
            self.set_operation(&mut inner, OperationState::Submitting);
            let guard = InFlightGuard {
                inner: Arc::clone(&self.inner),
                events: self.events.clone(),
                submission_id: inner.submission_id,
                armed: true,
            };
            (photo, guard)
        };

        let outcome = self.personalize(&photo).await;

        let mut inner = self.inner.lock().await;
        guard.disarm();
        match &outcome {
            Ok(image) => {
                info!(format = %image.mime_subtype, image_len = image.data.len(), "photo personalized");
                self.set_operation(&mut inner, OperationState::Succeeded(image.clone()));
            }
            Err(err) => {
                error!(error = %err, "photo personalization failed");
                self.set_operation(&mut inner, OperationState::Failed(err.clone()));
            }
        }
        outcome
    }

    /// Saves the current result as `personalized-book-page.png`. Leaves the state unchanged.
    pub async fn download(&self) -> Result<PathBuf, ErrorKind> {
        let image = {
            let inner = self.inner.lock().await;
            match inner.operation.result() {
                Some(image) => image.clone(),
                None => {
                    debug!(state = inner.operation.label(), "download requested without a result");
                    return Err(ErrorKind::NoResultAvailable);
                }
            }
        };

        self.downloader
            .save(DOWNLOAD_FILE_NAME, &image)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to save personalized image");
                ErrorKind::Download(err.to_string())
            })
    }

    /// Probes `GET /health` under the request deadline. Does not touch the operation state.
    pub async fn check_health(&self) -> Result<ServiceHealth, ErrorKind> {
        let url = self.config.endpoint.health_url();
        debug!(%url, "checking service health");
        let response = with_deadline(self.config.request_timeout, self.transport.get(url))
            .await
            .map_err(interrupted_error)?
            .map_err(transport_error)?;
        let status = interpret_health_response(&response)?;
        Ok(ServiceHealth { status })
    }

    async fn personalize(&self, photo: &SelectedFile) -> Result<ResultImage, ErrorKind> {
        let url = self.config.endpoint.personalize_url();
        info!(%url, size_bytes = photo.size_bytes(), "uploading photo");

        let response = with_deadline(
            self.config.request_timeout,
            self.transport.post_photo(url, photo),
        )
        .await
        .map_err(interrupted_error)?
        .map_err(transport_error)?;

        info!(status = response.status.as_u16(), body_len = response.body.len(), "response received");
        interpret_personalize_response(&response)
    }

    fn set_operation(&self, inner: &mut ControllerState, next: OperationState) {
        debug!(from = inner.operation.label(), to = next.label(), "operation state change");
        inner.operation = next.clone();
        self.emit(ControllerEvent::StateChanged(next));
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine; the state accessors stay authoritative.
        let _ = self.events.send(event);
    }
}

fn interrupted_error(interrupted: Interrupted) -> ErrorKind {
    match interrupted {
        Interrupted::DeadlineElapsed { after } => {
            warn!(?after, "request aborted after deadline");
            ErrorKind::Timeout
        }
    }
}

fn transport_error(err: TransportError) -> ErrorKind {
    match err {
        TransportError::TimedOut => ErrorKind::Timeout,
        TransportError::Failed(message) => ErrorKind::Transport(message),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
