//! The form and its request lifecycle.
//!
//! `FormController` owns the field values, the chosen photo, the request
//! state and the current result set. Every change goes through one of its
//! transition methods. `SharedController` wraps it for the local server,
//! where several requests may look at the same form.

use std::{fmt, str::FromStr, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::ThumbnailService;
use crate::error::AppError;
use crate::events::{EventBus, UiEvent};
use crate::thumbnail::ThumbnailSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Left,
    #[default]
    Center,
    Right,
}

impl Placement {
    pub const ALL: [Placement; 3] = [Placement::Left, Placement::Center, Placement::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Left => "left",
            Placement::Center => "center",
            Placement::Right => "right",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Placement::Left),
            "center" => Ok(Placement::Center),
            "right" => Ok(Placement::Right),
            _ => Err(AppError::InvalidField {
                field: "placement",
                value: s.to_string(),
            }),
        }
    }
}

/// The four optional text fields of the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    pub video_type: String,
    pub style: String,
    pub mood: String,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub file_name: String,
    pub mime: String,
    pub data: Bytes,
}

impl Photo {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }
}

/// Everything sent in one request. Lives only as long as that request.
#[derive(Debug, Clone)]
pub struct Submission {
    pub photo: Photo,
    pub fields: FormFields,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

impl RequestState {
    /// Same spelling as the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::InFlight => "in_flight",
            RequestState::Succeeded => "succeeded",
            RequestState::Failed => "failed",
        }
    }
}

/// Serializable view of the form for `/api/state`.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: RequestState,
    pub busy: bool,
    pub fields: FormFields,
    pub photo: Option<String>,
    pub thumbnails: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FormController {
    fields: FormFields,
    photo: Option<Photo>,
    state: RequestState,
    thumbnails: ThumbnailSet,
    notice: Option<String>,
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn set_fields(&mut self, fields: FormFields) {
        self.fields = fields;
    }

    pub fn set_video_type(&mut self, value: impl Into<String>) {
        self.fields.video_type = value.into();
    }

    pub fn set_style(&mut self, value: impl Into<String>) {
        self.fields.style = value.into();
    }

    pub fn set_mood(&mut self, value: impl Into<String>) {
        self.fields.mood = value.into();
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.fields.placement = placement;
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.photo.as_ref()
    }

    pub fn set_photo(&mut self, photo: Photo) {
        self.photo = Some(photo);
    }

    pub fn clear_photo(&mut self) {
        self.photo = None;
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == RequestState::InFlight
    }

    /// Empty unless the last submission succeeded.
    pub fn thumbnails(&self) -> &ThumbnailSet {
        &self.thumbnails
    }

    /// Pending user notice. Reading it consumes it.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            busy: self.is_busy(),
            fields: self.fields.clone(),
            photo: self.photo.as_ref().map(|p| p.file_name.clone()),
            thumbnails: self
                .thumbnails
                .iter()
                .map(|(_, r)| r.as_str().to_string())
                .collect(),
        }
    }

    /// Validates the form and moves to in-flight, dropping the previous results.
    pub fn begin_submit(&mut self) -> Result<Submission, AppError> {
        let rejection = if self.is_busy() {
            Some(AppError::Busy)
        } else if self.photo.is_none() {
            Some(AppError::MissingPhoto)
        } else {
            None
        };
        if let Some(err) = rejection {
            warn!("Submission rejected: {err}");
            self.notify(err.user_message());
            return Err(err);
        }

        let photo = self.photo.clone().ok_or(AppError::MissingPhoto)?;
        self.state = RequestState::InFlight;
        self.thumbnails = ThumbnailSet::default();

        Ok(Submission {
            photo,
            fields: self.fields.clone(),
        })
    }

    /// Records how the in-flight request ended.
    pub fn finish(&mut self, outcome: Result<ThumbnailSet, AppError>) -> Result<usize, AppError> {
        match outcome {
            Ok(set) => {
                let count = set.len();
                info!("Generated {count} thumbnails");
                self.thumbnails = set;
                self.state = RequestState::Succeeded;
                Ok(count)
            }
            Err(err) => {
                error!("Thumbnail generation failed: {err}");
                self.thumbnails = ThumbnailSet::default();
                self.state = RequestState::Failed;
                self.notify(err.user_message());
                Err(err)
            }
        }
    }

    /// Called when a request ended without reporting back.
    fn abandon(&mut self) {
        if self.is_busy() {
            warn!("Submission ended without a response");
            self.state = RequestState::Failed;
            self.notify(crate::error::GENERATE_FAILED);
        }
    }

    /// Runs one submission to completion against `service`.
    pub async fn submit(&mut self, service: &dyn ThumbnailService) -> Result<usize, AppError> {
        let submission = self.begin_submit()?;
        let guard = InFlight {
            controller: self,
            settled: false,
        };
        let outcome = service.generate(&submission).await;
        guard.settle(outcome)
    }
}

/// Clears the busy flag on every exit path, including panics and dropped futures.
struct InFlight<'a> {
    controller: &'a mut FormController,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, outcome: Result<ThumbnailSet, AppError>) -> Result<usize, AppError> {
        self.settled = true;
        self.controller.finish(outcome)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.controller.abandon();
        }
    }
}

/// A controller shared between server requests.
#[derive(Debug, Clone)]
pub struct SharedController {
    inner: Arc<Mutex<FormController>>,
    events: EventBus,
}

impl SharedController {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FormController::new())),
            events,
        }
    }

    /// Runs `f` with the controller locked. Never hold this across an await.
    pub fn with<R>(&self, f: impl FnOnce(&mut FormController) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().is_busy()
    }

    pub fn state(&self) -> RequestState {
        self.inner.lock().state()
    }

    pub fn thumbnails(&self) -> ThumbnailSet {
        self.inner.lock().thumbnails().clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    /// Validates and marks the form in-flight. The returned handle clears the
    /// busy flag however it ends, so it can be moved into a spawned task.
    pub fn begin(&self) -> Result<Pending, AppError> {
        let submission = self.with(FormController::begin_submit)?;
        self.publish_state();
        Ok(Pending {
            owner: self.clone(),
            submission,
            settled: false,
        })
    }

    pub async fn submit(&self, service: &dyn ThumbnailService) -> Result<usize, AppError> {
        self.begin()?.run(service).await
    }

    /// The `StateChanged` event describing the form as it is now.
    pub fn current_event(&self) -> UiEvent {
        let (state, thumbnails) = self.with(|c| (c.state(), c.thumbnails().len()));
        UiEvent::StateChanged { state, thumbnails }
    }

    fn publish_state(&self) {
        self.events.emit(self.current_event());
    }
}

/// An accepted submission waiting for its request to run.
#[derive(Debug)]
pub struct Pending {
    owner: SharedController,
    submission: Submission,
    settled: bool,
}

impl Pending {
    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub async fn run(mut self, service: &dyn ThumbnailService) -> Result<usize, AppError> {
        let outcome = service.generate(&self.submission).await;
        self.settled = true;
        let result = self.owner.with(|c| c.finish(outcome));
        self.owner.publish_state();
        result
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if !self.settled {
            self.owner.with(FormController::abandon);
            self.owner.publish_state();
        }
    }
}
