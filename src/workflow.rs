//! The workflow controller.
//!
//! One [`Workflow`] owns the whole session: the uploaded image, the target point,
//! and the outcome of the edit request. Its [`WorkflowState`] is the single source
//! of truth for what gets displayed.
//!
//! ```text
//!  Idle ──select_file──▶ Previewing ──begin_processing──▶ Processing ──finish──▶ Complete
//!   ▲                     │  ▲  │click                          │                  │
//!   │                     │  └──┘                               └──────▶ Failed    │
//!   └────────cancel───────┘                                                │       │
//!   └──────────────────────────────try_again───────────────────────────────┘       │
//!   └──────────────────────────────new_image───────────────────────────────────────┘
//! ```
//!
//! Events that do not apply to the current state are ignored and reported as
//! [`Transition::Ignored`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, info, warn};

use crate::client::{EditService, OUTPUT_PREFIX};
use crate::error::{Error, Result};
use crate::ingest::{ingest, ImageSource, PreviewRegistry, UploadedImage};
use crate::location::{Bounds, Pointer, TargetPoint};

/// File name offered for the edited image.
pub const DOWNLOAD_FILE_NAME: &str = "neon-erased.png";

/// An uploaded image together with the chosen target.
#[derive(Debug)]
pub struct Session {
    image: UploadedImage,
    target: TargetPoint,
}

impl Session {
    fn new(image: UploadedImage) -> Self {
        Self {
            image,
            target: TargetPoint::DEFAULT,
        }
    }

    /// The uploaded image.
    #[must_use]
    pub fn image(&self) -> &UploadedImage {
        &self.image
    }

    /// The current target point.
    #[must_use]
    pub fn target(&self) -> TargetPoint {
        self.target
    }

    /// The location phrase derived from the target point.
    #[must_use]
    pub fn phrase(&self) -> &'static str {
        self.target.phrase()
    }
}

/// Where the workflow currently is.
#[derive(Debug, Default)]
pub enum WorkflowState {
    /// No image loaded.
    #[default]
    Idle,
    /// Image loaded, target can be moved.
    Previewing(Session),
    /// An edit request is in flight; the target is frozen.
    Processing {
        /// The session being edited.
        session: Session,
        /// Identifier of the in-flight request.
        request: u64,
    },
    /// The edit succeeded.
    Complete {
        /// The session that was edited, kept for display.
        session: Session,
        /// Edited image as a PNG data URI.
        output: String,
    },
    /// Ingestion or the edit request failed.
    Failed {
        /// The session, if an image had been loaded.
        session: Option<Session>,
        /// Human-readable error.
        message: String,
    },
}

/// Discriminant of [`WorkflowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// See [`WorkflowState::Idle`].
    Idle,
    /// See [`WorkflowState::Previewing`].
    Previewing,
    /// See [`WorkflowState::Processing`].
    Processing,
    /// See [`WorkflowState::Complete`].
    Complete,
    /// See [`WorkflowState::Failed`].
    Failed,
}

impl WorkflowState {
    /// Which state this is, without its data.
    #[must_use]
    pub fn kind(&self) -> StateKind {
        match self {
            WorkflowState::Idle => StateKind::Idle,
            WorkflowState::Previewing(_) => StateKind::Previewing,
            WorkflowState::Processing { .. } => StateKind::Processing,
            WorkflowState::Complete { .. } => StateKind::Complete,
            WorkflowState::Failed { .. } => StateKind::Failed,
        }
    }

    /// The current session, if an image is loaded.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            WorkflowState::Idle | WorkflowState::Failed { session: None, .. } => None,
            WorkflowState::Previewing(session)
            | WorkflowState::Processing { session, .. }
            | WorkflowState::Complete { session, .. }
            | WorkflowState::Failed {
                session: Some(session),
                ..
            } => Some(session),
        }
    }
}

/// Whether an event changed the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The event was applied.
    Applied,
    /// The event does not apply to the current state and was ignored.
    Ignored,
}

/// Everything needed to run one edit request outside the controller.
///
/// Hand the result back through [`Workflow::finish`]. A ticket outlived by a reset
/// is stale and its result is discarded.
#[must_use = "pass the ticket's result to `Workflow::finish`"]
#[derive(Debug, Clone)]
pub struct EditTicket {
    request: u64,
    payload: Arc<str>,
    phrase: &'static str,
}

impl EditTicket {
    /// Encoded image to submit.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Location phrase to submit.
    #[must_use]
    pub fn phrase(&self) -> &'static str {
        self.phrase
    }
}

/// Title and detail line describing the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Short headline, e.g. "Ready to Process".
    pub title: &'static str,
    /// Explanation or error message.
    pub detail: String,
}

/// What to show in the image area.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    /// Preview url of the original, or the edited image's data URI.
    pub source: &'a str,
    /// `"ORIGINAL"` or `"PROCESSED"`.
    pub label: &'static str,
    /// Target marker, shown only while the target can be moved.
    pub marker: Option<TargetPoint>,
}

/// The edited image offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Suggested file name, always [`DOWNLOAD_FILE_NAME`].
    pub file_name: &'static str,
    /// Edited image as a PNG data URI.
    pub data_uri: String,
}

impl Download {
    /// Decode the image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if the data URI is not valid base64.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        let data = self
            .data_uri
            .strip_prefix(OUTPUT_PREFIX)
            .unwrap_or(&self.data_uri);
        STANDARD
            .decode(data)
            .map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    /// Write the image to `path`, or into it as [`DOWNLOAD_FILE_NAME`] if it names a
    /// directory.
    ///
    /// A path names a directory if it already is one, ends with a separator, or does
    /// not exist and has no extension. Missing directories are created. Returns the
    /// path written.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or writing fails.
    pub fn save_to(&self, path: &Path) -> Result<PathBuf> {
        let target = if names_directory(path) {
            path.join(self.file_name)
        } else {
            path.to_path_buf()
        };

        let bytes = self.bytes()?;
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&target, bytes)?;
        Ok(target)
    }
}

fn names_directory(path: &Path) -> bool {
    let trailing_separator = path
        .as_os_str()
        .to_string_lossy()
        .ends_with(std::path::is_separator);
    path.is_dir() || trailing_separator || (!path.exists() && path.extension().is_none())
}

/// The workflow controller.
#[derive(Debug, Default)]
pub struct Workflow {
    state: WorkflowState,
    previews: PreviewRegistry,
    last_request: u64,
    last_transition: Option<(StateKind, StateKind)>,
}

impl Workflow {
    /// Create an idle workflow with its own preview registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an idle workflow that issues previews from `previews`.
    #[must_use]
    pub fn with_previews(previews: PreviewRegistry) -> Self {
        Self {
            previews,
            ..Self::default()
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Shorthand for `state().kind()`.
    #[must_use]
    pub fn kind(&self) -> StateKind {
        self.state.kind()
    }

    /// The registry backing preview urls.
    #[must_use]
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// The current target, if an image is loaded.
    #[must_use]
    pub fn target(&self) -> Option<TargetPoint> {
        self.state.session().map(Session::target)
    }

    /// The current location phrase, if an image is loaded.
    #[must_use]
    pub fn phrase(&self) -> Option<&'static str> {
        self.state.session().map(Session::phrase)
    }

    /// Source and destination of the most recently applied transition.
    #[must_use]
    pub fn last_transition(&self) -> Option<(StateKind, StateKind)> {
        self.last_transition
    }

    fn replace(&mut self, next: WorkflowState) {
        self.replace_from(self.state.kind(), next);
    }

    /// `from` is passed in for callers that have already taken the state out.
    fn replace_from(&mut self, from: StateKind, next: WorkflowState) {
        let to = next.kind();
        // Dropping the old state releases any preview it no longer shares.
        self.state = next;
        self.last_transition = Some((from, to));
        debug!("workflow: {from:?} -> {to:?}");
    }

    fn ignore(&self, event: &str) -> Transition {
        debug!("workflow: ignoring {event} in {:?}", self.state.kind());
        Transition::Ignored
    }

    /// Load an image and start previewing it. Only valid while idle.
    ///
    /// The target resets to [`TargetPoint::DEFAULT`]. If the image cannot be read the
    /// workflow moves to [`WorkflowState::Failed`] with no session.
    pub async fn select_file(&mut self, source: ImageSource) -> Transition {
        if self.state.kind() != StateKind::Idle {
            return self.ignore("file selection");
        }

        match ingest(source, &self.previews).await {
            Ok(image) => {
                info!("loaded {}", image.file().name);
                self.replace(WorkflowState::Previewing(Session::new(image)));
            }
            Err(e) => {
                warn!("failed to load image: {e}");
                self.replace(WorkflowState::Failed {
                    session: None,
                    message: e.to_string(),
                });
            }
        }
        Transition::Applied
    }

    /// Move the target to a pointer click within the displayed image's `bounds`.
    pub fn click(&mut self, pointer: Pointer, bounds: Bounds) -> Transition {
        self.set_target(TargetPoint::from_pointer(pointer, bounds))
    }

    /// Move the target directly. Only valid while previewing.
    pub fn set_target(&mut self, target: TargetPoint) -> Transition {
        if self.state.kind() != StateKind::Previewing {
            return self.ignore("target change");
        }
        let WorkflowState::Previewing(session) = &mut self.state else {
            return Transition::Ignored;
        };
        session.target = TargetPoint::new(target.x, target.y);
        debug!(
            "target moved to ({:.1}, {:.1}): {}",
            session.target.x,
            session.target.y,
            session.phrase()
        );
        Transition::Applied
    }

    /// Start an edit request. Only valid while previewing.
    ///
    /// Returns `None` if the event was ignored, which guarantees at most one request
    /// in flight. The ticket must be handed back through [`Workflow::finish`]; if it is
    /// dropped instead, the workflow stays in Processing and [`Workflow::reset`] is
    /// the only way out.
    #[must_use = "the workflow stays in Processing until the ticket is passed to `finish`"]
    pub fn begin_processing(&mut self) -> Option<EditTicket> {
        if self.state.kind() != StateKind::Previewing {
            self.ignore("process request");
            return None;
        }
        let from = self.state.kind();
        let WorkflowState::Previewing(session) = std::mem::take(&mut self.state) else {
            return None;
        };

        self.last_request += 1;
        let ticket = EditTicket {
            request: self.last_request,
            payload: Arc::clone(session.image.data_uri()),
            phrase: session.phrase(),
        };
        self.replace_from(
            from,
            WorkflowState::Processing {
                session,
                request: ticket.request,
            },
        );
        Some(ticket)
    }

    /// Apply the outcome of the request identified by `ticket`.
    ///
    /// Results for a request that is no longer in flight are discarded.
    pub fn finish(&mut self, ticket: EditTicket, result: Result<String>) -> Transition {
        let in_flight = matches!(
            self.state,
            WorkflowState::Processing { request, .. } if request == ticket.request
        );
        if !in_flight {
            debug!("discarding stale response for request {}", ticket.request);
            return Transition::Ignored;
        }
        let from = self.state.kind();
        let WorkflowState::Processing { session, .. } = std::mem::take(&mut self.state) else {
            return Transition::Ignored;
        };

        let next = match result {
            Ok(output) => {
                info!("watermark removed {}", session.phrase());
                WorkflowState::Complete { session, output }
            }
            Err(e) => {
                warn!("edit request failed: {e}");
                WorkflowState::Failed {
                    session: Some(session),
                    message: e.to_string(),
                }
            }
        };
        self.replace_from(from, next);
        Transition::Applied
    }

    /// Run one edit request through `service` and apply the result.
    pub async fn process<S>(&mut self, service: &S) -> Transition
    where
        S: EditService + ?Sized,
    {
        let Some(ticket) = self.begin_processing() else {
            return Transition::Ignored;
        };
        let result = service
            .remove_watermark(ticket.payload(), ticket.phrase())
            .await;
        self.finish(ticket, result)
    }

    /// Discard the image while previewing.
    pub fn cancel(&mut self) -> Transition {
        self.reset_from(StateKind::Previewing, "cancel")
    }

    /// Start over after a successful edit.
    pub fn new_image(&mut self) -> Transition {
        self.reset_from(StateKind::Complete, "new image")
    }

    /// Start over after a failure.
    pub fn try_again(&mut self) -> Transition {
        self.reset_from(StateKind::Failed, "try again")
    }

    /// Return to idle from any state, discarding all session data.
    ///
    /// A request still in flight is abandoned; its result will be ignored.
    pub fn reset(&mut self) -> Transition {
        if let WorkflowState::Processing { request, .. } = self.state {
            debug!("abandoning in-flight request {request}");
        }
        self.replace(WorkflowState::Idle);
        Transition::Applied
    }

    fn reset_from(&mut self, expected: StateKind, event: &str) -> Transition {
        if self.state.kind() == expected {
            self.reset()
        } else {
            self.ignore(event)
        }
    }

    /// The edited image, once complete.
    #[must_use]
    pub fn download(&self) -> Option<Download> {
        match &self.state {
            WorkflowState::Complete { output, .. } => Some(Download {
                file_name: DOWNLOAD_FILE_NAME,
                data_uri: output.clone(),
            }),
            _ => None,
        }
    }

    /// What the image area should show, if anything.
    #[must_use]
    pub fn frame(&self) -> Option<Frame<'_>> {
        match &self.state {
            WorkflowState::Idle | WorkflowState::Failed { session: None, .. } => None,
            WorkflowState::Complete { output, .. } => Some(Frame {
                source: output,
                label: "PROCESSED",
                marker: None,
            }),
            WorkflowState::Previewing(session) => Some(Frame {
                source: session.image.preview().url(),
                label: "ORIGINAL",
                marker: Some(session.target),
            }),
            WorkflowState::Processing { session, .. }
            | WorkflowState::Failed {
                session: Some(session),
                ..
            } => Some(Frame {
                source: session.image.preview().url(),
                label: "ORIGINAL",
                marker: None,
            }),
        }
    }

    /// Headline and detail for the current state.
    #[must_use]
    pub fn status(&self) -> Status {
        let (title, detail) = match &self.state {
            WorkflowState::Idle => ("Upload Image", "Drag & drop or click to upload.".to_string()),
            WorkflowState::Previewing(session) => (
                "Ready to Process",
                format!("Targeting watermark {}.", session.phrase()),
            ),
            WorkflowState::Processing { .. } => {
                ("AI is Working...", "Erasing watermark...".to_string())
            }
            WorkflowState::Complete { .. } => {
                ("Cleaned Successfully", "Watermark removed.".to_string())
            }
            WorkflowState::Failed { message, .. } => ("Processing Failed", message.clone()),
        };
        Status { title, detail }
    }
}
