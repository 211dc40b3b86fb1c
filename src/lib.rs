//! Erase watermarks with an AI image-editing service, aimed at a point you choose.
//!
//! The user loads an image, marks where the watermark sits, and the image plus a
//! spatial phrase ("in the top-left corner") is sent to an external edit service.
//! A [`Workflow`] sequences the steps as an explicit state machine.
//!
//! # Quick Start
//!
//! ```no_run
//! use neon_eraser::{GeminiClient, ImageSource, ServiceConfig, TargetPoint, Workflow};
//!
//! # async fn run() -> neon_eraser::Result<()> {
//! let client = GeminiClient::new(ServiceConfig::from_env());
//! let mut workflow = Workflow::new();
//!
//! workflow.select_file(ImageSource::Path("photo.jpg".into())).await;
//! workflow.set_target(TargetPoint::new(10.0, 90.0));
//! workflow.process(&client).await;
//!
//! if let Some(download) = workflow.download() {
//!     download.save_to(std::path::Path::new(download.file_name))?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Location phrases
//!
//! ```
//! use neon_eraser::location::classify;
//!
//! assert_eq!(classify(50.0, 50.0), "in the center");
//! assert_eq!(classify(90.0, 90.0), "in the bottom-right corner");
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod location;
pub mod workflow;

pub use client::{EditService, GeminiClient, MediaType};
pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use ingest::{ImageSource, PreviewRegistry, UploadedImage};
pub use location::{classify, Bounds, Pointer, TargetPoint};
pub use workflow::{
    Download, EditTicket, StateKind, Transition, Workflow, WorkflowState, DOWNLOAD_FILE_NAME,
};
