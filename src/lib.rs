//! Local front end for a remote thumbnail generation service.
//!
//! A photo plus a few descriptive fields go to the service as one multipart
//! POST; the service answers with a list of image references. Those are shown
//! as a gallery, downloaded one by one, or bundled into `thumbnails.zip`.
//!
//! The same pieces back both the browser page served by [`local_server`] and
//! the headless `thumbgen generate` command.

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod events;
pub mod form;
pub mod gallery;
pub mod generate;
pub mod local_server;
pub mod page;
pub mod thumbnail;
pub mod utils;

pub use api::{HttpThumbnailService, ImageSource, ThumbnailService};
pub use config::Config;
pub use error::AppError;
pub use form::{FormController, FormFields, Photo, Placement, RequestState, SharedController};
pub use thumbnail::{ThumbnailRef, ThumbnailSet};
