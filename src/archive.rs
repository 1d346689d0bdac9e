//! Bundles a result set into one zip archive.
//!
//! Fetches run with bounded concurrency but results keep list order. A
//! failed fetch costs only its own entry; the caller gets an outcome for
//! every item.

use std::io::{Cursor, Write};

use bytes::Bytes;
use futures::{stream, StreamExt};
use tracing::{info, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::api::ImageSource;
use crate::error::AppError;
use crate::events::{EventBus, UiEvent};
use crate::thumbnail::{download_name, ThumbnailRef, ThumbnailSet};

pub const ARCHIVE_NAME: &str = "thumbnails.zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub index: usize,
    pub name: String,
    /// Bytes written, or why the entry is missing.
    pub result: Result<usize, String>,
}

#[derive(Debug)]
pub struct Bundle {
    pub archive: Vec<u8>,
    pub outcomes: Vec<EntryOutcome>,
}

impl Bundle {
    pub fn failures(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub async fn bundle(
    set: &ThumbnailSet,
    source: &dyn ImageSource,
    concurrency: usize,
    events: &EventBus,
) -> Result<Bundle, AppError> {
    if set.is_empty() {
        return Err(AppError::NothingToArchive);
    }
    let total = set.len();

    let refs: Vec<(usize, ThumbnailRef)> = set.iter().map(|(i, r)| (i, r.clone())).collect();
    let fetches = stream::iter(refs)
        .map(move |(index, reference)| async move { (index, source.fetch(&reference).await) })
        .buffered(concurrency.max(1));
    let mut fetches = std::pin::pin!(fetches);

    let mut fetched: Vec<(usize, Result<Bytes, AppError>)> = Vec::with_capacity(total);
    while let Some((index, result)) = fetches.next().await {
        events.emit(UiEvent::ArchiveProgress {
            index,
            total,
            ok: result.is_ok(),
        });
        fetched.push((index, result));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut outcomes = Vec::with_capacity(total);

    for (index, result) in fetched {
        let name = download_name(index);
        let result = match result {
            Ok(data) => {
                writer.start_file(name.as_str(), options)?;
                writer.write_all(&data)?;
                Ok(data.len())
            }
            Err(e) => {
                warn!("Skipping {name} in archive: {e}");
                Err(e.to_string())
            }
        };
        outcomes.push(EntryOutcome { index, name, result });
    }

    let written = outcomes.iter().filter(|o| o.result.is_ok()).count();
    if written == 0 {
        return Err(AppError::NothingToArchive);
    }

    let archive = writer.finish()?.into_inner();
    info!(
        "Built {ARCHIVE_NAME} with {written}/{total} entries ({} bytes)",
        archive.len()
    );

    Ok(Bundle { archive, outcomes })
}
