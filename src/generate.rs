//! Headless submission behind `thumbgen generate`: submit one photo, then
//! optionally save every thumbnail and bundle them into a zip.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::api::{HttpThumbnailService, ImageSource};
use crate::archive::{self, EntryOutcome};
use crate::config::Config;
use crate::error::AppError;
use crate::events::EventBus;
use crate::form::{FormController, FormFields};
use crate::thumbnail::{download_name, ThumbnailSet};
use crate::utils::{read_photo, save_file};

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub photo: PathBuf,
    pub fields: FormFields,
    /// Save each thumbnail as `thumbnail_<i>.png` here.
    pub out_dir: Option<PathBuf>,
    /// Write the bundled archive to this path.
    pub zip: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct GenerateReport {
    pub thumbnails: ThumbnailSet,
    pub saved: Vec<PathBuf>,
    /// Download names that could not be fetched into `out_dir`.
    pub missing: Vec<String>,
    /// Per-entry outcomes of the archive, when one was written.
    pub archive: Option<Vec<EntryOutcome>>,
}

pub async fn run(config: &Config, request: &GenerateRequest) -> Result<GenerateReport, AppError> {
    config.validate()?;
    let service = HttpThumbnailService::new(config)?;

    let mut form = FormController::new();
    form.set_photo(read_photo(&request.photo)?);
    form.set_fields(request.fields.clone());
    form.submit(&service).await?;

    let mut report = GenerateReport {
        thumbnails: form.thumbnails().clone(),
        ..GenerateReport::default()
    };

    if let Some(dir) = &request.out_dir {
        for (index, reference) in report.thumbnails.iter() {
            let name = download_name(index);
            match service.fetch(reference).await {
                Ok(data) => {
                    let path = save_file(dir, &name, &data)?;
                    info!("Saved {}", path.display());
                    report.saved.push(path);
                }
                Err(e) => {
                    warn!("Could not download {name}: {e}");
                    report.missing.push(name);
                }
            }
        }
    }

    if let Some(zip_path) = &request.zip {
        let bundle = archive::bundle(
            &report.thumbnails,
            &service,
            config.fetch_concurrency,
            &EventBus::new(),
        )
        .await?;
        for failure in bundle.failures() {
            if let Err(reason) = &failure.result {
                warn!("{} missing from archive: {reason}", failure.name);
            }
        }
        std::fs::write(zip_path, &bundle.archive)?;
        info!("Wrote {}", zip_path.display());
        report.archive = Some(bundle.outcomes);
    }

    Ok(report)
}
