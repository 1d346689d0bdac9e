use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use futures::TryStreamExt;
use tokio::signal;
use tracing::{error, info, warn};
use warp::http::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use warp::http::{StatusCode, Uri};
use warp::multipart::{FormData, Part};
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::api::{HttpThumbnailService, ImageSource, ThumbnailService};
use crate::archive::{self, ARCHIVE_NAME};
use crate::config::Config;
use crate::error::AppError;
use crate::events::{self, EventBus, UiEvent};
use crate::form::{FormFields, Photo, SharedController};
use crate::page::{self, PageView};
use crate::thumbnail::{download_name, ThumbnailRef};
use crate::utils::image_mime_for;

const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
pub const FAILURES_HEADER: &str = "x-thumbnail-failures";

pub struct AppState {
    pub config: Config,
    pub controller: SharedController,
    pub service: Arc<dyn ThumbnailService>,
    pub images: Arc<dyn ImageSource>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let http = Arc::new(HttpThumbnailService::new(&config)?);
        Ok(Self::with_services(config, http.clone(), http))
    }

    pub fn with_services(
        config: Config,
        service: Arc<dyn ThumbnailService>,
        images: Arc<dyn ImageSource>,
    ) -> Arc<Self> {
        let events = EventBus::new();
        Arc::new(Self {
            config,
            controller: SharedController::new(events.clone()),
            service,
            images,
            events,
        })
    }
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let with_state = {
        let state = state.clone();
        warp::any().map(move || state.clone())
    };

    let index = warp::path::end()
        .and(warp::get())
        .and(with_state.clone())
        .map(index_handler);

    let health_route = warp::path("health")
        .and(warp::path::end())
        .map(|| "Server is running");

    let state_route = warp::path!("api" / "state")
        .and(warp::get())
        .and(with_state.clone())
        .map(|state: Arc<AppState>| warp::reply::json(&state.controller.snapshot()));

    let submit = warp::path("submit")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_state.clone())
        .and_then(submit_handler);

    let archive_route = warp::path(ARCHIVE_NAME)
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state.clone())
        .and_then(archive_handler);

    let single = warp::path!("thumbnails" / usize)
        .and(warp::get())
        .and(with_state)
        .and_then(thumbnail_handler);

    index
        .or(health_route)
        .or(state_route)
        .or(submit)
        .or(archive_route)
        .or(single)
        .or(events::ws_route(state.events.clone(), {
            let controller = state.controller.clone();
            move || controller.current_event()
        }))
}

pub async fn start_server(state: Arc<AppState>) -> Result<(), AppError> {
    let addr = state.config.bind;
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())?;

    info!("Starting server at http://{bound}");
    server.await;
    info!("Server shutting down...");
    Ok(())
}

/// Binds to an ephemeral port and runs in the background. Used by tests and embedders.
pub fn spawn_server(state: Arc<AppState>, addr: SocketAddr) -> Result<SocketAddr, AppError> {
    let (bound, server) = warp::serve(routes(state)).try_bind_ephemeral(addr)?;
    tokio::spawn(server);
    Ok(bound)
}

fn index_handler(state: Arc<AppState>) -> impl Reply {
    let html = state.controller.with(|c| {
        let notice = c.take_notice();
        page::render(PageView {
            fields: c.fields(),
            state: c.state(),
            thumbnails: c.thumbnails(),
            notice,
        })
    });
    warp::reply::html(html)
}

async fn submit_handler(form: FormData, state: Arc<AppState>) -> Result<Response, Infallible> {
    match read_form(form).await {
        Ok((fields, photo)) => {
            state.controller.with(|c| {
                c.set_fields(fields);
                match photo {
                    Some(photo) => c.set_photo(photo),
                    None => c.clear_photo(),
                }
            });

            // Rejections already left a notice for the next page render.
            if let Ok(pending) = state.controller.begin() {
                let service = state.service.clone();
                tokio::spawn(async move {
                    let _ = pending.run(service.as_ref()).await;
                });
            }
        }
        Err(e) => {
            warn!("Unreadable submission: {e}");
            state.controller.with(|c| c.notify(e.user_message()));
        }
    }

    Ok(warp::redirect::see_other(Uri::from_static("/")).into_response())
}

async fn read_form(form: FormData) -> Result<(FormFields, Option<Photo>), AppError> {
    let mut form = std::pin::pin!(form);
    let mut fields = FormFields::default();
    let mut photo = None;

    while let Some(part) = form.try_next().await? {
        let name = part.name().to_string();
        match name.as_str() {
            "photo" => {
                let file_name = part.filename().unwrap_or_default().to_string();
                let mime = part.content_type().map(str::to_string);
                let data = part_bytes(part).await?;
                // Browsers send an empty part when no file is chosen.
                if !file_name.is_empty() && !data.is_empty() {
                    let mime = mime.unwrap_or_else(|| {
                        image_mime_for(std::path::Path::new(&file_name)).to_string()
                    });
                    photo = Some(Photo::new(file_name, mime, data));
                }
            }
            "videoType" => fields.video_type = part_text(part).await?,
            "style" => fields.style = part_text(part).await?,
            "mood" => fields.mood = part_text(part).await?,
            "placement" => fields.placement = part_text(part).await?.parse()?,
            other => warn!("Ignoring unexpected form field {other}"),
        }
    }

    Ok((fields, photo))
}

async fn part_bytes(part: Part) -> Result<BytesMut, AppError> {
    let data = part
        .stream()
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.put(chunk);
            Ok(acc)
        })
        .await?;
    Ok(data)
}

async fn part_text(part: Part) -> Result<String, AppError> {
    let data = part_bytes(part).await?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

async fn archive_handler(state: Arc<AppState>) -> Result<Response, Infallible> {
    let set = state.controller.thumbnails();
    if set.is_empty() {
        return Ok(plain(StatusCode::NOT_FOUND, "No thumbnails to download"));
    }

    let bundle = match archive::bundle(
        &set,
        state.images.as_ref(),
        state.config.fetch_concurrency,
        &state.events,
    )
    .await
    {
        Ok(bundle) => bundle,
        Err(e) => {
            error!("Failed to build {ARCHIVE_NAME}: {e}");
            return Ok(plain(StatusCode::BAD_GATEWAY, e.user_message()));
        }
    };

    let failed: Vec<String> = bundle.failures().map(|o| o.index.to_string()).collect();
    let mut response = attachment(bundle.archive, "application/zip", ARCHIVE_NAME);
    if !failed.is_empty() {
        state.events.emit(UiEvent::Notice {
            message: format!("{} thumbnail(s) could not be downloaded", failed.len()),
        });
        if let Ok(value) = HeaderValue::from_str(&failed.join(",")) {
            response.headers_mut().insert(FAILURES_HEADER, value);
        }
    }
    Ok(response)
}

async fn thumbnail_handler(index: usize, state: Arc<AppState>) -> Result<Response, Infallible> {
    let set = state.controller.thumbnails();
    let Some(reference) = set.get(index) else {
        return Ok(plain(StatusCode::NOT_FOUND, "No such thumbnail"));
    };

    match state.images.fetch(reference).await {
        Ok(data) => {
            let mime = match reference {
                ThumbnailRef::Inline { mime, .. } => mime.as_str(),
                ThumbnailRef::Remote(_) => "image/png",
            };
            Ok(attachment(data.to_vec(), mime, &download_name(index)))
        }
        Err(e) => {
            error!("Failed to fetch thumbnail {index}: {e}");
            Ok(plain(StatusCode::BAD_GATEWAY, "Error downloading thumbnail!"))
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    warp::reply::with_status(message, status).into_response()
}

fn attachment(body: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    let mut response = Response::new(body.into());
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
