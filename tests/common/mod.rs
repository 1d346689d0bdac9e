#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use futures::TryStreamExt;
use parking_lot::Mutex;
use url::Url;
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::Filter;

use thumbgen_lib::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl RecordedPart {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Stand-in for the external generation service.
pub struct MockService {
    pub addr: SocketAddr,
    calls: Arc<Mutex<Vec<Vec<RecordedPart>>>>,
}

impl MockService {
    pub fn endpoint(&self) -> Url {
        Url::parse(&format!("http://{}/api/generate-thumbnails", self.addr)).unwrap()
    }

    pub fn config(&self) -> Config {
        Config::with_endpoint(self.endpoint())
    }

    pub fn calls(&self) -> Vec<Vec<RecordedPart>> {
        self.calls.lock().clone()
    }
}

/// Answers every POST with `status` and `{"thumbnails": [...]}`. `GET /api/<name>`
/// serves `<name>-bytes`, except names starting with `missing` which 404.
pub async fn spawn_mock(thumbnails: Vec<&'static str>, status: StatusCode) -> MockService {
    let calls: Arc<Mutex<Vec<Vec<RecordedPart>>>> = Arc::default();

    let generate = {
        let calls = calls.clone();
        warp::path!("api" / "generate-thumbnails")
            .and(warp::post())
            .and(warp::multipart::form())
            .and_then(move |form: FormData| {
                let calls = calls.clone();
                let thumbnails = thumbnails.clone();
                async move {
                    let parts = read_parts(form).await;
                    calls.lock().push(parts);
                    let body = warp::reply::json(&serde_json::json!({ "thumbnails": thumbnails }));
                    Ok::<_, warp::Rejection>(warp::reply::with_status(body, status))
                }
            })
    };

    let images = warp::path!("api" / String)
        .and(warp::get())
        .map(|name: String| {
            if name.starts_with("missing") {
                warp::reply::with_status(Vec::new(), StatusCode::NOT_FOUND)
            } else {
                warp::reply::with_status(format!("{name}-bytes").into_bytes(), StatusCode::OK)
            }
        });

    let (addr, server) = warp::serve(generate.or(images)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    MockService { addr, calls }
}

/// Accepts every request and never answers.
pub async fn spawn_silent() -> MockService {
    let hang = warp::any().then(|| std::future::pending::<&'static str>());
    let (addr, server) = warp::serve(hang).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    MockService {
        addr,
        calls: Arc::default(),
    }
}

async fn read_parts(form: FormData) -> Vec<RecordedPart> {
    let mut form = std::pin::pin!(form);
    let mut recorded = Vec::new();
    while let Ok(Some(part)) = form.try_next().await {
        let name = part.name().to_string();
        let filename = part.filename().map(str::to_string);
        let content_type = part.content_type().map(str::to_string);
        let data = part
            .stream()
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.put(chunk);
                Ok(acc)
            })
            .await
            .unwrap_or_default();
        recorded.push(RecordedPart {
            name,
            filename,
            content_type,
            data: data.to_vec(),
        });
    }
    recorded
}

pub const BOUNDARY: &str = "thumbgen-test-boundary";

/// Builds a multipart body. `file` is `(filename, content type)` for file parts.
pub fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((filename, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
Content-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
