//! Thumbnail references returned by the generation service.
//!
//! The service answers with opaque strings. Each one is either something we
//! can GET or a `data:` URL carrying the image itself.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailRef {
    Remote(Url),
    Inline {
        mime: String,
        data: Bytes,
        raw: String,
    },
}

impl ThumbnailRef {
    /// Parses one reference. Relative references resolve against `base`.
    pub fn parse(raw: &str, base: &Url) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidReference(raw.to_string()));
        }

        if let Some(rest) = raw.strip_prefix("data:") {
            return parse_data_url(raw, rest);
        }

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base
                .join(raw)
                .map_err(|_| AppError::InvalidReference(raw.to_string()))?,
            Err(_) => return Err(AppError::InvalidReference(raw.to_string())),
        };

        match url.scheme() {
            "http" | "https" => Ok(ThumbnailRef::Remote(url)),
            _ => Err(AppError::InvalidReference(raw.to_string())),
        }
    }

    /// The string handed to the clipboard and used as the image source.
    pub fn as_str(&self) -> &str {
        match self {
            ThumbnailRef::Remote(url) => url.as_str(),
            ThumbnailRef::Inline { raw, .. } => raw,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ThumbnailRef::Inline { .. })
    }
}

impl fmt::Display for ThumbnailRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailRef::Remote(url) => write!(f, "{url}"),
            ThumbnailRef::Inline { mime, data, .. } => {
                write!(f, "inline {mime} ({} bytes)", data.len())
            }
        }
    }
}

fn parse_data_url(raw: &str, rest: &str) -> Result<ThumbnailRef, AppError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::InvalidReference(raw.to_string()))?;

    let (mime, is_base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let mime = match mime.split(';').next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "text/plain".to_string(),
    };

    // Non-base64 payloads are kept as their literal bytes.
    let data = if is_base64 {
        Bytes::from(STANDARD.decode(payload.trim())?)
    } else {
        Bytes::copy_from_slice(payload.as_bytes())
    };

    Ok(ThumbnailRef::Inline {
        mime,
        data,
        raw: raw.to_string(),
    })
}

/// Ordered result of one successful submission. Position is the only identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailSet {
    refs: Vec<ThumbnailRef>,
}

impl ThumbnailSet {
    pub fn new(refs: Vec<ThumbnailRef>) -> Self {
        Self { refs }
    }

    /// Parses every reference; one bad entry rejects the whole response.
    pub fn parse_all<S: AsRef<str>>(raw: &[S], base: &Url) -> Result<Self, AppError> {
        raw.iter()
            .map(|r| ThumbnailRef::parse(r.as_ref(), base))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Looks up a reference by its 1-based position.
    pub fn get(&self, index: usize) -> Option<&ThumbnailRef> {
        index.checked_sub(1).and_then(|i| self.refs.get(i))
    }

    /// Yields `(1-based index, reference)` pairs in list order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ThumbnailRef)> {
        self.refs.iter().enumerate().map(|(i, r)| (i + 1, r))
    }
}

/// File name used for the `index`th (1-based) thumbnail, on its own or inside the archive.
pub fn download_name(index: usize) -> String {
    format!("thumbnail_{index}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:5000/api/generate-thumbnails").unwrap()
    }

    #[test]
    fn relative_references_resolve_against_the_endpoint() {
        let r = ThumbnailRef::parse("a.png", &base()).unwrap();
        assert_eq!(r.as_str(), "http://localhost:5000/api/a.png");

        let r = ThumbnailRef::parse("/static/b.png", &base()).unwrap();
        assert_eq!(r.as_str(), "http://localhost:5000/static/b.png");
    }

    #[test]
    fn absolute_references_are_kept() {
        let r = ThumbnailRef::parse("https://cdn.example/x.png", &base()).unwrap();
        assert_eq!(r, ThumbnailRef::Remote(Url::parse("https://cdn.example/x.png").unwrap()));
    }

    #[test]
    fn base64_data_urls_are_decoded() {
        let raw = "data:image/png;base64,iVBORw0KGgo=";
        let r = ThumbnailRef::parse(raw, &base()).unwrap();
        match &r {
            ThumbnailRef::Inline { mime, data, .. } => {
                assert_eq!(mime, "image/png");
                assert_eq!(&data[..], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
            }
            other => panic!("expected inline, got {other:?}"),
        }
        assert_eq!(r.as_str(), raw);
    }

    #[test]
    fn plain_data_urls_keep_literal_bytes() {
        let r = ThumbnailRef::parse("data:,hello", &base()).unwrap();
        match r {
            ThumbnailRef::Inline { mime, data, .. } => {
                assert_eq!(mime, "text/plain");
                assert_eq!(&data[..], b"hello");
            }
            other => panic!("expected inline, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unusable_references() {
        assert!(ThumbnailRef::parse("", &base()).is_err());
        assert!(ThumbnailRef::parse("data:image/png;base64", &base()).is_err());
        assert!(ThumbnailRef::parse("data:image/png;base64,@@@", &base()).is_err());
        assert!(ThumbnailRef::parse("ftp://host/a.png", &base()).is_err());
    }

    #[test]
    fn one_bad_reference_rejects_the_set() {
        let err = ThumbnailSet::parse_all(&["a.png", "ftp://nope"], &base()).unwrap_err();
        assert!(matches!(err, AppError::InvalidReference(_)));
    }

    #[test]
    fn positions_are_one_based() {
        let set = ThumbnailSet::parse_all(&["a.png", "b.png"], &base()).unwrap();
        assert!(set.get(0).is_none());
        assert!(set.get(2).unwrap().as_str().ends_with("b.png"));
        assert!(set.get(3).is_none());
        let indices: Vec<usize> = set.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(download_name(2), "thumbnail_2.png");
    }
}
