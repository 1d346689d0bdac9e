use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AppError;
use crate::form::Photo;

/// MIME type for an image file, judged by its extension.
pub fn image_mime_for(file_path: &Path) -> &'static str {
    let ext = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

pub fn read_photo(file_path: &Path) -> Result<Photo, AppError> {
    let data = fs::read(file_path)?;
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "photo".to_string());
    debug!("Read {} bytes from {}", data.len(), file_path.display());

    Ok(Photo::new(file_name, image_mime_for(file_path), data))
}

/// Writes `data` to `dir/name`, creating `dir` if needed.
pub fn save_file(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf, AppError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, data)?;
    Ok(path)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encodes `text` as a JavaScript string literal safe to drop into a `<script>` block.
pub fn js_string(text: &str) -> String {
    serde_json::to_string(text)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(image_mime_for(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(image_mime_for(Path::new("a/b.webp")), "image/webp");
        assert_eq!(image_mime_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn js_strings_cannot_close_the_script() {
        assert_eq!(js_string("</script>"), r#""<\/script>""#);
    }

    #[test]
    fn reads_and_saves_files() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_file(&dir.path().join("out"), "photo.png", b"png").unwrap();

        let photo = read_photo(&saved).unwrap();
        assert_eq!(photo.file_name, "photo.png");
        assert_eq!(photo.mime, "image/png");
        assert_eq!(&photo.data[..], b"png");
    }
}
