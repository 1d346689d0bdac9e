use std::fmt::Write as _;

use crate::archive::ARCHIVE_NAME;
use crate::thumbnail::{download_name, ThumbnailSet};
use crate::utils::escape_html;

pub const COPIED_NOTICE: &str = "Link copied to clipboard!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub index: usize,
    pub reference: String,
    pub download_name: String,
    /// Local route serving this image as an attachment.
    pub download_href: String,
}

pub fn cards(set: &ThumbnailSet) -> Vec<Card> {
    set.iter()
        .map(|(index, reference)| Card {
            index,
            reference: reference.as_str().to_string(),
            download_name: download_name(index),
            download_href: format!("/thumbnails/{index}"),
        })
        .collect()
}

/// Gallery markup for the page. Empty for an empty set.
pub fn render_html(set: &ThumbnailSet) -> String {
    if set.is_empty() {
        return String::new();
    }

    let mut html = String::from(
        "<section class=\"results\">\n<h2>Your Thumbnails</h2>\n<div class=\"grid\">\n",
    );
    for card in cards(set) {
        let reference = escape_html(&card.reference);
        let _ = writeln!(
            html,
            "<figure class=\"card\">\
<img src=\"{reference}\" alt=\"Thumbnail {index}\">\
<figcaption>\
<a class=\"download\" href=\"{href}\" download=\"{name}\">Download</a>\
<button type=\"button\" class=\"copy\" data-ref=\"{reference}\">Copy Link</button>\
</figcaption></figure>",
            index = card.index,
            href = card.download_href,
            name = card.download_name,
        );
    }
    let _ = write!(
        html,
        "</div>\n<a class=\"zip\" href=\"/{ARCHIVE_NAME}\" download=\"{ARCHIVE_NAME}\">Download All as ZIP</a>\n</section>\n"
    );
    html
}

/// Plain listing for the terminal.
pub fn render_text(set: &ThumbnailSet) -> String {
    let mut out = String::new();
    for (index, reference) in set.iter() {
        let _ = writeln!(out, "{:<18} {reference}", download_name(index));
    }
    out
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn set(refs: &[&str]) -> ThumbnailSet {
        ThumbnailSet::parse_all(refs, &Url::parse("http://localhost:5000/api/x").unwrap()).unwrap()
    }

    #[test]
    fn one_card_per_reference() {
        let cards = cards(&set(&["a.png", "b.png"]));
        let names: Vec<&str> = cards.iter().map(|c| c.download_name.as_str()).collect();
        assert_eq!(names, vec!["thumbnail_1.png", "thumbnail_2.png"]);
        assert_eq!(cards[1].reference, "http://localhost:5000/api/b.png");
        assert_eq!(cards[1].download_href, "/thumbnails/2");
    }

    #[test]
    fn empty_set_renders_nothing() {
        assert_eq!(render_html(&ThumbnailSet::default()), "");
        assert_eq!(render_text(&ThumbnailSet::default()), "");
    }

    #[test]
    fn html_has_download_and_copy_per_card() {
        let html = render_html(&set(&["a.png", "b.png", "c.png"]));
        assert_eq!(html.matches("class=\"card\"").count(), 3);
        assert!(html.contains("download=\"thumbnail_3.png\""));
        assert!(html.contains("data-ref=\"http://localhost:5000/api/a.png\""));
        assert!(html.contains("href=\"/thumbnails.zip\""));
    }

    #[test]
    fn references_are_escaped() {
        let html = render_html(&set(&["https://cdn.example/a.png?x=1&y=\"2\""]));
        assert!(html.contains("x=1&amp;y=%222%22"));
    }

    #[test]
    fn text_lists_names_and_references() {
        let text = render_text(&set(&["a.png", "data:image/png;base64,aGk="]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("thumbnail_1.png"));
        assert!(lines[1].ends_with("inline image/png (2 bytes)"));
    }
}
