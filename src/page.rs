//! The single page served at `/`.

use std::fmt::Write as _;

use crate::form::{FormFields, Placement, RequestState};
use crate::gallery::{self, COPIED_NOTICE};
use crate::thumbnail::ThumbnailSet;
use crate::utils::{escape_html, js_string};

pub struct PageView<'a> {
    pub fields: &'a FormFields,
    pub state: RequestState,
    pub thumbnails: &'a ThumbnailSet,
    pub notice: Option<String>,
}

const STYLE: &str = "body{font-family:sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem}\
form{display:grid;gap:.75rem;max-width:32rem}\
label{display:grid;gap:.25rem;font-weight:600}\
.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(16rem,1fr));gap:1rem}\
.card img{width:100%;aspect-ratio:16/9;object-fit:cover}\
.card figcaption{display:flex;gap:.5rem}";

const SCRIPT: &str = r#"
document.querySelectorAll("button.copy").forEach(function (b) {
  b.addEventListener("click", function () {
    navigator.clipboard.writeText(b.dataset.ref);
    alert(COPIED);
  });
});
(function () {
  var last = RENDERED_STATE;
  var ws = new WebSocket((location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/ws");
  ws.onmessage = function (m) {
    var e = JSON.parse(m.data);
    if (e.type === "state_changed") {
      if (last === "in_flight" && e.state !== "in_flight") {
        location.reload();
      }
      last = e.state;
    } else if (e.type === "notice") {
      alert(e.message);
    }
  };
})();
"#;

pub fn render(view: PageView<'_>) -> String {
    let busy = view.state == RequestState::InFlight;
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>Thumbnail Generator</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
<h1>Thumbnail Generator</h1>\n"
    );

    html.push_str("<form method=\"post\" action=\"/submit\" enctype=\"multipart/form-data\">\n");
    html.push_str(
        "<label>Upload Photo<input type=\"file\" name=\"photo\" accept=\"image/*\"></label>\n",
    );
    text_input(&mut html, "Video Type", "videoType", &view.fields.video_type, "e.g., Gaming, Vlog, Tutorial");
    text_input(&mut html, "Style", "style", &view.fields.style, "e.g., Flashy, Minimal, Professional");
    text_input(&mut html, "Mood", "mood", &view.fields.mood, "e.g., Exciting, Funny, Serious");
    placement_select(&mut html, view.fields.placement);

    let _ = writeln!(
        html,
        "<button type=\"submit\"{}>{}</button>\n</form>",
        if busy { " disabled" } else { "" },
        if busy { "Generating..." } else { "Generate Thumbnails" }
    );

    if view.state == RequestState::Succeeded {
        html.push_str(&gallery::render_html(view.thumbnails));
    }

    let _ = write!(
        html,
        "<script>\nvar COPIED = {};\nvar RENDERED_STATE = {};\n{SCRIPT}",
        js_string(COPIED_NOTICE),
        js_string(view.state.as_str())
    );
    if let Some(notice) = &view.notice {
        let _ = writeln!(html, "alert({});", js_string(notice));
    }
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

fn text_input(html: &mut String, label: &str, name: &str, value: &str, placeholder: &str) {
    let _ = writeln!(
        html,
        "<label>{label}<input type=\"text\" name=\"{name}\" value=\"{}\" placeholder=\"{placeholder}\"></label>",
        escape_html(value)
    );
}

fn placement_select(html: &mut String, current: Placement) {
    html.push_str("<label>Image Placement<select name=\"placement\">");
    for placement in Placement::ALL {
        let _ = write!(
            html,
            "<option value=\"{placement}\"{}>{}</option>",
            if placement == current { " selected" } else { "" },
            match placement {
                Placement::Left => "Left",
                Placement::Center => "Center",
                Placement::Right => "Right",
            }
        );
    }
    html.push_str("</select></label>\n");
}
