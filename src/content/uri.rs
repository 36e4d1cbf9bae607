//! Input URI to output URI mapping.
//!
//! | input                    | sidecar slug | output                   |
//! |--------------------------|--------------|--------------------------|
//! | `notes/foo/foo.md`       | -            | `/notes/foo/index.html`  |
//! | `notes/bar.md`           | -            | `/notes/bar.html`        |
//! | `notes/foo/foo.md`       | `renamed`    | `/notes/renamed/index.html` |
//! | `notes/foo/diagram.png`  | `renamed`    | `/notes/renamed/diagram.png` |
//! | `decks/spanish.cards.json` | -          | `/decks/spanish.html`    |

use super::classify::DATA_CARD_SUFFIX;
use super::sidecar::SidecarMeta;
use std::path::{Component, Path};

/// Compute the base output URI of an input URI.
///
/// `transform` runs first on the URI without its leading `/`; the sidecar
/// slug, when present, replaces the parent directory name.
pub fn to_output_uri(
    input_uri: &str,
    meta: Option<&SidecarMeta>,
    transform: &dyn Fn(&str) -> String,
) -> String {
    let transformed = transform(input_uri.trim_start_matches('/'));
    let mut uri = format!("/{}", transformed.trim_start_matches('/'));
    if let Some(stem) = uri.strip_suffix(DATA_CARD_SUFFIX) {
        uri = format!("{stem}.html");
    }

    let (dir, file_name) = split_last(&uri);
    let (path_part, parent_dirname) = split_last(dir);
    let rel_part = meta
        .and_then(|meta| meta.slug.as_deref())
        .filter(|slug| !slug.is_empty())
        .unwrap_or(parent_dirname);

    let (stem, ext) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot + 1..]),
        _ => (file_name, ""),
    };

    if ext != "html" && ext != "md" {
        join_uri(&[path_part, rel_part, file_name])
    } else if stem == parent_dirname {
        join_uri(&[path_part, rel_part, "index.html"])
    } else {
        join_uri(&[path_part, rel_part, &format!("{stem}.html")])
    }
}

/// Output URI of one fan-out page: `<dir of base>/<slug>/index.html`.
pub fn fan_out_uri(base_output_uri: &str, slug: &str) -> String {
    let (dir, _) = split_last(base_output_uri);
    join_uri(&[dir, slug, "index.html"])
}

/// Request paths ending in `/` address the directory's `index.html`.
pub fn maybe_append_index_html(uri: &str) -> String {
    if uri.ends_with('/') {
        format!("{uri}index.html")
    } else {
        uri.to_owned()
    }
}

/// Input URI of `file` relative to `content_dir`, with a leading `/`.
pub fn input_uri_of(content_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(content_dir).ok()?;
    let mut uri = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                uri.push('/');
                uri.push_str(&name.to_string_lossy());
            }
            _ => return None,
        }
    }
    (!uri.is_empty()).then_some(uri)
}

/// Split `/a/b/c` into (`/a/b`, `c`).
fn split_last(uri: &str) -> (&str, &str) {
    match uri.rfind('/') {
        Some(idx) => (&uri[..idx], &uri[idx + 1..]),
        None => ("", uri),
    }
}

/// Join URI parts, normalizing empty, `.` and `..` segments.
fn join_uri(parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in parts.iter().flat_map(|part| part.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}
