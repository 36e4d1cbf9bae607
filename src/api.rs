//! JSON endpoints used by the development overlay.
//!
//! | endpoint                   | body               | reply                   |
//! |----------------------------|--------------------|-------------------------|
//! | `/api/get-content-tree`    | -                  | [`TreeNode`]            |
//! | `/api/get-content-list`    | -                  | sorted output URIs      |
//! | `/api/read-content-file`   | `{uri}`            | input file, plain text  |
//! | `/api/write-content-file`  | `{uri, content}`   | `{"success": bool}`     |
//!
//! `uri` is always an output URI (a trailing `/` means its `index.html`); only
//! files known to the [`ContentMap`] can be read or written.

use crate::{
    content::{classify::is_ignored_dir, content_map::ContentMap, uri::maybe_append_index_html},
    log,
    site::Site,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{cmp::Reverse, fs, path::Path};
use thiserror::Error;

pub const API_PREFIX: &str = "/api/";

/// Per-directory settings of the content tree.
pub const DIR_SETTINGS_FILE: &str = "_dir.toml";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown endpoint `{0}`")]
    UnknownEndpoint(String),

    #[error("no content file serves `{0}`")]
    UnknownUri(String),

    #[error("invalid request body")]
    BadRequest(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiReply {
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Dir {
        name: String,
        attrs: DirAttrs,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirAttrs {
    pub hide_children: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirSettings {
    #[serde(default)]
    hide_children: bool,
    #[serde(default)]
    sort: SortOrder,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
enum SortOrder {
    #[default]
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "name-desc")]
    NameDesc,
}

#[derive(Debug, Deserialize)]
struct ReadRequest {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct WriteRequest {
    uri: String,
    content: String,
}

/// Dispatch one API call. `path` is the request path including [`API_PREFIX`].
pub fn handle(site: &Site, map: &ContentMap, path: &str, body: &str) -> Result<ApiReply> {
    let endpoint = path.strip_prefix(API_PREFIX).unwrap_or(path);
    match endpoint {
        "get-content-tree" => Ok(ApiReply::Json(serde_json::to_value(content_tree(site)?)?)),
        "get-content-list" => Ok(ApiReply::Json(json!(content_list(map)))),
        "read-content-file" => {
            let request: ReadRequest = serde_json::from_str(body).map_err(ApiError::from)?;
            Ok(ApiReply::Text(read_content_file(site, map, &request.uri)?))
        }
        "write-content-file" => {
            let request: WriteRequest = serde_json::from_str(body).map_err(ApiError::from)?;
            match write_content_file(site, map, &request.uri, &request.content) {
                Ok(()) => Ok(ApiReply::Json(json!({ "success": true }))),
                Err(err) if err.downcast_ref::<ApiError>().is_some() => Err(err),
                Err(err) => {
                    log!("error"; "{:#}", err);
                    Ok(ApiReply::Json(json!({ "success": false, "error": format!("{err:#}") })))
                }
            }
        }
        _ => Err(ApiError::UnknownEndpoint(path.to_owned()).into()),
    }
}

/// Tree of the content directory.
pub fn content_tree(site: &Site) -> Result<TreeNode> {
    let root = &site.config.build.content;
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir_node(root, name, &site.config.build.ignore)
}

fn dir_node(dir: &Path, name: String, deny: &[String]) -> Result<TreeNode> {
    let settings = read_dir_settings(dir)?;

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory `{}`", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    match settings.sort {
        SortOrder::Name => entries.sort_by_key(|entry| entry.file_name()),
        SortOrder::NameDesc => entries.sort_by_key(|entry| Reverse(entry.file_name())),
    }

    let mut children = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            if !is_ignored_dir(&name, deny) {
                children.push(dir_node(&entry.path(), name, deny)?);
            }
        } else if name != DIR_SETTINGS_FILE {
            children.push(TreeNode::File { name });
        }
    }

    Ok(TreeNode::Dir {
        name,
        attrs: DirAttrs {
            hide_children: settings.hide_children,
        },
        children,
    })
}

fn read_dir_settings(dir: &Path) -> Result<DirSettings> {
    let path = dir.join(DIR_SETTINGS_FILE);
    if !path.is_file() {
        return Ok(DirSettings::default());
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).with_context(|| format!("invalid `{}`", path.display()))
}

/// Every output URI, sorted.
pub fn content_list(map: &ContentMap) -> Vec<&str> {
    map.output_uris().collect()
}

pub fn read_content_file(site: &Site, map: &ContentMap, output_uri: &str) -> Result<String> {
    let output_uri = maybe_append_index_html(output_uri);
    let input_uri = map
        .get(&output_uri)
        .ok_or_else(|| ApiError::UnknownUri(output_uri.to_owned()))?;
    let path = site.input_file(input_uri);
    fs::read_to_string(&path).with_context(|| format!("failed to read `{}`", path.display()))
}

pub fn write_content_file(
    site: &Site,
    map: &ContentMap,
    output_uri: &str,
    content: &str,
) -> Result<()> {
    let output_uri = maybe_append_index_html(output_uri);
    let input_uri = map
        .get(&output_uri)
        .ok_or_else(|| ApiError::UnknownUri(output_uri.to_owned()))?;
    let path = site.input_file(input_uri);
    fs::write(&path, content).with_context(|| format!("failed to write `{}`", path.display()))
}
