//! Output URI to input URI index of the whole site.

use super::{page::expand, walk::select_content};
use crate::{log, site::Site};
use anyhow::Result;
use std::collections::BTreeMap;

/// Owned by the driver that builds it; rebuilt explicitly on invalidation.
#[derive(Debug, Default, Clone)]
pub struct ContentMap {
    entries: BTreeMap<String, String>,
    pattern: Option<String>,
}

impl ContentMap {
    /// Walk and expand every renderable input matching `pattern`.
    pub fn populate(site: &Site, pattern: Option<&str>) -> Result<Self> {
        let mut map = Self {
            entries: BTreeMap::new(),
            pattern: pattern.map(str::to_owned),
        };
        map.rebuild(site)?;
        Ok(map)
    }

    /// Re-derive the map from disk. On error the previous entries are kept.
    pub fn rebuild(&mut self, site: &Site) -> Result<()> {
        let mut fresh = Self {
            entries: BTreeMap::new(),
            pattern: self.pattern.clone(),
        };

        for file in select_content(&site.config, self.pattern.as_deref())? {
            let input_uri = site.input_uri(&file)?;
            if !site.classify(&input_uri).is_renderable() {
                continue;
            }
            for page in expand(site, &file)? {
                let page = page?;
                log!(verbose "content"; "adding {}", page.output_uri);
                fresh.insert(page.output_uri, page.input_uri);
            }
        }

        *self = fresh;
        Ok(())
    }

    /// Last writer wins; a collision is reported.
    pub fn insert(&mut self, output_uri: String, input_uri: String) {
        if let Some(previous) = self.entries.get(&output_uri)
            && *previous != input_uri
        {
            log!("warn"; "{} is produced by both {} and {}", output_uri, previous, input_uri);
        }
        self.entries.insert(output_uri, input_uri);
    }

    pub fn get(&self, output_uri: &str) -> Option<&str> {
        self.entries.get(output_uri).map(String::as_str)
    }

    /// Sorted output URIs.
    pub fn output_uris(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
