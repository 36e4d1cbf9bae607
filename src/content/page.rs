//! Page expansion: one input file to zero or more pages.
//!
//! Without a slug mapping a file yields exactly one page at its base output
//! URI. With one, it yields one page per entry, in order, each at
//! `<dir of base>/<slug>/index.html`; an empty mapping yields nothing.

use super::{
    sidecar::{RouteParams, Sidecar, SlugEntry, TemplateVariables},
    uri,
};
use crate::{log, site::Site};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    vec,
};

/// One output artifact of an input file.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub input_file: PathBuf,
    pub input_uri: String,
    pub output_uri: String,
    #[serde(skip)]
    pub sidecar: Arc<Sidecar>,
    /// Template variables of this fan-out instance.
    pub parameters: TemplateVariables,
}

/// Lazy, single-use page sequence returned by [`expand`].
///
/// Template variables are computed as each page is pulled.
#[derive(Debug)]
pub struct Pages {
    input_file: PathBuf,
    input_uri: String,
    base_output_uri: String,
    sidecar: Arc<Sidecar>,
    plan: Plan,
}

#[derive(Debug)]
enum Plan {
    Single { done: bool },
    FanOut(vec::IntoIter<SlugEntry>),
}

/// Start expanding `input_file`.
///
/// Loads the sidecar, computes the base output URI and, when present,
/// evaluates the slug mapping. Failures here abort the file.
pub fn expand(site: &Site, input_file: &Path) -> Result<Pages> {
    let input_uri = site.input_uri(input_file)?;
    let sidecar = site.sidecars.load(input_file)?;
    if !sidecar.is_empty() {
        log!(verbose "sidecar"; "{}", input_uri);
    }

    let meta = sidecar
        .meta()
        .with_context(|| format!("sidecar metadata failed for {input_uri}"))?;
    let base_output_uri =
        uri::to_output_uri(&input_uri, meta.as_ref(), site.hooks.transform_uri.as_ref());

    let plan = match sidecar
        .slug_mapping()
        .with_context(|| format!("sidecar slug mapping failed for {input_uri}"))?
    {
        Some(entries) => Plan::FanOut(entries.into_iter()),
        None => Plan::Single { done: false },
    };

    Ok(Pages {
        input_file: input_file.to_path_buf(),
        input_uri,
        base_output_uri,
        sidecar: Arc::new(sidecar),
        plan,
    })
}

impl Pages {
    fn page(&self, output_uri: String, params: &RouteParams) -> Result<Page> {
        let parameters = self
            .sidecar
            .template_variables(params)
            .with_context(|| format!("sidecar template variables failed for {output_uri}"))?;

        Ok(Page {
            input_file: self.input_file.clone(),
            input_uri: self.input_uri.clone(),
            output_uri,
            sidecar: Arc::clone(&self.sidecar),
            parameters,
        })
    }
}

impl Iterator for Pages {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        let (output_uri, params) = match &mut self.plan {
            Plan::Single { done: true } => return None,
            Plan::Single { done } => {
                *done = true;
                (self.base_output_uri.clone(), RouteParams::default())
            }
            Plan::FanOut(entries) => {
                let entry = entries.next()?;
                let output_uri = uri::fan_out_uri(&self.base_output_uri, &entry.slug);
                (output_uri, RouteParams::from(&entry))
            }
        };
        Some(self.page(output_uri, &params))
    }
}
