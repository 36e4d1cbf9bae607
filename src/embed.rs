//! Files compiled into the binary.

/// Built-in templates, addressable by name from layouts and pages.
pub const TEMPLATES: &[(&str, &str)] = &[
    ("default.html", include_str!("embed/layouts/default.html")),
    ("flashcards.html", include_str!("embed/apps/flashcards.html")),
    ("overlay.html", include_str!("embed/partials/overlay.html")),
];

/// URL prefix of built-in static resources.
pub const RESOURCE_PREFIX: &str = "/__/";

/// Built-in static resources, served and emitted under [`RESOURCE_PREFIX`].
pub const RESOURCES: &[(&str, &[u8])] = &[
    ("overlay.css", include_bytes!("embed/static/overlay.css")),
    ("overlay.js", include_bytes!("embed/static/overlay.js")),
];

pub fn template(name: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, source)| *source)
}

/// Resource for a request path such as `/__/overlay.js`.
pub fn resource(uri: &str) -> Option<&'static [u8]> {
    let name = uri.strip_prefix(RESOURCE_PREFIX)?;
    RESOURCES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, bytes)| *bytes)
}
