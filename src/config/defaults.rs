//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

pub mod base {
    pub fn title() -> String {
        "Website".into()
    }

    pub fn author() -> String {
        "<YOUR_NAME>".into()
    }

    pub fn language() -> String {
        "en".into()
    }
}

pub mod build {
    use std::path::PathBuf;

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn layouts() -> PathBuf {
        "layouts".into()
    }

    pub fn partials() -> PathBuf {
        "partials".into()
    }

    pub fn r#static() -> PathBuf {
        "static".into()
    }

    pub fn output() -> PathBuf {
        "build".into()
    }

    pub fn default_layout() -> String {
        "default.html".into()
    }

    pub fn ignore() -> Vec<String> {
        [".git", ".obsidian", "node_modules"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3005
    }
}
