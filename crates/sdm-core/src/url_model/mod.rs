//! URL validation and display-name derivation.
//!
//! A transfer's display name is fixed at creation from the last URL path
//! segment and doubles as the name the blob store saves it under.

mod path;
mod sanitize;

pub use path::last_path_segment;
pub use sanitize::sanitize_file_name;

/// Name used when the URL path yields nothing usable.
pub const DEFAULT_NAME: &str = "download.bin";

/// Checks that `url` is an absolute `http`/`https` URL.
pub fn validate(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}

/// Derives the display name for a transfer of `url`.
///
/// - `display_name("https://example.com/archive.zip")` → `"archive.zip"`
/// - `display_name("https://example.com/")` → `"download.bin"`
pub fn display_name(url: &str) -> String {
    last_path_segment(url)
        .map(|segment| sanitize_file_name(&segment))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_NAME.to_string())
}
