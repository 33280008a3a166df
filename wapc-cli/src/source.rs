//! Schema source acquisition from disk or HTTP.

use crate::error::SourceError;
use std::path::Path;

/// Whether a location should be fetched over the network.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Read a schema from a local path or an `http(s)://` URL.
///
/// Remote reads are a single blocking GET with no caching.
pub fn read_source(location: &str) -> Result<String, SourceError> {
    if is_remote(location) {
        fetch(location)
    } else {
        read_file(Path::new(location))
    }
}

/// Read a local file as UTF-8 text.
pub fn read_file(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn fetch(url: &str) -> Result<String, SourceError> {
    tracing::debug!(url, "fetching remote schema");

    let http_err = |e: reqwest::Error| SourceError::Http {
        url: url.to_string(),
        source: e,
    };

    let response = reqwest::blocking::get(url).map_err(http_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().map_err(http_err)
}
