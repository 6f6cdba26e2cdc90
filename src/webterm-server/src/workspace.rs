//! Mapping a client's workspace root URI to a working directory.

use std::path::PathBuf;

use tracing::debug;
use url::Url;

/// Working directory for a terminal opened on the workspace root `uri`.
///
/// Only `file:` URIs naming an existing directory are honoured; anything
/// else yields `None` and the server falls back to its configured default.
pub fn working_dir_for(uri: Option<&str>) -> Option<PathBuf> {
    let uri = uri?.trim();
    if uri.is_empty() {
        return None;
    }

    let path = match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok()?,
        Ok(url) => {
            debug!(scheme = %url.scheme(), "Ignoring non-file workspace root");
            return None;
        }
        Err(e) => {
            debug!(uri = %uri, error = %e, "Ignoring unparsable workspace root");
            return None;
        }
    };

    if path.is_dir() {
        Some(path)
    } else {
        debug!(path = %path.display(), "Workspace root is not a directory");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Url::from_directory_path(dir.path()).unwrap();
        assert_eq!(
            working_dir_for(Some(uri.as_str())).map(|p| p.canonicalize().unwrap()),
            Some(dir.path().canonicalize().unwrap())
        );
    }

    #[test]
    fn test_missing_or_unusable() {
        assert_eq!(working_dir_for(None), None);
        assert_eq!(working_dir_for(Some("")), None);
        assert_eq!(working_dir_for(Some("not a uri")), None);
        assert_eq!(working_dir_for(Some("https://example.com/project")), None);
        assert_eq!(
            working_dir_for(Some("file:///definitely/not/here/at/all")),
            None
        );
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let uri = Url::from_file_path(file.path()).unwrap();
        assert_eq!(working_dir_for(Some(uri.as_str())), None);
    }
}
