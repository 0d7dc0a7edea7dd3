//! Object URI parsing
//!
//! A logical path has the form `<scheme>://<bucket>/<pattern>`. The bucket
//! segment may be empty (`gs:///data/file.txt`), in which case the configured
//! default bucket is used.

use crate::error::{Result, VfsError};
use std::fmt;
use tracing::error;

/// Bucket and object pattern named by a logical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUri {
    pub scheme: String,
    pub bucket: String,
    pub pattern: String,
}

impl ObjectUri {
    /// Parse `path`, substituting `default_bucket` for an empty bucket segment
    ///
    /// # Examples
    /// ```
    /// use objfile::ObjectUri;
    ///
    /// let uri = ObjectUri::resolve("gs://data/samples/a.txt", "gs", None).unwrap();
    /// assert_eq!(uri.bucket, "data");
    /// assert_eq!(uri.pattern, "samples/a.txt");
    ///
    /// let uri = ObjectUri::resolve("gs:///samples/a.txt", "gs", Some("fallback")).unwrap();
    /// assert_eq!(uri.bucket, "fallback");
    /// ```
    pub fn resolve(path: &str, scheme: &str, default_bucket: Option<&str>) -> Result<Self> {
        let (bucket, pattern) = parse(path, scheme)?;

        let bucket = if bucket.is_empty() {
            match default_bucket {
                Some(default) if !default.is_empty() => default.to_string(),
                _ => {
                    error!("No bucket specified in {}, and no default bucket is set", path);
                    return Err(VfsError::MissingBucket(path.to_string()));
                }
            }
        } else {
            bucket.to_string()
        };

        Ok(ObjectUri {
            scheme: scheme.to_string(),
            bucket,
            pattern: pattern.to_string(),
        })
    }

    /// Whether the object part contains glob wildcards
    pub fn is_glob(&self) -> bool {
        crate::pattern::KeyPattern::is_glob(&self.pattern)
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.pattern)
    }
}

/// Split a path into raw bucket and pattern segments
fn parse<'a>(path: &'a str, scheme: &str) -> Result<(&'a str, &'a str)> {
    let rest = path
        .strip_prefix(scheme)
        .and_then(|r| r.strip_prefix("://"))
        .ok_or_else(|| {
            error!("Invalid URI, expected {}:// prefix: {}", scheme, path);
            VfsError::InvalidUri(path.to_string())
        })?;

    let (bucket, pattern) = rest.split_once('/').ok_or_else(|| {
        error!("Invalid URI, missing object name: {}", path);
        VfsError::InvalidUri(path.to_string())
    })?;

    if pattern.is_empty() {
        error!("Invalid URI, empty object name: {}", path);
        return Err(VfsError::InvalidUri(path.to_string()));
    }

    Ok((bucket, pattern))
}
