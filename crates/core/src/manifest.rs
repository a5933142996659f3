//! Asset manifest: the paths that must be present in a generation once
//! install completes.

use crate::Error;
use serde::{Deserialize, Serialize};

/// Assets precached by default, in install order.
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/style.css",
    "/script.js",
    "assets/logos/mcap-logo.png",
    "assets/logos/jupiter.png",
];

/// Ordered, de-duplicated list of asset paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AssetManifest {
    paths: Vec<String>,
}

impl AssetManifest {
    /// Build a manifest, trimming each path and dropping repeats.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any path is empty after trimming.
    pub fn new<I, S>(paths: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                return Err(Error::InvalidInput("manifest path cannot be empty".into()));
            }
            if !out.iter().any(|p| p == path) {
                out.push(path.to_string());
            }
        }
        Ok(Self { paths: out })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self { paths: DEFAULT_ASSETS.iter().map(|p| p.to_string()).collect() }
    }
}

impl TryFrom<Vec<String>> for AssetManifest {
    type Error = Error;

    fn try_from(paths: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(paths)
    }
}

impl From<AssetManifest> for Vec<String> {
    fn from(manifest: AssetManifest) -> Self {
        manifest.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = AssetManifest::default();
        assert_eq!(manifest.len(), 6);
        assert_eq!(manifest.paths()[0], "/");
        assert_eq!(manifest.paths()[5], "assets/logos/jupiter.png");
    }

    #[test]
    fn test_dedup_preserves_order() {
        let manifest = AssetManifest::new(["/b", "/a", " /b ", "/c"]).unwrap();
        assert_eq!(manifest.paths(), ["/b", "/a", "/c"]);
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = AssetManifest::new(["/", "  "]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let manifest: AssetManifest = serde_json::from_str(r#"["/", "/index.html", "/"]"#).unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(serde_json::from_str::<AssetManifest>(r#"["/", ""]"#).is_err());
    }
}
