// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use tracing::{event, Level};

/// The transfer manifest: what to download and where it can be fetched from.
///
/// Resolved once from the CLI source (local path or HTTP(S) link), then fixed
/// for the lifetime of the transfer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferManifest {
    pub name: String,
    pub files: Vec<ManifestFile>,
    pub mirrors: Vec<Mirror>,
}

impl Default for TransferManifest {
    fn default() -> Self {
        Self {
            name: String::new(),
            files: Vec::new(),
            mirrors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ManifestFile {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Mirror {
    pub url: String,
}

impl TransferManifest {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug)]
pub enum ManifestError {
    Toml(toml::de::Error),
    Io(std::io::Error),
    Fetch(reqwest::Error),
    NoFiles,
    NoMirrors,
    UnsafePath(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ManifestError::Toml(e) => write!(f, "manifest parse error: {}", e),
            ManifestError::Io(e) => write!(f, "failed to read manifest: {}", e),
            ManifestError::Fetch(e) => write!(f, "failed to fetch manifest: {}", e),
            ManifestError::NoFiles => write!(f, "manifest lists no files"),
            ManifestError::NoMirrors => write!(f, "manifest lists no mirrors"),
            ManifestError::UnsafePath(p) => {
                write!(f, "manifest file path escapes the output directory: {}", p)
            }
        }
    }
}

impl std::error::Error for ManifestError {}

impl From<toml::de::Error> for ManifestError {
    fn from(e: toml::de::Error) -> Self {
        ManifestError::Toml(e)
    }
}

impl From<std::io::Error> for ManifestError {
    fn from(e: std::io::Error) -> Self {
        ManifestError::Io(e)
    }
}

impl From<reqwest::Error> for ManifestError {
    fn from(e: reqwest::Error) -> Self {
        ManifestError::Fetch(e)
    }
}

/// Resolves the transfer source to manifest text, then parses it.
pub async fn load(source: &str) -> Result<TransferManifest, ManifestError> {
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        reqwest::get(source)
            .await?
            .error_for_status()?
            .text()
            .await?
    } else {
        tokio::fs::read_to_string(source).await?
    };
    parse(&text)
}

/// Parses and validates manifest text.
///
/// Relative paths only; `..` components are rejected so files always land
/// under the output directory. Duplicate paths keep the first entry.
pub fn parse(text: &str) -> Result<TransferManifest, ManifestError> {
    let mut manifest: TransferManifest = toml::from_str(text)?;

    if manifest.files.is_empty() {
        return Err(ManifestError::NoFiles);
    }
    if manifest.mirrors.is_empty() {
        return Err(ManifestError::NoMirrors);
    }

    for file in &manifest.files {
        if !is_safe_relative(&file.path) {
            return Err(ManifestError::UnsafePath(file.path.clone()));
        }
    }

    let mut seen = std::collections::HashSet::new();
    manifest.files.retain(|f| {
        let fresh = seen.insert(f.path.clone());
        if !fresh {
            event!(Level::WARN, "Duplicate manifest path dropped: {}", f.path);
        }
        fresh
    });

    Ok(manifest)
}

fn is_safe_relative(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let p = Path::new(path);
    if p.is_absolute() {
        return false;
    }
    p.components()
        .all(|c| matches!(c, std::path::Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_manifest_parsing() {
        let toml_str = r#"
            name = "sample.iso"

            [[mirrors]]
            url = "https://mirror-a.example.net/pub"

            [[mirrors]]
            url = "http://mirror-b.example.org/pub/"

            [[files]]
            path = "a.bin"
            size = 52428800

            [[files]]
            path = "disc/b.bin"
            size = 52428800
        "#;

        let manifest = parse(toml_str).expect("Failed to parse full manifest");

        assert_eq!(manifest.name, "sample.iso");
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].path, "a.bin");
        assert_eq!(manifest.files[1].path, "disc/b.bin");
        assert_eq!(manifest.mirrors.len(), 2);
        assert_eq!(manifest.total_size(), 104857600);
    }

    #[test]
    fn test_partial_fields_use_defaults() {
        let toml_str = r#"
            [[mirrors]]
            url = "https://mirror.example.net"

            [[files]]
            path = "lone.bin"
            # size omitted, defaults to 0
        "#;

        let manifest = parse(toml_str).expect("Failed to parse partial manifest");

        assert_eq!(manifest.name, "");
        assert_eq!(manifest.files[0].size, 0);
        assert_eq!(manifest.total_size(), 0);
    }

    #[test]
    fn test_empty_file_list_rejected() {
        let toml_str = r#"
            name = "empty"
            [[mirrors]]
            url = "https://mirror.example.net"
        "#;
        assert!(matches!(parse(toml_str), Err(ManifestError::NoFiles)));
    }

    #[test]
    fn test_missing_mirrors_rejected() {
        let toml_str = r#"
            [[files]]
            path = "a.bin"
            size = 10
        "#;
        assert!(matches!(parse(toml_str), Err(ManifestError::NoMirrors)));
    }

    #[test]
    fn test_duplicate_paths_keep_first() {
        let toml_str = r#"
            [[mirrors]]
            url = "https://mirror.example.net"

            [[files]]
            path = "a.bin"
            size = 1

            [[files]]
            path = "a.bin"
            size = 2
        "#;

        let manifest = parse(toml_str).expect("Failed to parse manifest");
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].size, 1);
    }

    #[test]
    fn test_escaping_paths_rejected() {
        for bad in ["../up.bin", "/etc/passwd", "a/../../b.bin", ""] {
            let toml_str = format!(
                r#"
                    [[mirrors]]
                    url = "https://mirror.example.net"

                    [[files]]
                    path = "{}"
                    size = 1
                "#,
                bad
            );
            assert!(
                matches!(parse(&toml_str), Err(ManifestError::UnsafePath(_))),
                "path {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result = parse("files = \"not a table\"");
        assert!(matches!(result, Err(ManifestError::Toml(_))));
    }
}
