//! Writing artifacts into a working copy

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path};

use super::Artifact;
use crate::{Error, Result};

/// Check that every artifact can be written before anything touches disk
///
/// Streams are rejected, as are paths that are empty, absolute, climb out
/// of the root or reach into `.git`.
pub fn validate(artifacts: &[Artifact]) -> Result<()> {
    for artifact in artifacts {
        if artifact.is_stream() {
            return Err(Error::UnsupportedArtifact {
                path: artifact.path.clone(),
            });
        }
        check_path(&artifact.path)?;
    }
    Ok(())
}

fn check_path(path: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidArtifactPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut normal = 0;
    for component in path.components() {
        match component {
            Component::Normal(name) if name == ".git" => {
                return Err(invalid("git metadata cannot be overwritten"));
            }
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("path leaves the working copy")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"));
            }
        }
    }

    if normal == 0 {
        return Err(invalid("path is empty"));
    }
    Ok(())
}

/// Write every artifact below `root`, creating directories as needed
///
/// Existing files are overwritten. Each file is synced to disk before this
/// returns so staging never sees a partial write.
pub fn materialize(artifacts: &[Artifact], root: &Path) -> Result<()> {
    validate(artifacts)?;

    for artifact in artifacts {
        let Some(bytes) = artifact.bytes() else {
            continue;
        };

        let dest = root.join(&artifact.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&dest)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    tracing::debug!(count = artifacts.len(), root = %root.display(), "Materialized artifacts");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_nested_paths() {
        let root = TempDir::new().unwrap();
        let artifacts = vec![
            Artifact::new("index.html", "A"),
            Artifact::new("assets/css/site.css", "body{}"),
            Artifact::new("./about/index.html", "about"),
        ];

        materialize(&artifacts, root.path()).unwrap();

        assert_eq!(fs::read_to_string(root.path().join("index.html")).unwrap(), "A");
        assert_eq!(
            fs::read_to_string(root.path().join("assets/css/site.css")).unwrap(),
            "body{}"
        );
        assert_eq!(
            fs::read_to_string(root.path().join("about/index.html")).unwrap(),
            "about"
        );
    }

    #[test]
    fn test_overwrites_existing_file() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("index.html"), "old contents that are longer").unwrap();

        materialize(&[Artifact::new("index.html", "new")], root.path()).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("index.html")).unwrap(), "new");
    }

    #[test]
    fn test_stream_rejected_before_any_write() {
        let root = TempDir::new().unwrap();
        let artifacts = vec![
            Artifact::new("index.html", "A"),
            Artifact::stream("big.bin", std::io::empty()),
        ];

        let err = materialize(&artifacts, root.path()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedArtifact { .. }));
        assert!(!root.path().join("index.html").exists());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        for path in ["../outside.html", "/etc/passwd", ".git/config", "docs/.git/HEAD", "", "."] {
            let err = validate(&[Artifact::new(path, "x")]).unwrap_err();
            assert!(
                matches!(err, Error::InvalidArtifactPath { .. }),
                "{} should be rejected",
                path
            );
        }
    }
}
