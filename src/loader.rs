//! Environment documents read from the project directory

use environ::{DocumentLoader, LoadError};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Directory holding environment files, relative to the project
pub const ENV_DIR: &str = "xproject/ml";

/// Environment probed when none is named
pub const DEFAULT_ENV: &str = "default";

/// Loads documents from the filesystem; identities are file paths
pub struct FsLoader;

impl FsLoader {
    /// Identity of a named environment of a project
    pub fn env_path(project: &Path, name: &str) -> String {
        normalize(&project.join(ENV_DIR).join(format!("{name}.json")))
            .display()
            .to_string()
    }
}

impl DocumentLoader for FsLoader {
    fn load(&self, identity: &str) -> Result<Value, LoadError> {
        log::debug!("reading {identity}");
        let content = fs::read_to_string(identity).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(identity.to_string()),
            _ => LoadError::Invalid {
                identity: identity.to_string(),
                message: e.to_string(),
            },
        })?;
        serde_json::from_str(&content).map_err(|e| LoadError::Invalid {
            identity: identity.to_string(),
            message: e.to_string(),
        })
    }

    fn resolve_import(&self, reference: &str, base: &str) -> String {
        let dir = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
        normalize(&dir.join(reference)).display().to_string()
    }
}

/// Remove `.` and `..` segments without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_and_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dev.json");
        fs::write(&path, r#"{"mlproj": {"format": "0.1"}}"#).unwrap();

        let doc = FsLoader.load(&path.display().to_string()).unwrap();
        assert_eq!(doc["mlproj"]["format"], "0.1");

        let missing = dir.path().join("nope.json").display().to_string();
        assert!(matches!(FsLoader.load(&missing), Err(LoadError::NotFound(id)) if id == missing));
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            FsLoader.load(&path.display().to_string()),
            Err(LoadError::Invalid { .. })
        ));
    }

    #[test]
    fn test_imports_are_normalized() {
        assert_eq!(
            FsLoader.resolve_import("../common/base.json", "proj/xproject/ml/dev.json"),
            Path::new("proj/xproject/common/base.json").display().to_string()
        );
        assert_eq!(
            FsLoader.resolve_import("./base.json", "proj/xproject/ml/dev.json"),
            Path::new("proj/xproject/ml/base.json").display().to_string()
        );
    }

    #[test]
    fn test_env_path() {
        assert_eq!(
            FsLoader::env_path(Path::new("./proj"), "dev"),
            Path::new("proj/xproject/ml/dev.json").display().to_string()
        );
    }

    #[test]
    fn test_compile_from_files() {
        let dir = TempDir::new().unwrap();
        let ml = dir.path().join(ENV_DIR);
        fs::create_dir_all(&ml).unwrap();
        fs::write(
            ml.join("dev.json"),
            r#"{"mlproj": {"format": "0.1", "import": "base.json", "code": "ape"}}"#,
        )
        .unwrap();
        fs::write(
            ml.join("base.json"),
            r#"{"mlproj": {"format": "0.1", "databases": [{"name": "@{code}-content"}]}}"#,
        )
        .unwrap();

        let identity = FsLoader::env_path(dir.path(), "dev");
        let env = environ::Environment::compile(&FsLoader, &identity, &environ::Overrides::default()).unwrap();
        assert_eq!(env.databases()[0].name, "ape-content");

        let probed = environ::Environment::probe(
            &FsLoader,
            &FsLoader::env_path(dir.path(), DEFAULT_ENV),
            &environ::Overrides::default(),
        )
        .unwrap();
        assert!(probed.is_none());
    }
}
