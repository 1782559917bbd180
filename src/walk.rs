//! Source set files on the local filesystem

use declarative::Body;
use environ::{Error, FileLister, Result, SourceSet};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists source set files below a project directory
pub struct ProjectFiles {
    root: PathBuf,
}

impl ProjectFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, source: &SourceSet) -> PathBuf {
        self.root.join(source.dir())
    }
}

/// Glob patterns compiled to regular expressions
///
/// A pattern without `/` matches the file name, otherwise the path
/// relative to the source directory. `*` stays within one path segment,
/// `**` spans several.
struct Patterns {
    names: Vec<Regex>,
    paths: Vec<Regex>,
}

impl Patterns {
    fn new(source: &SourceSet, globs: &[String]) -> Result<Self> {
        let mut patterns = Self {
            names: Vec::new(),
            paths: Vec::new(),
        };
        for glob in globs {
            let regex = Regex::new(&glob_to_regex(glob)).map_err(|e| Error::Files {
                source_name: source.name.clone(),
                message: format!("invalid pattern {glob:?}: {e}"),
            })?;
            if glob.contains('/') {
                patterns.paths.push(regex);
            } else {
                patterns.names.push(regex);
            }
        }
        Ok(patterns)
    }

    fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty()
    }

    fn matches(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.names.iter().any(|r| r.is_match(name)) || self.paths.iter().any(|r| r.is_match(path))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex
}

impl FileLister for ProjectFiles {
    fn list(&self, source: &SourceSet) -> Result<Vec<String>> {
        let dir = self.dir(source);
        if !dir.is_dir() {
            return Err(Error::Files {
                source_name: source.name.clone(),
                message: format!("directory {} does not exist", dir.display()),
            });
        }
        let include = Patterns::new(source, source.include())?;
        let exclude = Patterns::new(source, source.exclude())?;
        let garbage = Patterns::new(source, source.garbage())?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(true) {
            let entry = entry.map_err(|e| Error::Files {
                source_name: source.name.clone(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = relative(&dir, entry.path()) else {
                continue;
            };
            // garbage applies to every segment, so hidden directories are skipped too
            if path.split('/').any(|segment| garbage.matches(segment)) {
                log::trace!("{}: skipping garbage {path}", source.name);
                continue;
            }
            if (!include.is_empty() && !include.matches(&path)) || exclude.matches(&path) {
                continue;
            }
            files.push(path);
        }
        files.sort();
        log::debug!("{}: {} files in {}", source.name, files.len(), dir.display());
        Ok(files)
    }

    fn read(&self, source: &SourceSet, path: &str) -> Result<Body> {
        let file = self.dir(source).join(path);
        let bytes = fs::read(&file).map_err(|e| Error::Files {
            source_name: source.name.clone(),
            message: format!("cannot read {}: {e}", file.display()),
        })?;
        if path.ends_with(".json")
            && let Ok(value) = serde_json::from_slice(&bytes)
        {
            return Ok(Body::Json(value));
        }
        Ok(match String::from_utf8(bytes) {
            Ok(text) => Body::Text(text),
            Err(e) => Body::Binary(e.into_bytes()),
        })
    }
}

/// Path of `path` below `dir`, with `/` separators
fn relative(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use environ::{Environment, MemoryLoader, Overrides};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn source(decl: Value) -> SourceSet {
        let loader = MemoryLoader::new().with(
            "dev.json",
            json!({"mlproj": {"format": "0.1", "sources": [decl]}}),
        );
        let env = Environment::compile(&loader, "dev.json", &Overrides::default()).unwrap();
        env.sources()[0].clone()
    }

    fn project(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("content of {file}")).unwrap();
        }
        dir
    }

    #[test]
    fn test_glob_to_regex() {
        let re = |g: &str| Regex::new(&glob_to_regex(g)).unwrap();
        assert!(re("*.xqy").is_match("a.xqy"));
        assert!(!re("*.xqy").is_match("lib/a.xqy"));
        assert!(re("**/*.xqy").is_match("lib/a.xqy"));
        assert!(re("**/*.xqy").is_match("a.xqy"));
        assert!(re("a?.xml").is_match("ab.xml"));
        assert!(!re("a.xml").is_match("abxml"));
    }

    #[test]
    fn test_list_applies_garbage_and_patterns() {
        let dir = project(&[
            "src/a.xqy",
            "src/lib/b.xqy",
            "src/lib/b.xqy~",
            "src/.git/config",
            "src/notes.txt",
            "src/test/c.xqy",
        ]);
        let files = ProjectFiles::new(dir.path());

        let all = files.list(&source(json!({"name": "src"}))).unwrap();
        assert_eq!(all, ["a.xqy", "lib/b.xqy", "notes.txt", "test/c.xqy"]);

        let filtered = files
            .list(&source(json!({"name": "src", "include": ["*.xqy"], "exclude": ["test/*"]})))
            .unwrap();
        assert_eq!(filtered, ["a.xqy", "lib/b.xqy"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = project(&[]);
        let err = ProjectFiles::new(dir.path())
            .list(&source(json!({"name": "data"})))
            .unwrap_err();
        assert!(err.to_string().starts_with("source data: directory"));
    }

    #[test]
    fn test_read_bodies() {
        let dir = project(&["src/a.xqy"]);
        fs::write(dir.path().join("src/doc.json"), r#"{"a": 1}"#).unwrap();
        fs::write(dir.path().join("src/img.png"), [0xff, 0xfe, 0x00]).unwrap();
        let files = ProjectFiles::new(dir.path());
        let src = source(json!({"name": "src"}));

        assert_eq!(files.read(&src, "a.xqy").unwrap(), Body::Text("content of a.xqy".into()));
        assert_eq!(files.read(&src, "doc.json").unwrap(), Body::Json(json!({"a": 1})));
        assert_eq!(files.read(&src, "img.png").unwrap(), Body::Binary(vec![0xff, 0xfe, 0x00]));
    }
}
