//! Source sets: directories of files to load into a database

use crate::apis::FileLister;
use crate::error::Result;
use crate::plan::Planner;
use declarative::{Action, Permission};
use propschema::ResultObject;
use serde_json::Value;

/// Name of the source set other sets inherit from
pub const DEFAULT_TEMPLATE: &str = "@default";

/// A named set of files
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub id: Option<String>,
    pub name: String,
    pub props: ResultObject<'static>,
}

impl SourceSet {
    /// Directory, relative to the project
    pub fn dir(&self) -> &str {
        self.props.string("dir").unwrap_or(&self.name)
    }

    /// `plain` or `rest-src`
    pub fn kind(&self) -> &str {
        self.props.string("type").unwrap_or("plain")
    }

    pub fn include(&self) -> &[String] {
        self.props.list("include").unwrap_or_default()
    }

    pub fn exclude(&self) -> &[String] {
        self.props.list("exclude").unwrap_or_default()
    }

    pub fn garbage(&self) -> &[String] {
        self.props.list("garbage").unwrap_or_default()
    }

    pub fn collections(&self) -> &[String] {
        self.props.list("collections").unwrap_or_default()
    }

    /// URI prefix of loaded documents
    pub fn prefix(&self) -> &str {
        self.props.string("prefix").unwrap_or("/")
    }

    /// Server or database id/name documents go to by default
    pub fn target(&self) -> Option<&str> {
        self.props.string("target")
    }

    /// Permissions set on every loaded document, one per role and capability
    pub fn permissions(&self) -> Vec<Permission> {
        let body = self.props.render();
        let Some(Value::Array(items)) = body.get("permission") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                Some(Permission {
                    role: item.get("role-name")?.as_str()?.to_string(),
                    capability: item.get("capability")?.as_str()?.to_string(),
                })
            })
            .collect()
    }

    /// Document URI of a file, given its path relative to [`SourceSet::dir`]
    pub fn uri(&self, path: &str) -> String {
        let prefix = self.prefix().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{prefix}/{path}")
    }

    /// Queue one document insertion per file of the set
    pub fn load(&self, planner: &mut Planner<'_>, files: &dyn FileLister, database: &str) -> Result<()> {
        planner.check(0, &format!("the source: {}", self.name));
        let paths = files.list(self)?;
        if paths.is_empty() {
            planner.warn(&format!("source {} has no file to load", self.name));
        }
        let permissions = self.permissions();
        for path in paths {
            let body = files.read(self, &path)?;
            let uri = self.uri(&path);
            planner.added(1, "document", &uri);
            planner.add(Action::InsertDocument {
                uri,
                database: database.to_string(),
                collections: self.collections().to_vec(),
                permissions: permissions.clone(),
                body,
            });
        }
        Ok(())
    }
}
