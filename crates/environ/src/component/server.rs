//! Application servers

use crate::component::DbRef;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::plan::Planner;
use declarative::Action;
use declarative::action::encode;
use propschema::ResultObject;
use serde_json::{Map, Value, json};

/// Group servers belong to when none is given
pub const DEFAULT_GROUP: &str = "Default";

/// Wire value selecting filesystem modules
const FILESYSTEM_MODULES: i64 = 0;

/// An application server managed by the environment
#[derive(Debug, Clone)]
pub struct Server {
    pub id: Option<String>,
    pub name: String,
    pub group: String,
    pub content: DbRef,
    /// Absent for modules read from the filesystem
    pub modules: Option<DbRef>,
    pub props: ResultObject<'static>,
}

impl Server {
    /// Name of the content database
    pub fn content_name<'e>(&'e self, env: &'e Environment) -> &'e str {
        env.reference_name(&self.content, &self.name)
    }

    /// Creation body: rendered properties plus database references
    pub fn body(&self, env: &Environment) -> Map<String, Value> {
        let mut body = self.props.render();
        body.insert("content-database".to_string(), json!(self.content_name(env)));
        let modules = match &self.modules {
            Some(modules) => json!(env.reference_name(modules, &self.name)),
            None => json!(FILESYSTEM_MODULES),
        };
        body.insert("modules-database".to_string(), modules);
        body
    }

    /// Queue what is needed to converge this server
    pub fn setup(&self, planner: &mut Planner<'_>) -> Result<()> {
        planner.check(0, &format!("the {} server: {}", self.kind(), self.name));
        let url = format!(
            "/servers/{}/properties?group-id={}",
            encode(&self.name),
            encode(&self.group)
        );

        let Some(actual) = planner.fetch(&url)? else {
            planner.added(0, "server", &self.name);
            let body = self.body(planner.env());
            planner.add(Action::CreateServer {
                name: self.name.clone(),
                group: self.group.clone(),
                body: Value::Object(body),
            });
            return Ok(());
        };

        let changes = propschema::diff(&self.props, &actual)
            .map_err(|e| Error::schema(format!("server {}", self.name), e))?;
        for change in changes {
            planner.added(1, "property", &change.property);
            self.update(planner, change.property, change.body);
        }

        let env = planner.env();
        let content = self.content_name(env);
        if actual.get("content-database").and_then(Value::as_str) != Some(content) {
            planner.added(1, "property", "content-database");
            let body = json!({ "content-database": content });
            self.update(planner, "content-database".to_string(), as_map(body));
        }

        let modules = self.modules.as_ref().map(|m| env.reference_name(m, &self.name));
        if !same_modules(modules, actual.get("modules-database")) {
            planner.added(1, "property", "modules-database");
            let body = match modules {
                Some(name) => json!({ "modules-database": name }),
                None => json!({ "modules-database": FILESYSTEM_MODULES }),
            };
            self.update(planner, "modules-database".to_string(), as_map(body));
        }

        Ok(())
    }

    fn update(&self, planner: &mut Planner<'_>, property: String, body: Map<String, Value>) {
        planner.add(Action::UpdateServerProperty {
            server: self.name.clone(),
            group: self.group.clone(),
            property,
            body: Value::Object(body),
        });
    }

    /// Server type, `http` unless declared otherwise
    pub fn kind(&self) -> &str {
        self.props.string("type").unwrap_or("http")
    }

    pub fn port(&self) -> Option<i64> {
        self.props.integer("port")
    }
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Whether a modules setting designates the file system
pub fn is_filesystem(modules: Option<&Value>) -> bool {
    match modules {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_i64() == Some(FILESYSTEM_MODULES),
        Some(Value::String(s)) => s == "0" || s == "file-system",
        Some(_) => false,
    }
}

/// Compare the desired modules database with the live setting
fn same_modules(desired: Option<&str>, actual: Option<&Value>) -> bool {
    match desired {
        None => is_filesystem(actual),
        Some(name) => actual.and_then(Value::as_str) == Some(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_modules_equivalents() {
        assert!(same_modules(None, None));
        assert!(same_modules(None, Some(&json!(0))));
        assert!(same_modules(None, Some(&json!("file-system"))));
        assert!(!same_modules(None, Some(&json!("app-modules"))));
        assert!(same_modules(Some("app-modules"), Some(&json!("app-modules"))));
        assert!(!same_modules(Some("app-modules"), Some(&json!(0))));
    }
}
