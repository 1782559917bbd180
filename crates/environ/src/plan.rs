//! Planning: compare an environment with the remote state and queue actions
//!
//! Planning only reads from the remote system. Writes are queued in an
//! [`ActionList`] and left to the caller to execute, so a plan can be shown
//! or captured before anything changes.

use crate::apis::FileLister;
use crate::environment::{Environment, LoadTarget};
use crate::error::{Error, Result};
use declarative::{Action, ActionList, Api, Reporter, Transport};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// State shared by component setups during one planning run
pub struct Planner<'a> {
    env: &'a Environment,
    transport: &'a dyn Transport,
    report: &'a mut dyn Reporter,
    actions: &'a mut ActionList,
    forests: Option<HashSet<String>>,
}

impl<'a> Planner<'a> {
    pub fn new(
        env: &'a Environment,
        transport: &'a dyn Transport,
        report: &'a mut dyn Reporter,
        actions: &'a mut ActionList,
    ) -> Self {
        Self {
            env,
            transport,
            report,
            actions,
            forests: None,
        }
    }

    pub fn env(&self) -> &'a Environment {
        self.env
    }

    /// Read a property document from the management API
    ///
    /// `None` when the resource does not exist. A body that is not an
    /// object is read as an empty document.
    pub fn fetch(&mut self, url: &str) -> Result<Option<Map<String, Value>>> {
        let action = Action::GetProperties {
            api: Api::Manage,
            url: url.to_string(),
        };
        Ok(action.fetch(self.transport)?.map(|body| match body {
            Value::Object(map) => map,
            _ => Map::new(),
        }))
    }

    /// Names of all forests of the cluster, read once per run
    pub fn existing_forests(&mut self) -> Result<&HashSet<String>> {
        if self.forests.is_none() {
            let listed = Action::ListForests.fetch(self.transport)?;
            let names = listed.as_ref().map(forest_names).unwrap_or_default();
            log::debug!("{} existing forests", names.len());
            self.forests = Some(names);
        }
        Ok(&*self.forests.get_or_insert_with(HashSet::new))
    }

    pub fn add(&mut self, action: Action) {
        self.actions.add(action);
    }

    pub fn check(&mut self, indent: usize, message: &str) {
        self.report.check(indent, message);
    }

    pub fn added(&mut self, indent: usize, what: &str, name: &str) {
        self.report.add(indent, what, name);
    }

    pub fn removed(&mut self, indent: usize, what: &str, name: &str) {
        self.report.remove(indent, what, name);
    }

    /// Non-fatal problem found while planning
    pub fn warn(&mut self, message: &str) {
        log::warn!("{message}");
        self.report.error(message);
    }
}

/// Forest names of a forest list document
fn forest_names(listed: &Value) -> HashSet<String> {
    listed
        .pointer("/forest-default-list/list-items/list-item")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("nameref").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Environment {
    /// Plan the actions converging the remote system to this environment
    ///
    /// Components are checked in dependency order: databases, servers,
    /// MIME types, roles then users.
    pub fn setup(&self, actions: &mut ActionList, transport: &dyn Transport, report: &mut dyn Reporter) -> Result<()> {
        let mut planner = Planner::new(self, transport, report, actions);
        for database in self.databases() {
            database.setup(&mut planner)?;
        }
        for server in self.servers() {
            server.setup(&mut planner)?;
        }
        for resource in self.mime_types().iter().chain(self.roles()).chain(self.users()) {
            resource.setup(&mut planner)?;
        }
        Ok(())
    }

    /// Plan the insertion of the documents of a source set
    pub fn load(
        &self,
        source: &str,
        target: LoadTarget<'_>,
        files: &dyn FileLister,
        actions: &mut ActionList,
        transport: &dyn Transport,
        report: &mut dyn Reporter,
    ) -> Result<()> {
        let source = self.source(source).ok_or_else(|| Error::UnknownComponent {
            kind: "source",
            name: source.to_string(),
        })?;
        let database = self.load_target(source, target)?;
        log::info!("loading source {} into {database}", source.name);
        let mut planner = Planner::new(self, transport, report, actions);
        source.load(&mut planner, files, &database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::SourceSet;
    use crate::error::ErrorCategory;
    use crate::loader::MemoryLoader;
    use crate::params::Overrides;
    use declarative::{Body, MockTransport, NoReport, RecordingReporter, Response, Verb};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn environment(content: Value) -> Environment {
        let mut content = content;
        content["format"] = json!("0.1");
        let loader = MemoryLoader::new().with("dev.json", json!({ "mlproj": content }));
        Environment::compile(&loader, "dev.json", &Overrides::default()).unwrap()
    }

    fn app() -> Environment {
        environment(json!({
            "code": "app",
            "databases": [{"id": "content", "name": "@{code}-content"}],
            "servers": [{"name": "@{code}", "port": 7010, "content": {"idref": "content"}}],
        }))
    }

    fn plan(env: &Environment, transport: &MockTransport) -> Result<ActionList> {
        let mut actions = ActionList::new();
        env.setup(&mut actions, transport, &mut NoReport)?;
        Ok(actions)
    }

    #[test]
    fn test_plan_against_empty_system() {
        let env = app();
        let transport = MockTransport::new();
        let actions = plan(&env, &transport).unwrap();
        let planned: Vec<_> = actions.todo().cloned().collect();

        assert_eq!(planned.len(), 3);
        assert!(matches!(&planned[0], Action::CreateDatabase { name, .. } if name == "app-content"));
        assert_eq!(
            planned[1],
            Action::CreateForest {
                name: "app-content-001".to_string(),
                database: "app-content".to_string(),
            }
        );
        let Action::CreateServer { name, group, body } = &planned[2] else {
            panic!("expected a server creation, got {:?}", planned[2]);
        };
        assert_eq!(name, "app");
        assert_eq!(group, "Default");
        assert_eq!(body["content-database"], "app-content");
        assert_eq!(body["modules-database"], 0);
        assert_eq!(body["port"], 7010);

        // planning never writes
        assert!(transport.writes().is_empty());
    }

    #[test]
    fn test_plan_is_empty_when_converged() {
        let env = app();
        let transport = MockTransport::new();
        transport.respond(
            Verb::Get,
            Api::Manage,
            "/databases/app-content/properties",
            Response::json(200, json!({"database-name": "app-content", "forest": ["app-content-001"]})),
        );
        transport.respond(
            Verb::Get,
            Api::Manage,
            "/servers/app/properties?group-id=Default",
            Response::json(
                200,
                json!({
                    "server-name": "app",
                    "server-type": "http",
                    "port": 7010,
                    "root": "/",
                    "content-database": "app-content",
                    "modules-database": "file-system",
                }),
            ),
        );
        let actions = plan(&env, &transport).unwrap();
        assert!(actions.is_empty(), "unexpected plan: {actions:?}");
    }

    #[test]
    fn test_plan_updates_only_changed_properties() {
        let env = environment(json!({
            "databases": [{"name": "db", "triple-index": true, "language": "en", "forests": 2}],
        }));
        let transport = MockTransport::new();
        transport.respond(
            Verb::Get,
            Api::Manage,
            "/databases/db/properties",
            Response::json(
                200,
                json!({"database-name": "db", "triple-index": false, "language": "en", "forest": ["db-001", "old-001"]}),
            ),
        );
        transport.respond(
            Verb::Get,
            Api::Manage,
            "/forests",
            Response::json(
                200,
                json!({"forest-default-list": {"list-items": {"list-item": [{"nameref": "db-002"}]}}}),
            ),
        );
        let mut report = RecordingReporter::new();
        let mut actions = ActionList::new();
        env.setup(&mut actions, &transport, &mut report).unwrap();
        let planned: Vec<_> = actions.todo().cloned().collect();

        assert_eq!(
            planned,
            vec![
                Action::UpdateDatabaseProperty {
                    database: "db".to_string(),
                    property: "triple-index".to_string(),
                    body: json!({"triple-index": true}),
                },
                Action::AttachForest {
                    forest: "db-002".to_string(),
                    database: "db".to_string(),
                },
                Action::DetachForest {
                    forest: "old-001".to_string(),
                    database: "db".to_string(),
                },
            ]
        );
        assert!(report.events.contains(&"remove forest old-001".to_string()));
    }

    #[test]
    fn test_frozen_server_type_aborts_plan() {
        let env = app();
        let transport = MockTransport::new();
        transport.respond(
            Verb::Get,
            Api::Manage,
            "/servers/app/properties?group-id=Default",
            Response::json(200, json!({"server-name": "app", "server-type": "xdbc", "port": 7010})),
        );
        let mut actions = ActionList::new();
        let err = env.setup(&mut actions, &transport, &mut NoReport).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Frozen);
        assert!(
            !actions
                .todo()
                .any(|a| matches!(a, Action::UpdateServerProperty { .. }))
        );
    }

    #[test]
    fn test_resources_follow_servers() {
        let env = environment(json!({
            "mime-types": [{"name": "text/x-foo", "extensions": ["foo"], "format": "text"}],
            "roles": [{"name": "app-role"}],
            "users": [{"name": "app-user", "password": "secret", "roles": ["app-role"]}],
        }));
        let transport = MockTransport::new();
        transport.respond(
            Verb::Get,
            Api::Manage,
            "/users/app-user/properties",
            Response::json(200, json!({"user-name": "app-user", "role": []})),
        );
        let planned: Vec<_> = plan(&env, &transport).unwrap().todo().cloned().collect();

        assert_eq!(planned.len(), 3);
        assert!(matches!(&planned[0], Action::CreateResource { name, .. } if name == "text/x-foo"));
        assert!(matches!(&planned[1], Action::CreateResource { name, .. } if name == "app-role"));
        // the password is only sent at creation
        assert_eq!(
            planned[2],
            Action::UpdateResourceProperty {
                kind: declarative::ResourceKind::User,
                name: "app-user".to_string(),
                property: "roles".to_string(),
                body: json!({"role": ["app-role"]}),
            }
        );
    }

    #[test]
    fn test_user_parameter_overrides_port() {
        let content = json!({
            "format": "0.1",
            "params": {"port": "7010"},
            "databases": [{"name": "db"}],
            "servers": [{"name": "app", "port": "${port}", "content": {"nameref": "db"}}],
        });
        let loader = MemoryLoader::new().with("dev.json", json!({ "mlproj": content }));
        let overrides = Overrides {
            params: BTreeMap::from([("port".to_string(), "7020".to_string())]),
            ..Overrides::default()
        };
        let env = Environment::compile(&loader, "dev.json", &overrides).unwrap();
        let planned: Vec<_> = plan(&env, &MockTransport::new()).unwrap().todo().cloned().collect();
        let Some(Action::CreateServer { body, .. }) = planned.last() else {
            panic!("expected a server creation last");
        };
        assert_eq!(body["port"], 7020);
    }

    struct Files(Vec<&'static str>);

    impl FileLister for Files {
        fn list(&self, _source: &SourceSet) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|p| (*p).to_string()).collect())
        }

        fn read(&self, _source: &SourceSet, path: &str) -> Result<Body> {
            Ok(Body::Text(format!("contents of {path}")))
        }
    }

    #[test]
    fn test_load_plan() {
        let env = environment(json!({
            "databases": [{"id": "modules", "name": "app-modules"}],
            "sources": [{
                "name": "src",
                "prefix": "/lib/",
                "target": "modules",
                "collections": ["code"],
                "permissions": [{"role": "app-reader", "capability": ["read", "execute"]}],
            }],
        }));
        let mut actions = ActionList::new();
        let transport = MockTransport::new();
        env.load(
            "src",
            LoadTarget::Default,
            &Files(vec!["a.xqy", "sub/b.xqy"]),
            &mut actions,
            &transport,
            &mut NoReport,
        )
        .unwrap();

        let uris: Vec<_> = actions
            .todo()
            .map(|action| match action {
                Action::InsertDocument {
                    uri,
                    database,
                    collections,
                    permissions,
                    ..
                } => {
                    assert_eq!(database, "app-modules");
                    assert_eq!(collections, &["code"]);
                    let granted: Vec<_> = permissions
                        .iter()
                        .map(|p| (p.role.as_str(), p.capability.as_str()))
                        .collect();
                    assert_eq!(granted, [("app-reader", "read"), ("app-reader", "execute")]);
                    uri.as_str()
                }
                other => panic!("unexpected action {other:?}"),
            })
            .collect();
        assert_eq!(uris, ["/lib/a.xqy", "/lib/sub/b.xqy"]);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_load_empty_source_warns() {
        let env = environment(json!({
            "databases": [{"name": "db"}],
            "sources": [{"name": "data", "target": "db"}],
        }));
        let mut actions = ActionList::new();
        let mut report = RecordingReporter::new();
        env.load(
            "data",
            LoadTarget::Default,
            &Files(Vec::new()),
            &mut actions,
            &MockTransport::new(),
            &mut report,
        )
        .unwrap();
        assert!(actions.is_empty());
        assert!(report.events.iter().any(|e| e.starts_with("error source data")));
    }

    #[test]
    fn test_load_unknown_source() {
        let env = app();
        let err = env
            .load(
                "nope",
                LoadTarget::Default,
                &Files(Vec::new()),
                &mut ActionList::new(),
                &MockTransport::new(),
                &mut NoReport,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "no source named nope");
    }
}
