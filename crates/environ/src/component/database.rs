//! Managed databases and their forests

use crate::component::DbRef;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::plan::Planner;
use declarative::Action;
use declarative::action::encode;
use propschema::ResultObject;
use serde_json::{Map, Value, json};

/// A database managed by the environment
#[derive(Debug, Clone)]
pub struct Database {
    pub id: Option<String>,
    pub name: String,
    /// Forest names, in creation order
    pub forests: Vec<String>,
    pub schema: Option<DbRef>,
    pub security: Option<DbRef>,
    pub triggers: Option<DbRef>,
    pub props: ResultObject<'static>,
}

impl Database {
    /// Wire keys of the database references, with their targets
    pub fn references(&self) -> [(&'static str, Option<&DbRef>); 3] {
        [
            ("schema-database", self.schema.as_ref()),
            ("security-database", self.security.as_ref()),
            ("triggers-database", self.triggers.as_ref()),
        ]
    }

    /// Creation body: rendered properties plus referenced database names
    pub fn body(&self, env: &Environment) -> Map<String, Value> {
        let mut body = self.props.render();
        for (wire, target) in self.references() {
            if let Some(target) = target {
                body.insert(wire.to_string(), json!(env.reference_name(target, &self.name)));
            }
        }
        body
    }

    /// Queue what is needed to converge this database
    pub fn setup(&self, planner: &mut Planner<'_>) -> Result<()> {
        planner.check(0, &format!("the database: {}", self.name));
        let url = format!("/databases/{}/properties", encode(&self.name));

        let Some(actual) = planner.fetch(&url)? else {
            planner.added(0, "database", &self.name);
            let body = self.body(planner.env());
            planner.add(Action::CreateDatabase {
                name: self.name.clone(),
                body: Value::Object(body),
            });
            return self.setup_forests(planner, &[]);
        };

        let changes = propschema::diff(&self.props, &actual)
            .map_err(|e| Error::schema(format!("database {}", self.name), e))?;
        for change in changes {
            planner.added(1, "property", &change.property);
            planner.add(Action::UpdateDatabaseProperty {
                database: self.name.clone(),
                property: change.property,
                body: Value::Object(change.body),
            });
        }

        for (wire, target) in self.references() {
            let Some(target) = target else {
                continue;
            };
            let desired = planner.env().reference_name(target, &self.name).to_string();
            if actual.get(wire).and_then(Value::as_str) != Some(desired.as_str()) {
                planner.added(1, "property", wire);
                planner.add(Action::UpdateDatabaseProperty {
                    database: self.name.clone(),
                    property: wire.to_string(),
                    body: json!({ wire: desired }),
                });
            }
        }

        let attached = attached_forests(&actual);
        self.setup_forests(planner, &attached)
    }

    /// Create or attach missing forests, detach the ones not desired
    fn setup_forests(&self, planner: &mut Planner<'_>, attached: &[String]) -> Result<()> {
        for forest in &self.forests {
            if attached.contains(forest) {
                continue;
            }
            if planner.existing_forests()?.contains(forest) {
                planner.added(1, "attached forest", forest);
                planner.add(Action::AttachForest {
                    forest: forest.clone(),
                    database: self.name.clone(),
                });
            } else {
                planner.added(1, "forest", forest);
                planner.add(Action::CreateForest {
                    name: forest.clone(),
                    database: self.name.clone(),
                });
            }
        }
        for forest in attached {
            if !self.forests.contains(forest) {
                planner.removed(1, "forest", forest);
                planner.add(Action::DetachForest {
                    forest: forest.clone(),
                    database: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Forests listed in a database property document
fn attached_forests(properties: &Map<String, Value>) -> Vec<String> {
    match properties.get("forest") {
        Some(Value::String(one)) => vec![one.clone()],
        Some(Value::Array(many)) => many
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Names of `count` numbered forests: `{database}-001`, `{database}-002`...
pub fn numbered_forests(database: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{database}-{i:03}")).collect()
}
