//! Named resources managed through one properties endpoint each:
//! MIME types, roles and users

use crate::error::{Error, Result};
use crate::plan::Planner;
use declarative::action::encode;
use declarative::{Action, ResourceKind};
use propschema::{Config, ResultObject, kinds};
use serde_json::Value;

/// A MIME type, role or user
#[derive(Debug, Clone)]
pub struct Resource {
    pub kind: ResourceKind,
    pub name: String,
    pub props: ResultObject<'static>,
}

/// Schema of a resource kind
pub fn schema(kind: ResourceKind) -> &'static Config {
    match kind {
        ResourceKind::MimeType => &kinds::MIME,
        ResourceKind::Role => &kinds::ROLE,
        ResourceKind::User => &kinds::USER,
    }
}

impl Resource {
    /// Queue what is needed to converge this resource
    pub fn setup(&self, planner: &mut Planner<'_>) -> Result<()> {
        let label = self.kind.label();
        planner.check(0, &format!("the {label}: {}", self.name));
        let url = format!("/{}/{}/properties", self.kind.segment(), encode(&self.name));

        let Some(actual) = planner.fetch(&url)? else {
            planner.added(0, label, &self.name);
            planner.add(Action::CreateResource {
                kind: self.kind,
                name: self.name.clone(),
                body: Value::Object(self.props.render()),
            });
            return Ok(());
        };

        let changes = propschema::diff(&self.props, &actual)
            .map_err(|e| Error::schema(format!("{label} {}", self.name), e))?;
        for change in changes {
            planner.added(1, "property", &change.property);
            planner.add(Action::UpdateResourceProperty {
                kind: self.kind,
                name: self.name.clone(),
                property: change.property,
                body: Value::Object(change.body),
            });
        }
        Ok(())
    }
}
