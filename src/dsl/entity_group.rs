use crate::script::{order, quote_identifier, EntityScripts, ScriptContainer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Named set of entity references, e.g. `cluster('c').database('db')`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityGroup {
    pub members: Vec<String>,
}

impl EntityGroup {
    pub fn member_set(&self) -> BTreeSet<&str> {
        self.members.iter().map(|m| m.trim()).collect()
    }
}

impl EntityScripts for EntityGroup {
    fn create_scripts(&self, name: &str) -> Vec<ScriptContainer> {
        let members: Vec<&str> = self.members.iter().map(|m| m.trim()).collect();
        vec![ScriptContainer::new(
            "CreateOrAlterEntityGroup",
            order::ENTITY_GROUP,
            format!(
                ".create-or-alter entity_group {} ({})",
                quote_identifier(name),
                members.join(", ")
            ),
        )]
    }
}
