//! The immutable set of exposed entities for one deployment.

use crate::allowlist::AllowList;
use crate::entity::EntityError;
use crate::entity::SceneMode;
use crate::routing::DomainPolicy;
use crate::routing::RoutingError;
use crate::routing::RoutingTable;

/// The four groups of entities the gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Scenes,
    Switches,
    Lights,
    /// Boolean helpers (`input_boolean.*`).
    States,
}

#[derive(Debug, Clone, Default)]
pub struct SceneCatalog {
    pub allow: AllowList,
    pub mode: SceneMode,
}

impl SceneCatalog {
    /// Every allowed scene must carry the prefix of `mode`.
    pub fn new(allow: AllowList, mode: SceneMode) -> Result<Self, EntityError> {
        if let Some(entity_id) = allow.iter().find(|id| !id.starts_with(mode.prefix())) {
            return Err(EntityError::InvalidEntityKind {
                entity_id: entity_id.to_string(),
                expected_prefix: mode.prefix(),
            });
        }

        Ok(Self { allow, mode })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwitchCatalog {
    pub allow: AllowList,
    pub routes: RoutingTable,
}

impl SwitchCatalog {
    pub fn new(allow: AllowList, policy: DomainPolicy) -> Result<Self, RoutingError> {
        let routes = RoutingTable::build(&allow, policy)?;
        Ok(Self { allow, routes })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub scenes: SceneCatalog,
    pub switches: SwitchCatalog,
    pub lights: SwitchCatalog,
    pub states: SwitchCatalog,
}

impl Catalog {
    pub fn allow_list(&self, category: EntityCategory) -> &AllowList {
        match category {
            EntityCategory::Scenes => &self.scenes.allow,
            EntityCategory::Switches => &self.switches.allow,
            EntityCategory::Lights => &self.lights.allow,
            EntityCategory::States => &self.states.allow,
        }
    }
}
