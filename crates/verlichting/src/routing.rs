//! Mapping exposed entities onto controller service calls.
//!
//! Which service domain handles an entity is settled when the configuration is
//! loaded. At request time a command only looks its entity up in a
//! [`RoutingTable`].

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::allowlist::AllowList;
use crate::entity::OnOff;
use crate::entity::SceneMode;

/// A controller service domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ServiceDomain {
    Switch,
    Light,
    InputBoolean,
    Scene,
    Script,
}

impl ServiceDomain {
    /// Domain named by an entity id's `<domain>.` prefix, if it is one we know.
    pub fn of_entity(entity_id: &str) -> Option<Self> {
        let (domain, _) = entity_id.split_once('.')?;
        domain.parse().ok()
    }

    /// Whether the domain offers `turn_on` and `turn_off`.
    pub fn is_switchable(self) -> bool {
        matches!(
            self,
            ServiceDomain::Switch | ServiceDomain::Light | ServiceDomain::InputBoolean
        )
    }
}

/// How a category of switchable entities picks its service domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum DomainPolicy {
    /// Every entity in the category uses this domain.
    Fixed(ServiceDomain),
    /// Each entity uses the domain of its id prefix (`light.x` -> `light`).
    Infer,
}

impl TryFrom<String> for DomainPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "infer" {
            return Ok(DomainPolicy::Infer);
        }
        value
            .parse()
            .map(DomainPolicy::Fixed)
            .map_err(|_| format!("unknown service domain {value:?}"))
    }
}

/// Resolved service domain for every allowed entity of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: HashMap<String, ServiceDomain>,
}

impl RoutingTable {
    pub fn build(allow: &AllowList, policy: DomainPolicy) -> Result<Self, RoutingError> {
        let mut routes = HashMap::with_capacity(allow.len());

        for entity_id in allow.iter() {
            let domain = match policy {
                DomainPolicy::Fixed(domain) => domain,
                DomainPolicy::Infer => {
                    ServiceDomain::of_entity(entity_id).ok_or_else(|| RoutingError::Uninferable {
                        entity_id: entity_id.to_string(),
                    })?
                }
            };

            if !domain.is_switchable() {
                return Err(RoutingError::NotSwitchable {
                    entity_id: entity_id.to_string(),
                    domain,
                });
            }

            routes.insert(entity_id.to_string(), domain);
        }

        Ok(Self { routes })
    }

    pub fn domain_for(&self, entity_id: &str) -> Option<ServiceDomain> {
        self.routes.get(entity_id).copied()
    }
}

/// One `POST /api/services/{domain}/{service}` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCall {
    pub domain: ServiceDomain,
    pub service: String,

    /// The entity whose state the caller wants back.
    pub entity_id: String,

    /// Whether the entity id goes into the request body. Script runs address
    /// the script through the service name instead.
    pub targeted: bool,
}

impl ServiceCall {
    pub fn turn(domain: ServiceDomain, entity_id: &str, desired: OnOff) -> Self {
        let service = match desired {
            OnOff::On => "turn_on",
            OnOff::Off => "turn_off",
        };

        Self {
            domain,
            service: service.to_string(),
            entity_id: entity_id.to_string(),
            targeted: true,
        }
    }

    pub fn activate_scene(mode: SceneMode, entity_id: &str) -> Self {
        match mode {
            SceneMode::Scene => Self {
                domain: ServiceDomain::Scene,
                service: "turn_on".to_string(),
                entity_id: entity_id.to_string(),
                targeted: true,
            },
            SceneMode::Script => Self {
                domain: ServiceDomain::Script,
                // /services/script/<name> wants the bare script name
                service: entity_id
                    .strip_prefix(mode.prefix())
                    .unwrap_or(entity_id)
                    .to_string(),
                entity_id: entity_id.to_string(),
                targeted: false,
            },
        }
    }

    pub fn path(&self) -> String {
        format!("/api/services/{}/{}", self.domain, self.service)
    }

    pub fn body(&self) -> serde_json::Value {
        if self.targeted {
            json!({ "entity_id": self.entity_id })
        } else {
            json!({})
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("cannot infer a service domain for {entity_id}")]
    Uninferable { entity_id: String },

    #[error("{entity_id} would be routed to {domain}, which cannot be switched on and off")]
    NotSwitchable {
        entity_id: String,
        domain: ServiceDomain,
    },
}
