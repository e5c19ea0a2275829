//! The operations the gateway offers, independent of HTTP framing.
//!
//! Every listing follows the same pipeline: fetch all states, deserialize the
//! records that fit, (for scenes) resolve the active one, then filter and
//! order by the category's allow-list. Every command is checked against the
//! allow-list before the controller is contacted.

use std::sync::Arc;

use tracing::debug;
use tracing::info;

use crate::catalog::Catalog;
use crate::catalog::EntityCategory;
use crate::catalog::SwitchCatalog;
use crate::entity::deserialize_all;
use crate::entity::EntityError;
use crate::entity::OnOff;
use crate::entity::RawEntity;
use crate::entity::Scene;
use crate::entity::SceneRecord;
use crate::entity::Switch;
use crate::routing::ServiceCall;
use crate::scene;
use crate::upstream::Upstream;
use crate::upstream::UpstreamError;

pub struct Gateway<U> {
    upstream: U,
    catalog: Arc<Catalog>,
}

impl<U: Upstream> Gateway<U> {
    pub fn new(upstream: U, catalog: Arc<Catalog>) -> Self {
        Self { upstream, catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Fetch every entity and keep those `deserialize` accepts.
    async fn fetch<T, F>(&self, deserialize: F) -> Result<Vec<T>, GatewayError>
    where
        F: Fn(RawEntity) -> Result<T, EntityError>,
    {
        let raws = self.upstream.fetch_all().await?;
        Ok(deserialize_all(raws, deserialize))
    }

    /// Allowed scenes, in allow-list order, with the most recently started one "on".
    pub async fn list_scenes(&self) -> Result<Vec<Scene>, GatewayError> {
        let scenes = &self.catalog.scenes;
        let records = self
            .fetch(|raw| SceneRecord::from_raw(raw, scenes.mode))
            .await?;

        // Resolve before filtering: a newer scene outside the allow-list still
        // turns the allowed ones off.
        let resolution = scene::resolve(records);
        debug!("Current scene: {:?}", resolution.current);

        Ok(scenes.allow.filter(resolution.scenes))
    }

    pub async fn list_switches(&self) -> Result<Vec<Switch>, GatewayError> {
        self.list_switchable(&self.catalog.switches).await
    }

    pub async fn list_lights(&self) -> Result<Vec<Switch>, GatewayError> {
        self.list_switchable(&self.catalog.lights).await
    }

    pub async fn list_boolean_states(&self) -> Result<Vec<Switch>, GatewayError> {
        self.list_switchable(&self.catalog.states).await
    }

    async fn list_switchable(&self, section: &SwitchCatalog) -> Result<Vec<Switch>, GatewayError> {
        let switches = self.fetch(Switch::from_raw).await?;
        Ok(section.allow.filter(switches))
    }

    pub async fn start_scene(&self, entity_id: &str) -> Result<Scene, GatewayError> {
        let scenes = &self.catalog.scenes;
        if !scenes.allow.contains(entity_id) {
            return Err(GatewayError::forbidden(EntityCategory::Scenes, entity_id));
        }

        info!("Starting scene {}", entity_id);
        let call = ServiceCall::activate_scene(scenes.mode, entity_id);
        let raw = self.invoke_and_read_back(&call).await?;

        Ok(Scene::activated(raw, scenes.mode)?)
    }

    pub async fn set_switch(
        &self,
        entity_id: &str,
        desired: OnOff,
    ) -> Result<Switch, GatewayError> {
        self.set_switchable(EntityCategory::Switches, &self.catalog.switches, entity_id, desired)
            .await
    }

    pub async fn set_light(&self, entity_id: &str, desired: OnOff) -> Result<Switch, GatewayError> {
        self.set_switchable(EntityCategory::Lights, &self.catalog.lights, entity_id, desired)
            .await
    }

    pub async fn set_boolean_state(
        &self,
        entity_id: &str,
        desired: OnOff,
    ) -> Result<Switch, GatewayError> {
        self.set_switchable(EntityCategory::States, &self.catalog.states, entity_id, desired)
            .await
    }

    async fn set_switchable(
        &self,
        category: EntityCategory,
        section: &SwitchCatalog,
        entity_id: &str,
        desired: OnOff,
    ) -> Result<Switch, GatewayError> {
        // Allowed ids always have a route, see RoutingTable::build
        let domain = match section.routes.domain_for(entity_id) {
            Some(domain) if section.allow.contains(entity_id) => domain,
            _ => return Err(GatewayError::forbidden(category, entity_id)),
        };

        info!("Turning {} {} ({})", entity_id, desired, domain);
        let call = ServiceCall::turn(domain, entity_id, desired);
        let raw = self.invoke_and_read_back(&call).await?;

        Ok(Switch::from_raw(raw)?)
    }

    /// Run `call`, then read the entity back if the response did not report it.
    async fn invoke_and_read_back(&self, call: &ServiceCall) -> Result<RawEntity, GatewayError> {
        match self.upstream.invoke(call).await? {
            Some(raw) => Ok(raw),
            None => {
                debug!(
                    "Response to {} did not include {}, reading it back",
                    call.path(),
                    call.entity_id
                );
                Ok(self.upstream.fetch_one(&call.entity_id).await?)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{entity_id} is not an exposed entity of {category}")]
    Forbidden {
        category: EntityCategory,
        entity_id: String,
    },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

impl GatewayError {
    fn forbidden(category: EntityCategory, entity_id: &str) -> Self {
        GatewayError::Forbidden {
            category,
            entity_id: entity_id.to_string(),
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, GatewayError::Forbidden { .. })
    }
}
