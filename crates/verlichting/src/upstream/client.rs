use async_trait::async_trait;

use super::UpstreamError;
use crate::entity::RawEntity;
use crate::routing::ServiceCall;

/// Operations the gateway needs from the controller.
///
/// This trait allows for substituting the controller in tests.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Every entity the controller knows about (`GET /api/states`).
    async fn fetch_all(&self) -> Result<Vec<RawEntity>, UpstreamError>;

    /// A single entity (`GET /api/states/{entity_id}`).
    async fn fetch_one(&self, entity_id: &str) -> Result<RawEntity, UpstreamError>;

    /// Run a service call and return the refreshed state of its entity.
    ///
    /// Returns the entity matching `call.entity_id` from the response, or
    /// `None` when the response does not report it.
    async fn invoke(&self, call: &ServiceCall) -> Result<Option<RawEntity>, UpstreamError>;
}

/// Pick the entity a service-call response reports for `entity_id`.
pub fn select_target(entities: Vec<RawEntity>, entity_id: &str) -> Option<RawEntity> {
    entities
        .into_iter()
        .find(|entity| entity.entity_id == entity_id)
}

/// Mock controller for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockUpstream {
    pub states: Vec<RawEntity>,
    pub invoke_response: Vec<RawEntity>,
    /// Status every call fails with, if set
    pub fail_status: Option<u16>,
    pub calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(states: Vec<RawEntity>) -> Self {
        Self {
            states,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, endpoint: String) -> Result<(), UpstreamError> {
        self.calls.lock().unwrap().push(endpoint.clone());
        match self.fail_status {
            Some(status) => Err(UpstreamError::Status { status, endpoint }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Upstream for MockUpstream {
    async fn fetch_all(&self) -> Result<Vec<RawEntity>, UpstreamError> {
        self.record("GET /api/states".to_string())?;
        Ok(self.states.clone())
    }

    async fn fetch_one(&self, entity_id: &str) -> Result<RawEntity, UpstreamError> {
        let endpoint = format!("GET /api/states/{entity_id}");
        self.record(endpoint.clone())?;
        self.states
            .iter()
            .find(|entity| entity.entity_id == entity_id)
            .cloned()
            .ok_or(UpstreamError::Status {
                status: 404,
                endpoint,
            })
    }

    async fn invoke(&self, call: &ServiceCall) -> Result<Option<RawEntity>, UpstreamError> {
        self.record(format!("POST {}", call.path()))?;
        Ok(select_target(self.invoke_response.clone(), &call.entity_id))
    }
}
