//! Typed views over the controller's generic state records.
//!
//! The controller reports every entity as the same `entity_id`/`state`/`attributes`
//! record. This module turns those records into the two shapes the gateway
//! exposes: [`Switch`] (switches, lights, boolean states) and [`Scene`].

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// A state record as returned by `GET /api/states`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawEntity {
    pub entity_id: String,
    /// A missing or `null` state reads as "".
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: RawAttributes,
}

/// The subset of attributes the gateway reads. Everything else is ignored,
/// and so is a known attribute that is not a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawAttributes {
    #[serde(default, deserialize_with = "string_or_none")]
    pub friendly_name: Option<String>,

    /// Last run of a script, RFC 3339. `null` until the script has run once.
    #[serde(default, deserialize_with = "string_or_none")]
    pub last_triggered: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D>(deserializer: D) -> Result<RawAttributes, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawAttributes>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(Some(value)),
        _ => Ok(None),
    }
}

impl RawEntity {
    /// Decode one element of a state list.
    pub fn from_value(value: Value) -> Result<Self, EntityError> {
        serde_json::from_value(value).map_err(EntityError::MalformedRecord)
    }

    /// Friendly name, falling back to the entity id when the controller has none.
    pub fn friendly_name(&self) -> String {
        self.attributes
            .friendly_name
            .clone()
            .unwrap_or_else(|| self.entity_id.clone())
    }
}

/// Anything addressable by its entity id.
pub trait HasId {
    fn id(&self) -> &str;
}

/// Binary state of a scene or the desired state of a switch command.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OnOff {
    On,
    Off,
}

/// A switch, light or boolean state as exposed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Switch {
    pub id: String,
    pub friendly_name: String,
    /// Upstream state verbatim, usually "on" or "off" but also "unavailable" and friends.
    pub state: String,
}

impl Switch {
    pub fn from_raw(raw: RawEntity) -> Result<Self, EntityError> {
        Ok(Self {
            friendly_name: raw.friendly_name(),
            id: raw.entity_id,
            state: raw.state,
        })
    }
}

impl HasId for Switch {
    fn id(&self) -> &str {
        &self.id
    }
}

/// How a deployment models its scenes on the controller.
///
/// Chosen once per deployment; it decides the entity prefix, where the
/// activation timestamp lives and how a scene is started.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SceneMode {
    /// `script.*` entities, timestamp in `attributes.last_triggered`.
    #[default]
    Script,
    /// `scene.*` entities, timestamp in the top-level `state`.
    Scene,
}

impl SceneMode {
    pub fn prefix(self) -> &'static str {
        match self {
            SceneMode::Script => "script.",
            SceneMode::Scene => "scene.",
        }
    }

    fn timestamp(self, raw: &RawEntity) -> Option<&str> {
        let value = match self {
            SceneMode::Script => raw.attributes.last_triggered.as_deref()?,
            SceneMode::Scene => raw.state.as_str(),
        };

        match value {
            "" | "unknown" | "unavailable" => None,
            value => Some(value),
        }
    }

    fn check_prefix(self, entity_id: &str) -> Result<(), EntityError> {
        if entity_id.starts_with(self.prefix()) {
            Ok(())
        } else {
            Err(EntityError::InvalidEntityKind {
                entity_id: entity_id.to_string(),
                expected_prefix: self.prefix(),
            })
        }
    }
}

/// A scene together with the moment it was last activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRecord {
    pub id: String,
    pub friendly_name: String,
    pub last_activated: DateTime<Utc>,
}

impl SceneRecord {
    pub fn from_raw(raw: RawEntity, mode: SceneMode) -> Result<Self, EntityError> {
        mode.check_prefix(&raw.entity_id)?;

        let value = mode
            .timestamp(&raw)
            .ok_or_else(|| EntityError::MissingTimestamp {
                entity_id: raw.entity_id.clone(),
            })?;

        let last_activated = DateTime::parse_from_rfc3339(value)
            .map_err(|source| EntityError::MalformedTimestamp {
                entity_id: raw.entity_id.clone(),
                value: value.to_string(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Self {
            friendly_name: raw.friendly_name(),
            id: raw.entity_id,
            last_activated,
        })
    }
}

impl HasId for SceneRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A scene as exposed by the gateway. `state` is derived, see [`crate::scene::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub friendly_name: String,
    pub state: OnOff,
}

impl Scene {
    /// The scene that was just started. It is "on" by definition, so the
    /// activation timestamp is not required here.
    pub fn activated(raw: RawEntity, mode: SceneMode) -> Result<Self, EntityError> {
        mode.check_prefix(&raw.entity_id)?;

        Ok(Self {
            friendly_name: raw.friendly_name(),
            id: raw.entity_id,
            state: OnOff::On,
        })
    }
}

impl HasId for Scene {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Deserialize a batch, dropping the records that do not fit.
pub fn deserialize_all<R, T, F>(raws: Vec<R>, deserialize: F) -> Vec<T>
where
    F: Fn(R) -> Result<T, EntityError>,
{
    raws.into_iter()
        .filter_map(|raw| match deserialize(raw) {
            Ok(entity) => Some(entity),
            Err(e) => {
                debug!("Skipping entity: {}", e);
                None
            }
        })
        .collect()
}

/// Rejection of a single upstream record.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("{entity_id} is not a {expected_prefix}* entity")]
    InvalidEntityKind {
        entity_id: String,
        expected_prefix: &'static str,
    },

    #[error("{entity_id} has never been activated")]
    MissingTimestamp { entity_id: String },

    #[error("malformed state record: {0}")]
    MalformedRecord(#[source] serde_json::Error),

    #[error("{entity_id} has malformed timestamp {value:?}: {source}")]
    MalformedTimestamp {
        entity_id: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}
