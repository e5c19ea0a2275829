//! Deciding which scene is currently active.
//!
//! The controller has no notion of an "active" scene, only of when each one
//! was last started. The most recently started scene counts as on, every other
//! scene as off.

use crate::entity::OnOff;
use crate::entity::Scene;
use crate::entity::SceneRecord;

/// Result of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Id of the most recently activated scene, `None` when there are no scenes.
    pub current: Option<String>,

    /// One scene per input record, in input order.
    pub scenes: Vec<Scene>,
}

/// Mark the scene with the latest activation "on" and all others "off".
///
/// On equal timestamps the first record in input order wins. An empty input
/// yields an empty resolution.
pub fn resolve(records: Vec<SceneRecord>) -> Resolution {
    let current = records
        .iter()
        .fold(None::<&SceneRecord>, |best, record| match best {
            Some(best) if best.last_activated >= record.last_activated => Some(best),
            _ => Some(record),
        })
        .map(|record| record.id.clone());

    let scenes = records
        .into_iter()
        .map(|record| {
            let state = if current.as_deref() == Some(record.id.as_str()) {
                OnOff::On
            } else {
                OnOff::Off
            };

            Scene {
                id: record.id,
                friendly_name: record.friendly_name,
                state,
            }
        })
        .collect();

    Resolution { current, scenes }
}
