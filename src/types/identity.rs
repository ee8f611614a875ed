//! User/device identity attached to every queued call.
//!
//! An identity names who (or which device) an event or property set is
//! attributed to. At least one of the two identifiers must be present;
//! constructing an identity with neither is rejected at construction time,
//! before anything reaches the queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when constructing an [`Identity`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Neither `user_id` nor `device_id` was provided.
    #[error("identity requires at least one of user_id or device_id")]
    MissingIdentifiers,
}

/// The user/device pair an event or property set is attributed to.
///
/// Identities are immutable value types. Each queued call keeps its own
/// snapshot of the identity it was created with, so later identity changes
/// never retroactively alter already-queued calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier for the user, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Identifier for the device the user is on, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Identity {
    /// Creates an identity from optional user and device identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::MissingIdentifiers`] if both are `None`.
    pub fn new(
        user_id: Option<String>,
        device_id: Option<String>,
    ) -> Result<Self, IdentityError> {
        if user_id.is_none() && device_id.is_none() {
            return Err(IdentityError::MissingIdentifiers);
        }
        Ok(Identity { user_id, device_id })
    }

    /// Creates an identity from a user identifier alone.
    pub fn from_user_id(user_id: impl Into<String>) -> Self {
        Identity {
            user_id: Some(user_id.into()),
            device_id: None,
        }
    }

    /// Creates an identity from a device identifier alone.
    pub fn from_device_id(device_id: impl Into<String>) -> Self {
        Identity {
            user_id: None,
            device_id: Some(device_id.into()),
        }
    }
}
