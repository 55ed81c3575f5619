use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// JWT claims shared between the server (HTTP upgrade validation) and any
/// future surface that needs them. Canonical definition lives here in
/// parley-types. Tokens are issued by the external auth collaborator; this
/// side only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub color: String,
    pub exp: usize,
}

impl Claims {
    /// The display identity these claims carry.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub,
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}
