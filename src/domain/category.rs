//! Owner-scoped expense categories.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::*;

/// Label used for entries without a resolvable category.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub color: String,
}

impl Category {
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            color: random_color(),
        }
    }
}

impl Identifiable for Category {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Owned for Category {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// Pseudo-random `#rrggbb` colour for newly created categories.
pub fn random_color() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    format!("#{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2])
}
