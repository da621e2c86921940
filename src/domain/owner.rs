use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;

/// Account holder that receives reports. Authentication lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Owner {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl Owner {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
        }
    }
}

impl Identifiable for Owner {
    fn id(&self) -> Uuid {
        self.id
    }
}
