use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Patient {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            phone: None,
            email: None,
        }
    }

    /// Preferred contact channel: phone first, then email.
    pub fn contact(&self) -> Option<&str> {
        self.phone.as_deref().or(self.email.as_deref())
    }
}
