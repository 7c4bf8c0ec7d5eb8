use serde::{Deserialize, Serialize};

use super::Role;

/// Profile record as stored by the backend.
///
/// Every field is optional on the wire; a freshly registered user only has
/// the profile shell written at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub college_name: Option<String>,
    pub year: Option<String>,
    pub subject: Option<String>,
    pub roll_number: Option<String>,
}

impl Profile {
    /// Minimum trimmed length of `name`.
    pub const MIN_NAME_LEN: usize = 2;

    /// Whether every field `role` requires is filled in. No partial credit.
    pub fn is_complete_for(&self, role: Role) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .map(|n| n.trim().chars().count() >= Self::MIN_NAME_LEN)
            .unwrap_or(false);

        if !name_ok {
            return false;
        }

        match role {
            Role::Teacher => filled(&self.college_name),
            Role::Student => {
                filled(&self.year) && filled(&self.subject) && filled(&self.roll_number)
            }
        }
    }
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.is_empty())
}
