//! Room entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "room")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Join code, matched case-sensitively
    #[sea_orm(unique)]
    pub code: String,

    pub name: String,

    /// Eligible voter emails (JSON array of lower-cased strings)
    #[sea_orm(column_type = "Json")]
    pub allowed_emails: JsonValue,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Decode the allow-list. Malformed entries are ignored.
    #[must_use]
    pub fn allowed_emails(&self) -> Vec<String> {
        self.allowed_emails
            .as_array()
            .map(|emails| {
                emails
                    .iter()
                    .filter_map(|e| e.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `email` is on the allow-list. The caller's email is
    /// lower-cased before comparison.
    #[must_use]
    pub fn allows(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.allowed_emails
            .as_array()
            .is_some_and(|emails| emails.iter().any(|e| e.as_str() == Some(email.as_str())))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::candidate::Entity")]
    Candidates,
    #[sea_orm(has_many = "super::vote_receipt::Entity")]
    VoteReceipts,
}

impl Related<super::candidate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Candidates.def()
    }
}

impl Related<super::vote_receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VoteReceipts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn room_with(emails: JsonValue) -> Model {
        Model {
            id: "room1".to_string(),
            code: "ABC123".to_string(),
            name: "Board election".to_string(),
            allowed_emails: emails,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_allows_lowercases_caller() {
        let room = room_with(json!(["voter@x.com"]));
        assert!(room.allows("voter@x.com"));
        assert!(room.allows("Voter@X.com"));
        assert!(!room.allows("other@x.com"));
    }

    #[test]
    fn test_allows_with_malformed_list() {
        let room = room_with(json!({"not": "a list"}));
        assert!(!room.allows("voter@x.com"));
        assert!(room.allowed_emails().is_empty());
    }

    #[test]
    fn test_allowed_emails_skips_non_strings() {
        let room = room_with(json!(["a@x.com", 42, "b@x.com"]));
        assert_eq!(room.allowed_emails(), vec!["a@x.com", "b@x.com"]);
    }
}
