use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RowVersion;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub user_id: Uuid,
    pub company_id: i64,
    pub is_default: bool,
    pub row_version: RowVersion,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}

/// Key under which person names are compared: trimmed, lowercase.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct NewPerson {
    pub name: String,
    pub user_id: Uuid,
    pub company_id: i64,
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatingPerson {
    pub name: String,
    pub email: String,
    pub password: String,
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct UpdatingPerson {
    pub id: i64,
    pub name: String,
    pub row_version: Option<RowVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonBasic {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonDetailed {
    pub id: i64,
    pub name: String,
    pub company_id: i64,
    pub is_default: bool,
    pub row_version: RowVersion,
}

impl From<Person> for PersonBasic {
    fn from(person: Person) -> Self {
        Self {
            id: person.id,
            name: person.name,
        }
    }
}

impl From<Person> for PersonDetailed {
    fn from(person: Person) -> Self {
        Self {
            id: person.id,
            name: person.name,
            company_id: person.company_id,
            is_default: person.is_default,
            row_version: person.row_version,
        }
    }
}
