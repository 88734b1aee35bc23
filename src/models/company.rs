use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct UpdatingCompany {
    pub id: i64,
    pub name: String,
}
