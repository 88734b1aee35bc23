use serde::{Deserialize, Serialize};

/// Concurrency token carried by every versioned row.
///
/// The store bumps it on each mutation. Clients echo back the value they last
/// read; a write presenting any other value is rejected at flush time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct RowVersion(pub i64);

impl RowVersion {
    pub const INITIAL: RowVersion = RowVersion(1);

    pub fn next(self) -> Self {
        RowVersion(self.0 + 1)
    }
}

impl std::fmt::Display for RowVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
