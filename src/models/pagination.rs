use serde::{Deserialize, Serialize};

/// 1-indexed page request. Results are ordered by id ascending.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub page_size: i64,
    pub page_number: i64,
}

impl Pagination {
    pub fn new(page_size: i64, page_number: i64) -> Self {
        Self {
            page_size,
            page_number,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.page_size < 1 {
            return Err("page_size must be at least 1".to_string());
        }
        if self.page_number < 1 {
            return Err("page_number must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        self.page_size.saturating_mul(self.page_number - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub total_registers: i64,
    pub result: Vec<T>,
}
