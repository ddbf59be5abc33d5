use serde::{Deserialize, Serialize};

/// Query string for a paginated list request.
#[derive(Debug, Clone, Serialize)]
pub struct PaginationParams {
    pub page: u64,
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl PaginationParams {
    pub fn first_page(per_page: u64) -> Self {
        Self {
            page: 1,
            per_page: per_page.clamp(1, 100),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    #[serde(default)]
    pub total_pages: u64,
}
