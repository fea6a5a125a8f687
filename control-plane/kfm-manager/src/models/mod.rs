use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Paging, search and ordering arguments of a list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListArguments {
    /// 1-based. `0` is read as the first page.
    pub page: u64,
    pub size: u64,
    #[serde(default)]
    pub search: String,
    /// Entries of the form `<column> [asc|desc]`. Empty means `name asc`.
    #[serde(default)]
    pub order_by: Vec<String>,
}

impl Default for ListArguments {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            search: String::new(),
            order_by: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PagingMeta {
    pub page: u64,
    pub size: u64,
    pub total: u64,
}
