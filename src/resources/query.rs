//! List queries and paginated results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::http::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => f.write_str("asc"),
            OrderDirection::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for OrderDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(OrderDirection::Asc),
            "desc" => Ok(OrderDirection::Desc),
            other => Err(format!("unknown order direction '{}'", other)),
        }
    }
}

/// `GET collection?search&page&per_page&order_by&order_direction`.
///
/// Unset fields are omitted so the backend applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    pub fn order(mut self, order_by: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(order_by.into());
        self.order_direction = Some(direction);
        self
    }

    pub(crate) fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("search", search);
        }
        if let Some(page) = self.page {
            request = request.query("page", page);
        }
        if let Some(per_page) = self.per_page {
            request = request.query("per_page", per_page);
        }
        if let Some(order_by) = &self.order_by {
            request = request.query("order_by", order_by);
        }
        if let Some(direction) = self.order_direction {
            request = request.query("order_direction", direction);
        }
        request
    }
}

/// One page of a collection plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    /// Number of pages at `per_page` items each.
    pub fn page_count(&self, per_page: u32) -> u64 {
        if per_page == 0 {
            return 0;
        }
        self.total_count.div_ceil(u64::from(per_page))
    }
}
