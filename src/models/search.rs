//! Request and response shapes for worklist search.

use super::order::{ChangeType, Order, OrderKind};
use crate::constants::PAGE_SIZE;
use crate::state_machine::states::OrderStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Structured filter submitted with a worklist request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Search {
    /// Creation date range `[from, to]`, both inclusive
    pub picker: Vec<NaiveDate>,
    /// Criteria are only applied when the valve is open
    pub valve: bool,
    pub text: Option<String>,
    pub work_id: Option<String>,
    #[serde(rename = "type")]
    pub change_type: Option<ChangeType>,
    pub status: Option<OrderStatus>,
    pub idc: Option<String>,
    pub source: Option<String>,
    pub username: Option<String>,
    #[serde(alias = "dept")]
    pub department: Option<String>,
}

/// One page request for a kind of order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// 1-based; values below 1 read as the first page
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub find: Search,
    #[serde(rename = "tp", default)]
    pub kind: OrderKind,
}

fn first_page() -> u32 {
    1
}

impl SearchRequest {
    pub fn page(kind: OrderKind, page: u32) -> Self {
        Self {
            page,
            find: Search::default(),
            kind,
        }
    }

    pub fn with_filter(mut self, find: Search) -> Self {
        self.find = find;
        self
    }
}

/// Offset/limit derived from a 1-based page number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: PAGE_SIZE,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// Rows for one page plus the count across all pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub rows: Vec<Order>,
}

impl SearchPage {
    pub fn into_list(self, idc: Vec<String>, multi: bool) -> OrderList {
        OrderList {
            page: self.total_count,
            data: self.rows,
            idc,
            multi,
        }
    }
}

/// Worklist response. `page` carries the total match count the UI paginates from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderList {
    pub page: u64,
    pub data: Vec<Order>,
    pub idc: Vec<String>,
    pub multi: bool,
}
