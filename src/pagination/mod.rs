//! Pagination module
//!
//! Supports: Cursor, Offset, Page Number, Link Header, Next URL, or any
//! closure computing the next request.
//!
//! # Overview
//!
//! The `Paginator` issues the first request and then hands every page, along
//! with the document accumulated so far, to a `NextRequest` implementation.
//! That implementation returns either the next request or `NextPage::Done`.
//! Pages are folded together with a `MergeStrategy`.

mod paginator;
mod strategies;
mod types;

pub use paginator::{PaginationPlan, Paginator};
pub use strategies::{
    parse_link_header, CursorPaginator, LinkHeaderPaginator, NextUrlPaginator, OffsetPaginator,
    PageNumberPaginator,
};
pub use types::{
    unwrap_payload, MergeStrategy, NextPage, NextRequest, Page, PaginationConfig, StopCondition,
    StrategyConfig,
};
