use crate::auth::AuthUser;
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Guard for admin-only operations that share a path with reseller-facing
/// methods.
pub fn ensure_admin(auth: &AuthUser) -> Result<(), ServiceError> {
    if !auth.is_admin() {
        return Err(ServiceError::Forbidden("admin access required".to_string()));
    }
    Ok(())
}

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Pagination metadata in the shape the dashboard expects.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page: u64,
    pub previous_page: u64,
}

impl Pagination {
    pub fn new(page: u64, page_size: u64, total: u64) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_pages = total.div_ceil(page_size);
        let has_next = page < total_pages;
        let has_previous = page > 1 && total_pages > 0;

        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next,
            has_previous,
            next_page: if has_next { page + 1 } else { page },
            previous_page: if has_previous { page - 1 } else { page },
        }
    }
}

/// `{ "data": ... }` envelope for single resources and mutations.
#[derive(Debug, Serialize, ToSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// `{ "data": [...], "pagination": {...} }` envelope for list endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u64, page_size: u64, total: u64) -> Self {
        Self {
            data,
            pagination: Pagination::new(page, page_size, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let p = Pagination::new(1, 10, 35);
        assert_eq!(p.total_pages, 4);
        assert!(p.has_next);
        assert!(!p.has_previous);
        assert_eq!(p.next_page, 2);
        assert_eq!(p.previous_page, 1);

        let p = Pagination::new(4, 10, 35);
        assert!(!p.has_next);
        assert!(p.has_previous);
        assert_eq!(p.next_page, 4);
        assert_eq!(p.previous_page, 3);
    }

    #[test]
    fn pagination_empty_set() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_previous);
    }
}
