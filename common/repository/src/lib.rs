//! Tenant-scoped data access contract shared by every domain collaborator
//! (courses, grades, fees, timetables, exams, ...). No domain schema lives
//! here — only the uniform CRUD-plus-transaction surface those collaborators
//! implement, so that "every repository call carries a tenant id" is a
//! property of the trait signature, not a convention reviewers have to
//! remember to check.

use async_trait::async_trait;
use eduhub_http_errors::ApiError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Wraps a tenant's id so it can never be mistaken for any other `Uuid`
/// argument in a repository call, and so a method that "forgot" to scope by
/// tenant is a missing-argument compile error rather than a missing `WHERE`
/// clause a reviewer has to spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error("conflict on {field}")]
    Conflict { field: &'static str },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { resource } => ApiError::NotFound { resource },
            RepositoryError::Conflict { field } => ApiError::Conflict { field },
            RepositoryError::Database(cause) => ApiError::internal(cause),
        }
    }
}

/// One-indexed page request. `offset`/`limit` translate it to the SQL a
/// repository actually binds.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number: number.max(1), size: size.max(1) }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) as i64 * self.size as i64
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }
}

/// Matches the paged-list response envelope every list endpoint returns.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

/// Uniform tenant-scoped CRUD surface. Every method's first parameter
/// (after `self`) is a `TenantId`; implementors append `WHERE tenant_id =
/// $1` to every read and set/filter on `tenant_id` for every write. A
/// repository that accepted an untenanted query would not satisfy this
/// trait's shape, which is the point.
#[async_trait]
pub trait Repository: Send + Sync {
    type Row: Send + Unpin;
    type Id: Send + Copy;
    type NewRow: Send;
    type Patch: Send;

    async fn find(&self, tenant: TenantId, id: Self::Id) -> RepositoryResult<Option<Self::Row>>;

    async fn list(&self, tenant: TenantId, page: Page) -> RepositoryResult<Paged<Self::Row>>;

    async fn insert(&self, tenant: TenantId, new_row: Self::NewRow) -> RepositoryResult<Self::Row>;

    async fn update(
        &self,
        tenant: TenantId,
        id: Self::Id,
        patch: Self::Patch,
    ) -> RepositoryResult<Self::Row>;

    async fn delete(&self, tenant: TenantId, id: Self::Id) -> RepositoryResult<()>;
}

/// A per-request transaction handle. Callers must call `commit()`
/// explicitly; dropping the scope without committing rolls the underlying
/// transaction back (sqlx's own `Transaction::drop` issues the `ROLLBACK`),
/// so an early return from a handler never leaves a half-applied write.
pub struct TransactionScope {
    tx: Option<Transaction<'static, Postgres>>,
}

impl TransactionScope {
    pub async fn begin(pool: &PgPool) -> RepositoryResult<Self> {
        Ok(Self { tx: Some(pool.begin().await?) })
    }

    pub fn as_mut(&mut self) -> &mut Transaction<'static, Postgres> {
        self.tx.as_mut().expect("transaction scope already finished")
    }

    pub async fn commit(mut self) -> RepositoryResult<()> {
        let tx = self.tx.take().expect("transaction scope already finished");
        tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(mut self) -> RepositoryResult<()> {
        let tx = self.tx.take().expect("transaction scope already finished");
        tx.rollback().await?;
        Ok(())
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!("transaction scope dropped without explicit commit; rolling back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_is_zero_indexed_from_a_one_indexed_page_number() {
        let page = Page::new(1, 20);
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit(), 20);

        let page = Page::new(3, 20);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn page_number_and_size_are_clamped_to_at_least_one() {
        let page = Page::new(0, 0);
        assert_eq!(page.number, 1);
        assert_eq!(page.size, 1);
    }

    #[test]
    fn not_found_maps_to_the_canonical_not_found_code() {
        let err: ApiError = RepositoryError::NotFound { resource: "course" }.into();
        assert_eq!(err.code(), eduhub_http_errors::codes::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_the_canonical_conflict_code() {
        let err: ApiError = RepositoryError::Conflict { field: "enrollment_code" }.into();
        assert_eq!(err.code(), eduhub_http_errors::codes::CONFLICT);
    }
}
