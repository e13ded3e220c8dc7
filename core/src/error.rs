use chrono::NaiveDate;
use thiserror::Error;

/// Errors a [`ListStore`](crate::ports::ListStore) reports when creating a list.
///
/// `ListExists` is the uniqueness violation a concurrent get-or-create can hit;
/// callers recover from it by re-reading the winning row.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a shopping list for {user_id} starting {start} already exists")]
    ListExists { user_id: String, start: NaiveDate },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Other(err.into())
    }
}
