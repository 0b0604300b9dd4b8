pub mod attempts;
pub mod learners;
pub mod puzzles;

use sled::transaction::TransactionError;

use crate::store::StoreError;

pub(crate) fn map_transaction_error(error: TransactionError<StoreError>) -> StoreError {
    match error {
        TransactionError::Abort(store_error) => store_error,
        TransactionError::Storage(storage_error) => StoreError::Sled(storage_error),
    }
}
