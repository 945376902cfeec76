//! Book inventory: copy-count bookkeeping
//!
//! Storage only accepts copy-count changes as a [`CopyAdjustment`], and only
//! this module can build one. Everything that changes `available_copies`
//! therefore goes through [`BookInventory`].

use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::book::Book,
    repository::UnitOfWork,
};

/// A change to a book's copy counts, applied by storage atomically and only
/// if the result keeps `0 <= available <= total` and `total >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyAdjustment {
    available: i32,
    total: i32,
}

impl CopyAdjustment {
    pub fn available_delta(&self) -> i32 {
        self.available
    }

    pub fn total_delta(&self) -> i32 {
        self.total
    }

    /// New `(available, total)` counts, or `None` if the guard does not hold
    pub fn apply(&self, available: i32, total: i32) -> Option<(i32, i32)> {
        let available = available + self.available;
        let total = total + self.total;
        (total >= 1 && available >= 0 && available <= total).then_some((available, total))
    }
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("No copies of book {0} are available")]
    NoCopiesAvailable(Uuid),

    #[error("All copies of book {0} are already available")]
    AllCopiesAlreadyAvailable(Uuid),

    #[error("Book {book_id} has {checked_out} copies checked out, cannot set total to {requested}")]
    CopiesCheckedOut {
        book_id: Uuid,
        checked_out: i32,
        requested: i32,
    },

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<InventoryError> for AppError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::NoCopiesAvailable(_) => AppError::BookUnavailable(e.to_string()),
            InventoryError::AllCopiesAlreadyAvailable(_) => AppError::InconsistentState(e.to_string()),
            InventoryError::CopiesCheckedOut { .. } => AppError::Validation(e.to_string()),
            InventoryError::Store(inner) => inner,
        }
    }
}

/// Copy-count mutators, reachable only from the reservation coordinator
/// and the catalog inside `services`. Code outside cannot move a copy
/// without a ledger record:
///
/// ```compile_fail
/// use libris_server::{repository::UnitOfWork, services::inventory::BookInventory};
///
/// async fn sneak_back(uow: &mut dyn UnitOfWork, book_id: uuid::Uuid) {
///     let _ = BookInventory.return_copy(uow, book_id).await;
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BookInventory;

impl BookInventory {
    pub fn is_available(book: &Book) -> bool {
        book.is_available()
    }

    /// Take one copy of a book. Locks the book row for the rest of the unit of work.
    pub(in crate::services) async fn reserve_copy(
        &self,
        uow: &mut dyn UnitOfWork,
        book_id: Uuid,
    ) -> Result<Book, InventoryError> {
        let book = uow.book_for_update(book_id).await?;
        if !Self::is_available(&book) {
            return Err(InventoryError::NoCopiesAvailable(book_id));
        }

        let adjustment = CopyAdjustment { available: -1, total: 0 };
        uow.book_adjust_copies(book_id, &adjustment)
            .await?
            .ok_or(InventoryError::NoCopiesAvailable(book_id))
    }

    /// Give one copy back
    pub(in crate::services) async fn return_copy(
        &self,
        uow: &mut dyn UnitOfWork,
        book_id: Uuid,
    ) -> Result<Book, InventoryError> {
        let book = uow.book_for_update(book_id).await?;
        if book.available_copies >= book.total_copies {
            return Err(InventoryError::AllCopiesAlreadyAvailable(book_id));
        }

        let adjustment = CopyAdjustment { available: 1, total: 0 };
        uow.book_adjust_copies(book_id, &adjustment)
            .await?
            .ok_or(InventoryError::AllCopiesAlreadyAvailable(book_id))
    }

    /// Change the number of owned copies, keeping checked-out copies checked out
    pub(in crate::services) async fn resize(
        &self,
        uow: &mut dyn UnitOfWork,
        book_id: Uuid,
        new_total: i32,
    ) -> Result<Book, InventoryError> {
        let book = uow.book_for_update(book_id).await?;
        if new_total == book.total_copies {
            return Ok(book);
        }

        let checked_out = book.checked_out();
        if new_total < checked_out.max(1) {
            return Err(InventoryError::CopiesCheckedOut {
                book_id,
                checked_out,
                requested: new_total,
            });
        }

        let delta = new_total - book.total_copies;
        let adjustment = CopyAdjustment { available: delta, total: delta };
        uow.book_adjust_copies(book_id, &adjustment)
            .await?
            .ok_or(InventoryError::CopiesCheckedOut {
                book_id,
                checked_out,
                requested: new_total,
            })
    }
}
