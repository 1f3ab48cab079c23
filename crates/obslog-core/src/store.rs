//! The `MessageStore` trait.
//!
//! Implemented by storage backends (e.g. `obslog-store-sqlite`). The HTTP
//! layer depends on this abstraction, not on any concrete backend.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  message::{Message, MessageChanges, NewMessage},
  query::MessageQuery,
};

/// Abstraction over an exposure-log message store backend.
///
/// Messages are write-once: the only mutation a backend may perform is
/// the single `date_invalidated: null -> timestamp` transition, and that
/// only through [`MessageStore::invalidate_message`] or as the parent
/// half of [`MessageStore::edit_message`].
pub trait MessageStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new message and return it. The store assigns `id` and
  /// `date_added`; the message starts with `date_invalidated` null.
  fn add_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Retrieve a message by id. Returns `None` if not found.
  fn get_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Soft-delete a message by setting `date_invalidated` to the current
  /// time, if it is still null. Idempotent: invalidating an already
  /// invalidated message leaves its timestamp untouched and succeeds.
  ///
  /// Returns the post-update message, or `None` if the id is unknown.
  fn invalidate_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Supersede a message: atomically create a child message (the parent's
  /// fields overridden by `changes`, with `parent_id` linking back) and
  /// invalidate the parent.
  ///
  /// Returns the child, or `None` if `parent_id` is unknown.
  fn edit_message(
    &self,
    parent_id: Uuid,
    changes: MessageChanges,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// Search for messages matching `query`, in its validated order,
  /// paginated. No matches is an empty vec, not an error.
  fn find_messages<'a>(
    &'a self,
    query: &'a MessageQuery,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;
}
