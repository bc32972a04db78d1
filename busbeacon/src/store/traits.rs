//! Store adapter trait.

use std::future::Future;
use std::sync::Arc;

use futures::stream::BoxStream;

use super::error::StoreError;
use super::timestamp::TimestampMode;
use crate::record::{BusRecord, RecordPatch};

/// Stream of full-record snapshots delivered by a push subscription.
///
/// `Ok(None)` means the document does not exist (yet).
pub type RecordStream = BoxStream<'static, Result<Option<BusRecord>, StoreError>>;

/// Interface to the external key-path document store.
///
/// Implementations must:
/// - return `Ok(None)` from `read` when the path holds no document
/// - merge on `update` (fields omitted from the patch are left untouched)
/// - overwrite on `replace`
/// - stamp `lastUpdatedAt` on every write, using server time when available
///
/// The store assumes a single producer writes at a time. Concurrent producers
/// interleave last-write-wins with no conflict detection.
pub trait RecordStore: Send + Sync + 'static {
    /// Fetch the document at `path`. Every call is a fresh fetch.
    fn read(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<BusRecord>, StoreError>> + Send;

    /// Merge `patch` into the document at `path`.
    fn update(
        &self,
        path: &str,
        patch: &RecordPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replace the document at `path` with `record`.
    fn replace(
        &self,
        path: &str,
        record: &BusRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Subscribe to full-record snapshots of `path`.
    ///
    /// The first item is the current state. Dropping the stream ends the
    /// subscription.
    fn subscribe(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<RecordStream, StoreError>> + Send;

    /// How this backend stamps `lastUpdatedAt`.
    fn timestamp_mode(&self) -> TimestampMode;
}

impl<S: RecordStore> RecordStore for Arc<S> {
    fn read(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<BusRecord>, StoreError>> + Send {
        (**self).read(path)
    }

    fn update(
        &self,
        path: &str,
        patch: &RecordPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).update(path, patch)
    }

    fn replace(
        &self,
        path: &str,
        record: &BusRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).replace(path, record)
    }

    fn subscribe(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<RecordStream, StoreError>> + Send {
        (**self).subscribe(path)
    }

    fn timestamp_mode(&self) -> TimestampMode {
        (**self).timestamp_mode()
    }
}
