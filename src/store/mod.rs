//! Record stores. Both the hosted Postgres store and the local JSON backup
//! implement [`RecordStore`]; the facade applies the fallback policy on top.

use async_trait::async_trait;

use crate::error::PersistError;
use crate::models::{Record, RecordKey, RecordKind};

pub mod local;
pub mod remote;

pub use local::LocalStore;
pub use remote::PgStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Cheap read proving the store is reachable.
    async fn probe(&self) -> Result<(), PersistError>;

    /// Inserts or overwrites the record stored under the same key.
    async fn upsert(&self, record: &Record) -> Result<(), PersistError>;

    /// Deletes the record under `key`, returning whether one existed.
    async fn delete(&self, key: &RecordKey) -> Result<bool, PersistError>;

    /// Every record of one kind.
    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>, PersistError>;

    /// Overwrites the whole collection for `kind`.
    async fn replace_all(&self, kind: RecordKind, records: &[Record]) -> Result<(), PersistError>;
}
