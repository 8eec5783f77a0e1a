//! Remote-preferred, local-shadowed persistence.
//!
//! Writes go to the hosted store first and are mirrored into the local JSON
//! backup. Reads come from the hosted store and overwrite the matching local
//! collection, so the backup converges on the remote copy. When the hosted
//! store fails the facade degrades and serves everything locally until a
//! probe succeeds again.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::calendar::SchoolCalendar;
use crate::catalog::StudentCatalog;
use crate::error::PersistError;
use crate::models::{
    AssignmentRecord, ListFilter, Record, RecordKey, RecordKind, RecordSet, OTHER_CATEGORY,
};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Remote reachable; it is the source of truth.
    Healthy,
    /// Remote failed; re-probed before every operation.
    Degraded,
    /// No remote configured for this process.
    Offline,
}

pub struct PersistenceFacade<R, L> {
    remote: Option<R>,
    local: L,
    catalog: StudentCatalog,
    calendar: SchoolCalendar,
    state: Connectivity,
}

impl<R, L> PersistenceFacade<R, L>
where
    R: RecordStore,
    L: RecordStore,
{
    /// Builds the facade and probes the remote once to pick the initial state.
    pub async fn connect(
        remote: Option<R>,
        local: L,
        catalog: StudentCatalog,
        calendar: SchoolCalendar,
    ) -> Self {
        let mut facade = Self {
            state: if remote.is_some() {
                Connectivity::Degraded
            } else {
                Connectivity::Offline
            },
            remote,
            local,
            catalog,
            calendar,
        };
        facade.reconnect().await;
        facade
    }

    pub fn connectivity(&self) -> Connectivity {
        self.state
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn catalog(&self) -> &StudentCatalog {
        &self.catalog
    }

    pub fn calendar(&self) -> &SchoolCalendar {
        &self.calendar
    }

    /// Probes the remote store and updates the connectivity state.
    pub async fn reconnect(&mut self) -> Connectivity {
        let Some(remote) = &self.remote else {
            self.state = Connectivity::Offline;
            return self.state;
        };

        match remote.probe().await {
            Ok(()) => {
                if self.state != Connectivity::Healthy {
                    info!(store = remote.name(), "remote store reachable");
                }
                self.state = Connectivity::Healthy;
            }
            Err(err) => {
                if self.state == Connectivity::Healthy {
                    warn!(error = %err, "remote store lost, switching to local backup");
                } else {
                    debug!(error = %err, "remote store still unreachable");
                }
                self.state = Connectivity::Degraded;
            }
        }
        self.state
    }

    /// The remote to use for this operation, re-probing first when degraded.
    async fn remote_target(&mut self) -> Option<&R> {
        if self.state == Connectivity::Degraded {
            self.reconnect().await;
        }
        match self.state {
            Connectivity::Healthy => self.remote.as_ref(),
            _ => None,
        }
    }

    fn degrade(&mut self, op: &str, err: &PersistError) {
        warn!(op, error = %err, "remote store failed, continuing in offline mode");
        self.state = Connectivity::Degraded;
    }

    fn validate(&self, record: &Record) -> Result<(), PersistError> {
        self.catalog.validate(record)?;
        if let Some(date) = record.date() {
            if !self.calendar.contains(date) {
                return Err(PersistError::Validation(format!(
                    "{date} is outside the school year ({} to {})",
                    self.calendar.start(),
                    self.calendar.end()
                )));
            }
        }
        Ok(())
    }

    /// Validates, stamps `updated_at`, and writes the record.
    pub async fn upsert(&mut self, mut record: Record) -> Result<(), PersistError> {
        self.validate(&record)?;
        record.touch(Utc::now());

        let remote_result = match self.remote_target().await {
            Some(remote) => Some(remote.upsert(&record).await),
            None => None,
        };

        match remote_result {
            Some(Ok(())) => {
                if let Err(err) = self.local.upsert(&record).await {
                    warn!(key = %record.key(), error = %err, "local mirror write failed");
                }
                debug!(key = %record.key(), "record saved");
                return Ok(());
            }
            Some(Err(err)) if err.is_remote() => self.degrade("upsert", &err),
            Some(Err(err)) => return Err(err),
            None => {}
        }

        self.local.upsert(&record).await?;
        debug!(key = %record.key(), "record saved to local backup only");
        Ok(())
    }

    /// Removes a record from both stores using the same routing as `upsert`.
    pub async fn delete(&mut self, key: &RecordKey) -> Result<bool, PersistError> {
        let remote_result = match self.remote_target().await {
            Some(remote) => Some(remote.delete(key).await),
            None => None,
        };

        match remote_result {
            Some(Ok(existed)) => {
                if let Err(err) = self.local.delete(key).await {
                    warn!(%key, error = %err, "local mirror delete failed");
                }
                return Ok(existed);
            }
            Some(Err(err)) if err.is_remote() => self.degrade("delete", &err),
            Some(Err(err)) => return Err(err),
            None => {}
        }

        self.local.delete(key).await
    }

    /// Lists one collection. A healthy read overwrites the local copy of that
    /// collection before the filter is applied.
    pub async fn list(
        &mut self,
        kind: RecordKind,
        filter: &ListFilter,
    ) -> Result<Vec<Record>, PersistError> {
        let remote_result = match self.remote_target().await {
            Some(remote) => Some(remote.list(kind).await),
            None => None,
        };

        let records = match remote_result {
            Some(Ok(records)) => {
                if let Err(err) = self.local.replace_all(kind, &records).await {
                    warn!(%kind, error = %err, "local mirror refresh failed");
                }
                records
            }
            Some(Err(err)) if err.is_remote() => {
                self.degrade("list", &err);
                self.local.list(kind).await?
            }
            Some(Err(err)) => return Err(err),
            None => self.local.list(kind).await?,
        };

        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    /// All four collections.
    pub async fn snapshot(&mut self) -> Result<RecordSet, PersistError> {
        let mut set = RecordSet::default();
        for kind in RecordKind::ALL {
            let records = self.list(kind, &ListFilter::default()).await?;
            set.replace(kind, records);
        }
        Ok(set)
    }

    /// Renames a custom "Other" subject for one student: each old-named
    /// record is re-saved under the new name and the old key deleted.
    pub async fn rename_subject(
        &mut self,
        student: &str,
        from: &str,
        to: &str,
    ) -> Result<usize, PersistError> {
        let (from, to) = (from.trim(), to.trim());
        self.catalog.validate_rename(student, from, to)?;

        let filter = ListFilter {
            student: Some(student.to_string()),
            category: Some(OTHER_CATEGORY.to_string()),
            subject: Some(from.to_string()),
            ..ListFilter::default()
        };
        let existing = self.list(RecordKind::Assignments, &filter).await?;

        let mut moved = 0;
        for record in existing {
            let Record::Assignment(old) = record else {
                continue;
            };
            let old_key = RecordKey::Assignment {
                date: old.date,
                student: old.student.clone(),
                category: old.category.clone(),
                subject: old.subject.clone(),
            };
            let renamed = Record::Assignment(AssignmentRecord {
                subject: to.to_string(),
                ..old
            });
            self.upsert(renamed).await?;
            let on_remote = self.state == Connectivity::Healthy;
            self.delete(&old_key).await?;
            if on_remote && self.state != Connectivity::Healthy {
                warn!(
                    key = %old_key,
                    to,
                    "old subject name left on remote store, repeat the rename once reconnected"
                );
            }
            moved += 1;
        }

        info!(student, from, to, moved, "renamed custom subject");
        Ok(moved)
    }
}
