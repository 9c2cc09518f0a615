//! RocksDB wrapper for folio storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Atomic write batches (document fields + stamps + change log entry)
//! - Snapshot reads across the document column families
//! - Fragment storage with a per-document secondary index
//! - Application of peer changes without re-logging them

use rocksdb::{
    ColumnFamily, Direction, IteratorMode, Options, Snapshot, WriteBatch, DB,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use ulid::Ulid;

use folio_types::{
    ChangeEntry, ChangeKind, DocumentField, DocumentPatch, DocumentRecord, RemoteChange,
    TextFragment,
};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_ANNOTATIONS, CF_CHANGELOG, CF_CHECKPOINTS,
    CF_CONTENTS, CF_DOCUMENTS, CF_FRAGMENTS, CF_STAMPS,
};
use crate::error::StorageError;
use crate::keys::{ChangeKey, CheckpointKey, DocumentKey, FragmentKey};
use crate::stamps::{FieldStamps, Stamp};

const LOG_HEAD_CHECKPOINT: &str = "log_head";
const REPLICA_ID_CHECKPOINT: &str = "replica_id";

/// Document metadata without the binary payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    pub filename: String,
    pub title: String,
}

impl DocumentMeta {
    fn of(record: &DocumentRecord) -> Self {
        Self {
            id: record.id.clone(),
            filename: record.filename.clone(),
            title: record.title.clone(),
        }
    }
}

/// Result of applying a peer change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteApplyOutcome {
    /// The listed fields were written
    Applied(Vec<DocumentField>),
    /// The document was removed
    Deleted,
    /// Every carried field lost against a newer local write
    Stale,
    /// Create or update for an unknown document without the required fields
    Incomplete,
}

/// Main storage interface for folio
pub struct Storage {
    db: DB,
    /// Next change log position; also advanced past every observed peer position
    log_head: AtomicU64,
    /// Origin id stamped on local writes
    replica_id: String,
    /// Serializes read-modify-write sequences
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary.
    ///
    /// Any failure to open the database is reported as
    /// [`StorageError::Unavailable`].
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;

        let log_head = Self::load_log_head(&db)?;
        let replica_id = Self::load_replica_id(&db)?;
        debug!(log_head, replica_id = %replica_id, "Storage opened");

        Ok(Self {
            db,
            log_head: AtomicU64::new(log_head),
            replica_id,
            write_lock: Mutex::new(()),
        })
    }

    /// Open an existing store for reading only.
    ///
    /// No lock is taken, so inspection tools can read a store that another
    /// process holds open. Every write fails.
    pub fn open_read_only(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage read-only at {:?}", path);

        let db = DB::open_cf_for_read_only(&Options::default(), path, ALL_CF_NAMES.iter().copied(), false)
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;

        let log_head = Self::load_log_head(&db)?;
        let replica_id = Self::read_replica_id(&db)?.ok_or_else(|| {
            StorageError::Unavailable(format!("{}: store was never initialized", path.display()))
        })?;

        Ok(Self {
            db,
            log_head: AtomicU64::new(log_head),
            replica_id,
            write_lock: Mutex::new(()),
        })
    }

    /// Load the next log position from the persisted head, falling back to
    /// the highest change log key.
    fn load_log_head(db: &DB) -> Result<u64, StorageError> {
        let checkpoints = db
            .cf_handle(CF_CHECKPOINTS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_CHECKPOINTS.to_string()))?;
        let persisted = match db.get_cf(checkpoints, CheckpointKey::new(LOG_HEAD_CHECKPOINT).to_bytes())? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                u64::from_be_bytes(buf)
            }
            _ => 1,
        };

        let changelog = db
            .cf_handle(CF_CHANGELOG)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_CHANGELOG.to_string()))?;
        let mut iter = db.iterator_cf(changelog, IteratorMode::End);
        let from_log = match iter.next() {
            Some(result) => {
                let (key, _) = result?;
                ChangeKey::from_bytes(&key)?.sequence + 1
            }
            None => 1,
        };

        Ok(persisted.max(from_log))
    }

    fn read_replica_id(db: &DB) -> Result<Option<String>, StorageError> {
        let cf = db
            .cf_handle(CF_CHECKPOINTS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_CHECKPOINTS.to_string()))?;
        match db.get_cf(cf, CheckpointKey::new(REPLICA_ID_CHECKPOINT).to_bytes())? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn load_replica_id(db: &DB) -> Result<String, StorageError> {
        if let Some(id) = Self::read_replica_id(db)? {
            return Ok(id);
        }

        let cf = db
            .cf_handle(CF_CHECKPOINTS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_CHECKPOINTS.to_string()))?;
        let id = Ulid::new().to_string();
        db.put_cf(cf, CheckpointKey::new(REPLICA_ID_CHECKPOINT).to_bytes(), id.as_bytes())?;
        info!(replica_id = %id, "Assigned replica id");
        Ok(id)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Identifier stamped on changes produced by this replica.
    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// Next position the change log will assign.
    pub fn log_head(&self) -> u64 {
        self.log_head.load(Ordering::SeqCst)
    }

    fn next_sequence(&self) -> u64 {
        self.log_head.fetch_add(1, Ordering::SeqCst)
    }

    // ==================== Document Reads ====================

    /// Get a full document record.
    ///
    /// Metadata and blobs are read from one snapshot so a concurrent update
    /// is observed either entirely or not at all.
    pub fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        let snapshot = self.db.snapshot();
        self.read_document(&snapshot, id)
    }

    fn read_document(
        &self,
        snapshot: &Snapshot<'_>,
        id: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        let meta = match snapshot.get_cf(self.cf(CF_DOCUMENTS)?, DocumentKey::new(id).to_bytes())? {
            Some(bytes) => serde_json::from_slice::<DocumentMeta>(&bytes)?,
            None => return Ok(None),
        };
        let content = snapshot
            .get_cf(self.cf(CF_CONTENTS)?, id.as_bytes())?
            .unwrap_or_default();
        let annotation_state = snapshot.get_cf(self.cf(CF_ANNOTATIONS)?, id.as_bytes())?;

        Ok(Some(DocumentRecord {
            id: meta.id,
            filename: meta.filename,
            title: meta.title,
            annotation_state,
            content,
        }))
    }

    /// Get document metadata without loading blobs.
    pub fn get_document_meta(&self, id: &str) -> Result<Option<DocumentMeta>, StorageError> {
        match self
            .db
            .get_cf(self.cf(CF_DOCUMENTS)?, DocumentKey::new(id).to_bytes())?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List metadata of every document, ordered by id.
    pub fn list_documents(&self) -> Result<Vec<DocumentMeta>, StorageError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        let prefix = DocumentKey::PREFIX.as_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut docs = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            docs.push(serde_json::from_slice(&value)?);
        }
        Ok(docs)
    }

    /// Read every document record from a single snapshot.
    pub fn all_documents(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        let snapshot = self.db.snapshot();
        let prefix = DocumentKey::PREFIX.as_bytes();
        let iter = snapshot.iterator_cf(
            self.cf(CF_DOCUMENTS)?,
            IteratorMode::From(prefix, Direction::Forward),
        );

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            ids.push(DocumentKey::from_bytes(&key)?.id);
        }

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.read_document(&snapshot, &id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn document_count(&self) -> Result<u64, StorageError> {
        self.count_prefix(self.cf(CF_DOCUMENTS)?, DocumentKey::PREFIX.as_bytes())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.document_count()? == 0)
    }

    // ==================== Document Writes ====================

    /// Insert or replace a document.
    pub fn put_document(&self, record: &DocumentRecord) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        let existing = self.get_document(&record.id)?;
        self.check_filename(&record.filename, &record.id)?;

        let sequence = self.next_sequence();
        let stamp = Stamp::new(sequence, self.replica_id.as_str());
        let new = record.to_patch();
        let entry = match &existing {
            Some(old) => ChangeEntry::update(sequence, &record.id, new.previous_values(old), new),
            None => ChangeEntry::create(sequence, &record.id, new),
        };

        let mut stamps = self.read_stamps(&record.id)?;
        stamps.record(&DocumentField::ALL, &stamp);

        let mut batch = WriteBatch::default();
        self.stage_fields(&mut batch, existing.as_ref(), record, &DocumentField::ALL)?;
        self.stage_stamps(&mut batch, &record.id, &stamps)?;
        self.stage_change(&mut batch, &entry)?;
        self.stage_log_head(&mut batch)?;
        self.db.write(batch)?;

        debug!(document_id = %record.id, sequence, kind = %entry.kind, "Stored document");
        Ok(())
    }

    /// Merge `patch` into an existing document.
    ///
    /// Fields absent from the patch keep their stored values. The merged
    /// fields, their stamps and the change log entry are written atomically.
    pub fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<(), StorageError> {
        if patch.is_empty() {
            return Ok(());
        }

        let _guard = self.lock()?;
        let previous = self
            .get_document(id)?
            .ok_or_else(|| StorageError::NotFound(format!("document {}", id)))?;
        if let Some(ref filename) = patch.filename {
            self.check_filename(filename, id)?;
        }

        let fields = patch.fields();
        let mut updated = previous.clone();
        updated.apply_patch(patch);

        let sequence = self.next_sequence();
        let stamp = Stamp::new(sequence, self.replica_id.as_str());
        let entry = ChangeEntry::update(sequence, id, patch.previous_values(&previous), patch.clone());

        let mut stamps = self.read_stamps(id)?;
        stamps.record(&fields, &stamp);

        let mut batch = WriteBatch::default();
        self.stage_fields(&mut batch, Some(&previous), &updated, &fields)?;
        self.stage_stamps(&mut batch, id, &stamps)?;
        self.stage_change(&mut batch, &entry)?;
        self.stage_log_head(&mut batch)?;
        self.db.write(batch)?;

        debug!(document_id = %id, sequence, fields = ?fields, "Updated document");
        Ok(())
    }

    /// Insert many new documents in one atomic batch.
    ///
    /// Fails without writing anything if any id or filename is already taken.
    pub fn bulk_add_documents(&self, records: &[DocumentRecord]) -> Result<(), StorageError> {
        let _guard = self.lock()?;

        let mut ids = HashSet::new();
        let mut filenames = HashSet::new();
        for record in records {
            if !ids.insert(record.id.as_str()) || self.get_document_meta(&record.id)?.is_some() {
                return Err(StorageError::DuplicateDocument(record.id.clone()));
            }
            if !filenames.insert(record.filename.as_str()) {
                return Err(StorageError::DuplicateFilename(record.filename.clone()));
            }
            self.check_filename(&record.filename, &record.id)?;
        }

        let mut batch = WriteBatch::default();
        for record in records {
            let sequence = self.next_sequence();
            let stamp = Stamp::new(sequence, self.replica_id.as_str());
            let mut stamps = self.read_stamps(&record.id)?;
            stamps.record(&DocumentField::ALL, &stamp);

            self.stage_fields(&mut batch, None, record, &DocumentField::ALL)?;
            self.stage_stamps(&mut batch, &record.id, &stamps)?;
            self.stage_change(&mut batch, &ChangeEntry::create(sequence, &record.id, record.to_patch()))?;
        }
        self.stage_log_head(&mut batch)?;
        self.db.write(batch)?;

        info!(count = records.len(), "Added documents");
        Ok(())
    }

    /// Delete a document together with its fragments.
    ///
    /// Returns false if the document did not exist.
    pub fn delete_document(&self, id: &str) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        let record = match self.get_document(id)? {
            Some(record) => record,
            None => return Ok(false),
        };

        let mut batch = WriteBatch::default();
        self.stage_local_delete(&mut batch, &record)?;
        self.stage_log_head(&mut batch)?;
        self.db.write(batch)?;

        debug!(document_id = %id, "Deleted document");
        Ok(true)
    }

    /// Remove every document and every fragment in one atomic batch.
    ///
    /// Each removed document is logged as a delete. Returns the number of
    /// documents removed.
    pub fn clear_documents(&self) -> Result<usize, StorageError> {
        let _guard = self.lock()?;
        let records = self.all_documents()?;

        let mut batch = WriteBatch::default();
        for record in &records {
            self.stage_local_delete(&mut batch, record)?;
        }

        // Orphans left behind by interrupted runs go as well
        let fragments_cf = self.cf(CF_FRAGMENTS)?;
        for item in self.db.iterator_cf(fragments_cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(fragments_cf, &key);
        }

        self.stage_log_head(&mut batch)?;
        self.db.write(batch)?;

        info!(count = records.len(), "Cleared documents");
        Ok(records.len())
    }

    fn stage_local_delete(
        &self,
        batch: &mut WriteBatch,
        record: &DocumentRecord,
    ) -> Result<(), StorageError> {
        let sequence = self.next_sequence();
        let mut stamps = self.read_stamps(&record.id)?;
        stamps.mark_deleted(Stamp::new(sequence, self.replica_id.as_str()));

        let old = record
            .to_patch()
            .retain_fields(&[DocumentField::Filename, DocumentField::Title]);

        self.stage_removal(batch, record)?;
        self.stage_stamps(batch, &record.id, &stamps)?;
        self.stage_change(batch, &ChangeEntry::delete(sequence, &record.id, old))
    }

    /// Fail if `filename` is indexed for a document other than `id`.
    fn check_filename(&self, filename: &str, id: &str) -> Result<(), StorageError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        match self.db.get_cf(cf, DocumentKey::filename_index(filename))? {
            Some(owner) if owner != id.as_bytes() => {
                Err(StorageError::DuplicateFilename(filename.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Stage the listed fields of `record`, replacing `previous` if present.
    fn stage_fields(
        &self,
        batch: &mut WriteBatch,
        previous: Option<&DocumentRecord>,
        record: &DocumentRecord,
        fields: &[DocumentField],
    ) -> Result<(), StorageError> {
        let documents_cf = self.cf(CF_DOCUMENTS)?;

        if previous.is_none()
            || fields.contains(&DocumentField::Filename)
            || fields.contains(&DocumentField::Title)
        {
            let meta = serde_json::to_vec(&DocumentMeta::of(record))?;
            batch.put_cf(documents_cf, DocumentKey::new(&record.id).to_bytes(), meta);
        }

        if fields.contains(&DocumentField::Filename) {
            if let Some(prev) = previous {
                if prev.filename != record.filename {
                    batch.delete_cf(documents_cf, DocumentKey::filename_index(&prev.filename));
                }
            }
            batch.put_cf(
                documents_cf,
                DocumentKey::filename_index(&record.filename),
                record.id.as_bytes(),
            );
        }

        if fields.contains(&DocumentField::Content) {
            batch.put_cf(self.cf(CF_CONTENTS)?, record.id.as_bytes(), &record.content);
        }

        if fields.contains(&DocumentField::AnnotationState) {
            let cf = self.cf(CF_ANNOTATIONS)?;
            match record.annotation_state {
                Some(ref state) => batch.put_cf(cf, record.id.as_bytes(), state),
                None => batch.delete_cf(cf, record.id.as_bytes()),
            }
        }

        Ok(())
    }

    /// Stage removal of a document, its blobs and its fragments.
    fn stage_removal(
        &self,
        batch: &mut WriteBatch,
        record: &DocumentRecord,
    ) -> Result<(), StorageError> {
        let documents_cf = self.cf(CF_DOCUMENTS)?;
        batch.delete_cf(documents_cf, DocumentKey::new(&record.id).to_bytes());
        batch.delete_cf(documents_cf, DocumentKey::filename_index(&record.filename));
        batch.delete_cf(self.cf(CF_CONTENTS)?, record.id.as_bytes());
        batch.delete_cf(self.cf(CF_ANNOTATIONS)?, record.id.as_bytes());

        let fragments_cf = self.cf(CF_FRAGMENTS)?;
        for fragment_id in self.fragment_ids_for_document(&record.id)? {
            batch.delete_cf(fragments_cf, FragmentKey::new(&fragment_id).to_bytes());
            batch.delete_cf(
                fragments_cf,
                FragmentKey::document_index(&record.id, &fragment_id),
            );
        }
        Ok(())
    }

    fn read_stamps(&self, id: &str) -> Result<FieldStamps, StorageError> {
        match self.db.get_cf(self.cf(CF_STAMPS)?, id.as_bytes())? {
            Some(bytes) => Ok(FieldStamps::from_bytes(&bytes)?),
            None => Ok(FieldStamps::default()),
        }
    }

    fn stage_stamps(
        &self,
        batch: &mut WriteBatch,
        id: &str,
        stamps: &FieldStamps,
    ) -> Result<(), StorageError> {
        batch.put_cf(self.cf(CF_STAMPS)?, id.as_bytes(), stamps.to_bytes()?);
        Ok(())
    }

    fn stage_change(&self, batch: &mut WriteBatch, entry: &ChangeEntry) -> Result<(), StorageError> {
        batch.put_cf(
            self.cf(CF_CHANGELOG)?,
            ChangeKey::new(entry.sequence).to_bytes(),
            entry.to_bytes()?,
        );
        Ok(())
    }

    fn stage_log_head(&self, batch: &mut WriteBatch) -> Result<(), StorageError> {
        batch.put_cf(
            self.cf(CF_CHECKPOINTS)?,
            CheckpointKey::new(LOG_HEAD_CHECKPOINT).to_bytes(),
            self.log_head().to_be_bytes(),
        );
        Ok(())
    }

    // ==================== Peer Changes ====================

    /// Apply a change received from a sync peer.
    ///
    /// Fields are merged last-writer-wins by [`Stamp`]; only winning fields
    /// are written, together with their stamps, in one batch. The change is
    /// never appended to the local change log. The log head is advanced past
    /// the peer position so later local writes order after it.
    pub fn apply_remote_change(
        &self,
        change: &RemoteChange,
    ) -> Result<RemoteApplyOutcome, StorageError> {
        let _guard = self.lock()?;
        self.log_head
            .fetch_max(change.position.saturating_add(1), Ordering::SeqCst);

        let id = change.document_id.as_str();
        let stamp = Stamp::new(change.position, change.origin.as_str());
        let mut stamps = self.read_stamps(id)?;
        let existing = self.get_document(id)?;
        let mut batch = WriteBatch::default();

        let outcome = match (change.kind, existing) {
            (ChangeKind::Delete, Some(record)) => {
                if stamps.dominated_by(&stamp) {
                    self.stage_removal(&mut batch, &record)?;
                    stamps.mark_deleted(stamp);
                    RemoteApplyOutcome::Deleted
                } else {
                    RemoteApplyOutcome::Stale
                }
            }
            (ChangeKind::Delete, None) => {
                // Remember the tombstone so a delayed create cannot resurrect it
                stamps.mark_deleted(stamp);
                RemoteApplyOutcome::Stale
            }
            (ChangeKind::Create | ChangeKind::Update, Some(record)) => {
                let patch = change.patch.clone().unwrap_or_default();
                let winning: Vec<DocumentField> = patch
                    .fields()
                    .into_iter()
                    .filter(|field| stamps.accepts(*field, &stamp))
                    .collect();

                if winning.is_empty() {
                    RemoteApplyOutcome::Stale
                } else {
                    let accepted = patch.retain_fields(&winning);
                    if let Some(ref filename) = accepted.filename {
                        self.check_filename(filename, id)?;
                    }
                    let mut updated = record.clone();
                    updated.apply_patch(&accepted);
                    self.stage_fields(&mut batch, Some(&record), &updated, &winning)?;
                    stamps.record(&winning, &stamp);
                    RemoteApplyOutcome::Applied(winning)
                }
            }
            (ChangeKind::Create | ChangeKind::Update, None) => {
                let patch = change.patch.clone().unwrap_or_default();
                if !stamps.dominated_by(&stamp) {
                    RemoteApplyOutcome::Stale
                } else {
                    match DocumentRecord::from_patch(id, &patch) {
                        Some(record) => {
                            self.check_filename(&record.filename, id)?;
                            let fields = patch.fields();
                            self.stage_fields(&mut batch, None, &record, &DocumentField::ALL)?;
                            stamps.record(&fields, &stamp);
                            RemoteApplyOutcome::Applied(fields)
                        }
                        None => RemoteApplyOutcome::Incomplete,
                    }
                }
            }
        };

        if outcome == RemoteApplyOutcome::Incomplete {
            warn!(
                document_id = %id,
                origin = %change.origin,
                position = change.position,
                "Ignoring peer change for unknown document without required fields"
            );
        } else {
            self.stage_stamps(&mut batch, id, &stamps)?;
        }
        self.stage_log_head(&mut batch)?;
        self.db.write(batch)?;

        debug!(
            document_id = %id,
            origin = %change.origin,
            position = change.position,
            outcome = ?outcome,
            "Applied peer change"
        );
        Ok(outcome)
    }

    /// Stored stamps of a document.
    pub fn get_stamps(&self, id: &str) -> Result<FieldStamps, StorageError> {
        self.read_stamps(id)
    }

    // ==================== Change Log ====================

    /// Get change log entries starting from a sequence number, in log order.
    pub fn get_changes(
        &self,
        start_sequence: u64,
        limit: usize,
    ) -> Result<Vec<ChangeEntry>, StorageError> {
        let cf = self.cf(CF_CHANGELOG)?;
        let start_key = ChangeKey::new(start_sequence);
        let iter = self.db.iterator_cf(
            cf,
            IteratorMode::From(&start_key.to_bytes(), Direction::Forward),
        );

        let mut results = Vec::new();
        for item in iter.take(limit) {
            let (_, value) = item?;
            results.push(ChangeEntry::from_bytes(&value)?);
        }
        Ok(results)
    }

    /// Delete change log entries up to and including a sequence number.
    ///
    /// Returns count of deleted entries.
    pub fn delete_changes(&self, up_to_sequence: u64) -> Result<usize, StorageError> {
        let cf = self.cf(CF_CHANGELOG)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        let mut batch = WriteBatch::default();
        let mut count = 0;

        for item in iter {
            let (key, _) = item?;
            let change_key = ChangeKey::from_bytes(&key)?;
            if change_key.sequence > up_to_sequence {
                break;
            }
            batch.delete_cf(cf, &key);
            count += 1;
        }

        if count > 0 {
            self.db.write(batch)?;
            debug!(count, up_to_sequence, "Deleted change log entries");
        }
        Ok(count)
    }

    // ==================== Fragments ====================

    /// Persist fragments, assigning ids to those without one.
    ///
    /// All fragments are written in one batch. Returns the stored fragments
    /// in input order.
    pub fn bulk_upsert_fragments(
        &self,
        fragments: Vec<TextFragment>,
    ) -> Result<Vec<TextFragment>, StorageError> {
        let _guard = self.lock()?;
        let cf = self.cf(CF_FRAGMENTS)?;
        let mut batch = WriteBatch::default();
        let mut stored = Vec::with_capacity(fragments.len());

        for mut fragment in fragments {
            let fragment_id = match fragment.id {
                Some(ref id) => {
                    // Moving a fragment between documents must drop the old index entry
                    if let Some(previous) = self.get_fragment(id)? {
                        if previous.document_id != fragment.document_id {
                            batch.delete_cf(
                                cf,
                                FragmentKey::document_index(&previous.document_id, id),
                            );
                        }
                    }
                    id.clone()
                }
                None => {
                    let id = Ulid::new().to_string();
                    fragment.id = Some(id.clone());
                    id
                }
            };

            batch.put_cf(cf, FragmentKey::new(&fragment_id).to_bytes(), fragment.to_bytes()?);
            batch.put_cf(
                cf,
                FragmentKey::document_index(&fragment.document_id, &fragment_id),
                b"",
            );
            stored.push(fragment);
        }

        self.db.write(batch)?;
        debug!(count = stored.len(), "Stored fragments");
        Ok(stored)
    }

    pub fn get_fragment(&self, fragment_id: &str) -> Result<Option<TextFragment>, StorageError> {
        match self
            .db
            .get_cf(self.cf(CF_FRAGMENTS)?, FragmentKey::new(fragment_id).to_bytes())?
        {
            Some(bytes) => Ok(Some(TextFragment::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn fragment_ids_for_document(&self, document_id: &str) -> Result<Vec<String>, StorageError> {
        let cf = self.cf(CF_FRAGMENTS)?;
        let prefix = FragmentKey::document_index_prefix(document_id);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(id) = FragmentKey::fragment_id_from_index(&key, &prefix) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Fragments of a document ordered by page, then insertion.
    pub fn fragments_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<TextFragment>, StorageError> {
        let mut fragments = Vec::new();
        for id in self.fragment_ids_for_document(document_id)? {
            if let Some(fragment) = self.get_fragment(&id)? {
                fragments.push(fragment);
            }
        }
        fragments.sort_by_key(|f| f.page_index);
        Ok(fragments)
    }

    /// Every stored fragment, ordered by id.
    pub fn all_fragments(&self) -> Result<Vec<TextFragment>, StorageError> {
        let cf = self.cf(CF_FRAGMENTS)?;
        let prefix = FragmentKey::PREFIX.as_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut fragments = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            fragments.push(TextFragment::from_bytes(&value)?);
        }
        Ok(fragments)
    }

    /// Delete fragments by id. Unknown ids are skipped.
    pub fn delete_fragments(&self, fragment_ids: &[String]) -> Result<usize, StorageError> {
        let _guard = self.lock()?;
        let cf = self.cf(CF_FRAGMENTS)?;
        let mut batch = WriteBatch::default();
        let mut count = 0;

        for id in fragment_ids {
            if let Some(fragment) = self.get_fragment(id)? {
                batch.delete_cf(cf, FragmentKey::new(id).to_bytes());
                batch.delete_cf(cf, FragmentKey::document_index(&fragment.document_id, id));
                count += 1;
            }
        }

        if count > 0 {
            self.db.write(batch)?;
            debug!(count, "Deleted fragments");
        }
        Ok(count)
    }

    // ==================== Checkpoints ====================

    /// Store a named checkpoint
    pub fn put_checkpoint(&self, name: &str, checkpoint_bytes: &[u8]) -> Result<(), StorageError> {
        let key = CheckpointKey::new(name);
        self.db
            .put_cf(self.cf(CF_CHECKPOINTS)?, key.to_bytes(), checkpoint_bytes)?;
        Ok(())
    }

    /// Get a named checkpoint
    pub fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let key = CheckpointKey::new(name);
        Ok(self.db.get_cf(self.cf(CF_CHECKPOINTS)?, key.to_bytes())?)
    }

    // ===== Admin Operations =====

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        info!("Starting full compaction...");
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            document_count: self.document_count()?,
            fragment_count: self
                .count_prefix(self.cf(CF_FRAGMENTS)?, FragmentKey::PREFIX.as_bytes())?,
            pending_changes: self.count_prefix(self.cf(CF_CHANGELOG)?, b"change:")?,
            log_head: self.log_head(),
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    fn count_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<u64, StorageError> {
        let mut count = 0u64;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        let mut total_size = 0u64;
        if let Ok(entries) = std::fs::read_dir(self.db.path()) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }
        total_size
    }
}

/// Statistics about the storage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of documents stored
    pub document_count: u64,
    /// Number of text fragments
    pub fragment_count: u64,
    /// Number of change log entries not yet acknowledged by a peer
    pub pending_changes: u64,
    /// Next change log position
    pub log_head: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}
