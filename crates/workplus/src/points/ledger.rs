use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::repository::LedgerRepository;
use crate::store::RepositoryError;
use crate::types::{CompanyId, LedgerEntryId, Metadata, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Credit,
    Debit,
    Adjustment,
}

/// Exactly one owner per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LedgerOwner {
    Company(CompanyId),
    User(UserId),
}

/// What produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    OfferPublication,
    ApplicationSubmission,
    ApplicationHired,
    PointsClaimApproval,
}

/// Immutable, signed point movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub owner: LedgerOwner,
    pub entry_type: EntryType,
    pub points: i64,
    pub reason: String,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<i64>,
    pub rule_version: Option<String>,
    pub idempotency_key: String,
    pub metadata: Metadata,
    pub created_at: Timestamp,
}

impl LedgerEntry {
    pub fn credit(
        owner: LedgerOwner,
        points: i64,
        idempotency_key: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self::new(owner, EntryType::Credit, points, idempotency_key, created_at)
    }

    pub fn new(
        owner: LedgerOwner,
        entry_type: EntryType,
        points: i64,
        idempotency_key: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: LedgerEntryId::UNASSIGNED,
            owner,
            entry_type,
            points,
            reason: String::new(),
            reference_type: None,
            reference_id: None,
            rule_version: None,
            idempotency_key: idempotency_key.into(),
            metadata: Metadata::new(),
            created_at,
        }
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn referencing(mut self, reference_type: ReferenceType, reference_id: i64) -> Self {
        self.reference_type = Some(reference_type);
        self.reference_id = Some(reference_id);
        self
    }

    pub fn under_rule(mut self, rule_version: impl Into<String>) -> Self {
        self.rule_version = Some(rule_version.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Outcome of an append attempt. A replayed key is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Recorded(LedgerEntry),
    AlreadyRecorded,
}

impl AppendOutcome {
    pub fn recorded(self) -> Option<LedgerEntry> {
        match self {
            AppendOutcome::Recorded(entry) => Some(entry),
            AppendOutcome::AlreadyRecorded => None,
        }
    }
}

/// Append-only ledger keyed by idempotency key.
pub struct PointsLedger {
    entries: Arc<dyn LedgerRepository>,
}

impl PointsLedger {
    pub fn new(entries: Arc<dyn LedgerRepository>) -> Self {
        Self { entries }
    }

    /// Records the entry unless its key was already used.
    ///
    /// The lookup only short-circuits the common replay; the storage
    /// uniqueness constraint decides concurrent races, and a conflict there is
    /// reported as `AlreadyRecorded` too.
    pub fn append(&self, entry: LedgerEntry) -> Result<AppendOutcome, LedgerError> {
        let key = entry.idempotency_key.trim().to_string();
        if key.is_empty() {
            return Err(LedgerError::Invalid("idempotency key must not be blank".into()));
        }
        let sign_ok = match entry.entry_type {
            EntryType::Credit => entry.points > 0,
            EntryType::Debit => entry.points < 0,
            EntryType::Adjustment => entry.points != 0,
        };
        if !sign_ok {
            return Err(LedgerError::Invalid(format!(
                "{:?} entry cannot carry {} points",
                entry.entry_type, entry.points
            )));
        }

        if self.entries.find_entry_by_key(&key)?.is_some() {
            debug!(idempotency_key = %key, "ledger append replayed");
            return Ok(AppendOutcome::AlreadyRecorded);
        }

        let entry = LedgerEntry {
            idempotency_key: key,
            ..entry
        };
        match self.entries.insert_entry(entry) {
            Ok(stored) => {
                info!(
                    entry_id = stored.id.0,
                    points = stored.points,
                    idempotency_key = %stored.idempotency_key,
                    "ledger entry recorded"
                );
                Ok(AppendOutcome::Recorded(stored))
            }
            Err(RepositoryError::Conflict(key)) => {
                debug!(idempotency_key = %key, "ledger append lost a concurrent race");
                Ok(AppendOutcome::AlreadyRecorded)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Sum of every entry for the owner, read fresh from storage.
    pub fn balance(&self, owner: LedgerOwner) -> Result<i64, LedgerError> {
        Ok(self.entries.balance_for(owner)?)
    }

    /// Newest entries first.
    pub fn history(&self, owner: LedgerOwner, limit: usize) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries.entries_for(owner, limit)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid ledger entry: {0}")]
    Invalid(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
