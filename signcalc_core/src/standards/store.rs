//! # Constants Store
//!
//! Append-only history of constants tables. Readers take an `Arc` to the
//! version they need and keep it for the whole computation, so a publish in
//! the middle of a batch never changes the numbers a running solve sees.
//!
//! ```text
//! 2024.1 ──publish──▶ 2024.1+cal1 ──publish──▶ 2024.1+cal2
//!   ▲                     ▲
//!   └── still readable ───┘
//! ```

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::constants::{ConstantsTable, BUILTIN_CONSTANTS_VERSION};
use crate::errors::{CalcError, CalcResult};

/// One requested change to a tunable constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantUpdate {
    pub key: String,
    /// Value the suggestion was computed against
    pub before: f64,
    pub after: f64,
}

/// Thread-safe, append-only collection of constants versions
#[derive(Debug)]
pub struct ConstantsStore {
    history: RwLock<Vec<Arc<ConstantsTable>>>,
}

impl Default for ConstantsStore {
    fn default() -> Self {
        Self::new(ConstantsTable::builtin())
    }
}

impl ConstantsStore {
    /// Create a store whose first version is `initial`
    pub fn new(initial: ConstantsTable) -> Self {
        ConstantsStore {
            history: RwLock::new(vec![Arc::new(initial)]),
        }
    }

    /// Rebuild a store from a persisted history (oldest first)
    pub fn from_history(history: Vec<ConstantsTable>) -> CalcResult<Self> {
        if history.is_empty() {
            return Err(CalcError::ConstantsVersionNotFound {
                version: BUILTIN_CONSTANTS_VERSION.to_string(),
            });
        }
        Ok(ConstantsStore {
            history: RwLock::new(history.into_iter().map(Arc::new).collect()),
        })
    }

    /// The latest published version
    pub fn current(&self) -> CalcResult<Arc<ConstantsTable>> {
        let history = self.read()?;
        history
            .last()
            .cloned()
            .ok_or_else(|| CalcError::Internal {
                message: "constants store is empty".to_string(),
            })
    }

    /// A specific version by identifier
    pub fn version(&self, version: &str) -> CalcResult<Arc<ConstantsTable>> {
        let history = self.read()?;
        history
            .iter()
            .find(|t| t.version == version)
            .cloned()
            .ok_or_else(|| CalcError::ConstantsVersionNotFound {
                version: version.to_string(),
            })
    }

    /// All version identifiers, oldest first
    pub fn versions(&self) -> CalcResult<Vec<String>> {
        Ok(self.read()?.iter().map(|t| t.version.clone()).collect())
    }

    /// Snapshot of the full history, oldest first
    pub fn history(&self) -> CalcResult<Vec<Arc<ConstantsTable>>> {
        Ok(self.read()?.clone())
    }

    /// Publish a new version derived from the current one.
    ///
    /// Every update must name an existing tunable constant, must have been
    /// computed against the current value, and must move in the constant's
    /// safe direction. Any violation rejects the whole publish.
    pub fn publish(
        &self,
        updates: &[ConstantUpdate],
        source_report: Option<Uuid>,
        note: impl Into<String>,
    ) -> CalcResult<Arc<ConstantsTable>> {
        let mut history = self
            .history
            .write()
            .map_err(|_| CalcError::Internal {
                message: "constants store lock poisoned".to_string(),
            })?;
        let current = history.last().cloned().ok_or_else(|| CalcError::Internal {
            message: "constants store is empty".to_string(),
        })?;

        let mut changes = Vec::with_capacity(updates.len());
        for update in updates {
            let entry = current.entry(&update.key)?;
            let direction = entry.safe_direction.ok_or_else(|| CalcError::PolicyViolation {
                key: update.key.clone(),
                reason: "constant is not calibration-tunable".to_string(),
            })?;
            if entry.value != update.before {
                return Err(CalcError::PolicyViolation {
                    key: update.key.clone(),
                    reason: format!(
                        "suggestion computed against {} but current value is {}",
                        update.before, entry.value
                    ),
                });
            }
            if !update.after.is_finite() || !direction.permits(update.before, update.after) {
                return Err(CalcError::PolicyViolation {
                    key: update.key.clone(),
                    reason: format!(
                        "{} -> {} moves against the safe direction ({:?})",
                        update.before, update.after, direction
                    ),
                });
            }
            changes.push((update.key.clone(), update.after));
        }

        let root = current
            .version
            .split('+')
            .next()
            .unwrap_or(BUILTIN_CONSTANTS_VERSION)
            .to_string();
        let version = format!("{}+cal{}", root, history.len());
        let table = Arc::new(current.derive(version, &changes, source_report, note.into())?);
        history.push(Arc::clone(&table));

        info!(version = %table.version, parent = %current.version, changes = changes.len(), "published constants version");
        Ok(table)
    }

    fn read(&self) -> CalcResult<std::sync::RwLockReadGuard<'_, Vec<Arc<ConstantsTable>>>> {
        self.history.read().map_err(|_| CalcError::Internal {
            message: "constants store lock poisoned".to_string(),
        })
    }
}
