// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use dtc_core::{GenerationRecord, RecordId};

use crate::error::{Result, StorageError};

/// Hands out record IDs above the current ledger maximum.
///
/// Only valid while the caller holds the project's write lock; otherwise two
/// allocators built from the same snapshot would hand out the same IDs.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    last: RecordId,
}

impl IdAllocator {
    pub fn from_records(records: &[GenerationRecord]) -> Self {
        let last = records.iter().map(|r| r.id).max().unwrap_or(0);
        Self { last }
    }

    /// Next free ID. Fails instead of wrapping once `RecordId::MAX` is taken.
    pub fn allocate(&mut self) -> Result<RecordId> {
        let id = self
            .last
            .checked_add(1)
            .ok_or(StorageError::IdsExhausted(self.last))?;
        self.last = id;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtc_core::TaskParameters;

    fn record(id: RecordId) -> GenerationRecord {
        GenerationRecord::new(id, format!("{:05}.png?00000", id), TaskParameters::new(), 0)
    }

    #[test]
    fn test_empty_ledger_starts_at_one() {
        let mut ids = IdAllocator::from_records(&[]);
        assert_eq!(ids.allocate().unwrap(), 1);
        assert_eq!(ids.allocate().unwrap(), 2);
    }

    #[test]
    fn test_uses_max_not_last() {
        let records = vec![record(5), record(2), record(9), record(1)];
        let mut ids = IdAllocator::from_records(&records);
        assert_eq!(ids.allocate().unwrap(), 10);
        assert_eq!(ids.allocate().unwrap(), 11);
    }

    #[test]
    fn test_gap_from_deletion_not_refilled() {
        let records = vec![record(1), record(3)];
        assert_eq!(IdAllocator::from_records(&records).allocate().unwrap(), 4);
    }

    #[test]
    fn test_max_id_does_not_wrap() {
        let mut ids = IdAllocator::from_records(&[record(RecordId::MAX - 1)]);
        assert_eq!(ids.allocate().unwrap(), RecordId::MAX);
        assert!(matches!(
            ids.allocate(),
            Err(StorageError::IdsExhausted(RecordId::MAX))
        ));

        let mut ids = IdAllocator::from_records(&[record(RecordId::MAX)]);
        assert!(matches!(ids.allocate(), Err(StorageError::IdsExhausted(_))));
    }
}
