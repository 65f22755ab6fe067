use std::collections::HashMap;
use std::sync::Arc;

use time::UtcDateTime;

use super::{Identifier, MediaKind};

/// A geographic coordinate in decimal degrees (WGS 84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Returns `None` for coordinates outside the valid latitude/longitude range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        ((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude))
            .then_some(Self { latitude, longitude })
    }

    /// ISO 6709 representation, as used by QuickTime location atoms.
    pub fn to_iso6709(&self) -> String {
        format!("{:+09.5}{:+010.5}/", self.latitude, self.longitude)
    }
}

/// Everything the export knows about a single memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub identifier: Identifier,
    pub captured_at: UtcDateTime,
    pub location: Option<Location>,
    pub kind: MediaKind,
}

/// Lookup table from identifier to [`MemoryRecord`].
///
/// A record can be reachable under several identifiers (the primary media ID
/// and the session alias); every alias resolves to the same shared record.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    records: HashMap<Identifier, Arc<MemoryRecord>>,
    distinct: usize,
}

impl RecordTable {
    /// Inserts `record` under its own identifier and every alias. A primary
    /// identifier replaces an earlier entry; an alias never shadows one.
    ///
    /// A record whose identifier was already known, as a primary or as an
    /// alias, describes a memory that is already counted.
    pub fn insert(&mut self, record: MemoryRecord, aliases: impl IntoIterator<Item = Identifier>) {
        let record = Arc::new(record);
        if self.records.insert(record.identifier.clone(), Arc::clone(&record)).is_none() {
            self.distinct += 1;
        }
        for alias in aliases {
            self.records.entry(alias).or_insert_with(|| Arc::clone(&record));
        }
    }

    pub fn get(&self, identifier: &Identifier) -> Option<&MemoryRecord> {
        self.records.get(identifier).map(Arc::as_ref)
    }

    /// Case-insensitive lookup by raw identifier text.
    pub fn lookup(&self, raw: &str) -> Option<&MemoryRecord> {
        self.get(&Identifier::new(raw))
    }

    /// Number of distinct memories (aliases and repeated identifiers are not
    /// counted).
    pub fn len(&self) -> usize {
        self.distinct
    }

    pub fn is_empty(&self) -> bool {
        self.distinct == 0
    }
}

impl FromIterator<MemoryRecord> for RecordTable {
    fn from_iter<T: IntoIterator<Item = MemoryRecord>>(iter: T) -> Self {
        let mut table = Self::default();
        for record in iter {
            table.insert(record, []);
        }
        table
    }
}
