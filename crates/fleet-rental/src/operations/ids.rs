//! Human-readable `PREFIX-0001` identifiers allocated by scanning existing keys.

use chrono::NaiveDateTime;
use tracing::warn;

use super::domain::{PaymentId, RentalId};
use super::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSequence {
    prefix: &'static str,
    width: usize,
}

pub const RENTAL_IDS: IdSequence = IdSequence::new("RNT", 4);
pub const MAINTENANCE_IDS: IdSequence = IdSequence::new("MNT", 4);
pub const PENALTY_IDS: IdSequence = IdSequence::new("PEN", 4);
pub const DEPLOYMENT_IDS: IdSequence = IdSequence::new("DEP", 4);

impl IdSequence {
    pub const fn new(prefix: &'static str, width: usize) -> Self {
        Self { prefix, width }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn format(&self, number: u64) -> String {
        format!("{}-{:0width$}", self.prefix, number, width = self.width)
    }

    /// Numeric suffix of `id` when it follows this sequence's pattern.
    pub fn suffix_of(&self, id: &str) -> Option<u64> {
        let digits = id.strip_prefix(self.prefix)?.strip_prefix('-')?;
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Highest existing suffix plus one; ids outside the pattern are ignored.
    pub fn next_after<I, S>(&self, existing: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let highest = existing
            .into_iter()
            .filter_map(|id| self.suffix_of(id.as_ref()))
            .max()
            .unwrap_or(0);
        self.format(highest.saturating_add(1))
    }

    /// Allocate from a key scan, degrading to a timestamp id when the scan failed.
    /// The fallback can collide if two allocations land in the same millisecond.
    pub fn allocate(&self, scan: Result<Vec<String>, RepositoryError>, now: NaiveDateTime) -> String {
        match scan {
            Ok(existing) => self.next_after(existing),
            Err(err) => {
                warn!(prefix = self.prefix, error = %err, "id scan failed, using timestamp id");
                self.fallback(now)
            }
        }
    }

    pub fn fallback(&self, now: NaiveDateTime) -> String {
        format!("{}-{}", self.prefix, now.format("%Y%m%d%H%M%S%3f"))
    }
}

/// Payments are keyed off their rental so a booking has exactly one payment row.
pub fn payment_id_for(rental_id: &RentalId) -> PaymentId {
    PaymentId::new(format!("PAY-{rental_id}"))
}
