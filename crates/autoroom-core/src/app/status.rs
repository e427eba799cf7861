use serde::{Deserialize, Serialize};

/// Counts of live managed rooms, by kind and vacancy (observability view).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerCounts {
    pub total: usize,
    pub public: usize,
    pub personal: usize,
    pub private: usize,
    /// Owned-kind rooms currently without an owner.
    pub vacant: usize,
}
