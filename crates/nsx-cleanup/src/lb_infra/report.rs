//! Per-family deletion counts for load-balancer infra cleanup

use nsx_cleanup_common::LbResourceKind;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FamilyCounts {
    pub deleted: usize,
    pub failed: usize,
}

/// Report of cleanup operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    families: BTreeMap<LbResourceKind, FamilyCounts>,
}

impl CleanupReport {
    pub fn record_deleted(&mut self, kind: LbResourceKind, count: usize) {
        self.families.entry(kind).or_default().deleted += count;
    }

    pub fn record_failed(&mut self, kind: LbResourceKind, count: usize) {
        self.families.entry(kind).or_default().failed += count;
    }

    pub fn family(&self, kind: LbResourceKind) -> FamilyCounts {
        self.families.get(&kind).copied().unwrap_or_default()
    }

    pub fn deleted(&self) -> usize {
        self.families.values().map(|c| c.deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.families.values().map(|c| c.failed).sum()
    }

    /// Whether nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut report = CleanupReport::default();
        report.record_deleted(LbResourceKind::Pool, 3);
        report.record_deleted(LbResourceKind::Pool, 2);
        report.record_failed(LbResourceKind::AppProfile, 1);

        assert_eq!(report.family(LbResourceKind::Pool).deleted, 5);
        assert_eq!(report.family(LbResourceKind::Group), FamilyCounts::default());
        assert_eq!(report.deleted(), 5);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_json_keys_are_family_names() {
        let mut report = CleanupReport::default();
        report.record_deleted(LbResourceKind::VirtualServer, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["families"]["VirtualServer"]["deleted"], 1);
    }
}
