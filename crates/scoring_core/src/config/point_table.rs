use serde::{Deserialize, Serialize};

use crate::models::EventKind;

/// Point value of each event kind.
///
/// `foul` and `tech_foul` are penalties credited to the opposing alliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointTable {
    pub bucket_normal: u32,
    pub bucket_bonus: u32,
    pub human_bucket: u32,
    pub park: u32,
    pub slight_ramp: u32,
    pub climb: u32,
    pub foul: u32,
    pub tech_foul: u32,
}

impl Default for PointTable {
    fn default() -> Self {
        Self {
            bucket_normal: 6,
            bucket_bonus: 12,
            human_bucket: 3,
            park: 2,
            slight_ramp: 6,
            climb: 14,
            foul: 5,
            tech_foul: 15,
        }
    }
}

impl PointTable {
    pub fn points_for(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::BucketNormal => self.bucket_normal,
            EventKind::BucketBonus => self.bucket_bonus,
            EventKind::HumanBucket => self.human_bucket,
            EventKind::Park => self.park,
            EventKind::SlightRamp => self.slight_ramp,
            EventKind::Climb => self.climb,
            EventKind::Foul => self.foul,
            EventKind::TechFoul => self.tech_foul,
        }
    }

    /// Endgame points that count toward the climb RP.
    pub fn climb_points(&self, park: u32, slight_ramp: u32, climb: u32) -> u32 {
        park.saturating_mul(self.park)
            .saturating_add(slight_ramp.saturating_mul(self.slight_ramp))
            .saturating_add(climb.saturating_mul(self.climb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let table = PointTable::default();
        assert_eq!(table.points_for(EventKind::BucketNormal), 6);
        assert_eq!(table.points_for(EventKind::BucketBonus), 12);
        assert_eq!(table.points_for(EventKind::HumanBucket), 3);
        assert_eq!(table.points_for(EventKind::Park), 2);
        assert_eq!(table.points_for(EventKind::SlightRamp), 6);
        assert_eq!(table.points_for(EventKind::Climb), 14);
        assert_eq!(table.points_for(EventKind::Foul), 5);
        assert_eq!(table.points_for(EventKind::TechFoul), 15);
    }

    #[test]
    fn test_climb_points() {
        let table = PointTable::default();
        assert_eq!(table.climb_points(0, 0, 0), 0);
        assert_eq!(table.climb_points(1, 1, 1), 22);
        assert_eq!(table.climb_points(4, 2, 0), 20);
    }

    #[test]
    fn test_climb_points_saturate() {
        let table = PointTable { climb: u32::MAX / 2, ..PointTable::default() };
        assert_eq!(table.climb_points(0, 0, 3), u32::MAX);
        assert_eq!(table.climb_points(1, 0, 2), u32::MAX);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let table: PointTable = serde_json::from_str(r#"{"climb": 20}"#).unwrap();
        assert_eq!(table.climb, 20);
        assert_eq!(table.park, 2);
    }
}
