//! Ranking points and the event ranking table.

use std::collections::HashMap;

use tracing::debug;

use crate::config::RulesConfig;
use crate::models::{
    Alliance, AwardedRp, MatchRecord, RankingRow, Team, TeamId, TeamRanking,
};

pub struct RankingEngine<'a> {
    rules: &'a RulesConfig,
}

impl<'a> RankingEngine<'a> {
    pub fn new(rules: &'a RulesConfig) -> Self {
        Self { rules }
    }

    /// Endgame points used for the climb RP.
    pub fn climb_points(&self, record: &MatchRecord, alliance: Alliance) -> u32 {
        let counters = &record.alliance(alliance).counters;
        self.rules.points.climb_points(counters.park, counters.slight_ramp, counters.climb)
    }

    /// Derive win and climb RP from the current scores and counters.
    /// `teleop_rp` is earned when the bonus is activated and kept as is.
    pub fn derive_rp(&self, record: &mut MatchRecord) {
        let (red_score, blue_score) = (record.red.score, record.blue.score);
        let red_climb = self.climb_points(record, Alliance::Red);
        let blue_climb = self.climb_points(record, Alliance::Blue);
        let threshold = self.rules.climb_rp_threshold;

        record.red.win_rp = red_score > blue_score;
        record.blue.win_rp = blue_score > red_score;
        record.red.climb_rp = red_climb >= threshold;
        record.blue.climb_rp = blue_climb >= threshold;
    }

    /// Re-derive the match RP and move its contribution into `rankings`.
    ///
    /// A match contributes its RP once: whatever it contributed before
    /// (`awarded_rp`) is taken back and the new total added, so completing
    /// and later finalizing a match counts it once. Teams without a ranking
    /// row get one.
    pub fn compute(&self, record: &mut MatchRecord, rankings: &mut Vec<TeamRanking>) {
        self.derive_rp(record);

        let previous = record.awarded_rp.unwrap_or_default();
        let awarded = AwardedRp { red: record.red.earned_rp(), blue: record.blue.earned_rp() };

        for alliance in Alliance::ALL {
            for team_id in record.teams(alliance).into_iter().flatten() {
                let row = match rankings.iter().position(|row| row.team_id == team_id) {
                    Some(index) => &mut rankings[index],
                    None => {
                        rankings.push(TeamRanking::new(team_id));
                        let last = rankings.len() - 1;
                        &mut rankings[last]
                    }
                };
                row.ranking_points =
                    row.ranking_points.saturating_sub(previous.get(alliance)) + awarded.get(alliance);
            }
        }

        debug!(
            match_id = record.id,
            red_rp = awarded.red,
            blue_rp = awarded.blue,
            "ranking points computed"
        );
        record.awarded_rp = Some(awarded);
    }
}

/// Order rows by ranking points, highest first, and assign dense ranks
/// 1..=N. Ties keep their incoming order. Each row's old rank becomes its
/// previous rank.
pub fn recompute_rankings(rankings: &mut [TeamRanking]) {
    rankings.sort_by(|a, b| b.ranking_points.cmp(&a.ranking_points));
    for (index, row) in rankings.iter_mut().enumerate() {
        row.previous_rank = row.current_rank;
        row.current_rank = Some(index as u32 + 1);
    }
}

/// Join ranking rows with team identity. Rows whose team no longer exists
/// are skipped.
pub fn ranking_rows(rankings: &[TeamRanking], teams: &[Team]) -> Vec<RankingRow> {
    let teams: HashMap<TeamId, &Team> = teams.iter().map(|team| (team.id, team)).collect();
    rankings
        .iter()
        .filter_map(|row| {
            let team = teams.get(&row.team_id)?;
            Some(RankingRow {
                rank: row.current_rank.unwrap_or(0),
                team_id: row.team_id,
                team_number: team.number,
                team_name: team.name.clone(),
                ranking_points: row.ranking_points,
                rank_change: row.rank_change(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchSetup, RankChange};
    use proptest::prelude::*;

    fn full_match() -> MatchRecord {
        let setup = MatchSetup {
            match_number: 1,
            red_teams: [Some(1), Some(2)],
            blue_teams: [Some(3), Some(4)],
            ..MatchSetup::default()
        };
        MatchRecord::new(1, &setup, &RulesConfig::default())
    }

    fn points_of(rankings: &[TeamRanking], team_id: TeamId) -> u32 {
        rankings.iter().find(|row| row.team_id == team_id).map_or(0, |row| row.ranking_points)
    }

    #[test]
    fn test_win_rp_to_higher_score() {
        let rules = RulesConfig::default();
        let engine = RankingEngine::new(&rules);
        let mut record = full_match();
        record.red.score = 20;
        record.blue.score = 14;

        engine.derive_rp(&mut record);
        assert!(record.red.win_rp);
        assert!(!record.blue.win_rp);
    }

    #[test]
    fn test_tie_gives_no_win_rp() {
        let rules = RulesConfig::default();
        let engine = RankingEngine::new(&rules);
        let mut record = full_match();
        record.red.score = 14;
        record.blue.score = 14;
        record.red.win_rp = true;

        engine.derive_rp(&mut record);
        assert!(!record.red.win_rp);
        assert!(!record.blue.win_rp);
    }

    #[test]
    fn test_teleop_rp_is_preserved() {
        let rules = RulesConfig::default();
        let engine = RankingEngine::new(&rules);
        let mut record = full_match();
        record.blue.teleop_rp = true;

        engine.derive_rp(&mut record);
        assert!(record.blue.teleop_rp);
        assert!(!record.red.teleop_rp);
    }

    #[test]
    fn test_compute_awards_each_assigned_team() {
        let rules = RulesConfig::default();
        let engine = RankingEngine::new(&rules);
        let mut record = full_match();
        record.red.score = 30;
        record.red.teleop_rp = true;
        record.red.counters.climb = 2;
        let mut rankings = Vec::new();

        engine.compute(&mut record, &mut rankings);

        assert_eq!(points_of(&rankings, 1), 3);
        assert_eq!(points_of(&rankings, 2), 3);
        assert_eq!(points_of(&rankings, 3), 0);
        assert_eq!(points_of(&rankings, 4), 0);
        assert_eq!(record.awarded_rp, Some(AwardedRp { red: 3, blue: 0 }));
    }

    #[test]
    fn test_unassigned_slot_is_skipped() {
        let rules = RulesConfig::default();
        let engine = RankingEngine::new(&rules);
        let mut record = full_match();
        record.blue_teams[1] = None;
        record.blue.score = 5;
        let mut rankings = Vec::new();

        engine.compute(&mut record, &mut rankings);
        assert_eq!(rankings.len(), 3);
        assert_eq!(points_of(&rankings, 3), 1);
    }

    #[test]
    fn test_recompute_replaces_previous_contribution() {
        let rules = RulesConfig::default();
        let engine = RankingEngine::new(&rules);
        let mut record = full_match();
        record.red.score = 10;
        let mut rankings = vec![TeamRanking { ranking_points: 5, ..TeamRanking::new(1) }];

        engine.compute(&mut record, &mut rankings);
        assert_eq!(points_of(&rankings, 1), 6);

        // Review flips the result
        record.blue.score = 12;
        engine.compute(&mut record, &mut rankings);
        assert_eq!(points_of(&rankings, 1), 5);
        assert_eq!(points_of(&rankings, 3), 1);
    }

    #[test]
    fn test_recompute_rankings_dense_and_stable() {
        let mut rankings = vec![
            TeamRanking { ranking_points: 4, current_rank: Some(1), ..TeamRanking::new(10) },
            TeamRanking { ranking_points: 6, current_rank: Some(2), ..TeamRanking::new(20) },
            TeamRanking { ranking_points: 4, current_rank: Some(3), ..TeamRanking::new(30) },
            TeamRanking::new(40),
        ];

        recompute_rankings(&mut rankings);

        let order: Vec<TeamId> = rankings.iter().map(|row| row.team_id).collect();
        assert_eq!(order, vec![20, 10, 30, 40]);
        let ranks: Vec<Option<u32>> = rankings.iter().map(|row| row.current_rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(rankings[0].rank_change(), RankChange::Up);
        assert_eq!(rankings[1].rank_change(), RankChange::Down);
        assert_eq!(rankings[2].rank_change(), RankChange::Unchanged);
        assert_eq!(rankings[3].rank_change(), RankChange::Unchanged);
    }

    #[test]
    fn test_ranking_rows_join_teams() {
        let mut rankings = vec![TeamRanking { ranking_points: 2, ..TeamRanking::new(1) }, TeamRanking::new(9)];
        recompute_rankings(&mut rankings);
        let teams = vec![Team { id: 1, number: 2056, name: "OP Robotics".into() }];

        let rows = ranking_rows(&rankings, &teams);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].team_number, 2056);
    }

    proptest! {
        /// climb_rp holds exactly when park*2 + slight_ramp*6 + climb*14 >= 20.
        #[test]
        fn prop_climb_rp_threshold(park in 0u32..20, slight_ramp in 0u32..10, climb in 0u32..5) {
            let rules = RulesConfig::default();
            let engine = RankingEngine::new(&rules);
            let mut record = full_match();
            record.red.counters.park = park;
            record.red.counters.slight_ramp = slight_ramp;
            record.red.counters.climb = climb;

            engine.derive_rp(&mut record);
            prop_assert_eq!(record.red.climb_rp, park * 2 + slight_ramp * 6 + climb * 14 >= 20);
            prop_assert!(!record.blue.climb_rp);
        }

        /// Ranks are always a dense permutation of 1..=N sorted by points.
        #[test]
        fn prop_rankings_dense(points in prop::collection::vec(0u32..8, 0..30)) {
            let mut rankings: Vec<TeamRanking> = points
                .iter()
                .enumerate()
                .map(|(i, p)| TeamRanking { ranking_points: *p, ..TeamRanking::new(i as u32 + 1) })
                .collect();

            recompute_rankings(&mut rankings);
            recompute_rankings(&mut rankings);

            let mut ranks: Vec<u32> = rankings.iter().filter_map(|row| row.current_rank).collect();
            ranks.sort_unstable();
            let expected: Vec<u32> = (1..=points.len() as u32).collect();
            prop_assert_eq!(ranks, expected);
            for pair in rankings.windows(2) {
                prop_assert!(pair[0].ranking_points >= pair[1].ranking_points);
            }
        }
    }
}
