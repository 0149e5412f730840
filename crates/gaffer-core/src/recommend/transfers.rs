// Transfer classification: urgent sales, short-term value buys and
// long-term keepers.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use super::TransferThresholds;
use crate::model::{Athlete, AthleteId, AthleteIdx, Availability, Squad};
use crate::snapshot::Snapshot;
use crate::stats;

/// Difficulty treated as neutral when scoring a fixture run.
const NEUTRAL_DIFFICULTY: f64 = 3.0;

/// One athlete placed in a tier, with the signals that put it there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierEntry {
    pub index: AthleteIdx,
    pub athlete: AthleteId,
    pub score: u32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TransferTiers {
    /// Squad athletes that should go soon.
    pub priority: Vec<TierEntry>,
    /// Pool athletes worth buying for the next few gameweeks.
    pub value: Vec<TierEntry>,
    /// Pool athletes worth holding for the season.
    pub long_term: Vec<TierEntry>,
}

impl TransferTiers {
    /// One-line summary, e.g. "2 urgent transfer(s) needed; 4 good value
    /// opportunities".
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.priority.is_empty() {
            parts.push(format!("{} urgent transfer(s) needed", self.priority.len()));
        }
        if !self.value.is_empty() {
            parts.push(format!("{} good value opportunities", self.value.len()));
        }
        if !self.long_term.is_empty() {
            parts.push(format!("{} season keeper options", self.long_term.len()));
        }
        if parts.is_empty() {
            return "No immediate transfers recommended".to_string();
        }
        parts.join("; ")
    }
}

/// `(3 - average difficulty) / 2` over the club's next `span` gameweeks.
fn fixture_run_score(
    snapshot: &Snapshot,
    athlete: &Athlete,
    gameweek: u32,
    span: u32,
) -> Option<f64> {
    snapshot
        .fixtures()
        .average_difficulty(athlete.club, gameweek, span)
        .map(|avg| (NEUTRAL_DIFFICULTY - avg) / 2.0)
}

fn priority_entry(idx: AthleteIdx, athlete: &Athlete, t: &TransferThresholds) -> Option<TierEntry> {
    let mut score = 0;
    let mut reasons = Vec::new();

    match athlete.status {
        Availability::Injured => {
            reasons.push("Injured".to_string());
            score += 3;
        }
        Availability::Suspended => {
            reasons.push("Suspended".to_string());
            score += 3;
        }
        Availability::Doubtful => {
            reasons.push("Doubtful to play".to_string());
            score += 1;
        }
        Availability::Available => {}
    }
    if athlete.price_change < t.price_drop {
        reasons.push("Falling in price".to_string());
        score += 1;
    }

    (score > 0).then(|| TierEntry {
        index: idx,
        athlete: athlete.id,
        score,
        reasons,
    })
}

fn value_entry(
    idx: AthleteIdx,
    athlete: &Athlete,
    gameweek: u32,
    snapshot: &Snapshot,
    t: &TransferThresholds,
) -> Option<TierEntry> {
    let mut score = 0;
    let mut reasons = Vec::new();

    if athlete.price_change > t.price_rise {
        reasons.push("Rising in price".to_string());
        score += 2;
    }
    match fixture_run_score(snapshot, athlete, gameweek, t.fixture_run_span) {
        Some(run) if run > t.excellent_run => {
            reasons.push("Excellent fixture run".to_string());
            score += 3;
        }
        Some(run) if run > t.good_run => {
            reasons.push("Good upcoming fixtures".to_string());
            score += 1;
        }
        Some(_) => {}
        None => debug!(
            "{}: no fixtures in the next {} gameweeks",
            athlete.name, t.fixture_run_span
        ),
    }
    if athlete.expected_points > t.value_expected_points {
        reasons.push(format!("High expected points ({:.1})", athlete.expected_points));
        score += 2;
    }
    if athlete.form > t.hot_form {
        reasons.push("Excellent recent form".to_string());
        score += 1;
    }

    (score > t.value_min_score).then(|| TierEntry {
        index: idx,
        athlete: athlete.id,
        score,
        reasons,
    })
}

fn long_term_entry(
    idx: AthleteIdx,
    athlete: &Athlete,
    t: &TransferThresholds,
) -> Option<TierEntry> {
    let mut score = 0;
    let mut reasons = Vec::new();

    if athlete.expected_points > t.keeper_expected_points {
        reasons.push("Consistent high scorer".to_string());
        score += 3;
    }
    match stats::ratio(athlete.expected_points, athlete.price) {
        Some(ppp) if ppp > t.points_per_price => {
            reasons.push(format!("Excellent value ({ppp:.1} pts per unit price)"));
            score += 2;
        }
        Some(_) => {}
        None => debug!("{}: no usable price for points-per-price", athlete.name),
    }
    if athlete.set_piece_taker {
        reasons.push("Takes set pieces".to_string());
        score += 1;
    }

    (score > t.keeper_min_score).then(|| TierEntry {
        index: idx,
        athlete: athlete.id,
        score,
        reasons,
    })
}

/// Score desc, then expected points desc, then athlete id asc.
fn sort_tier(entries: &mut [TierEntry], snapshot: &Snapshot) {
    entries.sort_by(|a, b| {
        let ep_a = snapshot.athlete(a.index).expected_points;
        let ep_b = snapshot.athlete(b.index).expected_points;
        b.score
            .cmp(&a.score)
            .then(ep_b.partial_cmp(&ep_a).unwrap_or(Ordering::Equal))
            .then(a.athlete.cmp(&b.athlete))
    });
}

/// Split transfer opportunities into priority, value and long-term tiers.
///
/// Priority looks only at squad members; value and long-term look only at
/// pool athletes outside the squad. Indices missing from the snapshot are
/// skipped.
pub fn classify_transfers(
    squad: &Squad,
    pool: &[AthleteIdx],
    gameweek: u32,
    snapshot: &Snapshot,
    thresholds: &TransferThresholds,
) -> TransferTiers {
    let known = |idx: AthleteIdx| {
        let athlete = snapshot.get(idx);
        if athlete.is_none() {
            debug!("athlete index {} is not in the snapshot, skipping", idx.0);
        }
        athlete.map(|a| (idx, a))
    };

    let mut priority: Vec<TierEntry> = squad
        .picks()
        .iter()
        .filter_map(|&idx| known(idx))
        .filter_map(|(idx, a)| priority_entry(idx, a, thresholds))
        .collect();
    sort_tier(&mut priority, snapshot);

    let mut seen: HashSet<AthleteIdx> = squad.picks().iter().copied().collect();
    let outsiders: Vec<(AthleteIdx, &Athlete)> = pool
        .iter()
        .copied()
        .filter(|idx| seen.insert(*idx))
        .filter_map(known)
        .collect();

    let mut value: Vec<TierEntry> = outsiders
        .iter()
        .filter_map(|&(idx, a)| value_entry(idx, a, gameweek, snapshot, thresholds))
        .collect();
    sort_tier(&mut value, snapshot);
    value.truncate(thresholds.value_limit);

    let mut long_term: Vec<TierEntry> = outsiders
        .iter()
        .filter_map(|&(idx, a)| long_term_entry(idx, a, thresholds))
        .collect();
    sort_tier(&mut long_term, snapshot);
    long_term.truncate(thresholds.keeper_limit);

    debug!(
        "transfer tiers: {} priority, {} value, {} long-term",
        priority.len(),
        value.len(),
        long_term.len()
    );

    TransferTiers {
        priority,
        value,
        long_term,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClubId, Fixture, Position};

    fn athlete(id: u32, club: u32, price: f64, ep: f64) -> Athlete {
        Athlete {
            id: AthleteId(id),
            name: format!("A{id}"),
            position: Position::Midfielder,
            club: ClubId(club),
            price,
            status: Availability::Available,
            expected_points: ep,
            recent_points: vec![],
            price_change: 0.0,
            form: 0.0,
            set_piece_taker: false,
        }
    }

    /// Club 1 plays easy fixtures (difficulty 2) in gameweeks 1..=6; club 2
    /// gets the hard side (difficulty 5).
    fn easy_run_snapshot() -> Snapshot {
        let fixtures = (1..=6)
            .map(|gw| Fixture {
                id: gw,
                gameweek: gw,
                home: ClubId(1),
                away: ClubId(2),
                home_difficulty: 2,
                away_difficulty: 5,
                kickoff: None,
            })
            .collect();
        Snapshot::new(vec![], fixtures)
    }

    #[test]
    fn priority_tier_scores_availability_and_price_drops() {
        let mut snap = easy_run_snapshot();
        let mut injured = athlete(1, 2, 5.0, 2.0);
        injured.status = Availability::Injured;
        let mut doubtful_falling = athlete(2, 2, 5.0, 3.0);
        doubtful_falling.status = Availability::Doubtful;
        doubtful_falling.price_change = -0.3;
        let fine = athlete(3, 2, 5.0, 3.0);

        let squad = Squad::new(vec![
            snap.add_athlete(fine, vec![]),
            snap.add_athlete(doubtful_falling, vec![]),
            snap.add_athlete(injured, vec![]),
        ]);
        let tiers = classify_transfers(&squad, &[], 1, &snap, &TransferThresholds::default());

        let ids: Vec<AthleteId> = tiers.priority.iter().map(|e| e.athlete).collect();
        assert_eq!(ids, vec![AthleteId(1), AthleteId(2)]);
        assert_eq!(tiers.priority[0].score, 3);
        assert_eq!(tiers.priority[1].reasons, vec!["Doubtful to play", "Falling in price"]);
        assert!(tiers.value.is_empty());
    }

    #[test]
    fn value_tier_uses_fixture_run() {
        let mut snap = easy_run_snapshot();
        let squad = Squad::new(vec![]);
        // Run score (3 - 2) / 2 = 0.5 -> +3; rising price +2.
        let mut riser = athlete(10, 1, 6.0, 4.0);
        riser.price_change = 0.2;
        // Hard run, only high EP: 2 is not enough.
        let hard = athlete(11, 2, 6.0, 7.5);
        let pool = vec![snap.add_athlete(riser, vec![]), snap.add_athlete(hard, vec![])];

        let tiers = classify_transfers(&squad, &pool, 1, &snap, &TransferThresholds::default());
        assert_eq!(tiers.value.len(), 1);
        assert_eq!(tiers.value[0].athlete, AthleteId(10));
        assert_eq!(tiers.value[0].score, 5);
        assert_eq!(tiers.value[0].reasons, vec!["Rising in price", "Excellent fixture run"]);
    }

    #[test]
    fn long_term_tier_ties_break_on_expected_points_then_id() {
        let mut snap = easy_run_snapshot();
        let a = athlete(30, 2, 5.0, 9.0); // 3 + 2 = 5
        let b = athlete(20, 2, 5.0, 9.0); // 5, same EP, lower id
        let c = athlete(25, 2, 5.0, 9.5); // 5, higher EP
        let d = athlete(40, 2, 10.0, 9.0); // 3 only
        let pool: Vec<AthleteIdx> = [a, b, c, d]
            .into_iter()
            .map(|x| snap.add_athlete(x, vec![]))
            .collect();

        let t = TransferThresholds::default();
        let tiers = classify_transfers(&Squad::new(vec![]), &pool, 1, &snap, &t);
        let ids: Vec<AthleteId> = tiers.long_term.iter().map(|e| e.athlete).collect();
        assert_eq!(ids, vec![AthleteId(25), AthleteId(20), AthleteId(30)]);
    }

    #[test]
    fn squad_members_are_not_buy_candidates() {
        let mut snap = easy_run_snapshot();
        let star = snap.add_athlete(athlete(1, 1, 5.0, 12.0), vec![]);
        let squad = Squad::new(vec![star]);
        let t = TransferThresholds::default();
        let tiers = classify_transfers(&squad, &[star, AthleteIdx(99)], 1, &snap, &t);
        assert!(tiers.value.is_empty());
        assert!(tiers.long_term.is_empty());
        assert_eq!(tiers.summary(), "No immediate transfers recommended");
    }

    #[test]
    fn summary_lists_non_empty_tiers() {
        let tiers = TransferTiers {
            priority: vec![TierEntry {
                index: AthleteIdx(0),
                athlete: AthleteId(1),
                score: 3,
                reasons: vec![],
            }],
            value: vec![],
            long_term: vec![],
        };
        assert_eq!(tiers.summary(), "1 urgent transfer(s) needed");
    }
}
