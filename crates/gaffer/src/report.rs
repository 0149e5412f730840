// JSON report printed by the CLI.
//
// Engine outputs refer to athletes by arena index; the report resolves them
// to ids and names so it stands on its own.

use gaffer_core::{
    AthleteId, AthleteIdx, CaptainRanking, CaptainScore, ChipRecommendation, Position, Snapshot,
    SquadSelection, TierEntry, TransferPlan, TransferTiers,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AthleteRef {
    pub id: AthleteId,
    pub name: String,
    pub position: Position,
    pub club: String,
    pub price: f64,
    pub expected_points: f64,
}

impl AthleteRef {
    pub fn new(snapshot: &Snapshot, idx: AthleteIdx) -> Self {
        let athlete = snapshot.athlete(idx);
        let club = snapshot
            .club(athlete.club)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| athlete.club.to_string());
        Self {
            id: athlete.id,
            name: athlete.name.clone(),
            position: athlete.position,
            club,
            price: athlete.price,
            expected_points: athlete.expected_points,
        }
    }
}

fn refs(snapshot: &Snapshot, indices: &[AthleteIdx]) -> Vec<AthleteRef> {
    indices.iter().map(|&idx| AthleteRef::new(snapshot, idx)).collect()
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Outcome of transfer planning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanReport {
    /// The current squad is already optimal.
    NoTransfers {
        total_expected_points: f64,
        bank: f64,
    },
    Transfers {
        transfers_out: Vec<AthleteRef>,
        transfers_in: Vec<AthleteRef>,
        paid_transfers: u32,
        transfer_cost: f64,
        total_expected_points: f64,
        bank: f64,
    },
    /// Transfer planning failed; a full rebuild is suggested instead.
    Wildcard {
        reason: String,
        squad: Vec<AthleteRef>,
        total_expected_points: f64,
        total_price: f64,
        bank: f64,
    },
    Failed {
        error: String,
        fallback_error: Option<String>,
    },
}

impl PlanReport {
    pub fn from_plan(snapshot: &Snapshot, plan: &TransferPlan) -> Self {
        if plan.is_empty() {
            return PlanReport::NoTransfers {
                total_expected_points: plan.total_expected_points,
                bank: plan.bank,
            };
        }
        PlanReport::Transfers {
            transfers_out: refs(snapshot, &plan.transfers_out),
            transfers_in: refs(snapshot, &plan.transfers_in),
            paid_transfers: plan.paid_transfers,
            transfer_cost: plan.transfer_cost,
            total_expected_points: plan.total_expected_points,
            bank: plan.bank,
        }
    }

    pub fn from_wildcard(snapshot: &Snapshot, reason: String, selection: &SquadSelection) -> Self {
        PlanReport::Wildcard {
            reason,
            squad: refs(snapshot, selection.squad.picks()),
            total_expected_points: selection.total_expected_points,
            total_price: selection.total_price,
            bank: selection.bank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedScore {
    pub name: String,
    #[serde(flatten)]
    pub score: CaptainScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptaincyReport {
    pub captain: NamedScore,
    pub vice_captain: NamedScore,
    pub alternates: Vec<NamedScore>,
}

impl CaptaincyReport {
    pub fn new(snapshot: &Snapshot, ranking: CaptainRanking) -> Self {
        let named = |score: CaptainScore| NamedScore {
            name: snapshot
                .index_of(score.athlete)
                .map(|idx| snapshot.athlete(idx).name.clone())
                .unwrap_or_default(),
            score,
        };
        Self {
            captain: named(ranking.captain),
            vice_captain: named(ranking.vice_captain),
            alternates: ranking.alternates.into_iter().map(named).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierReportEntry {
    pub athlete: AthleteRef,
    pub score: u32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiersReport {
    pub summary: String,
    pub priority: Vec<TierReportEntry>,
    pub value: Vec<TierReportEntry>,
    pub long_term: Vec<TierReportEntry>,
}

impl TiersReport {
    pub fn new(snapshot: &Snapshot, tiers: &TransferTiers) -> Self {
        let entries = |tier: &[TierEntry]| -> Vec<TierReportEntry> {
            tier.iter()
                .map(|e| TierReportEntry {
                    athlete: AthleteRef::new(snapshot, e.index),
                    score: e.score,
                    reasons: e.reasons.clone(),
                })
                .collect()
        };
        Self {
            summary: tiers.summary(),
            priority: entries(&tiers.priority),
            value: entries(&tiers.value),
            long_term: entries(&tiers.long_term),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub gameweek: u32,
    pub budget: f64,
    pub squad: Vec<AthleteRef>,
    pub plan: PlanReport,
    /// Absent when the squad could not be ranked.
    pub captaincy: Option<CaptaincyReport>,
    pub transfers: TiersReport,
    pub chips: Vec<ChipRecommendation>,
    /// Non-fatal problems met while advising.
    pub warnings: Vec<String>,
}

impl Report {
    pub fn squad_refs(snapshot: &Snapshot, picks: &[AthleteIdx]) -> Vec<AthleteRef> {
        refs(snapshot, picks)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
