//! Modeled outcomes emitted by the subsystems.
//!
//! RULE: Nothing here is an error. Failed acquisitions, exhausted tiers
//! and vetoes are outcomes; they are logged and counted.

use crate::{
    member::Role,
    state::WindowHalf,
    types::{MemberId, RunId, Tick},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during simulation.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    TickStarted {
        tick: Tick,
    },
    TickCompleted {
        tick: Tick,
    },
    RunInitialized {
        run_id: RunId,
        seed: u64,
        members: usize,
        relationships: usize,
    },

    // ── Flow events ────────────────────────────────
    AcquisitionSkipped {
        tick: Tick,
        stock_drug: f64,
        target_stock_drug: f64,
    },
    AcquisitionVetoed {
        tick: Tick,
        half: WindowHalf,
    },
    DrugAcquired {
        tick: Tick,
        member: MemberId,
        grams: f64,
        price: f64,
        partial: bool,
    },
    AcquisitionFailed {
        tick: Tick,
        member: MemberId,
        acquisition_index: f64,
    },
    TierExhausted {
        tick: Tick,
        role: Role,
    },

    // ── Law enforcement events ─────────────────────
    MemberArrested {
        tick: Tick,
        member: MemberId,
        role: Role,
        kind: ArrestKind,
        confiscated: f64,
    },
    DisruptionStarted {
        tick: Tick,
        arrested: usize,
        duration: Tick,
    },
    DisruptionEnded {
        tick: Tick,
    },
    OrganizationCollapsed {
        tick: Tick,
        reason: CollapseReason,
    },

    // ── Finance events ─────────────────────────────
    WeeklyExpensesSettled {
        tick: Tick,
        wages: f64,
        family_support: f64,
        weekly_profit: f64,
    },
    ParametersUpdated {
        tick: Tick,
        unit_dose: f64,
        wholesale_price: f64,
        retail_price: f64,
        cost_per_day: f64,
    },
    MemberRecruited {
        tick: Tick,
        member: MemberId,
        role: Role,
    },
    YearCompleted {
        tick: Tick,
        year: u64,
        cash_box: f64,
        members: usize,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArrestKind {
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollapseReason {
    RoleEmptied(Role),
    Insolvent,
}

impl SimEvent {
    /// Stable name for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TickStarted { .. }           => "tick_started",
            Self::TickCompleted { .. }         => "tick_completed",
            Self::RunInitialized { .. }        => "run_initialized",
            Self::AcquisitionSkipped { .. }    => "acquisition_skipped",
            Self::AcquisitionVetoed { .. }     => "acquisition_vetoed",
            Self::DrugAcquired { .. }          => "drug_acquired",
            Self::AcquisitionFailed { .. }     => "acquisition_failed",
            Self::TierExhausted { .. }         => "tier_exhausted",
            Self::MemberArrested { .. }        => "member_arrested",
            Self::DisruptionStarted { .. }     => "disruption_started",
            Self::DisruptionEnded { .. }       => "disruption_ended",
            Self::OrganizationCollapsed { .. } => "organization_collapsed",
            Self::WeeklyExpensesSettled { .. } => "weekly_expenses_settled",
            Self::ParametersUpdated { .. }     => "parameters_updated",
            Self::MemberRecruited { .. }       => "member_recruited",
            Self::YearCompleted { .. }         => "year_completed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub tick: Tick,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
