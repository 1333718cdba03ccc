//! Organization members and the relationships between them.
//!
//! Role-specific fields live on `RoleState`; shared fields on `Member`.
//! Behaviour is dispatched on the role with plain `match`, never through
//! trait objects.

use crate::{
    error::SimError,
    rng::SimRng,
    types::{MemberId, Tick},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Position in the supply chain. Declaration order is upstream-first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Trafficker,
    Packager,
    Retailer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Trafficker, Role::Packager, Role::Retailer];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Trafficker => "trafficker",
            Self::Packager   => "packager",
            Self::Retailer   => "retailer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trafficker" | "traffickers" | "t" => Ok(Self::Trafficker),
            "packager" | "packagers" | "p"     => Ok(Self::Packager),
            "retailer" | "retailers" | "r"     => Ok(Self::Retailer),
            other => Err(SimError::UnknownRole { role: other.to_string() }),
        }
    }
}

/// Role-specific member state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleState {
    Trafficker { acquisitions: u32 },
    Packager   { available: bool },
    Retailer   { available: bool, daily_profit: f64 },
}

impl RoleState {
    pub fn fresh(role: Role) -> Self {
        match role {
            Role::Trafficker => Self::Trafficker { acquisitions: 0 },
            Role::Packager   => Self::Packager { available: true },
            Role::Retailer   => Self::Retailer { available: true, daily_profit: 0.0 },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Trafficker { .. } => Role::Trafficker,
            Self::Packager { .. }   => Role::Packager,
            Self::Retailer { .. }   => Role::Retailer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id:             MemberId,
    /// External label (seed roster identifier or generated node name).
    pub label:          String,
    /// Criminal skill / visibility, in [0, 1].
    pub attractiveness: f64,
    /// Grams held. Never negative.
    pub drug:           f64,
    pub arrested_at:    Option<Tick>,
    pub partners:       BTreeSet<MemberId>,
    pub state:          RoleState,
}

impl Member {
    pub fn new(id: MemberId, label: String, role: Role, attractiveness: f64) -> Self {
        Self {
            id,
            label,
            attractiveness,
            drug: 0.0,
            arrested_at: None,
            partners: BTreeSet::new(),
            state: RoleState::fresh(role),
        }
    }

    pub fn role(&self) -> Role {
        self.state.role()
    }

    pub fn is_arrested(&self) -> bool {
        self.arrested_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.arrested_at.is_none()
    }

    /// Availability indicator as a number (1.0 / 0.0). Traffickers have
    /// no availability and report `None`.
    pub fn availability(&self) -> Option<f64> {
        match self.state {
            RoleState::Trafficker { .. } => None,
            RoleState::Packager { available } | RoleState::Retailer { available, .. } => {
                Some(if available { 1.0 } else { 0.0 })
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability().map(|a| a > 0.0).unwrap_or(false)
    }

    pub fn set_available(&mut self, value: bool) {
        match &mut self.state {
            RoleState::Trafficker { .. } => {}
            RoleState::Packager { available } | RoleState::Retailer { available, .. } => {
                *available = value;
            }
        }
    }

    /// Recompute availability against a capacity threshold.
    pub fn refresh_availability(&mut self, capacity: f64) {
        let below = self.drug < capacity;
        self.set_available(below);
    }

    /// Book sale profit on a retailer; returns the day's running total.
    pub fn add_daily_profit(&mut self, amount: f64) -> f64 {
        match &mut self.state {
            RoleState::Retailer { daily_profit, .. } => {
                *daily_profit += amount;
                *daily_profit
            }
            _ => 0.0,
        }
    }

    pub fn reset_daily_profit(&mut self) {
        if let RoleState::Retailer { daily_profit, .. } = &mut self.state {
            *daily_profit = 0.0;
        }
    }

    /// Arrest is permanent; a second arrest keeps the first tick.
    pub fn arrest(&mut self, tick: Tick) {
        if self.arrested_at.is_none() {
            self.arrested_at = Some(tick);
        }
    }

    /// Skill update after an acquisition attempt. Success raises skill
    /// with diminishing returns, failure lowers it symmetrically.
    pub fn record_acquisition(&mut self, success: bool) {
        let a = self.attractiveness;
        self.attractiveness = if success {
            if a < 0.2 {
                0.2
            } else {
                (a + 0.0001f64.powf(a)).min(1.0)
            }
        } else if a > 0.8 {
            0.8
        } else {
            (a - 0.0001f64.powf(1.0 - a)).max(0.0)
        };
        if success {
            if let RoleState::Trafficker { acquisitions } = &mut self.state {
                *acquisitions += 1;
            }
        }
    }

    /// Daily ±`jitter` proportional drift of packager and retailer skill.
    pub fn jitter_attractiveness(&mut self, jitter: f64, rng: &mut SimRng) {
        let spread = self.attractiveness * jitter;
        let variation = rng.uniform(-spread, spread);
        self.attractiveness = (self.attractiveness + variation).clamp(0.1, 1.0);
    }
}

/// Initial skill: standard normal squeezed into [0, 1], clipped to
/// [0.1, 1.0].
pub fn draw_attractiveness(rng: &mut SimRng) -> f64 {
    ((rng.standard_normal() + 3.0) / 6.0).clamp(0.1, 1.0)
}

/// Role pair of a relationship, stored upstream-first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationTag {
    pub upstream:   Role,
    pub downstream: Role,
}

impl RelationTag {
    pub fn between(a: Role, b: Role) -> Self {
        if a <= b {
            Self { upstream: a, downstream: b }
        } else {
            Self { upstream: b, downstream: a }
        }
    }
}

impl fmt::Display for RelationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.upstream, self.downstream)
    }
}

impl FromStr for RelationTag {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| SimError::UnknownRole { role: s.to_string() })?;
        Ok(Self::between(a.parse()?, b.parse()?))
    }
}

/// Undirected relationship. Familiarity starts at the creation weight
/// and grows by one on every repeated transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub a:           MemberId,
    pub b:           MemberId,
    pub familiarity: f64,
    pub tag:         RelationTag,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_accepts_names_and_rejects_unknown() {
        assert_eq!("Trafficker".parse::<Role>().unwrap(), Role::Trafficker);
        assert_eq!("retailers".parse::<Role>().unwrap(), Role::Retailer);
        assert!(matches!("courier".parse::<Role>(), Err(SimError::UnknownRole { .. })));
    }

    #[test]
    fn relation_tag_is_order_independent() {
        let t = RelationTag::between(Role::Retailer, Role::Packager);
        assert_eq!(t, RelationTag::between(Role::Packager, Role::Retailer));
        assert_eq!(t.to_string(), "packager-retailer");
        assert_eq!("retailer-packager".parse::<RelationTag>().unwrap(), t);
    }

    #[test]
    fn acquisition_skill_updates_stay_bounded() {
        let mut m = Member::new(0, "N00000".into(), Role::Trafficker, 0.1);
        m.record_acquisition(true);
        assert_eq!(m.attractiveness, 0.2);
        for _ in 0..200 {
            m.record_acquisition(true);
        }
        assert!(m.attractiveness <= 1.0);
        assert_eq!(m.state, RoleState::Trafficker { acquisitions: 201 });

        m.record_acquisition(false);
        assert_eq!(m.attractiveness, 0.8);
        for _ in 0..200 {
            m.record_acquisition(false);
        }
        assert!(m.attractiveness >= 0.0);
    }

    #[test]
    fn traffickers_have_no_availability() {
        let mut t = Member::new(0, "t".into(), Role::Trafficker, 0.5);
        assert_eq!(t.availability(), None);
        t.set_available(true);
        assert!(!t.is_available());

        let mut r = Member::new(1, "r".into(), Role::Retailer, 0.5);
        r.drug = 250.0;
        r.refresh_availability(200.0);
        assert_eq!(r.availability(), Some(0.0));
    }

    #[test]
    fn arrest_is_permanent_and_keeps_first_tick() {
        let mut m = Member::new(3, "m".into(), Role::Packager, 0.5);
        m.arrest(10);
        m.arrest(20);
        assert_eq!(m.arrested_at, Some(10));
        assert!(!m.is_active());
    }
}
