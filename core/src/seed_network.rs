//! Seed roster: an observed organization loaded once at setup.
//!
//! Format (JSON):
//! ```json
//! {
//!   "members": [{ "id": "T1", "role": "trafficker" }, ...],
//!   "links":   [{ "source": "T1", "target": "P3", "familiarity": 2.0 }, ...]
//! }
//! ```
//! An unknown role or a duplicate member id is fatal. A link naming an
//! unknown member is logged, skipped and counted in the `SetupReport`; a
//! repeated link strengthens the existing relationship and is reported
//! as merged.

use crate::{
    error::{SimError, SimResult},
    member::{draw_attractiveness, RelationTag, Role},
    network::Network,
    rng::SimRng,
    types::MemberId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedMember {
    pub id:   String,
    pub role: String,
}

fn default_familiarity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedLink {
    pub source: String,
    pub target: String,
    /// Role pair such as `"trafficker-packager"`; derived from the
    /// endpoints when absent.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default = "default_familiarity")]
    pub familiarity: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeedNetwork {
    pub members: Vec<SeedMember>,
    #[serde(default)]
    pub links:   Vec<SeedLink>,
}

/// Outcome of loading a roster into a network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub members:       usize,
    pub relationships: usize,
    /// (source, target) of every link that was not created.
    pub skipped_links: Vec<(String, String)>,
    /// (source, target) of every link that repeated an earlier pair.
    pub merged_links:  Vec<(String, String)>,
}

impl SeedNetwork {
    pub fn load(path: &str) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add every member and link to `network`. Roles, tags and member
    /// ids are all validated before the network is touched.
    pub fn apply(&self, network: &mut Network, rng: &mut SimRng) -> SimResult<SetupReport> {
        let roles: Vec<Role> = self
            .members
            .iter()
            .map(|m| m.role.parse::<Role>())
            .collect::<SimResult<_>>()?;
        let tags: Vec<Option<RelationTag>> = self
            .links
            .iter()
            .map(|l| l.tag.as_deref().map(str::parse::<RelationTag>).transpose())
            .collect::<SimResult<_>>()?;

        let mut seen = BTreeSet::new();
        if let Some(dup) = self.members.iter().find(|m| !seen.insert(m.id.as_str())) {
            return Err(SimError::InvalidParameter {
                name:   "members",
                reason: format!("duplicate member id {}", dup.id),
            });
        }

        let mut ids: BTreeMap<&str, MemberId> = BTreeMap::new();
        for (seed, role) in self.members.iter().zip(roles) {
            let attractiveness = draw_attractiveness(rng);
            let id = network.add_member(Some(seed.id.clone()), role, attractiveness);
            ids.insert(seed.id.as_str(), id);
        }

        let mut report = SetupReport { members: ids.len(), ..SetupReport::default() };
        for (link, tag) in self.links.iter().zip(tags) {
            let endpoints = ids
                .get(link.source.as_str())
                .copied()
                .zip(ids.get(link.target.as_str()).copied());
            let created = match endpoints {
                Some((a, b)) if network.relationship(a, b).is_some() => {
                    log::warn!(
                        "seed link {} -> {} repeats an earlier link, merged",
                        link.source,
                        link.target
                    );
                    report.merged_links.push((link.source.clone(), link.target.clone()));
                    let tag = network.relationship(a, b).map(|r| r.tag);
                    tag.is_some_and(|tag| network.add_relationship(a, b, tag))
                }
                Some((a, b)) => {
                    let tag = tag.unwrap_or_else(|| {
                        let role_of = |id| network.member(id).map(|m| m.role());
                        match (role_of(a), role_of(b)) {
                            (Some(ra), Some(rb)) => RelationTag::between(ra, rb),
                            _ => RelationTag::between(Role::Trafficker, Role::Packager),
                        }
                    });
                    network.add_relationship_weighted(a, b, tag, link.familiarity)
                }
                None => false,
            };
            if !created {
                log::warn!(
                    "seed link {} -> {} skipped: unknown member or self-link",
                    link.source,
                    link.target
                );
                report.skipped_links.push((link.source.clone(), link.target.clone()));
            }
        }
        report.relationships = network.relationship_count();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = r#"{
        "members": [
            { "id": "T1", "role": "trafficker" },
            { "id": "P1", "role": "packager" },
            { "id": "R1", "role": "retailer" },
            { "id": "R2", "role": "retailer" }
        ],
        "links": [
            { "source": "T1", "target": "P1", "familiarity": 3.0 },
            { "source": "P1", "target": "R1", "tag": "packager-retailer" },
            { "source": "P1", "target": "R2" }
        ]
    }"#;

    #[test]
    fn roster_round_trips_into_the_network() {
        let seed = SeedNetwork::from_json(ROSTER).unwrap();
        let mut net = Network::new();
        let report = seed.apply(&mut net, &mut SimRng::new(1)).unwrap();

        assert_eq!(report.members, 4);
        assert_eq!(report.relationships, 3);
        assert!(report.skipped_links.is_empty());
        assert!(report.merged_links.is_empty());
        assert_eq!(net.active_count(None), 4);

        let t1 = net.members().find(|m| m.label == "T1").unwrap().id;
        let p1 = net.members().find(|m| m.label == "P1").unwrap().id;
        assert_eq!(net.familiarity(t1, p1), 3.0);
        assert_eq!(
            net.relationship(t1, p1).unwrap().tag,
            RelationTag::between(Role::Trafficker, Role::Packager)
        );
    }

    #[test]
    fn unknown_link_endpoints_are_skipped_and_reported() {
        let mut seed = SeedNetwork::from_json(ROSTER).unwrap();
        seed.links.push(SeedLink {
            source: "P1".into(),
            target: "R9".into(),
            tag: None,
            familiarity: 1.0,
        });
        let mut net = Network::new();
        let report = seed.apply(&mut net, &mut SimRng::new(1)).unwrap();
        assert_eq!(report.relationships, 3);
        assert_eq!(report.skipped_links, vec![("P1".to_string(), "R9".to_string())]);
    }

    #[test]
    fn unknown_role_is_fatal_and_leaves_network_untouched() {
        let mut seed = SeedNetwork::from_json(ROSTER).unwrap();
        seed.members.push(SeedMember { id: "X1".into(), role: "courier".into() });
        let mut net = Network::new();
        let err = seed.apply(&mut net, &mut SimRng::new(1)).unwrap_err();
        assert!(matches!(err, SimError::UnknownRole { .. }));
        assert!(net.is_empty());
    }

    #[test]
    fn duplicate_member_id_is_fatal_and_leaves_network_untouched() {
        let mut seed = SeedNetwork::from_json(ROSTER).unwrap();
        seed.members.push(SeedMember { id: "P1".into(), role: "packager".into() });
        let mut net = Network::new();
        let err = seed.apply(&mut net, &mut SimRng::new(1)).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { name: "members", .. }));
        assert!(net.is_empty());
    }

    #[test]
    fn repeated_links_are_merged_and_reported() {
        let mut seed = SeedNetwork::from_json(ROSTER).unwrap();
        seed.links.push(SeedLink {
            source: "P1".into(),
            target: "T1".into(),
            tag: None,
            familiarity: 5.0,
        });
        let mut net = Network::new();
        let report = seed.apply(&mut net, &mut SimRng::new(1)).unwrap();

        assert_eq!(report.relationships, 3);
        assert!(report.skipped_links.is_empty());
        assert_eq!(report.merged_links, vec![("P1".to_string(), "T1".to_string())]);
        assert_eq!(report.relationships + report.merged_links.len(), seed.links.len());

        let t1 = net.members().find(|m| m.label == "T1").unwrap().id;
        let p1 = net.members().find(|m| m.label == "P1").unwrap().id;
        assert_eq!(net.familiarity(t1, p1), 4.0);
    }
}
