//! The organization graph: authoritative member table plus the full
//! relationship set.
//!
//! Members are never removed. Arrest only hides a member from the
//! active views; its relationships stay in place.

use crate::{
    member::{Member, RelationTag, Relationship, Role},
    types::MemberId,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct Network {
    members:       BTreeMap<MemberId, Member>,
    /// Keyed by (min id, max id).
    relationships: BTreeMap<(MemberId, MemberId), Relationship>,
    next_id:       MemberId,
}

fn pair_key(a: MemberId, b: MemberId) -> (MemberId, MemberId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, assigning the next free identifier.
    pub fn add_member(&mut self, label: Option<String>, role: Role, attractiveness: f64) -> MemberId {
        let id = self.next_id;
        self.next_id += 1;
        let label = label.unwrap_or_else(|| format!("N{id:05}"));
        self.members.insert(id, Member::new(id, label, role, attractiveness));
        id
    }

    /// Create the relationship between `a` and `b`, or strengthen it by
    /// one if it already exists. Returns false when either endpoint is
    /// unknown or `a == b`.
    pub fn add_relationship(&mut self, a: MemberId, b: MemberId, tag: RelationTag) -> bool {
        self.add_relationship_weighted(a, b, tag, 1.0)
    }

    /// As `add_relationship`, with an explicit familiarity for a newly
    /// created edge (seed rosters carry initial weights).
    pub fn add_relationship_weighted(
        &mut self,
        a: MemberId,
        b: MemberId,
        tag: RelationTag,
        initial_familiarity: f64,
    ) -> bool {
        if a == b || !self.members.contains_key(&a) || !self.members.contains_key(&b) {
            return false;
        }
        let key = pair_key(a, b);
        self.relationships
            .entry(key)
            .and_modify(|r| r.familiarity += 1.0)
            .or_insert(Relationship {
                a: key.0,
                b: key.1,
                familiarity: initial_familiarity,
                tag,
            });
        if let Some(m) = self.members.get_mut(&a) {
            m.partners.insert(b);
        }
        if let Some(m) = self.members.get_mut(&b) {
            m.partners.insert(a);
        }
        true
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.get_mut(&id)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn relationship(&self, a: MemberId, b: MemberId) -> Option<&Relationship> {
        self.relationships.get(&pair_key(a, b))
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Familiarity of the pair, 0 when they have never transacted.
    pub fn familiarity(&self, a: MemberId, b: MemberId) -> f64 {
        self.relationship(a, b).map(|r| r.familiarity).unwrap_or(0.0)
    }

    /// Distinct relationship partners, arrested ones included.
    pub fn degree(&self, id: MemberId) -> usize {
        self.members.get(&id).map(|m| m.partners.len()).unwrap_or(0)
    }

    /// Active member ids in ascending order, optionally of one role.
    pub fn active_members(&self, role: Option<Role>) -> Vec<MemberId> {
        self.members
            .values()
            .filter(|m| m.is_active() && role.is_none_or(|r| m.role() == r))
            .map(|m| m.id)
            .collect()
    }

    pub fn active_count(&self, role: Option<Role>) -> usize {
        self.members
            .values()
            .filter(|m| m.is_active() && role.is_none_or(|r| m.role() == r))
            .count()
    }

    pub fn arrested_count(&self, role: Role) -> usize {
        self.members
            .values()
            .filter(|m| m.is_arrested() && m.role() == role)
            .count()
    }

    /// Inventory held by active members of `role`.
    pub fn stock_of(&self, role: Role) -> f64 {
        self.members
            .values()
            .filter(|m| m.is_active() && m.role() == role)
            .map(|m| m.drug)
            .sum()
    }

    /// Degree-based visibility: degree over (active population − 1).
    pub fn visibility(&self, id: MemberId) -> f64 {
        let active = self.active_count(None);
        if active <= 1 {
            return 1.0;
        }
        self.degree(id) as f64 / (active - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp() -> RelationTag {
        RelationTag::between(Role::Trafficker, Role::Packager)
    }

    #[test]
    fn add_relationship_is_idempotent_on_degree() {
        let mut net = Network::new();
        let t = net.add_member(None, Role::Trafficker, 0.5);
        let p = net.add_member(None, Role::Packager, 0.5);

        assert!(net.add_relationship(t, p, tp()));
        assert_eq!(net.familiarity(t, p), 1.0);
        assert!(net.add_relationship(p, t, tp()));

        assert_eq!(net.degree(t), 1);
        assert_eq!(net.degree(p), 1);
        assert_eq!(net.familiarity(t, p), 2.0);
        assert_eq!(net.relationship_count(), 1);
    }

    #[test]
    fn unknown_endpoints_and_self_loops_are_ignored() {
        let mut net = Network::new();
        let t = net.add_member(None, Role::Trafficker, 0.5);
        assert!(!net.add_relationship(t, 99, tp()));
        assert!(!net.add_relationship(t, t, tp()));
        assert_eq!(net.relationship_count(), 0);
        assert_eq!(net.degree(99), 0);
        assert_eq!(net.familiarity(t, 99), 0.0);
    }

    #[test]
    fn arrested_members_leave_active_views_but_keep_edges() {
        let mut net = Network::new();
        let t = net.add_member(None, Role::Trafficker, 0.5);
        let p = net.add_member(None, Role::Packager, 0.5);
        let r = net.add_member(None, Role::Retailer, 0.5);
        net.add_relationship(t, p, tp());
        net.add_relationship(p, r, RelationTag::between(Role::Packager, Role::Retailer));

        net.member_mut(p).unwrap().arrest(3);

        assert!(net.active_members(Some(Role::Packager)).is_empty());
        assert_eq!(net.active_members(None), vec![t, r]);
        assert_eq!(net.degree(t), 1, "arrested partners still count");
        assert_eq!(net.relationship_count(), 2);
        assert_eq!(net.arrested_count(Role::Packager), 1);
    }

    #[test]
    fn generated_labels_are_stable() {
        let mut net = Network::new();
        let a = net.add_member(None, Role::Retailer, 0.3);
        let b = net.add_member(Some("R-17".into()), Role::Retailer, 0.3);
        assert_eq!(net.member(a).unwrap().label, "N00000");
        assert_eq!(net.member(b).unwrap().label, "R-17");
    }
}
