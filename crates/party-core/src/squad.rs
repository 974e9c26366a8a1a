//! Squad position assignment.
//!
//! Positions run 0..=15 and are handed out from a priority list. The result
//! is stored on the party meta as `[{memberId, absoluteMemberIdx}]` with
//! hidden members left out.

use crate::error::{PartyError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Number of squad slots in a party.
pub const SQUAD_SLOTS: u8 = 16;

/// A member's slot and visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SquadAssignment {
    #[serde(default)]
    pub position: Option<u8>,
    #[serde(default)]
    pub hidden: bool,
}

impl SquadAssignment {
    #[must_use]
    pub fn at(position: u8) -> Self {
        Self {
            position: Some(position),
            hidden: false,
        }
    }

    #[must_use]
    pub fn hidden() -> Self {
        Self {
            position: None,
            hidden: true,
        }
    }
}

/// Order in which free positions are handed out. Always a permutation of
/// `0..16`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct PositionPriorities(Vec<u8>);

impl Default for PositionPriorities {
    fn default() -> Self {
        Self((0..SQUAD_SLOTS).collect())
    }
}

impl TryFrom<Vec<u8>> for PositionPriorities {
    type Error = PartyError;

    fn try_from(order: Vec<u8>) -> Result<Self> {
        let mut seen = [false; SQUAD_SLOTS as usize];
        for &pos in &order {
            if pos >= SQUAD_SLOTS || seen[pos as usize] {
                return Err(PartyError::validation(
                    "position priorities must be a permutation of 0-15",
                ));
            }
            seen[pos as usize] = true;
        }
        if order.len() != SQUAD_SLOTS as usize {
            return Err(PartyError::validation(
                "position priorities must list all 16 positions",
            ));
        }
        Ok(Self(order))
    }
}

impl From<PositionPriorities> for Vec<u8> {
    fn from(p: PositionPriorities) -> Self {
        p.0
    }
}

impl PositionPriorities {
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// Party-wide inputs to [`construct`].
#[derive(Clone, Copy, Debug)]
pub struct SquadPolicy<'a> {
    pub priorities: &'a PositionPriorities,
    pub default_assignment: SquadAssignment,
    /// Hand every member a fresh position whenever assignments are rebuilt.
    pub reassign_on_size_change: bool,
}

/// The positions not handed out yet, in priority order.
struct Pool(Vec<u8>);

impl Pool {
    fn take(&mut self, position: u8) -> bool {
        match self.0.iter().position(|&p| p == position) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    fn next(&mut self) -> Result<u8> {
        if self.0.is_empty() {
            return Err(PartyError::validation("no free squad positions left"));
        }
        Ok(self.0.remove(0))
    }

    fn contains(&self, position: u8) -> bool {
        self.0.contains(&position)
    }
}

/// Rebuild squad assignments.
///
/// `existing` is the current assignment list, `members` the party's member
/// ids in arena order. `new_positions` moves members to explicit slots
/// (a swap lists both sides). `overrides` pins or re-queues individual
/// members. Ids not in `members` are skipped. The result is sorted by
/// position.
pub fn construct(
    existing: &[(String, SquadAssignment)],
    members: &[String],
    policy: SquadPolicy<'_>,
    overrides: Option<&IndexMap<String, SquadAssignment>>,
    new_positions: Option<&IndexMap<String, u8>>,
) -> Result<Vec<(String, SquadAssignment)>> {
    let is_member = |id: &str| members.iter().any(|m| m == id);
    let previous = |id: &str| {
        existing
            .iter()
            .find(|(m, _)| m == id)
            .map(|(_, a)| *a)
    };

    let mut pool = Pool(policy.priorities.as_slice().to_vec());
    let mut results: IndexMap<String, SquadAssignment> = IndexMap::new();

    if let Some(moves) = new_positions {
        for (id, &position) in moves {
            if !is_member(id) {
                continue;
            }
            let assignment = match previous(id) {
                Some(mut assignment) => {
                    if !pool.take(position) {
                        return Err(PartyError::validation(format!(
                            "position {position} is not available"
                        )));
                    }
                    assignment.position = Some(position);
                    assignment
                }
                // unknown to the current layout, so it queues like a newcomer
                None => SquadAssignment {
                    position: Some(pool.next()?),
                    ..policy.default_assignment
                },
            };
            results.insert(id.clone(), assignment);
        }
    }

    if let Some(overrides) = overrides {
        for (id, assignment) in overrides {
            if !is_member(id) {
                continue;
            }
            let mut assignment = *assignment;
            match assignment.position {
                Some(position) => {
                    if !pool.take(position) {
                        return Err(PartyError::validation("Duplicate positions set."));
                    }
                }
                None => assignment.position = Some(pool.next()?),
            }
            results.insert(id.clone(), assignment);
        }
    }

    for id in members {
        if results.contains_key(id) {
            continue;
        }
        let assignment = match previous(id) {
            Some(mut assignment) => {
                let still_free = assignment.position.is_some_and(|p| pool.contains(p));
                if policy.reassign_on_size_change || !still_free {
                    assignment.position = Some(pool.next()?);
                } else if let Some(p) = assignment.position {
                    pool.take(p);
                }
                assignment
            }
            None => SquadAssignment {
                position: Some(pool.next()?),
                ..policy.default_assignment
            },
        };
        results.insert(id.clone(), assignment);
    }

    let mut sorted: Vec<(String, SquadAssignment)> = results.into_iter().collect();
    sorted.sort_by_key(|(_, a)| a.position);
    Ok(sorted)
}

/// One entry of the `RawSquadAssignments` wire list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAssignment {
    pub member_id: String,
    pub absolute_member_idx: i64,
}

/// Wire form of `assignments`, hidden members dropped.
#[must_use]
pub fn to_wire(assignments: &[(String, SquadAssignment)]) -> Vec<WireAssignment> {
    assignments
        .iter()
        .filter(|(_, a)| !a.hidden)
        .filter_map(|(id, a)| {
            a.position.map(|p| WireAssignment {
                member_id: id.clone(),
                absolute_member_idx: i64::from(p),
            })
        })
        .collect()
}

/// Rebuild assignments from the wire list, keeping known members only.
#[must_use]
pub fn from_wire(
    raw: &[WireAssignment],
    is_member: impl Fn(&str) -> bool,
) -> Vec<(String, SquadAssignment)> {
    let mut sorted: Vec<&WireAssignment> = raw.iter().collect();
    sorted.sort_by_key(|w| w.absolute_member_idx);
    sorted
        .into_iter()
        .filter(|w| is_member(&w.member_id))
        .filter_map(|w| {
            u8::try_from(w.absolute_member_idx)
                .ok()
                .map(|p| (w.member_id.clone(), SquadAssignment::at(p)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{i}")).collect()
    }

    fn policy(priorities: &PositionPriorities, reassign: bool) -> SquadPolicy<'_> {
        SquadPolicy {
            priorities,
            default_assignment: SquadAssignment::default(),
            reassign_on_size_change: reassign,
        }
    }

    fn position_of(result: &[(String, SquadAssignment)], id: &str) -> Option<u8> {
        result.iter().find(|(m, _)| m == id).and_then(|(_, a)| a.position)
    }

    #[test]
    fn test_full_party_is_a_bijection() {
        let priorities = PositionPriorities::default();
        let members = ids(16);
        let result = construct(&[], &members, policy(&priorities, true), None, None).unwrap();
        assert_eq!(result.len(), 16);
        let positions: HashSet<u8> = result.iter().filter_map(|(_, a)| a.position).collect();
        assert_eq!(positions, (0..16).collect());
        let owners: HashSet<&String> = result.iter().map(|(m, _)| m).collect();
        assert_eq!(owners.len(), 16);
    }

    #[test]
    fn test_seventeenth_member_is_rejected() {
        let priorities = PositionPriorities::default();
        let err = construct(&[], &ids(17), policy(&priorities, true), None, None).unwrap_err();
        assert!(matches!(err, PartyError::Validation(_)));
    }

    #[test]
    fn test_swap_is_true_swap_and_idempotent() {
        let priorities = PositionPriorities::default();
        let members = vec!["a".to_string(), "b".to_string()];
        let existing = vec![
            ("a".to_string(), SquadAssignment::at(3)),
            ("b".to_string(), SquadAssignment::at(7)),
        ];
        let mut moves = IndexMap::new();
        moves.insert("a".to_string(), 7u8);
        moves.insert("b".to_string(), 3u8);

        let first = construct(&existing, &members, policy(&priorities, true), None, Some(&moves))
            .unwrap();
        assert_eq!(position_of(&first, "a"), Some(7));
        assert_eq!(position_of(&first, "b"), Some(3));
        assert_eq!(first[0].0, "b");

        let second = construct(&first, &members, policy(&priorities, true), None, Some(&moves))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_keeps_positions_when_not_reassigning() {
        let priorities = PositionPriorities::default();
        let members = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let existing = vec![
            ("a".to_string(), SquadAssignment::at(5)),
            ("b".to_string(), SquadAssignment::at(9)),
        ];
        let result =
            construct(&existing, &members, policy(&priorities, false), None, None).unwrap();
        assert_eq!(position_of(&result, "a"), Some(5));
        assert_eq!(position_of(&result, "b"), Some(9));
        assert_eq!(position_of(&result, "c"), Some(0));
    }

    #[test]
    fn test_reassign_compacts_positions() {
        let priorities = PositionPriorities::default();
        let members = vec!["a".to_string(), "b".to_string()];
        let existing = vec![
            ("a".to_string(), SquadAssignment::at(5)),
            ("b".to_string(), SquadAssignment::at(9)),
        ];
        let result = construct(&existing, &members, policy(&priorities, true), None, None).unwrap();
        assert_eq!(position_of(&result, "a"), Some(0));
        assert_eq!(position_of(&result, "b"), Some(1));
    }

    #[test]
    fn test_duplicate_override_positions_error() {
        let priorities = PositionPriorities::default();
        let members = vec!["a".to_string(), "b".to_string()];
        let mut overrides = IndexMap::new();
        overrides.insert("a".to_string(), SquadAssignment::at(2));
        overrides.insert("b".to_string(), SquadAssignment::at(2));
        let err = construct(&[], &members, policy(&priorities, true), Some(&overrides), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Duplicate positions set.");
    }

    #[test]
    fn test_override_without_position_takes_next() {
        let priorities =
            PositionPriorities::try_from(vec![4, 0, 1, 2, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15])
                .unwrap();
        let members = vec!["a".to_string(), "b".to_string()];
        let mut overrides = IndexMap::new();
        overrides.insert("b".to_string(), SquadAssignment::hidden());
        let result =
            construct(&[], &members, policy(&priorities, true), Some(&overrides), None).unwrap();
        assert_eq!(position_of(&result, "b"), Some(4));
        assert_eq!(position_of(&result, "a"), Some(0));
        assert!(result.iter().any(|(m, a)| m == "b" && a.hidden));
    }

    #[test]
    fn test_unknown_ids_are_skipped() {
        let priorities = PositionPriorities::default();
        let members = vec!["a".to_string()];
        let mut moves = IndexMap::new();
        moves.insert("ghost".to_string(), 3u8);
        let result =
            construct(&[], &members, policy(&priorities, true), None, Some(&moves)).unwrap();
        assert_eq!(result, vec![("a".to_string(), SquadAssignment::at(0))]);
    }

    #[test]
    fn test_hidden_members_are_left_off_the_wire() {
        let assignments = vec![
            ("a".to_string(), SquadAssignment::at(0)),
            (
                "b".to_string(),
                SquadAssignment {
                    position: Some(1),
                    hidden: true,
                },
            ),
        ];
        let wire = to_wire(&assignments);
        assert_eq!(wire.len(), 1);
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            serde_json::json!([{"memberId": "a", "absoluteMemberIdx": 0}])
        );
        let back = from_wire(&wire, |id| id == "a" || id == "b");
        assert_eq!(back, vec![("a".to_string(), SquadAssignment::at(0))]);
    }

    #[test]
    fn test_from_wire_sorts_and_filters() {
        let wire = vec![
            WireAssignment {
                member_id: "b".into(),
                absolute_member_idx: 4,
            },
            WireAssignment {
                member_id: "gone".into(),
                absolute_member_idx: 0,
            },
            WireAssignment {
                member_id: "a".into(),
                absolute_member_idx: 2,
            },
        ];
        let back = from_wire(&wire, |id| id != "gone");
        assert_eq!(
            back,
            vec![
                ("a".to_string(), SquadAssignment::at(2)),
                ("b".to_string(), SquadAssignment::at(4)),
            ]
        );
    }

    #[test]
    fn test_priorities_must_be_a_permutation() {
        assert!(PositionPriorities::try_from(vec![0, 1, 2]).is_err());
        assert!(PositionPriorities::try_from(vec![0; 16]).is_err());
        let mut order: Vec<u8> = (0..16).collect();
        order[15] = 16;
        assert!(PositionPriorities::try_from(order).is_err());
        let parsed: PositionPriorities =
            serde_json::from_str("[15,14,13,12,11,10,9,8,7,6,5,4,3,2,1,0]").unwrap();
        assert_eq!(parsed.as_slice()[0], 15);
        assert!(serde_json::from_str::<PositionPriorities>("[1,1]").is_err());
    }
}
