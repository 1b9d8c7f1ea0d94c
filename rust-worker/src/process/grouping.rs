//! Recipient grouping by group key.

use std::collections::HashMap;

use crate::model::{RecipientRecord, Role};

/// All recipient records sharing one group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientGroup {
    /// Key as spelled by the first record seen for the group
    pub key: String,
    /// Members in their original relative order
    pub members: Vec<RecipientRecord>,
}

impl RecipientGroup {
    /// Addresses of members with the given role, in member order.
    pub fn addresses(&self, role: Role) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.address.clone())
            .collect()
    }

    /// `To` addresses reported in per-group outcomes.
    pub fn primary_addresses(&self) -> Vec<String> {
        self.addresses(Role::Primary)
    }
}

/// Group records by key.
///
/// Keys match ignoring ASCII case; the group keeps the first spelling seen.
/// Groups come back sorted ascending by key (byte-wise) and members keep their
/// input order.
pub fn group_recipients(records: &[RecipientRecord]) -> Vec<RecipientGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<RecipientGroup> = Vec::new();

    for record in records {
        let folded = record.group_key.to_ascii_lowercase();
        match index.get(&folded) {
            Some(&i) => groups[i].members.push(record.clone()),
            None => {
                index.insert(folded, groups.len());
                groups.push(RecipientGroup {
                    key: record.group_key.clone(),
                    members: vec![record.clone()],
                });
            }
        }
    }

    // sort_by is stable, so equal keys cannot reorder
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

/// Number of distinct groups, without materializing them.
pub fn count_groups(records: &[RecipientRecord]) -> usize {
    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.group_key.to_ascii_lowercase()))
        .count()
}
