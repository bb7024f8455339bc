//! Views and replica identities.
use std::fmt;

/// A view number, i.e. the number of a round of the consensus protocol.
/// Genesis has view 0; views only ever increase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewNumber(pub u64);

impl ViewNumber {
    /// Returns the next view number.
    pub fn next(self) -> Self {
        Self(self.0.checked_add(1).unwrap())
    }

    /// Returns the previous view number.
    pub fn prev(self) -> Option<Self> {
        Some(Self(self.0.checked_sub(1)?))
    }
}

impl fmt::Display for ViewNumber {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, formatter)
    }
}

/// Stable identifier of a replica within the committee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplicaId(pub u64);

impl fmt::Display for ReplicaId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, formatter)
    }
}

/// The set of replicas participating in the protocol. For `n` members the
/// committee tolerates `⌊(n−1)/3⌋` Byzantine faults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committee {
    members: Vec<ReplicaId>,
}

impl Committee {
    /// Creates a new committee from the given members. Duplicates are
    /// rejected, and the members are kept in ascending order.
    pub fn new(members: impl IntoIterator<Item = ReplicaId>) -> anyhow::Result<Self> {
        let mut members: Vec<_> = members.into_iter().collect();
        members.sort();
        anyhow::ensure!(!members.is_empty(), "committee must be non-empty");
        anyhow::ensure!(
            members.windows(2).all(|w| w[0] != w[1]),
            "duplicate replica in committee"
        );
        Ok(Self { members })
    }

    /// Members of the committee, in ascending order.
    pub fn members(&self) -> &[ReplicaId] {
        &self.members
    }

    /// Iterates over the members of the committee.
    pub fn iter(&self) -> impl Iterator<Item = &ReplicaId> {
        self.members.iter()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the committee has no members. Always false for a
    /// committee built through [`Committee::new`].
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the given replica belongs to the committee.
    pub fn contains(&self, id: &ReplicaId) -> bool {
        self.members.binary_search(id).is_ok()
    }

    /// Maximum number of faulty replicas the committee tolerates.
    pub fn max_faulty(&self) -> usize {
        (self.len() - 1) / 3
    }

    /// Number of votes required to form a quorum certificate.
    pub fn quorum_size(&self) -> usize {
        self.len() - self.max_faulty()
    }
}
