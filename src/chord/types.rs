use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::chord::ring::Ident;

/// Per-node routing table of M entries, indexed 1..=M as in the Chord paper
/// (index 0 is unused). Entry `i` names the ring-successor of
/// `id + 2^(i-1)`; entry 1 is always the node's immediate successor.
/// Entries start unset and stay unset until one of the init operations runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerTable {
    entries: Vec<Option<Ident>>,
}

impl FingerTable {
    pub fn new(bits: u8) -> Self {
        FingerTable {
            entries: vec![None; bits as usize],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry `i`, 1-based. Panics on an out-of-bounds index: indices are
    /// validated at the transport boundary before reaching the table.
    pub fn get(&self, i: usize) -> Option<Ident> {
        self.entries[i - 1]
    }

    pub fn set(&mut self, i: usize, node: Ident) {
        self.entries[i - 1] = Some(node);
    }

    /// The immediate ring successor, if the table has been populated.
    pub fn successor(&self) -> Option<Ident> {
        self.entries[0]
    }

    pub fn fill(&mut self, node: Ident) {
        for entry in &mut self.entries {
            *entry = Some(node);
        }
    }

    /// Snapshot of all entries in table order, for diagnostics.
    pub fn entries(&self) -> Vec<Option<Ident>> {
        self.entries.clone()
    }
}

impl fmt::Display for FingerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match entry {
                Some(node) => write!(f, "{node}")?,
                None => write!(f, "-")?,
            }
        }
        write!(f, "]")
    }
}

/// Result of the one-shot init operations. A repeated init is not an error;
/// the second caller just learns the node was already set up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    AlreadyInitialized,
}

/// Which interval test `update_finger_table` uses when deciding whether a
/// candidate is closer than the current entry.
///
/// The Chord paper states `s ∈ [n, finger[i])`, inclusive of `n` itself;
/// treating the interval as fully exclusive keeps a node from ever adopting
/// its own identifier as a finger. The exclusive reading is the default,
/// the paper's is available for compatibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerUpdatePolicy {
    #[default]
    Exclusive,
    Paper,
}

impl FromStr for FingerUpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exclusive" => Ok(FingerUpdatePolicy::Exclusive),
            "paper" => Ok(FingerUpdatePolicy::Paper),
            other => Err(format!(
                "unknown finger update policy {other:?}, expected \"exclusive\" or \"paper\""
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_starts_unset_and_fills() {
        let mut table = FingerTable::new(6);
        assert_eq!(table.len(), 6);
        assert_eq!(table.successor(), None);
        assert!((1..=6).all(|i| table.get(i).is_none()));

        table.fill(42);
        assert_eq!(table.successor(), Some(42));
        assert!((1..=6).all(|i| table.get(i) == Some(42)));

        table.set(3, 7);
        assert_eq!(table.get(3), Some(7));
        assert_eq!(table.get(2), Some(42));
    }

    #[test]
    fn display_marks_unset_entries() {
        let mut table = FingerTable::new(3);
        table.set(1, 5);
        assert_eq!(table.to_string(), "[5, -, -]");
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!(
            "exclusive".parse::<FingerUpdatePolicy>().unwrap(),
            FingerUpdatePolicy::Exclusive
        );
        assert_eq!(
            "paper".parse::<FingerUpdatePolicy>().unwrap(),
            FingerUpdatePolicy::Paper
        );
        assert!("strict".parse::<FingerUpdatePolicy>().is_err());
    }
}
