//! Short reference ids (`T-1a2b`).
//!
//! Issuance draws random tokens and checks them against every id known to
//! exist. After `random_attempts` collisions it walks the id space from
//! zero, and if that is exhausted falls back to a 32-hex-digit token that
//! cannot realistically collide. Once the known corpus grows past
//! `long_threshold`, new ids get the longer token length; existing ids are
//! never rewritten.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::RefIdSettings;

/// Issues reference ids unique against a known set.
#[derive(Debug, Clone)]
pub struct RefIdIssuer {
    settings: RefIdSettings,
    /// Lowercased id to the id as first seen.
    known: HashMap<String, String>,
}

impl RefIdIssuer {
    #[must_use]
    pub fn new(settings: RefIdSettings) -> Self {
        Self {
            settings,
            known: HashMap::new(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.settings.prefix
    }

    /// Record ids discovered on disk.
    pub fn extend<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            self.insert(id.as_ref());
        }
    }

    /// Record one id. Returns `false` if it was already known.
    pub fn insert(&mut self, id: &str) -> bool {
        let key = id.to_lowercase();
        if self.known.contains_key(&key) {
            return false;
        }
        self.known.insert(key, id.to_string());
        true
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.known.contains_key(&id.to_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Known ids, sorted.
    #[must_use]
    pub fn known(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.known.values().cloned().collect();
        ids.sort();
        ids
    }

    /// Hex digits for the next issued id.
    #[must_use]
    pub fn token_len(&self) -> u32 {
        if self.known.len() > self.settings.long_threshold {
            self.settings.long_len
        } else {
            self.settings.short_len
        }
    }

    /// Issue a fresh id and record it as known.
    pub fn issue(&mut self) -> String {
        self.issue_with(|| uuid::Uuid::new_v4().as_u128())
    }

    /// Issue using a caller-supplied entropy source.
    pub fn issue_with(&mut self, mut random: impl FnMut() -> u128) -> String {
        let len = self.token_len();
        let space = 16u128.checked_pow(len).unwrap_or(u128::MAX);

        for _ in 0..self.settings.random_attempts {
            let id = self.format_id(random() % space, len);
            if self.insert(&id) {
                return id;
            }
        }

        debug!(len, known = self.known.len(), "Random ids collided; enumerating");
        let space = u64::try_from(space).unwrap_or(u64::MAX);
        for n in 0..space {
            let id = self.format_id(u128::from(n), len);
            if self.insert(&id) {
                return id;
            }
        }

        warn!(len, "Reference id space exhausted; using long fallback id");
        loop {
            let id = self.format_id(random(), 32);
            if self.insert(&id) {
                return id;
            }
        }
    }

    fn format_id(&self, value: u128, len: u32) -> String {
        format!("{}{value:0width$x}", self.settings.prefix, width = len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::is_reference_id;
    use std::collections::HashSet;

    fn issuer() -> RefIdIssuer {
        RefIdIssuer::new(RefIdSettings::default())
    }

    #[test]
    fn test_thousand_ids_distinct_and_well_formed() {
        let mut issuer = issuer();
        let ids: Vec<String> = (0..1000).map(|_| issuer.issue()).collect();

        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 1000);
        for id in &ids {
            assert!(is_reference_id(id, "T-"), "bad id {id}");
            assert_eq!(id.len(), 6);
        }
    }

    #[test]
    fn test_collisions_fall_back_to_enumeration() {
        let mut issuer = issuer();
        issuer.insert("T-0000");
        issuer.insert("T-0001");

        let id = issuer.issue_with(|| 0);
        assert_eq!(id, "T-0002");
    }

    #[test]
    fn test_exhausted_space_uses_long_fallback() {
        let mut issuer = RefIdIssuer::new(RefIdSettings {
            short_len: 1,
            ..RefIdSettings::default()
        });
        for _ in 0..16 {
            issuer.issue();
        }
        assert_eq!(issuer.len(), 16);

        let id = issuer.issue();
        assert_eq!(id.len(), 2 + 32);
        assert!(is_reference_id(&id, "T-"));
    }

    #[test]
    fn test_long_ids_after_threshold() {
        let mut issuer = RefIdIssuer::new(RefIdSettings {
            long_threshold: 3,
            ..RefIdSettings::default()
        });
        issuer.extend(["T-0001", "T-0002", "T-0003"]);
        assert_eq!(issuer.token_len(), 4);

        issuer.insert("T-0004");
        assert_eq!(issuer.token_len(), 6);
        assert_eq!(issuer.issue().len(), 8);
        // Known ids are untouched
        assert!(issuer.contains("T-0001"));
    }

    #[test]
    fn test_known_is_case_insensitive() {
        let mut issuer = issuer();
        issuer.extend(["T-ABCD"]);
        assert!(issuer.contains("t-abcd"));
        assert!(!issuer.insert("T-abcd"));
        assert_eq!(issuer.known(), vec!["T-ABCD".to_string()]);
    }
}
