//! Merge-aware hash sets with positive and negative opinions
//!
//! A `HashSetLayer` records, per 64-bit hash, whether a layer includes it
//! (positive) or explicitly excludes it (negative). A hash is never held in
//! both sets at once. Layers stack by priority: a stronger layer's opinion on
//! a hash replaces any weaker layer's opinion on the same hash.
//!
//! Text form is a comma-separated list of `0x<16 hex digits>` entries, with
//! negative entries prefixed by `-`.

use optlayer_conf::ConfigValue;
use std::collections::BTreeSet;
use std::fmt;

/// Two disjoint sets of hashes: those a layer adds and those it removes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashSetLayer {
    positives: BTreeSet<u64>,
    negatives: BTreeSet<u64>,
}

impl HashSetLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a positive opinion, dropping any negative one.
    pub fn add(&mut self, hash: u64) {
        self.negatives.remove(&hash);
        self.positives.insert(hash);
    }

    /// Record a negative opinion, dropping any positive one.
    pub fn remove(&mut self, hash: u64) {
        self.positives.remove(&hash);
        self.negatives.insert(hash);
    }

    /// Forget any opinion about `hash`.
    pub fn clear(&mut self, hash: u64) {
        self.positives.remove(&hash);
        self.negatives.remove(&hash);
    }

    pub fn clear_all(&mut self) {
        self.positives.clear();
        self.negatives.clear();
    }

    pub fn has_positive(&self, hash: u64) -> bool {
        self.positives.contains(&hash)
    }

    pub fn has_negative(&self, hash: u64) -> bool {
        self.negatives.contains(&hash)
    }

    pub fn has_opinion(&self, hash: u64) -> bool {
        self.has_positive(hash) || self.has_negative(hash)
    }

    /// Whether `hash` is included. Negatives override positives.
    pub fn contains(&self, hash: u64) -> bool {
        !self.has_negative(hash) && self.has_positive(hash)
    }

    /// Number of positive entries.
    pub fn len(&self) -> usize {
        self.positives.len()
    }

    pub fn negative_len(&self) -> usize {
        self.negatives.len()
    }

    /// True when the layer holds no opinion at all.
    pub fn is_empty(&self) -> bool {
        self.positives.is_empty() && self.negatives.is_empty()
    }

    /// Positive entries in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.positives.iter().copied()
    }

    pub fn negatives(&self) -> impl Iterator<Item = u64> + '_ {
        self.negatives.iter().copied()
    }

    /// Parse entries such as `"0xABC"`, `" 1f "` or `"-0x00FF"`.
    ///
    /// Whitespace around entries is trimmed, empty entries are skipped and
    /// entries that are not valid hex are logged and skipped.
    pub fn parse_from_strings<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            let trimmed = entry.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            let (negative, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (true, rest.trim_start()),
                None => (false, trimmed),
            };
            match parse_hash(digits) {
                Some(hash) if negative => self.remove(hash),
                Some(hash) => self.add(hash),
                None => tracing::warn!(entry = trimmed, "Skipping invalid hash entry"),
            }
        }
    }

    /// Parse a comma-separated hash list.
    pub fn parse(text: &str) -> Self {
        let mut layer = Self::new();
        layer.parse_from_strings(text.split(','));
        layer
    }

    /// Opinions held here but absent from `saved`, per sign.
    ///
    /// This is the minimal delta to append to a file holding `saved`.
    pub fn compute_added_opinions(&self, saved: &HashSetLayer) -> HashSetLayer {
        HashSetLayer {
            positives: self.positives.difference(&saved.positives).copied().collect(),
            negatives: self.negatives.difference(&saved.negatives).copied().collect(),
        }
    }

    /// Human-readable delta against `saved`.
    ///
    /// Prefixes: `+` positive added, `~` positive removed, `+-` negative added,
    /// `~-` negative removed.
    pub fn diff_to_string(&self, saved: &HashSetLayer) -> String {
        let groups: [(&str, Vec<u64>); 4] = [
            ("+", self.positives.difference(&saved.positives).copied().collect()),
            ("~", saved.positives.difference(&self.positives).copied().collect()),
            ("+-", self.negatives.difference(&saved.negatives).copied().collect()),
            ("~-", saved.negatives.difference(&self.negatives).copied().collect()),
        ];
        groups
            .iter()
            .flat_map(|(prefix, hashes)| hashes.iter().map(move |h| format!("{prefix}{}", format_hash(*h))))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Adopt every opinion of `weaker` on hashes this layer has no opinion
    /// about. Existing opinions here always win.
    pub fn merge_from(&mut self, weaker: &HashSetLayer) {
        for &hash in &weaker.positives {
            if !self.has_opinion(hash) {
                self.positives.insert(hash);
            }
        }
        for &hash in &weaker.negatives {
            if !self.has_opinion(hash) {
                self.negatives.insert(hash);
            }
        }
    }

    /// Only the positive entries, as the effective set after merging.
    pub fn positives_only(&self) -> HashSetLayer {
        HashSetLayer {
            positives: self.positives.clone(),
            negatives: BTreeSet::new(),
        }
    }
}

impl FromIterator<u64> for HashSetLayer {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            positives: iter.into_iter().collect(),
            negatives: BTreeSet::new(),
        }
    }
}

impl fmt::Display for HashSetLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .positives
            .iter()
            .map(|h| format_hash(*h))
            .chain(self.negatives.iter().map(|h| format!("-{}", format_hash(*h))))
            .collect();
        f.write_str(&entries.join(", "))
    }
}

impl ConfigValue for HashSetLayer {
    const TYPE_NAME: &'static str = "hash set";

    fn parse_config(raw: &str) -> Option<Self> {
        Some(Self::parse(raw))
    }

    fn to_config_string(&self) -> String {
        self.to_string()
    }
}

/// Render a hash as `0x` followed by 16 uppercase hex digits.
pub fn format_hash(hash: u64) -> String {
    format!("0x{hash:016X}")
}

/// Parse hex digits with an optional `0x` prefix.
pub fn parse_hash(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_and_remove_keep_sets_disjoint() {
        let mut layer = HashSetLayer::new();
        layer.add(1);
        layer.remove(1);
        assert!(layer.has_negative(1));
        assert!(!layer.has_positive(1));

        layer.add(1);
        assert!(layer.has_positive(1));
        assert!(!layer.has_negative(1));

        layer.clear(1);
        assert!(layer.is_empty());
    }

    #[test]
    fn parses_signed_entries() {
        let layer = HashSetLayer::parse(" 0xAB, -0x00000000000000CD ,ef, , -  0x1");
        assert_eq!(layer.iter().collect::<Vec<_>>(), vec![0xAB, 0xEF]);
        assert_eq!(layer.negatives().collect::<Vec<_>>(), vec![0x1, 0xCD]);
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let layer = HashSetLayer::parse("0x10, zz, 0x20");
        assert_eq!(layer.len(), 2);
    }

    #[test]
    fn to_string_sorts_positives_before_negatives() {
        let mut layer = HashSetLayer::new();
        layer.remove(0x2);
        layer.add(0xFF);
        layer.add(0x1);
        assert_eq!(
            layer.to_string(),
            "0x0000000000000001, 0x00000000000000FF, -0x0000000000000002"
        );
        assert_eq!(HashSetLayer::parse(&layer.to_string()), layer);
    }

    #[test]
    fn merge_from_keeps_own_opinions() {
        let mut strong = HashSetLayer::new();
        strong.remove(1);
        strong.add(2);

        let mut weak = HashSetLayer::new();
        weak.add(1);
        weak.remove(2);
        weak.add(3);
        weak.remove(4);

        strong.merge_from(&weak);
        assert!(strong.has_negative(1));
        assert!(strong.has_positive(2));
        assert!(strong.has_positive(3));
        assert!(strong.has_negative(4));
    }

    #[test]
    fn added_opinions_are_per_sign() {
        let current = HashSetLayer::parse("0x1, 0x2, -0x3, -0x4");
        let saved = HashSetLayer::parse("0x1, -0x2, -0x3");
        let added = current.compute_added_opinions(&saved);
        assert_eq!(added.iter().collect::<Vec<_>>(), vec![0x2]);
        assert_eq!(added.negatives().collect::<Vec<_>>(), vec![0x4]);
    }

    #[test]
    fn diff_lists_all_four_groups() {
        let current = HashSetLayer::parse("0x1, 0x5, -0x3");
        let saved = HashSetLayer::parse("0x2, 0x5, -0x4");
        assert_eq!(
            current.diff_to_string(&saved),
            "+0x0000000000000001, ~0x0000000000000002, +-0x0000000000000003, ~-0x0000000000000004"
        );
        assert_eq!(current.diff_to_string(&current), "");
    }

    #[test]
    fn contains_ignores_negated_hashes() {
        let layer: HashSetLayer = [7, 8].into_iter().collect();
        assert!(layer.contains(7));
        assert!(!layer.contains(9));
    }
}
