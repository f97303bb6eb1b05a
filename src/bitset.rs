//! Compact bit set used for variable scopes and visited marks.
//!
//! Variable scopes (`var(g)`) are unions of their children's scopes, so the
//! hot operations are word-wise `union_with` and `is_disjoint`, plus an O(1)
//! `len()` needed to size the DP tables.

/// A bit set backed by a vector of u64 words.
///
/// The set grows as needed when inserting bits beyond the current capacity.
#[derive(Debug, Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
    /// Number of set bits (cached for O(1) len()).
    count: usize,
}

impl BitSet {
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty bit set able to hold `capacity` bits without growing.
    pub fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(Self::BITS_PER_WORD);
        Self {
            words: vec![0; num_words],
            count: 0,
        }
    }

    /// Creates an empty bit set with no pre-allocated capacity.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        match self.words.get(word_idx) {
            Some(word) => (word >> bit_idx) & 1 != 0,
            None => false,
        }
    }

    /// Sets the bit at the given index. Returns true if the bit was not previously set.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        if word_idx >= self.words.len() {
            self.words.resize(word_idx + 1, 0);
        }

        let mask = 1u64 << bit_idx;
        let was_clear = self.words[word_idx] & mask == 0;
        if was_clear {
            self.words[word_idx] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Adds every bit of `other` to `self`.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut count = 0;
        for (i, word) in self.words.iter_mut().enumerate() {
            if let Some(&o) = other.words.get(i) {
                *word |= o;
            }
            count += word.count_ones() as usize;
        }
        self.count = count;
    }

    /// Returns true if the two sets share no bit.
    pub fn is_disjoint(&self, other: &BitSet) -> bool {
        self.words.iter().zip(&other.words).all(|(a, b)| a & b == 0)
    }

    /// Returns the first bit shared by the two sets, if any.
    pub fn first_common(&self, other: &BitSet) -> Option<usize> {
        self.words
            .iter()
            .zip(&other.words)
            .enumerate()
            .find(|(_, (a, b))| *a & *b != 0)
            .map(|(i, (a, b))| i * Self::BITS_PER_WORD + (a & b).trailing_zeros() as usize)
    }

    /// Number of set bits, not counting `index` (i.e. `|self \ {index}|`).
    #[inline]
    pub fn len_without(&self, index: usize) -> usize {
        self.count - self.contains(index) as usize
    }

    /// Iterates over set bits in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(word_idx * Self::BITS_PER_WORD + bit)
            })
        })
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::empty();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains() {
        let mut set = BitSet::new(10);
        assert!(set.is_empty());
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert!(set.insert(130));
        assert!(set.contains(3));
        assert!(set.contains(130));
        assert!(!set.contains(4));
        assert!(!set.contains(1000));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_union_recounts() {
        let mut a: BitSet = [1, 2, 3].into_iter().collect();
        let b: BitSet = [3, 4, 200].into_iter().collect();
        a.union_with(&b);
        assert_eq!(a.len(), 5);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 200]);
    }

    #[test]
    fn test_disjoint() {
        let a: BitSet = [1, 65].into_iter().collect();
        let b: BitSet = [2, 66].into_iter().collect();
        let c: BitSet = [66, 300].into_iter().collect();
        assert!(a.is_disjoint(&b));
        assert!(a.is_disjoint(&BitSet::empty()));
        assert!(!b.is_disjoint(&c));
        assert_eq!(b.first_common(&c), Some(66));
        assert_eq!(a.first_common(&b), None);
    }

    #[test]
    fn test_len_without() {
        let set: BitSet = [1, 5].into_iter().collect();
        assert_eq!(set.len_without(5), 1);
        assert_eq!(set.len_without(2), 2);
    }
}
