use std::fmt;

use str_indices::chars;
use thiserror::Error;

/// Errors for the index-driven rope queries. Construction and concatenation
/// cannot fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RopeError {
    #[error("index {index} out of range for rope of length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("invalid range: start {start} > end {end}")]
    InvalidRange { start: usize, end: usize },
}

/// Text stored as a binary tree of string fragments, so large buffers can be
/// concatenated and split without copying the whole text.
///
/// Every index in the public API is a character offset, never a byte offset;
/// a split can never land inside a UTF-8 encoding unit. A `Node`'s `weight`
/// caches the total character length of its entire left subtree. It is
/// computed once when the node is built and never touched again: operations
/// that rebuild a subtree go through [`Rope::new_node`], which computes a
/// fresh weight for the new parent.
///
/// No rope is mutated after construction. [`Rope::concat`] and
/// [`Rope::split`] consume their inputs and move subtrees into the result,
/// so an edit is always "take the rope apart, build a new one from the
/// pieces."
#[derive(Debug)]
pub enum Rope {
    Leaf(String),
    Node {
        weight: usize,
        left: Box<Rope>,
        right: Box<Rope>,
    },
}

impl Rope {
    pub fn new_leaf(text: &str) -> Rope {
        Rope::Leaf(text.to_string())
    }

    /// Builds an internal node over two existing ropes. This is the only way
    /// a `Node` comes into existence, so the weight invariant holds by
    /// construction.
    pub fn new_node(left: Rope, right: Rope) -> Rope {
        Rope::Node {
            weight: left.len(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Total character length.
    ///
    /// Only the right spine is walked; the left side of every node is
    /// covered by its cached weight. The walk is a loop rather than a
    /// recursion so a badly skewed tree costs time, not stack.
    pub fn len(&self) -> usize {
        let mut total = 0;
        let mut node = self;

        loop {
            match node {
                Rope::Leaf(text) => return total + chars::count(text),
                Rope::Node { weight, right, .. } => {
                    total += weight;
                    node = right;
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Joins two ropes into one whose text is `self` immediately followed by
    /// `other`. No text is copied; both trees are moved under a new node.
    pub fn concat(self, other: Rope) -> Rope {
        Rope::new_node(self, other)
    }

    /// Splits into the ropes covering `[0, index)` and `[index, len)`.
    ///
    /// Both ends are legal split points: `split(0)` yields an empty left
    /// part and `split(len)` an empty right part. An index past the end is
    /// rejected before any recursion; letting it recurse would walk past a
    /// leaf boundary.
    pub fn split(self, index: usize) -> Result<(Rope, Rope), RopeError> {
        let len = self.len();
        if index > len {
            return Err(RopeError::OutOfRange { index, len });
        }

        Ok(self.split_at(index))
    }

    // Precondition: index <= self.len(). Checked once in `split`, preserved
    // by the weight arithmetic on the way down.
    fn split_at(self, index: usize) -> (Rope, Rope) {
        match self {
            Rope::Leaf(text) => {
                let byte = chars::to_byte_idx(&text, index);
                let (head, tail) = text.split_at(byte);
                (Rope::new_leaf(head), Rope::new_leaf(tail))
            }
            Rope::Node { weight, left, right } => {
                if index == weight {
                    // The split point is exactly the node boundary; both
                    // children survive unchanged.
                    (*left, *right)
                } else if index < weight {
                    let (head, tail) = left.split_at(index);
                    (head, tail.concat(*right))
                } else {
                    let (head, tail) = right.split_at(index - weight);
                    ((*left).concat(head), tail)
                }
            }
        }
    }

    /// Text of the half-open character range `[start, end)`.
    ///
    /// Equivalent to splitting at `end`, splitting the head at `start` and
    /// flattening what remains, but walks the tree once without rebuilding
    /// anything.
    pub fn substring(&self, start: usize, end: usize) -> Result<String, RopeError> {
        if start > end {
            return Err(RopeError::InvalidRange { start, end });
        }

        let len = self.len();
        if end > len {
            return Err(RopeError::OutOfRange { index: end, len });
        }

        let mut out = String::new();
        self.collect_range(start, end, &mut out);
        Ok(out)
    }

    // In-order traversal restricted to `[start, end)`, both in local
    // character offsets. Subtrees entirely outside the range are skipped.
    fn collect_range(&self, start: usize, end: usize, out: &mut String) {
        match self {
            Rope::Leaf(text) => {
                let from = chars::to_byte_idx(text, start);
                let to = chars::to_byte_idx(text, end);
                out.push_str(&text[from..to]);
            }
            Rope::Node { weight, left, right } => {
                if start < *weight {
                    left.collect_range(start, end.min(*weight), out);
                }
                if end > *weight {
                    right.collect_range(start.saturating_sub(*weight), end - weight, out);
                }
            }
        }
    }
}

impl Default for Rope {
    /// The empty rope: a zero-length leaf.
    fn default() -> Self {
        Rope::Leaf(String::new())
    }
}

impl fmt::Display for Rope {
    /// In-order flattening of every leaf fragment, with no separators;
    /// fragment boundaries are invisible in the output. Uses an explicit
    /// work stack because tree depth is unbounded for skewed ropes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            match node {
                Rope::Leaf(text) => f.write_str(text)?,
                Rope::Node { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn hello_world() -> Rope {
        Rope::new_leaf("Hello, ").concat(Rope::new_leaf("world!"))
    }

    // Chops `text` into `chunk`-char leaves and concatenates them, so the
    // tests exercise real trees instead of single leaves.
    fn build_fragmented(text: &str, chunk: usize) -> Rope {
        let chars: Vec<char> = text.chars().collect();
        let mut rope = Rope::default();

        for piece in chars.chunks(chunk) {
            rope = rope.concat(Rope::new_leaf(&piece.iter().collect::<String>()));
        }

        rope
    }

    #[test]
    fn leaf_length_counts_chars() {
        assert_eq!(Rope::new_leaf("").len(), 0);
        assert_eq!(Rope::new_leaf("Hello").len(), 5);
        assert_eq!(Rope::new_leaf("héllo wörld").len(), 11);
        assert!(Rope::default().is_empty());
    }

    #[test]
    fn concat_adds_lengths_and_joins_text() {
        let r = hello_world();
        assert_eq!(r.len(), 13);
        assert_eq!(r.to_string(), "Hello, world!");
    }

    #[test]
    fn node_weight_is_the_whole_left_subtree() {
        let r = Rope::new_node(hello_world(), Rope::new_leaf(" again"));
        match &r {
            Rope::Node { weight, .. } => assert_eq!(*weight, 13),
            Rope::Leaf(_) => panic!("expected a node"),
        }
        assert_eq!(r.len(), 19);
    }

    #[test]
    fn split_inside_a_leaf() {
        let (l, r) = hello_world().split(3).unwrap();
        assert_eq!(l.to_string(), "Hel");
        assert_eq!(r.to_string(), "lo, world!");
        assert_eq!(l.len(), 3);
        assert_eq!(r.len(), 10);
    }

    #[test]
    fn split_on_the_node_boundary() {
        let (l, r) = hello_world().split(7).unwrap();
        assert_eq!(l.to_string(), "Hello, ");
        assert_eq!(r.to_string(), "world!");
    }

    #[test]
    fn split_at_either_end_is_not_an_error() {
        let (l, r) = hello_world().split(0).unwrap();
        assert_eq!(l.to_string(), "");
        assert_eq!(r.to_string(), "Hello, world!");

        let (l, r) = hello_world().split(13).unwrap();
        assert_eq!(l.to_string(), "Hello, world!");
        assert_eq!(r.to_string(), "");
    }

    #[test]
    fn split_past_the_end_is_rejected() {
        let err = hello_world().split(14).unwrap_err();
        assert_eq!(err, RopeError::OutOfRange { index: 14, len: 13 });
    }

    #[test]
    fn split_rejoin_round_trips_at_every_index() {
        let text = "The quick brown fox jumps over the lazy dog";

        for i in 0..=text.len() {
            let (l, r) = build_fragmented(text, 5).split(i).unwrap();
            assert_eq!(l.len(), i);
            assert_eq!(r.len(), text.len() - i);
            assert_eq!(l.concat(r).to_string(), text);
        }
    }

    #[test]
    fn substring_queries() {
        let r = hello_world();
        assert_eq!(r.substring(7, 13).unwrap(), "world!");
        assert_eq!(r.substring(0, 5).unwrap(), "Hello");
        assert_eq!(r.substring(5, 9).unwrap(), ", wo");
        assert_eq!(r.substring(4, 4).unwrap(), "");
    }

    #[test]
    fn substring_rejects_bad_ranges() {
        let r = hello_world();
        assert_eq!(
            r.substring(9, 5).unwrap_err(),
            RopeError::InvalidRange { start: 9, end: 5 }
        );
        assert_eq!(
            r.substring(0, 14).unwrap_err(),
            RopeError::OutOfRange { index: 14, len: 13 }
        );
    }

    #[test]
    fn substring_of_a_substring_composes() {
        let r = build_fragmented("composition over extracted ranges", 4);
        let outer = r.substring(6, 26).unwrap();
        let inner = Rope::new_leaf(&outer).substring(3, 10).unwrap();
        assert_eq!(inner, r.substring(9, 16).unwrap());
    }

    #[test]
    fn multibyte_text_splits_at_char_granularity() {
        let r = Rope::new_leaf("køb").concat(Rope::new_leaf("enhavn…"));
        assert_eq!(r.len(), 10);

        let (l, rt) = r.split(2).unwrap();
        assert_eq!(l.to_string(), "kø");
        assert_eq!(rt.to_string(), "benhavn…");

        let rejoined = l.concat(rt);
        assert_eq!(rejoined.substring(3, 10).unwrap(), "enhavn…");
    }

    #[test]
    fn repeated_concat_keeps_length_and_text() {
        let mut rope = Rope::default();
        for _ in 0..10_000 {
            rope = rope.concat(Rope::new_leaf("x"));
        }

        assert_eq!(rope.len(), 10_000);
        assert_eq!(rope.to_string().len(), 10_000);
    }

    static UCHARS: [char; 12] = [
        'a', 'b', 'c', ' ', '\t', 'é', 'ø', 'δ', '→', '†', '𐆔', '✓',
    ];

    fn random_text(rng: &mut SmallRng, len: usize) -> String {
        (0..len).map(|_| UCHARS[rng.gen_range(0..UCHARS.len())]).collect()
    }

    #[test]
    fn random_split_rejoin_round_trips() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let len = rng.gen_range(0..120);
            let text = random_text(&mut rng, len);
            let rope = build_fragmented(&text, rng.gen_range(1..8));
            let char_len = text.chars().count();
            assert_eq!(rope.len(), char_len);

            let at = rng.gen_range(0..=char_len);
            let (l, r) = rope.split(at).unwrap();
            assert_eq!(l.len(), at);
            assert_eq!(r.len(), char_len - at);

            let rejoined = l.concat(r);
            assert_eq!(rejoined.to_string(), text);

            let start = rng.gen_range(0..=char_len);
            let end = rng.gen_range(start..=char_len);
            let expected: String = text.chars().skip(start).take(end - start).collect();
            assert_eq!(rejoined.substring(start, end).unwrap(), expected);
        }
    }
}
