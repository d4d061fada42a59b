//! Order-Statistics Treap
//!
//! Size-augmented treap over [`RankKey`]. Expected O(log n) insert, remove
//! and rank; in-order iteration yields keys best-ranked first, so the first
//! `k` items cost O(k + log n).

use std::cmp::Ordering;

use crate::core::player::PlayerId;
use crate::core::rng::DeterministicRng;

// =============================================================================
// RANK KEY
// =============================================================================

/// Position of a player in the ranking.
///
/// Ordered best-first: higher score, then earlier `last_seen`, then smaller
/// player id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RankKey {
    /// Total score at last sync.
    pub total_score: i64,
    /// Unix seconds of the player's last score report.
    pub last_seen: i64,
    /// Final tie-break.
    pub player_id: PlayerId,
}

impl RankKey {
    /// Build a key.
    pub fn new(player_id: PlayerId, total_score: i64, last_seen: i64) -> Self {
        Self {
            total_score,
            last_seen,
            player_id,
        }
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .total_score
            .cmp(&self.total_score)
            .then_with(|| self.last_seen.cmp(&other.last_seen))
            .then_with(|| self.player_id.cmp(&other.player_id))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// =============================================================================
// TREAP
// =============================================================================

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    key: RankKey,
    priority: u64,
    size: usize,
    left: Link,
    right: Link,
}

impl Node {
    fn new(key: RankKey, priority: u64) -> Box<Self> {
        Box::new(Self {
            key,
            priority,
            size: 1,
            left: None,
            right: None,
        })
    }

    #[inline]
    fn update(&mut self) {
        self.size = 1 + size(&self.left) + size(&self.right);
    }
}

#[inline]
fn size(link: &Link) -> usize {
    link.as_ref().map_or(0, |node| node.size)
}

/// Split into (keys < `key`, keys >= `key`).
fn split(link: Link, key: &RankKey) -> (Link, Link) {
    match link {
        None => (None, None),
        Some(mut node) => {
            if node.key < *key {
                let (left, right) = split(node.right.take(), key);
                node.right = left;
                node.update();
                (Some(node), right)
            } else {
                let (left, right) = split(node.left.take(), key);
                node.left = right;
                node.update();
                (left, Some(node))
            }
        }
    }
}

/// Join two treaps where every key in `left` orders before every key in `right`.
fn merge(left: Link, right: Link) -> Link {
    match (left, right) {
        (None, right) => right,
        (left, None) => left,
        (Some(mut l), Some(mut r)) => {
            if l.priority > r.priority {
                l.right = merge(l.right.take(), Some(r));
                l.update();
                Some(l)
            } else {
                r.left = merge(Some(l), r.left.take());
                r.update();
                Some(r)
            }
        }
    }
}

fn insert(link: Link, mut new: Box<Node>) -> Link {
    match link {
        None => Some(new),
        Some(mut node) => {
            if new.priority > node.priority {
                let (left, right) = split(Some(node), &new.key);
                new.left = left;
                new.right = right;
                new.update();
                Some(new)
            } else {
                if new.key < node.key {
                    node.left = insert(node.left.take(), new);
                } else {
                    node.right = insert(node.right.take(), new);
                }
                node.update();
                Some(node)
            }
        }
    }
}

fn remove(link: Link, key: &RankKey) -> (Link, bool) {
    match link {
        None => (None, false),
        Some(mut node) => match key.cmp(&node.key) {
            Ordering::Equal => (merge(node.left.take(), node.right.take()), true),
            Ordering::Less => {
                let (left, removed) = remove(node.left.take(), key);
                node.left = left;
                node.update();
                (Some(node), removed)
            }
            Ordering::Greater => {
                let (right, removed) = remove(node.right.take(), key);
                node.right = right;
                node.update();
                (Some(node), removed)
            }
        },
    }
}

/// Ranking index keyed by [`RankKey`].
///
/// Keys are unique; inserting a key that is already present is a caller bug
/// and is rejected.
#[derive(Debug)]
pub struct RankTree {
    root: Link,
    rng: DeterministicRng,
}

impl RankTree {
    /// Empty tree drawing priorities from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            root: None,
            rng: DeterministicRng::new(seed),
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert `key`. Returns false if it was already present.
    pub fn insert(&mut self, key: RankKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        let node = Node::new(key, self.rng.next_u64());
        self.root = insert(self.root.take(), node);
        true
    }

    /// Remove `key`. Returns false if it was not present.
    pub fn remove(&mut self, key: &RankKey) -> bool {
        let (root, removed) = remove(self.root.take(), key);
        self.root = root;
        removed
    }

    /// True if `key` is stored.
    pub fn contains(&self, key: &RankKey) -> bool {
        self.rank_of(key).is_some()
    }

    /// 1-based rank of `key`, or `None` if absent.
    pub fn rank_of(&self, key: &RankKey) -> Option<usize> {
        let mut link = &self.root;
        let mut before = 0;
        while let Some(node) = link {
            match key.cmp(&node.key) {
                Ordering::Less => link = &node.left,
                Ordering::Equal => return Some(before + size(&node.left) + 1),
                Ordering::Greater => {
                    before += size(&node.left) + 1;
                    link = &node.right;
                }
            }
        }
        None
    }

    /// Keys in rank order, best first.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(&self.root);
        iter
    }
}

/// In-order iterator over a [`RankTree`].
pub struct Iter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iter<'a> {
    fn push_left(&mut self, mut link: &'a Link) {
        while let Some(node) = link {
            self.stack.push(node);
            link = &node.left;
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RankKey;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(&node.right);
        Some(&node.key)
    }
}
