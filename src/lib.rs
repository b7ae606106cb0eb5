//! Red-Black order-statistic collections for Rust.
//!
//! This crate provides [`RBTreeMap`], an ordered map in the style of the standard
//! library's `BTreeMap` backed by a Red-Black binary search tree with additional
//! O(log n) order-statistic operations:
//!
//! - [`get_by_rank`](RBTreeMap::get_by_rank) - Get the element at a given sorted position
//! - [`rank`](RBTreeMap::rank) - Count the keys strictly less than a given key
//! - [`rank_of`](RBTreeMap::rank_of) - Get the sorted position of a present key
//! - Indexing by [`Rank`] - e.g., `map[Rank(0)]` for the first element
//!
//! # Example
//!
//! ```
//! use rubra_tree::{RBTreeMap, Rank};
//!
//! let mut scores = RBTreeMap::new();
//! scores.insert("Alice", 100);
//! scores.insert("Bob", 85);
//! scores.insert("Carol", 92);
//!
//! // Standard BTreeMap operations work as expected
//! assert_eq!(scores.get(&"Bob"), Some(&85));
//! assert_eq!(scores.len(), 3);
//!
//! // Ordered queries
//! assert_eq!(scores.first_key_value(), Some((&"Alice", &100)));
//! assert_eq!(scores.floor(&"Bo"), Some((&"Alice", &100)));
//! assert_eq!(scores.ceiling(&"Bo"), Some((&"Bob", &85)));
//!
//! // Order-statistic operations (O(log n))
//! assert_eq!(scores.rank_of(&"Carol"), Some(2)); // Carol is third alphabetically
//! assert_eq!(scores[Rank(0)], 100); // Alice's score (first alphabetically)
//! ```
//!
//! # Ranking by repeated extraction
//!
//! A common consumer pattern is frequency ranking: count occurrences in one map
//! keyed by word, mirror the counts into a second map keyed by `(count, word)`,
//! and drain the top entries with [`pop_last`](RBTreeMap::pop_last):
//!
//! ```
//! use rubra_tree::RBTreeMap;
//!
//! let words = ["the", "quick", "the", "fox", "the", "fox"];
//!
//! let mut counts = RBTreeMap::new();
//! for word in words {
//!     *counts.entry(word).or_insert(0u32) += 1;
//! }
//!
//! let mut by_count: RBTreeMap<(u32, &str), ()> =
//!     counts.iter().map(|(&w, &n)| ((n, w), ())).collect();
//!
//! let ((count, word), ()) = by_count.pop_last().unwrap();
//! assert_eq!((count, word), (3, "the"));
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Drop-in replacement** - API mirrors `std::collections::BTreeMap`
//! - **O(log n) rank operations** - Efficient order-statistic queries via subtree size augmentation
//! - **No unsafe code** - Nodes live in a flat arena addressed by integer handles,
//!   so parent back-links never form reference cycles
//!
//! # Implementation
//!
//! The map is a classic Red-Black tree: every node carries a color tag, the root
//! is always black, no red node has a red parent, and every root-to-leaf-edge
//! path passes through the same number of black nodes, which bounds the height
//! at 2·log₂(n+1) regardless of insertion order. Each node additionally caches
//! the size of its subtree, enabling O(log n) rank and select and O(1) `len`.
//!
//! Nodes are stored in a contiguous arena and linked by `Option<Handle>` indices
//! rather than pointers; "no child" is simply `None`. Iteration walks the parent
//! links in order, so a full ascending pass needs no auxiliary stack or array.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod order_statistic;
mod raw;

pub mod rbtree_map;

pub use order_statistic::Rank;
pub use rbtree_map::RBTreeMap;
