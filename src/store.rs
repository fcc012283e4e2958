use std::collections::HashSet;

use crate::post::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    pub added: usize,
    pub exhausted: bool,
}

/// Deduplicated, arrival-ordered collection of loaded posts.
///
/// `seen` only grows between resets, so ids that were served once are never
/// requested again even if a caller drops them from view.
#[derive(Debug, Default)]
pub struct FeedStore {
    items: Vec<Post>,
    seen: HashSet<String>,
    seen_order: Vec<String>,
    exhausted: bool,
    fetch_in_flight: bool,
    pages_loaded: usize,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the posts whose id has not been seen, in the order given.
    ///
    /// `requested` is the page size the batch answered. A batch shorter than
    /// that, or one that adds nothing new, marks the feed exhausted.
    pub fn merge_append(&mut self, posts: Vec<Post>, requested: usize) -> MergeOutcome {
        let received = posts.len();
        let mut added = 0;
        for post in posts {
            if self.seen.insert(post.id.clone()) {
                self.seen_order.push(post.id.clone());
                self.items.push(post);
                added += 1;
            }
        }
        self.pages_loaded += 1;

        if requested > 0 && (added == 0 || received < requested) {
            self.exhausted = true;
        }

        MergeOutcome {
            added,
            exhausted: self.exhausted,
        }
    }

    /// Seen ids in first-seen order.
    pub fn exclusion_list(&self) -> Vec<String> {
        self.seen_order.clone()
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.seen.clear();
        self.seen_order.clear();
        self.exhausted = false;
        self.fetch_in_flight = false;
        self.pages_loaded = 0;
    }

    /// Claims the single fetch slot. Returns false if the feed is exhausted or
    /// a fetch is already outstanding.
    pub(crate) fn begin_fetch(&mut self) -> bool {
        if self.exhausted || self.fetch_in_flight {
            return false;
        }
        self.fetch_in_flight = true;
        true
    }

    pub(crate) fn end_fetch(&mut self) {
        self.fetch_in_flight = false;
    }

    pub fn items(&self) -> &[Post] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Post> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    /// Pages merged since the last reset; the next page number for
    /// offset-paginated sources.
    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::sample_posts;

    fn posts(ids: &[&str]) -> Vec<Post> {
        ids.iter().map(|id| Post::new(*id, *id, "u")).collect()
    }

    fn item_ids(store: &FeedStore) -> Vec<&str> {
        store.items().iter().map(|post| post.id.as_str()).collect()
    }

    #[test]
    fn first_page_fills_items_in_order() {
        let mut store = FeedStore::new();
        let outcome = store.merge_append(sample_posts(5), 5);
        assert_eq!(outcome, MergeOutcome { added: 5, exhausted: false });
        assert_eq!(item_ids(&store), vec!["p1", "p2", "p3", "p4", "p5"]);
        assert_eq!(store.exclusion_list(), vec!["p1", "p2", "p3", "p4", "p5"]);
    }

    #[test]
    fn overlapping_batch_only_adds_new_ids() {
        let mut store = FeedStore::new();
        store.merge_append(sample_posts(5), 5);
        let outcome = store.merge_append(posts(&["p3", "p6", "p7", "p8", "p9"]), 5);
        assert_eq!(outcome.added, 4);
        assert!(!outcome.exhausted);
        assert_eq!(store.len(), 9);
        assert_eq!(&item_ids(&store)[5..], &["p6", "p7", "p8", "p9"]);
    }

    #[test]
    fn duplicates_inside_one_batch_are_dropped() {
        let mut store = FeedStore::new();
        let outcome = store.merge_append(posts(&["a", "b", "a"]), 3);
        assert_eq!(outcome.added, 2);
        assert_eq!(item_ids(&store), vec!["a", "b"]);
    }

    #[test]
    fn merging_same_batch_twice_is_idempotent() {
        let mut store = FeedStore::new();
        store.merge_append(posts(&["a", "b"]), 0);
        let outcome = store.merge_append(posts(&["a", "b"]), 0);
        assert_eq!(outcome.added, 0);
        assert_eq!(store.len(), 2);
        assert!(!store.is_exhausted());
    }

    #[test]
    fn empty_page_marks_exhausted() {
        let mut store = FeedStore::new();
        store.merge_append(sample_posts(5), 5);
        assert!(store.merge_append(Vec::new(), 5).exhausted);
        assert!(store.is_exhausted());
    }

    #[test]
    fn short_page_marks_exhausted() {
        let mut store = FeedStore::new();
        let outcome = store.merge_append(posts(&["a", "b"]), 5);
        assert_eq!(outcome.added, 2);
        assert!(outcome.exhausted);
    }

    #[test]
    fn all_duplicate_page_marks_exhausted() {
        let mut store = FeedStore::new();
        store.merge_append(posts(&["a", "b"]), 2);
        assert!(store.merge_append(posts(&["b", "a"]), 2).exhausted);
    }

    #[test]
    fn items_never_hold_duplicate_ids() {
        let batches: [&[&str]; 5] = [
            &["a", "b", "c"],
            &["c", "d", "a"],
            &["e", "e", "f"],
            &["b"],
            &["g", "d", "h", "a"],
        ];
        let mut store = FeedStore::new();
        let mut seen_sizes = Vec::new();
        for batch in batches {
            store.merge_append(posts(batch), 0);
            let ids = item_ids(&store);
            let unique: HashSet<&str> = ids.iter().copied().collect();
            assert_eq!(unique.len(), ids.len());
            for id in ids {
                assert!(store.has_seen(id));
            }
            seen_sizes.push(store.seen_count());
        }
        assert!(seen_sizes.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn fetch_slot_is_exclusive() {
        let mut store = FeedStore::new();
        assert!(store.begin_fetch());
        assert!(!store.begin_fetch());
        store.end_fetch();
        assert!(store.begin_fetch());
        store.end_fetch();
        store.merge_append(Vec::new(), 5);
        assert!(!store.begin_fetch());
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = FeedStore::new();
        store.merge_append(posts(&["a"]), 5);
        assert!(store.begin_fetch() || store.is_exhausted());
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.seen_count(), 0);
        assert!(!store.is_exhausted());
        assert!(!store.is_fetch_in_flight());
        assert_eq!(store.pages_loaded(), 0);
        assert!(store.exclusion_list().is_empty());
    }
}
