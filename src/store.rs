use std::collections::HashSet;

use crate::models::Message;

/// Append-only message set for one room.
///
/// Messages are kept sorted by `(created_at, id)` so views can be read without
/// re-sorting. Redelivered ids are ignored.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `message` unless its id is already known. Returns whether it was new.
    pub fn append(&mut self, message: Message) -> bool {
        if self.ids.contains(&message.id) {
            return false;
        }
        let key = message.order_key();
        let pos = self.messages.partition_point(|m| m.order_key() <= key);
        self.ids.insert(message.id.clone());
        self.messages.insert(pos, message);
        true
    }

    /// Appends a batch, returning how many messages were new.
    pub fn extend<I>(&mut self, messages: I) -> usize
    where
        I: IntoIterator<Item = Message>,
    {
        messages
            .into_iter()
            .map(|m| usize::from(self.append(m)))
            .sum()
    }

    /// Every message, oldest first.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        if !self.ids.contains(id) {
            return None;
        }
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{dm, public};

    #[test]
    fn duplicate_ids_are_stored_once() {
        let mut store = MessageStore::new();
        assert!(store.append(public("m1", 10, "a@x.com", "hi")));
        assert!(!store.append(public("m1", 10, "a@x.com", "hi")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn redelivery_with_different_payload_keeps_first_copy() {
        let mut store = MessageStore::new();
        store.append(public("m1", 10, "a@x.com", "first"));
        store.append(public("m1", 99, "a@x.com", "second"));
        assert_eq!(store.get("m1").unwrap().content, "first");
    }

    #[test]
    fn all_is_chronological_regardless_of_arrival() {
        let mut store = MessageStore::new();
        store.append(public("c", 30, "a@x.com", "3"));
        store.append(public("a", 10, "a@x.com", "1"));
        store.append(dm("b", 20, "a@x.com", "b@y.com", "2"));
        let order: Vec<_> = store.all().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let mut store = MessageStore::new();
        store.append(public("z", 5, "a@x.com", "z"));
        store.append(public("k", 5, "a@x.com", "k"));
        store.append(public("m", 5, "a@x.com", "m"));
        let order: Vec<_> = store.all().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, ["k", "m", "z"]);
    }

    #[test]
    fn extend_counts_only_new_messages() {
        let mut store = MessageStore::new();
        store.append(public("m1", 1, "a@x.com", "x"));
        let added = store.extend(vec![
            public("m1", 1, "a@x.com", "x"),
            public("m2", 2, "a@x.com", "y"),
            public("m2", 2, "a@x.com", "y"),
        ]);
        assert_eq!(added, 1);
        assert_eq!(store.len(), 2);
        assert!(store.contains("m2"));
    }
}
