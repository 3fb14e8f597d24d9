//! Bounded FIFO store of recent messages

use std::collections::{HashMap, VecDeque};

use concord_core::{Message, Snowflake};

/// Keeps at most `capacity` messages, evicting the oldest insert first
#[derive(Debug)]
pub(crate) struct MessageStore {
    capacity: usize,
    order: VecDeque<Snowflake>,
    messages: HashMap<Snowflake, Message>,
}

impl MessageStore {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(1024)),
            messages: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        let id = message.id;
        if self.messages.insert(id, message).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.messages.remove(&evicted);
            }
        }
    }

    pub(crate) fn get(&self, id: Snowflake) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Snowflake) -> Option<&mut Message> {
        self.messages.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: Snowflake) -> Option<Message> {
        let removed = self.messages.remove(&id)?;
        self.order.retain(|m| *m != id);
        Some(removed)
    }

    /// Drop every message matching the predicate
    pub(crate) fn remove_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&Message) -> bool,
    {
        let before = self.messages.len();
        self.messages.retain(|_, m| !pred(m));
        let messages = &self.messages;
        self.order.retain(|id| messages.contains_key(id));
        before - self.messages.len()
    }

    pub(crate) fn in_channel(&self, channel_id: Snowflake) -> Vec<Message> {
        self.order
            .iter()
            .filter_map(|id| self.messages.get(id))
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::User;

    fn msg(id: u64, channel: u64) -> Message {
        Message::new(
            Snowflake::new(id),
            Snowflake::new(channel),
            User::new(Snowflake::new(1), "nelly"),
            format!("message {id}"),
        )
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut store = MessageStore::new(2);
        store.insert(msg(1, 10));
        store.insert(msg(2, 10));
        store.insert(msg(3, 10));
        assert_eq!(store.len(), 2);
        assert!(store.get(Snowflake::new(1)).is_none());
        assert!(store.get(Snowflake::new(3)).is_some());
    }

    #[test]
    fn test_reinsert_does_not_duplicate_order() {
        let mut store = MessageStore::new(2);
        store.insert(msg(1, 10));
        store.insert(msg(1, 10));
        store.insert(msg(2, 10));
        assert_eq!(store.len(), 2);
        assert!(store.get(Snowflake::new(1)).is_some());
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut store = MessageStore::new(0);
        store.insert(msg(1, 10));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_remove_where_and_in_channel() {
        let mut store = MessageStore::new(10);
        store.insert(msg(1, 10));
        store.insert(msg(2, 20));
        store.insert(msg(3, 10));
        assert_eq!(store.in_channel(Snowflake::new(10)).len(), 2);
        assert_eq!(store.remove_where(|m| m.channel_id == Snowflake::new(10)), 2);
        assert_eq!(store.len(), 1);
        assert!(store.remove(Snowflake::new(2)).is_some());
        assert!(store.remove(Snowflake::new(2)).is_none());
    }
}
