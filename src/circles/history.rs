use std::collections::{HashMap, VecDeque};

use super::msg::Message;

/// Fixed-capacity message log. Appending to a full log evicts the oldest entry.
///
/// Entries are addressed by an absolute position (number of appends before
/// them), so an id lookup is one map hit plus one deque index.
#[derive(Debug)]
pub struct RingHistory {
    capacity: usize,
    entries: VecDeque<Message>,
    positions: HashMap<String, u64>,
    evicted: u64,
}

impl RingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            evicted: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, message: Message) {
        if self.entries.len() == self.capacity {
            if let Some(oldest) = self.entries.pop_front() {
                // a reused id may already point at a newer entry
                if self.positions.get(&oldest.id) == Some(&self.evicted) {
                    self.positions.remove(&oldest.id);
                }
                self.evicted += 1;
            }
        }

        let position = self.evicted + self.entries.len() as u64;
        self.positions.insert(message.id.clone(), position);
        self.entries.push_back(message);
    }

    pub fn by_id(&self, id: &str) -> Option<&Message> {
        let position = *self.positions.get(id)?;
        self.entries.get((position - self.evicted) as usize)
    }

    /// Oldest first. The returned vector is detached from the log.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::Identity;

    fn message(seq: u64) -> Message {
        let author = Identity {
            nickname: "luna".to_owned(),
            flair: String::new(),
            client_token: "t1".to_owned(),
        };
        Message::compose(seq, &author, "👤", format!("msg {seq}"), json!({}), None)
    }

    #[test]
    fn keeps_arrival_order() {
        let mut history = RingHistory::new(5);
        for seq in 0..3 {
            history.append(message(seq));
        }

        let seqs: Vec<u64> = history.snapshot().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut history = RingHistory::new(3);
        let first = message(0);
        let first_id = first.id.clone();
        history.append(first);
        for seq in 1..5 {
            history.append(message(seq));
        }

        assert_eq!(history.len(), 3);
        let seqs: Vec<u64> = history.snapshot().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert!(history.by_id(&first_id).is_none());
    }

    #[test]
    fn looks_up_resident_messages() {
        let mut history = RingHistory::new(2);
        let messages: Vec<Message> = (0..4).map(message).collect();
        for m in &messages {
            history.append(m.clone());
        }

        assert!(history.by_id(&messages[1].id).is_none());
        assert_eq!(history.by_id(&messages[2].id).map(|m| m.seq), Some(2));
        assert_eq!(history.by_id(&messages[3].id).map(|m| m.seq), Some(3));
        assert!(history.by_id("missing").is_none());
    }

    #[test]
    fn snapshot_is_detached() {
        let mut history = RingHistory::new(2);
        history.append(message(0));
        let snapshot = history.snapshot();
        history.append(message(1));
        history.append(message(2));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].seq, 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut history = RingHistory::new(0);
        history.append(message(0));
        history.append(message(1));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.snapshot()[0].seq, 1);
    }
}
