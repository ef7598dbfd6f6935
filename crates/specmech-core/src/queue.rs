//! The outstanding-command queue.
//!
//! Every correlated command sent to the controller carries a sequence id,
//! and the controller echoes that id back in the trailer of its reply. The
//! [`CommandQueue`] tracks commands between those two points so that late or
//! reordered replies can still be matched to what caused them.

use std::time::Instant;

use tracing::debug;

/// One command awaiting its reply from the controller.
///
/// Created when a caller issues a send; owned by the queue until retired by
/// a parsed reply trailer. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Command {
    /// The sequence id appended to the command on the wire.
    pub id: u64,
    /// The command text as given by the caller, without the id suffix.
    pub text: String,
    /// When the command was handed to the transport.
    pub submitted_at: Instant,
}

/// Ordered queue of outstanding commands, keyed by sequence id.
///
/// Insertion order is submission order. Ids are allocated from a
/// session-lifetime counter starting at 1, so they strictly increase and
/// are never reused while the session lives, even after the queue drains.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: Vec<Command>,
    last_id: u64,
}

impl CommandQueue {
    /// Create an empty queue with the id counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command and return its newly allocated sequence id.
    pub fn enqueue(&mut self, text: &str) -> u64 {
        self.last_id += 1;
        let id = self.last_id;
        self.entries.push(Command {
            id,
            text: text.to_string(),
            submitted_at: Instant::now(),
        });
        id
    }

    /// Remove the first entry with the given id.
    ///
    /// Returns whether an entry was removed. An absent id is a legitimate
    /// no-op: it happens whenever a reply could not be correlated and the
    /// orphaned entry was already cleaned up, or never existed.
    pub fn retire(&mut self, id: u64) -> bool {
        match self.entries.iter().position(|cmd| cmd.id == id) {
            Some(index) => {
                let cmd = self.entries.remove(index);
                debug!(id, text = %cmd.text, "retired command");
                true
            }
            None => false,
        }
    }

    /// Read-only view of the outstanding commands, in submission order.
    pub fn snapshot(&self) -> Vec<Command> {
        self.entries.clone()
    }

    /// Number of commands still awaiting a reply.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no commands are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_one_through_n_in_order() {
        let mut queue = CommandQueue::new();
        for expected in 1..=5u64 {
            assert_eq!(queue.enqueue("st"), expected);
        }
        let ids: Vec<u64> = queue.snapshot().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn ids_are_not_reused_after_drain() {
        let mut queue = CommandQueue::new();
        assert_eq!(queue.enqueue("mo1000"), 1);
        assert!(queue.retire(1));
        assert!(queue.is_empty());

        // The counter keeps counting across an empty queue.
        assert_eq!(queue.enqueue("mo2000"), 2);
    }

    #[test]
    fn retire_removes_at_most_one_entry() {
        let mut queue = CommandQueue::new();
        queue.enqueue("rd");
        queue.enqueue("re");
        queue.enqueue("rp");

        assert!(queue.retire(2));
        assert_eq!(queue.len(), 2);

        let ids: Vec<u64> = queue.snapshot().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn retire_absent_id_is_a_noop() {
        let mut queue = CommandQueue::new();
        queue.enqueue("rs");

        assert!(!queue.retire(99));
        assert_eq!(queue.len(), 1);

        // An empty queue tolerates retirement attempts too.
        let mut empty = CommandQueue::new();
        assert!(!empty.retire(1));
        assert!(empty.is_empty());
    }

    #[test]
    fn out_of_order_retirement_is_tolerated() {
        let mut queue = CommandQueue::new();
        queue.enqueue("st");
        queue.enqueue("rd");

        // Reply to the second command arrives first.
        assert!(queue.retire(2));
        assert!(queue.retire(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn snapshot_preserves_submission_order_and_text() {
        let mut queue = CommandQueue::new();
        queue.enqueue("mo1000");
        queue.enqueue("sc");

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].text, "mo1000");
        assert_eq!(snapshot[1].text, "sc");
        assert!(snapshot[0].submitted_at <= snapshot[1].submitted_at);
    }
}
