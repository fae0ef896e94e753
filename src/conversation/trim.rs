//! History trimming policies.
//!
//! Two policies are supported:
//! - `Paired`: protects a leading system message, caps the number of
//!   user/assistant pairs and the total character budget, evicting the
//!   oldest messages two at a time.
//! - `Flat`: keeps only the most recent N messages.

use super::message::Message;

/// Default number of user/assistant pairs kept by [`TrimPolicy::Paired`].
pub const DEFAULT_MAX_TURNS: usize = 20;
/// Default character budget for [`TrimPolicy::Paired`].
pub const DEFAULT_MAX_CHARS: usize = 12_000;
/// Default message cap for [`TrimPolicy::Flat`].
pub const DEFAULT_MAX_MESSAGES: usize = 15;

/// How a conversation is bounded after each append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimPolicy {
    Paired { max_turns: usize, max_chars: usize },
    Flat { max_messages: usize },
}

impl Default for TrimPolicy {
    fn default() -> Self {
        TrimPolicy::Paired {
            max_turns: DEFAULT_MAX_TURNS,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl TrimPolicy {
    /// Return the retained messages, in order.
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        match *self {
            TrimPolicy::Paired {
                max_turns,
                max_chars,
            } => trim_paired(messages, max_turns, max_chars),
            TrimPolicy::Flat { max_messages } => {
                let start = messages.len().saturating_sub(max_messages);
                messages[start..].to_vec()
            }
        }
    }
}

fn trim_paired(messages: &[Message], max_turns: usize, max_chars: usize) -> Vec<Message> {
    if messages.is_empty() {
        return Vec::new();
    }

    let (system, rest) = match messages.split_first() {
        Some((first, rest)) if first.is_system() => (Some(first), rest),
        _ => (None, messages),
    };
    let rest: Vec<&Message> = rest.iter().filter(|m| !m.is_system()).collect();

    // Pair limit: drop an even number of the oldest items.
    let max_items = max_turns.saturating_mul(2);
    let mut start = 0;
    if rest.len() > max_items {
        let excess = rest.len() - max_items;
        start = (excess + excess % 2).min(rest.len());
    }

    // Character budget, measured over the contents joined with newlines.
    let system_chars = system.map(|m| m.content.chars().count());
    let char_len = |from: usize| -> usize {
        let parts = system_chars
            .into_iter()
            .chain(rest[from..].iter().map(|m| m.content.chars().count()));
        let (total, count) = parts.fold((0usize, 0usize), |(total, count), len| {
            (total + len, count + 1)
        });
        total + count.saturating_sub(1)
    };
    while rest.len() - start > 2 && char_len(start) > max_chars {
        start += 2;
    }

    system
        .into_iter()
        .chain(rest[start..].iter().copied())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::Role;

    fn dialogue(pairs: usize) -> Vec<Message> {
        (0..pairs)
            .flat_map(|i| {
                [
                    Message::user(format!("question {}", i)),
                    Message::assistant(format!("answer {}", i)),
                ]
            })
            .collect()
    }

    #[test]
    fn test_empty_conversation_stays_empty() {
        assert!(TrimPolicy::default().apply(&[]).is_empty());
        assert!(TrimPolicy::Flat { max_messages: 3 }.apply(&[]).is_empty());
    }

    #[test]
    fn test_flat_keeps_most_recent() {
        let messages = dialogue(10);
        let trimmed = TrimPolicy::Flat { max_messages: 15 }.apply(&messages);
        assert_eq!(trimmed.len(), 15);
        assert_eq!(trimmed[..], messages[5..]);
    }

    #[test]
    fn test_flat_does_not_protect_system() {
        let mut messages = vec![Message::system("persona")];
        messages.extend(dialogue(2));
        let trimmed = TrimPolicy::Flat { max_messages: 2 }.apply(&messages);
        assert_eq!(trimmed, messages[3..]);
    }

    #[test]
    fn test_flat_never_exceeds_cap() {
        for n in 0..40 {
            let messages: Vec<Message> = (0..n).map(|i| Message::user(i.to_string())).collect();
            let trimmed = TrimPolicy::Flat { max_messages: 15 }.apply(&messages);
            assert_eq!(trimmed.len(), n.min(15));
            assert_eq!(trimmed[..], messages[n - trimmed.len()..]);
        }
    }

    #[test]
    fn test_paired_caps_turns_and_keeps_system() {
        let mut messages = vec![Message::system("persona")];
        messages.extend(dialogue(5));
        let policy = TrimPolicy::Paired {
            max_turns: 2,
            max_chars: 10_000,
        };
        let trimmed = policy.apply(&messages);

        assert_eq!(trimmed.len(), 5);
        assert_eq!(trimmed[0], Message::system("persona"));
        assert_eq!(trimmed[1..], messages[7..]);
    }

    #[test]
    fn test_paired_odd_excess_drops_whole_pair() {
        // 2 pairs plus a pending user turn, limit of 1 pair.
        let mut messages = dialogue(2);
        messages.push(Message::user("pending"));
        let policy = TrimPolicy::Paired {
            max_turns: 1,
            max_chars: 10_000,
        };
        let trimmed = policy.apply(&messages);

        // Excess of 3 rounds up to 4, so the pending user turn leads.
        assert_eq!(trimmed, vec![Message::user("pending")]);
    }

    #[test]
    fn test_paired_char_budget_drops_oldest_pairs() {
        let messages = vec![
            Message::user("a".repeat(50)),
            Message::assistant("b".repeat(50)),
            Message::user("c".repeat(10)),
            Message::assistant("d".repeat(10)),
        ];
        let policy = TrimPolicy::Paired {
            max_turns: 20,
            max_chars: 40,
        };
        let trimmed = policy.apply(&messages);
        assert_eq!(trimmed, messages[2..]);
    }

    #[test]
    fn test_paired_char_budget_keeps_last_two() {
        let messages = vec![
            Message::user("x".repeat(500)),
            Message::assistant("y".repeat(500)),
        ];
        let policy = TrimPolicy::Paired {
            max_turns: 20,
            max_chars: 10,
        };
        assert_eq!(policy.apply(&messages), messages);
    }

    #[test]
    fn test_paired_counts_system_in_budget() {
        let mut messages = vec![Message::system("s".repeat(30))];
        messages.extend(dialogue(3));
        // system (30) + 6 messages of 8-10 chars + separators exceeds 60.
        let policy = TrimPolicy::Paired {
            max_turns: 20,
            max_chars: 60,
        };
        let trimmed = policy.apply(&messages);
        assert_eq!(trimmed[0].role, Role::System);
        assert_eq!(trimmed.len(), 3);
        assert_eq!(trimmed[1..], messages[5..]);
    }

    #[test]
    fn test_paired_drops_mid_list_system() {
        let messages = vec![
            Message::user("A"),
            Message::system("late"),
            Message::assistant("B"),
        ];
        let trimmed = TrimPolicy::default().apply(&messages);
        assert_eq!(trimmed, vec![Message::user("A"), Message::assistant("B")]);
    }

    #[test]
    fn test_paired_system_survives_repeated_trims() {
        let policy = TrimPolicy::Paired {
            max_turns: 1,
            max_chars: 100,
        };
        let mut messages = vec![Message::system("persona")];
        for i in 0..30 {
            messages.push(Message::user(format!("u{}", i)));
            messages = policy.apply(&messages);
            messages.push(Message::assistant(format!("a{}", i)));
            messages = policy.apply(&messages);

            assert_eq!(messages[0], Message::system("persona"));
            assert!(messages.len() <= 3);
        }
        assert_eq!(policy.apply(&messages), messages);
    }
}
