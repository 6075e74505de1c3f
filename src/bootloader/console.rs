// CLASSIFICATION: COMMUNITY
// Filename: console.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-18

//! Operator and display collaborators.
//!
//! The loader blocks on these for password entry, the integrity prompt
//! and VBE mode negotiation. None of them time out.

use std::collections::VecDeque;

/// Key pressed at the integrity prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Escape halts the boot.
    Escape,
    /// Anything else continues.
    Other(char),
}

/// Interactive operator.
pub trait Operator {
    /// Read a hidden line of at most `max_len` characters after `prompt`.
    fn read_password(&mut self, prompt: &str, max_len: usize) -> String;

    /// Show the integrity-failure notice for `failures` errors and wait for a key.
    fn integrity_prompt(&mut self, failures: usize) -> Key;
}

/// VBE mode negotiation requested by a Multiboot video header.
pub trait DisplayModes {
    /// Try to switch to `width`×`height`×`depth`; returns whether a mode matched.
    fn match_vbe(&mut self, width: u32, height: u32, depth: u32) -> bool;
}

/// Operator that replays scripted input and records what it was shown.
#[derive(Debug, Default, Clone)]
pub struct ScriptedOperator {
    passwords: VecDeque<String>,
    keys: VecDeque<Key>,
    /// Every prompt string passed to [`Operator::read_password`].
    pub prompts: Vec<String>,
    /// Failure counts passed to [`Operator::integrity_prompt`].
    pub integrity_prompts: Vec<usize>,
}

impl ScriptedOperator {
    /// Operator with no scripted input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue password entries, consumed in order.
    pub fn with_passwords<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passwords.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Queue key presses, consumed in order.
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.keys.extend(keys);
        self
    }
}

impl Operator for ScriptedOperator {
    /// An exhausted script answers with an empty line.
    fn read_password(&mut self, prompt: &str, max_len: usize) -> String {
        self.prompts.push(prompt.to_string());
        let mut entry = self.passwords.pop_front().unwrap_or_default();
        if let Some((cut, _)) = entry.char_indices().nth(max_len) {
            entry.truncate(cut);
        }
        entry
    }

    /// An exhausted script answers with Enter.
    fn integrity_prompt(&mut self, failures: usize) -> Key {
        self.integrity_prompts.push(failures);
        self.keys.pop_front().unwrap_or(Key::Other('\n'))
    }
}

/// Display that accepts a fixed list of modes.
#[derive(Debug, Default, Clone)]
pub struct FixedDisplay {
    modes: Vec<(u32, u32, u32)>,
    /// Every request seen, in order.
    pub requests: Vec<(u32, u32, u32)>,
}

impl FixedDisplay {
    /// Display supporting `modes`.
    pub fn new(modes: Vec<(u32, u32, u32)>) -> Self {
        Self {
            modes,
            requests: Vec::new(),
        }
    }
}

impl DisplayModes for FixedDisplay {
    fn match_vbe(&mut self, width: u32, height: u32, depth: u32) -> bool {
        self.requests.push((width, height, depth));
        self.modes.contains(&(width, height, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_operator_replays_in_order() {
        let mut op = ScriptedOperator::new()
            .with_passwords(["secret", "averyveryverylongpassword"])
            .with_keys([Key::Escape]);
        assert_eq!(op.read_password("a", 10), "secret");
        assert_eq!(op.read_password("b", 10), "averyveryv");
        assert_eq!(op.read_password("c", 10), "");
        assert_eq!(op.integrity_prompt(2), Key::Escape);
        assert_eq!(op.integrity_prompt(1), Key::Other('\n'));
        assert_eq!(op.prompts, vec!["a", "b", "c"]);
        assert_eq!(op.integrity_prompts, vec![2, 1]);
    }
}
