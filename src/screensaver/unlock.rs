//! Unlock gate for the lock session
//!
//! Without a password any key or pointer press unlocks. With one, typed
//! characters collect in a buffer and Enter checks the buffer's SHA-256
//! digest against the configured password's digest.

use crate::constants::UNLOCK_BUFFER_RESET_SECONDS;
use log::{debug, info, warn};
use ring::digest;
use std::time::{Duration, Instant};

/// Hash a password using SHA-256
pub fn hash_password(password: &str) -> String {
    let hash = digest::digest(&digest::SHA256, password.as_bytes());
    hex::encode(hash.as_ref())
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}

/// Input forwarded from the lock surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockInput {
    Char(char),
    Enter,
    Backspace,
    Escape,
    /// Any other key (arrows, modifiers, function keys)
    OtherKey,
    /// Mouse button or touch press
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked,
    Pending,
    Rejected,
}

pub struct UnlockGate {
    /// SHA-256 hex digest of the password; None means no protection
    password_hash: Option<String>,
    buffer: String,
    last_key_time: Option<Instant>,
    reset_after: Duration,
}

impl UnlockGate {
    pub fn new(password: Option<&str>) -> Self {
        Self {
            password_hash: password.map(hash_password),
            buffer: String::new(),
            last_key_time: None,
            reset_after: Duration::from_secs(UNLOCK_BUFFER_RESET_SECONDS),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Swap the password without ending the session
    ///
    /// The buffer is cleared only when the password actually changed.
    pub fn set_password(&mut self, password: Option<&str>) {
        let hash = password.map(hash_password);
        if hash == self.password_hash {
            return;
        }
        self.password_hash = hash;
        self.buffer.clear();
        self.last_key_time = None;
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.chars().count()
    }

    pub fn feed(&mut self, input: UnlockInput) -> UnlockOutcome {
        self.feed_at(input, Instant::now())
    }

    /// Process one input event observed at `now`
    pub fn feed_at(&mut self, input: UnlockInput, now: Instant) -> UnlockOutcome {
        let Some(hash) = self.password_hash.as_deref() else {
            debug!("Input received on unprotected lock screen - unlocking");
            return UnlockOutcome::Unlocked;
        };

        if let Some(last) = self.last_key_time {
            if now.saturating_duration_since(last) >= self.reset_after && !self.buffer.is_empty() {
                info!("Resetting password buffer after timeout");
                self.buffer.clear();
            }
        }

        match input {
            UnlockInput::Char(ch) => {
                self.buffer.push(ch);
                self.last_key_time = Some(now);
                UnlockOutcome::Pending
            }
            UnlockInput::Backspace => {
                self.buffer.pop();
                self.last_key_time = Some(now);
                UnlockOutcome::Pending
            }
            UnlockInput::Escape => {
                self.buffer.clear();
                self.last_key_time = None;
                UnlockOutcome::Pending
            }
            UnlockInput::Enter => {
                let matched = verify_password(&self.buffer, hash);
                self.buffer.clear();
                self.last_key_time = None;
                if matched {
                    info!("Password verified - unlocking");
                    UnlockOutcome::Unlocked
                } else {
                    warn!("Invalid password attempt");
                    UnlockOutcome::Rejected
                }
            }
            UnlockInput::OtherKey | UnlockInput::Pointer => UnlockOutcome::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(gate: &mut UnlockGate, text: &str, at: Instant) {
        for ch in text.chars() {
            assert_eq!(gate.feed_at(UnlockInput::Char(ch), at), UnlockOutcome::Pending);
        }
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(verify_password("abc", &hash_password("abc")));
        assert!(!verify_password("abd", &hash_password("abc")));
    }

    #[test]
    fn test_unprotected_any_input_unlocks() {
        let mut gate = UnlockGate::new(None);
        assert!(!gate.is_protected());
        assert_eq!(gate.feed(UnlockInput::Pointer), UnlockOutcome::Unlocked);
        assert_eq!(gate.feed(UnlockInput::OtherKey), UnlockOutcome::Unlocked);
    }

    #[test]
    fn test_correct_password_unlocks() {
        let mut gate = UnlockGate::new(Some("1234"));
        let now = Instant::now();
        type_str(&mut gate, "1234", now);
        assert_eq!(gate.feed_at(UnlockInput::Enter, now), UnlockOutcome::Unlocked);
    }

    #[test]
    fn test_wrong_password_rejected_and_cleared() {
        let mut gate = UnlockGate::new(Some("1234"));
        let now = Instant::now();
        type_str(&mut gate, "9999", now);
        assert_eq!(gate.feed_at(UnlockInput::Enter, now), UnlockOutcome::Rejected);
        assert_eq!(gate.buffered_len(), 0);

        type_str(&mut gate, "1234", now);
        assert_eq!(gate.feed_at(UnlockInput::Enter, now), UnlockOutcome::Unlocked);
    }

    #[test]
    fn test_backspace_and_escape_edit_buffer() {
        let mut gate = UnlockGate::new(Some("ab"));
        let now = Instant::now();
        type_str(&mut gate, "ax", now);
        gate.feed_at(UnlockInput::Backspace, now);
        type_str(&mut gate, "b", now);
        assert_eq!(gate.feed_at(UnlockInput::Enter, now), UnlockOutcome::Unlocked);

        type_str(&mut gate, "zz", now);
        gate.feed_at(UnlockInput::Escape, now);
        assert_eq!(gate.buffered_len(), 0);
    }

    #[test]
    fn test_buffer_resets_after_pause() {
        let mut gate = UnlockGate::new(Some("ab"));
        let start = Instant::now();
        type_str(&mut gate, "a", start);
        let later = start + Duration::from_secs(UNLOCK_BUFFER_RESET_SECONDS + 1);
        type_str(&mut gate, "b", later);
        assert_eq!(gate.buffered_len(), 1);
        assert_eq!(gate.feed_at(UnlockInput::Enter, later), UnlockOutcome::Rejected);
    }

    #[test]
    fn test_pointer_does_not_unlock_protected_session() {
        let mut gate = UnlockGate::new(Some("x"));
        assert_eq!(gate.feed(UnlockInput::Pointer), UnlockOutcome::Pending);
    }
}
