//! Deny lists and per-type rate limits for desktop, web and file actions.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::interaction::InteractionType;
use crate::kernel::time::{system_clock, SharedClock};

/// Actions allowed per rolling minute, by interaction type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimits {
    pub mouse: u32,
    pub keyboard: u32,
    pub system: u32,
    pub web: u32,
    pub file: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            mouse: 60,
            keyboard: 120,
            system: 10,
            web: 30,
            file: 20,
        }
    }
}

impl RateLimits {
    pub fn limit(&self, kind: InteractionType) -> u32 {
        match kind {
            InteractionType::Mouse => self.mouse,
            InteractionType::Keyboard => self.keyboard,
            InteractionType::System => self.system,
            InteractionType::Web => self.web,
            InteractionType::File => self.file,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub rate_limits: RateLimits,
    pub unsafe_commands: Vec<String>,
    pub unsafe_domains: Vec<String>,
    pub unsafe_paths: Vec<String>,
    pub unsafe_content: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            rate_limits: RateLimits::default(),
            unsafe_commands: strings(&[
                "rm -rf", "format", "del", "shutdown", "reboot", "mkfs", "dd", "chmod -R", "chown -R",
            ]),
            unsafe_domains: strings(&["malware", "phishing", "hack", "crack", "warez", "torrent", "proxy"]),
            unsafe_paths: strings(&[
                "/system",
                "C:\\Windows",
                "/boot",
                "/etc",
                "C:\\Program Files",
                "C:\\Program Files (x86)",
            ]),
            unsafe_content: strings(&[
                "password",
                "credit card",
                "social security",
                "private key",
                "secret key",
                "api key",
            ]),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when `needle` occurs in `haystack` with no word character on either side.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, m)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + m.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

impl SafetyPolicy {
    pub fn is_safe_command(&self, command: &str) -> bool {
        let command = command.to_lowercase();
        let hit = self
            .unsafe_commands
            .iter()
            .find(|deny| contains_word(&command, &deny.to_lowercase()));
        if let Some(deny) = hit {
            warn!("Unsafe command detected ({}): {}", deny, command);
        }
        hit.is_none()
    }

    pub fn is_safe_url(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        !self
            .unsafe_domains
            .iter()
            .any(|deny| url.contains(&deny.to_lowercase()))
    }

    pub fn is_safe_path(&self, path: &str) -> bool {
        !self.unsafe_paths.iter().any(|deny| path.contains(deny.as_str()))
    }

    pub fn is_safe_content(&self, content: &str) -> bool {
        let content = content.to_lowercase();
        !self
            .unsafe_content
            .iter()
            .any(|deny| content.contains(&deny.to_lowercase()))
    }
}

const WINDOW_SECS: i64 = 60;

/// Sliding one-minute window per interaction type.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    windows: HashMap<InteractionType, VecDeque<DateTime<Utc>>>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self::with_clock(limits, system_clock())
    }

    pub fn with_clock(limits: RateLimits, clock: SharedClock) -> Self {
        Self {
            limits,
            windows: HashMap::new(),
            clock,
        }
    }

    /// Record an action if it fits in the window. Returns false when over the limit.
    pub fn try_acquire(&mut self, kind: InteractionType) -> bool {
        let now = self.clock.now();
        let cutoff = now - Duration::seconds(WINDOW_SECS);
        let limit = self.limits.limit(kind) as usize;

        let window = self.windows.entry(kind).or_default();
        while window.front().is_some_and(|t| *t <= cutoff) {
            window.pop_front();
        }
        if window.len() >= limit {
            warn!("Rate limit exceeded for {:?}", kind);
            return false;
        }
        window.push_back(now);
        true
    }

    pub fn in_window(&self, kind: InteractionType) -> usize {
        self.windows.get(&kind).map_or(0, VecDeque::len)
    }
}
