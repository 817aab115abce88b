// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unique node naming for a single translation run.

use std::collections::HashSet;

/// Generator of unique node names
///
/// Colliding names get a letter suffix: `A` to `Z`, then `AA`, `AB` and so on.
#[derive(Debug, Clone, Default)]
pub struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    /// Create an empty generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator seeded with names that are already taken
    pub fn seeded<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut generator = Self::new();
        generator.reset_with(names);
        generator
    }

    /// Forget every name
    pub fn reset(&mut self) {
        self.used.clear();
    }

    /// Forget every name, then mark `names` as taken
    pub fn reset_with<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.used.clear();
        self.used.extend(names.into_iter().map(Into::into));
    }

    /// Whether a name is already taken
    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Reserve a unique name derived from `name`
    pub fn unique(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut index = 0;
        while self.used.contains(&candidate) {
            candidate = format!("{name}{}", letter_suffix(index));
            index += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Letter suffix for a zero-based collision index: `A`..`Z`, `AA`..`AZ`, `BA`..
fn letter_suffix(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    loop {
        letters.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
