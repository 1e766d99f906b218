// ── Selection ─────────────────────────────────────────────────────────────────
//
// Ordered set of selected token ids. Stacking order is derived from
// membership at draw time, so selecting and deselecting can never drift a
// token's z-index.

/// How a pointer press combines with the current selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelectMode {
    Replace,
    Add,
    Toggle,
}

impl SelectMode {
    /// `shift` adds, `ctrl`/`meta` toggles, a plain press replaces.
    pub fn from_modifiers(shift: bool, ctrl_or_meta: bool) -> Self {
        if ctrl_or_meta {
            SelectMode::Toggle
        } else if shift {
            SelectMode::Add
        } else {
            SelectMode::Replace
        }
    }
}

/// z-index a token is drawn with.
#[inline]
pub fn effective_z(base: i32, selected: bool, offset: i32) -> i32 {
    if selected { base.saturating_add(offset) } else { base }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.clone()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Apply a press on `id`. Returns true if the selection changed.
    pub fn select(&mut self, id: &str, mode: SelectMode) -> bool {
        match mode {
            SelectMode::Replace => {
                if self.ids.len() == 1 && self.ids[0] == id {
                    return false;
                }
                self.ids.clear();
                self.ids.push(id.to_string());
                true
            }
            SelectMode::Add => self.insert(id),
            SelectMode::Toggle => {
                if !self.remove(id) {
                    self.ids.push(id.to_string());
                }
                true
            }
        }
    }

    pub fn insert(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|s| s != id);
        before != self.ids.len()
    }

    /// Replace the whole set, dropping duplicates. Returns true if it changed.
    pub fn set<I, S>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next: Vec<String> = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if !next.iter().any(|s| s == id) {
                next.push(id.to_string());
            }
        }
        if next == self.ids {
            return false;
        }
        self.ids = next;
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.ids.is_empty() {
            return false;
        }
        self.ids.clear();
        true
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_pick_mode() {
        assert_eq!(SelectMode::from_modifiers(false, false), SelectMode::Replace);
        assert_eq!(SelectMode::from_modifiers(true, false), SelectMode::Add);
        assert_eq!(SelectMode::from_modifiers(true, true), SelectMode::Toggle);
    }

    #[test]
    fn replace_add_toggle() {
        let mut s = Selection::new();
        assert!(s.select("a", SelectMode::Replace));
        assert!(!s.select("a", SelectMode::Replace));
        assert!(s.select("b", SelectMode::Add));
        assert!(!s.select("b", SelectMode::Add));
        assert_eq!(s.ids(), ["a", "b"]);
        assert!(s.select("a", SelectMode::Toggle));
        assert_eq!(s.ids(), ["b"]);
        assert!(s.select("c", SelectMode::Replace));
        assert_eq!(s.ids(), ["c"]);
    }

    #[test]
    fn set_dedups_and_reports_change() {
        let mut s = Selection::new();
        assert!(s.set(["x", "y", "x"]));
        assert_eq!(s.ids(), ["x", "y"]);
        assert!(!s.set(vec!["x".to_string(), "y".to_string()]));
        assert!(s.clear());
        assert!(!s.clear());
    }

    #[test]
    fn effective_z_never_accumulates() {
        let base = 7;
        let mut z = base;
        for i in 0..1000 {
            z = effective_z(base, i % 2 == 0, 100_000);
        }
        assert_eq!(z, base);
        assert_eq!(effective_z(base, true, 100_000), base + 100_000);
        assert_eq!(effective_z(i32::MAX - 1, true, 100_000), i32::MAX);
    }
}
