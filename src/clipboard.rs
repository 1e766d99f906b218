// ── Clipboard ─────────────────────────────────────────────────────────────────
//
// Copies are snapshots, not live references: editing or removing an original
// after copying does not change what gets pasted.

use glam::Vec2;

use crate::geometry::{centroid, is_finite_point};
use crate::token::{TokenRecord, TokenSpec};

#[derive(Clone, Debug, Default)]
pub struct Clipboard {
    entries: Option<Vec<TokenRecord>>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents. An empty copy clears the clipboard.
    pub fn store(&mut self, records: Vec<TokenRecord>) {
        self.entries = (!records.is_empty()).then_some(records);
    }

    pub fn entries(&self) -> &[TokenRecord] {
        self.entries.as_deref().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_none()
    }

    pub fn clear(&mut self) {
        self.entries = None;
    }
}

/// Id given to the `index`-th pasted copy of `original`.
pub fn copy_id(original: &str, stamp_ms: u128, index: usize) -> String {
    format!("{original}-copy-{stamp_ms}-{index}")
}

/// Specs for pasting `records` so their centroid lands on `target`.
///
/// A non-finite target shifts the copies by one cell on both axes instead.
pub fn paste_layout(records: &[TokenRecord], target: Vec2, cell_size: f32, stamp_ms: u128) -> Vec<TokenSpec> {
    let positions: Vec<Vec2> = records.iter().map(TokenRecord::position).collect();
    let offset = match centroid(&positions) {
        Some(c) if is_finite_point(target) => target - c,
        _ => Vec2::splat(cell_size),
    };

    records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let p = rec.position();
            let base = Vec2::new(
                if p.x.is_finite() { p.x } else { 0.0 },
                if p.y.is_finite() { p.y } else { 0.0 },
            );
            rec.to_spec(copy_id(&rec.id, stamp_ms, i), base + offset)
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn record(id: &str, x: f32, y: f32) -> TokenRecord {
        TokenRecord {
            id: id.into(),
            x,
            y,
            size: 50.0,
            rotation: 0.0,
            opacity: 1.0,
            tint: None,
            texture_url: None,
            layer: "tokens".into(),
            z_index: 1,
            name: None,
            vision: Value::Null,
            metadata: Map::new(),
        }
    }

    #[test]
    fn empty_store_clears() {
        let mut c = Clipboard::new();
        c.store(vec![record("a", 0.0, 0.0)]);
        assert_eq!(c.entries().len(), 1);
        c.store(Vec::new());
        assert!(c.is_empty());
        assert!(c.entries().is_empty());
    }

    #[test]
    fn pasted_centroid_hits_target() {
        let recs = [record("a", 0.0, 0.0), record("b", 100.0, 50.0)];
        let specs = paste_layout(&recs, Vec2::new(300.0, 300.0), 50.0, 42);
        assert_eq!(specs[0].id, "a-copy-42-0");
        assert_eq!(specs[1].id, "b-copy-42-1");
        let pts: Vec<Vec2> = specs.iter().map(|s| Vec2::new(s.attrs.x.unwrap(), s.attrs.y.unwrap())).collect();
        let c = centroid(&pts).unwrap();
        assert!((c - Vec2::new(300.0, 300.0)).length() < 1e-3);
    }

    #[test]
    fn invalid_target_shifts_one_cell() {
        let recs = [record("a", 10.0, 20.0)];
        let specs = paste_layout(&recs, Vec2::new(f32::NAN, 0.0), 50.0, 1);
        assert_eq!((specs[0].attrs.x, specs[0].attrs.y), (Some(60.0), Some(70.0)));
    }
}
