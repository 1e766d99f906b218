mod common;

use battlemap::geometry::centroid;
use battlemap::grid::{snap_to_cell_center, snap_within_world};
use battlemap::{TokenPatch, TokenSpec, Vec2};
use common::Harness;
use proptest::prelude::*;

fn point() -> impl Strategy<Value = Vec2> {
    (-10_000.0f32..10_000.0, -10_000.0f32..10_000.0).prop_map(|(x, y)| Vec2::new(x, y))
}

proptest! {
    #[test]
    fn snapping_is_idempotent(p in point(), cell in 1.0f32..512.0) {
        let once = snap_to_cell_center(p, cell);
        prop_assert_eq!(snap_to_cell_center(once, cell), once);
    }

    #[test]
    fn snapped_drops_stay_inside_the_world(
        p in point(),
        cell in 8.0f32..128.0,
        w in 512.0f32..4096.0,
        hgt in 512.0f32..4096.0,
    ) {
        let world = Vec2::new(w, hgt);
        let q = snap_within_world(p, world, cell);
        prop_assert!(q.x >= cell * 0.5 && q.x <= world.x - cell * 0.5);
        prop_assert!(q.y >= cell * 0.5 && q.y <= world.y - cell * 0.5);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn re_adding_never_duplicates(xs in proptest::collection::vec((0.0f32..800.0, 0.0f32..600.0), 1..8)) {
        let mut h = Harness::ready(50.0);
        for (x, y) in &xs {
            h.pool.run_until(h.map.add_token(TokenSpec::new("dup").at(*x, *y)));
        }
        prop_assert_eq!(h.map.token_count(), 1);
        let (x, y) = xs[xs.len() - 1];
        let rec = h.map.get_token("dup").unwrap();
        prop_assert_eq!((rec.x, rec.y), (x, y));
    }

    #[test]
    fn selection_offset_never_drifts(base in -1_000i32..1_000, cycles in 1usize..12) {
        let mut h = Harness::ready(50.0);
        let spec = TokenSpec::new("t").with(TokenPatch::default().z_index(base));
        h.pool.run_until(h.map.add_token(spec));
        let offset = h.map.options().selection_z_offset;

        for _ in 0..cycles {
            h.pool.run_until(h.map.set_selection(&["t"]));
            prop_assert_eq!(h.map.effective_z("t"), Some(base + offset));
            h.pool.run_until(h.map.set_selection::<&str>(&[]));
            prop_assert_eq!(h.map.effective_z("t"), Some(base));
        }
        prop_assert_eq!(h.map.get_token("t").unwrap().z_index, base);
    }

    #[test]
    fn paste_lands_centroid_on_target(
        points in proptest::collection::vec(point(), 1..6),
        target in point(),
    ) {
        let mut h = Harness::ready(50.0);
        let ids: Vec<String> = (0..points.len()).map(|i| format!("t{i}")).collect();
        for (id, p) in ids.iter().zip(&points) {
            h.pool.run_until(h.map.add_token(TokenSpec::new(id.as_str()).at(p.x, p.y)));
        }
        h.pool.run_until(h.map.set_selection(&ids));
        h.pool.run_until(h.map.copy_selection());
        let pasted = h.pool.run_until(h.map.paste_at(target.x, target.y));

        prop_assert_eq!(pasted.len(), points.len());
        let c = centroid(&pasted.iter().map(|r| r.position()).collect::<Vec<_>>()).unwrap();
        prop_assert!((c - target).length() < 0.05, "centroid {:?} vs target {:?}", c, target);

        for (id, p) in ids.iter().zip(&points) {
            let rec = h.map.get_token(id).unwrap();
            prop_assert_eq!(rec.position(), *p);
        }
        prop_assert_eq!(h.map.token_count(), points.len() * 2);
    }
}
