//! Property-based tests for surface editing and incremental raster updates.

use std::rc::Rc;

use proptest::prelude::*;
use sheet_trace::frame::{Orientation, ViewContext, VolumeFrame};
use sheet_trace::geometry::Point3;
use sheet_trace::point_store::{AddOutcome, LocalPoint};
use sheet_trace::settings::SurfaceSettings;
use sheet_trace::surface::{Surface, SurfaceKind};
use sheet_trace::triangulation::triangulate;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Yz surface over a unit frame: local (i, j, k) = (gy, gz, gx)
fn yz(i: u8, j: u8, k: u8) -> Point3 {
    Point3::new(k as f64, i as f64, j as f64)
}

fn surface(hide_skinny_triangles: bool) -> Surface {
    let settings = SurfaceSettings {
        hide_skinny_triangles,
        ..SurfaceSettings::default()
    };
    let mut s = Surface::with_settings("prop", Orientation::Yz, SurfaceKind::Meshed, settings);
    let sampler = Rc::new(|g: Point3| g.x.max(0.0) as u16 * 10);
    s.set_view(Some(
        ViewContext::new(VolumeFrame::unit([64, 64, 64]), Orientation::Yz).with_sampler(sampler),
    ));
    s
}

fn arb_points(len: std::ops::RangeInclusive<usize>) -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
    prop::collection::vec((2u8..60, 2u8..60, 5u8..40), len)
}

#[derive(Debug, Clone)]
enum Edit {
    Add(u8, u8, u8),
    Move(usize, u8, u8, u8),
    Delete(usize),
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (2u8..60, 2u8..60, 5u8..40).prop_map(|(i, j, k)| Edit::Add(i, j, k)),
        (any::<usize>(), 2u8..60, 2u8..60, 5u8..40).prop_map(|(n, i, j, k)| Edit::Move(n, i, j, k)),
        any::<usize>().prop_map(Edit::Delete),
    ]
}

#[derive(Debug, Clone)]
enum Step {
    Edit(Edit),
    Undo,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => arb_edit().prop_map(Step::Edit),
        1 => Just(Step::Undo),
    ]
}

/// Starting points that are either scattered or share one column, so
/// sequences cross between line mode and meshes.
fn arb_start() -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
    prop_oneof![
        arb_points(0..=12),
        (2u8..60, prop::collection::vec((2u8..60, 5u8..40), 2..=6))
            .prop_map(|(i, rest)| rest.into_iter().map(|(j, k)| (i, j, k)).collect()),
    ]
}

fn apply(s: &mut Surface, edit: &Edit) {
    let len = s.points().len();
    let _ = match *edit {
        Edit::Add(i, j, k) => s.add_point(yz(i, j, k)).map(|_| ()),
        Edit::Move(n, i, j, k) if len > 0 => s.move_point(n % len, yz(i, j, k)),
        Edit::Delete(n) if len > 0 => s.delete_point(n % len),
        _ => Ok(()),
    };
}

fn built(points: &[(u8, u8, u8)], hide: bool) -> Surface {
    let mut s = surface(hide);
    for &(i, j, k) in points {
        s.add_point(yz(i, j, k)).unwrap();
    }
    s
}

fn assert_matches_fresh(s: &Surface, hide: bool) -> Result<(), TestCaseError> {
    let mut fresh = surface(hide);
    fresh.load_points(s.points().to_vec());
    let (a, b) = (s.zsurf().unwrap(), fresh.zsurf().unwrap());
    prop_assert!(a.diff_cells(b, 1e-3).is_empty(), "cells differ: {:?}", a.diff_cells(b, 1e-3));
    prop_assert_eq!(s.ssurf(), fresh.ssurf());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Updating only the changed rectangle gives the same rasters as
    /// rebuilding them from scratch.
    #[test]
    fn incremental_update_matches_full_recompute(
        points in arb_points(3..=20),
        edit in arb_edit(),
        hide in any::<bool>(),
    ) {
        init();
        let mut s = built(&points, hide);
        apply(&mut s, &edit);
        assert_matches_fresh(&s, hide)?;
    }

    /// Sequences of edits and undos, applied live or batched behind
    /// `live_update = false`, end with the same rasters as a rebuild.
    #[test]
    fn edit_sequences_match_full_recompute(
        points in arb_start(),
        steps in prop::collection::vec(arb_step(), 1..8),
        batched in any::<bool>(),
        hide in any::<bool>(),
    ) {
        init();
        let mut cells = std::collections::BTreeSet::new();
        let start: Vec<Point3> = points
            .iter()
            .filter(|&&(i, j, _)| cells.insert((i, j)))
            .map(|&(i, j, k)| yz(i, j, k))
            .collect();
        let mut s = surface(hide);
        s.load_points(start);
        if batched {
            s.set_live_update(false);
        }
        for step in &steps {
            match step {
                Step::Edit(edit) => apply(&mut s, edit),
                Step::Undo => {
                    let _ = s.undo();
                }
            }
            if !batched {
                assert_matches_fresh(&s, hide)?;
            }
        }
        if batched {
            s.set_live_update(true);
        }
        assert_matches_fresh(&s, hide)?;
    }

    /// Identical input triangulates identically.
    #[test]
    fn triangulation_is_deterministic(points in arb_points(0..=30)) {
        let local: Vec<LocalPoint> = points
            .iter()
            .enumerate()
            .map(|(index, &(i, j, k))| LocalPoint { i: i as f64, j: j as f64, k: k as f64, index })
            .collect();
        prop_assert_eq!(triangulate(&local), triangulate(&local));
    }

    /// Insertion order does not change the rasters.
    #[test]
    fn rasters_ignore_point_order(points in arb_points(3..=20)) {
        let a = built(&points, true);
        let mut reversed = surface(true);
        reversed.load_points(a.points().iter().rev().copied().collect());
        let (za, zb) = (a.zsurf().unwrap(), reversed.zsurf().unwrap());
        prop_assert!(za.diff_cells(zb, 1e-3).is_empty());
    }

    /// Adding the same point twice changes nothing the second time.
    #[test]
    fn add_is_idempotent(points in arb_points(1..=15), extra in (2u8..60, 2u8..60, 5u8..40)) {
        let mut s = built(&points, false);
        let p = yz(extra.0, extra.1, extra.2);
        let first = s.add_point(p).unwrap();
        let revision = s.revision();
        let snapshot = s.points().to_vec();
        let second = s.add_point(p).unwrap();
        prop_assert_eq!(second, AddOutcome::MergedInto(first.index()));
        prop_assert_eq!(s.revision(), revision);
        prop_assert_eq!(s.points(), &snapshot[..]);
    }

    /// Undo restores the points from before the last successful edit.
    #[test]
    fn undo_round_trip(points in arb_points(1..=15), edit in arb_edit()) {
        let mut s = built(&points, false);
        let before = s.points().to_vec();
        let revision = s.revision();
        apply(&mut s, &edit);
        if s.revision() != revision {
            s.undo().unwrap();
            prop_assert_eq!(s.points(), &before[..]);
        }
    }

    /// Hiding border-bad triangles only ever removes raster cells.
    #[test]
    fn suppression_only_removes_cells(points in arb_points(3..=20)) {
        let shown = built(&points, false);
        let hidden = built(&points, true);
        let (zs, zh) = (shown.zsurf().unwrap(), hidden.zsurf().unwrap());
        for (v_hidden, v_shown) in zh.data().iter().zip(zs.data()) {
            if !v_hidden.is_nan() {
                prop_assert!(!v_shown.is_nan());
            }
        }
        prop_assert!(zh.count_valid() <= zs.count_valid());
    }
}
