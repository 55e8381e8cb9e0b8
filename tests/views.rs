use tessera::prelude::*;
use tessera::view::{index, local};

#[test]
fn sub_extents_and_composition() {
    spawn_units(2, |world| {
        let mat = Matrix::<i32, 2>::with_dist(
            world.team(),
            [8, 6],
            [Dist::None, Dist::Blocked],
        );
        let rows = mat.sub::<0>(1..3);
        assert_eq!(rows.extents(), [2, 6]);
        assert_eq!(rows.offsets(), [1, 0]);
        assert_eq!(rows.size(), 12);

        let cols = mat.sub::<1>(2..5);
        assert_eq!(cols.extents(), [8, 3]);
        assert_eq!(cols.offsets(), [0, 2]);

        // narrowing different dimensions commutes
        let rc = rows.sub::<1>(2..5);
        let cr = cols.sub::<0>(1..3);
        assert_eq!(rc.extents(), [2, 3]);
        assert_eq!(rc.extents(), cr.extents());
        assert_eq!(rc.offsets(), cr.offsets());
        assert_eq!(rc.offsets(), [1, 2]);

        // repeated narrowing of one dimension accumulates offsets
        let narrow = rc.sub::<1>(1..3);
        assert_eq!(narrow.offsets(), [1, 3]);
        assert_eq!(narrow.extents(), [2, 2]);
        world.barrier();
    });
}

#[test]
fn index_set_is_canonical_order() {
    spawn_units(2, |world| {
        let mat = Matrix::<u8, 2>::with_dist(
            world.team(),
            [8, 6],
            [Dist::None, Dist::Blocked],
        );
        let sub0 = mat.sub::<0>(1..3);
        let v = sub0.sub::<1>(2..5);
        let indices: Vec<usize> = index(&v).collect();
        assert_eq!(indices, vec![8, 9, 10, 14, 15, 16]);
        // the identity view names every index
        assert_eq!(index(&mat).count(), 48);
        assert_eq!(index(&mat).next(), Some(0));
        world.barrier();
    });
}

#[test]
fn view_iteration_reads_through_pattern() {
    spawn_units(2, |world| {
        let mat = Matrix::<i64, 2>::with_dist(
            world.team(),
            [4, 4],
            [Dist::None, Dist::Blocked],
        );
        let mine = local(&mat);
        for (idx, elem) in mine.indices().zip(mine.iter()) {
            elem.store(idx as i64);
        }
        mat.barrier();
        let sub0 = mat.sub::<0>(1..3);
        let v = sub0.sub::<1>(1..4);
        let read: Vec<i64> = v.iter().map(|r| r.load()).collect();
        let expect: Vec<i64> = index(&v).map(|i| i as i64).collect();
        assert_eq!(read, expect);
        mat.barrier();
    });
}

#[test]
fn local_view_of_full_rows() {
    // S3: (NONE, BLOCKED) over U units with M divisible by U
    spawn_units(4, |world| {
        let u = world.num_units();
        let (n, m) = (6, 4 * u);
        let mat = Matrix::<u8, 2>::with_dist(
            world.team(),
            [n, m],
            [Dist::None, Dist::Blocked],
        );
        let v = mat.sub::<0>(0..n);
        let lv = local(&v);
        assert_eq!(lv.size(), n * (m / u));
        assert_eq!(lv.extents(), vec![n, m / u]);
        assert_eq!(lv.ndim(), 2);
        assert!(lv.iter().all(|r| r.is_local()));
        world.barrier();
    });
}

#[test]
fn local_view_of_sub_range() {
    spawn_units(2, |world| {
        let mat = Matrix::<u32, 2>::with_dist(
            world.team(),
            [8, 6],
            [Dist::None, Dist::Blocked],
        );
        // columns 2..5 intersect unit 0's block [0,3) in one column and
        // unit 1's block [3,6) in two
        let v = mat.sub::<1>(2..5);
        let lv = local(&v);
        match world.my_unit() {
            0 => assert_eq!(lv.extents(), vec![8, 1]),
            _ => assert_eq!(lv.extents(), vec![8, 2]),
        }
        let pattern = mat.pattern();
        let my = world.my_unit();
        for idx in lv.indices() {
            let coords = pattern.coords(idx);
            assert_eq!(pattern.unit_at(&coords), my);
            assert!((2..5).contains(&coords[1]));
        }
        world.barrier();
    });
}

#[test]
fn local_view_may_be_empty() {
    spawn_units(2, |world| {
        let mat = Matrix::<u32, 2>::with_dist(
            world.team(),
            [8, 6],
            [Dist::None, Dist::Blocked],
        );
        // columns 0..3 are owned entirely by unit 0
        let v = mat.sub::<1>(0..3);
        let lv = local(&v);
        if world.my_unit() == 0 {
            assert_eq!(lv.size(), 24);
        } else {
            assert!(lv.is_empty());
            assert_eq!(lv.iter().count(), 0);
            assert_eq!(lv.indices().count(), 0);
        }
        world.barrier();
    });
}

#[test]
fn cyclic_local_view_flattens() {
    spawn_units(3, |world| {
        let arr = Array::<u16>::with_dist(world.team(), 10, Dist::Cyclic);
        let lv = local(arr.as_matrix());
        let my = world.my_unit();
        let expect = (my..10).step_by(3).count();
        assert_eq!(lv.size(), expect);
        assert_eq!(lv.ndim(), 1);
        assert_eq!(lv.extents(), vec![expect]);
        let indices: Vec<usize> = lv.indices().collect();
        let owned: Vec<usize> = (my..10).step_by(3).collect();
        assert_eq!(indices, owned);
        world.barrier();
    });
}

#[test]
fn local_view_under_blockcyclic() {
    spawn_units(2, |world| {
        let mat = Matrix::<u8, 2>::with_dist(
            world.team(),
            [4, 10],
            [Dist::None, Dist::BlockCyclic(3)],
        );
        let sub1 = mat.sub::<1>(1..9);
        let lv = local(&sub1);
        // blocks of 3: unit 0 owns columns {0,1,2,6,7,8}, unit 1 owns
        // {3,4,5,9}; inside 1..9 that is {1,2,6,7,8} and {3,4,5}
        let expect_cols = if world.my_unit() == 0 { 5 } else { 3 };
        assert_eq!(lv.extents(), vec![4, expect_cols]);
        assert_eq!(lv.size(), 4 * expect_cols);
        assert!(lv.iter().all(|r| r.is_local()));
        world.barrier();
    });
}
