use tessera::memoffset::offset_of;
use tessera::prelude::*;
use tessera::view::local;
use tessera::GlobalPtr;

#[test]
fn blocked_matrix_write_then_all_read() {
    spawn_units(2, |world| {
        let nunits = world.num_units();
        let mat = Matrix::<i32, 2>::with_dist(
            world.team(),
            [4 * nunits, 3 * nunits],
            [Dist::None, Dist::Blocked],
        );
        assert_eq!(mat.extents(), [8, 6]);
        assert_eq!(mat.pattern().blocksize(1), 3);
        for j in 0..6 {
            assert_eq!(mat.pattern().unit_at(&[0, j]), usize::from(j >= 3));
        }

        // write by the owning unit
        if world.my_unit() == 1 {
            mat.at([2, 4]).store(42);
        }
        mat.barrier();
        assert_eq!(mat.at([2, 4]).load(), 42);
        mat.barrier();

        // write by the non-owning unit
        if world.my_unit() == 0 {
            mat.at([2, 4]).store(7);
        }
        mat.barrier();
        assert_eq!(mat.at([2, 4]).load(), 7);
        mat.barrier();
    });
}

#[test]
fn local_bounds_match_local_size() {
    spawn_units(3, |world| {
        let mat = Matrix::<u64, 2>::with_dist(
            world.team(),
            [5, 7],
            [Dist::None, Dist::BlockCyclic(2)],
        );
        let diff = unsafe { mat.lend().offset_from(mat.lbegin()) };
        assert_eq!(diff as usize, mat.local_size());
        assert_eq!(mat.local_as_slice().len(), mat.local_size());

        let arr = Array::<u8>::with_dist(world.team(), 11, Dist::Cyclic);
        let diff = unsafe { arr.lend().offset_from(arr.lbegin()) };
        assert_eq!(diff as usize, arr.local_size());
        world.barrier();
    });
}

#[test]
fn tiled_matrix_local_writes_visible_everywhere() {
    spawn_units(4, |world| {
        let mat = Matrix::<i32, 2>::with_teamspec(
            world.team(),
            [4, 4],
            [Dist::Tile(2), Dist::Tile(2)],
            TeamSpec::new([2, 2]),
        );
        // owner computes: every unit writes its elements through the local
        // view, tagged with the canonical linear index
        let mine = local(&mat);
        for (idx, elem) in mine.indices().zip(mine.iter()) {
            assert!(elem.is_local());
            elem.store(idx as i32);
        }
        mat.barrier();
        for i in 0..4 {
            for j in 0..4 {
                let linear = mat.pattern().linear_at(&[i, j]);
                assert_eq!(mat.at([i, j]).load(), linear as i32);
            }
        }
        mat.barrier();
    });
}

#[test]
fn future_round_trip() {
    spawn_units(3, |world| {
        let arr = Array::<u64>::new(world.team(), 9);
        let my = world.my_unit();
        for (l, elem) in unsafe { arr.local_as_mut_slice() }.iter_mut().enumerate() {
            let g = arr.pattern().global_at(my, l)[0];
            *elem = g as u64 * 10;
        }
        arr.barrier();
        for i in 0..arr.size() {
            let mut fut = arr.async_at(i).fetch();
            fut.test();
            let value = fut.get();
            assert_eq!(value, arr.at(i).load());
            assert_eq!(value, i as u64 * 10);
        }
        arr.barrier();
    });
}

#[test]
fn async_store_visible_after_flush() {
    spawn_units(2, |world| {
        let arr = Array::<i64>::new(world.team(), 8);
        if world.my_unit() == 0 {
            // index 5 lives on unit 1
            let aref = arr.async_at(5);
            aref.store(-3);
            aref.flush();
        }
        world.barrier();
        assert_eq!(arr.at(5).load(), -3);
        arr.barrier();

        // container-level flush drains every target unit: each unit stores
        // into the first element of the other unit's block
        let other = 1 - world.my_unit();
        arr.async_at(other * 4).store(99);
        arr.flush();
        world.barrier();
        assert_eq!(arr.at(0).load(), 99);
        assert_eq!(arr.at(4).load(), 99);
        arr.barrier();
    });
}

#[test]
fn global_pointer_arithmetic_walks_units() {
    spawn_units(2, |world| {
        let arr = Array::<u32>::new(world.team(), 8);
        let p0 = arr.at(0).gptr().clone();
        let p5 = arr.at(5).gptr().clone();
        assert_eq!(p0.clone().add(5), p5);
        assert_eq!(p5.offset_from(&p0), 5);
        assert_eq!(p5.sub(5), p0);
        // elements 0..4 live on unit 0, 4..8 on unit 1
        assert_eq!(p0.is_local(), world.my_unit() == 0);
        assert_eq!(p5.is_local(), world.my_unit() == 1);
        assert_eq!(p5.to_local().is_null(), world.my_unit() != 1);

        let null = GlobalPtr::<u32>::null();
        assert!(null.is_null());
        assert!(!null.is_local());
        assert!(null.to_local().is_null());
        assert_ne!(null, p0);
        world.barrier();
    });
}

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Debug)]
struct Particle {
    charge: i32,
    mass: i32,
}

#[test]
fn member_references_rebind_struct_fields() {
    spawn_units(2, |world| {
        let arr = Array::<Particle>::new(world.team(), 4);
        if world.my_unit() == 0 {
            // element 3 is owned by unit 1, store goes remote
            arr.at(3).store(Particle {
                charge: -1,
                mass: 1836,
            });
        }
        arr.barrier();
        let mass = unsafe { arr.at(3).member::<i32>(offset_of!(Particle, mass)) };
        assert_eq!(mass.load(), 1836);
        let charge = unsafe { arr.at(3).member::<i32>(offset_of!(Particle, charge)) };
        assert_eq!(charge.load(), -1);
        assert_eq!(mass.is_local(), world.my_unit() == 1);
        arr.barrier();
    });
}

#[test]
fn swap_exchanges_through_temporary() {
    spawn_units(2, |world| {
        let arr = Array::<u16>::new(world.team(), 4);
        if world.my_unit() == 0 {
            arr.at(0).store(10);
            arr.at(3).store(30);
        }
        arr.barrier();
        if world.my_unit() == 1 {
            tessera::swap(&arr.at(0), &arr.at(3));
        }
        arr.barrier();
        assert_eq!(arr.at(0).load(), 30);
        assert_eq!(arr.at(3).load(), 10);
        arr.barrier();
    });
}
