use tessera::algorithm::{accumulate, accumulate_local, BitOr, Fold, Max, Min, Plus};
use tessera::prelude::*;

fn fill_with_sequence(arr: &Array<i64>, my_unit: usize) {
    // element i holds i + 1
    for (l, elem) in unsafe { arr.local_as_mut_slice() }.iter_mut().enumerate() {
        *elem = arr.pattern().global_at(my_unit, l)[0] as i64 + 1;
    }
    arr.barrier();
}

#[test]
fn accumulate_with_init() {
    // [1..20] with init 10 sums to 220 on any number of units
    for units in [1, 2, 4] {
        spawn_units(units, |world| {
            let arr = Array::<i64>::new(world.team(), 20);
            fill_with_sequence(&arr, world.my_unit());
            let total = accumulate(arr.range(..), 10, Plus);
            assert_eq!(total, 220);
            arr.barrier();
        });
    }
}

#[test]
fn rank1_sequence_sum_is_exact() {
    for units in [1, 3, 5] {
        spawn_units(units, |world| {
            let n = 33;
            let arr = Array::<i64>::new(world.team(), n);
            fill_with_sequence(&arr, world.my_unit());
            let total = accumulate(arr.range(..), 0, Plus);
            assert_eq!(total, (n * (n + 1) / 2) as i64);
            arr.barrier();
        });
    }
}

#[test]
fn accumulate_over_partial_range() {
    spawn_units(3, |world| {
        let arr = Array::<i64>::new(world.team(), 20);
        fill_with_sequence(&arr, world.my_unit());
        // elements 5..15 hold the values 6..=15
        let total = accumulate(arr.range(5..15), 0, Plus);
        assert_eq!(total, (6..=15).sum::<i64>());
        arr.barrier();
    });
}

#[test]
fn accumulate_under_cyclic_distribution() {
    spawn_units(4, |world| {
        let arr = Array::<i64>::with_dist(world.team(), 21, Dist::Cyclic);
        fill_with_sequence(&arr, world.my_unit());
        let total = accumulate(arr.range(..), 0, Plus);
        assert_eq!(total, (21 * 22 / 2) as i64);
        let hi = accumulate(arr.range(..), 0, Max);
        assert_eq!(hi, 21);
        arr.barrier();
    });
}

#[test]
fn units_with_empty_ranges_are_tolerated() {
    // 2 elements over 4 units: units 2 and 3 hold nothing, the custom
    // payload path must skip them
    spawn_units(4, |world| {
        let arr = Array::<i64>::new(world.team(), 2);
        fill_with_sequence(&arr, world.my_unit());
        let product = accumulate(arr.range(..), 1, Fold(|a: i64, b: i64| a * b));
        assert_eq!(product, 2);
        arr.barrier();
    });
}

#[test]
fn empty_global_range_returns_init() {
    spawn_units(2, |world| {
        let arr = Array::<i64>::new(world.team(), 8);
        fill_with_sequence(&arr, world.my_unit());
        let total = accumulate(arr.range(3..3), 41, Plus);
        assert_eq!(total, 41);
        arr.barrier();
    });
}

#[test]
fn local_range_native_allreduce() {
    spawn_units(3, |world| {
        let team = world.team();
        let mine = [world.my_unit() as u64 + 1];
        // 1 + 2 + 3 folded with the native sum, init applied last
        let total = accumulate_local(&mine, 100, Plus, true, &team);
        assert_eq!(total, 106);

        let lows = [world.my_unit() as f64 * 1.5];
        let low = accumulate_local(&lows, f64::MAX, Min, true, &team);
        assert_eq!(low, 0.0);

        let bits = [1u32 << world.my_unit()];
        let mask = accumulate_local(&bits, 0, BitOr, true, &team);
        assert_eq!(mask, 0b111);
    });
}

#[derive(Clone, Copy, PartialEq, Debug)]
struct MinMax {
    lo: i32,
    hi: i32,
}

#[test]
fn custom_element_types_reduce_through_payload() {
    spawn_units(3, |world| {
        let v = world.my_unit() as i32 * 10;
        let mine = [MinMax { lo: v, hi: v }];
        let merge = Fold(|a: MinMax, b: MinMax| MinMax {
            lo: a.lo.min(b.lo),
            hi: a.hi.max(b.hi),
        });
        let init = MinMax { lo: i32::MAX, hi: i32::MIN };
        let spread = accumulate_local(&mine, init, merge, false, &world.team());
        assert_eq!(spread, MinMax { lo: 0, hi: 20 });
    });
}
