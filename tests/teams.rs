use tessera::prelude::*;
use tessera::{BlockedArch, SharedCounter, StridedArch};

#[test]
fn strided_sub_team_runs_its_own_collectives() {
    spawn_units(4, |world| {
        let team = world.team();
        let evens = team.sub_team(&StridedArch::new(0, 2, 2)).unwrap();
        assert_eq!(evens.size(), 2);
        assert_eq!(evens.units(), &[0, 2]);
        assert_eq!(evens.is_member(), world.my_unit() % 2 == 0);

        if evens.is_member() {
            let arr = Array::<u32>::new(evens.clone(), 6);
            assert_eq!(arr.local_size(), 3);
            let my_team_unit = evens.unit_id().unwrap() as u32;
            unsafe { arr.local_as_mut_slice() }.fill(my_team_unit);
            arr.barrier();
            // element 5 lives on the second member, global unit 2
            assert_eq!(arr.at(5).load(), 1);
            arr.barrier();
        }
        world.barrier();
    });
}

#[test]
fn blocked_sub_team_nests() {
    spawn_units(4, |world| {
        let team = world.team();
        let front = team.sub_team(&BlockedArch::new(0, 3)).unwrap();
        assert_eq!(front.units(), &[0, 1, 2]);
        assert_eq!(front.parent().unwrap().size(), 4);

        if front.is_member() {
            let pair = front.sub_team(&BlockedArch::new(1, 2)).unwrap();
            assert_eq!(pair.units(), &[1, 2]);
            if pair.is_member() {
                pair.barrier();
            }
        }
        world.barrier();
    });
}

#[test]
fn invalid_arch_is_rejected_on_every_unit() {
    spawn_units(2, |world| {
        let team = world.team();
        let err = team.sub_team(&BlockedArch::new(1, 4)).unwrap_err();
        assert_eq!(err.team_size, 2);
        assert!(team.sub_team(&StridedArch::new(0, 3, 2)).is_err());
        // no collective happened above; the team is still usable
        team.barrier();
    });
}

#[test]
fn shared_counter_folds_all_slots() {
    spawn_units(3, |world| {
        let counter = SharedCounter::<i64>::new(world.team());
        counter.inc(world.my_unit() as i64 + 1);
        counter.barrier();
        assert_eq!(counter.get(), 6);
        counter.barrier();

        counter.dec(1);
        counter.barrier();
        assert_eq!(counter.get(), 3);
        counter.barrier();
    });
}

#[test]
fn world_metadata_agrees() {
    let units = spawn_units(3, |world| {
        assert_eq!(world.num_units(), 3);
        assert_eq!(world.team().size(), 3);
        assert_eq!(world.team().unit_id(), Some(world.my_unit()));
        world.barrier();
        world.my_unit()
    });
    assert_eq!(units, vec![0, 1, 2]);
}
