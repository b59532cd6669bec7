use std::path::Path;

use anyhow::Result;
use warprando::randomize::{shuffle_warps, ShuffleSession, WarpRandomization};
use warprando::settings::ShuffleSettings;
use warprando::traverse::{check_connectivity, Connectivity};
use warprando_game::{ExitData, RegionData, WarpConnections, WarpData, World, WorldData};
use warprando_logic::GlobalState;

fn add_pair(data: &mut WorldData, ab: &str, a_region: &str, ba: &str, b_region: &str) {
    for (name, parent, destination) in [(ab, a_region, ba), (ba, b_region, ab)] {
        data.warps.push(WarpData {
            name: name.to_string(),
            parent_region: Some(parent.to_string()),
            destination: destination.to_string(),
            one_way: false,
        });
        data.regions
            .iter_mut()
            .find(|r| r.name == parent)
            .unwrap()
            .warps
            .push(name.to_string());
    }
}

fn add_region(data: &mut WorldData, name: &str, exits: &[&str]) {
    data.regions.push(RegionData {
        name: name.to_string(),
        exits: exits.iter().map(|e| ExitData::To(e.to_string())).collect(),
        ..Default::default()
    });
}

// Regions `{Start, A, B, C}` (plus an isolated `D` if requested), warps `AB`/`BA`
// between Start and A, `CD`/`DC` between B and C, and a fixed exit Start -> B.
fn scenario_world(with_isolated_region: bool) -> World {
    let mut data = WorldData {
        start_region: "Start".to_string(),
        ..Default::default()
    };
    add_region(&mut data, "Start", &["B"]);
    add_region(&mut data, "A", &[]);
    add_region(&mut data, "B", &[]);
    add_region(&mut data, "C", &[]);
    if with_isolated_region {
        add_region(&mut data, "D", &[]);
    }
    add_pair(&mut data, "AB", "Start", "BA", "A");
    add_pair(&mut data, "CD", "B", "DC", "C");
    World::build(&data).unwrap()
}

// Two towns joined by a road, each with several buildings, some of which contain a
// further room. Random rotations can easily strand buildings, so rollbacks are common.
fn town_world() -> World {
    let mut data = WorldData {
        start_region: "Town0".to_string(),
        ..Default::default()
    };
    add_region(&mut data, "Town0", &["Road"]);
    add_region(&mut data, "Road", &["Town0", "Town1"]);
    add_region(&mut data, "Town1", &["Road"]);
    for t in 0..2 {
        for b in 0..5 {
            let building = format!("Town{t}House{b}");
            add_region(&mut data, &building, &[]);
            add_pair(
                &mut data,
                &format!("TOWN{t}:{b}/HOUSE{t}{b}:0"),
                &format!("Town{t}"),
                &format!("HOUSE{t}{b}:0/TOWN{t}:{b}"),
                &building,
            );
            if b % 2 == 0 {
                let room = format!("Town{t}House{b}Upstairs");
                add_region(&mut data, &room, &[]);
                add_pair(
                    &mut data,
                    &format!("HOUSE{t}{b}:1/UPSTAIRS{t}{b}:0"),
                    &building,
                    &format!("UPSTAIRS{t}{b}:0/HOUSE{t}{b}:1"),
                    &room,
                );
            }
        }
    }
    World::build(&data).unwrap()
}

fn assert_valid(world: &World, randomization: &WarpRandomization) {
    let conns = connections_from(world, randomization);
    let global = GlobalState::fully_collected(world);
    assert_eq!(
        check_connectivity(world, &conns, &global),
        Connectivity::Connected
    );
    for w in 0..world.warps.len() {
        if randomization.excluded[w] {
            assert_eq!(randomization.destinations[w], world.warps[w].vanilla_destination);
            assert_eq!(randomization.swap_counts[w], 0);
        } else {
            let d = randomization.destinations[w];
            assert_eq!(randomization.destinations[d], w);
            assert!(!randomization.excluded[d]);
        }
    }
}

fn connections_from(world: &World, randomization: &WarpRandomization) -> WarpConnections {
    let mut conns = WarpConnections::new(world);
    for (w, &d) in randomization.destinations.iter().enumerate() {
        conns.redirect(world, w, d);
    }
    conns
}

#[test]
fn committed_states_stay_connected_and_paired() -> Result<()> {
    let world = town_world();
    for seed in 0..5 {
        // The shuffle is deterministic, so a smaller target stops at an earlier committed
        // state of the same run.
        for target_swaps in [1, 2, 5, 10, 40] {
            let settings = ShuffleSettings {
                target_swaps,
                ..Default::default()
            };
            let randomization = shuffle_warps(&world, &settings, seed)?;
            assert!(randomization.num_swaps >= target_swaps);
            assert!(randomization.num_attempts <= settings.panic_limit);
            assert_valid(&world, &randomization);
        }
    }
    Ok(())
}

#[test]
fn shuffle_is_deterministic() -> Result<()> {
    let world = town_world();
    let settings = ShuffleSettings {
        target_swaps: 100,
        ..Default::default()
    };
    let r1 = shuffle_warps(&world, &settings, 12345)?;
    let r2 = shuffle_warps(&world, &settings, 12345)?;
    assert_eq!(r1, r2);
    let r3 = shuffle_warps(&world, &settings, 54321)?;
    assert_ne!(r1.destinations, r3.destinations);
    Ok(())
}

#[test]
fn excluded_warps_keep_vanilla_destinations() -> Result<()> {
    let world = town_world();
    let settings = ShuffleSettings {
        target_swaps: 100,
        excluded_warps: vec![
            "TOWN0:0/HOUSE00:0".to_string(),
            "UPSTAIRS12:0/HOUSE12:1".to_string(),
        ],
        ..Default::default()
    };
    let randomization = shuffle_warps(&world, &settings, 7)?;
    for name in [
        "TOWN0:0/HOUSE00:0",
        "HOUSE00:0/TOWN0:0",
        "HOUSE12:1/UPSTAIRS12:0",
        "UPSTAIRS12:0/HOUSE12:1",
    ] {
        let w = world.warp_isv.index_by_key[name];
        assert!(randomization.excluded[w]);
    }
    assert_eq!(randomization.num_eligible, world.warps.len() - 4);
    assert!(randomization.num_touched > 0);
    assert!(randomization.num_touched <= randomization.num_eligible);
    assert_valid(&world, &randomization);
    Ok(())
}

#[test]
fn shuffle_halts_within_panic_limit() -> Result<()> {
    let world = town_world();
    let settings = ShuffleSettings {
        target_swaps: 1_000_000,
        panic_limit: 300,
        ..Default::default()
    };
    let randomization = shuffle_warps(&world, &settings, 99)?;
    assert!(randomization.num_swaps < settings.target_swaps);
    assert!(randomization.num_attempts <= settings.panic_limit);
    assert_valid(&world, &randomization);
    Ok(())
}

#[test]
fn scenario_rotation_keeps_all_regions_reachable() {
    let world = scenario_world(false);
    let settings = ShuffleSettings::default();
    let session = ShuffleSession::new(&world, &settings, 0).unwrap();
    assert_eq!(session.check(), Connectivity::Connected);

    let warp = |name: &str| world.warp_isv.index_by_key[name];
    let mut conns = session.connections().clone();
    let mut swap_counts = vec![0; world.warps.len()];
    let undo = warprando::randomize::rotation::rotate_warps(
        &world,
        &mut conns,
        &mut swap_counts,
        &[(warp("AB"), warp("BA")), (warp("CD"), warp("DC"))],
    );
    assert_eq!(conns.destination[warp("AB")], warp("DC"));
    assert_eq!(conns.destination[warp("DC")], warp("AB"));
    assert_eq!(conns.destination[warp("CD")], warp("BA"));
    assert_eq!(conns.destination[warp("BA")], warp("CD"));
    let global = GlobalState::fully_collected(&world);
    assert!(check_connectivity(&world, &conns, &global).is_connected());

    undo.undo(&world, &mut conns, &mut swap_counts);
    assert_eq!(&conns, session.connections());
    assert_eq!(swap_counts, vec![0; world.warps.len()]);
}

#[test]
fn scenario_with_unreachable_region_is_rolled_back() -> Result<()> {
    let world = scenario_world(true);
    let settings = ShuffleSettings {
        panic_limit: 200,
        ..Default::default()
    };
    let randomization = shuffle_warps(&world, &settings, 3)?;
    assert_eq!(randomization.num_swaps, 0);
    assert_eq!(randomization.num_attempts, settings.panic_limit);
    assert_eq!(randomization.num_touched, 0);
    for (w, warp) in world.warps.iter().enumerate() {
        assert_eq!(randomization.destinations[w], warp.vanilla_destination);
    }
    Ok(())
}

#[test]
fn malformed_warp_pairs_are_rejected() {
    let mut data = WorldData {
        start_region: "Start".to_string(),
        ..Default::default()
    };
    add_region(&mut data, "Start", &[]);
    add_region(&mut data, "A", &[]);
    add_region(&mut data, "B", &[]);
    add_pair(&mut data, "S:0/A:0", "Start", "A:0/S:0", "A");
    add_pair(&mut data, "S:1/B:0", "Start", "B:0/S:1", "B");
    // Leads into A, but A's warp leads back elsewhere:
    data.warps[2].destination = "A:0/S:0".to_string();
    let world = World::build(&data).unwrap();

    let settings = ShuffleSettings::default();
    let err = shuffle_warps(&world, &settings, 0).unwrap_err();
    assert!(err.to_string().contains("does not lead back"));

    let settings = ShuffleSettings {
        excluded_warps: vec!["S:9/Z:0".to_string()],
        ..Default::default()
    };
    let err = shuffle_warps(&world, &settings, 0).unwrap_err();
    assert!(err.to_string().contains("Unknown excluded warp"));
}

#[test]
fn sample_world_shuffles() -> Result<()> {
    let world = World::load(Path::new("data/sample_world.json"))?;
    let settings =
        warprando::settings::load_shuffle_settings(Path::new("data/default_settings.json"))?;
    let randomization = shuffle_warps(&world, &settings, 2024)?;
    assert_valid(&world, &randomization);

    // One-way, configured, and dangling warps (and their partners) sit out:
    let excluded_cnt = randomization.excluded.iter().filter(|&&x| x).count();
    assert_eq!(excluded_cnt, 5);
    assert_eq!(randomization.num_eligible, world.warps.len() - excluded_cnt);
    Ok(())
}

fn assert_unshuffled(world: &World, randomization: &WarpRandomization) {
    assert_eq!(randomization.num_swaps, 0);
    assert_eq!(randomization.num_attempts, 0);
    assert_eq!(randomization.num_touched, 0);
    for (w, warp) in world.warps.iter().enumerate() {
        assert_eq!(randomization.destinations[w], warp.vanilla_destination);
    }
}

#[test]
fn split_world_is_joined_and_stays_joined() -> Result<()> {
    // U and R only reach each other, so the vanilla wiring leaves both unreachable. Any
    // rotation of the two pairs joins everything, and later rollbacks must restore that.
    let mut data = WorldData {
        start_region: "Start".to_string(),
        ..Default::default()
    };
    add_region(&mut data, "Start", &["X"]);
    add_region(&mut data, "X", &[]);
    add_region(&mut data, "U", &[]);
    add_region(&mut data, "R", &[]);
    add_pair(&mut data, "S0", "Start", "X0", "X");
    add_pair(&mut data, "U0", "U", "R0", "R");
    let world = World::build(&data)?;

    let settings = ShuffleSettings {
        target_swaps: 50,
        ..Default::default()
    };
    for seed in 0..10 {
        let randomization = shuffle_warps(&world, &settings, seed)?;
        assert!(randomization.num_swaps >= settings.target_swaps);
        assert_valid(&world, &randomization);
    }
    Ok(())
}

#[test]
fn single_pair_world_is_left_unshuffled() -> Result<()> {
    let mut data = WorldData {
        start_region: "Start".to_string(),
        ..Default::default()
    };
    add_region(&mut data, "Start", &[]);
    add_region(&mut data, "A", &[]);
    add_pair(&mut data, "S:0/A:0", "Start", "A:0/S:0", "A");
    let world = World::build(&data)?;

    let randomization = shuffle_warps(&world, &ShuffleSettings::default(), 1)?;
    assert_eq!(randomization.num_eligible, 2);
    assert_unshuffled(&world, &randomization);
    Ok(())
}

#[test]
fn world_without_eligible_warps_is_left_unshuffled() -> Result<()> {
    let mut data = WorldData {
        start_region: "Start".to_string(),
        ..Default::default()
    };
    add_region(&mut data, "Start", &[]);
    add_region(&mut data, "A", &[]);
    add_pair(&mut data, "S:0/A:0", "Start", "A:0/S:0", "A");
    data.warps.push(WarpData {
        name: "S:1/A:0".to_string(),
        parent_region: Some("Start".to_string()),
        destination: "A:0/S:0".to_string(),
        one_way: true,
    });
    data.regions[0].warps.push("S:1/A:0".to_string());
    let world = World::build(&data)?;

    let settings = ShuffleSettings {
        excluded_warps: vec!["S:0/A:0".to_string()],
        ..Default::default()
    };
    let randomization = shuffle_warps(&world, &settings, 1)?;
    assert_eq!(randomization.num_eligible, 0);
    assert!(randomization.excluded.iter().all(|&x| x));
    assert_unshuffled(&world, &randomization);
    Ok(())
}

#[test]
fn small_candidate_pool_is_widened() -> Result<()> {
    // With three pairs and two-pair rotations, a committed rotation leaves a single
    // untouched pair at the average swap count, which is too few to rotate.
    let mut data = WorldData {
        start_region: "Hub".to_string(),
        ..Default::default()
    };
    add_region(&mut data, "Hub", &[]);
    for i in 0..3 {
        let leaf = format!("Leaf{i}");
        add_region(&mut data, &leaf, &[]);
        add_pair(
            &mut data,
            &format!("HUB:{i}/LEAF{i}:0"),
            "Hub",
            &format!("LEAF{i}:0/HUB:{i}"),
            &leaf,
        );
    }
    let world = World::build(&data)?;

    let settings = ShuffleSettings {
        target_swaps: 30,
        min_rotation_pairs: 2,
        max_rotation_pairs: 2,
        ..Default::default()
    };
    for seed in 0..5 {
        let randomization = shuffle_warps(&world, &settings, seed)?;
        assert!(randomization.num_swaps >= settings.target_swaps);
        assert!(randomization.num_attempts <= settings.panic_limit);
        assert_eq!(randomization.num_touched, 6);
        assert_valid(&world, &randomization);
    }
    Ok(())
}
