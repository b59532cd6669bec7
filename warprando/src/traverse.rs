use std::collections::VecDeque;

use warprando_game::{RegionIdx, Requirement, WarpConnections, World};
use warprando_logic::GlobalState;

pub fn apply_requirement(req: &Requirement, global: &GlobalState) -> bool {
    match req {
        Requirement::Free => true,
        Requirement::Never => false,
        Requirement::Item(item_idx) => global.items[*item_idx],
        Requirement::Flag(flag_idx) => global.flags[*flag_idx],
        Requirement::And(reqs) => reqs.iter().all(|r| apply_requirement(r, global)),
        Requirement::Or(reqs) => reqs.iter().any(|r| apply_requirement(r, global)),
    }
}

#[derive(Clone, Debug)]
pub struct TraverseResult {
    pub reachable: Vec<bool>,
    pub num_reachable: usize,
}

impl TraverseResult {
    pub fn unreachable_regions(&self) -> Vec<RegionIdx> {
        (0..self.reachable.len())
            .filter(|&i| !self.reachable[i])
            .collect()
    }
}

/// Breadth-first search from the start region, following fixed exits whose requirements
/// are met by `global`, and every connected warp's current destination.
pub fn traverse(world: &World, conns: &WarpConnections, global: &GlobalState) -> TraverseResult {
    let mut reachable = vec![false; world.regions.len()];
    let mut queue: VecDeque<RegionIdx> = VecDeque::new();
    reachable[world.start_region] = true;
    queue.push_back(world.start_region);
    let mut num_reachable = 1;

    while let Some(region_idx) = queue.pop_front() {
        let region = &world.regions[region_idx];
        let exit_targets = region
            .exits
            .iter()
            .map(|&exit_idx| &world.exits[exit_idx])
            .filter(|exit| apply_requirement(&exit.requirement, global))
            .map(|exit| exit.to);
        let warp_targets = region
            .warps
            .iter()
            .filter_map(|&warp_idx| conns.connected_region(world, warp_idx));
        for dst in exit_targets.chain(warp_targets) {
            if !reachable[dst] {
                reachable[dst] = true;
                num_reachable += 1;
                queue.push_back(dst);
            }
        }
    }

    TraverseResult {
        reachable,
        num_reachable,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    NotConnected { unreachable: Vec<RegionIdx> },
}

impl Connectivity {
    pub fn is_connected(&self) -> bool {
        matches!(self, Connectivity::Connected)
    }
}

pub fn check_connectivity(
    world: &World,
    conns: &WarpConnections,
    global: &GlobalState,
) -> Connectivity {
    let result = traverse(world, conns, global);
    if result.num_reachable == world.regions.len() {
        Connectivity::Connected
    } else {
        Connectivity::NotConnected {
            unreachable: result.unreachable_regions(),
        }
    }
}
