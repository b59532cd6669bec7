use serde::{Deserialize, Serialize};
use warprando_game::World;

use crate::randomize::WarpRandomization;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerWarp {
    pub name: String,
    pub region: Option<String>,
    pub vanilla_destination: String,
    pub destination: String,
    pub connected_region: Option<String>,
    // Warp label as consumed by patching: source half of this warp's name, followed by the
    // destination half of its destination's name.
    pub label: String,
    pub swap_count: usize,
    pub excluded: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerSummary {
    pub num_swaps: usize,
    pub num_attempts: usize,
    pub num_touched: usize,
    pub num_eligible: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpoilerLog {
    pub seed: usize,
    pub summary: SpoilerSummary,
    pub warps: Vec<SpoilerWarp>,
}

/// Warp names have the form `SOURCE/DESTINATION`. A name without a `/` is used whole for
/// either half.
pub fn get_warp_label(warp_name: &str, destination_name: &str) -> String {
    let src = warp_name.split('/').next().unwrap_or(warp_name);
    let dst = destination_name.split('/').nth(1).unwrap_or(destination_name);
    format!("{src}/{dst}")
}

pub fn get_spoiler_log(world: &World, randomization: &WarpRandomization) -> SpoilerLog {
    let warps = world
        .warps
        .iter()
        .enumerate()
        .map(|(warp_idx, warp)| {
            let destination = randomization.destinations[warp_idx];
            let destination_warp = &world.warps[destination];
            let connected_region = match (warp.parent, destination_warp.parent) {
                (Some(_), Some(r)) => Some(world.region_name(r).to_string()),
                _ => None,
            };
            SpoilerWarp {
                name: warp.name.clone(),
                region: warp.parent.map(|r| world.region_name(r).to_string()),
                vanilla_destination: world.warp_name(warp.vanilla_destination).to_string(),
                destination: destination_warp.name.clone(),
                connected_region,
                label: get_warp_label(&warp.name, &destination_warp.name),
                swap_count: randomization.swap_counts[warp_idx],
                excluded: randomization.excluded[warp_idx],
            }
        })
        .collect();
    SpoilerLog {
        seed: randomization.seed,
        summary: SpoilerSummary {
            num_swaps: randomization.num_swaps,
            num_attempts: randomization.num_attempts,
            num_touched: randomization.num_touched,
            num_eligible: randomization.num_eligible,
        },
        warps,
    }
}
