pub mod rotation;

use std::cmp::max;

use anyhow::{bail, Result};
use hashbrown::HashSet;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};
use warprando_game::{WarpConnections, WarpIdx, World};
use warprando_logic::GlobalState;

use crate::settings::ShuffleSettings;
use crate::traverse::{check_connectivity, Connectivity};

use self::rotation::{rotate_warps, RotationUndo, WarpPair};

pub fn make_rng(seed: usize) -> rand::rngs::StdRng {
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&seed.to_le_bytes());
    rand::rngs::StdRng::from_seed(rng_seed)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WarpRandomization {
    pub seed: usize,
    // Final destination of every warp, indexed by WarpIdx.
    pub destinations: Vec<WarpIdx>,
    pub swap_counts: Vec<usize>,
    pub excluded: Vec<bool>,
    pub num_swaps: usize,
    pub num_attempts: usize,
    pub num_touched: usize,
    pub num_eligible: usize,
}

impl WarpRandomization {
    pub fn summary(&self) -> String {
        format!(
            "touched {} of {} eligible warps ({} rotations committed in {} attempts)",
            self.num_touched, self.num_eligible, self.num_swaps, self.num_attempts
        )
    }
}

enum Draw {
    Pairs(Vec<WarpPair>),
    // The panic limit was reached while drawing.
    Exhausted,
}

/// Mutable state of a single warp shuffle. It is owned by the shuffle for the duration of
/// the call and consumed into a [`WarpRandomization`] at the end.
pub struct ShuffleSession<'a> {
    world: &'a World,
    settings: &'a ShuffleSettings,
    seed: usize,
    global: GlobalState,
    conns: WarpConnections,
    swap_counts: Vec<usize>,
    excluded: Vec<bool>,
    eligible: Vec<WarpIdx>,
    rng: rand::rngs::StdRng,
    num_attempts: usize,
}

fn get_excluded_warps(
    world: &World,
    conns: &WarpConnections,
    settings: &ShuffleSettings,
) -> Result<Vec<bool>> {
    let mut excluded = vec![false; world.warps.len()];
    for name in &settings.excluded_warps {
        match world.warp_isv.index_by_key.get(name) {
            Some(&warp_idx) => excluded[warp_idx] = true,
            None => bail!("Unknown excluded warp {}", name),
        }
    }
    for (warp_idx, warp) in world.warps.iter().enumerate() {
        if warp.one_way || conns.connected_region(world, warp_idx).is_none() {
            excluded[warp_idx] = true;
        }
    }

    // A warp can only be rotated together with its partner, so it is excluded along with it.
    for warp_idx in 0..world.warps.len() {
        if excluded[warp_idx] {
            continue;
        }
        let partner = conns.destination[warp_idx];
        if excluded[partner] {
            debug!(
                "Excluding {} since its partner {} is excluded",
                world.warp_name(warp_idx),
                world.warp_name(partner)
            );
            excluded[warp_idx] = true;
        } else if partner == warp_idx {
            warn!("Warp {} leads to itself; excluding it", world.warp_name(warp_idx));
            excluded[warp_idx] = true;
        } else if !conns.is_paired(warp_idx) {
            bail!(
                "Warp {} leads to {}, which does not lead back to it",
                world.warp_name(warp_idx),
                world.warp_name(partner)
            );
        }
    }
    Ok(excluded)
}

impl<'a> ShuffleSession<'a> {
    pub fn new(world: &'a World, settings: &'a ShuffleSettings, seed: usize) -> Result<Self> {
        settings.validate()?;
        let conns = WarpConnections::new(world);
        let excluded = get_excluded_warps(world, &conns, settings)?;
        let eligible: Vec<WarpIdx> = (0..world.warps.len()).filter(|&w| !excluded[w]).collect();
        Ok(ShuffleSession {
            world,
            settings,
            seed,
            global: GlobalState::fully_collected(world),
            conns,
            swap_counts: vec![0; world.warps.len()],
            excluded,
            eligible,
            rng: make_rng(seed),
            num_attempts: 0,
        })
    }

    pub fn connections(&self) -> &WarpConnections {
        &self.conns
    }

    pub fn check(&self) -> Connectivity {
        check_connectivity(self.world, &self.conns, &self.global)
    }

    fn unreachable_names(&self, connectivity: &Connectivity) -> Vec<&str> {
        match connectivity {
            Connectivity::Connected => vec![],
            Connectivity::NotConnected { unreachable } => unreachable
                .iter()
                .map(|&r| self.world.region_name(r))
                .collect(),
        }
    }

    // Warps allowed in rotations this iteration, in ascending order for reproducibility.
    fn candidate_warps(&self, max_candidate_swaps: usize) -> Vec<WarpIdx> {
        self.eligible
            .iter()
            .copied()
            .filter(|&w| self.swap_counts[w] <= max_candidate_swaps)
            .collect()
    }

    fn count_candidate_pairs(&self, candidates: &[WarpIdx]) -> usize {
        let mut seen: HashSet<WarpIdx> = HashSet::new();
        let mut cnt = 0;
        for &w in candidates {
            let partner = self.conns.destination[w];
            if seen.contains(&w) || seen.contains(&partner) {
                continue;
            }
            seen.insert(w);
            seen.insert(partner);
            cnt += 1;
        }
        cnt
    }

    fn average_swap_count(&self) -> usize {
        let total: usize = self.eligible.iter().map(|&w| self.swap_counts[w]).sum();
        total / self.eligible.len()
    }

    // Rotations only permute partners among the warps they touch, and every new pair holds a
    // candidate, so `num_available` stays valid for a whole batch.
    fn draw_rotation(&mut self, candidates: &[WarpIdx], num_available: usize) -> Result<Draw> {
        // Varies the number of pairs in the rotation for more diverse outcomes
        let num_pairs = self
            .rng
            .gen_range(self.settings.min_rotation_pairs..=self.settings.max_rotation_pairs)
            .min(num_available);

        let mut warps_in_rotation: HashSet<WarpIdx> = HashSet::new();
        let mut pairs: Vec<WarpPair> = Vec::with_capacity(num_pairs);
        while pairs.len() < num_pairs {
            if self.num_attempts >= self.settings.panic_limit {
                return Ok(Draw::Exhausted);
            }
            self.num_attempts += 1;
            let Some(&ab) = candidates.choose(&mut self.rng) else {
                bail!("Empty candidate pool with {} pairs available", num_available);
            };
            let ba = self.conns.destination[ab];
            if !self.conns.is_paired(ab) || self.excluded[ba] {
                bail!(
                    "Candidate warp {} is not paired with an eligible warp (leads to {})",
                    self.world.warp_name(ab),
                    self.world.warp_name(ba)
                );
            }
            if warps_in_rotation.contains(&ab) || warps_in_rotation.contains(&ba) {
                continue;
            }
            warps_in_rotation.insert(ab);
            warps_in_rotation.insert(ba);
            pairs.push((ab, ba));
        }
        Ok(Draw::Pairs(pairs))
    }

    fn undo_all(&mut self, undo_stack: Vec<RotationUndo>) {
        for undo in undo_stack.into_iter().rev() {
            undo.undo(self.world, &mut self.conns, &mut self.swap_counts);
        }
    }

    pub fn run(mut self) -> Result<WarpRandomization> {
        let seed = self.seed;
        // Connectivity of the last committed state; a rollback must restore exactly this.
        let mut committed = self.check();
        if !committed.is_connected() {
            warn!(
                "[seed {seed}] Not all regions are reachable before shuffling: {:?}",
                self.unreachable_names(&committed)
            );
        }
        if self.count_candidate_pairs(&self.eligible) < 2 {
            info!("[seed {seed}] Fewer than two eligible warp pairs; nothing to shuffle");
            return Ok(self.finish(0));
        }

        // Number of rotations to do before checking connectedness
        let mut group_size: usize = 1;
        // Maximum number of times a warp can already have been swapped to be a candidate
        let mut max_candidate_swaps: usize = 0;
        let mut num_swaps: usize = 0;
        while num_swaps < self.settings.target_swaps
            && self.num_attempts < self.settings.panic_limit
        {
            self.num_attempts += 1;
            let candidates = self.candidate_warps(max_candidate_swaps);
            let num_available = self.count_candidate_pairs(&candidates);
            if num_available < 2 {
                // Too few pairs left at this swap count: widen the pool and try again.
                max_candidate_swaps += 1;
                continue;
            }

            let mut undo_stack: Vec<RotationUndo> = Vec::with_capacity(group_size);
            let mut exhausted = false;
            for _ in 0..group_size {
                match self.draw_rotation(&candidates, num_available)? {
                    Draw::Pairs(pairs) => {
                        undo_stack.push(rotate_warps(
                            self.world,
                            &mut self.conns,
                            &mut self.swap_counts,
                            &pairs,
                        ));
                    }
                    Draw::Exhausted => {
                        exhausted = true;
                        break;
                    }
                }
            }

            // If all regions are reachable, try doing more rotations before the next check and
            // let warps up to the average swap count back into the pool. Otherwise undo the
            // rotations in reverse order, halve the group, and widen the pool to warps that have
            // already been swapped more.
            let connectivity = if exhausted {
                None
            } else {
                Some(self.check())
            };
            if let Some(connectivity) = connectivity.filter(|c| c.is_connected()) {
                committed = connectivity;
                num_swaps += undo_stack.len();
                debug!(
                    "[seed {seed}] committed {} rotations (total {num_swaps}, attempts {})",
                    undo_stack.len(),
                    self.num_attempts
                );
                group_size += 1;
                max_candidate_swaps = self.average_swap_count();
            } else {
                self.undo_all(undo_stack);
                let restored = self.check();
                if restored != committed {
                    bail!(
                        "[seed {seed}] Connectivity changed after rolling back rotations \
                         (unreachable: {:?})",
                        self.unreachable_names(&restored)
                    );
                }
                group_size = max(group_size / 2, 1);
                max_candidate_swaps += 1;
            }
        }

        if num_swaps < self.settings.target_swaps {
            info!(
                "[seed {seed}] Stopping early after {} attempts with {num_swaps}/{} rotations",
                self.num_attempts, self.settings.target_swaps
            );
        }
        Ok(self.finish(num_swaps))
    }

    fn finish(self, num_swaps: usize) -> WarpRandomization {
        let num_touched = self
            .eligible
            .iter()
            .filter(|&&w| self.swap_counts[w] > 0)
            .count();
        let randomization = WarpRandomization {
            seed: self.seed,
            destinations: self.conns.destination,
            swap_counts: self.swap_counts,
            excluded: self.excluded,
            num_swaps,
            num_attempts: self.num_attempts,
            num_touched,
            num_eligible: self.eligible.len(),
        };
        info!("[seed {}] Warp shuffle: {}", randomization.seed, randomization.summary());
        randomization
    }
}

pub fn shuffle_warps(
    world: &World,
    settings: &ShuffleSettings,
    seed: usize,
) -> Result<WarpRandomization> {
    ShuffleSession::new(world, settings, seed)?.run()
}
