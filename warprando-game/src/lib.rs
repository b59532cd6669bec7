// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

use anyhow::{bail, ensure, Context, Result};
use hashbrown::HashMap;
use json::JsonValue;
use log::warn;
use serde::{Deserialize, Serialize};
use std::borrow::ToOwned;
use std::hash::Hash;
use std::path::Path;

pub type RegionIdx = usize; // Index into World.regions: distinct region names from the world data
pub type ExitIdx = usize; // Index into World.exits: fixed one-way connections between regions
pub type WarpIdx = usize; // Index into World.warps: distinct warp names from the world data
pub type ItemIdx = usize; // Index into World.item_isv.keys: collectible items in the pool
pub type FlagIdx = usize; // Index into World.flag_isv.keys: events placed in regions

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Free,
    Never,
    Item(ItemIdx),
    Flag(FlagIdx),
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
}

impl Requirement {
    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                return Requirement::Never;
            } else if let Requirement::Free = req {
                continue;
            } else if let Requirement::And(and_reqs) = req {
                out_reqs.extend(and_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Free
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::And(out_reqs)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                continue;
            } else if let Requirement::Free = req {
                return Requirement::Free;
            } else if let Requirement::Or(or_reqs) = req {
                out_reqs.extend(or_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Never
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::Or(out_reqs)
        }
    }
}

// Declarative world data, as loaded from JSON:

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct WorldData {
    pub start_region: String,
    #[serde(default)]
    pub items: Vec<String>,
    pub regions: Vec<RegionData>,
    #[serde(default)]
    pub warps: Vec<WarpData>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct RegionData {
    pub name: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub exits: Vec<ExitData>,
    #[serde(default)]
    pub warps: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum ExitData {
    To(String),
    Gated {
        to: String,
        requires: Vec<serde_json::Value>,
    },
}

impl ExitData {
    pub fn target(&self) -> &str {
        match self {
            ExitData::To(to) => to,
            ExitData::Gated { to, .. } => to,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct WarpData {
    pub name: String,
    // Warps without a parent region exist in the game data but lead nowhere reachable.
    pub parent_region: Option<String>,
    pub destination: String,
    #[serde(default)]
    pub one_way: bool,
}

// Structural graph, built once from `WorldData`:

#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    pub events: Vec<FlagIdx>,
    pub exits: Vec<ExitIdx>,
    pub warps: Vec<WarpIdx>,
}

#[derive(Clone, Debug)]
pub struct Exit {
    pub name: String,
    pub from: RegionIdx,
    pub to: RegionIdx,
    pub requirement: Requirement,
}

#[derive(Clone, Debug)]
pub struct Warp {
    pub name: String,
    pub parent: Option<RegionIdx>,
    pub vanilla_destination: WarpIdx,
    pub one_way: bool,
}

#[derive(Clone, Debug, Default)]
pub struct World {
    pub region_isv: IndexedVec<String>,
    pub regions: Vec<Region>,
    pub exits: Vec<Exit>,
    pub warp_isv: IndexedVec<String>,
    pub warps: Vec<Warp>,
    pub item_isv: IndexedVec<String>,
    pub flag_isv: IndexedVec<String>,
    pub start_region: RegionIdx,
}

fn read_world_data(path: &Path) -> Result<WorldData> {
    let world_str = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    let world_data: WorldData = serde_json::from_str(&world_str)
        .with_context(|| format!("unable to parse {}", path.display()))?;
    Ok(world_data)
}

impl World {
    pub fn load(path: &Path) -> Result<World> {
        let world_data = read_world_data(path)?;
        World::build(&world_data)
            .with_context(|| format!("invalid world data in {}", path.display()))
    }

    pub fn build(data: &WorldData) -> Result<World> {
        let mut world = World::default();
        world.load_names(data)?;
        world.load_warps(data)?;
        world.load_regions(data)?;
        world.start_region = *world
            .region_isv
            .index_by_key
            .get(&data.start_region)
            .with_context(|| format!("Unknown start region {}", data.start_region))?;
        Ok(world)
    }

    fn load_names(&mut self, data: &WorldData) -> Result<()> {
        for region_data in &data.regions {
            if self.region_isv.index_by_key.contains_key(&region_data.name) {
                bail!("Duplicate region name {}", region_data.name);
            }
            self.region_isv.add(&region_data.name);
        }
        for item_name in &data.items {
            self.item_isv.add(item_name);
        }
        for region_data in &data.regions {
            for event_name in &region_data.events {
                if self.item_isv.index_by_key.contains_key(event_name) {
                    bail!("Event {} has the same name as an item", event_name);
                }
                self.flag_isv.add(event_name);
            }
        }
        for warp_data in &data.warps {
            if self.warp_isv.index_by_key.contains_key(&warp_data.name) {
                bail!("Duplicate warp name {}", warp_data.name);
            }
            self.warp_isv.add(&warp_data.name);
        }
        Ok(())
    }

    fn load_warps(&mut self, data: &WorldData) -> Result<()> {
        for warp_data in &data.warps {
            let parent = match &warp_data.parent_region {
                Some(region_name) => Some(
                    *self
                        .region_isv
                        .index_by_key
                        .get(region_name)
                        .with_context(|| {
                            format!(
                                "Unknown parent region {} of warp {}",
                                region_name, warp_data.name
                            )
                        })?,
                ),
                None => None,
            };
            let vanilla_destination = *self
                .warp_isv
                .index_by_key
                .get(&warp_data.destination)
                .with_context(|| {
                    format!(
                        "Unknown destination {} of warp {}",
                        warp_data.destination, warp_data.name
                    )
                })?;
            self.warps.push(Warp {
                name: warp_data.name.clone(),
                parent,
                vanilla_destination,
                one_way: warp_data.one_way,
            });
        }
        Ok(())
    }

    fn load_regions(&mut self, data: &WorldData) -> Result<()> {
        for (region_idx, region_data) in data.regions.iter().enumerate() {
            let mut region = Region {
                name: region_data.name.clone(),
                events: region_data
                    .events
                    .iter()
                    .map(|e| self.flag_isv.index_by_key[e])
                    .collect(),
                exits: vec![],
                warps: vec![],
            };

            for exit_data in &region_data.exits {
                let target = exit_data.target();
                let to = *self.region_isv.index_by_key.get(target).with_context(|| {
                    format!("Unknown exit target {} in region {}", target, region_data.name)
                })?;
                let requirement = match exit_data {
                    ExitData::To(_) => Requirement::Free,
                    ExitData::Gated { requires, .. } => {
                        let mut req_json_list: Vec<JsonValue> = vec![];
                        for req in requires {
                            let req_str = req.to_string();
                            let req_json = json::parse(&req_str).with_context(|| {
                                format!(
                                    "Error parsing requires of exit {} -> {}",
                                    region_data.name, target
                                )
                            })?;
                            req_json_list.push(req_json);
                        }
                        Requirement::make_and(self.parse_requires_list(&req_json_list).with_context(
                            || format!("Processing exit {} -> {}", region_data.name, target),
                        )?)
                    }
                };
                region.exits.push(self.exits.len());
                self.exits.push(Exit {
                    name: format!("{} -> {}", region_data.name, target),
                    from: region_idx,
                    to,
                    requirement,
                });
            }

            for warp_name in &region_data.warps {
                let warp_idx = *self.warp_isv.index_by_key.get(warp_name).with_context(|| {
                    format!("Unknown warp {} in region {}", warp_name, region_data.name)
                })?;
                ensure!(
                    self.warps[warp_idx].parent == Some(region_idx),
                    "Warp {} is listed in region {} but its parent region differs",
                    warp_name,
                    region_data.name
                );
                region.warps.push(warp_idx);
            }
            self.regions.push(region);
        }

        for (warp_idx, warp) in self.warps.iter().enumerate() {
            if let Some(parent) = warp.parent {
                ensure!(
                    self.regions[parent].warps.contains(&warp_idx),
                    "Warp {} is not listed in its parent region {}",
                    warp.name,
                    self.regions[parent].name
                );
            }
        }
        Ok(())
    }

    fn parse_requires_list(&self, req_jsons: &[JsonValue]) -> Result<Vec<Requirement>> {
        let mut reqs: Vec<Requirement> = Vec::new();
        for req_json in req_jsons {
            reqs.push(
                self.parse_requirement(req_json)
                    .with_context(|| format!("Processing requirement {req_json}"))?,
            );
        }
        Ok(reqs)
    }

    fn parse_requirement(&self, req_json: &JsonValue) -> Result<Requirement> {
        if let Some(value) = req_json.as_str() {
            if value == "never" {
                return Ok(Requirement::Never);
            } else if value == "free" {
                return Ok(Requirement::Free);
            } else if let Some(&item_idx) = self.item_isv.index_by_key.get(value) {
                return Ok(Requirement::Item(item_idx));
            } else if let Some(&flag_idx) = self.flag_isv.index_by_key.get(value) {
                return Ok(Requirement::Flag(flag_idx));
            }
            bail!("Unknown item or event {}", value);
        } else if req_json.is_object() && req_json.len() == 1 {
            let (key, value) = req_json.entries().next().unwrap();
            ensure!(value.is_array(), "Expected a list in {}", req_json);
            if key == "or" {
                return Ok(Requirement::make_or(
                    self.parse_requires_list(value.members().as_slice())?,
                ));
            } else if key == "and" {
                return Ok(Requirement::make_and(
                    self.parse_requires_list(value.members().as_slice())?,
                ));
            }
        }
        bail!("Unable to parse requirement {}", req_json);
    }

    pub fn region_name(&self, region_idx: RegionIdx) -> &str {
        &self.regions[region_idx].name
    }

    pub fn warp_name(&self, warp_idx: WarpIdx) -> &str {
        &self.warps[warp_idx].name
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Edge {
    Exit(ExitIdx),
    Warp(WarpIdx),
}

/// Current wiring of warps: the destination of every warp, plus the incoming edges of every
/// region. This is the only part of the graph that changes during warp shuffling.
///
/// Entrance lists are kept sorted, so that redirecting a warp and then redirecting it back
/// leaves them identical to how they started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WarpConnections {
    pub destination: Vec<WarpIdx>,
    pub entrances: Vec<Vec<Edge>>,
}

impl WarpConnections {
    pub fn new(world: &World) -> Self {
        let mut conns = WarpConnections {
            destination: world.warps.iter().map(|w| w.vanilla_destination).collect(),
            entrances: vec![vec![]; world.regions.len()],
        };
        for (exit_idx, exit) in world.exits.iter().enumerate() {
            conns.add_entrance(exit.to, Edge::Exit(exit_idx));
        }
        for warp_idx in 0..world.warps.len() {
            match conns.connected_region(world, warp_idx) {
                Some(region_idx) => conns.add_entrance(region_idx, Edge::Warp(warp_idx)),
                None => {
                    if world.warps[warp_idx].parent.is_some() {
                        warn!(
                            "Warp {} leads to {}, which has no parent region; \
                             leaving it unconnected",
                            world.warps[warp_idx].name,
                            world.warp_name(world.warps[warp_idx].vanilla_destination)
                        );
                    }
                }
            }
        }
        conns
    }

    /// Region that `warp_idx` currently leads into, if it is connected at all.
    pub fn connected_region(&self, world: &World, warp_idx: WarpIdx) -> Option<RegionIdx> {
        world.warps[warp_idx].parent?;
        world.warps[self.destination[warp_idx]].parent
    }

    pub fn is_paired(&self, warp_idx: WarpIdx) -> bool {
        self.destination[self.destination[warp_idx]] == warp_idx
    }

    pub fn redirect(&mut self, world: &World, warp_idx: WarpIdx, new_destination: WarpIdx) {
        if let Some(old_region) = self.connected_region(world, warp_idx) {
            let list = &mut self.entrances[old_region];
            if let Ok(pos) = list.binary_search(&Edge::Warp(warp_idx)) {
                list.remove(pos);
            }
        }
        self.destination[warp_idx] = new_destination;
        if let Some(new_region) = self.connected_region(world, warp_idx) {
            self.add_entrance(new_region, Edge::Warp(warp_idx));
        }
    }

    fn add_entrance(&mut self, region_idx: RegionIdx, edge: Edge) {
        let list = &mut self.entrances[region_idx];
        if let Err(pos) = list.binary_search(&edge) {
            list.insert(pos, edge);
        }
    }
}
