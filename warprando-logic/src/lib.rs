use serde::{Deserialize, Serialize};
use warprando_game::{FlagIdx, ItemIdx, World};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    pub items: Vec<bool>,
    pub flags: Vec<bool>,
}

impl GlobalState {
    pub fn new(world: &World) -> Self {
        GlobalState {
            items: vec![false; world.item_isv.len()],
            flags: vec![false; world.flag_isv.len()],
        }
    }

    /// State with every item in the pool collected and every event completed. Warp shuffling
    /// checks connectivity against this state only, independent of the order items are found.
    pub fn fully_collected(world: &World) -> Self {
        GlobalState {
            items: vec![true; world.item_isv.len()],
            flags: vec![true; world.flag_isv.len()],
        }
    }

    pub fn collect(&mut self, item_idx: ItemIdx) {
        self.items[item_idx] = true;
    }

    pub fn set_flag(&mut self, flag_idx: FlagIdx) {
        self.flags[flag_idx] = true;
    }
}
