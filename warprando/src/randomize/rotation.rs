use warprando_game::{WarpConnections, WarpIdx, World};

// A two-way warp and the warp it currently leads to (which leads back to it).
pub type WarpPair = (WarpIdx, WarpIdx);

fn apply_redirects(world: &World, conns: &mut WarpConnections, redirects: &[(WarpIdx, WarpIdx)]) {
    for &(warp_idx, new_destination) in redirects {
        conns.redirect(world, warp_idx, new_destination);
    }
}

/// Shifts the connections of two-way warps over by one in the list of pairs. For example:
///
/// ```text
/// A   C   E          A   C   E
/// |   |   |   --->   |   |   |
/// B   D   F          D   F   B
/// ```
///
/// Each `(AB, BA)` must currently be paired with each other, and no warp may appear twice.
/// Every involved warp has its swap count incremented. The returned [`RotationUndo`] restores
/// the previous wiring and swap counts exactly.
pub fn rotate_warps(
    world: &World,
    conns: &mut WarpConnections,
    swap_counts: &mut [usize],
    pairs: &[WarpPair],
) -> RotationUndo {
    let n = pairs.len();
    let mut redirects: Vec<(WarpIdx, WarpIdx)> = Vec::with_capacity(2 * n);
    for (i, &(ab, ba)) in pairs.iter().enumerate() {
        let ba_next = pairs[(i + 1) % n].1;
        let ab_prev = pairs[(i + n - 1) % n].0;
        redirects.push((ab, ba_next));
        redirects.push((ba, ab_prev));
    }
    apply_redirects(world, conns, &redirects);
    for &(ab, ba) in pairs {
        swap_counts[ab] += 1;
        swap_counts[ba] += 1;
    }
    RotationUndo {
        pairs: pairs.to_vec(),
    }
}

#[must_use]
#[derive(Clone, Debug)]
pub struct RotationUndo {
    pairs: Vec<WarpPair>,
}

impl RotationUndo {
    pub fn pairs(&self) -> &[WarpPair] {
        &self.pairs
    }

    pub fn undo(self, world: &World, conns: &mut WarpConnections, swap_counts: &mut [usize]) {
        let mut redirects: Vec<(WarpIdx, WarpIdx)> = Vec::with_capacity(2 * self.pairs.len());
        for &(ab, ba) in &self.pairs {
            redirects.push((ab, ba));
            redirects.push((ba, ab));
        }
        apply_redirects(world, conns, &redirects);
        for &(ab, ba) in &self.pairs {
            swap_counts[ab] -= 1;
            swap_counts[ba] -= 1;
        }
    }
}
