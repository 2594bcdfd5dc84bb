use crate::fbv::id;

/// Identifiers of the effect blocks the unit reports on. Only those with a place on the floor controller are named.
#[allow(missing_docs)]
pub mod block_id {
    pub const COMP1: u16 = 100;
    pub const REVERB1: u16 = 110;
    pub const DELAY1: u16 = 112;
    pub const CHORUS1: u16 = 116;
    pub const FLANGER1: u16 = 118;
    pub const ROTARY1: u16 = 120;
    pub const PHASER1: u16 = 122;
    pub const WAH1: u16 = 124;
    pub const VOLUME1: u16 = 127;
    pub const TREMOLO1: u16 = 128;
    pub const PITCH1: u16 = 130;
    pub const FILTER1: u16 = 131;
    pub const DRIVE1: u16 = 133;

    /// Lowest block identifier the unit uses.
    pub const FIRST: u16 = 100;
    /// Highest block identifier the unit uses (`VOLUME4`).
    pub const LAST: u16 = 168;
}

const BLOCK_COUNT: usize = (block_id::LAST - block_id::FIRST + 1) as usize;

const fn block_table() -> [Option<u8>; BLOCK_COUNT] {
    const fn slot(block: u16) -> usize {
        (block - block_id::FIRST) as usize
    }

    let mut table = [None; BLOCK_COUNT];
    table[slot(block_id::COMP1)] = Some(id::FX_LOOP);
    table[slot(block_id::REVERB1)] = Some(id::REVERB);
    table[slot(block_id::DELAY1)] = Some(id::DELAY);
    table[slot(block_id::CHORUS1)] = Some(id::STOMP2);
    table[slot(block_id::FLANGER1)] = Some(id::STOMP1);
    table[slot(block_id::ROTARY1)] = Some(id::MODULATION);
    table[slot(block_id::PHASER1)] = Some(id::AMP1);
    table[slot(block_id::WAH1)] = Some(id::WAH_BUTTON);
    table[slot(block_id::VOLUME1)] = Some(id::VOLUME_BUTTON);
    table[slot(block_id::TREMOLO1)] = Some(id::PITCH);
    table[slot(block_id::PITCH1)] = Some(id::AMP2);
    table[slot(block_id::FILTER1)] = Some(id::CHAN_FAV);
    table[slot(block_id::DRIVE1)] = Some(id::STOMP3);
    table
}

static BLOCK_TO_CONTROL: [Option<u8>; BLOCK_COUNT] = block_table();

/// Looks up the physical control an effect block is assigned to.
///
/// Returns `None` for blocks without an assignment as well as for identifiers outside the range the unit uses.
pub fn control_for_block(block: u16) -> Option<u8> {
    let slot = usize::from(block.checked_sub(block_id::FIRST)?);
    BLOCK_TO_CONTROL.get(slot).copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_blocks() {
        assert_eq!(Some(id::DELAY), control_for_block(block_id::DELAY1), "Expected left but got right");
        assert_eq!(Some(id::REVERB), control_for_block(block_id::REVERB1), "Expected left but got right");
        assert_eq!(Some(id::WAH_BUTTON), control_for_block(block_id::WAH1), "Expected left but got right");
        assert_eq!(Some(id::VOLUME_BUTTON), control_for_block(127), "Expected left but got right");
    }

    #[test]
    fn unused_blocks() {
        // COMP2, REVERB2 and VOLUME4
        for block in [101, 111, 168] {
            assert_eq!(None, control_for_block(block), "Block {} should be unused", block);
        }
    }

    #[test]
    fn out_of_range_blocks() {
        for block in [0, 99, 169, u16::MAX] {
            assert_eq!(None, control_for_block(block), "Block {} should be unmapped", block);
        }
    }

    #[test]
    fn thirteen_assignments() {
        let assigned = (block_id::FIRST..=block_id::LAST)
            .filter_map(control_for_block)
            .count();
        assert_eq!(13, assigned, "Expected left but got right");
    }
}
