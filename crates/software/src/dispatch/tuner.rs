use crate::fbv::{DISPLAY_WIDTH, DisplayText, FbvCommand};

/// Note letters by the index the effects unit reports, with whether a flat sign goes along.
const NOTES: [(u8, bool); 12] = [
    (b'A', false),
    (b'B', true),
    (b'B', false),
    (b'C', false),
    (b'D', true),
    (b'D', false),
    (b'E', true),
    (b'E', false),
    (b'F', false),
    (b'G', true),
    (b'G', false),
    (b'A', true),
];

/// Readings from `0x10` up to (but excluding) `0x70` are valid; `0x40` is in tune.
const VALID: core::ops::Range<u8> = 0x10..0x70;

/// The left half of the needle lights up below these readings, ...
const FLAT_BELOW: [u8; 8] = [0x1A, 0x20, 0x26, 0x2C, 0x32, 0x38, 0x3E, 0x42];
/// ... the right half above these.
const SHARP_ABOVE: [u8; 8] = [0x3E, 0x41, 0x47, 0x4D, 0x53, 0x59, 0x5F, 0x65];

/// Renders a tuner report (`<note> <string> <needle>`) as the tuner frame and a needle on the display.
pub(super) fn render(payload: &[u8]) -> [FbvCommand; 2] {
    match *payload {
        [note, _string, reading, ..] if VALID.contains(&reading) => {
            let (note, flat) = NOTES.get(usize::from(note)).copied().unwrap_or((b' ', false));
            [FbvCommand::Tuner { note, flat }, FbvCommand::Display(needle(reading))]
        }
        _ => [
            FbvCommand::Tuner {
                note: b' ',
                flat: false,
            },
            FbvCommand::Display([b' '; DISPLAY_WIDTH]),
        ],
    }
}

fn needle(reading: u8) -> DisplayText {
    let mut text = [b' '; DISPLAY_WIDTH];
    let (left, right) = text.split_at_mut(DISPLAY_WIDTH / 2);
    left.iter_mut()
        .zip(FLAT_BELOW)
        .filter(|&(_, threshold)| reading < threshold)
        .for_each(|(c, _)| *c = b')');
    right
        .iter_mut()
        .zip(SHARP_ABOVE)
        .filter(|&(_, threshold)| reading > threshold)
        .for_each(|(c, _)| *c = b'(');
    if reading > 0x3E && reading < 0x42 {
        text[6..10].copy_from_slice(b"-**-");
    }
    text
}
