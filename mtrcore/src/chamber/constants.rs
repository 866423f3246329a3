/// number of local trigger boards, numbered 1 to 234
pub const N_LOCAL_BOARDS: usize = 234;

/// number of trigger chambers (MT11, MT12, MT21, MT22)
pub const N_TRIGGER_CHAMBERS: usize = 4;

/// number of RPCs per chamber, numbered 0 to 17
pub const N_RPC: usize = 18;

/// local boards grouped by RPC: the first `N_LO_PER_RPC[0]` entries belong to RPC 0, and so on
pub const LO_RPC: [u32; N_LOCAL_BOARDS] = [
    26, 27, 28, 29, 48, 49, 50, 51, 68, 69, 84, 85, 100, 101, 113,
    9, 10, 11, 30, 31, 32, 33, 52, 53, 54, 55, 70, 71, 86, 87, 102, 103, 114,
    12, 13, 34, 35, 56, 57, 72, 73, 88, 89, 104, 105, 115,
    14, 15, 36, 37, 58, 59, 74, 75, 90, 91, 106, 107, 116,
    16, 38, 60, 76, 92, 108, 117,
    133, 155, 177, 193, 209, 225, 234,
    131, 132, 153, 154, 175, 176, 191, 192, 207, 208, 223, 224, 233,
    129, 130, 151, 152, 173, 174, 189, 190, 205, 206, 221, 222, 232,
    126, 127, 128, 147, 148, 149, 150, 169, 170, 171, 172, 187, 188, 203, 204, 219, 220, 231,
    143, 144, 145, 146, 165, 166, 167, 168, 185, 186, 201, 202, 217, 218, 230,
    123, 124, 125, 139, 140, 141, 142, 161, 162, 163, 164, 183, 184, 199, 200, 215, 216, 229,
    121, 122, 137, 138, 159, 160, 181, 182, 197, 198, 213, 214, 228,
    119, 120, 135, 136, 157, 158, 179, 180, 195, 196, 211, 212, 227,
    118, 134, 156, 178, 194, 210, 226,
    1, 17, 39, 61, 77, 93, 109,
    2, 3, 18, 19, 40, 41, 62, 63, 78, 79, 94, 95, 110,
    4, 5, 20, 21, 42, 43, 64, 65, 80, 81, 96, 97, 111,
    6, 7, 8, 22, 23, 24, 25, 44, 45, 46, 47, 66, 67, 82, 83, 98, 99, 112,
];

/// number of local boards on each RPC
pub const N_LO_PER_RPC: [usize; N_RPC] = [
    15, 18, 13, 13, 7, 7, 13, 13, 18, 15, 18, 13, 13, 7, 7, 13, 13, 18,
];

/// detection element id of a trigger chamber (0 to 3 map to 1100, 1200, 1300, 1400)
pub fn det_elem_id(chamber: usize) -> u32 {
    1000 + 100 * (chamber as u32 + 1)
}

/// inverse of `det_elem_id`, None for anything that is not a trigger chamber
pub fn chamber_of_det_elem(det_elem_id: u32) -> Option<usize> {
    if det_elem_id % 100 != 0 {
        return None;
    }
    match det_elem_id / 100 {
        11..=14 => Some((det_elem_id / 100 - 11) as usize),
        _ => None,
    }
}

/// true if `board` is a valid local board number
pub fn is_valid_board(board: u32) -> bool {
    board >= 1 && board as usize <= N_LOCAL_BOARDS
}
