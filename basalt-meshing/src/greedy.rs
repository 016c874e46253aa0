//! Greedy rectangle extraction over one 64x64 face plane.

use crate::bitset::CS;

/// Consumes a plane, emitting maximal-width-then-greedy-height rectangles
/// as `(x, y, width, height)` in plane coordinates (x = width coordinate,
/// bits; y = height coordinate, rows).
///
/// Each rectangle starts at the lowest set bit of the current row and
/// spans the whole contiguous run of bits; it then grows downward while
/// every following row contains the same run, clearing those bits so no
/// face is emitted twice. The plane is left zeroed.
pub(crate) fn pack_plane(rows: &mut [u64], mut emit: impl FnMut(u32, u32, u32, u32)) {
    debug_assert_eq!(rows.len(), CS);
    for y in 0..CS {
        let mut row = rows[y];
        rows[y] = 0;
        while row != 0 {
            let x = row.trailing_zeros();
            let width = (!(row >> x)).trailing_zeros();
            let check_mask = (u64::MAX >> (64 - width)) << x;

            let mut height = 1u32;
            while y + (height as usize) < CS {
                let next = rows[y + height as usize];
                if next & check_mask != check_mask {
                    break;
                }
                rows[y + height as usize] = next & !check_mask;
                height += 1;
            }

            emit(x, y as u32, width, height);
            row &= !check_mask;
        }
    }
}
