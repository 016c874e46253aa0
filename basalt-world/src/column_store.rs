use bytemuck::{Pod, Zeroable};

use basalt_core::{MAX_HORIZONTAL_COORD, MAX_VERTICAL_COORD};

use crate::DataError;

/// One stored cell of a column: y coordinate and non-zero id. Matches the
/// 8-byte record of the persisted voxel asset (three trailing pad bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ColumnVoxel {
    pub y: i32,
    pub id: u8,
    _pad: [u8; 3],
}

impl ColumnVoxel {
    pub fn new(y: i32, id: u8) -> Self {
        Self { y, id, _pad: [0; 3] }
    }
}

/// Read-only sparse voxel container.
///
/// A flat array of (y, id) pairs plus a prefix index: column `k = x *
/// size_z + z` occupies `voxels[start_index[k]..start_index[k + 1]]`,
/// sorted strictly ascending by y. Out-of-range (x, z) on the query
/// methods is a programmer error; callers bounds-check.
#[derive(Debug)]
pub struct ColumnStore {
    size_x: u32,
    size_z: u32,
    voxels: Vec<ColumnVoxel>,
    start_index: Vec<u32>,
}

impl ColumnStore {
    pub fn new(
        size_x: u32,
        size_z: u32,
        voxels: Vec<ColumnVoxel>,
        start_index: Vec<u32>,
    ) -> Result<Self, DataError> {
        let columns = size_x as usize * size_z as usize;
        if start_index.len() != columns + 1 {
            return Err(DataError::BadPrefix(format!(
                "expected {} entries, got {}",
                columns + 1,
                start_index.len()
            )));
        }
        if start_index[0] != 0 {
            return Err(DataError::BadPrefix("first entry must be 0".to_string()));
        }
        if start_index.windows(2).any(|w| w[0] > w[1]) {
            return Err(DataError::BadPrefix("entries must be non-decreasing".to_string()));
        }
        if *start_index.last().unwrap() as usize != voxels.len() {
            return Err(DataError::BadPrefix(format!(
                "last entry {} does not match voxel count {}",
                start_index.last().unwrap(),
                voxels.len()
            )));
        }
        Ok(Self {
            size_x,
            size_z,
            voxels,
            start_index,
        })
    }

    /// Builds a store from a surface height map, one id per column.
    ///
    /// For surface height `h` with minimum 4-neighbor height `h_n`
    /// (out-of-range neighbors count as `h - 1`), the column holds every
    /// `y` in `[min(h, h_n + 1), h]`: the surface cell plus the side cells
    /// that remain visible next to a lower neighboring surface. No hidden
    /// interior cells are stored.
    pub fn from_height_map(size_x: u32, size_z: u32, heights: &[i32], ids: &[u8]) -> Self {
        let columns = size_x as usize * size_z as usize;
        assert_eq!(heights.len(), columns);
        assert_eq!(ids.len(), columns);

        let height_at = |x: i32, z: i32, fallback: i32| -> i32 {
            if x < 0 || z < 0 || x >= size_x as i32 || z >= size_z as i32 {
                fallback
            } else {
                heights[x as usize * size_z as usize + z as usize]
            }
        };

        let mut voxels = Vec::new();
        let mut start_index = Vec::with_capacity(columns + 1);
        start_index.push(0);
        for x in 0..size_x as i32 {
            for z in 0..size_z as i32 {
                let k = x as usize * size_z as usize + z as usize;
                let h = heights[k];
                let h_n = height_at(x - 1, z, h - 1)
                    .min(height_at(x + 1, z, h - 1))
                    .min(height_at(x, z - 1, h - 1))
                    .min(height_at(x, z + 1, h - 1));
                let low = h.min(h_n + 1);
                for y in low..=h {
                    voxels.push(ColumnVoxel::new(y, ids[k]));
                }
                start_index.push(voxels.len() as u32);
            }
        }

        Self {
            size_x,
            size_z,
            voxels,
            start_index,
        }
    }

    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    pub fn size_z(&self) -> u32 {
        self.size_z
    }

    pub fn voxels(&self) -> &[ColumnVoxel] {
        &self.voxels
    }

    pub fn start_index(&self) -> &[u32] {
        &self.start_index
    }

    fn column_index(&self, x: u32, z: u32) -> usize {
        debug_assert!(x < self.size_x && z < self.size_z);
        x as usize * self.size_z as usize + z as usize
    }

    /// The (y, id) pairs of column (x, z), ascending by y.
    pub fn column(&self, x: u32, z: u32) -> &[ColumnVoxel] {
        let k = self.column_index(x, z);
        &self.voxels[self.start_index[k] as usize..self.start_index[k + 1] as usize]
    }

    /// Id of the cell at (x, y, z), 0 when absent.
    pub fn get(&self, x: u32, y: i32, z: u32) -> u8 {
        self.find(x, y, z).map_or(0, |v| v.id)
    }

    /// The stored cell at (x, y, z), if any.
    pub fn find(&self, x: u32, y: i32, z: u32) -> Option<ColumnVoxel> {
        let column = self.column(x, z);
        column
            .binary_search_by_key(&y, |v| v.y)
            .ok()
            .map(|i| column[i])
    }

    /// Lowest stored y of column (x, z), `i32::MAX` when the column is
    /// empty.
    pub fn min_y(&self, x: u32, z: u32) -> i32 {
        self.column(x, z).first().map_or(i32::MAX, |v| v.y)
    }

    /// Highest stored y of column (x, z), `i32::MIN` when the column is
    /// empty.
    pub fn max_y(&self, x: u32, z: u32) -> i32 {
        self.column(x, z).last().map_or(i32::MIN, |v| v.y)
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Deep validation, run once at publish before meshing starts: every
    /// id non-zero, every column strictly ascending, every coordinate
    /// within the packed-face bit ranges. Positive faces store their
    /// position shifted +1 along the normal, so stored cells must stay
    /// one short of the field maximum.
    pub fn validate(&self) -> Result<(), DataError> {
        for x in 0..self.size_x {
            for z in 0..self.size_z {
                let column = self.column(x, z);
                if column.is_empty() {
                    continue;
                }
                if x >= MAX_HORIZONTAL_COORD || z >= MAX_HORIZONTAL_COORD {
                    return Err(DataError::CoordinateOutOfRange {
                        x,
                        z,
                        y: column[0].y,
                    });
                }
                for pair in column.windows(2) {
                    if pair[0].y >= pair[1].y {
                        return Err(DataError::UnsortedColumn { x, z });
                    }
                }
                for voxel in column {
                    if voxel.id == 0 {
                        return Err(DataError::ZeroId { x, z, y: voxel.y });
                    }
                    if voxel.y < 0 || voxel.y >= MAX_VERTICAL_COORD as i32 {
                        return Err(DataError::CoordinateOutOfRange { x, z, y: voxel.y });
                    }
                }
            }
        }
        Ok(())
    }
}
