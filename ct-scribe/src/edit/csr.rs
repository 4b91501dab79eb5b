//! 编辑日志的 CSR 风格打包.
//!
//! 所有操作的扁平索引 / 旧值 / 新值首尾相接成三个一维数组, 另用 `slice_idx`
//! 记录每个操作所在切片, `starts` (长度为操作数 + 1) 记录每个操作在拼接数组中的起点,
//! `starts[n]` 为总长度. 这样无论有多少个操作, 归档中都只有五个数组.

use super::{EditOp, HistoryError, HistoryResult};
use crate::Idx3d;
use ndarray::{s, Array1};
use ndarray_npy::{NpzReader, NpzWriter};
use std::io::{Read, Seek, Write};

/// 归档内的数组名.
mod names {
    pub const SLICE_IDX: &str = "slice_idx";
    pub const STARTS: &str = "starts";
    pub const IDXS: &str = "idxs";
    pub const OLD: &str = "old";
    pub const NEW: &str = "new";
}

/// 打包后的编辑日志. 数组类型与 numpy 写出的归档一致.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedLog {
    /// 每个操作所在切片.
    pub slice_idx: Array1<i16>,

    /// 每个操作的起点偏移, 长度为操作数 + 1.
    pub starts: Array1<i64>,

    /// 拼接后的切片内扁平索引.
    pub idxs: Array1<i32>,

    /// 拼接后的旧值.
    pub old: Array1<i16>,

    /// 拼接后的新值.
    pub new: Array1<i16>,
}

impl PackedLog {
    /// 按顺序打包 `ops`.
    pub fn pack(ops: &[EditOp]) -> HistoryResult<Self> {
        let n = ops.len();
        let total: usize = ops.iter().map(EditOp::len).sum();

        let mut slice_idx = Vec::with_capacity(n);
        let mut starts = Vec::with_capacity(n + 1);
        let mut idxs = Vec::with_capacity(total);
        let mut old = Vec::with_capacity(total);
        let mut new = Vec::with_capacity(total);

        let mut cursor = 0i64;
        for op in ops {
            let z = op.slice_idx();
            slice_idx.push(i16::try_from(z).map_err(|_| HistoryError::IndexOverflow(z))?);
            starts.push(cursor);
            for &i in op.flat_idx() {
                idxs.push(i32::try_from(i).map_err(|_| HistoryError::IndexOverflow(i as usize))?);
            }
            old.extend_from_slice(op.old_vals());
            new.extend_from_slice(op.new_vals());
            cursor += op.len() as i64;
        }
        starts.push(cursor);

        Ok(Self {
            slice_idx: Array1::from(slice_idx),
            starts: Array1::from(starts),
            idxs: Array1::from(idxs),
            old: Array1::from(old),
            new: Array1::from(new),
        })
    }

    /// 日志中的操作个数.
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.slice_idx.len()
    }

    /// 解包为操作序列, 并按形状为 `shape` (z, H, W) 的标签体校验所有索引.
    ///
    /// 任何不一致都会返回 [`HistoryError::Corrupt`], 不会产生部分结果.
    pub fn unpack(&self, (len_z, h, w): Idx3d) -> HistoryResult<Vec<EditOp>> {
        let n = self.num_ops();
        if self.starts.len() != n + 1 {
            return Err(corrupt(format!(
                "`starts` has {} entries, expected {}",
                self.starts.len(),
                n + 1
            )));
        }
        let total = self.idxs.len();
        if self.old.len() != total || self.new.len() != total {
            return Err(corrupt(format!(
                "value arrays have lengths {} / {}, expected {total}",
                self.old.len(),
                self.new.len()
            )));
        }

        if self.starts[0] != 0 || self.starts[n] != total as i64 {
            return Err(corrupt(format!(
                "`starts` spans {}..{}, expected 0..{total}",
                self.starts[0], self.starts[n]
            )));
        }

        let slice_size = h * w;
        let mut ops = Vec::with_capacity(n);
        for i in 0..n {
            let (a, b) = (self.starts[i], self.starts[i + 1]);
            if a < 0 || b < a || b as usize > total {
                return Err(corrupt(format!("op {i} has invalid range {a}..{b}")));
            }
            let (a, b) = (a as usize, b as usize);

            let z = self.slice_idx[i];
            let z = usize::try_from(z)
                .ok()
                .filter(|&z| z < len_z)
                .ok_or_else(|| corrupt(format!("op {i} targets slice {z}, volume has {len_z}")))?;

            let flat = self
                .idxs
                .slice(s![a..b])
                .iter()
                .map(|&v| {
                    usize::try_from(v)
                        .ok()
                        .filter(|&v| v < slice_size)
                        .map(|v| v as u32)
                        .ok_or_else(|| corrupt(format!("op {i} has voxel index {v} outside slice")))
                })
                .collect::<HistoryResult<Vec<_>>>()?;
            let old = self.old.slice(s![a..b]).to_vec();
            let new = self.new.slice(s![a..b]).to_vec();

            let op = EditOp::from_parts(z, flat, old, new)
                .ok_or_else(|| corrupt(format!("op {i} is empty")))?;
            ops.push(op);
        }
        Ok(ops)
    }

    /// 以压缩 npz 格式写入 `w`, 返回写完的 `w`. 数组名按 numpy `savez` 的约定带 `.npy` 后缀.
    pub fn write_npz<W: Write + Seek>(&self, w: W) -> HistoryResult<W> {
        let mut npz = NpzWriter::new_compressed(w);
        npz.add_array(entry(names::SLICE_IDX), &self.slice_idx)?;
        npz.add_array(entry(names::STARTS), &self.starts)?;
        npz.add_array(entry(names::IDXS), &self.idxs)?;
        npz.add_array(entry(names::OLD), &self.old)?;
        npz.add_array(entry(names::NEW), &self.new)?;
        Ok(npz.finish()?)
    }

    /// 从 npz 归档读取.
    pub fn read_npz<R: Read + Seek>(r: R) -> HistoryResult<Self> {
        let mut npz = NpzReader::new(r)?;
        let slice_idx: Array1<i16> = npz.by_name(&entry(names::SLICE_IDX))?;
        let starts: Array1<i64> = npz.by_name(&entry(names::STARTS))?;
        let idxs: Array1<i32> = npz.by_name(&entry(names::IDXS))?;
        let old: Array1<i16> = npz.by_name(&entry(names::OLD))?;
        let new: Array1<i16> = npz.by_name(&entry(names::NEW))?;
        Ok(Self {
            slice_idx,
            starts,
            idxs,
            old,
            new,
        })
    }
}

#[inline]
fn entry(name: &str) -> String {
    format!("{name}.npy")
}

#[inline]
fn corrupt(msg: String) -> HistoryError {
    HistoryError::Corrupt(msg)
}
