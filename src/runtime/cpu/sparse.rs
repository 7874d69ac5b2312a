//! Sparse kernels for the CPU backend
//!
//! Host implementations of the `SparseKernels` contract. SpMV accumulates in
//! f64 for numerical stability regardless of the element type; with the
//! `rayon` feature rows are processed in parallel.

use super::client::CpuClient;
use super::runtime::CpuRuntime;
use crate::buffer::DeviceBuffer;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::sparse::{BcsrData, BlockLayout, CsrData, SparseKernels, SparseStorage, BLOCK_LAYOUT};
use crate::vector::DenseVector;
use std::collections::BTreeSet;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Offset of block element `(bi, bj)` within a `d x d` block
#[inline]
fn block_offset(bi: usize, bj: usize, d: usize) -> usize {
    match BLOCK_LAYOUT {
        BlockLayout::RowMajor => bi * d + bj,
        BlockLayout::ColumnMajor => bj * d + bi,
    }
}

impl SparseKernels<CpuRuntime> for CpuClient {
    fn spmv_csr<T: Element>(
        &self,
        mat: &CsrData<CpuRuntime, T>,
        alpha: T,
        x: &DenseVector<CpuRuntime, T>,
        beta: T,
        y: &mut DenseVector<CpuRuntime, T>,
    ) -> Result<()> {
        let row_offsets = mat.row_offsets().as_slice();
        let col_indices = mat.col_indices().as_slice();
        let values = mat.values().as_slice();
        let xs = x.buffer().as_slice();
        let ys = y.buffer_mut().as_mut_slice();

        let alpha = alpha.to_f64();
        let beta = beta.to_f64();

        let row_dot = |row: usize| -> f64 {
            let start = row_offsets[row] as usize;
            let end = row_offsets[row + 1] as usize;

            let mut sum = 0.0;
            for k in start..end {
                let col = col_indices[k] as usize;
                sum += values[k].to_f64() * xs[col].to_f64();
            }
            sum
        };

        #[cfg(feature = "rayon")]
        ys.par_iter_mut().enumerate().for_each(|(row, out)| {
            *out = T::from_f64(beta * out.to_f64() + alpha * row_dot(row));
        });

        #[cfg(not(feature = "rayon"))]
        for (row, out) in ys.iter_mut().enumerate() {
            *out = T::from_f64(beta * out.to_f64() + alpha * row_dot(row));
        }

        Ok(())
    }

    fn spmv_bcsr<T: Element>(
        &self,
        mat: &BcsrData<CpuRuntime, T>,
        alpha: T,
        x: &DenseVector<CpuRuntime, T>,
        beta: T,
        y: &mut DenseVector<CpuRuntime, T>,
    ) -> Result<()> {
        let d = mat.blockdim();
        let row_offsets = mat.row_offsets().as_slice();
        let col_indices = mat.col_indices().as_slice();
        let values = mat.values().as_slice();
        let xs = x.buffer().as_slice();
        let ys = y.buffer_mut().as_mut_slice();

        let alpha = alpha.to_f64();
        let beta = beta.to_f64();

        let row_dot = |row: usize| -> f64 {
            let br = row / d;
            let bi = row % d;
            let start = row_offsets[br] as usize;
            let end = row_offsets[br + 1] as usize;

            let mut sum = 0.0;
            for j in start..end {
                let bc = col_indices[j] as usize;
                let base = j * d * d;
                for bj in 0..d {
                    let a = values[base + block_offset(bi, bj, d)].to_f64();
                    sum += a * xs[bc * d + bj].to_f64();
                }
            }
            sum
        };

        #[cfg(feature = "rayon")]
        ys.par_iter_mut().enumerate().for_each(|(row, out)| {
            *out = T::from_f64(beta * out.to_f64() + alpha * row_dot(row));
        });

        #[cfg(not(feature = "rayon"))]
        for (row, out) in ys.iter_mut().enumerate() {
            *out = T::from_f64(beta * out.to_f64() + alpha * row_dot(row));
        }

        Ok(())
    }

    fn csr_to_bcsr<T: Element>(
        &self,
        src: &CsrData<CpuRuntime, T>,
        blockdim: usize,
    ) -> Result<BcsrData<CpuRuntime, T>> {
        if blockdim <= 1 {
            return Err(Error::invalid_argument(
                "blockdim",
                format!("must be > 1, got {}", blockdim),
            ));
        }

        let d = blockdim;
        let nrows = src.nrows();
        let ncols = src.ncols();
        // block counts round up; positions outside the element-level shape
        // stay zero-filled (vendor csr2bsr behavior)
        let nrowb = (nrows + d - 1) / d;
        let ncolb = (ncols + d - 1) / d;

        let row_offsets = src.row_offsets().as_slice();
        let col_indices = src.col_indices().as_slice();
        let values = src.values().as_slice();

        let mut out_offsets = vec![0i32; nrowb + 1];
        let mut out_cols: Vec<i32> = Vec::new();
        let mut out_values: Vec<T> = Vec::new();

        for br in 0..nrowb {
            let row_begin = br * d;
            let row_end = (row_begin + d).min(nrows);

            // which block columns does this block row touch
            let mut blocks = BTreeSet::new();
            for r in row_begin..row_end {
                for k in row_offsets[r] as usize..row_offsets[r + 1] as usize {
                    blocks.insert(col_indices[k] as usize / d);
                }
            }

            let slot_base = out_cols.len();
            let blocks: Vec<usize> = blocks.into_iter().collect();
            out_cols.extend(blocks.iter().map(|&bc| bc as i32));
            out_values.resize(out_cols.len() * d * d, T::zero());

            for r in row_begin..row_end {
                let bi = r - row_begin;
                for k in row_offsets[r] as usize..row_offsets[r + 1] as usize {
                    let c = col_indices[k] as usize;
                    let bc = c / d;
                    let slot = slot_base + blocks.binary_search(&bc).expect("block present");
                    let bj = c - bc * d;
                    out_values[slot * d * d + block_offset(bi, bj, d)] = values[k];
                }
            }

            out_offsets[br + 1] = out_cols.len() as i32;
        }

        let device = self.device.clone();
        Ok(BcsrData::from_buffers(
            DeviceBuffer::from_slice(&out_offsets, &device),
            DeviceBuffer::from_slice(&out_cols, &device),
            DeviceBuffer::from_slice(&out_values, &device),
            nrowb,
            ncolb,
            blockdim,
        ))
    }

    fn bcsr_to_csr<T: Element>(
        &self,
        src: &BcsrData<CpuRuntime, T>,
    ) -> Result<CsrData<CpuRuntime, T>> {
        let d = src.blockdim();
        let nrows = src.nrows();
        let ncols = src.ncols();

        let row_offsets = src.row_offsets().as_slice();
        let col_indices = src.col_indices().as_slice();
        let values = src.values().as_slice();

        // every stored block position becomes an entry, explicit zeros kept
        let nnz = src.nnz();
        let mut out_offsets = vec![0i32; nrows + 1];
        let mut out_cols: Vec<i32> = Vec::with_capacity(nnz);
        let mut out_values: Vec<T> = Vec::with_capacity(nnz);

        for row in 0..nrows {
            let br = row / d;
            let bi = row % d;
            for j in row_offsets[br] as usize..row_offsets[br + 1] as usize {
                let bc = col_indices[j] as usize;
                let base = j * d * d;
                for bj in 0..d {
                    out_cols.push((bc * d + bj) as i32);
                    out_values.push(values[base + block_offset(bi, bj, d)]);
                }
            }
            out_offsets[row + 1] = out_cols.len() as i32;
        }

        debug_assert_eq!(out_values.len(), nnz);

        let device = self.device.clone();
        Ok(CsrData::from_buffers(
            DeviceBuffer::from_slice(&out_offsets, &device),
            DeviceBuffer::from_slice(&out_cols, &device),
            DeviceBuffer::from_slice(&out_values, &device),
            nrows,
            ncols,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuDevice;
    use crate::runtime::Runtime;

    fn device() -> CpuDevice {
        CpuDevice::new()
    }

    #[test]
    fn test_spmv_csr_alpha_beta() {
        let device = device();
        let client = CpuRuntime::default_client(&device);

        // [1, 0, 2]
        // [0, 0, 3]
        // [4, 5, 0]
        let mat = CsrData::<CpuRuntime, f64>::from_slices(
            &[0, 2, 3, 5],
            &[0, 2, 2, 0, 1],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            3,
            3,
            &device,
        )
        .unwrap();

        let x = DenseVector::from_slice(&[1.0, 1.0, 1.0], &device);
        let mut y = DenseVector::from_slice(&[10.0, 20.0, 30.0], &device);

        // y = 2 * A * ones + 1 * y
        client.spmv_csr(&mat, 2.0, &x, 1.0, &mut y).unwrap();
        assert_eq!(y.to_vec(), vec![16.0, 26.0, 48.0]);
    }

    #[test]
    fn test_spmv_bcsr_matches_dense() {
        let device = device();
        let client = CpuRuntime::default_client(&device);

        // 4x4 matrix out of three 2x2 blocks at (0,0), (0,1), (1,1):
        // [1  2 | 5  6]
        // [3  4 | 7  8]
        // [0  0 | 9 10]
        // [0  0 |11 12]
        let values: Vec<f64> = (1..=12).map(|v| v as f64).collect();
        let mat = BcsrData::<CpuRuntime, f64>::from_slices(
            &[0, 2, 3],
            &[0, 1, 1],
            &values,
            2,
            2,
            2,
            &device,
        )
        .unwrap();

        let x = DenseVector::from_slice(&[1.0, 2.0, 3.0, 4.0], &device);
        let mut y = DenseVector::zeros(4, &device);
        client.spmv_bcsr(&mat, 1.0, &x, 0.0, &mut y).unwrap();

        assert_eq!(y.to_vec(), vec![44.0, 64.0, 67.0, 81.0]);
    }

    #[test]
    fn test_csr_to_bcsr_pads_partial_blocks() {
        let device = device();
        let client = CpuRuntime::default_client(&device);

        // 3x3 matrix, blockdim 2 -> 2x2 block grid with padding
        // [1, 0, 2]
        // [0, 0, 3]
        // [4, 5, 0]
        let csr = CsrData::<CpuRuntime, f64>::from_slices(
            &[0, 2, 3, 5],
            &[0, 2, 2, 0, 1],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            3,
            3,
            &device,
        )
        .unwrap();

        let bcsr = client.csr_to_bcsr(&csr, 2).unwrap();
        assert_eq!(bcsr.nrowb(), 2);
        assert_eq!(bcsr.ncolb(), 2);
        assert_eq!(bcsr.blockdim(), 2);
        // block row 0 touches block cols 0 and 1; block row 1 touches 0
        assert_eq!(bcsr.row_offsets().to_vec(), vec![0, 2, 3]);
        assert_eq!(bcsr.col_indices().to_vec(), vec![0, 1, 0]);
        assert_eq!(
            bcsr.values().to_vec(),
            vec![
                1.0, 0.0, 0.0, 0.0, // block (0,0)
                2.0, 0.0, 3.0, 0.0, // block (0,1)
                4.0, 5.0, 0.0, 0.0, // block (1,0), padded row
            ]
        );
    }

    #[test]
    fn test_bcsr_to_csr_expansion() {
        let device = device();
        let client = CpuRuntime::default_client(&device);

        let values: Vec<f64> = (1..=8).map(|v| v as f64).collect();
        let bcsr = BcsrData::<CpuRuntime, f64>::from_slices(
            &[0, 1, 2],
            &[0, 1],
            &values,
            2,
            2,
            2,
            &device,
        )
        .unwrap();

        let csr = client.bcsr_to_csr(&bcsr).unwrap();
        assert_eq!(csr.nrows(), 4);
        assert_eq!(csr.ncols(), 4);
        assert_eq!(csr.nnz(), 8);
        assert_eq!(csr.row_offsets().to_vec(), vec![0, 2, 4, 6, 8]);
        assert_eq!(csr.col_indices().to_vec(), vec![0, 1, 0, 1, 2, 3, 2, 3]);
        assert_eq!(
            csr.values().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }

    #[test]
    fn test_conversion_preserves_spmv() {
        let device = device();
        let client = CpuRuntime::default_client(&device);

        let csr = CsrData::<CpuRuntime, f64>::from_slices(
            &[0, 2, 3, 5],
            &[0, 2, 2, 0, 1],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            3,
            3,
            &device,
        )
        .unwrap();
        let bcsr = client.csr_to_bcsr(&csr, 2).unwrap();

        // blocked form is 4x4 (padded); pad x with zero, compare the first
        // three entries of y
        let x = DenseVector::from_slice(&[1.0, -1.0, 2.0, 0.0], &device);
        let mut y_blocked = DenseVector::zeros(4, &device);
        client
            .spmv_bcsr(&bcsr, 1.0, &x, 0.0, &mut y_blocked)
            .unwrap();

        let x3 = DenseVector::from_slice(&[1.0, -1.0, 2.0], &device);
        let mut y = DenseVector::zeros(3, &device);
        client.spmv_csr(&csr, 1.0, &x3, 0.0, &mut y).unwrap();

        let yb = y_blocked.to_vec();
        assert_eq!(&yb[..3], y.to_vec().as_slice());
        assert_eq!(yb[3], 0.0);
    }
}
