//! Coefficient scan orders.
//!
//! A scan maps the i-th coded coefficient to its raster position inside the
//! coded region of a transform (row-major, stride = coded width). Three
//! families exist:
//! - Diagonal (two-dimensional and identity transforms). Square blocks use a
//!   zig-zag, tall blocks walk each anti-diagonal top-down, wide blocks walk
//!   it bottom-up.
//! - Row (vertical one-dimensional transforms): plain raster order.
//! - Column (horizontal one-dimensional transforms): column by column.
//!
//! Transforms with a 64-sample dimension only code their top-left 32x32
//! region, so their scans are built on the clamped size.

use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::types::{TransformClass, TransformSize, TransformType};

/// Scans for one transform size, indexed by transform class.
struct ScanSet {
    diagonal: Box<[u16]>,
    row: Box<[u16]>,
    column: Box<[u16]>,
}

static SCANS: OnceLock<Vec<ScanSet>> = OnceLock::new();

fn scans() -> &'static [ScanSet] {
    SCANS.get_or_init(|| {
        TransformSize::ALL
            .iter()
            .map(|size| {
                let (w, h) = (size.coded_width(), size.coded_height());
                ScanSet {
                    diagonal: diagonal_scan(w, h).into_boxed_slice(),
                    row: row_scan(w, h).into_boxed_slice(),
                    column: column_scan(w, h).into_boxed_slice(),
                }
            })
            .collect()
    })
}

/// Scan order for a transform size and type.
pub fn scan_order(size: TransformSize, tx_type: TransformType) -> &'static [u16] {
    let set = &scans()[size.index()];
    match tx_type.class() {
        TransformClass::TwoD => &set.diagonal,
        TransformClass::Vertical => &set.row,
        TransformClass::Horizontal => &set.column,
    }
}

fn diagonal_scan(w: usize, h: usize) -> Vec<u16> {
    let mut scan = Vec::with_capacity(w * h);
    for d in 0..(w + h - 1) {
        let row_lo = d.saturating_sub(w - 1);
        let row_hi = d.min(h - 1);
        let descending = match w.cmp(&h) {
            Ordering::Equal => d % 2 == 1,
            Ordering::Less => false,
            Ordering::Greater => true,
        };
        for i in 0..=(row_hi - row_lo) {
            let row = if descending { row_hi - i } else { row_lo + i };
            let col = d - row;
            scan.push((row * w + col) as u16);
        }
    }
    scan
}

fn row_scan(w: usize, h: usize) -> Vec<u16> {
    (0..(w * h) as u16).collect()
}

fn column_scan(w: usize, h: usize) -> Vec<u16> {
    let mut scan = Vec::with_capacity(w * h);
    for col in 0..w {
        for row in 0..h {
            scan.push((row * w + col) as u16);
        }
    }
    scan
}
