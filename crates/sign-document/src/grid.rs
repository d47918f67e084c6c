//! Cut-sheet grid layout
//!
//! Cells have the finished size of an artifact and touch each other, so a
//! single cut separates two neighbours. The grid is centered in the space
//! left inside the page margins.

use log::info;
use sign_render::SizeMm;

use crate::types::{DocumentError, Orientation, PaperSize, Result};

/// Placement of finished-size cells on one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub orientation: Orientation,
    pub page: SizeMm,
    pub cell: SizeMm,
    pub cols: usize,
    pub rows: usize,
    /// Left edge of the first column
    pub offset_x_mm: f32,
    /// Top edge of the first row, measured from the top of the page
    pub offset_y_mm: f32,
}

/// Columns and rows of `cell` that fit into `page` inside the margins
fn count_cells(page: SizeMm, cell: SizeMm, margin_h: f32, margin_v: f32) -> (usize, usize) {
    let avail_w = page.width - 2.0 * margin_h;
    let avail_h = page.height - 2.0 * margin_v;
    if avail_w <= 0.0 || avail_h <= 0.0 {
        return (0, 0);
    }
    (
        (avail_w / cell.width).floor() as usize,
        (avail_h / cell.height).floor() as usize,
    )
}

impl GridLayout {
    /// Lay out `cell` on `paper`, picking the orientation that holds more cells.
    ///
    /// Portrait wins ties.
    pub fn fit(paper: PaperSize, cell: SizeMm, margin_h_mm: f32, margin_v_mm: f32) -> Result<Self> {
        if cell.width <= 0.0 || cell.height <= 0.0 {
            return Err(DocumentError::Config(format!(
                "Cell size must be positive, got {}x{}mm",
                cell.width, cell.height
            )));
        }
        if margin_h_mm < 0.0 || margin_v_mm < 0.0 {
            return Err(DocumentError::Config(
                "Page margins must not be negative".to_string(),
            ));
        }

        let portrait = paper.oriented(Orientation::Portrait);
        let landscape = paper.oriented(Orientation::Landscape);
        let (pc, pr) = count_cells(portrait, cell, margin_h_mm, margin_v_mm);
        let (lc, lr) = count_cells(landscape, cell, margin_h_mm, margin_v_mm);

        let (orientation, page, cols, rows) = if lc * lr > pc * pr {
            (Orientation::Landscape, landscape, lc, lr)
        } else {
            (Orientation::Portrait, portrait, pc, pr)
        };
        if cols == 0 || rows == 0 {
            return Err(DocumentError::Config(format!(
                "A {}x{}mm artifact does not fit on a {}x{}mm page with {}mm/{}mm margins",
                cell.width, cell.height, portrait.width, portrait.height, margin_h_mm, margin_v_mm
            )));
        }

        let excess_w = page.width - 2.0 * margin_h_mm - cols as f32 * cell.width;
        let excess_h = page.height - 2.0 * margin_v_mm - rows as f32 * cell.height;
        let grid = Self {
            orientation,
            page,
            cell,
            cols,
            rows,
            offset_x_mm: margin_h_mm + excess_w / 2.0,
            offset_y_mm: margin_v_mm + excess_h / 2.0,
        };
        info!(
            "Cut-sheet layout: {}x{} = {} per page ({}, {}mm/{}mm margins)",
            cols,
            rows,
            grid.per_page(),
            orientation.name(),
            margin_h_mm,
            margin_v_mm
        );
        Ok(grid)
    }

    pub fn per_page(&self) -> usize {
        self.cols * self.rows
    }

    /// Pages needed for `count` artifacts
    pub fn pages_for(&self, count: usize) -> usize {
        count.div_ceil(self.per_page())
    }

    /// Top-left corner of cell `slot` (row-major), in mm from the top-left page corner
    pub fn cell_origin(&self, slot: usize) -> (f32, f32) {
        let slot = slot % self.per_page();
        let col = slot % self.cols;
        let row = slot / self.cols;
        (
            self.offset_x_mm + col as f32 * self.cell.width,
            self.offset_y_mm + row as f32 * self.cell.height,
        )
    }

    /// Bottom-left corner of cell `slot` in PDF coordinates (mm, y up)
    pub fn cell_origin_pdf(&self, slot: usize) -> (f32, f32) {
        let (x, top) = self.cell_origin(slot);
        (x, self.page.height - top - self.cell.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_cells_on_a4() {
        let grid = GridLayout::fit(PaperSize::A4, SizeMm::new(45.0, 45.0), 10.0, 10.0).unwrap();
        assert_eq!(grid.orientation, Orientation::Portrait);
        assert_eq!((grid.cols, grid.rows), (4, 6));
        assert_eq!(grid.per_page(), 24);
        // 190 - 180 = 10mm excess, 277 - 270 = 7mm excess
        assert!((grid.offset_x_mm - 15.0).abs() < 1e-4);
        assert!((grid.offset_y_mm - 13.5).abs() < 1e-4);
    }

    #[test]
    fn test_cells_fill_rows_first() {
        let grid = GridLayout::fit(PaperSize::A4, SizeMm::new(45.0, 45.0), 10.0, 10.0).unwrap();
        assert_eq!(grid.cell_origin(0), (15.0, 13.5));
        assert_eq!(grid.cell_origin(1), (60.0, 13.5));
        assert_eq!(grid.cell_origin(4), (15.0, 58.5));
        assert_eq!(grid.cell_origin(24), grid.cell_origin(0));

        let (x, y) = grid.cell_origin_pdf(0);
        assert_eq!(x, 15.0);
        assert!((y - (297.0 - 13.5 - 45.0)).abs() < 1e-4);
    }

    #[test]
    fn test_pages_for() {
        let grid = GridLayout::fit(PaperSize::A4, SizeMm::new(45.0, 45.0), 10.0, 10.0).unwrap();
        assert_eq!(grid.pages_for(0), 0);
        assert_eq!(grid.pages_for(24), 1);
        assert_eq!(grid.pages_for(25), 2);
    }
}
