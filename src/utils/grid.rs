//! Sample grid rendering
//!
//! Tiles a batch of generated images into a single picture with white
//! gutters, the way the per-epoch progress images are written.

use std::path::Path;

use tch::{Device, Kind, Tensor};

use crate::error::{Error, Result};

/// Tile `samples` (N, C, H, W) in [0, 1] into one (C, H', W') image
///
/// Images are laid out row-major, `nrow` per row, separated and framed by
/// `padding` pixels of value 1.
pub fn grid_tensor(samples: &Tensor, nrow: i64, padding: i64) -> Result<Tensor> {
    let size = samples.size();
    if size.len() != 4 || size[0] == 0 {
        return Err(Error::shape(&[-1, 3, -1, -1], &size));
    }
    let (n, c, h, w) = (size[0], size[1], size[2], size[3]);

    let cols = nrow.clamp(1, n);
    let rows = (n + cols - 1) / cols;
    let cell_h = h + padding;
    let cell_w = w + padding;

    let grid = Tensor::ones(
        [c, rows * cell_h + padding, cols * cell_w + padding],
        (samples.kind(), samples.device()),
    );
    for i in 0..n {
        let top = (i / cols) * cell_h + padding;
        let left = (i % cols) * cell_w + padding;
        let mut cell = grid.narrow(1, top, h).narrow(2, left, w);
        cell.copy_(&samples.get(i));
    }

    Ok(grid)
}

/// Write generated images in [-1, 1] as a PNG grid
///
/// # Arguments
///
/// * `samples` - Generator output (N, 3, H, W)
/// * `path` - Destination file; the format follows the extension
/// * `nrow` - Images per grid row
pub fn save_sample_grid(samples: &Tensor, path: &Path, nrow: i64) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let unit = ((samples.detach().to_device(Device::Cpu) + 1.0) / 2.0).clamp(0.0, 1.0);
    let grid = grid_tensor(&unit, nrow, 2)?;
    let pixels = (grid * 255.0).round().to_kind(Kind::Uint8);

    tch::vision::image::save(&pixels, path)?;
    Ok(())
}
