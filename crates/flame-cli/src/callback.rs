//! The CLI's [`flame_engine::RenderCallback`]: logs progress and writes
//! the final raster of each flame to a PNG.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flame_device::{DeviceError, Raster};
use flame_engine::{RenderCallback, RenderUpdate, Task};

pub struct PngCallback {
    base_output: PathBuf,
    total_frames: u32,
}

impl PngCallback {
    pub fn new(base_output: PathBuf, total_frames: u32) -> Self {
        PngCallback { base_output, total_frames }
    }

    fn path_for(&self, flame_index: u64) -> PathBuf {
        if self.total_frames <= 1 {
            return self.base_output.clone();
        }
        let stem = self.base_output.file_stem().unwrap_or_default().to_string_lossy().into_owned();
        let ext = self.base_output.extension().map(|e| e.to_string_lossy().into_owned());
        let file_name = match ext {
            Some(ext) => format!("{stem}-{flame_index}.{ext}"),
            None => format!("{stem}-{flame_index}"),
        };
        self.base_output.with_file_name(file_name)
    }
}

fn write_png(raster: &Raster, path: &Path) -> anyhow::Result<()> {
    let mut buf = image::RgbaImage::new(raster.width, raster.height);
    for (pixel, dst) in raster.pixels.iter().zip(buf.pixels_mut()) {
        let a = ((pixel >> 24) & 0xFF) as u8;
        let r = ((pixel >> 16) & 0xFF) as u8;
        let g = ((pixel >> 8) & 0xFF) as u8;
        let b = (pixel & 0xFF) as u8;
        *dst = image::Rgba([r, g, b, a]);
    }
    buf.save(path)?;
    Ok(())
}

impl RenderCallback for PngCallback {
    fn on_update(&self, _task: &Arc<Task>, update: RenderUpdate<'_>) {
        if update.is_finished {
            tracing::info!(
                flame_index = update.flame_index,
                quality = update.quality,
                points_plotted = update.points_plotted,
                elapsed_seconds = update.elapsed_seconds,
                "flame finished"
            );
            if let Some(raster) = update.image {
                let path = self.path_for(update.flame_index);
                match write_png(raster, &path) {
                    Ok(()) => tracing::info!(path = %path.display(), "wrote raster"),
                    Err(err) => tracing::error!(%err, path = %path.display(), "failed to write raster"),
                }
            }
        } else {
            tracing::debug!(
                flame_index = update.flame_index,
                quality = update.quality,
                points_plotted = update.points_plotted,
                elapsed_seconds = update.elapsed_seconds,
                has_image = update.image.is_some(),
                "progress"
            );
        }
    }

    fn on_device_error(&self, task: &Arc<Task>, flame_index: u64, error: &DeviceError) {
        tracing::error!(flame_index, %error, "device error, cancelling task");
        task.cancel(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_uses_base_output_verbatim() {
        let cb = PngCallback::new(PathBuf::from("out.png"), 1);
        assert_eq!(cb.path_for(0), PathBuf::from("out.png"));
    }

    #[test]
    fn multi_frame_inserts_index_before_extension() {
        let cb = PngCallback::new(PathBuf::from("out.png"), 3);
        assert_eq!(cb.path_for(2), PathBuf::from("out-2.png"));
    }
}
