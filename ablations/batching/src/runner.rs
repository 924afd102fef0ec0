//! 程序运行函数.

use crate::profile::Profile;
use crate::result::AblationResult;
use lira_grid::classifier::PredictError;
use lira_grid::prelude::*;
use ndarray::{Array2, ArrayView4, Axis};
use std::cell::Cell;
use std::rc::Rc;
use utils::{loader, synthetic};

/// 参与比较的批大小.
pub const BATCH_SIZES: [usize; 4] = [1, 6, 24, 64];

/// 没有真实数据时合成的切片数.
const SYNTHETIC_N: usize = 4;

/// 调用计数.
#[derive(Default)]
struct Calls {
    tiles: Cell<u64>,
    batches: Cell<u64>,
}

/// 以分块的平均颜色打分的替身分类器. 每个分块的输出只取决于该分块本身.
struct ColorStats {
    width: usize,
    calls: Rc<Calls>,
}

impl TileClassifier for ColorStats {
    fn output_width(&self) -> usize {
        self.width
    }

    fn predict(&mut self, batch: ArrayView4<u8>) -> Result<Array2<f32>, PredictError> {
        let n = batch.len_of(Axis(0));
        self.calls.tiles.set(self.calls.tiles.get() + n as u64);
        self.calls.batches.set(self.calls.batches.get() + 1);

        let mut out = Array2::<f32>::zeros((n, self.width));
        for (tile, mut row) in batch.outer_iter().zip(out.outer_iter_mut()) {
            let mut mean = [0f32; 3];
            for (c, m) in mean.iter_mut().enumerate() {
                let channel = tile.index_axis(Axis(2), c);
                *m = channel.iter().map(|&v| v as f32).sum::<f32>() / (255.0 * channel.len() as f32);
            }
            let darkness = 1.0 - mean.iter().sum::<f32>() / 3.0;
            let saturation = mean.iter().fold(0f32, |a, &b| a.max(b)) - mean.iter().fold(1f32, |a, &b| a.min(b));
            for (j, v) in row.iter_mut().enumerate() {
                let center = (j as f32 + 0.5) / self.width as f32;
                *v = (-(darkness - center).powi(2) * 20.0).exp() + 0.1 * saturation * (j % 2) as f32;
            }
        }
        Ok(out)
    }
}

/// 以批大小 `batch_size` 处理全部图像.
fn run_once(
    batch_size: usize,
    images: &dyn ImageSource,
    detections: &[Vec<Detection>],
) -> GridResult<(Profile, Vec<Array2<u8>>)> {
    let calls = Rc::new(Calls::default());
    let classifiers = Classifiers::kramnik(
        Box::new(ColorStats {
            width: 4,
            calls: calls.clone(),
        }),
        Box::new(ColorStats {
            width: 6,
            calls: calls.clone(),
        }),
    )?;
    let params = GridParams {
        batch_size,
        ..GridParams::default()
    };
    let engine = GridEngine::new(params, classifiers)?;
    let mut grids = PredictionGrids::new(
        engine,
        TvChambolle::default(),
        EditingDatasets::<MemoryStore>::in_memory(images.len()),
    );

    let mut profile = Profile::new(batch_size);
    let mut all = Vec::with_capacity(images.len());
    for i in 0..images.len() {
        let image = images.image(i)?;
        profile.image_start();
        let labels = grids.labels_for(image.view(), detections.detections(i))?;
        profile.image_elapsed();
        grids.datasets_mut().persist(i, labels.clone())?;
        all.push(labels);
    }
    profile.count_calls(calls.tiles.get(), calls.batches.get());
    Ok((profile.finish(), all))
}

/// 实际运行.
pub fn run() -> GridResult<AblationResult> {
    let (images, detections): (Box<dyn ImageSource>, Vec<Vec<Detection>>) =
        match loader::image_loader_from_env_or_home() {
            Some(dir) => {
                println!("Loading {} slides from disk...", dir.len());
                (Box::new(dir) as Box<dyn ImageSource>, vec![])
            }
            None => {
                println!("No slide directory found, using {SYNTHETIC_N} synthetic slides...");
                let (imgs, dets) = synthetic::synthetic_set(SYNTHETIC_N, 1600, 2320);
                (Box::new(imgs) as Box<dyn ImageSource>, dets)
            }
        };

    println!("Running ablation studies...");
    let mut profiles = Vec::with_capacity(BATCH_SIZES.len());
    let mut reference: Option<Vec<Array2<u8>>> = None;
    let mut invariant = true;
    for batch_size in BATCH_SIZES {
        let (profile, labels) = run_once(batch_size, images.as_ref(), &detections)?;
        if reference.is_none() {
            reference = Some(labels);
        } else if reference.as_ref() != Some(&labels) {
            invariant = false;
        }
        profiles.push(profile);
    }
    Ok(AblationResult::new(profiles, invariant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_run_is_invariant() {
        let (imgs, dets) = synthetic::synthetic_set(2, 400, 580);
        let (a, la) = run_once(1, &imgs, &dets).unwrap();
        let (b, lb) = run_once(64, &imgs, &dets).unwrap();
        assert_eq!(la, lb);
        assert_eq!(a.tiles(), b.tiles());
        assert!(a.batches() >= b.batches());
        assert_eq!(la[0].dim(), (5, 4));
    }
}
