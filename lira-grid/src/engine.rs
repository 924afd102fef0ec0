//! 批量推理引擎: 分块 -> 路由 -> 双分类器推理 -> 原始预测网格.

use crate::classifier::{ClassifierKind, Classifiers, Deployment};
use crate::consts::{class, CLASS_N};
use crate::routing::{Detection, RoutingMask};
use crate::tissue::{detect_tissue, Contour};
use crate::{GridError, GridParams, GridResult, Subsections};
use ndarray::{Array2, Array3, ArrayView3};

/// 原始预测网格生成器.
///
/// 生成的网格形状为 `(rows, cols, CLASS_N)`. 被跳过的分块保持 `[0, 0, 0, 1, 0, 0, 0]`,
/// 即背景类别的 one-hot 向量.
pub struct GridEngine {
    params: GridParams,
    classifiers: Classifiers,
}

impl GridEngine {
    /// 校验参数并构建引擎.
    pub fn new(params: GridParams, classifiers: Classifiers) -> GridResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            classifiers,
        })
    }

    /// 生成参数.
    #[inline]
    pub fn params(&self) -> &GridParams {
        &self.params
    }

    /// 部署模式.
    #[inline]
    pub fn deployment(&self) -> Deployment {
        self.classifiers.deployment()
    }

    /// 先做组织区域检测, 再生成原始预测网格.
    pub fn generate(
        &mut self,
        image: ArrayView3<u8>,
        detections: &[Detection],
    ) -> GridResult<Array3<f32>> {
        self.generate_with_progress(image, detections, |_| {})
    }

    /// 同 [`GridEngine::generate`], 附带进度回调.
    pub fn generate_with_progress<F: FnMut(u8)>(
        &mut self,
        image: ArrayView3<u8>,
        detections: &[Detection],
        on_progress: F,
    ) -> GridResult<Array3<f32>> {
        let contours = detect_tissue(image, &self.params.tissue)?;
        if contours.is_empty() {
            log::warn!("no tissue contour found, every tile will be classified");
        }
        self.raw_grid(image, detections, &contours, on_progress)
    }

    /// 在给定组织轮廓下生成原始预测网格.
    ///
    /// 先处理全部病灶分块, 再处理全部通用分块, 每组内按索引升序、以 `batch_size`
    /// 为单位推理. 任一批次失败 (分类器报错或输出形状不符) 都会立即返回错误,
    /// 不产生部分结果.
    ///
    /// `on_progress` 收到的百分比单调不减, 成功时最后一次恰为 100.
    pub fn raw_grid<F: FnMut(u8)>(
        &mut self,
        image: ArrayView3<u8>,
        detections: &[Detection],
        contours: &[Contour],
        mut on_progress: F,
    ) -> GridResult<Array3<f32>> {
        let GridParams {
            sub_h,
            sub_w,
            batch_size,
            ..
        } = self.params;
        let tiles = Subsections::new(image, sub_h, sub_w)?;
        if tiles.channels() != 3 {
            return Err(GridError::InvalidParams("image must have 3 channels"));
        }
        if tiles.is_empty() {
            let &[height, width, _] = image.shape() else {
                unreachable!()
            };
            return Err(GridError::ImageTooSmall {
                height,
                width,
                sub_h,
                sub_w,
            });
        }
        let geom = *tiles.geometry();

        let detections: &[Detection] = if self.deployment().uses_lesion_classifier() {
            detections
        } else {
            if !detections.is_empty() {
                log::warn!(
                    "{} detection(s) ignored: no lesion classifier in {} deployment",
                    detections.len(),
                    self.deployment()
                );
            }
            &[]
        };
        let mask = RoutingMask::build(&geom, detections, contours);
        log::debug!(
            "routing {}x{} tiles: {} lesion, {} general, {} skipped",
            geom.rows(),
            geom.cols(),
            mask.lesion().len(),
            mask.general().len(),
            mask.skip().len()
        );

        let mut grid = Array2::<f32>::zeros((geom.len(), CLASS_N));
        grid.column_mut(class::EMPTY_SLIDE as usize).fill(1.0);

        let total = mask.classified_len();
        let mut done = 0;
        for (kind, indices) in [
            (ClassifierKind::Lesion, mask.lesion()),
            (ClassifierKind::General, mask.general()),
        ] {
            if indices.is_empty() {
                continue;
            }
            let (classifier, remap) = self.classifiers.get_mut(kind)?;
            for chunk in indices.chunks(batch_size) {
                let batch = tiles.batch(chunk)?;
                let out = classifier
                    .predict(batch.view())
                    .map_err(GridError::Classifier)?;
                let expected = (chunk.len(), remap.native_width);
                if out.dim() != expected {
                    return Err(GridError::ClassifierOutput {
                        expected,
                        found: out.dim(),
                    });
                }
                for (native, &idx) in out.outer_iter().zip(chunk) {
                    remap.scatter(native, grid.row_mut(idx))?;
                }

                done += chunk.len();
                log::debug!("{kind} batch of {} done ({done}/{total})", chunk.len());
                on_progress(percent(done, total));
            }
        }
        if total == 0 {
            on_progress(100);
        }

        let (rows, cols) = geom.shape();
        Ok(grid.into_shape((rows, cols, CLASS_N))?)
    }
}

#[inline]
fn percent(done: usize, total: usize) -> u8 {
    (done * 100 / total.max(1)).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{PredictError, TileClassifier};
    use ndarray::{s, Array3, ArrayView4};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// 调用记录: `(输出宽度, 批大小)`, 按调用先后排列.
    type CallLog = Rc<RefCell<Vec<(usize, usize)>>>;

    /// 输出 `tile[0, 0, 0] + j`, 并记录每次调用.
    struct Echo {
        width: usize,
        calls: CallLog,
    }

    impl Echo {
        fn boxed(width: usize) -> (Box<dyn TileClassifier>, CallLog) {
            let calls = CallLog::default();
            (Echo::sharing(width, &calls), calls)
        }

        /// 多个分类器共用同一份记录, 用于检查调用顺序.
        fn sharing(width: usize, calls: &CallLog) -> Box<dyn TileClassifier> {
            Box::new(Echo {
                width,
                calls: calls.clone(),
            })
        }
    }

    fn tiles_sent(calls: &CallLog) -> usize {
        calls.borrow().iter().map(|&(_, n)| n).sum()
    }

    impl TileClassifier for Echo {
        fn output_width(&self) -> usize {
            self.width
        }

        fn predict(&mut self, batch: ArrayView4<u8>) -> Result<Array2<f32>, PredictError> {
            let n = batch.shape()[0];
            self.calls.borrow_mut().push((self.width, n));
            Ok(Array2::from_shape_fn((n, self.width), |(i, j)| {
                batch[(i, 0, 0, 0)] as f32 + j as f32
            }))
        }
    }

    struct Failing(usize);

    impl TileClassifier for Failing {
        fn output_width(&self) -> usize {
            self.0
        }

        fn predict(&mut self, _: ArrayView4<u8>) -> Result<Array2<f32>, PredictError> {
            Err("device lost".into())
        }
    }

    /// 返回的行数比批次少一行.
    struct Short(usize);

    impl TileClassifier for Short {
        fn output_width(&self) -> usize {
            self.0
        }

        fn predict(&mut self, batch: ArrayView4<u8>) -> Result<Array2<f32>, PredictError> {
            Ok(Array2::zeros((batch.shape()[0] - 1, self.0)))
        }
    }

    /// 每个像素的值为其所在分块的线性索引.
    fn indexed_image(rows: usize, cols: usize, sub_h: usize, sub_w: usize) -> Array3<u8> {
        Array3::from_shape_fn((rows * sub_h, cols * sub_w, 3), |(y, x, _)| {
            ((y / sub_h) * cols + x / sub_w) as u8
        })
    }

    fn kramnik_engine(params: GridParams) -> GridEngine {
        let (lesion, _) = Echo::boxed(4);
        let (general, _) = Echo::boxed(6);
        let classifiers = Classifiers::kramnik(lesion, general).unwrap();
        GridEngine::new(params, classifiers).unwrap()
    }

    #[test]
    fn test_end_to_end_3x2() {
        let img = indexed_image(3, 2, 80, 145);
        assert_eq!(img.dim(), (240, 290, 3));
        let mut engine = kramnik_engine(GridParams::default());
        let det = [Detection::new(0.0, 0.0, 145.0, 80.0)];
        let grid = engine.raw_grid(img.view(), &det, &[], |_| {}).unwrap();

        assert_eq!(grid.dim(), (3, 2, CLASS_N));
        // 病灶分块 (0, 0): 原生 [0, 1, 2, 3] -> {0, 1, 3, 5}.
        assert_eq!(
            grid.slice(s![0, 0, ..]).to_vec(),
            vec![0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0]
        );
        // 通用分块 (0, 1), 索引 1: 原生 [1..=6] -> {0, 2, 3, 4, 5, 6}.
        assert_eq!(
            grid.slice(s![0, 1, ..]).to_vec(),
            vec![1.0, 0.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(grid[(2, 1, 0)], 5.0);
    }

    #[test]
    fn test_batch_size_does_not_change_result() {
        let img = indexed_image(5, 7, 8, 6);
        let det = [
            Detection::new(0.0, 0.0, 12.0, 16.0),
            Detection::new(30.0, 24.0, 42.0, 40.0),
        ];

        let mut grids = vec![];
        for batch_size in [1, 6, 24] {
            let params = GridParams {
                batch_size,
                ..GridParams::with_tile(8, 6)
            };
            let (lesion, lesion_calls) = Echo::boxed(4);
            let (general, general_calls) = Echo::boxed(6);
            let classifiers = Classifiers::kramnik(lesion, general).unwrap();
            let mut engine = GridEngine::new(params, classifiers).unwrap();
            grids.push(engine.raw_grid(img.view(), &det, &[], |_| {}).unwrap());

            assert_eq!(tiles_sent(&lesion_calls) + tiles_sent(&general_calls), 35);
            assert!(lesion_calls
                .borrow()
                .iter()
                .chain(general_calls.borrow().iter())
                .all(|&(_, n)| n <= batch_size));
        }
        assert_eq!(grids[0], grids[1]);
        assert_eq!(grids[0], grids[2]);
    }

    #[test]
    fn test_lesion_batches_run_first() {
        let img = indexed_image(4, 5, 10, 10);
        let params = GridParams {
            batch_size: 2,
            ..GridParams::with_tile(10, 10)
        };
        let calls = CallLog::default();
        let classifiers =
            Classifiers::kramnik(Echo::sharing(4, &calls), Echo::sharing(6, &calls)).unwrap();
        let mut engine = GridEngine::new(params, classifiers).unwrap();
        // 左上 2x2 与右下 1x2 共 6 个病灶分块, 分散在网格首尾.
        let det = [
            Detection::new(0.0, 0.0, 20.0, 20.0),
            Detection::new(30.0, 30.0, 50.0, 40.0),
        ];
        engine.raw_grid(img.view(), &det, &[], |_| {}).unwrap();

        let calls = calls.borrow();
        let widths: Vec<usize> = calls.iter().map(|&(w, _)| w).collect();
        let lesion_batches = widths.iter().take_while(|&&w| w == 4).count();
        assert_eq!(lesion_batches, 3);
        assert!(widths[lesion_batches..].iter().all(|&w| w == 6));
        assert_eq!(calls.iter().map(|&(_, n)| n).sum::<usize>(), 20);
    }

    #[test]
    fn test_skipped_tiles_stay_background() {
        let img = indexed_image(3, 2, 80, 145);
        let mut engine = kramnik_engine(GridParams::default());
        // 只覆盖左上 2x2 分块的角点.
        let contour = Contour::new(vec![(0.0, 0.0), (150.0, 0.0), (150.0, 90.0), (0.0, 90.0)]);
        let grid = engine.raw_grid(img.view(), &[], &[contour], |_| {}).unwrap();
        for c in 0..2 {
            assert_eq!(
                grid.slice(s![2, c, ..]).to_vec(),
                vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
            );
        }
        assert_eq!(grid[(1, 1, 0)], 3.0);
    }

    #[test]
    fn test_balbc_ignores_detections() {
        crate::init_test_logger();
        let img = indexed_image(3, 2, 80, 145);
        let (general, calls) = Echo::boxed(5);
        let classifiers = Classifiers::balbc(general).unwrap();
        let mut engine = GridEngine::new(GridParams::default(), classifiers).unwrap();
        let det = [Detection::new(0.0, 0.0, 145.0, 80.0)];
        let grid = engine.raw_grid(img.view(), &det, &[], |_| {}).unwrap();

        assert_eq!(tiles_sent(&calls), 6);
        // 原生 [0, 1, 2, 3, 4] -> 补 0 -> {0, 2, 3, 4, 5, 6}.
        assert_eq!(
            grid.slice(s![0, 0, ..]).to_vec(),
            vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_progress_monotonic() {
        let img = indexed_image(4, 5, 10, 10);
        let params = GridParams {
            batch_size: 3,
            ..GridParams::with_tile(10, 10)
        };
        let mut engine = kramnik_engine(params);
        let det = [Detection::new(0.0, 0.0, 20.0, 20.0)];
        let mut seen = vec![];
        engine
            .raw_grid(img.view(), &det, &[], |p| seen.push(p))
            .unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));

        // 全部跳过时也会报告 100.
        let far = Contour::new(vec![(1000.0, 1000.0), (1100.0, 1000.0), (1100.0, 1100.0)]);
        let mut seen = vec![];
        engine
            .raw_grid(img.view(), &[], &[far], |p| seen.push(p))
            .unwrap();
        assert_eq!(seen, vec![100]);
    }

    #[test]
    fn test_classifier_failure_aborts() {
        let img = indexed_image(3, 2, 80, 145);
        let (lesion, _) = Echo::boxed(4);
        let classifiers = Classifiers::kramnik(lesion, Box::new(Failing(6))).unwrap();
        let mut engine = GridEngine::new(GridParams::default(), classifiers).unwrap();
        let mut seen = vec![];
        let err = engine
            .raw_grid(img.view(), &[], &[], |p| seen.push(p))
            .unwrap_err();
        assert!(matches!(err, GridError::Classifier(_)));
        assert!(seen.is_empty());

        let (lesion, _) = Echo::boxed(4);
        let classifiers = Classifiers::kramnik(lesion, Box::new(Short(6))).unwrap();
        let mut engine = GridEngine::new(GridParams::default(), classifiers).unwrap();
        let err = engine.raw_grid(img.view(), &[], &[], |_| {}).unwrap_err();
        assert!(matches!(
            err,
            GridError::ClassifierOutput {
                expected: (6, 6),
                found: (5, 6)
            }
        ));
    }

    #[test]
    fn test_image_too_small() {
        let img = Array3::<u8>::zeros((79, 300, 3));
        let mut engine = kramnik_engine(GridParams::default());
        assert!(matches!(
            engine.raw_grid(img.view(), &[], &[], |_| {}),
            Err(GridError::ImageTooSmall { height: 79, .. })
        ));
    }

    #[test]
    fn test_generate_runs_tissue_detection() {
        crate::init_test_logger();
        // 纯白玻片: 没有组织轮廓, 所有分块都走通用分类器.
        let img = Array3::<u8>::from_elem((160, 290, 3), 245);
        let (lesion, _) = Echo::boxed(4);
        let (general, calls) = Echo::boxed(6);
        let classifiers = Classifiers::kramnik(lesion, general).unwrap();
        let mut engine = GridEngine::new(GridParams::default(), classifiers).unwrap();
        let grid = engine.generate(img.view(), &[]).unwrap();
        assert_eq!(grid.dim(), (2, 2, CLASS_N));
        assert_eq!(tiles_sent(&calls), 4);
    }
}
