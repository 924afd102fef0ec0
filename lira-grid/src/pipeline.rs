//! 整组图像的预测网格生成流程.
//!
//! 对每张图像依次执行: 原始网格 -> 去噪 -> argmax -> 同时写入编辑前/编辑后两份副本.

use crate::denoise::{Denoiser, TvChambolle};
use crate::grid::{argmax_labels, EditingDatasets, GridStore};
use crate::progress::{Flag, UserProgress};
use crate::routing::Detection;
use crate::{GridEngine, GridError, GridResult};
use image::RgbImage;
use ndarray::{Array2, Array3, ArrayView3};
use std::path::{Path, PathBuf};

/// 可按索引随机访问的图像集合.
pub trait ImageSource {
    /// 图像总数.
    fn len(&self) -> usize;

    /// 是否没有图像?
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 读取第 `index` 张图像, `(H, W, 3)`.
    fn image(&self, index: usize) -> GridResult<Array3<u8>>;

    /// 第 `index` 张图像的名称, 用于统计与输出文件名.
    fn name(&self, index: usize) -> String;
}

impl ImageSource for [Array3<u8>] {
    #[inline]
    fn len(&self) -> usize {
        <[Array3<u8>]>::len(self)
    }

    fn image(&self, index: usize) -> GridResult<Array3<u8>> {
        self.get(index)
            .cloned()
            .ok_or(GridError::ImageIndexOutOfRange {
                index,
                len: <[Array3<u8>]>::len(self),
            })
    }

    #[inline]
    fn name(&self, index: usize) -> String {
        index.to_string()
    }
}

impl ImageSource for Vec<Array3<u8>> {
    #[inline]
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    fn image(&self, index: usize) -> GridResult<Array3<u8>> {
        self.as_slice().image(index)
    }

    #[inline]
    fn name(&self, index: usize) -> String {
        self.as_slice().name(index)
    }
}

/// 目录中的图像文件, 按文件名排序.
///
/// 只收录扩展名为 png/jpg/jpeg/tif/tiff/bmp (不区分大小写) 的文件.
/// 图像在访问时才解码.
#[derive(Clone, Debug)]
pub struct ImageDir {
    files: Vec<PathBuf>,
}

/// [`ImageDir`] 收录的扩展名.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

impl ImageDir {
    /// 扫描目录 `dir` (不递归).
    pub fn open<P: AsRef<Path>>(dir: P) -> GridResult<Self> {
        let mut files = vec![];
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| {
                    IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str())
                });
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort_unstable_by(|a, b| a.file_name().cmp(&b.file_name()));
        log::info!("found {} image(s) in {}", files.len(), dir.as_ref().display());
        Ok(Self { files })
    }

    /// 全部图像文件路径.
    #[inline]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl ImageSource for ImageDir {
    #[inline]
    fn len(&self) -> usize {
        self.files.len()
    }

    fn image(&self, index: usize) -> GridResult<Array3<u8>> {
        let path = self.files.get(index).ok_or(GridError::ImageIndexOutOfRange {
            index,
            len: self.len(),
        })?;
        rgb_to_array(image::open(path)?.to_rgb8())
    }

    fn name(&self, index: usize) -> String {
        self.files
            .get(index)
            .and_then(|p| p.file_stem())
            .map_or_else(|| index.to_string(), |s| s.to_string_lossy().into_owned())
    }
}

/// `RgbImage` -> `(H, W, 3)` 数组, 不复制像素.
pub fn rgb_to_array(img: RgbImage) -> GridResult<Array3<u8>> {
    let (w, h) = img.dimensions();
    Ok(Array3::from_shape_vec(
        (h as usize, w as usize, 3),
        img.into_raw(),
    )?)
}

/// `(H, W, 3)` 数组 -> `RgbImage`. 通道数不为 3 时返回 `None`.
pub fn array_to_rgb(arr: ArrayView3<u8>) -> Option<RgbImage> {
    let &[h, w, c] = arr.shape() else {
        unreachable!()
    };
    if c != 3 {
        return None;
    }
    RgbImage::from_raw(w as u32, h as u32, arr.iter().copied().collect())
}

/// 每张图像的病灶检测框.
pub trait DetectionSource {
    /// 第 `index` 张图像的检测框. 没有记录时返回空切片.
    fn detections(&self, index: usize) -> &[Detection];
}

impl DetectionSource for [Vec<Detection>] {
    #[inline]
    fn detections(&self, index: usize) -> &[Detection] {
        self.get(index).map(Vec::as_slice).unwrap_or_default()
    }
}

impl DetectionSource for Vec<Vec<Detection>> {
    #[inline]
    fn detections(&self, index: usize) -> &[Detection] {
        self.as_slice().detections(index)
    }
}

/// 没有任何检测框 (例如单分类器模式).
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDetections;

impl DetectionSource for NoDetections {
    #[inline]
    fn detections(&self, _: usize) -> &[Detection] {
        &[]
    }
}

/// 整组图像的预测网格生成器.
pub struct PredictionGrids<S, D = TvChambolle> {
    engine: GridEngine,
    denoiser: D,
    datasets: EditingDatasets<S>,
}

impl<S: GridStore, D: Denoiser> PredictionGrids<S, D> {
    /// 组装.
    pub fn new(engine: GridEngine, denoiser: D, datasets: EditingDatasets<S>) -> Self {
        Self {
            engine,
            denoiser,
            datasets,
        }
    }

    /// 推理引擎.
    #[inline]
    pub fn engine_mut(&mut self) -> &mut GridEngine {
        &mut self.engine
    }

    /// 编辑前/编辑后两份标签网格.
    #[inline]
    pub fn datasets(&self) -> &EditingDatasets<S> {
        &self.datasets
    }

    /// 同 [`PredictionGrids::datasets`], 可变. 人工编辑结果通过它写回 `after`.
    #[inline]
    pub fn datasets_mut(&mut self) -> &mut EditingDatasets<S> {
        &mut self.datasets
    }

    /// 拆出两份标签网格.
    #[inline]
    pub fn into_datasets(self) -> EditingDatasets<S> {
        self.datasets
    }

    /// 对单张图像生成最终标签网格, 不持久化.
    pub fn labels_for(
        &mut self,
        image: ArrayView3<u8>,
        detections: &[Detection],
    ) -> GridResult<Array2<u8>> {
        self.labels_with_progress(image, detections, |_| {})
    }

    fn labels_with_progress<F: FnMut(u8)>(
        &mut self,
        image: ArrayView3<u8>,
        detections: &[Detection],
        on_progress: F,
    ) -> GridResult<Array2<u8>> {
        let raw = self
            .engine
            .generate_with_progress(image, detections, on_progress)?;
        let weight = self.engine.params().denoising_weight;
        let smooth = self.denoiser.denoise(raw.view(), weight);
        Ok(argmax_labels(smooth.view()))
    }

    /// 依次处理 `images` 中的每张图像, 并把结果写入两份副本.
    ///
    /// `progress.model` 必须与推理引擎的部署模式一致, 否则返回
    /// [`GridError::DeploymentMismatch`], 不做任何推理.
    ///
    /// 任一图像失败时立即返回错误: 之前的图像保持已写入状态, 失败的图像不写入任何内容.
    /// 全部图像都写入后, 才设置 [`Flag::PredictionGridsStartedEditing`].
    ///
    /// `on_progress(index, percent)` 报告当前图像的推理进度.
    pub fn generate<I, T, F>(
        &mut self,
        images: &I,
        detections: &T,
        progress: &mut UserProgress,
        mut on_progress: F,
    ) -> GridResult<()>
    where
        I: ImageSource + ?Sized,
        T: DetectionSource + ?Sized,
        F: FnMut(usize, u8),
    {
        if progress.model != self.engine.deployment() {
            return Err(GridError::DeploymentMismatch {
                session: progress.model,
                engine: self.engine.deployment(),
            });
        }
        if images.len() != self.datasets.len() {
            return Err(GridError::InvalidParams(
                "image count does not match prediction grid slots",
            ));
        }
        let n = images.len();
        for index in 0..n {
            let image = images.image(index)?;
            log::info!(
                "generating prediction grid {}/{n} ({})",
                index + 1,
                images.name(index)
            );
            let labels = self.labels_with_progress(
                image.view(),
                detections.detections(index),
                |p| on_progress(index, p),
            )?;
            self.datasets.persist(index, labels)?;
            log::info!("prediction grid {}/{n} persisted", index + 1);
        }
        progress.set(Flag::PredictionGridsStartedEditing, true);
        Ok(())
    }

    /// 仅当用户尚未进入预测网格编辑阶段时才生成. 返回是否真的生成了.
    pub fn generate_if_needed<I, T, F>(
        &mut self,
        images: &I,
        detections: &T,
        progress: &mut UserProgress,
        on_progress: F,
    ) -> GridResult<bool>
    where
        I: ImageSource + ?Sized,
        T: DetectionSource + ?Sized,
        F: FnMut(usize, u8),
    {
        if progress.get(Flag::PredictionGridsStartedEditing) {
            log::info!("prediction grids already generated, skipping");
            return Ok(false);
        }
        self.generate(images, detections, progress, on_progress)?;
        Ok(true)
    }
}
