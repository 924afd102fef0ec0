//! 预测网格去噪.
//!
//! 原始网格中相邻格子的类别分数往往呈孤立噪点. 去噪在每个类别通道上独立进行,
//! 输出形状与输入完全相同.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis, Zip};

/// 网格去噪器.
pub trait Denoiser {
    /// 对 `(rows, cols, classes)` 的网格逐类别通道去噪. `weight` 越大越平滑.
    fn denoise(&self, grid: ArrayView3<f32>, weight: f32) -> Array3<f32>;
}

/// 不做任何平滑.
#[derive(Copy, Clone, Debug, Default)]
pub struct Identity;

impl Denoiser for Identity {
    #[inline]
    fn denoise(&self, grid: ArrayView3<f32>, _: f32) -> Array3<f32> {
        grid.to_owned()
    }
}

/// 全变分 (total variation) 去噪, Chambolle 投影算法.
///
/// 当相邻两次迭代的能量变化小于 `eps * 初始能量`, 或迭代次数达到 `max_iter` 时停止.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TvChambolle {
    /// 相对收敛阈值.
    pub eps: f32,

    /// 最大迭代次数.
    pub max_iter: usize,
}

impl Default for TvChambolle {
    fn default() -> Self {
        Self {
            eps: 2e-4,
            max_iter: 200,
        }
    }
}

impl Denoiser for TvChambolle {
    fn denoise(&self, grid: ArrayView3<f32>, weight: f32) -> Array3<f32> {
        let mut out = grid.to_owned();
        if weight <= 0.0 || grid.is_empty() {
            return out;
        }
        self.denoise_channels(grid, out.view_mut(), weight);
        out
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

        impl TvChambolle {
            fn denoise_channels(&self, grid: ArrayView3<f32>, mut out: ndarray::ArrayViewMut3<f32>, weight: f32) {
                out.axis_iter_mut(Axis(2))
                    .into_par_iter()
                    .zip(grid.axis_iter(Axis(2)).into_par_iter())
                    .for_each(|(dst, src)| self.denoise_2d(src, dst, weight));
            }
        }
    } else {
        impl TvChambolle {
            fn denoise_channels(&self, grid: ArrayView3<f32>, mut out: ndarray::ArrayViewMut3<f32>, weight: f32) {
                for (dst, src) in out.axis_iter_mut(Axis(2)).zip(grid.axis_iter(Axis(2))) {
                    self.denoise_2d(src, dst, weight);
                }
            }
        }
    }
}

impl TvChambolle {
    /// 单通道去噪, 结果写入 `out`.
    fn denoise_2d(&self, image: ArrayView2<f32>, mut out: ArrayViewMut2<f32>, weight: f32) {
        let (h, w) = image.dim();
        let size = (h * w) as f32;
        let tau = 0.25;

        let mut p0 = Array2::<f32>::zeros((h, w));
        let mut p1 = Array2::<f32>::zeros((h, w));
        let mut g0 = Array2::<f32>::zeros((h, w));
        let mut g1 = Array2::<f32>::zeros((h, w));
        let mut d = Array2::<f32>::zeros((h, w));
        let mut norm = Array2::<f32>::zeros((h, w));

        let mut e_init = 0.0;
        let mut e_prev = 0.0;
        for i in 0..self.max_iter {
            if i > 0 {
                // d = -div(p)
                Zip::from(&mut d)
                    .and(&p0)
                    .and(&p1)
                    .for_each(|d, &a, &b| *d = -a - b);
                if h > 1 {
                    let mut tail = d.slice_mut(s![1.., ..]);
                    tail += &p0.slice(s![..-1, ..]);
                }
                if w > 1 {
                    let mut tail = d.slice_mut(s![.., 1..]);
                    tail += &p1.slice(s![.., ..-1]);
                }
                Zip::from(&mut out)
                    .and(&image)
                    .and(&d)
                    .for_each(|o, &x, &d| *o = x + d);
            } else {
                out.assign(&image);
            }
            let mut energy = d.iter().map(|v| v * v).sum::<f32>();

            // 前向差分, 最后一行/列保持 0.
            if h > 1 {
                let diff = &out.slice(s![1.., ..]) - &out.slice(s![..-1, ..]);
                g0.slice_mut(s![..-1, ..]).assign(&diff);
            }
            if w > 1 {
                let diff = &out.slice(s![.., 1..]) - &out.slice(s![.., ..-1]);
                g1.slice_mut(s![.., ..-1]).assign(&diff);
            }
            Zip::from(&mut norm)
                .and(&g0)
                .and(&g1)
                .for_each(|n, &a, &b| *n = (a * a + b * b).sqrt());
            energy += weight * norm.sum();

            Zip::from(&mut p0)
                .and(&mut p1)
                .and(&g0)
                .and(&g1)
                .and(&norm)
                .for_each(|p0, p1, &g0, &g1, &n| {
                    let n = 1.0 + n * tau / weight;
                    *p0 = (*p0 - tau * g0) / n;
                    *p1 = (*p1 - tau * g1) / n;
                });

            energy /= size;
            if i == 0 {
                e_init = energy;
                e_prev = energy;
            } else if (e_prev - energy).abs() < self.eps * e_init {
                break;
            } else {
                e_prev = energy;
            }
        }
    }
}
