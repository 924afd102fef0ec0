//! 运行统计.

use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时.
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 累计时间 (微秒).
    #[inline]
    fn total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 某一批大小下的运行统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 批大小.
    batch_size: usize,

    /// 处理过的图像数.
    images: u64,

    /// 送入分类器的分块总数.
    tiles: u64,

    /// 分类器调用次数.
    batches: u64,

    /// 生成网格 (推理 + 去噪 + argmax) 的总时间.
    grid_time: AccTimer,

    /// 整个任务花费的总时间 (含图像解码).
    real_time: AccTimer,

    /// 最耗时的一张图像.
    most: Option<Duration>,
}

impl Profile {
    /// 初始化, 并开始总计时.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            images: 0,
            tiles: 0,
            batches: 0,
            grid_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
        }
    }

    /// 开始一张图像的计时.
    #[inline]
    pub fn image_start(&mut self) {
        self.grid_time.start();
    }

    /// 结束一张图像的计时.
    pub fn image_elapsed(&mut self) {
        let d = self.grid_time.elapsed();
        self.images += 1;
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 累加分类器调用统计.
    #[inline]
    pub fn count_calls(&mut self, tiles: u64, batches: u64) {
        self.tiles += tiles;
        self.batches += batches;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 批大小.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 处理过的图像数.
    #[inline]
    pub fn images(&self) -> u64 {
        self.images
    }

    /// 送入分类器的分块总数.
    #[inline]
    pub fn tiles(&self) -> u64 {
        self.tiles
    }

    /// 分类器调用次数.
    #[inline]
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// 生成网格的总时间 (微秒).
    #[inline]
    pub fn grid_time_us(&self) -> u64 {
        self.grid_time.total_us()
    }

    /// 总时间 (微秒).
    #[inline]
    pub fn real_time_us(&self) -> u64 {
        self.real_time.total_us()
    }

    /// 每个分块的平均时间 (微秒).
    pub fn avg_tile_time_us(&self) -> Option<f64> {
        match self.tiles {
            0 => None,
            tiles => Some(self.grid_time_us() as f64 / tiles as f64),
        }
    }

    /// 最耗时的一张图像.
    #[inline]
    pub fn most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}
