//! 编辑完成后的统计: 每张图像 (或每张玻片) 各类别的格子数、占比以及病灶个数.

use crate::consts::{class, CLASS_N, CLASS_NAMES};
use crate::routing::Detection;
use imageproc::union_find::DisjointSetForest;
use itertools::Itertools;
use ndarray::ArrayView2;
use std::io::{self, Write};
use std::iter::Sum;
use std::ops::AddAssign;

/// 参与统计的类别 (除背景外的全部类别), 按全局索引排列.
pub const COUNTED_CLASSES: [u8; CLASS_N - 1] = [
    class::HEALTHY,
    class::TYPE_ONE_CASEUM,
    class::TYPE_TWO,
    class::TYPE_THREE,
    class::TYPE_ONE_RIM,
    class::UNKNOWN_MISC,
];

/// 各类别 (不含背景) 的格子数, 顺序同 [`COUNTED_CLASSES`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ClassCounts(pub [u64; CLASS_N - 1]);

impl ClassCounts {
    /// 统计一张标签网格.
    pub fn from_labels(labels: ArrayView2<u8>) -> Self {
        let mut all = [0u64; CLASS_N];
        for &l in labels.iter() {
            if let Some(c) = all.get_mut(l as usize) {
                *c += 1;
            }
        }
        let mut ans = [0; CLASS_N - 1];
        for (dst, &k) in ans.iter_mut().zip(COUNTED_CLASSES.iter()) {
            *dst = all[k as usize];
        }
        Self(ans)
    }

    /// 非背景格子总数.
    #[inline]
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// 各类别占非背景格子的百分比. 没有任何非背景格子时返回 `None`.
    pub fn percentages(&self) -> Option<[f64; CLASS_N - 1]> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(self.0.map(|c| 100.0 * c as f64 / total as f64))
    }
}

impl AddAssign for ClassCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.0.iter_mut().zip(rhs.0).for_each(|(a, b)| *a += b);
    }
}

impl Sum for ClassCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, c| {
            acc += c;
            acc
        })
    }
}

/// 相互接触 (含边界接触) 的检测框构成一个病灶. 返回病灶个数.
pub fn lesion_clusters(detections: &[Detection]) -> usize {
    let mut forest = DisjointSetForest::new(detections.len());
    for ((i, a), (j, b)) in detections.iter().enumerate().tuple_combinations() {
        if a.touches(b) {
            forest.union(i, j);
        }
    }
    forest.num_trees()
}

/// 一行统计结果.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageStats {
    /// 图像名或玻片名.
    pub name: String,

    /// 各类别格子数.
    pub counts: ClassCounts,

    /// 病灶个数.
    pub lesions: usize,
}

impl ImageStats {
    /// 由编辑后的标签网格和检测框计算.
    pub fn new(name: impl Into<String>, labels: ArrayView2<u8>, detections: &[Detection]) -> Self {
        Self {
            name: name.into(),
            counts: ClassCounts::from_labels(labels),
            lesions: lesion_clusters(detections),
        }
    }
}

/// 形如 `"<slide> (<n>)"` 的图像名返回 `Some("<slide>")`.
pub fn slide_name(name: &str) -> Option<&str> {
    let (slide, suffix) = name.rsplit_once(' ')?;
    (suffix.starts_with('(') && suffix.ends_with(')')).then_some(slide)
}

/// 把同一玻片上连续的多张图像合并为一行, 行名为玻片名.
///
/// 不符合 `"<slide> (<n>)"` 命名的图像保持原样.
pub fn group_by_slide(rows: Vec<ImageStats>) -> Vec<ImageStats> {
    let keyed = rows
        .into_iter()
        .enumerate()
        .map(|(i, r)| (slide_name(&r.name).map(str::to_owned).ok_or(i), r));

    let mut ans = vec![];
    for (key, group) in &keyed.group_by(|(k, _)| k.clone()) {
        let mut group = group.map(|(_, r)| r);
        let Some(mut merged) = group.next() else {
            continue;
        };
        for r in group {
            merged.counts += r.counts;
            merged.lesions += r.lesions;
        }
        if let Ok(slide) = key {
            merged.name = slide;
        }
        ans.push(merged);
    }
    ans
}

/// 写出 CSV: 表头, 每行的格子数与百分比, 以及一行汇总.
pub fn write_csv<W: Write>(mut w: W, rows: &[ImageStats]) -> io::Result<()> {
    let names = COUNTED_CLASSES
        .iter()
        .map(|&k| CLASS_NAMES[k as usize])
        .join(",");
    writeln!(w, "Image,{names},,{names},,Number of Type One Lesions")?;

    for r in rows {
        write_row(&mut w, &r.name, &r.counts, r.lesions)?;
    }

    let sum: ClassCounts = rows.iter().map(|r| r.counts).sum();
    let lesions = rows.iter().map(|r| r.lesions).sum();
    writeln!(w)?;
    write_row(&mut w, "summary", &sum, lesions)
}

fn write_row<W: Write>(w: &mut W, name: &str, counts: &ClassCounts, lesions: usize) -> io::Result<()> {
    let percent = match counts.percentages() {
        Some(p) => p.iter().map(|v| format!("{v:.2}")).join(","),
        None => ",".repeat(CLASS_N - 2),
    };
    writeln!(
        w,
        "{name},{},,{percent},,{lesions}",
        counts.0.iter().join(",")
    )
}
