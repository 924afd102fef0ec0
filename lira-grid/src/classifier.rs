//! 外部分类器接口与输出映射.
//!
//! 两个分类器的原生输出宽度不同 (病灶 4 类, 通用 6 类或 5 类),
//! 通过静态映射表统一到 [`CLASS_N`] 个全局类别.

use crate::consts::CLASS_N;
use crate::{GridError, GridResult};
use ndarray::{Array2, ArrayView1, ArrayView4, ArrayViewMut1, ErrorKind, ShapeError};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 分类器推理时可能返回的任意错误.
pub type PredictError = Box<dyn Error + Send + Sync>;

/// 外部分块分类器 (黑盒).
///
/// 输入为 `(N, sub_h, sub_w, 3)` 的分块批次, 输出为 `(N, output_width)` 的类别分数.
/// 同一实例的 `output_width` 必须固定.
pub trait TileClassifier {
    /// 原生输出向量的宽度.
    fn output_width(&self) -> usize;

    /// 对一批分块推理.
    fn predict(&mut self, batch: ArrayView4<u8>) -> Result<Array2<f32>, PredictError>;
}

/// 分类器身份.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ClassifierKind {
    /// 病灶分类器, 处理与检测框相交的分块.
    Lesion,

    /// 通用分类器, 处理其余组织分块.
    General,
}

impl Display for ClassifierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierKind::Lesion => f.write_str("lesion"),
            ClassifierKind::General => f.write_str("general"),
        }
    }
}

/// 部署模式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Deployment {
    /// 双分类器模式: 病灶分类器 (4 类) + 通用分类器 (6 类).
    #[default]
    Kramnik,

    /// 单分类器模式: 只有通用分类器 (5 类), 同时跳过整个病灶复核流程.
    Balbc,
}

impl Display for Deployment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Kramnik => f.write_str("kramnik"),
            Deployment::Balbc => f.write_str("balbc"),
        }
    }
}

impl FromStr for Deployment {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kramnik" => Ok(Deployment::Kramnik),
            "balbc" => Ok(Deployment::Balbc),
            _ => Err(GridError::InvalidParams("unknown deployment model")),
        }
    }
}

impl Deployment {
    /// 该模式是否使用病灶分类器?
    #[inline]
    pub fn uses_lesion_classifier(&self) -> bool {
        matches!(self, Deployment::Kramnik)
    }
}

/// 原生输出 -> 全局类别的映射.
///
/// 若 `zero_insert` 为 `Some(k)`, 则先在原生输出的第 `k` 列前插入一列 0,
/// 再按 `targets` 把扩展后的第 `i` 列写入全局类别 `targets[i]`.
/// 未被 `targets` 覆盖的全局类别保持原值.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Remap {
    /// 原生输出宽度.
    pub native_width: usize,

    /// 插入 0 列的位置.
    pub zero_insert: Option<usize>,

    /// 扩展后每一列对应的全局类别.
    pub targets: &'static [usize],
}

/// 病灶分类器: `{0, 1, 3, 5}`.
const LESION_REMAP: Remap = Remap {
    native_width: 4,
    zero_insert: None,
    targets: &[0, 1, 3, 5],
};

/// 双分类器模式下的通用分类器: `{0, 2, 3, 4, 5, 6}`.
const GENERAL_REMAP: Remap = Remap {
    native_width: 6,
    zero_insert: None,
    targets: &[0, 2, 3, 4, 5, 6],
};

/// 单分类器模式下的通用分类器: 5 列, 在第 1 列前补 0 后同 [`GENERAL_REMAP`].
const GENERAL_REDUCED_REMAP: Remap = Remap {
    native_width: 5,
    zero_insert: Some(1),
    targets: &[0, 2, 3, 4, 5, 6],
};

impl Remap {
    /// 查表. 单分类器模式下没有病灶分类器, 返回 `None`.
    pub const fn of(kind: ClassifierKind, deployment: Deployment) -> Option<Remap> {
        match (kind, deployment) {
            (ClassifierKind::Lesion, Deployment::Kramnik) => Some(LESION_REMAP),
            (ClassifierKind::Lesion, Deployment::Balbc) => None,
            (ClassifierKind::General, Deployment::Kramnik) => Some(GENERAL_REMAP),
            (ClassifierKind::General, Deployment::Balbc) => Some(GENERAL_REDUCED_REMAP),
        }
    }

    /// 把一行原生输出写入一行全局类别分数.
    ///
    /// `native.len()` 不等于 `self.native_width` 时返回 `Err(GridError::ClassifierOutput)`;
    /// `grid_row.len()` 不等于 [`CLASS_N`] 时返回 `Err(GridError::Shape)`. 出错时不写入任何值.
    pub fn scatter(
        &self,
        native: ArrayView1<f32>,
        mut grid_row: ArrayViewMut1<f32>,
    ) -> GridResult<()> {
        if native.len() != self.native_width {
            return Err(GridError::ClassifierOutput {
                expected: (1, self.native_width),
                found: (1, native.len()),
            });
        }
        if grid_row.len() != CLASS_N {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        for (i, &target) in self.targets.iter().enumerate() {
            grid_row[target] = match self.zero_insert {
                Some(k) if i == k => 0.0,
                Some(k) if i > k => native[i - 1],
                _ => native[i],
            };
        }
        Ok(())
    }
}

/// 一次网格生成所需的全部分类器.
pub struct Classifiers {
    deployment: Deployment,
    lesion: Option<Box<dyn TileClassifier>>,
    general: Box<dyn TileClassifier>,
}

impl Classifiers {
    /// 双分类器模式.
    ///
    /// 任一分类器的输出宽度与映射表不符时返回 `Err(GridError::ClassifierOutput)`.
    pub fn kramnik(
        lesion: Box<dyn TileClassifier>,
        general: Box<dyn TileClassifier>,
    ) -> GridResult<Self> {
        check_width(lesion.as_ref(), LESION_REMAP)?;
        check_width(general.as_ref(), GENERAL_REMAP)?;
        Ok(Self {
            deployment: Deployment::Kramnik,
            lesion: Some(lesion),
            general,
        })
    }

    /// 单分类器模式.
    pub fn balbc(general: Box<dyn TileClassifier>) -> GridResult<Self> {
        check_width(general.as_ref(), GENERAL_REDUCED_REMAP)?;
        Ok(Self {
            deployment: Deployment::Balbc,
            lesion: None,
            general,
        })
    }

    /// 部署模式.
    #[inline]
    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    /// 获取指定身份的分类器及其映射表.
    pub(crate) fn get_mut(
        &mut self,
        kind: ClassifierKind,
    ) -> GridResult<(&mut (dyn TileClassifier + 'static), Remap)> {
        let remap = Remap::of(kind, self.deployment).ok_or(GridError::MissingClassifier(kind))?;
        let classifier: &mut (dyn TileClassifier + 'static) = match kind {
            ClassifierKind::Lesion => self
                .lesion
                .as_deref_mut()
                .ok_or(GridError::MissingClassifier(kind))?,
            ClassifierKind::General => self.general.as_mut(),
        };
        Ok((classifier, remap))
    }
}

fn check_width(c: &dyn TileClassifier, remap: Remap) -> GridResult<()> {
    if c.output_width() == remap.native_width {
        Ok(())
    } else {
        Err(GridError::ClassifierOutput {
            expected: (0, remap.native_width),
            found: (0, c.output_width()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1};

    fn remap_row(remap: Remap, native: &[f32]) -> Vec<f32> {
        let mut row = Array1::<f32>::zeros(CLASS_N);
        row[3] = 1.0;
        remap.scatter(arr1(native).view(), row.view_mut()).unwrap();
        row.to_vec()
    }

    #[test]
    fn test_lesion_remap() {
        let r = Remap::of(ClassifierKind::Lesion, Deployment::Kramnik).unwrap();
        assert_eq!(
            remap_row(r, &[0.1, 0.2, 0.3, 0.4]),
            vec![0.1, 0.2, 0.0, 0.3, 0.0, 0.4, 0.0]
        );
    }

    #[test]
    fn test_general_remap() {
        let r = Remap::of(ClassifierKind::General, Deployment::Kramnik).unwrap();
        assert_eq!(
            remap_row(r, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]),
            vec![0.1, 0.0, 0.2, 0.3, 0.4, 0.5, 0.6]
        );
    }

    #[test]
    fn test_reduced_general_remap() {
        let r = Remap::of(ClassifierKind::General, Deployment::Balbc).unwrap();
        assert_eq!(
            remap_row(r, &[0.1, 0.2, 0.3, 0.4, 0.5]),
            vec![0.1, 0.0, 0.0, 0.2, 0.3, 0.4, 0.5]
        );
        assert!(Remap::of(ClassifierKind::Lesion, Deployment::Balbc).is_none());
    }

    #[test]
    fn test_scatter_rejects_wrong_width() {
        let r = Remap::of(ClassifierKind::Lesion, Deployment::Kramnik).unwrap();
        let mut row = Array1::<f32>::zeros(CLASS_N);
        row[3] = 1.0;
        let err = r
            .scatter(arr1(&[0.5; 6]).view(), row.view_mut())
            .unwrap_err();
        assert!(matches!(
            err,
            GridError::ClassifierOutput {
                expected: (1, 4),
                found: (1, 6),
            }
        ));
        let mut short = Array1::<f32>::zeros(CLASS_N - 1);
        assert!(matches!(
            r.scatter(arr1(&[0.5; 4]).view(), short.view_mut()),
            Err(GridError::Shape(_))
        ));
        // 出错时一行都不写.
        assert_eq!(row.to_vec(), vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_remap_tables_are_consistent() {
        for remap in [LESION_REMAP, GENERAL_REMAP, GENERAL_REDUCED_REMAP] {
            let expanded = remap.native_width + remap.zero_insert.map_or(0, |_| 1);
            assert_eq!(expanded, remap.targets.len());
            assert!(remap.targets.iter().all(|&t| t < CLASS_N));
            // 背景类别总会被覆盖.
            assert!(remap.targets.contains(&3));
        }
    }

    #[test]
    fn test_deployment_parse() {
        assert_eq!("kramnik".parse::<Deployment>().unwrap(), Deployment::Kramnik);
        assert_eq!(" BALBC ".parse::<Deployment>().unwrap(), Deployment::Balbc);
        assert!("other".parse::<Deployment>().is_err());
        assert_eq!(Deployment::Balbc.to_string(), "balbc");
        assert!(!Deployment::Balbc.uses_lesion_classifier());
    }

    struct Fixed(usize);

    impl TileClassifier for Fixed {
        fn output_width(&self) -> usize {
            self.0
        }

        fn predict(&mut self, batch: ArrayView4<u8>) -> Result<Array2<f32>, PredictError> {
            Ok(Array2::zeros((batch.shape()[0], self.0)))
        }
    }

    #[test]
    fn test_classifiers_check_width() {
        assert!(Classifiers::kramnik(Box::new(Fixed(4)), Box::new(Fixed(6))).is_ok());
        assert!(Classifiers::kramnik(Box::new(Fixed(6)), Box::new(Fixed(6))).is_err());
        assert!(Classifiers::balbc(Box::new(Fixed(6))).is_err());

        let mut c = Classifiers::balbc(Box::new(Fixed(5))).unwrap();
        assert!(matches!(
            c.get_mut(ClassifierKind::Lesion),
            Err(GridError::MissingClassifier(ClassifierKind::Lesion))
        ));
        let (g, remap) = c.get_mut(ClassifierKind::General).unwrap();
        assert_eq!(g.output_width(), 5);
        assert_eq!(remap.native_width, 5);
    }
}
