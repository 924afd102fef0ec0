//! 运行时错误.

use crate::classifier::{ClassifierKind, Deployment};
use ndarray_npy::{ReadNpyError, WriteNpyError};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// 预测网格生成、存储过程中的运行时错误.
#[derive(Debug)]
pub enum GridError {
    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// 图像解码/编码错误.
    Image(image::ImageError),

    /// 数组形状不匹配.
    Shape(ndarray::ShapeError),

    /// 分块索引越界. 第一个参数为请求的索引, 第二个为分块总数.
    TileIndexOutOfRange {
        /// 请求的线性索引.
        index: usize,
        /// 分块总数.
        len: usize,
    },

    /// 图像索引越界.
    ImageIndexOutOfRange {
        /// 请求的图像索引.
        index: usize,
        /// 图像总数.
        len: usize,
    },

    /// 外部分类器在推理时报错.
    Classifier(Box<dyn Error + Send + Sync>),

    /// 分类器输出形状与批次不符. 形状格式为 `(行, 列)`.
    ClassifierOutput {
        /// 期望的形状.
        expected: (usize, usize),
        /// 实际的形状.
        found: (usize, usize),
    },

    /// 当前部署模式需要, 但没有提供的分类器.
    MissingClassifier(ClassifierKind),

    /// 用户进度记录的部署模式与推理引擎不一致.
    DeploymentMismatch {
        /// 用户进度中记录的模式.
        session: Deployment,
        /// 推理引擎实际的模式.
        engine: Deployment,
    },

    /// 图像连一个完整的分块都放不下.
    ImageTooSmall {
        /// 图像高.
        height: usize,
        /// 图像宽.
        width: usize,
        /// 分块高.
        sub_h: usize,
        /// 分块宽.
        sub_w: usize,
    },

    /// 参数不合法.
    InvalidParams(&'static str),

    /// 读取 npy 文件错误.
    ReadNpy(ReadNpyError),

    /// 写入 npy 文件错误.
    WriteNpy(WriteNpyError),

    /// 用户进度文件 (反) 序列化错误.
    #[cfg(feature = "serde")]
    Progress(bincode::Error),
}

/// 预测网格相关操作的返回值.
pub type GridResult<T> = Result<T, GridError>;

impl Display for GridError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GridError::Io(e) => write!(f, "I/O error: {e}"),
            GridError::Image(e) => write!(f, "image error: {e}"),
            GridError::Shape(e) => write!(f, "shape error: {e}"),
            GridError::TileIndexOutOfRange { index, len } => {
                write!(f, "tile index {index} out of range (tiles: {len})")
            }
            GridError::ImageIndexOutOfRange { index, len } => {
                write!(f, "image index {index} out of range (images: {len})")
            }
            GridError::Classifier(e) => write!(f, "classifier failed: {e}"),
            GridError::ClassifierOutput { expected, found } => write!(
                f,
                "classifier output shape {found:?} does not match expected {expected:?}"
            ),
            GridError::MissingClassifier(kind) => write!(f, "missing {kind} classifier"),
            GridError::DeploymentMismatch { session, engine } => write!(
                f,
                "user progress expects {session} deployment, but engine runs {engine}"
            ),
            GridError::ImageTooSmall {
                height,
                width,
                sub_h,
                sub_w,
            } => write!(
                f,
                "image {height}x{width} is smaller than one {sub_h}x{sub_w} tile"
            ),
            GridError::InvalidParams(why) => write!(f, "invalid parameters: {why}"),
            GridError::ReadNpy(e) => write!(f, "read npy error: {e}"),
            GridError::WriteNpy(e) => write!(f, "write npy error: {e}"),
            #[cfg(feature = "serde")]
            GridError::Progress(e) => write!(f, "user progress error: {e}"),
        }
    }
}

impl Error for GridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GridError::Io(e) => Some(e),
            GridError::Image(e) => Some(e),
            GridError::Shape(e) => Some(e),
            GridError::Classifier(e) => Some(e.as_ref()),
            GridError::ReadNpy(e) => Some(e),
            GridError::WriteNpy(e) => Some(e),
            #[cfg(feature = "serde")]
            GridError::Progress(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GridError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<image::ImageError> for GridError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<ndarray::ShapeError> for GridError {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<ReadNpyError> for GridError {
    fn from(value: ReadNpyError) -> Self {
        Self::ReadNpy(value)
    }
}

impl From<WriteNpyError> for GridError {
    fn from(value: WriteNpyError) -> Self {
        Self::WriteNpy(value)
    }
}

#[cfg(feature = "serde")]
impl From<bincode::Error> for GridError {
    fn from(value: bincode::Error) -> Self {
        Self::Progress(value)
    }
}
