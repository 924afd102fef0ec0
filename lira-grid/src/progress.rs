//! 用户会话进度.
//!
//! 记录流水线中各个人工编辑阶段是否已经开始/完成, 以便中断后恢复.

use crate::classifier::Deployment;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 进度标志.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Flag {
    /// 已开始编辑 I 型病灶检测框.
    TypeOnesStartedEditing,
    /// 已完成编辑 I 型病灶检测框.
    TypeOnesFinishedEditing,
    /// 预测网格已全部生成并持久化, 进入编辑阶段.
    PredictionGridsStartedEditing,
    /// 已完成编辑预测网格.
    PredictionGridsFinishedEditing,
}

impl Flag {
    /// 全部标志, 按流水线顺序.
    pub const ALL: [Flag; 4] = [
        Flag::TypeOnesStartedEditing,
        Flag::TypeOnesFinishedEditing,
        Flag::PredictionGridsStartedEditing,
        Flag::PredictionGridsFinishedEditing,
    ];
}

/// 用户会话进度.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UserProgress {
    /// 见 [`Flag::TypeOnesStartedEditing`].
    pub type_ones_started_editing: bool,
    /// 见 [`Flag::TypeOnesFinishedEditing`].
    pub type_ones_finished_editing: bool,
    /// 见 [`Flag::PredictionGridsStartedEditing`].
    pub prediction_grids_started_editing: bool,
    /// 见 [`Flag::PredictionGridsFinishedEditing`].
    pub prediction_grids_finished_editing: bool,
    /// 部署模式.
    pub model: Deployment,
}

impl UserProgress {
    /// 以指定部署模式开始一个全新的会话.
    pub fn new(model: Deployment) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// 读取标志.
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::TypeOnesStartedEditing => self.type_ones_started_editing,
            Flag::TypeOnesFinishedEditing => self.type_ones_finished_editing,
            Flag::PredictionGridsStartedEditing => self.prediction_grids_started_editing,
            Flag::PredictionGridsFinishedEditing => self.prediction_grids_finished_editing,
        }
    }

    /// 设置标志.
    pub fn set(&mut self, flag: Flag, value: bool) {
        let slot = match flag {
            Flag::TypeOnesStartedEditing => &mut self.type_ones_started_editing,
            Flag::TypeOnesFinishedEditing => &mut self.type_ones_finished_editing,
            Flag::PredictionGridsStartedEditing => &mut self.prediction_grids_started_editing,
            Flag::PredictionGridsFinishedEditing => &mut self.prediction_grids_finished_editing,
        };
        *slot = value;
    }

    /// 清除所有标志, 并切换到部署模式 `model`.
    pub fn restart(&mut self, model: Deployment) {
        *self = Self::new(model);
    }

    /// 用户是否已经开始任何一个编辑阶段?
    #[inline]
    pub fn editing_started(&self) -> bool {
        self.type_ones_started_editing || self.prediction_grids_started_editing
    }

    /// 是否需要人工复核病灶检测框? 单分类器模式下永远不需要.
    #[inline]
    pub fn should_review_lesions(&self) -> bool {
        self.model.uses_lesion_classifier() && !self.type_ones_finished_editing
    }
}

#[cfg(feature = "serde")]
mod io {
    use super::*;
    use crate::GridResult;
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, ErrorKind, Write};
    use std::path::Path;

    impl UserProgress {
        /// 从 `path` 读取进度. 文件不存在时返回以 `model` 开始的全新进度.
        pub fn open<P: AsRef<Path>>(path: P, model: Deployment) -> GridResult<Self> {
            match File::open(path.as_ref()) {
                Ok(file) => Ok(bincode::deserialize_from(BufReader::new(file))?),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new(model)),
                Err(e) => Err(e.into()),
            }
        }

        /// 保存进度到 `path`, 必要时创建上级目录.
        pub fn save<P: AsRef<Path>>(&self, path: P) -> GridResult<()> {
            let path = path.as_ref();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut writer = BufWriter::new(File::create(path)?);
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
            Ok(())
        }
    }
}
