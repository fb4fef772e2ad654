//! # 数据模型模块
//!
//! 定义输入树、原子结构、赝势/基组记录、运行报告与轨迹数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `commands/` 使用
//! - 子模块: tree, structure, pseudo, basis, report, trajectory

pub mod basis;
pub mod pseudo;
pub mod report;
pub mod structure;
pub mod trajectory;
pub mod tree;

pub use basis::{BasisSet, OrbitalQuantumNumbers};
pub use pseudo::{GthPotential, GthProjector};
pub use report::{
    BandGapInfo, BandStructure, MotionStep, MullikenSite, RunKind, RunReport, RunStatus,
};
pub use structure::{split_kind_token, Cell, Site, Structure};
pub use trajectory::Trajectory;
pub use tree::{InputTree, Section, TreeValue};
