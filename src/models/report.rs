//! # CP2K 运行报告数据模型
//!
//! 存储从 CP2K 标准输出提取的结果: 总能量、警告数、运行状态、
//! 逐步优化/MD 指标、Mulliken 布居、能带结构与带隙。
//!
//! ## 依赖关系
//! - 被 `parsers/output.rs`, `parsers/bands.rs` 使用
//! - 被 `commands/scan.rs`, `commands/collect.rs` 使用

use serde::{Deserialize, Serialize};

/// 运行类型 (GLOBAL| Run type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    Energy,
    EnergyForce,
    GeoOpt,
    CellOpt,
    Md,
    Other,
}

impl RunKind {
    /// 从输出中的运行类型标签归类
    ///
    /// MD 的标签会带上系综后缀 (如 `MD-NVT`), 按前缀归类。
    pub fn from_label(label: &str) -> Self {
        if label.starts_with("MD") || label == "MOLECULAR_DYNAMICS" {
            return RunKind::Md;
        }
        match label {
            "ENERGY" => RunKind::Energy,
            "ENERGY_FORCE" => RunKind::EnergyForce,
            "GEO_OPT" | "GEOMETRY_OPTIMIZATION" => RunKind::GeoOpt,
            "CELL_OPT" => RunKind::CellOpt,
            _ => RunKind::Other,
        }
    }
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunKind::Energy => write!(f, "ENERGY"),
            RunKind::EnergyForce => write!(f, "ENERGY_FORCE"),
            RunKind::GeoOpt => write!(f, "GEO_OPT"),
            RunKind::CellOpt => write!(f, "CELL_OPT"),
            RunKind::Md => write!(f, "MD"),
            RunKind::Other => write!(f, "OTHER"),
        }
    }
}

/// 运行结束状态
///
/// 可读但缺少末尾警告行或 `PROGRAM ENDED AT` 标记的输出归为
/// `Incomplete`, 与成功解析出部分数据是两回事。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// 正常结束
    Completed,
    /// 输出不完整 (CP2K 没有跑完)
    Incomplete,
    /// CP2K 自行中止 (ABORT)
    Aborted,
    /// 因 SCF 不收敛而中止
    ScfNotConverged,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Incomplete => write!(f, "incomplete"),
            RunStatus::Aborted => write!(f, "aborted"),
            RunStatus::ScfNotConverged => write!(f, "scf-not-converged"),
        }
    }
}

/// 一步几何优化 / 分子动力学的指标行
///
/// 扫描时逐行累积, 遇到该运行类型的触发行整体落表。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionStep {
    /// 步号
    pub step: Option<i64>,

    /// 总能量 (a.u.)
    pub energy_au: Option<f64>,

    /// 色散能 (a.u.)
    pub dispersion_energy_au: Option<f64>,

    /// 压力 (bar)
    pub pressure_bar: Option<f64>,

    /// 晶胞边长 (Å)
    pub cell_a_angs: Option<f64>,
    pub cell_b_angs: Option<f64>,
    pub cell_c_angs: Option<f64>,

    /// 晶胞夹角 (度)
    pub cell_alpha_deg: Option<f64>,
    pub cell_beta_deg: Option<f64>,
    pub cell_gamma_deg: Option<f64>,

    /// 晶胞体积 (Å³)
    pub cell_volume_angs3: Option<f64>,

    /// 最大 / 均方根步长 (a.u.)
    pub max_step_au: Option<f64>,
    pub rms_step_au: Option<f64>,

    /// 最大 / 均方根梯度 (a.u.)
    pub max_grad_au: Option<f64>,
    pub rms_grad_au: Option<f64>,

    /// 实空间电子密度残差
    pub edens_rspace: Option<f64>,

    /// 本步 SCF 是否收敛
    pub scf_converged: Option<bool>,
}

impl MotionStep {
    /// 是否没有任何字段被填过
    pub fn is_empty(&self) -> bool {
        self == &MotionStep::default()
    }
}

/// Mulliken 布居分析中的一个位点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MullikenSite {
    /// 元素符号
    pub element: String,

    /// 总电子布居 (自旋极化时为 alpha+beta)
    pub population: f64,

    /// 自旋矩 alpha-beta (仅自旋极化输出)
    pub spin_moment: Option<f64>,

    /// 净电荷
    pub charge: f64,
}

/// 能带结构: 特殊点标签 + 各自旋通道的本征值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandStructure {
    /// k 点坐标序列 (倒格矢分数坐标)
    pub kpoints: Vec<[f64; 3]>,

    /// 显式命名的特殊点: (kpoints 下标, 标签)
    pub labels: Vec<(usize, String)>,

    /// 本征值 [自旋][k 点][能带] (eV)
    pub bands: Vec<Vec<Vec<f64>>>,
}

impl BandStructure {
    pub fn n_spins(&self) -> usize {
        self.bands.len()
    }

    pub fn n_kpoints(&self) -> usize {
        self.kpoints.len()
    }
}

/// 单个自旋通道的 HOMO / LUMO / 带隙 (a.u.)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandGapInfo {
    pub homo_au: f64,
    pub lumo_au: f64,
    pub gap_au: f64,
}

/// 一次 CP2K 运行的完整扫描报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// 运行结束状态
    pub status: RunStatus,

    /// 总能量 (a.u., 取输出中最后一次出现)
    pub energy_au: Option<f64>,

    /// 警告条数
    pub n_warnings: Option<u32>,

    /// 是否超出申请的运行时长
    pub walltime_exceeded: bool,

    /// 运行类型原始标签
    pub run_type: Option<String>,

    /// 程序版本号 (浮点, 如 9.1)
    pub version: Option<f64>,

    /// 自旋非限制 (UKS/LSD) 标志
    pub spin_unrestricted: Option<bool>,

    /// 逐步优化 / MD 指标
    pub motion_steps: Vec<MotionStep>,

    /// Mulliken 布居
    pub mulliken: Vec<MullikenSite>,

    /// 能带结构
    pub band_structure: Option<BandStructure>,

    /// 各自旋通道带隙 (下标 0 为自旋 1)
    pub band_gaps: Vec<BandGapInfo>,
}

impl RunReport {
    pub fn new() -> Self {
        RunReport {
            status: RunStatus::Incomplete,
            energy_au: None,
            n_warnings: None,
            walltime_exceeded: false,
            run_type: None,
            version: None,
            spin_unrestricted: None,
            motion_steps: Vec::new(),
            mulliken: Vec::new(),
            band_structure: None,
            band_gaps: Vec::new(),
        }
    }

    /// 归类后的运行类型
    pub fn run_kind(&self) -> RunKind {
        self.run_type
            .as_deref()
            .map(RunKind::from_label)
            .unwrap_or(RunKind::Other)
    }

    /// 优化 / MD 步数
    pub fn n_motion_steps(&self) -> usize {
        self.motion_steps.len()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        RunReport::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_kind_from_label() {
        assert_eq!(RunKind::from_label("GEO_OPT"), RunKind::GeoOpt);
        assert_eq!(RunKind::from_label("MD"), RunKind::Md);
        assert_eq!(RunKind::from_label("MD-NVT"), RunKind::Md);
        assert_eq!(RunKind::from_label("ENERGY"), RunKind::Energy);
        assert_eq!(RunKind::from_label("BAND"), RunKind::Other);
    }

    #[test]
    fn test_motion_step_is_empty() {
        let mut step = MotionStep::default();
        assert!(step.is_empty());

        step.energy_au = Some(-1.0);
        assert!(!step.is_empty());
    }

    #[test]
    fn test_report_defaults_incomplete() {
        let report = RunReport::new();
        assert_eq!(report.status, RunStatus::Incomplete);
        assert_eq!(report.run_kind(), RunKind::Other);
        assert!(!report.walltime_exceeded);
    }
}
