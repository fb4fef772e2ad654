//! # 原子结构数据模型
//!
//! 定义统一的原子结构表示 (元素种类、笛卡尔坐标、晶胞、周期性),
//! 可以从 restart / XYZ 轨迹解析, 也可以注入 CP2K 输入树。
//!
//! ## 依赖关系
//! - 被 `parsers/restart`、`parsers/xyz` 和 `commands/` 使用
//! - 依赖 `models/tree` (结构注入)

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::tree::{InputTree, Section, TreeValue};

/// 晶胞表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// 晶胞向量矩阵 (3x3)，行向量表示 A, B, C (Å)
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Cell {
    /// 从晶胞向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Cell { matrix }
    }

    /// 从晶胞参数 (a, b, c, alpha, beta, gamma) 创建
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let alpha_rad = alpha.to_radians();
        let beta_rad = beta.to_radians();
        let gamma_rad = gamma.to_radians();

        let cos_alpha = alpha_rad.cos();
        let cos_beta = beta_rad.cos();
        let cos_gamma = gamma_rad.cos();
        let sin_gamma = gamma_rad.sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();
        let c_vec = [c1, c2, c3];

        Cell {
            matrix: [a_vec, b_vec, c_vec],
        }
    }

    /// 获取晶胞参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let a_vec = self.matrix[0];
        let b_vec = self.matrix[1];
        let c_vec = self.matrix[2];

        let a = (a_vec[0].powi(2) + a_vec[1].powi(2) + a_vec[2].powi(2)).sqrt();
        let b = (b_vec[0].powi(2) + b_vec[1].powi(2) + b_vec[2].powi(2)).sqrt();
        let c = (c_vec[0].powi(2) + c_vec[1].powi(2) + c_vec[2].powi(2)).sqrt();

        let dot_bc: f64 = b_vec.iter().zip(c_vec.iter()).map(|(x, y)| x * y).sum();
        let dot_ac: f64 = a_vec.iter().zip(c_vec.iter()).map(|(x, y)| x * y).sum();
        let dot_ab: f64 = a_vec.iter().zip(b_vec.iter()).map(|(x, y)| x * y).sum();

        let alpha = (dot_bc / (b * c)).acos().to_degrees();
        let beta = (dot_ac / (a * c)).acos().to_degrees();
        let gamma = (dot_ab / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶胞体积 (Å³)
    pub fn volume(&self) -> f64 {
        let a = self.matrix[0];
        let b = self.matrix[1];
        let c = self.matrix[2];

        // 行列式计算
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }
}

/// 原子位点
///
/// CP2K 中同种元素的不同参数化以数字后缀区分 (如 `H1`),
/// 这里拆成元素符号 + 数字标签, 无后缀时标签为 0。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 元素符号
    pub element: String,

    /// 种类标签 (0 表示无后缀)
    pub tag: u32,

    /// 笛卡尔坐标 [x, y, z] (Å)
    pub position: [f64; 3],
}

impl Site {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Site {
            element: element.into(),
            tag: 0,
            position,
        }
    }

    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    /// 种类记号: 标签非 0 时为 `元素+标签` (如 H1), 否则裸元素符号
    pub fn kind_label(&self) -> String {
        if self.tag == 0 {
            self.element.clone()
        } else {
            format!("{}{}", self.element, self.tag)
        }
    }
}

/// 拆分种类记号为 (元素符号, 数字标签)
///
/// `H` -> ("H", 0), `H1` -> ("H", 1), `Ca2` -> ("Ca", 2)
pub fn split_kind_token(token: &str) -> (String, u32) {
    let split_at = token
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    let element = token[..split_at].to_string();
    let tag = token[split_at..].parse::<u32>().unwrap_or(0);
    (element, tag)
}

/// 原子结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 原子位点列表
    pub sites: Vec<Site>,

    /// 晶胞 (孤立体系可缺省)
    pub cell: Option<Cell>,

    /// 各轴周期性 [x, y, z]
    pub pbc: [bool; 3],
}

impl Structure {
    pub fn new(sites: Vec<Site>, cell: Option<Cell>) -> Self {
        Structure {
            sites,
            cell,
            pbc: [true, true, true],
        }
    }

    pub fn with_pbc(mut self, pbc: [bool; 3]) -> Self {
        self.pbc = pbc;
        self
    }

    /// 原子数
    pub fn n_atoms(&self) -> usize {
        self.sites.len()
    }

    /// 计算化学式 (按元素字典序, 忽略种类标签)
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for site in &self.sites {
            *counts.entry(site.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// CP2K `PERIODIC` 关键词取值: 周期轴字母拼接, 全关为 NONE
    pub fn periodic_label(&self) -> String {
        let mut label = String::new();
        for (flag, axis) in self.pbc.iter().zip(["X", "Y", "Z"]) {
            if *flag {
                label.push_str(axis);
            }
        }
        if label.is_empty() {
            label.push_str("NONE");
        }
        label
    }

    /// 把结构注入输入树的 FORCE_EVAL/SUBSYS
    ///
    /// CELL 的 A/B/C 行与 PERIODIC、COORD 的原子行都以不覆盖的方式写入:
    /// 调用方已给出晶胞 (或 CELL_FILE_NAME 等替代写法) 或坐标
    /// (COORD / TOPOLOGY) 时注入自动让位。重复 FORCE_EVAL 按广播处理。
    pub fn merge_into_tree(&self, tree: &mut InputTree) -> Result<()> {
        if let Some(cell) = &self.cell {
            for (row, letter) in cell.matrix.iter().zip(["A", "B", "C"]) {
                tree.set_keyword(
                    &format!("FORCE_EVAL/SUBSYS/CELL/{}", letter),
                    TreeValue::Str(format!(
                        "{:<15.10} {:<15.10} {:<15.10}",
                        row[0], row[1], row[2]
                    )),
                    false,
                    &["ABC", "ALPHA_BETA_GAMMA", "CELL_FILE_NAME"],
                )?;
            }
            tree.set_keyword(
                "FORCE_EVAL/SUBSYS/CELL/PERIODIC",
                TreeValue::Str(self.periodic_label()),
                false,
                &[],
            )?;
        }

        // 原子行保持位点顺序, 收在 " " 键下 (种类记号是行内容的一部分,
        // 不能当关键词用: 渲染器要求关键词全大写)
        let lines: Vec<TreeValue> = self
            .sites
            .iter()
            .map(|site| {
                TreeValue::Str(format!(
                    "{} {:<15.10} {:<15.10} {:<15.10}",
                    site.kind_label(),
                    site.position[0],
                    site.position[1],
                    site.position[2]
                ))
            })
            .collect();
        let mut coord = Section::new();
        coord.insert(" ".to_string(), TreeValue::List(lines));
        tree.set_keyword(
            "FORCE_EVAL/SUBSYS/COORD",
            TreeValue::Section(coord),
            false,
            &["TOPOLOGY"],
        )?;

        Ok(())
    }
}
