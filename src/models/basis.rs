//! # 高斯基组数据模型
//!
//! 存储一条 CP2K 高斯基组记录: 按轨道展开的量子数描述符与
//! (指数, 收缩系数) 对列表, 两个序列按下标一一对应。
//!
//! ## 依赖关系
//! - 被 `parsers/basisset.rs` 使用
//! - 被 `commands/data.rs` 使用

use serde::{Deserialize, Serialize};

use crate::error::{CpkitError, Result};

/// 单条轨道的量子数描述符
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalQuantumNumbers {
    /// 主量子数 n
    pub n: u32,

    /// 角量子数 l
    pub l: u32,

    /// 磁量子数 m
    pub m: i32,

    /// 自旋通道 (基组文件不区分自旋, 恒为 0)
    pub spin: i32,

    /// 收缩序号: 同一块内第几个 shell 的系数列
    pub contraction: usize,
}

/// 一条高斯基组记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisSet {
    /// 元素符号
    pub element: String,

    /// 基组名称 (如 DZVP-GTH)
    pub name: String,

    /// 名称按 `-` 拆出的标签
    pub tags: Vec<String>,

    /// 轨道量子数, 与 `orbital_exponents` 按下标对应
    pub orbital_quantum_numbers: Vec<OrbitalQuantumNumbers>,

    /// 每条轨道的 (指数, 收缩系数) 对列表
    pub orbital_exponents: Vec<Vec<(f64, f64)>>,
}

impl BasisSet {
    /// 从两个平行序列构建记录, 长度不一致立即失败
    pub fn from_parts(
        element: impl Into<String>,
        name: impl Into<String>,
        orbital_quantum_numbers: Vec<OrbitalQuantumNumbers>,
        orbital_exponents: Vec<Vec<(f64, f64)>>,
    ) -> Result<Self> {
        let element = element.into();
        let name = name.into();

        if orbital_quantum_numbers.len() != orbital_exponents.len() {
            return Err(CpkitError::RecordError {
                format: "basis set".to_string(),
                element,
                names: name,
                reason: format!(
                    "{} orbital descriptors but {} exponent lists",
                    orbital_quantum_numbers.len(),
                    orbital_exponents.len()
                ),
            });
        }
        if orbital_quantum_numbers.is_empty() {
            return Err(CpkitError::RecordError {
                format: "basis set".to_string(),
                element,
                names: name,
                reason: "basis set carries no orbitals".to_string(),
            });
        }

        let tags = name.split('-').map(|t| t.to_string()).collect();
        Ok(BasisSet {
            element,
            name,
            tags,
            orbital_quantum_numbers,
            orbital_exponents,
        })
    }

    /// 轨道条数
    pub fn n_orbitals(&self) -> usize {
        self.orbital_quantum_numbers.len()
    }

    /// 最大角量子数
    pub fn max_l(&self) -> u32 {
        self.orbital_quantum_numbers
            .iter()
            .map(|qn| qn.l)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qn(n: u32, l: u32, m: i32, contraction: usize) -> OrbitalQuantumNumbers {
        OrbitalQuantumNumbers {
            n,
            l,
            m,
            spin: 0,
            contraction,
        }
    }

    #[test]
    fn test_from_parts() {
        let basis = BasisSet::from_parts(
            "H",
            "DZVP-GTH",
            vec![qn(1, 0, 0, 0), qn(1, 0, 0, 1)],
            vec![
                vec![(8.37, -0.028), (1.23, -0.13)],
                vec![(8.37, 0.005), (1.23, 0.234)],
            ],
        )
        .unwrap();

        assert_eq!(basis.n_orbitals(), 2);
        assert_eq!(basis.max_l(), 0);
        assert_eq!(basis.tags, vec!["DZVP", "GTH"]);
    }

    #[test]
    fn test_from_parts_rejects_length_mismatch() {
        let result = BasisSet::from_parts(
            "H",
            "SZV-GTH",
            vec![qn(1, 0, 0, 0), qn(1, 0, 0, 1)],
            vec![vec![(8.37, -0.028)]],
        );
        assert!(matches!(result, Err(CpkitError::RecordError { .. })));
    }

    #[test]
    fn test_from_parts_rejects_empty() {
        assert!(BasisSet::from_parts("H", "SZV-GTH", vec![], vec![]).is_err());
    }
}
