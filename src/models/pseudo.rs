//! # GTH 赝势数据模型
//!
//! 存储一条 Goedecker-Teter-Hutter 赝势记录: 局域部分与非局域投影子,
//! 以及从名称别名解码出的类型 / 泛函 / 价电子数。
//!
//! ## 命名约定
//!
//! 别名通常形如 `TYPE-XC-qN` (如 `GTH-PBE-q6`): 所有别名的 TYPE 与 N
//! 必须一致, 且 N 必须等于各角动量通道电子数之和。不符合该约定的
//! 名称不做解码也不做校验, 记录照常保留。
//!
//! ## 依赖关系
//! - 被 `parsers/pseudopotential.rs` 使用
//! - 被 `commands/data.rs` 使用

use serde::{Deserialize, Serialize};

use crate::error::{CpkitError, Result};

/// 非局域投影子块: 一个投影半径下的上三角系数矩阵 (按行展平)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GthProjector {
    /// 投影半径 (Bohr)
    pub radius: f64,

    /// 投影子个数 n
    pub n_projectors: usize,

    /// 上三角系数, 长度必须为 n*(n+1)/2
    pub coefficients: Vec<f64>,
}

impl GthProjector {
    /// n 个投影子对应的上三角系数个数
    ///
    /// 中间乘法用 u128 计算, n 过大时饱和到 `usize::MAX` 而不回绕。
    pub fn expected_coefficients(n: usize) -> usize {
        let triangle = n as u128 * (n as u128 + 1) / 2;
        usize::try_from(triangle).unwrap_or(usize::MAX)
    }
}

/// 一条 GTH 赝势记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GthPotential {
    /// 元素符号
    pub element: String,

    /// 名称与别名
    pub names: Vec<String>,

    /// 各角动量通道电子数 (s, p, d, ...)
    pub n_elec: Vec<u32>,

    /// 局域部分半径 r_loc (Bohr)
    pub r_loc: f64,

    /// 局域部分展开系数
    pub local_coefficients: Vec<f64>,

    /// 非局域投影子块
    pub projectors: Vec<GthProjector>,

    /// 名称解码: 赝势类型 (如 GTH)
    pub potential_type: Option<String>,

    /// 名称解码: 交换关联泛函 (如 PBE)
    pub xc_functional: Option<String>,

    /// 名称解码: 价电子数 N
    pub n_val: Option<u32>,
}

impl GthPotential {
    /// 电子数之和
    pub fn electron_count(&self) -> u64 {
        self.n_elec.iter().map(|&n| u64::from(n)).sum()
    }

    /// 首选显示名 (第一个别名)
    pub fn display_name(&self) -> &str {
        self.names.first().map(|s| s.as_str()).unwrap_or("")
    }

    fn record_error(&self, reason: impl Into<String>) -> CpkitError {
        CpkitError::RecordError {
            format: "GTH potential".to_string(),
            element: self.element.clone(),
            names: self.names.join(" "),
            reason: reason.into(),
        }
    }

    /// 解码 `TYPE-XC-qN` 式名称并校验所有不变量
    ///
    /// 全部别名均符合约定时: 要求 TYPE 与 N 跨别名一致且
    /// N == sum(n_elec), 并填入解码字段; 任一别名不符合约定时
    /// 跳过解码与一致性检查。投影子系数长度检查总是执行。
    pub fn finalize(mut self) -> Result<Self> {
        for projector in &self.projectors {
            let expected = GthProjector::expected_coefficients(projector.n_projectors);
            if projector.coefficients.len() != expected {
                return Err(self.record_error(format!(
                    "projector block expects {} coefficients for {} projectors, got {}",
                    expected,
                    projector.n_projectors,
                    projector.coefficients.len()
                )));
            }
        }

        if self.names.is_empty() {
            return Err(self.record_error("record carries no name"));
        }

        let decoded: Vec<Option<(String, String, u32)>> =
            self.names.iter().map(|n| decode_name(n)).collect();
        if decoded.iter().any(|d| d.is_none()) {
            // 宽松回退: 名称不符合约定, 保留记录但不解码
            return Ok(self);
        }

        let mut iter = decoded.into_iter().flatten();
        let (first_type, first_xc, first_n) = match iter.next() {
            Some(triple) => triple,
            None => return Ok(self),
        };
        for (ptype, _, n) in iter {
            if ptype != first_type || n != first_n {
                return Err(self.record_error(format!(
                    "aliases disagree on type or electron number ({}-q{} vs {}-q{})",
                    first_type, first_n, ptype, n
                )));
            }
        }

        if u64::from(first_n) != self.electron_count() {
            return Err(self.record_error(format!(
                "electron configuration sums to {} but names declare q{}",
                self.electron_count(),
                first_n
            )));
        }

        self.potential_type = Some(first_type);
        self.xc_functional = Some(first_xc);
        self.n_val = Some(first_n);
        Ok(self)
    }
}

/// 按 `TYPE-XC-qN` 约定解码单个名称, 不符合约定返回 None
fn decode_name(name: &str) -> Option<(String, String, u32)> {
    let parts: Vec<&str> = name.split('-').collect();
    if parts.len() < 3 {
        return None;
    }
    let last = parts[parts.len() - 1];
    let n = last.strip_prefix('q')?.parse::<u32>().ok()?;
    let ptype = parts[0].to_string();
    let xc = parts[1..parts.len() - 1].join("-");
    Some((ptype, xc, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrogen_pade() -> GthPotential {
        GthPotential {
            element: "H".to_string(),
            names: vec!["GTH-PADE-q1".to_string(), "GTH-LDA-q1".to_string()],
            n_elec: vec![1],
            r_loc: 0.2,
            local_coefficients: vec![-4.18023680, 0.72507482],
            projectors: vec![],
            potential_type: None,
            xc_functional: None,
            n_val: None,
        }
    }

    #[test]
    fn test_decode_name() {
        assert_eq!(
            decode_name("GTH-PBE-q6"),
            Some(("GTH".to_string(), "PBE".to_string(), 6))
        );
        // XC 段可以含连字符
        assert_eq!(
            decode_name("GTH-BLYP-DRSLL-q4"),
            Some(("GTH".to_string(), "BLYP-DRSLL".to_string(), 4))
        );
        assert_eq!(decode_name("GTH-PADE"), None);
        assert_eq!(decode_name("GTH-PBE-p6"), None);
    }

    #[test]
    fn test_finalize_decodes_conforming_names() {
        let pot = hydrogen_pade().finalize().unwrap();
        assert_eq!(pot.potential_type.as_deref(), Some("GTH"));
        assert_eq!(pot.xc_functional.as_deref(), Some("PADE"));
        assert_eq!(pot.n_val, Some(1));
    }

    #[test]
    fn test_finalize_rejects_electron_sum_mismatch() {
        let mut pot = hydrogen_pade();
        pot.names = vec!["GTH-PADE-q2".to_string()];
        assert!(matches!(
            pot.finalize(),
            Err(CpkitError::RecordError { .. })
        ));
    }

    #[test]
    fn test_electron_sum_does_not_wrap() {
        let mut pot = hydrogen_pade();
        pot.n_elec = vec![3_000_000_000, 3_000_000_000];
        // 6e9 按 u32 回绕后恰为 1705032704, 仍须拒绝
        pot.names = vec!["GTH-PADE-q1705032704".to_string()];
        assert!(pot.finalize().is_err());
    }

    #[test]
    fn test_finalize_rejects_inconsistent_aliases() {
        let mut pot = hydrogen_pade();
        pot.names = vec!["GTH-PADE-q1".to_string(), "GTH-PBE-q3".to_string()];
        assert!(pot.finalize().is_err());
    }

    #[test]
    fn test_finalize_lenient_on_nonconforming_names() {
        let mut pot = hydrogen_pade();
        pot.names = vec!["ALL-ELECTRON".to_string()];
        let pot = pot.finalize().unwrap();
        assert_eq!(pot.potential_type, None);
        assert_eq!(pot.n_val, None);
    }

    #[test]
    fn test_finalize_checks_projector_triangle() {
        let mut pot = hydrogen_pade();
        pot.projectors = vec![GthProjector {
            radius: 0.3,
            n_projectors: 2,
            // 2 个投影子应有 3 个系数
            coefficients: vec![1.0, 2.0],
        }];
        assert!(pot.finalize().is_err());
    }

    #[test]
    fn test_finalize_rejects_absurd_projector_count() {
        let mut pot = hydrogen_pade();
        pot.projectors = vec![GthProjector {
            radius: 0.3,
            n_projectors: usize::MAX,
            coefficients: vec![],
        }];
        assert!(pot.finalize().is_err());
    }

    #[test]
    fn test_expected_coefficients() {
        assert_eq!(GthProjector::expected_coefficients(1), 1);
        assert_eq!(GthProjector::expected_coefficients(2), 3);
        assert_eq!(GthProjector::expected_coefficients(3), 6);
        // 过大的 n 饱和而不回绕成 0
        assert_eq!(GthProjector::expected_coefficients(usize::MAX), usize::MAX);
    }
}
