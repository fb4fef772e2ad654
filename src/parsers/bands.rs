//! # 能带结构窗口解析器
//!
//! 从 `KPOINTS| Band Structure Calculation` 触发行开始, 向前扫一段
//! 有界窗口, 抽取特殊点标签与逐 k 点 / 逐自旋的本征值组,
//! 遇到不属于能带块的行即收窗。
//!
//! ## 格式说明
//! 8.1 之前的版本:
//! ```text
//!  KPOINTS| Special K-Point 1 GAMMA      0.00000000  0.00000000  0.00000000
//!   Nr.    1 Spin 1 K-Point  0.00000000  0.00000000  0.00000000
//!     4
//!    -5.81235043   4.21603519   4.21603519   4.21603519
//! ```
//! 本征值个数单独一行, 数值每行最多 4 个。8.1 起改为:
//! ```text
//!  KPOINTS| Special K-Point 1 GAMMA      0.00000000  0.00000000  0.00000000
//! #  Point 1  Spin 1:    0.00000    0.00000    0.00000
//! #   Band    Energy [eV]     Occupation
//!        1      -5.81235043     2.000000
//! ```
//! 按序号 / 能量 / 占据三列逐行列出。两种语法都支持, 按解析出的
//! 版本号与 8.1 比较选择。路径段共享端点会被连续打印两次,
//! 与前一 k 点坐标相同的组并为一条。
//!
//! ## 依赖关系
//! - 被 `parsers/output.rs` 使用
//! - 使用 `models/report.rs::BandStructure`
//! - 使用 `regex` 识别两种版本的组头

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::BandStructure;

lazy_static! {
    /// 8.1 前的 k 点组头: `Nr. <n> Spin <s> K-Point <kx> <ky> <kz>`
    static ref PRE81_HEADER: Regex = Regex::new(r"^\s*Nr\.\s+\d+\s+Spin\s+\d+\s+K-Point").unwrap();
    /// 8.1 起的 k 点组头: `#  Point <n>  Spin <s>: <kx> <ky> <kz>`
    static ref POST81_HEADER: Regex = Regex::new(r"^\s*#\s+Point\s+\d+\s+Spin\s+\d+:").unwrap();
}

/// 解析从触发行开始的能带窗口
///
/// `lines` 的第 0 行是触发行本身; 版本号缺失时按新格式处理。
/// 没有扫到任何 k 点组时返回 `None`。
pub fn parse_band_window(lines: &[&str], version: Option<f64>) -> Option<BandStructure> {
    let post_81 = version.map(|v| v >= 8.1).unwrap_or(true);

    let mut known: Vec<([f64; 3], String)> = Vec::new();
    let mut kpoints: Vec<[f64; 3]> = Vec::new();
    let mut labels: Vec<(usize, String)> = Vec::new();
    let mut bands_s1: Vec<Vec<f64>> = Vec::new();
    let mut bands_s2: Vec<Vec<f64>> = Vec::new();
    let mut duplicate = false;

    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if trimmed.starts_with("KPOINTS|") {
            if trimmed.contains("Special") {
                if let Some((kpoint, Some(label))) = parse_special_point(trimmed) {
                    known.push((kpoint, label));
                }
            }
            i += 1;
            continue;
        }

        let group = if post_81 {
            parse_group_post81(lines, i)
        } else {
            parse_group_pre81(lines, i)
        };
        let (spin, kpoint, band, next) = match group {
            Some(group) => group,
            None => break,
        };

        if spin == 1 {
            // 连续重复的路径端点只记一次
            duplicate = kpoints.last() == Some(&kpoint);
            if !duplicate {
                if let Some((_, label)) = known.iter().find(|(k, _)| *k == kpoint) {
                    labels.push((kpoints.len(), label.clone()));
                }
                kpoints.push(kpoint);
                bands_s1.push(band);
            }
        } else if spin == 2 && !duplicate {
            bands_s2.push(band);
        }
        i = next;
    }

    if bands_s1.is_empty() {
        return None;
    }
    let mut bands = vec![bands_s1];
    if !bands_s2.is_empty() {
        bands.push(bands_s2);
    }
    Some(BandStructure {
        kpoints,
        labels,
        bands,
    })
}

/// 特殊点行: 末尾 3 个坐标, 其前一个 token 是标签
///
/// 占位的 "not specified" 和纯序号都不算显式标签。
fn parse_special_point(line: &str) -> Option<([f64; 3], Option<String>)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 6 {
        return None;
    }
    let n = tokens.len();
    let kpoint = [
        tokens[n - 3].parse().ok()?,
        tokens[n - 2].parse().ok()?,
        tokens[n - 1].parse().ok()?,
    ];
    let candidate = tokens[n - 4];
    let label = if candidate == "specified" || candidate.parse::<f64>().is_ok() {
        None
    } else {
        Some(candidate.to_string())
    };
    Some((kpoint, label))
}

/// 8.1 前的组: `Nr. <n> Spin <s> K-Point <kx> <ky> <kz>` + 个数行 + 数值行
fn parse_group_pre81(lines: &[&str], start: usize) -> Option<(u32, [f64; 3], Vec<f64>, usize)> {
    if !PRE81_HEADER.is_match(lines[start]) {
        return None;
    }
    let tokens: Vec<&str> = lines[start].split_whitespace().collect();
    if tokens.len() < 8 {
        return None;
    }
    let spin: u32 = tokens[3].parse().ok()?;
    let n = tokens.len();
    let kpoint = [
        tokens[n - 3].parse().ok()?,
        tokens[n - 2].parse().ok()?,
        tokens[n - 1].parse().ok()?,
    ];

    let count: usize = lines.get(start + 1)?.trim().parse().ok()?;
    // 个数行不可信: 声称的值装不进剩余窗口 (每行最多 4 个) 时整组拒收
    let available = lines.len().saturating_sub(start + 2).saturating_mul(4);
    if count > available {
        return None;
    }
    let n_rows = (count + 3) / 4;
    let mut values = Vec::with_capacity(count);
    for row in 0..n_rows {
        for token in lines.get(start + 2 + row)?.split_whitespace() {
            values.push(token.parse::<f64>().ok()?);
        }
    }
    if values.len() != count {
        return None;
    }
    Some((spin, kpoint, values, start + 2 + n_rows))
}

/// 8.1 起的组: `#  Point <n>  Spin <s>:` 头 + 序号 / 能量 / 占据行
fn parse_group_post81(lines: &[&str], start: usize) -> Option<(u32, [f64; 3], Vec<f64>, usize)> {
    if !POST81_HEADER.is_match(lines[start]) {
        return None;
    }
    let tokens: Vec<&str> = lines[start].split_whitespace().collect();
    if tokens.len() < 8 {
        return None;
    }
    let spin: u32 = tokens[4].trim_end_matches(':').parse().ok()?;
    let n = tokens.len();
    let kpoint = [
        tokens[n - 3].parse().ok()?,
        tokens[n - 2].parse().ok()?,
        tokens[n - 1].parse().ok()?,
    ];

    let mut values = Vec::new();
    let mut j = start + 1;
    while j < lines.len() {
        let trimmed = lines[j].trim();
        if trimmed.starts_with('#') {
            // 列表头跳过, 下一组的 Point 头收尾
            if trimmed.contains("Band") {
                j += 1;
                continue;
            }
            break;
        }
        let row: Vec<&str> = trimmed.split_whitespace().collect();
        if row.len() < 2 || row[0].parse::<usize>().is_err() {
            break;
        }
        match row[1].parse::<f64>() {
            Ok(energy) => values.push(energy),
            Err(_) => break,
        }
        j += 1;
    }

    if values.is_empty() {
        return None;
    }
    Some((spin, kpoint, values, j))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRE81_WINDOW: &str = "\
 KPOINTS| Band Structure Calculation
 KPOINTS| Number of k-points in set 1: 3
 KPOINTS| In units of b-vectors of the reciprocal lattice
 KPOINTS| Special K-Point 1 GAMMA                  0.00000000  0.00000000  0.00000000
 KPOINTS| Special K-Point 2 not specified          0.25000000  0.00000000  0.00000000
 KPOINTS| Special K-Point 3 X                      0.50000000  0.00000000  0.00000000
  Nr.    1 Spin 1 K-Point  0.00000000  0.00000000  0.00000000
    5
   -5.81235043   4.21603519   4.21603519   4.21603519
    6.55904651
  Nr.    2 Spin 1 K-Point  0.25000000  0.00000000  0.00000000
    5
   -5.40172759   2.75085711   3.89664195   3.89664195
    7.01021595
  Nr.    3 Spin 1 K-Point  0.50000000  0.00000000  0.00000000
    5
   -4.68567041   1.22154150   3.59704717   3.59704717
    7.39694367
 GEOMETRY OPTIMIZATION COMPLETED
";

    const POST81_WINDOW: &str = "\
 KPOINTS| Band Structure Calculation
 KPOINTS| Number of K-Points in Set                                            2
 KPOINTS| In units of b-vector [2pi/Bohr]
 KPOINTS| Special K-Point 1 GAMMA                  0.00000000  0.00000000  0.00000000
 KPOINTS| Special K-Point 2 X                      0.50000000  0.00000000  0.00000000
#  Point 1  Spin 1:    0.00000    0.00000    0.00000
#   Band    Energy [eV]     Occupation
       1      -5.81235043     2.000000
       2       4.21603519     0.000000
#  Point 1  Spin 2:    0.00000    0.00000    0.00000
#   Band    Energy [eV]     Occupation
       1      -5.81235043     2.000000
       2       4.21603519     0.000000
#  Point 2  Spin 1:    0.50000    0.00000    0.00000
#   Band    Energy [eV]     Occupation
       1      -4.68567041     2.000000
       2       1.22154150     0.000000
#  Point 2  Spin 2:    0.50000    0.00000    0.00000
#   Band    Energy [eV]     Occupation
       1      -4.68567041     2.000000
       2       1.22154150     0.000000
 SCF WAVEFUNCTION OPTIMIZATION
";

    fn window(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_pre81_window() {
        let lines = window(PRE81_WINDOW);
        let bands = parse_band_window(&lines, Some(7.1)).unwrap();

        assert_eq!(bands.n_kpoints(), 3);
        assert_eq!(bands.n_spins(), 1);
        // 每组 5 个本征值, 4 个一行折行
        assert_eq!(bands.bands[0][0].len(), 5);
        assert!((bands.bands[0][0][4] - 6.55904651).abs() < 1e-8);
        assert!((bands.kpoints[2][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_pre81_group_rejects_absurd_count() {
        // 个数行声称的本征值数远超窗口行数, 整组丢弃
        let lines = vec![
            "  Nr.    1 Spin 1 K-Point  0.00000000  0.00000000  0.00000000",
            "    9999999999",
            "   -5.81235043   4.21603519",
        ];
        assert!(parse_group_pre81(&lines, 0).is_none());
    }

    #[test]
    fn test_pre81_labels_skip_placeholder() {
        let lines = window(PRE81_WINDOW);
        let bands = parse_band_window(&lines, Some(7.1)).unwrap();

        // "not specified" 的第 2 个点不带标签
        assert_eq!(
            bands.labels,
            vec![(0, "GAMMA".to_string()), (2, "X".to_string())]
        );
    }

    #[test]
    fn test_post81_window_two_spins() {
        let lines = window(POST81_WINDOW);
        let bands = parse_band_window(&lines, Some(8.2)).unwrap();

        assert_eq!(bands.n_kpoints(), 2);
        assert_eq!(bands.n_spins(), 2);
        assert_eq!(bands.bands[1].len(), 2);
        assert!((bands.bands[1][1][1] - 1.2215415).abs() < 1e-7);
        assert_eq!(
            bands.labels,
            vec![(0, "GAMMA".to_string()), (1, "X".to_string())]
        );
    }

    #[test]
    fn test_post81_coalesces_repeated_endpoint() {
        // 两段路径共享的端点被连续打印两次
        let text = "\
 KPOINTS| Band Structure Calculation
#  Point 1  Spin 1:    0.00000    0.00000    0.00000
       1      -5.81235043     2.000000
#  Point 2  Spin 1:    0.50000    0.00000    0.00000
       1      -4.68567041     2.000000
#  Point 3  Spin 1:    0.50000    0.00000    0.00000
       1      -4.68567041     2.000000
#  Point 4  Spin 1:    0.50000    0.50000    0.00000
       1      -3.99170261     2.000000
";
        let lines: Vec<&str> = text.lines().collect();
        let bands = parse_band_window(&lines, Some(9.1)).unwrap();

        assert_eq!(bands.n_kpoints(), 3);
        assert_eq!(bands.bands[0].len(), 3);
    }

    #[test]
    fn test_window_stops_at_foreign_line() {
        let lines = window(PRE81_WINDOW);
        let bands = parse_band_window(&lines, Some(7.1)).unwrap();

        // 收窗行之后的内容不会被当成 k 点组
        assert_eq!(bands.n_kpoints(), 3);
    }

    #[test]
    fn test_no_groups_yields_none() {
        let text = " KPOINTS| Band Structure Calculation\n something else entirely\n";
        let lines: Vec<&str> = text.lines().collect();
        assert!(parse_band_window(&lines, Some(9.1)).is_none());
    }
}
