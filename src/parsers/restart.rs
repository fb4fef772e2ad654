//! # CP2K 重启文件解析器
//!
//! 从重启文件 (类 Fortran namelist 的输入甲板) 中定位
//! `&COORD .. &END COORD` 与 `&CELL .. &END CELL` 两段有界区域,
//! 还原结构: 元素 + 数字标签、笛卡尔坐标、晶格矢量与周期性。
//!
//! ## 格式说明
//! ```text
//!     &CELL
//!       A     8.7450000000    0.0000000000    0.0000000000
//!       B     0.0000000000    8.7450000000    0.0000000000
//!       C     0.0000000000    0.0000000000    8.7450000000
//!       PERIODIC  XYZ
//!     &END CELL
//!     &COORD
//!       H1    0.7493682000    0.0000000000    0.0000000000
//!       O     0.0000000000    0.0000000000    0.0000000000
//!     &END COORD
//! ```
//! 坐标行的种类 token 拆成字母元素 + 数字标签 (缺省 0);
//! `PERIODIC` 行按轴字母的包含关系给出三个布尔, 缺省 XYZ。
//!
//! ## 依赖关系
//! - 被 `commands/traj.rs`, `commands/render.rs` 使用
//! - 使用 `models/structure.rs`

use std::fs;
use std::path::Path;

use crate::error::{CpkitError, Result};
use crate::models::{split_kind_token, Cell, Site, Structure};

/// 解析重启文件为结构
pub fn parse_restart_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_restart_content(&content)
}

/// 从重启文件文本还原结构
pub fn parse_restart_content(content: &str) -> Result<Structure> {
    let coord_lines = section_region(content, "COORD").ok_or_else(|| restart_error(
        "no &COORD section found",
    ))?;
    let cell_lines = section_region(content, "CELL");

    let mut sites = Vec::new();
    for line in coord_lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(restart_error(&format!("bad coordinate line: {:?}", line)));
        }
        let (element, tag) = split_kind_token(tokens[0]);
        if element.is_empty() {
            return Err(restart_error(&format!(
                "coordinate line has no element symbol: {:?}",
                line
            )));
        }
        let position = [
            parse_float(tokens[1], line)?,
            parse_float(tokens[2], line)?,
            parse_float(tokens[3], line)?,
        ];
        sites.push(Site::new(element, position).with_tag(tag));
    }

    let mut cell = None;
    let mut pbc = [true, true, true];
    if let Some(lines) = cell_lines {
        let mut vectors = [[0.0f64; 3]; 3];
        let mut seen = [false; 3];
        for line in lines {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let key = match tokens.first() {
                Some(k) => k.to_uppercase(),
                None => continue,
            };
            let row = match key.as_str() {
                "A" => 0,
                "B" => 1,
                "C" => 2,
                "PERIODIC" => {
                    // 按轴字母的包含关系取周期性
                    let axes = tokens.get(1).map(|t| t.to_uppercase()).unwrap_or_default();
                    pbc = [
                        axes.contains('X'),
                        axes.contains('Y'),
                        axes.contains('Z'),
                    ];
                    continue;
                }
                _ => continue,
            };
            if tokens.len() < 4 {
                return Err(restart_error(&format!("bad cell vector line: {:?}", line)));
            }
            vectors[row] = [
                parse_float(tokens[1], line)?,
                parse_float(tokens[2], line)?,
                parse_float(tokens[3], line)?,
            ];
            seen[row] = true;
        }
        if seen.iter().all(|&s| s) {
            cell = Some(Cell::from_vectors(vectors));
        } else if seen.iter().any(|&s| s) {
            return Err(restart_error("cell section misses one of the A/B/C rows"));
        }
    }

    Ok(Structure::new(sites, cell).with_pbc(pbc))
}

/// 截取 `&NAME .. &END NAME` 之间本层的行 (不含首尾行)
///
/// 名字匹配不分大小写, 取最先出现的一段;
/// 嵌套子段 (如 &CELL 里的 &CELL_REF) 整段跳过。
fn section_region<'a>(content: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let mut region = Vec::new();
    let mut inside = false;
    let mut depth = 0usize;
    for line in content.lines() {
        let trimmed = line.trim();
        let head = trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();
        if !inside {
            // 段头可以带参数, 只认第一个 token
            if head == format!("&{}", name) {
                inside = true;
            }
            continue;
        }
        if head.starts_with("&END") {
            if depth == 0 {
                return Some(region);
            }
            depth -= 1;
            continue;
        }
        if head.starts_with('&') {
            depth += 1;
            continue;
        }
        if depth == 0 && !trimmed.is_empty() {
            region.push(line);
        }
    }
    None
}

fn parse_float(token: &str, line: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| restart_error(&format!("bad numeric field {:?} in line {:?}", token, line)))
}

fn restart_error(reason: &str) -> CpkitError {
    CpkitError::ParseError {
        format: "restart file".to_string(),
        context: "&COORD/&CELL region".to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESTART: &str = "\
 &FORCE_EVAL
   &SUBSYS
     &CELL
       A     8.7450000000    0.0000000000    0.0000000000
       B     0.0000000000    8.7450000000    0.0000000000
       C     0.0000000000    0.0000000000    8.7450000000
       PERIODIC  XY
     &END CELL
     &COORD
       H1    0.7493682000    0.0000000000    0.0000000000
       H     -.7493682000    0.0000000000    0.0000000000
       O     0.0000000000    0.0000000000    0.0000000000
     &END COORD
   &END SUBSYS
 &END FORCE_EVAL
";

    #[test]
    fn test_parse_restart_structure() {
        let structure = parse_restart_content(RESTART).unwrap();

        assert_eq!(structure.n_atoms(), 3);
        assert_eq!(structure.sites[0].element, "H");
        assert_eq!(structure.sites[0].tag, 1);
        assert_eq!(structure.sites[1].tag, 0);
        assert!((structure.sites[0].position[0] - 0.7493682).abs() < 1e-10);
        assert!((structure.sites[1].position[0] + 0.7493682).abs() < 1e-10);

        let cell = structure.cell.unwrap();
        assert!((cell.matrix[1][1] - 8.745).abs() < 1e-10);
        assert_eq!(structure.pbc, [true, true, false]);
    }

    #[test]
    fn test_missing_periodic_defaults_to_xyz() {
        let text = "\
 &CELL
   A  1.0 0.0 0.0
   B  0.0 1.0 0.0
   C  0.0 0.0 1.0
 &END CELL
 &COORD
   H  0.0 0.0 0.0
 &END COORD
";
        let structure = parse_restart_content(text).unwrap();
        assert_eq!(structure.pbc, [true, true, true]);
    }

    #[test]
    fn test_missing_coord_section_fails() {
        let text = " &CELL\n  A 1 0 0\n  B 0 1 0\n  C 0 0 1\n &END CELL\n";
        assert!(matches!(
            parse_restart_content(text),
            Err(CpkitError::ParseError { .. })
        ));
    }

    #[test]
    fn test_partial_cell_fails() {
        let text = "\
 &CELL
   A  1.0 0.0 0.0
 &END CELL
 &COORD
   H  0.0 0.0 0.0
 &END COORD
";
        assert!(parse_restart_content(text).is_err());
    }

    #[test]
    fn test_no_cell_section_is_fine() {
        let text = " &COORD\n  O 0.1 0.2 0.3\n &END COORD\n";
        let structure = parse_restart_content(text).unwrap();

        assert!(structure.cell.is_none());
        assert_eq!(structure.sites[0].kind_label(), "O");
    }

    #[test]
    fn test_nested_cell_ref_is_skipped() {
        let text = "\
 &CELL
   A  2.0 0.0 0.0
   B  0.0 2.0 0.0
   C  0.0 0.0 2.0
   &CELL_REF
     A  9.0 0.0 0.0
     B  0.0 9.0 0.0
     C  0.0 0.0 9.0
   &END CELL_REF
 &END CELL
 &COORD
   H  0.0 0.0 0.0
 &END COORD
";
        let structure = parse_restart_content(text).unwrap();
        let cell = structure.cell.unwrap();
        assert!((cell.matrix[0][0] - 2.0).abs() < 1e-12);
    }
}
