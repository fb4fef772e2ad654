//! # XYZ 轨迹解析器
//!
//! 解析 CP2K 写出的 XYZ 轨迹帧与固定列晶胞表, 并按共享步号把
//! 坐标流、力流、晶胞流装配成一条对齐的轨迹。
//!
//! ## 格式说明
//! ```text
//!        3
//!  i =        1, time =        0.500, E =       -17.1646143300
//!   O         0.0000000000        0.0000000000        0.0000000000
//!   H         0.7493682000        0.0000000000        0.5868662000
//!   H        -0.7493682000        0.0000000000        0.5868662000
//! ```
//! 注释行携带步号 `i` 与可选能量 `E`; 没有步号时按帧序编号。
//! 晶胞表每行: 步号, 时间, 9 个矩阵分量, 体积 (体积列忽略,
//! 需要时重新计算)。
//!
//! ## 依赖关系
//! - 被 `commands/traj.rs` 使用
//! - 使用 `models/trajectory.rs`

use std::fs;
use std::path::Path;

use crate::error::{CpkitError, Result};
use crate::models::Trajectory;

/// 一帧 XYZ 坐标 (或力)
#[derive(Debug, Clone, PartialEq)]
pub struct XyzFrame {
    /// 注释行里的步号
    pub step_id: Option<i64>,

    /// 注释行里的能量 (a.u.)
    pub energy: Option<f64>,

    /// 种类记号 (原样保留, 可能带数字标签)
    pub symbols: Vec<String>,

    /// 每原子三分量
    pub values: Vec<[f64; 3]>,
}

/// 解析 XYZ 轨迹文件
pub fn parse_xyz_file(path: &Path) -> Result<Vec<XyzFrame>> {
    let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Err(CpkitError::EmptyFile {
            path: path.display().to_string(),
        });
    }
    parse_xyz_content(&content)
}

/// 解析多帧 XYZ 文本
pub fn parse_xyz_content(content: &str) -> Result<Vec<XyzFrame>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut frames = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }
        let n_atoms: usize = lines[i].trim().parse().map_err(|_| xyz_error(
            lines[i],
            "expected an atom-count line",
        ))?;
        let comment = lines.get(i + 1).ok_or_else(|| xyz_error(
            lines[i],
            "frame truncated before the comment line",
        ))?;
        let (step_id, energy) = parse_comment_line(comment);

        // 声称的原子数不能超过剩余行数
        if n_atoms > lines.len().saturating_sub(i + 2) {
            return Err(xyz_error(comment, "frame truncated inside the atom block"));
        }

        let mut symbols = Vec::with_capacity(n_atoms);
        let mut values = Vec::with_capacity(n_atoms);
        for offset in 0..n_atoms {
            let line = lines.get(i + 2 + offset).ok_or_else(|| {
                xyz_error(comment, "frame truncated inside the atom block")
            })?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 4 {
                return Err(xyz_error(line, "atom line needs a symbol and 3 components"));
            }
            let row = [
                parse_component(tokens[1], line)?,
                parse_component(tokens[2], line)?,
                parse_component(tokens[3], line)?,
            ];
            symbols.push(tokens[0].to_string());
            values.push(row);
        }

        frames.push(XyzFrame {
            step_id,
            energy,
            symbols,
            values,
        });
        i += 2 + n_atoms;
    }

    Ok(frames)
}

/// 注释行形如 ` i =  3, time =  1.5, E =  -17.16`, 逗号分段取键值
fn parse_comment_line(line: &str) -> (Option<i64>, Option<f64>) {
    let mut step_id = None;
    let mut energy = None;
    for segment in line.split(',') {
        let mut parts = segment.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let value = match parts.next() {
            Some(v) => v.trim(),
            None => continue,
        };
        match key {
            "i" => step_id = value.parse().ok(),
            "E" => energy = value.parse().ok(),
            _ => {}
        }
    }
    (step_id, energy)
}

/// 把坐标帧流装配成轨迹
///
/// 种类记号取第一帧, 后续帧必须一致; 没有步号的帧按帧序编号。
pub fn frames_to_trajectory(frames: &[XyzFrame]) -> Result<Trajectory> {
    let first = frames.first().ok_or_else(|| CpkitError::InvalidData {
        kind: "trajectory".to_string(),
        reason: "position stream carries no frames".to_string(),
    })?;

    let mut traj = Trajectory::new(first.symbols.clone());
    for (index, frame) in frames.iter().enumerate() {
        if frame.symbols != traj.symbols {
            return Err(CpkitError::TrajectoryMismatch {
                reason: format!("frame {} changes the atom kinds", index),
            });
        }
        let step_id = frame.step_id.unwrap_or(index as i64);
        traj.push_frame(step_id, frame.energy, frame.values.clone())?;
    }
    Ok(traj)
}

/// 把力帧流按步号并进坐标轨迹
pub fn merge_force_frames(traj: &mut Trajectory, frames: &[XyzFrame]) -> Result<()> {
    if frames.len() != traj.n_frames() {
        return Err(CpkitError::TrajectoryMismatch {
            reason: format!(
                "{} force frames against {} position frames",
                frames.len(),
                traj.n_frames()
            ),
        });
    }
    for (index, frame) in frames.iter().enumerate() {
        if let Some(step_id) = frame.step_id {
            if step_id != traj.step_ids[index] {
                return Err(CpkitError::TrajectoryMismatch {
                    reason: format!(
                        "force frame {} claims step {}, positions have step {}",
                        index, step_id, traj.step_ids[index]
                    ),
                });
            }
        }
    }
    traj.attach_forces(frames.iter().map(|f| f.values.clone()).collect())
}

/// 解析晶胞轨迹表: 每行步号, 时间, 9 个分量, 体积列忽略
pub fn parse_cell_table_content(content: &str) -> Result<Vec<(i64, [[f64; 3]; 3])>> {
    let mut rows = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() < 11 {
            return Err(xyz_error(line, "cell row needs step, time and 9 components"));
        }
        let step_id: i64 = tokens[0]
            .parse()
            .map_err(|_| xyz_error(line, "bad step number in cell row"))?;
        let mut matrix = [[0.0f64; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                matrix[row][col] = parse_component(tokens[2 + row * 3 + col], line)?;
            }
        }
        rows.push((step_id, matrix));
    }
    Ok(rows)
}

/// 解析晶胞轨迹文件
pub fn parse_cell_table_file(path: &Path) -> Result<Vec<(i64, [[f64; 3]; 3])>> {
    let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_cell_table_content(&content)
}

/// 把晶胞行按步号并进坐标轨迹
pub fn merge_cell_rows(traj: &mut Trajectory, rows: &[(i64, [[f64; 3]; 3])]) -> Result<()> {
    if rows.len() != traj.n_frames() {
        return Err(CpkitError::TrajectoryMismatch {
            reason: format!(
                "{} cell rows against {} position frames",
                rows.len(),
                traj.n_frames()
            ),
        });
    }
    for (index, (step_id, _)) in rows.iter().enumerate() {
        if *step_id != traj.step_ids[index] {
            return Err(CpkitError::TrajectoryMismatch {
                reason: format!(
                    "cell row {} claims step {}, positions have step {}",
                    index, step_id, traj.step_ids[index]
                ),
            });
        }
    }
    traj.attach_cells(rows.iter().map(|(_, m)| *m).collect())
}

/// 按顺序拼接多段轨迹 (续算片段), 可选去重
pub fn concat_fragments(fragments: Vec<Trajectory>, dedup: bool) -> Result<Trajectory> {
    let mut fragments = fragments.into_iter();
    let mut merged = fragments.next().ok_or_else(|| CpkitError::InvalidData {
        kind: "trajectory".to_string(),
        reason: "nothing to concatenate".to_string(),
    })?;
    for fragment in fragments {
        merged.concat(fragment)?;
    }
    if dedup {
        merged.dedup_steps();
    }
    Ok(merged)
}

fn parse_component(token: &str, line: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| xyz_error(line, &format!("bad numeric field: {:?}", token)))
}

fn xyz_error(context: &str, reason: &str) -> CpkitError {
    CpkitError::ParseError {
        format: "XYZ trajectory".to_string(),
        context: context.trim().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POS_TRAJ: &str = "\
       3
 i =        0, time =        0.000, E =       -17.1538038869
  O         0.0000000000        0.0000000000        0.0000000000
  H         0.7493682000        0.0000000000        0.5868662000
  H        -0.7493682000        0.0000000000        0.5868662000
       3
 i =        1, time =        0.500, E =       -17.1646143300
  O         0.0000000000        0.0000000000        0.0105931000
  H         0.7510214000        0.0000000000        0.5920530000
  H        -0.7510214000        0.0000000000        0.5920530000
";

    #[test]
    fn test_parse_frames_with_step_and_energy() {
        let frames = parse_xyz_content(POS_TRAJ).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].step_id, Some(0));
        assert_eq!(frames[1].step_id, Some(1));
        assert!((frames[1].energy.unwrap() - (-17.16461433)).abs() < 1e-10);
        assert_eq!(frames[0].symbols, vec!["O", "H", "H"]);
        assert!((frames[1].values[1][0] - 0.7510214).abs() < 1e-10);
    }

    #[test]
    fn test_plain_comment_line_has_no_metadata() {
        let text = "       1\n water molecule\n  O  0.0 0.0 0.0\n";
        let frames = parse_xyz_content(text).unwrap();

        assert_eq!(frames[0].step_id, None);
        assert_eq!(frames[0].energy, None);
    }

    #[test]
    fn test_truncated_frame_fails() {
        let text = "       3\n i = 0\n  O  0.0 0.0 0.0\n  H  0.1 0.0 0.0\n";
        assert!(matches!(
            parse_xyz_content(text),
            Err(CpkitError::ParseError { .. })
        ));
    }

    #[test]
    fn test_absurd_atom_count_fails() {
        // 原子数行声称的数量远超文件行数
        let text = "10000000000\n i = 0\n  O  0.0 0.0 0.0\n";
        assert!(matches!(
            parse_xyz_content(text),
            Err(CpkitError::ParseError { .. })
        ));
    }

    #[test]
    fn test_frames_to_trajectory() {
        let frames = parse_xyz_content(POS_TRAJ).unwrap();
        let traj = frames_to_trajectory(&frames).unwrap();

        assert_eq!(traj.n_frames(), 2);
        assert_eq!(traj.step_ids, vec![0, 1]);
        assert_eq!(traj.n_atoms(), 3);
    }

    #[test]
    fn test_trajectory_rejects_kind_change() {
        let text = "\
       1
 i = 0
  O  0.0 0.0 0.0
       1
 i = 1
  N  0.0 0.0 0.0
";
        let frames = parse_xyz_content(text).unwrap();
        assert!(frames_to_trajectory(&frames).is_err());
    }

    #[test]
    fn test_merge_forces_checks_step_ids() {
        let frames = parse_xyz_content(POS_TRAJ).unwrap();
        let mut traj = frames_to_trajectory(&frames).unwrap();

        let forces = "\
       3
 i =        0, time =        0.000, E =       -17.1538038869
  O         0.0000000000  0.0000000000  -0.0123000000
  H         0.0045000000  0.0000000000   0.0061500000
  H        -0.0045000000  0.0000000000   0.0061500000
       3
 i =        5, time =        0.500, E =       -17.1646143300
  O         0.0000000000  0.0000000000  -0.0100000000
  H         0.0040000000  0.0000000000   0.0050000000
  H        -0.0040000000  0.0000000000   0.0050000000
";
        let force_frames = parse_xyz_content(forces).unwrap();
        // 第二帧声称步 5, 与坐标流的步 1 对不上
        assert!(merge_force_frames(&mut traj, &force_frames).is_err());
    }

    #[test]
    fn test_cell_table_ignores_volume_column() {
        let table = "\
#   Step   Time [fs]       Ax            Ay            Az            Bx            By            Bz            Cx            Cy            Cz          Volume
       0       0.000     8.745000      0.000000      0.000000      0.000000      8.745000      0.000000      0.000000      0.000000      8.745000     668.876
       1       0.500     8.750000      0.000000      0.000000      0.000000      8.750000      0.000000      0.000000      0.000000      8.750000     670.023
";
        let rows = parse_cell_table_content(table).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].0, 1);
        assert!((rows[1].1[2][2] - 8.75).abs() < 1e-10);

        let frames = parse_xyz_content(POS_TRAJ).unwrap();
        let mut traj = frames_to_trajectory(&frames).unwrap();
        merge_cell_rows(&mut traj, &rows).unwrap();
        assert!(traj.cells.is_some());
    }

    #[test]
    fn test_concat_fragments_with_dedup() {
        let frames = parse_xyz_content(POS_TRAJ).unwrap();
        let first = frames_to_trajectory(&frames).unwrap();
        let second = frames_to_trajectory(&frames).unwrap();

        let merged = concat_fragments(vec![first, second], true).unwrap();
        assert_eq!(merged.step_ids, vec![0, 1]);

        let frames = parse_xyz_content(POS_TRAJ).unwrap();
        let first = frames_to_trajectory(&frames).unwrap();
        let second = frames_to_trajectory(&frames).unwrap();
        let merged = concat_fragments(vec![first, second], false).unwrap();
        assert_eq!(merged.n_frames(), 4);
    }
}
