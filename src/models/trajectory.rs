//! # 轨迹数据模型
//!
//! 按步对齐的轨迹数组: 步号、能量、坐标, 可选的力与晶胞序列。
//! 不同来源文件 (坐标流 / 力流 / 晶胞表) 按步序合并, 长度必须一致。
//!
//! ## 依赖关系
//! - 被 `parsers/xyz.rs`, `parsers/restart.rs` 使用
//! - 被 `commands/traj.rs` 使用

use serde::{Deserialize, Serialize};

use crate::error::{CpkitError, Result};
use crate::models::structure::{split_kind_token, Cell, Site, Structure};

/// 一条按步对齐的轨迹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// 种类记号序列 (含数字标签, 如 H1), 所有帧共享
    pub symbols: Vec<String>,

    /// 步号
    pub step_ids: Vec<i64>,

    /// 每帧能量 (a.u., 注释行缺失时为 None)
    pub energies: Vec<Option<f64>>,

    /// 坐标 [帧][原子] (Å)
    pub positions: Vec<Vec<[f64; 3]>>,

    /// 力 [帧][原子] (a.u., 可选流)
    pub forces: Option<Vec<Vec<[f64; 3]>>>,

    /// 晶胞矩阵序列 (可选流)
    pub cells: Option<Vec<[[f64; 3]; 3]>>,
}

impl Trajectory {
    pub fn new(symbols: Vec<String>) -> Self {
        Trajectory {
            symbols,
            step_ids: Vec::new(),
            energies: Vec::new(),
            positions: Vec::new(),
            forces: None,
            cells: None,
        }
    }

    /// 帧数
    pub fn n_frames(&self) -> usize {
        self.step_ids.len()
    }

    /// 原子数
    pub fn n_atoms(&self) -> usize {
        self.symbols.len()
    }

    /// 追加一帧坐标
    pub fn push_frame(
        &mut self,
        step_id: i64,
        energy: Option<f64>,
        positions: Vec<[f64; 3]>,
    ) -> Result<()> {
        if positions.len() != self.symbols.len() {
            return Err(CpkitError::TrajectoryMismatch {
                reason: format!(
                    "frame {} carries {} atoms, expected {}",
                    step_id,
                    positions.len(),
                    self.symbols.len()
                ),
            });
        }
        self.step_ids.push(step_id);
        self.energies.push(energy);
        self.positions.push(positions);
        Ok(())
    }

    /// 挂接力流, 帧数必须与坐标流一致
    pub fn attach_forces(&mut self, forces: Vec<Vec<[f64; 3]>>) -> Result<()> {
        if forces.len() != self.n_frames() {
            return Err(CpkitError::TrajectoryMismatch {
                reason: format!(
                    "{} force frames against {} position frames",
                    forces.len(),
                    self.n_frames()
                ),
            });
        }
        for (i, frame) in forces.iter().enumerate() {
            if frame.len() != self.symbols.len() {
                return Err(CpkitError::TrajectoryMismatch {
                    reason: format!(
                        "force frame {} carries {} atoms, expected {}",
                        i,
                        frame.len(),
                        self.symbols.len()
                    ),
                });
            }
        }
        self.forces = Some(forces);
        Ok(())
    }

    /// 挂接晶胞序列, 帧数必须与坐标流一致
    pub fn attach_cells(&mut self, cells: Vec<[[f64; 3]; 3]>) -> Result<()> {
        if cells.len() != self.n_frames() {
            return Err(CpkitError::TrajectoryMismatch {
                reason: format!(
                    "{} cell rows against {} position frames",
                    cells.len(),
                    self.n_frames()
                ),
            });
        }
        self.cells = Some(cells);
        Ok(())
    }

    /// 顺序拼接另一段轨迹 (例如续算产生的第二段)
    ///
    /// 两段的种类记号序列必须一致; 力 / 晶胞流在两段都有时一并拼接,
    /// 只有一段有时丢弃 (无法对齐)。
    pub fn concat(&mut self, other: Trajectory) -> Result<()> {
        if self.symbols != other.symbols {
            return Err(CpkitError::TrajectoryMismatch {
                reason: "cannot concatenate trajectories with different atom kinds".to_string(),
            });
        }
        self.step_ids.extend(other.step_ids);
        self.energies.extend(other.energies);
        self.positions.extend(other.positions);

        self.forces = match (self.forces.take(), other.forces) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                Some(a)
            }
            _ => None,
        };
        self.cells = match (self.cells.take(), other.cells) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                Some(a)
            }
            _ => None,
        };
        Ok(())
    }

    /// 去除重复步号, 每个步号只保留第一次出现
    pub fn dedup_steps(&mut self) {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        let keep: Vec<bool> = self.step_ids.iter().map(|id| seen.insert(*id)).collect();
        if keep.iter().all(|k| *k) {
            return;
        }

        let mut index = 0;
        self.step_ids.retain(|_| {
            let k = keep[index];
            index += 1;
            k
        });
        let mut index = 0;
        self.energies.retain(|_| {
            let k = keep[index];
            index += 1;
            k
        });
        let mut index = 0;
        self.positions.retain(|_| {
            let k = keep[index];
            index += 1;
            k
        });
        if let Some(forces) = &mut self.forces {
            let mut index = 0;
            forces.retain(|_| {
                let k = keep[index];
                index += 1;
                k
            });
        }
        if let Some(cells) = &mut self.cells {
            let mut index = 0;
            cells.retain(|_| {
                let k = keep[index];
                index += 1;
                k
            });
        }
    }

    /// 取末帧为一个结构 (晶胞取末帧晶胞, 否则用给定的回退晶胞)
    pub fn last_structure(&self, fallback_cell: Option<Cell>) -> Option<Structure> {
        let positions = self.positions.last()?;
        let sites: Vec<Site> = self
            .symbols
            .iter()
            .zip(positions.iter())
            .map(|(symbol, pos)| {
                let (element, tag) = split_kind_token(symbol);
                Site::new(element, *pos).with_tag(tag)
            })
            .collect();

        let cell = self
            .cells
            .as_ref()
            .and_then(|cells| cells.last())
            .map(|m| Cell::from_vectors(*m))
            .or(fallback_cell);

        Some(Structure::new(sites, cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_frame_traj() -> Trajectory {
        let mut traj = Trajectory::new(vec!["O".to_string(), "H".to_string(), "H".to_string()]);
        traj.push_frame(
            0,
            Some(-17.1),
            vec![[0.0, 0.0, 0.0], [0.7, 0.5, 0.0], [-0.7, 0.5, 0.0]],
        )
        .unwrap();
        traj.push_frame(
            1,
            Some(-17.2),
            vec![[0.0, 0.0, 0.1], [0.7, 0.5, 0.1], [-0.7, 0.5, 0.1]],
        )
        .unwrap();
        traj
    }

    #[test]
    fn test_push_frame_checks_atom_count() {
        let mut traj = Trajectory::new(vec!["H".to_string()]);
        let result = traj.push_frame(0, None, vec![[0.0; 3], [1.0; 3]]);
        assert!(matches!(
            result,
            Err(CpkitError::TrajectoryMismatch { .. })
        ));
    }

    #[test]
    fn test_attach_forces_length_mismatch() {
        let mut traj = two_frame_traj();
        let result = traj.attach_forces(vec![vec![[0.0; 3]; 3]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_concat_and_dedup() {
        let mut first = two_frame_traj();
        let mut second = two_frame_traj();
        // 续算重复了步 1
        second.step_ids = vec![1, 2];

        first.concat(second).unwrap();
        assert_eq!(first.n_frames(), 4);

        first.dedup_steps();
        assert_eq!(first.step_ids, vec![0, 1, 2]);
        assert_eq!(first.energies.len(), 3);
        assert_eq!(first.positions.len(), 3);
    }

    #[test]
    fn test_concat_rejects_different_kinds() {
        let mut first = two_frame_traj();
        let second = Trajectory::new(vec!["He".to_string()]);
        assert!(first.concat(second).is_err());
    }

    #[test]
    fn test_last_structure() {
        let mut traj = two_frame_traj();
        traj.attach_cells(vec![[[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]; 2])
            .unwrap();

        let structure = traj.last_structure(None).unwrap();
        assert_eq!(structure.n_atoms(), 3);
        assert!((structure.sites[0].position[2] - 0.1).abs() < 1e-12);
        let cell = structure.cell.unwrap();
        assert!((cell.volume() - 1000.0).abs() < 1e-9);
    }
}
