//! # 高斯基组格式解析器
//!
//! 解析 / 生成 CP2K 的 Gaussian 基组文本格式。
//!
//! ## 格式说明
//! ```text
//! H  DZVP-GTH
//!   1                                    # 块数
//!   1  0  0  4  2                        # n lmin lmax nexp nshell(lmin..lmax)
//!       8.37443500  -0.02833805   0.00000000   # 指数 + 每个 shell 一列系数
//!       1.80586815  -0.13338101   0.00000000
//!       0.48525283  -0.39956761   0.00000000
//!       0.16582369  -0.55310275   1.00000000
//! ```
//!
//! 每块按角动量 l 从 lmin 到 lmax 展开轨道: 每个 shell 占一个系数列,
//! 对每个磁量子数 m ∈ [-l, +l] 生成一条轨道, 指数列沿 nexp 行共享。
//! 文件级驱动用 (行号, 剩余块数, 剩余行数) 状态机切分多条基组,
//! 每凑齐一条立即交给接收方; 坏记录单独报告, 扫描继续。
//!
//! ## 依赖关系
//! - 被 `commands/data.rs` 使用
//! - 使用 `models/basis.rs`

use std::fs;
use std::path::Path;

use crate::error::{CpkitError, Result};
use crate::models::{BasisSet, OrbitalQuantumNumbers};
use crate::parsers::ScanFailure;

/// 一次基组库文件扫描的结果
#[derive(Debug)]
pub struct BasisScan {
    /// 成功解码的记录
    pub records: Vec<BasisSet>,

    /// 失败的记录 (上下文 + 原因)
    pub failures: Vec<ScanFailure>,
}

impl BasisScan {
    /// 是否所有记录都解码成功
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 解析基组库文件
pub fn parse_basisset_file(path: &Path) -> Result<BasisScan> {
    let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Err(CpkitError::EmptyFile {
            path: path.display().to_string(),
        });
    }
    Ok(parse_basisset_content(&content))
}

/// 从字符串内容扫描多条基组记录
pub fn parse_basisset_content(content: &str) -> BasisScan {
    let mut records = Vec::new();
    let failures = scan_basisset_content(content, |basis| records.push(basis));
    BasisScan { records, failures }
}

/// 基组文件的状态机驱动
///
/// 剥掉 `#` 注释与空行后逐行推进: 第 1 行是元素行, 第 2 行是块数;
/// 剩余行数归零说明下一行是新块头 (行数取其第 4 个字段),
/// 剩余块数归零且剩余行数为 1 说明当前行收尾一条基组。
/// 凑齐的基组立即解码并交给 `sink`; 驱动自身出错时跳行直到
/// 下一个以字母开头的元素行重新同步。
pub fn scan_basisset_content<S>(content: &str, mut sink: S) -> Vec<ScanFailure>
where
    S: FnMut(BasisSet),
{
    let mut failures: Vec<ScanFailure> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut line_number = 0usize;
    let mut n_blocks: i64 = 0;
    let mut n_rows: i64 = 0;
    let mut skipping = false;

    let fail = |failures: &mut Vec<ScanFailure>, current: &mut Vec<&str>, reason: String| {
        let context = current.first().map(|l| l.to_string()).unwrap_or_default();
        failures.push(ScanFailure {
            context: context.clone(),
            error: CpkitError::ParseError {
                format: "basis set".to_string(),
                context,
                reason,
            },
        });
        current.clear();
    };

    for raw in content.lines() {
        let line = match raw.split('#').next() {
            Some(text) => text.trim(),
            None => "",
        };
        if line.is_empty() {
            continue;
        }

        let is_element_line = line
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false);
        if skipping {
            if !is_element_line {
                continue;
            }
            skipping = false;
            line_number = 0;
            n_blocks = 0;
            n_rows = 0;
        }

        current.push(line);
        line_number += 1;

        match line_number {
            1 => {}
            2 => {
                n_blocks = match line.split_whitespace().next().and_then(|t| t.parse().ok()) {
                    Some(n) if n > 0 => n,
                    _ => {
                        fail(
                            &mut failures,
                            &mut current,
                            format!("bad set count line: {:?}", line),
                        );
                        skipping = true;
                        continue;
                    }
                };
                n_rows = 0;
            }
            _ => {
                if n_rows == 0 {
                    // 新块头, 第 4 个字段是本块的行数
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    n_rows = match fields.get(3).and_then(|t| t.parse().ok()) {
                        Some(n) if n > 0 => n,
                        _ => {
                            fail(
                                &mut failures,
                                &mut current,
                                format!("bad block header line: {:?}", line),
                            );
                            skipping = true;
                            continue;
                        }
                    };
                    n_blocks -= 1;
                } else if n_blocks == 0 && n_rows == 1 {
                    // 最后一块的最后一行, 一条基组凑齐
                    match parse_basisset_record(&current) {
                        Ok(basis) => sink(basis),
                        Err(error) => {
                            let context =
                                current.first().map(|l| l.to_string()).unwrap_or_default();
                            failures.push(ScanFailure { context, error });
                        }
                    }
                    current.clear();
                    line_number = 0;
                    n_blocks = 0;
                    n_rows = 0;
                } else {
                    n_rows -= 1;
                }
            }
        }
    }

    if !current.is_empty() {
        fail(
            &mut failures,
            &mut current,
            "basis set truncated at end of file".to_string(),
        );
    }

    failures
}

/// 解码单条基组记录 (元素行到最后一块的最后一行)
pub fn parse_basisset_record(lines: &[&str]) -> Result<BasisSet> {
    let header = lines
        .first()
        .ok_or_else(|| record_error("?", "", "record is empty"))?;
    let mut head_tokens = header.split_whitespace();
    let element = head_tokens
        .next()
        .ok_or_else(|| record_error("?", "", "missing element symbol"))?
        .to_string();
    if !element.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(record_error(
            &element,
            "",
            "record does not start with an element line",
        ));
    }
    let name = head_tokens
        .next()
        .ok_or_else(|| record_error(&element, "", "element line carries no basis name"))?
        .to_string();

    let n_blocks: usize = lines
        .get(1)
        .and_then(|l| l.split_whitespace().next())
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| record_error(&element, &name, "bad set count line"))?;

    let mut qns: Vec<OrbitalQuantumNumbers> = Vec::new();
    let mut pair_lists: Vec<Vec<(f64, f64)>> = Vec::new();

    let mut idx = 2;
    for _ in 0..n_blocks {
        let header = lines
            .get(idx)
            .ok_or_else(|| record_error(&element, &name, "missing block header"))?;
        idx += 1;

        let fields = parse_ints(header, &element, &name)?;
        if fields.len() < 5 {
            return Err(record_error(&element, &name, "short block header"));
        }
        let n = fields[0];
        let lmin = fields[1];
        let lmax = fields[2];
        let nexp = fields[3] as usize;
        let nshell = &fields[4..];
        if lmax < lmin || nshell.len() as u64 != lmax as u64 - lmin as u64 + 1 {
            return Err(record_error(
                &element,
                &name,
                &format!(
                    "block header declares l in [{}, {}] but {} shell counts",
                    lmin,
                    lmax,
                    nshell.len()
                ),
            ));
        }
        if lmax > 11 {
            return Err(record_error(
                &element,
                &name,
                &format!("angular momentum {} is out of range", lmax),
            ));
        }
        if nexp == 0 {
            return Err(record_error(&element, &name, "block declares no exponent rows"));
        }
        let total_shells: u64 = nshell.iter().map(|&s| u64::from(s)).sum();

        // nexp 行: 指数 + 每个 shell 一列系数; 预分配以剩余行数为上限
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(nexp.min(lines.len().saturating_sub(idx)));
        for _ in 0..nexp {
            let row_line = lines
                .get(idx)
                .ok_or_else(|| record_error(&element, &name, "missing exponent row"))?;
            idx += 1;
            let row = parse_floats(row_line, &element, &name)?;
            if row.len() as u64 != 1 + total_shells {
                return Err(record_error(
                    &element,
                    &name,
                    &format!(
                        "exponent row carries {} numbers, expected {}",
                        row.len(),
                        1 + total_shells
                    ),
                ));
            }
            rows.push(row);
        }

        // 轨道展开: l 从 lmin 到 lmax, 每个 shell 占下一个系数列,
        // 每个 m 共享该列切出的 (指数, 系数) 对
        let mut col = 0usize;
        for (offset, &shells) in nshell.iter().enumerate() {
            let l_abs = lmin + offset as u32;
            for _ in 0..shells {
                let pairs: Vec<(f64, f64)> =
                    rows.iter().map(|row| (row[0], row[1 + col])).collect();
                for m in -(l_abs as i32)..=(l_abs as i32) {
                    qns.push(OrbitalQuantumNumbers {
                        n,
                        l: l_abs,
                        m,
                        spin: 0,
                        contraction: col,
                    });
                    pair_lists.push(pairs.clone());
                }
                col += 1;
            }
        }
    }

    if idx != lines.len() {
        return Err(record_error(
            &element,
            &name,
            "unexpected lines after the last block",
        ));
    }

    BasisSet::from_parts(element, name, qns, pair_lists)
}

/// 把基组记录编码回 CP2K 文本
///
/// 从展平的轨道序列重建块结构: 相邻且 (n, 指数列) 相同的轨道归同一块。
pub fn to_basisset_string(basis: &BasisSet) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!("{}  {}\n", basis.element, basis.name));

    let blocks = rebuild_blocks(basis)?;
    out.push_str(&format!("{:3}\n", blocks.len()));

    for block in blocks {
        let mut header = format!(
            "{:3}{:3}{:3}{:3}",
            block.n,
            block.lmin,
            block.lmax,
            block.rows.len()
        );
        for count in &block.nshell {
            header.push_str(&format!("{:3}", count));
        }
        out.push_str(&header);
        out.push('\n');

        for row in &block.rows {
            let mut line = String::new();
            for value in row {
                line.push_str(&format!("{:16.8}", value));
            }
            out.push_str(&line);
            out.push('\n');
        }
    }

    Ok(out)
}

struct EncodedBlock {
    n: u32,
    lmin: u32,
    lmax: u32,
    nshell: Vec<u32>,
    /// 行 = 指数 + 每 shell 一列系数
    rows: Vec<Vec<f64>>,
}

fn rebuild_blocks(basis: &BasisSet) -> Result<Vec<EncodedBlock>> {
    let mut blocks: Vec<EncodedBlock> = Vec::new();
    let mut i = 0;

    while i < basis.orbital_quantum_numbers.len() {
        let n = basis.orbital_quantum_numbers[i].n;
        let exponents: Vec<f64> = basis.orbital_exponents[i].iter().map(|p| p.0).collect();

        // 本块范围: 相邻且主量子数与指数列一致的轨道
        let mut j = i;
        while j < basis.orbital_quantum_numbers.len() {
            let qn = &basis.orbital_quantum_numbers[j];
            let exp_j: Vec<f64> = basis.orbital_exponents[j].iter().map(|p| p.0).collect();
            if qn.n != n || exp_j != exponents {
                break;
            }
            j += 1;
        }

        // 按系数列分组, 检查每列的 m 覆盖完整
        let mut shell_l: Vec<u32> = Vec::new();
        let mut shell_coeffs: Vec<Vec<f64>> = Vec::new();
        let mut k = i;
        while k < j {
            let qn = &basis.orbital_quantum_numbers[k];
            if qn.l > 11 {
                return Err(encode_error(
                    basis,
                    &format!("angular momentum {} is out of range", qn.l),
                ));
            }
            let expected_m = (2 * qn.l + 1) as usize;
            let run_end = (k + expected_m).min(j);
            let run = &basis.orbital_quantum_numbers[k..run_end];
            if run.len() != expected_m
                || run.iter().any(|o| o.l != qn.l || o.contraction != qn.contraction)
            {
                return Err(encode_error(
                    basis,
                    &format!("shell at orbital {} has an incomplete m range", k),
                ));
            }
            shell_l.push(qn.l);
            shell_coeffs.push(basis.orbital_exponents[k].iter().map(|p| p.1).collect());
            k = run_end;
        }

        let lmin = match shell_l.first() {
            Some(l) => *l,
            None => return Err(encode_error(basis, "block carries no shells")),
        };
        let lmax = match shell_l.last() {
            Some(l) => *l,
            None => return Err(encode_error(basis, "block carries no shells")),
        };
        if lmax < lmin {
            return Err(encode_error(basis, "shell angular momenta out of order"));
        }
        let mut nshell = vec![0u32; (lmax - lmin + 1) as usize];
        let mut previous = lmin;
        for &l in &shell_l {
            if l < previous || l > lmax {
                return Err(encode_error(basis, "shell angular momenta out of order"));
            }
            previous = l;
            nshell[(l - lmin) as usize] += 1;
        }
        if nshell.iter().any(|&c| c == 0) {
            return Err(encode_error(
                basis,
                "angular momentum gap inside one block",
            ));
        }

        let rows: Vec<Vec<f64>> = exponents
            .iter()
            .enumerate()
            .map(|(row, &exp)| {
                let mut line = vec![exp];
                for coeffs in &shell_coeffs {
                    line.push(coeffs[row]);
                }
                line
            })
            .collect();

        blocks.push(EncodedBlock {
            n,
            lmin,
            lmax,
            nshell,
            rows,
        });
        i = j;
    }

    Ok(blocks)
}

fn parse_floats(line: &str, element: &str, name: &str) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| record_error(element, name, &format!("bad numeric field: {:?}", t)))
        })
        .collect()
}

fn parse_ints(line: &str, element: &str, name: &str) -> Result<Vec<u32>> {
    line.split_whitespace()
        .map(|t| {
            t.parse::<u32>()
                .map_err(|_| record_error(element, name, &format!("bad integer field: {:?}", t)))
        })
        .collect()
}

fn record_error(element: &str, name: &str, reason: &str) -> CpkitError {
    CpkitError::RecordError {
        format: "basis set".to_string(),
        element: element.to_string(),
        names: name.to_string(),
        reason: reason.to_string(),
    }
}

fn encode_error(basis: &BasisSet, reason: &str) -> CpkitError {
    CpkitError::RecordError {
        format: "basis set".to_string(),
        element: basis.element.clone(),
        names: basis.name.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HYDROGEN_DZVP: &str = "\
H  DZVP-GTH
  1
  1  0  0  4  2
      8.37443500     -0.02833805      0.00000000
      1.80586815     -0.13338101      0.00000000
      0.48525283     -0.39956761      0.00000000
      0.16582369     -0.55310275      1.00000000
";

    const OXYGEN_SP: &str = "\
O  SZV-GTH
  1
  2  0  1  4  1  1
     12.01595470     -0.06019084      0.03654364
      5.10815029     -0.12959792      0.12092765
      1.48615255      0.13663937      0.27267355
      0.39757818      0.59879287      0.40778437
";

    #[test]
    fn test_parse_single_l_block() {
        let lines: Vec<&str> = HYDROGEN_DZVP
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let basis = parse_basisset_record(&lines).unwrap();

        assert_eq!(basis.element, "H");
        assert_eq!(basis.name, "DZVP-GTH");
        assert_eq!(basis.tags, vec!["DZVP", "GTH"]);
        // 2 个 s shell, 各 1 条 m=0 轨道
        assert_eq!(basis.n_orbitals(), 2);
        assert_eq!(basis.orbital_quantum_numbers[0].contraction, 0);
        assert_eq!(basis.orbital_quantum_numbers[1].contraction, 1);

        // 指数沿列共享, 系数按 shell 取列
        let pairs = &basis.orbital_exponents[1];
        assert_eq!(pairs.len(), 4);
        assert!((pairs[3].0 - 0.16582369).abs() < 1e-8);
        assert!((pairs[3].1 - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_parse_sp_block_orbital_expansion() {
        let lines: Vec<&str> = OXYGEN_SP.lines().filter(|l| !l.trim().is_empty()).collect();
        let basis = parse_basisset_record(&lines).unwrap();

        // lmin=0, lmax=1, nshell=[1,1]: 1 条 s + 3 条 p
        assert_eq!(basis.n_orbitals(), 4);
        let ls: Vec<u32> = basis
            .orbital_quantum_numbers
            .iter()
            .map(|qn| qn.l)
            .collect();
        assert_eq!(ls, vec![0, 1, 1, 1]);
        let ms: Vec<i32> = basis
            .orbital_quantum_numbers
            .iter()
            .map(|qn| qn.m)
            .collect();
        assert_eq!(ms, vec![0, -1, 0, 1]);
        let cols: Vec<usize> = basis
            .orbital_quantum_numbers
            .iter()
            .map(|qn| qn.contraction)
            .collect();
        assert_eq!(cols, vec![0, 1, 1, 1]);

        // p 轨道共享第二个系数列
        for orbital in &basis.orbital_exponents[1..] {
            assert!((orbital[0].1 - 0.03654364).abs() < 1e-8);
        }
    }

    #[test]
    fn test_parse_rejects_short_row() {
        let bad = OXYGEN_SP.replace("     12.01595470     -0.06019084      0.03654364", "     12.01595470     -0.06019084");
        let lines: Vec<&str> = bad.lines().filter(|l| !l.trim().is_empty()).collect();
        assert!(matches!(
            parse_basisset_record(&lines),
            Err(CpkitError::RecordError { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_hostile_block_header() {
        // l 超出物理范围
        let big_l = "H  BAD\n  1\n  1  12  12  1  1\n      1.00000000      1.00000000\n";
        let lines: Vec<&str> = big_l.lines().filter(|l| !l.trim().is_empty()).collect();
        assert!(matches!(
            parse_basisset_record(&lines),
            Err(CpkitError::RecordError { .. })
        ));

        // 壳层数之和巨大, 求和不得回绕
        let big_shells = "H  BAD\n  1\n  1  0  1  1  3000000000  3000000000\n      1.00000000      1.00000000      1.00000000\n";
        let lines: Vec<&str> = big_shells.lines().filter(|l| !l.trim().is_empty()).collect();
        assert!(parse_basisset_record(&lines).is_err());

        // 零条指数行
        let no_rows = "H  BAD\n  1\n  1  0  0  0  1\n";
        let lines: Vec<&str> = no_rows.lines().filter(|l| !l.trim().is_empty()).collect();
        assert!(parse_basisset_record(&lines).is_err());
    }

    #[test]
    fn test_file_driver_splits_sets() {
        let library = format!("# GTH basis sets\n{}\n{}", HYDROGEN_DZVP, OXYGEN_SP);
        let scan = parse_basisset_content(&library);

        assert!(scan.is_clean());
        assert_eq!(scan.records.len(), 2);
        assert_eq!(scan.records[0].element, "H");
        assert_eq!(scan.records[1].element, "O");
    }

    #[test]
    fn test_file_driver_isolates_bad_set() {
        // 中间一条的块头缺字段, 前后两条照常解析
        let broken = "X  BAD-SET\n  1\n  1  0  0\n";
        let library = format!("{}{}{}", HYDROGEN_DZVP, broken, OXYGEN_SP);
        let scan = parse_basisset_content(&library);

        assert_eq!(scan.records.len(), 2);
        assert_eq!(scan.failures.len(), 1);
        assert!(scan.failures[0].context.starts_with("X  BAD-SET"));
    }

    #[test]
    fn test_file_driver_reports_truncated_set() {
        let truncated = "H  DZVP-GTH\n  1\n  1  0  0  4  2\n      8.37443500     -0.02833805      0.00000000\n";
        let scan = parse_basisset_content(truncated);

        assert!(scan.records.is_empty());
        assert_eq!(scan.failures.len(), 1);
    }

    #[test]
    fn test_sink_receives_sets_in_order() {
        let library = format!("{}{}", HYDROGEN_DZVP, OXYGEN_SP);
        let mut seen = Vec::new();
        let failures = scan_basisset_content(&library, |basis| seen.push(basis.element.clone()));

        assert!(failures.is_empty());
        assert_eq!(seen, vec!["H", "O"]);
    }

    #[test]
    fn test_encode_round_trip() {
        let lines: Vec<&str> = OXYGEN_SP.lines().filter(|l| !l.trim().is_empty()).collect();
        let basis = parse_basisset_record(&lines).unwrap();

        let text = to_basisset_string(&basis).unwrap();
        let back_lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let back = parse_basisset_record(&back_lines).unwrap();

        assert_eq!(back.element, basis.element);
        assert_eq!(back.name, basis.name);
        assert_eq!(back.orbital_quantum_numbers, basis.orbital_quantum_numbers);
        for (a, b) in back
            .orbital_exponents
            .iter()
            .zip(basis.orbital_exponents.iter())
        {
            for ((ea, ca), (eb, cb)) in a.iter().zip(b.iter()) {
                assert!((ea - eb).abs() < 1e-8);
                assert!((ca - cb).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_encode_rejects_absurd_quantum_numbers() {
        let qn = |l: u32, m: i32, c: usize| OrbitalQuantumNumbers {
            n: 2,
            l,
            m,
            spin: 0,
            contraction: c,
        };

        // l 超出物理范围
        let huge_l = BasisSet::from_parts(
            "H",
            "BAD",
            vec![qn(u32::MAX, 0, 0)],
            vec![vec![(1.0, 1.0)]],
        )
        .unwrap();
        assert!(to_basisset_string(&huge_l).is_err());

        // 壳层 l 乱序, 中间壳层高于末尾
        let mut qns = vec![qn(0, 0, 0)];
        for m in -2..=2 {
            qns.push(qn(2, m, 1));
        }
        for m in -1..=1 {
            qns.push(qn(1, m, 2));
        }
        let pairs = vec![vec![(1.0, 1.0)]; qns.len()];
        let reordered = BasisSet::from_parts("H", "BAD", qns, pairs).unwrap();
        assert!(to_basisset_string(&reordered).is_err());

        // 壳层 l 整体递减
        let mut qns = Vec::new();
        for m in -2..=2 {
            qns.push(qn(2, m, 0));
        }
        qns.push(qn(0, 0, 1));
        let pairs = vec![vec![(1.0, 1.0)]; qns.len()];
        let descending = BasisSet::from_parts("H", "BAD", qns, pairs).unwrap();
        assert!(to_basisset_string(&descending).is_err());
    }
}
