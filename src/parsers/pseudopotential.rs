//! # GTH 赝势格式解析器
//!
//! 解析 / 生成 CP2K 的 Goedecker-Teter-Hutter 赝势文本格式。
//!
//! ## 格式说明
//! ```text
//! Ti GTH-PADE-q12 GTH-LDA-q12
//!     4    6    2                        # 各角动量通道电子数
//!      0.38000000    2     8.71144218    -0.70028677   # r_loc nexp 系数...
//!     3                                  # 非局域投影半径个数
//!      0.33777078    2     2.57526386     3.69297065   # 半径 投影子数 上三角系数
//!                                       -4.76760461    # 续行: 矩阵下一行
//!      0.24253135    2    -4.63054123     8.87087502
//!                                      -11.45625195
//!      0.24331694    1    -9.40665268
//! ```
//!
//! 记录之间可以有 `#` 注释与空行。一条记录坏掉只报告该条,
//! 整个文件的扫描继续。
//!
//! ## 依赖关系
//! - 被 `commands/data.rs` 使用
//! - 使用 `models/pseudo.rs`

use std::fs;
use std::path::Path;

use crate::error::{CpkitError, Result};
use crate::models::{GthPotential, GthProjector};
use crate::parsers::ScanFailure;

/// 一次赝势库文件扫描的结果
#[derive(Debug)]
pub struct PotentialScan {
    /// 成功解码的记录
    pub records: Vec<GthPotential>,

    /// 失败的记录 (上下文 + 原因)
    pub failures: Vec<ScanFailure>,
}

impl PotentialScan {
    /// 是否所有记录都解码成功
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 解析赝势库文件
pub fn parse_potential_file(path: &Path) -> Result<PotentialScan> {
    let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Err(CpkitError::EmptyFile {
            path: path.display().to_string(),
        });
    }
    Ok(parse_potential_content(&content))
}

/// 从字符串内容扫描多条赝势记录
///
/// 先剥掉 `#` 注释和空行, 再按 "以字母开头的行是新记录的元素行"
/// 切分记录, 逐条解码。
pub fn parse_potential_content(content: &str) -> PotentialScan {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.split('#').next().unwrap_or("").trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut groups: Vec<Vec<&str>> = Vec::new();
    for line in lines {
        let is_header = line
            .trim_start()
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false);
        if is_header || groups.is_empty() {
            groups.push(Vec::new());
        }
        if let Some(group) = groups.last_mut() {
            group.push(line);
        }
    }

    let mut scan = PotentialScan {
        records: Vec::new(),
        failures: Vec::new(),
    };
    for group in groups {
        let context = group.first().map(|l| l.trim().to_string()).unwrap_or_default();
        match parse_potential_record(&group) {
            Ok(record) => scan.records.push(record),
            Err(error) => scan.failures.push(ScanFailure { context, error }),
        }
    }
    scan
}

/// 解码单条赝势记录 (元素行到最后一个投影块)
pub fn parse_potential_record(lines: &[&str]) -> Result<GthPotential> {
    let mut cursor = lines.iter().map(|l| l.trim());

    // 第 1 逻辑行: 元素 + 名称别名
    let header = cursor
        .next()
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
    let names: Vec<String> = head_tokens.map(|t| t.to_string()).collect();
    let names_label = names.join(" ");
    if names.is_empty() {
        return Err(record_error(&element, "", "element line carries no name"));
    }

    // 第 2 逻辑行: 各通道电子数
    let elec_line = cursor
        .next()
        .ok_or_else(|| record_error(&element, &names_label, "missing electron configuration"))?;
    let n_elec = parse_ints(elec_line, &element, &names_label)?;
    if n_elec.is_empty() {
        return Err(record_error(
            &element,
            &names_label,
            "empty electron configuration",
        ));
    }

    // 第 3 逻辑行: r_loc nexp_ppl 系数...
    let local_line = cursor
        .next()
        .ok_or_else(|| record_error(&element, &names_label, "missing local part"))?;
    let local_numbers = parse_floats(local_line, &element, &names_label)?;
    if local_numbers.len() < 2 {
        return Err(record_error(&element, &names_label, "short local part line"));
    }
    let r_loc = local_numbers[0];
    let nexp_ppl = count_field(local_numbers[1], &element, &names_label)?;
    if local_numbers.len() - 2 != nexp_ppl {
        return Err(record_error(
            &element,
            &names_label,
            &format!(
                "local part declares {} coefficients but carries {}",
                nexp_ppl,
                local_numbers.len() - 2
            ),
        ));
    }
    let local_coefficients = local_numbers[2..].to_vec();

    // 第 4 逻辑行: 非局域投影半径个数
    let nprj_line = cursor
        .next()
        .ok_or_else(|| record_error(&element, &names_label, "missing projector count"))?;
    let nprj = parse_ints(nprj_line, &element, &names_label)?;
    if nprj.len() != 1 {
        return Err(record_error(
            &element,
            &names_label,
            "projector count line must hold a single integer",
        ));
    }
    let nprj = nprj[0] as usize;

    // 第 5 逻辑行组: 每个半径一行, 上三角系数可跨续行; 预分配以行数为上限
    let mut projectors = Vec::with_capacity(nprj.min(lines.len()));
    for _ in 0..nprj {
        let first = cursor.next().ok_or_else(|| {
            record_error(&element, &names_label, "missing non-local projector line")
        })?;
        let numbers = parse_floats(first, &element, &names_label)?;
        if numbers.len() < 2 {
            return Err(record_error(
                &element,
                &names_label,
                "bad projector radius line",
            ));
        }
        let radius = numbers[0];
        let n_projectors = count_field(numbers[1], &element, &names_label)?;
        let needed = GthProjector::expected_coefficients(n_projectors);

        let mut coefficients = numbers[2..].to_vec();
        while coefficients.len() < needed {
            let continuation = cursor.next().ok_or_else(|| {
                record_error(
                    &element,
                    &names_label,
                    &format!(
                        "projector block ends after {} of {} coefficients",
                        coefficients.len(),
                        needed
                    ),
                )
            })?;
            coefficients.extend(parse_floats(continuation, &element, &names_label)?);
        }
        if coefficients.len() != needed {
            return Err(record_error(
                &element,
                &names_label,
                &format!(
                    "projector block carries {} coefficients, expected {}",
                    coefficients.len(),
                    needed
                ),
            ));
        }

        projectors.push(GthProjector {
            radius,
            n_projectors,
            coefficients,
        });
    }

    if cursor.next().is_some() {
        return Err(record_error(
            &element,
            &names_label,
            "unexpected lines after the last projector block",
        ));
    }

    GthPotential {
        element,
        names,
        n_elec,
        r_loc,
        local_coefficients,
        projectors,
        potential_type: None,
        xc_functional: None,
        n_val: None,
    }
    .finalize()
}

/// 把赝势记录编码回 CP2K 文本 (定宽字段, 8 位小数)
pub fn to_potential_string(pot: &GthPotential) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} {}\n", pot.element, pot.names.join(" ")));

    let elec: String = pot.n_elec.iter().map(|n| format!("{:5}", n)).collect();
    out.push_str(&elec);
    out.push('\n');

    let mut local = format!("{:15.8}{:5}", pot.r_loc, pot.local_coefficients.len());
    for c in &pot.local_coefficients {
        local.push_str(&format!("{:15.8}", c));
    }
    out.push_str(&local);
    out.push('\n');

    out.push_str(&format!("{:5}\n", pot.projectors.len()));

    for prj in &pot.projectors {
        let n = prj.n_projectors;
        let mut line = format!("{:15.8}{:5}", prj.radius, n);
        for c in prj.coefficients.iter().take(n) {
            line.push_str(&format!("{:15.8}", c));
        }
        out.push_str(&line);
        out.push('\n');

        // 上三角矩阵第 row 行缩进 20 + 15*row, 与首行系数列对齐
        let mut idx = n;
        for row in 1..n {
            let count = n - row;
            let mut line = " ".repeat(20 + 15 * row);
            for c in prj.coefficients.iter().skip(idx).take(count) {
                line.push_str(&format!("{:15.8}", c));
            }
            idx += count;
            out.push_str(&line);
            out.push('\n');
        }
    }

    out
}

fn parse_floats(line: &str, element: &str, names: &str) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|t| {
            t.parse::<f64>().map_err(|_| {
                record_error(element, names, &format!("bad numeric field: {:?}", t))
            })
        })
        .collect()
}

fn parse_ints(line: &str, element: &str, names: &str) -> Result<Vec<u32>> {
    line.split_whitespace()
        .map(|t| {
            t.parse::<u32>().map_err(|_| {
                record_error(element, names, &format!("bad integer field: {:?}", t))
            })
        })
        .collect()
}

/// 混在浮点行里的计数字段: 必须是 0..=u32::MAX 范围内的整数值
fn count_field(value: f64, element: &str, names: &str) -> Result<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(record_error(
            element,
            names,
            &format!("bad count field: {:?}", value),
        ));
    }
    Ok(value as usize)
}

fn record_error(element: &str, names: &str, reason: &str) -> CpkitError {
    CpkitError::RecordError {
        format: "GTH potential".to_string(),
        element: element.to_string(),
        names: names.to_string(),
        reason: reason.to_string(),
    }
}
