//! # CP2K 输入文件编解码器
//!
//! 把输入树渲染成 CP2K 输入文本, 以及把输入文本读回输入树。
//!
//! ## 格式说明
//! ```text
//! !!! Generated by cpkit !!!
//! &GLOBAL
//!    PROJECT water            # 关键词行: KEY value
//!    RUN_TYPE ENERGY
//! &END GLOBAL
//! &FORCE_EVAL
//!    &SUBSYS
//!       &KIND H               # section 参数: &KEY param (树中的 "_" 键)
//!          BASIS_SET DZVP-GTH
//!       &END KIND
//!    &END SUBSYS
//! &END FORCE_EVAL
//! ```
//!
//! 同级键按字典序输出, 与插入顺序无关; 列表值按列表顺序展开成
//! 重复关键词 / 重复 section。渲染不改动调用方的树。
//!
//! ## 依赖关系
//! - 被 `commands/render.rs` 使用
//! - 使用 `models/tree.rs`

use std::fs;
use std::path::Path;

use crate::error::{CpkitError, Result};
use crate::models::{InputTree, Section, TreeValue};

/// 渲染输出的首行声明
pub const DISCLAIMER: &str = "!!! Generated by cpkit !!!";

/// 每层缩进宽度
const INDENT: usize = 3;

/// 把输入树渲染成 CP2K 输入文本
///
/// 任何非法关键词 (非大写、以 `@` / `$` 开头) 都让整个渲染失败,
/// 不产生半成品文本。
pub fn render_deck(tree: &InputTree) -> Result<String> {
    let mut lines = vec![DISCLAIMER.to_string()];
    render_body(&mut lines, tree.root(), 0, false)?;
    Ok(lines.join("\n"))
}

/// 渲染一个 section 的全部条目
///
/// `skip_param` 为真时跳过 `_` 键 (已由上级写进 `&KEY param` 行)。
fn render_body(
    lines: &mut Vec<String>,
    section: &Section,
    indent: usize,
    skip_param: bool,
) -> Result<()> {
    for (key, value) in section {
        if skip_param && key == "_" {
            continue;
        }
        validate_key(key)?;
        render_entry(lines, key, value, indent)?;
    }
    Ok(())
}

/// 渲染单个键值对, 列表值按元素逐个展开
fn render_entry(lines: &mut Vec<String>, key: &str, value: &TreeValue, indent: usize) -> Result<()> {
    let pad = " ".repeat(indent);
    match value {
        TreeValue::Section(map) => {
            match map.get("_") {
                Some(param) => {
                    lines.push(format!("{}&{} {}", pad, key, scalar_to_string(key, param)?))
                }
                None => lines.push(format!("{}&{}", pad, key)),
            }
            render_body(lines, map, indent + INDENT, true)?;
            lines.push(format!("{}&END {}", pad, key));
        }
        TreeValue::List(items) => {
            for item in items {
                render_entry(lines, key, item, indent)?;
            }
        }
        scalar => {
            lines.push(format!("{}{} {}", pad, key, scalar_to_string(key, scalar)?));
        }
    }
    Ok(())
}

/// 关键词合法性检查
fn validate_key(key: &str) -> Result<()> {
    if key != key.to_uppercase() {
        return Err(CpkitError::InvalidKeyword {
            key: key.to_string(),
            reason: "keyword is not upper case".to_string(),
        });
    }
    if key.starts_with('@') || key.starts_with('$') {
        return Err(CpkitError::InvalidKeyword {
            key: key.to_string(),
            reason: "CP2K preprocessor directives are not supported".to_string(),
        });
    }
    Ok(())
}

/// 标量的文本形式 (布尔写成 .TRUE. / .FALSE.)
fn scalar_to_string(key: &str, value: &TreeValue) -> Result<String> {
    match value {
        TreeValue::Bool(true) => Ok(".TRUE.".to_string()),
        TreeValue::Bool(false) => Ok(".FALSE.".to_string()),
        TreeValue::Int(i) => Ok(i.to_string()),
        TreeValue::Float(x) => Ok(format!("{:?}", x)),
        TreeValue::Str(s) => Ok(s.clone()),
        _ => Err(CpkitError::InvalidKeyword {
            key: key.to_string(),
            reason: "value is not a scalar".to_string(),
        }),
    }
}

/// 解析 CP2K 输入文件
pub fn parse_deck_file(path: &Path) -> Result<InputTree> {
    let content = fs::read_to_string(path).map_err(|e| CpkitError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_deck_content(&content)
}

/// 从字符串内容解析 CP2K 输入文法
///
/// 逆向的文法读取器: 关键词值一律读成字符串 (CP2K 输入本身无类型),
/// 重复出现的关键词 / section 收进列表, `&KEY param` 的参数进 `_` 键。
/// 注释行 (`!` / `#` 开头) 与空行跳过。
pub fn parse_deck_content(content: &str) -> Result<InputTree> {
    // 栈底是根 section, 名字留空
    let mut stack: Vec<(String, Section)> = vec![(String::new(), Section::new())];

    for (number, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('&') {
            let mut tokens = rest.split_whitespace();
            let head = tokens.next().unwrap_or("").to_uppercase();
            if head.is_empty() {
                return Err(deck_error(number, "bare '&' with no section name"));
            }

            if head == "END" {
                let closed = tokens.next().map(|t| t.to_uppercase());
                if stack.len() == 1 {
                    return Err(deck_error(number, "&END without an open section"));
                }
                let (name, section) = match stack.pop() {
                    Some(top) => top,
                    None => return Err(deck_error(number, "&END without an open section")),
                };
                if let Some(closed) = closed {
                    if closed != name {
                        return Err(deck_error(
                            number,
                            &format!("&END {} closes section {}", closed, name),
                        ));
                    }
                }
                if let Some((_, parent)) = stack.last_mut() {
                    insert_repeatable(parent, name, TreeValue::Section(section));
                }
            } else {
                let mut section = Section::new();
                let param = tokens.collect::<Vec<_>>().join(" ");
                if !param.is_empty() {
                    section.insert("_".to_string(), TreeValue::Str(param));
                }
                stack.push((head, section));
            }
            continue;
        }

        let mut tokens = line.split_whitespace();
        let key = match tokens.next() {
            Some(k) => k.to_uppercase(),
            None => continue,
        };
        let value = tokens.collect::<Vec<_>>().join(" ");
        if let Some((_, top)) = stack.last_mut() {
            insert_repeatable(top, key, TreeValue::Str(value));
        }
    }

    if stack.len() != 1 {
        let open: Vec<String> = stack.iter().skip(1).map(|(name, _)| name.clone()).collect();
        return Err(CpkitError::ParseError {
            format: "cp2k input".to_string(),
            context: open.join("/"),
            reason: "unclosed section at end of file".to_string(),
        });
    }
    let root = stack.pop().map(|(_, section)| section).unwrap_or_default();

    let mut tree = InputTree::new();
    *tree.root_mut() = root;
    Ok(tree)
}

/// 同名键重复出现时收进列表 (保持出现顺序)
fn insert_repeatable(section: &mut Section, key: String, value: TreeValue) {
    match section.remove(&key) {
        None => {
            section.insert(key, value);
        }
        Some(TreeValue::List(mut items)) => {
            items.push(value);
            section.insert(key, TreeValue::List(items));
        }
        Some(existing) => {
            section.insert(key, TreeValue::List(vec![existing, value]));
        }
    }
}

fn deck_error(line_number: usize, reason: &str) -> CpkitError {
    CpkitError::ParseError {
        format: "cp2k input".to_string(),
        context: format!("line {}", line_number + 1),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_keyword() {
        let tree = InputTree::from_json(r#"{"FOO": "bar"}"#).unwrap();
        let text = render_deck(&tree).unwrap();
        assert_eq!(text, format!("{}\nFOO bar", DISCLAIMER));
    }

    #[test]
    fn test_render_nested_sections() {
        let tree = InputTree::from_json(
            r#"{"GLOBAL": {"RUN_TYPE": "ENERGY", "PRINT_LEVEL": "LOW"}}"#,
        )
        .unwrap();
        let text = render_deck(&tree).unwrap();
        let expected = format!(
            "{}\n&GLOBAL\n   PRINT_LEVEL LOW\n   RUN_TYPE ENERGY\n&END GLOBAL",
            DISCLAIMER
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_repeated_sections_in_order() {
        let tree = InputTree::from_json(r#"{"KIND": [{"_": "H"}, {"_": "O"}]}"#).unwrap();
        let text = render_deck(&tree).unwrap();
        let expected = format!(
            "{}\n&KIND H\n&END KIND\n&KIND O\n&END KIND",
            DISCLAIMER
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_section_param_not_duplicated() {
        let tree = InputTree::from_json(
            r#"{"KIND": {"_": "H", "BASIS_SET": "DZVP-GTH"}}"#,
        )
        .unwrap();
        let text = render_deck(&tree).unwrap();
        let expected = format!(
            "{}\n&KIND H\n   BASIS_SET DZVP-GTH\n&END KIND",
            DISCLAIMER
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_booleans_and_numbers() {
        let tree = InputTree::from_json(
            r#"{"DFT": {"LSD": true, "UKS": false, "CHARGE": -1, "EPS": 1e-10}}"#,
        )
        .unwrap();
        let text = render_deck(&tree).unwrap();
        assert!(text.contains("   LSD .TRUE."));
        assert!(text.contains("   UKS .FALSE."));
        assert!(text.contains("   CHARGE -1"));
        assert!(text.contains("   EPS 1e-10"));
    }

    #[test]
    fn test_render_repeated_keyword_list() {
        let tree = InputTree::from_json(
            r#"{"DFT": {"BASIS_SET_FILE_NAME": ["BASIS_MOLOPT", "BASIS_GTH"]}}"#,
        )
        .unwrap();
        let text = render_deck(&tree).unwrap();
        let expected = format!(
            "{}\n&DFT\n   BASIS_SET_FILE_NAME BASIS_MOLOPT\n   BASIS_SET_FILE_NAME BASIS_GTH\n&END DFT",
            DISCLAIMER
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_rejects_preprocessor_key() {
        let tree = InputTree::from_json(r#"{"@SET": "var 1"}"#).unwrap();
        assert!(matches!(
            render_deck(&tree),
            Err(CpkitError::InvalidKeyword { .. })
        ));
    }

    #[test]
    fn test_render_rejects_lowercase_key() {
        let tree = InputTree::from_json(r#"{"GLOBAL": {"foo": "bar"}}"#).unwrap();
        assert!(render_deck(&tree).is_err());
    }

    #[test]
    fn test_render_does_not_mutate_tree() {
        let tree = InputTree::from_json(
            r#"{
                "FORCE_EVAL": [
                    {"DFT": {"LSD": true}},
                    {"SUBSYS": {"KIND": {"_": "H"}}}
                ]
            }"#,
        )
        .unwrap();
        let before = tree.clone();
        render_deck(&tree).unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn test_parse_reads_values_as_strings() {
        let text = "&GLOBAL\n   RUN_TYPE ENERGY\n&END GLOBAL\n&MOTION\n   &MD\n      STEPS 100\n   &END MD\n&END MOTION";
        let tree = parse_deck_content(text).unwrap();
        assert_eq!(
            tree.get_keyword("GLOBAL/RUN_TYPE").unwrap(),
            &TreeValue::Str("ENERGY".to_string())
        );
        assert_eq!(
            tree.get_keyword("MOTION/MD/STEPS").unwrap(),
            &TreeValue::Str("100".to_string())
        );
    }

    #[test]
    fn test_parse_collects_repeated_sections() {
        let text = "&KIND H\n   BASIS_SET DZVP-GTH\n&END KIND\n&KIND O\n   BASIS_SET TZVP-GTH\n&END KIND";
        let tree = parse_deck_content(text).unwrap();
        match tree.root().get("KIND").unwrap() {
            TreeValue::List(items) => assert_eq!(items.len(), 2),
            other => panic!("KIND 应为列表: {:?}", other),
        }
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let text = "! generated elsewhere\n\n&GLOBAL\n   # inline comment line\n   PROJECT water\n&END GLOBAL";
        let tree = parse_deck_content(text).unwrap();
        assert_eq!(
            tree.get_keyword("GLOBAL/PROJECT").unwrap(),
            &TreeValue::Str("water".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_unbalanced_sections() {
        assert!(parse_deck_content("&GLOBAL\n   PROJECT water").is_err());
        assert!(parse_deck_content("&END GLOBAL").is_err());
        assert!(parse_deck_content("&GLOBAL\n&END FORCE_EVAL").is_err());
    }

    #[test]
    fn test_round_trip_reproduces_keyword_set() {
        let tree = InputTree::from_json(
            r#"{
                "FORCE_EVAL": {
                    "DFT": {
                        "LSD": true,
                        "MGRID": {"CUTOFF": 400, "REL_CUTOFF": 50.0}
                    },
                    "SUBSYS": {
                        "KIND": [
                            {"_": "H", "BASIS_SET": "DZVP-GTH"},
                            {"_": "O", "BASIS_SET": "DZVP-GTH"}
                        ]
                    }
                },
                "GLOBAL": {"RUN_TYPE": "ENERGY"}
            }"#,
        )
        .unwrap();

        let text = render_deck(&tree).unwrap();
        let parsed = parse_deck_content(&text).unwrap();

        // 读回的值是字符串形式
        assert_eq!(
            parsed.get_keyword("FORCE_EVAL/DFT/LSD").unwrap(),
            &TreeValue::Str(".TRUE.".to_string())
        );
        assert_eq!(
            parsed.get_keyword("FORCE_EVAL/DFT/MGRID/CUTOFF").unwrap(),
            &TreeValue::Str("400".to_string())
        );
        assert_eq!(
            parsed
                .get_keyword("FORCE_EVAL/DFT/MGRID/REL_CUTOFF")
                .unwrap(),
            &TreeValue::Str("50.0".to_string())
        );

        // 重复 section 的个数与参数保持
        match parsed
            .get_section_map("FORCE_EVAL/SUBSYS")
            .unwrap()
            .get("KIND")
            .unwrap()
        {
            TreeValue::List(items) => {
                assert_eq!(items.len(), 2);
                let params: Vec<&TreeValue> = items
                    .iter()
                    .filter_map(|i| i.as_section())
                    .filter_map(|s| s.get("_"))
                    .collect();
                assert_eq!(params[0], &TreeValue::Str("H".to_string()));
                assert_eq!(params[1], &TreeValue::Str("O".to_string()));
            }
            other => panic!("KIND 应为列表: {:?}", other),
        }

        // 再渲染一遍得到完全相同的文本
        assert_eq!(render_deck(&parsed).unwrap(), text);
    }
}
