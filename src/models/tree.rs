//! # CP2K 输入树模型
//!
//! 以嵌套树表示 CP2K 输入文件的 &SECTION / KEYWORD 层级结构，
//! 支持按路径读写关键词、重复 section 的广播写入、以及深度合并。
//!
//! ## 数据结构
//!
//! ```text
//! {
//!     "GLOBAL": {"RUN_TYPE": "GEO_OPT"},
//!     "FORCE_EVAL": [                      <- 重复 section 表示为列表
//!         {"DFT": {"MGRID": {"CUTOFF": 400}}},
//!         {"DFT": {"MGRID": {"CUTOFF": 600}}}
//!     ]
//! }
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/deck` 用于渲染与解析
//! - 被 `models/structure` 用于结构注入
//! - 被 `commands/render` 使用

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CpkitError, Result};

/// section 内容: 键按字典序排列, 保证渲染输出确定
pub type Section = BTreeMap<String, TreeValue>;

/// 输入树节点: 标量关键词值、重复列表或嵌套 section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    /// 逻辑值 (渲染为 .TRUE. / .FALSE.)
    Bool(bool),
    /// 整数
    Int(i64),
    /// 浮点数
    Float(f64),
    /// 字符串
    Str(String),
    /// 重复 section 或标量序列
    List(Vec<TreeValue>),
    /// 嵌套 section
    Section(Section),
}

impl TreeValue {
    /// 判断是否为 section 节点
    pub fn is_section(&self) -> bool {
        matches!(self, TreeValue::Section(_))
    }

    /// 以 section 引用访问, 非 section 返回 None
    pub fn as_section(&self) -> Option<&Section> {
        match self {
            TreeValue::Section(map) => Some(map),
            _ => None,
        }
    }

    /// 以可变 section 引用访问
    pub fn as_section_mut(&mut self) -> Option<&mut Section> {
        match self {
            TreeValue::Section(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for TreeValue {
    fn from(v: bool) -> Self {
        TreeValue::Bool(v)
    }
}

impl From<i64> for TreeValue {
    fn from(v: i64) -> Self {
        TreeValue::Int(v)
    }
}

impl From<f64> for TreeValue {
    fn from(v: f64) -> Self {
        TreeValue::Float(v)
    }
}

impl From<&str> for TreeValue {
    fn from(v: &str) -> Self {
        TreeValue::Str(v.to_string())
    }
}

impl From<String> for TreeValue {
    fn from(v: String) -> Self {
        TreeValue::Str(v)
    }
}

impl From<Section> for TreeValue {
    fn from(v: Section) -> Self {
        TreeValue::Section(v)
    }
}

/// CP2K 输入树
///
/// 根节点是一个 section, 路径参数统一用 `/` 分隔, 如
/// `FORCE_EVAL/DFT/MGRID/CUTOFF`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputTree {
    root: Section,
}

impl InputTree {
    /// 创建空树
    pub fn new() -> Self {
        InputTree {
            root: Section::new(),
        }
    }

    /// 从 JSON 文本构建输入树
    pub fn from_json(content: &str) -> Result<Self> {
        let tree: InputTree = serde_json::from_str(content)?;
        Ok(tree)
    }

    /// 序列化为带缩进的 JSON 文本
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 根 section 引用
    pub fn root(&self) -> &Section {
        &self.root
    }

    /// 根 section 可变引用
    pub fn root_mut(&mut self) -> &mut Section {
        &mut self.root
    }

    /// 树是否为空
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// 按路径写入关键词
    ///
    /// 中间路径段不存在时自动创建空 section; 路径段命中重复 section
    /// (列表) 时广播写入每个元素。`overwrite` 控制两类冲突:
    ///
    /// - 中间段命中标量: true 时以空 section 替换后继续, false 时跳过
    /// - 末段已有值或存在 `conflicting_keys` 同级键: true 时覆盖并删除
    ///   冲突键, false 时保持原值不动
    pub fn set_keyword(
        &mut self,
        path: &str,
        value: TreeValue,
        overwrite: bool,
        conflicting_keys: &[&str],
    ) -> Result<()> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(CpkitError::InvalidArgument(format!(
                "Empty keyword path: {:?}",
                path
            )));
        }
        set_in_section(&mut self.root, &segments, &value, overwrite, conflicting_keys);
        Ok(())
    }

    /// 按路径读取关键词值
    ///
    /// 路径段缺失返回 `KeywordMissing`, 终点是 section 返回 `KeywordType`。
    pub fn get_keyword(&self, path: &str) -> Result<&TreeValue> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (last, parents) = segments.split_last().ok_or_else(|| {
            CpkitError::InvalidArgument(format!("Empty keyword path: {:?}", path))
        })?;

        let mut current = &self.root;
        for (i, segment) in parents.iter().enumerate() {
            let value = current.get(*segment).ok_or_else(|| CpkitError::KeywordMissing {
                path: segments[..=i].join("/"),
            })?;
            // 中间段必须是 section 才能继续下钻
            current = match value {
                TreeValue::Section(map) => map,
                _ => {
                    return Err(CpkitError::KeywordMissing {
                        path: segments[..=i].join("/"),
                    })
                }
            };
        }

        match current.get(*last) {
            Some(TreeValue::Section(_)) => Err(CpkitError::KeywordType {
                path: path.to_string(),
                reason: "path points at a section, not a keyword".to_string(),
            }),
            Some(value) => Ok(value),
            None => Err(CpkitError::KeywordMissing {
                path: path.to_string(),
            }),
        }
    }

    /// 按路径取出整个 section 的副本 (空路径表示根)
    ///
    /// 目标或任一中间段是重复 section (列表) 时无法给出唯一映射, 返回错误。
    pub fn get_section_map(&self, path: &str) -> Result<Section> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut current = &self.root;
        for (i, segment) in segments.iter().enumerate() {
            let value = current.get(*segment).ok_or_else(|| CpkitError::KeywordMissing {
                path: segments[..=i].join("/"),
            })?;
            current = match value {
                TreeValue::Section(map) => map,
                TreeValue::List(_) => {
                    return Err(CpkitError::KeywordType {
                        path: segments[..=i].join("/"),
                        reason: "section occurs as a repeated section, no unique mapping".to_string(),
                    })
                }
                _ => {
                    return Err(CpkitError::KeywordType {
                        path: segments[..=i].join("/"),
                        reason: "path points at a keyword, not a section".to_string(),
                    })
                }
            };
        }
        Ok(current.clone())
    }

    /// 深度合并另一棵树: 两侧同为 section 时递归, 否则以对方为准
    pub fn merge(&mut self, other: &InputTree) {
        merge_section(&mut self.root, &other.root);
    }
}

/// 在 section 内按剩余路径段写入
fn set_in_section(
    section: &mut Section,
    segments: &[&str],
    value: &TreeValue,
    overwrite: bool,
    conflicting_keys: &[&str],
) {
    let key = segments[0];

    // 末段: 写入关键词本身
    if segments.len() == 1 {
        let conflicts: Vec<String> = conflicting_keys
            .iter()
            .filter(|k| section.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if overwrite {
            section.insert(key.to_string(), value.clone());
            for conflict in &conflicts {
                section.remove(conflict);
            }
        } else if !section.contains_key(key) && conflicts.is_empty() {
            section.insert(key.to_string(), value.clone());
        }
        return;
    }

    // 中间段: 缺失则补空 section
    let child = section
        .entry(key.to_string())
        .or_insert_with(|| TreeValue::Section(Section::new()));
    set_in_value(child, &segments[1..], value, overwrite, conflicting_keys);
}

/// 在任意节点上按剩余路径段写入, 处理列表广播与标量替换
fn set_in_value(
    node: &mut TreeValue,
    segments: &[&str],
    value: &TreeValue,
    overwrite: bool,
    conflicting_keys: &[&str],
) {
    match node {
        TreeValue::Section(map) => {
            set_in_section(map, segments, value, overwrite, conflicting_keys);
        }
        // 重复 section: 广播到每个元素
        TreeValue::List(items) => {
            for item in items.iter_mut() {
                set_in_value(item, segments, value, overwrite, conflicting_keys);
            }
        }
        // 标量挡路: overwrite 时替换为空 section 继续, 否则放弃
        _ => {
            if overwrite {
                *node = TreeValue::Section(Section::new());
                set_in_value(node, segments, value, overwrite, conflicting_keys);
            }
        }
    }
}

/// section 深度合并
fn merge_section(base: &mut Section, other: &Section) {
    for (key, incoming) in other {
        match (base.get_mut(key), incoming) {
            (Some(TreeValue::Section(dst)), TreeValue::Section(src)) => {
                merge_section(dst, src);
            }
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}
