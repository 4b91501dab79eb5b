//! 标签表: 标签值 -> (名称, 颜色).
//!
//! 标签表在加载后不再变化. 对外展示时只列出在标签体中实际出现过的标签.

use crate::{LabelId, SegVolume};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单个标签的元信息.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    /// 显示名称.
    pub name: String,

    /// RGB 颜色.
    pub color_rgb: [u8; 3],
}

/// 对外展示的标签条目.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    /// 标签值.
    pub id: LabelId,

    /// 显示名称.
    pub name: String,

    /// RGB 颜色.
    pub color_rgb: [u8; 3],
}

/// `labels.json` 的顶层结构.
#[derive(Deserialize)]
struct LabelsFile {
    labels: BTreeMap<LabelId, LabelInfo>,
}

/// 不可变标签表, 按标签值升序组织.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: BTreeMap<LabelId, LabelInfo>,
}

impl FromIterator<(LabelId, LabelInfo)> for LabelCatalog {
    fn from_iter<I: IntoIterator<Item = (LabelId, LabelInfo)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

impl LabelCatalog {
    /// 解析形如 `{"labels": {"1": {"name": "liver", "color_rgb": [255, 0, 0]}}}` 的 JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        let LabelsFile { labels } = serde_json::from_str(s)?;
        Ok(Self { labels })
    }

    /// 从读取器解析 JSON 格式的标签表.
    pub fn from_json_reader<R: std::io::Read>(r: R) -> serde_json::Result<Self> {
        let LabelsFile { labels } = serde_json::from_reader(r)?;
        Ok(Self { labels })
    }

    /// 查询标签元信息.
    #[inline]
    pub fn get(&self, id: LabelId) -> Option<&LabelInfo> {
        self.labels.get(&id)
    }

    /// 标签表中是否包含 `id`.
    #[inline]
    pub fn contains(&self, id: LabelId) -> bool {
        self.labels.contains_key(&id)
    }

    /// 标签表条目数.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// 标签表是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 按标签值升序迭代所有条目.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &LabelInfo)> {
        self.labels.iter().map(|(&id, info)| (id, info))
    }

    /// 列出在 `present` (升序或乱序均可) 中出现过的非背景标签, 按标签值升序.
    /// 不在标签表中的值被忽略.
    pub fn entries_for(&self, present: &[LabelId]) -> Vec<LabelEntry> {
        self.iter()
            .filter(|&(id, _)| id != crate::consts::BACKGROUND && present.contains(&id))
            .map(|(id, info)| LabelEntry {
                id,
                name: info.name.clone(),
                color_rgb: info.color_rgb,
            })
            .collect()
    }

    /// 列出在 `volume` 中至少出现过一次的非背景标签, 按标签值升序.
    pub fn present_in(&self, volume: &SegVolume) -> Vec<LabelEntry> {
        #[cfg(feature = "rayon")]
        let present = volume.par_present_labels();
        #[cfg(not(feature = "rayon"))]
        let present = volume.present_labels();
        self.entries_for(&present)
    }
}
