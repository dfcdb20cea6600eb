//! 内存中的数据仓库.

use std::collections::BTreeMap;

use super::VolumeRepository;
use crate::error::{ZonalError, ZonalResult};
use crate::{LabelGrid, VoxelGrid};

/// 以名字索引的内存数据仓库, 适合测试或嵌入宿主程序.
///
/// 名字按字典序迭代.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    volumes: BTreeMap<String, VoxelGrid>,
    label_maps: BTreeMap<String, LabelGrid>,
    displays: BTreeMap<String, String>,
}

impl MemoryRepository {
    /// 空仓库.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入 (或替换) 一个体素网格.
    pub fn insert_volume(&mut self, name: impl Into<String>, voxels: VoxelGrid) -> &mut Self {
        self.volumes.insert(name.into(), voxels);
        self
    }

    /// 加入 (或替换) 一个标签网格.
    pub fn insert_label_map(&mut self, name: impl Into<String>, labels: LabelGrid) -> &mut Self {
        self.label_maps.insert(name.into(), labels);
        self
    }

    /// 标签网格 `name` 关联的颜色表.
    #[inline]
    pub fn display_of(&self, name: &str) -> Option<&str> {
        self.displays.get(name).map(String::as_str)
    }

    /// 借用标签网格 `name`.
    #[inline]
    pub fn label_map(&self, name: &str) -> Option<&LabelGrid> {
        self.label_maps.get(name)
    }
}

impl VolumeRepository for MemoryRepository {
    fn volume_names(&self) -> ZonalResult<Vec<String>> {
        Ok(self.volumes.keys().cloned().collect())
    }

    fn label_map_names(&self) -> ZonalResult<Vec<String>> {
        Ok(self.label_maps.keys().cloned().collect())
    }

    fn load_volume(&self, name: &str) -> ZonalResult<VoxelGrid> {
        self.volumes
            .get(name)
            .cloned()
            .ok_or_else(|| ZonalError::NotFound(name.to_string()))
    }

    fn load_label_map(&self, name: &str) -> ZonalResult<LabelGrid> {
        self.label_maps
            .get(name)
            .cloned()
            .ok_or_else(|| ZonalError::NotFound(name.to_string()))
    }

    fn store_label_map(&mut self, name: &str, labels: LabelGrid) -> ZonalResult<()> {
        self.label_maps.insert(name.to_string(), labels);
        Ok(())
    }

    fn attach_display(&mut self, name: &str, color_table: &str) -> ZonalResult<()> {
        if !self.label_maps.contains_key(name) {
            return Err(ZonalError::NotFound(name.to_string()));
        }
        self.displays.insert(name.to_string(), color_table.to_string());
        Ok(())
    }
}
