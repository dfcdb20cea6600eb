//! 以目录组织的 nifti 数据仓库.
//!
//! 目录结构:
//!
//! ```text
//! <root>/
//!   volume/  <name>.nii | <name>.nii.gz   体素网格
//!   label/   <name>.nii | <name>.nii.gz   标签网格
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::VolumeRepository;
use crate::error::{ZonalError, ZonalResult};
use crate::{LabelGrid, VoxelGrid};

/// 体素网格子目录名.
pub const VOLUME_DIR: &str = "volume";
/// 标签网格子目录名.
pub const LABEL_DIR: &str = "label";

const EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 去掉 nifti 扩展名. 不是 nifti 文件时返回 `None`.
fn strip_nifti_ext(file_name: &str) -> Option<&str> {
    EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .filter(|s| !s.is_empty())
}

/// 以目录组织的 nifti 数据仓库.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NiftiRepository {
    root: PathBuf,
}

impl NiftiRepository {
    /// 以 `root` 为根目录. 不检查目录是否存在.
    #[inline]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    /// 根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn list(&self, sub: &str) -> ZonalResult<Vec<String>> {
        let dir = self.root.join(sub);
        if !dir.is_dir() {
            debug!("{} does not exist, treated as empty", dir.display());
            return Ok(vec![]);
        }
        let mut ans = vec![];
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str().and_then(strip_nifti_ext) {
                ans.push(name.to_string());
            }
        }
        ans.sort_unstable();
        ans.dedup();
        Ok(ans)
    }

    /// 在 `sub` 目录下查找 `name` 对应的文件, `.nii.gz` 优先.
    fn locate(&self, sub: &str, name: &str) -> ZonalResult<PathBuf> {
        let dir = self.root.join(sub);
        EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{name}{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| ZonalError::NotFound(format!("{sub}/{name}")))
    }
}

impl VolumeRepository for NiftiRepository {
    fn volume_names(&self) -> ZonalResult<Vec<String>> {
        self.list(VOLUME_DIR)
    }

    fn label_map_names(&self) -> ZonalResult<Vec<String>> {
        self.list(LABEL_DIR)
    }

    fn load_volume(&self, name: &str) -> ZonalResult<VoxelGrid> {
        VoxelGrid::open(self.locate(VOLUME_DIR, name)?)
    }

    fn load_label_map(&self, name: &str) -> ZonalResult<LabelGrid> {
        LabelGrid::open(self.locate(LABEL_DIR, name)?)
    }

    fn store_label_map(&mut self, name: &str, labels: LabelGrid) -> ZonalResult<()> {
        let dir = self.root.join(LABEL_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{name}.nii.gz"));
        debug!("Saving label map to {}", path.display());
        labels.save(path)
    }
}
