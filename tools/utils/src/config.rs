//! 从环境变量读取运行配置.
//!
//! 所有函数都有一个 `*_with` 版本, 以任意查找函数代替环境变量, 方便测试.

use std::env;
use std::path::PathBuf;

use log::debug;

use lung_zones::engine::RunParams;
use lung_zones::repository::{home_dataset_dir_with, NiftiRepository};
use lung_zones::stats::{BinRange, FrameGrouping, HistogramParams, SdKind};
use lung_zones::table::TableForm;
use lung_zones::zone::PartitionPolicy;
use lung_zones::{ZonalError, ZonalResult};

/// 数据目录.
pub const DATA_DIR: &str = "ZONES_DATA_DIR";
/// 帧分组方式: `whole`, `modulo:<m>` 或 `per-slice`.
pub const GROUPING: &str = "ZONES_GROUPING";
/// 表格形式: `long` 或 `wide`.
pub const FORM: &str = "ZONES_FORM";
/// 统计时的分区数. 缺省时取标签网格最大值.
pub const COUNT: &str = "ZONES_COUNT";
/// 是否输出中位数: `0`, `false`, `no`, `off` 为否.
pub const MEDIAN: &str = "ZONES_MEDIAN";
/// 标准差估计方式: `sample` 或 `population`.
pub const SD: &str = "ZONES_SD";
/// CSV 输出路径.
pub const OUTPUT: &str = "ZONES_OUTPUT";
/// 分区策略: `equal-span` 或 `equal-count`.
pub const POLICY: &str = "ZONES_POLICY";
/// 前后向分区数.
pub const SLICES: &str = "ZONES_SLICES";
/// 分区结果名后缀.
pub const SUFFIX: &str = "ZONES_SUFFIX";
/// 直方图分箱数.
pub const BINS: &str = "ZONES_BINS";
/// 直方图取值区间 `<lo>:<hi>`. 缺省时取体素的最小值与最大值.
pub const RANGE: &str = "ZONES_RANGE";
/// 直方图掩码 (标签网格名). 缺省时不使用掩码.
pub const MASK: &str = "ZONES_MASK";
/// 直方图 CSV 输出目录.
pub const HIST_DIR: &str = "ZONES_HIST_DIR";

/// 默认 CSV 文件名, 位于数据目录下.
pub const DEFAULT_OUTPUT: &str = "zonal_stats.csv";
/// 默认分区结果名后缀.
pub const DEFAULT_SUFFIX: &str = "_ap";
/// 默认直方图输出子目录, 位于数据目录下.
pub const DEFAULT_HIST_DIR: &str = "histogram";

/// 以环境变量为查找函数. 空值视为未设置.
fn from_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(key: &str, v: &str) -> ZonalResult<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ZonalError::InvalidParameter(format!("`{key}` 不是布尔值: `{v}`"))),
    }
}

fn parse_count(key: &str, v: &str) -> ZonalResult<usize> {
    v.trim()
        .parse()
        .map_err(|_| ZonalError::InvalidParameter(format!("`{key}` 不是非负整数: `{v}`")))
}

/// 获取数据目录.
///
/// 1. 若 `$ZONES_DATA_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/zones`.
pub fn data_dir_with<F: Fn(&str) -> Option<String>>(lookup: F) -> Option<PathBuf> {
    match lookup(DATA_DIR) {
        Some(d) => Some(PathBuf::from(d)),
        None => home_dataset_dir_with(["zones"]),
    }
}

/// 从 `$ZONES_DATA_DIR` 或 `$HOME/dataset/zones` 获取数据目录.
#[inline]
pub fn data_dir_from_env_or_home() -> Option<PathBuf> {
    data_dir_with(from_env)
}

/// 打开数据目录下的 nifti 仓库.
pub fn repository_from_env_or_home() -> ZonalResult<NiftiRepository> {
    let dir = data_dir_from_env_or_home().ok_or_else(|| ZonalError::NotFound(DATA_DIR.to_string()))?;
    if !dir.is_dir() {
        return Err(ZonalError::NotFound(dir.display().to_string()));
    }
    debug!("Using data directory {}", dir.display());
    Ok(NiftiRepository::new(dir))
}

/// 读取统计参数. 未设置的项取 [`RunParams::default`].
pub fn run_params_with<F: Fn(&str) -> Option<String>>(lookup: F) -> ZonalResult<RunParams> {
    let mut p = RunParams::default();
    if let Some(v) = lookup(GROUPING) {
        p.grouping = v.parse::<FrameGrouping>()?;
    }
    if let Some(v) = lookup(FORM) {
        p.form = v.parse::<TableForm>()?;
    }
    if let Some(v) = lookup(COUNT) {
        p.zones = Some(parse_count(COUNT, &v)?);
    }
    if let Some(v) = lookup(MEDIAN) {
        p.median = parse_flag(MEDIAN, &v)?;
    }
    if let Some(v) = lookup(SD) {
        p.sd = v.parse::<SdKind>()?;
    }
    p.validate()?;
    Ok(p)
}

/// 从环境变量读取统计参数.
#[inline]
pub fn run_params_from_env() -> ZonalResult<RunParams> {
    run_params_with(from_env)
}

/// CSV 输出路径: `$ZONES_OUTPUT`, 否则为数据目录下的 `zonal_stats.csv`.
pub fn output_path_with<F: Fn(&str) -> Option<String>>(lookup: F) -> Option<PathBuf> {
    match lookup(OUTPUT) {
        Some(p) => Some(PathBuf::from(p)),
        None => data_dir_with(lookup).map(|d| d.join(DEFAULT_OUTPUT)),
    }
}

/// 从环境变量读取 CSV 输出路径.
#[inline]
pub fn output_path_from_env_or_home() -> Option<PathBuf> {
    output_path_with(from_env)
}

/// 前后向分区配置.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    /// 分区数.
    pub slices: usize,
    /// 分区策略.
    pub policy: PartitionPolicy,
    /// 结果名后缀.
    pub suffix: String,
}

/// 读取前后向分区配置. `$ZONES_SLICES` 必须设置且为正.
pub fn partition_config_with<F: Fn(&str) -> Option<String>>(lookup: F) -> ZonalResult<PartitionConfig> {
    let slices = lookup(SLICES).ok_or_else(|| ZonalError::InvalidParameter(format!("`{SLICES}` 未设置")))?;
    let slices = parse_count(SLICES, &slices)?;
    if slices == 0 {
        return Err(ZonalError::InvalidParameter(format!("`{SLICES}` 必须为正")));
    }
    let policy = match lookup(POLICY) {
        Some(v) => v.parse::<PartitionPolicy>()?,
        None => PartitionPolicy::default(),
    };
    let suffix = lookup(SUFFIX).unwrap_or_else(|| DEFAULT_SUFFIX.to_string());
    Ok(PartitionConfig { slices, policy, suffix })
}

/// 从环境变量读取前后向分区配置.
#[inline]
pub fn partition_config_from_env() -> ZonalResult<PartitionConfig> {
    partition_config_with(from_env)
}

/// 直方图配置.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramConfig {
    /// 直方图参数.
    pub params: HistogramParams,
    /// 掩码名.
    pub mask: Option<String>,
}

/// 读取直方图配置. 帧分组方式同样取自 `$ZONES_GROUPING`, 缺省为整体模式.
pub fn histogram_config_with<F: Fn(&str) -> Option<String>>(lookup: F) -> ZonalResult<HistogramConfig> {
    let mut params = HistogramParams::default();
    if let Some(v) = lookup(GROUPING) {
        params.grouping = v.parse::<FrameGrouping>()?;
    }
    if let Some(v) = lookup(BINS) {
        params.bins = parse_count(BINS, &v)?;
    }
    if let Some(v) = lookup(RANGE) {
        params.range = Some(v.parse::<BinRange>()?);
    }
    params.validate()?;
    Ok(HistogramConfig {
        params,
        mask: lookup(MASK),
    })
}

/// 从环境变量读取直方图配置.
#[inline]
pub fn histogram_config_from_env() -> ZonalResult<HistogramConfig> {
    histogram_config_with(from_env)
}

/// 直方图输出目录: `$ZONES_HIST_DIR`, 否则为数据目录下的 `histogram`.
pub fn histogram_dir_with<F: Fn(&str) -> Option<String>>(lookup: F) -> Option<PathBuf> {
    match lookup(HIST_DIR) {
        Some(p) => Some(PathBuf::from(p)),
        None => data_dir_with(lookup).map(|d| d.join(DEFAULT_HIST_DIR)),
    }
}

/// 从环境变量读取直方图输出目录.
#[inline]
pub fn histogram_dir_from_env_or_home() -> Option<PathBuf> {
    histogram_dir_with(from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_run_params_defaults() {
        let p = run_params_with(lookup(&[])).unwrap();
        assert_eq!(p, RunParams::default());
    }

    #[test]
    fn test_run_params_from_vars() {
        let p = run_params_with(lookup(&[
            (GROUPING, "modulo:4"),
            (FORM, "wide"),
            (COUNT, "6"),
            (MEDIAN, "off"),
            (SD, "population"),
        ]))
        .unwrap();
        assert_eq!(p.grouping, FrameGrouping::Modulo(4));
        assert_eq!(p.form, TableForm::Wide);
        assert_eq!(p.zones, Some(6));
        assert!(!p.median);
        assert_eq!(p.sd, SdKind::Population);
    }

    #[test]
    fn test_run_params_invalid() {
        assert!(run_params_with(lookup(&[(COUNT, "0")])).is_err());
        assert!(run_params_with(lookup(&[(COUNT, "-1")])).is_err());
        assert!(run_params_with(lookup(&[(MEDIAN, "maybe")])).is_err());
        assert!(run_params_with(lookup(&[(GROUPING, "modulo:0")])).is_err());
    }

    #[test]
    fn test_paths() {
        let l = lookup(&[(DATA_DIR, "/data/zones")]);
        assert_eq!(data_dir_with(&l), Some(PathBuf::from("/data/zones")));
        assert_eq!(output_path_with(&l), Some(PathBuf::from("/data/zones/zonal_stats.csv")));
        let l = lookup(&[(DATA_DIR, "/data/zones"), (OUTPUT, "/tmp/out.csv")]);
        assert_eq!(output_path_with(&l), Some(PathBuf::from("/tmp/out.csv")));
    }

    #[test]
    fn test_partition_config() {
        assert!(partition_config_with(lookup(&[])).is_err());
        assert!(partition_config_with(lookup(&[(SLICES, "0")])).is_err());
        let c = partition_config_with(lookup(&[(SLICES, "3"), (POLICY, "equal-span")])).unwrap();
        assert_eq!(c.slices, 3);
        assert_eq!(c.policy, PartitionPolicy::EqualSpan);
        assert_eq!(c.suffix, DEFAULT_SUFFIX);
    }

    #[test]
    fn test_histogram_config() {
        let c = histogram_config_with(lookup(&[])).unwrap();
        assert_eq!(c.params, HistogramParams::default());
        assert_eq!(c.mask, None);

        let c = histogram_config_with(lookup(&[
            (GROUPING, "per-slice"),
            (BINS, "500"),
            (RANGE, "-1000:400"),
            (MASK, "lung_mask"),
        ]))
        .unwrap();
        assert_eq!(c.params.grouping, FrameGrouping::PerSlice);
        assert_eq!(c.params.bins, 500);
        assert_eq!(c.params.range, Some(BinRange::new(-1000.0, 400.0).unwrap()));
        assert_eq!(c.mask.as_deref(), Some("lung_mask"));

        assert!(histogram_config_with(lookup(&[(BINS, "0")])).is_err());
        assert!(histogram_config_with(lookup(&[(RANGE, "5:1")])).is_err());

        let l = lookup(&[(DATA_DIR, "/data/zones")]);
        assert_eq!(histogram_dir_with(&l), Some(PathBuf::from("/data/zones/histogram")));
    }
}
