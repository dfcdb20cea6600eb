//! 子命令的实际运行.

use std::fs::{self, File};
use std::io::BufWriter;

use log::info;
use lung_zones::hooks::RunHooks;
use lung_zones::repository::{histogram_all, partition_all, run_all, VolumeRepository};
use lung_zones::table::{write_histograms_csv, ResultTable};
use lung_zones::{ZonalError, ZonalResult};
use utils::config;

/// 对数据目录下每一对几何一致的体素网格与标签网格运行分区统计, 写出 CSV.
pub fn stats() -> ZonalResult<()> {
    let repo = config::repository_from_env_or_home()?;
    let params = config::run_params_from_env()?;
    let output = config::output_path_from_env_or_home()
        .ok_or_else(|| ZonalError::NotFound(config::OUTPUT.to_string()))?;

    println!("Running zonal statistics ({}, {} table)...", params.grouping, params.form);
    let mut last = None;
    let mut progress = |p: u8| {
        // 每 10% 报告一次.
        let bucket = p / 10;
        if last != Some(bucket) {
            info!("{p}% of volumes processed");
            last = Some(bucket);
        }
    };
    let mut table = ResultTable::new();
    let pairs = run_all(&repo, &params, &mut table, RunHooks::none().with_progress(&mut progress))?;

    table.write_csv(BufWriter::new(File::create(&output)?))?;

    utils::sep();
    for (v, l) in pairs.iter() {
        println!("{v} / {l}");
    }
    utils::sep();
    println!("{} pairs, {} rows written to {}", pairs.len(), table.len(), output.display());
    Ok(())
}

/// 对数据目录下每个体素网格做前后向分区, 结果保存到标签目录.
pub fn partition() -> ZonalResult<()> {
    let mut repo = config::repository_from_env_or_home()?;
    let cfg = config::partition_config_from_env()?;
    println!(
        "Partitioning {} volumes into {} zones ({})...",
        repo.volume_names()?.len(),
        cfg.slices,
        cfg.policy
    );

    let stored = partition_all(&mut repo, cfg.slices, cfg.policy, &cfg.suffix, None)?;

    utils::sep();
    for name in stored.iter() {
        println!("{name}");
    }
    utils::sep();
    println!("{} label maps stored under {}", stored.len(), repo.root().display());
    Ok(())
}

/// 对数据目录下每个体素网格统计 (掩码) 直方图, 每个体素网格写出一个 CSV.
pub fn histogram() -> ZonalResult<()> {
    let repo = config::repository_from_env_or_home()?;
    let cfg = config::histogram_config_from_env()?;
    let dir = config::histogram_dir_from_env_or_home()
        .ok_or_else(|| ZonalError::NotFound(config::HIST_DIR.to_string()))?;

    println!(
        "Computing histograms ({}, {} bins, mask: {})...",
        cfg.params.grouping,
        cfg.params.bins,
        cfg.mask.as_deref().unwrap_or("none")
    );
    let all = histogram_all(&repo, cfg.mask.as_deref(), &cfg.params, RunHooks::none())?;

    fs::create_dir_all(&dir)?;
    utils::sep();
    for (name, hists) in all.iter() {
        let path = dir.join(format!("{name}_hist.csv"));
        write_histograms_csv(hists, BufWriter::new(File::create(&path)?))?;
        info!("Wrote {}", path.display());
        println!("{name}: {} frame groups", hists.len());
    }
    utils::sep();
    println!("{} histograms written to {}", all.len(), dir.display());
    Ok(())
}
