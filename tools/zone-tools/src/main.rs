//! 动态肺部 CT 分区工具.
//!
//! 用法:
//!
//! ```text
//! zone-tools stats       # 分区统计, 输出 CSV
//! zone-tools partition   # 前后向分区, 保存标签网格
//! zone-tools histogram   # (掩码) 直方图, 每个体素网格输出一个 CSV
//! ```
//!
//! 所有参数通过环境变量 `ZONES_*` 给出, 见 `utils::config`.

use std::process::ExitCode;

use log::{error, LevelFilter};
use simple_logger::SimpleLogger;

mod runner;

const USAGE: &str = "usage: zone-tools <stats|partition|histogram>";

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("logger: {e}");
    }

    let res = match std::env::args().nth(1).as_deref() {
        Some("stats") => runner::stats(),
        Some("partition") => runner::partition(),
        Some("histogram") => runner::histogram(),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
