//! 结果表.
//!
//! 表格的布局 (长表 / 宽表, 是否含中位数) 由第一次追加决定. 之后的追加必须使用相同布局,
//! 宽表会随分区数增多而单调加宽, 旧行以空单元格补齐.

use std::fmt::{Display, Formatter};
use std::io::Write;
use std::str::FromStr;

use crate::error::{ZonalError, ZonalResult};
use crate::stats::{GroupStatistics, Histogram};

mod cell;
mod encode;

pub use cell::{format_g3, Cell};
pub use encode::{encode_histograms, encode_long, encode_wide, histogram_header, long_header, wide_header};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 表格形式.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TableForm {
    /// 每个 `(帧分组, 分区)` 一行.
    #[default]
    Long,
    /// 每个帧分组一行, 分区列展开.
    Wide,
}

impl Display for TableForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Long => "long",
            Self::Wide => "wide",
        })
    }
}

impl FromStr for TableForm {
    type Err = ZonalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "long" => Ok(Self::Long),
            "wide" => Ok(Self::Wide),
            other => Err(ZonalError::param(format!("未知的表格形式 `{other}`"))),
        }
    }
}

/// 表格布局.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TableLayout {
    /// 表格形式.
    pub form: TableForm,
    /// 是否含中位数列.
    pub median: bool,
}

impl Display for TableLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let median = if self.median { "with" } else { "without" };
        f.write_fmt(format_args!("{} ({median} median)", self.form))
    }
}

/// 只追加的结果表. 由调用方持有, 可跨多次运行累积结果.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResultTable {
    layout: Option<TableLayout>,
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    /// 空表.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 已确定的布局. 空表 (从未追加过) 返回 `None`.
    #[inline]
    pub fn layout(&self) -> Option<TableLayout> {
        self.layout
    }

    /// 表头.
    #[inline]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// 所有行.
    #[inline]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何行?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列数.
    #[inline]
    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// 第 `row` 行第 `col` 列的单元格.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(col)
    }

    /// 按列名查找第 `row` 行的单元格.
    pub fn get_by_name(&self, row: usize, name: &str) -> Option<&Cell> {
        let col = self.header.iter().position(|h| h == name)?;
        self.get(row, col)
    }

    /// 检查 `layout` 能否追加到本表.
    pub fn check_layout(&self, layout: TableLayout) -> ZonalResult<()> {
        match self.layout {
            Some(existing) if existing != layout => Err(ZonalError::TableLayoutMismatch {
                existing: existing.to_string(),
                incoming: layout.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// 将表头加宽到能容纳 `zones` 个分区. 只增不减; 长表表头与分区数无关.
    ///
    /// 空表调用时无效果.
    pub fn widen(&mut self, zones: usize) {
        let Some(layout) = self.layout else {
            return;
        };
        let header = match layout.form {
            TableForm::Long => long_header(layout.median),
            TableForm::Wide => wide_header(zones, layout.median),
        };
        if header.len() > self.header.len() {
            self.header = header;
        }
        let width = self.header.len();
        for row in self.rows.iter_mut() {
            row.resize(width, Cell::Empty);
        }
    }

    /// 把 `input_vol` 与 `label_map` 一次运行的统计结果按 `layout` 编码后追加到表尾.
    ///
    /// 返回追加的行数. 布局不一致时返回 `Err`, 此时表格不变.
    pub fn append(
        &mut self,
        layout: TableLayout,
        input_vol: &str,
        label_map: &str,
        groups: &[GroupStatistics],
    ) -> ZonalResult<usize> {
        self.check_layout(layout)?;
        self.layout = Some(layout);

        let zones = groups.iter().map(|g| g.zones.len()).max().unwrap_or(0);
        self.widen(zones);
        let rows = match layout.form {
            TableForm::Long => encode_long(input_vol, label_map, groups, layout.median),
            TableForm::Wide => encode_wide(input_vol, label_map, groups, layout.median),
        };
        let width = self.width();
        let appended = rows.len();
        self.rows.extend(rows.into_iter().map(|mut r| {
            r.resize(width, Cell::Empty);
            r
        }));
        Ok(appended)
    }

    /// 清空表格, 包括布局.
    pub fn clear(&mut self) {
        self.layout = None;
        self.header.clear();
        self.rows.clear();
    }

    /// 以 CSV 格式写出: 第一行为表头, 之后每行一条记录, 逗号分隔.
    ///
    /// 含逗号, 引号或换行的字段会被双引号括起.
    pub fn write_csv<W: Write>(&self, writer: W) -> ZonalResult<()> {
        write_records(writer, &self.header, &self.rows)
    }

    /// 以 CSV 格式写出到字符串.
    pub fn to_csv_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a `Vec` never fails.
        let _ = self.write_csv(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// 以 CSV 格式写出直方图, 表头为 `frame,bin_start,bin_mid,bin_end,count,density`.
pub fn write_histograms_csv<W: Write>(hists: &[Histogram], writer: W) -> ZonalResult<()> {
    write_records(writer, &histogram_header(), &encode_histograms(hists))
}

fn write_records<W: Write>(writer: W, header: &[String], rows: &[Vec<Cell>]) -> ZonalResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header)?;
    for row in rows.iter() {
        wtr.write_record(row.iter().map(ToString::to_string))?;
    }
    wtr.flush()?;
    Ok(())
}
