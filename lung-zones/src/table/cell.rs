//! 表格单元格.

use std::fmt::{Display, Formatter};

use crate::consts::NA;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 结果表中的一个单元格.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Cell {
    /// 文本, 如卷名.
    Text(String),
    /// 整数计数, 按十进制输出.
    Count(usize),
    /// 实数, 按 `%.3g` 输出.
    Real(f64),
    /// 实数, 按 `%f` (六位小数) 输出.
    Fixed(f64),
    /// 无定义的统计量, 输出 `NA`.
    Na,
    /// 表格加宽后旧行的补位, 输出空串.
    Empty,
}

impl Cell {
    /// `Some(v)` 为 [`Cell::Real`], `None` 为 [`Cell::Na`].
    #[inline]
    pub fn real_or_na(v: Option<f64>) -> Self {
        v.map_or(Self::Na, Self::Real)
    }

    /// 是否为 `NA`?
    #[inline]
    pub fn is_na(&self) -> bool {
        matches!(self, Self::Na)
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Count(c) => f.write_fmt(format_args!("{c}")),
            Self::Real(v) => f.write_str(&format_g3(*v)),
            Self::Fixed(v) => f.write_fmt(format_args!("{v:.6}")),
            Self::Na => f.write_str(NA),
            Self::Empty => Ok(()),
        }
    }
}

/// 去掉小数部分末尾的 `0`, 以及随之落单的小数点.
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// 按 C 语言 `printf("%.3g")` 的规则格式化实数: 三位有效数字,
/// 十进制指数 `X` 满足 `-4 <= X < 3` 时用定点形式, 否则用 `d.dde+XX` 形式,
/// 两者都去掉末尾多余的 `0`.
pub fn format_g3(v: f64) -> String {
    const PRECISION: i32 = 3;

    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        let s = if v > 0.0 { "inf" } else { "-inf" };
        return s.to_string();
    }
    if v == 0.0 {
        let s = if v.is_sign_negative() { "-0" } else { "0" };
        return s.to_string();
    }

    // 舍入后的指数.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if (-4..PRECISION).contains(&exp) {
        let fixed = format!("{:.*}", (PRECISION - 1 - exp) as usize, v);
        trim_fraction(&fixed).to_string()
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::{format_g3, Cell};

    #[test]
    fn test_format_g3() {
        let cases = [
            (0.0, "0"),
            (0.002, "0.002"),
            (1.5, "1.5"),
            (3.5, "3.5"),
            (-2.25, "-2.25"),
            (100.0, "100"),
            (123.456, "123"),
            (999.4, "999"),
            (999.6, "1e+03"),
            (1234.0, "1.23e+03"),
            (0.0001, "0.0001"),
            (0.00001234, "1.23e-05"),
            (-98765.0, "-9.88e+04"),
            (1.0e20, "1e+20"),
            (0.1, "0.1"),
            (2.0 / 3.0, "0.667"),
        ];
        for (v, s) in cases {
            assert_eq!(format_g3(v), s, "formatting {v}");
        }
        assert_eq!(format_g3(f64::NAN), "nan");
        assert_eq!(format_g3(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Text("lung".into()).to_string(), "lung");
        assert_eq!(Cell::Count(12).to_string(), "12");
        assert_eq!(Cell::Real(0.5).to_string(), "0.5");
        assert_eq!(Cell::Na.to_string(), "NA");
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::real_or_na(None), Cell::Na);
        assert_eq!(Cell::real_or_na(Some(1.0)), Cell::Real(1.0));
        assert!(Cell::Na.is_na());
    }
}
