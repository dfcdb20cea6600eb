//! 通用常量.

/// 标签值 `0` 保留给背景 / 未标注体素, 不属于任何分区.
pub const BACKGROUND: u16 = 0;

/// 空分区统计量在表格中的字面值.
pub const NA: &str = "NA";

/// 立方毫米到立方厘米的换算系数.
pub const MM3_PER_CM3: f64 = 1000.0;

/// 前景判定阈值: 体素值严格大于该值时视为前景.
pub const FOREGROUND_THRESHOLD: f32 = 0.0;

/// 分区结果默认附带的颜色表名.
pub const GENERIC_ANATOMY_COLORS: &str = "GenericAnatomyColors";

/// 体素值是否为前景?
#[inline]
pub fn is_foreground(value: f32) -> bool {
    value > FOREGROUND_THRESHOLD
}

/// 标签值是否为背景?
#[inline]
pub const fn is_background(label: u16) -> bool {
    label == BACKGROUND
}
