//! 把分组统计结果编码为长表或宽表的行.

use itertools::Itertools;

use super::cell::Cell;
use crate::stats::{GroupStatistics, Histogram, ZoneStatistic};

/// 每个分区的统计列名 (宽表中加 `z<id>_` 前缀).
fn stat_columns(median: bool) -> impl Iterator<Item = &'static str> {
    ["count", "vol", "mean", "sd"]
        .into_iter()
        .chain(median.then_some("median"))
        .chain(["R", "A", "S", "slice_count"])
}

/// 长表表头.
pub fn long_header(median: bool) -> Vec<String> {
    ["input_vol", "label_map", "zone"]
        .into_iter()
        .chain(stat_columns(median))
        .map(String::from)
        .collect()
}

/// 含 `zones` 个分区的宽表表头.
pub fn wide_header(zones: usize, median: bool) -> Vec<String> {
    ["input_vol".to_string(), "label_map".to_string()]
        .into_iter()
        .chain((1..=zones).flat_map(|z| stat_columns(median).map(move |c| format!("z{z}_{c}"))))
        .collect()
}

/// 单个分区的统计列. 空分区的 `count` 与 `vol` 为 `0`, 其余统计量为 `NA`.
fn zone_cells(s: &ZoneStatistic, median: bool) -> impl Iterator<Item = Cell> {
    let [r, a, ss] = match s.centroid {
        Some(c) => c.map(Cell::Real),
        None => [Cell::Na, Cell::Na, Cell::Na],
    };
    [
        Cell::Count(s.count),
        Cell::Real(s.volume),
        Cell::real_or_na(s.mean),
        Cell::real_or_na(s.sd),
    ]
    .into_iter()
    .chain(median.then(|| Cell::real_or_na(s.median)))
    .chain([r, a, ss, Cell::Count(s.slice_count)])
}

/// 长表: 每个 `(帧分组, 分区)` 一行.
pub fn encode_long(input_vol: &str, label_map: &str, groups: &[GroupStatistics], median: bool) -> Vec<Vec<Cell>> {
    groups
        .iter()
        .flat_map(|g| g.zones.iter())
        .map(|s| {
            [
                Cell::Text(input_vol.to_string()),
                Cell::Text(label_map.to_string()),
                Cell::Count(s.zone as usize),
            ]
            .into_iter()
            .chain(zone_cells(s, median))
            .collect_vec()
        })
        .collect()
}

/// 宽表: 每个帧分组一行, 各分区的统计列依次展开.
pub fn encode_wide(input_vol: &str, label_map: &str, groups: &[GroupStatistics], median: bool) -> Vec<Vec<Cell>> {
    groups
        .iter()
        .map(|g| {
            [Cell::Text(input_vol.to_string()), Cell::Text(label_map.to_string())]
                .into_iter()
                .chain(g.zones.iter().flat_map(|s| zone_cells(s, median)))
                .collect_vec()
        })
        .collect()
}

/// 直方图表头.
pub fn histogram_header() -> Vec<String> {
    ["frame", "bin_start", "bin_mid", "bin_end", "count", "density"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// 直方图: 每个 `(帧分组, 箱)` 一行, `frame` 为帧分组的序号.
pub fn encode_histograms(hists: &[Histogram]) -> Vec<Vec<Cell>> {
    hists
        .iter()
        .enumerate()
        .flat_map(|(frame, h)| {
            (0..h.bins()).map(move |i| {
                vec![
                    Cell::Count(frame),
                    Cell::Fixed(h.bin_start(i)),
                    Cell::Fixed(h.bin_mid(i)),
                    Cell::Fixed(h.bin_end(i)),
                    Cell::Count(h.counts()[i]),
                    Cell::Fixed(h.density(i)),
                ]
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{encode_histograms, encode_long, encode_wide, histogram_header, long_header, wide_header};
    use crate::stats::{FrameGroup, GroupStatistics, ZoneStatistic};
    use crate::table::Cell;

    fn sample_groups() -> Vec<GroupStatistics> {
        let full = ZoneStatistic {
            zone: 1,
            count: 2,
            volume: 0.002,
            mean: Some(1.5),
            sd: Some(0.5),
            median: Some(1.5),
            centroid: Some([0.5, 0.0, 0.0]),
            slice_count: 1,
        };
        let empty = ZoneStatistic {
            zone: 2,
            count: 0,
            volume: 0.0,
            mean: None,
            sd: None,
            median: None,
            centroid: None,
            slice_count: 1,
        };
        vec![GroupStatistics {
            group: FrameGroup::new(vec![0]),
            zones: vec![full, empty],
        }]
    }

    #[test]
    fn test_headers() {
        assert_eq!(
            long_header(true).join(","),
            "input_vol,label_map,zone,count,vol,mean,sd,median,R,A,S,slice_count"
        );
        assert_eq!(long_header(false).len(), 11);
        let w = wide_header(2, true);
        assert_eq!(w.len(), 2 + 2 * 9);
        assert_eq!(w[2], "z1_count");
        assert_eq!(w[10], "z1_slice_count");
        assert_eq!(w[19], "z2_slice_count");
        assert_eq!(wide_header(3, false).len(), 2 + 3 * 8);
    }

    #[test]
    fn test_long_rows() {
        let rows = encode_long("vol", "lab", &sample_groups(), true);
        assert_eq!(rows.len(), 2);
        let text = rows.iter().map(|r| r.iter().map(Cell::to_string).collect::<Vec<_>>().join(",")).collect::<Vec<_>>();
        assert_eq!(text[0], "vol,lab,1,2,0.002,1.5,0.5,1.5,0.5,0,0,1");
        assert_eq!(text[1], "vol,lab,2,0,0,NA,NA,NA,NA,NA,NA,1");
    }

    #[test]
    fn test_wide_matches_long() {
        let groups = sample_groups();
        let long = encode_long("vol", "lab", &groups, false);
        let wide = encode_wide("vol", "lab", &groups, false);
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].len(), wide_header(2, false).len());
        // 宽表中分区 1 的统计列与长表第一行去掉前三列后一致.
        assert_eq!(&wide[0][2..10], &long[0][3..]);
        assert_eq!(&wide[0][10..], &long[1][3..]);
        assert_eq!(wide[0][4], Cell::Real(1.5));
    }

    #[test]
    fn test_histogram_rows() {
        use crate::hooks::RunHooks;
        use crate::stats::{compute_histograms, BinRange, FrameGrouping, HistogramParams};
        use crate::VoxelGrid;
        use ndarray::arr3;

        let v = VoxelGrid::from_array(arr3(&[[[0.0, 1.0]], [[1.0, 1.5]]]));
        let p = HistogramParams {
            range: Some(BinRange::new(0.0, 2.0).unwrap()),
            bins: 2,
            grouping: FrameGrouping::PerSlice,
        };
        let hists = compute_histograms(&v, None, &p, RunHooks::none()).unwrap();
        let rows = encode_histograms(&hists);
        assert_eq!(histogram_header().join(","), "frame,bin_start,bin_mid,bin_end,count,density");
        let text = rows.iter().map(|r| r.iter().map(Cell::to_string).collect::<Vec<_>>().join(",")).collect::<Vec<_>>();
        assert_eq!(
            text,
            vec![
                "0,0.000000,0.500000,1.000000,1,0.500000",
                "0,1.000000,1.500000,2.000000,1,0.500000",
                "1,0.000000,0.500000,1.000000,0,0.000000",
                "1,1.000000,1.500000,2.000000,2,1.000000",
            ]
        );
    }
}
