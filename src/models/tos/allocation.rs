//! Distributing TOS items over topics and cognitive levels.
//!
//! Every split uses the largest-remainder method so integer totals always add
//! up: floor each share, then hand the leftover units to the largest
//! fractional parts.

use std::fmt;

use super::types::NewTosRow;
use crate::models::syllabus::CourseOutline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    Row { row: usize, sum: u32, expected: u32 },
    Column { column: usize, sum: u32, expected: u32 },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::Row { row, sum, expected } => {
                write!(f, "Allocation failed: row {row} sum {sum} != expected {expected}")
            }
            AllocationError::Column { column, sum, expected } => {
                write!(f, "Allocation failed: column {column} sum {sum} != expected {expected}")
            }
        }
    }
}

/// Integers summing to `total`. Leftover units go by descending fractional
/// part, ties to the lower index, cycling if there are more units than values.
pub fn largest_remainder(values: &[f64], total: u32) -> Vec<u32> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut floored: Vec<u32> = values.iter().map(|v| v.max(0.0).floor() as u32).collect();
    let assigned: u32 = floored.iter().copied().fold(0, u32::saturating_add);

    let mut fracs: Vec<(f64, usize)> = values
        .iter()
        .zip(&floored)
        .enumerate()
        .map(|(i, (v, f))| (v - f64::from(*f), i))
        .collect();
    fracs.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    for k in 0..total.saturating_sub(assigned) as usize {
        floored[fracs[k % n].1] += 1;
    }
    floored
}

/// Items expected per cognitive level for the whole TOS.
pub fn expected_columns(total_items: u32, percentages: [u32; 4]) -> [u32; 4] {
    let raw: Vec<f64> = percentages
        .iter()
        .map(|p| f64::from(total_items) * (f64::from(*p) / 100.0))
        .collect();
    let split = largest_remainder(&raw, total_items);
    [split[0], split[1], split[2], split[3]]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowAllocation {
    pub percent: u32,
    pub no_items: u32,
    pub columns: [u32; 4],
}

/// Split `total_items` over rows weighted by `hours`, then each row over the
/// four levels, so that every row adds up to its item count and every column
/// adds up to `expected_columns`.
pub fn allocate_rows(
    total_items: u32,
    percentages: [u32; 4],
    hours: &[u32],
) -> Result<Vec<RowAllocation>, AllocationError> {
    let total_hours: u32 = hours.iter().copied().fold(0, u32::saturating_add);
    let raw_percent: Vec<f64> = hours
        .iter()
        .map(|h| {
            if total_hours == 0 {
                0.0
            } else {
                (f64::from(*h) / f64::from(total_hours)) * 100.0
            }
        })
        .collect();
    let raw_items: Vec<f64> = raw_percent
        .iter()
        .map(|p| f64::from(total_items) * (p / 100.0))
        .collect();

    let percents = largest_remainder(&raw_percent, 100);
    let row_target = largest_remainder(&raw_items, total_items);
    let col_target = expected_columns(total_items, percentages);

    let n = hours.len();
    let raw: Vec<[f64; 4]> = row_target
        .iter()
        .map(|items| percentages.map(|p| f64::from(*items) * (f64::from(p) / 100.0)))
        .collect();
    let mut cells: Vec<[u32; 4]> = raw.iter().map(|r| r.map(|v| v.floor() as u32)).collect();
    let mut row_sum: Vec<u32> = cells.iter().map(|r| r.iter().sum()).collect();
    let mut col_sum = [0u32; 4];
    for row in &cells {
        for j in 0..4 {
            col_sum[j] += row[j];
        }
    }

    let mut order: Vec<(f64, usize, usize)> = (0..n)
        .flat_map(|i| (0..4).map(move |j| (i, j)))
        .map(|(i, j)| (raw[i][j] - f64::from(cells[i][j]), i, j))
        .collect();
    order.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut assigned: u32 = row_sum.iter().sum();
    let mut progressed = true;
    while assigned < total_items && progressed {
        progressed = false;
        for &(_, i, j) in &order {
            if assigned >= total_items {
                break;
            }
            if row_sum[i] < row_target[i] && col_sum[j] < col_target[j] {
                cells[i][j] += 1;
                row_sum[i] += 1;
                col_sum[j] += 1;
                assigned += 1;
                progressed = true;
            }
        }
    }

    // Row-major fill for whatever the greedy passes could not place.
    for i in 0..n {
        for j in 0..4 {
            while assigned < total_items
                && row_sum[i] < row_target[i]
                && col_sum[j] < col_target[j]
            {
                cells[i][j] += 1;
                row_sum[i] += 1;
                col_sum[j] += 1;
                assigned += 1;
            }
        }
    }

    for i in 0..n {
        if row_sum[i] != row_target[i] {
            return Err(AllocationError::Row { row: i, sum: row_sum[i], expected: row_target[i] });
        }
    }
    for j in 0..4 {
        if col_sum[j] != col_target[j] {
            return Err(AllocationError::Column {
                column: j,
                sum: col_sum[j],
                expected: col_target[j],
            });
        }
    }

    Ok((0..n)
        .map(|i| RowAllocation {
            percent: percents[i],
            no_items: row_target[i],
            columns: cells[i],
        })
        .collect())
}

/// The outlines whose topics were selected, as `(topic, hours)` in outline
/// order. Matching is on the trimmed topic text; negative hours count as zero.
pub fn select_topics(outlines: &[CourseOutline], selected: &[String]) -> Vec<(String, u32)> {
    outlines
        .iter()
        .filter(|o| selected.iter().any(|s| s.trim() == o.topics.trim()))
        .map(|o| (o.topics.clone(), o.allotted_hour.max(0) as u32))
        .collect()
}

/// Allocate rows for `(topic, hours)` pairs taken from the syllabus outlines.
/// Returns the expected columns with the rows to insert.
pub fn build_rows(
    total_items: u32,
    percentages: [u32; 4],
    topics: &[(String, u32)],
) -> Result<([u32; 4], Vec<NewTosRow>), AllocationError> {
    let hours: Vec<u32> = topics.iter().map(|(_, h)| *h).collect();
    let rows = allocate_rows(total_items, percentages, &hours)?;
    let new_rows = topics
        .iter()
        .zip(rows)
        .map(|((topic, h), a)| NewTosRow {
            topic: topic.clone(),
            no_hours: *h as i32,
            percent: a.percent as i32,
            no_items: a.no_items as i32,
            columns: a.columns.map(|c| c as i32),
        })
        .collect();
    Ok((expected_columns(total_items, percentages), new_rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leftover_goes_to_largest_fraction_then_lowest_index() {
        assert_eq!(largest_remainder(&[2.5, 2.5, 5.0], 10), vec![3, 2, 5]);
        assert_eq!(largest_remainder(&[1.2, 1.7, 2.1], 5), vec![1, 2, 2]);
    }

    #[test]
    fn leftover_cycles_when_every_share_is_zero() {
        assert_eq!(largest_remainder(&[0.0, 0.0, 0.0], 100), vec![34, 33, 33]);
        assert!(largest_remainder(&[], 10).is_empty());
    }

    #[test]
    fn expected_columns_add_up() {
        assert_eq!(expected_columns(7, [25, 25, 25, 25]), [2, 2, 2, 1]);
        assert_eq!(expected_columns(50, [20, 20, 30, 30]), [10, 10, 15, 15]);
    }

    fn check_sums(total: u32, pct: [u32; 4], hours: &[u32]) {
        let rows = allocate_rows(total, pct, hours).unwrap();
        let expected = expected_columns(total, pct);
        assert_eq!(rows.iter().map(|r| r.no_items).sum::<u32>(), total);
        assert_eq!(rows.iter().map(|r| r.percent).sum::<u32>(), 100);
        for r in &rows {
            assert_eq!(r.columns.iter().sum::<u32>(), r.no_items);
        }
        for j in 0..4 {
            assert_eq!(rows.iter().map(|r| r.columns[j]).sum::<u32>(), expected[j]);
        }
    }

    #[test]
    fn rows_and_columns_meet_their_targets() {
        check_sums(50, [20, 20, 30, 30], &[10, 20, 10]);
        check_sums(60, [50, 20, 20, 10], &[3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 7]);
        check_sums(37, [35, 25, 25, 15], &[7, 11, 13]);
        check_sums(1, [25, 25, 25, 25], &[5, 5]);
    }

    #[test]
    fn row_items_follow_hours() {
        let rows = allocate_rows(40, [25, 25, 25, 25], &[10, 30]).unwrap();
        assert_eq!(rows[0].percent, 25);
        assert_eq!(rows[0].no_items, 10);
        assert_eq!(rows[1].no_items, 30);
    }

    #[test]
    fn zero_hour_topics_still_split_evenly() {
        let rows = allocate_rows(10, [25, 25, 25, 25], &[0, 0]).unwrap();
        assert_eq!(rows.iter().map(|r| r.percent).collect::<Vec<_>>(), vec![50, 50]);
        assert_eq!(rows.iter().map(|r| r.no_items).collect::<Vec<_>>(), vec![5, 5]);
    }

    #[test]
    fn no_rows_cannot_absorb_items() {
        let err = allocate_rows(10, [25, 25, 25, 25], &[]).unwrap_err();
        assert!(matches!(err, AllocationError::Column { column: 0, .. }));
    }

    #[test]
    fn oversized_hours_fail_without_overflow() {
        assert!(allocate_rows(10, [25, 25, 25, 25], &[u32::MAX, u32::MAX]).is_err());
    }

    fn outline(topics: &str, hours: i32) -> CourseOutline {
        CourseOutline {
            id: 1,
            syllabus_term: "MIDTERM".to_string(),
            row_no: 1,
            allotted_hour: hours,
            allotted_time: String::new(),
            intended_learning: String::new(),
            topics: topics.to_string(),
            suggested_readings: String::new(),
            learning_activities: String::new(),
            assessment_tools: String::new(),
            grading_criteria: String::new(),
            remarks: String::new(),
        }
    }

    #[test]
    fn only_selected_outlines_become_rows() {
        let outlines = vec![outline("Stacks", 12), outline("Queues", 8), outline("Trees", 20)];
        let selected = vec!["Trees ".to_string(), "Stacks".to_string(), "Graphs".to_string()];
        assert_eq!(
            select_topics(&outlines, &selected),
            vec![("Stacks".to_string(), 12), ("Trees".to_string(), 20)]
        );
    }

    #[test]
    fn built_rows_keep_topic_and_hours() {
        let topics = vec![("Stacks".to_string(), 12), ("Queues".to_string(), 8)];
        let (expected, rows) = build_rows(20, [20, 30, 30, 20], &topics).unwrap();
        assert_eq!(expected, [4, 6, 6, 4]);
        assert_eq!(rows[0].topic, "Stacks");
        assert_eq!(rows[0].no_hours, 12);
        assert_eq!(rows[0].no_items + rows[1].no_items, 20);
    }
}
