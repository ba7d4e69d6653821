//! Table column width allocation.
//!
//! Widths are derived from a weighted character score of a sample of
//! rows, then pushed into `[min_share, max_share]` by water-filling:
//! violating columns are pinned to their bound and the remaining width
//! is shared out again among the free columns.

use crate::model::Table;
use crate::parser::strip_markers;
use serde::Serialize;

/// Twentieths of a point per inch.
pub const TWIPS_PER_INCH: f64 = 1440.0;

/// English Metric Units per inch.
pub const EMU_PER_INCH: f64 = 914_400.0;

/// Default usable page width for word-processing tables, in inches.
pub const DEFAULT_PAGE_WIDTH: f64 = 6.5;

const WIDE: &str = "MWmw@%&";
const NARROW: &str = "iljtfrI.,;:'!|()[]";

/// Bounds and sampling for the width optimizer.
#[derive(Debug, Clone)]
pub struct ColumnConstraints {
    /// Smallest share a column may receive
    pub min_share: f64,
    /// Largest share a column may receive
    pub max_share: f64,
    /// Data rows sampled after the header
    pub sample_rows: usize,
    /// Upper bound on redistribution passes
    pub max_iterations: usize,
}

impl Default for ColumnConstraints {
    fn default() -> Self {
        Self {
            min_share: 0.08,
            max_share: 0.35,
            sample_rows: 5,
            max_iterations: 10,
        }
    }
}

/// How a plan was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Table without columns
    Empty,
    /// One column spanning the full width
    Single,
    /// Fixed plan for a seven-column role/responsibility matrix
    RoleMatrix,
    /// Fixed plan for a two-column field/value table
    Metadata,
    /// Equal split (bounds cannot be satisfied)
    Uniform,
    /// Weighted character score with bounds applied
    Weighted,
}

/// Per-column width allocation for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnWidthPlan {
    shares: Vec<f64>,
    available_width: f64,
    kind: PlanKind,
}

impl ColumnWidthPlan {
    fn new(shares: Vec<f64>, available_width: f64, kind: PlanKind) -> Self {
        Self {
            shares,
            available_width,
            kind,
        }
    }

    /// Fractional shares, summing to 1.0.
    pub fn shares(&self) -> &[f64] {
        &self.shares
    }

    /// Width the shares apply to, in inches.
    pub fn available_width(&self) -> f64 {
        self.available_width
    }

    /// How the plan was produced.
    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Check if the plan has no columns.
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Absolute widths in inches.
    pub fn widths(&self) -> Vec<f64> {
        self.shares
            .iter()
            .map(|s| s * self.available_width)
            .collect()
    }

    /// Absolute widths in twips. The values add up to the full width.
    pub fn twips(&self) -> Vec<i64> {
        self.scaled((self.available_width * TWIPS_PER_INCH).round() as i64)
    }

    /// Absolute widths in EMU. The values add up to the full width.
    pub fn emu(&self) -> Vec<i64> {
        self.scaled((self.available_width * EMU_PER_INCH).round() as i64)
    }

    /// Distribute an integer total by share, giving the rounding
    /// remainder to the last column.
    pub fn scaled(&self, total: i64) -> Vec<i64> {
        let mut out: Vec<i64> = self
            .shares
            .iter()
            .map(|s| (s * total as f64).round() as i64)
            .collect();
        if let Some(last) = out.last_mut() {
            let assigned: i64 = self.shares[..self.shares.len() - 1]
                .iter()
                .map(|s| (s * total as f64).round() as i64)
                .sum();
            *last = total - assigned;
        }
        out
    }
}

/// Width score of a cell: the sum of per-character weights after
/// inline markers are removed.
pub fn cell_score(text: &str) -> f64 {
    strip_markers(text).chars().map(char_weight).sum()
}

fn char_weight(c: char) -> f64 {
    if WIDE.contains(c) {
        1.4
    } else if NARROW.contains(c) {
        0.5
    } else if c == ' ' {
        0.6
    } else if c.is_uppercase() {
        1.1
    } else {
        1.0
    }
}

/// Compute a width plan with the default bounds.
pub fn widths(table: &Table, available_width: f64) -> ColumnWidthPlan {
    widths_with(table, available_width, &ColumnConstraints::default())
}

/// Compute a width plan with explicit bounds.
pub fn widths_with(
    table: &Table,
    available_width: f64,
    constraints: &ColumnConstraints,
) -> ColumnWidthPlan {
    let n = table.column_count();
    match n {
        0 => return ColumnWidthPlan::new(Vec::new(), available_width, PlanKind::Empty),
        1 => return ColumnWidthPlan::new(vec![1.0], available_width, PlanKind::Single),
        _ => {}
    }

    if let Some((shares, kind)) = fixed_plan(table) {
        log::debug!("Using fixed {:?} column plan", kind);
        return ColumnWidthPlan::new(shares, available_width, kind);
    }

    let sample = constraints.sample_rows + usize::from(table.has_header);
    let mut scores = vec![0.0f64; n];
    for row in table.rows().iter().take(sample) {
        for (score, cell) in scores.iter_mut().zip(row) {
            *score = score.max(cell_score(cell));
        }
    }

    let (shares, kind) = constrain(&scores, constraints);
    ColumnWidthPlan::new(shares, available_width, kind)
}

/// Hand-tuned plans dispatched by column count and header text.
fn fixed_plan(table: &Table) -> Option<(Vec<f64>, PlanKind)> {
    let header: Vec<String> = table
        .header()?
        .iter()
        .map(|h| strip_markers(h).trim().to_lowercase())
        .collect();

    match header.len() {
        7 if ["role", "task", "activity", "deliverable"]
            .iter()
            .any(|k| header[0].contains(k)) =>
        {
            let mut shares = vec![0.20, 0.16];
            shares.extend([0.128; 5]);
            Some((shares, PlanKind::RoleMatrix))
        }
        2 if ["field", "property", "attribute", "key", "item", "parameter"]
            .contains(&header[0].as_str())
            || ["value", "details", "description"].contains(&header[1].as_str()) =>
        {
            Some((vec![0.3, 0.7], PlanKind::Metadata))
        }
        _ => None,
    }
}

fn constrain(scores: &[f64], constraints: &ColumnConstraints) -> (Vec<f64>, PlanKind) {
    let n = scores.len();
    let min = constraints.min_share;
    // Two columns cannot both stay under the cap.
    let max = if n as f64 * constraints.max_share < 1.0 {
        1.0
    } else {
        constraints.max_share
    };

    if n as f64 * min > 1.0 {
        log::debug!("{} columns cannot meet minimum share {}, splitting evenly", n, min);
        return (vec![1.0 / n as f64; n], PlanKind::Uniform);
    }

    let total: f64 = scores.iter().sum();
    let weights: Vec<f64> = if total > 0.0 {
        scores.iter().map(|s| s / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    };

    let mut shares = weights.clone();
    let mut pinned: Vec<Option<f64>> = vec![None; n];

    for iteration in 0..constraints.max_iterations {
        let free: Vec<usize> = (0..n).filter(|&i| pinned[i].is_none()).collect();
        if free.is_empty() {
            break;
        }

        let remaining = 1.0 - pinned.iter().flatten().sum::<f64>();
        let free_weight: f64 = free.iter().map(|&i| weights[i]).sum();
        for &i in &free {
            shares[i] = if free_weight > 0.0 {
                remaining * weights[i] / free_weight
            } else {
                remaining / free.len() as f64
            };
        }

        let over: Vec<usize> = free.iter().copied().filter(|&i| shares[i] > max).collect();
        let under: Vec<usize> = free.iter().copied().filter(|&i| shares[i] < min).collect();
        if over.is_empty() && under.is_empty() {
            break;
        }

        let over_mass: f64 = over.iter().map(|&i| shares[i] - max).sum();
        let under_mass: f64 = under.iter().map(|&i| min - shares[i]).sum();
        log::debug!(
            "Column pass {}: {} over, {} under",
            iteration + 1,
            over.len(),
            under.len()
        );
        if over_mass >= under_mass {
            for i in over {
                pinned[i] = Some(max);
                shares[i] = max;
            }
        } else {
            for i in under {
                pinned[i] = Some(min);
                shares[i] = min;
            }
        }
    }

    for share in &mut shares {
        *share = share.clamp(min, max);
    }
    let sum: f64 = shares.iter().sum();
    if sum > 0.0 {
        for share in &mut shares {
            *share /= sum;
        }
    }

    (shares, PlanKind::Weighted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn table(header: &[&str], body: &[&[&str]]) -> Table {
        Table::with_header(
            header.iter().copied(),
            body.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn assert_sums_to_one(plan: &ColumnWidthPlan) {
        let sum: f64 = plan.shares().iter().sum();
        assert!((sum - 1.0).abs() < EPS, "shares sum to {}", sum);
    }

    #[test]
    fn test_char_weights() {
        assert!((cell_score("M") - 1.4).abs() < EPS);
        assert!((cell_score("A") - 1.1).abs() < EPS);
        assert!((cell_score("I") - 0.5).abs() < EPS);
        assert!((cell_score("a b") - 2.6).abs() < EPS);
        assert!((cell_score("**bold**") - cell_score("bold")).abs() < EPS);
    }

    #[test]
    fn test_long_first_column_clipped() {
        let t = table(
            &["Task", "Vendor", "Client", "SME"],
            &[
                &["Design and document the target landing zone architecture", "R", "A", "C"],
                &["Migrate production workloads with zero downtime cutover", "R", "C", "I"],
            ],
        );
        let plan = widths(&t, DEFAULT_PAGE_WIDTH);
        let shares = plan.shares();
        assert_eq!(plan.kind(), PlanKind::Weighted);
        assert_sums_to_one(&plan);
        assert!((shares[0] - 0.35).abs() < 1e-6, "task share {}", shares[0]);
        assert!(shares[1..].iter().all(|&s| s < shares[0]));
    }

    #[test]
    fn test_bounds_hold_for_feasible_widths() {
        let cells = ["x", "a much longer cell value here", "mid size", "WWWWWWWW", "ii"];
        for n in 3..=12 {
            let header: Vec<&str> = (0..n).map(|i| cells[i % cells.len()]).collect();
            let row: Vec<&str> = (0..n).map(|i| cells[(i * 3) % cells.len()]).collect();
            let t = table(&header, &[&row]);
            let plan = widths(&t, DEFAULT_PAGE_WIDTH);
            assert_sums_to_one(&plan);
            for &s in plan.shares() {
                assert!(
                    (0.08 - 1e-6..=0.35 + 1e-6).contains(&s),
                    "{} columns: share {} out of bounds",
                    n,
                    s
                );
            }
        }
    }

    #[test]
    fn test_single_and_empty() {
        let plan = widths(&table(&["Only"], &[&["x"]]), 6.5);
        assert_eq!(plan.shares(), &[1.0]);
        assert_eq!(plan.kind(), PlanKind::Single);

        let plan = widths(&Table::default(), 6.5);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_two_columns_drop_max_bound() {
        let t = table(&["Name", "Notes"], &[&["a", "a long description of the row"]]);
        let plan = widths(&t, 6.5);
        assert_sums_to_one(&plan);
        assert!(plan.shares()[1] > 0.5);
        assert!(plan.shares()[0] >= 0.08 - EPS);
    }

    #[test]
    fn test_many_columns_uniform() {
        let header: Vec<String> = (0..14).map(|i| format!("C{}", i)).collect();
        let header: Vec<&str> = header.iter().map(String::as_str).collect();
        let plan = widths(&table(&header, &[]), 6.5);
        assert_eq!(plan.kind(), PlanKind::Uniform);
        assert_sums_to_one(&plan);
    }

    #[test]
    fn test_role_matrix_fixed_plan() {
        let t = table(
            &["Role", "Owner", "Plan", "Build", "Test", "Deploy", "Run"],
            &[&["PM", "Acme", "A", "C", "I", "I", "I"]],
        );
        let plan = widths(&t, 6.5);
        assert_eq!(plan.kind(), PlanKind::RoleMatrix);
        assert_eq!(plan.shares()[0], 0.20);
        assert_eq!(plan.shares()[1], 0.16);
        assert_sums_to_one(&plan);
    }

    #[test]
    fn test_metadata_fixed_plan() {
        let t = table(&["Field", "Value"], &[&["Client", "Acme"]]);
        let plan = widths(&t, 6.5);
        assert_eq!(plan.kind(), PlanKind::Metadata);
        assert_eq!(plan.shares(), &[0.3, 0.7]);

        let t = table(&["Setting", "Description"], &[&["x", "y"]]);
        assert_eq!(widths(&t, 6.5).kind(), PlanKind::Metadata);
    }

    #[test]
    fn test_headerless_skips_fixed_plans() {
        let t = Table::from_rows(
            vec![
                vec!["Field".into(), "Value".into()],
                vec!["a".into(), "b".into()],
            ],
            false,
        );
        assert_eq!(widths(&t, 6.5).kind(), PlanKind::Weighted);
    }

    #[test]
    fn test_absolute_units() {
        let t = table(&["A", "B", "C"], &[&["one", "two", "three"]]);
        let plan = widths(&t, DEFAULT_PAGE_WIDTH);
        assert_eq!(plan.twips().iter().sum::<i64>(), 9360);
        assert_eq!(plan.emu().iter().sum::<i64>(), 5_943_600);
        let inches: f64 = plan.widths().iter().sum();
        assert!((inches - 6.5).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let t = table(&["Phase", "Hours", "Owner"], &[&["Discovery", "16", "Acme"]]);
        assert_eq!(widths(&t, 6.5), widths(&t, 6.5));
    }
}
