//! Partitioned iteration over the rows of a [`Table`].
//!
//! [`PartitionedTable`] binds a [`PartitionedOrder`] to a table and an
//! indexed view of its rows. Each step selects one row; the row's `Name`
//! and `Group` strings (column names configurable) are tracked with their
//! previous values, and any column's cell can be read for the current row.

use super::counter::TimeScale;
use super::partitioned::PartitionedOrder;
use crate::error::{CommError, Result};
use crate::layout::{ColumnSchema, Table, Tensor, TensorData};
use crate::parallel::Comm;

/// A string with the value it held before the last change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurPrv {
    cur: String,
    prv: String,
}

impl CurPrv {
    pub fn cur(&self) -> &str {
        &self.cur
    }

    pub fn prv(&self) -> &str {
        &self.prv
    }

    /// Store `cur`, moving the old value to `prv`. Returns whether it changed.
    pub fn set(&mut self, cur: &str) -> bool {
        let changed = self.cur != cur;
        self.prv = std::mem::replace(&mut self.cur, cur.to_string());
        changed
    }

    fn clear(&mut self) {
        self.cur.clear();
        self.prv.clear();
    }
}

#[derive(Debug, Clone)]
pub struct PartitionedTable {
    table: Table,
    view: Vec<usize>,
    order: PartitionedOrder,
    name_col: String,
    group_col: String,
    trial_name: CurPrv,
    group_name: CurPrv,
}

impl PartitionedTable {
    /// Walk every row of `table`, shuffled from `seed` and split across `comm`.
    pub fn new<C: Comm>(table: Table, seed: u64, comm: &C) -> Result<Self> {
        let view = (0..table.rows()).collect();
        Self::with_view(table, view, seed, comm)
    }

    /// Walk only the rows listed in `view`, in view order when sequential.
    pub fn with_view<C: Comm>(
        table: Table,
        view: Vec<usize>,
        seed: u64,
        comm: &C,
    ) -> Result<Self> {
        if let Some(&bad) = view.iter().find(|&&r| r >= table.rows()) {
            return Err(CommError::Schema(format!(
                "view row {bad} out of range for table with {} rows",
                table.rows()
            )));
        }
        let order = PartitionedOrder::new(view.len(), seed, comm)?;
        Ok(PartitionedTable {
            table,
            view,
            order,
            name_col: "Name".to_string(),
            group_col: "Group".to_string(),
            trial_name: CurPrv::default(),
            group_name: CurPrv::default(),
        })
    }

    pub fn with_name_column(mut self, name: impl Into<String>) -> Self {
        self.name_col = name.into();
        self
    }

    pub fn with_group_column(mut self, name: impl Into<String>) -> Self {
        self.group_col = name.into();
        self
    }

    /// A table without columns has no state to present.
    pub fn validate(&self) -> Result<()> {
        if self.table.num_columns() == 0 {
            return Err(CommError::Schema("table has no columns".into()));
        }
        Ok(())
    }

    /// Restart counters for `run` and forget the tracked names.
    pub fn init(&mut self, run: usize) {
        self.order.init(run);
        self.trial_name.clear();
        self.group_name.clear();
    }

    /// Advance one trial and return the table row it selects.
    pub fn step(&mut self) -> Option<usize> {
        self.order.step()?;
        let row = self.row()?;
        if let Some(name) = string_at(&self.table, &self.name_col, row) {
            self.trial_name.set(name);
        }
        if let Some(group) = string_at(&self.table, &self.group_col, row) {
            self.group_name.set(group);
        }
        Some(row)
    }

    /// Table row selected by the current trial, resolved through the view.
    pub fn row(&self) -> Option<usize> {
        self.order.current().and_then(|i| self.view.get(i).copied())
    }

    pub fn trial_name(&self) -> &CurPrv {
        &self.trial_name
    }

    pub fn group_name(&self) -> &CurPrv {
        &self.group_name
    }

    /// Cell of `column` at the current row, as a one-row tensor.
    pub fn state(&self, column: &str) -> Result<Tensor> {
        let tensor = self
            .table
            .column(column)
            .ok_or_else(|| CommError::Schema(format!("no column named {column}")))?;
        let row = self
            .row()
            .ok_or_else(|| CommError::Schema("no current row; call step first".into()))?;
        tensor
            .row(row)
            .ok_or_else(|| CommError::Internal(format!("row {row} past end of {column}")))
    }

    /// Schema of the tensors [`state`](Self::state) can return.
    pub fn states(&self) -> Vec<ColumnSchema> {
        self.table.schema()
    }

    /// Scales [`counter`](Self::counter) reports, outermost first.
    pub fn counters(&self) -> &'static [TimeScale] {
        &TimeScale::ALL
    }

    pub fn counter(&self, scale: TimeScale) -> (usize, Option<usize>, bool) {
        self.order.counter(scale)
    }

    pub fn set_sequential(&mut self, on: bool) {
        self.order.set_sequential(on);
    }

    pub fn order(&self) -> &PartitionedOrder {
        &self.order
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

fn string_at<'a>(table: &'a Table, column: &str, row: usize) -> Option<&'a str> {
    match table.column(column)?.data() {
        TensorData::Str(v) => v.get(row).map(String::as_str),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommOptions;
    use crate::parallel::{SerialComm, ThreadComm};

    fn trials() -> Table {
        let mut t = Table::new();
        let names = ["a", "b", "c", "d"].map(String::from).to_vec();
        let groups = ["x", "x", "y", "y"].map(String::from).to_vec();
        t.add_column("Name", Tensor::column(TensorData::Str(names))).unwrap();
        t.add_column("Group", Tensor::column(TensorData::Str(groups))).unwrap();
        t.add_column(
            "Input",
            Tensor::from_data(&[4, 2], TensorData::F32(vec![0., 1., 2., 3., 4., 5., 6., 7.]))
                .unwrap(),
        )
        .unwrap();
        t
    }

    fn stand_in() -> SerialComm {
        SerialComm::new(CommOptions::stand_in())
    }

    #[test]
    fn empty_table_fails_validation() {
        let pt = PartitionedTable::new(Table::new(), 1, &stand_in()).unwrap();
        assert!(matches!(pt.validate(), Err(CommError::Schema(_))));
        let pt = PartitionedTable::new(trials(), 1, &stand_in()).unwrap();
        assert!(pt.validate().is_ok());
    }

    #[test]
    fn sequential_steps_track_names() {
        let mut pt = PartitionedTable::new(trials(), 3, &stand_in()).unwrap();
        pt.set_sequential(true);
        pt.init(0);
        assert_eq!(pt.row(), None);
        assert_eq!(pt.step(), Some(0));
        assert_eq!(pt.step(), Some(1));
        assert_eq!(pt.trial_name().cur(), "b");
        assert_eq!(pt.trial_name().prv(), "a");
        assert_eq!(pt.step(), Some(2));
        assert_eq!(pt.group_name().cur(), "y");
        assert_eq!(pt.group_name().prv(), "x");
        let cell = pt.state("Input").unwrap();
        assert_eq!(cell.shape(), &[1, 2]);
        assert_eq!(cell.data(), &TensorData::F32(vec![4., 5.]));
    }

    #[test]
    fn counters_follow_the_order() {
        let mut pt = PartitionedTable::new(trials(), 2, &stand_in()).unwrap();
        pt.init(3);
        for _ in 0..5 {
            pt.step();
        }
        let seen: Vec<_> = pt.counters().iter().map(|&s| pt.counter(s).0).collect();
        assert_eq!(seen, vec![3, 1, 0]);
    }

    #[test]
    fn state_errors() {
        let mut pt = PartitionedTable::new(trials(), 3, &stand_in()).unwrap();
        assert!(pt.state("Input").is_err());
        pt.step();
        assert!(matches!(pt.state("Missing"), Err(CommError::Schema(_))));
    }

    #[test]
    fn view_selects_rows() {
        let mut pt = PartitionedTable::with_view(trials(), vec![3, 1], 5, &stand_in())
            .unwrap()
            .with_name_column("Group");
        pt.set_sequential(true);
        assert_eq!(pt.step(), Some(3));
        assert_eq!(pt.trial_name().cur(), "y");
        assert_eq!(pt.step(), Some(1));
        assert_eq!(pt.trial_name().cur(), "x");
        assert!(PartitionedTable::with_view(trials(), vec![4], 5, &stand_in()).is_err());
    }

    #[test]
    fn ranks_cover_every_row_once_per_epoch() {
        let out = ThreadComm::run(2, |comm| {
            let mut pt = PartitionedTable::new(trials(), 11, &comm).unwrap();
            pt.init(0);
            (0..2).filter_map(|_| pt.step()).collect::<Vec<_>>()
        });
        let mut rows: Vec<usize> = out.into_iter().flatten().collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 2, 3]);
    }
}
