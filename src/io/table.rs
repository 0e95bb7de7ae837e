//! Named event tables stored as Parquet files.
//!
//! A file holds one table. Its name is written to the Parquet key-value metadata
//! under [`TABLE_META_KEY`] and mirrored into the Arrow schema metadata; a file
//! without the key, or with a different name, does not contain the requested
//! table.
//!
//! Numeric columns are accepted as Float64, Float32, Int32 or Int64 and widened
//! to `f64`. Nulls read as NaN so they fail every range cut.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, ListArray,
};
use arrow::datatypes::{
    DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema, SchemaRef,
};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::data::Dataset;
use crate::domain::Observable;
use crate::error::AppError;

/// Metadata key carrying the table name.
pub const TABLE_META_KEY: &str = "massfit.table";

/// An in-memory table read from one file.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

/// Open `path` and read table `table` from it.
///
/// Fails with `InputMissing` when the file cannot be opened or is not a Parquet
/// file, and with `TableMissing` when it holds no table of that name.
pub fn read_table(path: &Path, table: &str) -> Result<Table, AppError> {
    let file = File::open(path).map_err(|e| {
        debug!("open {} failed: {e}", path.display());
        AppError::input_missing(path)
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        debug!("{} is not a readable Parquet file: {e}", path.display());
        AppError::input_missing(path)
    })?;

    let stored = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|e| e.key == TABLE_META_KEY))
        .and_then(|e| e.value.clone())
        .or_else(|| builder.schema().metadata().get(TABLE_META_KEY).cloned());
    if stored.as_deref() != Some(table) {
        debug!("{} holds table {stored:?}, wanted '{table}'", path.display());
        return Err(AppError::table_missing(table));
    }

    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| AppError::invalid(format!("cannot read {}: {e}", path.display())))?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::invalid(format!("cannot read {}: {e}", path.display())))?;

    let t = Table {
        name: table.to_string(),
        schema,
        batches,
    };
    info!("read table '{table}' from {} ({} rows)", path.display(), t.num_rows());
    Ok(t)
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    fn chunks(&self, name: &str) -> Result<Vec<&ArrayRef>, AppError> {
        let idx = self.schema.index_of(name).map_err(|_| {
            AppError::invalid(format!("table '{}' has no column '{name}'", self.name))
        })?;
        Ok(self.batches.iter().map(|b| b.column(idx)).collect())
    }

    /// Numeric column widened to `f64`.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>, AppError> {
        let mut out = Vec::with_capacity(self.num_rows());
        for arr in self.chunks(name)? {
            append_numeric(arr.as_ref(), &mut out)
                .map_err(|dt| self.type_error(name, &dt))?;
        }
        Ok(out)
    }

    /// Boolean column; integers are read as `!= 0`, nulls as `false`.
    pub fn column_bool(&self, name: &str) -> Result<Vec<bool>, AppError> {
        let mut out = Vec::with_capacity(self.num_rows());
        for arr in self.chunks(name)? {
            if let Some(b) = arr.as_boolean_opt() {
                out.extend((0..b.len()).map(|i| b.is_valid(i) && b.value(i)));
            } else {
                let mut tmp = Vec::with_capacity(arr.len());
                append_numeric(arr.as_ref(), &mut tmp)
                    .map_err(|dt| self.type_error(name, &dt))?;
                out.extend(tmp.into_iter().map(|v| v != 0.0 && !v.is_nan()));
            }
        }
        Ok(out)
    }

    /// List-of-numbers column, one `Vec<f64>` per row (null rows are empty).
    pub fn column_list_f64(&self, name: &str) -> Result<Vec<Vec<f64>>, AppError> {
        let mut out = Vec::with_capacity(self.num_rows());
        for arr in self.chunks(name)? {
            let list = arr.as_list_opt::<i32>().ok_or_else(|| self.type_error(name, arr.data_type()))?;
            for i in 0..list.len() {
                let mut row = Vec::new();
                if list.is_valid(i) {
                    append_numeric(list.value(i).as_ref(), &mut row)
                        .map_err(|dt| self.type_error(name, &dt))?;
                }
                out.push(row);
            }
        }
        Ok(out)
    }

    fn type_error(&self, column: &str, dt: &DataType) -> AppError {
        AppError::invalid(format!(
            "column '{column}' of table '{}' has unsupported type {dt}",
            self.name
        ))
    }
}

fn append_numeric(arr: &dyn Array, out: &mut Vec<f64>) -> Result<(), DataType> {
    macro_rules! widen {
        ($t:ty) => {{
            let a = arr.as_primitive::<$t>();
            out.extend((0..a.len()).map(|i| if a.is_valid(i) { a.value(i) as f64 } else { f64::NAN }));
        }};
    }
    match arr.data_type() {
        DataType::Float64 => widen!(Float64Type),
        DataType::Float32 => widen!(Float32Type),
        DataType::Int32 => widen!(Int32Type),
        DataType::Int64 => widen!(Int64Type),
        other => return Err(other.clone()),
    }
    Ok(())
}

/// Load one observable (and optionally a weight) into a [`Dataset`].
///
/// Rows whose value lies outside the observable's domain, or whose weight lies
/// outside the weight variable's domain, are dropped.
pub fn load_dataset(
    path: &Path,
    table: &str,
    obs: &Observable,
    weight: Option<&Observable>,
) -> Result<Dataset, AppError> {
    let t = read_table(path, table)?;
    let xs = t.column_f64(&obs.name)?;
    let name = format!("{table}:{}", obs.name);

    let Some(wobs) = weight else {
        let kept: Vec<f64> = xs.into_iter().filter(|&x| obs.contains(x)).collect();
        log_dropped(t.num_rows(), kept.len());
        return Ok(Dataset::new(name, kept));
    };

    let ws = t.column_f64(&wobs.name)?;
    let (kept_x, kept_w): (Vec<f64>, Vec<f64>) = xs
        .into_iter()
        .zip(ws)
        .filter(|&(x, w)| obs.contains(x) && wobs.contains(w))
        .unzip();
    log_dropped(t.num_rows(), kept_x.len());
    Dataset::weighted(name, kept_x, kept_w)
}

fn log_dropped(total: usize, kept: usize) {
    if kept < total {
        info!("dropped {} of {total} rows outside the observable range", total - kept);
    }
}

/// A column to be written by [`write_table`].
#[derive(Debug, Clone)]
pub enum Column {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I32(Vec<i32>),
    Bool(Vec<bool>),
    ListF32(Vec<Vec<f32>>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::F64(v) => v.len(),
            Column::F32(v) => v.len(),
            Column::I32(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::ListF32(v) => v.len(),
        }
    }

    fn into_array(self) -> (DataType, ArrayRef) {
        match self {
            Column::F64(v) => (DataType::Float64, Arc::new(Float64Array::from(v))),
            Column::F32(v) => (DataType::Float32, Arc::new(Float32Array::from(v))),
            Column::I32(v) => (DataType::Int32, Arc::new(Int32Array::from(v))),
            Column::Bool(v) => (DataType::Boolean, Arc::new(BooleanArray::from(v))),
            Column::ListF32(rows) => {
                let list = ListArray::from_iter_primitive::<Float32Type, _, _>(
                    rows.into_iter().map(|r| Some(r.into_iter().map(Some))),
                );
                (list.data_type().clone(), Arc::new(list))
            }
        }
    }
}

/// Write `columns` as table `table` to a new Parquet file at `path`.
pub fn write_table(path: &Path, table: &str, columns: Vec<(&str, Column)>) -> Result<(), AppError> {
    let n = columns.first().map_or(0, |(_, c)| c.len());
    if let Some((name, c)) = columns.iter().find(|(_, c)| c.len() != n) {
        return Err(AppError::invalid(format!(
            "column '{name}' has {} rows, expected {n}",
            c.len()
        )));
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for (name, col) in columns {
        let (dt, arr) = col.into_array();
        fields.push(Field::new(name, dt, false));
        arrays.push(arr);
    }
    let metadata = HashMap::from([(TABLE_META_KEY.to_string(), table.to_string())]);
    let schema = Arc::new(Schema::new(fields).with_metadata(metadata));
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| AppError::invalid(format!("cannot assemble table '{table}': {e}")))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![KeyValue::new(
            TABLE_META_KEY.to_string(),
            table.to_string(),
        )]))
        .build();
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("cannot create {}: {e}", path.display())))?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .map_err(|e| AppError::io(format!("cannot write {}: {e}", path.display())))?;
    writer
        .write(&batch)
        .map_err(|e| AppError::io(format!("cannot write {}: {e}", path.display())))?;
    writer
        .close()
        .map_err(|e| AppError::io(format!("cannot close {}: {e}", path.display())))?;
    info!("wrote table '{table}' to {} ({n} rows)", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn table_name_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        write_table(
            &path,
            "small_tree",
            vec![("m_yy", Column::F64(vec![110.0, 125.0, 170.0]))],
        )
        .unwrap();

        let t = read_table(&path, "small_tree").unwrap();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.column_f64("m_yy").unwrap(), vec![110.0, 125.0, 170.0]);

        let err = read_table(&path, "mini").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableMissing);
        assert_eq!(err.to_string(), "Error: Cannot find table 'mini'");
    }

    #[test]
    fn missing_and_garbage_files_are_input_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.parquet");
        assert_eq!(read_table(&missing, "t").unwrap_err().kind(), ErrorKind::InputMissing);

        let garbage = dir.path().join("garbage.parquet");
        std::fs::write(&garbage, b"not parquet").unwrap();
        assert_eq!(read_table(&garbage, "t").unwrap_err().kind(), ErrorKind::InputMissing);
    }

    #[test]
    fn numeric_widening_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.parquet");
        write_table(
            &path,
            "mini",
            vec![
                ("photon_n", Column::I32(vec![2, 1])),
                ("trigP", Column::Bool(vec![true, false])),
                ("photon_pt", Column::ListF32(vec![vec![1.5, 2.5], vec![]])),
                ("x", Column::F32(vec![0.25, -1.0])),
            ],
        )
        .unwrap();
        let t = read_table(&path, "mini").unwrap();
        assert_eq!(t.column_f64("photon_n").unwrap(), vec![2.0, 1.0]);
        assert_eq!(t.column_bool("trigP").unwrap(), vec![true, false]);
        assert_eq!(t.column_bool("photon_n").unwrap(), vec![true, true]);
        assert_eq!(t.column_list_f64("photon_pt").unwrap(), vec![vec![1.5, 2.5], vec![]]);
        assert_eq!(t.column_f64("x").unwrap(), vec![0.25, -1.0]);
        assert!(t.column_f64("photon_pt").is_err());
        assert!(t.column_f64("nope").is_err());
    }

    #[test]
    fn load_dataset_applies_range_cuts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mc.parquet");
        write_table(
            &path,
            "small_tree",
            vec![
                ("m_yy", Column::F64(vec![104.0, 110.0, 125.0, 160.0])),
                ("weight", Column::F64(vec![1.0, 2e6, 0.5, 0.25])),
            ],
        )
        .unwrap();
        let obs = Observable::diphoton_mass();
        let wobs = Observable::new("weight", "w", -1e6, 1e6);

        let unweighted = load_dataset(&path, "small_tree", &obs, None).unwrap();
        assert_eq!(unweighted.values(), &[110.0, 125.0, 160.0]);

        let weighted = load_dataset(&path, "small_tree", &obs, Some(&wobs)).unwrap();
        assert_eq!(weighted.values(), &[125.0, 160.0]);
        assert_eq!(weighted.weights().unwrap(), &[0.5, 0.25]);
    }
}
