//! Tabular reads
//!
//! Delimited text and Parquet files are decoded into Arrow record batches,
//! then optionally converted to row-oriented JSON records.

use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::json::writer::JsonArray;
use arrow::json::WriterBuilder;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use bytes::Bytes;
use fileflows_core::{FileOpsError, FileOpsResult, Location};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

/// Rows sampled when inferring CSV column types.
const INFER_SCHEMA_ROWS: usize = 1000;

/// Per-column type overrides, keyed by column name.
pub type Dtypes = HashMap<String, DataType>;

/// How the first row of a delimited file is treated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Header {
    /// The first row holds the column names.
    #[default]
    Present,
    /// No header row; columns are named `column_1`, `column_2`, ...
    Absent,
    /// The first row holds the column names; keep only these, in this order.
    Select(Vec<String>),
}

impl From<bool> for Header {
    fn from(has_header: bool) -> Self {
        if has_header {
            Header::Present
        } else {
            Header::Absent
        }
    }
}

impl From<Vec<String>> for Header {
    fn from(columns: Vec<String>) -> Self {
        Header::Select(columns)
    }
}

impl From<&[&str]> for Header {
    fn from(columns: &[&str]) -> Self {
        Header::Select(columns.iter().map(|c| c.to_string()).collect())
    }
}

/// Output container form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableShape {
    /// Arrow record batches.
    #[default]
    Columnar,
    /// One JSON object per row.
    Rows,
}

/// An in-memory table.
#[derive(Debug, Clone)]
pub enum Table {
    Columnar {
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    },
    Rows {
        columns: Vec<String>,
        rows: Vec<Map<String, Value>>,
    },
}

impl Table {
    pub fn column_names(&self) -> Vec<String> {
        match self {
            Table::Columnar { schema, .. } => {
                schema.fields().iter().map(|f| f.name().clone()).collect()
            }
            Table::Rows { columns, .. } => columns.clone(),
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            Table::Columnar { batches, .. } => batches.iter().map(RecordBatch::num_rows).sum(),
            Table::Rows { rows, .. } => rows.len(),
        }
    }

    pub fn shape(&self) -> TableShape {
        match self {
            Table::Columnar { .. } => TableShape::Columnar,
            Table::Rows { .. } => TableShape::Rows,
        }
    }
}

/// File format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Delimited(u8),
    Parquet,
}

impl TabularFormat {
    pub fn detect(location: &Location) -> Self {
        let name = location.file_name().unwrap_or_default().to_lowercase();
        match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("parquet") | Some("pq") => TabularFormat::Parquet,
            Some("tsv") => TabularFormat::Delimited(b'\t'),
            _ => TabularFormat::Delimited(b','),
        }
    }
}

fn arrow_error(source: &str, err: impl std::fmt::Display) -> FileOpsError {
    FileOpsError::Backend(format!("{}: {}", source, err))
}

/// Decode `data` into a table.
pub fn read_table(
    data: Bytes,
    format: TabularFormat,
    header: &Header,
    dtypes: Option<&Dtypes>,
    shape: TableShape,
    source: &str,
) -> FileOpsResult<Table> {
    let (schema, batches) = match format {
        TabularFormat::Delimited(delimiter) => {
            read_delimited(data, delimiter, header, dtypes, source)?
        }
        TabularFormat::Parquet => read_parquet(data, header, dtypes, source)?,
    };

    tracing::debug!(
        source = %source,
        columns = schema.fields().len(),
        rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
        "Table decoded"
    );

    match shape {
        TableShape::Columnar => Ok(Table::Columnar { schema, batches }),
        TableShape::Rows => to_rows(&schema, &batches, source),
    }
}

fn read_delimited(
    data: Bytes,
    delimiter: u8,
    header: &Header,
    dtypes: Option<&Dtypes>,
    source: &str,
) -> FileOpsResult<(SchemaRef, Vec<RecordBatch>)> {
    let has_header = !matches!(header, Header::Absent);
    let format = Format::default()
        .with_header(has_header)
        .with_delimiter(delimiter);
    let (inferred, _) = format
        .infer_schema(Cursor::new(data.clone()), Some(INFER_SCHEMA_ROWS))
        .map_err(|e| arrow_error(source, e))?;

    let schema = Arc::new(apply_dtypes(&inferred, dtypes, source)?);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(has_header)
        .with_delimiter(delimiter)
        .build(Cursor::new(data))
        .map_err(|e| arrow_error(source, e))?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| arrow_error(source, e))?;

    project(schema, batches, header, source)
}

fn read_parquet(
    data: Bytes,
    header: &Header,
    dtypes: Option<&Dtypes>,
    source: &str,
) -> FileOpsResult<(SchemaRef, Vec<RecordBatch>)> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .map_err(|e| arrow_error(source, e))?
        .build()
        .map_err(|e| arrow_error(source, e))?;
    let schema = reader.schema();
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| arrow_error(source, e))?;

    let (schema, batches) = project(schema, batches, header, source)?;
    match dtypes {
        Some(dtypes) if !dtypes.is_empty() => cast_batches(schema, batches, dtypes, source),
        _ => Ok((schema, batches)),
    }
}

/// Replace inferred field types with the requested overrides.
fn apply_dtypes(schema: &Schema, dtypes: Option<&Dtypes>, source: &str) -> FileOpsResult<Schema> {
    let Some(dtypes) = dtypes else {
        return Ok(schema.clone());
    };

    if let Some(unknown) = dtypes.keys().find(|name| schema.index_of(name).is_err()) {
        return Err(FileOpsError::Backend(format!(
            "{}: dtype override for unknown column {}",
            source, unknown
        )));
    }

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| match dtypes.get(field.name()) {
            Some(data_type) => Field::new(field.name(), data_type.clone(), true),
            None => Field::clone(field),
        })
        .collect();
    Ok(Schema::new(fields))
}

/// Keep only the selected columns, in the selected order.
fn project(
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    header: &Header,
    source: &str,
) -> FileOpsResult<(SchemaRef, Vec<RecordBatch>)> {
    let Header::Select(columns) = header else {
        return Ok((schema, batches));
    };

    let indices = columns
        .iter()
        .map(|name| {
            schema.index_of(name).map_err(|_| {
                FileOpsError::Backend(format!("{}: column not found: {}", source, name))
            })
        })
        .collect::<FileOpsResult<Vec<_>>>()?;

    let projected = Arc::new(schema.project(&indices).map_err(|e| arrow_error(source, e))?);
    let batches = batches
        .iter()
        .map(|batch| batch.project(&indices))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| arrow_error(source, e))?;

    Ok((projected, batches))
}

fn cast_batches(
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    dtypes: &Dtypes,
    source: &str,
) -> FileOpsResult<(SchemaRef, Vec<RecordBatch>)> {
    let target = Arc::new(apply_dtypes(&schema, Some(dtypes), source)?);

    let batches = batches
        .iter()
        .map(|batch| {
            let columns = batch
                .columns()
                .iter()
                .zip(target.fields())
                .map(|(column, field)| cast(column.as_ref(), field.data_type()))
                .collect::<Result<Vec<_>, _>>()?;
            RecordBatch::try_new(target.clone(), columns)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| arrow_error(source, e))?;

    Ok((target, batches))
}

fn to_rows(schema: &SchemaRef, batches: &[RecordBatch], source: &str) -> FileOpsResult<Table> {
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer
        .write_batches(&refs)
        .map_err(|e| arrow_error(source, e))?;
    writer.finish().map_err(|e| arrow_error(source, e))?;
    let buf = writer.into_inner();

    let rows = if buf.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice::<Vec<Map<String, Value>>>(&buf)
            .map_err(|e| arrow_error(source, e))?
    };

    Ok(Table::Rows { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use parquet::arrow::ArrowWriter;

    const CSV: &str = "id,name,score\n1,alice,3.5\n2,bob,4.0\n3,carol,\n";

    fn read_csv(header: Header, dtypes: Option<&Dtypes>, shape: TableShape) -> FileOpsResult<Table> {
        read_table(
            Bytes::from_static(CSV.as_bytes()),
            TabularFormat::Delimited(b','),
            &header,
            dtypes,
            shape,
            "test.csv",
        )
    }

    #[test]
    fn test_detect_format() {
        let detect = |s: &str| TabularFormat::detect(&Location::parse(s).unwrap());
        assert_eq!(detect("s3://b/t.parquet"), TabularFormat::Parquet);
        assert_eq!(detect("/tmp/T.PQ"), TabularFormat::Parquet);
        assert_eq!(detect("/tmp/t.tsv"), TabularFormat::Delimited(b'\t'));
        assert_eq!(detect("/tmp/t.csv"), TabularFormat::Delimited(b','));
        assert_eq!(detect("/tmp/noext"), TabularFormat::Delimited(b','));
    }

    #[test]
    fn test_csv_with_header_infers_types() {
        let table = read_csv(Header::Present, None, TableShape::Columnar).unwrap();
        assert_eq!(table.column_names(), vec!["id", "name", "score"]);
        assert_eq!(table.num_rows(), 3);

        let Table::Columnar { schema, batches } = table else {
            panic!("expected columnar table");
        };
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);
        let scores = batches[0]
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!(scores.is_null(2));
    }

    #[test]
    fn test_csv_without_header_names_columns() {
        let table = read_csv(Header::Absent, None, TableShape::Columnar).unwrap();
        assert_eq!(table.column_names(), vec!["column_1", "column_2", "column_3"]);
        // header line becomes data
        assert_eq!(table.num_rows(), 4);
    }

    #[test]
    fn test_csv_select_keeps_requested_order() {
        let header = Header::from(&["score", "id"][..]);
        let table = read_csv(header, None, TableShape::Columnar).unwrap();
        assert_eq!(table.column_names(), vec!["score", "id"]);
        assert_eq!(table.num_rows(), 3);
    }

    #[test]
    fn test_csv_select_unknown_column_fails() {
        let header = Header::Select(vec!["missing".to_string()]);
        let result = read_csv(header, None, TableShape::Columnar);
        assert!(matches!(result, Err(FileOpsError::Backend(msg)) if msg.contains("missing")));
    }

    #[test]
    fn test_csv_dtype_override() {
        let dtypes = Dtypes::from([("id".to_string(), DataType::Utf8)]);
        let table = read_csv(Header::Present, Some(&dtypes), TableShape::Columnar).unwrap();
        let Table::Columnar { schema, batches } = table else {
            panic!("expected columnar table");
        };
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        let ids = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ids.value(1), "2");
    }

    #[test]
    fn test_csv_dtype_for_unknown_column_fails() {
        let dtypes = Dtypes::from([("nope".to_string(), DataType::Utf8)]);
        assert!(read_csv(Header::Present, Some(&dtypes), TableShape::Columnar).is_err());
    }

    #[test]
    fn test_rows_shape() {
        let table = read_csv(Header::Present, None, TableShape::Rows).unwrap();
        assert_eq!(table.shape(), TableShape::Rows);
        let Table::Rows { columns, rows } = table else {
            panic!("expected rows");
        };
        assert_eq!(columns, vec!["id", "name", "score"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["name"], Value::String("alice".to_string()));
        assert_eq!(rows[1]["id"], Value::from(2));
        assert_eq!(rows[2]["score"], Value::Null);
    }

    #[test]
    fn test_parquet_projection_and_cast() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let dtypes = Dtypes::from([("id".to_string(), DataType::Float64)]);
        let table = read_table(
            Bytes::from(buf),
            TabularFormat::Parquet,
            &Header::Select(vec!["name".to_string(), "id".to_string()]),
            Some(&dtypes),
            TableShape::Columnar,
            "t.parquet",
        )
        .unwrap();

        let Table::Columnar { schema, batches } = table else {
            panic!("expected columnar table");
        };
        assert_eq!(schema.field(0).name(), "name");
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(batches[0].num_rows(), 2);
    }
}
