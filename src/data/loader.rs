//! CSV loading for edge lists and spatial layouts

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use std::path::Path;

use crate::data::layout::SpatialLayout;
use crate::error::PipelineError;
use crate::graph::{CompressedGraph, GraphBuilder};

/// Read a CSV with a header row, keeping every column as a string.
///
/// Schema inference is disabled so user ids such as `00123` survive intact.
fn read_string_frame(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("reading {}", path.display()))?;

    log::debug!("Read {} rows from {}", df.height(), path.display());
    Ok(df)
}

fn invalid(path: &Path, row: usize, message: impl Into<String>) -> PipelineError {
    PipelineError::InvalidRecord {
        path: path.to_path_buf(),
        row,
        message: message.into(),
    }
}

fn required<'a>(value: Option<&'a str>, path: &Path, row: usize, column: &str) -> Result<&'a str, PipelineError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(invalid(path, row, format!("empty {}", column))),
    }
}

/// Load a `source,target,weight` edge list into a multigraph.
///
/// Rows are added in file order; self-loops and parallel edges are kept.
pub fn load_edge_list(path: &Path) -> Result<CompressedGraph> {
    let df = read_string_frame(path)?;

    let source_col = df.column("source")?.str()?;
    let target_col = df.column("target")?.str()?;
    let weight_col = df.column("weight")?.str()?;

    let mut builder = GraphBuilder::with_capacity(df.height());

    for i in 0..df.height() {
        let row = i + 1;
        let src = required(source_col.get(i), path, row, "source")?;
        let dst = required(target_col.get(i), path, row, "target")?;
        let weight_str = required(weight_col.get(i), path, row, "weight")?;

        let weight: u32 = weight_str
            .parse()
            .map_err(|_| invalid(path, row, format!("weight {:?} is not a positive integer", weight_str)))?;
        if weight == 0 {
            return Err(invalid(path, row, "weight must be at least 1").into());
        }

        builder.add_edge(src, dst, weight);
    }

    builder.build()
}

/// Load a `user_id,x,y` layout. The layout tool's `user id` header is also accepted.
pub fn load_layout(path: &Path) -> Result<SpatialLayout> {
    let df = read_string_frame(path)?;

    let id_col = df
        .column("user_id")
        .or_else(|_| df.column("user id"))?
        .str()?;
    let x_col = df.column("x")?.str()?;
    let y_col = df.column("y")?.str()?;

    let mut points = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = i + 1;
        let id = required(id_col.get(i), path, row, "user_id")?;
        let x = parse_coordinate(x_col.get(i), path, row, "x")?;
        let y = parse_coordinate(y_col.get(i), path, row, "y")?;
        points.push((id.to_string(), x, y));
    }

    Ok(SpatialLayout::from_points(points))
}

fn parse_coordinate(value: Option<&str>, path: &Path, row: usize, column: &str) -> Result<f64, PipelineError> {
    let raw = required(value, path, row, column)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(path, row, format!("{} {:?} is not a finite number", column, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_edges_with_string_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_rtn.csv");
        fs::write(&path, "source,target,weight\n007,42,3\n42,007,1\n007,42,2\n").unwrap();

        let graph = load_edge_list(&path).unwrap();
        assert_eq!(graph.node_ids, vec!["007", "42"]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.outgoing_weights(0), &[3, 2]);
    }

    #[test]
    fn rejects_zero_weight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_rtn.csv");
        fs::write(&path, "source,target,weight\na,b,0\n").unwrap();

        let err = load_edge_list(&path).unwrap_err();
        let record = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(record.class(), "invalid-input");
    }

    #[test]
    fn layout_accepts_spaced_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_fdl.csv");
        fs::write(&path, "user id,x,y\na,0.5,-1.0\nb,2,3\n").unwrap();

        let layout = load_layout(&path).unwrap();
        assert_eq!(layout.len(), 2);
        let row = layout.position("b").unwrap();
        assert_eq!(layout.point(row).to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_layout(&dir.path().join("nope.csv")).is_err());
    }
}
