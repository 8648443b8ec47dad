//! Results persistence module

use anyhow::{Context, Result};
use crossbeam::channel::{self, Sender};
use polars::prelude::*;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cluster::{BlockAssignment, EventResult};
use crate::graph::CompressedGraph;
use crate::reduce::ReductionStats;

/// Render a duration as `H:MM:SS.ffffff`
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{:02}:{:02}.{:06}", hours, minutes, seconds, duration.subsec_micros())
}

/// Write a frame as CSV; fields are quoted only where needed
fn write_frame<W: Write>(df: &mut DataFrame, out: W, header: bool) -> Result<()> {
    CsvWriter::new(out).include_header(header).finish(df)?;
    Ok(())
}

fn save_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_frame(df, &mut out, true).with_context(|| format!("writing {}", path.display()))?;
    out.flush()?;
    log::debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Save a reduced network as `source,target,weight`
pub fn write_edge_list(graph: &CompressedGraph, path: &Path) -> Result<()> {
    let edge_count = graph.edge_count();
    let mut sources = Vec::with_capacity(edge_count);
    let mut targets = Vec::with_capacity(edge_count);
    let mut weights = Vec::with_capacity(edge_count);

    for (src, dst, weight) in graph.iter_edges() {
        sources.push(graph.node_ids[src as usize].as_str());
        targets.push(graph.node_ids[dst as usize].as_str());
        weights.push(weight);
    }

    let mut df = df!(
        "source" => sources,
        "target" => targets,
        "weight" => weights
    )?;
    save_frame(&mut df, path)
}

/// Save the single-row reduction stats file
pub fn write_reduction_stats(stats: &ReductionStats, path: &Path) -> Result<()> {
    let mut df = df!(
        "N_nodes_full" => [stats.n_nodes_full as u64],
        "N_nodes_gc" => [stats.n_nodes_gc as u64],
        "N_nodes_sa" => [stats.n_nodes_sa as u64]
    )?;
    save_frame(&mut df, path)
}

/// Save one row per node: `user_id,block,indegree,outdegree`
pub fn write_block_assignment(assignment: &BlockAssignment, path: &Path) -> Result<()> {
    let mut df = df!(
        "user_id" => assignment.user_ids.as_slice(),
        "block" => assignment.blocks.as_slice(),
        "indegree" => assignment.indegree.as_slice(),
        "outdegree" => assignment.outdegree.as_slice()
    )?;
    save_frame(&mut df, path)
}

/// One row of the cross-event stats table
#[derive(Debug, Clone, PartialEq)]
pub struct EventStatsRow {
    pub trend: String,
    pub n_users: usize,
    pub n_links: usize,
    pub n_clusters: usize,
    pub silhouette_score: f64,
    pub n_sbm_runs: usize,
    pub computation_time: Duration,
}

impl From<&EventResult> for EventStatsRow {
    fn from(result: &EventResult) -> Self {
        Self {
            trend: result.trend.clone(),
            n_users: result.n_users,
            n_links: result.n_links,
            n_clusters: result.n_clusters,
            silhouette_score: result.silhouette_score,
            n_sbm_runs: result.n_sbm_runs,
            computation_time: result.computation_time,
        }
    }
}

/// Frame with the columns of `sbm_stats.csv`
fn event_stats_frame(rows: &[EventStatsRow]) -> PolarsResult<DataFrame> {
    df!(
        "trend" => rows.iter().map(|r| r.trend.as_str()).collect::<Vec<_>>(),
        "N_users" => rows.iter().map(|r| r.n_users as u64).collect::<Vec<_>>(),
        "N_links" => rows.iter().map(|r| r.n_links as u64).collect::<Vec<_>>(),
        "N_clusters" => rows.iter().map(|r| r.n_clusters as u64).collect::<Vec<_>>(),
        "silhouette_score" => rows.iter().map(|r| r.silhouette_score).collect::<Vec<_>>(),
        "N_sbm_runs" => rows.iter().map(|r| r.n_sbm_runs as u64).collect::<Vec<_>>(),
        "computation_time" => rows.iter().map(|r| format_duration(r.computation_time)).collect::<Vec<_>>()
    )
}

/// Append-only writer for the cross-event stats table.
///
/// Exactly one recorder owns the file.
pub struct StatsRecorder {
    out: BufWriter<File>,
    path: PathBuf,
    rows: usize,
}

impl StatsRecorder {
    /// Create (or truncate) the table and write its header
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write_frame(&mut event_stats_frame(&[])?, &mut out, true)?;
        out.flush()?;
        Ok(Self {
            out,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    /// Append one row and flush it to disk
    pub fn append(&mut self, row: &EventStatsRow) -> Result<()> {
        let mut df = event_stats_frame(std::slice::from_ref(row))?;
        write_frame(&mut df, &mut self.out, false)
            .with_context(|| format!("appending to {}", self.path.display()))?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Move the recorder onto its own thread; rows sent on the returned
    /// channel are appended in arrival order. Joining yields the row count
    /// once every sender is dropped.
    pub fn spawn(mut self) -> (Sender<EventStatsRow>, JoinHandle<Result<usize>>) {
        let (tx, rx) = channel::unbounded::<EventStatsRow>();
        let handle = thread::spawn(move || {
            for row in rx {
                self.append(&row)?;
            }
            Ok(self.rows)
        });
        (tx, handle)
    }
}

/// Counts for one batch, saved as JSON next to the outputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub events: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Save a batch summary as pretty-printed JSON
pub fn save_summary(summary: &BatchSummary, output_dir: &Path, name: &str) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(name);
    let mut file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(to_string_pretty(summary)?.as_bytes())?;
    log::info!("Summary saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_edge_list;
    use crate::graph::GraphBuilder;

    #[test]
    fn durations_render_like_timedelta() {
        assert_eq!(format_duration(Duration::from_micros(3_723_000_042)), "1:02:03.000042");
        assert_eq!(format_duration(Duration::from_millis(1500)), "0:00:01.500000");
    }

    #[test]
    fn awkward_ids_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_rtn_pp.csv");

        let mut builder = GraphBuilder::with_capacity(3);
        builder.add_edge("a,b", "say \"hi\"", 2);
        builder.add_edge("line\rbreak", "a,b", 1);
        let graph = builder.build().unwrap();
        write_edge_list(&graph, &path).unwrap();

        let reloaded = load_edge_list(&path).unwrap();
        assert_eq!(reloaded.node_ids, graph.node_ids);
        assert_eq!(reloaded.edge_count(), 2);
        assert_eq!(reloaded.outgoing_weights(0), &[2]);
    }

    #[test]
    fn edge_list_is_written_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_rtn_pp.csv");

        let mut builder = GraphBuilder::with_capacity(2);
        builder.add_edge("a", "b", 2);
        builder.add_edge("a", "b", 1);
        write_edge_list(&builder.build().unwrap(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "source,target,weight\na,b,2\na,b,1\n");
    }

    #[test]
    fn recorder_thread_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sbm_stats.csv");

        let (tx, handle) = StatsRecorder::create(&path).unwrap().spawn();
        tx.send(EventStatsRow {
            trend: "t1".into(),
            n_users: 60,
            n_links: 120,
            n_clusters: 2,
            silhouette_score: 0.45,
            n_sbm_runs: 10,
            computation_time: Duration::from_secs(2),
        })
        .unwrap();
        drop(tx);

        assert_eq!(handle.join().unwrap().unwrap(), 1);
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "trend,N_users,N_links,N_clusters,silhouette_score,N_sbm_runs,computation_time"
        );
        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(fields[..4], ["t1", "60", "120", "2"]);
        assert_eq!(fields[4].parse::<f64>().unwrap(), 0.45);
        assert_eq!(fields[5..], ["10", "0:00:02.000000"]);
    }

    #[test]
    fn summary_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let summary = BatchSummary {
            events: 3,
            accepted: 1,
            rejected: 2,
            ..BatchSummary::default()
        };
        save_summary(&summary, dir.path(), "reduction_summary.json").unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("reduction_summary.json")).unwrap()).unwrap();
        assert_eq!(value["rejected"], 2);
    }
}
