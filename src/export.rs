use std::io::Write;
use std::path::Path;

use csv::Writer;

use crate::error::Result;
use crate::graph::Graph;

/// Writes `node_id,distance_m` rows sorted by distance. Unreachable nodes are
/// written as `inf` only when `include_unreachable` is set. Returns the number
/// of rows written.
pub fn write_distances<W: Write>(writer: W, graph: &Graph, include_unreachable: bool) -> Result<usize> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["node_id", "distance_m"])?;
    let mut rows: Vec<(i64, f64)> = graph.nodes().map(|n| (n.id, n.dist)).collect();
    rows.sort_by(|a, b| a.1.total_cmp(&b.1));
    let mut written = 0;
    for (nid, d) in &rows {
        if d.is_finite() || include_unreachable {
            let val = if d.is_finite() {
                format!("{:.6}", d)
            } else {
                String::from("inf")
            };
            wtr.write_record(&[nid.to_string(), val])?;
            written += 1;
        }
    }
    wtr.flush()?;
    Ok(written)
}

pub fn write_distances_csv<P: AsRef<Path>>(path: P, graph: &Graph, include_unreachable: bool) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    write_distances(file, graph, include_unreachable)
}
