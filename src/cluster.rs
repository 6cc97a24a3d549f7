use chrono;
use clap::Args;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use std::time::Instant;

use crate::color::{self, ColorMap, SampleMap};
use crate::error::AppError;
use crate::graph::DotGraph;
use crate::matrix::LodMatrix;
use crate::progress::SimpleProgress;
use crate::table::Table;

/// Validate cluster command arguments
fn validate_cluster_args(args: &ClusterArgs) -> Result<(), Box<dyn Error>> {
    // Validate input files
    if args.metrics.trim().is_empty() {
        return Err("Error: Clustered crosscheck metrics path cannot be empty".into());
    }
    if !Path::new(&args.metrics).exists() {
        return Err(format!(
            "Error: Clustered crosscheck metrics file does not exist: {}",
            args.metrics
        )
        .into());
    }

    if args.sample_map.trim().is_empty() {
        return Err("Error: Sample individual map path cannot be empty".into());
    }
    if !Path::new(&args.sample_map).exists() {
        return Err(format!(
            "Error: Sample individual map file does not exist: {}",
            args.sample_map
        )
        .into());
    }

    if args.matrix.trim().is_empty() {
        return Err("Error: Matrix path cannot be empty".into());
    }
    if !Path::new(&args.matrix).exists() {
        return Err(format!("Error: Matrix file does not exist: {}", args.matrix).into());
    }

    if args.table.trim().is_empty() {
        return Err("Error: Participant table path cannot be empty".into());
    }
    if !Path::new(&args.table).exists() {
        return Err(format!("Error: Participant table file does not exist: {}", args.table).into());
    }

    // Validate output configuration
    if args.output.trim().is_empty() {
        return Err("Error: Output base name cannot be empty".into());
    }
    if args.render {
        if args.engine.trim().is_empty() {
            return Err("Error: Render engine cannot be empty".into());
        }
        if args.format.trim().is_empty() {
            return Err("Error: Render format cannot be empty".into());
        }
    }

    Ok(())
}

#[derive(Args, Debug)]
pub struct ClusterArgs {
    // Input files
    /// Clustered crosscheck metrics file (ClusterCrosscheckMetrics output)
    #[arg(long = "clustered_crosscheck_metrics")]
    pub metrics: String,
    /// Tab-separated sample_id / individual map
    #[arg(long = "sample_individual_map")]
    pub sample_map: String,
    /// LOD matrix output from crosscheck
    #[arg(long = "matrix")]
    pub matrix: String,
    /// Participant table listing every crosschecked sample
    #[arg(long = "table")]
    pub table: String,

    // Edge configuration
    /// Minimum LOD score for a singleton edge to be drawn
    #[arg(long = "min_edge_weight", default_value_t = 0)]
    pub min_edge_weight: i64,

    // Output configuration
    /// Output base name; the DOT document is written to <base>.gv
    #[arg(short = 'o', long = "output", default_value = "crosscheck_clusters")]
    pub output: String,
    /// Run the layout engine on the saved document
    #[arg(long = "render", default_value_t = false)]
    pub render: bool,
    /// Graphviz layout engine to invoke
    #[arg(long = "engine", default_value = "fdp")]
    pub engine: String,
    /// Rendered output format
    #[arg(long = "format", default_value = "pdf")]
    pub format: String,

    // Logging
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

/// Cluster membership extracted from the crosscheck metrics records.
pub struct Clusters {
    /// Cluster id to ordered-unique member list, in record order
    pub members: Vec<(String, Vec<String>)>,
    /// Samples appearing in any record whose CLUSTER_SIZE is above 1
    pub in_multi: HashSet<String>,
}

/// Group LEFT/RIGHT samples by cluster id. Members keep record order with
/// duplicates skipped; samples from single-member records stay out of
/// `in_multi` so they are still treated as singletons downstream.
pub fn extract_clusters(metrics: &Table) -> Result<Clusters, AppError> {
    let cluster_idx = metrics.column_index("CLUSTER")?;
    let size_idx = metrics.column_index("CLUSTER_SIZE")?;
    let left_idx = metrics.column_index("LEFT_SAMPLE")?;
    let right_idx = metrics.column_index("RIGHT_SAMPLE")?;

    let mut members: Vec<(String, Vec<String>)> = Vec::new();
    let mut in_multi: HashSet<String> = HashSet::new();
    for row in &metrics.rows {
        let cluster = row[cluster_idx].as_str();
        let size: i64 = row[size_idx]
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidNumber {
                value: row[size_idx].clone(),
                context: format!("CLUSTER_SIZE in {}", metrics.source),
            })?;
        let right = row[right_idx].as_str();
        let left = row[left_idx].as_str();

        let idx = match members.iter().position(|(id, _)| id.as_str() == cluster) {
            Some(idx) => idx,
            None => {
                members.push((cluster.to_string(), Vec::new()));
                members.len() - 1
            }
        };

        if size > 1 {
            in_multi.insert(right.to_string());
            in_multi.insert(left.to_string());
        }

        let entry = &mut members[idx].1;
        if !entry.iter().any(|m| m == right) {
            entry.push(right.to_string());
        }
        if !entry.iter().any(|m| m == left) {
            entry.push(left.to_string());
        }
    }

    Ok(Clusters { members, in_multi })
}

/// Participants that never landed in a multi-member cluster.
pub fn find_singletons(
    participants: &Table,
    in_multi: &HashSet<String>,
) -> Result<Vec<String>, AppError> {
    let id_idx = participants.column_index("entity:participant_id")?;
    Ok(participants
        .rows
        .iter()
        .map(|row| row[id_idx].clone())
        .filter(|id| !in_multi.contains(id))
        .collect())
}

/// Above-threshold relationship between a scanned singleton and another sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub a: String,
    pub b: String,
    pub lod: f64,
}

/// Scan the matrix rows of singleton samples. Any nonzero cell marks the
/// row as covered; a cell strictly above `min_edge_weight` becomes an edge
/// unless it points back at the row's own sample or the unordered pair was
/// already emitted. Rows with no nonzero cell at all are reported as having
/// no coverage at the fingerprinting sites.
pub fn find_edges(
    matrix: &LodMatrix,
    singletons: &[String],
    min_edge_weight: f64,
    progress: &mut SimpleProgress,
) -> Result<(Vec<Edge>, Vec<String>), AppError> {
    let singleton_set: HashSet<&str> = singletons.iter().map(|s| s.as_str()).collect();
    let mut edges: Vec<Edge> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut no_coverage: Vec<String> = Vec::new();

    for (i, row) in matrix.rows.iter().enumerate() {
        progress.update(i)?;
        if !singleton_set.contains(row.sample.as_str()) {
            continue;
        }
        let mut covered = false;
        for (j, &lod) in row.scores.iter().enumerate() {
            let partner = matrix.samples[j].as_str();
            if lod != 0.0 {
                covered = true;
            }
            if lod > min_edge_weight {
                if partner == row.sample {
                    continue;
                }
                let key = if row.sample.as_str() < partner {
                    (row.sample.clone(), partner.to_string())
                } else {
                    (partner.to_string(), row.sample.clone())
                };
                if !seen.insert(key) {
                    continue;
                }
                edges.push(Edge {
                    a: row.sample.clone(),
                    b: partner.to_string(),
                    lod,
                });
            }
        }
        if !covered {
            no_coverage.push(row.sample.clone());
        }
    }

    Ok((edges, no_coverage))
}

fn sample_node_attrs(fill: &str) -> Result<Vec<(String, String)>, AppError> {
    Ok(vec![
        ("shape".to_string(), "rectangle".to_string()),
        ("style".to_string(), "filled".to_string()),
        ("color".to_string(), fill.to_string()),
        ("fontcolor".to_string(), color::font_color(fill)?.to_string()),
    ])
}

/// Compose the full DOT document: legend, one subgraph per cluster, the
/// no-coverage partition, leftover singleton nodes, then the edges.
pub fn build_graph(
    clusters: &Clusters,
    samples: &SampleMap,
    colors: &ColorMap,
    singletons: &[String],
    edges: &[Edge],
    no_coverage: &[String],
) -> Result<DotGraph, AppError> {
    let mut graph = DotGraph::new("G");
    graph.graph_attr("pack", "true");
    graph.graph_attr("layout", "fdp");
    graph.node_default("shape", "record");

    let legend = graph.subgraph("cluster_Legend");
    legend.attr("label", "Legend");
    legend.attr("pack", "true");
    legend.attr("bgcolor", "gainsboro");
    for (individual, fill) in colors.iter() {
        legend.node(individual, sample_node_attrs(fill)?);
    }

    let mut nodes_included: HashSet<&str> = HashSet::new();
    for (cluster, members) in &clusters.members {
        let subgraph = graph.subgraph(&format!("cluster_{}", cluster));
        subgraph.attr("label", &format!("Cluster {}", cluster));
        for member in members {
            nodes_included.insert(member.as_str());
            let fill = colors.sample_color(samples, member)?;
            subgraph.node(member, sample_node_attrs(fill)?);
        }
    }

    let no_cov = graph.subgraph("cluster_no_coverage");
    no_cov.attr("label", "No coverage at fingerprinting sites");
    no_cov.attr("bgcolor", "red");
    for sample in no_coverage {
        nodes_included.insert(sample.as_str());
        let fill = colors.sample_color(samples, sample)?;
        no_cov.node(sample, sample_node_attrs(fill)?);
    }

    for sample in singletons {
        if nodes_included.contains(sample.as_str()) {
            continue;
        }
        let fill = colors.sample_color(samples, sample)?;
        graph.node(sample, sample_node_attrs(fill)?);
    }

    for edge in edges {
        graph.edge(
            &edge.a,
            &edge.b,
            vec![("label".to_string(), edge.lod.to_string())],
        );
    }

    Ok(graph)
}

pub fn run(args: &ClusterArgs, logger: &mut crate::Logger) -> Result<(), Box<dyn Error>> {
    // Validate cluster command parameters
    validate_cluster_args(args)?;

    let start_time = Instant::now();

    // Record environment information and parameters
    logger.log("=== CrossViz Cluster Function Log ===")?;
    logger.log(&format!("Software Version: v{}", crate::VERSION))?;
    logger.log(&format!(
        "Runtime: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    ))?;
    logger.log(&format!("Metrics File: {}", args.metrics))?;
    logger.log(&format!("Sample Map File: {}", args.sample_map))?;
    logger.log(&format!("Matrix File: {}", args.matrix))?;
    logger.log(&format!("Participant Table: {}", args.table))?;
    logger.log(&format!("Minimum Edge Weight: {}", args.min_edge_weight))?;
    logger.log(&format!("Output Base: {}", args.output))?;
    logger.log("Starting cluster graph construction...")?;

    // Display data loading information
    println!("[Loading data]");
    println!("    Cluster metrics: {}", args.metrics);
    println!("    Sample map: {}", args.sample_map);
    println!("    LOD matrix: {}", args.matrix);
    println!("    Participant table: {}", args.table);
    println!();

    let metrics = Table::from_metrics_tsv(&args.metrics)?;
    let sample_table = Table::from_tsv(&args.sample_map)?;
    let participants = Table::from_tsv(&args.table)?;
    let matrix_table = Table::from_tsv(&args.matrix)?;
    let matrix = LodMatrix::from_table(&matrix_table)?;

    // Display parameter information
    println!("[Params]");
    println!("    Minimum edge weight: {}", args.min_edge_weight);

    let clusters = extract_clusters(&metrics)?;
    let singletons = find_singletons(&participants, &clusters.in_multi)?;

    println!("[Processing] Scanning singleton matrix rows...");
    let mut progress = SimpleProgress::new(matrix.rows.len());
    let (edges, no_coverage) = find_edges(
        &matrix,
        &singletons,
        args.min_edge_weight as f64,
        &mut progress,
    )?;
    progress.finish()?;

    let samples = SampleMap::from_table(&sample_table)?;
    let colors = ColorMap::assign(&samples)?;

    logger.log(&format!("Clusters: {}", clusters.members.len()))?;
    logger.log(&format!("Singletons: {}", singletons.len()))?;
    logger.log(&format!("Edges above threshold: {}", edges.len()))?;
    logger.log(&format!("Samples without coverage: {}", no_coverage.len()))?;
    logger.log(&format!("Individuals colored: {}", colors.len()))?;

    let graph = build_graph(
        &clusters,
        &samples,
        &colors,
        &singletons,
        &edges,
        &no_coverage,
    )?;
    let dot_path = graph.save(&args.output)?;

    let elapsed = start_time.elapsed();
    println!("[Output]");
    println!("    Graph: {}", dot_path.display());
    logger.log(&format!("Graph document written: {}", dot_path.display()))?;

    if args.render {
        let rendered = graph.render(&args.output, &args.engine, &args.format)?;
        println!("    Rendered: {}", rendered.display());
        logger.log(&format!(
            "Rendered with {}: {}",
            args.engine,
            rendered.display()
        ))?;
    }

    println!("{}", crate::progress::format_time_used(elapsed));
    logger.log("Cluster graph construction completed")?;

    Ok(())
}
