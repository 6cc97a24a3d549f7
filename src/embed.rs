use chrono;
use clap::Args;
use nalgebra::DMatrix;
use plotters::prelude::*;
use rayon::prelude::*;
use std::error::Error;
use std::path::Path;
use std::time::Instant;

use crate::color::{self, ColorMap, SampleMap};
use crate::error::AppError;
use crate::matrix::LodMatrix;
use crate::table::Table;

/// Validate network command arguments
fn validate_network_args(args: &NetworkArgs) -> Result<(), Box<dyn Error>> {
    // Validate input files
    if args.matrix.trim().is_empty() {
        return Err("Error: Matrix path cannot be empty".into());
    }
    if !Path::new(&args.matrix).exists() {
        return Err(format!("Error: Matrix file does not exist: {}", args.matrix).into());
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

    // Validate output path
    if args.output.trim().is_empty() {
        return Err("Error: Output file path cannot be empty".into());
    }
    if !args.output.ends_with(".png") {
        return Err(format!(
            "Error: Output file path must end with .png: {}",
            args.output
        )
        .into());
    }

    // Validate transform parameters
    if !args.lod_cutoff.is_finite() {
        return Err(format!(
            "Error: LOD cutoff must be finite, current: {}",
            args.lod_cutoff
        )
        .into());
    }
    if !args.scale.is_finite() {
        return Err(format!(
            "Error: Logistic scale must be finite, current: {}",
            args.scale
        )
        .into());
    }
    if !args.midpoint.is_finite() {
        return Err(format!(
            "Error: Logistic midpoint must be finite, current: {}",
            args.midpoint
        )
        .into());
    }
    if !args.sentinel.is_finite() {
        return Err(format!(
            "Error: Sentinel distance must be finite, current: {}",
            args.sentinel
        )
        .into());
    }
    if args.scale <= 0.0 {
        return Err(format!(
            "Error: Logistic scale must be greater than 0, current: {}",
            args.scale
        )
        .into());
    }
    if args.sentinel <= 0.0 {
        return Err(format!(
            "Error: Sentinel distance must be greater than 0, current: {}",
            args.sentinel
        )
        .into());
    }

    Ok(())
}

#[derive(Args, Debug)]
pub struct NetworkArgs {
    // Input files
    /// LOD matrix output from crosscheck
    #[arg(short = 'M', long = "matrix")]
    pub matrix: String,
    /// Tab-separated sample_id / individual map
    #[arg(short = 'S', long = "sample_individual_map")]
    pub sample_map: String,

    // Output configuration
    /// Output PNG path
    #[arg(short = 'o', long = "output", default_value = "relatedness.png")]
    pub output: String,

    // Distance transform configuration
    /// LOD score at or below which samples are maximally distant
    #[arg(long = "lod-cutoff", default_value_t = -10.0)]
    pub lod_cutoff: f64,
    /// Steepness of the logistic LOD-to-distance transform
    #[arg(long = "scale", default_value_t = 0.5)]
    pub scale: f64,
    /// LOD score mapped to the logistic midpoint
    #[arg(long = "midpoint", default_value_t = 4.0)]
    pub midpoint: f64,
    /// Distance assigned at or below the LOD cutoff
    #[arg(long = "sentinel", default_value_t = 1.2)]
    pub sentinel: f64,

    // Display configuration
    /// Mean absolute row LOD at which a sample is drawn half transparent
    #[arg(long = "alpha-threshold", default_value_t = 5.0)]
    pub alpha_threshold: f64,

    // Logging
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

/// Parameters of the logistic LOD-to-distance transform.
#[derive(Debug, Clone, Copy)]
pub struct DistanceParams {
    pub cutoff: f64,
    pub scale: f64,
    pub midpoint: f64,
    pub sentinel: f64,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            cutoff: -10.0,
            scale: 0.5,
            midpoint: 4.0,
            sentinel: 1.2,
        }
    }
}

/// Map a pairwise LOD score to an embedding distance. Scores above the
/// cutoff go through a falling logistic curve so strongly related pairs
/// land near 0; everything at or below the cutoff gets the fixed sentinel
/// distance, beyond the curve's own range.
pub fn lod_to_distance(lod: f64, params: &DistanceParams) -> f64 {
    if lod > params.cutoff {
        1.0 / (1.0 + (-params.scale * (params.midpoint - lod)).exp())
    } else {
        params.sentinel
    }
}

/// Pairwise distance matrix in column order, diagonal forced to 0.
pub fn distance_matrix(
    matrix: &LodMatrix,
    params: &DistanceParams,
) -> Result<Vec<Vec<f64>>, AppError> {
    let order = matrix.row_order()?;
    let distances = order
        .par_iter()
        .enumerate()
        .map(|(i, &row_idx)| {
            matrix.rows[row_idx]
                .scores
                .iter()
                .enumerate()
                .map(|(j, &lod)| {
                    if j == i {
                        0.0
                    } else {
                        lod_to_distance(lod, params)
                    }
                })
                .collect()
        })
        .collect();
    Ok(distances)
}

/// Strategy for projecting a precomputed distance matrix into two dimensions.
pub trait Embedder {
    fn fit(&self, distances: &[Vec<f64>]) -> Result<Vec<(f64, f64)>, AppError>;
}

/// Classical metric multidimensional scaling: double-center the squared
/// distances and read coordinates off the top two eigenpairs.
pub struct MdsEmbedder;

impl Embedder for MdsEmbedder {
    fn fit(&self, distances: &[Vec<f64>]) -> Result<Vec<(f64, f64)>, AppError> {
        let n = distances.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if n == 1 {
            return Ok(vec![(0.0, 0.0)]);
        }

        let squared = DMatrix::from_fn(n, n, |i, j| distances[i][j] * distances[i][j]);
        let centering = DMatrix::identity(n, n) - DMatrix::from_element(n, n, 1.0 / n as f64);
        let gram = (&centering * squared * &centering) * -0.5;

        let eigens = gram.symmetric_eigen();
        let mut eigen_and_eigenvec: Vec<_> = eigens
            .eigenvectors
            .column_iter()
            .zip(eigens.eigenvalues.iter())
            .collect();
        eigen_and_eigenvec.sort_by(|x, y| x.1.partial_cmp(y.1).unwrap());
        eigen_and_eigenvec.reverse();

        // Negative eigenvalues mean the distances are not perfectly
        // Euclidean; they contribute nothing to the coordinates.
        let (first_vec, first_val) = &eigen_and_eigenvec[0];
        let (second_vec, second_val) = &eigen_and_eigenvec[1];
        let x_scale = first_val.max(0.0).sqrt();
        let y_scale = second_val.max(0.0).sqrt();

        Ok((0..n)
            .map(|i| (first_vec[i] * x_scale, second_vec[i] * y_scale))
            .collect())
    }
}

fn plot_embedding(
    output: &str,
    coords: &[(f64, f64)],
    individuals: &[&str],
    colors: &ColorMap,
    alphas: &[f64],
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(output, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let root = root.margin(10, 10, 10, 10);

    // Determine data range
    let min_x = coords.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = coords.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = coords.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = coords.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
    let x_pad = ((max_x - min_x) * 0.1).max(0.1);
    let y_pad = ((max_y - min_y) * 0.1).max(0.1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Sample Relatedness", ("sans-serif", 30))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(
            (min_x - x_pad)..(max_x + x_pad),
            (min_y - y_pad)..(max_y + y_pad),
        )?;

    chart
        .configure_mesh()
        .x_desc("Dimension 1")
        .y_desc("Dimension 2")
        .draw()?;

    // One series per individual, points shaded by per-sample alpha
    for (individual, fill) in colors.iter() {
        let (r, g, b) = color::hex_to_rgb(fill)?;
        let rgb = RGBColor(r, g, b);
        let points: Vec<(f64, f64, f64)> = individuals
            .iter()
            .enumerate()
            .filter(|(_, ind)| **ind == individual)
            .map(|(i, _)| (coords[i].0, coords[i].1, alphas[i]))
            .collect();
        if points.is_empty() {
            continue;
        }

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y, alpha)| Circle::new((x, y), 4, rgb.mix(alpha).filled())),
            )?
            .label(individual)
            .legend(move |(x, y)| Circle::new((x, y), 4, rgb.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;

    Ok(())
}

pub fn run(args: &NetworkArgs, logger: &mut crate::Logger) -> Result<(), Box<dyn Error>> {
    // Validate network command parameters
    validate_network_args(args)?;

    let start_time = Instant::now();

    // Record environment information and parameters
    logger.log("=== CrossViz Network Function Log ===")?;
    logger.log(&format!("Software Version: v{}", crate::VERSION))?;
    logger.log(&format!(
        "Runtime: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    ))?;
    logger.log(&format!("Matrix File: {}", args.matrix))?;
    logger.log(&format!("Sample Map File: {}", args.sample_map))?;
    logger.log(&format!("Output File: {}", args.output))?;
    logger.log("Starting relatedness embedding...")?;

    // Display data loading information
    println!("[Loading data]");
    println!("    LOD matrix: {}", args.matrix);
    println!("    Sample map: {}", args.sample_map);
    println!();

    let matrix_table = Table::from_tsv(&args.matrix)?;
    let matrix = LodMatrix::from_table(&matrix_table)?;
    if matrix.samples.is_empty() {
        return Err("Error: LOD matrix contains no samples".into());
    }
    let sample_table = Table::from_tsv(&args.sample_map)?;
    let samples = SampleMap::from_table(&sample_table)?;
    let colors = ColorMap::assign(&samples)?;

    // Display parameter information
    println!("[Params]");
    println!("    LOD cutoff: {}", args.lod_cutoff);
    println!("    Logistic scale: {}", args.scale);
    println!("    Logistic midpoint: {}", args.midpoint);
    println!("    Sentinel distance: {}", args.sentinel);
    println!("    Alpha threshold: {}", args.alpha_threshold);

    let params = DistanceParams {
        cutoff: args.lod_cutoff,
        scale: args.scale,
        midpoint: args.midpoint,
        sentinel: args.sentinel,
    };

    println!("[Processing] Computing distance matrix...");
    let distances = distance_matrix(&matrix, &params)?;

    println!("[Processing] Embedding {} samples...", matrix.samples.len());
    let embedder = MdsEmbedder;
    let coords = embedder.fit(&distances)?;

    let order = matrix.row_order()?;
    let alphas: Vec<f64> = order
        .iter()
        .map(|&row_idx| color::alpha_for(matrix.rows[row_idx].mean_abs_lod(), args.alpha_threshold))
        .collect();
    let individuals = matrix
        .samples
        .iter()
        .map(|sample| samples.individual(sample))
        .collect::<Result<Vec<_>, _>>()?;

    logger.log(&format!("Samples embedded: {}", coords.len()))?;
    logger.log(&format!("Individuals colored: {}", colors.len()))?;

    plot_embedding(&args.output, &coords, &individuals, &colors, &alphas)?;

    let elapsed = start_time.elapsed();
    println!("[Output]");
    println!("    Embedding: {}", args.output);
    println!("{}", crate::progress::format_time_used(elapsed));
    logger.log(&format!(
        "Relatedness embedding completed, output file: {}",
        args.output
    ))?;

    Ok(())
}
