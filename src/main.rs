use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use texelbake::bvh::{self, FlatBvh};
use texelbake::job::{BakeJob, MappingMethod, NormalImportMode, SolverConfig};
use texelbake::loaders;
use texelbake::mapping::Mapping;
use texelbake::mesh::{LoadError, Mesh};
use texelbake::runner::{Runner, Task};
use texelbake::sampling::SamplePool;
use texelbake::solvers::{ao::AmbientOcclusion, bent_normals::BentNormals, height::Height};
use texelbake::solvers::{normal::Normal, position::Position, thickness::Thickness};
use texelbake::uvmap::{self, CompressedUvMap, MappingMode};

/// How many texels/rays a task processes per `Runner::tick`. Large enough
/// that per-call overhead is negligible, small enough that a future
/// interactive host could interleave other work between ticks.
const WORK_PER_FRAME: usize = 1 << 16;

#[derive(Parser, Debug)]
#[command(name = "bake", about = "Bakes per-texel surface attribute maps onto a low-poly mesh's UVs")]
struct Args {
    /// Path to the job's JSON configuration file.
    #[arg(long)]
    job: String,

    /// Enable debug-level logging.
    #[arg(long)]
    verbose: bool,
}

fn install_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_mesh(path: &str) -> Result<Mesh, LoadError> {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("ply") => loaders::ply::load(path),
        _ => loaders::obj::load(path),
    }
}

fn apply_normal_mode(mesh: &mut Mesh, mode: NormalImportMode) {
    match mode {
        NormalImportMode::Import => {}
        NormalImportMode::ComputePerFace => mesh.recompute_face_normals(),
        NormalImportMode::ComputePerVertex => mesh.recompute_vertex_normals_aggressive(),
    }
}

fn mapping_mode(job: &BakeJob) -> MappingMode {
    match job.mapping_method {
        MappingMethod::LowPolyNormals => MappingMode::LowPolyNormals,
        MappingMethod::Smooth => MappingMode::Smooth,
        MappingMethod::Hybrid => MappingMode::Hybrid {
            edge_distance: job.hybrid_edge_distance,
        },
    }
}

/// Runs `task` alone to completion. Used for the mapping stage, whose output
/// every solver task needs in hand before it can run even its first slice —
/// the opposite of a solver's own in-`Runner` scheduling, where the stack's
/// LIFO order only governs which of several *already-running* tasks gets the
/// next tick.
fn run_task_to_completion(task: &mut impl Task) -> anyhow::Result<()> {
    while !task.run_step() {}
    task.finish().context("task finish failed")?;
    Ok(())
}

fn build_bvh(mesh: &Mesh, max_triangles_per_leaf: usize, max_depth: usize) -> FlatBvh {
    let tree = bvh::build(mesh, max_triangles_per_leaf, max_depth);
    FlatBvh::from_tree(&tree, mesh)
}

fn push_solver_tasks(
    runner: &mut Runner,
    job: &BakeJob,
    mapping: &Arc<texelbake::mapping::MappingOutput>,
) {
    if job.height_solver.enabled {
        runner.push(Box::new(Height::new(
            mapping.clone(),
            job.height_solver.output_path.clone(),
            job.dilation,
            WORK_PER_FRAME,
        )));
    }
    if job.position_solver.enabled {
        runner.push(Box::new(Position::new(
            mapping.clone(),
            job.position_solver.output_path.clone(),
            job.dilation,
            WORK_PER_FRAME,
        )));
    }
    if job.normal_solver.enabled {
        runner.push(Box::new(Normal::new(
            mapping.clone(),
            job.normal_solver.output_path.clone(),
            job.dilation,
            job.normal_solver.tangent_space,
            WORK_PER_FRAME,
        )));
    }
    if job.ao_solver.enabled {
        let pool = sample_pool(&job.ao_solver);
        runner.push(Box::new(AmbientOcclusion::new(
            mapping.clone(),
            pool,
            job.ao_solver.output_path.clone(),
            job.dilation,
            job.ao_solver.min_distance,
            job.ao_solver.max_distance,
            job.ao_cull_backfaces,
            WORK_PER_FRAME,
        )));
    }
    if job.bent_normals_solver.enabled {
        let pool = sample_pool(&job.bent_normals_solver);
        runner.push(Box::new(BentNormals::new(
            mapping.clone(),
            pool,
            job.bent_normals_solver.output_path.clone(),
            job.dilation,
            job.bent_normals_solver.min_distance,
            job.bent_normals_solver.max_distance,
            job.bent_normals_cull_backfaces,
            job.bent_normals_solver.tangent_space,
            WORK_PER_FRAME,
        )));
    }
    if job.thickness_solver.enabled {
        let pool = sample_pool(&job.thickness_solver);
        runner.push(Box::new(Thickness::new(
            mapping.clone(),
            pool,
            job.thickness_solver.output_path.clone(),
            job.dilation,
            job.thickness_solver.min_distance,
            job.thickness_solver.max_distance,
            job.thickness_cull_backfaces,
            job.thickness_invert,
            WORK_PER_FRAME,
        )));
    }
}

fn sample_pool(config: &SolverConfig) -> Arc<SamplePool> {
    let mut rng = rand::thread_rng();
    Arc::new(SamplePool::generate(config.sample_count, &mut rng))
}

fn build_uvmap(job: &BakeJob, low_poly: &Mesh) -> anyhow::Result<CompressedUvMap> {
    let smoothing = match job.mapping_method {
        MappingMethod::LowPolyNormals => None,
        MappingMethod::Smooth | MappingMethod::Hybrid => {
            let mut smoothed = low_poly.clone();
            smoothed.recompute_vertex_normals_aggressive();
            Some(smoothed)
        }
    };
    let map = uvmap::rasterize(
        low_poly,
        smoothing.as_ref(),
        job.width,
        job.height,
        mapping_mode(job),
    )
    .context("failed to rasterize the low-poly mesh's UV chart")?;
    Ok(map)
}

fn run(args: &Args) -> anyhow::Result<()> {
    let job = BakeJob::load(&args.job).with_context(|| format!("failed to load job file {}", args.job))?;

    let mut low_poly =
        load_mesh(&job.low_poly_mesh).with_context(|| format!("failed to load low-poly mesh {}", job.low_poly_mesh))?;
    apply_normal_mode(&mut low_poly, job.low_poly_normal_mode);

    let mut high_poly = if job.high_poly_mesh.is_empty() || job.high_poly_mesh == job.low_poly_mesh {
        low_poly.clone()
    } else {
        load_mesh(job.high_poly_mesh_path())
            .with_context(|| format!("failed to load high-poly mesh {}", job.high_poly_mesh_path()))?
    };
    apply_normal_mode(&mut high_poly, job.high_poly_normal_mode);

    let uvmap = Arc::new(build_uvmap(&job, &low_poly)?);
    let bvh = Arc::new(build_bvh(&high_poly, job.bvh_max_triangles_per_leaf, job.bvh_max_depth));

    tracing::info!(texels = uvmap.len(), triangles = high_poly.triangles().len(), "built UV map and BVH");

    let mut mapping = Mapping::new(uvmap, bvh, job.ignore_backfaces, WORK_PER_FRAME);
    run_task_to_completion(&mut mapping).context("mesh mapping stage failed")?;
    let mapping_output = mapping.output();

    let mut runner = Runner::new();
    push_solver_tasks(&mut runner, &job, &mapping_output);

    runner.run_to_completion().context("a solver task failed")?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    install_logging(args.verbose);
    run(&args)
}
