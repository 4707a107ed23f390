use std::{
    fs::File,
    io::{BufWriter, Write as _},
    time::Duration,
};

use anyhow::{Context as _, bail};
use voxelnav::{NavmeshGraph, NodeId, ScanStatus, SharedGraph, graph::PRECISION};
use voxelnav_search::{PathResult, Search, SearchOptions, SearchOutput, SearchPolicy, SearchQueue};

use crate::{BuildArgs, PathArgs, PolicyArg, SceneArgs, input};

/// Loads the scene and builds its navmesh graph.
fn scan(scene: &SceneArgs) -> anyhow::Result<NavmeshGraph> {
    let input = input::load_meshes(&scene.meshes)?;
    let mut builder = input::load_config(scene.config.as_deref())?;
    if scene.fit_bounds {
        builder.bounds = input::fit_bounds(&input, 1.0).context("The meshes have no vertices")?;
    }
    let config = builder.build().context("Invalid navmesh config")?;

    let mut graph = NavmeshGraph::new();
    let status = graph
        .scan(input, config)
        .context("Failed to build the navmesh")?;
    if status == ScanStatus::Empty {
        bail!("No geometry lies inside the navmesh bounds, try --fit-bounds");
    }
    Ok(graph)
}

pub(crate) fn build(args: BuildArgs) -> anyhow::Result<()> {
    let graph = scan(&args.scene)?;
    println!(
        "{} nodes, {} vertices",
        graph.node_count(),
        graph.vertices().len()
    );
    if let Some(bounds) = graph.bounds() {
        println!("bounds: {} to {}", bounds.min, bounds.max);
    }

    if let Some(path) = &args.export {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        graph
            .export_obj(&mut writer, "navmesh")
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "Exported navmesh");
    }
    Ok(())
}

pub(crate) fn path(args: PathArgs) -> anyhow::Result<()> {
    let graph = scan(&args.scene)?.into_shared();
    let options = SearchOptions::default()
        .with_seed(args.seed)
        .with_smoothing(!args.no_smoothing);
    let budget = Duration::from_millis(args.budget_ms.max(1));
    let length = (args.length.max(0.0) * PRECISION as f32).round() as u32;

    let policy = match args.policy {
        PolicyArg::Shortest => SearchPolicy::Shortest {
            start: args.from,
            end: args.to.context("Shortest paths need --to")?,
        },
        PolicyArg::Random => SearchPolicy::random(args.from, length),
        PolicyArg::Flee => SearchPolicy::flee(
            args.from,
            args.to.context("Flee paths need --to as the point to flee from")?,
            length,
        ),
        PolicyArg::Flood => {
            let origin = args.to.context("Flood paths need --to as the flood origin")?;
            let output = run(&graph, SearchPolicy::Flood { start: origin }, options.clone(), budget)?;
            let flood = output.flood().cloned().context("The flood produced no flood field")?;
            tracing::info!(reached = flood.len(), "Flooded navmesh");
            SearchPolicy::FloodTrace {
                start: args.from,
                flood,
            }
        }
    };

    let path = run(&graph, policy, options, budget)?
        .into_path()
        .context("The search produced no path")?;
    print_path(&path, args.json)
}

/// Drives a single search through a queue until it finishes, one tick per budget.
fn run(
    graph: &SharedGraph,
    policy: SearchPolicy<NodeId>,
    options: SearchOptions,
    budget: Duration,
) -> anyhow::Result<SearchOutput<NodeId>> {
    let name = policy.name();
    let mut queue = SearchQueue::new();
    let id = queue.submit(Search::new(policy, options));
    let mut ticks = 0_usize;
    loop {
        ticks += 1;
        let finished = queue.tick(&*graph.read(), budget);
        if let Some(done) = finished.into_iter().find(|done| done.id == id) {
            tracing::debug!(%id, ticks, "Search finished");
            return done
                .result
                .with_context(|| format!("The {name} search failed"));
        }
    }
}

fn print_path(path: &PathResult<NodeId>, json: bool) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    if json {
        let positions: Vec<[f32; 3]> = path.positions.iter().map(|p| p.to_array()).collect();
        let value = serde_json::json!({
            "nodes": path.nodes.len(),
            "cost": path.cost,
            "expanded": path.expanded,
            "length": path.length(),
            "positions": positions,
        });
        serde_json::to_writer_pretty(&mut stdout, &value)?;
        writeln!(stdout)?;
    } else {
        for position in &path.positions {
            writeln!(stdout, "{} {} {}", position.x, position.y, position.z)?;
        }
        tracing::info!(
            nodes = path.nodes.len(),
            cost = path.cost,
            expanded = path.expanded,
            length = path.length(),
            "Found path"
        );
    }
    Ok(())
}
