//! Lagrangian injection CLI - Run injection scenarios from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::path::PathBuf;
use std::time::Instant;

use lagrangian_injection::{
    compute::{
        Collaborators, EventLog, InjectionEngine, MeshData, NearestCellTracker, NoHooks,
        NullStatistics, ParticleCounter, SerialComm, StatisticsSink, StepInputs, StepOutcome,
        TimeStep, UniformFluid,
    },
    schema::{Scenario, ZoneKind},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.json> [steps]", args[0]);
        eprintln!();
        eprintln!("Run a Lagrangian particle injection scenario.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  scenario.json  Path to scenario file");
        eprintln!("  steps          Number of time steps (default: from scenario)");
        eprintln!();
        eprintln!("Example scenario is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_scenario();
        return;
    }

    let scenario_path = PathBuf::from(&args[1]);
    let scenario = Scenario::load(&scenario_path).unwrap_or_else(|e| {
        eprintln!("Error loading scenario: {}", e);
        std::process::exit(1);
    });
    let steps: u64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(scenario.steps);

    let mesh = MeshData::from_box(&scenario.mesh);
    let fluid = UniformFluid {
        velocity: scenario.fluid_velocity,
        temperature: scenario.fluid_temperature,
    };

    println!("Lagrangian Injection");
    println!("====================");
    println!(
        "Mesh: {}x{}x{} cells, {} boundary faces",
        scenario.mesh.n[0],
        scenario.mesh.n[1],
        scenario.mesh.n[2],
        scenario.mesh.n_b_faces()
    );
    println!(
        "Zones: {} boundary, {} volume",
        scenario.registry.n_zones(ZoneKind::BoundaryFaces),
        scenario.registry.n_zones(ZoneKind::VolumeCells)
    );
    println!("dtp: {}", scenario.dtp);
    println!("Steps: {}", steps);
    println!();

    let mut engine = InjectionEngine::new(scenario.config.clone()).unwrap_or_else(|e| {
        eprintln!("Error creating engine: {}", e);
        std::process::exit(1);
    });
    let mut counter = ParticleCounter::default();
    let mut tracker = NearestCellTracker::default();
    let mut hooks = NoHooks;
    let mut event_log = EventLog::default();
    let mut null_statistics = NullStatistics;
    let statistics: &mut dyn StatisticsSink = if scenario.config.collect_tracking_events {
        &mut event_log
    } else {
        &mut null_statistics
    };

    let visc_length = vec![0.0; scenario.mesh.n_b_faces()];
    let face_types = vec![0; scenario.mesh.n_b_faces()];
    let inputs = StepInputs {
        time_id: 0,
        boundary_face_types: &face_types,
        visc_length: &visc_length,
    };

    println!("Running injection...");
    let start = Instant::now();
    let mut skipped = 0;

    for nt in 1..=steps {
        let time_step = TimeStep {
            nt_cur: nt,
            nt_prev: 0,
            dtp: scenario.dtp,
        };
        let mut collab = Collaborators {
            mesh: &mesh,
            fluid: &fluid,
            comm: &SerialComm,
            tracker: &mut tracker,
            hooks: &mut hooks,
            statistics: &mut *statistics,
        };
        let outcome = engine
            .inject(&scenario.registry, &time_step, &mut counter, &inputs, &mut collab)
            .unwrap_or_else(|e| {
                eprintln!("Injection failed at step {}: {}", nt, e);
                std::process::exit(1);
            });

        match outcome {
            StepOutcome::Skipped { .. } => skipped += 1,
            StepOutcome::Injected(summary) => {
                if nt % (steps / 10).max(1) == 0 {
                    println!(
                        "  Step {}/{}: new={}, failed={}, total={}, weight={:.3}",
                        nt, steps, summary.n_global, summary.n_failed, counter.n_g_total,
                        counter.w_total
                    );
                }
            }
        }
    }
    engine.flush_events(statistics);

    let elapsed = start.elapsed();

    println!();
    println!("Final state:");
    println!("  Particles: {}", counter.n_g_total);
    println!("  Cumulative injected: {}", counter.n_g_cumulative_total);
    println!("  Cumulative failed: {}", counter.n_g_cumulative_failed);
    println!("  Statistical weight: {:.6}", counter.w_total);
    println!("  Skipped steps: {}", skipped);
    if scenario.config.collect_tracking_events {
        println!("  Inflow events: {}", event_log.events.len());
    }
    println!(
        "  Last step flow rates: boundary {:?}, volume {:?}",
        engine.flow_rates().zone_totals(ZoneKind::BoundaryFaces),
        engine.flow_rates().zone_totals(ZoneKind::VolumeCells)
    );
    println!("  Random draws: {}", engine.random_draws());
    println!();
    println!(
        "Time: {:.3}s ({:.1} steps/s)",
        elapsed.as_secs_f32(),
        steps as f32 / elapsed.as_secs_f32()
    );
}

fn print_example_scenario() {
    match serde_json::to_string_pretty(&Scenario::default()) {
        Ok(json) => {
            println!("Example scenario (scenario.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing example: {}", e);
            std::process::exit(1);
        }
    }
}
