use policy_iteration::{envs::grid_world::GridWorld, *};
use std::env;
use std::process::ExitCode;
use std::rc::Rc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Usage: policy_iteration [book|bridge|cliff] [config.json]
fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let grid = match args.next().as_deref() {
        None | Some("book") => GridWorld::book_grid()?,
        Some("bridge") => GridWorld::bridge_grid()?,
        Some("cliff") => GridWorld::cliff_grid()?,
        Some(other) => {
            return Err(MdpError::InvalidModel(format!(
                "unknown grid '{other}', expected one of: book, bridge, cliff"
            )))
        }
    };
    let config = match args.next() {
        Some(path) => SolverConfig::from_json_file(path)?,
        None => SolverConfig::default(),
    };

    let grid = Rc::new(grid);
    let pi = PolicyIteration::from_config(Rc::clone(&grid), &config)?;
    info!(
        discount = pi.gamma(),
        iterations = pi.iterations(),
        stable_since = ?pi.stable_since(),
        "solved grid"
    );

    println!("{}", grid.render_values(|s| pi.get_value(s).ok()));
    println!();
    println!("{}", grid.render_policy(|s| pi.get_policy(s).ok().flatten()));

    if let Some(start) = grid.start() {
        let ep = MdpSimulator::new(&*grid, 2718).run_episode(&pi, start, 100)?;
        info!(
            steps = ep.steps.len(),
            terminated = ep.terminated,
            discounted_return = ep.discounted_return(pi.gamma()),
            "sample episode from start"
        );
    }

    Ok(())
}
