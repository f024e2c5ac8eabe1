//! Polycube Assembly Tool
//!
//! Grows structures from patchy-particle rules, classifies rules as
//! deterministic or not, and searches for the smallest rule that assembles a
//! target shape given as a JSON list of lattice coordinates.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use polycubes::assembly::{Assembly, AssemblyConfig, SeedMode};
use polycubes::codec;
use polycubes::determinism::{classify_with_shape, ClassifyOptions, DEFAULT_TRIALS};
use polycubes::geometry::{Dims, Vec3};
use polycubes::rule::Rule;
use polycubes::sat::{CommandOracle, EmbeddedSolver, Encoder, EncodingOptions};
use polycubes::search::{
    find_minimal_rule, par_find_minimal_rule, SearchOptions, SearchOutcome,
    DEFAULT_ALTERNATIVE_SOLUTIONS,
};
use polycubes::topology::{Topology, TopologySpec};

/// Grows, classifies and synthesizes polycube assembly rules.
#[derive(Parser)]
#[command(name = "polycubes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level regardless of RUST_LOG.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Grow one structure from a rule and print it.
    Grow {
        /// Rule in hex or decimal form.
        rule: Rule,
        #[command(flatten)]
        assembly: AssemblyArgs,
        /// RNG seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Classify a rule as deterministic, non-deterministic or unbounded.
    Classify {
        /// Rule in hex or decimal form.
        rule: Rule,
        #[command(flatten)]
        assembly: AssemblyArgs,
        /// Number of assembly trials.
        #[arg(long, default_value_t = DEFAULT_TRIALS)]
        trials: usize,
        /// Base RNG seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Find the smallest rule that assembles a shape.
    Solve {
        /// JSON file with a list of [x, y, z] coordinates.
        coords: PathBuf,
        #[command(flatten)]
        lattice: LatticeArgs,
        #[arg(long)]
        max_species: Option<usize>,
        #[arg(long)]
        max_colors: Option<usize>,
        /// Extra SAT solutions tried per candidate size.
        #[arg(long, default_value_t = DEFAULT_ALTERNATIVE_SOLUTIONS)]
        alternatives: usize,
        /// Assembly trials per candidate rule.
        #[arg(long, default_value_t = DEFAULT_TRIALS)]
        trials: usize,
        /// Try candidate sizes concurrently.
        #[arg(long)]
        parallel: bool,
        /// External SAT solver reading DIMACS on stdin; the embedded varisat solver otherwise.
        #[arg(long)]
        solver: Option<String>,
        /// Argument passed to the external solver (repeatable).
        #[arg(long = "solver-arg", requires = "solver")]
        solver_args: Vec<String>,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Write the DIMACS formula for one candidate size.
    Cnf {
        /// JSON topology file with "bindings" and "empty" lists.
        #[arg(long, conflicts_with = "coords", required_unless_present = "coords")]
        topology: Option<PathBuf>,
        /// JSON coordinate file to derive the topology from.
        #[arg(long)]
        coords: Option<PathBuf>,
        #[arg(long)]
        species: usize,
        #[arg(long)]
        colors: usize,
        #[command(flatten)]
        lattice: LatticeArgs,
        /// Output file; stdout otherwise.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a rule in both hex and decimal form.
    Convert {
        /// Rule in hex or decimal form.
        rule: Rule,
    },
}

#[derive(Args, Clone, Copy)]
struct LatticeArgs {
    /// Restrict assembly to the z = 0 plane.
    #[arg(long = "2d")]
    planar: bool,
    /// Ignore patch orientations when binding.
    #[arg(long)]
    no_torsion: bool,
}

impl LatticeArgs {
    fn dims(&self) -> Dims {
        if self.planar {
            Dims::Two
        } else {
            Dims::Three
        }
    }
}

#[derive(Args, Clone, Copy)]
struct AssemblyArgs {
    #[command(flatten)]
    lattice: LatticeArgs,
    /// Particle count at which growth counts as unbounded.
    #[arg(long, default_value_t = 100)]
    max_particles: usize,
    /// Largest coordinate magnitude a particle may occupy.
    #[arg(long, default_value_t = 50)]
    max_coord: i32,
    /// Seed with a random species instead of species 0.
    #[arg(long)]
    random_seed_species: bool,
    /// Let nonzero colors bind themselves.
    #[arg(long)]
    self_binding: bool,
}

impl AssemblyArgs {
    fn config(&self) -> AssemblyConfig {
        AssemblyConfig {
            max_particles: self.max_particles,
            max_coord: self.max_coord,
            seed_mode: if self.random_seed_species {
                SeedMode::Random
            } else {
                SeedMode::First
            },
            torsional: !self.lattice.no_torsion,
            self_binding: self.self_binding,
            dims: self.lattice.dims(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Grow {
            rule,
            assembly,
            seed,
        } => print!("{}", grow_report(rule, assembly.config(), seed)?),
        Command::Classify {
            rule,
            assembly,
            trials,
            seed,
        } => {
            let options = ClassifyOptions {
                trials,
                assembly: assembly.config(),
                seed,
            };
            print!("{}", classify_report(&rule, &options)?);
        }
        Command::Solve {
            coords,
            lattice,
            max_species,
            max_colors,
            alternatives,
            trials,
            parallel,
            solver,
            solver_args,
            seed,
        } => {
            let target = load_coords(&coords)?;
            let options = SearchOptions {
                max_species,
                max_colors,
                alternative_solutions: alternatives,
                trials,
                dims: lattice.dims(),
                torsional: !lattice.no_torsion,
                seed,
                ..SearchOptions::default()
            };
            print!("{}", run_solve(&target, &options, parallel, solver, solver_args)?);
        }
        Command::Cnf {
            topology,
            coords,
            species,
            colors,
            lattice,
            output,
        } => run_cnf(topology, coords, species, colors, lattice, output)?,
        Command::Convert { rule } => print!("{}", convert_report(&rule)?),
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads a JSON list of `[x, y, z]` coordinates.
fn load_coords(path: &Path) -> Result<Vec<Vec3>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_coords(&text).with_context(|| format!("parsing {}", path.display()))
}

fn parse_coords(text: &str) -> Result<Vec<Vec3>> {
    let coords: Vec<[i32; 3]> = serde_json::from_str(text)?;
    if coords.is_empty() {
        bail!("coordinate list is empty");
    }
    Ok(coords.into_iter().map(|[x, y, z]| (x, y, z)).collect())
}

fn load_topology(path: &Path) -> Result<Topology> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let spec: TopologySpec =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Topology::from_spec(&spec)?)
}

/// Grows one structure and describes it.
fn grow_report(rule: Rule, config: AssemblyConfig, seed: u64) -> Result<String> {
    let mut assembly = Assembly::seeded(rule, config, seed)?;
    let state = assembly.run();
    let mut report = String::new();
    writeln!(report, "state: {state:?}")?;
    writeln!(report, "particles: {}", assembly.particles().len())?;
    report.push_str(&assembly.format());
    Ok(report)
}

fn classify_report(rule: &Rule, options: &ClassifyOptions) -> Result<String> {
    let report = classify_with_shape(rule, options)?;
    let mut text = String::new();
    writeln!(text, "classification: {:?}", report.classification)?;
    if let Some(shape) = &report.shape {
        writeln!(text, "particles: {}", shape.len())?;
    }
    Ok(text)
}

fn convert_report(rule: &Rule) -> Result<String> {
    let mut text = String::new();
    writeln!(text, "hex: {}", codec::encode_hex(rule)?)?;
    writeln!(text, "decimal: {}", codec::encode_decimal(rule)?)?;
    Ok(text)
}

fn run_solve(
    target: &[Vec3],
    options: &SearchOptions,
    parallel: bool,
    solver: Option<String>,
    solver_args: Vec<String>,
) -> Result<String> {
    info!(positions = target.len(), parallel, "searching for minimal rule");
    let outcome = match (solver, parallel) {
        (Some(program), parallel) => {
            let oracle = CommandOracle::new(program).args(solver_args);
            if parallel {
                par_find_minimal_rule(target, &oracle, options)?
            } else {
                find_minimal_rule(target, &oracle, options)?
            }
        }
        (None, true) => par_find_minimal_rule(target, &EmbeddedSolver::default(), options)?,
        (None, false) => find_minimal_rule(target, &EmbeddedSolver::default(), options)?,
    };

    let mut text = String::new();
    match outcome {
        SearchOutcome::Found(solution) => {
            writeln!(
                text,
                "species: {}, colors: {}",
                solution.species, solution.colors
            )?;
            text.push_str(&convert_report(&solution.rule)?);
        }
        SearchOutcome::Exhausted => writeln!(text, "no rule found")?,
        SearchOutcome::Cancelled => writeln!(text, "search cancelled")?,
    }
    Ok(text)
}

fn run_cnf(
    topology: Option<PathBuf>,
    coords: Option<PathBuf>,
    species: usize,
    colors: usize,
    lattice: LatticeArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    let topology = match (topology, coords) {
        (Some(path), _) => load_topology(&path)?,
        (None, Some(path)) => Topology::from_coords(&load_coords(&path)?, lattice.dims())?,
        (None, None) => bail!("either --topology or --coords is required"),
    };
    let options = EncodingOptions {
        dims: lattice.dims(),
        torsional: !lattice.no_torsion,
        ..EncodingOptions::default()
    };
    let formula = Encoder::new(&topology, species, colors, options).formula();
    info!(
        vars = formula.num_vars,
        clauses = formula.num_clauses(),
        "encoded formula"
    );

    match output {
        Some(path) => fs::write(&path, formula.to_dimacs())
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{formula}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMER: &str = "1|||||_-1|||||";

    #[test]
    fn test_cli_parses_rule_arguments() {
        let cli = Cli::try_parse_from(["polycubes", "grow", "040000000000840000000000", "--2d"])
            .unwrap();
        let Command::Grow { rule, assembly, .. } = cli.command else {
            panic!("expected grow");
        };
        assert_eq!(rule, DIMER.parse::<Rule>().unwrap());
        assert_eq!(assembly.config().dims, Dims::Two);

        assert!(Cli::try_parse_from(["polycubes", "grow", "not-a-rule"]).is_err());
    }

    #[test]
    fn test_grow_report() {
        let rule: Rule = DIMER.parse().unwrap();
        let report = grow_report(rule, AssemblyConfig::default(), 0).unwrap();
        insta::assert_snapshot!(report, @r"
        state: Bounded
        particles: 2
        z=0
        10
        ");
    }

    #[test]
    fn test_convert_report() {
        let rule: Rule = DIMER.parse().unwrap();
        insta::assert_snapshot!(convert_report(&rule).unwrap(), @r"
        hex: 040000000000840000000000
        decimal: 1|||||_-1|||||
        ");
    }

    #[test]
    fn test_classify_report() {
        let rule: Rule = DIMER.parse().unwrap();
        let report = classify_report(&rule, &ClassifyOptions::default()).unwrap();
        assert_eq!(report, "classification: Deterministic\nparticles: 2\n");
    }

    #[test]
    fn test_solve_dimer() {
        let target = parse_coords("[[0,0,0],[1,0,0]]").unwrap();
        let report = run_solve(&target, &SearchOptions::default(), false, None, vec![]).unwrap();
        assert!(report.starts_with("species: 2, colors: 1\n"), "{report}");
    }

    #[test]
    fn test_empty_coordinate_file_rejected() {
        assert!(parse_coords("[]").is_err());
        assert!(parse_coords("[[0,0]]").is_err());
    }
}
