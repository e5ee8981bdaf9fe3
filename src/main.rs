// src/main.rs - Command-line front end for the stage and laser
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use stage_laser::config::{self, Config};
use stage_laser::hardware::serial::available_ports;
use stage_laser::motion::executor::MotionPrimitive;
use stage_laser::motion::planner::{Fill, FillDirection, travel_time};
use stage_laser::motion::{JogDirection, RunOutcome};
use stage_laser::system::EmissionOnExit;
use stage_laser::{AxisId, StageSystem};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser)]
#[command(name = "stage-laser", version, about = "Trace shapes with a two-axis stage and a pulsed laser")]
struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, default_value = "stage.toml")]
    config: PathBuf,

    /// Log wire traffic
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports
    Ports,
    /// Initialize the stage and print position and limits
    Status,
    /// Print the waypoints for a shape without moving
    Plan {
        /// e.g. "rectangle, 100, 50, 500"
        shape: String,
        #[command(flatten)]
        fill: FillArgs,
    },
    /// Trace a shape
    Exec {
        shape: String,
        #[command(flatten)]
        fill: FillArgs,
        /// Switch the laser with each segment
        #[arg(long)]
        auto_emission: bool,
        /// Use per-axis absolute moves instead of line moves
        #[arg(long)]
        single_axis: bool,
    },
    /// Find the limit switches and re-zero
    Home {
        #[arg(long, value_enum)]
        axis: Option<AxisArg>,
    },
    /// Move continuously for a while, then stop
    Jog {
        #[arg(value_enum)]
        direction: DirectionArg,
        /// Index into velocity_presets
        #[arg(long, conflicts_with = "velocity")]
        rank: Option<usize>,
        /// um/s, clamped to the stage range
        #[arg(long)]
        velocity: Option<i64>,
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
    },
    /// Start the laser at a frequency in Hz
    Laser { hz: u32 },
    /// Stop the laser
    LaserOff,
    /// Print polled snapshots
    Monitor {
        #[arg(long, default_value_t = 10)]
        ticks: u64,
    },
}

#[derive(Args)]
struct FillArgs {
    /// Raster fill interval in um (rectangles only)
    #[arg(long)]
    fill: Option<f64>,
    #[arg(long, value_enum, default_value = "vertical")]
    direction: FillArg,
}

impl FillArgs {
    fn to_fill(&self) -> Option<Fill> {
        self.fill.map(|interval| Fill {
            interval,
            direction: match self.direction {
                FillArg::Vertical => FillDirection::Vertical,
                FillArg::Horizontal => FillDirection::Horizontal,
            },
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FillArg {
    Vertical,
    Horizontal,
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    X,
    Y,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Right,
    Left,
    Up,
    Down,
}

fn load_or_default(path: &Path) -> Result<Config, BoxError> {
    if !path.exists() {
        tracing::warn!("{} not found, using defaults (DEBUG mode)", path.display());
        return Ok(Config::default());
    }
    tracing::info!("Loading configuration from: {}", path.display());
    config::load_config(path).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", path.display(), e);
        Box::new(e) as BoxError
    })
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    if let Command::Ports = cli.command {
        for port in available_ports() {
            println!("{}", port);
        }
        return Ok(());
    }

    let mut config = load_or_default(&cli.config)?;

    if let Command::Plan { shape, fill } = &cli.command {
        let limits = config.submission_limits();
        let request = stage_laser::ShapeRequest::parse(shape, fill.to_fill(), &limits)?;
        let waypoints = request.plan();
        println!("{}", request);
        for (i, w) in waypoints.iter().enumerate() {
            println!(
                "{:>4}  dx={:>10.3}  dy={:>10.3}  delay={:.3}s  laser={}",
                i,
                w.dx,
                w.dy,
                w.delay,
                if w.laser_on { "on" } else { "off" }
            );
        }
        println!("travel time: {:.3}s", travel_time(&waypoints));
        return Ok(());
    }

    if let Command::Exec { single_axis: true, .. } = cli.command {
        config.executor.primitive = MotionPrimitive::SingleAxis;
    }

    tracing::info!("Mode: {:?}", config.mode);
    let mut system = StageSystem::connect(config).await?;
    system.initialize().await?;

    // Laser subcommands leave emission as they set it.
    let emission = match cli.command {
        Command::Laser { .. } | Command::LaserOff => EmissionOnExit::Keep,
        _ => EmissionOnExit::Stop,
    };
    let result = run_command(&mut system, cli.command).await;
    if let Err(e) = system.shutdown_with(emission).await {
        tracing::error!("Shutdown failed: {}", e);
    }
    result
}

async fn run_command(system: &mut StageSystem, command: Command) -> Result<(), BoxError> {
    match command {
        Command::Ports | Command::Plan { .. } => {}
        Command::Status => {
            let position = system.stage().get_position().await?;
            let limits = system.stage().check_limit_all().await?;
            println!("position: x={} mm y={} mm", position.x, position.y);
            println!("limits:   x={} y={}", limits.x, limits.y);
        }
        Command::Exec {
            shape,
            fill,
            auto_emission,
            ..
        } => {
            let request = system.submit(&shape, fill.to_fill())?;
            let auto_emission = auto_emission || system.config().executor.auto_emission;
            system.start_polling();
            let mut snapshots = system.subscribe();
            snapshots.changed().await?;

            let mut task = system.spawn_execute(request, auto_emission).await?;
            let outcome = tokio::select! {
                joined = &mut task => joined??,
                _ = tokio::signal::ctrl_c() => {
                    system.executor().cancel();
                    task.await??
                }
            };
            match outcome {
                RunOutcome::Completed { segments } => println!("completed {} segments", segments),
                RunOutcome::Cancelled { segments } => println!("cancelled after {} segments", segments),
            }
        }
        Command::Home { axis } => {
            let axis = axis.map(|a| match a {
                AxisArg::X => AxisId::X,
                AxisArg::Y => AxisId::Y,
            });
            system.home(axis).await?;
            println!("homed");
        }
        Command::Jog {
            direction,
            rank,
            velocity,
            duration_ms,
        } => {
            let direction = match direction {
                DirectionArg::Right => JogDirection::Right,
                DirectionArg::Left => JogDirection::Left,
                DirectionArg::Up => JogDirection::Up,
                DirectionArg::Down => JogDirection::Down,
            };
            let mut jog = system.jog_controller();
            let moving = match rank {
                Some(rank) => jog.jog_rank(direction, rank).await?,
                None => {
                    if let Some(v) = velocity {
                        jog.set_velocity(v);
                    }
                    jog.jog(direction).await?;
                    true
                }
            };
            if moving {
                tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                jog.stop().await?;
            }
        }
        Command::Laser { hz } => {
            system.laser().set_frequency(hz).await?;
        }
        Command::LaserOff => {
            system.laser().stop().await?;
        }
        Command::Monitor { ticks } => {
            system.start_polling();
            let mut snapshots = system.subscribe();
            for _ in 0..ticks {
                snapshots.changed().await?;
                let s = *snapshots.borrow_and_update();
                println!(
                    "#{:<5} x={:>10.4} y={:>10.4}  limit x={} y={}",
                    s.seq, s.position.x, s.position.y, s.limits.x, s.limits.y
                );
            }
        }
    }
    Ok(())
}
