use std::path::PathBuf;
use std::thread::sleep;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mcr_lens_driver::config::{CodecConfig, LensPreset, COMM_PATH_REBOOT_DELAY, DEFAULT_PORT};
use mcr_lens_driver::motor::MotorId;
use mcr_lens_driver::{ErrorRegistry, LensBoard};

/// Control an MCR600 lens motor board
#[derive(Debug, Parser)]
#[command(name = "mcr", version)]
struct Cli {
    /// Serial port of the board
    #[arg(short, long, default_value = DEFAULT_PORT)]
    port: String,

    /// Built-in lens model (TL1250 or TL410)
    #[arg(short, long, default_value = "TL1250")]
    lens: String,

    /// JSON lens preset, overrides --lens
    #[arg(long)]
    lens_file: Option<PathBuf>,

    /// Skip homing the motors after initialization
    #[arg(long)]
    no_home: bool,

    /// Log every frame sent and received (needs RUST_LOG=debug)
    #[arg(long)]
    log_frames: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Axis {
    Focus,
    Zoom,
    Iris,
}

impl From<Axis> for MotorId {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::Focus => MotorId::Focus,
            Axis::Zoom => MotorId::Zoom,
            Axis::Iris => MotorId::Iris,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Filter {
    Visible,
    Clear,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print firmware revision and serial number
    Info,
    /// Home a motor to its PI position
    Home { axis: Axis },
    /// Home, then move to an absolute step
    MoveAbs { axis: Axis, step: i32 },
    /// Move by a relative number of steps
    MoveRel {
        axis: Axis,
        #[arg(allow_hyphen_values = true)]
        steps: i32,
        /// Skip the overshoot-and-return backlash correction
        #[arg(long)]
        no_backlash: bool,
        /// Allow moving past the PI limit
        #[arg(long)]
        ignore_limits: bool,
    },
    /// Set the speed (pps) and move by a relative number of steps
    Speed {
        axis: Axis,
        pps: u16,
        #[arg(allow_hyphen_values = true)]
        steps: i32,
    },
    /// Switch the IR-cut filter
    Irc { filter: Filter },
    /// Switch the board communication path (I2C, USB, UART); the board reboots
    CommPath { path: String },
    /// Print the motor configuration stored on the board
    Setup { axis: Axis },
    /// Print the logical state of every motor
    Status,
    /// Interactive keyboard jog
    Jog,
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(
            "info".parse().expect("static directive parses"),
        ))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let preset = match &cli.lens_file {
        Some(path) => LensPreset::from_json_file(path)?,
        None => LensPreset::builtin(&cli.lens)?,
    };

    let config = CodecConfig {
        log_frames: cli.log_frames,
        ..CodecConfig::default()
    };
    let errors = ErrorRegistry::new();
    let mut board = LensBoard::connect_with(&cli.port, config, errors.clone())?;
    if !board.is_initialized() {
        return Err(format!("MCR board on {} did not respond, check the port", cli.port).into());
    }

    // Changing the comm path needs no motors
    if let Command::CommPath { path } = &cli.command {
        board.set_communication_path(path.as_str())?;
        info!("Waiting {:?} for the board to reboot", COMM_PATH_REBOOT_DELAY);
        sleep(COMM_PATH_REBOOT_DELAY);
        return Ok(());
    }

    let home = !cli.no_home;
    info!("Initializing {} lens motors", preset.name);
    board.init_focus(preset.focus.steps, preset.focus.pi, home, preset.focus.accel)?;
    board.init_zoom(preset.zoom.steps, preset.zoom.pi, home, preset.zoom.accel)?;
    board.init_iris(preset.iris_steps, 0, home, 0)?;
    board.init_irc()?;

    match cli.command {
        Command::Info => {
            let info = board.info()?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Home { axis } => {
            let mut motor = board.motor(axis.into())?;
            motor.home()?;
            info!("{:?} at step {}", axis, motor.current_step());
        }
        Command::MoveAbs { axis, step } => {
            let mut motor = board.motor(axis.into())?;
            motor.move_abs(step)?;
            info!("{:?} at step {}", axis, motor.current_step());
        }
        Command::MoveRel {
            axis,
            steps,
            no_backlash,
            ignore_limits,
        } => {
            let mut motor = board.motor(axis.into())?;
            if ignore_limits {
                motor.set_respect_limits(false)?;
            }
            let moved = motor.move_rel(steps, !no_backlash);
            if ignore_limits {
                motor.set_respect_limits(true)?;
            }
            moved?;
            info!("{:?} at step {}", axis, motor.current_step());
        }
        Command::Speed { axis, pps, steps } => {
            let mut motor = board.motor(axis.into())?;
            motor.set_speed(pps)?;
            motor.move_rel(steps, true)?;
            info!("{:?} at step {} ({} pps)", axis, motor.current_step(), pps);
        }
        Command::Irc { filter } => {
            board.set_irc_state(matches!(filter, Filter::Visible))?;
        }
        Command::Setup { axis } => {
            let setup = board.motor(axis.into())?.read_setup()?;
            println!("{}", serde_json::to_string_pretty(&setup)?);
        }
        Command::Status => {
            let mut statuses = Vec::new();
            for id in [MotorId::Focus, MotorId::Zoom, MotorId::Iris] {
                statuses.push(board.motor(id)?.status());
            }
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        Command::Jog => mcr_lens_driver::jog::run(&mut board)?,
        // Handled before motor init
        Command::CommPath { .. } => {}
    }

    if let Some(record) = errors.latest() {
        info!("Last recorded error: {}", record);
    }
    board.close();
    Ok(())
}
