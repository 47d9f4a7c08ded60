mod sim;

use clap::Parser;
use core::cell::RefCell;
use embassy_executor::{Executor, Spawner};
use mona_core::mk_static;
use mona_core::utils::controllers::{
    avoidance::Mode, Drivetrain, Indicator, PowerMonitor, ProximitySensor, SystemCommand,
    SystemController, Wheel, COMMAND_CHANNEL, REPLY_CHANNEL,
};
use mona_core::utils::{Config, Delay, Duration, Timer};
use sim::{Obstacle, SimBattery, SimBus, SimImu, SimLed, SimPwm};
use static_cell::StaticCell;
use tracing::{error, info, warn};

type Sensors = ProximitySensor<'static, SimBus, Delay>;
type Robot = SystemController<Drivetrain<SimPwm>, Sensors, SimLed, SimBattery, SimImu>;

#[derive(Parser)]
#[command(version = "1.0", about = "Run the Mona control core against simulated hardware")]
struct Opts {
    /// Full or partial configuration as JSON
    #[arg(long)]
    config: Option<String>,
    /// Start-up mode: autonomous, guarded_teleop, disabled, or the firmware number 0/1/2
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,
    /// Detection threshold override
    #[arg(long)]
    threshold: Option<u8>,
    /// Raw battery ADC count reported by the simulated divider
    #[arg(long, default_value_t = 3300)]
    battery_raw: u16,
    /// Obstacle in front of a sensor, as CHANNEL:FROM_MS-TO_MS (repeatable)
    #[arg(long = "obstacle", value_parser = Obstacle::parse)]
    obstacles: Vec<Obstacle>,
    /// Host command as JSON, queued at start-up (repeatable)
    #[arg(long = "command", value_parser = parse_command)]
    commands: Vec<SystemCommand>,
    /// Simulated run time in milliseconds
    #[arg(long, default_value_t = 2000)]
    run_ms: u64,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    if let Ok(n) = s.parse::<u8>() {
        return Mode::try_from(n).map_err(|e| format!("unknown mode number {}", e.0));
    }
    match s {
        "autonomous" => Ok(Mode::Autonomous),
        "guarded_teleop" | "guarded-teleop" => Ok(Mode::GuardedTeleop),
        "disabled" => Ok(Mode::Disabled),
        other => Err(format!("unknown mode {other:?}")),
    }
}

fn parse_command(s: &str) -> Result<SystemCommand, String> {
    serde_json::from_str(s).map_err(|e| e.to_string())
}

impl Opts {
    fn build_config(&self) -> Result<Config, String> {
        let mut config = match &self.config {
            Some(json) => serde_json::from_str::<Config>(json).map_err(|e| e.to_string())?,
            None => Config::default(),
        };
        if let Some(mode) = self.mode {
            config.avoidance.mode = mode;
        }
        if let Some(threshold) = self.threshold {
            config.avoidance.threshold = threshold;
        }
        Ok(config)
    }
}

#[embassy_executor::task]
async fn control_task(mut robot: Robot) -> ! {
    robot.control_loop().await
}

#[embassy_executor::task]
async fn reply_task() -> ! {
    loop {
        let reply = REPLY_CHANNEL.receiver().receive().await;
        match serde_json::to_string(&reply) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Reply serialization failed: {}", e),
        }
    }
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    config: Config,
    opts: Opts,
) {
    // Simulated I2C bus with the emitter expander and sensor ADC
    let i2c_bus = mk_static!(RefCell<SimBus>, RefCell::new(SimBus::new(opts.obstacles)));

    let mut indicator = Indicator::new(SimLed(1), SimLed(2));
    if let Err(e) = indicator.set_all(20, 0, 0) {
        warn!("LED init colour failed: {:?}", e);
    }

    let mut sensors = ProximitySensor::new(i2c_bus, Delay);
    if let Err(e) = sensors.init() {
        error!("Proximity init failed: {:?}", e);
    }

    let drivetrain = Drivetrain::new(
        Wheel::new(SimPwm::new("left_fwd"), SimPwm::new("left_bwd")),
        Wheel::new(SimPwm::new("right_fwd"), SimPwm::new("right_bwd")),
    );

    let mut robot = SystemController::new(
        drivetrain,
        sensors,
        indicator,
        PowerMonitor::new(SimBattery(opts.battery_raw)),
        Some(config),
    )
    .with_orientation(SimImu::default());
    if let Err(e) = robot.indicator.set_all(0, 20, 0) {
        warn!("LED ready colour failed: {:?}", e);
    }

    spawner.spawn(control_task(robot)).unwrap();
    spawner.spawn(reply_task()).unwrap();

    for command in opts.commands {
        COMMAND_CHANNEL.send(command).await;
    }

    info!("Simulating for {} ms", opts.run_ms);
    Timer::after(Duration::from_millis(opts.run_ms)).await;
    COMMAND_CHANNEL.send(SystemCommand::GetState).await;
    Timer::after(Duration::from_millis(50)).await;
    info!("Simulation finished");
    std::process::exit(0);
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let config = match opts.build_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    info!(?config, "Starting mock MCU");

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, config, opts)).unwrap();
    });
}
