// specMech CLI -- exercises the gateway session layer against a live
// controller, the observatory emulator, or a built-in mock controller.
//
// Usage:
//   specmech-cli --host 10.25.1.140 --port 23 status
//   specmech-cli --serial /dev/ttyUSB0 send mo1000
//   specmech-cli --mock send rd
//   specmech-cli --mock ack-reboot
//
// Set RUST_LOG=specmech=debug (or trace) to watch the wire traffic.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use specmech::{DeviceSession, SerialTransport, SessionBuilder, StatusReport, REBOOT_ACK};
use specmech_test_harness::MockMechServer;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// specMech gateway CLI -- send commands and decode status replies.
#[derive(Parser)]
#[command(name = "specmech-cli", version, about)]
struct Cli {
    /// Controller hostname or IP.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Controller TCP port (23 on the instrument, 8888 for the emulator).
    #[arg(long, default_value_t = 8888)]
    port: u16,

    /// Serial console path (e.g. /dev/ttyUSB0). Used instead of
    /// --host/--port for a bench connection.
    #[arg(long)]
    serial: Option<String>,

    /// Baud rate for --serial.
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Bound the wait for a reply, in milliseconds.
    /// By default the session waits as long as the mechanism takes.
    #[arg(long)]
    reply_timeout_ms: Option<u64>,

    /// Run against a built-in mock controller with canned telemetry.
    /// Useful for verifying the gateway without hardware.
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a raw command string and print the reply.
    Send {
        /// The command text, without the sequence id (added automatically).
        text: String,
    },

    /// Query the controller and print the decoded status report.
    Status {
        /// The status verb to send.
        #[arg(long, default_value = "rs")]
        verb: String,
    },

    /// Acknowledge a controller reboot.
    AckReboot,
}

// ---------------------------------------------------------------------------
// Session construction
// ---------------------------------------------------------------------------

/// Build a session from CLI arguments.
///
/// The returned mock server handle (if any) must stay alive for the
/// duration of the session.
async fn create_session(cli: &Cli) -> Result<(DeviceSession, Option<MockMechServer>)> {
    if cli.mock && cli.serial.is_some() {
        bail!("--mock and --serial are mutually exclusive");
    }

    let configure = |addr: &str| {
        let mut builder = SessionBuilder::new(addr);
        if let Some(ms) = cli.reply_timeout_ms {
            builder = builder.reply_timeout(Duration::from_millis(ms));
        }
        builder
    };

    if cli.mock {
        let mut server = MockMechServer::bind()
            .await
            .context("failed to start mock controller")?;
        let addr = server.addr().to_string();
        server.start_emulator();

        let session = configure(&addr)
            .build()
            .await
            .context("failed to connect to the mock controller")?;
        println!("Connected (mock controller at {addr})");
        return Ok((session, Some(server)));
    }

    if let Some(port) = &cli.serial {
        let transport = SerialTransport::open(port, cli.baud)
            .await
            .with_context(|| format!("failed to open serial console {port} at {} baud", cli.baud))?;
        let session = configure(port).build_with_transport(Box::new(transport));
        println!("Connected to {port} at {} baud", cli.baud);
        return Ok((session, None));
    }

    let addr = format!("{}:{}", cli.host, cli.port);
    let session = configure(&addr)
        .build()
        .await
        .with_context(|| format!("failed to connect to specMech at {addr}"))?;
    println!("Connected to specMech at {addr}");
    Ok((session, None))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_send(session: &DeviceSession, text: &str) -> Result<()> {
    let raw = session.send(text).await?;
    println!("Reply: {raw:?}");

    if session.reboot_pending().await {
        println!();
        println!("WARNING: the controller has rebooted and is holding all");
        println!("motion until acknowledged. Run `specmech-cli ack-reboot`.");
    }

    let pending = session.pending_commands().await;
    if !pending.is_empty() {
        println!();
        println!("Uncorrelated commands still pending:");
        for cmd in pending {
            println!("  #{:<4} {}", cmd.id, cmd.text);
        }
    }

    Ok(())
}

async fn cmd_status(session: &DeviceSession, verb: &str) -> Result<()> {
    let raw = session.send(verb).await?;

    if session.reboot_pending().await {
        println!("Controller rebooted -- no status available until acknowledged.");
        println!("Run `specmech-cli ack-reboot`.");
        return Ok(());
    }

    print_report(&StatusReport::parse_reply(&raw));
    Ok(())
}

async fn cmd_ack_reboot(session: &DeviceSession) -> Result<()> {
    session.send(REBOOT_ACK).await?;
    println!("Reboot acknowledged.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Status display
// ---------------------------------------------------------------------------

fn print_report(report: &StatusReport) {
    println!("Status");

    let motors = &report.motor_positions;
    if motors.motor_a.is_some() || motors.motor_b.is_some() || motors.motor_c.is_some() {
        println!("  Motors");
        for (label, position) in [
            ("A", &motors.motor_a),
            ("B", &motors.motor_b),
            ("C", &motors.motor_c),
        ] {
            if let Some(position) = position {
                println!("    {label}: {position} steps");
            }
        }
    }

    if let Some(env) = &report.environment {
        println!("  Environment");
        println!("    sensor 0: {} C, {} %RH", env.temperature_0, env.humidity_0);
        println!("    sensor 1: {} C, {} %RH", env.temperature_1, env.humidity_1);
        println!("    sensor 2: {} C, {} %RH", env.temperature_2, env.humidity_2);
    }

    if let Some(pnu) = &report.pneumatics {
        println!("  Pneumatics");
        println!("    shutter:        {}", pnu.shutter);
        println!("    hartmann left:  {}", pnu.hartmann_left);
        println!("    hartmann right: {}", pnu.hartmann_right);
        println!("    air pressure:   {}", pnu.air_pressure);
    }

    if let Some(vac) = &report.vacuum {
        println!("  Ion pumps");
        println!("    blue: {}", vac.ion_pump_blue);
        println!("    red:  {}", vac.ion_pump_red);
    }

    if let Some(acc) = &report.orientation {
        println!("  Orientation");
        println!("    x: {}  y: {}  z: {}", acc.x, acc.y, acc.z);
    }

    let info = &report.system_info;
    if info.clock_time.is_some() || info.boot_time.is_some() || info.version.is_some() {
        println!("  System");
        if let Some(clock) = &info.clock_time {
            println!("    clock:    {clock}");
        }
        if let Some(boot) = &info.boot_time {
            println!("    booted:   {boot}");
        }
        if let Some(version) = &info.version {
            println!("    firmware: {version}");
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let (session, _mock) = create_session(&cli).await?;

    let result = match &cli.command {
        Command::Send { text } => cmd_send(&session, text).await,
        Command::Status { verb } => cmd_status(&session, verb).await,
        Command::AckReboot => cmd_ack_reboot(&session).await,
    };

    session.close().await.ok();
    result
}
