//! Command-line tool for a DS1077L on a Linux I²C bus.
//!
//! Every `set` is a read-modify-write of one whole register: only the fields
//! given on the command line change, and nothing is written when the register
//! already holds the requested value.

use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ds1077l::{
    BusAddress, BusRegister, Change, Ds1077l, DivRegister, MuxRegister, Prescaler, Register,
};
use embedded_hal::blocking::i2c;
use linux_embedded_hal::I2cdev;
use tracing::{debug, error, info, Level};

const DEFAULT_BUS_DEV: &str = "/dev/i2c-1";

/// Read and set the registers of a Maxim DS1077L programmable oscillator.
#[derive(Parser, Debug)]
#[command(name = "ds1077l")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read and set the registers of a Maxim DS1077L oscillator", long_about = None)]
struct Cli {
    /// The address of the oscillator, 0x58-0x5f
    #[arg(
        short,
        long,
        global = true,
        env = "DS1077L_ADDRESS",
        default_value = "0x58",
        value_parser = parse_address
    )]
    address: BusAddress,

    /// Path to the device for the I²C bus the oscillator is attached to
    #[arg(
        short = 'd',
        long,
        global = true,
        env = "DS1077L_BUS_DEV",
        default_value = DEFAULT_BUS_DEV
    )]
    bus_dev: PathBuf,

    /// Log each step and show register contents before changing them
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the BUS, MUX and DIV registers
    Dump,
    /// The BUS register: device address and EEPROM write control
    Bus {
        #[command(subcommand)]
        action: BusAction,
    },
    /// The MUX register: control pin function and prescalers
    Mux {
        #[command(subcommand)]
        action: MuxAction,
    },
    /// The DIV register: the N divider on OUT1
    Div {
        #[command(subcommand)]
        action: DivAction,
    },
    /// Copy the current register contents into EEPROM
    WriteEeprom,
}

#[derive(Subcommand, Debug)]
enum BusAction {
    /// Print the BUS register
    Get,
    /// Change the address and/or the WC bit
    Set(BusSet),
}

#[derive(Subcommand, Debug)]
enum MuxAction {
    /// Print the MUX register
    Get,
    /// Change fields in the MUX register
    Set(MuxSet),
}

#[derive(Subcommand, Debug)]
enum DivAction {
    /// Print the DIV register
    Get,
    /// Change the N divider
    Set(DivSet),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
struct BusSet {
    /// New address for the oscillator, 0x58-0x5f
    #[arg(short, long, value_parser = parse_address)]
    new_addr: Option<BusAddress>,

    /// WC bit: 0 writes every change to EEPROM, 1 waits for write-eeprom
    #[arg(short, long, value_parser = parse_bit)]
    wc: Option<bool>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
struct MuxSet {
    /// PDN1 bit
    #[arg(long, value_parser = parse_bit)]
    pdn1: Option<bool>,

    /// PDN0 bit
    #[arg(long, value_parser = parse_bit)]
    pdn0: Option<bool>,

    /// SEL0 bit
    #[arg(long, value_parser = parse_bit)]
    sel0: Option<bool>,

    /// EN0 bit
    #[arg(long, value_parser = parse_bit)]
    en0: Option<bool>,

    /// Prescaler for OUT0: 1, 2, 4 or 8
    #[arg(long, value_parser = parse_prescaler)]
    prescaler0: Option<Prescaler>,

    /// Prescaler for OUT1: 1, 2, 4 or 8
    #[arg(long, value_parser = parse_prescaler)]
    prescaler1: Option<Prescaler>,

    /// DIV1 bit
    #[arg(long, value_parser = parse_bit)]
    div1: Option<bool>,
}

#[derive(Args, Debug)]
struct DivSet {
    /// Value of the programmable divider on OUT1, 2-1025
    #[arg(short = 'n', long, value_parser = parse_divider)]
    divider: DivRegister,
}

/// Fields to change in one register.
trait Edit {
    type Target: Register + Display;

    fn apply(&self, register: &mut Self::Target);
}

impl Edit for BusSet {
    type Target = BusRegister;

    fn apply(&self, bus: &mut BusRegister) {
        if let Some(address) = self.new_addr {
            bus.address = address;
        }
        // WC is active low
        if let Some(wc) = self.wc {
            bus.write_control = !wc;
        }
    }
}

impl Edit for MuxSet {
    type Target = MuxRegister;

    fn apply(&self, mux: &mut MuxRegister) {
        let set = |field: &mut bool, value: Option<bool>| {
            if let Some(value) = value {
                *field = value;
            }
        };
        set(&mut mux.pdn1, self.pdn1);
        set(&mut mux.pdn0, self.pdn0);
        set(&mut mux.sel0, self.sel0);
        set(&mut mux.en0, self.en0);
        set(&mut mux.div1, self.div1);
        if let Some(prescaler) = self.prescaler0 {
            mux.prescaler0 = prescaler;
        }
        if let Some(prescaler) = self.prescaler1 {
            mux.prescaler1 = prescaler;
        }
    }
}

impl Edit for DivSet {
    type Target = DivRegister;

    fn apply(&self, div: &mut DivRegister) {
        *div = self.divider;
    }
}

fn parse_address(s: &str) -> Result<BusAddress, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let address = u8::from_str_radix(digits, 16).map_err(|e| format!("{s}: {e}"))?;
    BusAddress::new(address).map_err(|e| e.to_string())
}

fn parse_bit(s: &str) -> Result<bool, String> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(format!("{s}: expected 0 or 1")),
    }
}

fn parse_prescaler(s: &str) -> Result<Prescaler, String> {
    let divisor: u8 = s.parse().map_err(|e| format!("{s}: {e}"))?;
    Prescaler::from_divisor(divisor).map_err(|e| e.to_string())
}

fn parse_divider(s: &str) -> Result<DivRegister, String> {
    let n: u16 = s.parse().map_err(|e| format!("{s}: {e}"))?;
    DivRegister::new(n).map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

/// Exit status for a command line clap refused: 0 for `--help` and
/// `--version`, 1 for anything wrong with the arguments.
fn usage_status(e: &clap::Error) -> u8 {
    if e.use_stderr() {
        1
    } else {
        0
    }
}

/// Exit status for a finished run, logging the error if there was one.
fn run_status(result: Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_status(&e));
        }
    };

    init_tracing(cli.verbose);

    ExitCode::from(run_status(run(&cli)))
}

fn run(cli: &Cli) -> Result<()> {
    debug!(
        address = %cli.address,
        bus_dev = %cli.bus_dev.display(),
        command = ?cli.command,
        "User provided options"
    );

    let i2c = I2cdev::new(&cli.bus_dev)
        .with_context(|| format!("opening I²C bus {}", cli.bus_dev.display()))?;
    let mut osc = Ds1077l::new(i2c, cli.address);

    match &cli.command {
        Commands::Dump => {
            print!("{}", osc.read::<BusRegister>().context("reading BUS")?);
            print!("{}", osc.read::<MuxRegister>().context("reading MUX")?);
            print!("{}", osc.read::<DivRegister>().context("reading DIV")?);
        }
        Commands::Bus { action } => {
            let edit = match action {
                BusAction::Get => None,
                BusAction::Set(edit) => Some(edit),
            };
            let change = run_action(cli, &mut osc, "BUS", edit)?;
            if let Some(change) = change.filter(Change::is_changed) {
                if change.current.address != change.previous.address {
                    info!(
                        "Oscillator now responds on {}, use --address {} from now on",
                        change.current.address, change.current.address
                    );
                }
            }
        }
        Commands::Mux { action } => {
            let edit = match action {
                MuxAction::Get => None,
                MuxAction::Set(edit) => Some(edit),
            };
            run_action(cli, &mut osc, "MUX", edit)?;
        }
        Commands::Div { action } => {
            let edit = match action {
                DivAction::Get => None,
                DivAction::Set(edit) => Some(edit),
            };
            run_action(cli, &mut osc, "DIV", edit)?;
        }
        Commands::WriteEeprom => {
            osc.write_eeprom().context("writing registers to EEPROM")?;
            info!("Registers written to EEPROM on {}", cli.address);
        }
    }
    Ok(())
}

/// Carry out a `get` (no edit) or a `set` on one register.
///
/// Returns the change made for a `set`, or `None` for a `get`.
fn run_action<S, I2C, E>(
    cli: &Cli,
    osc: &mut Ds1077l<I2C>,
    name: &str,
    edit: Option<&S>,
) -> Result<Option<Change<S::Target>>>
where
    S: Edit,
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
    E: std::fmt::Debug + Send + Sync + 'static,
{
    match edit {
        None => {
            debug!(
                "Querying {} register for device {} on bus {}",
                name,
                cli.address,
                cli.bus_dev.display()
            );
            let register = osc
                .read::<S::Target>()
                .with_context(|| format!("reading {name}"))?;
            print!("{register}");
            Ok(None)
        }
        Some(edit) => {
            let previous = osc
                .read::<S::Target>()
                .with_context(|| format!("reading {name}"))?;
            if cli.verbose {
                println!("Current {name} register state:");
                print!("{previous}");
            }
            let mut current = previous;
            edit.apply(&mut current);
            let change = Change { previous, current };
            if change.is_changed() {
                if cli.verbose {
                    println!(
                        "Setting device {} on bus {} to:",
                        cli.address,
                        cli.bus_dev.display()
                    );
                    print!("{current}");
                }
                osc.write(&current)
                    .with_context(|| format!("writing {name}"))?;
                info!("{} register updated", name);
            } else {
                info!(
                    "{} register already in requested state. No change necessary.",
                    name
                );
            }
            Ok(Some(change))
        }
    }
}
