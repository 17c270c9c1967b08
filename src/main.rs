// SPDX-FileCopyrightText: 2024 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log;
use rand::random;
use simple_logger;

mod api;
mod driver;
mod flags;
mod ssh;
mod store;

use driver::{Driver, State, DRIVER_NAME};
use flags::DriverOptions;
use store::{Machine, MachineStore};

/// Provision and manage CloudSigma machines.
#[derive(clap::Parser, Debug)]
#[command(version = env!("BUILD_GIT_VERSION"))]
struct Cli {
    /// Directory keeping machine state and SSH keys
    #[arg(long, env = "MACHINE_STORAGE_PATH", global = true)]
    storage_path: Option<PathBuf>,

    /// Enable debug logging, repeat for trace
    #[arg(short = 'D', long, action = clap::ArgAction::Count, global = true)]
    debug: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct MachineName {
    /// Machine name
    name: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Create and start a machine, prints its name
    Create {
        /// Machine name, generated when not provided
        name: Option<String>,
        #[command(flatten)]
        options: DriverOptions,
    },
    /// Start a machine
    Start(MachineName),
    /// Gracefully stop a machine
    Stop(MachineName),
    /// Stop and start a machine
    Restart(MachineName),
    /// Power off a machine
    Kill(MachineName),
    /// Delete a machine with its server, drive and SSH key
    Remove(MachineName),
    /// Show machine state
    State(MachineName),
    /// Show machine IP address
    Ip(MachineName),
    /// Show docker URL of a machine
    Url(MachineName),
    /// Show SSH hostname of a machine
    SshHostname(MachineName),
    /// Show path to the SSH private key of a machine
    SshKeyPath(MachineName),
    /// Show SSH port of a machine
    SshPort(MachineName),
    /// Show SSH user of a machine
    SshUser(MachineName),
    /// List machines
    Ls,
    /// Show provisioning flags
    Flags,
}

fn log_level(debug: u8) -> log::Level {
    match debug {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    }
}

fn open_store(storage_path: Option<PathBuf>) -> Result<MachineStore> {
    let root = match storage_path {
        Some(root) => root,
        None => MachineStore::default_root().context("cannot determine storage path")?,
    };
    log::debug!("using machine store at {}", root.display());
    Ok(MachineStore::new(root))
}

fn load_driver(store: MachineStore, name: &str) -> Result<Driver<api::HttpTransport>> {
    let machine = store
        .load(name)
        .with_context(|| format!("cannot load machine {}", name))?;
    let driver = Driver::new(store, machine).context("cannot set up driver")?;
    log::debug!("loaded {} machine {}", driver.driver_name(), name);
    Ok(driver)
}

fn create(store: MachineStore, name: Option<String>, options: DriverOptions) -> Result<()> {
    let name = name.unwrap_or_else(|| format!("{}-{}", DRIVER_NAME, random::<u32>()));
    if store.exists(&name)? {
        bail!("machine {} already exists", name);
    }

    let mut driver =
        Driver::new(store, Machine::new(&name)).context("cannot set up driver")?;
    driver
        .set_config_from_flags(options)
        .context("invalid options")?;
    driver
        .pre_create_check()
        .context("pre-create check failed")?;
    driver
        .create()
        .with_context(|| format!("cannot create machine {}", name))?;

    println!("{}", driver.machine().name);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    simple_logger::init_with_level(log_level(cli.debug)).context("cannot set up logging")?;

    let store = open_store(cli.storage_path)?;

    match cli.command {
        Command::Create { name, options } => create(store, name, options),
        Command::Start(m) => load_driver(store, &m.name)?
            .start()
            .with_context(|| format!("cannot start machine {}", m.name)),
        Command::Stop(m) => load_driver(store, &m.name)?
            .stop()
            .with_context(|| format!("cannot stop machine {}", m.name)),
        Command::Restart(m) => load_driver(store, &m.name)?
            .restart()
            .with_context(|| format!("cannot restart machine {}", m.name)),
        Command::Kill(m) => load_driver(store, &m.name)?
            .kill()
            .with_context(|| format!("cannot kill machine {}", m.name)),
        Command::Remove(m) => load_driver(store, &m.name)?
            .remove()
            .with_context(|| format!("cannot remove machine {}", m.name)),
        Command::State(m) => match load_driver(store, &m.name)?.get_state() {
            Ok(state) => {
                println!("{}", state);
                Ok(())
            }
            Err(err) => {
                println!("{}", State::Error);
                Err(err).with_context(|| format!("cannot get state of machine {}", m.name))
            }
        },
        Command::Ip(m) => {
            let driver = load_driver(store, &m.name)?;
            println!("{}", driver.get_ip()?);
            Ok(())
        }
        Command::Url(m) => {
            println!("{}", load_driver(store, &m.name)?.get_url());
            Ok(())
        }
        Command::SshHostname(m) => {
            let driver = load_driver(store, &m.name)?;
            println!("{}", driver.get_ssh_hostname()?);
            Ok(())
        }
        Command::SshKeyPath(m) => {
            let driver = load_driver(store, &m.name)?;
            println!("{}", driver.get_ssh_key_path()?.display());
            Ok(())
        }
        Command::SshPort(m) => {
            println!("{}", load_driver(store, &m.name)?.get_ssh_port());
            Ok(())
        }
        Command::SshUser(m) => {
            println!("{}", load_driver(store, &m.name)?.get_ssh_username());
            Ok(())
        }
        Command::Ls => {
            for name in store.list().context("cannot list machines")? {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Flags => {
            let out = serde_yml::to_string(&flags::create_flags())
                .context("cannot format flags")?;
            print!("{}", out);
            Ok(())
        }
    }
}
