//! l2relayd - relay a Bluetooth peripheral's L2CAP channels to a console
//!
//! Poses as the peripheral toward the console given on the command line and
//! forwards every channel to the real peripheral once it connects.

use std::io;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use l2relay::{HciLinkControl, L2capTransport, LinkControl, Relay};
use log::{error, info, warn};

mod args;

use crate::args::{Command, USAGE};

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signal: libc::c_int) {
    STOP.store(true, Ordering::SeqCst);
}

/// SIGINT sets [`STOP`]; without `SA_RESTART` a blocked poll returns early
fn install_sigint_handler() -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);

        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

/// Highest real-time priority, so relayed reports are not delayed
fn raise_priority() -> io::Result<()> {
    let param = libc::sched_param {
        sched_priority: unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) },
    };

    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = match args::parse(std::env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    if let Err(err) = raise_priority() {
        warn!("can't switch to SCHED_FIFO: {}", err);
    }

    if let Err(err) = install_sigint_handler() {
        warn!("can't install SIGINT handler: {}", err);
    }

    let config = args.into_config();

    let mut link = HciLinkControl::new();
    if let Err(err) = link.set_device_class(config.local, config.device_class) {
        error!("failed to set device class: {}", err);
        return ExitCode::FAILURE;
    }

    info!(
        "relaying for master {} (device class 0x{:06x})",
        config.master, config.device_class
    );

    let mut relay = Relay::new(config, L2capTransport::new(), link);

    if let Err(err) = relay.start() {
        error!("startup failed: {}", err);
        return ExitCode::FAILURE;
    }

    match relay.run(&STOP) {
        Ok(()) => {
            info!("done");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
