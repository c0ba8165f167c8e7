//! Command line parsing

use l2relay::{BdAddr, RelayConfig};
use thiserror::Error;

pub const USAGE: &str = "\
Usage: l2relayd [options] <master address> [<dongle address> [<device class>]]
Options:
  -d <addr>, --dongle <addr>      Dongle address
  -c <class>, --class <class>     Device class (decimal, 0x hex or 0 octal)
  -x, --dump                      Hex-dump relayed frames (debug level)
  -h, --help                      Show this help";

/// Class of device is a 24-bit field
const MAX_DEVICE_CLASS: u32 = 0x00FF_FFFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("Missing master address")]
    MissingMaster,

    #[error("Invalid master address \"{0}\"")]
    InvalidMaster(String),

    #[error("Invalid dongle address \"{0}\"")]
    InvalidDongle(String),

    #[error("Invalid device class \"{0}\"")]
    InvalidClass(String),

    #[error("Missing argument to {0}")]
    MissingValue(String),

    #[error("Unknown option \"{0}\"")]
    UnknownOption(String),

    #[error("Unexpected argument \"{0}\"")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub master: BdAddr,
    pub dongle: Option<BdAddr>,
    pub class: Option<u32>,
    pub dump: bool,
}

impl Args {
    /// Default log filter; frame dumps are logged at debug level
    pub fn log_filter(&self) -> &'static str {
        if self.dump {
            "debug"
        } else {
            "info"
        }
    }

    pub fn into_config(self) -> RelayConfig {
        let mut config = RelayConfig::new(self.master).with_payload_dump(self.dump);
        if let Some(dongle) = self.dongle {
            config = config.with_local(dongle);
        }
        if let Some(class) = self.class {
            config = config.with_device_class(class);
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Args),
    Help,
}

/// Parses everything after the program name
pub fn parse<I>(args: I) -> Result<Command, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut master = None;
    let mut dongle = None;
    let mut class = None;
    let mut dump = false;
    let mut positional = 0;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-x" | "--dump" => dump = true,
            "-d" | "--dongle" => {
                let value = args
                    .next()
                    .ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                dongle = Some(parse_dongle(&value)?);
            }
            "-c" | "--class" => {
                let value = args
                    .next()
                    .ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                class = Some(parse_class(&value)?);
            }
            option if option.starts_with('-') && option.len() > 1 => {
                return Err(ArgsError::UnknownOption(option.to_string()));
            }
            _ => {
                match positional {
                    0 => {
                        master = Some(
                            arg.parse()
                                .map_err(|_| ArgsError::InvalidMaster(arg.clone()))?,
                        )
                    }
                    1 => dongle = Some(parse_dongle(&arg)?),
                    2 => class = Some(parse_class(&arg)?),
                    _ => return Err(ArgsError::Unexpected(arg)),
                }
                positional += 1;
            }
        }
    }

    let master = master.ok_or(ArgsError::MissingMaster)?;

    Ok(Command::Run(Args {
        master,
        dongle,
        class,
        dump,
    }))
}

fn parse_dongle(text: &str) -> Result<BdAddr, ArgsError> {
    text.parse()
        .map_err(|_| ArgsError::InvalidDongle(text.to_string()))
}

/// Integer with C-style base prefix: `0x` hex, leading `0` octal, else
/// decimal
pub fn parse_class(text: &str) -> Result<u32, ArgsError> {
    let invalid = || ArgsError::InvalidClass(text.to_string());

    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    // from_str_radix accepts a leading '+'
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    let class = u32::from_str_radix(digits, radix).map_err(|_| invalid())?;
    if class > MAX_DEVICE_CLASS {
        return Err(invalid());
    }

    Ok(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "00:19:C1:5A:CB:10";
    const DONGLE: &str = "00:1B:DC:0F:AA:58";

    fn parse_args(args: &[&str]) -> Result<Command, ArgsError> {
        parse(args.iter().map(|arg| arg.to_string()))
    }

    fn run_args(args: &[&str]) -> Args {
        match parse_args(args).unwrap() {
            Command::Run(args) => args,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_master_only() {
        let args = run_args(&[MASTER]);

        assert_eq!(args.master, MASTER.parse().unwrap());
        assert_eq!(args.dongle, None);
        assert_eq!(args.class, None);
        assert!(!args.dump);
        assert_eq!(args.log_filter(), "info");

        let config = args.into_config();
        assert_eq!(config.device_class, 0x508);
        assert_eq!(config.local, None);
    }

    #[test]
    fn test_positional_form() {
        let args = run_args(&[MASTER, DONGLE, "0x2508"]);

        assert_eq!(args.dongle, Some(DONGLE.parse().unwrap()));
        assert_eq!(args.class, Some(0x2508));
    }

    #[test]
    fn test_option_form() {
        let args = run_args(&["-d", DONGLE, "--class", "1288", "-x", MASTER]);

        assert_eq!(args.master, MASTER.parse().unwrap());
        assert_eq!(args.dongle, Some(DONGLE.parse().unwrap()));
        assert_eq!(args.class, Some(1288));
        assert!(args.dump);
        assert_eq!(args.log_filter(), "debug");

        let config = args.into_config();
        assert_eq!(config.local, Some(DONGLE.parse().unwrap()));
        assert_eq!(config.device_class, 1288);
        assert!(config.dump_payloads);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_args(&[]), Err(ArgsError::MissingMaster));
        assert_eq!(
            parse_args(&["00:19:C1:5A:CB"]),
            Err(ArgsError::InvalidMaster("00:19:C1:5A:CB".to_string()))
        );
        assert_eq!(
            parse_args(&[MASTER, "-d"]),
            Err(ArgsError::MissingValue("-d".to_string()))
        );
        assert_eq!(
            parse_args(&[MASTER, "--dongle", "nope"]),
            Err(ArgsError::InvalidDongle("nope".to_string()))
        );
        assert_eq!(
            parse_args(&[MASTER, "-c", "0xZZ"]),
            Err(ArgsError::InvalidClass("0xZZ".to_string()))
        );
        assert_eq!(
            parse_args(&[MASTER, "-q"]),
            Err(ArgsError::UnknownOption("-q".to_string()))
        );
        assert_eq!(
            parse_args(&[MASTER, DONGLE, "0x508", "extra"]),
            Err(ArgsError::Unexpected("extra".to_string()))
        );
    }

    #[test]
    fn test_help() {
        assert_eq!(parse_args(&[MASTER, "--help"]), Ok(Command::Help));
        assert_eq!(parse_args(&["-h"]), Ok(Command::Help));
    }

    #[test]
    fn test_class_bases() {
        assert_eq!(parse_class("1288"), Ok(0x508));
        assert_eq!(parse_class("0x508"), Ok(0x508));
        assert_eq!(parse_class("0X2508"), Ok(0x2508));
        assert_eq!(parse_class("02410"), Ok(0x508));
        assert_eq!(parse_class("0"), Ok(0));
        assert!(parse_class("").is_err());
        assert!(parse_class("0x").is_err());
        assert!(parse_class("+12").is_err());
        assert!(parse_class("09").is_err());
        assert!(parse_class("0x1000000").is_err());
    }
}
