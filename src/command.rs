use crate::zone::{UnknownZone, Zone};
use std::str::FromStr;

/// A line typed at the session prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Shot { zone: Zone, made: bool },
    Pause,
    Resume,
    Undo,
    End,
    Save,
    Discard,
    Stats,
    Export,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),
    #[error("'{0}' needs a zone, e.g. '{0} top_key'")]
    MissingZone(&'static str),
    #[error(transparent)]
    Zone(#[from] UnknownZone),
}

pub const HELP: &str = "\
commands:
  make <zone> | m <zone>   record a made shot
  miss <zone> | x <zone>   record a missed shot
  pause | resume           stop / restart the clock
  undo                     remove the last shot
  end                      finish the session
  save                     keep an ended session
  discard                  throw the session away
  stats                    zone breakdown so far
  export                   write csv reports
  start                    begin a new session
  quit
zones: left_corner (lc), left_wing (lw), top_key (tk), right_wing (rw), right_corner (rc)";

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let shot = |made: bool, verb: &'static str, zone: Option<&str>| -> Result<Command, CommandError> {
            let zone = zone.ok_or(CommandError::MissingZone(verb))?.parse::<Zone>()?;
            Ok(Command::Shot { zone, made })
        };
        match verb.as_str() {
            "make" | "m" | "+" => shot(true, "make", words.next()),
            "miss" | "x" | "-" => shot(false, "miss", words.next()),
            "start" | "new" => Ok(Command::Start),
            "pause" | "p" => Ok(Command::Pause),
            "resume" | "r" => Ok(Command::Resume),
            "undo" | "u" => Ok(Command::Undo),
            "end" => Ok(Command::End),
            "save" => Ok(Command::Save),
            "discard" | "cancel" => Ok(Command::Discard),
            "stats" | "s" => Ok(Command::Stats),
            "export" => Ok(Command::Export),
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(s.trim().to_string())),
        }
    }
}
