use std::fmt;
use std::str::FromStr;

use super::controller::ChannelController;
use super::message::InputType;
use crate::error::AdminError;

/// Operator commands accepted by the harness.
///
/// Grammar (case-insensitive, whitespace separated):
/// `engine on|off`, `<channel> on|off`, `start-all`, `stop-all`, `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Engine(bool),
    Channel(InputType, bool),
    StartAll,
    StopAll,
    Status,
}

/// What the caller still has to do after `apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminEffect {
    /// Flag already flipped on the controller.
    Applied(String),
    StartAll,
    StopAll,
    Status,
}

fn parse_switch(word: &str) -> Result<bool, AdminError> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(AdminError::BadSwitch(other.to_string())),
    }
}

impl FromStr for AdminCommand {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let head = words.next().ok_or(AdminError::Empty)?.to_ascii_lowercase();
        let arg = words.next();
        if words.next().is_some() {
            return Err(AdminError::Unknown(s.trim().to_string()));
        }

        match (head.as_str(), arg) {
            ("start-all", None) => Ok(AdminCommand::StartAll),
            ("stop-all", None) => Ok(AdminCommand::StopAll),
            ("status", None) => Ok(AdminCommand::Status),
            ("engine", Some(switch)) => Ok(AdminCommand::Engine(parse_switch(switch)?)),
            (channel, Some(switch)) => {
                let kind: InputType = channel.parse()?;
                Ok(AdminCommand::Channel(kind, parse_switch(switch)?))
            }
            _ => Err(AdminError::Unknown(s.trim().to_string())),
        }
    }
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = |on: bool| if on { "on" } else { "off" };
        match self {
            AdminCommand::Engine(on) => write!(f, "engine {}", word(*on)),
            AdminCommand::Channel(kind, on) => write!(f, "{} {}", kind, word(*on)),
            AdminCommand::StartAll => f.write_str("start-all"),
            AdminCommand::StopAll => f.write_str("stop-all"),
            AdminCommand::Status => f.write_str("status"),
        }
    }
}

impl AdminCommand {
    /// Flag commands take effect here. Lifecycle and status commands are handed
    /// back for the supervisor owner to run.
    pub fn apply(self, controller: &ChannelController) -> AdminEffect {
        match self {
            AdminCommand::Engine(on) => {
                let prev = controller.set_engine_on(on);
                AdminEffect::Applied(format!("engine {} -> {}", prev, on))
            }
            AdminCommand::Channel(kind, on) => {
                let prev = controller.set_enabled(kind, on);
                AdminEffect::Applied(format!("{} {} -> {}", kind, prev, on))
            }
            AdminCommand::StartAll => AdminEffect::StartAll,
            AdminCommand::StopAll => AdminEffect::StopAll,
            AdminCommand::Status => AdminEffect::Status,
        }
    }
}
