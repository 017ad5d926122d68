//! # Command processor module
//!
//! The command processor handles operator command tokens coming from any source.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use comms_if::cmd::{CmdParseError, Command};
use crate::dispatch::ModeDispatcher;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute a raw command token.
///
/// Tokens which don't parse are dropped with a debug message. Returns the command which was
/// executed, if any.
pub fn exec(dispatcher: &ModeDispatcher, token: &str) -> Option<Command> {

    let cmd = match dispatcher.parser().parse(token) {
        Ok(c) => c,
        Err(CmdParseError::Empty) => return None,
        Err(e) => {
            debug!("Dropping command {:?}: {}", token, e);
            return None
        }
    };

    debug!("Recieved {:?} command", cmd);

    if let Err(e) = dispatcher.handle(cmd.clone()) {
        warn!("Could not execute {:?}: {}", token, e);
    }

    Some(cmd)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dispatch::test::{dispatcher, test_dispatch_params};
    use comms_if::cmd::{Mode, ProfileId};

    #[test]
    fn test_exec() {
        let (d, rec) = dispatcher(test_dispatch_params());

        assert_eq!(exec(&d, "F40A"), Some(Command::ManualMove("F40A".into())));
        assert_eq!(exec(&d, "S75A"), Some(Command::Steer(75)));
        assert_eq!(rec.take_tokens(), vec!["F40A", "S75A"]);

        // Malformed or unauthorised tokens never reach the actuators
        assert_eq!(exec(&d, "X9"), None);
        assert_eq!(exec(&d, "S200A"), None);
        assert_eq!(exec(&d, ""), None);
        assert!(rec.take_tokens().is_empty());

        assert_eq!(
            exec(&d, "P:give_way"),
            Some(Command::ProfileSwitch(ProfileId::GiveWay))
        );
        assert_eq!(exec(&d, "AUTO"), Some(Command::SetMode(Mode::Auto)));
        assert_eq!(d.snapshot().mode, Mode::Auto);
        assert_eq!(d.snapshot().profile, ProfileId::GiveWay);

        // Parses, but the profile isn't in the table so the state is unchanged
        assert_eq!(
            exec(&d, "P:parking"),
            Some(Command::ProfileSwitch(ProfileId::Parking))
        );
        assert_eq!(d.snapshot().profile, ProfileId::GiveWay);
    }
}
