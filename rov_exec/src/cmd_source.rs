//! # Command sources
//!
//! Operator command tokens can come from a line based stream (normally stdin), one token per
//! line, or from a timestamped command script.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    io::BufRead,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use log::{debug, warn};
use util::script_interpreter::{PendingTokens, ScriptInterpreter};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Tokens read from a line based stream by a background thread.
pub struct LineSource {
    rx: Receiver<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Various sources for the commands incoming to the exec.
pub enum CmdSource {
    Lines(LineSource),
    Script(ScriptInterpreter),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LineSource {
    /// Start reading tokens from `reader`.
    ///
    /// Blank lines are skipped. The source ends when the reader reaches end of file or fails.
    pub fn spawn<R>(reader: R) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("cmd_reader".into())
            .spawn(move || {
                for line in reader.lines() {
                    let line = match line {
                        Ok(l) => l,
                        Err(e) => {
                            warn!("Could not read command input: {}", e);
                            break;
                        }
                    };

                    let token = line.trim();
                    if token.is_empty() {
                        continue;
                    }

                    // The receiver has gone, nobody wants the tokens any more
                    if tx.send(token.to_string()).is_err() {
                        break;
                    }
                }

                debug!("Command input closed");
            })?;

        Ok(Self { rx })
    }

    fn poll(&mut self) -> PendingTokens {
        let mut tokens = vec![];

        loop {
            match self.rx.try_recv() {
                Ok(t) => tokens.push(t),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Hand out what was read before the end, the end is seen on the next poll
                    if tokens.is_empty() {
                        return PendingTokens::EndOfScript;
                    }
                    break;
                }
            }
        }

        if tokens.is_empty() {
            PendingTokens::None
        }
        else {
            PendingTokens::Some(tokens)
        }
    }
}

impl CmdSource {
    /// Get the tokens which have arrived, or are due, since the last poll.
    pub fn poll(&mut self) -> PendingTokens {
        match self {
            CmdSource::Lines(l) => l.poll(),
            CmdSource::Script(s) => s.get_pending_tokens(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    #[test]
    fn test_line_source() {
        let input = Cursor::new("AUTO\n\n  P:stop  \nHALT\n");
        let mut src = CmdSource::Lines(LineSource::spawn(input).unwrap());

        let mut tokens = vec![];
        let deadline = Instant::now() + Duration::from_secs(5);

        loop {
            match src.poll() {
                PendingTokens::Some(t) => tokens.extend(t),
                PendingTokens::None => thread::sleep(Duration::from_millis(1)),
                PendingTokens::EndOfScript => break,
            }
            assert!(Instant::now() < deadline, "Line source never ended");
        }

        assert_eq!(tokens, vec!["AUTO", "P:stop", "HALT"]);
    }
}
