// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const PRESS: &str = "press";
const RELEASE: &str = "release";
const LEAVE: &str = "leave";
const HIT: &str = "hit";
const PLAY: &str = "play";
const STOP: &str = "stop";
const RECORD: &str = "record";
const QUANTIZE: &str = "quantize";
const BPM: &str = "bpm";
const COLLECTION: &str = "collection";
const PADS: &str = "pads";
const STATUS: &str = "status";
const QUIT: &str = "quit";

/// Seconds a hit is held when no duration is given.
const DEFAULT_HIT_SECONDS: f64 = 0.25;

/// A controller that drives a session using the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and dispatches a single command. Returns false once input is exhausted
    /// or the user quits.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} N, {} N, {} N, {} N [SECS], {}, {}, {}, {} off|N, {} X, {} NAME, {}, {}, {}): ",
            PRESS, RELEASE, LEAVE, HIT, PLAY, STOP, RECORD, QUANTIZE, BPM, COLLECTION, PADS, STATUS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let Some(event) = parse_command(&input) else {
            warn!(input = input.trim(), "Unrecognized input");
            return Ok(true);
        };
        let running = event != Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(running)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a command line into an event.
pub fn parse_command(input: &str) -> Option<Event> {
    let mut words = input.split_whitespace();
    let command = words.next()?.to_lowercase();
    let argument = words.next();
    let extra = words.next();

    let event = match (command.as_str(), argument, extra) {
        (PRESS, Some(pad), None) => Event::Press(pad.to_string()),
        (RELEASE, Some(pad), None) => Event::Release(pad.to_string()),
        (LEAVE, Some(pad), None) => Event::Leave(pad.to_string()),
        (HIT, Some(pad), None) => Event::Hit(pad.to_string(), DEFAULT_HIT_SECONDS),
        (HIT, Some(pad), Some(seconds)) => {
            let seconds = seconds.parse::<f64>().ok().filter(|s| s.is_finite() && *s >= 0.0)?;
            Event::Hit(pad.to_string(), seconds)
        }
        (PLAY, None, None) => Event::Play,
        (STOP, None, None) => Event::Stop,
        (RECORD, None, None) => Event::Record,
        (QUANTIZE, Some("off"), None) => Event::Quantize(None),
        (QUANTIZE, Some(subdivision), None) => {
            Event::Quantize(Some(subdivision.parse::<u32>().ok()?))
        }
        (BPM, Some(bpm), None) => Event::Bpm(bpm.parse::<f64>().ok()?),
        (COLLECTION, Some(collection), None) => Event::Collection(collection.to_string()),
        (PADS, None, None) => Event::Pads,
        (STATUS, None, None) => Event::Status,
        (QUIT, None, None) => Event::Quit,
        _ => return None,
    };
    Some(event)
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::Event;

    use super::{parse_command, Driver};

    fn get_event(event: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader_bytes = event.as_bytes();
        let reader = BufReader::new(reader_bytes);

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        let running = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((running, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Play)), get_event("play\n")?);
        assert_eq!((true, Some(Event::Stop)), get_event("STOP\n")?);
        assert_eq!(
            (true, Some(Event::Press("3".to_string()))),
            get_event("press 3\n")?
        );
        assert_eq!((true, None), get_event("unrecognized\n")?);
        assert_eq!((false, Some(Event::Quit)), get_event("quit\n")?);
        assert_eq!((false, Some(Event::Quit)), get_event("")?);
        Ok(())
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            Some(Event::Release("kit/1-Kick".to_string())),
            parse_command("release kit/1-Kick")
        );
        assert_eq!(
            Some(Event::Leave("2".to_string())),
            parse_command("  leave   2 ")
        );
        assert_eq!(
            Some(Event::Hit("1".to_string(), 0.25)),
            parse_command("hit 1")
        );
        assert_eq!(
            Some(Event::Hit("1".to_string(), 1.5)),
            parse_command("hit 1 1.5")
        );
        assert_eq!(None, parse_command("hit 1 -2"));
        assert_eq!(Some(Event::Quantize(None)), parse_command("quantize off"));
        assert_eq!(Some(Event::Quantize(Some(16))), parse_command("quantize 16"));
        assert_eq!(None, parse_command("quantize sixteen"));
        assert_eq!(Some(Event::Bpm(96.5)), parse_command("bpm 96.5"));
        assert_eq!(
            Some(Event::Collection("blues".to_string())),
            parse_command("collection blues")
        );
        assert_eq!(Some(Event::Record), parse_command("record"));
        assert_eq!(Some(Event::Pads), parse_command("pads"));
        assert_eq!(Some(Event::Status), parse_command("status"));
        assert_eq!(None, parse_command("press"));
        assert_eq!(None, parse_command("play now"));
        assert_eq!(None, parse_command(""));
    }
}
