//! The event list the Dolphin software imports (`dolphin_events.csv`).

use std::fmt::Write as _;

use crate::codepage::{self, EncodeError};
use crate::model::{Event, StartList};

/// Name the Dolphin software looks for.
pub const DOLPHIN_EVENTS_FILE: &str = "dolphin_events.csv";

/// One `event,name,heat_count,split_count,round_code` row per event, in
/// event order, encoded for the console.
pub fn dolphin_events_csv<'a>(program: impl IntoIterator<Item = &'a StartList>) -> Result<Vec<u8>, EncodeError> {
    let mut events: Vec<&Event> = program.into_iter().map(|list| &list.event).collect();
    events.sort_by(|a, b| a.number.cmp(&b.number));

    let mut text = String::new();
    for event in events {
        write!(
            text,
            "{},{},{},{},{}\r\n",
            event.number,
            event.name,
            event.heat_count,
            event.split_count,
            event.round.code()
        )
        .unwrap();
    }
    codepage::encode(&text)
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::model::{EventNumber, Round};

    fn list(number: &str, name: &str, heats: u32) -> StartList {
        StartList {
            event: Event::new(EventNumber::new(number).unwrap(), name, Round::All, heats, 1).unwrap(),
            entries: Vec::new(),
        }
    }

    #[test]
    fn rows_follow_numeric_event_order() {
        let program = [
            list("10", "BOYS 50 FREE", 2),
            list("2", "GIRLS 100 BACK", 1),
            list("1Z", "MIXED 200 RELAY", 3),
            list("1", "GIRLS 50 FREE", 4),
        ];
        let bytes = dolphin_events_csv(&program).unwrap();
        let text = String::from_utf8(bytes).unwrap().replace("\r\n", "\n");
        assert_snapshot!(text, @r"
        1,GIRLS 50 FREE,4,1,A
        1Z,MIXED 200 RELAY,3,1,A
        2,GIRLS 100 BACK,1,1,A
        10,BOYS 50 FREE,2,1,A
        ");
    }

    #[test]
    fn names_are_written_in_the_console_code_page() {
        let bytes = dolphin_events_csv(&[list("3", "Gar\u{e7}ons 50 Libre", 1)]).unwrap();
        assert_eq!(bytes, b"3,Gar\xe7ons 50 Libre,1,1,A\r\n");
    }

    #[test]
    fn empty_program_is_an_empty_file() {
        assert!(dolphin_events_csv(std::iter::empty()).unwrap().is_empty());
    }
}
