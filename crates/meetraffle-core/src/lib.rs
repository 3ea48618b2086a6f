// Library root: roster loading and the timed raffle draw.

pub mod attendee;
pub mod clock;
pub mod config;
pub mod cue;
pub mod draw;
pub mod roster;

pub use attendee::Attendee;
pub use draw::{DrawEngine, DrawError, DrawObserver, DrawOutcome, DrawState};
pub use roster::{load_attendees, RosterError};
