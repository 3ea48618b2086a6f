// Attendee records and guest expansion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One person eligible to be selected in a draw.
///
/// Rows read from the roster carry `title` and `guests` as they appeared in
/// the file. Guests synthesized by [`add_guests`] carry only a name and are
/// never expanded again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Raw guest count as exported: empty, `N` or `+N`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<String>,
}

impl Attendee {
    /// A terminal attendee with no title and no guests.
    pub fn named(name: impl Into<String>) -> Self {
        Attendee {
            name: name.into(),
            title: None,
            guests: None,
        }
    }

    /// True when the title is absent or blank. Titled rows are organizers,
    /// sponsors or cancelled RSVPs and never enter the draw.
    pub fn is_plain_attendee(&self) -> bool {
        self.title.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

/// Upper bound on guests a single attendee may declare.
pub const MAX_GUESTS: u32 = 99;

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "guest count {value:?} for {host:?} is not a whole number from 0 to {max}",
    max = MAX_GUESTS
)]
pub struct GuestCountError {
    pub host: String,
    pub value: String,
}

/// Parse a guest count field: blank, `N` or `+N`, with `N` at most
/// [`MAX_GUESTS`]. Blank means no guests.
pub fn parse_guest_count(host: &str, raw: &str) -> Result<u32, GuestCountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let err = || GuestCountError {
        host: host.to_string(),
        value: raw.to_string(),
    };

    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    match digits.parse::<u32>() {
        Ok(n) if n <= MAX_GUESTS => Ok(n),
        _ => Err(err()),
    }
}

/// Name given to the `index`-th of `total` guests brought by `host`.
///
/// A lone guest gets no index suffix ("Alice's guest") while several guests
/// are numbered from 1 ("Bob's guest 2").
pub fn guest_name(host: &str, index: u32, total: u32) -> String {
    if total > 1 {
        format!("{host}'s guest {index}")
    } else {
        format!("{host}'s guest")
    }
}

/// Append a synthetic attendee for every declared guest to the end of the
/// roster, in host order. Returns how many guests were added.
///
/// All guest counts are validated before anything is appended, so on error
/// the roster is left untouched.
pub fn add_guests(roster: &mut Vec<Attendee>) -> Result<usize, GuestCountError> {
    let mut guests = Vec::new();
    for host in roster.iter() {
        let Some(raw) = host.guests.as_deref() else {
            continue;
        };
        let total = parse_guest_count(&host.name, raw)?;
        guests.extend((1..=total).map(|i| Attendee::named(guest_name(&host.name, i, total))));
    }

    let added = guests.len();
    roster.extend(guests);
    Ok(added)
}
