//! Countdown printer with an injected writer and sleeper.

use std::io::Write;

use crate::sleeper::Sleeper;
use crate::Result;

pub const COUNTDOWN_START: u32 = 3;
pub const FINAL_WORD: &str = "Go!";

/// Write `start` down to `1`, one per line, pausing after each, then `final_word`.
///
/// The final word carries no trailing newline. A `start` of zero writes only
/// the final word.
pub fn countdown<W, S>(writer: &mut W, sleeper: &S, start: u32, final_word: &str) -> Result<()>
where
    W: Write + ?Sized,
    S: Sleeper + ?Sized,
{
    for i in (1..=start).rev() {
        writer.write_all(format!("{}\n", i).as_bytes())?;
        writer.flush()?;
        sleeper.sleep();
    }
    writer.write_all(final_word.as_bytes())?;
    writer.flush()?;
    Ok(())
}
