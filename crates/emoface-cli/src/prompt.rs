//! Interactive closed-set choices.
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::str::FromStr;

use anyhow::{bail, Result};

/// Ask `question` until the answer parses as `T`.
///
/// Invalid answers are reported on `writer` and the question is asked again.
/// Accepted answers are echoed back in their canonical spelling. Running out of
/// input is an error.
pub fn prompt_choice<T, R, W>(reader: &mut R, writer: &mut W, question: &str, options: &[&str]) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
    R: BufRead,
    W: Write,
{
    loop {
        write!(writer, "{} [{}]: ", question, options.join(", "))?;
        writer.flush()?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            bail!("input closed before a valid choice for '{}' was given", question);
        }
        match line.trim().parse::<T>() {
            Ok(choice) => {
                writeln!(writer, "You entered {}", choice)?;
                return Ok(choice);
            }
            Err(e) => writeln!(writer, "{}. Please try again.", e)?,
        }
    }
}
