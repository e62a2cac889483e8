//! Console prompts: numbered choices, numbers, and jog input.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    str::FromStr,
};

use crate::calibrate::JogSource;
use crate::model::Axis;

use super::Mode;

/// Line-oriented operator input over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    jogging: Option<Axis>,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            jogging: None,
        }
    }

    /// Writes `message` to the operator.
    pub fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }

    /// Prompts and reads one trimmed line. `None` at end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prompts until the answer parses as `T`.
    pub fn number<T: FromStr>(&mut self, prompt: &str) -> Result<T, String> {
        loop {
            let answer = self
                .ask(prompt)
                .map_err(|e| format!("failed to read input: {e}"))?
                .ok_or("input ended")?;
            match answer.parse() {
                Ok(value) => return Ok(value),
                Err(_) => self
                    .say(&format!("'{answer}' is not a valid number, try again."))
                    .map_err(|e| e.to_string())?,
            }
        }
    }

    /// Asks for the operating mode. An unrecognised answer is an error.
    pub fn mode(&mut self) -> Result<Mode, String> {
        self.say("Choose from the options below:")
            .and_then(|()| self.say("  1) Generate a grid plan, then run it."))
            .and_then(|()| self.say("  2) Run an existing plan or log file."))
            .map_err(|e| e.to_string())?;
        let answer = self
            .ask("Enter your choice (1 or 2): ")
            .map_err(|e| format!("failed to read input: {e}"))?
            .ok_or("input ended")?;
        answer.parse()
    }

    /// Asks for a file path.
    pub fn path(&mut self, prompt: &str) -> Result<PathBuf, String> {
        let answer = self
            .ask(prompt)
            .map_err(|e| format!("failed to read input: {e}"))?
            .filter(|a| !a.is_empty())
            .ok_or("no path given")?;
        Ok(PathBuf::from(answer))
    }
}

impl<R: BufRead, W: Write> JogSource for Prompter<R, W> {
    fn next_jog(&mut self, axis: Axis) -> Option<f64> {
        if self.jogging != Some(axis) {
            self.jogging = Some(axis);
            let banner = format!(
                "Jogging the {axis} axis. Enter relative moves in mm until the stage \
                 sits at the desired origin, then 0 to continue."
            );
            self.say(&banner).ok()?;
        }
        loop {
            let answer = match self.ask(&format!("{axis} jog in mm [0 to finish]: ")) {
                Ok(Some(answer)) => answer,
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!("Failed to read jog input: {e}");
                    return None;
                }
            };
            match answer.parse::<f64>() {
                Ok(delta) if delta.is_finite() => return Some(delta),
                _ => self
                    .say(&format!("'{answer}' is not a distance, try again."))
                    .ok()?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn number_reprompts_until_valid() {
        let mut p = prompter("ten\n\n 10 \n");
        let value: i64 = p.number("Steps: ").unwrap();

        assert_eq!(value, 10);
        let shown = String::from_utf8(p.output).unwrap();
        assert_eq!(shown.matches("Steps: ").count(), 3);
        assert!(shown.contains("'ten' is not a valid number"));
    }

    #[test]
    fn number_fails_at_end_of_input() {
        let mut p = prompter("abc\n");
        assert!(p.number::<f64>("Size: ").is_err());
    }

    #[test]
    fn mode_accepts_one_and_two() {
        assert_eq!(prompter("1\n").mode().unwrap(), Mode::Generate);
        assert_eq!(prompter(" 2\n").mode().unwrap(), Mode::Replay);
    }

    #[test]
    fn mode_rejects_anything_else() {
        let err = prompter("3\n").mode().unwrap_err();
        assert!(err.contains("invalid mode"));
    }

    #[test]
    fn jogs_skip_garbage_and_stop_at_end() {
        let mut p = prompter("5\nleft\n-2\ninf\n0\n");
        let jogs: Vec<f64> = std::iter::from_fn(|| p.next_jog(Axis::X)).collect();
        assert_eq!(jogs, vec![5.0, -2.0, 0.0]);
    }

    #[test]
    fn banner_shown_once_per_axis() {
        let mut p = prompter("1\n0\n0\n");
        p.next_jog(Axis::X);
        p.next_jog(Axis::X);
        p.next_jog(Axis::Y);

        let shown = String::from_utf8(p.output).unwrap();
        assert_eq!(shown.matches("Jogging the x axis").count(), 1);
        assert_eq!(shown.matches("Jogging the y axis").count(), 1);
    }

    #[test]
    fn empty_path_is_an_error() {
        assert!(prompter("\n").path("File: ").is_err());
        assert_eq!(
            prompter("scan.csv\n").path("File: ").unwrap(),
            PathBuf::from("scan.csv")
        );
    }
}
