//! Operator menu
//!
//! The runner only needs "show these options, block until one is chosen".
//! [`PromptMenu`] does that on a plain terminal: it lists the entries with
//! their hotkeys highlighted and reads a line of input.

use std::io::{self, BufRead, Write};

use colored::Colorize;

use crate::common::Result;
use crate::responses::ResponseMenu;

/// Something that can put a compiled menu in front of the operator
pub trait Menu {
    /// Block until the operator picks an entry; returns its description
    ///
    /// `None` means the operator closed the menu without choosing.
    fn choose(&mut self, title: &str, menu: &ResponseMenu) -> Result<Option<String>>;
}

/// Line-oriented menu over any reader/writer pair
pub struct PromptMenu<R, W> {
    input: R,
    output: W,
}

impl PromptMenu<io::StdinLock<'static>, io::Stdout> {
    /// Menu on the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptMenu<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn render(&mut self, title: &str, menu: &ResponseMenu) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{}", title.bold())?;
        for (index, description) in menu.descriptions().enumerate() {
            writeln!(self.output, "  {:>2}) {}", index + 1, highlight_hotkeys(description))?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Menu for PromptMenu<R, W> {
    fn choose(&mut self, title: &str, menu: &ResponseMenu) -> Result<Option<String>> {
        self.render(title, menu)?;

        loop {
            write!(self.output, "{} ", "Choice:".cyan())?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let choice = line.trim();
            if choice.is_empty() {
                continue;
            }

            let by_number = choice
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| menu.entries().get(i));
            if let Some(entry) = by_number.or_else(|| menu.resolve_choice(choice)) {
                return Ok(Some(entry.description.clone()));
            }
            writeln!(self.output, "{} {}", "Unknown choice:".red(), choice)?;
        }
    }
}

/// Color the `[x]` hotkey markers of a description
fn highlight_hotkeys(description: &str) -> String {
    let mut out = String::with_capacity(description.len());
    let mut rest = description;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']').map(|c| open + c) else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str(&rest[open..=close].red().bold().to_string());
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::{compile, Conditions, ResponseRow};
    use crate::scenario::ScenarioStore;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn menu() -> ResponseMenu {
        let dir = tempdir().unwrap();
        let schema = dir.path().join("scenarios.csv");
        std::fs::write(&schema, "mode,result\n").unwrap();
        let rows = vec![
            ResponseRow::new("Passed [p]", "", "write_result", "result, pass"),
            ResponseRow::new("Failed [f]", "", "write_result", "result, fail"),
            ResponseRow::new("Quit", "", "quit", ""),
        ];
        compile(&rows, &Conditions::new(), &ScenarioStore::new(), &schema).unwrap()
    }

    fn choose(input: &str) -> (Option<String>, String) {
        colored::control::set_override(false);
        let mut output = Vec::new();
        let mut prompt = PromptMenu::new(Cursor::new(input.to_string()), &mut output);
        let choice = prompt.choose("mode:s2idle", &menu()).unwrap();
        (choice, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_choose_by_hotkey() {
        let (choice, output) = choose("F\n");
        assert_eq!(choice.as_deref(), Some("Failed [f]"));
        assert!(output.contains("mode:s2idle"));
        assert!(output.contains(" 1) Passed [p]"));
    }

    #[test]
    fn test_choose_by_number_and_text() {
        assert_eq!(choose("3\n").0.as_deref(), Some("Quit"));
        assert_eq!(choose("Passed [p]\n").0.as_deref(), Some("Passed [p]"));
    }

    #[test]
    fn test_reprompts_until_valid() {
        let (choice, output) = choose("\nz\n0\np\n");
        assert_eq!(choice.as_deref(), Some("Passed [p]"));
        assert_eq!(output.matches("Unknown choice:").count(), 2);
    }

    #[test]
    fn test_eof_is_no_choice() {
        assert_eq!(choose("z\n").0, None);
    }

    #[test]
    fn test_highlight_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(highlight_hotkeys("Fail [f] / [x"), "Fail [f] / [x");
    }
}
