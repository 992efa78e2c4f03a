//! Diagnostic output seam. Engines never print on their own; callers
//! hand in whatever sink fits (console, capture buffer, nothing).

pub trait Report {
    /// Accept one line of diagnostic text.
    fn line(&mut self, text: &str);
}

/// Discards everything.
#[derive(Default)]
pub struct Quiet;

impl Report for Quiet {
    fn line(&mut self, _text: &str) {}
}

/// Prints each line to stdout.
#[derive(Default)]
pub struct Console;

impl Report for Console {
    fn line(&mut self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct Capture(pub Vec<String>);

#[cfg(test)]
impl Report for Capture {
    fn line(&mut self, text: &str) {
        self.0.push(text.to_string());
    }
}
