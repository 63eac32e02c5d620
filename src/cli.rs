//! Minimal CLI parsing.

use std::env;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Refresh once, print the sensor as JSON and exit
    pub once: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = CliOptions::default();
        for arg in args {
            if arg == "--once" {
                options.once = true;
            }
        }
        options
    }
}
