//! Console output, one line per record

use std::io::{self, Write};

use colored::{ColoredString, Colorize};
use dispatchq::TaskResult;

use crate::level::Level;
use crate::tags::{KEY_LEVEL, Tags, Value};

use super::{Sink, render_line};

/// Writes `time\tlevel\tmessage[\tkey=value...]` lines
pub struct ConsoleConsumer<W = io::Stdout> {
    out: W,
    color: bool,
}

impl ConsoleConsumer<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl ConsoleConsumer<io::Stderr> {
    pub fn stderr(color: bool) -> Self {
        Self::new(io::stderr(), color)
    }
}

impl<W: Write> ConsoleConsumer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn format_line(&self, tags: &Tags) -> String {
        render_line(tags, |tag| match &tag.value {
            Value::Level(level) if self.color && tag.key == KEY_LEVEL => paint(*level).to_string(),
            value => value.to_string(),
        })
    }
}

fn paint(level: Level) -> ColoredString {
    let name = level.as_str();
    match level {
        Level::Critical => name.red().bold(),
        Level::Error => name.red(),
        Level::Warning => name.yellow(),
        Level::Info => name.green(),
        Level::Debug => name.cyan(),
        Level::Trace => name.dimmed(),
        Level::Unknown => name.normal(),
    }
}

impl<W: Write + Send + 'static> Sink for ConsoleConsumer<W> {
    fn consume(&mut self, tags: &Tags) -> TaskResult {
        let line = self.format_line(tags);
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}
