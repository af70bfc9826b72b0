//! Consumers - where log records end up
//!
//! A [`Sink`] receives each record on the dispatcher's worker thread, or on
//! a thread of its own when wrapped with [`own_thread`].

mod console;
mod file;
mod own_thread;

pub use console::ConsoleConsumer;
pub use file::{FileConsumer, FileFormat};
pub use own_thread::{OwnThread, own_thread};

use dispatchq::TaskResult;

use crate::tags::{Tag, Tags};

/// Destination for log records
pub trait Sink: Send + 'static {
    fn consume(&mut self, tags: &Tags) -> TaskResult;
}

/// Render the guaranteed tag values tab-separated, then `\tkey=value` for
/// every other tag
pub fn text_line(tags: &Tags) -> String {
    render_line(tags, |tag| tag.value.to_string())
}

/// Same layout as [`text_line`], with `guaranteed` rendering each leading value
pub(crate) fn render_line<F>(tags: &Tags, guaranteed: F) -> String
where
    F: Fn(&Tag) -> String,
{
    let mut line = tags.guaranteed().map(guaranteed).collect::<Vec<_>>().join("\t");
    for tag in tags.extra() {
        line.push('\t');
        line.push_str(&tag.key);
        line.push('=');
        line.push_str(&tag.value.to_string());
    }
    line
}
