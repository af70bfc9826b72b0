//! Message formatters used by `Logger::logf`

use std::fmt::{Display, Write};

/// Placeholder replaced by the next argument
pub const PLACEHOLDER: &str = "{}";

/// Turns a template plus arguments into the record message
pub trait Formatter: Send + Sync {
    fn format(&self, template: &str, args: &[&dyn Display]) -> String;
}

/// Replaces each `{}` with the next argument, left to right.
///
/// Placeholders left over once the arguments run out are kept verbatim, and
/// arguments left over once the placeholders run out are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn format(&self, template: &str, args: &[&dyn Display]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        for arg in args {
            let Some(pos) = rest.find(PLACEHOLDER) else {
                break;
            };
            out.push_str(&rest[..pos]);
            let _ = write!(out, "{}", arg);
            rest = &rest[pos + PLACEHOLDER.len()..];
        }
        out.push_str(rest);
        out
    }
}

/// Formats with [`DefaultFormatter`] and prepends a fixed prefix
#[derive(Debug, Clone)]
pub struct PrefixFormatter {
    prefix: String,
}

impl PrefixFormatter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Formatter for PrefixFormatter {
    fn format(&self, template: &str, args: &[&dyn Display]) -> String {
        format!("{}{}", self.prefix, DefaultFormatter.format(template, args))
    }
}
