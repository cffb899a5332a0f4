use std::{error::Error, fmt, panic};

use block_pool::{BlockError, InitError, selftest::SelfTestError};

use crate::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    DarkGray,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
}

impl Color {
    fn fg(self) -> u8 {
        match self {
            Self::DarkGray => 90,
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
        }
    }
}

pub struct WithFg<T>(Color, T);

impl<T> fmt::Display for WithFg<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fg = self.0.fg();
        let value = &self.1;
        write!(f, "\x1B[{fg};1m{value}\x1B[0m")
    }
}

impl<T> WithFg<T> {
    pub fn new(color: Color, value: T) -> Self {
        Self(color, value)
    }
}

/// Renders an error and its chain of causes, with the location each one was
/// raised at when it is known.
pub struct Report<'a> {
    error: &'a (dyn Error + 'static),
}

impl fmt::Debug for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", WithFg::new(Color::Red, self.error))?;
        if let Some(loc) = location(self.error) {
            writeln!(f, "  at {}", WithFg::new(Color::DarkGray, loc))?;
        }
        let mut source = self.error.source();
        if source.is_some() {
            writeln!(f)?;
            writeln!(f, "Caused by:")?;
        }
        let mut index = 0;
        while let Some(s) = source {
            writeln!(f, "{index:4}: {}", WithFg::new(Color::Red, s))?;
            if let Some(loc) = location(s) {
                writeln!(f, "      at {}", WithFg::new(Color::DarkGray, loc))?;
            }
            source = s.source();
            index += 1;
        }
        Ok(())
    }
}

impl<'a> Report<'a> {
    pub fn new(error: &'a (dyn Error + 'static)) -> Self {
        Self { error }
    }
}

/// Location of an error raised by this program or by the pool.
///
/// Only the error types listed here are recognized. An error of any other
/// type is reported without a location, so a new error type that carries
/// one must be added to this list.
fn location(error: &(dyn Error + 'static)) -> Option<String> {
    fn pool_location(loc: &panic::Location<'_>) -> String {
        format!("{}:{}:{}", loc.file(), loc.line(), loc.column())
    }

    if let Some(err) = error.downcast_ref::<RunError>() {
        return Some(err.location().to_string());
    }
    if let Some(err) = error.downcast_ref::<InitError>() {
        return Some(pool_location(err.location()));
    }
    if let Some(err) = error.downcast_ref::<SelfTestError>() {
        return Some(pool_location(err.location()));
    }
    if let Some(err) = error.downcast_ref::<BlockError>() {
        return Some(pool_location(err.location()));
    }
    None
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use block_pool::{BlockPool, InitErrorKind};

    use super::*;

    #[test]
    fn test_report_includes_location() {
        let mut buffer = [0u8; 8];
        let err = BlockPool::new(&mut buffer, 16).unwrap_err();
        assert!(matches!(err.kind(), InitErrorKind::BlockExceedsPool { .. }));

        let report = Report::new(&err).to_string();
        assert!(report.starts_with("Error: "));
        assert!(report.contains("block larger than pool"));
        assert!(report.contains("  at "));
        assert!(!report.contains("Caused by:"));
    }

    #[test]
    fn test_with_fg() {
        assert_eq!(
            WithFg::new(Color::Green, "OK").to_string(),
            "\x1B[32;1mOK\x1B[0m"
        );
    }
}
