use crate::{millisec, sec};
use std::{
    fmt,
    time::{Duration, Instant},
};

/// Logs how long its scope took when dropped, if above a threshold that depends on `lvl`.
pub struct Stopwatch {
    lvl: log::Level,
    starttime: Instant,
    location: &'static str,
    what: String,
}

impl Stopwatch {
    pub fn new(lvl: log::Level, location: &'static str, args: fmt::Arguments) -> Self {
        Self {
            lvl,
            starttime: Instant::now(),
            location,
            what: fmt::format(args),
        }
    }

    fn threshold(&self) -> Duration {
        match self.lvl {
            log::Level::Error => sec!(10),
            log::Level::Warn => sec!(1),
            log::Level::Info | log::Level::Debug => millisec!(1),
            log::Level::Trace => Duration::ZERO,
        }
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        let duration = self.starttime.elapsed();
        if duration > self.threshold() {
            log::log!(target: self.location, self.lvl, "{} finished in {:?}", self.what, duration);
        }
    }
}

#[macro_export]
macro_rules! debug_stopwatch {
    ($($arg:tt)+) => {
        $crate::utils::stopwatch::Stopwatch::new(log::Level::Debug, module_path!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! info_stopwatch {
    ($($arg:tt)+) => {
        $crate::utils::stopwatch::Stopwatch::new(log::Level::Info, module_path!(), format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_depends_on_level() {
        let sw = info_stopwatch!("Hashing {} pieces", 2);
        assert_eq!("Hashing 2 pieces", sw.what);
        assert_eq!(millisec!(1), sw.threshold());

        let sw = Stopwatch::new(log::Level::Warn, module_path!(), format_args!("announce"));
        assert_eq!(sec!(1), sw.threshold());
        let sw = Stopwatch::new(log::Level::Trace, "t", format_args!(""));
        assert_eq!(Duration::ZERO, sw.threshold());
    }
}
