use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Seek,
    Track,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "IDLE",
            Mode::Seek => "SEEK",
            Mode::Track => "TRACK",
        };
        f.write_str(name)
    }
}

/// Recomputes SEEK/TRACK from observation age on every tick. Only
/// `enable`/`stop` move in and out of IDLE.
#[derive(Clone, Debug)]
pub struct ModeStateMachine {
    mode: Mode,
    seek_enabled: bool,
    no_detection_timeout: Duration,
}

impl ModeStateMachine {
    pub fn new(seek_enabled: bool, no_detection_timeout: Duration) -> Self {
        Self {
            mode: Mode::Idle,
            seek_enabled,
            no_detection_timeout,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn enable(&mut self) {
        if self.mode == Mode::Idle {
            self.mode = Mode::Track;
        }
    }

    pub fn stop(&mut self) {
        self.mode = Mode::Idle;
    }

    /// `age` is `None` when no observation was ever applied.
    pub fn evaluate(&mut self, age: Option<Duration>) -> Mode {
        if self.mode == Mode::Idle {
            return Mode::Idle;
        }
        let stale = age.map_or(true, |age| age > self.no_detection_timeout);
        let next = if stale && self.seek_enabled {
            Mode::Seek
        } else {
            Mode::Track
        };
        if next != self.mode {
            log::info!("mode {} -> {} (age {})", self.mode, next, format_age(age));
        }
        self.mode = next;
        next
    }
}

fn format_age(age: Option<Duration>) -> String {
    match age {
        Some(age) => format!("{:.2}s", age.as_secs_f64()),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    #[test]
    fn idle_until_enabled() {
        let mut machine = ModeStateMachine::new(true, TIMEOUT);
        assert_eq!(machine.evaluate(None), Mode::Idle);
        machine.enable();
        assert_eq!(machine.evaluate(None), Mode::Seek);
    }

    #[test]
    fn stale_target_enters_seek_and_fresh_returns_to_track() {
        let mut machine = ModeStateMachine::new(true, TIMEOUT);
        machine.enable();
        assert_eq!(machine.evaluate(Some(Duration::from_millis(200))), Mode::Track);
        assert_eq!(machine.evaluate(Some(Duration::from_millis(1001))), Mode::Seek);
        assert_eq!(machine.evaluate(Some(Duration::from_millis(10))), Mode::Track);
    }

    #[test]
    fn age_equal_to_timeout_still_tracks() {
        let mut machine = ModeStateMachine::new(true, TIMEOUT);
        machine.enable();
        assert_eq!(machine.evaluate(Some(TIMEOUT)), Mode::Track);
    }

    #[test]
    fn seek_disabled_always_tracks() {
        let mut machine = ModeStateMachine::new(false, TIMEOUT);
        machine.enable();
        assert_eq!(machine.evaluate(None), Mode::Track);
        assert_eq!(machine.evaluate(Some(Duration::from_secs(3600))), Mode::Track);
    }

    #[test]
    fn evaluation_is_total_once_enabled() {
        let ages = [
            None,
            Some(Duration::ZERO),
            Some(TIMEOUT),
            Some(TIMEOUT + Duration::from_nanos(1)),
            Some(Duration::MAX),
        ];
        for seek_enabled in [true, false] {
            let mut machine = ModeStateMachine::new(seek_enabled, TIMEOUT);
            machine.enable();
            for age in ages {
                let mode = machine.evaluate(age);
                assert!(matches!(mode, Mode::Seek | Mode::Track));
            }
        }
    }

    #[test]
    fn stop_returns_to_idle() {
        let mut machine = ModeStateMachine::new(true, TIMEOUT);
        machine.enable();
        machine.evaluate(None);
        machine.stop();
        assert_eq!(machine.mode(), Mode::Idle);
        assert_eq!(machine.evaluate(Some(Duration::ZERO)), Mode::Idle);
    }
}
