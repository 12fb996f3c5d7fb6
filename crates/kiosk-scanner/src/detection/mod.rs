//! Scanner presence detection.
//!
//! Several independent strategies answer "is a scanner attached?". The
//! [`PresenceDetector`] asks them in order and stops at the first positive
//! answer; a strategy that fails is logged and skipped.

pub mod basic;
pub mod hid;
pub mod input;
pub mod mock;

pub use basic::BasicStrategy;
pub use hid::HidStrategy;
pub use input::InputDevicesStrategy;
pub use mock::{MockPresence, MockPresenceHandle};

use crate::config::MonitorConfig;
use crate::traits::{PresenceStrategy, ScannerPresence};
use kiosk_core::Result;
use kiosk_core::constants::GENERIC_HID_PATTERN;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Built-in strategies, in their default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Hid,
    InputDevices,
    Basic,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [Self::Hid, Self::InputDevices, Self::Basic];
}

/// Enum wrapper for presence strategy dispatch.
#[derive(Debug)]
pub enum AnyPresenceStrategy {
    Hid(HidStrategy),
    InputDevices(InputDevicesStrategy),
    Basic(BasicStrategy),
    Mock(MockPresence),
}

impl PresenceStrategy for AnyPresenceStrategy {
    fn name(&self) -> &'static str {
        match self {
            Self::Hid(s) => s.name(),
            Self::InputDevices(s) => s.name(),
            Self::Basic(s) => s.name(),
            Self::Mock(s) => s.name(),
        }
    }

    async fn detect(&self) -> Result<ScannerPresence> {
        match self {
            Self::Hid(s) => s.detect().await,
            Self::InputDevices(s) => s.detect().await,
            Self::Basic(s) => s.detect().await,
            Self::Mock(s) => s.detect().await,
        }
    }
}

/// Asks each strategy in turn until one reports a scanner.
#[derive(Debug)]
pub struct PresenceDetector {
    strategies: Vec<AnyPresenceStrategy>,
}

impl PresenceDetector {
    pub fn new(strategies: Vec<AnyPresenceStrategy>) -> Self {
        Self { strategies }
    }

    /// Build the enabled system strategies from the monitor configuration.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let strategies = config
            .strategies
            .iter()
            .map(|kind| match kind {
                StrategyKind::Hid => {
                    AnyPresenceStrategy::Hid(HidStrategy::new(config.name_patterns.clone()))
                }
                StrategyKind::InputDevices => AnyPresenceStrategy::InputDevices(
                    InputDevicesStrategy::new(&config.input_dir, config.name_patterns.clone()),
                ),
                StrategyKind::Basic => AnyPresenceStrategy::Basic(
                    BasicStrategy::new(
                        config.lsusb_command.clone(),
                        &config.input_dir,
                        config.name_patterns.clone(),
                    )
                    .with_timeout(config.lsusb_timeout),
                ),
            })
            .collect();

        Self::new(strategies)
    }

    pub fn strategies(&self) -> &[AnyPresenceStrategy] {
        &self.strategies
    }

    /// Run the strategies in order. Never fails: a strategy error only means
    /// that strategy did not see a scanner.
    pub async fn detect(&self) -> ScannerPresence {
        for strategy in &self.strategies {
            match strategy.detect().await {
                Ok(presence) if presence.present => return presence,
                Ok(_) => debug!("Strategy {} found no scanner", strategy.name()),
                Err(e) => warn!("Presence strategy {} failed: {}", strategy.name(), e),
            }
        }
        ScannerPresence::absent()
    }
}

/// How a device description matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMatch<'a> {
    /// Contains one of the scanner name fragments.
    Named(&'a str),
    /// Only looks like a generic HID device.
    GenericHid,
}

/// First pattern contained in `text`, case-insensitively.
pub fn match_pattern<'a>(text: &str, patterns: &'a [String]) -> Option<&'a str> {
    let text = text.to_lowercase();
    patterns
        .iter()
        .map(String::as_str)
        .find(|pattern| text.contains(&pattern.to_lowercase()))
}

/// Match a manufacturer/product pair, falling back to the loose `hid` match.
pub fn match_descriptor<'a>(
    manufacturer: &str,
    product: &str,
    patterns: &'a [String],
) -> Option<PatternMatch<'a>> {
    if let Some(pattern) =
        match_pattern(manufacturer, patterns).or_else(|| match_pattern(product, patterns))
    {
        return Some(PatternMatch::Named(pattern));
    }

    let generic = [manufacturer, product]
        .iter()
        .any(|s| s.to_lowercase().contains(GENERIC_HID_PATTERN));
    generic.then_some(PatternMatch::GenericHid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::constants::SCANNER_NAME_PATTERNS;
    use rstest::rstest;

    fn patterns() -> Vec<String> {
        SCANNER_NAME_PATTERNS.iter().map(|p| p.to_string()).collect()
    }

    #[rstest]
    #[case("Honeywell", "Imaging 1900", Some(PatternMatch::Named("honeywell")))]
    #[case("Newland", "Barcode Scanner", Some(PatternMatch::Named("scanner")))]
    #[case("Zebra Technologies", "DS2208", Some(PatternMatch::Named("zebra")))]
    #[case("Generic", "USB HID Keyboard", Some(PatternMatch::GenericHid))]
    #[case("Logitech", "USB Receiver", None)]
    fn test_match_descriptor(
        #[case] manufacturer: &str,
        #[case] product: &str,
        #[case] expected: Option<PatternMatch<'static>>,
    ) {
        let patterns = patterns();
        assert_eq!(match_descriptor(manufacturer, product, &patterns), expected);
    }

    #[tokio::test]
    async fn test_detector_stops_at_first_positive() {
        let (first, first_handle) = MockPresence::new();
        let (second, second_handle) = MockPresence::new();
        first_handle.set_present(true);
        second_handle.set_present(true);

        let detector = PresenceDetector::new(vec![
            AnyPresenceStrategy::Mock(first),
            AnyPresenceStrategy::Mock(second),
        ]);

        assert!(detector.detect().await.present);
        assert_eq!(first_handle.checks(), 1);
        assert_eq!(second_handle.checks(), 0);
    }

    #[tokio::test]
    async fn test_detector_swallows_failures() {
        let (failing, failing_handle) = MockPresence::new();
        let (present, present_handle) = MockPresence::new();
        failing_handle.set_failing(true);
        present_handle.set_present(true);
        present_handle.set_device(Some("/dev/input/event7"));

        let detector = PresenceDetector::new(vec![
            AnyPresenceStrategy::Mock(failing),
            AnyPresenceStrategy::Mock(present),
        ]);

        let presence = detector.detect().await;
        assert!(presence.present);
        assert_eq!(presence.device.as_deref(), Some("/dev/input/event7"));
    }

    #[tokio::test]
    async fn test_detector_all_absent() {
        let (absent, _handle) = MockPresence::new();
        let detector = PresenceDetector::new(vec![AnyPresenceStrategy::Mock(absent)]);
        assert_eq!(detector.detect().await, ScannerPresence::absent());

        let empty = PresenceDetector::new(vec![]);
        assert!(!empty.detect().await.present);
    }

    #[test]
    fn test_from_config_order() {
        let detector = PresenceDetector::from_config(&MonitorConfig::default());
        let names: Vec<_> = detector.strategies().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["hid", "input", "basic"]);
    }
}
