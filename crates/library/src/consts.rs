use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

/// Role suffixes in the vendor's naming convention, matched on lower-cased
/// file names.
pub(crate) const MAIN_SUFFIX: &str = "-main";
pub(crate) const OVERLAY_SUFFIX: &str = "-overlay.png";
/// Marker some tool versions add to already-composited outputs.
pub(crate) const COMBINED_MARKER: &str = "_combined.";

// `<identifier>[_suffix].<ext>`, matched against lower-cased output names.
regex!(OUTPUT_NAME_REGEX, r"^([0-9a-z-]+?)(?:_[0-9a-z]+)?\.(jpg|png|mp4)$");
