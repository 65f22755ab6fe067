use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

selector!(ROW_SELECTOR, "tr");
selector!(CELL_SELECTOR, "td");
// Every memory row carries a javascript download call; header rows don't.
pub(crate) const DOWNLOAD_MARKER: &str = "downloadMemories(";
regex!(DATE_REGEX, r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}(?::\d{2})? UTC$");
regex!(LOCATION_REGEX, r"Latitude, Longitude:\s*(-?\d+(?:\.\d+)?),\s*(-?\d+(?:\.\d+)?)");
regex!(PRIMARY_ID_REGEX, r"\bmid=([0-9a-fA-F-]{36})");
regex!(ALIAS_ID_REGEX, r"\bsid=([0-9a-fA-F-]{36})");
