//! Parsing of the memories history page shipped with an export.

use exn::ResultExt;
use scraper::{ElementRef, Html};
use time::macros::format_description;
use time::{PrimitiveDateTime, UtcDateTime};
use tracing::instrument;

use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Identifier, Location, MediaKind, MemoryRecord, RecordTable};

/// Parses every memory row of the history page into a [`RecordTable`].
///
/// Rows missing a capture date or a media identifier are skipped; they can't
/// be matched against anything on disk. Fails with
/// [`ErrorKind::InvalidDocument`] when the page contains no memory rows at
/// all, which usually means the wrong file was supplied.
#[instrument(skip(html), fields(html_size = html.len(), records))]
pub fn parse(html: &str) -> Result<RecordTable> {
    let document = Html::parse_document(html);
    let mut table = RecordTable::default();
    let mut rows = 0usize;
    for row in document.select(&consts::ROW_SELECTOR) {
        let markup = row.html();
        if !markup.contains(consts::DOWNLOAD_MARKER) {
            continue;
        }
        rows += 1;
        match self::record(&row, &markup) {
            Ok(Some((record, aliases))) => table.insert(record, aliases),
            Ok(None) => tracing::debug!(row = rows, "Memory row without identifier or date, skipping"),
            Err(e) => tracing::debug!(row = rows, error = %e, "Unparsable memory row, skipping"),
        }
    }
    if rows == 0 {
        exn::bail!(ErrorKind::InvalidDocument);
    }
    tracing::Span::current().record("records", table.len());
    Ok(table)
}

type ParsedRow = (MemoryRecord, Vec<Identifier>);

fn record(row: &ElementRef, markup: &str) -> Result<Option<ParsedRow>> {
    let cells: Vec<String> =
        row.select(&consts::CELL_SELECTOR).map(|cell| cell.text().collect::<String>().trim().to_string()).collect();
    let Some(identifier) = self::identifier(markup, &consts::PRIMARY_ID_REGEX) else {
        return Ok(None);
    };
    let Some(date) = cells.iter().find(|cell| consts::DATE_REGEX.is_match(cell)) else {
        return Ok(None);
    };
    let record = MemoryRecord {
        identifier: identifier.clone(),
        captured_at: self::captured_at(date)?,
        location: cells.iter().find_map(|cell| self::location(cell)),
        kind: cells.iter().find_map(|cell| cell.parse::<MediaKind>().ok()).unwrap_or_default(),
    };
    let aliases = self::identifier(markup, &consts::ALIAS_ID_REGEX).into_iter().filter(|alias| *alias != identifier);
    Ok(Some((record, aliases.collect())))
}

fn identifier(markup: &str, regex: &regex::Regex) -> Option<Identifier> {
    regex.captures(markup).and_then(|captures| captures.get(1)).map(|m| Identifier::new(m.as_str()))
}

/// Parses `YYYY-MM-DD HH:MM[:SS] UTC`.
pub(crate) fn captured_at(text: &str) -> Result<UtcDateTime> {
    let with_seconds = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    let without_seconds = format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    PrimitiveDateTime::parse(text, with_seconds)
        .or_else(|_| PrimitiveDateTime::parse(text, without_seconds))
        .map(|datetime| datetime.as_utc())
        .or_raise(|| ErrorKind::ParseError { field: "date", value: text.to_string() })
}

fn location(cell: &str) -> Option<Location> {
    let captures = consts::LOCATION_REGEX.captures(cell)?;
    let latitude = captures.get(1)?.as_str().parse::<f64>().ok()?;
    let longitude = captures.get(2)?.as_str().parse::<f64>().ok()?;
    Location::new(latitude, longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    const PRIMARY: &str = "3F2504E0-4F89-11D3-9A0C-0305E82C3301";
    const ALIAS: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    fn row(date: &str, kind: &str, location: &str, url: &str) -> String {
        format!(
            r#"<tr><td>{date}</td><td>{kind}</td><td>{location}</td>
            <td><a href="javascript:downloadMemories('{url}', this, true);">Download</a></td></tr>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><table><tr><th>Date</th><th>Media Type</th><th>Location</th><th></th></tr>{}</table></body></html>",
            rows.concat()
        )
    }

    #[test]
    fn parses_rows_and_aliases() {
        let url = format!("https://app.snapchat.com/dmd/memories?uid=1&sid={ALIAS}&mid={PRIMARY}&ts=1");
        let html = page(&[row("2024-01-15 14:30:25 UTC", "Video", "Latitude, Longitude: 37.7749, -122.4194", &url)]);

        let table = parse(&html).unwrap();
        assert_eq!(table.len(), 1);
        let record = table.lookup(PRIMARY).unwrap();
        assert_eq!(record.identifier.as_str(), PRIMARY.to_lowercase());
        assert_eq!(record.captured_at, datetime!(2024-01-15 14:30:25).as_utc());
        assert_eq!(record.kind, MediaKind::Video);
        assert_eq!(record.location, Location::new(37.7749, -122.4194));
        assert_eq!(table.lookup(&ALIAS.to_uppercase()), Some(record));
    }

    #[test]
    fn skips_rows_without_identifier() {
        let html = page(&[
            row("2024-01-15 14:30:25 UTC", "Image", "", "https://example.invalid/?nothing=here"),
            row("2024-01-16 09:00 UTC", "Image", "", &format!("https://example.invalid/?mid={PRIMARY}")),
        ]);

        let table = parse(&html).unwrap();
        assert_eq!(table.len(), 1);
        let record = table.lookup(PRIMARY).unwrap();
        assert_eq!(record.captured_at, datetime!(2024-01-16 09:00:00).as_utc());
        assert_eq!(record.location, None);
        assert_eq!(record.kind, MediaKind::Image);
    }

    #[test]
    fn rejects_pages_without_memories() {
        let err = parse("<html><body><p>Account info</p></body></html>").unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidDocument);
    }

    #[rstest]
    #[case("2024-01-15 14:30:25 UTC", datetime!(2024-01-15 14:30:25))]
    #[case("1999-12-31 23:59 UTC", datetime!(1999-12-31 23:59:00))]
    fn parses_dates(#[case] text: &str, #[case] expected: PrimitiveDateTime) {
        assert_eq!(captured_at(text).unwrap(), expected.as_utc());
    }

    #[rstest]
    #[case("2024-13-01 00:00 UTC")]
    #[case("yesterday")]
    fn rejects_dates(#[case] text: &str) {
        assert!(captured_at(text).is_err());
    }

    #[rstest]
    #[case("Latitude, Longitude: 37.7749, -122.4194", Location::new(37.7749, -122.4194))]
    #[case("Latitude, Longitude: -33, 151.2", Location::new(-33.0, 151.2))]
    #[case("Latitude, Longitude: 123.0, 0.0", None)]
    #[case("Video", None)]
    fn parses_locations(#[case] cell: &str, #[case] expected: Option<Location>) {
        assert_eq!(location(cell), expected);
    }
}
