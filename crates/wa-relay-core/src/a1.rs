// wa-relay: A1 Notation
// Builds the range expressions the Sheets values API is addressed with.

/// Column letters for a zero-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Sheet name as it must appear before `!`. Names with anything beyond
/// ASCII alphanumerics and `_` are single-quoted with inner quotes doubled.
pub fn quote_sheet(sheet: &str) -> String {
    let plain = !sheet.is_empty()
        && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

/// Whole-sheet range (the API returns the used area).
pub fn sheet_range(sheet: &str) -> String {
    quote_sheet(sheet)
}

/// First row only, unbounded width.
pub fn header_range(sheet: &str) -> String {
    format!("{}!1:1", quote_sheet(sheet))
}

/// Anchor for appends; the API finds the end of the table from here.
pub fn append_anchor(sheet: &str) -> String {
    format!("{}!A1", quote_sheet(sheet))
}

/// Exact range covering `width` cells of the zero-based `row_index`.
pub fn row_range(sheet: &str, row_index: usize, width: usize) -> String {
    let row_number = row_index + 1;
    let last = column_letter(width.max(1) - 1);
    format!("{}!A{}:{}{}", quote_sheet(sheet), row_number, last, row_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(6), "G");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_quote_sheet() {
        assert_eq!(quote_sheet("Hoja1"), "Hoja1");
        assert_eq!(quote_sheet("Envíos Masivos"), "'Envíos Masivos'");
        assert_eq!(quote_sheet("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_row_range() {
        assert_eq!(row_range("Estados", 0, 9), "Estados!A1:I1");
        assert_eq!(row_range("Hoja1", 4, 3), "Hoja1!A5:C5");
        assert_eq!(row_range("Hoja1", 1, 30), "Hoja1!A2:AD2");
    }

    #[test]
    fn test_header_and_anchor_ranges() {
        assert_eq!(header_range("Respuestas"), "Respuestas!1:1");
        assert_eq!(append_anchor("Mis Datos"), "'Mis Datos'!A1");
        assert_eq!(sheet_range("Hoja1"), "Hoja1");
    }
}
