use calamine::{Data, Range};
use decel_report::{
    config::Input,
    error::ReportError,
    input::{load_rows, rows_from_range, InputRow},
};
use std::path::Path;

fn sheet(cells: &[&[Data]]) -> Range<Data> {
    let width = cells.iter().map(|r| r.len()).max().unwrap_or(1);
    let mut range = Range::new((0, 0), (cells.len() as u32 - 1, width as u32 - 1));
    for (r, row) in cells.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            range.set_value((r as u32, c as u32), cell.clone());
        }
    }
    range
}

fn s(v: &str) -> Data {
    Data::String(v.to_string())
}

fn f(v: f64) -> Data {
    Data::Float(v)
}

fn header() -> Vec<Data> {
    ["Meno", "Tím", "Pozícia", "Kategória", "ĽDK", "PDK"]
        .into_iter()
        .map(s)
        .collect()
}

#[test]
fn parses_full_rows() {
    let range = sheet(&[
        &header()[..],
        &[s("Ján Novák"), s("FK A"), s("Záložník"), s("U15"), f(9.0), f(10.0)],
        &[s("Peter"), s("FK B"), s("Obranca"), s("U17"), f(8.5), f(7.25)],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");

    assert_eq!(
        rows,
        vec![
            InputRow::new("Ján Novák", 9.0, 10.0)
                .with_team("FK A")
                .with_position("Záložník")
                .with_category("U15"),
            InputRow::new("Peter", 8.5, 7.25)
                .with_team("FK B")
                .with_position("Obranca")
                .with_category("U17"),
        ]
    );
    assert_eq!(
        rows[0].header_lines(),
        vec!["Ján Novák", "FK A", "Záložník", "U15"]
    );
}

#[test]
fn column_order_does_not_matter() {
    let range = sheet(&[
        &[s("PDK"), s("Kategória"), s("Meno"), s("ĽDK")],
        &[f(7.0), s("U15"), s("Anna"), f(8.0)],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");
    assert_eq!(rows, vec![InputRow::new("Anna", 8.0, 7.0).with_category("U15")]);
}

#[test]
fn missing_team_leaves_three_header_lines() {
    let range = sheet(&[
        &header()[..],
        &[s("Eva"), Data::Empty, s("Brankár"), s("U19"), f(8.0), f(8.4)],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");
    assert_eq!(rows[0].team, None);
    assert_eq!(rows[0].header_lines(), vec!["Eva", "Brankár", "U19"]);
}

#[test]
fn optional_columns_may_be_absent() {
    let range = sheet(&[
        &[s("Meno"), s("ĽDK"), s("PDK")],
        &[s("Eva"), f(8.0), f(8.4)],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");
    assert_eq!(rows, vec![InputRow::new("Eva", 8.0, 8.4)]);
    assert_eq!(rows[0].header_lines(), vec!["Eva"]);
}

#[test]
fn missing_required_column_is_reported() {
    let range = sheet(&[&[s("Meno"), s("ĽDK")], &[s("Eva"), f(8.0)]]);
    let err = rows_from_range(&range, &Input::default()).unwrap_err();
    match err {
        ReportError::MissingColumn(col) => assert_eq!(col, "PDK"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_rows_are_skipped() {
    let range = sheet(&[
        &header()[..],
        &[s("A"), s("T"), s("P"), s("U15"), f(9.0), f(9.5)],
        &[Data::Empty, Data::Empty, Data::Empty, Data::Empty, Data::Empty, Data::Empty],
        &[s("B"), s("T"), s("P"), s("U15"), f(8.0), f(8.5)],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn missing_value_names_spreadsheet_row() {
    let range = sheet(&[
        &header()[..],
        &[s("A"), s("T"), s("P"), s("U15"), f(9.0), f(9.5)],
        &[s("B"), s("T"), s("P"), s("U15"), f(8.0), Data::Empty],
    ]);
    let err = rows_from_range(&range, &Input::default()).unwrap_err();
    match err {
        ReportError::MissingValue { row, column } => {
            assert_eq!(row, 3);
            assert_eq!(column, "PDK");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn numeric_text_accepts_decimal_comma() {
    let range = sheet(&[
        &header()[..],
        &[s("A"), s("T"), s("P"), s("U15"), s("8,5"), s(" 9.25 ")],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");
    assert_eq!(rows[0].left_value, 8.5);
    assert_eq!(rows[0].right_value, 9.25);
}

#[test]
fn non_numeric_value_is_rejected() {
    let range = sheet(&[
        &header()[..],
        &[s("A"), s("T"), s("P"), s("U15"), s("fast"), f(9.0)],
    ]);
    let err = rows_from_range(&range, &Input::default()).unwrap_err();
    match err {
        ReportError::InvalidNumber { row, column, value } => {
            assert_eq!(row, 2);
            assert_eq!(column, "ĽDK");
            assert_eq!(value, "fast");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn numeric_category_reads_as_text() {
    let range = sheet(&[
        &header()[..],
        &[s("A"), s("T"), s("P"), f(15.0), Data::Int(9), f(9.5)],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");
    assert_eq!(rows[0].category.as_deref(), Some("15"));
    assert_eq!(rows[0].left_value, 9.0);
}

#[test]
fn decomposed_header_matches_configured_name() {
    let range = sheet(&[
        &[s("Meno"), s("L\u{30C}DK"), s("PDK")],
        &[s("A"), f(9.0), f(9.5)],
    ]);
    let rows = rows_from_range(&range, &Input::default()).expect("rows");
    assert_eq!(rows[0].left_value, 9.0);
}

#[test]
fn custom_column_names() {
    let cfg = Input {
        name_column: "Name".into(),
        left_column: "Left".into(),
        right_column: "Right".into(),
        ..Input::default()
    };
    let range = sheet(&[
        &[s("Name"), s("Left"), s("Right")],
        &[s("Joe"), f(7.0), f(7.7)],
    ]);
    let rows = rows_from_range(&range, &cfg).expect("rows");
    assert_eq!(rows, vec![InputRow::new("Joe", 7.0, 7.7)]);
}

#[test]
fn missing_spreadsheet_is_missing_input() {
    let path = Path::new("no/such/dir/athletes.xlsx");
    let err = load_rows(&Input::default(), path).unwrap_err();
    match err {
        ReportError::MissingInput { path: reported } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}
