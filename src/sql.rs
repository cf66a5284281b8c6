use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::calendar;
use crate::model::*;

/// Parsed statement.
#[derive(Debug, PartialEq)]
pub enum Command {
    CreateDefaultSchedule {
        club_id: Ulid,
    },
    SetDailyHours {
        club_id: Ulid,
        hours: DailyHours,
    },
    DeleteSchedule {
        club_id: Ulid,
    },
    SelectSchedule {
        club_id: Ulid,
    },
    SaveCourt {
        court: Court,
    },
    DeleteCourt {
        id: Ulid,
    },
    SelectCourts {
        club_id: Ulid,
    },
    /// The booker is the session's user, never a column.
    InsertBooking {
        club_id: Ulid,
        court_id: Ulid,
        start_time: String,
        status: Option<BookingStatus>,
        match_type: Option<MatchType>,
        game_type: Option<GameType>,
        is_private: bool,
        needs_players: bool,
    },
    UpdateBooking {
        id: Ulid,
        patch: BookingPatch,
    },
    DeleteBooking {
        id: Ulid,
    },
    SelectBookings {
        filter: BookingFilter,
    },
    /// `date` is passed through unparsed; the engine validates it.
    SelectAvailability {
        club_id: Ulid,
        date: String,
    },
}

/// Parse every statement of a query string. Nothing is returned unless all
/// of them parse.
pub fn parse_sql(sql: &str) -> Result<Vec<Command>, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    stmts.iter().map(parse_statement).collect()
}

/// Parse a query string holding exactly one statement, as a prepared
/// statement must.
pub fn parse_single(sql: &str) -> Result<Command, SqlError> {
    let mut commands = parse_sql(sql)?;
    if commands.len() > 1 {
        return Err(SqlError::MultipleStatements(commands.len()));
    }
    commands.pop().ok_or(SqlError::Empty)
}

fn parse_statement(stmt: &Statement) -> Result<Command, SqlError> {
    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Positional values with optional trailing columns.
struct Row<'a> {
    values: &'a [Expr],
}

impl<'a> Row<'a> {
    fn new(table: &'static str, values: &'a [Expr], required: usize) -> Result<Self, SqlError> {
        if values.len() < required {
            return Err(SqlError::WrongArity(table, required, values.len()));
        }
        Ok(Self { values })
    }

    fn get(&self, i: usize) -> &'a Expr {
        &self.values[i]
    }

    /// `None` when the column is absent or NULL.
    fn optional(&self, i: usize) -> Option<&'a Expr> {
        self.values.get(i).filter(|e| !is_null(e))
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "schedules" => {
            let row = Row::new("schedules", &values, 1)?;
            Ok(Command::CreateDefaultSchedule {
                club_id: parse_ulid(row.get(0))?,
            })
        }
        "hours" => {
            let row = Row::new("hours", &values, 3)?;
            let day = parse_i64(row.get(1))?;
            let day_of_week =
                u8::try_from(day).map_err(|_| SqlError::Parse(format!("day_of_week out of range: {day}")))?;
            Ok(Command::SetDailyHours {
                club_id: parse_ulid(row.get(0))?,
                hours: DailyHours {
                    day_of_week,
                    is_open: parse_bool(row.get(2))?,
                    open_time: row.optional(3).map(parse_string).transpose()?,
                    close_time: row.optional(4).map(parse_string).transpose()?,
                    slot_duration_minutes: row.optional(5).map(parse_u32).transpose()?,
                },
            })
        }
        "courts" => {
            let row = Row::new("courts", &values, 4)?;
            let type_name = parse_string(row.get(3))?;
            Ok(Command::SaveCourt {
                court: Court {
                    id: parse_ulid(row.get(0))?,
                    club_id: parse_ulid(row.get(1))?,
                    name: parse_string(row.get(2))?,
                    court_type: CourtType::from_name(&type_name)
                        .ok_or(SqlError::BadEnum("court type", type_name))?,
                    is_active: row.optional(4).map(parse_bool).transpose()?.unwrap_or(true),
                },
            })
        }
        "bookings" => {
            let row = Row::new("bookings", &values, 3)?;
            Ok(Command::InsertBooking {
                club_id: parse_ulid(row.get(0))?,
                court_id: parse_ulid(row.get(1))?,
                start_time: parse_string(row.get(2))?,
                status: row.optional(3).map(parse_status).transpose()?,
                match_type: row.optional(4).map(parse_match_type).transpose()?,
                game_type: row.optional(5).map(parse_game_type).transpose()?,
                is_private: row.optional(6).map(parse_bool).transpose()?.unwrap_or(false),
                needs_players: row.optional(7).map(parse_bool).transpose()?.unwrap_or(false),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    if table != "bookings" {
        return Err(SqlError::UnknownTable(table));
    }
    let id = extract_where_id(selection)?;

    let mut patch = BookingPatch::default();
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name),
            AssignmentTarget::Tuple(_) => None,
        }
        .ok_or_else(|| SqlError::Unsupported("tuple assignment".into()))?;
        let value = &assignment.value;
        match column.as_str() {
            "status" => patch.status = Some(parse_status(value)?),
            "match_type" => patch.match_type = Some(parse_match_type(value)?),
            "game_type" => patch.game_type = Some(parse_game_type(value)?),
            "is_private" => patch.is_private = Some(parse_bool(value)?),
            "needs_players" => patch.needs_players = Some(parse_bool(value)?),
            "club_id" | "court_id" | "start_time" | "end_time" | "user_id" | "id" => {
                return Err(SqlError::ReadOnlyColumn(column));
            }
            _ => return Err(SqlError::UnknownColumn(column)),
        }
    }
    Ok(Command::UpdateBooking { id, patch })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    match table.as_str() {
        "schedules" => Ok(Command::DeleteSchedule {
            club_id: required_filter(&delete.selection, "club_id")?,
        }),
        "courts" => Ok(Command::DeleteCourt {
            id: extract_where_id(&delete.selection)?,
        }),
        "bookings" => Ok(Command::DeleteBooking {
            id: extract_where_id(&delete.selection)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut filters)?;
    }
    let filter = |col: &str| filters.iter().find(|(c, _)| c == col).map(|(_, e)| e);
    let club_id = || -> Result<Ulid, SqlError> {
        filter("club_id").ok_or(SqlError::MissingFilter("club_id")).and_then(parse_ulid)
    };

    match table.as_str() {
        "availability" => Ok(Command::SelectAvailability {
            club_id: club_id()?,
            date: filter("date")
                .ok_or(SqlError::MissingFilter("date"))
                .and_then(parse_string)?,
        }),
        "courts" => Ok(Command::SelectCourts { club_id: club_id()? }),
        "hours" => Ok(Command::SelectSchedule { club_id: club_id()? }),
        "bookings" => {
            let date = filter("date")
                .map(|e| {
                    let s = parse_string(e)?;
                    calendar::parse_date(&s).ok_or_else(|| SqlError::Parse(format!("bad date: {s}")))
                })
                .transpose()?;
            Ok(Command::SelectBookings {
                filter: BookingFilter {
                    club_id: filter("club_id").map(parse_ulid).transpose()?,
                    court_id: filter("court_id").map(parse_ulid).transpose()?,
                    user_id: filter("user_id").map(parse_string).transpose()?,
                    date,
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = x AND b = y AND ...` into `(column, value)` pairs.
fn collect_eq_filters(expr: &Expr, out: &mut Vec<(String, Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq_filters(left, out)?;
            collect_eq_filters(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((col, right.as_ref().clone()));
            Ok(())
        }
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

/// The single VALUES row of an INSERT.
fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [row] => Ok(row.clone()),
            [] => Err(SqlError::Parse("empty VALUES".into())),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn required_filter(selection: &Option<Expr>, column: &'static str) -> Result<Ulid, SqlError> {
    let mut filters = Vec::new();
    if let Some(sel) = selection {
        collect_eq_filters(sel, &mut filters)?;
    }
    match filters.as_slice() {
        [(col, value)] if col == column => parse_ulid(value),
        _ => Err(SqlError::MissingFilter(column)),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    required_filter(selection, "id")
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID {s:?}: {e}")))
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(s, _) | Value::SingleQuotedString(s)) => {
            s.parse().map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}")))
        }
        Some(value) => Err(SqlError::Parse(format!("expected number, got {value}"))),
        None => match expr {
            Expr::UnaryOp {
                op: ast::UnaryOperator::Minus,
                expr,
            } => Ok(-parse_i64(expr)?),
            _ => Err(SqlError::Parse(format!("expected value, got {expr}"))),
        },
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    match extract_value(expr) {
        Some(Value::Boolean(b)) => Ok(*b),
        Some(Value::SingleQuotedString(s)) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
        },
        Some(Value::Number(n, _)) => Ok(n != "0"),
        Some(value) => Err(SqlError::Parse(format!("expected bool, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_status(expr: &Expr) -> Result<BookingStatus, SqlError> {
    let s = parse_string(expr)?;
    BookingStatus::from_name(&s).ok_or(SqlError::BadEnum("booking status", s))
}

fn parse_match_type(expr: &Expr) -> Result<MatchType, SqlError> {
    let s = parse_string(expr)?;
    MatchType::from_name(&s).ok_or(SqlError::BadEnum("match type", s))
}

fn parse_game_type(expr: &Expr) -> Result<GameType, SqlError> {
    let s = parse_string(expr)?;
    GameType::from_name(&s).ok_or(SqlError::BadEnum("game type", s))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    MultipleStatements(usize),
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    ReadOnlyColumn(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    BadEnum(&'static str, String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::MultipleStatements(n) => write!(f, "expected one statement, got {n}"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::ReadOnlyColumn(c) => write!(f, "column cannot be updated: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected at least {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::BadEnum(kind, value) => write!(f, "unknown {kind}: {value}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUB: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const COURT: &str = "01BX5ZZKBKACTAV9WEVGEMMVRY";

    fn ulid(s: &str) -> Ulid {
        Ulid::from_string(s).unwrap()
    }

    #[test]
    fn default_schedule() {
        let cmd = parse_single(&format!("INSERT INTO schedules (club_id) VALUES ('{CLUB}')")).unwrap();
        assert_eq!(cmd, Command::CreateDefaultSchedule { club_id: ulid(CLUB) });
    }

    #[test]
    fn daily_hours_open_and_closed() {
        let sql = format!(
            "INSERT INTO hours (club_id, day_of_week, is_open, open_time, close_time, slot_duration_minutes) \
             VALUES ('{CLUB}', 2, true, '08:00', '22:00', 60)"
        );
        assert_eq!(
            parse_single(&sql).unwrap(),
            Command::SetDailyHours {
                club_id: ulid(CLUB),
                hours: DailyHours::open(2, "08:00", "22:00", 60),
            }
        );

        let sql = format!("INSERT INTO hours (club_id, day_of_week, is_open) VALUES ('{CLUB}', 0, false)");
        assert_eq!(
            parse_single(&sql).unwrap(),
            Command::SetDailyHours {
                club_id: ulid(CLUB),
                hours: DailyHours::closed(0),
            }
        );

        let sql = format!("INSERT INTO hours (club_id, day_of_week, is_open) VALUES ('{CLUB}', -1, false)");
        assert!(matches!(parse_single(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn court_insert_defaults_to_active() {
        let sql = format!(
            "INSERT INTO courts (id, club_id, name, type) VALUES ('{COURT}', '{CLUB}', 'Center', 'outdoor_glass')"
        );
        let Command::SaveCourt { court } = parse_single(&sql).unwrap() else {
            panic!("expected SaveCourt");
        };
        assert_eq!(court.id, ulid(COURT));
        assert_eq!(court.club_id, ulid(CLUB));
        assert_eq!(court.name, "Center");
        assert_eq!(court.court_type, CourtType::OutdoorGlass);
        assert!(court.is_active);

        let sql = format!(
            "INSERT INTO courts (id, club_id, name, type, is_active) VALUES ('{COURT}', '{CLUB}', 'X', 'clay', false)"
        );
        assert!(matches!(parse_single(&sql), Err(SqlError::BadEnum("court type", _))));
    }

    #[test]
    fn booking_insert_with_and_without_status() {
        let sql = format!(
            "INSERT INTO bookings (club_id, court_id, start_time) VALUES ('{CLUB}', '{COURT}', '2025-03-12T17:00:00Z')"
        );
        assert_eq!(
            parse_single(&sql).unwrap(),
            Command::InsertBooking {
                club_id: ulid(CLUB),
                court_id: ulid(COURT),
                start_time: "2025-03-12T17:00:00Z".into(),
                status: None,
                match_type: None,
                game_type: None,
                is_private: false,
                needs_players: false,
            }
        );

        let sql = format!(
            "INSERT INTO bookings (club_id, court_id, start_time, status, match_type, game_type, is_private) \
             VALUES ('{CLUB}', '{COURT}', '2025-03-12T17:00:00Z', 'CONFIRMED', NULL, 'mixed', true)"
        );
        let Command::InsertBooking {
            status,
            match_type,
            game_type,
            is_private,
            ..
        } = parse_single(&sql).unwrap()
        else {
            panic!("expected InsertBooking");
        };
        assert_eq!(status, Some(BookingStatus::Confirmed));
        assert_eq!(match_type, None);
        assert_eq!(game_type, Some(GameType::Mixed));
        assert!(is_private);
    }

    #[test]
    fn booking_insert_needs_three_values() {
        let sql = format!("INSERT INTO bookings (club_id, court_id) VALUES ('{CLUB}', '{COURT}')");
        assert!(matches!(parse_single(&sql), Err(SqlError::WrongArity("bookings", 3, 2))));
    }

    #[test]
    fn booking_update_builds_a_patch() {
        let sql = format!(
            "UPDATE bookings SET status = 'cancelled_by_admin', needs_players = true WHERE id = '{COURT}'"
        );
        assert_eq!(
            parse_single(&sql).unwrap(),
            Command::UpdateBooking {
                id: ulid(COURT),
                patch: BookingPatch {
                    status: Some(BookingStatus::CancelledByAdmin),
                    needs_players: Some(true),
                    ..BookingPatch::default()
                },
            }
        );
    }

    #[test]
    fn booking_update_rejects_fixed_columns() {
        let sql = format!("UPDATE bookings SET start_time = '2025-03-12T18:00:00Z' WHERE id = '{COURT}'");
        assert!(matches!(parse_single(&sql), Err(SqlError::ReadOnlyColumn(c)) if c == "start_time"));
        let sql = format!("UPDATE courts SET name = 'x' WHERE id = '{COURT}'");
        assert!(matches!(parse_single(&sql), Err(SqlError::UnknownTable(_))));
        let sql = "UPDATE bookings SET status = 'confirmed'";
        assert!(matches!(parse_single(sql), Err(SqlError::MissingFilter("id"))));
    }

    #[test]
    fn deletes() {
        assert_eq!(
            parse_single(&format!("DELETE FROM schedules WHERE club_id = '{CLUB}'")).unwrap(),
            Command::DeleteSchedule { club_id: ulid(CLUB) }
        );
        assert_eq!(
            parse_single(&format!("DELETE FROM courts WHERE id = '{COURT}'")).unwrap(),
            Command::DeleteCourt { id: ulid(COURT) }
        );
        assert_eq!(
            parse_single(&format!("DELETE FROM bookings WHERE id = '{COURT}'")).unwrap(),
            Command::DeleteBooking { id: ulid(COURT) }
        );
        assert!(matches!(
            parse_single(&format!("DELETE FROM bookings WHERE club_id = '{CLUB}'")),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn availability_select() {
        let sql = format!("SELECT * FROM availability WHERE club_id = '{CLUB}' AND date = '2025-03-12'");
        assert_eq!(
            parse_single(&sql).unwrap(),
            Command::SelectAvailability {
                club_id: ulid(CLUB),
                date: "2025-03-12".into(),
            }
        );
        let sql = format!("SELECT * FROM availability WHERE club_id = '{CLUB}'");
        assert!(matches!(parse_single(&sql), Err(SqlError::MissingFilter("date"))));
    }

    #[test]
    fn booking_select_filters() {
        assert_eq!(
            parse_single("SELECT * FROM bookings").unwrap(),
            Command::SelectBookings {
                filter: BookingFilter::default(),
            }
        );
        let sql = format!(
            "SELECT * FROM bookings WHERE court_id = '{COURT}' AND user_id = 'auth0|alice' AND date = '2025-03-12'"
        );
        assert_eq!(
            parse_single(&sql).unwrap(),
            Command::SelectBookings {
                filter: BookingFilter {
                    club_id: None,
                    court_id: Some(ulid(COURT)),
                    user_id: Some("auth0|alice".into()),
                    date: calendar::parse_date("2025-03-12"),
                },
            }
        );
        assert!(parse_single("SELECT * FROM bookings WHERE date = '12-03-2025'").is_err());
        assert!(matches!(
            parse_single("SELECT * FROM bookings WHERE start_time > 5"),
            Err(SqlError::Unsupported(_))
        ));
    }

    #[test]
    fn court_and_hours_selects() {
        assert_eq!(
            parse_single(&format!("SELECT * FROM courts WHERE club_id = '{CLUB}'")).unwrap(),
            Command::SelectCourts { club_id: ulid(CLUB) }
        );
        assert_eq!(
            parse_single(&format!("SELECT * FROM hours WHERE club_id = '{CLUB}'")).unwrap(),
            Command::SelectSchedule { club_id: ulid(CLUB) }
        );
    }

    #[test]
    fn errors() {
        assert!(matches!(parse_single(""), Err(SqlError::Empty)));
        assert!(matches!(
            parse_single(&format!("INSERT INTO rackets (id) VALUES ('{CLUB}')")),
            Err(SqlError::UnknownTable(_))
        ));
        assert!(matches!(
            parse_single("INSERT INTO schedules (club_id) VALUES ('not-a-ulid')"),
            Err(SqlError::Parse(_))
        ));
        assert!(matches!(parse_single("SELEKT 1"), Err(SqlError::Parse(_))));
    }

    #[test]
    fn every_statement_of_a_batch_is_parsed() {
        let sql = format!(
            "INSERT INTO schedules (club_id) VALUES ('{CLUB}'); \
             INSERT INTO courts (id, club_id, name, type) VALUES ('{COURT}', '{CLUB}', 'Center', 'indoor_glass');"
        );
        let commands = parse_sql(&sql).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], Command::CreateDefaultSchedule { club_id: ulid(CLUB) });
        assert!(matches!(&commands[1], Command::SaveCourt { court } if court.id == ulid(COURT)));
    }

    #[test]
    fn a_bad_statement_rejects_the_whole_batch() {
        let sql = format!("INSERT INTO schedules (club_id) VALUES ('{CLUB}'); DELETE FROM rackets WHERE id = '{CLUB}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn prepared_statements_hold_one_statement() {
        let sql = format!("SELECT * FROM courts WHERE club_id = '{CLUB}'; SELECT * FROM courts WHERE club_id = '{CLUB}'");
        assert!(matches!(parse_single(&sql), Err(SqlError::MultipleStatements(2))));
    }
}
