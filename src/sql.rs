use chrono::{DateTime, Utc};
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::engine::AddOnKind;
use crate::model::*;

/// Read-only relations exposed over `SELECT * FROM ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Rotation,
    Technicians,
    Services,
    Bookings,
    Waiting,
    Reservations,
    Takings,
}

impl Table {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "rotation" => Some(Self::Rotation),
            "technicians" => Some(Self::Technicians),
            "services" => Some(Self::Services),
            "bookings" => Some(Self::Bookings),
            "waiting" => Some(Self::Waiting),
            "reservations" => Some(Self::Reservations),
            "takings" => Some(Self::Takings),
            _ => None,
        }
    }
}

/// Day-level procedures run with `CALL name()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    FlushWaiting,
    ApplyReservations,
    RefreshStatus,
    Tick,
    ResetDay,
}

impl Procedure {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "flush_waiting" => Some(Self::FlushWaiting),
            "apply_reservations" => Some(Self::ApplyReservations),
            "refresh_status" => Some(Self::RefreshStatus),
            "tick" => Some(Self::Tick),
            "reset_day" => Some(Self::ResetDay),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::FlushWaiting => "flush_waiting",
            Self::ApplyReservations => "apply_reservations",
            Self::RefreshStatus => "refresh_status",
            Self::Tick => "tick",
            Self::ResetDay => "reset_day",
        }
    }
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    CheckIn {
        name: String,
        check_in: Option<Timestamp>,
        tier: SkillTier,
    },
    RemoveTechnician {
        name: String,
    },
    UpsertService {
        name: String,
        minutes: u32,
        price: f64,
    },
    RemoveService {
        name: String,
    },
    Register {
        service: String,
        arrival: Option<Timestamp>,
        count: u32,
    },
    InsertReservation {
        customer: Option<String>,
        service: String,
        technician: String,
        start: Timestamp,
    },
    DeleteReservation {
        id: u64,
    },
    Extend {
        booking_id: u64,
        minutes: u32,
        price: Option<f64>,
    },
    AddOn {
        booking_id: u64,
        kind: AddOnKind,
        price: Option<f64>,
    },
    RecordPayment {
        booking_id: u64,
        payment: Payment,
    },
    DeleteBooking {
        id: u64,
    },
    DeleteWaiting {
        id: u64,
    },
    Select {
        table: Table,
    },
    SelectEligible {
        service: String,
        at: Option<Timestamp>,
    },
    Call {
        procedure: Procedure,
    },
    Listen {
        channel: String,
    },
    Unlisten {
        channel: String,
    },
    UnlistenAll,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    let upper = trimmed.to_uppercase();
    if upper.starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches('"').to_string();
        return Ok(Command::Listen { channel });
    }
    if upper == "UNLISTEN *" {
        return Ok(Command::UnlistenAll);
    }
    if upper.starts_with("UNLISTEN ") {
        let channel = trimmed[9..].trim().trim_matches('"').to_string();
        return Ok(Command::Unlisten { channel });
    }
    if upper.starts_with("CALL ") {
        return parse_call(&trimmed[5..]);
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_call(rest: &str) -> Result<Command, SqlError> {
    let name = rest
        .trim()
        .strip_suffix("()")
        .ok_or_else(|| SqlError::Parse(format!("expected CALL name(), got CALL {rest}")))?
        .trim()
        .to_lowercase();
    let procedure = Procedure::from_name(&name).ok_or(SqlError::UnknownProcedure(name))?;
    Ok(Command::Call { procedure })
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;

    match table.as_str() {
        "technicians" => {
            let row = Row::from_insert(insert, "technicians", &["name", "check_in", "tier"])?;
            let tier = match row.get("tier") {
                Some(e) => match parse_string_or_null(e)? {
                    Some(s) => SkillTier::from_id(&s).ok_or_else(|| SqlError::Parse(format!("unknown tier: {s}")))?,
                    None => SkillTier::Full,
                },
                None => SkillTier::Full,
            };
            Ok(Command::CheckIn {
                name: parse_string(row.required("name")?)?,
                check_in: row.get("check_in").map(parse_timestamp_or_null).transpose()?.flatten(),
                tier,
            })
        }
        "services" => {
            let row = Row::from_insert(insert, "services", &["name", "minutes", "price"])?;
            Ok(Command::UpsertService {
                name: parse_string(row.required("name")?)?,
                minutes: parse_u32(row.required("minutes")?)?,
                price: parse_f64(row.required("price")?)?,
            })
        }
        "customers" => {
            let row = Row::from_insert(insert, "customers", &["service", "arrival", "count"])?;
            Ok(Command::Register {
                service: parse_string(row.required("service")?)?,
                arrival: row.get("arrival").map(parse_timestamp_or_null).transpose()?.flatten(),
                count: row.get("count").map(parse_u32).transpose()?.unwrap_or(1),
            })
        }
        "reservations" => {
            let row = Row::from_insert(
                insert,
                "reservations",
                &["customer", "service", "technician", "start"],
            )?;
            Ok(Command::InsertReservation {
                customer: row.get("customer").map(parse_string_or_null).transpose()?.flatten(),
                service: parse_string(row.required("service")?)?,
                technician: parse_string(row.required("technician")?)?,
                start: parse_timestamp(row.required("start")?)?,
            })
        }
        "extensions" => {
            let row = Row::from_insert(insert, "extensions", &["booking_id", "minutes", "price"])?;
            Ok(Command::Extend {
                booking_id: parse_u64(row.required("booking_id")?)?,
                minutes: parse_u32(row.required("minutes")?)?,
                price: row.get("price").map(parse_f64_or_null).transpose()?.flatten(),
            })
        }
        "add_ons" => {
            let row = Row::from_insert(
                insert,
                "add_ons",
                &["booking_id", "minutes", "service", "price"],
            )?;
            let minutes = row.get("minutes").map(parse_u32_or_null).transpose()?.flatten();
            let service = row.get("service").map(parse_string_or_null).transpose()?.flatten();
            let kind = match (minutes, service) {
                (None, Some(s)) => AddOnKind::Service(s),
                (Some(m), None) => AddOnKind::Time(m),
                _ => {
                    return Err(SqlError::Parse(
                        "add_ons takes exactly one of minutes or service".into(),
                    ));
                }
            };
            Ok(Command::AddOn {
                booking_id: parse_u64(row.required("booking_id")?)?,
                kind,
                price: row.get("price").map(parse_f64_or_null).transpose()?.flatten(),
            })
        }
        "payments" => {
            let row = Row::from_insert(
                insert,
                "payments",
                &["booking_id", "cash", "transfer", "eftpos", "voucher", "note"],
            )?;
            let amount = |col: &str| -> Result<f64, SqlError> {
                Ok(row.get(col).map(parse_f64_or_null).transpose()?.flatten().unwrap_or(0.0))
            };
            Ok(Command::RecordPayment {
                booking_id: parse_u64(row.required("booking_id")?)?,
                payment: Payment {
                    cash: amount("cash")?,
                    transfer: amount("transfer")?,
                    eftpos: amount("eftpos")?,
                    voucher: amount("voucher")?,
                    note: row
                        .get("note")
                        .map(parse_string_or_null)
                        .transpose()?
                        .flatten()
                        .unwrap_or_default(),
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;

    match table.as_str() {
        "technicians" => Ok(Command::RemoveTechnician {
            name: parse_string(extract_where_eq(&delete.selection, "name")?)?,
        }),
        "services" => Ok(Command::RemoveService {
            name: parse_string(extract_where_eq(&delete.selection, "name")?)?,
        }),
        "reservations" => Ok(Command::DeleteReservation {
            id: parse_u64(extract_where_eq(&delete.selection, "id")?)?,
        }),
        "bookings" => Ok(Command::DeleteBooking {
            id: parse_u64(extract_where_eq(&delete.selection, "id")?)?,
        }),
        "waiting" => Ok(Command::DeleteWaiting {
            id: parse_u64(extract_where_eq(&delete.selection, "id")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    if table == "eligible" {
        let (mut service, mut at) = (None, None);
        if let Some(selection) = &select.selection {
            extract_eligible_filters(selection, &mut service, &mut at)?;
        }
        return Ok(Command::SelectEligible {
            service: service.ok_or(SqlError::MissingFilter("service"))?,
            at,
        });
    }

    let table = Table::from_name(&table).ok_or(SqlError::UnknownTable(table))?;
    Ok(Command::Select { table })
}

fn extract_eligible_filters(
    expr: &Expr,
    service: &mut Option<String>,
    at: &mut Option<Timestamp>,
) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                extract_eligible_filters(left, service, at)?;
                extract_eligible_filters(right, service, at)?;
            }
            ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                Some("service") => *service = Some(parse_string(right)?),
                Some("arrival") | Some("at") => *at = parse_timestamp_or_null(right)?,
                _ => {}
            },
            _ => {}
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

/// One VALUES row keyed by column name. Without a column list, values are
/// matched positionally against the table's default column order.
struct Row {
    table: &'static str,
    fields: Vec<(String, Expr)>,
}

impl Row {
    fn from_insert(
        insert: &ast::Insert,
        table: &'static str,
        default_columns: &[&str],
    ) -> Result<Self, SqlError> {
        let values = extract_insert_values(insert)?;
        let columns: Vec<String> = if insert.columns.is_empty() {
            default_columns.iter().map(|c| c.to_string()).collect()
        } else {
            insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
        };
        if values.len() > columns.len() || (!insert.columns.is_empty() && values.len() != columns.len()) {
            return Err(SqlError::WrongArity(table, columns.len(), values.len()));
        }
        if let Some(unknown) = columns.iter().find(|c| !default_columns.contains(&c.as_str())) {
            return Err(SqlError::UnknownColumn(table, unknown.clone()));
        }
        Ok(Self {
            table,
            fields: columns.into_iter().zip(values).collect(),
        })
    }

    fn get(&self, column: &str) -> Option<&Expr> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, e)| e)
    }

    fn required(&self, column: &'static str) -> Result<&Expr, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(self.table, column))
    }
}

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
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
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

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row VALUES".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_eq<'a>(selection: &'a Option<Expr>, column: &'static str) -> Result<&'a Expr, SqlError> {
    match selection.as_ref().ok_or(SqlError::MissingFilter(column))? {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some(column) => Ok(right),
        _ => Err(SqlError::MissingFilter(column)),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

/// Literal behind an expression, looking through casts like `'...'::timestamptz`.
fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        Expr::Cast { expr, .. } | Expr::Nested(expr) => extract_value(expr),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::DoubleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_string(expr).map(Some)
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number {s}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_f64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_f64_or_null(expr: &Expr) -> Result<Option<f64>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_f64(expr).map(Some)
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected integer, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_u32_or_null(expr: &Expr) -> Result<Option<u32>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_u32(expr).map(Some)
}

fn parse_u64(expr: &Expr) -> Result<u64, SqlError> {
    let v = parse_i64(expr)?;
    u64::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u64 range")))
}

/// RFC 3339 with any offset; stored as UTC.
fn parse_timestamp(expr: &Expr) -> Result<Timestamp, SqlError> {
    let s = parse_string(expr)?;
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SqlError::Parse(format!("bad timestamp {s}: {e}")))
}

fn parse_timestamp_or_null(expr: &Expr) -> Result<Option<Timestamp>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_timestamp(expr).map(Some)
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    UnknownProcedure(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::UnknownProcedure(p) => write!(f, "unknown procedure: {p}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing column {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
    }

    #[test]
    fn parse_check_in_with_columns() {
        let sql = "INSERT INTO technicians (name, tier, check_in) VALUES ('Pan', 'junior_basic', '2026-10-19T09:30:00Z')";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::CheckIn { name, check_in, tier } => {
                assert_eq!(name, "Pan");
                assert_eq!(check_in, Some(utc(9, 30)));
                assert_eq!(tier, SkillTier::JuniorBasic);
            }
            _ => panic!("expected CheckIn, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_check_in_defaults() {
        let cmd = parse_sql("INSERT INTO technicians (name) VALUES ('Iris')").unwrap();
        assert_eq!(
            cmd,
            Command::CheckIn {
                name: "Iris".into(),
                check_in: None,
                tier: SkillTier::Full,
            }
        );
    }

    #[test]
    fn parse_check_in_positional_with_offset() {
        let sql = "INSERT INTO technicians VALUES ('Ptr', '2026-10-19T20:00:00+11:00', NULL)";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::CheckIn { check_in, tier, .. } => {
                assert_eq!(check_in, Some(utc(9, 0)));
                assert_eq!(tier, SkillTier::Full);
            }
            _ => panic!("expected CheckIn, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_check_in_unknown_tier() {
        let sql = "INSERT INTO technicians (name, tier) VALUES ('Pan', 'apprentice')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_check_in_timestamp_cast() {
        let sql = "INSERT INTO technicians (name, check_in) VALUES ('Pan', '2026-10-19T09:30:00Z'::timestamptz)";
        match parse_sql(sql).unwrap() {
            Command::CheckIn { check_in, .. } => assert_eq!(check_in, Some(utc(9, 30))),
            cmd => panic!("expected CheckIn, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_delete_technician() {
        let cmd = parse_sql("DELETE FROM technicians WHERE name = 'Pan'").unwrap();
        assert_eq!(cmd, Command::RemoveTechnician { name: "Pan".into() });
    }

    #[test]
    fn parse_upsert_service() {
        let sql = "INSERT INTO services (name, minutes, price) VALUES ('NSHe (45 mins)', 45, 75.5)";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::UpsertService {
                name: "NSHe (45 mins)".into(),
                minutes: 45,
                price: 75.5,
            }
        );
    }

    #[test]
    fn parse_service_missing_price() {
        let sql = "INSERT INTO services (name, minutes) VALUES ('NS (30 mins)', 30)";
        assert!(matches!(
            parse_sql(sql),
            Err(SqlError::MissingColumn("services", "price"))
        ));
    }

    #[test]
    fn parse_delete_service() {
        let cmd = parse_sql("DELETE FROM services WHERE name = 'NS (30 mins)'").unwrap();
        assert_eq!(cmd, Command::RemoveService { name: "NS (30 mins)".into() });
    }

    #[test]
    fn parse_register_defaults_to_one_now() {
        let cmd = parse_sql("INSERT INTO customers (service) VALUES ('NS (30 mins)')").unwrap();
        assert_eq!(
            cmd,
            Command::Register {
                service: "NS (30 mins)".into(),
                arrival: None,
                count: 1,
            }
        );
    }

    #[test]
    fn parse_register_group() {
        let sql = "INSERT INTO customers (service, arrival, count) VALUES ('F(R) (30 mins)', '2026-10-19T10:00:00Z', 3)";
        match parse_sql(sql).unwrap() {
            Command::Register { arrival, count, .. } => {
                assert_eq!(arrival, Some(utc(10, 0)));
                assert_eq!(count, 3);
            }
            cmd => panic!("expected Register, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_register_negative_count() {
        let sql = "INSERT INTO customers (service, count) VALUES ('NS (30 mins)', -2)";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_insert_reservation() {
        let sql = "INSERT INTO reservations (service, technician, start) VALUES ('NS (30 mins)', 'Iris', '2026-10-19T14:00:00Z')";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::InsertReservation {
                customer: None,
                service: "NS (30 mins)".into(),
                technician: "Iris".into(),
                start: utc(14, 0),
            }
        );
    }

    #[test]
    fn parse_insert_reservation_bad_timestamp() {
        let sql = "INSERT INTO reservations (service, technician, start) VALUES ('NS (30 mins)', 'Iris', '2pm')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_delete_reservation() {
        let cmd = parse_sql("DELETE FROM reservations WHERE id = 4").unwrap();
        assert_eq!(cmd, Command::DeleteReservation { id: 4 });
    }

    #[test]
    fn parse_extend_with_and_without_price() {
        let cmd = parse_sql("INSERT INTO extensions (booking_id, minutes) VALUES (7, 15)").unwrap();
        assert_eq!(
            cmd,
            Command::Extend {
                booking_id: 7,
                minutes: 15,
                price: None,
            }
        );
        let cmd = parse_sql("INSERT INTO extensions VALUES ('7', '15', '90')").unwrap();
        assert_eq!(
            cmd,
            Command::Extend {
                booking_id: 7,
                minutes: 15,
                price: Some(90.0),
            }
        );
    }

    #[test]
    fn parse_add_on_kinds() {
        let cmd = parse_sql("INSERT INTO add_ons (booking_id, minutes) VALUES (2, 10)").unwrap();
        assert_eq!(
            cmd,
            Command::AddOn {
                booking_id: 2,
                kind: AddOnKind::Time(10),
                price: None,
            }
        );
        let cmd = parse_sql("INSERT INTO add_ons (booking_id, service) VALUES (2, 'F(R) (30 mins)')").unwrap();
        assert_eq!(
            cmd,
            Command::AddOn {
                booking_id: 2,
                kind: AddOnKind::Service("F(R) (30 mins)".into()),
                price: None,
            }
        );
    }

    #[test]
    fn parse_add_on_needs_exactly_one_kind() {
        let both = "INSERT INTO add_ons (booking_id, minutes, service) VALUES (2, 10, 'NS (30 mins)')";
        assert!(matches!(parse_sql(both), Err(SqlError::Parse(_))));
        let neither = "INSERT INTO add_ons (booking_id) VALUES (2)";
        assert!(matches!(parse_sql(neither), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_payment() {
        let sql = "INSERT INTO payments (booking_id, cash, eftpos, note) VALUES (3, 20, 55.5, 'split')";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::RecordPayment { booking_id, payment } => {
                assert_eq!(booking_id, 3);
                assert_eq!(payment.cash, 20.0);
                assert_eq!(payment.transfer, 0.0);
                assert_eq!(payment.eftpos, 55.5);
                assert_eq!(payment.note, "split");
            }
            _ => panic!("expected RecordPayment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_deletes_by_id() {
        assert_eq!(
            parse_sql("DELETE FROM bookings WHERE id = 12").unwrap(),
            Command::DeleteBooking { id: 12 }
        );
        assert_eq!(
            parse_sql("DELETE FROM waiting WHERE id = '5'").unwrap(),
            Command::DeleteWaiting { id: 5 }
        );
    }

    #[test]
    fn parse_delete_without_filter() {
        assert!(matches!(
            parse_sql("DELETE FROM bookings"),
            Err(SqlError::MissingFilter("id"))
        ));
        assert!(matches!(
            parse_sql("DELETE FROM technicians WHERE id = 1"),
            Err(SqlError::MissingFilter("name"))
        ));
    }

    #[test]
    fn parse_selects() {
        for (sql, table) in [
            ("SELECT * FROM rotation", Table::Rotation),
            ("SELECT * FROM technicians", Table::Technicians),
            ("SELECT * FROM services", Table::Services),
            ("SELECT * FROM bookings", Table::Bookings),
            ("SELECT * FROM waiting", Table::Waiting),
            ("SELECT * FROM reservations", Table::Reservations),
            ("select * from TAKINGS", Table::Takings),
        ] {
            assert_eq!(parse_sql(sql).unwrap(), Command::Select { table }, "{sql}");
        }
    }

    #[test]
    fn parse_select_eligible() {
        let sql = "SELECT * FROM eligible WHERE service = 'NS (30 mins)' AND arrival = '2026-10-19T11:00:00Z'";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::SelectEligible {
                service: "NS (30 mins)".into(),
                at: Some(utc(11, 0)),
            }
        );
    }

    #[test]
    fn parse_select_eligible_missing_service() {
        assert!(matches!(
            parse_sql("SELECT * FROM eligible"),
            Err(SqlError::MissingFilter("service"))
        ));
    }

    #[test]
    fn parse_calls() {
        assert_eq!(
            parse_sql("CALL flush_waiting()").unwrap(),
            Command::Call { procedure: Procedure::FlushWaiting }
        );
        assert_eq!(
            parse_sql("call TICK();").unwrap(),
            Command::Call { procedure: Procedure::Tick }
        );
        assert!(matches!(
            parse_sql("CALL vacuum()"),
            Err(SqlError::UnknownProcedure(_))
        ));
        assert!(matches!(parse_sql("CALL tick"), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_listen() {
        let cmd = parse_sql("LISTEN technician_Pan").unwrap();
        assert_eq!(cmd, Command::Listen { channel: "technician_Pan".into() });
        assert_eq!(parse_sql("UNLISTEN *").unwrap(), Command::UnlistenAll);
        assert_eq!(
            parse_sql("UNLISTEN technician_Pan;").unwrap(),
            Command::Unlisten { channel: "technician_Pan".into() }
        );
    }

    #[test]
    fn parse_unknown_table() {
        assert!(matches!(
            parse_sql("SELECT * FROM holds"),
            Err(SqlError::UnknownTable(_))
        ));
        assert!(matches!(
            parse_sql("INSERT INTO holds VALUES (1)"),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_unknown_column_and_arity() {
        assert!(matches!(
            parse_sql("INSERT INTO services (name, colour) VALUES ('NS', 'red')"),
            Err(SqlError::UnknownColumn("services", _))
        ));
        assert!(matches!(
            parse_sql("INSERT INTO extensions VALUES (1, 2, 3, 4)"),
            Err(SqlError::WrongArity("extensions", 3, 4))
        ));
    }

    #[test]
    fn parse_garbage() {
        assert!(matches!(parse_sql("NOT SQL AT ALL"), Err(SqlError::Parse(_))));
        assert!(matches!(parse_sql("UPDATE bookings SET price = 1"), Err(SqlError::Unsupported(_))));
    }
}
