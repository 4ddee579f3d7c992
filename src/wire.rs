use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::RotaAuthSource;
use crate::days::DayManager;
use crate::engine::Engine;
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, Procedure, Table};

pub struct RotaHandler {
    days: Arc<DayManager>,
    query_parser: Arc<RotaQueryParser>,
}

impl RotaHandler {
    pub fn new(days: Arc<DayManager>) -> Self {
        Self {
            days,
            query_parser: Arc::new(RotaQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "today".to_string());
        self.days.get_or_create(&db).map_err(|e| {
            metrics::counter!(observability::DAY_RESOLUTION_FAILURES_TOTAL).increment(1);
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("day error: {e}"),
            )))
        })
    }

    /// Parse, run and record one statement.
    async fn run(
        &self,
        engine: &Engine,
        sql: &str,
        format: Option<&Format>,
    ) -> PgWireResult<Vec<Response>> {
        let cmd = sql::parse_sql(sql).map_err(|e| {
            metrics::counter!(observability::QUERIES_TOTAL, "command" => "parse", "status" => "error")
                .increment(1);
            sql_err(e)
        })?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(engine, cmd, format).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        cmd: Command,
        format: Option<&Format>,
    ) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::CheckIn {
                name,
                check_in,
                tier,
            } => {
                engine.check_in(&name, check_in, tier).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::RemoveTechnician { name } => {
                engine.remove_technician(&name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::UpsertService {
                name,
                minutes,
                price,
            } => {
                engine
                    .upsert_service(Service::new(name, minutes, price))
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::RemoveService { name } => {
                engine.remove_service(&name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::Register {
                service,
                arrival,
                count,
            } => {
                let registration = engine
                    .register(&service, arrival, count)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(registration_schema(format));
                let mut rows: Vec<PgWireResult<_>> = registration
                    .assigned
                    .iter()
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&"booking".to_string())?;
                        encoder.encode_field(&(b.id as i64))?;
                        encoder.encode_field(&Some(b.technician.clone()))?;
                        encoder.encode_field(&Some(b.start.to_rfc3339()))?;
                        encoder.encode_field(&Some(b.end.to_rfc3339()))?;
                        encoder.encode_field(&1i64)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                if let Some(w) = &registration.waiting {
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encoder.encode_field(&"waiting".to_string())?;
                    encoder.encode_field(&(w.id as i64))?;
                    encoder.encode_field(&None::<String>)?;
                    encoder.encode_field(&None::<String>)?;
                    encoder.encode_field(&None::<String>)?;
                    encoder.encode_field(&i64::from(w.count))?;
                    rows.push(Ok(encoder.take_row()));
                }
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::InsertReservation {
                customer,
                service,
                technician,
                start,
            } => {
                let reservation = engine
                    .add_reservation(customer, &service, &technician, start)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(reservation_schema(format));
                let rows = vec![encode_reservation(&schema, &reservation)];
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::DeleteReservation { id } => {
                engine.delete_reservation(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::Extend {
                booking_id,
                minutes,
                price,
            } => {
                let booking = engine
                    .extend(booking_id, minutes, price)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![booking_response(format, &[booking])])
            }
            Command::AddOn {
                booking_id,
                kind,
                price,
            } => {
                let booking = engine
                    .add_on(booking_id, kind, price)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![booking_response(format, &[booking])])
            }
            Command::RecordPayment {
                booking_id,
                payment,
            } => {
                engine
                    .record_payment(booking_id, payment)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteBooking { id } => {
                engine.delete_booking(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::DeleteWaiting { id } => {
                engine.delete_waiting(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::Select { table } => Ok(vec![self.select(engine, table, format).await]),
            Command::SelectEligible { service, at } => {
                let candidates = engine.preview(&service, at).await.map_err(engine_err)?;
                let schema = Arc::new(eligible_schema(format));
                let rows: Vec<PgWireResult<_>> = candidates
                    .iter()
                    .map(|c| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&c.technician)?;
                        encoder.encode_field(&c.tier.id().to_string())?;
                        encoder.encode_field(&c.start.to_rfc3339())?;
                        encoder.encode_field(&c.end.to_rfc3339())?;
                        encoder.encode_field(&i64::from(c.served_count))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::Call { procedure } => {
                let affected = match procedure {
                    Procedure::FlushWaiting => engine.flush_waiting().await.assigned.len(),
                    Procedure::ApplyReservations => engine.apply_due_reservations().await.len(),
                    Procedure::RefreshStatus => usize::from(engine.refresh_status().await),
                    Procedure::Tick => {
                        let report = engine.tick(self.days.settings().stale_after).await;
                        report.fulfilled.len() + report.flushed.len()
                    }
                    Procedure::ResetDay => {
                        engine.reset_day().await;
                        0
                    }
                };
                tracing::debug!("day {}: CALL {}() -> {affected}", engine.day(), procedure.id());
                Ok(vec![Response::Execution(Tag::new("CALL").with_rows(affected))])
            }
            Command::Listen { channel } => {
                listen_technician(&channel)?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
            Command::Unlisten { channel } => {
                listen_technician(&channel)?;
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
            Command::UnlistenAll => Ok(vec![Response::Execution(Tag::new("UNLISTEN"))]),
        }
    }

    async fn select(&self, engine: &Engine, table: Table, format: Option<&Format>) -> Response {
        let schema = Arc::new(table_schema(table, format));
        let rows: Vec<PgWireResult<_>> = match table {
            Table::Rotation => engine
                .rotation()
                .await
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encoder.encode_field(&(i as i64 + 1))?;
                    encode_technician(&mut encoder, t)?;
                    Ok(encoder.take_row())
                })
                .collect(),
            Table::Technicians => engine
                .technicians()
                .await
                .iter()
                .map(|t| {
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encode_technician(&mut encoder, t)?;
                    Ok(encoder.take_row())
                })
                .collect(),
            Table::Services => engine
                .services()
                .await
                .iter()
                .map(|s| {
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encoder.encode_field(&s.name)?;
                    encoder.encode_field(&i64::from(s.minutes))?;
                    encoder.encode_field(&s.price)?;
                    Ok(encoder.take_row())
                })
                .collect(),
            Table::Bookings => engine
                .bookings()
                .await
                .iter()
                .map(|b| encode_booking(&schema, b))
                .collect(),
            Table::Waiting => engine
                .waiting()
                .await
                .iter()
                .map(|w| {
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encoder.encode_field(&(w.id as i64))?;
                    encoder.encode_field(&w.service.name)?;
                    encoder.encode_field(&i64::from(w.service.minutes))?;
                    encoder.encode_field(&w.arrival.to_rfc3339())?;
                    encoder.encode_field(&i64::from(w.count))?;
                    Ok(encoder.take_row())
                })
                .collect(),
            Table::Reservations => engine
                .reservations()
                .await
                .iter()
                .map(|r| encode_reservation(&schema, r))
                .collect(),
            Table::Takings => engine
                .takings()
                .await
                .iter()
                .map(|t| {
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encoder.encode_field(&t.technician)?;
                    encoder.encode_field(&t.realized)?;
                    encoder.encode_field(&t.cash)?;
                    encoder.encode_field(&t.transfer)?;
                    encoder.encode_field(&t.eftpos)?;
                    encoder.encode_field(&t.voucher)?;
                    Ok(encoder.take_row())
                })
                .collect(),
        };
        Response::Query(QueryResponse::new(schema, stream::iter(rows)))
    }
}

/// `technician_<name>` is the only channel family.
fn listen_technician(channel: &str) -> PgWireResult<&str> {
    channel
        .strip_prefix("technician_")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "42000".into(),
                format!("invalid channel: {channel} (expected technician_{{name}})"),
            )))
        })
}

// ── Row encoding ─────────────────────────────────────────────────

fn encode_technician(encoder: &mut DataRowEncoder, t: &Technician) -> PgWireResult<()> {
    encoder.encode_field(&t.name)?;
    encoder.encode_field(&t.check_in.to_rfc3339())?;
    encoder.encode_field(&t.next_free.to_rfc3339())?;
    encoder.encode_field(&i64::from(t.served_count))?;
    encoder.encode_field(&t.tier.id().to_string())?;
    Ok(())
}

fn encode_booking(
    schema: &Arc<Vec<FieldInfo>>,
    b: &Booking,
) -> PgWireResult<pgwire::messages::data::DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&(b.id as i64))?;
    encoder.encode_field(&b.service)?;
    encoder.encode_field(&i64::from(b.minutes))?;
    encoder.encode_field(&b.technician)?;
    encoder.encode_field(&b.start.to_rfc3339())?;
    encoder.encode_field(&b.end.to_rfc3339())?;
    encoder.encode_field(&b.price)?;
    encoder.encode_field(&b.status.id().to_string())?;
    encoder.encode_field(&b.payment.total())?;
    encoder.encode_field(&b.payment.note)?;
    Ok(encoder.take_row())
}

fn encode_reservation(
    schema: &Arc<Vec<FieldInfo>>,
    r: &Reservation,
) -> PgWireResult<pgwire::messages::data::DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&(r.id as i64))?;
    encoder.encode_field(&r.customer)?;
    encoder.encode_field(&r.service)?;
    encoder.encode_field(&r.technician)?;
    encoder.encode_field(&r.start.to_rfc3339())?;
    let status = if r.is_pending() { "pending" } else { "done" };
    encoder.encode_field(&status.to_string())?;
    Ok(encoder.take_row())
}

fn booking_response(format: Option<&Format>, bookings: &[Booking]) -> Response {
    let schema = Arc::new(booking_schema(format));
    let rows: Vec<PgWireResult<_>> = bookings.iter().map(|b| encode_booking(&schema, b)).collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

// ── Schemas ──────────────────────────────────────────────────────

fn fields(columns: &[(&str, Type)], format: Option<&Format>) -> Vec<FieldInfo> {
    columns
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| {
            let field_format = format.map_or(FieldFormat::Text, |f| f.format_for(i));
            FieldInfo::new((*name).into(), None, None, ty.clone(), field_format)
        })
        .collect()
}

const TECHNICIAN_COLUMNS: [(&str, Type); 5] = [
    ("name", Type::VARCHAR),
    ("check_in", Type::VARCHAR),
    ("next_free", Type::VARCHAR),
    ("served_count", Type::INT8),
    ("tier", Type::VARCHAR),
];

fn table_schema(table: Table, format: Option<&Format>) -> Vec<FieldInfo> {
    match table {
        Table::Rotation => {
            let mut columns = vec![("position", Type::INT8)];
            columns.extend(TECHNICIAN_COLUMNS);
            fields(&columns, format)
        }
        Table::Technicians => fields(&TECHNICIAN_COLUMNS, format),
        Table::Services => fields(
            &[
                ("name", Type::VARCHAR),
                ("minutes", Type::INT8),
                ("price", Type::FLOAT8),
            ],
            format,
        ),
        Table::Bookings => booking_schema(format),
        Table::Waiting => fields(
            &[
                ("id", Type::INT8),
                ("service", Type::VARCHAR),
                ("minutes", Type::INT8),
                ("arrival", Type::VARCHAR),
                ("count", Type::INT8),
            ],
            format,
        ),
        Table::Reservations => reservation_schema(format),
        Table::Takings => fields(
            &[
                ("technician", Type::VARCHAR),
                ("realized", Type::FLOAT8),
                ("cash", Type::FLOAT8),
                ("transfer", Type::FLOAT8),
                ("eftpos", Type::FLOAT8),
                ("voucher", Type::FLOAT8),
            ],
            format,
        ),
    }
}

fn booking_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::INT8),
            ("service", Type::VARCHAR),
            ("minutes", Type::INT8),
            ("technician", Type::VARCHAR),
            ("start", Type::VARCHAR),
            ("end", Type::VARCHAR),
            ("price", Type::FLOAT8),
            ("status", Type::VARCHAR),
            ("paid", Type::FLOAT8),
            ("note", Type::VARCHAR),
        ],
        format,
    )
}

fn reservation_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("id", Type::INT8),
            ("customer", Type::VARCHAR),
            ("service", Type::VARCHAR),
            ("technician", Type::VARCHAR),
            ("start", Type::VARCHAR),
            ("status", Type::VARCHAR),
        ],
        format,
    )
}

fn registration_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("kind", Type::VARCHAR),
            ("id", Type::INT8),
            ("technician", Type::VARCHAR),
            ("start", Type::VARCHAR),
            ("end", Type::VARCHAR),
            ("count", Type::INT8),
        ],
        format,
    )
}

fn eligible_schema(format: Option<&Format>) -> Vec<FieldInfo> {
    fields(
        &[
            ("technician", Type::VARCHAR),
            ("tier", Type::VARCHAR),
            ("start", Type::VARCHAR),
            ("end", Type::VARCHAR),
            ("served_count", Type::INT8),
        ],
        format,
    )
}

/// Row shape of a statement, decided from its verb and target table alone so that
/// statements with unbound `$n` placeholders can still be described.
fn result_schema(sql: &str, format: Option<&Format>) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty())
        .collect();
    let after = |keyword: &str| {
        words
            .iter()
            .position(|w| *w == keyword)
            .and_then(|i| words.get(i + 1))
            .copied()
    };
    match words.first().copied() {
        Some("select") => match after("from") {
            Some("eligible") => eligible_schema(format),
            Some(name) => match sql::parse_sql(&format!("SELECT * FROM {name}")) {
                Ok(Command::Select { table }) => table_schema(table, format),
                _ => vec![],
            },
            None => vec![],
        },
        Some("insert") => match after("into") {
            Some("customers") => registration_schema(format),
            Some("reservations") => reservation_schema(format),
            Some("extensions") | Some("add_ons") => booking_schema(format),
            _ => vec![],
        },
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for RotaHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        self.run(&engine, query, None).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RotaQueryParser;

#[async_trait]
impl QueryParser for RotaQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt, column_format))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RotaHandler {
    type Statement = String;
    type QueryParser = RotaQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let mut responses = self
            .run(&engine, &sql, Some(&portal.result_column_format))
            .await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement, None),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
            Some(&target.result_column_format),
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let mut result = portal.statement.statement.to_string();

    // Highest index first so $1 never clobbers the prefix of $10
    for (i, param) in portal.parameters.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RotaFactory {
    handler: Arc<RotaHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<RotaAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl RotaFactory {
    pub fn new(days: Arc<DayManager>, password: String) -> Self {
        let auth_source = RotaAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RotaHandler::new(days)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RotaFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    days: Arc<DayManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = RotaFactory::new(days, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
