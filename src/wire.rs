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
use tracing::debug;

use crate::auth::CourtbookAuthSource;
use crate::calendar::format_timestamp;
use crate::engine::{EngineError, ScheduleStore};
use crate::model::*;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, Command, SqlError};
use crate::tenant::{Tenant, TenantManager};

pub struct CourtbookHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<CourtbookQueryParser>,
}

impl CourtbookHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(CourtbookQueryParser),
        }
    }

    fn resolve_tenant<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Tenant>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager
            .get_or_create(&db)
            .map_err(|e| user_error("08006", format!("tenant error: {e}")))
    }

    /// The connecting user is the actor for every booking it creates.
    fn actor<C: ClientInfo>(client: &C) -> String {
        client.metadata().get("user").cloned().unwrap_or_default()
    }

    async fn run(&self, tenant: &Tenant, actor: &str, cmd: Command) -> PgWireResult<Response> {
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(tenant, actor, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label).record(started.elapsed().as_secs_f64());
        debug!("{label} finished: {status}");
        result.map_err(engine_err)
    }

    async fn execute_command(&self, tenant: &Tenant, actor: &str, cmd: Command) -> Result<Response, EngineError> {
        let store = &tenant.store;
        let engine = &tenant.engine;
        match cmd {
            Command::CreateDefaultSchedule { club_id } => {
                store.create_default_schedule(club_id).await?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::SetDailyHours { club_id, hours } => {
                store.set_daily_hours(club_id, hours).await?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteSchedule { club_id } => {
                store.remove_schedule(club_id).await?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectSchedule { club_id } => {
                let hours = store
                    .schedule_for_club(club_id)
                    .await?
                    .map(|s| s.weekly_hours)
                    .unwrap_or_default();
                Ok(hours_response(club_id, &hours))
            }
            Command::SaveCourt { court } => {
                store.save_court(court).await?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteCourt { id } => {
                store.remove_court(id).await?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectCourts { club_id } => Ok(courts_response(&store.list_courts(club_id))),
            Command::InsertBooking {
                club_id,
                court_id,
                start_time,
                status,
                match_type,
                game_type,
                is_private,
                needs_players,
            } => {
                let booking = engine
                    .create_booking(NewBooking {
                        status,
                        match_type,
                        game_type,
                        is_private,
                        needs_players,
                        ..NewBooking::new(club_id, court_id, actor, start_time)
                    })
                    .await?;
                Ok(bookings_response(std::slice::from_ref(&booking)))
            }
            Command::UpdateBooking { id, patch } => {
                let booking = engine.update_booking(id, patch).await?;
                Ok(bookings_response(std::slice::from_ref(&booking)))
            }
            Command::DeleteBooking { id } => {
                engine.remove_booking(id).await?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectBookings { filter } => {
                let bookings = engine.list_bookings(&filter).await?;
                Ok(bookings_response(&bookings))
            }
            Command::SelectAvailability { club_id, date } => {
                let availability = engine.get_availability(club_id, &date).await?;
                Ok(availability_response(&availability))
            }
        }
    }
}

// ── Result sets ──────────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("club_id", Type::VARCHAR),
        field("date", Type::VARCHAR),
        field("court_id", Type::VARCHAR),
        field("court_name", Type::VARCHAR),
        field("court_type", Type::VARCHAR),
        field("available_slots", Type::VARCHAR),
    ]
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("club_id", Type::VARCHAR),
        field("court_id", Type::VARCHAR),
        field("user_id", Type::VARCHAR),
        field("start_time", Type::VARCHAR),
        field("end_time", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("match_type", Type::VARCHAR),
        field("game_type", Type::VARCHAR),
        field("is_private", Type::BOOL),
        field("needs_players", Type::BOOL),
        field("participants", Type::VARCHAR),
    ]
}

fn court_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("club_id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("type", Type::VARCHAR),
        field("is_active", Type::BOOL),
    ]
}

fn hours_schema() -> Vec<FieldInfo> {
    vec![
        field("club_id", Type::VARCHAR),
        field("day_of_week", Type::INT4),
        field("is_open", Type::BOOL),
        field("open_time", Type::VARCHAR),
        field("close_time", Type::VARCHAR),
        field("slot_duration_minutes", Type::INT4),
    ]
}

/// JSON array text for list-valued columns.
fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".into())
}

fn availability_response(availability: &ClubAvailability) -> Response {
    let schema = Arc::new(availability_schema());
    let club_id = availability.club_id.to_string();
    let rows: Vec<PgWireResult<_>> = availability
        .courts
        .iter()
        .map(|court| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&club_id)?;
            encoder.encode_field(&availability.date)?;
            encoder.encode_field(&court.court_id.to_string())?;
            encoder.encode_field(&court.court_name)?;
            encoder.encode_field(&court.court_type.as_str())?;
            encoder.encode_field(&json_list(&court.available_slots))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn bookings_response(bookings: &[Booking]) -> Response {
    let schema = Arc::new(booking_schema());
    let rows: Vec<PgWireResult<_>> = bookings
        .iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id.to_string())?;
            encoder.encode_field(&b.club_id.to_string())?;
            encoder.encode_field(&b.court_id.to_string())?;
            encoder.encode_field(&b.user_id)?;
            encoder.encode_field(&format_timestamp(b.span.start))?;
            encoder.encode_field(&format_timestamp(b.span.end))?;
            encoder.encode_field(&b.status.as_str())?;
            encoder.encode_field(&b.match_type.as_str())?;
            encoder.encode_field(&b.game_type.as_str())?;
            encoder.encode_field(&b.is_private)?;
            encoder.encode_field(&b.needs_players)?;
            encoder.encode_field(&json_list(&b.participants))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn courts_response(courts: &[Court]) -> Response {
    let schema = Arc::new(court_schema());
    let rows: Vec<PgWireResult<_>> = courts
        .iter()
        .map(|c| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&c.id.to_string())?;
            encoder.encode_field(&c.club_id.to_string())?;
            encoder.encode_field(&c.name)?;
            encoder.encode_field(&c.court_type.as_str())?;
            encoder.encode_field(&c.is_active)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn hours_response(club_id: ulid::Ulid, hours: &[DailyHours]) -> Response {
    let schema = Arc::new(hours_schema());
    let club_id = club_id.to_string();
    let rows: Vec<PgWireResult<_>> = hours
        .iter()
        .map(|h| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&club_id)?;
            encoder.encode_field(&i32::from(h.day_of_week))?;
            encoder.encode_field(&h.is_open)?;
            encoder.encode_field(&h.open_time)?;
            encoder.encode_field(&h.close_time)?;
            encoder.encode_field(&h.slot_duration_minutes.map(|m| m as i32))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// Row shape of a statement, judged from its text; placeholders make the
/// statement unparseable until bind time.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    let is_select = upper.trim_start().starts_with("SELECT");
    if upper.contains("AVAILABILITY") {
        availability_schema()
    } else if upper.contains("BOOKINGS") && !upper.trim_start().starts_with("DELETE") {
        booking_schema()
    } else if is_select && upper.contains("COURTS") {
        court_schema()
    } else if is_select && upper.contains("HOURS") {
        hours_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for CourtbookHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let tenant = self.resolve_tenant(client)?;
        let actor = Self::actor(client);
        let commands = sql::parse_sql(query).map_err(sql_err)?;
        let mut responses = Vec::with_capacity(commands.len());
        for cmd in commands {
            responses.push(self.run(&tenant, &actor, cmd).await?);
        }
        Ok(responses)
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct CourtbookQueryParser;

#[async_trait]
impl QueryParser for CourtbookQueryParser {
    type Statement = String;

    async fn parse_sql<C>(&self, _client: &C, sql: &str, _types: &[Option<Type>]) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(&self, stmt: &String, _column_format: Option<&Format>) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for CourtbookHandler {
    type Statement = String;
    type QueryParser = CourtbookQueryParser;

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
        let tenant = self.resolve_tenant(client)?;
        let sql = substitute_params(&portal.statement.statement, &portal.parameters);
        let cmd = sql::parse_single(&sql).map_err(sql_err)?;
        self.run(&tenant, &Self::actor(client), cmd).await
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
        Ok(DescribeStatementResponse::new(param_types, result_schema(&target.statement)))
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
        Ok(DescribePortalResponse::new(result_schema(&target.statement.statement)))
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

/// Substitute $1, $2, ... placeholders with bound parameter values (text
/// format) in one left-to-right pass. Bound text is never rescanned, and a
/// placeholder with no bound value is left as written.
fn substitute_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let bound = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| params.get(i));
        match bound {
            Some(Some(bytes)) => {
                result.push('\'');
                result.push_str(&String::from_utf8_lossy(bytes.as_ref()).replace('\'', "''"));
                result.push('\'');
            }
            Some(None) => result.push_str("NULL"),
            None => {
                result.push('$');
                result.push_str(&after[..digits]);
            }
        }
        rest = &after[digits..];
    }
    result.push_str(rest);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct CourtbookFactory {
    handler: Arc<CourtbookHandler>,
    auth_handler: Arc<CleartextPasswordAuthStartupHandler<CourtbookAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl CourtbookFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = CourtbookAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(CourtbookHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(auth_source, param_provider)),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for CourtbookFactory {
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
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(CourtbookFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), message)))
}

fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_) => "22023",
        EngineError::NotFound { .. } => "P0002",
        EngineError::Conflict { .. } => "23P01",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::WalError(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(sqlstate(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}
