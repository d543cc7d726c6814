//! # REST Gateway
//!
//! Per-request entry point: normalize, authenticate, pick the schema,
//! build the env, compile, execute and shape the response.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::http::Method;
use serde_json::{Map, Value};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::api::{ApiError, ApiResponse, ApiResult};
use crate::auth::{AuthContext, JwtAuthenticator};
use crate::compiler::{CompileRequest, CompilerInterface, StatementEngine};
use crate::config::{GatewayConfig, HandlerOptions};
use crate::context::{Env, JWT_CLAIMS_KEY};
use crate::db::DbClient;
use crate::observability::Event;
use crate::request::{HostRequest, NormalizedRequest};
use crate::schema::{introspection_query, load_schema, permissions_view, schema_view, DbSchema};

use super::executor::Execution;

/// Accept type asking for exactly one object instead of an array
pub const SINGULAR_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Request handler bound to one configuration.
///
/// The compiler is installed after bootstrap and replaced wholesale when
/// the schema is reloaded; until then every request gets 503.
pub struct RestGateway {
    options: HandlerOptions,
    db_schemas: Vec<String>,
    authenticator: JwtAuthenticator,
    compiler: RwLock<Option<Arc<CompilerInterface>>>,
}

impl RestGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        let options = config.handler.clone();
        let authenticator = JwtAuthenticator::new(
            options.jwt_secret.as_deref(),
            options.jwt_audience.clone(),
            &options.role_claim_key,
            options.db_anon_role.clone(),
        );
        Self {
            options,
            db_schemas: config.db_schemas.clone(),
            authenticator,
            compiler: RwLock::new(None),
        }
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    /// Introspect through `client`, bind `engine` to the result and install it
    pub async fn bootstrap(
        &self,
        config: &GatewayConfig,
        engine: &dyn StatementEngine,
        client: &dyn DbClient,
    ) -> ApiResult<()> {
        let statement = introspection_query(
            config.dialect,
            &config.db_schemas,
            &config.introspection_overrides(),
            config.include_all_db_roles,
        );
        let schema = load_schema(
            client,
            &statement,
            &config.retry_policy(),
            config.use_internal_permissions_check,
        )
        .await?;
        let compiler = CompilerInterface::new(
            engine,
            schema,
            config.dialect,
            config.allowed_select_functions.as_deref(),
        )?;
        self.install(compiler);
        Ok(())
    }

    /// Swap in a compiler for a new schema
    pub fn install(&self, compiler: CompilerInterface) {
        let mut slot = self.compiler.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(compiler));
    }

    pub fn is_ready(&self) -> bool {
        self.compiler().is_ok()
    }

    fn compiler(&self) -> ApiResult<Arc<CompilerInterface>> {
        self.compiler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ApiError::Unavailable)
    }

    /// Resolve the caller from the `authorization` header
    pub fn authenticate(&self, request: &NormalizedRequest) -> ApiResult<AuthContext> {
        Ok(self.authenticator.authenticate(&request.headers)?)
    }

    /// Full pipeline for a host request
    pub async fn handle(&self, client: &dyn DbClient, request: HostRequest) -> ApiResult<ApiResponse> {
        let request = request.normalize().await?;
        let auth = self.authenticate(&request)?;
        self.handle_normalized(client, &request, &auth).await
    }

    /// Pipeline for an already normalized and authenticated request
    pub async fn handle_normalized(
        &self,
        client: &dyn DbClient,
        request: &NormalizedRequest,
        auth: &AuthContext,
    ) -> ApiResult<ApiResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", id = %request_id, method = %request.method, path = request.path());
        async {
            info!(event = Event::RequestStart.as_str(), role = %auth.role);
            let result = self.execute(client, request, auth).await;
            match &result {
                Ok(response) => info!(event = Event::RequestComplete.as_str(), status = response.status),
                Err(e) => warn!(event = Event::RequestFailed.as_str(), status = e.status(), error = %e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        client: &dyn DbClient,
        request: &NormalizedRequest,
        auth: &AuthContext,
    ) -> ApiResult<ApiResponse> {
        if !ALLOWED_METHODS.contains(&request.method) {
            return Err(ApiError::MethodNotAllowed(request.method.to_string()));
        }
        let compiler = self.compiler()?;

        let read_only = request.is_read_only();
        let schema_name = self.select_schema(request, read_only)?;
        let query = request.query_pairs()?;
        let headers = header_map(&request.headers);
        let env = build_env(&self.options, request, &headers, &query, auth);

        let compile = CompileRequest {
            schema_name,
            entity: entity_for(request.path(), &self.options.url_prefix),
            method: request.method.to_string(),
            path: request.path().to_string(),
            query,
            body: request.body.clone(),
            role: auth.role.clone(),
            headers,
            env,
            max_rows: self.options.db_max_rows,
        };
        let singular = request
            .header("accept")
            .map_or(false, |a| a.contains(SINGULAR_MEDIA_TYPE));

        let row = Execution {
            client,
            compiler: &compiler,
            request: &compile,
            read_only,
            singular,
            authenticated: auth.authenticated,
        }
        .run(&self.options)
        .await?;

        ApiResponse::from_db_row(&row, offset_param(&compile.query))
    }

    fn select_schema(&self, request: &NormalizedRequest, read_only: bool) -> ApiResult<String> {
        let profile_header = if read_only { "accept-profile" } else { "content-profile" };
        let schema = match request.header(profile_header) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => self.default_schema().to_string(),
        };
        if !self.db_schemas.contains(&schema) {
            return Err(ApiError::SchemaNotFound {
                schema,
                allowed: self.db_schemas.clone(),
            });
        }
        Ok(schema)
    }

    fn default_schema(&self) -> &str {
        self.db_schemas.first().map(String::as_str).unwrap_or("public")
    }

    fn with_default_schema<T>(&self, f: impl FnOnce(&DbSchema) -> T) -> ApiResult<T> {
        let compiler = self.compiler()?;
        let schema = compiler.schema();
        let db_schema = schema
            .find_schema(self.default_schema())
            .or_else(|| schema.schemas.first())
            .ok_or(ApiError::Unavailable)?;
        Ok(f(db_schema))
    }

    /// Objects of the default schema visible to `role`
    pub fn schema_response(&self, role: &str) -> ApiResult<ApiResponse> {
        let view = self.with_default_schema(|s| schema_view(s, role))?;
        let value = serde_json::to_value(view).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(ApiResponse::json(&value))
    }

    /// UI permissions of `role` on the default schema
    pub fn permissions_response(&self, role: &str) -> ApiResult<ApiResponse> {
        let view = self.with_default_schema(|s| permissions_view(s, role))?;
        let value = serde_json::to_value(view).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(ApiResponse::json(&value))
    }
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("db_schemas", &self.db_schemas)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Header map handed to the compiler; an empty `prefer` is dropped and
/// repeated headers are joined with `,`
fn header_map(headers: &[(String, String)]) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    for (k, v) in headers {
        if k == "prefer" && v.trim().is_empty() {
            continue;
        }
        map.entry(k.clone())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(v);
            })
            .or_insert_with(|| v.clone());
    }
    map
}

/// Request context exposed to SQL, in a fixed order
pub fn build_env(
    options: &HandlerOptions,
    request: &NormalizedRequest,
    headers: &HashMap<String, String>,
    query: &[(String, String)],
    auth: &AuthContext,
) -> Env {
    let headers_json: Map<String, Value> = headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let mut get_json = Map::new();
    for (k, v) in query {
        get_json.insert(k.clone(), Value::String(v.clone()));
    }

    Env::new()
        .with("role", auth.role.clone())
        .with("search_path", options.db_extra_search_path.join(","))
        .with("request.method", request.method.as_str())
        .with("request.headers", Value::Object(headers_json).to_string())
        .with("request.get", Value::Object(get_json).to_string())
        .with(JWT_CLAIMS_KEY, auth.claims_json())
}

/// `offset` query parameter; missing, unparseable or negative values are 0
fn offset_param(query: &[(String, String)]) -> i64 {
    query
        .iter()
        .find(|(k, _)| k == "offset")
        .and_then(|(_, v)| v.parse::<i64>().ok())
        .map_or(0, |o| o.max(0))
}

/// URL path with the prefix removed
pub fn entity_for(path: &str, prefix: &str) -> String {
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    rest.trim_matches('/').to_string()
}
