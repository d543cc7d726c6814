//! # Request Execution
//!
//! Drives one compiled request through a [`DbClient`], one flow per
//! dialect. Whatever happens inside an open transaction, a failure rolls
//! it back before the error is returned.
//!
//! The client's session is held for the whole run, so the request context
//! and the transaction belong to this request alone.

use std::future::Future;

use tracing::{debug, warn};

use crate::api::{ApiError, ApiResult, DbResponseRow};
use crate::compiler::{CompileRequest, CompilerInterface, Statement};
use crate::config::HandlerOptions;
use crate::context::{fmt_mysql_env, fmt_postgresql_env};
use crate::db::{DbClient, DbError, Dialect, Row, TxMode};
use crate::mutation::{ids_from_rows, recover_ids, IdRecovery, MutationError};
use crate::observability::Event;

/// Everything one execution needs besides the handler options
pub struct Execution<'a> {
    pub client: &'a dyn DbClient,
    pub compiler: &'a CompilerInterface,
    pub request: &'a CompileRequest,
    pub read_only: bool,
    /// Caller asked for a single JSON object
    pub singular: bool,
    pub authenticated: bool,
}

impl<'a> Execution<'a> {
    pub async fn run(&self, options: &HandlerOptions) -> ApiResult<DbResponseRow> {
        // dropped after the context scope and the transaction end
        let _session = self.client.session().await;
        match self.client.dialect() {
            Dialect::Postgresql => self.run_postgresql(options).await,
            Dialect::Sqlite => self.run_sqlite(options).await,
            Dialect::Mysql => self.run_mysql(options).await,
        }
    }

    async fn run_postgresql(&self, options: &HandlerOptions) -> ApiResult<DbResponseRow> {
        let main = self.compiler.compile_main(self.request)?;
        let work = async {
            if options.set_db_env && options.wrap_in_transaction {
                let env = fmt_postgresql_env(&self.request.env);
                self.run_statement(&env).await?;
            }
            self.fetch_row(&main).await
        };
        self.in_transaction(options.wrap_in_transaction, options, work)
            .await
    }

    async fn run_sqlite(&self, options: &HandlerOptions) -> ApiResult<DbResponseRow> {
        let store = self
            .client
            .context_store()
            .ok_or_else(|| ApiError::Internal("Context Env for sqlite not set".into()))?;
        // cleared on drop, whichever way this returns
        let _scope = store.enter(&self.request.env);

        if self.read_only {
            let main = self.compiler.compile_main(self.request)?;
            let work = self.fetch_row(&main);
            return self.in_transaction(false, options, work).await;
        }

        let mut two_phase = self.compiler.compile_two_phase(self.request)?;
        let work = async {
            let mutate = two_phase.mutate_statement().clone();
            self.log_phase(Event::MutatePhase, &mutate);
            let rows = self.client.get_all(&mutate).await.map_err(|e| self.db_error(e))?;
            two_phase.set_mutated_rows(&rows).map_err(|e| self.mutation_error(e))?;

            let select = two_phase.fmt_select_statement()?;
            self.log_phase(Event::SelectPhase, &select);
            self.fetch_row(&select).await
        };
        self.in_transaction(true, options, work).await
    }

    async fn run_mysql(&self, options: &HandlerOptions) -> ApiResult<DbResponseRow> {
        let env = fmt_mysql_env(&self.request.env);

        if self.read_only {
            let main = self.compiler.compile_main(self.request)?;
            let work = async {
                self.run_statement(&env).await?;
                self.fetch_row(&main).await
            };
            return self.in_transaction(true, options, work).await;
        }

        let mut two_phase = self.compiler.compile_two_phase(self.request)?;
        let work = async {
            self.run_statement(&env).await?;

            let mutate = two_phase.mutate_statement().clone();
            self.log_phase(Event::MutatePhase, &mutate);
            let outcome = self.client.run(&mutate).await.map_err(|e| self.db_error(e))?;
            let ids = match recover_ids(&outcome) {
                IdRecovery::Known(ids) => ids,
                IdRecovery::Query(stmt) => {
                    let rows = self.fetch_all(&stmt).await?;
                    ids_from_rows(&rows)
                }
            };
            debug!(ids = ids.len(), "mutated ids recovered");
            two_phase.set_resolved_ids(ids)?;

            let select = two_phase.fmt_select_statement()?;
            self.log_phase(Event::SelectPhase, &select);
            self.fetch_row(&select).await
        };
        self.in_transaction(true, options, work).await
    }

    /// Run `work` between begin and commit when `wrap` is set; checks the
    /// result row before committing.
    async fn in_transaction<F>(&self, wrap: bool, options: &HandlerOptions, work: F) -> ApiResult<DbResponseRow>
    where
        F: Future<Output = ApiResult<DbResponseRow>>,
    {
        if wrap {
            let mode = TxMode::for_read_only(self.read_only);
            debug!(sql = mode.begin_sql(self.client.dialect()), "begin");
            self.client.begin(mode).await.map_err(|e| self.db_error(e))?;
        }

        let result = match work.await {
            Ok(row) => self.check(row),
            Err(e) => Err(e),
        };

        if !wrap {
            return result;
        }
        match result {
            Ok(row) if !options.tx_rollback => {
                self.client.commit().await.map_err(|e| self.db_error(e))?;
                Ok(row)
            }
            Ok(row) => {
                debug!("tx_rollback set, discarding changes");
                self.client.rollback().await.map_err(|e| self.db_error(e))?;
                Ok(row)
            }
            Err(e) => {
                warn!(event = Event::Rollback.as_str(), error = %e, "rolling back");
                if let Err(rb) = self.client.rollback().await {
                    warn!(error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Checks that must pass before a transaction may commit
    fn check(&self, row: DbResponseRow) -> ApiResult<DbResponseRow> {
        if row.constraints_failed() {
            warn!(event = Event::PermissionDenied.as_str(), entity = %self.request.entity);
            return Err(MutationError::constraint_failed().into());
        }
        let page_total = row.page_total.unwrap_or(0);
        if self.request.method == "PUT" && page_total != 1 {
            return Err(ApiError::PutMatchingPk);
        }
        if self.singular && page_total != 1 {
            return Err(ApiError::Singularity { count: page_total });
        }
        Ok(row)
    }

    async fn run_statement(&self, stmt: &Statement) -> ApiResult<()> {
        log_statement(stmt);
        self.client.run(stmt).await.map_err(|e| self.db_error(e))?;
        Ok(())
    }

    async fn fetch_row(&self, stmt: &Statement) -> ApiResult<DbResponseRow> {
        log_statement(stmt);
        let row = self.client.get_one(stmt).await.map_err(|e| self.db_error(e))?;
        Ok(row.as_ref().map(DbResponseRow::from_row).unwrap_or_default())
    }

    async fn fetch_all(&self, stmt: &Statement) -> ApiResult<Vec<Row>> {
        log_statement(stmt);
        self.client.get_all(stmt).await.map_err(|e| self.db_error(e))
    }

    fn log_phase(&self, event: Event, stmt: &Statement) {
        debug!(event = event.as_str(), entity = %self.request.entity, params = stmt.parameters.len());
    }

    fn mutation_error(&self, err: MutationError) -> ApiError {
        if matches!(err, MutationError::PermissionDenied { .. }) {
            warn!(event = Event::PermissionDenied.as_str(), entity = %self.request.entity);
        }
        err.into()
    }

    fn db_error(&self, err: DbError) -> ApiError {
        ApiError::database(err, self.authenticated)
    }
}

fn log_statement(stmt: &Statement) {
    debug!(
        event = Event::StatementExecuted.as_str(),
        query = %stmt.query,
        params = ?stmt.parameters,
    );
}
